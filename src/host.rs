// src/host.rs

//! Host profile and privilege probes
//!
//! Everything host-generation-specific is captured as data in a [`HostProfile`]
//! handed to the store, so core logic never branches on the platform directly
//! and tests can exercise any generation.

use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Locale id of the embedded startup sound resource.
pub const STARTUP_RESOURCE_LOCALE: u16 = 1033;

/// Resource id used by the first host generation that embedded the sound.
pub const STARTUP_RESOURCE_ID_VISTA: u32 = 5051;

/// Resource id used by later generations.
pub const STARTUP_RESOURCE_ID_MODERN: u32 = 5080;

/// Whether (and how) the startup sound lives inside the shell module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartupPatch {
    /// The host keeps the startup sound as a plain file; patching is impossible.
    NotPossible,
    /// The module embeds the sound and patching is the only way to customize it.
    Required { resource_id: u32 },
    /// The module embeds a copy but the host honors the per-event file too;
    /// patching works but is optional (and reverted by host upgrades).
    Optional { resource_id: u32 },
}

/// Capabilities and fixed locations of the running host.
#[derive(Debug, Clone)]
pub struct HostProfile {
    pub startup_patch: StartupPatch,
    /// Path of the graphical shell's resource module.
    pub shell_module: PathBuf,
    /// Widen canonical files' read permission for the restricted execution
    /// identity some UI surfaces run under.
    pub widen_read_access: bool,
}

impl HostProfile {
    /// Probe the running host.
    ///
    /// `CHIME_SHELL_MODULE` overrides the module path and implies a
    /// patch-required profile, which keeps the patch paths testable everywhere.
    pub fn detect() -> HostProfile {
        if let Ok(module) = env::var("CHIME_SHELL_MODULE") {
            return HostProfile {
                startup_patch: StartupPatch::Required {
                    resource_id: STARTUP_RESOURCE_ID_MODERN,
                },
                shell_module: PathBuf::from(module),
                widen_read_access: false,
            };
        }

        #[cfg(windows)]
        {
            let windir = env::var("WINDIR").unwrap_or_else(|_| String::from("C:\\Windows"));
            return HostProfile {
                startup_patch: StartupPatch::Optional {
                    resource_id: STARTUP_RESOURCE_ID_MODERN,
                },
                shell_module: PathBuf::from(windir).join("System32").join("imageres.dll"),
                widen_read_access: true,
            };
        }

        #[cfg(not(windows))]
        HostProfile {
            startup_patch: StartupPatch::NotPossible,
            shell_module: PathBuf::new(),
            widen_read_access: false,
        }
    }

    pub fn patch_possible(&self) -> bool {
        !matches!(self.startup_patch, StartupPatch::NotPossible)
    }

    pub fn patch_required(&self) -> bool {
        matches!(self.startup_patch, StartupPatch::Required { .. })
    }

    /// Embedded resource id, when the host has one.
    pub fn startup_resource_id(&self) -> Option<u32> {
        match self.startup_patch {
            StartupPatch::NotPossible => None,
            StartupPatch::Required { resource_id } | StartupPatch::Optional { resource_id } => {
                Some(resource_id)
            }
        }
    }
}

/// Probe for elevated rights. A trait so tests can fake either answer.
pub trait Elevation {
    fn is_elevated(&self) -> bool;
}

/// Elevation probe for the running process.
pub struct ProcessElevation;

impl Elevation for ProcessElevation {
    #[cfg(unix)]
    fn is_elevated(&self) -> bool {
        nix::unistd::geteuid().is_root()
    }

    #[cfg(not(unix))]
    fn is_elevated(&self) -> bool {
        // Elevation bootstrapping is an external collaborator; mutating
        // operations will surface failures if rights turn out to be missing.
        true
    }
}

/// Fixed elevation answer, for tests and dry runs.
pub struct FixedElevation(pub bool);

impl Elevation for FixedElevation {
    fn is_elevated(&self) -> bool {
        self.0
    }
}

/// Make `path` readable by the restricted execution identity.
///
/// On unix hosts this widens the file mode's group/other read bits; on hosts
/// without unix permissions it is a no-op (the ACL grant is applied by the
/// installer glue there).
pub fn widen_read_access(path: &Path) -> io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let metadata = fs::metadata(path)?;
        let mut perms = metadata.permissions();
        perms.set_mode(perms.mode() | 0o044);
        fs::set_permissions(path, perms)?;
    }
    #[cfg(not(unix))]
    {
        let _ = fs::metadata(path)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patch_flags() {
        let host = HostProfile {
            startup_patch: StartupPatch::Required {
                resource_id: STARTUP_RESOURCE_ID_VISTA,
            },
            shell_module: PathBuf::from("/tmp/shell.dll"),
            widen_read_access: false,
        };
        assert!(host.patch_possible());
        assert!(host.patch_required());
        assert_eq!(host.startup_resource_id(), Some(5051));

        let none = HostProfile {
            startup_patch: StartupPatch::NotPossible,
            shell_module: PathBuf::new(),
            widen_read_access: false,
        };
        assert!(!none.patch_possible());
        assert_eq!(none.startup_resource_id(), None);
    }

    #[test]
    fn test_fixed_elevation() {
        assert!(FixedElevation(true).is_elevated());
        assert!(!FixedElevation(false).is_elevated());
    }
}
