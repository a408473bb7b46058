// src/events.rs

//! Fixed catalog of sound events
//!
//! One record per named system audio trigger. The table is built once and
//! looked up by id or role; per-event disabled flags live in [`crate::Settings`],
//! keyed by event id.
//!
//! Event ids must not be renamed: archive entry names and legacy file names
//! derive from them.

/// Special role an event may carry beyond being a plain trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventRole {
    Startup,
    Shutdown,
    Logon,
    Logoff,
    /// Played when a scheme is loaded; file-only, no layered-store entries.
    LoadScheme,
}

/// Where the factory sound for an event comes from.
///
/// Closed on purpose: exactly one event is resource-backed, and keeping this an
/// enum rules out ambiguous multi-resource patching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FactorySource {
    /// A standalone file referenced by the default layer.
    File,
    /// A byte range embedded in the graphical shell's resource module.
    ShellModuleResource,
}

/// Immutable descriptor for one sound event.
#[derive(Debug)]
pub struct SoundEvent {
    /// Internal name; also the canonical file stem.
    pub id: &'static str,
    /// Entry name used by the legacy archive format, when one exists.
    pub legacy_file_name: Option<&'static str>,
    /// Registry-style event paths (some host generations use several).
    pub registry_paths: &'static [&'static str],
    pub role: Option<EventRole>,
    pub factory: FactorySource,
}

impl SoundEvent {
    /// Canonical archive/file name, `<id>.wav`.
    pub fn file_name(&self) -> String {
        format!("{}.wav", self.id)
    }

    /// The whole catalog, in stable order.
    pub fn all() -> &'static [SoundEvent] {
        EVENTS
    }

    /// Look up an event by internal name.
    pub fn by_id(id: &str) -> Option<&'static SoundEvent> {
        EVENTS.iter().find(|e| e.id.eq_ignore_ascii_case(id))
    }

    /// Look up the single event carrying the given role.
    pub fn by_role(role: EventRole) -> Option<&'static SoundEvent> {
        EVENTS.iter().find(|e| e.role == Some(role))
    }
}

const fn event(
    id: &'static str,
    registry_paths: &'static [&'static str],
    legacy_file_name: Option<&'static str>,
) -> SoundEvent {
    SoundEvent {
        id,
        legacy_file_name,
        registry_paths,
        role: None,
        factory: FactorySource::File,
    }
}

const fn role_event(
    id: &'static str,
    registry_paths: &'static [&'static str],
    legacy_file_name: Option<&'static str>,
    role: EventRole,
    factory: FactorySource,
) -> SoundEvent {
    SoundEvent {
        id,
        legacy_file_name,
        registry_paths,
        role: Some(role),
        factory,
    }
}

// Legacy entry names come from the XP-era French release of the third-party
// archive format and are part of the interop surface, not display text.
static EVENTS: &[SoundEvent] = &[
    role_event(
        "Startup",
        &[".Default\\SystemStart"],
        Some("Windows XP Démarrage.wav"),
        EventRole::Startup,
        FactorySource::ShellModuleResource,
    ),
    role_event(
        "Shutdown",
        &[".Default\\SystemExit"],
        Some("Windows XP Arrêt du système.wav"),
        EventRole::Shutdown,
        FactorySource::File,
    ),
    role_event(
        "Logon",
        &[".Default\\WindowsLogon"],
        Some("Windows XP Ouverture de session.wav"),
        EventRole::Logon,
        FactorySource::File,
    ),
    role_event(
        "Logoff",
        &[".Default\\WindowsLogoff"],
        Some("Windows XP Fermeture de session.wav"),
        EventRole::Logoff,
        FactorySource::File,
    ),
    role_event(
        "LoadScheme",
        &[],
        None,
        EventRole::LoadScheme,
        FactorySource::File,
    ),
    event(
        "Information",
        &[".Default\\SystemAsterisk"],
        Some("Windows XP Erreur.wav"),
    ),
    event("Question", &[".Default\\SystemQuestion"], None),
    event(
        "Warning",
        &[".Default\\SystemExclamation"],
        Some("Windows XP Exclamation.wav"),
    ),
    event(
        "Error",
        &[".Default\\SystemHand"],
        Some("Windows XP Arrêt critique.wav"),
    ),
    event(
        "DeviceConnect",
        &[".Default\\DeviceConnect"],
        Some("Windows XP Insertion d'un matériel.wav"),
    ),
    event(
        "DeviceDisconnect",
        &[".Default\\DeviceDisconnect"],
        Some("Windows XP Suppression d'un matériel.wav"),
    ),
    event(
        "DeviceFail",
        &[".Default\\DeviceFail"],
        Some("Windows XP Échec d'un matériel.wav"),
    ),
    event("Default", &[".Default\\.Default"], Some("Windows XP Ding.wav")),
    event(
        "Balloon",
        &[
            ".Default\\SystemNotification",
            ".Default\\Notification.Default",
            "Explorer\\SystemNotification",
        ],
        Some("Windows XP Infobulle.wav"),
    ),
    event(
        "Navigate",
        &["Explorer\\Navigating"],
        Some("Windows XP Menu Démarrer.wav"),
    ),
    event(
        "RecycleBin",
        &["Explorer\\EmptyRecycleBin"],
        Some("Windows XP Corbeille.wav"),
    ),
    event("UAC", &[".Default\\WindowsUAC"], None),
    event("BatteryLow", &[".Default\\LowBatteryAlarm"], None),
    event("BatteryCritical", &[".Default\\CriticalBatteryAlarm"], None),
    event("Email", &[".Default\\MailBeep"], None),
    event("Print", &[".Default\\PrintComplete"], None),
    event("AppOpen", &[".Default\\Open"], None),
    event("AppClose", &[".Default\\Close"], None),
    event("Minimize", &[".Default\\Minimize"], None),
    event("UnMinimize", &[".Default\\RestoreUp"], None),
    event("Maximize", &[".Default\\Maximize"], None),
    event("UnMaximize", &[".Default\\RestoreDown"], None),
    event("Menu", &[".Default\\MenuPopup"], None),
    event("MenuCommand", &[".Default\\MenuCommand"], None),
    event("Select", &[".Default\\CCSelect"], None),
];
