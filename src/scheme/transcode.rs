// src/scheme/transcode.rs

//! Host transcoding capability
//!
//! Converting arbitrary audio into the canonical format is a host capability,
//! not something this crate implements. Hosts that can transcode hand the
//! store a [`Transcoder`]; without one, non-canonical sources are a reported
//! capability error.

use std::path::Path;
use std::time::Duration;

use crate::Result;

pub trait Transcoder {
    /// Playback duration of an arbitrary supported audio file.
    fn probe_duration(&self, source: &Path) -> Result<Duration>;

    /// Convert `source` into a canonical WAVE file at `dest`.
    ///
    /// Implementations must not leave a partial `dest` behind on failure.
    fn transcode_to_wave(&self, source: &Path, dest: &Path) -> Result<()>;
}
