//! Operating system identity: distribution family, version, code name and
//! kernel build number.
//!
//! Release facts come from the first source in the cascade that yields a
//! family:
//! 1. `/etc/system-release`
//! 2. `/etc/os-release`
//! 3. `lsb_release -a`
//! 4. `/etc/lsb-release`
//! 5. any distribution-specific `/etc/*-release` file, then `/etc/issue`
//!
//! When nothing parses, the family is derived from the release file name.

pub mod sources;

use serde::Serialize;
use std::fmt;
use tracing::debug;

use crate::source::SourceReader;

pub use sources::{
    filename_to_family, parse_os_release_version, parse_release, release_filename, ReleaseInfo,
    UNKNOWN,
};

use sources::{
    exec_lsb_release, read_lsb_release, read_os_release, read_scanned_release,
    read_system_release, ReleaseCandidate,
};

/// Release sources in order of precedence.
const CANDIDATES: [(&str, ReleaseCandidate); 5] = [
    ("/etc/system-release", read_system_release),
    ("/etc/os-release", read_os_release),
    ("lsb_release -a", exec_lsb_release),
    ("/etc/lsb-release", read_lsb_release),
    ("release file scan", read_scanned_release),
];

const MANUFACTURER: &str = "GNU/Linux";

/// Resolved identity of the running operating system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OsIdentity {
    pub family: String,
    pub version_id: String,
    pub code_name: String,
    pub build_number: Option<String>,
    pub manufacturer: String,
    /// 32 or 64.
    pub bitness: u8,
    pub elevated: bool,
}

impl OsIdentity {
    /// Identity with every field at its sentinel.
    pub fn unknown() -> Self {
        Self {
            family: UNKNOWN.to_string(),
            version_id: UNKNOWN.to_string(),
            code_name: UNKNOWN.to_string(),
            build_number: None,
            manufacturer: UNKNOWN.to_string(),
            bitness: native_bitness(),
            elevated: false,
        }
    }
}

impl fmt::Display for OsIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.family, self.version_id)?;
        if self.code_name != UNKNOWN {
            write!(f, " ({})", self.code_name)?;
        }
        if let Some(build) = &self.build_number {
            write!(f, " build {}", build)?;
        }
        Ok(())
    }
}

/// Walks the release cascade. Never fails: the last resort is a family
/// derived from the release file name with unknown version and code name.
pub fn resolve_release(source: &dyn SourceReader) -> ReleaseInfo {
    let found = CANDIDATES.iter().find_map(|(name, candidate)| {
        let info = candidate(source)?;
        debug!("Release resolved from {}: {:?}", name, info);
        Some(info)
    });
    found.unwrap_or_else(|| {
        let filename = release_filename(source);
        let family = filename_to_family(&filename);
        debug!("No release source parsed, family {} from {}", family, filename);
        ReleaseInfo {
            family,
            version_id: UNKNOWN.to_string(),
            code_name: UNKNOWN.to_string(),
        }
    })
}

/// First token of `/proc/version` that is neither `Linux` nor `version`.
pub fn read_build_number(source: &dyn SourceReader) -> Option<String> {
    source
        .read_text("/proc/version")
        .split_whitespace()
        .find(|t| *t != "Linux" && *t != "version")
        .map(str::to_string)
}

/// Full identity: release cascade, kernel build, bitness and elevation.
pub fn resolve_os_identity(source: &dyn SourceReader) -> OsIdentity {
    let release = resolve_release(source);
    OsIdentity {
        family: release.family,
        version_id: release.version_id,
        code_name: release.code_name,
        build_number: read_build_number(source),
        manufacturer: MANUFACTURER.to_string(),
        bitness: detect_bitness(source),
        elevated: is_elevated(),
    }
}

fn native_bitness() -> u8 {
    if cfg!(target_pointer_width = "64") {
        64
    } else {
        32
    }
}

/// A 32-bit build can still run on a 64-bit kernel, so ask the kernel.
pub fn detect_bitness(source: &dyn SourceReader) -> u8 {
    if native_bitness() == 64 {
        return 64;
    }
    let machine = source.run_command(&["uname", "-m"]);
    if machine.first().is_some_and(|m| m.contains("64")) {
        64
    } else {
        32
    }
}

/// Effective root, or running under sudo.
pub fn is_elevated() -> bool {
    #[cfg(unix)]
    {
        if nix::unistd::geteuid().is_root() {
            return true;
        }
    }
    std::env::var_os("SUDO_COMMAND").is_some()
}
