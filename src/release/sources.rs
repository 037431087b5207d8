//! Candidate sources for distribution family, version and code name.
//!
//! Each candidate is a plain function over a [`SourceReader`]; it returns
//! `None` when its source is absent or carries no family.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::source::{strip_quotes, SourceReader};

/// Sentinel for fields no source could provide.
pub const UNKNOWN: &str = "Unknown";

const RELEASE_DELIM: &str = " release ";
const VERSION_DELIM: &str = " VERSION ";

static PARENS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[()]").expect("valid regex"));
static RELEASE_FILE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[-_](release|version)$").expect("valid regex"));

/// Family, version and code name as found by one source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseInfo {
    pub family: String,
    pub version_id: String,
    pub code_name: String,
}

impl ReleaseInfo {
    fn new(family: impl Into<String>) -> Self {
        Self {
            family: family.into(),
            version_id: UNKNOWN.to_string(),
            code_name: UNKNOWN.to_string(),
        }
    }
}

pub type ReleaseCandidate = fn(&dyn SourceReader) -> Option<ReleaseInfo>;

/// Splits on `(` / `)` and drops trailing empty pieces.
fn split_parens(value: &str) -> Vec<&str> {
    let mut parts: Vec<&str> = PARENS.split(value).collect();
    while parts.last().is_some_and(|p| p.is_empty()) {
        parts.pop();
    }
    parts
}

fn non_empty_or_unknown(value: &str) -> String {
    let v = value.trim();
    if v.is_empty() {
        UNKNOWN.to_string()
    } else {
        v.to_string()
    }
}

/// Parses `Family<delim>version (codename)`.
pub fn parse_release(line: &str, delim: &str) -> ReleaseInfo {
    let mut split = line.split(delim);
    let mut info = ReleaseInfo::new(split.next().unwrap_or_default().trim());
    if let Some(rest) = split.next() {
        let parts = split_parens(rest);
        if let Some(version) = parts.first() {
            info.version_id = non_empty_or_unknown(version);
        }
        if let Some(code_name) = parts.get(1) {
            info.code_name = non_empty_or_unknown(code_name);
        }
    }
    info
}

/// Splits an os-release `VERSION` value into version id and code name.
/// Handles `17 (Beefy Miracle)` and `14.04.4 LTS, Trusty Tahr`.
pub fn parse_os_release_version(value: &str) -> (Option<String>, Option<String>) {
    let value = strip_quotes(value);
    let mut parts = split_parens(&value);
    if parts.len() <= 1 {
        parts = value.split(", ").collect();
    }
    let version = parts
        .first()
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string);
    let code_name = parts
        .get(1)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string);
    (version, code_name)
}

/// First line of `filename` in `Distrib release x.x (Codename)` or
/// `Distrib VERSION x.x (Codename)` form.
pub fn read_distrib_release(source: &dyn SourceReader, filename: &str) -> Option<ReleaseInfo> {
    if !source.exists(filename) {
        return None;
    }
    for line in source.read_lines(filename) {
        debug!("{}: {}", filename, line);
        if line.contains(RELEASE_DELIM) {
            return Some(parse_release(&line, RELEASE_DELIM));
        } else if line.contains(VERSION_DELIM) {
            return Some(parse_release(&line, VERSION_DELIM));
        }
    }
    None
}

pub fn read_system_release(source: &dyn SourceReader) -> Option<ReleaseInfo> {
    read_distrib_release(source, "/etc/system-release")
}

pub fn read_os_release(source: &dyn SourceReader) -> Option<ReleaseInfo> {
    let mut family: Option<String> = None;
    let mut version_id = UNKNOWN.to_string();
    let mut code_name = UNKNOWN.to_string();

    for line in source.read_lines("/etc/os-release") {
        if let Some(value) = line.strip_prefix("VERSION=") {
            debug!("os-release: {}", line);
            let (version, code) = parse_os_release_version(value);
            if let Some(v) = version {
                version_id = v;
            }
            if let Some(c) = code {
                code_name = c;
            }
        } else if let Some(value) = line.strip_prefix("NAME=") {
            if family.is_none() {
                debug!("os-release: {}", line);
                family = Some(strip_quotes(value));
            }
        } else if let Some(value) = line.strip_prefix("VERSION_ID=") {
            if version_id == UNKNOWN {
                debug!("os-release: {}", line);
                version_id = strip_quotes(value);
            }
        }
    }

    family.map(|family| ReleaseInfo {
        family,
        version_id,
        code_name,
    })
}

/// Shared fold for `lsb_release -a` output and `/etc/lsb-release`, which
/// carry the same four facts under different keys.
struct LsbKeys {
    description: &'static str,
    distributor: &'static str,
    release: &'static str,
    codename: &'static str,
}

const LSB_COMMAND_KEYS: LsbKeys = LsbKeys {
    description: "Description:",
    distributor: "Distributor ID:",
    release: "Release:",
    codename: "Codename:",
};

const LSB_FILE_KEYS: LsbKeys = LsbKeys {
    description: "DISTRIB_DESCRIPTION=",
    distributor: "DISTRIB_ID=",
    release: "DISTRIB_RELEASE=",
    codename: "DISTRIB_CODENAME=",
};

fn parse_lsb_lines(lines: &[String], keys: &LsbKeys) -> Option<ReleaseInfo> {
    let mut family: Option<String> = None;
    let mut version_id = UNKNOWN.to_string();
    let mut code_name = UNKNOWN.to_string();

    for line in lines {
        if let Some(value) = line.strip_prefix(keys.description) {
            let value = strip_quotes(value.trim());
            if value.contains(RELEASE_DELIM) {
                // Description wins over Distributor ID, which is often
                // the name with spaces removed.
                let parsed = parse_release(&value, RELEASE_DELIM);
                family = Some(parsed.family);
                if version_id == UNKNOWN {
                    version_id = parsed.version_id;
                }
                if code_name == UNKNOWN {
                    code_name = parsed.code_name;
                }
            }
        } else if let Some(value) = line.strip_prefix(keys.distributor) {
            if family.is_none() {
                family = Some(strip_quotes(value.trim()));
            }
        } else if let Some(value) = line.strip_prefix(keys.release) {
            if version_id == UNKNOWN {
                version_id = strip_quotes(value.trim());
            }
        } else if let Some(value) = line.strip_prefix(keys.codename) {
            if code_name == UNKNOWN {
                code_name = strip_quotes(value.trim());
            }
        }
    }

    family.map(|family| ReleaseInfo {
        family,
        version_id,
        code_name,
    })
}

pub fn exec_lsb_release(source: &dyn SourceReader) -> Option<ReleaseInfo> {
    let lines = source.run_command(&["lsb_release", "-a"]);
    let info = parse_lsb_lines(&lines, &LSB_COMMAND_KEYS);
    if info.is_some() {
        debug!("lsb_release -a: {:?}", info);
    }
    info
}

pub fn read_lsb_release(source: &dyn SourceReader) -> Option<ReleaseInfo> {
    let info = parse_lsb_lines(&source.read_lines("/etc/lsb-release"), &LSB_FILE_KEYS);
    if info.is_some() {
        debug!("lsb-release: {:?}", info);
    }
    info
}

/// Any `/etc/*-release`, `*-version`, `*_release` or `*_version` file other
/// than the well-known ones, then `/etc/release`, then `/etc/issue`.
pub fn release_filename(source: &dyn SourceReader) -> String {
    let well_known = ["os-release", "lsb-release", "system-release"];
    let found = source.list_dir("/etc").into_iter().find(|name| {
        RELEASE_FILE.is_match(name) && !well_known.iter().any(|w| name.ends_with(w))
    });
    match found {
        Some(name) => format!("/etc/{}", name),
        None if source.exists("/etc/release") => "/etc/release".to_string(),
        None => "/etc/issue".to_string(),
    }
}

pub fn read_scanned_release(source: &dyn SourceReader) -> Option<ReleaseInfo> {
    let filename = release_filename(source);
    read_distrib_release(source, &filename).or_else(|| {
        if filename == "/etc/issue" {
            None
        } else {
            read_distrib_release(source, "/etc/issue")
        }
    })
}

/// Derives a family name from a release file name when no file parsed.
pub fn filename_to_family(filename: &str) -> String {
    let token = filename
        .replace("/etc/", "")
        .replace("release", "")
        .replace("version", "")
        .replace('-', "")
        .replace('_', "");

    let known = match token.to_lowercase().as_str() {
        "" => Some("Solaris"),
        "blackcat" => Some("Black Cat"),
        "bluewhite64" => Some("BlueWhite64"),
        "esmith" => Some("SME Server"),
        "eos" => Some("FreeEOS"),
        "hlfs" => Some("HLFS"),
        "lfs" => Some("Linux-From-Scratch"),
        "linuxppc" => Some("Linux-PPC"),
        "meego" => Some("MeeGo"),
        "mandakelinux" => Some("Mandrake"),
        "mklinux" => Some("MkLinux"),
        "nld" => Some("Novell Linux Desktop"),
        "novell" | "suse" => Some("SUSE Linux"),
        "pld" => Some("PLD"),
        "redhat" => Some("Red Hat Linux"),
        "sles" => Some("SUSE Linux ES9"),
        "sun" => Some("Sun JDS"),
        "synoinfo" => Some("Synology"),
        "tinysofa" => Some("Tiny Sofa"),
        "turbolinux" => Some("TurboLinux"),
        "ultrapenguin" => Some("UltraPenguin"),
        "va" => Some("VA-Linux"),
        "vmware" => Some("VMWareESX"),
        "yellowdog" => Some("Yellow Dog"),
        "issue" => Some(UNKNOWN),
        _ => None,
    };
    match known {
        Some(name) => name.to_string(),
        None => {
            let mut chars = token.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => UNKNOWN.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemorySource;

    #[test]
    fn test_parse_release_with_codename() {
        let info = parse_release("Fedora release 17 (Beefy Miracle)", RELEASE_DELIM);
        assert_eq!(info.family, "Fedora");
        assert_eq!(info.version_id, "17");
        assert_eq!(info.code_name, "Beefy Miracle");
    }

    #[test]
    fn test_parse_release_without_version() {
        let info = parse_release("Mystery OS", RELEASE_DELIM);
        assert_eq!(info.family, "Mystery OS");
        assert_eq!(info.version_id, UNKNOWN);
        assert_eq!(info.code_name, UNKNOWN);
    }

    #[test]
    fn test_parse_os_release_version_parentheses() {
        let (v, c) = parse_os_release_version("\"17 (Beefy Miracle)\"");
        assert_eq!(v.as_deref(), Some("17"));
        assert_eq!(c.as_deref(), Some("Beefy Miracle"));
    }

    #[test]
    fn test_parse_os_release_version_comma() {
        let (v, c) = parse_os_release_version("\"14.04.4 LTS, Trusty Tahr\"");
        assert_eq!(v.as_deref(), Some("14.04.4 LTS"));
        assert_eq!(c.as_deref(), Some("Trusty Tahr"));
    }

    #[test]
    fn test_parse_os_release_version_plain() {
        let (v, c) = parse_os_release_version("12");
        assert_eq!(v.as_deref(), Some("12"));
        assert!(c.is_none());
        assert_eq!(parse_os_release_version(""), (None, None));
    }

    #[test]
    fn test_os_release_version_id_fallback() {
        let source = MemorySource::new().with_file(
            "/etc/os-release",
            "NAME=\"Alpine Linux\"\nID=alpine\nVERSION_ID=3.19.1\n",
        );
        let info = read_os_release(&source).expect("os-release parsed");
        assert_eq!(info.family, "Alpine Linux");
        assert_eq!(info.version_id, "3.19.1");
        assert_eq!(info.code_name, UNKNOWN);
    }

    #[test]
    fn test_os_release_without_name_is_none() {
        let source = MemorySource::new().with_file("/etc/os-release", "VERSION_ID=1\n");
        assert!(read_os_release(&source).is_none());
    }

    #[test]
    fn test_lsb_release_command() {
        let source = MemorySource::new().with_command(
            &["lsb_release", "-a"],
            &[
                "Distributor ID:\tUbuntu",
                "Description:\tUbuntu 22.04.3 LTS",
                "Release:\t22.04",
                "Codename:\tjammy",
            ],
        );
        let info = exec_lsb_release(&source).expect("lsb_release parsed");
        assert_eq!(info.family, "Ubuntu");
        assert_eq!(info.version_id, "22.04");
        assert_eq!(info.code_name, "jammy");
    }

    #[test]
    fn test_lsb_release_description_wins() {
        let source = MemorySource::new().with_command(
            &["lsb_release", "-a"],
            &[
                "Distributor ID:\tRedHatEnterpriseServer",
                "Description:\tRed Hat Enterprise Linux Server release 6.5 (Santiago)",
                "Release:\t6.5",
            ],
        );
        let info = exec_lsb_release(&source).expect("lsb_release parsed");
        assert_eq!(info.family, "Red Hat Enterprise Linux Server");
        assert_eq!(info.version_id, "6.5");
        assert_eq!(info.code_name, "Santiago");
    }

    #[test]
    fn test_lsb_release_file() {
        let source = MemorySource::new().with_file(
            "/etc/lsb-release",
            "DISTRIB_ID=LinuxMint\nDISTRIB_RELEASE=21\nDISTRIB_CODENAME=vanessa\nDISTRIB_DESCRIPTION=\"Linux Mint 21 Vanessa\"\n",
        );
        let info = read_lsb_release(&source).expect("lsb-release parsed");
        assert_eq!(info.family, "LinuxMint");
        assert_eq!(info.version_id, "21");
        assert_eq!(info.code_name, "vanessa");
    }

    #[test]
    fn test_release_filename_scan() {
        let source = MemorySource::new()
            .with_file("/etc/os-release", "")
            .with_file("/etc/gentoo-release", "Gentoo Base System release 2.14\n")
            .with_file("/etc/issue", "");
        assert_eq!(release_filename(&source), "/etc/gentoo-release");
        let info = read_scanned_release(&source).expect("scanned");
        assert_eq!(info.family, "Gentoo Base System");
        assert_eq!(info.version_id, "2.14");
    }

    #[test]
    fn test_release_filename_fallbacks() {
        let solaris = MemorySource::new().with_file("/etc/release", "Oracle Solaris 11.4\n");
        assert_eq!(release_filename(&solaris), "/etc/release");
        let bare = MemorySource::new();
        assert_eq!(release_filename(&bare), "/etc/issue");
    }

    #[test]
    fn test_filename_to_family() {
        assert_eq!(filename_to_family("/etc/redhat-release"), "Red Hat Linux");
        assert_eq!(filename_to_family("/etc/SuSE-release"), "SUSE Linux");
        assert_eq!(filename_to_family("/etc/yellowdog-release"), "Yellow Dog");
        assert_eq!(filename_to_family("/etc/release"), "Solaris");
        assert_eq!(filename_to_family("/etc/issue"), UNKNOWN);
        assert_eq!(filename_to_family("/etc/arch-release"), "Arch");
        assert_eq!(filename_to_family("/etc/e-smith-release"), "SME Server");
    }
}
