//! Raw source readers: pseudo-files, key/value descriptor files, external
//! diagnostic commands and performance-counter style tables.
//!
//! Every reader degrades to "no data" (empty string, empty map, empty list)
//! instead of failing, so callers treat absence as a normal outcome. Readers
//! hold no mutable state and may be shared freely between threads.

use ahash::AHashMap as HashMap;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, trace};

/// Counter table: instance label -> metric name -> raw value.
pub type CounterTable = HashMap<String, HashMap<String, i64>>;

/// Counter category exposing the `cpu*` lines of `/proc/stat`.
pub const PROC_STAT_COUNTERS: &str = "stat";

/// Column names of a `/proc/stat` `cpu` line, in kernel order.
pub const PROC_STAT_FIELDS: [&str; 8] = [
    "user", "nice", "system", "idle", "iowait", "irq", "softirq", "steal",
];

/// Uniform access to the raw data sources of a host.
pub trait SourceReader: Send + Sync {
    /// Whole content of a text resource; empty when unavailable.
    fn read_text(&self, path: &str) -> String;

    fn read_lines(&self, path: &str) -> Vec<String> {
        self.read_text(path).lines().map(str::to_string).collect()
    }

    /// Parses `key<delim>value` lines; the last occurrence of a key wins.
    fn read_key_value(&self, path: &str, delimiter: char) -> HashMap<String, String> {
        parse_key_value(&self.read_text(path), delimiter)
    }

    /// Runs an external command and returns its stdout lines.
    /// Non-zero exit status or a missing binary yields an empty list.
    fn run_command(&self, argv: &[&str]) -> Vec<String>;

    /// Performance-counter style query. Sources without such tables return
    /// an empty table.
    fn query_counters(&self, _category: &str) -> CounterTable {
        CounterTable::new()
    }

    fn exists(&self, path: &str) -> bool;

    /// Entry names of a directory, sorted; empty when unreadable.
    fn list_dir(&self, path: &str) -> Vec<String>;

    /// Target of a symbolic link.
    fn read_link(&self, path: &str) -> Option<String>;

    /// Up to `len` leading bytes of a file.
    fn read_prefix(&self, path: &str, len: usize) -> Vec<u8>;

    /// Name-service lookup for ids missing from `/etc/passwd`.
    fn lookup_user(&self, _uid: u32) -> Option<String> {
        None
    }

    /// Name-service lookup for ids missing from `/etc/group`.
    fn lookup_group(&self, _gid: u32) -> Option<String> {
        None
    }
}

/// Parses `key<delim>value` lines. Keys and values are trimmed.
pub fn parse_key_value(content: &str, delimiter: char) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for line in content.lines() {
        if let Some((key, value)) = line.split_once(delimiter) {
            map.insert(key.trim().to_string(), value.trim().to_string());
        }
    }
    map
}

/// Removes one leading and one trailing double quote, then trims.
pub fn strip_quotes(value: &str) -> String {
    let v = value.strip_prefix('"').unwrap_or(value);
    let v = v.strip_suffix('"').unwrap_or(v);
    v.trim().to_string()
}

pub fn parse_u64_or(value: &str, default: u64) -> u64 {
    value.trim().parse().unwrap_or(default)
}

pub fn parse_i64_or(value: &str, default: i64) -> i64 {
    value.trim().parse().unwrap_or(default)
}

/// Parses the `cpu*` lines of `/proc/stat` into a counter table.
/// Lines with fewer than the four mandatory columns are left out.
pub fn parse_proc_stat_counters(content: &str) -> CounterTable {
    let mut table = CounterTable::new();
    for line in content.lines().filter(|l| l.starts_with("cpu")) {
        let mut parts = line.split_whitespace();
        let Some(instance) = parts.next() else {
            continue;
        };
        let values: Vec<i64> = parts.map(|p| parse_i64_or(p, 0)).collect();
        if values.len() < 4 {
            trace!("short /proc/stat line: {}", line);
            continue;
        }
        let metrics = PROC_STAT_FIELDS
            .iter()
            .zip(values.iter())
            .map(|(name, v)| (name.to_string(), *v))
            .collect();
        table.insert(instance.to_string(), metrics);
    }
    table
}

/// Live filesystem source, optionally rebased under another root
/// (host `/proc` mounted inside a container, or a fixture tree).
#[derive(Debug, Clone)]
pub struct FsSource {
    root: Option<PathBuf>,
    allow_commands: bool,
}

impl Default for FsSource {
    fn default() -> Self {
        Self {
            root: None,
            allow_commands: true,
        }
    }
}

impl FsSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves every absolute path below `root`.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
            allow_commands: true,
        }
    }

    pub fn allow_commands(mut self, allow: bool) -> Self {
        self.allow_commands = allow;
        self
    }

    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    fn resolve(&self, path: &str) -> PathBuf {
        match &self.root {
            Some(root) => root.join(path.trim_start_matches('/')),
            None => PathBuf::from(path),
        }
    }
}

impl SourceReader for FsSource {
    fn read_text(&self, path: &str) -> String {
        match fs::read(self.resolve(path)) {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(e) => {
                debug!("Failed to read {}: {}", path, e);
                String::new()
            }
        }
    }

    fn run_command(&self, argv: &[&str]) -> Vec<String> {
        let Some((program, args)) = argv.split_first() else {
            return Vec::new();
        };
        if !self.allow_commands {
            trace!("External commands disabled, skipping {}", program);
            return Vec::new();
        }
        match Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output()
        {
            Ok(out) if out.status.success() => String::from_utf8_lossy(&out.stdout)
                .lines()
                .map(str::to_string)
                .collect(),
            Ok(out) => {
                debug!("{} exited with {}", argv.join(" "), out.status);
                Vec::new()
            }
            Err(e) => {
                debug!("Failed to run {}: {}", argv.join(" "), e);
                Vec::new()
            }
        }
    }

    fn query_counters(&self, category: &str) -> CounterTable {
        match category {
            PROC_STAT_COUNTERS => parse_proc_stat_counters(&self.read_text("/proc/stat")),
            _ => CounterTable::new(),
        }
    }

    fn exists(&self, path: &str) -> bool {
        self.resolve(path).exists()
    }

    fn list_dir(&self, path: &str) -> Vec<String> {
        let mut names: Vec<String> = match fs::read_dir(self.resolve(path)) {
            Ok(entries) => entries
                .flatten()
                .filter_map(|e| e.file_name().to_str().map(str::to_string))
                .collect(),
            Err(e) => {
                debug!("Failed to list {}: {}", path, e);
                return Vec::new();
            }
        };
        names.sort();
        names
    }

    fn read_link(&self, path: &str) -> Option<String> {
        fs::read_link(self.resolve(path))
            .ok()
            .map(|p| p.to_string_lossy().into_owned())
    }

    fn read_prefix(&self, path: &str, len: usize) -> Vec<u8> {
        let mut buf = Vec::with_capacity(len);
        if let Ok(file) = fs::File::open(self.resolve(path)) {
            if let Err(e) = file.take(len as u64).read_to_end(&mut buf) {
                debug!("Failed to read {}: {}", path, e);
                buf.clear();
            }
        }
        buf
    }

    fn lookup_user(&self, uid: u32) -> Option<String> {
        // Fixture trees must not leak the host's name service.
        if self.root.is_some() {
            return None;
        }
        system_user_name(uid)
    }

    fn lookup_group(&self, gid: u32) -> Option<String> {
        if self.root.is_some() {
            return None;
        }
        system_group_name(gid)
    }
}

#[cfg(unix)]
fn system_user_name(uid: u32) -> Option<String> {
    nix::unistd::User::from_uid(nix::unistd::Uid::from_raw(uid))
        .ok()
        .flatten()
        .map(|u| u.name)
}

#[cfg(unix)]
fn system_group_name(gid: u32) -> Option<String> {
    nix::unistd::Group::from_gid(nix::unistd::Gid::from_raw(gid))
        .ok()
        .flatten()
        .map(|g| g.name)
}

#[cfg(not(unix))]
fn system_user_name(_uid: u32) -> Option<String> {
    None
}

#[cfg(not(unix))]
fn system_group_name(_gid: u32) -> Option<String> {
    None
}

/// In-memory source for fixtures and replayed captures.
#[derive(Debug, Default, Clone)]
pub struct MemorySource {
    files: HashMap<String, Vec<u8>>,
    commands: HashMap<String, Vec<String>>,
    links: HashMap<String, String>,
    counters: HashMap<String, CounterTable>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, path: &str, content: impl AsRef<[u8]>) -> Self {
        self.files.insert(path.to_string(), content.as_ref().to_vec());
        self
    }

    pub fn with_command(mut self, argv: &[&str], output: &[&str]) -> Self {
        self.commands.insert(
            argv.join(" "),
            output.iter().map(|s| s.to_string()).collect(),
        );
        self
    }

    pub fn with_link(mut self, path: &str, target: &str) -> Self {
        self.links.insert(path.to_string(), target.to_string());
        self
    }

    pub fn with_counters(mut self, category: &str, table: CounterTable) -> Self {
        self.counters.insert(category.to_string(), table);
        self
    }

    fn keys(&self) -> impl Iterator<Item = &String> {
        self.files.keys().chain(self.links.keys())
    }
}

impl SourceReader for MemorySource {
    fn read_text(&self, path: &str) -> String {
        self.files
            .get(path)
            .map(|b| String::from_utf8_lossy(b).into_owned())
            .unwrap_or_default()
    }

    fn run_command(&self, argv: &[&str]) -> Vec<String> {
        self.commands
            .get(&argv.join(" "))
            .cloned()
            .unwrap_or_default()
    }

    fn query_counters(&self, category: &str) -> CounterTable {
        if let Some(table) = self.counters.get(category) {
            return table.clone();
        }
        match category {
            PROC_STAT_COUNTERS => parse_proc_stat_counters(&self.read_text("/proc/stat")),
            _ => CounterTable::new(),
        }
    }

    fn exists(&self, path: &str) -> bool {
        let prefix = format!("{}/", path.trim_end_matches('/'));
        self.keys().any(|k| k == path || k.starts_with(&prefix))
    }

    fn list_dir(&self, path: &str) -> Vec<String> {
        let prefix = format!("{}/", path.trim_end_matches('/'));
        let mut names: Vec<String> = self
            .keys()
            .filter_map(|k| k.strip_prefix(&prefix))
            .filter_map(|rest| rest.split('/').next())
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect();
        names.sort();
        names.dedup();
        names
    }

    fn read_link(&self, path: &str) -> Option<String> {
        self.links.get(path).cloned()
    }

    fn read_prefix(&self, path: &str, len: usize) -> Vec<u8> {
        self.files
            .get(path)
            .map(|b| b[..b.len().min(len)].to_vec())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_parse_key_value_last_wins() {
        let map = parse_key_value("Name:\tbash\nState:\tS (sleeping)\nName:\tzsh\n", ':');
        assert_eq!(map.get("Name").map(String::as_str), Some("zsh"));
        assert_eq!(map.get("State").map(String::as_str), Some("S (sleeping)"));
    }

    #[test]
    fn test_parse_key_value_ignores_lines_without_delimiter() {
        let map = parse_key_value("garbage\nkey=value\n", '=');
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_strip_quotes() {
        assert_eq!(strip_quotes("\"Ubuntu\""), "Ubuntu");
        assert_eq!(strip_quotes("Fedora"), "Fedora");
        assert_eq!(strip_quotes("\""), "");
        assert_eq!(strip_quotes(""), "");
    }

    #[test]
    fn test_parse_proc_stat_counters() {
        let table = parse_proc_stat_counters(
            "cpu  10 1 20 300 4 5 6 0 0 0\ncpu0 5 0 10 150 2 3 3 0\ncpu1 1 2\nintr 99\n",
        );
        assert_eq!(table.len(), 2);
        assert_eq!(table["cpu"]["system"], 20);
        assert_eq!(table["cpu0"]["softirq"], 3);
        assert!(!table.contains_key("cpu1"));
    }

    #[test]
    fn test_fs_source_missing_file_is_empty() {
        let dir = tempdir().expect("Failed to create temp dir");
        let source = FsSource::with_root(dir.path());
        assert_eq!(source.read_text("/proc/1/stat"), "");
        assert!(source.list_dir("/proc").is_empty());
        assert!(source.read_prefix("/bin/true", 5).is_empty());
    }

    #[test]
    fn test_fs_source_rebases_paths() {
        let dir = tempdir().expect("Failed to create temp dir");
        std::fs::create_dir_all(dir.path().join("etc")).expect("mkdir");
        std::fs::write(dir.path().join("etc/os-release"), "NAME=\"Test\"\n").expect("write");

        let source = FsSource::with_root(dir.path());
        assert!(source.exists("/etc/os-release"));
        assert_eq!(source.list_dir("/etc"), vec!["os-release".to_string()]);
        let kv = source.read_key_value("/etc/os-release", '=');
        assert_eq!(kv.get("NAME").map(String::as_str), Some("\"Test\""));
    }

    #[test]
    fn test_fs_source_commands_disabled() {
        let source = FsSource::new().allow_commands(false);
        assert!(source.run_command(&["uname", "-m"]).is_empty());
    }

    #[test]
    fn test_fs_source_failed_command_is_empty() {
        let source = FsSource::new();
        assert!(source
            .run_command(&["/nonexistent/herakles-command"])
            .is_empty());
    }

    #[test]
    fn test_memory_source_list_dir() {
        let source = MemorySource::new()
            .with_file("/proc/1/stat", "x")
            .with_file("/proc/1/status", "x")
            .with_file("/proc/42/stat", "x")
            .with_link("/proc/42/exe", "/usr/bin/foo");
        assert_eq!(source.list_dir("/proc"), vec!["1", "42"]);
        assert!(source.exists("/proc/42"));
        assert!(!source.exists("/proc/4"));
        assert_eq!(source.read_link("/proc/42/exe").as_deref(), Some("/usr/bin/foo"));
    }
}
