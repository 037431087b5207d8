//! Service listing: running daemons are the children of init, stopped ones
//! come from the service manager's enabled units.

use ahash::AHashSet as HashSet;
use serde::Serialize;
use tracing::debug;

use crate::process::builder::ProcessTableBuilder;
use crate::process::record::{ProcessQuery, ProcessSort};
use crate::source::SourceReader;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServiceState {
    Running,
    Stopped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OsService {
    pub name: String,
    /// 0 when stopped.
    pub pid: u32,
    pub state: ServiceState,
}

/// Last dot-separated component, unless the name ends with the dot.
fn short_name(name: &str) -> &str {
    match name.rfind('.') {
        Some(idx) if idx + 1 < name.len() => &name[idx + 1..],
        _ => name,
    }
}

pub fn list_services(source: &dyn SourceReader, builder: &ProcessTableBuilder<'_>) -> Vec<OsService> {
    // Only name and pid are kept, so descriptor counts and ELF probes are skipped.
    let query = ProcessQuery {
        sort: ProcessSort::Pid,
        slow_fields: false,
        ..ProcessQuery::default()
    };
    let mut services: Vec<OsService> = builder
        .children(1, &query)
        .into_iter()
        .map(|p| OsService {
            name: p.name,
            pid: p.pid,
            state: ServiceState::Running,
        })
        .collect();
    let running: HashSet<String> = services.iter().map(|s| s.name.clone()).collect();
    let is_running = |name: &str| running.contains(name) || running.contains(short_name(name));

    let mut found_units = false;
    for line in source.run_command(&["systemctl", "list-unit-files"]) {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 2 || parts[1] != "enabled" {
            continue;
        }
        let Some(name) = parts[0].strip_suffix(".service") else {
            continue;
        };
        found_units = true;
        if !is_running(name) {
            services.push(OsService {
                name: name.to_string(),
                pid: 0,
                state: ServiceState::Stopped,
            });
        }
    }

    if !found_units {
        let confs = source.list_dir("/etc/init");
        if confs.is_empty() {
            debug!("No systemd units and no /etc/init directory");
        }
        for conf in confs {
            let Some(name) = conf.strip_suffix(".conf") else {
                continue;
            };
            if !is_running(name) {
                services.push(OsService {
                    name: name.to_string(),
                    pid: 0,
                    state: ServiceState::Stopped,
                });
            }
        }
    }
    services
}
