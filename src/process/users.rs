//! uid/gid to name resolution, cached for the duration of one enumeration.

use ahash::AHashMap as HashMap;

use crate::source::SourceReader;

/// Parses `name:passwd:id:...` databases (`/etc/passwd`, `/etc/group`).
fn parse_id_database(lines: &[String]) -> HashMap<u32, String> {
    let mut map = HashMap::new();
    for line in lines {
        let mut parts = line.split(':');
        let (Some(name), Some(_), Some(id)) = (parts.next(), parts.next(), parts.next()) else {
            continue;
        };
        if let Ok(id) = id.trim().parse::<u32>() {
            // First entry wins, as with getpwuid.
            map.entry(id).or_insert_with(|| name.to_string());
        }
    }
    map
}

/// Name cache seeded from the local databases; misses fall through to the
/// source's name service and finally to the numeric id.
pub struct UserGroupInfo {
    users: HashMap<u32, String>,
    groups: HashMap<u32, String>,
}

impl UserGroupInfo {
    pub fn load(source: &dyn SourceReader) -> Self {
        Self {
            users: parse_id_database(&source.read_lines("/etc/passwd")),
            groups: parse_id_database(&source.read_lines("/etc/group")),
        }
    }

    pub fn user_name(&mut self, source: &dyn SourceReader, uid: u32) -> String {
        self.users
            .entry(uid)
            .or_insert_with(|| source.lookup_user(uid).unwrap_or_else(|| uid.to_string()))
            .clone()
    }

    pub fn group_name(&mut self, source: &dyn SourceReader, gid: u32) -> String {
        self.groups
            .entry(gid)
            .or_insert_with(|| source.lookup_group(gid).unwrap_or_else(|| gid.to_string()))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemorySource;

    #[test]
    fn test_resolves_from_databases() {
        let source = MemorySource::new()
            .with_file(
                "/etc/passwd",
                "root:x:0:0:root:/root:/bin/bash\nalice:x:1000:1000::/home/alice:/bin/sh\n# broken\n",
            )
            .with_file("/etc/group", "root:x:0:\nstaff:x:50:alice\n");
        let mut info = UserGroupInfo::load(&source);
        assert_eq!(info.user_name(&source, 0), "root");
        assert_eq!(info.user_name(&source, 1000), "alice");
        assert_eq!(info.group_name(&source, 50), "staff");
    }

    #[test]
    fn test_unknown_ids_fall_back_to_number() {
        let source = MemorySource::new();
        let mut info = UserGroupInfo::load(&source);
        assert_eq!(info.user_name(&source, 4242), "4242");
        assert_eq!(info.group_name(&source, 77), "77");
    }
}
