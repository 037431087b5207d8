//! CPU affinity of a process, as reported by `taskset -p <pid>`.

use tracing::debug;

use crate::source::SourceReader;

/// Parses `pid 3283's current affinity mask: 3`: the last token is a hex
/// mask. Masks wider than 64 bits keep their low 64 bits; anything
/// unparsable is 0.
pub fn parse_affinity_mask(line: &str) -> i64 {
    let Some(token) = line.split_whitespace().last() else {
        return 0;
    };
    if !token.chars().all(|c| c.is_ascii_hexdigit()) {
        debug!("Unparsable affinity mask {:?}", token);
        return 0;
    }
    let low = &token[token.len().saturating_sub(16)..];
    u64::from_str_radix(low, 16).map_or(0, |mask| mask as i64)
}

/// Affinity bitmask of `pid`, 0 when `taskset` is unavailable or the
/// process is gone.
pub fn read_process_affinity_mask(source: &dyn SourceReader, pid: u32) -> i64 {
    let pid = pid.to_string();
    source
        .run_command(&["taskset", "-p", &pid])
        .first()
        .map_or(0, |line| parse_affinity_mask(line))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemorySource;

    #[test]
    fn test_parse_affinity_mask() {
        assert_eq!(parse_affinity_mask("pid 3283's current affinity mask: 3"), 3);
        assert_eq!(parse_affinity_mask("pid 9726's current affinity mask: f"), 15);
        assert_eq!(
            parse_affinity_mask("pid 1's current affinity mask: 1ffffffffffffffff"),
            -1
        );
        assert_eq!(parse_affinity_mask("taskset: failed to get pid 7's affinity: No such process"), 0);
        assert_eq!(parse_affinity_mask(""), 0);
    }

    #[test]
    fn test_read_process_affinity_mask() {
        let source = MemorySource::new()
            .with_command(&["taskset", "-p", "3283"], &["pid 3283's current affinity mask: 3"])
            .with_command(&["taskset", "-p", "42"], &["garbage output"]);
        assert_eq!(read_process_affinity_mask(&source, 3283), 3);
        assert_eq!(read_process_affinity_mask(&source, 42), 0);
        assert_eq!(read_process_affinity_mask(&source, 7), 0);
    }
}
