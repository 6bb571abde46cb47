//! Parsing of `ss -pln` socket tables.
//!
//! Two `ss` dialects are in the wild:
//!
//! ```text
//! # iproute2 >= 3.x (CentOS 7 class)
//! Netid State  Recv-Q Send-Q Local Address:Port Peer Address:Port
//! tcp   LISTEN 0      128    *:80               *:*    users:(("tengine",pid=237768,fd=6),("tengine",pid=237767,fd=6))
//!
//! # older iproute2 (CentOS 6 class), no `pid=` label
//! tcp   LISTEN 0      128    *:80               *:*    users:(("tengine",237768,fd=6),("tengine",237767,fd=6))
//! ```

use std::sync::LazyLock;

use regex::Regex;

static PID_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"pid=(\d+)|,(\d+),").expect("pid pattern is valid"));

/// Arguments for `ss` listing the listeners of `port`.
pub fn ss_listen_args(port: &str) -> String {
    format!("-pln sport = :{}", port)
}

/// Extract every pid from the `users:(...)` column of an `ss -pln` table.
///
/// The first line is the header. Parsing stops at the first socket line whose
/// last field carries no recognizable pid, returning what was collected so far.
pub fn parse_ss_pids(output: &str) -> Vec<String> {
    let mut pids = Vec::new();
    let table = output.trim();
    if table.is_empty() {
        return pids;
    }

    for line in table.split('\n').skip(1) {
        let Some(users) = line.split_whitespace().last() else {
            continue;
        };

        let mut matched = false;
        for caps in PID_PATTERN.captures_iter(users) {
            matched = true;
            let pid = caps
                .get(1)
                .or_else(|| caps.get(2))
                .map(|m| m.as_str().trim())
                .unwrap_or_default();
            if !pid.is_empty() {
                pids.push(pid.to_string());
            }
        }

        if !matched {
            return pids;
        }
    }

    pids
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str =
        "Netid State      Recv-Q Send-Q   Local Address:Port   Peer Address:Port";

    #[test]
    fn test_modern_dialect() {
        let output = format!(
            "{HEADER}\ntcp   LISTEN     0      128       *:80                 *:* users:((\"nginx\",pid=1234,fd=6))\n"
        );
        assert_eq!(parse_ss_pids(&output), vec!["1234"]);
    }

    #[test]
    fn test_legacy_dialect() {
        let output = format!(
            "{HEADER}\ntcp   LISTEN     0      128       *:80                 *:* users:((\"nginx\",5678,fd=6))"
        );
        assert_eq!(parse_ss_pids(&output), vec!["5678"]);
    }

    #[test]
    fn test_multiple_users_on_one_socket() {
        let output = format!(
            "{HEADER}\ntcp LISTEN 0 128 *:80 *:* users:((\"tengine\",pid=237768,fd=6),(\"tengine\",pid=237767,fd=6))"
        );
        assert_eq!(parse_ss_pids(&output), vec!["237768", "237767"]);
    }

    #[test]
    fn test_empty_output_means_nothing_listening() {
        assert!(parse_ss_pids("").is_empty());
        assert!(parse_ss_pids("  \n ").is_empty());
    }

    #[test]
    fn test_header_only() {
        assert!(parse_ss_pids(HEADER).is_empty());
    }

    #[test]
    fn test_stops_at_first_unrecognized_line() {
        let output = format!(
            "{HEADER}\n\
             tcp LISTEN 0 128 *:80 *:* users:((\"a\",pid=1,fd=3))\n\
             tcp LISTEN 0 128 *:80 *:*\n\
             tcp LISTEN 0 128 *:80 *:* users:((\"b\",pid=2,fd=3))"
        );
        assert_eq!(parse_ss_pids(&output), vec!["1"]);
    }

    #[test]
    fn test_ss_args() {
        assert_eq!(ss_listen_args("8080"), "-pln sport = :8080");
    }
}
