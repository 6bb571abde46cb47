//! Process and port resolution shared by every channel.
//!
//! Each function issues its probing commands through the channel it is given,
//! so the same algorithm resolves host pids through a `LocalChannel` and
//! namespaced pids through an `NsExecChannel`.

use std::path::Path;

use tracing::{debug, info};

use crate::domain::{
    parse_pid_column, parse_ss_pids, pgrep_pipeline_args, ps_pipeline_args, ss_listen_args,
    CodeType, ExecContext, OsFamily, PlatformProfile, Response, OS_RELEASE_ID_AWK,
};
use crate::error::{Error, Result};
use crate::ports::Channel;

/// Check `names` in order and fail on the first unavailable one.
pub async fn is_all_commands_available<C: Channel>(
    channel: &C,
    ctx: &ExecContext,
    names: &[&str],
) -> std::result::Result<(), Response> {
    for name in names {
        if channel.is_command_available(ctx, name).await {
            continue;
        }
        debug!(request_id = %ctx.request_id(), command = name, "Command not available");
        let response = match CodeType::command_not_found(name) {
            Some(code) => Response::fail_with(code, &[]),
            None => Response::fail_with(CodeType::COMMAND_NOT_FOUND, &[name]),
        };
        return Err(response);
    }
    Ok(())
}

/// Resolve the pids listening on `port` with `ss`.
pub async fn pids_by_local_port<C: Channel>(
    channel: &C,
    ctx: &ExecContext,
    port: &str,
) -> Result<Vec<String>> {
    if !channel.is_command_available(ctx, "ss").await {
        return Err(Error::ToolNotFound {
            tool: "ss".to_string(),
            purpose: "get pid by port",
        });
    }

    let response = channel.run(ctx, "ss", &ss_listen_args(port)).await;
    if !response.success {
        return Err(Error::CommandFailed(response.err));
    }
    let Some(table) = response.result_str() else {
        return Ok(Vec::new());
    };

    info!(request_id = %ctx.request_id(), port = port, sockets = %table.trim(), "Sockets for port");
    let pids = parse_ss_pids(table);
    info!(request_id = %ctx.request_id(), port = port, pids = ?pids, "Resolved pids by local port");
    Ok(pids)
}

/// Resolve each port in turn and concatenate the pids in input order.
pub async fn pids_by_local_ports<C: Channel>(
    channel: &C,
    ctx: &ExecContext,
    ports: &[String],
) -> Result<Vec<String>> {
    if ports.is_empty() {
        return Err(Error::InvalidArgument(
            "the local port parameter is empty".to_string(),
        ));
    }

    let mut result = Vec::new();
    for port in ports {
        let pids = channel
            .pids_by_local_port(ctx, port)
            .await
            .map_err(|e| Error::PortLookup {
                port: port.clone(),
                source: Box::new(e),
            })?;
        info!(request_id = %ctx.request_id(), port = %port, pids = ?pids, "Got pids by port");
        result.extend(pids);
    }
    Ok(result)
}

/// Resolve pids whose command line contains `keyword` with a `ps | grep` pipeline.
pub async fn pids_by_process_name<C: Channel>(
    channel: &C,
    ctx: &ExecContext,
    keyword: &str,
    self_markers: &[String],
) -> Result<Vec<String>> {
    let keyword = keyword.trim();
    if keyword.is_empty() {
        return Err(Error::InvalidArgument("process keyword is blank".to_string()));
    }

    let ps_args = channel.ps_args(ctx).await;
    let args = ps_pipeline_args(&ps_args, keyword, ctx, self_markers);
    let response = channel.run(ctx, "ps", &args).await;
    if !response.success {
        return Err(Error::CommandFailed(response.err));
    }
    Ok(parse_pid_column(
        response.result_str().unwrap_or_default(),
        std::process::id(),
    ))
}

/// Resolve pids whose executable is `name` with a `pgrep | grep` pipeline.
pub async fn pids_by_process_cmd_name<C: Channel>(
    channel: &C,
    ctx: &ExecContext,
    name: &str,
    self_markers: &[String],
) -> Result<Vec<String>> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::InvalidArgument("processName is blank".to_string()));
    }

    let args = pgrep_pipeline_args(name, ctx, self_markers);
    let response = channel.run(ctx, "pgrep", &args).await;
    if !response.success {
        return Err(Error::CommandFailed(response.err));
    }
    Ok(parse_pid_column(
        response.result_str().unwrap_or_default(),
        std::process::id(),
    ))
}

/// Probe the dialect of the host `channel` runs on.
///
/// With `host_file` set, a missing `os_release` on this host short-circuits to
/// the standard dialect. `None` means the `awk` run failed; callers fall back
/// to the standard dialect for that call and must not remember it.
pub async fn probe_platform<C: Channel>(
    channel: &C,
    ctx: &ExecContext,
    os: OsFamily,
    os_release: &Path,
    host_file: bool,
) -> Option<PlatformProfile> {
    if os == OsFamily::Windows || (host_file && !os_release.exists()) {
        return Some(PlatformProfile::standard(os));
    }

    let args = format!("{} {}", OS_RELEASE_ID_AWK, os_release.display());
    let response = channel.run(ctx, "awk", &args).await;
    let profile = match response.result_str() {
        Some(id) if response.success => PlatformProfile::from_os_release_id(os, id),
        _ => {
            debug!(
                request_id = %ctx.request_id(),
                channel = channel.name(),
                err = %response.err,
                "Platform detection failed"
            );
            return None;
        }
    };
    debug!(
        request_id = %ctx.request_id(),
        channel = channel.name(),
        alpine = profile.alpine,
        "Detected platform profile"
    );
    Some(profile)
}

#[cfg(test)]
mod tests {
    use tokio_test::{assert_err, assert_ok};

    use super::*;
    use crate::adapters::MockChannel;

    const SS_HEADER: &str =
        "Netid State  Recv-Q Send-Q Local Address:Port Peer Address:Port";

    fn ss_table(line: &str) -> String {
        format!("{SS_HEADER}\n{line}\n")
    }

    #[tokio::test]
    async fn test_port_with_nothing_listening() {
        let channel = MockChannel::new().respond("ss -pln sport = :9999", Response::success(""));
        let pids = assert_ok!(pids_by_local_port(&channel, &ExecContext::new(), "9999").await);
        assert!(pids.is_empty());
    }

    #[tokio::test]
    async fn test_port_requires_ss() {
        let channel = MockChannel::new().missing_commands(["ss"]);
        let err = assert_err!(pids_by_local_port(&channel, &ExecContext::new(), "80").await);
        assert!(matches!(&err, Error::ToolNotFound { tool, .. } if tool == "ss"));
        assert_eq!(err.to_string(), "ss command not found, can't get pid by port");
        assert!(channel.invocations().is_empty());
    }

    #[tokio::test]
    async fn test_port_command_failure_is_error() {
        let channel = MockChannel::new().respond(
            "ss -pln sport = :80",
            Response::fail(CodeType::OS_CMD_EXEC_FAILED, "permission denied"),
        );
        let err = pids_by_local_port(&channel, &ExecContext::new(), "80")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "permission denied");
    }

    #[tokio::test]
    async fn test_ports_keep_input_order() {
        // Responses are registered 8080 first; results must still follow the input.
        let channel = MockChannel::new()
            .respond(
                "ss -pln sport = :8080",
                Response::success(ss_table(
                    r#"tcp LISTEN 0 128 *:8080 *:* users:(("java",pid=2002,fd=9))"#,
                )),
            )
            .respond(
                "ss -pln sport = :80",
                Response::success(ss_table(
                    r#"tcp LISTEN 0 128 *:80 *:* users:(("nginx",1001,fd=6))"#,
                )),
            );

        let ports = vec!["80".to_string(), "8080".to_string()];
        let pids = channel
            .pids_by_local_ports(&ExecContext::new(), &ports)
            .await
            .unwrap();
        assert_eq!(pids, vec!["1001", "2002"]);
        assert_eq!(
            channel.invocations(),
            vec!["ss -pln sport = :80", "ss -pln sport = :8080"]
        );
    }

    #[tokio::test]
    async fn test_ports_abort_on_first_error() {
        let channel = MockChannel::new()
            .respond(
                "ss -pln sport = :80",
                Response::fail(CodeType::OS_CMD_EXEC_FAILED, "boom"),
            )
            .respond(
                "ss -pln sport = :8080",
                Response::success(ss_table(
                    r#"tcp LISTEN 0 128 *:8080 *:* users:(("java",pid=2002,fd=9))"#,
                )),
            );

        let ports = vec!["80".to_string(), "8080".to_string()];
        let err = pids_by_local_ports(&channel, &ExecContext::new(), &ports)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "failed to get pid by 80, boom");
        assert_eq!(channel.invocations(), vec!["ss -pln sport = :80"]);
    }

    #[tokio::test]
    async fn test_ports_empty_input() {
        let channel = MockChannel::new();
        let err = pids_by_local_ports(&channel, &ExecContext::new(), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_all_commands_stops_at_first_missing() {
        let channel = MockChannel::new().missing_commands(["dd"]);
        let err = is_all_commands_available(&channel, &ExecContext::new(), &["rm", "dd", "iptables"])
            .await
            .unwrap_err();
        assert_eq!(err.code, CodeType::COMMAND_DD_NOT_FOUND.code);
        assert_eq!(channel.availability_checks(), vec!["rm", "dd"]);
    }

    #[tokio::test]
    async fn test_all_commands_available() {
        let channel = MockChannel::new();
        let ctx = ExecContext::new();
        assert!(is_all_commands_available(&channel, &ctx, &["rm", "dd"]).await.is_ok());
        assert!(is_all_commands_available(&channel, &ctx, &[]).await.is_ok());
    }

    #[tokio::test]
    async fn test_unknown_missing_command_still_fails() {
        let channel = MockChannel::new().missing_commands(["stress-ng"]);
        let err = is_all_commands_available(&channel, &ExecContext::new(), &["stress-ng"])
            .await
            .unwrap_err();
        assert_eq!(err.code, CodeType::COMMAND_NOT_FOUND.code);
        assert!(err.err.contains("stress-ng"));
    }

    #[tokio::test]
    async fn test_process_name_pipeline_drops_own_pid() {
        let own = std::process::id();
        let channel = MockChannel::new().respond_any(Response::success(format!("101 {own} 102 ")));
        let markers = vec!["chaos_killprocess".to_string()];

        let pids = pids_by_process_name(&channel, &ExecContext::new(), "java", &markers)
            .await
            .unwrap();
        assert_eq!(pids, vec!["101", "102"]);

        let invocations = channel.invocations();
        let ps = invocations.last().unwrap();
        assert!(ps.starts_with(r#"ps -eo user,pid,ppid,args | grep "java""#));
        assert!(ps.contains("grep -v -w chaos_killprocess"));
    }

    #[tokio::test]
    async fn test_process_name_pipeline_rejects_blank() {
        let channel = MockChannel::new();
        let err = pids_by_process_name(&channel, &ExecContext::new(), "  ", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
        assert!(channel.invocations().is_empty());
    }

    #[tokio::test]
    async fn test_process_name_pipeline_empty_result() {
        let channel = MockChannel::new().respond_any(Response::success("  "));
        let pids = pids_by_process_name(&channel, &ExecContext::new(), "nothing", &[])
            .await
            .unwrap();
        assert!(pids.is_empty());
    }

    #[tokio::test]
    async fn test_cmd_name_pipeline() {
        let channel = MockChannel::new().respond_any(Response::success("7 8"));
        let markers = vec!["chaos_stopprocess".to_string()];
        let ctx = ExecContext::new().with_exclude_process_list("java");

        let pids = pids_by_process_cmd_name(&channel, &ctx, "nginx", &markers)
            .await
            .unwrap();
        assert_eq!(pids, vec!["7", "8"]);
        assert_eq!(
            channel.invocations(),
            vec![r#"pgrep -l nginx | grep -v -w java | grep -v -w chaos_stopprocess | awk '{print $1}' | tr '\n' ' '"#]
        );
    }

    #[tokio::test]
    async fn test_probe_platform_alpine() {
        let os_release = tempfile::NamedTempFile::new().unwrap();
        let channel = MockChannel::new().respond_any(Response::success("alpine\n"));

        let profile = probe_platform(
            &channel,
            &ExecContext::new(),
            OsFamily::Linux,
            os_release.path(),
            true,
        )
        .await
        .unwrap();
        assert!(profile.alpine);
        assert_eq!(profile.ps_args(), "-o user,pid,ppid,args");
    }

    #[tokio::test]
    async fn test_probe_platform_missing_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let channel = MockChannel::new().respond_any(Response::success("alpine"));

        let profile = probe_platform(
            &channel,
            &ExecContext::new(),
            OsFamily::Linux,
            &dir.path().join("os-release"),
            true,
        )
        .await
        .unwrap();
        assert!(!profile.alpine);
        assert!(channel.invocations().is_empty());
    }

    #[tokio::test]
    async fn test_probe_platform_command_failure() {
        let channel = MockChannel::new()
            .respond_any(Response::fail(CodeType::OS_CMD_EXEC_FAILED, "no awk"));

        let profile = probe_platform(
            &channel,
            &ExecContext::new(),
            OsFamily::Linux,
            Path::new("/etc/os-release"),
            false,
        )
        .await;
        assert!(profile.is_none());
        assert_eq!(channel.invocations().len(), 1);
    }
}
