//! Response envelope and the result code catalog.
//!
//! Every channel operation reports its outcome as a [`Response`]. The same shape
//! is used on the wire when a command is itself a nested invocation of the tool,
//! so captured output can be decoded back into an envelope.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Highest wire schema version this crate understands.
pub const WIRE_VERSION: u32 = 1;

// ============================================================================
// CodeType
// ============================================================================

/// A result code with its message template.
///
/// Templates use `%s` / `%v` placeholders that are filled positionally by
/// [`CodeType::render`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CodeType {
    pub code: i32,
    pub msg: &'static str,
}

impl CodeType {
    pub const IGNORE_CODE: CodeType = CodeType::new(100, "ignore code");
    pub const OK: CodeType = CodeType::new(200, "success");
    pub const RETURN_OK_DIRECTLY: CodeType = CodeType::new(201, "return ok directly");

    pub const COMMAND_ILLEGAL: CodeType = CodeType::new(49000, "illegal command, err: %v");
    pub const COMMAND_NETWORK_EXIST: CodeType = CodeType::new(
        49001,
        "network tc exec failed! RTNETLINK answers: File exists",
    );
    pub const BINARY_FILE_NOT_FOUND: CodeType =
        CodeType::new(51000, "`%s`: chaosblade file not found");

    pub const COMMAND_TASKSET_NOT_FOUND: CodeType =
        CodeType::new(52000, "`taskset`: command not found");
    pub const COMMAND_MOUNT_NOT_FOUND: CodeType =
        CodeType::new(52001, "`mount`: command not found");
    pub const COMMAND_UMOUNT_NOT_FOUND: CodeType =
        CodeType::new(52002, "`umount`: command not found");
    pub const COMMAND_TC_NOT_FOUND: CodeType = CodeType::new(52003, "`tc`: command not found");
    pub const COMMAND_IPTABLES_NOT_FOUND: CodeType =
        CodeType::new(52004, "`iptables`: command not found");
    pub const COMMAND_SED_NOT_FOUND: CodeType = CodeType::new(52005, "`sed`: command not found");
    pub const COMMAND_CAT_NOT_FOUND: CodeType = CodeType::new(52006, "`cat`: command not found");
    pub const COMMAND_SS_NOT_FOUND: CodeType = CodeType::new(52007, "`ss`: command not found");
    pub const COMMAND_DD_NOT_FOUND: CodeType = CodeType::new(52008, "`dd`: command not found");
    pub const COMMAND_RM_NOT_FOUND: CodeType = CodeType::new(52009, "`rm`: command not found");
    pub const COMMAND_TOUCH_NOT_FOUND: CodeType =
        CodeType::new(52010, "`touch`: command not found");
    pub const COMMAND_MKDIR_NOT_FOUND: CodeType =
        CodeType::new(52011, "`mkdir`: command not found");
    pub const COMMAND_ECHO_NOT_FOUND: CodeType =
        CodeType::new(52012, "`echo`: command not found");
    pub const COMMAND_KILL_NOT_FOUND: CodeType =
        CodeType::new(52013, "`kill`: command not found");
    pub const COMMAND_MV_NOT_FOUND: CodeType = CodeType::new(52014, "`mv`: command not found");
    pub const COMMAND_HEAD_NOT_FOUND: CodeType =
        CodeType::new(52015, "`head`: command not found");
    pub const COMMAND_GREP_NOT_FOUND: CodeType =
        CodeType::new(52016, "`grep`: command not found");
    pub const COMMAND_AWK_NOT_FOUND: CodeType = CodeType::new(52017, "`awk`: command not found");
    pub const COMMAND_TAR_NOT_FOUND: CodeType = CodeType::new(52018, "`tar`: command not found");
    pub const COMMAND_SYSTEMCTL_NOT_FOUND: CodeType =
        CodeType::new(52019, "`systemctl`: command not found");
    pub const COMMAND_NOHUP_NOT_FOUND: CodeType =
        CodeType::new(52020, "`nohup`: command not found");
    /// Any command outside the table above.
    pub const COMMAND_NOT_FOUND: CodeType = CodeType::new(52099, "`%s`: command not found");

    pub const RESULT_UNMARSHAL_FAILED: CodeType =
        CodeType::new(60000, "`%s`: exec result unmarshal failed, err: %v");
    pub const RESULT_MARSHAL_FAILED: CodeType =
        CodeType::new(60001, "`%v`: exec result marshal failed, err: %v");

    pub const PROCESS_ID_BY_NAME_FAILED: CodeType =
        CodeType::new(63010, "`%s`: get process id by name failed, err: %v");
    pub const PROCESS_NOT_EXIST: CodeType = CodeType::new(63012, "`%s`: the process not exist");
    pub const PROCESS_GET_USERNAME_FAILED: CodeType =
        CodeType::new(63014, "`%s`: get username failed by the process id, err: %v");
    pub const OS_CMD_EXEC_FAILED: CodeType =
        CodeType::new(63063, "`%s`: cmd exec failed, err: %v");

    const fn new(code: i32, msg: &'static str) -> Self {
        Self { code, msg }
    }

    /// Fill the message template with `flags`, in order.
    ///
    /// Placeholders without a matching flag are left as-is.
    pub fn render(&self, flags: &[&dyn fmt::Display]) -> String {
        let mut out = String::with_capacity(self.msg.len());
        let mut flags = flags.iter();
        let mut rest = self.msg;

        while let Some(idx) = rest.find('%') {
            let (head, tail) = rest.split_at(idx);
            out.push_str(head);
            let is_placeholder = tail.starts_with("%s") || tail.starts_with("%v");
            match (is_placeholder, flags.next()) {
                (true, Some(flag)) => {
                    out.push_str(&flag.to_string());
                    rest = &tail[2..];
                }
                _ => {
                    out.push('%');
                    rest = &tail[1..];
                }
            }
        }
        out.push_str(rest);
        out
    }

    /// Look up the dedicated "command not found" code for a utility.
    ///
    /// Returns `None` for utilities without an entry in the catalog.
    pub fn command_not_found(command: &str) -> Option<CodeType> {
        let code = match command {
            "taskset" => Self::COMMAND_TASKSET_NOT_FOUND,
            "mount" => Self::COMMAND_MOUNT_NOT_FOUND,
            "umount" => Self::COMMAND_UMOUNT_NOT_FOUND,
            "tc" => Self::COMMAND_TC_NOT_FOUND,
            "iptables" => Self::COMMAND_IPTABLES_NOT_FOUND,
            "sed" => Self::COMMAND_SED_NOT_FOUND,
            "cat" => Self::COMMAND_CAT_NOT_FOUND,
            "ss" => Self::COMMAND_SS_NOT_FOUND,
            "dd" => Self::COMMAND_DD_NOT_FOUND,
            "rm" => Self::COMMAND_RM_NOT_FOUND,
            "touch" => Self::COMMAND_TOUCH_NOT_FOUND,
            "mkdir" => Self::COMMAND_MKDIR_NOT_FOUND,
            "echo" => Self::COMMAND_ECHO_NOT_FOUND,
            "kill" => Self::COMMAND_KILL_NOT_FOUND,
            "mv" => Self::COMMAND_MV_NOT_FOUND,
            "head" => Self::COMMAND_HEAD_NOT_FOUND,
            "grep" => Self::COMMAND_GREP_NOT_FOUND,
            "awk" => Self::COMMAND_AWK_NOT_FOUND,
            "tar" => Self::COMMAND_TAR_NOT_FOUND,
            "systemctl" => Self::COMMAND_SYSTEMCTL_NOT_FOUND,
            "nohup" => Self::COMMAND_NOHUP_NOT_FOUND,
            _ => return None,
        };
        Some(code)
    }
}

// ============================================================================
// Response
// ============================================================================

/// The uniform result of every channel operation.
///
/// `success == true` implies `code == CodeType::OK.code` and an empty `err` for
/// every envelope built by this crate. Envelopes decoded from a nested
/// invocation are taken as reported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub code: i32,
    pub success: bool,
    #[serde(rename = "error", default, skip_serializing_if = "String::is_empty")]
    pub err: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
}

impl Response {
    /// Successful envelope carrying `result`.
    pub fn success(result: impl Into<Value>) -> Self {
        Self {
            code: CodeType::OK.code,
            success: true,
            err: String::new(),
            result: Some(result.into()),
        }
    }

    /// Successful envelope without a result.
    pub fn success_empty() -> Self {
        Self {
            code: CodeType::OK.code,
            success: true,
            err: String::new(),
            result: None,
        }
    }

    /// Envelope flagged with the ignore code; neither success nor failure.
    pub fn ignore_code(result: impl Into<Value>) -> Self {
        Self {
            code: CodeType::IGNORE_CODE.code,
            success: false,
            err: String::new(),
            result: Some(result.into()),
        }
    }

    /// Failure for `code` using its raw message template as the error.
    ///
    /// With `success` set the envelope is a plain success and `code` is
    /// ignored, so a successful envelope always carries the OK code.
    pub fn from_code(code: CodeType, success: bool) -> Self {
        if success {
            return Self::success_empty();
        }
        Self::fail(code, code.msg)
    }

    pub fn fail(code: CodeType, err: impl Into<String>) -> Self {
        Self::fail_status(code.code, err, None)
    }

    /// Failure with the code's template rendered from `flags`.
    pub fn fail_with(code: CodeType, flags: &[&dyn fmt::Display]) -> Self {
        Self::fail(code, code.render(flags))
    }

    /// Failure that also carries a diagnostic result (e.g. partial output).
    pub fn fail_with_result(
        code: CodeType,
        result: impl Into<Value>,
        flags: &[&dyn fmt::Display],
    ) -> Self {
        Self::fail_status(code.code, code.render(flags), Some(result.into()))
    }

    pub fn fail_status(status: i32, err: impl Into<String>, result: Option<Value>) -> Self {
        Self {
            code: status,
            success: false,
            err: err.into(),
            result,
        }
    }

    /// The result as text, if it is a JSON string.
    pub fn result_str(&self) -> Option<&str> {
        self.result.as_ref().and_then(Value::as_str)
    }

    /// Compact JSON form.
    pub fn print(&self) -> String {
        match serde_json::to_string(self) {
            Ok(json) => json,
            Err(e) => format!("marshall response err, {}; code: {}", e, self.code),
        }
    }

    /// Tab-indented JSON form followed by a newline.
    pub fn to_pretty_string(&self) -> String {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"\t");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        if let Err(e) = self.serialize(&mut ser) {
            return e.to_string();
        }
        let mut out = String::from_utf8_lossy(&buf).into_owned();
        out.push('\n');
        out
    }

    /// Decode captured output into an envelope.
    ///
    /// Falls back to `default`, or to a `RESULT_UNMARSHAL_FAILED` failure carrying
    /// the text and the decode error when no default is given.
    pub fn decode(content: &str, default: Option<Response>) -> Response {
        match decode_envelope(content) {
            Decoded::Structured(resp) => resp,
            Decoded::Raw { text, reason } => {
                let fallback = default.unwrap_or_else(|| {
                    Response::fail_with(CodeType::RESULT_UNMARSHAL_FAILED, &[&text, &reason])
                });
                tracing::debug!(
                    content = %text,
                    reason = %reason,
                    fallback = %fallback,
                    "Decode failed, returning default value"
                );
                fallback
            }
        }
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.print())
    }
}

impl std::error::Error for Response {}

// ============================================================================
// Decode
// ============================================================================

/// Outcome of decoding captured text.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    /// The text was a well-formed envelope.
    Structured(Response),
    /// The text is not an envelope; `reason` says why.
    Raw { text: String, reason: String },
}

#[derive(Deserialize)]
struct WireEnvelope {
    #[serde(default)]
    version: Option<u32>,
    code: i32,
    success: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    result: Option<Value>,
}

/// Try to read `content` as a wire envelope.
pub fn decode_envelope(content: &str) -> Decoded {
    let text = content.trim();
    let wire: WireEnvelope = match serde_json::from_str(text) {
        Ok(wire) => wire,
        Err(e) => {
            return Decoded::Raw {
                text: text.to_string(),
                reason: e.to_string(),
            }
        }
    };

    if let Some(version) = wire.version.filter(|v| *v > WIRE_VERSION) {
        return Decoded::Raw {
            text: text.to_string(),
            reason: format!(
                "unsupported wire version {}, expected at most {}",
                version, WIRE_VERSION
            ),
        };
    }

    Decoded::Structured(Response {
        code: wire.code,
        success: wire.success,
        err: wire.error.unwrap_or_default(),
        result: wire.result,
    })
}
