use std::ffi::CStr;
use std::os::fd::AsRawFd;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::Result;

/// The only event that waits for a decision from the companion app.
pub const PERMISSION_REQUEST_EVENT: &str = "PermissionRequest";

const TTY_LOOKUP_TIMEOUT: Duration = Duration::from_secs(2);

/// Session state forwarded to the companion app.
///
/// Accepts both the relay's own field names and the ones the assistant hands
/// a hook on stdin (`hook_event_name`, `tool_name`). The relay never
/// interprets the fields beyond `event`; keys it does not know are carried
/// through to the payload untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventRecord {
    #[serde(default = "unknown")]
    pub session_id: String,
    #[serde(default)]
    pub cwd: String,
    #[serde(default, alias = "hook_event_name")]
    pub event: String,
    #[serde(default, deserialize_with = "lenient_pid")]
    pub pid: Option<u32>,
    #[serde(default)]
    pub tty: Option<String>,
    #[serde(default = "unknown")]
    pub status: String,

    #[serde(default, alias = "tool_name", skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_input: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_use_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notification_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn unknown() -> String {
    "unknown".into()
}

/// A pid given as a number or a numeric string. Anything else is treated as
/// absent and later replaced by the parent pid.
fn lenient_pid<'de, D>(deserializer: D) -> std::result::Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let pid = match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    };
    Ok(pid)
}

impl EventRecord {
    /// Whether the sender has to block for the companion's decision.
    pub fn requires_decision(&self) -> bool {
        self.event == PERMISSION_REQUEST_EVENT
    }

    pub fn to_payload(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Fill `pid` and `tty` from the hook's parent process when the producer
    /// left them empty.
    pub async fn fill_process_info(&mut self) {
        let ppid = std::os::unix::process::parent_id();
        if self.pid.is_none() {
            self.pid = Some(ppid);
        }
        if self.tty.is_none() {
            self.tty = controlling_tty(self.pid.unwrap_or(ppid)).await;
        }
    }
}

/// Resolve the terminal device of `pid`, falling back to our own stdio.
pub async fn controlling_tty(pid: u32) -> Option<String> {
    if let Some(tty) = tty_from_ps(pid).await {
        return Some(tty);
    }
    ttyname(std::io::stdin().as_raw_fd()).or_else(|| ttyname(std::io::stdout().as_raw_fd()))
}

async fn tty_from_ps(pid: u32) -> Option<String> {
    let output = tokio::process::Command::new("ps")
        .args(["-p", &pid.to_string(), "-o", "tty="])
        .kill_on_drop(true)
        .output();
    let output = tokio::time::timeout(TTY_LOOKUP_TIMEOUT, output)
        .await
        .ok()?
        .ok()?;
    normalize_ps_tty(&String::from_utf8_lossy(&output.stdout))
}

/// `ps` prints `ttys001` or `pts/3`; detached processes show `??` or `-`.
fn normalize_ps_tty(raw: &str) -> Option<String> {
    let tty = raw.trim();
    if tty.is_empty() || tty == "??" || tty == "-" {
        return None;
    }
    if tty.starts_with("/dev/") {
        Some(tty.to_string())
    } else {
        Some(format!("/dev/{tty}"))
    }
}

fn ttyname(fd: i32) -> Option<String> {
    // SAFETY: ttyname returns either null or a pointer to a static,
    // NUL-terminated buffer that we copy out immediately.
    let ptr = unsafe { libc::ttyname(fd) };
    if ptr.is_null() {
        return None;
    }
    let name = unsafe { CStr::from_ptr(ptr) };
    Some(name.to_string_lossy().into_owned())
}
