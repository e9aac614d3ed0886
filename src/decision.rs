use serde::{Deserialize, Serialize};

use crate::event::PERMISSION_REQUEST_EVENT;

/// Message used when the companion denies without giving a reason.
pub const DEFAULT_DENY_MESSAGE: &str = "Denied by user via Nook";

/// The three possible permission states.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Allow,
    Deny,
    #[default]
    Ask,
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Decision::Allow => write!(f, "allow"),
            Decision::Deny => write!(f, "deny"),
            Decision::Ask => write!(f, "ask"),
        }
    }
}

/// Reply sent by the companion app for a permission request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionReply {
    #[serde(default)]
    pub decision: Decision,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl DecisionReply {
    /// Parse a raw reply buffer.
    pub fn from_slice(bytes: &[u8]) -> crate::error::Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// What the hook caller should do with a permission request.
///
/// `Defer` covers both an explicit `ask` and no answer at all; the caller
/// cannot tell the two apart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Allow,
    Deny { message: String },
    Defer,
}

impl Verdict {
    pub fn from_reply(reply: Option<DecisionReply>) -> Self {
        let Some(reply) = reply else {
            return Verdict::Defer;
        };
        match reply.decision {
            Decision::Allow => Verdict::Allow,
            Decision::Deny => {
                let message = reply
                    .reason
                    .filter(|r| !r.is_empty())
                    .unwrap_or_else(|| DEFAULT_DENY_MESSAGE.to_string());
                Verdict::Deny { message }
            }
            Decision::Ask => Verdict::Defer,
        }
    }

    /// Hook output to print on stdout, or `None` to fall back to the
    /// assistant's own prompt.
    pub fn hook_output(&self) -> Option<HookOutput> {
        let behavior = match self {
            Verdict::Allow => PermissionBehavior::Allow,
            Verdict::Deny { message } => PermissionBehavior::Deny {
                message: message.clone(),
            },
            Verdict::Defer => return None,
        };
        Some(HookOutput {
            hook_specific_output: HookSpecificOutput {
                hook_event_name: PERMISSION_REQUEST_EVENT.to_string(),
                decision: behavior,
            },
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HookOutput {
    pub hook_specific_output: HookSpecificOutput,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HookSpecificOutput {
    pub hook_event_name: String,
    pub decision: PermissionBehavior,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "behavior", rename_all = "lowercase")]
pub enum PermissionBehavior {
    Allow,
    Deny { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verdict_for(json: &str) -> Verdict {
        Verdict::from_reply(Some(DecisionReply::from_slice(json.as_bytes()).unwrap()))
    }

    #[test]
    fn test_allow_has_no_message() {
        let verdict = verdict_for(r#"{"decision":"allow"}"#);
        assert_eq!(verdict, Verdict::Allow);

        let out = serde_json::to_value(verdict.hook_output().unwrap()).unwrap();
        assert_eq!(
            out,
            serde_json::json!({
                "hookSpecificOutput": {
                    "hookEventName": "PermissionRequest",
                    "decision": {"behavior": "allow"}
                }
            })
        );
    }

    #[test]
    fn test_deny_carries_reason() {
        let verdict = verdict_for(r#"{"decision":"deny","reason":"no"}"#);
        assert_eq!(
            verdict,
            Verdict::Deny {
                message: "no".into()
            }
        );

        let out = serde_json::to_value(verdict.hook_output().unwrap()).unwrap();
        assert_eq!(out["hookSpecificOutput"]["decision"]["behavior"], "deny");
        assert_eq!(out["hookSpecificOutput"]["decision"]["message"], "no");
    }

    #[test]
    fn test_deny_without_reason_uses_default_message() {
        let verdict = verdict_for(r#"{"decision":"deny","reason":""}"#);
        assert_eq!(
            verdict,
            Verdict::Deny {
                message: DEFAULT_DENY_MESSAGE.into()
            }
        );
    }

    #[test]
    fn test_missing_decision_defaults_to_ask() {
        let reply = DecisionReply::from_slice(b"{}").unwrap();
        assert_eq!(reply.decision, Decision::Ask);
        assert_eq!(Verdict::from_reply(Some(reply)), Verdict::Defer);
    }

    #[test]
    fn test_no_reply_is_same_as_ask() {
        assert_eq!(Verdict::from_reply(None), Verdict::Defer);
        assert_eq!(verdict_for(r#"{"decision":"ask"}"#), Verdict::Defer);
        assert!(Verdict::Defer.hook_output().is_none());
    }

    #[test]
    fn test_malformed_reply_is_error() {
        assert!(DecisionReply::from_slice(b"not json").is_err());
        assert!(DecisionReply::from_slice(br#"{"decision":"maybe"}"#).is_err());
    }
}
