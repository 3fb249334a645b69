// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent socket message types.
//!
//! Frames are JSON objects tagged by `action`. Inbound parsing goes through
//! `serde_json::Value` first so a frame with no action, an unknown action and
//! a known action with bad fields each get a distinct error.

use serde::{Deserialize, Serialize};

use crate::directive::ReportedStatus;
use crate::error::{ErrorCode, ProtocolError};
use crate::registry::AgentStatus;

// ---------------------------------------------------------------------------
// Agent -> Coordinator
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum AgentMessage {
    Register {
        #[serde(default)]
        metadata: RegisterMetadata,
    },
    DirectiveResponse {
        directive_id: String,
        status: ReportedStatus,
    },
    UpdateStatus {
        status: AgentStatus,
    },
    Ping {},
    Heartbeat {},
}

/// Metadata carried by `register`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegisterMetadata {
    #[serde(default, alias = "token_stake")]
    pub stake: Option<u64>,
    #[serde(default)]
    pub capabilities: Vec<String>,
    /// Requested id when the socket path does not carry one.
    #[serde(default)]
    pub agent_id: Option<String>,
}

const AGENT_ACTIONS: &[&str] =
    &["register", "directive_response", "update_status", "ping", "heartbeat"];

impl AgentMessage {
    pub fn action(&self) -> &'static str {
        match self {
            Self::Register { .. } => "register",
            Self::DirectiveResponse { .. } => "directive_response",
            Self::UpdateStatus { .. } => "update_status",
            Self::Ping {} => "ping",
            Self::Heartbeat {} => "heartbeat",
        }
    }

    /// Whether this is a liveness probe.
    pub fn is_probe(&self) -> bool {
        matches!(self, Self::Ping {} | Self::Heartbeat {})
    }

    /// Parse one inbound text frame.
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let value: serde_json::Value =
            serde_json::from_str(text).map_err(|e| ProtocolError::Malformed(e.to_string()))?;
        let Some(obj) = value.as_object() else {
            return Err(ProtocolError::Malformed("expected an object".to_owned()));
        };
        let action = match obj.get("action") {
            Some(serde_json::Value::String(a)) => a.clone(),
            _ => return Err(ProtocolError::MissingAction),
        };
        if !AGENT_ACTIONS.contains(&action.as_str()) {
            return Err(ProtocolError::UnknownAction(action));
        }
        serde_json::from_value(value)
            .map_err(|e| ProtocolError::InvalidFields { action, reason: e.to_string() })
    }
}

// ---------------------------------------------------------------------------
// Coordinator -> Agent
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum AgentCommand {
    Directive {
        directive_id: String,
        task: String,
        payload: serde_json::Map<String, serde_json::Value>,
    },
    Pong {},
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplyStatus {
    Success,
    Error,
}

/// `{status, message}` acknowledgement for `register` and error replies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReply {
    pub status: ReplyStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_stake: Option<u64>,
}

impl StatusReply {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: ReplyStatus::Success,
            code: None,
            message: message.into(),
            agent_id: None,
            required_stake: None,
        }
    }

    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            status: ReplyStatus::Error,
            code: Some(code.as_str().to_owned()),
            message: message.into(),
            agent_id: None,
            required_stake: None,
        }
    }

    pub fn with_agent(mut self, agent_id: impl Into<String>, required_stake: u64) -> Self {
        self.agent_id = Some(agent_id.into());
        self.required_stake = Some(required_stake);
        self
    }
}

/// Anything the coordinator writes back on an agent or observer socket.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Reply {
    Command(AgentCommand),
    Status(StatusReply),
}

impl Reply {
    pub fn pong() -> Self {
        Self::Command(AgentCommand::Pong {})
    }
}

impl From<StatusReply> for Reply {
    fn from(r: StatusReply) -> Self {
        Self::Status(r)
    }
}

impl From<ProtocolError> for StatusReply {
    fn from(e: ProtocolError) -> Self {
        StatusReply::error(e.code(), e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn parses_register_with_metadata() -> anyhow::Result<()> {
        let msg = AgentMessage::parse(
            r#"{"action":"register","metadata":{"stake":10000,"capabilities":["cpu_optimization"]}}"#,
        )?;
        let AgentMessage::Register { metadata } = msg else {
            anyhow::bail!("expected register, got {msg:?}");
        };
        assert_eq!(metadata.stake, Some(10_000));
        assert_eq!(metadata.capabilities, vec!["cpu_optimization"]);
        assert_eq!(metadata.agent_id, None);
        Ok(())
    }

    #[test]
    fn token_stake_is_accepted_for_stake() -> anyhow::Result<()> {
        let msg = AgentMessage::parse(
            r#"{"action":"register","metadata":{"name":"Test Agent","type":"sub-agent","token_stake":12000}}"#,
        )?;
        let AgentMessage::Register { metadata } = msg else {
            anyhow::bail!("expected register, got {msg:?}");
        };
        assert_eq!(metadata.stake, Some(12_000));
        Ok(())
    }

    #[test]
    fn parses_update_status() -> anyhow::Result<()> {
        let msg = AgentMessage::parse(r#"{"action":"update_status","status":"inactive"}"#)?;
        assert_eq!(msg, AgentMessage::UpdateStatus { status: AgentStatus::Inactive });
        assert_eq!(msg.action(), "update_status");
        assert!(!msg.is_probe());
        Ok(())
    }

    #[test]
    fn register_without_metadata_has_no_stake() -> anyhow::Result<()> {
        let msg = AgentMessage::parse(r#"{"action":"register"}"#)?;
        assert_eq!(msg, AgentMessage::Register { metadata: RegisterMetadata::default() });
        Ok(())
    }

    #[test]
    fn parses_directive_response() -> anyhow::Result<()> {
        let msg = AgentMessage::parse(
            r#"{"action":"directive_response","directive_id":"directive_1","status":"completed"}"#,
        )?;
        assert_eq!(
            msg,
            AgentMessage::DirectiveResponse {
                directive_id: "directive_1".to_owned(),
                status: ReportedStatus::Completed,
            }
        );
        Ok(())
    }

    #[yare::parameterized(
        not_json = { "{nope", "Malformed" },
        array = { "[1,2]", "Malformed" },
        no_action = { r#"{"metadata":{}}"#, "MissingAction" },
        numeric_action = { r#"{"action":7}"#, "MissingAction" },
        unknown = { r#"{"action":"dance"}"#, "UnknownAction" },
        bad_status = { r#"{"action":"directive_response","directive_id":"d","status":"done"}"#, "InvalidFields" },
        negative_stake = { r#"{"action":"register","metadata":{"stake":-5}}"#, "InvalidFields" },
        bad_agent_status = { r#"{"action":"update_status","status":"asleep"}"#, "InvalidFields" },
        missing_id = { r#"{"action":"directive_response","status":"failed"}"#, "InvalidFields" },
    )]
    fn rejects_bad_frames(text: &str, kind: &str) {
        let err = AgentMessage::parse(text);
        let got = match err {
            Err(ProtocolError::Malformed(_)) => "Malformed",
            Err(ProtocolError::MissingAction) => "MissingAction",
            Err(ProtocolError::UnknownAction(_)) => "UnknownAction",
            Err(ProtocolError::InvalidFields { .. }) => "InvalidFields",
            Ok(_) => "Ok",
        };
        assert_eq!(got, kind);
    }

    #[test]
    fn probes_are_recognised() -> anyhow::Result<()> {
        assert!(AgentMessage::parse(r#"{"action":"ping"}"#)?.is_probe());
        assert!(AgentMessage::parse(r#"{"action":"heartbeat"}"#)?.is_probe());
        Ok(())
    }

    #[test]
    fn outbound_wire_shapes() -> anyhow::Result<()> {
        let mut payload = serde_json::Map::new();
        payload.insert("priority".to_owned(), json!("high"));
        let cmd = AgentCommand::Directive {
            directive_id: "directive_1".to_owned(),
            task: "Optimize GPU".to_owned(),
            payload,
        };
        assert_eq!(
            serde_json::to_value(&cmd)?,
            json!({"action": "directive", "directive_id": "directive_1", "task": "Optimize GPU", "payload": {"priority": "high"}})
        );
        assert_eq!(serde_json::to_value(Reply::pong())?, json!({"action": "pong"}));

        let ok = StatusReply::success("Registered").with_agent("agent_1", 10_000);
        assert_eq!(
            serde_json::to_value(&ok)?,
            json!({"status": "success", "message": "Registered", "agent_id": "agent_1", "required_stake": 10000})
        );
        let err = StatusReply::error(ErrorCode::InsufficientStake, "too low");
        assert_eq!(
            serde_json::to_value(Reply::from(err))?,
            json!({"status": "error", "code": "INSUFFICIENT_STAKE", "message": "too low"})
        );
        Ok(())
    }
}
