// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Directives: units of work addressed to one agent.

pub mod lifecycle;
pub mod sweep;

use std::fmt;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

pub use lifecycle::DirectiveManager;

/// Lifecycle state. `pending -> in-progress -> {completed, failed, timed-out}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DirectiveStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    TimedOut,
}

impl DirectiveStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in-progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::TimedOut => "timed-out",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::TimedOut)
    }
}

impl fmt::Display for DirectiveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal status an agent may report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportedStatus {
    Completed,
    Failed,
}

impl From<ReportedStatus> for DirectiveStatus {
    fn from(s: ReportedStatus) -> Self {
        match s {
            ReportedStatus::Completed => Self::Completed,
            ReportedStatus::Failed => Self::Failed,
        }
    }
}

/// A directive and its lifecycle timestamps. Serializes as the snapshot
/// carried by `directive_update` events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Directive {
    pub id: String,
    pub agent_id: String,
    pub task: String,
    pub payload: serde_json::Map<String, serde_json::Value>,
    pub status: DirectiveStatus,
    pub created_at_ms: u64,
    pub updated_at_ms: u64,
    /// When the directive entered `in-progress`; the timeout deadline runs from here.
    #[serde(skip)]
    pub(crate) started: Option<Instant>,
    /// When the directive reached a terminal state; retention runs from here.
    #[serde(skip)]
    pub(crate) finished: Option<Instant>,
}

/// Unvalidated directive creation request. Every field is required.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DirectiveRequest {
    #[serde(default)]
    pub agent_id: Option<String>,
    #[serde(default)]
    pub task: Option<String>,
    #[serde(default)]
    pub payload: Option<serde_json::Value>,
}

/// A request that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidDirective {
    pub agent_id: String,
    pub task: String,
    pub payload: serde_json::Map<String, serde_json::Value>,
}

impl DirectiveRequest {
    pub fn new(
        agent_id: impl Into<String>,
        task: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self { agent_id: Some(agent_id.into()), task: Some(task.into()), payload: Some(payload) }
    }

    /// Check that target, task and payload are present. Blank strings and a
    /// JSON `null` payload count as missing.
    pub fn validate(self) -> Result<ValidDirective, ValidationError> {
        let agent_id = non_blank(self.agent_id).ok_or(ValidationError::MissingField("agent_id"))?;
        let task = non_blank(self.task).ok_or(ValidationError::MissingField("task"))?;
        let payload = match self.payload {
            None | Some(serde_json::Value::Null) => {
                return Err(ValidationError::MissingField("payload"))
            }
            Some(serde_json::Value::Object(map)) => map,
            Some(_) => return Err(ValidationError::PayloadNotObject),
        };
        Ok(ValidDirective { agent_id, task, payload })
    }
}

fn non_blank(s: Option<String>) -> Option<String> {
    s.filter(|v| !v.trim().is_empty())
}

/// Generate a directive identifier.
pub fn new_directive_id() -> String {
    format!("directive_{}", uuid::Uuid::new_v4().simple())
}
