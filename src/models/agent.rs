use serde::{Deserialize, Serialize};

/// Agent (caller) model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
    pub id: Option<i64>,
    pub name: String,
    pub email: Option<String>,
    pub created_ts: i64,
}

/// The agent a command acts on behalf of.
///
/// Resolved once per command from `--agent` or the rc file and passed
/// explicitly to every queue, claim and logging operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgentContext {
    pub agent_id: i64,
    pub now: i64,
}

impl AgentContext {
    pub fn new(agent_id: i64) -> Self {
        Self { agent_id, now: chrono::Utc::now().timestamp() }
    }

    /// Fixed clock, for tests and replay
    pub fn at(agent_id: i64, now: i64) -> Self {
        Self { agent_id, now }
    }
}
