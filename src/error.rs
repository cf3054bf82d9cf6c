//! Domain errors.
//!
//! These are the failures a user can cause and fix (unknown ids, claim
//! conflicts, bad input). Anything else (SQLite, filesystem) travels as a
//! plain `anyhow::Error` and is reported as an internal error by the binary.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CrmError {
    #[error("Lead {0} not found")]
    LeadNotFound(i64),

    #[error("List '{0}' not found")]
    ListNotFound(String),

    #[error("Campaign '{0}' not found")]
    CampaignNotFound(String),

    #[error("Agent '{0}' not found")]
    AgentNotFound(String),

    #[error("Lead {lead_id} is claimed by agent {holder}")]
    ClaimConflict { lead_id: i64, holder: i64 },

    #[error("Lead {lead_id} is not claimed by agent {agent_id}")]
    NotClaimHolder { lead_id: i64, agent_id: i64 },

    #[error("At least one comparison field is required")]
    EmptyFieldSelection,

    #[error("Invalid status '{0}'")]
    InvalidStatus(String),

    #[error("Invalid call outcome '{0}'")]
    InvalidOutcome(String),

    #[error("No agent selected. Pass --agent <name> or set 'agent=<name>' in ~/.callq/rc")]
    NoAgent,

    #[error("{kind} '{name}' already exists")]
    DuplicateName { kind: &'static str, name: String },

    #[error("Invalid CSV: {0}")]
    InvalidCsv(String),

    #[error("Lead {lead_id} is not a member of the duplicate group")]
    NotInGroup { lead_id: i64 },
}

impl CrmError {
    /// True when the error should be reported as a user error (exit code 1)
    pub fn is_user_error(err: &anyhow::Error) -> bool {
        err.chain().any(|cause| cause.downcast_ref::<CrmError>().is_some())
    }
}
