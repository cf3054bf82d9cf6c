use serde::{Deserialize, Serialize};
use crate::models::CallOutcome;

/// One logged call attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallLog {
    pub id: Option<i64>,
    pub lead_id: i64,
    pub agent_id: i64,
    pub outcome: CallOutcome,
    pub notes: Option<String>,
    pub duration_secs: Option<i64>,
    pub created_ts: i64,
}

/// One logged SMS
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SmsLog {
    pub id: Option<i64>,
    pub lead_id: i64,
    pub agent_id: i64,
    pub message: String,
    pub created_ts: i64,
}
