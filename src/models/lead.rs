use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Lead workflow status
///
/// `won`, `lost` and `archived` are terminal: a terminal lead never shows up
/// in an agent's queue again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeadStatus {
    New,
    Contacted,
    Qualified,
    Callback,
    Won,
    Lost,
    Archived,
}

impl LeadStatus {
    pub const ALL: [LeadStatus; 7] = [
        LeadStatus::New,
        LeadStatus::Contacted,
        LeadStatus::Qualified,
        LeadStatus::Callback,
        LeadStatus::Won,
        LeadStatus::Lost,
        LeadStatus::Archived,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LeadStatus::New => "new",
            LeadStatus::Contacted => "contacted",
            LeadStatus::Qualified => "qualified",
            LeadStatus::Callback => "callback",
            LeadStatus::Won => "won",
            LeadStatus::Lost => "lost",
            LeadStatus::Archived => "archived",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "new" => Some(LeadStatus::New),
            "contacted" => Some(LeadStatus::Contacted),
            "qualified" => Some(LeadStatus::Qualified),
            "callback" => Some(LeadStatus::Callback),
            "won" => Some(LeadStatus::Won),
            "lost" => Some(LeadStatus::Lost),
            "archived" => Some(LeadStatus::Archived),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Won | Self::Lost | Self::Archived)
    }
}

/// Outcome recorded for a single call attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallOutcome {
    Answered,
    NoAnswer,
    Busy,
    Voicemail,
    Callback,
    Won,
    Lost,
}

impl CallOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallOutcome::Answered => "answered",
            CallOutcome::NoAnswer => "no_answer",
            CallOutcome::Busy => "busy",
            CallOutcome::Voicemail => "voicemail",
            CallOutcome::Callback => "callback",
            CallOutcome::Won => "won",
            CallOutcome::Lost => "lost",
        }
    }

    /// Accepts both `no_answer` and `no-answer`
    pub fn from_str(s: &str) -> Option<Self> {
        match s.replace('-', "_").as_str() {
            "answered" => Some(CallOutcome::Answered),
            "no_answer" => Some(CallOutcome::NoAnswer),
            "busy" => Some(CallOutcome::Busy),
            "voicemail" => Some(CallOutcome::Voicemail),
            "callback" => Some(CallOutcome::Callback),
            "won" => Some(CallOutcome::Won),
            "lost" => Some(CallOutcome::Lost),
            _ => None,
        }
    }
}

/// Lead model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    pub id: Option<i64>,
    pub uuid: String,
    pub data: Map<String, Value>, // Free-form attributes, keys vary per list
    pub status: LeadStatus,
    pub list_id: Option<i64>,
    pub campaign_id: Option<i64>,
    pub assigned_to: Option<i64>,
    pub claimed_by: Option<i64>,
    pub claimed_at: Option<i64>,
    pub call_attempts: i64,
    pub last_contacted_at: Option<i64>,
    pub callback_scheduled_at: Option<i64>,
    pub created_ts: i64,
    pub modified_ts: i64,
}

impl Lead {
    /// Create a new, unsaved lead
    pub fn new(data: Map<String, Value>) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            id: None,
            uuid: uuid::Uuid::new_v4().to_string(),
            data,
            status: LeadStatus::New,
            list_id: None,
            campaign_id: None,
            assigned_to: None,
            claimed_by: None,
            claimed_at: None,
            call_attempts: 0,
            last_contacted_at: None,
            callback_scheduled_at: None,
            created_ts: now,
            modified_ts: now,
        }
    }

    /// Attribute value as text. Exact key first, then case-insensitive.
    /// `null` and missing keys yield `None`; other non-strings are stringified.
    pub fn field(&self, name: &str) -> Option<String> {
        let value = self.data.get(name).or_else(|| {
            self.data
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(name))
                .map(|(_, value)| value)
        })?;
        value_text(value)
    }

    /// First non-empty value among candidate field names
    pub fn first_field(&self, names: &[&str]) -> Option<String> {
        names
            .iter()
            .filter_map(|name| self.field(name))
            .find(|value| !value.trim().is_empty())
    }

    /// Human-readable name. Prefers the first schema field, then common name keys.
    pub fn display_name(&self, schema_fields: &[String]) -> String {
        if let Some(value) = schema_fields.first().and_then(|first| self.field(first)) {
            if !value.trim().is_empty() {
                return value;
            }
        }
        if let Some(company) = self.first_field(&["company", "company_name", "organization", "pavadinimas"]) {
            return company;
        }
        let first = self.first_field(&["first_name", "firstname", "name"]);
        let last = self.first_field(&["last_name", "lastname"]);
        let joined = [first, last].into_iter().flatten().collect::<Vec<_>>().join(" ");
        if joined.is_empty() {
            "Unknown".to_string()
        } else {
            joined
        }
    }

    pub fn phone(&self) -> Option<String> {
        self.first_field(&["phone", "telephone", "mobile", "tel", "telefonas"])
    }

    pub fn email(&self) -> Option<String> {
        self.first_field(&["email", "e-mail"])
    }

    /// Whether this lead belongs in `agent_id`'s queue:
    /// not terminal, and either unclaimed or claimed by that agent.
    pub fn is_workable_by(&self, agent_id: i64) -> bool {
        !self.status.is_terminal()
            && self.claimed_by.map_or(true, |holder| holder == agent_id)
    }

    /// Callback time has passed
    pub fn callback_due(&self, now: i64) -> bool {
        self.callback_scheduled_at.is_some_and(|ts| ts <= now)
    }
}

/// Text form of an attribute value; `None` for null
pub fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}

/// Whether an attribute counts as empty when merging
pub fn value_is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn lead_with(data: Value) -> Lead {
        Lead::new(data.as_object().cloned().unwrap_or_default())
    }

    #[test]
    fn test_lead_status_conversion() {
        for status in LeadStatus::ALL {
            assert_eq!(LeadStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(LeadStatus::from_str("pending"), None);
    }

    #[test]
    fn test_lead_status_terminal() {
        assert!(!LeadStatus::New.is_terminal());
        assert!(!LeadStatus::Callback.is_terminal());
        assert!(LeadStatus::Won.is_terminal());
        assert!(LeadStatus::Lost.is_terminal());
        assert!(LeadStatus::Archived.is_terminal());
    }

    #[test]
    fn test_call_outcome_conversion() {
        assert_eq!(CallOutcome::from_str("no-answer"), Some(CallOutcome::NoAnswer));
        assert_eq!(CallOutcome::from_str("no_answer"), Some(CallOutcome::NoAnswer));
        assert_eq!(CallOutcome::NoAnswer.as_str(), "no_answer");
        assert_eq!(CallOutcome::from_str("hung up"), None);
    }

    #[test]
    fn test_field_lookup_is_case_insensitive_fallback() {
        let lead = lead_with(json!({"Phone": "+370 600", "zip": 1234, "fax": null}));
        assert_eq!(lead.field("Phone").as_deref(), Some("+370 600"));
        assert_eq!(lead.field("phone").as_deref(), Some("+370 600"));
        assert_eq!(lead.field("zip").as_deref(), Some("1234"));
        assert_eq!(lead.field("fax"), None);
        assert_eq!(lead.field("missing"), None);
    }

    #[test]
    fn test_display_name() {
        let lead = lead_with(json!({"first_name": "Ada", "last_name": "Lovelace"}));
        assert_eq!(lead.display_name(&[]), "Ada Lovelace");

        let lead = lead_with(json!({"Title": "Acme UAB", "company": "Other"}));
        assert_eq!(lead.display_name(&["Title".to_string()]), "Acme UAB");
        assert_eq!(lead.display_name(&[]), "Other");

        assert_eq!(lead_with(json!({})).display_name(&[]), "Unknown");
    }

    #[test]
    fn test_is_workable_by() {
        let mut lead = lead_with(json!({}));
        assert!(lead.is_workable_by(1));

        lead.claimed_by = Some(1);
        assert!(lead.is_workable_by(1));
        assert!(!lead.is_workable_by(2));

        lead.claimed_by = None;
        lead.status = LeadStatus::Won;
        assert!(!lead.is_workable_by(1));
    }
}
