use serde::{Deserialize, Serialize};

/// Semantic type of a list column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    #[default]
    Text,
    Phone,
    Email,
    Url,
    Number,
    Date,
}

impl FieldKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKind::Text => "text",
            FieldKind::Phone => "phone",
            FieldKind::Email => "email",
            FieldKind::Url => "url",
            FieldKind::Number => "number",
            FieldKind::Date => "date",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" | "string" => Some(FieldKind::Text),
            "phone" => Some(FieldKind::Phone),
            "email" | "e-mail" => Some(FieldKind::Email),
            "url" | "www" => Some(FieldKind::Url),
            "number" => Some(FieldKind::Number),
            "date" => Some(FieldKind::Date),
            _ => None,
        }
    }

    /// Guess a column type from its header name
    pub fn infer(header: &str) -> Self {
        let lower = header.to_lowercase();
        if is_phone_name(header) {
            FieldKind::Phone
        } else if ["email", "e-mail", "mail"].iter().any(|k| lower.contains(k)) {
            FieldKind::Email
        } else if ["url", "www", "website", "link"].iter().any(|k| lower.contains(k)) {
            FieldKind::Url
        } else if lower.contains("date") || lower.contains("data") {
            FieldKind::Date
        } else {
            FieldKind::Text
        }
    }
}

/// Whether a column name reads as a phone number.
///
/// Matches per word, so "Telefonas", "tel_nr" and "Mobile phone" count but
/// "Hotel" and "Motel name" do not.
pub fn is_phone_name(name: &str) -> bool {
    name.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .any(|word| word.contains("phone") || word.starts_with("tel") || word.starts_with("mobil"))
}

/// One column of a list's schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListField {
    pub name: String,
    #[serde(default)]
    pub kind: FieldKind,
    #[serde(default = "default_show")]
    pub show: bool,
}

fn default_show() -> bool {
    true
}

impl ListField {
    pub fn new(name: &str, kind: FieldKind) -> Self {
        Self { name: name.to_string(), kind, show: true }
    }
}

/// Per-list settings bag
///
/// Category fields hold comma-separated labels shown to agents when they
/// close a call. The dedupe fields are defaults for `dupes find --list`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ListSettings {
    pub prepend_phone: Option<String>,
    pub internal_colleagues_only: bool,
    pub is_blocklist: bool,
    pub prioritise_new_leads: bool,
    pub script: Option<String>,
    pub callback_categories: Option<String>,
    pub winner_categories: Option<String>,
    pub loser_categories: Option<String>,
    pub archive_categories: Option<String>,
    pub dedupe_fields: Vec<String>,
    pub dedupe_internal_only: bool,
}

impl ListSettings {
    /// Apply a `key=value` setting. Returns an error message for unknown keys.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), String> {
        let opt = |v: &str| if v.is_empty() { None } else { Some(v.to_string()) };
        let flag = |v: &str| match v {
            "true" | "yes" | "on" | "1" => Ok(true),
            "false" | "no" | "off" | "0" => Ok(false),
            other => Err(format!("Invalid boolean '{}' for {}", other, key)),
        };

        match key {
            "prepend_phone" => self.prepend_phone = opt(value),
            "internal_colleagues_only" => self.internal_colleagues_only = flag(value)?,
            "is_blocklist" => self.is_blocklist = flag(value)?,
            "prioritise_new_leads" => self.prioritise_new_leads = flag(value)?,
            "script" => self.script = opt(value),
            "callback_categories" => self.callback_categories = opt(value),
            "winner_categories" => self.winner_categories = opt(value),
            "loser_categories" => self.loser_categories = opt(value),
            "archive_categories" => self.archive_categories = opt(value),
            "dedupe_fields" => {
                self.dedupe_fields = value
                    .split(',')
                    .map(|f| f.trim().to_string())
                    .filter(|f| !f.is_empty())
                    .collect();
            }
            "dedupe_internal_only" => self.dedupe_internal_only = flag(value)?,
            other => return Err(format!("Unknown list setting '{}'", other)),
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListStatus {
    Active,
    Archived,
    Blocklist,
}

impl ListStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListStatus::Active => "active",
            ListStatus::Archived => "archived",
            ListStatus::Blocklist => "blocklist",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "active" => Some(ListStatus::Active),
            "archived" => Some(ListStatus::Archived),
            "blocklist" => Some(ListStatus::Blocklist),
            _ => None,
        }
    }
}

/// Lead list model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeadList {
    pub id: Option<i64>,
    pub name: String,
    pub description: Option<String>,
    pub fields: Vec<ListField>,
    pub settings: ListSettings,
    pub status: ListStatus,
    pub created_ts: i64,
    pub modified_ts: i64,
}

impl LeadList {
    pub fn new(name: String) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            id: None,
            name,
            description: None,
            fields: Vec::new(),
            settings: ListSettings::default(),
            status: ListStatus::Active,
            created_ts: now,
            modified_ts: now,
        }
    }

    pub fn field_names(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.name.clone()).collect()
    }

    /// Schema type of a column, if the list declares it
    pub fn field_kind(&self, name: &str) -> Option<FieldKind> {
        self.fields
            .iter()
            .find(|f| f.name.eq_ignore_ascii_case(name))
            .map(|f| f.kind)
    }
}
