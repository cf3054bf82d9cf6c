// Duplicate grouping over an in-memory set of leads

use std::collections::HashMap;
use serde::Serialize;
use crate::dedupe::normalize::{Normalizer, ValueKind, MIN_MATCH_LEN};
use crate::error::CrmError;
use crate::models::{FieldKind, Lead, LeadList};

/// Leads sharing one composite normalized key
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DuplicateGroup {
    pub key: String,
    pub leads: Vec<Lead>,
}

impl DuplicateGroup {
    pub fn member_ids(&self) -> Vec<i64> {
        self.leads.iter().filter_map(|lead| lead.id).collect()
    }

    pub fn contains(&self, lead_id: i64) -> bool {
        self.leads.iter().any(|lead| lead.id == Some(lead_id))
    }

    /// All members sit in `list_id`
    pub fn is_internal_to(&self, list_id: i64) -> bool {
        self.leads.iter().all(|lead| lead.list_id == Some(list_id))
    }
}

/// Total number of leads across groups
pub fn total_members(groups: &[DuplicateGroup]) -> usize {
    groups.iter().map(|g| g.leads.len()).sum()
}

/// Groups leads whose normalized values match on a chosen field set.
///
/// The key of a lead is the `field:value` pairs of its selected fields, in
/// selection order, joined with `|`. Fields that are missing, empty, or
/// normalize to fewer than [`MIN_MATCH_LEN`] characters are left out of the
/// key; a lead with no usable field gets no key and never matches.
///
/// # Example
///
/// ```
/// use callq::dedupe::{DuplicateGrouper, Normalizer};
/// use callq::models::Lead;
/// use serde_json::json;
///
/// let a = Lead::new(json!({"phone": "+370 600 12345"}).as_object().unwrap().clone());
/// let b = Lead::new(json!({"phone": "60012345"}).as_object().unwrap().clone());
/// let grouper = DuplicateGrouper::new(&["phone"], Normalizer::default()).unwrap();
/// let groups = grouper.group(&[a, b]);
/// assert_eq!(groups.len(), 1);
/// assert_eq!(groups[0].key, "phone:60012345");
/// ```
#[derive(Debug, Clone)]
pub struct DuplicateGrouper {
    fields: Vec<String>,
    schema: HashMap<String, FieldKind>,
    normalizer: Normalizer,
    internal_list: Option<i64>,
}

impl DuplicateGrouper {
    /// Fails with [`CrmError::EmptyFieldSelection`] when no usable field name is given.
    /// Blank names are dropped and repeats collapse to their first occurrence.
    pub fn new<S: AsRef<str>>(fields: &[S], normalizer: Normalizer) -> Result<Self, CrmError> {
        let mut selected: Vec<String> = Vec::new();
        for field in fields {
            let name = field.as_ref().trim();
            if !name.is_empty() && !selected.iter().any(|f| f == name) {
                selected.push(name.to_string());
            }
        }
        if selected.is_empty() {
            return Err(CrmError::EmptyFieldSelection);
        }
        Ok(Self {
            fields: selected,
            schema: HashMap::new(),
            normalizer,
            internal_list: None,
        })
    }

    /// Use a list's declared column types when classifying fields
    pub fn with_schema(mut self, list: &LeadList) -> Self {
        for field in &list.fields {
            self.schema.insert(field.name.to_lowercase(), field.kind);
        }
        self
    }

    /// Keep only groups whose members all belong to `list_id`
    pub fn internal_only(mut self, list_id: i64) -> Self {
        self.internal_list = Some(list_id);
        self
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Composite match key for one lead, `None` when no field contributes
    pub fn match_key(&self, lead: &Lead) -> Option<String> {
        let parts: Vec<String> = self
            .fields
            .iter()
            .filter_map(|field| {
                let raw = lead.field(field)?;
                if raw.trim().is_empty() {
                    return None;
                }
                let kind = ValueKind::classify(field, self.schema.get(&field.to_lowercase()).copied());
                let value = self.normalizer.normalize(kind, &raw);
                (value.chars().count() >= MIN_MATCH_LEN).then(|| format!("{}:{}", field, value))
            })
            .collect();

        if parts.is_empty() {
            None
        } else {
            Some(parts.join("|"))
        }
    }

    /// Group leads by match key, dropping singletons.
    ///
    /// Groups come out in order of their key's first appearance; members keep
    /// input order.
    pub fn group(&self, leads: &[Lead]) -> Vec<DuplicateGroup> {
        let mut index: HashMap<String, usize> = HashMap::new();
        let mut groups: Vec<DuplicateGroup> = Vec::new();

        for lead in leads {
            let Some(key) = self.match_key(lead) else {
                continue;
            };
            match index.get(&key) {
                Some(&pos) => groups[pos].leads.push(lead.clone()),
                None => {
                    index.insert(key.clone(), groups.len());
                    groups.push(DuplicateGroup { key, leads: vec![lead.clone()] });
                }
            }
        }

        groups
            .into_iter()
            .filter(|group| group.leads.len() > 1)
            .filter(|group| self.internal_list.map_or(true, |list_id| group.is_internal_to(list_id)))
            .collect()
    }
}
