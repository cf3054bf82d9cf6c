// Planning duplicate resolutions
//
// Plans are pure: they say which lead survives, which leads go, and the
// attribute map the survivor ends up with. DedupeRepo executes them.

use serde::Serialize;
use serde_json::{Map, Value};
use crate::dedupe::grouper::DuplicateGroup;
use crate::error::CrmError;
use crate::models::{value_is_empty, Lead};

/// What a bulk run does with every group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BulkStrategy {
    KeepNewest,
    KeepOldest,
    Merge,
}

impl BulkStrategy {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "keep-newest" | "keep_new" | "newest" => Some(BulkStrategy::KeepNewest),
            "keep-oldest" | "keep_old" | "oldest" => Some(BulkStrategy::KeepOldest),
            "merge" => Some(BulkStrategy::Merge),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BulkStrategy::KeepNewest => "keep-newest",
            BulkStrategy::KeepOldest => "keep-oldest",
            BulkStrategy::Merge => "merge",
        }
    }
}

/// Resolution of one duplicate group
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolutionPlan {
    pub key: String,
    pub keep_id: i64,
    pub delete_ids: Vec<i64>,
    /// Replacement attribute map for the survivor; `None` leaves it untouched
    pub merged_data: Option<Map<String, Value>>,
}

impl ResolutionPlan {
    pub fn is_merge(&self) -> bool {
        self.merged_data.is_some()
    }
}

/// Union attribute maps, first non-empty value wins per key.
///
/// Keys keep the order in which they were first seen. A key whose values are
/// all empty keeps the first (empty) value.
pub fn merge_attributes<'a, I>(maps: I) -> Map<String, Value>
where
    I: IntoIterator<Item = &'a Map<String, Value>>,
{
    let mut merged = Map::new();
    for data in maps {
        for (key, value) in data {
            match merged.get(key) {
                Some(existing) if !value_is_empty(existing) => {}
                Some(_) if value_is_empty(value) => {}
                _ => {
                    merged.insert(key.clone(), value.clone());
                }
            }
        }
    }
    merged
}

fn persisted(group: &DuplicateGroup) -> Vec<&Lead> {
    group.leads.iter().filter(|lead| lead.id.is_some()).collect()
}

fn chronological(group: &DuplicateGroup) -> Vec<&Lead> {
    let mut members = persisted(group);
    members.sort_by_key(|lead| (lead.created_ts, lead.id));
    members
}

/// Keep `keep_id`, delete every other member
pub fn plan_keep(group: &DuplicateGroup, keep_id: i64) -> Result<ResolutionPlan, CrmError> {
    if !group.contains(keep_id) {
        return Err(CrmError::NotInGroup { lead_id: keep_id });
    }
    Ok(ResolutionPlan {
        key: group.key.clone(),
        keep_id,
        delete_ids: group.member_ids().into_iter().filter(|id| *id != keep_id).collect(),
        merged_data: None,
    })
}

/// Merge every member into the earliest-created one. `None` for groups with
/// no persisted member.
pub fn plan_merge(group: &DuplicateGroup) -> Option<ResolutionPlan> {
    let members = chronological(group);
    let keep = members.first()?;
    let keep_id = keep.id?;
    Some(ResolutionPlan {
        key: group.key.clone(),
        keep_id,
        delete_ids: members.iter().skip(1).filter_map(|lead| lead.id).collect(),
        merged_data: Some(merge_attributes(members.iter().map(|lead| &lead.data))),
    })
}

/// Plan one group under a bulk strategy
pub fn plan_with(group: &DuplicateGroup, strategy: BulkStrategy) -> Option<ResolutionPlan> {
    match strategy {
        BulkStrategy::Merge => plan_merge(group),
        BulkStrategy::KeepOldest => {
            let keep = chronological(group).first()?.id?;
            plan_keep(group, keep).ok()
        }
        BulkStrategy::KeepNewest => {
            let keep = chronological(group).last()?.id?;
            plan_keep(group, keep).ok()
        }
    }
}

/// Plan a bulk run. With `scope_list`, only groups that have at least one
/// member in that list are touched.
pub fn plan_bulk(
    groups: &[DuplicateGroup],
    strategy: BulkStrategy,
    scope_list: Option<i64>,
) -> Vec<ResolutionPlan> {
    groups
        .iter()
        .filter(|group| {
            scope_list.map_or(true, |list_id| group.leads.iter().any(|l| l.list_id == Some(list_id)))
        })
        .filter_map(|group| plan_with(group, strategy))
        .collect()
}
