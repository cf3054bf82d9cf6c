use rusqlite::Connection;
use serde::Serialize;
use crate::dedupe::{DuplicateGroup, DuplicateGrouper, ResolutionPlan};
use crate::error::CrmError;
use crate::repo::lead::LeadRepo;
use anyhow::{Context, Result};

/// Dedupe repository: finding duplicate groups in the store and applying
/// resolution plans
pub struct DedupeRepo;

/// What an applied batch of plans changed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ApplySummary {
    pub groups: usize,
    pub merged: usize,
    pub deleted: usize,
}

impl DedupeRepo {
    /// Group every lead in the store, oldest first.
    /// With `scope_list`, only groups with a member in that list are returned.
    pub fn find(conn: &Connection, grouper: &DuplicateGrouper, scope_list: Option<i64>) -> Result<Vec<DuplicateGroup>> {
        let leads = LeadRepo::list_all(conn)?;
        let groups: Vec<DuplicateGroup> = grouper
            .group(&leads)
            .into_iter()
            .filter(|group| {
                scope_list.map_or(true, |list_id| group.leads.iter().any(|l| l.list_id == Some(list_id)))
            })
            .collect();
        log::debug!(
            "found {} duplicate groups on [{}] among {} leads",
            groups.len(),
            grouper.fields().join(", "),
            leads.len()
        );
        Ok(groups)
    }

    /// Apply plans in one transaction. Any failure rolls back every plan.
    ///
    /// Merges rewrite the survivor's attributes and move the call and SMS
    /// logs of deleted members onto it before the deletes.
    pub fn apply(conn: &Connection, plans: &[ResolutionPlan]) -> Result<ApplySummary> {
        let tx = conn.unchecked_transaction()?;
        let mut summary = ApplySummary::default();

        for plan in plans {
            LeadRepo::require(&tx, plan.keep_id)
                .with_context(|| format!("Failed to resolve group '{}'", plan.key))?;

            if let Some(data) = &plan.merged_data {
                LeadRepo::update_data(&tx, plan.keep_id, data)?;
                for lead_id in &plan.delete_ids {
                    tx.execute(
                        "UPDATE call_logs SET lead_id = ?1 WHERE lead_id = ?2",
                        rusqlite::params![plan.keep_id, lead_id],
                    )?;
                    tx.execute(
                        "UPDATE sms_logs SET lead_id = ?1 WHERE lead_id = ?2",
                        rusqlite::params![plan.keep_id, lead_id],
                    )?;
                }
                summary.merged += 1;
            }

            for lead_id in &plan.delete_ids {
                let deleted = tx.execute("DELETE FROM leads WHERE id = ?1", [lead_id])?;
                if deleted == 0 {
                    return Err(CrmError::LeadNotFound(*lead_id))
                        .with_context(|| format!("Failed to resolve group '{}'", plan.key));
                }
                summary.deleted += 1;
            }
            summary.groups += 1;
        }

        tx.commit()?;
        log::info!(
            "resolved {} duplicate groups: {} merged, {} leads deleted",
            summary.groups,
            summary.merged,
            summary.deleted
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DbConnection;
    use crate::dedupe::{plan_bulk, plan_keep, plan_merge, BulkStrategy, Normalizer};
    use crate::models::{AgentContext, CallOutcome, Lead};
    use crate::repo::{ActivityRepo, AgentRepo, CallEntry, ListRepo};
    use serde_json::{json, Value};

    fn add(conn: &Connection, list_id: i64, created_ts: i64, data: Value) -> i64 {
        let mut lead = Lead::new(data.as_object().cloned().unwrap_or_default());
        lead.list_id = Some(list_id);
        lead.created_ts = created_ts;
        LeadRepo::insert(conn, &lead).unwrap().id.unwrap()
    }

    fn phone_grouper() -> DuplicateGrouper {
        DuplicateGrouper::new(&["phone"], Normalizer::default()).unwrap()
    }

    #[test]
    fn test_find_groups_across_lists() {
        let conn = DbConnection::connect_in_memory().unwrap();
        let q1 = ListRepo::create(&conn, "Q1", None, &[]).unwrap().id.unwrap();
        let q2 = ListRepo::create(&conn, "Q2", None, &[]).unwrap().id.unwrap();
        let a = add(&conn, q1, 1, json!({"phone": "+370 600 12345"}));
        let b = add(&conn, q2, 2, json!({"phone": "60012345"}));
        add(&conn, q2, 3, json!({"phone": "699"}));
        add(&conn, q2, 4, json!({"phone": "699"}));

        let groups = DedupeRepo::find(&conn, &phone_grouper(), None).unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].member_ids(), vec![a, b]);

        let scoped = DedupeRepo::find(&conn, &phone_grouper(), Some(q1)).unwrap();
        assert_eq!(scoped.len(), 1);
    }

    #[test]
    fn test_apply_merge_reassigns_logs() {
        let conn = DbConnection::connect_in_memory().unwrap();
        let list = ListRepo::create(&conn, "Q1", None, &[]).unwrap().id.unwrap();
        let agent = AgentRepo::create(&conn, "alice", None).unwrap().id.unwrap();
        let first = add(&conn, list, 1, json!({"name": "Acme", "phone": "600 12345"}));
        let second = add(&conn, list, 2, json!({"name": "", "phone": "60012345", "email": "a@x.com"}));
        ActivityRepo::record_call(&conn, second, AgentContext::at(agent, 5), &CallEntry::new(CallOutcome::Busy)).unwrap();

        let groups = DedupeRepo::find(&conn, &phone_grouper(), None).unwrap();
        let plan = plan_merge(&groups[0]).unwrap();
        let summary = DedupeRepo::apply(&conn, &[plan]).unwrap();
        assert_eq!(summary, ApplySummary { groups: 1, merged: 1, deleted: 1 });

        let kept = LeadRepo::require(&conn, first).unwrap();
        assert_eq!(kept.data["name"], json!("Acme"));
        assert_eq!(kept.data["email"], json!("a@x.com"));
        assert!(LeadRepo::get_by_id(&conn, second).unwrap().is_none());
        assert_eq!(ActivityRepo::calls_for_lead(&conn, first).unwrap().len(), 1);
    }

    #[test]
    fn test_apply_keep_one() {
        let conn = DbConnection::connect_in_memory().unwrap();
        let list = ListRepo::create(&conn, "Q1", None, &[]).unwrap().id.unwrap();
        let a = add(&conn, list, 1, json!({"phone": "600 12345"}));
        let b = add(&conn, list, 2, json!({"phone": "600-12345"}));
        let c = add(&conn, list, 3, json!({"phone": "(600) 12345"}));

        let groups = DedupeRepo::find(&conn, &phone_grouper(), None).unwrap();
        let plan = plan_keep(&groups[0], b).unwrap();
        DedupeRepo::apply(&conn, &[plan]).unwrap();

        let remaining: Vec<i64> = LeadRepo::list_all(&conn).unwrap().iter().filter_map(|l| l.id).collect();
        assert_eq!(remaining, vec![b]);
        assert!(!remaining.contains(&a) && !remaining.contains(&c));
    }

    #[test]
    fn test_failed_bulk_run_leaves_store_unchanged() {
        let conn = DbConnection::connect_in_memory().unwrap();
        let list = ListRepo::create(&conn, "Q1", None, &[]).unwrap().id.unwrap();
        add(&conn, list, 1, json!({"phone": "600 11111"}));
        add(&conn, list, 2, json!({"phone": "60011111"}));
        add(&conn, list, 3, json!({"phone": "600 22222"}));
        let gone = add(&conn, list, 4, json!({"phone": "60022222"}));

        let groups = DedupeRepo::find(&conn, &phone_grouper(), None).unwrap();
        let plans = plan_bulk(&groups, BulkStrategy::Merge, None);
        assert_eq!(plans.len(), 2);

        // A member vanishes between planning and execution
        LeadRepo::delete(&conn, gone).unwrap();
        let before = LeadRepo::list_all(&conn).unwrap();

        let err = DedupeRepo::apply(&conn, &plans).unwrap_err();
        assert!(CrmError::is_user_error(&err));
        assert_eq!(LeadRepo::list_all(&conn).unwrap(), before);
    }

    #[test]
    fn test_apply_nothing() {
        let conn = DbConnection::connect_in_memory().unwrap();
        assert_eq!(DedupeRepo::apply(&conn, &[]).unwrap(), ApplySummary::default());
    }
}
