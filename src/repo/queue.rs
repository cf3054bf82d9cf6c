use rusqlite::Connection;
use crate::models::AgentContext;
use crate::queue::{QueueOrder, QueueSlot, QueueSource};
use crate::repo::lead::{lead_from_row, LeadFilter, LeadRepo, LEAD_COLUMNS};
use crate::repo::{CampaignRepo, ListRepo};
use crate::error::CrmError;
use anyhow::Result;

/// Queue repository: the agent's position in a list or campaign queue
pub struct QueueRepo;

const QUEUE_CONDITION: &str =
    "status NOT IN ('won', 'lost', 'archived') AND (claimed_by IS NULL OR claimed_by = ?2)";

impl QueueRepo {
    /// Ordering options for a source. Lists may prioritise new leads;
    /// campaigns always order by creation time.
    pub fn order_for(conn: &Connection, source: QueueSource) -> Result<QueueOrder> {
        match source {
            QueueSource::List(id) => {
                let list = ListRepo::get_by_id(conn, id)?.ok_or_else(|| CrmError::ListNotFound(id.to_string()))?;
                Ok(QueueOrder { prioritise_new: list.settings.prioritise_new_leads })
            }
            QueueSource::Campaign(id) => {
                if CampaignRepo::get_by_id(conn, id)?.is_none() {
                    return Err(CrmError::CampaignNotFound(id.to_string()).into());
                }
                Ok(QueueOrder::default())
            }
        }
    }

    /// Number of leads queued for the agent
    pub fn count(conn: &Connection, source: QueueSource, agent_id: i64) -> Result<usize> {
        let sql = format!(
            "SELECT COUNT(*) FROM leads WHERE {} = ?1 AND {}",
            source.column(),
            QUEUE_CONDITION
        );
        let total: i64 = conn.query_row(&sql, rusqlite::params![source.id(), agent_id], |row| row.get(0))?;
        Ok(total as usize)
    }

    /// Lead at zero-based `index` in the agent's queue, with the queue size.
    /// An index past the end yields an empty slot, not an error.
    pub fn slot(conn: &Connection, source: QueueSource, ctx: AgentContext, index: usize) -> Result<QueueSlot> {
        let order = Self::order_for(conn, source)?;
        let total = Self::count(conn, source, ctx.agent_id)?;

        // SQLite reads a negative OFFSET as 0
        let offset = match i64::try_from(index) {
            Ok(offset) if index < total => offset,
            _ => {
                log::debug!("queue {:?} agent {} index {} past end of {}", source, ctx.agent_id, index, total);
                return Ok(QueueSlot { lead: None, index, total });
            }
        };

        let bucket = if order.prioritise_new {
            "CASE WHEN status = 'new' THEN 0 ELSE 1 END, "
        } else {
            ""
        };
        let sql = format!(
            "SELECT {} FROM leads WHERE {} = ?1 AND {}
             ORDER BY {}created_ts ASC, id ASC
             LIMIT 1 OFFSET ?3",
            LEAD_COLUMNS,
            source.column(),
            QUEUE_CONDITION,
            bucket
        );
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query_map(rusqlite::params![source.id(), ctx.agent_id, offset], lead_from_row)?;
        let lead = rows.next().transpose()?;

        log::debug!(
            "queue {:?} agent {} index {}: {} of {}",
            source,
            ctx.agent_id,
            index,
            lead.as_ref().and_then(|l| l.id).map_or("none".to_string(), |id| id.to_string()),
            total
        );
        Ok(QueueSlot { lead, index, total })
    }

    /// Every lead in the source, for in-memory queue computations
    pub fn source_leads(conn: &Connection, source: QueueSource) -> Result<Vec<crate::models::Lead>> {
        let filter = match source {
            QueueSource::List(id) => LeadFilter { list_id: Some(id), ..LeadFilter::default() },
            QueueSource::Campaign(id) => LeadFilter { campaign_id: Some(id), ..LeadFilter::default() },
        };
        LeadRepo::list(conn, &filter)
    }
}
