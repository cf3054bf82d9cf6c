use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;
use crate::error::CrmError;
use crate::models::AgentContext;
use anyhow::{Context, Result};

/// Claim repository: acquiring, releasing and reporting lead claims
pub struct ClaimRepo;

/// Result of a claim attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// The lead was unclaimed and now belongs to the agent
    Claimed,
    /// The agent already held the lead
    AlreadyHeld,
    /// Another agent holds the lead
    Conflict { holder: i64 },
}

/// Which of an agent's claims a bulk release drops.
/// Won leads are only released by `Won` and `All`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseCategory {
    /// Callback time has passed
    Overdue,
    /// Callback within the next hour
    Due,
    /// No callback time
    NotScheduled,
    Won,
    All,
}

impl ReleaseCategory {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "overdue" => Some(ReleaseCategory::Overdue),
            "due" => Some(ReleaseCategory::Due),
            "not-scheduled" | "not_scheduled" | "unscheduled" => Some(ReleaseCategory::NotScheduled),
            "won" => Some(ReleaseCategory::Won),
            "all" => Some(ReleaseCategory::All),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReleaseCategory::Overdue => "overdue",
            ReleaseCategory::Due => "due",
            ReleaseCategory::NotScheduled => "not-scheduled",
            ReleaseCategory::Won => "won",
            ReleaseCategory::All => "all",
        }
    }

    /// SQL condition selecting the category. `?2` is bound to now.
    fn condition(&self) -> &'static str {
        match self {
            ReleaseCategory::Overdue => {
                "status != 'won' AND callback_scheduled_at IS NOT NULL AND callback_scheduled_at < ?2"
            }
            ReleaseCategory::Due => {
                "status != 'won' AND callback_scheduled_at IS NOT NULL \
                 AND callback_scheduled_at >= ?2 AND callback_scheduled_at <= ?2 + 3600"
            }
            ReleaseCategory::NotScheduled => "status != 'won' AND callback_scheduled_at IS NULL",
            ReleaseCategory::Won => "status = 'won'",
            ReleaseCategory::All => "1 = 1",
        }
    }
}

/// Claim counts for one agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgentClaimStats {
    pub agent_id: i64,
    pub agent_name: String,
    pub claimed: usize,
    pub overdue: usize,
}

/// Claim counts for one list
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListClaimStats {
    pub list_id: i64,
    pub list_name: String,
    pub total: usize,
    pub claimed: usize,
    pub overdue: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClaimStats {
    pub agents: Vec<AgentClaimStats>,
    pub lists: Vec<ListClaimStats>,
}

impl ClaimRepo {
    /// Claim a lead for the context's agent.
    ///
    /// A single conditional update: it only succeeds while the lead is
    /// unclaimed or already held by the same agent, so two agents can never
    /// both believe they hold it.
    pub fn claim(conn: &Connection, lead_id: i64, ctx: AgentContext) -> Result<ClaimOutcome> {
        let holder: Option<Option<i64>> = conn
            .query_row("SELECT claimed_by FROM leads WHERE id = ?1", [lead_id], |row| row.get(0))
            .optional()?;
        let holder = holder.ok_or(CrmError::LeadNotFound(lead_id))?;
        if holder == Some(ctx.agent_id) {
            return Ok(ClaimOutcome::AlreadyHeld);
        }

        let updated = conn
            .execute(
                "UPDATE leads SET claimed_by = ?1, claimed_at = ?2, modified_ts = ?2
                 WHERE id = ?3 AND (claimed_by IS NULL OR claimed_by = ?1)",
                rusqlite::params![ctx.agent_id, ctx.now, lead_id],
            )
            .with_context(|| format!("Failed to claim lead {}", lead_id))?;

        if updated == 1 {
            log::info!("agent {} claimed lead {}", ctx.agent_id, lead_id);
            return Ok(ClaimOutcome::Claimed);
        }

        // Lost the race: report whoever holds it now
        let holder = conn
            .query_row("SELECT claimed_by FROM leads WHERE id = ?1", [lead_id], |row| {
                row.get::<_, Option<i64>>(0)
            })
            .optional()?
            .flatten();
        match holder {
            Some(holder) if holder != ctx.agent_id => {
                log::warn!("agent {} lost claim on lead {} to agent {}", ctx.agent_id, lead_id, holder);
                Ok(ClaimOutcome::Conflict { holder })
            }
            Some(_) => Ok(ClaimOutcome::AlreadyHeld),
            None => Err(CrmError::LeadNotFound(lead_id).into()),
        }
    }

    /// Claim, turning a conflict into `CrmError::ClaimConflict`
    pub fn claim_or_fail(conn: &Connection, lead_id: i64, ctx: AgentContext) -> Result<ClaimOutcome> {
        match Self::claim(conn, lead_id, ctx)? {
            ClaimOutcome::Conflict { holder } => Err(CrmError::ClaimConflict { lead_id, holder }.into()),
            outcome => Ok(outcome),
        }
    }

    /// Release a claim. Only the holder may release; releasing an unclaimed
    /// lead is a no-op.
    pub fn release(conn: &Connection, lead_id: i64, ctx: AgentContext) -> Result<()> {
        let holder: Option<Option<i64>> = conn
            .query_row("SELECT claimed_by FROM leads WHERE id = ?1", [lead_id], |row| row.get(0))
            .optional()?;
        match holder.ok_or(CrmError::LeadNotFound(lead_id))? {
            None => Ok(()),
            Some(holder) if holder != ctx.agent_id => {
                Err(CrmError::NotClaimHolder { lead_id, agent_id: ctx.agent_id }.into())
            }
            Some(_) => {
                conn.execute(
                    "UPDATE leads SET claimed_by = NULL, claimed_at = NULL, modified_ts = ?1
                     WHERE id = ?2 AND claimed_by = ?3",
                    rusqlite::params![ctx.now, lead_id, ctx.agent_id],
                )?;
                log::info!("agent {} released lead {}", ctx.agent_id, lead_id);
                Ok(())
            }
        }
    }

    /// Release every claim of `agent_id` in a category. Returns the number released.
    pub fn release_by(conn: &Connection, agent_id: i64, category: ReleaseCategory, now: i64) -> Result<usize> {
        let sql = format!(
            "UPDATE leads SET claimed_by = NULL, claimed_at = NULL, modified_ts = ?2
             WHERE claimed_by = ?1 AND {}",
            category.condition()
        );
        let tx = conn.unchecked_transaction()?;
        let released = tx
            .execute(&sql, rusqlite::params![agent_id, now])
            .with_context(|| format!("Failed to release {} claims", category.as_str()))?;
        tx.commit()?;
        log::info!("released {} {} claims of agent {}", released, category.as_str(), agent_id);
        Ok(released)
    }

    /// Claimed and overdue counts per agent, and per list
    pub fn stats(conn: &Connection, now: i64) -> Result<ClaimStats> {
        let mut stmt = conn.prepare(
            "SELECT a.id, a.name,
                    COUNT(l.id),
                    COALESCE(SUM(CASE WHEN l.callback_scheduled_at IS NOT NULL
                                       AND l.callback_scheduled_at < ?1 THEN 1 ELSE 0 END), 0)
             FROM agents a
             JOIN leads l ON l.claimed_by = a.id
             GROUP BY a.id, a.name
             ORDER BY a.name",
        )?;
        let rows = stmt.query_map([now], |row| {
            Ok(AgentClaimStats {
                agent_id: row.get(0)?,
                agent_name: row.get(1)?,
                claimed: row.get::<_, i64>(2)? as usize,
                overdue: row.get::<_, i64>(3)? as usize,
            })
        })?;
        let mut agents = Vec::new();
        for row in rows {
            agents.push(row?);
        }

        let mut stmt = conn.prepare(
            "SELECT ls.id, ls.name,
                    COUNT(l.id),
                    COALESCE(SUM(CASE WHEN l.claimed_by IS NOT NULL THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN l.claimed_by IS NOT NULL AND l.callback_scheduled_at IS NOT NULL
                                       AND l.callback_scheduled_at < ?1 THEN 1 ELSE 0 END), 0)
             FROM lists ls
             LEFT JOIN leads l ON l.list_id = ls.id
             GROUP BY ls.id, ls.name
             ORDER BY ls.name",
        )?;
        let rows = stmt.query_map([now], |row| {
            Ok(ListClaimStats {
                list_id: row.get(0)?,
                list_name: row.get(1)?,
                total: row.get::<_, i64>(2)? as usize,
                claimed: row.get::<_, i64>(3)? as usize,
                overdue: row.get::<_, i64>(4)? as usize,
            })
        })?;
        let mut lists = Vec::new();
        for row in rows {
            lists.push(row?);
        }

        Ok(ClaimStats { agents, lists })
    }
}
