use rusqlite::{Connection, Row};
use crate::error::CrmError;
use crate::models::{AgentContext, CallLog, CallOutcome, LeadStatus, SmsLog};
use crate::repo::claim::{ClaimOutcome, ClaimRepo};
use crate::repo::lead::LeadRepo;
use anyhow::{Context, Result};

/// Activity repository: call and SMS logs
pub struct ActivityRepo;

/// Details of a call being logged
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallEntry {
    pub outcome: CallOutcome,
    pub notes: Option<String>,
    pub duration_secs: Option<i64>,
    /// Callback time to schedule along with the call
    pub callback_at: Option<i64>,
}

impl CallEntry {
    pub fn new(outcome: CallOutcome) -> Self {
        Self { outcome, notes: None, duration_secs: None, callback_at: None }
    }
}

/// Status a lead moves to after a call, if any
fn status_after_call(current: LeadStatus, entry: &CallEntry) -> Option<LeadStatus> {
    match entry.outcome {
        CallOutcome::Won => Some(LeadStatus::Won),
        CallOutcome::Lost => Some(LeadStatus::Lost),
        _ if current.is_terminal() => None,
        CallOutcome::Callback if entry.callback_at.is_some() => Some(LeadStatus::Callback),
        _ if current == LeadStatus::New => Some(LeadStatus::Contacted),
        _ => None,
    }
}

fn call_from_row(row: &Row) -> rusqlite::Result<CallLog> {
    let outcome: String = row.get(3)?;
    Ok(CallLog {
        id: Some(row.get(0)?),
        lead_id: row.get(1)?,
        agent_id: row.get(2)?,
        outcome: CallOutcome::from_str(&outcome).unwrap_or(CallOutcome::Answered),
        notes: row.get(4)?,
        duration_secs: row.get(5)?,
        created_ts: row.get(6)?,
    })
}

fn sms_from_row(row: &Row) -> rusqlite::Result<SmsLog> {
    Ok(SmsLog {
        id: Some(row.get(0)?),
        lead_id: row.get(1)?,
        agent_id: row.get(2)?,
        message: row.get(3)?,
        created_ts: row.get(4)?,
    })
}

impl ActivityRepo {
    /// Log a call attempt.
    ///
    /// Claims the lead for the agent (failing if another agent holds it),
    /// bumps the attempt counter, stamps the contact time, applies the
    /// outcome's status change and inserts the log, all in one transaction.
    pub fn record_call(conn: &Connection, lead_id: i64, ctx: AgentContext, entry: &CallEntry) -> Result<CallLog> {
        let tx = conn.unchecked_transaction()?;

        let lead = LeadRepo::require(&tx, lead_id)?;
        if let ClaimOutcome::Conflict { holder } = ClaimRepo::claim(&tx, lead_id, ctx)? {
            return Err(CrmError::ClaimConflict { lead_id, holder }.into());
        }

        tx.execute(
            "UPDATE leads SET call_attempts = call_attempts + 1, last_contacted_at = ?1, modified_ts = ?1
             WHERE id = ?2",
            rusqlite::params![ctx.now, lead_id],
        )?;
        if let Some(at) = entry.callback_at {
            tx.execute(
                "UPDATE leads SET callback_scheduled_at = ?1 WHERE id = ?2",
                rusqlite::params![at, lead_id],
            )?;
        }
        if let Some(status) = status_after_call(lead.status, entry) {
            tx.execute(
                "UPDATE leads SET status = ?1 WHERE id = ?2",
                rusqlite::params![status.as_str(), lead_id],
            )?;
        }

        tx.execute(
            "INSERT INTO call_logs (lead_id, agent_id, outcome, notes, duration_secs, created_ts)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![
                lead_id,
                ctx.agent_id,
                entry.outcome.as_str(),
                entry.notes,
                entry.duration_secs,
                ctx.now
            ],
        )
        .with_context(|| format!("Failed to log call for lead {}", lead_id))?;
        let id = tx.last_insert_rowid();
        tx.commit()?;

        log::info!("agent {} logged {} call on lead {}", ctx.agent_id, entry.outcome.as_str(), lead_id);
        Ok(CallLog {
            id: Some(id),
            lead_id,
            agent_id: ctx.agent_id,
            outcome: entry.outcome,
            notes: entry.notes.clone(),
            duration_secs: entry.duration_secs,
            created_ts: ctx.now,
        })
    }

    /// Log an SMS sent to a lead. Counts as contact but not as a call attempt.
    pub fn record_sms(conn: &Connection, lead_id: i64, ctx: AgentContext, message: &str) -> Result<SmsLog> {
        let tx = conn.unchecked_transaction()?;
        LeadRepo::require(&tx, lead_id)?;

        tx.execute(
            "INSERT INTO sms_logs (lead_id, agent_id, message, created_ts) VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![lead_id, ctx.agent_id, message, ctx.now],
        )
        .with_context(|| format!("Failed to log SMS for lead {}", lead_id))?;
        let id = tx.last_insert_rowid();
        tx.execute(
            "UPDATE leads SET last_contacted_at = ?1, modified_ts = ?1 WHERE id = ?2",
            rusqlite::params![ctx.now, lead_id],
        )?;
        tx.commit()?;

        log::info!("agent {} logged SMS on lead {}", ctx.agent_id, lead_id);
        Ok(SmsLog {
            id: Some(id),
            lead_id,
            agent_id: ctx.agent_id,
            message: message.to_string(),
            created_ts: ctx.now,
        })
    }

    /// Calls on a lead, newest first
    pub fn calls_for_lead(conn: &Connection, lead_id: i64) -> Result<Vec<CallLog>> {
        let mut stmt = conn.prepare(
            "SELECT id, lead_id, agent_id, outcome, notes, duration_secs, created_ts
             FROM call_logs WHERE lead_id = ?1 ORDER BY created_ts DESC, id DESC",
        )?;
        let rows = stmt.query_map([lead_id], call_from_row)?;

        let mut calls = Vec::new();
        for row in rows {
            calls.push(row?);
        }
        Ok(calls)
    }

    /// SMS messages on a lead, newest first
    pub fn sms_for_lead(conn: &Connection, lead_id: i64) -> Result<Vec<SmsLog>> {
        let mut stmt = conn.prepare(
            "SELECT id, lead_id, agent_id, message, created_ts
             FROM sms_logs WHERE lead_id = ?1 ORDER BY created_ts DESC, id DESC",
        )?;
        let rows = stmt.query_map([lead_id], sms_from_row)?;

        let mut messages = Vec::new();
        for row in rows {
            messages.push(row?);
        }
        Ok(messages)
    }
}
