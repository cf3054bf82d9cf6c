// Dashboard for `callq status`

use crate::models::{Agent, AgentContext, CampaignStatus};
use crate::queue::QueueSource;
use crate::repo::{CampaignRepo, LeadRepo, ListRepo, QueueRepo};
use crate::cli::output::{format_relative, is_tty};
use anyhow::Result;
use rusqlite::Connection;
use serde::Serialize;
use std::fmt::Write;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceQueue {
    pub kind: &'static str,
    pub id: i64,
    pub name: String,
    pub queued: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dashboard {
    pub agent: String,
    pub agent_id: i64,
    pub queues: Vec<SourceQueue>,
    pub claimed: usize,
    pub callbacks_due: usize,
    pub next_callback_ts: Option<i64>,
}

/// Collect the dashboard numbers for the acting agent
pub fn compute_dashboard(conn: &Connection, agent: &Agent, ctx: AgentContext, callbacks_limit: usize) -> Result<Dashboard> {
    let mut queues = Vec::new();
    for campaign in CampaignRepo::list(conn, true)? {
        let Some(id) = campaign.id else { continue };
        if campaign.status != CampaignStatus::Active {
            continue;
        }
        queues.push(SourceQueue {
            kind: "campaign",
            id,
            name: campaign.name,
            queued: QueueRepo::count(conn, QueueSource::Campaign(id), ctx.agent_id)?,
        });
    }
    for list in ListRepo::list(conn, false)? {
        let Some(id) = list.id else { continue };
        queues.push(SourceQueue {
            kind: "list",
            id,
            name: list.name,
            queued: QueueRepo::count(conn, QueueSource::List(id), ctx.agent_id)?,
        });
    }

    let claimed = LeadRepo::claimed_by_agent(conn, ctx.agent_id)?.len();
    let callbacks_due = LeadRepo::due_callbacks(conn, Some(ctx.agent_id), ctx.now, callbacks_limit)?.len();
    let next_callback_ts = LeadRepo::scheduled_for_agent(conn, ctx.agent_id)?
        .iter()
        .filter_map(|lead| lead.callback_scheduled_at)
        .find(|ts| *ts > ctx.now);

    Ok(Dashboard {
        agent: agent.name.clone(),
        agent_id: ctx.agent_id,
        queues,
        claimed,
        callbacks_due,
        next_callback_ts,
    })
}

/// Render the dashboard for the terminal
pub fn format_dashboard(dashboard: &Dashboard, now: i64) -> String {
    let bold = |text: &str| {
        if is_tty() {
            format!("\x1b[1m{}\x1b[0m", text)
        } else {
            text.to_string()
        }
    };

    let mut out = String::new();
    let _ = writeln!(out, "{}", bold(&format!("CALLQ STATUS: {}", dashboard.agent)));
    let _ = writeln!(out);

    let _ = writeln!(out, "{}", bold("QUEUES"));
    if dashboard.queues.is_empty() {
        let _ = writeln!(out, "  no active lists or campaigns");
    }
    for queue in &dashboard.queues {
        let _ = writeln!(out, "  {:<9} {:<32} {:>6} queued", queue.kind, queue.name, queue.queued);
    }
    let _ = writeln!(out);

    let _ = writeln!(out, "{}", bold("CLAIMS"));
    let _ = writeln!(out, "  {} leads claimed", dashboard.claimed);
    let _ = writeln!(out);

    let _ = writeln!(out, "{}", bold("CALLBACKS"));
    if dashboard.callbacks_due > 0 {
        let _ = writeln!(out, "  {} due now", dashboard.callbacks_due);
    } else {
        let _ = writeln!(out, "  none due");
    }
    if let Some(ts) = dashboard.next_callback_ts {
        let _ = writeln!(out, "  next {}", format_relative(ts, now));
    }
    out
}
