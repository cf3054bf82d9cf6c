// Commands an agent runs while calling: queue, claims, call and SMS logging

use clap::Subcommand;
use crate::config::Config;
use crate::error::CrmError;
use crate::models::CallOutcome;
use crate::queue::QueueSource;
use crate::repo::{ActivityRepo, CallEntry, ClaimOutcome, ClaimRepo, LeadRepo, QueueRepo, ReleaseCategory};
use crate::cli::commands::{
    acting_agent, agent_names, connect, require_lead, resolve_agent, resolve_campaign, resolve_list, schema_of,
};
use crate::cli::error::{user_error, validate_non_empty};
use crate::cli::output::{format_lead_table, format_queue_slot, format_timestamp};
use crate::utils::{format_duration_short, parse_duration, parse_when};
use anyhow::{Context, Result};

#[derive(Subcommand)]
pub enum QueueCommands {
    /// Show the lead at a queue position
    Next {
        /// Work a list's queue
        #[arg(long, conflicts_with = "campaign")]
        list: Option<String>,
        /// Work a campaign's queue
        #[arg(long)]
        campaign: Option<String>,
        /// Zero-based queue position
        #[arg(long, default_value_t = 0)]
        index: usize,
        /// Claim the lead shown
        #[arg(long)]
        claim: bool,
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
    /// Leads the acting agent holds
    Claimed {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
    /// The acting agent's leads with a callback time, soonest first
    Scheduled {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
pub enum ClaimsCommands {
    /// Claimed and overdue counts per agent and per list
    Stats {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
    /// Release a category of claims: overdue, due, not-scheduled, won or all
    Release {
        /// Category to release
        category: String,
        /// Release another agent's claims
        #[arg(long = "for")]
        for_agent: Option<String>,
    },
}

pub fn handle_queue(subcommand: QueueCommands, agent: Option<&str>) -> Result<()> {
    match subcommand {
        QueueCommands::Next { list, campaign, index, claim, json } => {
            handle_queue_next(list, campaign, index, claim, json, agent)
        }
        QueueCommands::Claimed { json } => {
            let conn = connect()?;
            let (_, ctx) = acting_agent(&conn, agent)?;
            let leads = LeadRepo::claimed_by_agent(&conn, ctx.agent_id)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&leads)?);
            } else if leads.is_empty() {
                println!("No claimed leads.");
            } else {
                print!("{}", format_lead_table(&leads, &[], &agent_names(&conn)?, ctx.now));
            }
            Ok(())
        }
        QueueCommands::Scheduled { json } => {
            let conn = connect()?;
            let (_, ctx) = acting_agent(&conn, agent)?;
            let leads = LeadRepo::scheduled_for_agent(&conn, ctx.agent_id)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&leads)?);
            } else if leads.is_empty() {
                println!("No scheduled callbacks.");
            } else {
                print!("{}", format_lead_table(&leads, &[], &agent_names(&conn)?, ctx.now));
            }
            Ok(())
        }
    }
}

fn handle_queue_next(
    list: Option<String>,
    campaign: Option<String>,
    index: usize,
    claim: bool,
    json: bool,
    agent: Option<&str>,
) -> Result<()> {
    let conn = connect()?;
    let (_, ctx) = acting_agent(&conn, agent)?;

    let (source, source_name) = match (list, campaign) {
        (Some(list), _) => {
            let list = resolve_list(&conn, &list)?;
            (QueueSource::List(list.id.context("List has no id")?), list.name)
        }
        (None, Some(campaign)) => {
            let campaign = resolve_campaign(&conn, &campaign)?;
            (QueueSource::Campaign(campaign.id.context("Campaign has no id")?), campaign.name)
        }
        (None, None) => user_error("Pass --list <list> or --campaign <campaign> to pick a queue."),
    };

    let slot = QueueRepo::slot(&conn, source, ctx, index)?;
    let mut claimed = None;
    if claim {
        if let Some(lead_id) = slot.lead.as_ref().and_then(|lead| lead.id) {
            claimed = Some(ClaimRepo::claim_or_fail(&conn, lead_id, ctx)?);
        }
    }

    if json {
        let output = serde_json::json!({
            "source": source_name,
            "index": slot.index,
            "total": slot.total,
            "complete": slot.is_complete(),
            "has_next": slot.has_next(),
            "lead": slot.lead,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    let schema = schema_of(&conn, slot.lead.as_ref().and_then(|lead| lead.list_id))?;
    print!("{}", format_queue_slot(&slot, &schema, &source_name));
    match claimed {
        Some(ClaimOutcome::Claimed) => println!("Claimed."),
        Some(ClaimOutcome::AlreadyHeld) => println!("Already yours."),
        _ => {}
    }
    Ok(())
}

pub fn handle_claim(lead_id: String, agent: Option<&str>) -> Result<()> {
    let conn = connect()?;
    let id = require_lead(&conn, &lead_id)?;
    let (_, ctx) = acting_agent(&conn, agent)?;

    match ClaimRepo::claim(&conn, id, ctx)? {
        ClaimOutcome::Claimed => println!("Claimed lead {}", id),
        ClaimOutcome::AlreadyHeld => println!("Lead {} is already yours", id),
        ClaimOutcome::Conflict { holder } => {
            let names = agent_names(&conn)?;
            let holder_name = names.get(&holder).cloned().unwrap_or_else(|| holder.to_string());
            user_error(&format!("Lead {} is claimed by {}", id, holder_name));
        }
    }
    Ok(())
}

pub fn handle_release(lead_id: String, agent: Option<&str>) -> Result<()> {
    let conn = connect()?;
    let id = require_lead(&conn, &lead_id)?;
    let (_, ctx) = acting_agent(&conn, agent)?;
    ClaimRepo::release(&conn, id, ctx)?;
    println!("Released lead {}", id);
    Ok(())
}

pub fn handle_claims(subcommand: ClaimsCommands, agent: Option<&str>) -> Result<()> {
    let conn = connect()?;
    match subcommand {
        ClaimsCommands::Stats { json } => {
            let stats = ClaimRepo::stats(&conn, chrono::Utc::now().timestamp())?;
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
                return Ok(());
            }

            println!("{:<24} {:>8} {:>8}", "Agent", "Claimed", "Overdue");
            println!("{}", "-".repeat(42));
            for row in &stats.agents {
                println!("{:<24} {:>8} {:>8}", row.agent_name, row.claimed, row.overdue);
            }
            println!();
            println!("{:<24} {:>8} {:>8} {:>8}", "List", "Leads", "Claimed", "Overdue");
            println!("{}", "-".repeat(51));
            for row in &stats.lists {
                println!("{:<24} {:>8} {:>8} {:>8}", row.list_name, row.total, row.claimed, row.overdue);
            }
        }
        ClaimsCommands::Release { category, for_agent } => {
            let parsed = ReleaseCategory::from_str(&category).unwrap_or_else(|| {
                user_error(&format!(
                    "Invalid release category '{}'. Use overdue, due, not-scheduled, won or all.",
                    category
                ))
            });
            let (agent_id, agent_name, now) = match for_agent {
                Some(name) => {
                    let other = resolve_agent(&conn, &name)?;
                    (other.id.context("Agent has no id")?, other.name, chrono::Utc::now().timestamp())
                }
                None => {
                    let (me, ctx) = acting_agent(&conn, agent)?;
                    (ctx.agent_id, me.name, ctx.now)
                }
            };
            let released = ClaimRepo::release_by(&conn, agent_id, parsed, now)?;
            println!("Released {} {} claims of {}", released, parsed.as_str(), agent_name);
        }
    }
    Ok(())
}

pub fn handle_call(
    lead_id: String,
    outcome: String,
    notes: Option<String>,
    duration: Option<String>,
    callback: Option<String>,
    agent: Option<&str>,
) -> Result<()> {
    let conn = connect()?;
    let id = require_lead(&conn, &lead_id)?;
    let (_, ctx) = acting_agent(&conn, agent)?;

    let mut entry = CallEntry::new(
        CallOutcome::from_str(&outcome.to_lowercase()).ok_or_else(|| CrmError::InvalidOutcome(outcome.clone()))?,
    );
    entry.notes = notes.filter(|n| !n.trim().is_empty());
    if let Some(duration) = duration {
        entry.duration_secs = Some(parse_duration(&duration).unwrap_or_else(|e| user_error(&e.to_string())));
    }
    if let Some(callback) = callback {
        entry.callback_at = Some(parse_when(&callback, ctx.now).unwrap_or_else(|e| user_error(&e.to_string())));
    }

    let log = ActivityRepo::record_call(&conn, id, ctx, &entry)?;
    let lead = LeadRepo::require(&conn, id)?;

    let mut line = format!(
        "Logged {} call on lead {} (attempt {}, status {})",
        log.outcome.as_str(),
        id,
        lead.call_attempts,
        lead.status.as_str()
    );
    if let Some(secs) = log.duration_secs {
        line.push_str(&format!(", {}", format_duration_short(secs)));
    }
    println!("{}", line);
    if let Some(at) = entry.callback_at {
        println!("Callback scheduled at {}", format_timestamp(at));
    }
    Ok(())
}

pub fn handle_sms(lead_id: String, message: Vec<String>, agent: Option<&str>) -> Result<()> {
    let message = message.join(" ");
    if let Err(e) = validate_non_empty(&message, "Message") {
        user_error(&e);
    }

    let conn = connect()?;
    let id = require_lead(&conn, &lead_id)?;
    let (_, ctx) = acting_agent(&conn, agent)?;
    ActivityRepo::record_sms(&conn, id, ctx, &message)?;
    println!("Logged SMS to lead {}", id);
    Ok(())
}

pub fn handle_callbacks(all: bool, json: bool, agent: Option<&str>) -> Result<()> {
    let conn = connect()?;
    let config = Config::load()?;
    let (agent_id, now) = if all {
        (None, chrono::Utc::now().timestamp())
    } else {
        let (_, ctx) = acting_agent(&conn, agent)?;
        (Some(ctx.agent_id), ctx.now)
    };

    let leads = LeadRepo::due_callbacks(&conn, agent_id, now, config.callbacks_limit)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&leads)?);
        return Ok(());
    }
    if leads.is_empty() {
        println!("No callbacks due.");
        return Ok(());
    }
    print!("{}", format_lead_table(&leads, &[], &agent_names(&conn)?, now));
    Ok(())
}
