// Output formatting utilities

use crate::dedupe::{DuplicateGroup, ResolutionPlan};
use crate::models::{CallLog, Lead, LeadList, LeadStatus, SmsLog};
use crate::queue::QueueSlot;
use crate::utils::format_duration_short;
use chrono::{Local, TimeZone};
use std::collections::HashMap;
use std::fmt::Write;
use std::io::IsTerminal;

// ANSI escape codes for terminal formatting
const ANSI_BOLD: &str = "\x1b[1m";
const ANSI_RESET: &str = "\x1b[0m";
const ANSI_FG_RED: &str = "\x1b[31m";
const ANSI_FG_GREEN: &str = "\x1b[32m";
const ANSI_FG_YELLOW: &str = "\x1b[33m";
const ANSI_FG_BLUE: &str = "\x1b[34m";
const ANSI_FG_CYAN: &str = "\x1b[36m";
const ANSI_FG_BRIGHT_BLACK: &str = "\x1b[90m";

/// Agent id -> name, for rendering claim holders
pub type AgentNames = HashMap<i64, String>;

/// Check if stdout is a terminal (TTY)
pub fn is_tty() -> bool {
    std::io::stdout().is_terminal()
}

/// Get terminal width dynamically
///
/// Uses the `terminal_size` crate for reliable detection, with fallback to
/// COLUMNS environment variable and a sensible default.
pub fn get_terminal_width() -> usize {
    if let Some((terminal_size::Width(w), _)) = terminal_size::terminal_size() {
        if w > 0 {
            return w as usize;
        }
    }

    if let Ok(cols) = std::env::var("COLUMNS") {
        if let Ok(width) = cols.parse::<usize>() {
            if width > 0 && width < 10000 {
                return width;
            }
        }
    }

    120
}

/// Apply bold formatting if in TTY mode
fn bold_if_tty(text: &str, tty: bool) -> String {
    if tty {
        format!("{}{}{}", ANSI_BOLD, text, ANSI_RESET)
    } else {
        text.to_string()
    }
}

fn status_color(status: LeadStatus) -> Option<&'static str> {
    match status {
        LeadStatus::New => Some(ANSI_FG_BLUE),
        LeadStatus::Contacted => None,
        LeadStatus::Qualified => Some(ANSI_FG_CYAN),
        LeadStatus::Callback => Some(ANSI_FG_YELLOW),
        LeadStatus::Won => Some(ANSI_FG_GREEN),
        LeadStatus::Lost => Some(ANSI_FG_RED),
        LeadStatus::Archived => Some(ANSI_FG_BRIGHT_BLACK),
    }
}

/// Pad first, then color, so ANSI codes don't break column alignment
fn colored_cell(text: &str, width: usize, color: Option<&str>, tty: bool) -> String {
    let padded = format!("{:<width$}", text, width = width);
    match color {
        Some(code) if tty => format!("{}{}{}", code, padded, ANSI_RESET),
        _ => padded,
    }
}

/// Cut `text` to `max` characters, ending in `…` when shortened
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    if max == 0 {
        return String::new();
    }
    let mut cut: String = text.chars().take(max - 1).collect();
    cut.push('…');
    cut
}

/// Format timestamp for display
pub fn format_timestamp(ts: i64) -> String {
    Local
        .timestamp_opt(ts, 0)
        .single()
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}

/// Format date for display (date only, no time)
pub fn format_date(ts: i64) -> String {
    Local
        .timestamp_opt(ts, 0)
        .single()
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| ts.to_string())
}

/// Relative time: "in 2h", "45m ago", "now"
pub fn format_relative(ts: i64, now: i64) -> String {
    let diff = ts - now;
    if diff.abs() < 60 {
        "now".to_string()
    } else if diff.abs() >= 7 * 86400 {
        format_date(ts)
    } else if diff > 0 {
        format!("in {}", coarse(diff))
    } else {
        format!("{} ago", coarse(-diff))
    }
}

fn coarse(secs: i64) -> String {
    if secs >= 86400 {
        format!("{}d", secs / 86400)
    } else if secs >= 3600 {
        format!("{}h", secs / 3600)
    } else {
        format!("{}m", secs / 60)
    }
}

fn holder_name(agent_id: Option<i64>, agents: &AgentNames) -> String {
    match agent_id {
        Some(id) => agents.get(&id).cloned().unwrap_or_else(|| format!("#{}", id)),
        None => String::new(),
    }
}

/// Lead table with id, name, phone, status, call count, callback and claim holder.
///
/// The name column takes whatever width the terminal leaves over.
pub fn format_lead_table(leads: &[Lead], schema: &[String], agents: &AgentNames, now: i64) -> String {
    let tty = is_tty();
    let fixed = 6 + 18 + 11 + 6 + 12 + 12 + 6;
    let name_width = get_terminal_width().saturating_sub(fixed).clamp(16, 48);

    let mut out = String::new();
    let header = format!(
        "{:<6} {:<name_width$} {:<18} {:<10} {:<5} {:<11} {:<12}",
        "ID", "Name", "Phone", "Status", "Calls", "Callback", "Claimed",
        name_width = name_width
    );
    let _ = writeln!(out, "{}", bold_if_tty(&header, tty));
    let _ = writeln!(out, "{}", "-".repeat(header.chars().count()));

    for lead in leads {
        let callback = lead
            .callback_scheduled_at
            .map(|ts| format_relative(ts, now))
            .unwrap_or_default();
        let _ = writeln!(
            out,
            "{:<6} {:<name_width$} {:<18} {} {:<5} {:<11} {:<12}",
            lead.id.map(|id| id.to_string()).unwrap_or_else(|| "?".to_string()),
            truncate(&lead.display_name(schema), name_width),
            truncate(&lead.phone().unwrap_or_default(), 18),
            colored_cell(lead.status.as_str(), 10, status_color(lead.status), tty),
            lead.call_attempts,
            callback,
            truncate(&holder_name(lead.claimed_by, agents), 12),
            name_width = name_width
        );
    }
    out
}

/// Full view of one lead: attributes in schema order, then workflow state and history
pub fn format_lead_detail(
    lead: &Lead,
    list: Option<&LeadList>,
    calls: &[CallLog],
    messages: &[SmsLog],
    agents: &AgentNames,
    now: i64,
) -> String {
    let tty = is_tty();
    let schema = list.map(|l| l.field_names()).unwrap_or_default();
    let mut out = String::new();

    let title = format!(
        "Lead {}: {}",
        lead.id.map(|id| id.to_string()).unwrap_or_else(|| "?".to_string()),
        lead.display_name(&schema)
    );
    let _ = writeln!(out, "{}", bold_if_tty(&title, tty));

    // Schema fields first, then anything else the lead carries
    let mut keys: Vec<&str> = schema.iter().map(String::as_str).filter(|k| lead.data.contains_key(*k)).collect();
    for key in lead.data.keys() {
        if !keys.contains(&key.as_str()) {
            keys.push(key.as_str());
        }
    }
    let key_width = keys.iter().map(|k| k.chars().count()).max().unwrap_or(0).max(10);
    for key in keys {
        let value = lead.field(key).unwrap_or_default();
        let _ = writeln!(out, "  {:<width$}  {}", key, value, width = key_width);
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "  {:<width$}  {}", "status", lead.status.as_str(), width = key_width);
    if let Some(list) = list {
        let _ = writeln!(out, "  {:<width$}  {}", "list", list.name, width = key_width);
    }
    let _ = writeln!(out, "  {:<width$}  {}", "calls", lead.call_attempts, width = key_width);
    if let Some(ts) = lead.last_contacted_at {
        let _ = writeln!(out, "  {:<width$}  {}", "contacted", format_timestamp(ts), width = key_width);
    }
    if let Some(ts) = lead.callback_scheduled_at {
        let _ = writeln!(
            out,
            "  {:<width$}  {} ({})",
            "callback",
            format_timestamp(ts),
            format_relative(ts, now),
            width = key_width
        );
    }
    if lead.claimed_by.is_some() {
        let since = lead.claimed_at.map(|ts| format!(" since {}", format_timestamp(ts))).unwrap_or_default();
        let _ = writeln!(
            out,
            "  {:<width$}  {}{}",
            "claimed by",
            holder_name(lead.claimed_by, agents),
            since,
            width = key_width
        );
    }
    if lead.assigned_to.is_some() {
        let _ = writeln!(out, "  {:<width$}  {}", "assigned", holder_name(lead.assigned_to, agents), width = key_width);
    }

    if !calls.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "{}", bold_if_tty("Calls", tty));
        for call in calls {
            let duration = call.duration_secs.map(format_duration_short).unwrap_or_default();
            let _ = writeln!(
                out,
                "  {}  {:<10} {:<6} {:<12} {}",
                format_timestamp(call.created_ts),
                call.outcome.as_str(),
                duration,
                truncate(&holder_name(Some(call.agent_id), agents), 12),
                call.notes.as_deref().unwrap_or("")
            );
        }
    }
    if !messages.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "{}", bold_if_tty("SMS", tty));
        for sms in messages {
            let _ = writeln!(
                out,
                "  {}  {:<12} {}",
                format_timestamp(sms.created_ts),
                truncate(&holder_name(Some(sms.agent_id), agents), 12),
                sms.message
            );
        }
    }
    out
}

/// One queue position, as shown by `queue next`
pub fn format_queue_slot(slot: &QueueSlot, schema: &[String], source_name: &str) -> String {
    match &slot.lead {
        None => format!(
            "Queue '{}' complete: no lead at position {} ({} queued).\n",
            source_name,
            slot.index.saturating_add(1),
            slot.total
        ),
        Some(lead) => {
            let mut out = format!(
                "[{}/{}] {} ({})\n",
                slot.index + 1,
                slot.total,
                lead.display_name(schema),
                lead.status.as_str()
            );
            if let Some(phone) = lead.phone() {
                let _ = writeln!(out, "  phone  {}", phone);
            }
            if let Some(email) = lead.email() {
                let _ = writeln!(out, "  email  {}", email);
            }
            let _ = writeln!(
                out,
                "  lead   {}{}",
                lead.id.map(|id| id.to_string()).unwrap_or_default(),
                if slot.has_next() { "" } else { " (last in queue)" }
            );
            out
        }
    }
}

/// Duplicate groups, one block per group
pub fn format_groups(groups: &[DuplicateGroup], schema: &[String]) -> String {
    if groups.is_empty() {
        return "No duplicates found.\n".to_string();
    }
    let tty = is_tty();
    let mut out = String::new();
    for (idx, group) in groups.iter().enumerate() {
        let title = format!("Group {} ({} leads): {}", idx + 1, group.leads.len(), group.key);
        let _ = writeln!(out, "{}", bold_if_tty(&title, tty));
        for lead in &group.leads {
            let _ = writeln!(
                out,
                "  {:<6} {:<32} {:<10} list {:<4} created {}",
                lead.id.map(|id| id.to_string()).unwrap_or_default(),
                truncate(&lead.display_name(schema), 32),
                lead.status.as_str(),
                lead.list_id.map(|id| id.to_string()).unwrap_or_else(|| "-".to_string()),
                format_date(lead.created_ts)
            );
        }
    }
    let members: usize = groups.iter().map(|g| g.leads.len()).sum();
    let _ = writeln!(out, "{} groups, {} leads", groups.len(), members);
    out
}

/// Resolution plans as a preview or a report
pub fn format_plans(plans: &[ResolutionPlan], executed: bool) -> String {
    let mut out = String::new();
    let verb = if executed { "Resolved" } else { "Would resolve" };
    for plan in plans {
        let action = if plan.is_merge() { "merge into" } else { "keep" };
        let deleted: Vec<String> = plan.delete_ids.iter().map(|id| id.to_string()).collect();
        let _ = writeln!(
            out,
            "  {} {}, delete {}  [{}]",
            action,
            plan.keep_id,
            deleted.join(", "),
            plan.key
        );
    }
    let deletes: usize = plans.iter().map(|p| p.delete_ids.len()).sum();
    let _ = writeln!(out, "{} {} groups, {} leads removed.", verb, plans.len(), deletes);
    if !executed && !plans.is_empty() {
        let _ = writeln!(out, "Dry run. Re-run with --execute to apply.");
    }
    out
}
