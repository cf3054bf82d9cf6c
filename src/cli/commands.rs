use clap::{Parser, Subcommand};
use rusqlite::Connection;
use crate::config::Config;
use crate::db::DbConnection;
use crate::error::CrmError;
use crate::import::parse_csv;
use crate::models::{Agent, AgentContext, Campaign, CampaignStatus, LeadList, LeadStatus, ListStatus};
use crate::repo::{ActivityRepo, AgentRepo, CampaignRepo, LeadFilter, LeadRepo, ListRepo};
use crate::cli::commands_dupes::{handle_dupes, DupesCommands};
use crate::cli::commands_work::{
    handle_call, handle_callbacks, handle_claim, handle_claims, handle_queue, handle_release, handle_sms,
    ClaimsCommands, QueueCommands,
};
use crate::cli::error::{parse_field_spec, parse_key_value, user_error, validate_lead_id, validate_name};
use crate::cli::output::{format_lead_detail, format_lead_table, format_timestamp, AgentNames};
use crate::cli::status::{compute_dashboard, format_dashboard};
use crate::utils::{fuzzy, parse_when};
use crate::vat::check_vat;
use serde_json::{Map, Value};
use anyhow::{Context, Result};

#[derive(Parser)]
#[command(name = "callq")]
#[command(about = "Cold-calling lead ledger - lists, queues, claims, call logs and duplicate cleanup")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Act as this agent (overrides `agent` in ~/.callq/rc)
    #[arg(long, global = true)]
    pub agent: Option<String>,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Agent (caller) management
    Agents {
        #[command(subcommand)]
        subcommand: AgentCommands,
    },
    /// Lead list management
    Lists {
        #[command(subcommand)]
        subcommand: ListCommands,
    },
    /// Campaign management
    Campaigns {
        #[command(subcommand)]
        subcommand: CampaignCommands,
    },
    /// Lead management and CSV import
    Leads {
        #[command(subcommand)]
        subcommand: LeadCommands,
    },
    /// Work queue for the acting agent
    Queue {
        #[command(subcommand)]
        subcommand: QueueCommands,
    },
    /// Claim a lead for the acting agent
    Claim {
        /// Lead ID
        lead_id: String,
    },
    /// Release a lead the acting agent holds
    Release {
        /// Lead ID
        lead_id: String,
    },
    /// Claim reports and bulk release
    Claims {
        #[command(subcommand)]
        subcommand: ClaimsCommands,
    },
    /// Log a call on a lead (claims it if unclaimed)
    Call {
        /// Lead ID
        lead_id: String,
        /// Outcome: answered, no-answer, busy, voicemail, callback, won, lost
        outcome: String,
        /// Call notes
        #[arg(long)]
        notes: Option<String>,
        /// Call length (e.g. 90, 2m, 1m30s)
        #[arg(long)]
        duration: Option<String>,
        /// Schedule a callback (e.g. +2h, tomorrow, 2026-03-10T14:00)
        #[arg(long)]
        callback: Option<String>,
    },
    /// Log an SMS sent to a lead
    Sms {
        /// Lead ID
        lead_id: String,
        /// Message text
        #[arg(trailing_var_arg = true, allow_hyphen_values = true, required = true)]
        message: Vec<String>,
    },
    /// Callbacks that are due now
    Callbacks {
        /// Show due callbacks of every agent
        #[arg(long)]
        all: bool,
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
    /// Find and resolve duplicate leads
    Dupes {
        #[command(subcommand)]
        subcommand: DupesCommands,
    },
    /// Check the format of a VAT number
    Vat {
        /// VAT number with country prefix (e.g. LT100000001234)
        number: String,
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
    /// Dashboard for the acting agent
    Status {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
pub enum AgentCommands {
    /// Register an agent
    Add {
        /// Agent name
        name: String,
        /// Contact email
        #[arg(long)]
        email: Option<String>,
    },
    /// List agents
    List {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
pub enum ListCommands {
    /// Create a lead list
    Add {
        /// List name
        name: String,
        /// List description
        #[arg(long)]
        description: Option<String>,
        /// Field definition `name[:type]` (repeatable)
        #[arg(long = "field")]
        fields: Vec<String>,
    },
    /// List lead lists
    List {
        /// Include archived lists
        #[arg(long)]
        archived: bool,
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
    /// Show a list's fields, settings and lead counts
    Show {
        /// List ID or name
        list: String,
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
    /// Replace a list's field definitions
    Fields {
        /// List ID or name
        list: String,
        /// Field definitions `name[:type]`
        #[arg(required = true)]
        specs: Vec<String>,
    },
    /// Change a list setting
    Set {
        /// List ID or name
        list: String,
        /// Setting name (e.g. prioritise_new_leads, dedupe_fields)
        key: String,
        /// New value
        value: String,
    },
    /// Archive a list (hides it from queues)
    Archive {
        /// List ID or name
        list: String,
        /// Restore an archived list
        #[arg(long)]
        restore: bool,
    },
    /// Delete a list and all of its leads
    Delete {
        /// List ID or name
        list: String,
        /// Delete without confirmation
        #[arg(short = 'y', long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
pub enum CampaignCommands {
    /// Create a campaign
    Add {
        /// Campaign name
        name: String,
        /// Campaign description
        #[arg(long)]
        description: Option<String>,
    },
    /// List campaigns
    List {
        /// Include paused and completed campaigns
        #[arg(long)]
        all: bool,
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
    /// Change a campaign's status
    Status {
        /// Campaign ID or name
        campaign: String,
        /// New status: active, paused or completed
        status: String,
    },
    /// Progress numbers for the acting agent
    Stats {
        /// Campaign ID or name
        campaign: String,
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
pub enum LeadCommands {
    /// Add a lead from `key=value` attributes
    Add {
        /// Target list ID or name
        #[arg(long)]
        list: String,
        /// Campaign ID or name
        #[arg(long)]
        campaign: Option<String>,
        /// Attributes (e.g. company="Acme UAB" phone=+37060012345)
        #[arg(required = true)]
        attributes: Vec<String>,
    },
    /// Import leads from a CSV file
    Import {
        /// CSV file path
        file: String,
        /// Target list ID or name
        #[arg(long)]
        list: String,
        /// Create the list if it does not exist
        #[arg(long)]
        create: bool,
        /// Campaign ID or name
        #[arg(long)]
        campaign: Option<String>,
    },
    /// List leads
    List {
        /// Only leads in this list
        #[arg(long)]
        list: Option<String>,
        /// Only leads in this campaign
        #[arg(long)]
        campaign: Option<String>,
        /// Only leads with this status
        #[arg(long)]
        status: Option<String>,
        /// Only leads claimed by the acting agent
        #[arg(long)]
        mine: bool,
        /// Maximum number of leads
        #[arg(long)]
        limit: Option<usize>,
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
    /// Show a lead with its call and SMS history
    Show {
        /// Lead ID
        lead_id: String,
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
    /// Set a lead's status
    Status {
        /// Lead ID
        lead_id: String,
        /// New status: new, contacted, qualified, callback, won, lost, archived
        status: String,
    },
    /// Schedule or clear a callback
    Callback {
        /// Lead ID
        lead_id: String,
        /// When to call back (now, +2h, tomorrow, HH:MM, YYYY-MM-DD[THH:MM]) or `clear`
        when: String,
    },
    /// Assign a lead to an agent or move it to a campaign
    Assign {
        /// Lead ID
        lead_id: String,
        /// Agent name, or `none` to unassign
        #[arg(long)]
        to: Option<String>,
        /// Campaign ID or name, or `none` to detach
        #[arg(long)]
        campaign: Option<String>,
    },
    /// Delete a lead and its history
    Delete {
        /// Lead ID
        lead_id: String,
        /// Delete without confirmation
        #[arg(short = 'y', long)]
        yes: bool,
    },
}

pub fn run() -> Result<()> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            use clap::error::ErrorKind;
            e.print()?;
            match e.kind() {
                ErrorKind::DisplayHelp
                | ErrorKind::DisplayVersion
                | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => return Ok(()),
                _ => std::process::exit(1),
            }
        }
    };

    handle_command(cli)
}

fn handle_command(cli: Cli) -> Result<()> {
    let agent = cli.agent.as_deref();
    match cli.command {
        Commands::Agents { subcommand } => handle_agents(subcommand),
        Commands::Lists { subcommand } => handle_lists(subcommand),
        Commands::Campaigns { subcommand } => handle_campaigns(subcommand, agent),
        Commands::Leads { subcommand } => handle_leads(subcommand, agent),
        Commands::Queue { subcommand } => handle_queue(subcommand, agent),
        Commands::Claim { lead_id } => handle_claim(lead_id, agent),
        Commands::Release { lead_id } => handle_release(lead_id, agent),
        Commands::Claims { subcommand } => handle_claims(subcommand, agent),
        Commands::Call { lead_id, outcome, notes, duration, callback } => {
            handle_call(lead_id, outcome, notes, duration, callback, agent)
        }
        Commands::Sms { lead_id, message } => handle_sms(lead_id, message, agent),
        Commands::Callbacks { all, json } => handle_callbacks(all, json, agent),
        Commands::Dupes { subcommand } => handle_dupes(subcommand),
        Commands::Vat { number, json } => handle_vat(number, json),
        Commands::Status { json } => handle_status(json, agent),
    }
}

// Shared helpers

pub(crate) fn connect() -> Result<Connection> {
    DbConnection::connect().context("Failed to connect to database")
}

/// Exit with "<kind> '<name>' not found", suggesting close names when there are any
pub(crate) fn not_found_error(kind: &str, name: &str, candidates: &[String]) -> ! {
    let matches = fuzzy::find_near_matches(name, candidates, 2);
    if matches.is_empty() {
        user_error(&format!("{} '{}' not found", kind, name));
    }
    let names: Vec<String> = matches.into_iter().map(|(name, _)| name).collect();
    user_error(&format!("{} '{}' not found. Did you mean: {}?", kind, name, names.join(", ")));
}

pub(crate) fn resolve_list(conn: &Connection, id_or_name: &str) -> Result<LeadList> {
    match ListRepo::resolve(conn, id_or_name) {
        Err(e) if matches!(e.downcast_ref::<CrmError>(), Some(CrmError::ListNotFound(_))) => {
            let names: Vec<String> = ListRepo::list(conn, true)?.into_iter().map(|l| l.name).collect();
            not_found_error("List", id_or_name, &names);
        }
        other => other,
    }
}

pub(crate) fn resolve_campaign(conn: &Connection, id_or_name: &str) -> Result<Campaign> {
    match CampaignRepo::resolve(conn, id_or_name) {
        Err(e) if matches!(e.downcast_ref::<CrmError>(), Some(CrmError::CampaignNotFound(_))) => {
            let names: Vec<String> = CampaignRepo::list(conn, false)?.into_iter().map(|c| c.name).collect();
            not_found_error("Campaign", id_or_name, &names);
        }
        other => other,
    }
}

pub(crate) fn resolve_agent(conn: &Connection, name: &str) -> Result<Agent> {
    match AgentRepo::get_by_name(conn, name)? {
        Some(agent) => Ok(agent),
        None => {
            let names: Vec<String> = AgentRepo::list(conn)?.into_iter().map(|a| a.name).collect();
            not_found_error("Agent", name, &names);
        }
    }
}

/// Resolve the acting agent from `--agent`, falling back to `agent` in the rc file
pub(crate) fn acting_agent(conn: &Connection, flag: Option<&str>) -> Result<(Agent, AgentContext)> {
    let config = Config::load()?;
    let name = match flag.map(str::to_string).or(config.agent) {
        Some(name) => name,
        None => return Err(CrmError::NoAgent.into()),
    };
    let agent = resolve_agent(conn, &name)?;
    let agent_id = agent.id.context("Agent has no id")?;
    log::debug!("acting as agent {} ({})", agent.name, agent_id);
    Ok((agent, AgentContext::new(agent_id)))
}

/// Parse and look up a lead id argument
pub(crate) fn require_lead(conn: &Connection, lead_id: &str) -> Result<i64> {
    let id = validate_lead_id(lead_id).unwrap_or_else(|e| user_error(&e));
    LeadRepo::require(conn, id)?;
    Ok(id)
}

pub(crate) fn agent_names(conn: &Connection) -> Result<AgentNames> {
    Ok(AgentRepo::list(conn)?
        .into_iter()
        .filter_map(|agent| agent.id.map(|id| (id, agent.name)))
        .collect())
}

/// Field names of a lead's list, for display
pub(crate) fn schema_of(conn: &Connection, list_id: Option<i64>) -> Result<Vec<String>> {
    match list_id {
        Some(id) => Ok(ListRepo::get_by_id(conn, id)?.map(|l| l.field_names()).unwrap_or_default()),
        None => Ok(Vec::new()),
    }
}

/// Ask a yes/no question on stderr. Anything but y/yes is a no.
pub(crate) fn confirm(question: &str) -> Result<bool> {
    eprint!("{} [y/n] (default: n): ", question);
    std::io::Write::flush(&mut std::io::stderr())
        .map_err(|e| anyhow::anyhow!("Failed to flush stderr: {}", e))?;

    let mut input = String::new();
    std::io::stdin().read_line(&mut input)
        .map_err(|e| anyhow::anyhow!("Failed to read input: {}", e))?;
    Ok(matches!(input.trim().to_lowercase().as_str(), "y" | "yes"))
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

// Agents

fn handle_agents(subcommand: AgentCommands) -> Result<()> {
    let conn = connect()?;
    match subcommand {
        AgentCommands::Add { name, email } => {
            if let Err(e) = validate_name(&name, "Agent") {
                user_error(&e);
            }
            let agent = AgentRepo::create(&conn, &name, email.as_deref())?;
            println!("Created agent '{}' (id: {})", agent.name, agent.id.unwrap_or_default());
        }
        AgentCommands::List { json } => {
            let agents = AgentRepo::list(&conn)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&agents)?);
                return Ok(());
            }
            if agents.is_empty() {
                println!("No agents found.");
                return Ok(());
            }
            println!("{:<4} {:<24} {}", "ID", "Name", "Email");
            println!("{}", "-".repeat(50));
            for agent in agents {
                println!(
                    "{:<4} {:<24} {}",
                    agent.id.unwrap_or_default(),
                    agent.name,
                    agent.email.unwrap_or_default()
                );
            }
        }
    }
    Ok(())
}

// Lists

fn handle_lists(subcommand: ListCommands) -> Result<()> {
    match subcommand {
        ListCommands::Add { name, description, fields } => handle_list_add(name, description, fields),
        ListCommands::List { archived, json } => handle_list_list(archived, json),
        ListCommands::Show { list, json } => handle_list_show(list, json),
        ListCommands::Fields { list, specs } => {
            let conn = connect()?;
            let list = resolve_list(&conn, &list)?;
            let fields = specs
                .iter()
                .map(|spec| parse_field_spec(spec).unwrap_or_else(|e| user_error(&e)))
                .collect::<Vec<_>>();
            ListRepo::update_fields(&conn, list.id.context("List has no id")?, &fields)?;
            println!("Updated fields of list '{}': {}", list.name, specs.join(", "));
            Ok(())
        }
        ListCommands::Set { list, key, value } => handle_list_set(list, key, value),
        ListCommands::Archive { list, restore } => {
            let conn = connect()?;
            let list = resolve_list(&conn, &list)?;
            let status = match (restore, list.settings.is_blocklist) {
                (false, _) => ListStatus::Archived,
                (true, true) => ListStatus::Blocklist,
                (true, false) => ListStatus::Active,
            };
            ListRepo::set_status(&conn, list.id.context("List has no id")?, status)?;
            if restore {
                println!("Restored list '{}'", list.name);
            } else {
                println!("Archived list '{}'", list.name);
            }
            Ok(())
        }
        ListCommands::Delete { list, yes } => {
            let conn = connect()?;
            let list = resolve_list(&conn, &list)?;
            if !yes && !confirm(&format!("Delete list '{}' and all of its leads?", list.name))? {
                println!("Cancelled.");
                return Ok(());
            }
            let removed = ListRepo::delete(&conn, list.id.context("List has no id")?)?;
            println!("Deleted list '{}' ({} leads removed)", list.name, removed);
            Ok(())
        }
    }
}

fn handle_list_add(name: String, description: Option<String>, specs: Vec<String>) -> Result<()> {
    if let Err(e) = validate_name(&name, "List") {
        user_error(&e);
    }
    let fields = specs
        .iter()
        .map(|spec| parse_field_spec(spec).unwrap_or_else(|e| user_error(&e)))
        .collect::<Vec<_>>();

    let conn = connect()?;
    let list = ListRepo::create(&conn, &name, description.as_deref(), &fields)?;
    println!("Created list '{}' (id: {})", list.name, list.id.unwrap_or_default());
    Ok(())
}

fn handle_list_list(archived: bool, json: bool) -> Result<()> {
    let conn = connect()?;
    let lists = ListRepo::list(&conn, archived)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&lists)?);
        return Ok(());
    }
    if lists.is_empty() {
        println!("No lists found.");
        return Ok(());
    }

    println!("{:<4} {:<28} {:<10} {:>6} {:>7}", "ID", "Name", "Status", "Fields", "Leads");
    println!("{}", "-".repeat(59));
    for list in &lists {
        let id = list.id.unwrap_or_default();
        let leads: usize = ListRepo::status_counts(&conn, id)?.values().sum();
        println!(
            "{:<4} {:<28} {:<10} {:>6} {:>7}",
            id,
            list.name,
            list.status.as_str(),
            list.fields.len(),
            leads
        );
    }
    Ok(())
}

fn handle_list_show(list: String, json: bool) -> Result<()> {
    let conn = connect()?;
    let list = resolve_list(&conn, &list)?;
    let counts = ListRepo::status_counts(&conn, list.id.context("List has no id")?)?;

    if json {
        let counts: Map<String, Value> = LeadStatus::ALL
            .iter()
            .map(|status| (status.as_str().to_string(), Value::from(counts.get(status).copied().unwrap_or(0))))
            .collect();
        let output = serde_json::json!({ "list": list, "status_counts": counts });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("List {}: {} ({})", list.id.unwrap_or_default(), list.name, list.status.as_str());
    if let Some(description) = &list.description {
        println!("Description: {}", description);
    }
    println!("Created: {}", format_timestamp(list.created_ts));

    println!();
    println!("Fields:");
    if list.fields.is_empty() {
        println!("  (none)");
    }
    for field in &list.fields {
        println!("  {:<24} {}", field.name, field.kind.as_str());
    }

    // Only settings that differ from the defaults
    let settings = serde_json::to_value(&list.settings)?;
    let changed: Vec<(String, String)> = settings
        .as_object()
        .map(|map| {
            map.iter()
                .filter_map(|(key, value)| match value {
                    Value::Null | Value::Bool(false) => None,
                    Value::Array(items) if items.is_empty() => None,
                    Value::Array(items) => Some((
                        key.clone(),
                        items.iter().filter_map(|v| v.as_str()).collect::<Vec<_>>().join(","),
                    )),
                    Value::String(s) => Some((key.clone(), s.clone())),
                    other => Some((key.clone(), other.to_string())),
                })
                .collect()
        })
        .unwrap_or_default();
    if !changed.is_empty() {
        println!();
        println!("Settings:");
        for (key, value) in changed {
            println!("  {:<24} {}", key, value);
        }
    }

    println!();
    println!("Leads:");
    let mut total = 0;
    for status in LeadStatus::ALL {
        let count = counts.get(&status).copied().unwrap_or(0);
        total += count;
        if count > 0 {
            println!("  {:<10} {:>6}", status.as_str(), count);
        }
    }
    println!("  {:<10} {:>6}", "total", total);
    Ok(())
}

fn handle_list_set(list: String, key: String, value: String) -> Result<()> {
    let conn = connect()?;
    let list = resolve_list(&conn, &list)?;
    let list_id = list.id.context("List has no id")?;

    let mut settings = list.settings.clone();
    if let Err(e) = settings.set(&key, &value) {
        user_error(&e);
    }
    ListRepo::update_settings(&conn, list_id, &settings)?;

    if key == "is_blocklist" && list.status != ListStatus::Archived {
        let status = if settings.is_blocklist { ListStatus::Blocklist } else { ListStatus::Active };
        ListRepo::set_status(&conn, list_id, status)?;
    }
    println!("Set {}={} on list '{}'", key, value, list.name);
    Ok(())
}

// Campaigns

fn handle_campaigns(subcommand: CampaignCommands, agent: Option<&str>) -> Result<()> {
    let conn = connect()?;
    match subcommand {
        CampaignCommands::Add { name, description } => {
            if let Err(e) = validate_name(&name, "Campaign") {
                user_error(&e);
            }
            let campaign = CampaignRepo::create(&conn, &name, description.as_deref())?;
            println!("Created campaign '{}' (id: {})", campaign.name, campaign.id.unwrap_or_default());
        }
        CampaignCommands::List { all, json } => {
            let campaigns = CampaignRepo::list(&conn, !all)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&campaigns)?);
                return Ok(());
            }
            if campaigns.is_empty() {
                println!("No campaigns found.");
                return Ok(());
            }
            println!("{:<4} {:<28} {:<10} {}", "ID", "Name", "Status", "Created");
            println!("{}", "-".repeat(60));
            for campaign in campaigns {
                println!(
                    "{:<4} {:<28} {:<10} {}",
                    campaign.id.unwrap_or_default(),
                    campaign.name,
                    campaign.status.as_str(),
                    format_timestamp(campaign.created_ts)
                );
            }
        }
        CampaignCommands::Status { campaign, status } => {
            let campaign = resolve_campaign(&conn, &campaign)?;
            let new_status = CampaignStatus::from_str(&status.to_lowercase()).unwrap_or_else(|| {
                user_error(&format!("Invalid campaign status '{}'. Use active, paused or completed.", status))
            });
            CampaignRepo::set_status(&conn, campaign.id.context("Campaign has no id")?, new_status)?;
            println!(
                "Campaign '{}': {} -> {}",
                campaign.name,
                campaign.status.as_str(),
                new_status.as_str()
            );
        }
        CampaignCommands::Stats { campaign, json } => {
            let campaign = resolve_campaign(&conn, &campaign)?;
            let (_, ctx) = acting_agent(&conn, agent)?;
            let stats = CampaignRepo::stats(&conn, campaign.id.context("Campaign has no id")?, ctx.agent_id, ctx.now)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
                return Ok(());
            }
            println!("Campaign: {}", campaign.name);
            println!("Total leads:            {}", stats.total_leads);
            println!("Done:                   {:.1}%", stats.done_percentage);
            println!("Queued now:             {}", stats.queued_now);
            println!("Follow-ups now:         {}", stats.followups_now);
            println!("Follow-ups later today: {}", stats.followups_later_today);
        }
    }
    Ok(())
}

// Leads

fn handle_leads(subcommand: LeadCommands, agent: Option<&str>) -> Result<()> {
    match subcommand {
        LeadCommands::Add { list, campaign, attributes } => handle_lead_add(list, campaign, attributes),
        LeadCommands::Import { file, list, create, campaign } => handle_lead_import(file, list, create, campaign),
        LeadCommands::List { list, campaign, status, mine, limit, json } => {
            handle_lead_list(list, campaign, status, mine, limit, json, agent)
        }
        LeadCommands::Show { lead_id, json } => handle_lead_show(lead_id, json),
        LeadCommands::Status { lead_id, status } => {
            let conn = connect()?;
            let id = require_lead(&conn, &lead_id)?;
            let new_status = LeadStatus::from_str(&status.to_lowercase())
                .ok_or_else(|| CrmError::InvalidStatus(status.clone()))?;
            let lead = LeadRepo::require(&conn, id)?;
            LeadRepo::set_status(&conn, id, new_status)?;
            println!("Lead {}: {} -> {}", id, lead.status.as_str(), new_status.as_str());
            Ok(())
        }
        LeadCommands::Callback { lead_id, when } => {
            let conn = connect()?;
            let id = require_lead(&conn, &lead_id)?;
            if when == "clear" {
                LeadRepo::schedule_callback(&conn, id, None)?;
                println!("Cleared callback for lead {}", id);
            } else {
                let at = parse_when(&when, now()).unwrap_or_else(|e| user_error(&e.to_string()));
                LeadRepo::schedule_callback(&conn, id, Some(at))?;
                println!("Callback for lead {} scheduled at {}", id, format_timestamp(at));
            }
            Ok(())
        }
        LeadCommands::Assign { lead_id, to, campaign } => handle_lead_assign(lead_id, to, campaign),
        LeadCommands::Delete { lead_id, yes } => {
            let conn = connect()?;
            let id = require_lead(&conn, &lead_id)?;
            if !yes && !confirm(&format!("Delete lead {} with its call and SMS history?", id))? {
                println!("Cancelled.");
                return Ok(());
            }
            LeadRepo::delete(&conn, id)?;
            println!("Deleted lead {}", id);
            Ok(())
        }
    }
}

fn handle_lead_add(list: String, campaign: Option<String>, attributes: Vec<String>) -> Result<()> {
    let mut data = Map::new();
    for attr in &attributes {
        let (key, value) = parse_key_value(attr).unwrap_or_else(|e| user_error(&e));
        data.insert(key, Value::String(value));
    }

    let conn = connect()?;
    let list = resolve_list(&conn, &list)?;
    let campaign_id = match campaign {
        Some(c) => resolve_campaign(&conn, &c)?.id,
        None => None,
    };
    let lead = LeadRepo::create(&conn, data, list.id, campaign_id)?;
    println!("Created lead {} in list '{}'", lead.id.unwrap_or_default(), list.name);
    Ok(())
}

fn handle_lead_import(file: String, list: String, create: bool, campaign: Option<String>) -> Result<()> {
    let content = std::fs::read_to_string(&file)
        .unwrap_or_else(|e| user_error(&format!("Cannot read '{}': {}", file, e)));
    let table = parse_csv(&content)?;

    let conn = connect()?;
    let list = match ListRepo::get_by_name(&conn, &list)? {
        Some(existing) => existing,
        None if create && list.parse::<i64>().is_err() => {
            if let Err(e) = validate_name(&list, "List") {
                user_error(&e);
            }
            ListRepo::create(&conn, &list, None, &table.fields())?
        }
        None => resolve_list(&conn, &list)?,
    };
    let list_id = list.id.context("List has no id")?;
    if list.fields.is_empty() {
        ListRepo::update_fields(&conn, list_id, &table.fields())?;
    }

    let campaign_id = match campaign {
        Some(c) => resolve_campaign(&conn, &c)?.id,
        None => None,
    };

    let summary = LeadRepo::import_rows(&conn, list_id, campaign_id, &table.rows)?;
    println!("Imported {} leads into list '{}'", summary.imported, list.name);
    if summary.skipped > 0 {
        println!("Skipped {} blank rows", summary.skipped);
    }
    Ok(())
}

fn handle_lead_list(
    list: Option<String>,
    campaign: Option<String>,
    status: Option<String>,
    mine: bool,
    limit: Option<usize>,
    json: bool,
    agent: Option<&str>,
) -> Result<()> {
    let conn = connect()?;
    let mut filter = LeadFilter { limit, ..Default::default() };

    let mut schema = Vec::new();
    if let Some(list) = list {
        let list = resolve_list(&conn, &list)?;
        schema = list.field_names();
        filter.list_id = list.id;
    }
    if let Some(campaign) = campaign {
        filter.campaign_id = resolve_campaign(&conn, &campaign)?.id;
    }
    if let Some(status) = status {
        filter.status = Some(
            LeadStatus::from_str(&status.to_lowercase()).ok_or(CrmError::InvalidStatus(status))?,
        );
    }
    if mine {
        let (_, ctx) = acting_agent(&conn, agent)?;
        filter.claimed_by = Some(ctx.agent_id);
    }

    let leads = LeadRepo::list(&conn, &filter)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&leads)?);
        return Ok(());
    }
    if leads.is_empty() {
        println!("No leads found.");
        return Ok(());
    }
    print!("{}", format_lead_table(&leads, &schema, &agent_names(&conn)?, now()));
    Ok(())
}

fn handle_lead_show(lead_id: String, json: bool) -> Result<()> {
    let conn = connect()?;
    let id = require_lead(&conn, &lead_id)?;
    let lead = LeadRepo::require(&conn, id)?;
    let calls = ActivityRepo::calls_for_lead(&conn, id)?;
    let messages = ActivityRepo::sms_for_lead(&conn, id)?;

    if json {
        let output = serde_json::json!({ "lead": lead, "calls": calls, "sms": messages });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    let list = match lead.list_id {
        Some(list_id) => ListRepo::get_by_id(&conn, list_id)?,
        None => None,
    };
    print!(
        "{}",
        format_lead_detail(&lead, list.as_ref(), &calls, &messages, &agent_names(&conn)?, now())
    );
    Ok(())
}

fn handle_lead_assign(lead_id: String, to: Option<String>, campaign: Option<String>) -> Result<()> {
    if to.is_none() && campaign.is_none() {
        user_error("Nothing to change. Pass --to <agent|none> and/or --campaign <campaign|none>.");
    }
    let conn = connect()?;
    let id = require_lead(&conn, &lead_id)?;

    if let Some(to) = to {
        if to == "none" {
            LeadRepo::assign(&conn, id, None)?;
            println!("Unassigned lead {}", id);
        } else {
            let agent = resolve_agent(&conn, &to)?;
            LeadRepo::assign(&conn, id, agent.id)?;
            println!("Assigned lead {} to {}", id, agent.name);
        }
    }
    if let Some(campaign) = campaign {
        if campaign == "none" {
            LeadRepo::set_campaign(&conn, id, None)?;
            println!("Removed lead {} from its campaign", id);
        } else {
            let campaign = resolve_campaign(&conn, &campaign)?;
            LeadRepo::set_campaign(&conn, id, campaign.id)?;
            println!("Moved lead {} to campaign '{}'", id, campaign.name);
        }
    }
    Ok(())
}

// VAT

fn handle_vat(number: String, json: bool) -> Result<()> {
    let check = check_vat(&number);
    if json {
        println!("{}", serde_json::to_string_pretty(&check)?);
        return Ok(());
    }
    if !check.valid {
        user_error(&format!(
            "'{}': {}",
            number,
            check.error.unwrap_or_else(|| "Invalid VAT number".to_string())
        ));
    }
    let registry = if check.vies { "EU VIES member" } else { "not in VIES" };
    println!("{}{}: valid format ({})", check.country_code, check.vat_number, registry);
    Ok(())
}

// Status

fn handle_status(json: bool, agent: Option<&str>) -> Result<()> {
    let conn = connect()?;
    let config = Config::load()?;
    let (agent, ctx) = acting_agent(&conn, agent)?;
    let dashboard = compute_dashboard(&conn, &agent, ctx, config.callbacks_limit)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&dashboard)?);
    } else {
        print!("{}", format_dashboard(&dashboard, ctx.now));
    }
    Ok(())
}
