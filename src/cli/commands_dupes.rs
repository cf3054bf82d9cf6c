// Duplicate finding and resolution commands

use clap::{Args, Subcommand};
use rusqlite::Connection;
use crate::config::Config;
use crate::dedupe::{plan_bulk, plan_keep, plan_merge, BulkStrategy, DuplicateGroup, DuplicateGrouper, Normalizer, ResolutionPlan};
use crate::models::LeadList;
use crate::repo::DedupeRepo;
use crate::cli::commands::{connect, require_lead, resolve_list};
use crate::cli::error::{parse_field_list, user_error};
use crate::cli::output::{format_groups, format_plans};
use anyhow::{Context, Result};

/// Which leads count as duplicates of each other
#[derive(Args, Debug, Clone)]
pub struct MatchArgs {
    /// Comparison fields, comma separated (default: the list's dedupe_fields)
    #[arg(long)]
    pub fields: Option<String>,
    /// Only groups with a member in this list; its schema types the fields
    #[arg(long)]
    pub list: Option<String>,
    /// Only groups whose members are all in --list
    #[arg(long, requires = "list")]
    pub internal: bool,
}

#[derive(Subcommand)]
pub enum DupesCommands {
    /// Show duplicate groups
    Find {
        #[command(flatten)]
        matching: MatchArgs,
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
    /// Keep one lead of its duplicate group and delete the others
    Keep {
        /// Lead ID to keep
        lead_id: String,
        #[command(flatten)]
        matching: MatchArgs,
        /// Apply the change (default is a dry run)
        #[arg(long)]
        execute: bool,
    },
    /// Merge a lead's duplicate group into its oldest member
    Merge {
        /// Any lead ID in the group
        lead_id: String,
        #[command(flatten)]
        matching: MatchArgs,
        /// Apply the change (default is a dry run)
        #[arg(long)]
        execute: bool,
    },
    /// Resolve every group with one strategy
    Bulk {
        /// merge, keep-oldest or keep-newest
        #[arg(long)]
        strategy: String,
        #[command(flatten)]
        matching: MatchArgs,
        /// Apply the changes (default is a dry run)
        #[arg(long)]
        execute: bool,
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
}

pub fn handle_dupes(subcommand: DupesCommands) -> Result<()> {
    let conn = connect()?;
    match subcommand {
        DupesCommands::Find { matching, json } => {
            let (grouper, list) = build_grouper(&conn, &matching)?;
            let groups = DedupeRepo::find(&conn, &grouper, list.as_ref().and_then(|l| l.id))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&groups)?);
                return Ok(());
            }
            let schema = list.map(|l| l.field_names()).unwrap_or_default();
            println!("Matching on: {}", grouper.fields().join(", "));
            print!("{}", format_groups(&groups, &schema));
        }
        DupesCommands::Keep { lead_id, matching, execute } => {
            let id = require_lead(&conn, &lead_id)?;
            let (grouper, _) = build_grouper(&conn, &matching)?;
            let group = group_of(&conn, &grouper, id)?;
            let plan = plan_keep(&group, id)?;
            resolve(&conn, vec![plan], execute)?;
        }
        DupesCommands::Merge { lead_id, matching, execute } => {
            let id = require_lead(&conn, &lead_id)?;
            let (grouper, _) = build_grouper(&conn, &matching)?;
            let group = group_of(&conn, &grouper, id)?;
            let plan = plan_merge(&group).context("Duplicate group has no stored leads")?;
            resolve(&conn, vec![plan], execute)?;
        }
        DupesCommands::Bulk { strategy, matching, execute, json } => {
            let strategy = BulkStrategy::from_str(&strategy).unwrap_or_else(|| {
                user_error(&format!(
                    "Invalid strategy '{}'. Use merge, keep-oldest or keep-newest.",
                    strategy
                ))
            });
            let (grouper, list) = build_grouper(&conn, &matching)?;
            let scope = list.as_ref().and_then(|l| l.id);
            let groups = DedupeRepo::find(&conn, &grouper, scope)?;
            let plans = plan_bulk(&groups, strategy, scope);
            log::debug!("bulk {}: {} plans from {} groups", strategy.as_str(), plans.len(), groups.len());

            if json {
                let summary = if execute { Some(DedupeRepo::apply(&conn, &plans)?) } else { None };
                let output = serde_json::json!({
                    "strategy": strategy.as_str(),
                    "executed": execute,
                    "plans": plans,
                    "summary": summary,
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
                return Ok(());
            }
            resolve(&conn, plans, execute)?;
        }
    }
    Ok(())
}

/// Grouper from `--fields`, falling back to the list's saved dedupe fields
fn build_grouper(conn: &Connection, matching: &MatchArgs) -> Result<(DuplicateGrouper, Option<LeadList>)> {
    let config = Config::load()?;
    let list = match &matching.list {
        Some(list) => Some(resolve_list(conn, list)?),
        None => None,
    };
    let fields = match &matching.fields {
        Some(fields) => parse_field_list(fields),
        None => list.as_ref().map(|l| l.settings.dedupe_fields.clone()).unwrap_or_default(),
    };

    let mut grouper = DuplicateGrouper::new(&fields, Normalizer::new(&config.country_prefix))?;
    if let Some(list) = &list {
        grouper = grouper.with_schema(list);
        if matching.internal || list.settings.dedupe_internal_only {
            grouper = grouper.internal_only(list.id.context("List has no id")?);
        }
    }
    Ok((grouper, list))
}

fn group_of(conn: &Connection, grouper: &DuplicateGrouper, lead_id: i64) -> Result<DuplicateGroup> {
    let groups = DedupeRepo::find(conn, grouper, None)?;
    match groups.into_iter().find(|group| group.contains(lead_id)) {
        Some(group) => Ok(group),
        None => user_error(&format!(
            "Lead {} has no duplicates on {}",
            lead_id,
            grouper.fields().join(", ")
        )),
    }
}

fn resolve(conn: &Connection, plans: Vec<ResolutionPlan>, execute: bool) -> Result<()> {
    if plans.is_empty() {
        println!("No duplicates to resolve.");
        return Ok(());
    }
    if !execute {
        print!("{}", format_plans(&plans, false));
        return Ok(());
    }

    let summary = DedupeRepo::apply(conn, &plans)?;
    print!("{}", format_plans(&plans, true));
    if summary.merged > 0 {
        println!("{} groups merged.", summary.merged);
    }
    Ok(())
}
