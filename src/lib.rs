//! callq - a cold-calling lead ledger for the command line
//!
//! This library provides the core functionality for callq, including:
//! - Database operations and migrations
//! - Data models for leads, lists, campaigns, agents and call history
//! - Repository layer for data access, claims and transactional dedupe
//! - The work queue selector and the duplicate grouper
//! - CSV import and VAT format checks
//! - CLI command parsing and execution
//!
//! # Example
//!
//! ```no_run
//! use callq::cli::run;
//!
//! fn main() {
//!     if let Err(e) = run() {
//!         eprintln!("Error: {}", e);
//!         std::process::exit(1);
//!     }
//! }
//! ```

pub mod cli;
pub mod config;
pub mod db;
pub mod dedupe;
pub mod error;
pub mod import;
pub mod models;
pub mod queue;
pub mod repo;
pub mod utils;
pub mod vat;
