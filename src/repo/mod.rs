pub mod activity;
pub mod agent;
pub mod campaign;
pub mod claim;
pub mod dedupe;
pub mod lead;
pub mod list;
pub mod queue;

pub use activity::*;
pub use agent::*;
pub use campaign::*;
pub use claim::*;
pub use dedupe::*;
pub use lead::{ImportSummary, LeadFilter, LeadRepo};
pub use list::*;
pub use queue::*;
