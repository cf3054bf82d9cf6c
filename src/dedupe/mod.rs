//! Duplicate detection and resolution
//!
//! - [`normalize`]: phone/email aware value normalization
//! - [`grouper`]: composite-key grouping of leads
//! - [`resolve`]: keep-one, merge and bulk resolution plans
//!
//! Everything here is pure. Plans are executed by
//! [`DedupeRepo`](crate::repo::DedupeRepo) inside a single transaction.

pub mod grouper;
pub mod normalize;
pub mod resolve;

pub use grouper::{total_members, DuplicateGroup, DuplicateGrouper};
pub use normalize::{Normalizer, ValueKind, MIN_MATCH_LEN};
pub use resolve::{merge_attributes, plan_bulk, plan_keep, plan_merge, plan_with, BulkStrategy, ResolutionPlan};
