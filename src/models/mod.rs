// Core data models for callq
// These structs represent the domain entities

pub mod agent;
pub mod campaign;
pub mod lead;
pub mod list;
pub mod activity;

pub use agent::*;
pub use campaign::*;
pub use lead::*;
pub use list::*;
pub use activity::*;
