pub mod date;
pub mod duration;
pub mod fuzzy;

pub use date::parse_when;
pub use duration::{format_duration_short, parse_duration};
