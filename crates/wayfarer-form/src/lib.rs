//! Conversational booking form for Wayfarer.
//!
//! Collects structured trip details over several turns: each turn extracts
//! new values from the traveller's message, merges them into the caller's
//! [`FormRecord`], and then either asks about what is still missing or
//! thanks the traveller once the record is complete.

pub mod collector;
pub mod error;
pub mod prompts;
pub mod record;
pub mod schema;

pub use collector::{parse_extraction, FormCollector, FormTurn};
pub use error::FormError;
pub use record::{humanize_field_name, is_truthy, FormRecord, END_DATE_KEY, START_DATE_KEY};
pub use schema::{FieldKind, FormSchema};
