//! Request orchestration for Wayfarer.
//!
//! A traveller's message is routed to one or more capabilities, each chosen
//! capability runs at most once, and the collected answers are combined
//! into a single reply. Everything happens sequentially within a request.

pub mod combiner;
pub mod dispatch;
pub mod error;
pub mod orchestrator;
pub mod router;
pub mod state;

pub use combiner::{Combiner, NO_INFORMATION};
pub use dispatch::{error_marker, next_step, validate_routes, Step};
pub use error::ChatError;
pub use orchestrator::{validate_input, TravelAgent};
pub use router::{parse_routes, Router};
pub use state::{CapabilityResults, ConversationState};
