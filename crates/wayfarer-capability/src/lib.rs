//! Travel capabilities for Wayfarer.
//!
//! Each capability answers one kind of traveller request (weather,
//! currency exchange, flight search, booking form) behind the
//! [`Capability`] trait, and the [`CapabilityRegistry`] gives the router
//! its menu of names and descriptions.

pub mod error;
pub mod exchange;
pub mod flight;
pub mod form;
pub mod geo;
pub mod registry;
pub mod weather;

mod http;

pub use error::CapabilityError;
pub use exchange::ExchangeCapability;
pub use flight::FlightCapability;
pub use form::FormCapability;
pub use geo::{GeoCache, GeoInfo, GeoLocator};
pub use registry::{Capability, CapabilityRegistry};
pub use weather::WeatherCapability;
