//! Fare calculation and reference-data engine for a regional mobility
//! companion app.
//!
//! The crate is the decision-making core behind a trip-fare screen:
//! [`infra::remote`] pulls the reference datasets (locations, routes,
//! surcharge catalog) from their remote sources, [`infra::cache`] keeps
//! them on disk with a freshness window so the app works offline,
//! [`domain`] holds the operator registry and the fare engine, and
//! [`app::FareApp`] ties the pieces together for a presentation shell.

pub mod app;
pub mod domain;
pub mod infra;
pub mod util;

pub use app::{CalculationView, Debouncer, FareApp, CACHE_TTL};
pub use domain::{
    compute_fare, FareError, FareQuote, Location, LocationId, OperationError, OperationRequest,
    OperationResult, Operator, Outcome, RouteEntry, SurchargeRule,
};
pub use infra::{Dataset, DatasetClient, FetchError, ReferenceCache, SourceConfig, StoreError};
pub use util::format_amount;
