//! Domain logic for fare calculation lives here.

pub mod entities;
pub mod fare;
pub mod operations;

pub use entities::{FareQuote, Location, LocationId, RouteEntry, SurchargeRule};
pub use fare::{compute_fare, FareError};
pub use operations::{
    OperationError, OperationReport, OperationRequest, OperationResult, Operator, Outcome,
    WEEKDAY_NAMES,
};
