use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Identifier shared by locations and route endpoints.
///
/// Upstream payloads carry ids as strings or bare numbers; the loader
/// normalizes both to strings so lookups compare uniformly.
pub type LocationId = String;

/// A place the service can pick up or drop off.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub id: LocationId,
    /// Human-readable display label, possibly composed from several
    /// source fields ("LOCAL, BAIRRO, CIDADE-UF") during normalization.
    pub label: String,
}

/// Base fare quoted for one origin → destination pair.
///
/// The value is kept as received; it only becomes a number at
/// calculation time, where anything that is not a finite positive
/// float invalidates the route.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FareQuote {
    pub base_value: String,
}

/// All destinations reachable from one origin, keyed by destination id.
///
/// Destination keys are expected to reference known `Location` ids;
/// entries that don't are simply never offered.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteEntry {
    pub origin_id: LocationId,
    pub destinations: HashMap<LocationId, FareQuote>,
}

/// Optional fare adjustment offered on the checklist ("+10%", "-R$5").
///
/// `magnitude` stays raw for the same reason as `FareQuote::base_value`:
/// parsing happens at application time and a malformed entry is skipped
/// there instead of poisoning the whole catalog.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurchargeRule {
    pub name: String,
    /// Operator symbol ("+", "-", "*", "/", "%").
    pub operator: String,
    pub magnitude: String,
}

impl SurchargeRule {
    /// Short display form the checklist renders next to the name, e.g. "10%".
    pub fn display_value(&self) -> String {
        format!("{}{}", self.magnitude, self.operator)
    }
}
