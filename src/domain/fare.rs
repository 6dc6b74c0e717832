//! Route lookup and the surcharge fold that produces the final fare.

use thiserror::Error;

use super::entities::{RouteEntry, SurchargeRule};
use super::operations::parse_number;

/// Why a calculation was aborted. Messages are shown to the user as-is.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum FareError {
    #[error("Origem não encontrada")]
    OriginNotFound,
    #[error("Destino não encontrado")]
    DestinationNotFound,
    #[error("Valor inválido para esta rota")]
    InvalidFareQuote,
}

/// Resolve the base fare for `origin_id` → `destination_id` and fold the
/// selected surcharges over it, in the order given.
///
/// Lookup and base-fare validation failures abort the whole calculation;
/// a malformed surcharge selection (index out of range, unknown operator,
/// a step that would produce a non-finite total) is skipped silently so
/// one bad optional entry cannot block the result.
pub fn compute_fare(
    routes: &[RouteEntry],
    surcharges: &[SurchargeRule],
    origin_id: &str,
    destination_id: &str,
    selected: &[usize],
) -> Result<f64, FareError> {
    let entry = routes
        .iter()
        .find(|route| route.origin_id == origin_id)
        .ok_or(FareError::OriginNotFound)?;
    let quote = entry
        .destinations
        .get(destination_id)
        .ok_or(FareError::DestinationNotFound)?;

    let base = parse_number(&quote.base_value);
    if !base.is_finite() || base <= 0.0 {
        return Err(FareError::InvalidFareQuote);
    }

    let mut total = base;
    for &index in selected {
        let Some(rule) = surcharges.get(index) else {
            continue;
        };
        let Some(next) = apply_surcharge(total, &rule.operator, parse_number(&rule.magnitude))
        else {
            continue;
        };
        total = next;
    }
    Ok(total)
}

/// One fold step of the surcharge-composition operator set. `%` here is
/// additive ("add `magnitude` percent of the running total"), unlike the
/// registry's standalone percentage operator. `None` marks a step that
/// must be skipped.
fn apply_surcharge(total: f64, operator: &str, magnitude: f64) -> Option<f64> {
    let next = match operator {
        "+" => total + magnitude,
        "-" => total - magnitude,
        "*" => total * magnitude,
        "/" => total / magnitude,
        "%" => total + total * magnitude / 100.0,
        _ => return None,
    };
    next.is_finite().then_some(next)
}
