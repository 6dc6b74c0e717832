//! Display formatting for fare amounts.

/// Format an amount for display: two fixed decimals, comma as the
/// decimal separator ("1234,56"). The currency symbol is the
/// presentation layer's concern.
pub fn format_amount(value: f64) -> String {
    format!("{value:.2}").replace('.', ",")
}
