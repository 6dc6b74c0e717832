//! Operator registry: arithmetic and date-rule computations.
//!
//! Every operator is a pure function over an [`OperationRequest`] and
//! fails closed — invalid input comes back as an [`OperationError`],
//! never a panic. Numeric operands arrive as raw strings and anything
//! that does not parse as a float is the invalid-input signal.

use thiserror::Error;
use time::format_description::well_known::Iso8601;
use time::Date;

/// Weekday display names, Sunday-first. Index 7 is the reserved holiday
/// placeholder and is never produced by the weekday branch.
pub const WEEKDAY_NAMES: [&str; 8] = [
    "Domingo",
    "Segunda-feira",
    "Terça-feira",
    "Quarta-feira",
    "Quinta-feira",
    "Sexta-feira",
    "Sábado",
    "Feriado",
];

/// A registered computation rule, addressed by its wire symbol.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operator {
    Add,
    Subtract,
    Multiply,
    Divide,
    PercentOf,
    /// `dia`: succeeds when two dates share a weekday, then delegates
    /// to a nested percentage computation.
    WeekdayMatch,
    /// `feriado`: succeeds when a date lands on a listed holiday
    /// (month + day, year-independent), then delegates to a named
    /// nested operator.
    HolidayMatch,
}

impl Operator {
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "+" => Some(Self::Add),
            "-" => Some(Self::Subtract),
            "*" => Some(Self::Multiply),
            "/" => Some(Self::Divide),
            "%" => Some(Self::PercentOf),
            "dia" => Some(Self::WeekdayMatch),
            "feriado" => Some(Self::HolidayMatch),
            _ => None,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Subtract => "-",
            Self::Multiply => "*",
            Self::Divide => "/",
            Self::PercentOf => "%",
            Self::WeekdayMatch => "dia",
            Self::HolidayMatch => "feriado",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Add => "soma",
            Self::Subtract => "subtração",
            Self::Multiply => "multiplicação",
            Self::Divide => "divisão",
            Self::PercentOf => "porcentagem",
            Self::WeekdayMatch => "dia da semana",
            Self::HolidayMatch => "feriado",
        }
    }

    pub fn evaluate(&self, request: &OperationRequest<'_>) -> OperationReport {
        match self {
            Self::Add => add(request),
            Self::Subtract => subtract(request),
            Self::Multiply => multiply(request),
            Self::Divide => divide(request),
            Self::PercentOf => percent_of(request),
            Self::WeekdayMatch => weekday_match(request),
            Self::HolidayMatch => holiday_match(request),
        }
    }
}

/// Named inputs for one evaluation. Only the fields an operator reads
/// need to be populated; the rest stay at their defaults.
#[derive(Clone, Copy, Debug, Default)]
pub struct OperationRequest<'a> {
    pub amount: &'a str,
    pub value: &'a str,
    /// Reference date for the date rules, ISO-8601.
    pub date: Option<&'a str>,
    /// Target date for the weekday rule, ISO-8601.
    pub target_date: Option<&'a str>,
    /// Holiday calendar for the holiday rule; entries that fail to
    /// parse never match.
    pub holidays: &'a [String],
    /// Operator symbol the holiday rule delegates to.
    pub nested: Option<&'a str>,
}

/// What an evaluation produced, or why it failed.
pub type OperationReport = Result<OperationResult, OperationError>;

#[derive(Clone, Debug, PartialEq)]
pub struct OperationResult {
    pub message: String,
    pub outcome: Outcome,
}

/// Tagged result payload. The arithmetic operators yield a plain number
/// and say whether it replaces the running total; the conditional
/// operators wrap a delegate's full report instead.
#[derive(Clone, Debug, PartialEq)]
pub enum Outcome {
    Arithmetic { value: f64, replaces_base: bool },
    ConditionalWithNested { nested: Box<OperationReport> },
}

impl OperationResult {
    /// Numeric value of an arithmetic outcome, if this is one.
    pub fn arithmetic_value(&self) -> Option<f64> {
        match self.outcome {
            Outcome::Arithmetic { value, .. } => Some(value),
            Outcome::ConditionalWithNested { .. } => None,
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum OperationError {
    /// Operands, dates, or the nested-operator name did not parse.
    #[error("{0}")]
    InvalidInput(String),
    /// Inputs were well-formed but the rule's precondition did not hold
    /// (different weekdays, date is not a holiday).
    #[error("{0}")]
    ConditionNotMet(String),
}

/// Locale-agnostic float parsing; NaN is the universal invalid signal.
pub(crate) fn parse_number(raw: &str) -> f64 {
    raw.trim().parse::<f64>().unwrap_or(f64::NAN)
}

fn parse_date(raw: &str) -> Option<Date> {
    Date::parse(raw.trim(), &Iso8601::DEFAULT).ok()
}

fn invalid(message: &str) -> OperationError {
    OperationError::InvalidInput(message.to_string())
}

fn add(request: &OperationRequest<'_>) -> OperationReport {
    let amount = parse_number(request.amount);
    let value = parse_number(request.value);
    // Known asymmetry kept from production behavior: bad operands yield
    // a successful zero here, while the sibling operators fail.
    if amount.is_nan() || value.is_nan() {
        return Ok(OperationResult {
            message: String::new(),
            outcome: Outcome::Arithmetic {
                value: 0.0,
                replaces_base: true,
            },
        });
    }
    Ok(OperationResult {
        message: "Soma realizada com sucesso".to_string(),
        outcome: Outcome::Arithmetic {
            value: amount + value,
            replaces_base: true,
        },
    })
}

fn subtract(request: &OperationRequest<'_>) -> OperationReport {
    let amount = parse_number(request.amount);
    let value = parse_number(request.value);
    if amount.is_nan() || value.is_nan() {
        return Err(invalid("Valores inválidos para subtração"));
    }
    Ok(OperationResult {
        message: "Subtração realizada com sucesso".to_string(),
        outcome: Outcome::Arithmetic {
            value: amount - value,
            replaces_base: true,
        },
    })
}

fn multiply(request: &OperationRequest<'_>) -> OperationReport {
    let amount = parse_number(request.amount);
    let value = parse_number(request.value);
    if amount.is_nan() || value.is_nan() {
        return Err(invalid("Valores inválidos para multiplicação"));
    }
    Ok(OperationResult {
        message: "Multiplicação realizada com sucesso".to_string(),
        outcome: Outcome::Arithmetic {
            value: amount * value,
            replaces_base: true,
        },
    })
}

fn divide(request: &OperationRequest<'_>) -> OperationReport {
    let amount = parse_number(request.amount);
    let value = parse_number(request.value);
    if amount.is_nan() || value.is_nan() || value == 0.0 {
        return Err(invalid("Valores inválidos para divisão"));
    }
    Ok(OperationResult {
        message: "Divisão realizada com sucesso".to_string(),
        outcome: Outcome::Arithmetic {
            value: amount / value,
            replaces_base: true,
        },
    })
}

/// `value`% of `amount`, valid only for value ∈ (0, 100] and a positive
/// amount. Informational: the result never replaces the running total.
fn percent_of(request: &OperationRequest<'_>) -> OperationReport {
    let amount = parse_number(request.amount);
    let value = parse_number(request.value);
    if amount.is_nan() || value.is_nan() {
        return Err(invalid("Valores inválidos para porcentagem"));
    }
    if value > 0.0 && value <= 100.0 && amount > 0.0 {
        return Ok(OperationResult {
            message: "Porcentagem realizada com sucesso".to_string(),
            outcome: Outcome::Arithmetic {
                value: amount * value / 100.0,
                replaces_base: false,
            },
        });
    }
    Err(invalid("Valores inválidos para porcentagem"))
}

fn weekday_match(request: &OperationRequest<'_>) -> OperationReport {
    let (Some(date_raw), Some(target_raw)) = (request.date, request.target_date) else {
        return Err(invalid("Data ou data alvo inválida"));
    };
    let (Some(date), Some(target)) = (parse_date(date_raw), parse_date(target_raw)) else {
        return Err(invalid("Data ou data alvo inválida"));
    };

    let weekday = date.weekday().number_days_from_sunday() as usize;
    if weekday != target.weekday().number_days_from_sunday() as usize {
        return Err(OperationError::ConditionNotMet(
            "Dias da semana diferentes".to_string(),
        ));
    }

    let nested = Operator::PercentOf.evaluate(&OperationRequest {
        amount: request.amount,
        value: request.value,
        ..Default::default()
    });
    Ok(OperationResult {
        message: format!("O dia da semana é {}", WEEKDAY_NAMES[weekday]),
        outcome: Outcome::ConditionalWithNested {
            nested: Box::new(nested),
        },
    })
}

fn holiday_match(request: &OperationRequest<'_>) -> OperationReport {
    let Some(date_raw) = request.date else {
        return Err(invalid("Data ou feriados inválidos"));
    };
    let Some(date) = parse_date(date_raw) else {
        return Err(invalid("Data inválida"));
    };

    // Month + day match, year-independent.
    let is_holiday = request
        .holidays
        .iter()
        .filter_map(|raw| parse_date(raw))
        .any(|holiday| holiday.month() == date.month() && holiday.day() == date.day());
    if !is_holiday {
        return Err(OperationError::ConditionNotMet(
            "O dia não é um feriado".to_string(),
        ));
    }

    let delegate = request
        .nested
        .and_then(Operator::from_symbol)
        .ok_or_else(|| invalid("Operador aninhado inválido"))?;
    let nested = delegate.evaluate(&OperationRequest {
        amount: request.amount,
        value: request.value,
        ..Default::default()
    });
    Ok(OperationResult {
        message: "O dia é um feriado".to_string(),
        outcome: Outcome::ConditionalWithNested {
            nested: Box::new(nested),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numeric(amount: &'static str, value: &'static str) -> OperationRequest<'static> {
        OperationRequest {
            amount,
            value,
            ..Default::default()
        }
    }

    #[test]
    fn divide_splits_the_amount() {
        let report = Operator::Divide.evaluate(&numeric("90", "3"));
        let result = report.expect("division should succeed");
        assert_eq!(result.arithmetic_value(), Some(30.0));
    }

    #[test]
    fn divide_by_zero_fails() {
        let report = Operator::Divide.evaluate(&numeric("90", "0"));
        assert!(matches!(report, Err(OperationError::InvalidInput(_))));
    }

    #[test]
    fn percentage_within_range() {
        let result = Operator::PercentOf
            .evaluate(&numeric("200", "15"))
            .expect("percentage should succeed");
        assert_eq!(result.arithmetic_value(), Some(30.0));
        assert!(matches!(
            result.outcome,
            Outcome::Arithmetic {
                replaces_base: false,
                ..
            }
        ));
    }

    #[test]
    fn percentage_rejects_out_of_range_inputs() {
        for (amount, value) in [("200", "0"), ("200", "101"), ("0", "10"), ("-5", "10")] {
            let report = Operator::PercentOf.evaluate(&numeric(amount, value));
            assert!(report.is_err(), "({amount}, {value}) should fail");
        }
    }

    // Known asymmetry: addition alone succeeds with zero on unparseable
    // input, where its siblings fail.
    #[test]
    fn addition_yields_zero_on_unparseable_input() {
        let result = Operator::Add
            .evaluate(&numeric("abc", "5"))
            .expect("addition never fails on bad input");
        assert_eq!(result.arithmetic_value(), Some(0.0));

        let report = Operator::Subtract.evaluate(&numeric("abc", "5"));
        assert!(report.is_err());
    }

    #[test]
    fn weekday_match_reports_name_and_nests_percentage() {
        // Both Mondays.
        let result = Operator::WeekdayMatch
            .evaluate(&OperationRequest {
                amount: "200",
                value: "10",
                date: Some("2025-07-14"),
                target_date: Some("2025-07-21"),
                ..Default::default()
            })
            .expect("matching weekdays should succeed");

        assert_eq!(result.message, "O dia da semana é Segunda-feira");
        let Outcome::ConditionalWithNested { nested } = result.outcome else {
            panic!("expected a nested outcome");
        };
        let inner = nested.expect("nested percentage should succeed");
        assert_eq!(inner.arithmetic_value(), Some(20.0));
    }

    #[test]
    fn weekday_mismatch_fails() {
        let report = Operator::WeekdayMatch.evaluate(&OperationRequest {
            amount: "200",
            value: "10",
            date: Some("2025-07-14"),
            target_date: Some("2025-07-15"),
            ..Default::default()
        });
        assert_eq!(
            report,
            Err(OperationError::ConditionNotMet(
                "Dias da semana diferentes".to_string()
            ))
        );
    }

    #[test]
    fn weekday_match_requires_both_dates() {
        let report = Operator::WeekdayMatch.evaluate(&OperationRequest {
            amount: "200",
            value: "10",
            date: Some("2025-07-14"),
            ..Default::default()
        });
        assert!(matches!(report, Err(OperationError::InvalidInput(_))));

        let report = Operator::WeekdayMatch.evaluate(&OperationRequest {
            amount: "200",
            value: "10",
            date: Some("not-a-date"),
            target_date: Some("2025-07-14"),
            ..Default::default()
        });
        assert!(matches!(report, Err(OperationError::InvalidInput(_))));
    }

    #[test]
    fn holiday_match_wraps_the_delegate_result() {
        let holidays = vec!["2000-12-25".to_string()];
        let result = Operator::HolidayMatch
            .evaluate(&OperationRequest {
                amount: "100",
                value: "10",
                date: Some("2025-12-25"),
                holidays: &holidays,
                nested: Some("+"),
                ..Default::default()
            })
            .expect("holiday match should succeed");

        assert_eq!(result.message, "O dia é um feriado");
        let Outcome::ConditionalWithNested { nested } = result.outcome else {
            panic!("expected a nested outcome");
        };
        let inner = nested.expect("nested addition should succeed");
        assert_eq!(inner.arithmetic_value(), Some(110.0));
    }

    #[test]
    fn holiday_match_ignores_unparseable_calendar_entries() {
        let holidays = vec!["not-a-date".to_string(), "1999-01-20".to_string()];
        let result = Operator::HolidayMatch.evaluate(&OperationRequest {
            amount: "100",
            value: "10",
            date: Some("2025-01-20"),
            holidays: &holidays,
            nested: Some("+"),
            ..Default::default()
        });
        assert!(result.is_ok());
    }

    #[test]
    fn ordinary_day_is_not_a_holiday() {
        let holidays = vec!["2000-12-25".to_string()];
        let report = Operator::HolidayMatch.evaluate(&OperationRequest {
            amount: "100",
            value: "10",
            date: Some("2025-03-04"),
            holidays: &holidays,
            nested: Some("+"),
            ..Default::default()
        });
        assert_eq!(
            report,
            Err(OperationError::ConditionNotMet(
                "O dia não é um feriado".to_string()
            ))
        );
    }

    #[test]
    fn holiday_match_fails_closed_on_unknown_delegate() {
        let holidays = vec!["2000-12-25".to_string()];
        let report = Operator::HolidayMatch.evaluate(&OperationRequest {
            amount: "100",
            value: "10",
            date: Some("2025-12-25"),
            holidays: &holidays,
            nested: Some("^"),
            ..Default::default()
        });
        assert!(matches!(report, Err(OperationError::InvalidInput(_))));
    }

    #[test]
    fn symbols_round_trip() {
        for operator in [
            Operator::Add,
            Operator::Subtract,
            Operator::Multiply,
            Operator::Divide,
            Operator::PercentOf,
            Operator::WeekdayMatch,
            Operator::HolidayMatch,
        ] {
            assert_eq!(Operator::from_symbol(operator.symbol()), Some(operator));
        }
        assert_eq!(Operator::from_symbol("^"), None);
    }
}
