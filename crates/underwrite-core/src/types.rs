use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// All monetary values. Wraps Decimal to prevent accidental f64 usage.
pub type Money = Decimal;

/// Fractions used inside the maths (0.05 = 5%).
pub type Rate = Decimal;

/// Human-readable percentages (5 = 5%). Deal assumptions arrive in this unit.
pub type Percent = Decimal;

/// Multiples (e.g. 1.93x equity multiple)
pub type Multiple = Decimal;

const PERCENT_SCALE: Decimal = dec!(100);

/// 5 -> 0.05
pub fn pct_to_rate(pct: Percent) -> Rate {
    pct / PERCENT_SCALE
}

/// 0.05 -> 5
pub fn rate_to_pct(rate: Rate) -> Percent {
    rate * PERCENT_SCALE
}

/// A dated equity cash flow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashFlow {
    pub date: NaiveDate,
    pub amount: Money,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// One axis of a sensitivity sweep: `min..=max` by `step`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensitivityVariable {
    pub name: String,
    pub min: Decimal,
    pub max: Decimal,
    pub step: Decimal,
}

/// Envelope every public computation returns: the result plus how it was
/// obtained and anything the caller should be told about it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationOutput<T: Serialize> {
    pub result: T,
    pub methodology: String,
    /// The request as received, for audit
    pub assumptions: serde_json::Value,
    /// Advisory findings; never a substitute for an error
    pub warnings: Vec<String>,
    pub metadata: ComputationMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationMetadata {
    pub version: String,
    pub computation_time_us: u64,
    pub precision: String,
}

/// Wrap a result in the envelope, timing it from `started`.
pub fn with_metadata<T: Serialize>(
    methodology: &str,
    assumptions: &impl Serialize,
    warnings: Vec<String>,
    started: Instant,
    result: T,
) -> ComputationOutput<T> {
    ComputationOutput {
        result,
        methodology: methodology.to_string(),
        assumptions: serde_json::to_value(assumptions).unwrap_or_default(),
        warnings,
        metadata: ComputationMetadata {
            version: env!("CARGO_PKG_VERSION").to_string(),
            computation_time_us: started.elapsed().as_micros() as u64,
            precision: "rust_decimal_128bit".to_string(),
        },
    }
}
