use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::types::{Money, Percent, Rate};

const PERCENT: Decimal = dec!(100);

/// A ratio that may be undefined for the deal at hand.
///
/// Degenerate denominators (no debt service, no rent, no cash invested)
/// yield `NotApplicable` with the reason instead of an infinite or NaN value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RatioMetric {
    Defined { value: Decimal },
    NotApplicable { reason: String },
}

impl RatioMetric {
    pub fn value(&self) -> Option<Decimal> {
        match self {
            RatioMetric::Defined { value } => Some(*value),
            RatioMetric::NotApplicable { .. } => None,
        }
    }

    pub fn is_defined(&self) -> bool {
        matches!(self, RatioMetric::Defined { .. })
    }

    fn ratio(numerator: Decimal, denominator: Decimal, reason: &str) -> Self {
        if denominator.is_zero() {
            return RatioMetric::NotApplicable {
                reason: reason.to_string(),
            };
        }
        Self::checked(numerator.checked_div(denominator))
    }

    fn checked(value: Option<Decimal>) -> Self {
        match value {
            Some(value) => RatioMetric::Defined { value },
            None => RatioMetric::NotApplicable {
                reason: OUT_OF_RANGE.into(),
            },
        }
    }
}

const OUT_OF_RANGE: &str = "ratio exceeds Decimal range";

/// (rent - opex) / mortgage, from first-year figures.
pub fn dscr(rent: Money, opex: Money, mortgage: Money) -> RatioMetric {
    RatioMetric::ratio(
        rent - opex,
        mortgage,
        "no debt service in year 1 (all-cash or interest-free interest-only deal)",
    )
}

/// Occupancy percent needed for first-year rent to cover opex and debt service.
///
/// `(opex + mortgage) / rent * 100 / (1 - vacancy)`, with `rent` the
/// effective (post-vacancy) first-year rent.
pub fn breakeven_occupancy(rent: Money, opex: Money, mortgage: Money, vacancy: Rate) -> RatioMetric {
    let occupancy = Decimal::ONE - vacancy;
    if rent.is_zero() || occupancy.is_zero() {
        return RatioMetric::NotApplicable {
            reason: "no effective rent in year 1".into(),
        };
    }
    RatioMetric::checked(
        opex.checked_add(mortgage)
            .and_then(|costs| costs.checked_div(rent))
            .and_then(|share| share.checked_mul(PERCENT))
            .and_then(|pct| pct.checked_div(occupancy)),
    )
}

/// Final cumulative cash flow including sale proceeds over cash invested.
pub fn equity_multiple(total_return: Money, cash_invested: Money) -> RatioMetric {
    RatioMetric::ratio(total_return, cash_invested, "no cash invested (equity plus fees is zero)")
}

/// First-year net cash flow over cash invested, in percent.
pub fn cash_on_cash(year1_net_cashflow: Money, cash_invested: Money) -> RatioMetric {
    match RatioMetric::ratio(
        year1_net_cashflow,
        cash_invested,
        "no cash invested (equity plus fees is zero)",
    ) {
        RatioMetric::Defined { value } => RatioMetric::checked(value.checked_mul(PERCENT)),
        na => na,
    }
}

/// Whether a breakeven figure means the deal cannot cover costs even fully let.
pub(crate) fn exceeds_full_occupancy(breakeven: &RatioMetric) -> Option<Percent> {
    breakeven.value().filter(|v| *v > PERCENT)
}
