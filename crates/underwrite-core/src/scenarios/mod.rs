pub mod scenario;
pub mod sensitivity;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::underwriting::UnderwriteResult;

/// Headline figure a sensitivity grid or scenario comparison measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputMetric {
    /// IRR percent; only converged estimates count
    Irr,
    Dscr,
    Breakeven,
    EquityMultiple,
    CashOnCash,
    Year1NetCashflow,
    TotalReturn,
}

impl OutputMetric {
    /// `None` when the metric is not applicable or the IRR is unreliable.
    pub fn extract(&self, result: &UnderwriteResult) -> Option<Decimal> {
        match self {
            OutputMetric::Irr => result
                .irr
                .is_converged()
                .then_some(result.irr.irr_pct)
                .flatten(),
            OutputMetric::Dscr => result.dscr.value(),
            OutputMetric::Breakeven => result.breakeven.value(),
            OutputMetric::EquityMultiple => result.equity_multiple.value(),
            OutputMetric::CashOnCash => result.summary.cash_on_cash_year1.value(),
            OutputMetric::Year1NetCashflow => result.cashflows.first().map(|r| r.net_cashflow),
            OutputMetric::TotalReturn => Some(result.summary.total_return),
        }
    }
}
