use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use super::OutputMetric;
use crate::error::UnderwriteError;
use crate::time_value::IrrStatus;
use crate::types::*;
use crate::underwriting::{
    underwrite_with_options, FinanceType, UnderwriteInputs, UnderwriteRequest, UnderwriteResult,
};
use crate::CoreResult;

const PROBABILITY_TOLERANCE: Decimal = dec!(0.001);

/// Optional replacements for the base deal's assumptions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InputOverrides {
    pub price: Option<Money>,
    pub finance_type: Option<FinanceType>,
    pub ltv: Option<Percent>,
    pub rate: Option<Percent>,
    pub fees: Option<Money>,
    pub capex_year1: Option<Money>,
    pub capex_year2: Option<Money>,
    pub capex_year3: Option<Money>,
    pub monthly_rent: Option<Money>,
    pub opex_pct: Option<Percent>,
    pub vacancy_pct: Option<Percent>,
    pub exit_year: Option<u32>,
    pub appreciation_rate: Option<Percent>,
}

impl InputOverrides {
    fn apply(&self, price: Money, inputs: &UnderwriteInputs) -> (Money, UnderwriteInputs) {
        let mut out = inputs.clone();
        if let Some(v) = self.finance_type {
            out.finance_type = v;
        }
        if let Some(v) = self.ltv {
            out.ltv = v;
        }
        if let Some(v) = self.rate {
            out.rate = v;
        }
        if let Some(v) = self.fees {
            out.fees = v;
        }
        if let Some(v) = self.capex_year1 {
            out.capex_year1 = v;
        }
        if let Some(v) = self.capex_year2 {
            out.capex_year2 = v;
        }
        if let Some(v) = self.capex_year3 {
            out.capex_year3 = v;
        }
        if let Some(v) = self.monthly_rent {
            out.monthly_rent = v;
        }
        if let Some(v) = self.opex_pct {
            out.opex_pct = v;
        }
        if let Some(v) = self.vacancy_pct {
            out.vacancy_pct = v;
        }
        if let Some(v) = self.exit_year {
            out.exit_year = v;
        }
        if let Some(v) = self.appreciation_rate {
            out.appreciation_rate = v;
        }
        (self.price.unwrap_or(price), out)
    }
}

/// A named variation of the base deal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DealScenario {
    pub name: String,
    /// Either every scenario carries a probability or none does
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probability: Option<Rate>,
    #[serde(default)]
    pub overrides: InputOverrides,
}

/// Input for scenario comparison
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioComparisonInput {
    pub deal: UnderwriteRequest,
    pub scenarios: Vec<DealScenario>,
    #[serde(default = "default_metric")]
    pub output_metric: OutputMetric,
}

fn default_metric() -> OutputMetric {
    OutputMetric::Irr
}

/// Headline figures for one underwriting run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioHeadline {
    pub irr_pct: Option<Percent>,
    pub irr_status: IrrStatus,
    pub dscr: Option<Decimal>,
    pub breakeven_pct: Option<Percent>,
    pub equity_multiple: Option<Multiple>,
    pub year1_net_cashflow: Money,
    pub total_return: Money,
}

impl ScenarioHeadline {
    fn from_result(result: &UnderwriteResult) -> Self {
        ScenarioHeadline {
            irr_pct: result.irr.irr_pct,
            irr_status: result.irr.status,
            dscr: result.dscr.value(),
            breakeven_pct: result.breakeven.value(),
            equity_multiple: result.equity_multiple.value(),
            year1_net_cashflow: result
                .cashflows
                .first()
                .map(|r| r.net_cashflow)
                .unwrap_or_default(),
            total_return: result.summary.total_return,
        }
    }
}

/// Result for a single scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub name: String,
    pub probability: Option<Rate>,
    pub headline: ScenarioHeadline,
    pub output_value: Option<Decimal>,
    pub deviation_from_base: Option<Decimal>,
    /// Deviation as a fraction of the base value
    pub deviation_pct: Option<Rate>,
}

/// Output of scenario comparison
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioOutput {
    pub output_metric: OutputMetric,
    pub base: ScenarioHeadline,
    pub base_value: Option<Decimal>,
    pub results: Vec<ScenarioResult>,
    /// Present when probabilities were supplied and every scenario value is defined
    pub probability_weighted_value: Option<Decimal>,
}

/// Underwrite the base deal and each scenario, then compare the chosen metric.
pub fn compare_scenarios(
    input: &ScenarioComparisonInput,
) -> CoreResult<ComputationOutput<ScenarioOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    if input.scenarios.is_empty() {
        return Err(UnderwriteError::InsufficientData(
            "At least one scenario required".into(),
        ));
    }

    let weighted = validate_probabilities(&input.scenarios)?;
    let metric = input.output_metric;
    let deal = &input.deal;

    let base_result = underwrite_with_options(deal.price, &deal.inputs, &deal.options)?;
    let base_value = metric.extract(&base_result);
    if base_value.is_none() {
        warnings.push(format!("{metric:?} is not defined for the base deal"));
    }

    let mut results = Vec::with_capacity(input.scenarios.len());
    let mut probability_weighted_value = weighted.then_some(Decimal::ZERO);

    for scenario in &input.scenarios {
        let (price, inputs) = scenario.overrides.apply(deal.price, &deal.inputs);
        let result = underwrite_with_options(price, &inputs, &deal.options)
            .map_err(|e| e.with_field_prefix(&format!("scenario:{}", scenario.name)))?;

        let output_value = metric.extract(&result);
        let deviation = match (output_value, base_value) {
            (Some(v), Some(b)) => Some(v - b),
            _ => None,
        };
        let deviation_pct = match (deviation, base_value) {
            (Some(d), Some(b)) if !b.is_zero() => Some(d / b),
            (Some(d), Some(_)) if d.is_zero() => Some(Decimal::ZERO),
            (Some(_), Some(_)) => {
                warnings.push(format!(
                    "Base case is zero; cannot compute deviation_pct for scenario '{}'",
                    scenario.name
                ));
                None
            }
            _ => None,
        };

        probability_weighted_value = match (
            probability_weighted_value,
            scenario.probability,
            output_value,
        ) {
            (Some(acc), Some(p), Some(v)) => Some(acc + p * v),
            (Some(_), _, None) => {
                warnings.push(format!(
                    "{metric:?} undefined for scenario '{}'; no probability-weighted value",
                    scenario.name
                ));
                None
            }
            _ => None,
        };

        results.push(ScenarioResult {
            name: scenario.name.clone(),
            probability: scenario.probability,
            headline: ScenarioHeadline::from_result(&result),
            output_value,
            deviation_from_base: deviation,
            deviation_pct,
        });
    }

    let output = ScenarioOutput {
        output_metric: metric,
        base: ScenarioHeadline::from_result(&base_result),
        base_value,
        results,
        probability_weighted_value,
    };

    Ok(with_metadata(
        "Deal Scenario Comparison",
        &serde_json::json!({
            "num_scenarios": input.scenarios.len(),
            "output_metric": metric,
            "probability_weighted": weighted,
        }),
        warnings,
        start,
        output,
    ))
}

/// Returns whether the scenarios are probability-weighted.
fn validate_probabilities(scenarios: &[DealScenario]) -> CoreResult<bool> {
    let given = scenarios.iter().filter(|s| s.probability.is_some()).count();
    if given == 0 {
        return Ok(false);
    }
    if given != scenarios.len() {
        return Err(UnderwriteError::InvalidInput {
            field: "probabilities".into(),
            reason: "Give a probability for every scenario or for none".into(),
        });
    }

    let mut total = Decimal::ZERO;
    for s in scenarios {
        let p = s.probability.unwrap_or_default();
        if p < Decimal::ZERO || p > Decimal::ONE {
            return Err(UnderwriteError::InvalidInput {
                field: format!("scenario:{} probability", s.name),
                reason: "Probability must be between 0 and 1".into(),
            });
        }
        total += p;
    }

    if (total - Decimal::ONE).abs() > PROBABILITY_TOLERANCE {
        return Err(UnderwriteError::InvalidInput {
            field: "probabilities".into(),
            reason: format!("Probabilities must sum to 1.0 (got {total})"),
        });
    }
    Ok(true)
}
