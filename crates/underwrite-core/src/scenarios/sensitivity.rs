use log::warn;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Instant;

use super::OutputMetric;
use crate::error::UnderwriteError;
use crate::types::*;
use crate::underwriting::{underwrite_with_options, UnderwriteInputs, UnderwriteOptions, UnderwriteRequest};
use crate::CoreResult;

/// Upper bound on sweep points per variable.
const MAX_SWEEP_POINTS: usize = 101;

/// Deal assumption a sensitivity sweep can vary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DealVariable {
    Price,
    Ltv,
    Rate,
    Fees,
    MonthlyRent,
    OpexPct,
    VacancyPct,
    ExitYear,
    AppreciationRate,
    AmortizationYears,
}

impl FromStr for DealVariable {
    type Err = UnderwriteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let v = match s {
            "price" => DealVariable::Price,
            "ltv" => DealVariable::Ltv,
            "rate" => DealVariable::Rate,
            "fees" => DealVariable::Fees,
            "monthly_rent" => DealVariable::MonthlyRent,
            "opex_pct" => DealVariable::OpexPct,
            "vacancy_pct" => DealVariable::VacancyPct,
            "exit_year" => DealVariable::ExitYear,
            "appreciation_rate" => DealVariable::AppreciationRate,
            "amortization_years" => DealVariable::AmortizationYears,
            other => {
                return Err(UnderwriteError::InvalidInput {
                    field: format!("variable:{other}"),
                    reason: "Unknown deal variable".into(),
                })
            }
        };
        Ok(v)
    }
}

/// A deal with every sweepable value in one place.
#[derive(Debug, Clone)]
struct DealPoint {
    price: Money,
    inputs: UnderwriteInputs,
    options: UnderwriteOptions,
}

impl DealVariable {
    fn current(&self, deal: &DealPoint) -> Decimal {
        match self {
            DealVariable::Price => deal.price,
            DealVariable::Ltv => deal.inputs.ltv,
            DealVariable::Rate => deal.inputs.rate,
            DealVariable::Fees => deal.inputs.fees,
            DealVariable::MonthlyRent => deal.inputs.monthly_rent,
            DealVariable::OpexPct => deal.inputs.opex_pct,
            DealVariable::VacancyPct => deal.inputs.vacancy_pct,
            DealVariable::ExitYear => Decimal::from(deal.inputs.exit_year),
            DealVariable::AppreciationRate => deal.inputs.appreciation_rate,
            DealVariable::AmortizationYears => Decimal::from(
                deal.options
                    .amortization_years
                    .unwrap_or(deal.inputs.exit_year),
            ),
        }
    }

    fn apply(&self, value: Decimal, deal: &mut DealPoint) -> CoreResult<()> {
        match self {
            DealVariable::Price => deal.price = value,
            DealVariable::Ltv => deal.inputs.ltv = value,
            DealVariable::Rate => deal.inputs.rate = value,
            DealVariable::Fees => deal.inputs.fees = value,
            DealVariable::MonthlyRent => deal.inputs.monthly_rent = value,
            DealVariable::OpexPct => deal.inputs.opex_pct = value,
            DealVariable::VacancyPct => deal.inputs.vacancy_pct = value,
            DealVariable::ExitYear => deal.inputs.exit_year = whole_years("exit_year", value)?,
            DealVariable::AppreciationRate => deal.inputs.appreciation_rate = value,
            DealVariable::AmortizationYears => {
                deal.options.amortization_years = Some(whole_years("amortization_years", value)?)
            }
        }
        Ok(())
    }
}

fn whole_years(field: &str, value: Decimal) -> CoreResult<u32> {
    if !value.fract().is_zero() {
        return Err(UnderwriteError::invalid(field, "Must be a whole number of years"));
    }
    value
        .to_u32()
        .ok_or_else(|| UnderwriteError::invalid(field, "Must be a non-negative whole number"))
}

/// Input for a 2-way deal sensitivity grid
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DealSensitivityInput {
    /// Base deal
    pub deal: UnderwriteRequest,
    /// First variable to sweep (rows)
    pub variable_1: SensitivityVariable,
    /// Second variable to sweep (columns)
    pub variable_2: SensitivityVariable,
    pub output_metric: OutputMetric,
}

/// Output of 2-way sensitivity analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensitivityOutput {
    pub variable_1_name: String,
    pub variable_2_name: String,
    pub variable_1_values: Vec<Decimal>,
    pub variable_2_values: Vec<Decimal>,
    pub output_metric: OutputMetric,
    /// Matrix[i][j] = output when variable_1 = variable_1_values[i], variable_2 = variable_2_values[j].
    /// `None` where the deal is invalid or the metric undefined.
    pub matrix: Vec<Vec<Option<Decimal>>>,
    /// Output for the unmodified deal
    pub base_case_value: Option<Decimal>,
    /// Grid cell closest to the unmodified deal (row, col)
    pub base_case_position: (usize, usize),
}

/// Generate the sweep values for a sensitivity variable from min to max with step.
fn generate_sweep_values(var: &SensitivityVariable) -> CoreResult<Vec<Decimal>> {
    if var.step <= Decimal::ZERO {
        return Err(UnderwriteError::InvalidInput {
            field: format!("variable:{}", var.name),
            reason: "Step must be positive".into(),
        });
    }
    if var.min > var.max {
        return Err(UnderwriteError::InvalidInput {
            field: format!("variable:{}", var.name),
            reason: "Min must be <= max".into(),
        });
    }
    if (var.max - var.min) / var.step >= Decimal::from(MAX_SWEEP_POINTS) {
        return Err(UnderwriteError::InvalidInput {
            field: format!("variable:{}", var.name),
            reason: format!("Sweep would exceed {MAX_SWEEP_POINTS} points"),
        });
    }

    let mut values = Vec::new();
    let mut current = var.min;
    while current <= var.max {
        values.push(current);
        current += var.step;
    }
    // Ensure max is included if step doesn't land exactly on it
    if let Some(&last) = values.last() {
        if last < var.max {
            values.push(var.max);
        }
    }

    Ok(values)
}

/// Find the closest index to a target value in a sorted list.
fn closest_index(values: &[Decimal], target: Decimal) -> usize {
    values
        .iter()
        .enumerate()
        .min_by_key(|(_, v)| (**v - target).abs())
        .map(|(i, _)| i)
        .unwrap_or(0)
}

/// Underwrite the deal at every combination of the two variables and record
/// the chosen metric.
pub fn run_deal_sensitivity(
    input: &DealSensitivityInput,
) -> CoreResult<ComputationOutput<SensitivityOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let var_1: DealVariable = input.variable_1.name.parse()?;
    let var_2: DealVariable = input.variable_2.name.parse()?;
    if var_1 == var_2 {
        return Err(UnderwriteError::InvalidInput {
            field: "variable_2".into(),
            reason: "Sensitivity variables must differ".into(),
        });
    }

    let v1_values = generate_sweep_values(&input.variable_1)?;
    let v2_values = generate_sweep_values(&input.variable_2)?;

    let base = DealPoint {
        price: input.deal.price,
        inputs: input.deal.inputs.clone(),
        options: input.deal.options.clone(),
    };
    let metric = input.output_metric;

    // The base deal itself must be valid; cells may not be
    let base_result = underwrite_with_options(base.price, &base.inputs, &base.options)?;
    let base_case_value = metric.extract(&base_result);

    let mut matrix = Vec::with_capacity(v1_values.len());
    for v1 in &v1_values {
        let mut row = Vec::with_capacity(v2_values.len());
        for v2 in &v2_values {
            match evaluate_cell(&base, var_1, *v1, var_2, *v2, metric) {
                Ok(Some(val)) => row.push(Some(val)),
                Ok(None) => {
                    warnings.push(format!("{metric:?} undefined at ({v1}, {v2})"));
                    row.push(None);
                }
                Err(e) => {
                    warn!("sensitivity cell ({v1}, {v2}) failed: {e}");
                    warnings.push(format!("Evaluation failed at ({v1}, {v2}): {e}"));
                    row.push(None);
                }
            }
        }
        matrix.push(row);
    }

    let base_row = closest_index(&v1_values, var_1.current(&base));
    let base_col = closest_index(&v2_values, var_2.current(&base));

    let output = SensitivityOutput {
        variable_1_name: input.variable_1.name.clone(),
        variable_2_name: input.variable_2.name.clone(),
        variable_1_values: v1_values,
        variable_2_values: v2_values,
        output_metric: metric,
        matrix,
        base_case_value,
        base_case_position: (base_row, base_col),
    };

    Ok(with_metadata(
        "2-Way Deal Sensitivity Analysis",
        &serde_json::json!({
            "variable_1": input.variable_1.name,
            "variable_2": input.variable_2.name,
            "output_metric": metric,
            "price": input.deal.price,
        }),
        warnings,
        start,
        output,
    ))
}

fn evaluate_cell(
    base: &DealPoint,
    var_1: DealVariable,
    v1: Decimal,
    var_2: DealVariable,
    v2: Decimal,
    metric: OutputMetric,
) -> CoreResult<Option<Decimal>> {
    let mut deal = base.clone();
    var_1.apply(v1, &mut deal)?;
    var_2.apply(v2, &mut deal)?;
    let result = underwrite_with_options(deal.price, &deal.inputs, &deal.options)?;
    Ok(metric.extract(&result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::underwriting::FinanceType;
    use rust_decimal_macros::dec;

    fn sample_input() -> DealSensitivityInput {
        DealSensitivityInput {
            deal: UnderwriteRequest {
                property_name: None,
                price: dec!(200000),
                inputs: UnderwriteInputs {
                    finance_type: FinanceType::InterestOnly,
                    ltv: dec!(75),
                    rate: dec!(5.5),
                    fees: dec!(2000),
                    capex_year1: Decimal::ZERO,
                    capex_year2: Decimal::ZERO,
                    capex_year3: Decimal::ZERO,
                    monthly_rent: dec!(1200),
                    opex_pct: dec!(15),
                    vacancy_pct: dec!(5),
                    exit_year: 10,
                    appreciation_rate: dec!(3),
                },
                options: UnderwriteOptions::default(),
            },
            variable_1: SensitivityVariable {
                name: "rate".into(),
                min: dec!(4.5),
                max: dec!(6.5),
                step: dec!(0.5),
            },
            variable_2: SensitivityVariable {
                name: "ltv".into(),
                min: dec!(60),
                max: dec!(80),
                step: dec!(5),
            },
            output_metric: OutputMetric::Dscr,
        }
    }

    #[test]
    fn test_sweep_includes_max() {
        let var = SensitivityVariable {
            name: "x".into(),
            min: dec!(0),
            max: dec!(1),
            step: dec!(0.3),
        };
        let values = generate_sweep_values(&var).unwrap();
        assert_eq!(values, vec![dec!(0), dec!(0.3), dec!(0.6), dec!(0.9), dec!(1)]);
    }

    #[test]
    fn test_sweep_rejects_bad_steps() {
        let mut var = SensitivityVariable {
            name: "x".into(),
            min: dec!(0),
            max: dec!(1),
            step: dec!(0),
        };
        assert!(generate_sweep_values(&var).is_err());
        var.step = dec!(0.001);
        assert!(generate_sweep_values(&var).is_err());
    }

    #[test]
    fn test_grid_shape_and_base_case() {
        let output = run_deal_sensitivity(&sample_input()).unwrap();
        let out = &output.result;
        assert_eq!(out.variable_1_values.len(), 5);
        assert_eq!(out.variable_2_values.len(), 5);
        assert_eq!(out.matrix.len(), 5);
        assert!(out.matrix.iter().all(|row| row.len() == 5));

        // rate 5.5 is index 2, ltv 75 is index 3
        assert_eq!(out.base_case_position, (2, 3));
        assert_eq!(
            out.matrix[2][3],
            out.base_case_value,
            "grid point at the deal's own values must match the base case"
        );
        assert!(output.warnings.is_empty());
    }

    #[test]
    fn test_dscr_falls_with_rate_and_leverage() {
        let output = run_deal_sensitivity(&sample_input()).unwrap();
        let m = &output.result.matrix;
        assert!(m[0][0].unwrap() > m[4][0].unwrap());
        assert!(m[0][0].unwrap() > m[0][4].unwrap());
    }

    #[test]
    fn test_invalid_cells_are_null_not_zero() {
        let mut input = sample_input();
        input.variable_2 = SensitivityVariable {
            name: "vacancy_pct".into(),
            min: dec!(90),
            max: dec!(110),
            step: dec!(10),
        };
        let output = run_deal_sensitivity(&input).unwrap();
        // vacancy 100 and 110 are rejected by validation
        for row in &output.result.matrix {
            assert!(row[0].is_some());
            assert!(row[1].is_none());
            assert!(row[2].is_none());
        }
        assert!(!output.warnings.is_empty());
    }

    #[test]
    fn test_exit_year_must_be_whole() {
        let mut input = sample_input();
        input.variable_2 = SensitivityVariable {
            name: "exit_year".into(),
            min: dec!(5),
            max: dec!(6),
            step: dec!(0.5),
        };
        input.output_metric = OutputMetric::Irr;
        let output = run_deal_sensitivity(&input).unwrap();
        for row in &output.result.matrix {
            assert!(row[0].is_some());
            assert!(row[1].is_none());
            assert!(row[2].is_some());
        }
    }

    #[test]
    fn test_rejects_unknown_or_duplicate_variables() {
        let mut input = sample_input();
        input.variable_1.name = "cap_rate".into();
        assert!(run_deal_sensitivity(&input).is_err());

        let mut input = sample_input();
        input.variable_2.name = "rate".into();
        assert!(run_deal_sensitivity(&input).is_err());
    }
}
