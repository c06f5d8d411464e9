use chrono::{Months, NaiveDate};
use log::{debug, warn};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use super::inputs::{DealTerms, FinanceType, IrrPolicy, UnderwriteInputs, UnderwriteOptions, UnderwriteRequest};
use super::metrics::{self, RatioMetric};
use super::mortgage::debt_profile;
use super::projection::{irr_series, project, CashflowRow, Projection};
use crate::error::UnderwriteError;
use crate::time_value::{solve_irr, xirr, IrrEstimate, IrrStatus, IRR_INITIAL_GUESS};
use crate::types::{rate_to_pct, with_metadata, CashFlow, ComputationOutput, Money, Percent};
use crate::CoreResult;

const DSCR_COVENANT: Decimal = dec!(1.20);
const HIGH_LTV_PCT: Decimal = dec!(80);
const HIGH_VACANCY_PCT: Decimal = dec!(15);

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// How debt is carried through the projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MortgageModel {
    /// Constant annual debt service, original loan outstanding at exit
    FlatApproximation,
    /// Month-by-month amortisation; exit deducts the remaining balance
    AmortizationSchedule,
}

/// Intermediate deal figures shown alongside the metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DealSummary {
    pub loan_amount: Money,
    pub equity: Money,
    /// Equity plus fees
    pub cash_invested: Money,
    pub monthly_payment: Money,
    pub annual_debt_service: Money,
    pub exit_value: Money,
    pub exit_loan_balance: Money,
    pub sale_proceeds: Money,
    /// Sum of yearly net cash flows
    pub total_net_cashflow: Money,
    /// Final cumulative cash flow including sale proceeds
    pub total_return: Money,
    /// Year-1 net cash flow over cash invested, percent
    pub cash_on_cash_year1: RatioMetric,
    pub mortgage_model: MortgageModel,
}

/// Dated equity cash flows, present when an acquisition date was supplied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatedSchedule {
    pub flows: Vec<CashFlow>,
    /// Annualised XIRR, percent
    pub xirr_pct: Option<Percent>,
}

/// Complete underwriting output. A pure function of price, inputs and options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnderwriteResult {
    /// One row per year, 1..=exit_year
    pub cashflows: Vec<CashflowRow>,
    pub dscr: RatioMetric,
    /// Breakeven occupancy, percent
    pub breakeven: RatioMetric,
    pub irr: IrrEstimate,
    pub equity_multiple: RatioMetric,
    pub summary: DealSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dated: Option<DatedSchedule>,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Underwrite a deal with the default (legacy-compatible) options.
pub fn underwrite(price: Money, inputs: &UnderwriteInputs) -> CoreResult<UnderwriteResult> {
    underwrite_with_options(price, inputs, &UnderwriteOptions::default())
}

/// Underwrite a deal, returning the bare result without advisory warnings.
pub fn underwrite_with_options(
    price: Money,
    inputs: &UnderwriteInputs,
    options: &UnderwriteOptions,
) -> CoreResult<UnderwriteResult> {
    evaluate(price, inputs, options).map(|(result, _)| result)
}

/// Underwrite a JSON-style request and wrap the result in the standard
/// envelope with warnings and metadata.
pub fn analyze_deal(
    request: &UnderwriteRequest,
) -> CoreResult<ComputationOutput<UnderwriteResult>> {
    let start = Instant::now();
    let (result, warnings) = evaluate(request.price, &request.inputs, &request.options)?;

    let methodology = match result.summary.mortgage_model {
        MortgageModel::FlatApproximation => {
            "Property Underwriting (flat annual debt service, levered equity cash flows)"
        }
        MortgageModel::AmortizationSchedule => {
            "Property Underwriting (amortisation schedule, levered equity cash flows)"
        }
    };

    Ok(with_metadata(methodology, request, warnings, start, result))
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

fn evaluate(
    price: Money,
    inputs: &UnderwriteInputs,
    options: &UnderwriteOptions,
) -> CoreResult<(UnderwriteResult, Vec<String>)> {
    let terms = DealTerms::new(price, inputs, options)?;
    let flat = options.use_flat_mortgage_approximation;
    debug!(
        "underwriting price={} exit_year={} finance_type={:?} flat_mortgage={}",
        price, terms.exit_year, terms.finance_type, flat
    );

    let debt = debt_profile(&terms, flat)?;
    let projection = project(&terms, &debt)?;

    // Ratios use first-year figures
    let first = &projection.rows[0];
    let dscr = metrics::dscr(first.rent, first.opex, first.mortgage);
    let breakeven = metrics::breakeven_occupancy(first.rent, first.opex, first.mortgage, terms.vacancy);
    let equity_multiple = metrics::equity_multiple(projection.total_return, terms.cash_invested());
    let cash_on_cash_year1 = metrics::cash_on_cash(first.net_cashflow, terms.cash_invested());

    let irr = solve_irr(&irr_series(&terms, &projection)?);
    enforce_irr_policy(&irr, options.irr_policy)?;

    let total_net_cashflow = projection
        .rows
        .iter()
        .try_fold(Decimal::ZERO, |acc, r| acc.checked_add(r.net_cashflow))
        .ok_or_else(|| UnderwriteError::overflow("total net cash flow"))?;

    let mut warnings = Vec::new();
    let dated = options
        .acquisition_date
        .map(|date| dated_schedule(date, &terms, &projection, &mut warnings));

    collect_warnings(inputs, &terms, &projection, &dscr, &breakeven, &irr, flat, &mut warnings);

    let summary = DealSummary {
        loan_amount: terms.loan_amount,
        equity: terms.equity,
        cash_invested: terms.cash_invested(),
        monthly_payment: debt.monthly_payment,
        annual_debt_service: debt.annual_debt_service,
        exit_value: projection.exit_value,
        exit_loan_balance: projection.exit_loan_balance,
        sale_proceeds: projection.sale_proceeds,
        total_net_cashflow,
        total_return: projection.total_return,
        cash_on_cash_year1,
        mortgage_model: if flat {
            MortgageModel::FlatApproximation
        } else {
            MortgageModel::AmortizationSchedule
        },
    };

    let result = UnderwriteResult {
        cashflows: projection.rows,
        dscr,
        breakeven,
        irr,
        equity_multiple,
        summary,
        dated,
    };

    Ok((result, warnings))
}

fn enforce_irr_policy(irr: &IrrEstimate, policy: IrrPolicy) -> CoreResult<()> {
    match irr.status {
        IrrStatus::Converged => Ok(()),
        IrrStatus::NotConverged => {
            warn!(
                "IRR did not converge after {} iterations, last estimate {:?}%",
                irr.iterations, irr.irr_pct
            );
            if policy == IrrPolicy::Strict {
                return Err(UnderwriteError::ConvergenceFailure {
                    function: "IRR".into(),
                    iterations: irr.iterations,
                    last_delta: irr.npv_at_estimate.unwrap_or(Decimal::ZERO),
                });
            }
            Ok(())
        }
        IrrStatus::Undetermined => {
            warn!("IRR undetermined for this cash-flow series");
            if policy == IrrPolicy::Strict {
                return Err(UnderwriteError::FinancialImpossibility(
                    "IRR is undetermined: cash flows have no sign change or the solver hit a flat derivative"
                        .into(),
                ));
            }
            Ok(())
        }
    }
}

fn dated_schedule(
    acquisition: NaiveDate,
    terms: &DealTerms,
    projection: &Projection,
    warnings: &mut Vec<String>,
) -> DatedSchedule {
    let mut flows = Vec::with_capacity(projection.rows.len() + 1);
    flows.push(CashFlow {
        date: acquisition,
        amount: -terms.cash_invested(),
        label: Some("acquisition".into()),
    });

    let last_year = terms.exit_year;
    for row in &projection.rows {
        let Some(date) = acquisition.checked_add_months(Months::new(12 * row.year)) else {
            warnings.push(format!("Could not date year {} of the schedule", row.year));
            return DatedSchedule { flows, xirr_pct: None };
        };
        // Same sum irr_series already checked
        let (amount, label) = if row.year == last_year {
            (
                row.net_cashflow + projection.sale_proceeds,
                format!("year {} + sale", row.year),
            )
        } else {
            (row.net_cashflow, format!("year {}", row.year))
        };
        flows.push(CashFlow {
            date,
            amount,
            label: Some(label),
        });
    }

    let pairs: Vec<(NaiveDate, Money)> = flows.iter().map(|f| (f.date, f.amount)).collect();
    let xirr_pct = match xirr(&pairs, IRR_INITIAL_GUESS) {
        Ok(rate) => Some(rate_to_pct(rate)),
        Err(e) => {
            warn!("XIRR failed: {e}");
            warnings.push(format!("XIRR could not be computed: {e}"));
            None
        }
    };

    DatedSchedule { flows, xirr_pct }
}

#[allow(clippy::too_many_arguments)]
fn collect_warnings(
    inputs: &UnderwriteInputs,
    terms: &DealTerms,
    projection: &Projection,
    dscr: &RatioMetric,
    breakeven: &RatioMetric,
    irr: &IrrEstimate,
    flat: bool,
    warnings: &mut Vec<String>,
) {
    match dscr.value() {
        Some(v) if v < DSCR_COVENANT => warnings.push(format!(
            "DSCR of {:.2} is below 1.20x: lender covenant risk",
            v
        )),
        None => warnings.push("DSCR not applicable: no debt service in year 1".into()),
        _ => {}
    }

    if inputs.ltv > HIGH_LTV_PCT {
        warnings.push(format!("LTV of {:.1}% exceeds 80%: high leverage", inputs.ltv));
    }

    if inputs.vacancy_pct > HIGH_VACANCY_PCT {
        warnings.push(format!(
            "Vacancy of {:.1}% exceeds 15%: above typical market norms",
            inputs.vacancy_pct
        ));
    }

    if let Some(be) = metrics::exceeds_full_occupancy(breakeven) {
        warnings.push(format!(
            "Breakeven occupancy of {:.1}% exceeds 100%: rent cannot cover opex and debt service",
            be
        ));
    }

    let negative_years: Vec<String> = projection
        .rows
        .iter()
        .filter(|r| r.net_cashflow < Decimal::ZERO)
        .map(|r| r.year.to_string())
        .collect();
    if !negative_years.is_empty() {
        warnings.push(format!(
            "Negative net cash flow in year(s) {}",
            negative_years.join(", ")
        ));
    }

    match irr.status {
        IrrStatus::Converged => {}
        IrrStatus::NotConverged => warnings.push(format!(
            "IRR did not converge after {} iterations: last estimate shown is unreliable",
            irr.iterations
        )),
        IrrStatus::Undetermined => {
            warnings.push("IRR undetermined for this cash-flow series".into())
        }
    }

    if flat && terms.finance_type == FinanceType::Amortizing && !terms.loan_amount.is_zero() {
        warnings.push(
            "Flat mortgage approximation: sale proceeds deduct the full original loan, \
             ignoring principal repaid"
                .into(),
        );
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
