use rust_decimal::Decimal;
use rust_decimal::MathematicalOps;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use super::inputs::{DealTerms, FinanceType, MAX_HORIZON_YEARS};
use crate::error::UnderwriteError;
use crate::types::{pct_to_rate, with_metadata, ComputationOutput, Money, Percent, Rate};
use crate::CoreResult;

const MONTHS_PER_YEAR: u32 = 12;

/// One year of an amortisation table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmortizationYear {
    pub year: u32,
    pub opening_balance: Money,
    pub interest: Money,
    pub principal: Money,
    pub debt_service: Money,
    pub closing_balance: Money,
}

/// Standalone payment calculation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MortgageRequest {
    pub loan_amount: Money,
    /// Nominal annual rate, percent
    pub rate: Percent,
    pub finance_type: FinanceType,
    pub term_years: u32,
    /// Include the year-by-year amortisation table
    #[serde(default)]
    pub include_schedule: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MortgageOutput {
    pub monthly_payment: Money,
    pub annual_debt_service: Money,
    /// Interest paid over the whole term
    pub total_interest: Money,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schedule: Option<Vec<AmortizationYear>>,
}

/// Debt figures the projection consumes.
#[derive(Debug, Clone)]
pub(crate) struct DebtProfile {
    pub monthly_payment: Money,
    pub annual_debt_service: Money,
    /// Debt service charged to each projection year
    pub yearly_debt_service: Vec<Money>,
    /// Loan balance at the end of each projection year
    pub yearly_balance: Vec<Money>,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Monthly mortgage payment.
///
/// Interest-only: `loan * r / 12`. Amortising: the level payment
/// `loan * i(1+i)^n / ((1+i)^n - 1)` with `n = term_years * 12`, falling back
/// to straight-line `loan / n` at a zero rate.
pub fn monthly_payment(
    loan_amount: Money,
    annual_rate_pct: Percent,
    finance_type: FinanceType,
    term_years: u32,
) -> CoreResult<Money> {
    validate_loan(loan_amount, annual_rate_pct, term_years)?;
    level_payment(
        loan_amount,
        monthly_rate(annual_rate_pct),
        finance_type,
        term_years * MONTHS_PER_YEAR,
    )
}

/// Twelve monthly payments.
pub fn annual_debt_service(
    loan_amount: Money,
    annual_rate_pct: Percent,
    finance_type: FinanceType,
    term_years: u32,
) -> CoreResult<Money> {
    annualise(monthly_payment(
        loan_amount,
        annual_rate_pct,
        finance_type,
        term_years,
    )?)
}

/// Year-by-year amortisation table over `horizon_years`.
///
/// Interest-only loans carry the full balance throughout. Amortising loans
/// stop paying once the term ends; the final payment of the term clears any
/// residual left by rounding.
pub fn amortization_schedule(
    loan_amount: Money,
    annual_rate_pct: Percent,
    finance_type: FinanceType,
    term_years: u32,
    horizon_years: u32,
) -> CoreResult<Vec<AmortizationYear>> {
    validate_loan(loan_amount, annual_rate_pct, term_years)?;
    if horizon_years < 1 || horizon_years > MAX_HORIZON_YEARS {
        return Err(UnderwriteError::invalid(
            "horizon_years",
            format!("Must be between 1 and {MAX_HORIZON_YEARS} years"),
        ));
    }
    build_schedule(
        loan_amount,
        monthly_rate(annual_rate_pct),
        finance_type,
        term_years * MONTHS_PER_YEAR,
        horizon_years,
    )
}

/// Outstanding balance after `years_elapsed` years of scheduled payments.
pub fn outstanding_balance(
    loan_amount: Money,
    annual_rate_pct: Percent,
    finance_type: FinanceType,
    term_years: u32,
    years_elapsed: u32,
) -> CoreResult<Money> {
    if years_elapsed == 0 {
        validate_loan(loan_amount, annual_rate_pct, term_years)?;
        return Ok(loan_amount);
    }
    let schedule = amortization_schedule(
        loan_amount,
        annual_rate_pct,
        finance_type,
        term_years,
        years_elapsed,
    )?;
    Ok(schedule
        .last()
        .map(|y| y.closing_balance)
        .unwrap_or(loan_amount))
}

/// Payment calculator wrapped in the standard envelope.
pub fn calculate_mortgage(
    request: &MortgageRequest,
) -> CoreResult<ComputationOutput<MortgageOutput>> {
    let start = Instant::now();
    let schedule = amortization_schedule(
        request.loan_amount,
        request.rate,
        request.finance_type,
        request.term_years,
        request.term_years,
    )?;
    let monthly_payment = monthly_payment(
        request.loan_amount,
        request.rate,
        request.finance_type,
        request.term_years,
    )?;

    let mut warnings = Vec::new();
    if request.finance_type == FinanceType::InterestOnly && !request.loan_amount.is_zero() {
        warnings.push(format!(
            "Interest-only: the full {} balance is due at the end of the term",
            request.loan_amount
        ));
    }

    let total_interest = schedule
        .iter()
        .try_fold(Decimal::ZERO, |acc, y| acc.checked_add(y.interest))
        .ok_or_else(|| UnderwriteError::overflow("total interest"))?;

    let output = MortgageOutput {
        monthly_payment,
        annual_debt_service: annualise(monthly_payment)?,
        total_interest,
        schedule: request.include_schedule.then_some(schedule),
    };

    Ok(with_metadata(
        "Mortgage Payment (level payment / interest-only)",
        request,
        warnings,
        start,
        output,
    ))
}

// ---------------------------------------------------------------------------
// Deal debt profile
// ---------------------------------------------------------------------------

/// Debt service and balances for every projection year.
///
/// With the flat approximation each year is charged the same annual debt
/// service and the original loan stays outstanding, whatever the schedule
/// would say.
pub(crate) fn debt_profile(terms: &DealTerms, flat: bool) -> CoreResult<DebtProfile> {
    let rate = terms.annual_rate / dec!(12);
    let term_months = terms.amortization_years * MONTHS_PER_YEAR;
    let monthly_payment = level_payment(terms.loan_amount, rate, terms.finance_type, term_months)?;
    let annual_debt_service = annualise(monthly_payment)?;
    let years = terms.exit_year as usize;

    if flat {
        return Ok(DebtProfile {
            monthly_payment,
            annual_debt_service,
            yearly_debt_service: vec![annual_debt_service; years],
            yearly_balance: vec![terms.loan_amount; years],
        });
    }

    let schedule = build_schedule(
        terms.loan_amount,
        rate,
        terms.finance_type,
        term_months,
        terms.exit_year,
    )?;

    Ok(DebtProfile {
        monthly_payment,
        annual_debt_service,
        yearly_debt_service: schedule.iter().map(|y| y.debt_service).collect(),
        yearly_balance: schedule.iter().map(|y| y.closing_balance).collect(),
    })
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn monthly_rate(annual_rate_pct: Percent) -> Rate {
    pct_to_rate(annual_rate_pct) / dec!(12)
}

fn annualise(monthly_payment: Money) -> CoreResult<Money> {
    monthly_payment
        .checked_mul(Decimal::from(MONTHS_PER_YEAR))
        .ok_or_else(|| UnderwriteError::overflow("annual debt service"))
}

fn validate_loan(loan_amount: Money, annual_rate_pct: Percent, term_years: u32) -> CoreResult<()> {
    if loan_amount < Decimal::ZERO {
        return Err(UnderwriteError::invalid("loan_amount", "Loan amount cannot be negative"));
    }
    if annual_rate_pct < Decimal::ZERO || annual_rate_pct > dec!(100) {
        return Err(UnderwriteError::invalid("rate", "Rate must be within [0, 100] percent"));
    }
    if term_years < 1 || term_years > MAX_HORIZON_YEARS {
        return Err(UnderwriteError::invalid(
            "term_years",
            format!("Term must be between 1 and {MAX_HORIZON_YEARS} years"),
        ));
    }
    Ok(())
}

fn level_payment(
    principal: Money,
    monthly_rate: Rate,
    finance_type: FinanceType,
    total_months: u32,
) -> CoreResult<Money> {
    match finance_type {
        FinanceType::InterestOnly => Ok(principal * monthly_rate),
        FinanceType::Amortizing => {
            if total_months == 0 {
                return Err(UnderwriteError::DivisionByZero {
                    context: "amortising payment over zero months".into(),
                });
            }
            if monthly_rate.is_zero() {
                // Interest-free: straight-line amortisation
                return Ok(principal / Decimal::from(total_months));
            }

            let compound = (Decimal::ONE + monthly_rate)
                .checked_powi(total_months as i64)
                .ok_or_else(|| {
                    UnderwriteError::FinancialImpossibility(
                        "compounding factor exceeds Decimal range".into(),
                    )
                })?;

            // i(1+i)^n / ((1+i)^n - 1) rearranged as i / (1 - (1+i)^-n) to
            // keep the numerator in range for long, high-rate loans.
            let denominator = Decimal::ONE - Decimal::ONE / compound;
            if denominator.is_zero() {
                return Err(UnderwriteError::DivisionByZero {
                    context: "mortgage payment denominator".into(),
                });
            }

            Ok(principal * monthly_rate / denominator)
        }
    }
}

fn build_schedule(
    loan_amount: Money,
    monthly_rate: Rate,
    finance_type: FinanceType,
    term_months: u32,
    horizon_years: u32,
) -> CoreResult<Vec<AmortizationYear>> {
    let payment = level_payment(loan_amount, monthly_rate, finance_type, term_months)?;
    let mut balance = loan_amount;
    let mut month = 0u32;
    let mut rows = Vec::with_capacity(horizon_years as usize);

    for year in 1..=horizon_years {
        let opening_balance = balance;
        let mut interest = Decimal::ZERO;
        let mut principal = Decimal::ZERO;

        for _ in 0..MONTHS_PER_YEAR {
            month += 1;
            let accrued = balance * monthly_rate;

            match finance_type {
                FinanceType::InterestOnly => interest += accrued,
                FinanceType::Amortizing => {
                    if balance.is_zero() || month > term_months {
                        continue;
                    }
                    let repaid = if month == term_months {
                        balance
                    } else {
                        (payment - accrued).min(balance)
                    };
                    interest += accrued;
                    principal += repaid;
                    balance -= repaid;
                }
            }
        }

        rows.push(AmortizationYear {
            year,
            opening_balance,
            interest,
            principal,
            debt_service: interest + principal,
            closing_balance: balance,
        });
    }

    Ok(rows)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
