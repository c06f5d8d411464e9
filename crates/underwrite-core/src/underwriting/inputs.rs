use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::UnderwriteError;
use crate::types::{pct_to_rate, Money, Percent, Rate};
use crate::CoreResult;

/// Longest projection (and amortisation) horizon accepted, in years.
pub const MAX_HORIZON_YEARS: u32 = 50;

const HUNDRED: Decimal = dec!(100);

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Mortgage payment formula.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinanceType {
    /// Monthly payment = loan * monthly rate; principal repaid at exit
    #[serde(alias = "io")]
    InterestOnly,
    /// Level monthly payment over the amortisation horizon
    #[serde(alias = "amortising", alias = "repayment")]
    Amortizing,
}

/// What the caller wants when the IRR search does not converge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IrrPolicy {
    /// Return the estimate with its status flag
    #[default]
    BestEffort,
    /// Anything short of convergence is an error
    Strict,
}

/// Deal assumptions. Every percentage is human-readable (15 = 15%).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnderwriteInputs {
    pub finance_type: FinanceType,
    /// Loan-to-value, percent of price
    pub ltv: Percent,
    /// Nominal annual interest rate, percent
    pub rate: Percent,
    /// One-time acquisition / closing fees
    #[serde(default)]
    pub fees: Money,
    #[serde(default)]
    pub capex_year1: Money,
    #[serde(default)]
    pub capex_year2: Money,
    #[serde(default)]
    pub capex_year3: Money,
    /// Gross monthly rent before vacancy and opex
    pub monthly_rent: Money,
    /// Operating expenses, percent of effective rent
    pub opex_pct: Percent,
    /// Vacancy, percent of gross rent
    pub vacancy_pct: Percent,
    /// Projection horizon and disposal year
    pub exit_year: u32,
    /// Annual property value growth, percent (may be negative)
    pub appreciation_rate: Percent,
}

fn default_flat_mortgage() -> bool {
    true
}

/// Engine switches. Defaults reproduce the legacy numbers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnderwriteOptions {
    /// Keep the full loan outstanding at exit (legacy behaviour). When false,
    /// rows carry the amortised balance and sale proceeds deduct it instead.
    #[serde(default = "default_flat_mortgage")]
    pub use_flat_mortgage_approximation: bool,
    /// Amortisation horizon for amortising loans; defaults to `exit_year`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amortization_years: Option<u32>,
    #[serde(default)]
    pub irr_policy: IrrPolicy,
    /// Date the deal closes; enables a dated schedule and XIRR
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acquisition_date: Option<NaiveDate>,
}

impl Default for UnderwriteOptions {
    fn default() -> Self {
        UnderwriteOptions {
            use_flat_mortgage_approximation: true,
            amortization_years: None,
            irr_policy: IrrPolicy::BestEffort,
            acquisition_date: None,
        }
    }
}

/// A full underwriting request as accepted from JSON callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnderwriteRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property_name: Option<String>,
    pub price: Money,
    pub inputs: UnderwriteInputs,
    #[serde(default)]
    pub options: UnderwriteOptions,
}

/// Validated deal with every percentage converted to a fraction.
/// Only [`DealTerms::new`] builds one, so downstream maths never re-checks.
#[derive(Debug, Clone)]
pub(crate) struct DealTerms {
    pub price: Money,
    pub finance_type: FinanceType,
    pub loan_amount: Money,
    pub equity: Money,
    pub fees: Money,
    pub annual_rate: Rate,
    pub capex: [Money; 3],
    pub monthly_rent: Money,
    pub opex: Rate,
    pub vacancy: Rate,
    pub appreciation: Rate,
    pub exit_year: u32,
    pub amortization_years: u32,
}

impl DealTerms {
    pub fn new(
        price: Money,
        inputs: &UnderwriteInputs,
        options: &UnderwriteOptions,
    ) -> CoreResult<Self> {
        validate(price, inputs, options)?;

        let ltv = pct_to_rate(inputs.ltv);
        let loan_amount = price
            .checked_mul(ltv)
            .ok_or_else(|| UnderwriteError::overflow("loan amount"))?;
        let equity = price - loan_amount;
        // Every later use of cash_invested() relies on this sum fitting
        equity
            .checked_add(inputs.fees)
            .ok_or_else(|| UnderwriteError::overflow("equity plus fees"))?;

        Ok(DealTerms {
            price,
            finance_type: inputs.finance_type,
            loan_amount,
            equity,
            fees: inputs.fees,
            annual_rate: pct_to_rate(inputs.rate),
            capex: [inputs.capex_year1, inputs.capex_year2, inputs.capex_year3],
            monthly_rent: inputs.monthly_rent,
            opex: pct_to_rate(inputs.opex_pct),
            vacancy: pct_to_rate(inputs.vacancy_pct),
            appreciation: pct_to_rate(inputs.appreciation_rate),
            exit_year: inputs.exit_year,
            amortization_years: options.amortization_years.unwrap_or(inputs.exit_year),
        })
    }

    /// Equity plus fees: the period-0 outlay.
    pub fn cash_invested(&self) -> Money {
        self.equity + self.fees
    }

    /// Scheduled capex for a projection year (1-based); zero after year 3.
    pub fn capex_for_year(&self, year: u32) -> Money {
        match year {
            1..=3 => self.capex[(year - 1) as usize],
            _ => Decimal::ZERO,
        }
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate(price: Money, inputs: &UnderwriteInputs, options: &UnderwriteOptions) -> CoreResult<()> {
    if price <= Decimal::ZERO {
        return Err(UnderwriteError::invalid("price", "Property price must be positive"));
    }

    check_horizon("exit_year", inputs.exit_year)?;
    if let Some(years) = options.amortization_years {
        check_horizon("amortization_years", years)?;
    }

    check_range("ltv", inputs.ltv, Decimal::ZERO, HUNDRED, true)?;
    check_range("rate", inputs.rate, Decimal::ZERO, HUNDRED, true)?;
    check_range("opex_pct", inputs.opex_pct, Decimal::ZERO, HUNDRED, false)?;
    check_range("vacancy_pct", inputs.vacancy_pct, Decimal::ZERO, HUNDRED, false)?;

    if inputs.appreciation_rate <= -HUNDRED || inputs.appreciation_rate > HUNDRED {
        return Err(UnderwriteError::invalid(
            "appreciation_rate",
            "Appreciation rate must be greater than -100% and at most 100%",
        ));
    }

    for (field, amount) in [
        ("fees", inputs.fees),
        ("capex_year1", inputs.capex_year1),
        ("capex_year2", inputs.capex_year2),
        ("capex_year3", inputs.capex_year3),
        ("monthly_rent", inputs.monthly_rent),
    ] {
        if amount < Decimal::ZERO {
            return Err(UnderwriteError::invalid(field, "Amount cannot be negative"));
        }
    }

    Ok(())
}

fn check_horizon(field: &str, years: u32) -> CoreResult<()> {
    if years < 1 {
        return Err(UnderwriteError::invalid(field, "Must be at least 1 year"));
    }
    if years > MAX_HORIZON_YEARS {
        return Err(UnderwriteError::invalid(
            field,
            format!("Must not exceed {MAX_HORIZON_YEARS} years"),
        ));
    }
    Ok(())
}

fn check_range(
    field: &str,
    value: Percent,
    min: Percent,
    max: Percent,
    max_inclusive: bool,
) -> CoreResult<()> {
    let above = if max_inclusive { value > max } else { value >= max };
    if value < min || above {
        let upper = if max_inclusive { "]" } else { ")" };
        return Err(UnderwriteError::invalid(
            field,
            format!("Must be within [{min}, {max}{upper} percent"),
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
