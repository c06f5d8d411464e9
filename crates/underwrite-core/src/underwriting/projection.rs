use rust_decimal::Decimal;
use rust_decimal::MathematicalOps;
use serde::{Deserialize, Serialize};

use super::inputs::DealTerms;
use super::mortgage::DebtProfile;
use crate::error::UnderwriteError;
use crate::types::Money;
use crate::CoreResult;

/// One projected year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashflowRow {
    pub year: u32,
    /// Effective annual rent after vacancy
    pub rent: Money,
    pub opex: Money,
    /// Annual debt service
    pub mortgage: Money,
    pub capex: Money,
    /// rent - opex - mortgage - capex
    pub net_cashflow: Money,
    /// Running total seeded with -(equity + fees); excludes sale proceeds
    pub cumulative_cashflow: Money,
    /// price * (1 + appreciation)^year
    pub property_value: Money,
    /// Loan outstanding at year end under the selected mortgage model
    pub loan_balance: Money,
}

/// Projected rows plus the exit figures derived from the final year.
#[derive(Debug, Clone)]
pub(crate) struct Projection {
    pub rows: Vec<CashflowRow>,
    pub exit_value: Money,
    pub exit_loan_balance: Money,
    pub sale_proceeds: Money,
    /// Final cumulative cash flow with sale proceeds added once
    pub total_return: Money,
}

/// Run the year loop from 1 to `exit_year`.
///
/// Rent, opex and the capex schedule come from the terms; debt service and
/// balances come from the profile, so the loop itself is model-agnostic.
pub(crate) fn project(terms: &DealTerms, debt: &DebtProfile) -> CoreResult<Projection> {
    let annual_rent = terms
        .monthly_rent
        .checked_mul(Decimal::from(12))
        .ok_or_else(|| UnderwriteError::overflow("annual rent"))?
        * (Decimal::ONE - terms.vacancy);
    let opex = annual_rent * terms.opex;
    let growth = Decimal::ONE + terms.appreciation;

    let mut cumulative = -terms.cash_invested();
    let mut rows = Vec::with_capacity(terms.exit_year as usize);

    for year in 1..=terms.exit_year {
        let idx = (year - 1) as usize;
        let mortgage = debt.yearly_debt_service[idx];
        let capex = terms.capex_for_year(year);
        let net_cashflow = (annual_rent - opex)
            .checked_sub(mortgage)
            .and_then(|v| v.checked_sub(capex))
            .ok_or_else(|| UnderwriteError::overflow(format!("net cash flow in year {year}")))?;
        cumulative = cumulative
            .checked_add(net_cashflow)
            .ok_or_else(|| UnderwriteError::overflow(format!("cumulative cash flow in year {year}")))?;

        let property_value = growth
            .checked_powi(year as i64)
            .and_then(|factor| terms.price.checked_mul(factor))
            .ok_or_else(|| UnderwriteError::overflow(format!("property value in year {year}")))?;

        rows.push(CashflowRow {
            year,
            rent: annual_rent,
            opex,
            mortgage,
            capex,
            net_cashflow,
            cumulative_cashflow: cumulative,
            property_value,
            loan_balance: debt.yearly_balance[idx],
        });
    }

    // exit_year >= 1 is guaranteed by DealTerms, so the last row exists
    let (exit_value, exit_loan_balance) = rows
        .last()
        .map(|r| (r.property_value, r.loan_balance))
        .unwrap_or((terms.price, terms.loan_amount));
    let sale_proceeds = exit_value - exit_loan_balance;
    let total_return = cumulative
        .checked_add(sale_proceeds)
        .ok_or_else(|| UnderwriteError::overflow("total return"))?;

    Ok(Projection {
        rows,
        exit_value,
        exit_loan_balance,
        sale_proceeds,
        total_return,
    })
}

/// Equity cash-flow series for IRR: the outlay, each year's net cash flow,
/// and sale proceeds folded into the final period.
pub(crate) fn irr_series(terms: &DealTerms, projection: &Projection) -> CoreResult<Vec<Money>> {
    let mut flows = Vec::with_capacity(projection.rows.len() + 1);
    flows.push(-terms.cash_invested());
    flows.extend(projection.rows.iter().map(|r| r.net_cashflow));
    if let Some(last) = flows.last_mut() {
        *last = last
            .checked_add(projection.sale_proceeds)
            .ok_or_else(|| UnderwriteError::overflow("final period cash flow"))?;
    }
    Ok(flows)
}
