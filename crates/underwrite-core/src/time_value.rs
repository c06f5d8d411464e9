use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal::MathematicalOps;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::UnderwriteError;
use crate::types::{rate_to_pct, Money, Percent, Rate};
use crate::CoreResult;

/// Starting point for every Newton-Raphson IRR search (10%).
pub const IRR_INITIAL_GUESS: Rate = dec!(0.10);
pub const IRR_MAX_ITERATIONS: u32 = 20;
/// Converged once successive iterates differ by less than this.
pub const IRR_RATE_TOLERANCE: Rate = dec!(0.0001);
/// ...and the NPV at the iterate is within this many currency units of zero.
pub const IRR_NPV_TOLERANCE: Money = dec!(0.01);

const DERIVATIVE_FLOOR: Decimal = dec!(0.000000001);
const RATE_FLOOR: Rate = dec!(-0.99);
const RATE_CEILING: Rate = dec!(10.0);
const XIRR_MAX_ITERATIONS: u32 = 100;
const XIRR_THRESHOLD: Decimal = dec!(0.0000001);

/// Outcome of an IRR search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IrrStatus {
    /// Rate and NPV tolerances were both met.
    Converged,
    /// Iteration cap reached; `irr_pct` holds the last iterate.
    NotConverged,
    /// No meaningful root: no sign change, flat derivative, or overflow.
    Undetermined,
}

/// IRR estimate together with how much it can be trusted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IrrEstimate {
    pub status: IrrStatus,
    /// IRR in percent (13.35 = 13.35%)
    pub irr_pct: Option<Percent>,
    pub iterations: u32,
    /// NPV of the series discounted at the estimate
    pub npv_at_estimate: Option<Money>,
}

impl IrrEstimate {
    pub fn is_converged(&self) -> bool {
        self.status == IrrStatus::Converged
    }

    fn undetermined(iterations: u32) -> Self {
        IrrEstimate {
            status: IrrStatus::Undetermined,
            irr_pct: None,
            iterations,
            npv_at_estimate: None,
        }
    }
}

/// Net Present Value of a series of cash flows
pub fn npv(rate: Rate, cash_flows: &[Money]) -> CoreResult<Money> {
    if rate <= dec!(-1) {
        return Err(UnderwriteError::InvalidInput {
            field: "rate".into(),
            reason: "Discount rate must be greater than -100%".into(),
        });
    }

    npv_and_derivative(cash_flows, rate)
        .map(|(value, _)| value)
        .ok_or_else(|| {
            UnderwriteError::FinancialImpossibility(format!(
                "NPV overflows Decimal range at rate {rate}"
            ))
        })
}

/// Internal Rate of Return by Newton-Raphson, starting at 10%.
///
/// `cash_flows[0]` is the period-0 outlay. The search runs for at most
/// [`IRR_MAX_ITERATIONS`] steps with iterates clamped to [-99%, 1000%]. When
/// the cap is hit the last iterate is still returned, flagged
/// [`IrrStatus::NotConverged`].
pub fn solve_irr(cash_flows: &[Money]) -> IrrEstimate {
    if cash_flows.len() < 2 {
        return IrrEstimate::undetermined(0);
    }

    let has_inflow = cash_flows.iter().any(|cf| cf.is_sign_positive() && !cf.is_zero());
    let has_outflow = cash_flows.iter().any(|cf| cf.is_sign_negative() && !cf.is_zero());
    if !has_inflow || !has_outflow {
        return IrrEstimate::undetermined(0);
    }

    let mut rate = IRR_INITIAL_GUESS;

    for i in 0..IRR_MAX_ITERATIONS {
        let Some((npv_val, dnpv)) = npv_and_derivative(cash_flows, rate) else {
            return IrrEstimate::undetermined(i);
        };

        if dnpv.abs() < DERIVATIVE_FLOOR {
            return IrrEstimate::undetermined(i);
        }

        let Some(step) = npv_val.checked_div(dnpv) else {
            return IrrEstimate::undetermined(i);
        };

        let next = (rate - step).clamp(RATE_FLOOR, RATE_CEILING);
        let delta = (next - rate).abs();
        rate = next;

        if delta < IRR_RATE_TOLERANCE {
            if let Some((residual, _)) = npv_and_derivative(cash_flows, rate) {
                if residual.abs() < IRR_NPV_TOLERANCE {
                    return IrrEstimate {
                        status: IrrStatus::Converged,
                        irr_pct: Some(rate_to_pct(rate)),
                        iterations: i + 1,
                        npv_at_estimate: Some(residual),
                    };
                }
            }
        }
    }

    IrrEstimate {
        status: IrrStatus::NotConverged,
        irr_pct: Some(rate_to_pct(rate)),
        iterations: IRR_MAX_ITERATIONS,
        npv_at_estimate: npv_and_derivative(cash_flows, rate).map(|(v, _)| v),
    }
}

/// Extended IRR for irregular cash flow dates using Newton-Raphson.
/// Returns the annual rate as a decimal.
pub fn xirr(dated_flows: &[(NaiveDate, Money)], guess: Rate) -> CoreResult<Rate> {
    if dated_flows.len() < 2 {
        return Err(UnderwriteError::InsufficientData(
            "XIRR requires at least 2 cash flows".into(),
        ));
    }

    let base_date = dated_flows[0].0;
    let mut rate = guess;

    for i in 0..XIRR_MAX_ITERATIONS {
        let mut npv_val = Decimal::ZERO;
        let mut dnpv = Decimal::ZERO;
        let one_plus_r = Decimal::ONE + rate;

        if one_plus_r <= Decimal::ZERO {
            return Err(UnderwriteError::ConvergenceFailure {
                function: "XIRR".into(),
                iterations: i,
                last_delta: npv_val,
            });
        }

        for (date, amount) in dated_flows {
            let days = (*date - base_date).num_days();
            let years = Decimal::from(days) / dec!(365.25);

            let discount = one_plus_r.checked_powd(years).ok_or_else(|| {
                UnderwriteError::FinancialImpossibility(format!(
                    "XIRR discount factor overflow at rate {rate}"
                ))
            })?;
            if discount.is_zero() {
                continue;
            }

            npv_val += amount / discount;
            dnpv -= years * amount / (one_plus_r * discount);
        }

        if npv_val.abs() < XIRR_THRESHOLD {
            return Ok(rate);
        }

        if dnpv.is_zero() {
            return Err(UnderwriteError::ConvergenceFailure {
                function: "XIRR".into(),
                iterations: i,
                last_delta: npv_val,
            });
        }

        let step = npv_val / dnpv;
        rate = (rate - step).clamp(RATE_FLOOR, RATE_CEILING);

        // Fractional powers are approximated, so NPV may never reach the
        // threshold exactly; a vanishing step is as good.
        if step.abs() < XIRR_THRESHOLD {
            return Ok(rate);
        }
    }

    Err(UnderwriteError::ConvergenceFailure {
        function: "XIRR".into(),
        iterations: XIRR_MAX_ITERATIONS,
        last_delta: Decimal::ZERO,
    })
}

/// NPV(r) = sum CF_t / (1+r)^t and its derivative d(NPV)/dr.
/// `None` when any intermediate leaves the Decimal range.
fn npv_and_derivative(cash_flows: &[Money], rate: Rate) -> Option<(Decimal, Decimal)> {
    let one_plus_r = Decimal::ONE + rate;
    if one_plus_r <= Decimal::ZERO {
        return None;
    }

    let mut npv = Decimal::ZERO;
    let mut dnpv = Decimal::ZERO;
    let mut discount = Decimal::ONE;

    for (t, cf) in cash_flows.iter().enumerate() {
        npv = npv.checked_add(cf.checked_mul(discount)?)?;
        if t > 0 {
            // d/dr of CF_t / (1+r)^t = -t * CF_t / (1+r)^(t+1)
            let term = Decimal::from(t as i64)
                .checked_mul(*cf)?
                .checked_mul(discount)?
                .checked_div(one_plus_r)?;
            dnpv = dnpv.checked_sub(term)?;
        }
        discount = discount.checked_div(one_plus_r)?;
    }

    Some((npv, dnpv))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_npv_basic() {
        let cfs = vec![dec!(-1000), dec!(300), dec!(400), dec!(500)];
        let result = npv(dec!(0.10), &cfs).unwrap();
        // -1000 + 300/1.1 + 400/1.21 + 500/1.331 ≈ -21.04
        assert!((result - dec!(-21.04)).abs() < dec!(1.0));
    }

    #[test]
    fn test_npv_zero_rate() {
        let cfs = vec![dec!(-100), dec!(50), dec!(50), dec!(50)];
        assert_eq!(npv(dec!(0.0), &cfs).unwrap(), dec!(50));
    }

    #[test]
    fn test_npv_rejects_rate_at_minus_100() {
        assert!(npv(dec!(-1), &[dec!(-1), dec!(2)]).is_err());
    }

    #[test]
    fn test_irr_even_cashflows() {
        let est = solve_irr(&[dec!(-1000), dec!(400), dec!(400), dec!(400)]);
        assert_eq!(est.status, IrrStatus::Converged);
        // ~9.7%
        let irr = est.irr_pct.unwrap();
        assert!((irr - dec!(9.7)).abs() < dec!(0.1), "got {irr}");
        assert!(est.npv_at_estimate.unwrap().abs() < IRR_NPV_TOLERANCE);
        assert!(est.iterations <= IRR_MAX_ITERATIONS);
    }

    #[test]
    fn test_irr_no_sign_change_is_undetermined() {
        let est = solve_irr(&[dec!(100), dec!(50), dec!(50)]);
        assert_eq!(est.status, IrrStatus::Undetermined);
        assert!(est.irr_pct.is_none());

        let est = solve_irr(&[dec!(-100), dec!(-50), dec!(0)]);
        assert_eq!(est.status, IrrStatus::Undetermined);
    }

    #[test]
    fn test_irr_single_flow_is_undetermined() {
        assert_eq!(solve_irr(&[dec!(-100)]).status, IrrStatus::Undetermined);
        assert_eq!(solve_irr(&[]).status, IrrStatus::Undetermined);
    }

    #[test]
    fn test_irr_root_beyond_ceiling_returns_last_iterate() {
        // True IRR is 99900%, above the 1000% clamp
        let est = solve_irr(&[dec!(-1), dec!(0), dec!(1000000)]);
        assert_eq!(est.status, IrrStatus::NotConverged);
        assert_eq!(est.iterations, IRR_MAX_ITERATIONS);
        assert_eq!(est.irr_pct, Some(dec!(1000)));
        assert!(!est.is_converged());
    }

    #[test]
    fn test_irr_negative_return() {
        // Lose 20% over one period
        let est = solve_irr(&[dec!(-100), dec!(80)]);
        assert!(est.is_converged());
        assert!((est.irr_pct.unwrap() - dec!(-20)).abs() < dec!(0.01));
    }

    #[test]
    fn test_xirr_annual_dates_matches_irr() {
        let d0 = NaiveDate::from_ymd_opt(2021, 1, 1).unwrap();
        let d1 = NaiveDate::from_ymd_opt(2022, 1, 1).unwrap();
        let rate = xirr(&[(d0, dec!(-1000)), (d1, dec!(1100))], dec!(0.10)).unwrap();
        assert!((rate - dec!(0.10)).abs() < dec!(0.001));
    }

    #[test]
    fn test_xirr_requires_two_flows() {
        let d0 = NaiveDate::from_ymd_opt(2021, 1, 1).unwrap();
        assert!(matches!(
            xirr(&[(d0, dec!(-1000))], dec!(0.10)),
            Err(UnderwriteError::InsufficientData(_))
        ));
    }
}
