use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use underwrite_core::time_value::{npv, IrrStatus, IRR_MAX_ITERATIONS, IRR_NPV_TOLERANCE};
use underwrite_core::underwriting::mortgage::{
    amortization_schedule, annual_debt_service, monthly_payment, outstanding_balance,
};
use underwrite_core::underwriting::{
    analyze_deal, underwrite, underwrite_with_options, FinanceType, IrrPolicy, MortgageModel,
    RatioMetric, UnderwriteInputs, UnderwriteOptions, UnderwriteRequest,
};
use underwrite_core::UnderwriteError;

fn scenario_a() -> UnderwriteInputs {
    UnderwriteInputs {
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
    }
}

const PRICE: Decimal = dec!(200000);

// ===========================================================================
// Reference scenarios
// ===========================================================================

#[test]
fn test_scenario_a_year_one() {
    let result = underwrite(PRICE, &scenario_a()).unwrap();
    assert_eq!(result.summary.loan_amount, dec!(150000));
    assert_eq!(result.summary.equity, dec!(50000));

    let y1 = &result.cashflows[0];
    assert_eq!(y1.rent, dec!(13680));
    assert_eq!(y1.opex, dec!(2052));
    assert!((y1.mortgage - dec!(8250)).abs() < dec!(0.000001));
    assert_eq!(y1.capex, Decimal::ZERO);
    assert!((y1.net_cashflow - dec!(3378)).abs() < dec!(0.000001));
}

#[test]
fn test_scenario_b_dscr() {
    let result = underwrite(PRICE, &scenario_a()).unwrap();
    let dscr = result.dscr.value().unwrap();
    assert_eq!(dscr.round_dp(2), dec!(1.41));
}

#[test]
fn test_scenario_c_property_value() {
    let result = underwrite(PRICE, &scenario_a()).unwrap();
    let value = result.cashflows[9].property_value;
    assert_eq!(value.round(), dec!(268783));
}

#[test]
fn test_scenario_d_zero_rate_amortizing() {
    let inputs = UnderwriteInputs {
        finance_type: FinanceType::Amortizing,
        ltv: dec!(50),
        rate: Decimal::ZERO,
        exit_year: 5,
        ..scenario_a()
    };
    // 50% of 200k = 100k loan
    let result = underwrite(PRICE, &inputs).unwrap();
    for row in &result.cashflows {
        assert!(
            (row.mortgage - dec!(20000)).abs() < dec!(0.0001),
            "year {} mortgage {}",
            row.year,
            row.mortgage
        );
    }
}

// ===========================================================================
// Structural properties
// ===========================================================================

#[test]
fn test_row_count_and_ordering() {
    for exit_year in [1u32, 2, 7, 25, 50] {
        let inputs = UnderwriteInputs {
            exit_year,
            ..scenario_a()
        };
        let result = underwrite(PRICE, &inputs).unwrap();
        assert_eq!(result.cashflows.len(), exit_year as usize);
        for (i, row) in result.cashflows.iter().enumerate() {
            assert_eq!(row.year, i as u32 + 1);
        }
    }
}

#[test]
fn test_cumulative_non_decreasing_with_positive_flows() {
    let result = underwrite(PRICE, &scenario_a()).unwrap();
    assert!(result.cashflows.iter().all(|r| r.net_cashflow >= Decimal::ZERO));
    let mut previous = -result.summary.cash_invested;
    for row in &result.cashflows {
        assert!(row.cumulative_cashflow >= previous);
        assert_eq!(row.cumulative_cashflow, previous + row.net_cashflow);
        previous = row.cumulative_cashflow;
    }
}

#[test]
fn test_interest_only_closed_form() {
    for (rate, ltv) in [(dec!(3.25), dec!(60)), (dec!(5.5), dec!(75)), (dec!(8), dec!(90))] {
        let inputs = UnderwriteInputs {
            rate,
            ltv,
            ..scenario_a()
        };
        let result = underwrite(PRICE, &inputs).unwrap();
        let loan = PRICE * ltv / dec!(100);
        let expected = loan * rate / dec!(100) / dec!(12) * dec!(12);
        let mortgage = result.cashflows[0].mortgage;
        assert!((mortgage - expected).abs() < dec!(0.000001), "got {mortgage}");
        let direct = annual_debt_service(loan, rate, FinanceType::InterestOnly, 10).unwrap();
        assert_eq!(direct, mortgage);
    }
}

#[test]
fn test_property_value_monotonic() {
    let result = underwrite(PRICE, &scenario_a()).unwrap();
    for pair in result.cashflows.windows(2) {
        assert!(pair[1].property_value > pair[0].property_value);
    }
}

#[test]
fn test_capex_only_in_first_three_years() {
    let inputs = UnderwriteInputs {
        capex_year1: dec!(5000),
        capex_year2: dec!(3000),
        capex_year3: dec!(1000),
        ..scenario_a()
    };
    let result = underwrite(PRICE, &inputs).unwrap();
    let capex: Vec<Decimal> = result.cashflows.iter().map(|r| r.capex).collect();
    assert_eq!(&capex[..4], &[dec!(5000), dec!(3000), dec!(1000), Decimal::ZERO]);
    let net = result.cashflows[0].net_cashflow;
    assert!((net - (dec!(3378) - dec!(5000))).abs() < dec!(0.000001));
}

#[test]
fn test_deterministic() {
    let a = underwrite(PRICE, &scenario_a()).unwrap();
    let b = underwrite(PRICE, &scenario_a()).unwrap();
    assert_eq!(a, b);
    assert_eq!(
        serde_json::to_string(&a).unwrap(),
        serde_json::to_string(&b).unwrap()
    );
}

// ===========================================================================
// Returns
// ===========================================================================

#[test]
fn test_irr_converges_with_small_residual() {
    let result = underwrite(PRICE, &scenario_a()).unwrap();
    assert_eq!(result.irr.status, IrrStatus::Converged);
    assert!(result.irr.iterations <= IRR_MAX_ITERATIONS);

    let irr = result.irr.irr_pct.unwrap();
    assert!((irr - dec!(13.35)).abs() < dec!(0.01), "got {irr}");

    let mut flows = vec![-result.summary.cash_invested];
    flows.extend(result.cashflows.iter().map(|r| r.net_cashflow));
    if let Some(last) = flows.last_mut() {
        *last += result.summary.sale_proceeds;
    }
    let residual = npv(irr / dec!(100), &flows).unwrap();
    assert!(residual.abs() < IRR_NPV_TOLERANCE, "NPV at IRR = {residual}");
}

#[test]
fn test_equity_multiple_counts_sale_once() {
    let result = underwrite(PRICE, &scenario_a()).unwrap();
    let s = &result.summary;
    assert_eq!(s.sale_proceeds, s.exit_value - dec!(150000));
    let recomputed = -s.cash_invested + s.total_net_cashflow + s.sale_proceeds;
    assert!((s.total_return - recomputed).abs() < dec!(0.000001));

    let em = result.equity_multiple.value().unwrap();
    assert!((em - dec!(1.9339)).abs() < dec!(0.0001), "got {em}");
}

#[test]
fn test_breakeven_occupancy() {
    let result = underwrite(PRICE, &scenario_a()).unwrap();
    assert_eq!(result.breakeven.value().unwrap().round_dp(2), dec!(79.27));
}

// ===========================================================================
// Degenerate ratios and IRR policy
// ===========================================================================

#[test]
fn test_all_cash_dscr_not_applicable() {
    let inputs = UnderwriteInputs {
        ltv: Decimal::ZERO,
        ..scenario_a()
    };
    let result = underwrite(PRICE, &inputs).unwrap();
    assert!(matches!(result.dscr, RatioMetric::NotApplicable { .. }));
    assert!(result.equity_multiple.is_defined());
    assert!(result.irr.is_converged());
}

#[test]
fn test_zero_rent_breakeven_not_applicable() {
    let inputs = UnderwriteInputs {
        monthly_rent: Decimal::ZERO,
        ..scenario_a()
    };
    let result = underwrite(PRICE, &inputs).unwrap();
    assert!(!result.breakeven.is_defined());
}

#[test]
fn test_full_leverage_no_fees_multiple_not_applicable() {
    let inputs = UnderwriteInputs {
        ltv: dec!(100),
        fees: Decimal::ZERO,
        ..scenario_a()
    };
    let result = underwrite(PRICE, &inputs).unwrap();
    assert!(!result.equity_multiple.is_defined());
    assert!(!result.summary.cash_on_cash_year1.is_defined());
}

#[test]
fn test_strict_policy_rejects_undetermined_irr() {
    // No outlay and positive flows: no sign change
    let inputs = UnderwriteInputs {
        ltv: dec!(100),
        fees: Decimal::ZERO,
        rate: Decimal::ZERO,
        ..scenario_a()
    };
    let best_effort = underwrite(PRICE, &inputs).unwrap();
    assert_eq!(best_effort.irr.status, IrrStatus::Undetermined);

    let options = UnderwriteOptions {
        irr_policy: IrrPolicy::Strict,
        ..Default::default()
    };
    assert!(matches!(
        underwrite_with_options(PRICE, &inputs, &options),
        Err(UnderwriteError::FinancialImpossibility(_))
    ));
}

fn runaway_growth_deal() -> UnderwriteInputs {
    // Equity doubles in two years on almost no cash: the true IRR sits far
    // above the 1000% clamp
    UnderwriteInputs {
        ltv: dec!(99.99),
        fees: Decimal::ZERO,
        rate: Decimal::ZERO,
        appreciation_rate: dec!(50),
        exit_year: 2,
        ..scenario_a()
    }
}

#[test]
fn test_irr_hitting_iteration_cap_is_flagged() {
    let result = underwrite(PRICE, &runaway_growth_deal()).unwrap();
    assert_eq!(result.irr.status, IrrStatus::NotConverged);
    assert_eq!(result.irr.iterations, IRR_MAX_ITERATIONS);
    assert_eq!(result.irr.irr_pct, Some(dec!(1000)));
    assert!(!result.irr.is_converged());
}

#[test]
fn test_best_effort_irr_warns_when_not_converged() {
    let request = UnderwriteRequest {
        property_name: None,
        price: PRICE,
        inputs: runaway_growth_deal(),
        options: UnderwriteOptions::default(),
    };
    let output = analyze_deal(&request).unwrap();
    assert_eq!(output.result.irr.status, IrrStatus::NotConverged);
    assert!(
        output
            .warnings
            .iter()
            .any(|w| w.contains("IRR did not converge after 20 iterations")),
        "warnings: {:?}",
        output.warnings
    );
}

#[test]
fn test_strict_policy_rejects_unconverged_irr() {
    let options = UnderwriteOptions {
        irr_policy: IrrPolicy::Strict,
        ..Default::default()
    };
    match underwrite_with_options(PRICE, &runaway_growth_deal(), &options) {
        Err(UnderwriteError::ConvergenceFailure {
            function,
            iterations,
            ..
        }) => {
            assert_eq!(function, "IRR");
            assert_eq!(iterations, IRR_MAX_ITERATIONS);
        }
        other => panic!("expected ConvergenceFailure, got {other:?}"),
    }
}

// ===========================================================================
// Validation
// ===========================================================================

#[test]
fn test_value_beyond_decimal_range_is_an_error_not_a_panic() {
    // 1e14 doubling for 50 years is about 1.1e29, past Decimal::MAX
    let inputs = UnderwriteInputs {
        appreciation_rate: dec!(100),
        exit_year: 50,
        ..scenario_a()
    };
    match underwrite(dec!(100000000000000), &inputs) {
        Err(UnderwriteError::FinancialImpossibility(msg)) => {
            assert!(msg.contains("exceeds Decimal range"), "got {msg}")
        }
        other => panic!("expected FinancialImpossibility, got {other:?}"),
    }
}

#[test]
fn test_rejects_bad_price_and_horizon() {
    assert!(matches!(
        underwrite(Decimal::ZERO, &scenario_a()),
        Err(UnderwriteError::InvalidInput { .. })
    ));
    assert!(underwrite(dec!(-1), &scenario_a()).is_err());

    let inputs = UnderwriteInputs {
        exit_year: 0,
        ..scenario_a()
    };
    match underwrite(PRICE, &inputs) {
        Err(UnderwriteError::InvalidInput { field, .. }) => assert_eq!(field, "exit_year"),
        other => panic!("expected InvalidInput, got {other:?}"),
    }
}

#[test]
fn test_rejects_out_of_range_percentages() {
    let cases = [
        UnderwriteInputs { vacancy_pct: dec!(-1), ..scenario_a() },
        UnderwriteInputs { vacancy_pct: dec!(100), ..scenario_a() },
        UnderwriteInputs { opex_pct: dec!(120), ..scenario_a() },
        UnderwriteInputs { ltv: dec!(101), ..scenario_a() },
        UnderwriteInputs { rate: dec!(-0.5), ..scenario_a() },
        UnderwriteInputs { appreciation_rate: dec!(-100), ..scenario_a() },
    ];
    for inputs in &cases {
        assert!(underwrite(PRICE, inputs).is_err(), "accepted {inputs:?}");
    }
}

// ===========================================================================
// Mortgage helpers and amortisation model
// ===========================================================================

#[test]
fn test_amortizing_payment_formula() {
    let payment = monthly_payment(dec!(100000), dec!(6), FinanceType::Amortizing, 25).unwrap();
    // 100k at 6% over 25 years ≈ 644.30
    assert!((payment - dec!(644.30)).abs() < dec!(0.01), "got {payment}");
}

#[test]
fn test_schedule_repays_loan_over_term() {
    let schedule =
        amortization_schedule(dec!(100000), dec!(6), FinanceType::Amortizing, 5, 5).unwrap();
    assert_eq!(schedule.len(), 5);
    assert!(schedule[4].closing_balance.abs() < dec!(0.01));
    let balance = outstanding_balance(dec!(100000), dec!(6), FinanceType::Amortizing, 5, 2).unwrap();
    assert_eq!(balance, schedule[1].closing_balance);
}

#[test]
fn test_schedule_model_deducts_remaining_balance() {
    let inputs = UnderwriteInputs {
        finance_type: FinanceType::Amortizing,
        ..scenario_a()
    };
    let flat = underwrite(PRICE, &inputs).unwrap();
    let options = UnderwriteOptions {
        use_flat_mortgage_approximation: false,
        amortization_years: Some(25),
        ..Default::default()
    };
    let scheduled = underwrite_with_options(PRICE, &inputs, &options).unwrap();

    assert_eq!(flat.summary.mortgage_model, MortgageModel::FlatApproximation);
    assert_eq!(scheduled.summary.mortgage_model, MortgageModel::AmortizationSchedule);
    assert_eq!(flat.summary.exit_loan_balance, dec!(150000));
    assert!(scheduled.summary.exit_loan_balance < dec!(150000));
    assert!(scheduled.summary.sale_proceeds > flat.summary.sale_proceeds - dec!(1));
    for pair in scheduled.cashflows.windows(2) {
        assert!(pair[1].loan_balance < pair[0].loan_balance);
    }
}

// ===========================================================================
// Envelope
// ===========================================================================

#[test]
fn test_analyze_deal_envelope_and_dated_schedule() {
    let request = UnderwriteRequest {
        property_name: Some("Scenario A".into()),
        price: PRICE,
        inputs: scenario_a(),
        options: UnderwriteOptions {
            acquisition_date: NaiveDate::from_ymd_opt(2024, 3, 31),
            ..Default::default()
        },
    };
    let output = analyze_deal(&request).unwrap();
    assert!(output.methodology.contains("flat annual debt service"));
    assert_eq!(output.metadata.precision, "rust_decimal_128bit");

    let dated = output.result.dated.as_ref().unwrap();
    assert_eq!(dated.flows.len(), 11);
    assert_eq!(dated.flows[0].amount, dec!(-52000));
    assert_eq!(dated.flows[10].date, NaiveDate::from_ymd_opt(2034, 3, 31).unwrap());
    let xirr = dated.xirr_pct.unwrap();
    // Anniversaries are close to whole years, so XIRR tracks the periodic IRR
    assert!((xirr - output.result.irr.irr_pct.unwrap()).abs() < dec!(0.1), "got {xirr}");
}

#[test]
fn test_request_from_json() {
    let json = r#"{
        "price": "200000",
        "inputs": {
            "finance_type": "io",
            "ltv": 75, "rate": "5.5", "fees": 2000,
            "monthly_rent": 1200, "opex_pct": 15, "vacancy_pct": 5,
            "exit_year": 10, "appreciation_rate": 3
        }
    }"#;
    let request: UnderwriteRequest = serde_json::from_str(json).unwrap();
    assert!(request.options.use_flat_mortgage_approximation);
    let output = analyze_deal(&request).unwrap();
    assert!((output.result.cashflows[0].net_cashflow - dec!(3378)).abs() < dec!(0.000001));

    let value = serde_json::to_value(&output).unwrap();
    assert_eq!(value["result"]["dscr"]["status"], "defined");
    assert_eq!(value["result"]["irr"]["status"], "converged");
}
