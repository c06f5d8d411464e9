use chrono::NaiveDate;
use clap::{Args, ValueEnum};
use log::debug;
use rust_decimal::Decimal;
use serde_json::Value;

use underwrite_core::underwriting::{
    analyze_deal, calculate_mortgage, FinanceType, IrrPolicy, MortgageRequest, UnderwriteInputs,
    UnderwriteOptions, UnderwriteRequest,
};

use crate::input;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum FinanceTypeArg {
    /// Interest-only
    Io,
    /// Level-payment repayment mortgage
    Amortizing,
}

impl From<FinanceTypeArg> for FinanceType {
    fn from(arg: FinanceTypeArg) -> Self {
        match arg {
            FinanceTypeArg::Io => FinanceType::InterestOnly,
            FinanceTypeArg::Amortizing => FinanceType::Amortizing,
        }
    }
}

/// Arguments for deal underwriting
#[derive(Args)]
pub struct UnderwriteArgs {
    /// Path to a JSON or YAML request file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,

    /// Label carried into the output assumptions
    #[arg(long)]
    pub property_name: Option<String>,

    /// Purchase price
    #[arg(long)]
    pub price: Option<Decimal>,

    #[arg(long, value_enum, default_value = "io")]
    pub finance_type: FinanceTypeArg,

    /// Loan-to-value, percent
    #[arg(long)]
    pub ltv: Option<Decimal>,

    /// Annual interest rate, percent
    #[arg(long)]
    pub rate: Option<Decimal>,

    /// Acquisition fees
    #[arg(long, default_value = "0")]
    pub fees: Decimal,

    /// Capex for years 1-3 (comma-separated, e.g. "5000,2000,0")
    #[arg(long, value_delimiter = ',')]
    pub capex: Option<Vec<Decimal>>,

    /// Gross monthly rent
    #[arg(long)]
    pub monthly_rent: Option<Decimal>,

    /// Operating expenses, percent of effective rent
    #[arg(long, default_value = "0")]
    pub opex_pct: Decimal,

    /// Vacancy, percent of gross rent
    #[arg(long, default_value = "0")]
    pub vacancy_pct: Decimal,

    /// Hold period in years
    #[arg(long)]
    pub exit_year: Option<u32>,

    /// Annual property appreciation, percent
    #[arg(long, default_value = "0", allow_hyphen_values = true)]
    pub appreciation_rate: Decimal,

    /// Amortisation horizon for repayment loans (defaults to the exit year)
    #[arg(long)]
    pub amortization_years: Option<u32>,

    /// Track the real loan balance instead of the flat legacy approximation
    #[arg(long)]
    pub amortization_schedule: bool,

    /// Fail instead of returning an unconverged IRR
    #[arg(long)]
    pub strict_irr: bool,

    /// Closing date (YYYY-MM-DD); adds a dated schedule and XIRR
    #[arg(long)]
    pub acquisition_date: Option<NaiveDate>,
}

pub fn run_underwrite(args: UnderwriteArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let request: UnderwriteRequest = if let Some(ref path) = args.input {
        input::file::read_json(path)?
    } else if let Some(request) = input::stdin::read_stdin()? {
        request
    } else {
        request_from_flags(args)?
    };

    debug!(
        "underwriting {} at price {}",
        request.property_name.as_deref().unwrap_or("unnamed deal"),
        request.price
    );
    let result = analyze_deal(&request)?;
    Ok(serde_json::to_value(result)?)
}

fn request_from_flags(args: UnderwriteArgs) -> Result<UnderwriteRequest, Box<dyn std::error::Error>> {
    let price = args.price.ok_or("--price is required (or provide --input)")?;
    let ltv = args.ltv.ok_or("--ltv is required (or provide --input)")?;
    let rate = args.rate.ok_or("--rate is required (or provide --input)")?;
    let monthly_rent = args
        .monthly_rent
        .ok_or("--monthly-rent is required (or provide --input)")?;
    let exit_year = args
        .exit_year
        .ok_or("--exit-year is required (or provide --input)")?;

    let capex = args.capex.unwrap_or_default();
    if capex.len() > 3 {
        return Err(format!("--capex takes at most 3 values, got {}", capex.len()).into());
    }
    let capex_for = |i: usize| capex.get(i).copied().unwrap_or(Decimal::ZERO);

    Ok(UnderwriteRequest {
        property_name: args.property_name,
        price,
        inputs: UnderwriteInputs {
            finance_type: args.finance_type.into(),
            ltv,
            rate,
            fees: args.fees,
            capex_year1: capex_for(0),
            capex_year2: capex_for(1),
            capex_year3: capex_for(2),
            monthly_rent,
            opex_pct: args.opex_pct,
            vacancy_pct: args.vacancy_pct,
            exit_year,
            appreciation_rate: args.appreciation_rate,
        },
        options: UnderwriteOptions {
            use_flat_mortgage_approximation: !args.amortization_schedule,
            amortization_years: args.amortization_years,
            irr_policy: if args.strict_irr {
                IrrPolicy::Strict
            } else {
                IrrPolicy::BestEffort
            },
            acquisition_date: args.acquisition_date,
        },
    })
}

/// Arguments for the mortgage payment calculator
#[derive(Args)]
pub struct MortgageArgs {
    /// Path to a JSON or YAML request file
    #[arg(long)]
    pub input: Option<String>,

    #[arg(long)]
    pub loan_amount: Option<Decimal>,

    /// Annual interest rate, percent
    #[arg(long)]
    pub rate: Option<Decimal>,

    #[arg(long, value_enum, default_value = "amortizing")]
    pub finance_type: FinanceTypeArg,

    #[arg(long, default_value = "25")]
    pub term_years: u32,

    /// Include the year-by-year amortisation table
    #[arg(long)]
    pub schedule: bool,
}

pub fn run_mortgage(args: MortgageArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let request: MortgageRequest = if let Some(ref path) = args.input {
        input::file::read_json(path)?
    } else if let Some(request) = input::stdin::read_stdin()? {
        request
    } else {
        MortgageRequest {
            loan_amount: args
                .loan_amount
                .ok_or("--loan-amount is required (or provide --input)")?,
            rate: args.rate.ok_or("--rate is required (or provide --input)")?,
            finance_type: args.finance_type.into(),
            term_years: args.term_years,
            include_schedule: args.schedule,
        }
    };

    let result = calculate_mortgage(&request)?;
    Ok(serde_json::to_value(result)?)
}
