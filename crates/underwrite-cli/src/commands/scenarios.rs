use clap::{Args, ValueEnum};
use log::debug;
use rust_decimal::Decimal;
use serde_json::Value;

use underwrite_core::scenarios::scenario::{compare_scenarios, ScenarioComparisonInput};
use underwrite_core::scenarios::sensitivity::{run_deal_sensitivity, DealSensitivityInput};
use underwrite_core::scenarios::OutputMetric;
use underwrite_core::underwriting::UnderwriteRequest;
use underwrite_core::SensitivityVariable;

use crate::input;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum MetricArg {
    Irr,
    Dscr,
    Breakeven,
    EquityMultiple,
    CashOnCash,
    Year1NetCashflow,
    TotalReturn,
}

impl From<MetricArg> for OutputMetric {
    fn from(arg: MetricArg) -> Self {
        match arg {
            MetricArg::Irr => OutputMetric::Irr,
            MetricArg::Dscr => OutputMetric::Dscr,
            MetricArg::Breakeven => OutputMetric::Breakeven,
            MetricArg::EquityMultiple => OutputMetric::EquityMultiple,
            MetricArg::CashOnCash => OutputMetric::CashOnCash,
            MetricArg::Year1NetCashflow => OutputMetric::Year1NetCashflow,
            MetricArg::TotalReturn => OutputMetric::TotalReturn,
        }
    }
}

/// Arguments for a two-way deal sensitivity grid
#[derive(Args)]
pub struct SensitivityArgs {
    /// Path to a full sensitivity request (JSON or YAML)
    #[arg(long)]
    pub input: Option<String>,

    /// Path to the base deal request, used with --var1/--var2
    #[arg(long)]
    pub deal: Option<String>,

    /// Row variable in format name:min:max:step (e.g. "rate:4:7:0.5")
    #[arg(long, allow_hyphen_values = true)]
    pub var1: Option<String>,

    /// Column variable in format name:min:max:step
    #[arg(long, allow_hyphen_values = true)]
    pub var2: Option<String>,

    /// Metric reported in each cell
    #[arg(long, value_enum, default_value = "irr")]
    pub metric: MetricArg,
}

fn parse_sens_var(spec: &str) -> Result<SensitivityVariable, Box<dyn std::error::Error>> {
    let parts: Vec<&str> = spec.split(':').collect();
    if parts.len() != 4 {
        return Err(format!(
            "Sensitivity variable must be name:min:max:step, got '{}'",
            spec
        )
        .into());
    }
    Ok(SensitivityVariable {
        name: parts[0].to_string(),
        min: parts[1].parse::<Decimal>()?,
        max: parts[2].parse::<Decimal>()?,
        step: parts[3].parse::<Decimal>()?,
    })
}

pub fn run_sensitivity(args: SensitivityArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let sens_input: DealSensitivityInput = if let Some(ref path) = args.input {
        input::file::read_json(path)?
    } else if let Some(ref deal_path) = args.deal {
        let deal: UnderwriteRequest = input::file::read_json(deal_path)?;
        let var1 = args.var1.as_deref().ok_or("--var1 is required with --deal")?;
        let var2 = args.var2.as_deref().ok_or("--var2 is required with --deal")?;
        DealSensitivityInput {
            deal,
            variable_1: parse_sens_var(var1)?,
            variable_2: parse_sens_var(var2)?,
            output_metric: args.metric.into(),
        }
    } else if let Some(request) = input::stdin::read_stdin()? {
        request
    } else {
        return Err("--input <file>, --deal <file> with --var1/--var2, or stdin required".into());
    };

    debug!(
        "sensitivity grid {} x {}",
        sens_input.variable_1.name, sens_input.variable_2.name
    );
    let result = run_deal_sensitivity(&sens_input)?;
    Ok(serde_json::to_value(result)?)
}

/// Arguments for scenario comparison
#[derive(Args)]
pub struct ScenariosArgs {
    /// Path to a scenario comparison request (JSON or YAML)
    #[arg(long)]
    pub input: Option<String>,
}

pub fn run_scenarios(args: ScenariosArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let comparison: ScenarioComparisonInput = if let Some(ref path) = args.input {
        input::file::read_json(path)?
    } else if let Some(request) = input::stdin::read_stdin()? {
        request
    } else {
        return Err("--input <file> or stdin required for scenario comparison".into());
    };

    debug!("comparing {} scenarios", comparison.scenarios.len());
    let result = compare_scenarios(&comparison)?;
    Ok(serde_json::to_value(result)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_sens_var() {
        let var = parse_sens_var("appreciation_rate:-2:4:0.5").unwrap();
        assert_eq!(var.name, "appreciation_rate");
        assert_eq!(var.min, dec!(-2));
        assert_eq!(var.max, dec!(4));
        assert_eq!(var.step, dec!(0.5));
    }

    #[test]
    fn test_parse_sens_var_rejects_bad_format() {
        assert!(parse_sens_var("rate:4:7").is_err());
        assert!(parse_sens_var("rate:low:7:0.5").is_err());
    }

    #[test]
    fn test_metric_mapping() {
        assert_eq!(OutputMetric::from(MetricArg::Year1NetCashflow), OutputMetric::Year1NetCashflow);
        assert_eq!(OutputMetric::from(MetricArg::Irr), OutputMetric::Irr);
    }
}
