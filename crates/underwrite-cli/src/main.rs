mod commands;
mod input;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;

use commands::scenarios::{ScenariosArgs, SensitivityArgs};
use commands::underwrite::{MortgageArgs, UnderwriteArgs};

/// Property underwriting from the command line
#[derive(Parser)]
#[command(
    name = "uw",
    version,
    about = "Property underwriting: cash flows, DSCR, breakeven, IRR",
    long_about = "A CLI for underwriting buy-to-let and small commercial property deals \
                  with decimal precision. Projects yearly cash flows and computes DSCR, \
                  breakeven occupancy, IRR and equity multiple, plus mortgage payments, \
                  two-way sensitivity grids and scenario comparison."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,

    /// Log engine diagnostics to stderr
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Underwrite a deal (cash-flow projection, DSCR, breakeven, IRR, equity multiple)
    Underwrite(UnderwriteArgs),
    /// Monthly and annual mortgage payment, optionally with the amortisation table
    Mortgage(MortgageArgs),
    /// Two-way sensitivity grid over deal assumptions
    Sensitivity(SensitivityArgs),
    /// Compare named scenarios against a base deal
    Scenarios(ScenariosArgs),
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp(None)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Underwrite(args) => commands::underwrite::run_underwrite(args),
        Commands::Mortgage(args) => commands::underwrite::run_mortgage(args),
        Commands::Sensitivity(args) => commands::scenarios::run_sensitivity(args),
        Commands::Scenarios(args) => commands::scenarios::run_scenarios(args),
        Commands::Version => {
            println!("uw {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
