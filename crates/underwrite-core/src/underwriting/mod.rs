pub mod engine;
pub mod inputs;
pub mod metrics;
pub mod mortgage;
pub mod projection;

pub use engine::{
    analyze_deal, underwrite, underwrite_with_options, DatedSchedule, DealSummary, MortgageModel,
    UnderwriteResult,
};
pub use inputs::{FinanceType, IrrPolicy, UnderwriteInputs, UnderwriteOptions, UnderwriteRequest};
pub use metrics::RatioMetric;
pub use mortgage::{calculate_mortgage, AmortizationYear, MortgageOutput, MortgageRequest};
pub use projection::CashflowRow;
