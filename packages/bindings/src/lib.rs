use napi::Result as NapiResult;
use napi_derive::napi;
use rust_decimal::Decimal;
use serde::Deserialize;

use underwrite_core::scenarios::scenario::{compare_scenarios as run_comparison, ScenarioComparisonInput};
use underwrite_core::scenarios::sensitivity::{run_deal_sensitivity, DealSensitivityInput};
use underwrite_core::underwriting::{
    analyze_deal, calculate_mortgage, underwrite_with_options, MortgageRequest, UnderwriteInputs,
    UnderwriteOptions, UnderwriteRequest,
};

/// Convert any Display error into a napi::Error.
fn to_napi_error(e: impl std::fmt::Display) -> napi::Error {
    napi::Error::from_reason(e.to_string())
}

// ---------------------------------------------------------------------------
// Underwriting
// ---------------------------------------------------------------------------

/// Full request document (`UnderwriteRequest`) in, envelope with warnings out.
#[napi]
pub fn underwrite_deal(input_json: String) -> NapiResult<String> {
    let request: UnderwriteRequest = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = analyze_deal(&request).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[derive(Deserialize)]
struct PriceAndInputs {
    price: Decimal,
    inputs: UnderwriteInputs,
    #[serde(default)]
    options: UnderwriteOptions,
}

/// The bare `(price, inputs) -> result` contract the web forms call on every
/// keystroke; no envelope.
#[napi]
pub fn underwrite_result(input_json: String) -> NapiResult<String> {
    let input: PriceAndInputs = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let result =
        underwrite_with_options(input.price, &input.inputs, &input.options).map_err(to_napi_error)?;
    serde_json::to_string(&result).map_err(to_napi_error)
}

#[napi]
pub fn mortgage_payment(input_json: String) -> NapiResult<String> {
    let request: MortgageRequest = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = calculate_mortgage(&request).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[napi]
pub fn deal_sensitivity(input_json: String) -> NapiResult<String> {
    let input: DealSensitivityInput = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = run_deal_sensitivity(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn compare_scenarios(input_json: String) -> NapiResult<String> {
    let input: ScenarioComparisonInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = run_comparison(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}
