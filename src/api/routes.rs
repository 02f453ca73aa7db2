//! HTTP control surface: parameter updates, result/performance reads, and a
//! health check. Handler shape grounded on `api/routes.rs`'s
//! `AxumState`/`Query`/`Json` idiom.

use axum::extract::State as AxumState;
use axum::http::StatusCode;
use axum::response::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::parameter::Parameters;
use crate::simulator::{PerformanceReport, Simulator};
use crate::wire::SimResult;

#[derive(Debug, Deserialize)]
pub struct SetParameterRequest {
    pub name: String,
    pub value: Value,
}

#[derive(Debug, Serialize)]
pub struct SetParameterResponse {
    pub name: String,
    pub value: Value,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub running: bool,
}

pub async fn get_parameters(AxumState(simulator): AxumState<Simulator>) -> Json<Parameters> {
    Json(simulator.parameters())
}

pub async fn set_parameter(
    AxumState(simulator): AxumState<Simulator>,
    Json(request): Json<SetParameterRequest>,
) -> Result<Json<SetParameterResponse>, (StatusCode, Json<ErrorResponse>)> {
    simulator
        .set_parameter(&request.name, &request.value)
        .map_err(|err| {
            (StatusCode::BAD_REQUEST, Json(ErrorResponse { error: err.to_string() }))
        })?;

    Ok(Json(SetParameterResponse { name: request.name, value: request.value }))
}

pub async fn get_results(AxumState(simulator): AxumState<Simulator>) -> Json<SimResult> {
    Json(simulator.results())
}

pub async fn get_performance(AxumState(simulator): AxumState<Simulator>) -> Json<PerformanceReport> {
    Json(simulator.performance())
}

pub async fn health(AxumState(simulator): AxumState<Simulator>) -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok", running: simulator.is_running() })
}
