//! Exchange-rate handler (read-only)

use crate::api::ApiState;
use crate::error::AppError;
use crate::services::exchange_rate::UsdtRates;
use axum::extract::State;
use axum::Json;

pub async fn get_rates(State(state): State<ApiState>) -> Result<Json<UsdtRates>, AppError> {
    Ok(Json(state.rates.current_rates().await))
}
