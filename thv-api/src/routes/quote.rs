//! Raw quote passthrough

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use thv_core::Quote;

use super::ApiResult;
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/quote/{ticker}", get(get_quote))
}

/// Latest quote straight from the quote source; the store is not touched
async fn get_quote(
    State(state): State<AppState>,
    Path(ticker): Path<String>,
) -> ApiResult<Json<Quote>> {
    Ok(Json(state.service.fetch_quote(&ticker).await?))
}
