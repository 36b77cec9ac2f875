//! Market data endpoints: snapshot pull, single-ticker pull and upsert

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use thv_core::{InstrumentUpdate, InstrumentView};
use tracing::info;

use super::ApiResult;
use crate::AppState;

/// Create market data routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/market-data", get(snapshot))
        .route("/market-data/{ticker}", get(instrument).post(upsert))
}

/// Enriched view of every instrument
async fn snapshot(State(state): State<AppState>) -> ApiResult<Json<Vec<InstrumentView>>> {
    Ok(Json(state.service.snapshot()?))
}

async fn instrument(
    State(state): State<AppState>,
    Path(ticker): Path<String>,
) -> ApiResult<Json<InstrumentView>> {
    Ok(Json(state.service.instrument(&ticker)?))
}

/// Merge a partial record; groups in the body replace the stored ones
async fn upsert(
    State(state): State<AppState>,
    Path(ticker): Path<String>,
    Json(update): Json<InstrumentUpdate>,
) -> ApiResult<Json<InstrumentView>> {
    let view = state.service.upsert(&ticker, update)?;
    info!("Updated market data for {}", view.record.ticker);
    Ok(Json(view))
}

#[cfg(test)]
mod tests {
    use axum::{body::Body, http::Request, http::StatusCode};

    use crate::routes::test_support::{app, get, send};

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_snapshot_in_insertion_order() {
        let (app, _) = app();
        let (status, body) = get(app, "/api/market-data").await;
        assert_eq!(status, StatusCode::OK);
        let tickers: Vec<&str> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v["ticker"].as_str().unwrap())
            .collect();
        assert_eq!(tickers, ["AAA", "BBB"]);
        assert_eq!(body[0]["calculations"]["theoretical_value"], 100.53);
    }

    #[tokio::test]
    async fn test_single_ticker_case_insensitive() {
        let (app, _) = app();
        let (status, body) = get(app, "/api/market-data/aaa").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ticker"], "AAA");
        assert_eq!(body["spot"], 100.0);
    }

    #[tokio::test]
    async fn test_unknown_ticker_is_404() {
        let (app, _) = app();
        let (status, body) = get(app, "/api/market-data/NOPE").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].as_str().unwrap().contains("NOPE"));
    }

    #[tokio::test]
    async fn test_upsert_creates_and_enriches() {
        let (app, service) = app();
        let (status, body) = send(app, post_json("/api/market-data/new", r#"{"spot": 100}"#)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ticker"], "NEW");
        assert_eq!(body["volume"], 0);
        assert_eq!(body["futures"]["bid"], 100.03);
        assert_eq!(service.store().get("NEW").unwrap().spot, 100.0);
    }

    #[tokio::test]
    async fn test_upsert_rejects_bad_ticker() {
        let (app, service) = app();
        let (status, _) = send(app, post_json("/api/market-data/B%21D", r#"{"spot": 1}"#)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(service.store().len(), 2);
    }
}
