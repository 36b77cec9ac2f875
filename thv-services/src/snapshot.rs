//! Snapshot Builder
//!
//! Copies the store, prices the copy with the batch pricing engine and
//! returns enriched views. The REST pull path and the WebSocket push path
//! both go through here, so they always carry identical calculations.

use std::sync::Arc;

use thv_core::view::round_cents;
use thv_core::{
    normalize_ticker, Calculations, InstrumentRecord, InstrumentView, PricingParams, ThvError,
    ThvResult,
};
use thv_pricing::{greeks, price_batch, BatchInputs};

use crate::market_store::MarketStore;

/// Stateless transformer from store contents to enriched views
#[derive(Debug, Clone)]
pub struct SnapshotBuilder {
    store: Arc<MarketStore>,
}

impl SnapshotBuilder {
    pub fn new(store: Arc<MarketStore>) -> Self {
        Self { store }
    }

    /// Enriched view of every instrument, in first-observation order
    pub fn build(&self, params: &PricingParams) -> ThvResult<Vec<InstrumentView>> {
        enrich(self.store.records(), params)
    }

    /// Enriched view of one instrument
    pub fn build_one(&self, ticker: &str, params: &PricingParams) -> ThvResult<InstrumentView> {
        let ticker = normalize_ticker(ticker)?;
        let record = self
            .store
            .get(&ticker)
            .ok_or_else(|| ThvError::not_found(format!("Ticker not found: {}", ticker)))?;

        enrich(vec![record], params)?
            .pop()
            .ok_or_else(|| ThvError::internal("empty enrichment result"))
    }
}

/// Price a batch of records
pub fn enrich(
    records: Vec<InstrumentRecord>,
    params: &PricingParams,
) -> ThvResult<Vec<InstrumentView>> {
    params.validate()?;

    let n = records.len();
    let spots: Vec<f64> = records.iter().map(|r| r.spot).collect();
    let dividends: Vec<f64> = records.iter().map(|r| r.dividends.amount).collect();
    let rates = vec![params.rate; n];
    let times = vec![params.time_to_expiry; n];
    let vols = vec![params.volatility; n];

    let priced = price_batch(&BatchInputs {
        spots: &spots,
        rates: &rates,
        times: &times,
        dividends: &dividends,
        volatilities: &vols,
    })?;

    let views = records
        .into_iter()
        .enumerate()
        .map(|(i, mut record)| {
            let spot = record.spot;
            let theoretical = round_cents(priced.theoretical_values[i]);

            record.futures.price = theoretical;
            record.futures.bid = round_cents(theoretical - params.half_spread);
            record.futures.ask = round_cents(theoretical + params.half_spread);

            let calculations = Calculations {
                theoretical_value: theoretical,
                one_sdv: round_cents(priced.one_sdv[i]),
                two_sdv: round_cents(priced.two_sdv[i]),
                three_sdv: round_cents(priced.three_sdv[i]),
                futures_cash_diff: round_cents(priced.theoretical_values[i] - spot),
                percentage_over_cash: round_cents(
                    (priced.theoretical_values[i] - spot) / spot * 100.0,
                ),
                atm_call: priced.atm_call[i].map(round_cents),
                atm_put: priced.atm_put[i].map(round_cents),
                greeks: greeks(spot, spot, params.rate, params.time_to_expiry, params.volatility)
                    .ok(),
            };

            InstrumentView {
                record,
                calculations,
            }
        })
        .collect();

    Ok(views)
}
