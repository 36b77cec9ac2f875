//! Market Store
//!
//! Sole owner of the ticker -> record map. One coarse `RwLock` guards the
//! whole map: every mutation replaces or edits a record under the write
//! lock, so a reader always sees a record either fully before or fully
//! after an update. Callers only ever get clones back.

use indexmap::IndexMap;
use parking_lot::RwLock;
use rand::Rng;
use thv_core::{
    normalize_ticker, FuturesQuote, InstrumentRecord, InstrumentUpdate, OptionQuote,
    OptionsChain, ThvResult,
};
use tracing::{debug, info};

/// Expiry label given to seeded futures contracts
const SAMPLE_EXPIRY: &str = "28NOV25";

/// Insertion-ordered store of instrument records
#[derive(Debug, Default)]
pub struct MarketStore {
    records: RwLock<IndexMap<String, InstrumentRecord>>,
}

impl MarketStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the record for `ticker`, if known
    pub fn get(&self, ticker: &str) -> Option<InstrumentRecord> {
        let ticker = normalize_ticker(ticker).ok()?;
        self.records.read().get(&ticker).cloned()
    }

    pub fn contains(&self, ticker: &str) -> bool {
        normalize_ticker(ticker)
            .map(|t| self.records.read().contains_key(&t))
            .unwrap_or(false)
    }

    /// Merge `update` into the record for `ticker`, creating a default
    /// record first if the ticker is new. Returns the stored result.
    ///
    /// Groups (`futures`, `options`, `dividends`, `exchanges`) are replaced
    /// wholesale, never merged field by field.
    pub fn upsert(&self, ticker: &str, update: InstrumentUpdate) -> ThvResult<InstrumentRecord> {
        let ticker = normalize_ticker(ticker)?;
        let mut records = self.records.write();

        let record = records.entry(ticker.clone()).or_insert_with(|| {
            debug!("Creating instrument record for {}", ticker);
            InstrumentRecord::new(ticker.clone())
        });
        record.apply(update);

        Ok(record.clone())
    }

    /// Edit an existing record in place; invariants are re-applied after
    /// `edit` runs. Returns `None` for an unknown ticker.
    pub fn update_with<F>(&self, ticker: &str, edit: F) -> Option<InstrumentRecord>
    where
        F: FnOnce(&mut InstrumentRecord),
    {
        let ticker = normalize_ticker(ticker).ok()?;
        let mut records = self.records.write();
        let record = records.get_mut(&ticker)?;

        edit(record);
        record.ticker = ticker;
        record.enforce_invariants();

        Some(record.clone())
    }

    /// Visit every record in insertion order under the read lock
    ///
    /// The visitor must not block or do I/O.
    pub fn for_each<F>(&self, mut visit: F)
    where
        F: FnMut(&InstrumentRecord),
    {
        for record in self.records.read().values() {
            visit(record);
        }
    }

    /// Copy of the current key set, in insertion order
    pub fn list_tickers(&self) -> Vec<String> {
        self.records.read().keys().cloned().collect()
    }

    /// Copy of every record, in insertion order
    pub fn records(&self) -> Vec<InstrumentRecord> {
        let mut out = Vec::with_capacity(self.len());
        self.for_each(|r| out.push(r.clone()));
        out
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Insert randomised sample records for tickers not already present
    pub fn seed_samples(&self, tickers: &[String]) -> ThvResult<usize> {
        let mut rng = rand::rng();
        let mut seeded = 0;

        for raw in tickers {
            let ticker = normalize_ticker(raw)?;
            let mut records = self.records.write();
            if records.contains_key(&ticker) {
                continue;
            }
            records.insert(ticker.clone(), sample_record(&ticker, &mut rng));
            seeded += 1;
        }

        info!("Seeded {} sample instruments", seeded);
        Ok(seeded)
    }
}

fn sample_option<R: Rng>(rng: &mut R) -> OptionQuote {
    OptionQuote {
        bid: rng.random_range(20.0..40.0),
        ask: rng.random_range(20.0..40.0),
        ltp: rng.random_range(20.0..40.0),
        volume: rng.random_range(1_000..10_000),
        open_interest: rng.random_range(10_000..50_000),
    }
}

fn sample_record<R: Rng>(ticker: &str, rng: &mut R) -> InstrumentRecord {
    let mut record = InstrumentRecord::new(ticker);
    record.spot = rng.random_range(400.0..500.0);
    record.volume = rng.random_range(10_000..100_000);
    record.exchanges = ["NSE", "BSE"].into_iter().map(String::from).collect();
    record.futures = FuturesQuote {
        volume: rng.random_range(10_000..50_000),
        open_interest: rng.random_range(50_000..200_000),
        expiry: SAMPLE_EXPIRY.to_string(),
        ..FuturesQuote::default()
    };
    record.options = OptionsChain {
        calls: sample_option(rng),
        puts: sample_option(rng),
    };
    record.enforce_invariants();
    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use thv_core::{Dividends, SPOT_FLOOR};

    #[test]
    fn test_upsert_creates_default_record() {
        let store = MarketStore::new();
        let rec = store.upsert("BBB", InstrumentUpdate::spot(50.0)).unwrap();
        assert_eq!(rec.volume, 0);
        assert_eq!(rec.dividends.amount, 0.0);
        assert_eq!(store.get("BBB").unwrap().spot, 50.0);
    }

    #[test]
    fn test_ticker_case_normalized() {
        let store = MarketStore::new();
        store.upsert("infy", InstrumentUpdate::spot(1500.0)).unwrap();
        assert_eq!(store.list_tickers(), vec!["INFY"]);
        assert_eq!(store.get("Infy").unwrap().ticker, "INFY");
        assert!(store.contains("INFY"));
        assert!(store.get("TCS").is_none());
    }

    #[test]
    fn test_invalid_ticker_rejected() {
        let store = MarketStore::new();
        assert!(store.upsert("", InstrumentUpdate::default()).is_err());
        assert!(store.is_empty());
    }

    #[test]
    fn test_upsert_replaces_groups() {
        let store = MarketStore::new();
        store
            .upsert(
                "AAA",
                InstrumentUpdate {
                    dividends: Some(Dividends {
                        announced: true,
                        ex_date: None,
                        amount: 4.0,
                    }),
                    ..InstrumentUpdate::default()
                },
            )
            .unwrap();
        let rec = store
            .upsert(
                "AAA",
                InstrumentUpdate {
                    dividends: Some(Dividends {
                        announced: false,
                        ..Dividends::default()
                    }),
                    ..InstrumentUpdate::default()
                },
            )
            .unwrap();
        assert_eq!(rec.dividends.amount, 0.0);
    }

    #[test]
    fn test_update_with_clamps_spot() {
        let store = MarketStore::new();
        store.upsert("AAA", InstrumentUpdate::spot(1.0)).unwrap();
        let rec = store.update_with("AAA", |r| r.spot -= 10.0).unwrap();
        assert_eq!(rec.spot, SPOT_FLOOR);
        assert!(store.update_with("ZZZ", |r| r.spot = 1.0).is_none());
    }

    #[test]
    fn test_insertion_order_stable() {
        let store = MarketStore::new();
        for t in ["CCC", "AAA", "BBB"] {
            store.upsert(t, InstrumentUpdate::spot(10.0)).unwrap();
        }
        store.upsert("AAA", InstrumentUpdate::spot(11.0)).unwrap();
        assert_eq!(store.list_tickers(), vec!["CCC", "AAA", "BBB"]);

        let mut seen = Vec::new();
        store.for_each(|r| seen.push(r.ticker.clone()));
        assert_eq!(seen, store.list_tickers());
    }

    #[test]
    fn test_seed_samples() {
        let store = MarketStore::new();
        store.upsert("TCS", InstrumentUpdate::spot(3900.0)).unwrap();
        let tickers = vec!["TCS".to_string(), "infy".to_string()];
        assert_eq!(store.seed_samples(&tickers).unwrap(), 1);

        // existing record is left alone
        assert_eq!(store.get("TCS").unwrap().spot, 3900.0);

        let infy = store.get("INFY").unwrap();
        assert!((400.0..500.0).contains(&infy.spot));
        assert_eq!(infy.futures.expiry, SAMPLE_EXPIRY);
        assert_eq!(infy.exchanges.len(), 2);
    }

    #[test]
    fn test_concurrent_upserts_are_atomic_per_record() {
        let store = Arc::new(MarketStore::new());
        store.upsert("AAA", InstrumentUpdate::spot(1.0)).unwrap();

        // writers keep spot and volume in lock-step; readers must never see them diverge
        let writers: Vec<_> = (0..4)
            .map(|w| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for i in 1..500u64 {
                        let v = w * 1_000 + i;
                        store
                            .upsert(
                                "AAA",
                                InstrumentUpdate {
                                    spot: Some(v as f64),
                                    volume: Some(v),
                                    ..InstrumentUpdate::default()
                                },
                            )
                            .unwrap();
                    }
                })
            })
            .collect();

        let reader = {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                for _ in 0..2_000 {
                    let rec = store.get("AAA").unwrap();
                    assert_eq!(rec.spot, rec.volume.max(1) as f64);
                }
            })
        };

        for w in writers {
            w.join().unwrap();
        }
        reader.join().unwrap();
    }
}
