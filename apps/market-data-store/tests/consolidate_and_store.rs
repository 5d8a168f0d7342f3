//! Ticks consolidated into minute bars and persisted through a subscription.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::{Arc, Mutex};

use chrono::{NaiveDate, NaiveDateTime};
use market_data_store::config::load_config_from_string;
use market_data_store::{
    DataKind, DataWriter, Instrument, Observation, Resolution, Tick, TradeBar,
    TradeBarConsolidator,
};
use rust_decimal_macros::dec;
use tempfile::tempdir;

fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2017, 3, 16)
        .unwrap()
        .and_hms_opt(h, m, s)
        .unwrap()
}

#[test]
fn test_consolidated_bars_round_trip_through_storage() {
    let dir = tempdir().unwrap();
    let yaml = format!(
        "storage:\n  data_directory: {}\n  price_decimals: 4\n",
        dir.path().display()
    );
    let config = load_config_from_string(&yaml).unwrap();

    let mut consolidator = TradeBarConsolidator::for_resolution(Resolution::Minute).unwrap();
    let completed: Arc<Mutex<Vec<TradeBar>>> = Arc::default();
    let sink = Arc::clone(&completed);
    consolidator.on_bar(move |bar| sink.lock().unwrap().push(bar.clone()));
    let mut rx = consolidator.subscribe();

    let ticks = [
        (at(9, 30, 1), dec!(100.12345), dec!(10)),
        (at(9, 30, 40), dec!(101), dec!(5)),
        (at(9, 31, 2), dec!(99.5), dec!(1)),
        (at(9, 33, 0), dec!(100), dec!(2)),
    ];
    for (time, price, quantity) in ticks {
        consolidator.update(&Tick::new(time, price, quantity));
    }
    consolidator.scan(at(9, 34, 0));

    let bars: Vec<Observation> = completed
        .lock()
        .unwrap()
        .iter()
        .cloned()
        .map(Observation::from)
        .collect();
    assert_eq!(bars.len(), 3);
    assert_eq!(rx.try_recv().unwrap().time, at(9, 30, 0));

    let spy = Instrument::equity("SPY", "usa").unwrap();
    let writer = DataWriter::from_config(&config.storage, spy, Resolution::Minute, DataKind::Trade);
    writer.write(&bars).unwrap();

    let stored = writer.read(at(9, 30, 0).date()).unwrap();
    assert_eq!(stored.len(), 3);
    let Observation::TradeBar(first) = &stored[0] else {
        panic!("expected a trade bar");
    };
    // Four decimal places, half-even.
    assert_eq!(first.bar.open, dec!(100.1234));
    assert_eq!(first.bar.high, dec!(101));
    assert_eq!(first.volume, dec!(15));
    assert_eq!(stored[2].time(), at(9, 33, 0));
}
