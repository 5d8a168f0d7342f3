//! Market data observations: ticks and bars.
//!
//! Timestamps are exchange-local wall-clock times (`NaiveDateTime`). Bars are
//! stamped with their start time; the end is implied by the resolution.

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::resolution::DataKind;

/// A single executed trade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tick {
    /// Trade time.
    pub time: NaiveDateTime,
    /// Trade price.
    pub price: Decimal,
    /// Trade size.
    pub quantity: Decimal,
}

impl Tick {
    /// Create a new trade tick.
    #[must_use]
    pub const fn new(time: NaiveDateTime, price: Decimal, quantity: Decimal) -> Self {
        Self {
            time,
            price,
            quantity,
        }
    }
}

/// Price and size at one side of the book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceLevel {
    /// Quoted price.
    pub price: Decimal,
    /// Quoted size.
    pub size: Decimal,
}

/// A top-of-book quote update. A `None` side means no quote on that side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteTick {
    /// Quote time.
    pub time: NaiveDateTime,
    /// Best bid.
    pub bid: Option<PriceLevel>,
    /// Best ask.
    pub ask: Option<PriceLevel>,
}

/// Open/high/low/close prices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bar {
    /// Open price.
    pub open: Decimal,
    /// High price.
    pub high: Decimal,
    /// Low price.
    pub low: Decimal,
    /// Close price.
    pub close: Decimal,
}

impl Bar {
    /// Create a new OHLC bar.
    #[must_use]
    pub const fn new(open: Decimal, high: Decimal, low: Decimal, close: Decimal) -> Self {
        Self {
            open,
            high,
            low,
            close,
        }
    }

    /// A bar opened at `price` with no further updates.
    #[must_use]
    pub const fn flat(price: Decimal) -> Self {
        Self::new(price, price, price, price)
    }

    /// Fold a new price into the bar.
    pub fn update(&mut self, price: Decimal) {
        if price > self.high {
            self.high = price;
        }
        if price < self.low {
            self.low = price;
        }
        self.close = price;
    }
}

/// A trade OHLCV bar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeBar {
    /// Bar start time.
    pub time: NaiveDateTime,
    /// Prices.
    pub bar: Bar,
    /// Traded volume.
    pub volume: Decimal,
}

/// One side of a quote bar: OHLC of the quoted price plus the last size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteSide {
    /// Quoted price OHLC over the interval.
    pub bar: Bar,
    /// Last quoted size.
    pub size: Decimal,
}

/// A bid/ask quote bar. A `None` side had no quotes during the interval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteBar {
    /// Bar start time.
    pub time: NaiveDateTime,
    /// Bid side.
    pub bid: Option<QuoteSide>,
    /// Ask side.
    pub ask: Option<QuoteSide>,
}

impl QuoteBar {
    /// Create a quote bar with both sides present.
    #[must_use]
    pub const fn new(
        time: NaiveDateTime,
        bid: Bar,
        bid_size: Decimal,
        ask: Bar,
        ask_size: Decimal,
    ) -> Self {
        Self {
            time,
            bid: Some(QuoteSide {
                bar: bid,
                size: bid_size,
            }),
            ask: Some(QuoteSide {
                bar: ask,
                size: ask_size,
            }),
        }
    }
}

/// Any storable observation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Observation {
    /// Trade tick.
    Tick(Tick),
    /// Quote tick.
    QuoteTick(QuoteTick),
    /// Trade bar.
    TradeBar(TradeBar),
    /// Quote bar.
    QuoteBar(QuoteBar),
}

impl Observation {
    /// Sample time (bar start for bars).
    #[must_use]
    pub const fn time(&self) -> NaiveDateTime {
        match self {
            Self::Tick(t) => t.time,
            Self::QuoteTick(q) => q.time,
            Self::TradeBar(b) => b.time,
            Self::QuoteBar(b) => b.time,
        }
    }

    /// Calendar date of the sample, used for daily partitioning.
    #[must_use]
    pub fn date(&self) -> NaiveDate {
        self.time().date()
    }

    /// Trade or quote shape.
    #[must_use]
    pub const fn kind(&self) -> DataKind {
        match self {
            Self::Tick(_) | Self::TradeBar(_) => DataKind::Trade,
            Self::QuoteTick(_) | Self::QuoteBar(_) => DataKind::Quote,
        }
    }

    /// True for point samples.
    #[must_use]
    pub const fn is_tick(&self) -> bool {
        matches!(self, Self::Tick(_) | Self::QuoteTick(_))
    }

    /// Short name used in error messages.
    #[must_use]
    pub const fn shape_name(&self) -> &'static str {
        match self {
            Self::Tick(_) => "trade tick",
            Self::QuoteTick(_) => "quote tick",
            Self::TradeBar(_) => "trade bar",
            Self::QuoteBar(_) => "quote bar",
        }
    }
}

impl From<Tick> for Observation {
    fn from(value: Tick) -> Self {
        Self::Tick(value)
    }
}

impl From<QuoteTick> for Observation {
    fn from(value: QuoteTick) -> Self {
        Self::QuoteTick(value)
    }
}

impl From<TradeBar> for Observation {
    fn from(value: TradeBar) -> Self {
        Self::TradeBar(value)
    }
}

impl From<QuoteBar> for Observation {
    fn from(value: QuoteBar) -> Self {
        Self::QuoteBar(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn noon() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2017, 3, 16)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_bar_update_tracks_extremes() {
        let mut bar = Bar::flat(dec!(10));
        bar.update(dec!(12));
        bar.update(dec!(9));
        bar.update(dec!(11));
        assert_eq!(bar, Bar::new(dec!(10), dec!(12), dec!(9), dec!(11)));
    }

    #[test]
    fn test_observation_shape() {
        let tick: Observation = Tick::new(noon(), dec!(1), dec!(2)).into();
        assert!(tick.is_tick());
        assert_eq!(tick.kind(), DataKind::Trade);

        let bar: Observation = QuoteBar::new(
            noon(),
            Bar::flat(dec!(1)),
            dec!(1),
            Bar::flat(dec!(2)),
            dec!(2),
        )
        .into();
        assert!(!bar.is_tick());
        assert_eq!(bar.kind(), DataKind::Quote);
        assert_eq!(bar.date(), noon().date());
    }
}
