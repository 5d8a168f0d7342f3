//! Line codec for container entries.
//!
//! Each observation becomes one comma-delimited line:
//!
//! | Shape | Line |
//! |-------|------|
//! | trade tick | `time,price,quantity` |
//! | quote tick | `time,bid_price,bid_size,ask_price,ask_size` |
//! | trade bar  | `time,open,high,low,close,volume` |
//! | quote bar  | `time,bid_o,bid_h,bid_l,bid_c,bid_size,ask_o,ask_h,ask_l,ask_c,ask_size` |
//!
//! `time` is milliseconds since midnight of the observation's date for
//! sub-daily resolutions and `YYYYMMDD HH:MM` for daily. A missing quote side
//! is written as zeros and read back as missing.

use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Timelike};
use rust_decimal::{Decimal, RoundingStrategy};
use thiserror::Error;

use crate::domain::{
    Bar, DataKind, Observation, PriceLevel, QuoteBar, QuoteSide, QuoteTick, Resolution, Tick,
    TradeBar,
};
use crate::error::StoreError;

/// Default number of decimal places kept for prices and sizes.
pub const DEFAULT_PRICE_DECIMALS: u32 = 10;

const DAILY_TIME_FORMAT: &str = "%Y%m%d %H:%M";
const MILLIS_PER_DAY: i64 = 86_400_000;
const NANOS_PER_MILLI: u32 = 1_000_000;

/// A line that could not be decoded.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("line {line}: {message}")]
pub struct DecodeError {
    /// 1-based line number.
    pub line: usize,
    /// What was wrong.
    pub message: String,
}

/// Encoder/decoder for one precision setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineCodec {
    price_decimals: u32,
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::new(DEFAULT_PRICE_DECIMALS)
    }
}

impl LineCodec {
    /// Create a codec keeping `price_decimals` decimal places.
    #[must_use]
    pub const fn new(price_decimals: u32) -> Self {
        Self { price_decimals }
    }

    /// Configured precision.
    #[must_use]
    pub const fn price_decimals(&self) -> u32 {
        self.price_decimals
    }

    /// Encode observations into lines.
    ///
    /// Observations are written in the order given. An empty slice yields an
    /// empty vector.
    ///
    /// # Errors
    ///
    /// Returns `InvalidDescriptor` when an observation's shape does not match
    /// `resolution` and `kind`, or when its timestamp is finer than the line
    /// format keeps (sub-millisecond for sub-daily data, seconds for daily).
    pub fn encode(
        &self,
        observations: &[Observation],
        resolution: Resolution,
        kind: DataKind,
    ) -> Result<Vec<String>, StoreError> {
        observations
            .iter()
            .map(|obs| self.encode_one(obs, resolution, kind))
            .collect()
    }

    fn encode_one(
        &self,
        obs: &Observation,
        resolution: Resolution,
        kind: DataKind,
    ) -> Result<String, StoreError> {
        let expected_tick = resolution == Resolution::Tick;
        if obs.is_tick() != expected_tick || obs.kind() != kind {
            return Err(StoreError::invalid(
                "observation",
                format!(
                    "{} cannot be stored as {resolution} {kind} data",
                    obs.shape_name()
                ),
            ));
        }

        let time = format_time(obs.time(), resolution)
            .map_err(|message| StoreError::invalid("time", message))?;
        let line = match obs {
            Observation::Tick(t) => {
                format!("{time},{},{}", self.num(t.price), self.num(t.quantity))
            }
            Observation::QuoteTick(q) => {
                format!("{time},{},{}", self.level(q.bid), self.level(q.ask))
            }
            Observation::TradeBar(b) => {
                format!("{time},{},{}", self.bar(&b.bar), self.num(b.volume))
            }
            Observation::QuoteBar(b) => {
                format!("{time},{},{}", self.side(b.bid), self.side(b.ask))
            }
        };
        Ok(line)
    }

    /// Decode lines written for `date`, `resolution` and `kind`.
    ///
    /// Blank lines are skipped.
    ///
    /// # Errors
    ///
    /// Returns a [`DecodeError`] for the first malformed line.
    pub fn decode<S: AsRef<str>>(
        &self,
        lines: &[S],
        date: NaiveDate,
        resolution: Resolution,
        kind: DataKind,
    ) -> Result<Vec<Observation>, DecodeError> {
        let mut out = Vec::with_capacity(lines.len());
        for (idx, raw) in lines.iter().enumerate() {
            let raw = raw.as_ref().trim_end_matches('\r');
            if raw.trim().is_empty() {
                continue;
            }
            let fail = |message: String| DecodeError {
                line: idx + 1,
                message,
            };
            out.push(decode_line(raw, date, resolution, kind).map_err(fail)?);
        }
        Ok(out)
    }

    fn num(&self, value: Decimal) -> String {
        format_decimal(value, self.price_decimals)
    }

    fn bar(&self, bar: &Bar) -> String {
        format!(
            "{},{},{},{}",
            self.num(bar.open),
            self.num(bar.high),
            self.num(bar.low),
            self.num(bar.close)
        )
    }

    fn side(&self, side: Option<QuoteSide>) -> String {
        match side {
            Some(s) => format!("{},{}", self.bar(&s.bar), self.num(s.size)),
            None => "0,0,0,0,0".to_string(),
        }
    }

    fn level(&self, level: Option<PriceLevel>) -> String {
        match level {
            Some(l) => format!("{},{}", self.num(l.price), self.num(l.size)),
            None => "0,0".to_string(),
        }
    }
}

/// Encode with the default precision.
pub fn encode(
    observations: &[Observation],
    resolution: Resolution,
    kind: DataKind,
) -> Result<Vec<String>, StoreError> {
    LineCodec::default().encode(observations, resolution, kind)
}

/// Decode with the default precision.
pub fn decode<S: AsRef<str>>(
    lines: &[S],
    date: NaiveDate,
    resolution: Resolution,
    kind: DataKind,
) -> Result<Vec<Observation>, DecodeError> {
    LineCodec::default().decode(lines, date, resolution, kind)
}

/// Deterministic decimal text: rounded half-even, trailing zeros stripped,
/// never scientific notation.
#[must_use]
pub fn format_decimal(value: Decimal, decimals: u32) -> String {
    value
        .round_dp_with_strategy(decimals, RoundingStrategy::MidpointNearestEven)
        .normalize()
        .to_string()
}

fn format_time(time: NaiveDateTime, resolution: Resolution) -> Result<String, String> {
    if resolution.is_sub_daily() {
        if time.nanosecond() % NANOS_PER_MILLI != 0 {
            return Err(format!("{time} has sub-millisecond precision"));
        }
        let midnight = time.date().and_time(NaiveTime::MIN);
        Ok((time - midnight).num_milliseconds().to_string())
    } else {
        if time.second() != 0 || time.nanosecond() != 0 {
            return Err(format!("{time} has seconds, daily lines keep minutes"));
        }
        Ok(time.format(DAILY_TIME_FORMAT).to_string())
    }
}

fn parse_time(field: &str, date: NaiveDate, resolution: Resolution) -> Result<NaiveDateTime, String> {
    if resolution.is_sub_daily() {
        let millis: i64 = field
            .parse()
            .map_err(|_| format!("invalid millisecond offset '{field}'"))?;
        if !(0..MILLIS_PER_DAY).contains(&millis) {
            return Err(format!("millisecond offset {millis} outside the day"));
        }
        Ok(date.and_time(NaiveTime::MIN) + TimeDelta::milliseconds(millis))
    } else {
        NaiveDateTime::parse_from_str(field, DAILY_TIME_FORMAT)
            .map_err(|e| format!("invalid daily timestamp '{field}': {e}"))
    }
}

fn decode_line(
    raw: &str,
    date: NaiveDate,
    resolution: Resolution,
    kind: DataKind,
) -> Result<Observation, String> {
    let fields: Vec<&str> = raw.split(',').collect();
    let expected = match (resolution == Resolution::Tick, kind) {
        (true, DataKind::Trade) => 3,
        (true, DataKind::Quote) => 5,
        (false, DataKind::Trade) => 6,
        (false, DataKind::Quote) => 11,
    };
    if fields.len() != expected {
        return Err(format!(
            "expected {expected} fields for {resolution} {kind}, found {}",
            fields.len()
        ));
    }

    let time = parse_time(fields[0], date, resolution)?;
    let nums = fields[1..]
        .iter()
        .map(|f| Decimal::from_str(f).map_err(|e| format!("invalid number '{f}': {e}")))
        .collect::<Result<Vec<_>, _>>()?;

    let obs = match (resolution == Resolution::Tick, kind) {
        (true, DataKind::Trade) => Tick::new(time, nums[0], nums[1]).into(),
        (true, DataKind::Quote) => QuoteTick {
            time,
            bid: level_from(nums[0], nums[1]),
            ask: level_from(nums[2], nums[3]),
        }
        .into(),
        (false, DataKind::Trade) => TradeBar {
            time,
            bar: Bar::new(nums[0], nums[1], nums[2], nums[3]),
            volume: nums[4],
        }
        .into(),
        (false, DataKind::Quote) => QuoteBar {
            time,
            bid: side_from(&nums[0..5]),
            ask: side_from(&nums[5..10]),
        }
        .into(),
    };
    Ok(obs)
}

fn level_from(price: Decimal, size: Decimal) -> Option<PriceLevel> {
    if price.is_zero() && size.is_zero() {
        None
    } else {
        Some(PriceLevel { price, size })
    }
}

fn side_from(values: &[Decimal]) -> Option<QuoteSide> {
    if values.iter().all(Decimal::is_zero) {
        return None;
    }
    Some(QuoteSide {
        bar: Bar::new(values[0], values[1], values[2], values[3]),
        size: values[4],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2017, 3, 16).unwrap()
    }

    fn at(h: u32, m: u32, s: u32, ms: u32) -> NaiveDateTime {
        day().and_hms_milli_opt(h, m, s, ms).unwrap()
    }

    #[test]
    fn test_trade_tick_line() {
        let ticks: Vec<Observation> = vec![
            Tick::new(at(12, 0, 0, 0), dec!(1.0), dec!(2.0)).into(),
            Tick::new(at(12, 0, 1, 250), dec!(3.50), dec!(4)).into(),
        ];
        let lines = encode(&ticks, Resolution::Tick, DataKind::Trade).unwrap();
        assert_eq!(lines, vec!["43200000,1,2", "43201250,3.5,4"]);
    }

    #[test]
    fn test_trade_bar_line() {
        let bars: Vec<Observation> = vec![
            TradeBar {
                time: at(9, 31, 0, 0),
                bar: Bar::new(dec!(100.25), dec!(101), dec!(99.5), dec!(100.75)),
                volume: dec!(1500),
            }
            .into(),
        ];
        let lines = encode(&bars, Resolution::Minute, DataKind::Trade).unwrap();
        assert_eq!(lines, vec!["34260000,100.25,101,99.5,100.75,1500"]);
    }

    #[test]
    fn test_quote_bar_missing_side_is_zeroed() {
        let bar: Observation = QuoteBar {
            time: at(0, 0, 1, 0),
            bid: None,
            ask: Some(QuoteSide {
                bar: Bar::new(dec!(5), dec!(6), dec!(7), dec!(8)),
                size: dec!(2),
            }),
        }
        .into();
        let lines = encode(&[bar.clone()], Resolution::Second, DataKind::Quote).unwrap();
        assert_eq!(lines, vec!["1000,0,0,0,0,0,5,6,7,8,2"]);

        let decoded = decode(&lines, day(), Resolution::Second, DataKind::Quote).unwrap();
        assert_eq!(decoded, vec![bar]);
    }

    #[test]
    fn test_quote_tick_round_trip() {
        let quote: Observation = QuoteTick {
            time: at(15, 59, 59, 999),
            bid: Some(PriceLevel {
                price: dec!(1.06125),
                size: dec!(1000000),
            }),
            ask: None,
        }
        .into();
        let lines = encode(&[quote.clone()], Resolution::Tick, DataKind::Quote).unwrap();
        assert_eq!(lines, vec!["57599999,1.06125,1000000,0,0"]);
        let decoded = decode(&lines, day(), Resolution::Tick, DataKind::Quote).unwrap();
        assert_eq!(decoded, vec![quote]);
    }

    #[test]
    fn test_daily_lines_use_absolute_date() {
        let bar: Observation = TradeBar {
            time: day().and_hms_opt(0, 0, 0).unwrap(),
            bar: Bar::flat(dec!(237.03)),
            volume: dec!(1),
        }
        .into();
        let lines = encode(&[bar.clone()], Resolution::Daily, DataKind::Trade).unwrap();
        assert_eq!(lines, vec!["20170316 00:00,237.03,237.03,237.03,237.03,1"]);

        // The date argument is ignored for daily lines.
        let other_day = NaiveDate::from_ymd_opt(2000, 1, 3).unwrap();
        let decoded = decode(&lines, other_day, Resolution::Daily, DataKind::Trade).unwrap();
        assert_eq!(decoded, vec![bar]);
    }

    #[test]
    fn test_time_finer_than_line_format_is_rejected() {
        let sub_milli = day().and_hms_nano_opt(12, 0, 0, 500_000).unwrap();
        let tick: Observation = Tick::new(sub_milli, dec!(1), dec!(1)).into();
        let err = encode(&[tick], Resolution::Tick, DataKind::Trade).unwrap_err();
        assert!(matches!(err, StoreError::InvalidDescriptor { .. }));

        let with_seconds: Observation = TradeBar {
            time: day().and_hms_opt(16, 0, 30).unwrap(),
            bar: Bar::flat(dec!(1)),
            volume: dec!(1),
        }
        .into();
        let err = encode(&[with_seconds], Resolution::Daily, DataKind::Trade).unwrap_err();
        assert!(matches!(err, StoreError::InvalidDescriptor { .. }));

        let millis = day().and_hms_milli_opt(12, 0, 0, 5).unwrap();
        let tick: Observation = Tick::new(millis, dec!(1), dec!(1)).into();
        let lines = encode(&[tick], Resolution::Tick, DataKind::Trade).unwrap();
        assert_eq!(lines, vec!["43200005,1,1"]);
    }

    #[test]
    fn test_empty_input_yields_no_lines() {
        let lines = encode(&[], Resolution::Second, DataKind::Quote).unwrap();
        assert!(lines.is_empty());
    }

    #[test]
    fn test_shape_mismatch_is_invalid_descriptor() {
        let tick: Observation = Tick::new(at(1, 0, 0, 0), dec!(1), dec!(1)).into();
        let err = encode(&[tick.clone()], Resolution::Minute, DataKind::Trade).unwrap_err();
        assert!(matches!(err, StoreError::InvalidDescriptor { .. }));

        let err = encode(&[tick], Resolution::Tick, DataKind::Quote).unwrap_err();
        assert!(matches!(err, StoreError::InvalidDescriptor { .. }));
    }

    #[test]
    fn test_precision_rounds_half_even() {
        let codec = LineCodec::new(2);
        let ticks: Vec<Observation> = vec![
            Tick::new(at(0, 0, 0, 0), dec!(1.005), dec!(1.015)).into(),
        ];
        let lines = codec.encode(&ticks, Resolution::Tick, DataKind::Trade).unwrap();
        assert_eq!(lines, vec!["0,1,1.02"]);
    }

    #[test]
    fn test_decode_rejects_malformed_lines() {
        let err = decode(&["1000,1"], day(), Resolution::Tick, DataKind::Trade).unwrap_err();
        assert_eq!(err.line, 1);

        let err = decode(&["", "abc,1,2"], day(), Resolution::Tick, DataKind::Trade).unwrap_err();
        assert_eq!(err.line, 2);

        let err = decode(&["86400000,1,2"], day(), Resolution::Tick, DataKind::Trade).unwrap_err();
        assert!(err.message.contains("outside the day"));

        let err = decode(&["0,1e5,2"], day(), Resolution::Tick, DataKind::Trade).unwrap_err();
        assert!(err.message.contains("invalid number"));
    }

    #[test]
    fn test_decode_tolerates_crlf() {
        let decoded = decode(&["1000,1.5,2\r"], day(), Resolution::Tick, DataKind::Trade).unwrap();
        assert_eq!(
            decoded,
            vec![Observation::Tick(Tick::new(at(0, 0, 1, 0), dec!(1.5), dec!(2)))]
        );
    }

    proptest! {
        #[test]
        fn prop_decimal_text_round_trips(mantissa in -1_000_000_000_000i64..1_000_000_000_000i64, scale in 0u32..=10) {
            let value = Decimal::new(mantissa, scale);
            let text = format_decimal(value, DEFAULT_PRICE_DECIMALS);
            prop_assert!(!text.contains('e') && !text.contains('E'));
            let parsed = Decimal::from_str(&text).unwrap();
            prop_assert_eq!(parsed, value);
        }
    }
}
