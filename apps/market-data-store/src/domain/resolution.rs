//! Sampling resolution and data kind.

use std::fmt;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Sampling resolution of stored data.
///
/// Sub-daily resolutions partition containers per calendar day; `Daily`
/// keeps an instrument's whole history in one container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resolution {
    /// Individual ticks.
    Tick,
    /// One-second bars.
    Second,
    /// One-minute bars.
    Minute,
    /// One-hour bars.
    Hour,
    /// One bar per day.
    Daily,
}

impl Resolution {
    /// Lowercase name used in paths and entry keys.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Tick => "tick",
            Self::Second => "second",
            Self::Minute => "minute",
            Self::Hour => "hour",
            Self::Daily => "daily",
        }
    }

    /// True when containers are split per calendar day.
    #[must_use]
    pub const fn is_sub_daily(&self) -> bool {
        !matches!(self, Self::Daily)
    }

    /// Bar length, `None` for ticks.
    #[must_use]
    pub fn period(&self) -> Option<Duration> {
        match self {
            Self::Tick => None,
            Self::Second => Some(Duration::seconds(1)),
            Self::Minute => Some(Duration::minutes(1)),
            Self::Hour => Some(Duration::hours(1)),
            Self::Daily => Some(Duration::days(1)),
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Resolution {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tick" => Ok(Self::Tick),
            "second" => Ok(Self::Second),
            "minute" => Ok(Self::Minute),
            "hour" => Ok(Self::Hour),
            "daily" => Ok(Self::Daily),
            other => Err(StoreError::invalid(
                "resolution",
                format!("unknown resolution '{other}'"),
            )),
        }
    }
}

/// Shape of the stored observations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataKind {
    /// Trades: price/quantity ticks or OHLCV bars.
    Trade,
    /// Quotes: bid/ask ticks or bid/ask OHLC bars with sizes.
    Quote,
}

impl DataKind {
    /// Lowercase name used in paths and entry keys.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Trade => "trade",
            Self::Quote => "quote",
        }
    }
}

impl fmt::Display for DataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DataKind {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "trade" => Ok(Self::Trade),
            "quote" => Ok(Self::Quote),
            other => Err(StoreError::invalid(
                "kind",
                format!("unknown data kind '{other}'"),
            )),
        }
    }
}
