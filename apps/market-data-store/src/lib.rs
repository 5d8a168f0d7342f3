// Allow unwrap/expect in tests - tests should panic on unexpected errors
#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::items_after_statements,
        clippy::significant_drop_tightening
    )
)]

//! Market Data Store
//!
//! Partitioned, compressed on-disk storage for ticks and bars.
//!
//! # Layout
//!
//! - **domain**: instruments, resolutions, data kinds and observations
//! - **storage**: path resolution, line codec, zip containers and the
//!   `DataWriter` facade
//!   - `paths`: deterministic container path and entry key per
//!     instrument/date/resolution/kind
//!   - `codec`: comma-delimited line format with fixed decimal text
//!   - `archive`: multi-entry zip containers written via temp file + rename
//!   - `locks`: in-process per-container write serialization
//! - **consolidator**: tick-to-bar aggregation with callback and broadcast
//!   subscriptions
//! - **config**, **telemetry**, **observability**: YAML config, tracing
//!   setup and `metrics` counters
//!
//! # Example
//!
//! ```rust,ignore
//! use market_data_store::{DataKind, DataWriter, Instrument, Resolution};
//!
//! let eurusd = Instrument::forex("EURUSD", "fxcm")?;
//! let writer = DataWriter::new("./data", eurusd, Resolution::Second, DataKind::Quote);
//! let containers = writer.write(&quote_bars)?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod consolidator;
pub mod domain;
pub mod error;
pub mod observability;
pub mod storage;
pub mod telemetry;

// =============================================================================
// Re-exports
// =============================================================================

pub use consolidator::{ConsolidatedBar, Consolidator, QuoteBarConsolidator, TradeBarConsolidator};
pub use domain::{
    Bar, ContractTerms, DataKind, Instrument, Observation, OptionRight, OptionStyle, OptionTerms,
    PriceLevel, QuoteBar, QuoteSide, QuoteTick, Resolution, SecurityType, Tick, TradeBar,
};
pub use error::{ErrorCode, StoreError};
pub use storage::{Archive, Compression, DataWriter, LineCodec, ResolvedPath, read_all, resolve};
