//! Domain value objects: instruments, resolutions and observations.

pub mod instrument;
pub mod observation;
pub mod resolution;

pub use instrument::{
    ContractTerms, Instrument, OptionRight, OptionStyle, OptionTerms, SecurityType,
    max_supported_date, min_supported_date, validate_date,
};
pub use observation::{Bar, Observation, PriceLevel, QuoteBar, QuoteSide, QuoteTick, Tick, TradeBar};
pub use resolution::{DataKind, Resolution};
