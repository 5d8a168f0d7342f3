//! Instrument descriptor value objects.
//!
//! An [`Instrument`] identifies one tradable entity: symbol text, security
//! type, market and, for derivatives, the contract identity (expiry, and for
//! options the strike, right and style). Instruments are validated on
//! construction and immutable afterwards.

use std::fmt;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Maximum number of strike decimals that survive the x10 000 entry-key scaling.
pub const MAX_STRIKE_DECIMALS: u32 = 4;

const STRIKE_SCALE: Decimal = Decimal::from_parts(10_000, 0, 0, false, 0);

/// Earliest date the store accepts (partition dates and expiries).
#[must_use]
pub fn min_supported_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(1998, 1, 2).unwrap_or(NaiveDate::MIN)
}

/// Latest date the store accepts (partition dates and expiries).
#[must_use]
pub fn max_supported_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2050, 12, 31).unwrap_or(NaiveDate::MAX)
}

/// Check a date against the supported range.
pub fn validate_date(field: &str, date: NaiveDate) -> Result<(), StoreError> {
    if date < min_supported_date() || date > max_supported_date() {
        return Err(StoreError::invalid(
            field,
            format!(
                "{date} is outside the supported range {}..={}",
                min_supported_date(),
                max_supported_date()
            ),
        ));
    }
    Ok(())
}

/// Asset class of an instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecurityType {
    /// Listed equity.
    Equity,
    /// Foreign-exchange pair.
    Forex,
    /// Contract for difference.
    Cfd,
    /// Cryptocurrency pair.
    Crypto,
    /// Futures contract.
    Future,
    /// Option on an equity or index.
    Option,
    /// Option on a futures contract.
    FutureOption,
}

impl SecurityType {
    /// Directory name for this asset class.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Equity => "equity",
            Self::Forex => "forex",
            Self::Cfd => "cfd",
            Self::Crypto => "crypto",
            Self::Future => "future",
            Self::Option => "option",
            Self::FutureOption => "futureoption",
        }
    }

    /// Derivative families aggregate many contracts into one container.
    #[must_use]
    pub const fn is_derivative(&self) -> bool {
        matches!(self, Self::Future | Self::Option | Self::FutureOption)
    }

    /// Whether contracts of this type carry strike/right/style.
    #[must_use]
    pub const fn is_option(&self) -> bool {
        matches!(self, Self::Option | Self::FutureOption)
    }
}

impl fmt::Display for SecurityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SecurityType {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "equity" => Ok(Self::Equity),
            "forex" => Ok(Self::Forex),
            "cfd" => Ok(Self::Cfd),
            "crypto" => Ok(Self::Crypto),
            "future" => Ok(Self::Future),
            "option" => Ok(Self::Option),
            "futureoption" => Ok(Self::FutureOption),
            other => Err(StoreError::invalid(
                "security_type",
                format!("unknown security type '{other}'"),
            )),
        }
    }
}

/// Option right (call or put).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionRight {
    /// Call option (right to buy).
    Call,
    /// Put option (right to sell).
    Put,
}

impl OptionRight {
    /// Lowercase name used in entry keys.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Call => "call",
            Self::Put => "put",
        }
    }
}

/// Option exercise style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionStyle {
    /// Exercisable any time before expiry.
    American,
    /// Exercisable only at expiry.
    European,
}

impl OptionStyle {
    /// Lowercase name used in paths and entry keys.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::American => "american",
            Self::European => "european",
        }
    }
}

/// Strike, right and style of an option contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OptionTerms {
    /// Exercise style.
    pub style: OptionStyle,
    /// Call or put.
    pub right: OptionRight,
    /// Strike price.
    pub strike: Decimal,
}

impl OptionTerms {
    /// Strike scaled by 10 000, as written into entry keys.
    #[must_use]
    ///
    /// `None` when the scaled value does not fit a `Decimal`.
    pub fn scaled_strike(&self) -> Option<Decimal> {
        self.strike
            .checked_mul(STRIKE_SCALE)
            .map(|scaled| scaled.trunc().normalize())
    }
}

/// Contract identity of a derivative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContractTerms {
    /// Expiration date.
    pub expiry: NaiveDate,
    /// Present for options and future options.
    pub option: Option<OptionTerms>,
}

/// A validated instrument descriptor.
///
/// Examples:
/// - Forex: `Instrument::forex("EURUSD", "fxcm")`
/// - Future: `Instrument::future("ES", "cme", expiry)`
/// - Option: `Instrument::option("AAPL", "usa", OptionStyle::American, OptionRight::Call, strike, expiry)`
///
/// Deserialization runs the same checks as the constructors.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawInstrument")]
pub struct Instrument {
    /// Ticker, pair or derivative root (underlying for options).
    symbol: String,
    security_type: SecurityType,
    market: String,
    contract: Option<ContractTerms>,
}

/// Unchecked wire form of [`Instrument`].
#[derive(Deserialize)]
struct RawInstrument {
    symbol: String,
    security_type: SecurityType,
    market: String,
    #[serde(default)]
    contract: Option<ContractTerms>,
}

impl TryFrom<RawInstrument> for Instrument {
    type Error = StoreError;

    fn try_from(raw: RawInstrument) -> Result<Self, Self::Error> {
        Self::build(raw.symbol, raw.security_type, raw.market, raw.contract)
    }
}

impl Instrument {
    /// Create a non-derivative instrument.
    pub fn new(
        symbol: impl Into<String>,
        security_type: SecurityType,
        market: impl Into<String>,
    ) -> Result<Self, StoreError> {
        if security_type.is_derivative() {
            return Err(StoreError::invalid(
                "security_type",
                format!("{security_type} requires contract terms"),
            ));
        }
        Self::build(symbol.into(), security_type, market.into(), None)
    }

    /// Create an equity.
    pub fn equity(symbol: impl Into<String>, market: impl Into<String>) -> Result<Self, StoreError> {
        Self::new(symbol, SecurityType::Equity, market)
    }

    /// Create a forex pair.
    pub fn forex(symbol: impl Into<String>, market: impl Into<String>) -> Result<Self, StoreError> {
        Self::new(symbol, SecurityType::Forex, market)
    }

    /// Create a CFD.
    pub fn cfd(symbol: impl Into<String>, market: impl Into<String>) -> Result<Self, StoreError> {
        Self::new(symbol, SecurityType::Cfd, market)
    }

    /// Create a crypto pair.
    pub fn crypto(symbol: impl Into<String>, market: impl Into<String>) -> Result<Self, StoreError> {
        Self::new(symbol, SecurityType::Crypto, market)
    }

    /// Create a futures contract on `root` expiring on `expiry`.
    pub fn future(
        root: impl Into<String>,
        market: impl Into<String>,
        expiry: NaiveDate,
    ) -> Result<Self, StoreError> {
        Self::build(
            root.into(),
            SecurityType::Future,
            market.into(),
            Some(ContractTerms {
                expiry,
                option: None,
            }),
        )
    }

    /// Create an option on `underlying`.
    pub fn option(
        underlying: impl Into<String>,
        market: impl Into<String>,
        style: OptionStyle,
        right: OptionRight,
        strike: Decimal,
        expiry: NaiveDate,
    ) -> Result<Self, StoreError> {
        Self::build(
            underlying.into(),
            SecurityType::Option,
            market.into(),
            Some(ContractTerms {
                expiry,
                option: Some(OptionTerms {
                    style,
                    right,
                    strike,
                }),
            }),
        )
    }

    /// Create an option on the futures root `root`.
    pub fn future_option(
        root: impl Into<String>,
        market: impl Into<String>,
        style: OptionStyle,
        right: OptionRight,
        strike: Decimal,
        expiry: NaiveDate,
    ) -> Result<Self, StoreError> {
        Self::build(
            root.into(),
            SecurityType::FutureOption,
            market.into(),
            Some(ContractTerms {
                expiry,
                option: Some(OptionTerms {
                    style,
                    right,
                    strike,
                }),
            }),
        )
    }

    fn build(
        symbol: String,
        security_type: SecurityType,
        market: String,
        contract: Option<ContractTerms>,
    ) -> Result<Self, StoreError> {
        validate_symbol(&symbol)?;
        validate_market(&market)?;

        if security_type.is_derivative() != contract.is_some() {
            let message = if contract.is_some() {
                format!("{security_type} cannot carry contract terms")
            } else {
                format!("{security_type} requires contract terms")
            };
            return Err(StoreError::invalid("contract", message));
        }

        if let Some(terms) = &contract {
            validate_date("expiry", terms.expiry)?;
            match (&terms.option, security_type.is_option()) {
                (Some(option), true) => validate_strike(option.strike)?,
                (None, false) => {}
                (Some(_), false) => {
                    return Err(StoreError::invalid(
                        "contract",
                        format!("{security_type} cannot carry option terms"),
                    ));
                }
                (None, true) => {
                    return Err(StoreError::invalid(
                        "contract",
                        format!("{security_type} requires strike, right and style"),
                    ));
                }
            }
        }

        Ok(Self {
            symbol,
            security_type,
            market: market.to_ascii_lowercase(),
            contract,
        })
    }

    /// Symbol text as supplied.
    #[must_use]
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Lowercased symbol as used on disk.
    #[must_use]
    pub fn path_symbol(&self) -> String {
        self.symbol.to_ascii_lowercase()
    }

    /// Asset class.
    #[must_use]
    pub const fn security_type(&self) -> SecurityType {
        self.security_type
    }

    /// Market (lowercase).
    #[must_use]
    pub fn market(&self) -> &str {
        &self.market
    }

    /// Contract terms for derivatives.
    #[must_use]
    pub const fn contract(&self) -> Option<&ContractTerms> {
        self.contract.as_ref()
    }
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.security_type, self.market, self.symbol)?;
        if let Some(contract) = &self.contract {
            write!(f, " {}", contract.expiry.format("%Y%m%d"))?;
            if let Some(option) = &contract.option {
                write!(
                    f,
                    " {} {} {}",
                    option.style.as_str(),
                    option.right.as_str(),
                    option.strike
                )?;
            }
        }
        Ok(())
    }
}

fn validate_symbol(symbol: &str) -> Result<(), StoreError> {
    if symbol.is_empty() {
        return Err(StoreError::invalid("symbol", "Symbol cannot be empty"));
    }

    if !symbol
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
    {
        return Err(StoreError::invalid(
            "symbol",
            format!("Symbol '{symbol}' contains invalid characters"),
        ));
    }

    if symbol.chars().all(|c| c == '.') {
        return Err(StoreError::invalid(
            "symbol",
            format!("Symbol '{symbol}' is not a valid path segment"),
        ));
    }

    Ok(())
}

fn validate_market(market: &str) -> Result<(), StoreError> {
    if market.is_empty() {
        return Err(StoreError::invalid("market", "Market cannot be empty"));
    }

    if !market
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-')
    {
        return Err(StoreError::invalid(
            "market",
            format!("Market '{market}' contains invalid characters"),
        ));
    }

    Ok(())
}

fn validate_strike(strike: Decimal) -> Result<(), StoreError> {
    if strike <= Decimal::ZERO {
        return Err(StoreError::invalid("strike", "Strike must be positive"));
    }

    if strike.checked_mul(STRIKE_SCALE).is_none() {
        return Err(StoreError::invalid(
            "strike",
            format!("Strike {strike} is too large"),
        ));
    }

    if strike.normalize().scale() > MAX_STRIKE_DECIMALS {
        return Err(StoreError::invalid(
            "strike",
            format!("Strike {strike} has more than {MAX_STRIKE_DECIMALS} decimal places"),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_equity_keeps_symbol_and_lowercases_market() {
        let spy = Instrument::equity("SPY", "USA").unwrap();
        assert_eq!(spy.symbol(), "SPY");
        assert_eq!(spy.path_symbol(), "spy");
        assert_eq!(spy.market(), "usa");
        assert!(spy.contract().is_none());
    }

    #[test]
    fn test_empty_symbol_rejected() {
        let err = Instrument::forex("", "fxcm").unwrap_err();
        assert!(matches!(err, StoreError::InvalidDescriptor { ref field, .. } if field == "symbol"));
    }

    #[test]
    fn test_path_traversal_symbols_rejected() {
        assert!(Instrument::equity("../etc", "usa").is_err());
        assert!(Instrument::equity("..", "usa").is_err());
        assert!(Instrument::equity("a/b", "usa").is_err());
        assert!(Instrument::equity("BRK.B", "usa").is_ok());
    }

    #[test]
    fn test_derivative_type_requires_contract() {
        assert!(Instrument::new("ES", SecurityType::Future, "cme").is_err());
    }

    #[test]
    fn test_expiry_outside_range_rejected() {
        assert!(Instrument::future("ES", "cme", date(1990, 1, 1)).is_err());
        assert!(Instrument::future("ES", "cme", date(2051, 1, 1)).is_err());
        assert!(Instrument::future("ES", "cme", date(2020, 3, 20)).is_ok());
    }

    #[test]
    fn test_strike_validation() {
        let expiry = date(2020, 2, 1);
        let make = |strike| {
            Instrument::option(
                "AAPL",
                "usa",
                OptionStyle::American,
                OptionRight::Call,
                strike,
                expiry,
            )
        };
        assert!(make(dec!(0)).is_err());
        assert!(make(dec!(-5)).is_err());
        assert!(make(dec!(1.00001)).is_err());
        assert!(make(dec!(192.5)).is_ok());
        // Trailing zeros beyond four places are not real precision.
        assert!(make(dec!(1.500000)).is_ok());
    }

    #[test]
    fn test_scaled_strike() {
        let terms = OptionTerms {
            style: OptionStyle::American,
            right: OptionRight::Put,
            strike: dec!(192.5),
        };
        assert_eq!(terms.scaled_strike().unwrap().to_string(), "1925000");
    }

    #[test]
    fn test_deserialize_runs_constructor_checks() {
        let spy = Instrument::equity("SPY", "usa").unwrap();
        let json = serde_json::to_string(&spy).unwrap();
        assert_eq!(serde_json::from_str::<Instrument>(&json).unwrap(), spy);

        let es = Instrument::future("ES", "cme", date(2020, 3, 20)).unwrap();
        let json = serde_json::to_string(&es).unwrap();
        assert_eq!(serde_json::from_str::<Instrument>(&json).unwrap(), es);

        let traversal = r#"{"symbol":"../../../etc","security_type":"equity","market":"usa"}"#;
        assert!(serde_json::from_str::<Instrument>(traversal).is_err());

        let bad_market = r#"{"symbol":"SPY","security_type":"equity","market":"USA/.."}"#;
        assert!(serde_json::from_str::<Instrument>(bad_market).is_err());

        let bare_future = r#"{"symbol":"ES","security_type":"future","market":"cme"}"#;
        assert!(serde_json::from_str::<Instrument>(bare_future).is_err());

        let dated_equity = r#"{"symbol":"SPY","security_type":"equity","market":"usa",
            "contract":{"expiry":"2020-03-20","option":null}}"#;
        assert!(serde_json::from_str::<Instrument>(dated_equity).is_err());
    }

    #[test]
    fn test_strike_too_large_to_scale_is_rejected() {
        let huge = Decimal::from_i128_with_scale(10_i128.pow(25), 0);
        let err = Instrument::option(
            "AAPL",
            "usa",
            OptionStyle::American,
            OptionRight::Call,
            huge,
            date(2020, 1, 17),
        )
        .unwrap_err();
        assert!(matches!(err, StoreError::InvalidDescriptor { .. }));

        let terms = OptionTerms {
            style: OptionStyle::American,
            right: OptionRight::Call,
            strike: huge,
        };
        assert_eq!(terms.scaled_strike(), None);
    }

    #[test]
    fn test_security_type_families() {
        assert!(SecurityType::Future.is_derivative());
        assert!(SecurityType::FutureOption.is_option());
        assert!(!SecurityType::Future.is_option());
        assert!(!SecurityType::Crypto.is_derivative());
        assert_eq!(SecurityType::FutureOption.as_str(), "futureoption");
    }

    #[test]
    fn test_display_includes_contract_identity() {
        let contract = Instrument::option(
            "AAPL",
            "usa",
            OptionStyle::American,
            OptionRight::Call,
            dec!(1),
            date(2020, 2, 1),
        )
        .unwrap();
        assert_eq!(contract.to_string(), "option/usa/AAPL 20200201 american call 1");
    }
}
