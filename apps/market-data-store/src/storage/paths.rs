//! Container path and entry key resolution.
//!
//! Layout (symbols lowercased, `D` = `YYYYMMDD` partition date):
//!
//! ```text
//! sub-daily  {dir}/{class}/{market}/{res}/{symbol}/{D}_{kind}[_{style}].zip
//!            entry {D}_{symbol}_{res}_{kind}[contract suffix].csv
//! daily      {dir}/{class}/{market}/daily/{symbol}_{kind}[_{style}].zip
//!            entry {symbol}_{kind}[contract suffix].csv
//! ```
//!
//! Derivative contracts sharing a root land in one container; the contract
//! suffix (`_{expiry}` for futures, `_{style}_{right}_{strike*10000}_{expiry}`
//! for options) keeps their entry keys distinct.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::Serialize;

use crate::domain::{DataKind, Instrument, Resolution, validate_date};
use crate::error::StoreError;

/// Archive file extension.
pub const CONTAINER_EXTENSION: &str = "zip";

/// Entry file extension.
pub const ENTRY_EXTENSION: &str = "csv";

/// Suffix of the temporary file written next to a container.
pub const TEMP_SUFFIX: &str = ".tmp";

/// How a resolution splits an instrument's history into containers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Partitioning {
    /// One container per calendar day.
    PerDay,
    /// One container for the whole history.
    Single,
}

impl Partitioning {
    /// Partitioning used for `resolution`.
    #[must_use]
    pub const fn for_resolution(resolution: Resolution) -> Self {
        if resolution.is_sub_daily() {
            Self::PerDay
        } else {
            Self::Single
        }
    }
}

/// Result of resolving an instrument/date/resolution/kind combination.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ResolvedPath {
    /// Container (zip archive) location.
    pub container: PathBuf,
    /// Entry name inside the container.
    pub entry: String,
}

/// Resolve the container path and entry key.
///
/// Pure function of its inputs: the same arguments always produce the same
/// path and key.
///
/// # Errors
///
/// Returns `InvalidDescriptor` if `date` is outside the supported range or
/// the option strike cannot be scaled into the entry key.
pub fn resolve(
    directory: &Path,
    instrument: &Instrument,
    date: NaiveDate,
    resolution: Resolution,
    kind: DataKind,
) -> Result<ResolvedPath, StoreError> {
    validate_date("date", date)?;

    let symbol = instrument.path_symbol();
    let style = style_segment(instrument);
    let contract = contract_suffix(instrument)?;
    let base = directory
        .join(instrument.security_type().as_str())
        .join(instrument.market())
        .join(resolution.as_str());

    let resolved = match Partitioning::for_resolution(resolution) {
        Partitioning::PerDay => {
            let day = date.format("%Y%m%d");
            ResolvedPath {
                container: base
                    .join(&symbol)
                    .join(format!("{day}_{kind}{style}.{CONTAINER_EXTENSION}")),
                entry: format!("{day}_{symbol}_{resolution}_{kind}{contract}.{ENTRY_EXTENSION}"),
            }
        }
        Partitioning::Single => ResolvedPath {
            container: base.join(format!("{symbol}_{kind}{style}.{CONTAINER_EXTENSION}")),
            entry: format!("{symbol}_{kind}{contract}.{ENTRY_EXTENSION}"),
        },
    };

    Ok(resolved)
}

/// Prefix for temporary files adjacent to `container`.
///
/// The random part and [`TEMP_SUFFIX`] are appended by the writer.
#[must_use]
pub fn temp_prefix_for(container: &Path) -> String {
    let name = container
        .file_name()
        .map_or_else(|| "container".to_string(), |n| n.to_string_lossy().into_owned());
    format!(".{name}.")
}

/// Option containers are split by exercise style.
fn style_segment(instrument: &Instrument) -> String {
    instrument
        .contract()
        .and_then(|c| c.option)
        .map_or_else(String::new, |o| format!("_{}", o.style.as_str()))
}

fn contract_suffix(instrument: &Instrument) -> Result<String, StoreError> {
    let Some(contract) = instrument.contract() else {
        return Ok(String::new());
    };
    let expiry = contract.expiry.format("%Y%m%d");
    let suffix = match contract.option {
        Some(option) => {
            let strike = option.scaled_strike().ok_or_else(|| {
                StoreError::invalid("strike", format!("Strike {} is too large", option.strike))
            })?;
            format!(
                "_{}_{}_{strike}_{expiry}",
                option.style.as_str(),
                option.right.as_str(),
            )
        }
        None => format!("_{expiry}"),
    };
    Ok(suffix)
}
