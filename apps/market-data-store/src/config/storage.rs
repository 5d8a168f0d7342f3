//! Storage configuration.

use serde::{Deserialize, Serialize};

use crate::storage::{Compression, DEFAULT_PRICE_DECIMALS};

/// Storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root directory containers are written under.
    #[serde(default = "default_data_directory")]
    pub data_directory: String,
    /// Entry compression.
    #[serde(default)]
    pub compression: Compression,
    /// Compression level (1-9). `None` uses the codec default.
    #[serde(default)]
    pub compression_level: Option<i64>,
    /// Decimal places kept for prices and sizes.
    #[serde(default = "default_price_decimals")]
    pub price_decimals: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_directory: default_data_directory(),
            compression: Compression::default(),
            compression_level: None,
            price_decimals: default_price_decimals(),
        }
    }
}

fn default_data_directory() -> String {
    "./data".to_string()
}

const fn default_price_decimals() -> u32 {
    DEFAULT_PRICE_DECIMALS
}
