/*!
 * Memory Manager Configuration
 * Data page sizing and page budget
 */

use super::types::{MemoryError, MemoryResult};
use crate::core::limits::{DEFAULT_PAGE_UNITS, MAX_PAGE_UNITS};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Environment variable overriding `page_units`
pub const ENV_PAGE_UNITS: &str = "MM_PAGE_UNITS";

/// Environment variable overriding `max_data_pages`
pub const ENV_MAX_DATA_PAGES: &str = "MM_MAX_DATA_PAGES";

/// Configuration for a memory manager
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// OS pages mapped for every data page
    pub page_units: usize,
    /// Upper bound on simultaneously mapped data pages (None = unbounded)
    pub max_data_pages: Option<usize>,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            page_units: DEFAULT_PAGE_UNITS,
            max_data_pages: None,
        }
    }
}

impl ManagerConfig {
    pub fn with_page_units(mut self, units: usize) -> Self {
        self.page_units = units;
        self
    }

    pub fn with_max_data_pages(mut self, pages: usize) -> Self {
        self.max_data_pages = Some(pages);
        self
    }

    /// Defaults overridden by `MM_PAGE_UNITS` / `MM_MAX_DATA_PAGES`
    ///
    /// Unparseable values are ignored with a warning.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(raw) = std::env::var(ENV_PAGE_UNITS) {
            match raw.trim().parse() {
                Ok(units) => config.page_units = units,
                Err(e) => warn!(
                    variable = ENV_PAGE_UNITS,
                    value = %raw,
                    error = %e,
                    "Ignoring invalid value"
                ),
            }
        }

        if let Ok(raw) = std::env::var(ENV_MAX_DATA_PAGES) {
            match raw.trim().parse() {
                Ok(pages) => config.max_data_pages = Some(pages),
                Err(e) => warn!(
                    variable = ENV_MAX_DATA_PAGES,
                    value = %raw,
                    error = %e,
                    "Ignoring invalid value"
                ),
            }
        }

        config
    }

    /// Parse and validate a JSON document
    pub fn from_json(json: &str) -> MemoryResult<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| MemoryError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> MemoryResult<()> {
        if self.page_units == 0 || self.page_units > MAX_PAGE_UNITS {
            return Err(MemoryError::InvalidConfig(format!(
                "page_units must be between 1 and {}, got {}",
                MAX_PAGE_UNITS, self.page_units
            )));
        }
        Ok(())
    }
}
