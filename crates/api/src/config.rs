//! Runtime configuration from environment variables.
//!
//! Unset variables use the defaults; invalid values log a warning and fall
//! back to the default rather than aborting startup.

use compass_core::money::MAX_SCALE;

pub const BIND_ADDR_VAR: &str = "COMPASS_BIND_ADDR";
pub const CURRENCY_SCALE_VAR: &str = "COMPASS_CURRENCY_SCALE";

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_CURRENCY_SCALE: u32 = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    pub bind_addr: String,
    /// Fractional digits of the display currency (2 for cents).
    pub currency_scale: u32,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            currency_scale: DEFAULT_CURRENCY_SCALE,
        }
    }
}

impl ApiConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let bind_addr = match lookup(BIND_ADDR_VAR) {
            Some(v) if !v.trim().is_empty() => v.trim().to_string(),
            Some(_) => {
                tracing::warn!("{BIND_ADDR_VAR} is blank; using {DEFAULT_BIND_ADDR}");
                DEFAULT_BIND_ADDR.to_string()
            }
            None => DEFAULT_BIND_ADDR.to_string(),
        };

        let currency_scale = match lookup(CURRENCY_SCALE_VAR) {
            None => DEFAULT_CURRENCY_SCALE,
            Some(raw) => match raw.trim().parse::<u32>() {
                Ok(scale) if scale <= MAX_SCALE => scale,
                _ => {
                    tracing::warn!(
                        value = %raw,
                        "{CURRENCY_SCALE_VAR} must be an integer in 0..={MAX_SCALE}; using {DEFAULT_CURRENCY_SCALE}"
                    );
                    DEFAULT_CURRENCY_SCALE
                }
            },
        };

        Self {
            bind_addr,
            currency_scale,
        }
    }
}
