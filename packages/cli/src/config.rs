//! Run configuration: defaults, an optional TOML file, then flags.

use std::path::Path;

use chicago_requests::RequestsError;
use chicago_requests_models::ExtractConfig;

/// Flag values that take precedence over the config file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub parallelism: Option<usize>,
    pub page_size: Option<u32>,
    pub base_url: Option<String>,
}

/// Loads the configuration from `path`, or the defaults when no file is
/// given.
///
/// # Errors
///
/// Returns [`RequestsError::Io`] if the file cannot be read and
/// [`RequestsError::Config`] if it is not valid.
pub fn load_config(path: Option<&Path>) -> Result<ExtractConfig, RequestsError> {
    let Some(path) = path else {
        return Ok(ExtractConfig::default());
    };

    log::debug!("Loading config from {}", path.display());
    let text = std::fs::read_to_string(path)?;
    parse_config(&text).map_err(|e| RequestsError::Config {
        message: format!("{}: {e}", path.display()),
    })
}

/// Parses a TOML config. Keys left out keep their defaults.
///
/// # Errors
///
/// Returns the TOML error for malformed input or unknown value types.
pub fn parse_config(text: &str) -> Result<ExtractConfig, toml::de::Error> {
    toml::from_str(text)
}

/// Applies `overrides` and checks the result.
///
/// # Errors
///
/// Returns [`RequestsError::Config`] if the final configuration is invalid.
pub fn finalize(
    mut config: ExtractConfig,
    overrides: Overrides,
) -> Result<ExtractConfig, RequestsError> {
    if let Some(parallelism) = overrides.parallelism {
        config.parallelism = parallelism;
    }
    if let Some(page_size) = overrides.page_size {
        config.page_size = page_size;
    }
    if let Some(base_url) = overrides.base_url {
        config.base_url = base_url;
    }

    config
        .validate()
        .map_err(|message| RequestsError::Config { message })?;

    Ok(config)
}
