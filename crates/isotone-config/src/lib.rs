mod adapter;
mod model;
mod raw;

pub use model::{
    Backend, Config, ServiceConfig, Timeouts, DEFAULT_POLL_INTERVAL, DEFAULT_PUBLISHER_CAPACITY,
    DEFAULT_SOCKET_DIR,
};

/// File names probed, in order, when no configuration path is given.
pub const DEFAULT_FILENAMES: &[&str] = &["isotone.toml", ".isotone.toml"];

/// Error type for configuration parsing.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[cfg(feature = "toml")]
    #[error("toml parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("validation error(s): {0}")]
    Validation(String),
}

/// Load a configuration from a file path.
///
/// # Errors
///
/// Returns a `ConfigError` if the configuration file cannot be read or parsed.
pub fn load_from_path(path: &std::path::Path) -> Result<Config, ConfigError> {
    let text = std::fs::read_to_string(path)?;
    parse_auto(&text, path)
}

/// Load the configuration at `path`, or the first default file found in
/// the working directory, or the built-in catalog when there is none.
///
/// # Errors
///
/// Returns a `ConfigError` if a configuration file exists but cannot be read
/// or parsed.
pub fn load_or_default(path: Option<&std::path::Path>) -> Result<Config, ConfigError> {
    if let Some(path) = path {
        return load_from_path(path);
    }

    for filename in DEFAULT_FILENAMES {
        let candidate = std::path::Path::new(filename);
        if candidate.exists() {
            return load_from_path(candidate);
        }
    }

    Ok(Config::default())
}

/// Parse a configuration from a string, picking the format by extension.
///
/// # Errors
///
/// Returns a `ConfigError` if the configuration string cannot be parsed.
pub fn parse_auto(text: &str, path: &std::path::Path) -> Result<Config, ConfigError> {
    let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("");
    match ext {
        #[cfg(feature = "toml")]
        "toml" => parse_toml(text),
        _ => Err(ConfigError::Validation("unknown config extension".into())),
    }
}

/// Parse a configuration from a TOML string.
///
/// # Errors
///
/// Returns a `ConfigError` if the configuration string cannot be parsed.
#[cfg(feature = "toml")]
pub fn parse_toml(config: &str) -> Result<Config, ConfigError> {
    let raw = toml::from_str::<raw::RawConfig>(config)?;
    raw.try_into()
}
