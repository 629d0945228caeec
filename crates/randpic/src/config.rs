//! Handler configuration
//!
//! Configuration is an explicit value handed to
//! [`PhotoHandlerBuilder`](crate::handler::PhotoHandlerBuilder). It can be
//! built in code, deserialized with `serde`, or read from the environment.
//!
//! # Environment
//!
//! | variable            | field              | default   |
//! |---------------------|--------------------|-----------|
//! | `IMAGES_BUCKET`     | `bucket`           | required  |
//! | `IMAGE_COUNT`       | `image_count`      | `6`       |
//! | `PRESIGN_TTL_SECS`  | `presign_ttl_secs` | `300`     |
//! | `SELECTION`         | `selection`        | `counted` |
//! | `UPLOAD_PREFIX`     | `upload_prefix`    | empty     |
//! | `MAX_UPLOAD_SIZE`   | `max_upload_size`  | 10 MB     |
//!
//! # Example
//! ```
//! use randpic::config::{Config, Selection};
//!
//! let vars = [("IMAGES_BUCKET", "photos"), ("SELECTION", "listed")];
//! let config = Config::from_lookup(|name| {
//!     vars.iter().find(|(k, _)| *k == name).map(|(_, v)| (*v).to_owned())
//! })
//! .unwrap();
//!
//! assert_eq!(config.bucket, "photos");
//! assert_eq!(config.image_count, 6);
//! assert_eq!(config.selection, Selection::Listed);
//! ```

use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const BUCKET_VAR: &str = "IMAGES_BUCKET";
pub const IMAGE_COUNT_VAR: &str = "IMAGE_COUNT";
pub const PRESIGN_TTL_VAR: &str = "PRESIGN_TTL_SECS";
pub const SELECTION_VAR: &str = "SELECTION";
pub const UPLOAD_PREFIX_VAR: &str = "UPLOAD_PREFIX";
pub const MAX_UPLOAD_SIZE_VAR: &str = "MAX_UPLOAD_SIZE";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value for {var}: {value:?}")]
    Invalid { var: &'static str, value: String },
}

/// How the `GET` handler chooses an image
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Selection {
    /// random number `n` in `1..=image_count`, key `{n}.jpg`
    #[default]
    Counted,
    /// random key among the images listed in the bucket
    Listed,
}

impl FromStr for Selection {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("counted") {
            Ok(Self::Counted)
        } else if s.eq_ignore_ascii_case("listed") {
            Ok(Self::Listed)
        } else {
            Err(())
        }
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Counted => f.write_str("counted"),
            Self::Listed => f.write_str("listed"),
        }
    }
}

/// Handler configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
#[non_exhaustive]
pub struct Config {
    /// Bucket holding the images and their attribution texts.
    pub bucket: String,

    /// Number of images named `1.jpg` to `{image_count}.jpg`.
    ///
    /// Only used by [`Selection::Counted`].
    ///
    /// Default: 6
    pub image_count: usize,

    /// Lifetime of presigned image URLs in seconds.
    ///
    /// Default: 300 (5 minutes)
    pub presign_ttl_secs: u64,

    /// Image selection strategy.
    ///
    /// Default: [`Selection::Counted`]
    pub selection: Selection,

    /// Key prefix for uploaded images.
    ///
    /// Default: empty
    pub upload_prefix: String,

    /// Maximum size of an upload body after base64 decoding.
    ///
    /// Default: 10 MB (10 * 1024 * 1024)
    pub max_upload_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bucket: String::new(),
            image_count: 6,
            presign_ttl_secs: 300, // 5 minutes
            selection: Selection::Counted,
            upload_prefix: String::new(),
            max_upload_size: 10 * 1024 * 1024, // 10 MB
        }
    }
}

impl Config {
    /// Creates a configuration with default values for `bucket`
    #[must_use]
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            ..Self::default()
        }
    }

    /// Reads the configuration from process environment variables
    ///
    /// # Errors
    /// Returns an error if `IMAGES_BUCKET` is unset or a variable has an invalid value
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Reads the configuration through `lookup`, which maps a variable name to its value
    ///
    /// # Errors
    /// Returns an error if `IMAGES_BUCKET` is missing or a variable has an invalid value
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let bucket = lookup(BUCKET_VAR)
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::Missing(BUCKET_VAR))?;

        let mut config = Self::new(bucket);

        if let Some(value) = lookup(IMAGE_COUNT_VAR) {
            config.image_count = parse_var(IMAGE_COUNT_VAR, value)?;
        }
        if let Some(value) = lookup(PRESIGN_TTL_VAR) {
            config.presign_ttl_secs = parse_var(PRESIGN_TTL_VAR, value)?;
        }
        if let Some(value) = lookup(SELECTION_VAR) {
            config.selection = parse_var(SELECTION_VAR, value)?;
        }
        if let Some(value) = lookup(UPLOAD_PREFIX_VAR) {
            config.upload_prefix = value;
        }
        if let Some(value) = lookup(MAX_UPLOAD_SIZE_VAR) {
            config.max_upload_size = parse_var(MAX_UPLOAD_SIZE_VAR, value)?;
        }

        Ok(config)
    }

    #[must_use]
    pub fn presign_ttl(&self) -> Duration {
        Duration::from_secs(self.presign_ttl_secs)
    }
}

fn parse_var<T: FromStr>(var: &'static str, value: String) -> Result<T, ConfigError> {
    match value.trim().parse() {
        Ok(v) => Ok(v),
        Err(_) => Err(ConfigError::Invalid { var, value }),
    }
}
