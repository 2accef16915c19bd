//! Configuration for the generation backend and credential resolution

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use serde::{Deserialize, Serialize};
use log::{debug, warn};

pub const API_KEY_VAR: &str = "GEMINI_API_KEY";
pub const DEFAULT_API_BASE: &str
  = "https://generativelanguage.googleapis.com/v1beta";
const DOTENV_PLACEHOLDER: &str = "your_gemini_api_key_here";

/// Timeout tiers, in milliseconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeoutConfig
{   /// Connect timeout shared by every tier
    pub connect_ms: u64
  , /// Read budget for quick calls (polling, small payloads)
    pub fast_ms: u64
  , /// Read budget for image/speech/script generation
    pub slow_ms: u64
  , /// Read budget for large downloads
    pub heavy_ms: u64
}

impl Default for TimeoutConfig
{   fn default() -> Self
    {   TimeoutConfig
        {   connect_ms: 30_000
          , fast_ms: 180_000
          , slow_ms: 300_000
          , heavy_ms: 600_000
        }
    }
}

/// Retry configuration for transient provider failures
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig
{   /// Additional attempts after the first one
    pub max_retries: usize
  , /// Linear backoff step; attempt n waits n steps
    pub backoff_step_ms: u64
}

impl Default for RetryConfig
{   fn default() -> Self
    {   RetryConfig
        {   max_retries: 2
          , backoff_step_ms: 5_000
        }
    }
}

/// Video operation polling, in milliseconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoPollConfig
{   pub poll_interval_ms: u64
  , pub max_wait_ms: u64
}

impl Default for VideoPollConfig
{   fn default() -> Self
    {   VideoPollConfig
        {   poll_interval_ms: 15_000
          , max_wait_ms: 900_000
        }
    }
}

impl VideoPollConfig
{   pub fn poll_interval(&self) -> Duration
    {   Duration::from_millis(self.poll_interval_ms)
    }

    pub fn max_wait(&self) -> Duration
    {   Duration::from_millis(self.max_wait_ms)
    }
}

/// Generator configuration. Read-only once built; shared by `Arc`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratorConfig
{   /// Provider credential, sent as the `key` query parameter
    pub api_key: String
  , /// API base URL
    pub api_base: String
  , pub timeouts: TimeoutConfig
  , pub retry: RetryConfig
  , pub video: VideoPollConfig
  , /// Directory for the video download file; system temp dir if unset
    #[serde(default)]
    pub scratch_dir: Option<PathBuf>
}

impl Default for GeneratorConfig
{   fn default() -> Self
    {   GeneratorConfig
        {   api_key: String::new()
          , api_base: DEFAULT_API_BASE.to_string()
          , timeouts: TimeoutConfig::default()
          , retry: RetryConfig::default()
          , video: VideoPollConfig::default()
          , scratch_dir: None
        }
    }
}

impl GeneratorConfig
{   /// Default configuration with an explicit key
    pub fn with_api_key(api_key: impl Into<String>) -> Self
    {   GeneratorConfig
        {   api_key: api_key.into()
          , ..GeneratorConfig::default()
        }
    }

    /// Resolve the key from the process environment, then the
    /// optional secrets store, then the optional `.env` file
    pub fn from_env(
      secrets: Option<&dyn SecretStore>
    , dotenv: Option<&Path>
    ) -> crate::error::Result<Self>
    {   let env_value = std::env::var(API_KEY_VAR).ok();
        let api_key = resolve_api_key(env_value, secrets, dotenv)?;
        Ok(GeneratorConfig::with_api_key(api_key))
    }

    /// Reject configurations the client cannot use
    pub fn validate(&self) -> crate::error::Result<()>
    {   if self.api_key.trim().is_empty()
        {   return Err(crate::error::Error::Configuration(
              format!("{} not configured", API_KEY_VAR)
            ));
        }
        if self.api_base.trim().is_empty()
        {   return Err(crate::error::Error::Configuration(
              "api_base is empty".to_string()
            ));
        }
        Ok(())
    }
}

/// A read-only secret source consulted after the environment
pub trait SecretStore: Send + Sync
{   fn get(&self, name: &str) -> Option<String>;
}

impl SecretStore for HashMap<String, String>
{   fn get(&self, name: &str) -> Option<String>
    {   HashMap::get(self, name).cloned()
    }
}

/// Flat JSON object of secret names to values
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JsonSecrets
{   #[serde(flatten)]
    pub values: HashMap<String, String>
}

impl JsonSecrets
{   pub fn load(path: &Path) -> crate::error::Result<Self>
    {   debug!("Loading secrets from {}", path.display());
        let text = std::fs::read_to_string(path)?;
        let secrets: JsonSecrets = serde_json::from_str(&text)
          .map_err(|e| crate::error::Error::Configuration(
            format!("Invalid secrets file: {}", e)
          ))?;
        Ok(secrets)
    }
}

impl SecretStore for JsonSecrets
{   fn get(&self, name: &str) -> Option<String>
    {   self.values.get(name).cloned()
    }
}

fn non_blank(value: Option<String>) -> Option<String>
{   value
      .map(|v| v.trim().to_string())
      .filter(|v| !v.is_empty())
}

/// Pick the first non-blank key from env value, secrets, `.env`
pub fn resolve_api_key(
  env_value: Option<String>
, secrets: Option<&dyn SecretStore>
, dotenv: Option<&Path>
) -> crate::error::Result<String>
{   if let Some(key) = non_blank(env_value)
    {   debug!("Using {} from environment", API_KEY_VAR);
        return Ok(key);
    }

    if let Some(store) = secrets
    {   if let Some(key) = non_blank(store.get(API_KEY_VAR))
        {   debug!("Using {} from secrets store", API_KEY_VAR);
            return Ok(key);
        }
    }

    if let Some(path) = dotenv
    {   match read_dotenv_key(path)
        {   Ok(Some(key)) => {
              debug!("Using {} from {}", API_KEY_VAR, path.display());
              return Ok(key);
            }
          , Ok(None) => {}
          , Err(e) => {
              warn!("Could not read {}: {}", path.display(), e);
            }
        }
    }

    Err(crate::error::Error::Configuration(format!(
      "{} not configured. Set it as an environment variable, \
       in the secrets store, or in a .env file.",
      API_KEY_VAR
    )))
}

fn read_dotenv_key(path: &Path)
  -> std::io::Result<Option<String>>
{   if !path.exists()
    {   return Ok(None);
    }
    let text = std::fs::read_to_string(path)?;
    let prefix = format!("{}=", API_KEY_VAR);
    for line in text.lines()
    {   let line = line.trim();
        if line.starts_with('#') || !line.starts_with(&prefix)
        {   continue;
        }
        let value = line[prefix.len()..]
          .trim()
          .trim_matches('"')
          .trim_matches('\'');
        if !value.is_empty() && value != DOTENV_PLACEHOLDER
        {   return Ok(Some(value.to_string()));
        }
    }
    Ok(None)
}
