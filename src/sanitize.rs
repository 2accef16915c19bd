//! Map internal failures to short, user-safe messages.
//!
//! Error kinds are mapped through a fixed table first. Substring
//! classification over the error text only runs for kinds the table
//! does not settle. Whatever remains is redacted and truncated.

use std::fmt;
use serde::{Deserialize, Serialize};
use log::debug;

use crate::error::Error;

const MAX_MESSAGE_CHARS: usize = 200;

/// User-facing failure category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCategory
{   Validation
  , Configuration
  , Timeout
  , RateLimited
  , AccessDenied
  , ModelUnavailable
  , InvalidRequest
  , SafetyBlocked
  , NoArtifact
  , Cancelled
  , Other
}

impl FailureCategory
{   /// Fixed message, when the category has one
    pub fn fixed_message(&self) -> Option<&'static str>
    {   match self
        {   FailureCategory::Configuration => Some(
              "API key not configured. Set GEMINI_API_KEY as an environment variable."
            )
          , FailureCategory::Timeout => Some(
              "Request timed out. Please try again with simpler content or a shorter prompt."
            )
          , FailureCategory::RateLimited => Some(
              "API rate limit reached. Please wait a moment and try again."
            )
          , FailureCategory::AccessDenied => Some(
              "API access denied. Please check your API key permissions."
            )
          , FailureCategory::ModelUnavailable => Some(
              "The requested AI model is not available. Please try a different model."
            )
          , FailureCategory::InvalidRequest => Some(
              "Invalid request. Please simplify your prompt and try again."
            )
          , FailureCategory::SafetyBlocked => Some(
              "Content was blocked by safety filters. Please modify your prompt."
            )
          , FailureCategory::Cancelled => Some("Generation was cancelled.")
          , FailureCategory::Validation
          | FailureCategory::NoArtifact
          | FailureCategory::Other => None
        }
    }
}

/// Sanitized failure handed across the boundary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure
{   pub category: FailureCategory
  , pub message: String
}

impl fmt::Display for Failure
{   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {   write!(f, "{}", self.message)
    }
}

impl std::error::Error for Failure {}

/// Substring table, checked in order
const TEXT_RULES: &[(&[&str], FailureCategory)] = &[
  (&["timed out", "timeout", "deadline"], FailureCategory::Timeout),
  (&["quota", "rate limit", "429", "resource_exhausted"], FailureCategory::RateLimited),
  (&["403", "permission", "unauthenticated"], FailureCategory::AccessDenied),
  (&["404", "not found"], FailureCategory::ModelUnavailable),
  (&["400", "invalid"], FailureCategory::InvalidRequest),
  (&["safety", "blocked"], FailureCategory::SafetyBlocked),
];

/// Fallback classification over free text
pub fn classify_text(text: &str) -> Option<FailureCategory>
{   let lower = text.to_lowercase();
    TEXT_RULES
      .iter()
      .find(|(needles, _)| needles.iter().any(|n| lower.contains(n)))
      .map(|(_, category)| *category)
}

fn classify_status(status: u16) -> Option<FailureCategory>
{   match status
    {   400 => Some(FailureCategory::InvalidRequest)
      , 401 | 403 => Some(FailureCategory::AccessDenied)
      , 404 => Some(FailureCategory::ModelUnavailable)
      , 408 => Some(FailureCategory::Timeout)
      , 429 => Some(FailureCategory::RateLimited)
      , _ => None
    }
}

/// Strip the credential value and any `key=` query value
pub fn redact(text: &str, api_key: Option<&str>) -> String
{   let mut out = match api_key.filter(|k| !k.is_empty())
    {   Some(key) => text.replace(key, "***")
      , None => text.to_string()
    };

    let mut search_from = 0;
    while let Some(pos) = out[search_from..].to_ascii_lowercase().find("key=")
    {   let value_start = search_from + pos + "key=".len();
        let value_end = out[value_start..]
          .find(|c: char| c == '&' || c == '"' || c == '\'' || c.is_whitespace())
          .map(|i| value_start + i)
          .unwrap_or(out.len());
        out.replace_range(value_start..value_end, "***");
        search_from = value_start + "***".len();
    }
    out
}

fn truncate(text: &str) -> String
{   match text.char_indices().nth(MAX_MESSAGE_CHARS)
    {   Some((idx, _)) => format!("{}...", &text[..idx])
      , None => text.to_string()
    }
}

fn from_category(category: FailureCategory, fallback: String) -> Failure
{   Failure
    {   category
      , message: category
          .fixed_message()
          .map(str::to_string)
          .unwrap_or(fallback)
    }
}

fn generic(err: &Error, api_key: Option<&str>) -> Failure
{   let text = redact(&err.to_string(), api_key);
    match classify_text(&text)
    {   Some(category) => from_category(category, text)
      , None => Failure
        {   category: FailureCategory::Other
          , message: format!("Generation failed: {}", truncate(&text))
        }
    }
}

/// The only route from an internal error to user-visible text
pub fn sanitize(err: &Error, api_key: Option<&str>) -> Failure
{   debug!("Sanitizing error: {:?}", err);
    match err
    {   Error::Validation(msg) => Failure
        {   category: FailureCategory::Validation
          , message: truncate(&redact(msg, api_key))
        }
      , Error::Configuration(_) => {
          from_category(FailureCategory::Configuration, String::new())
        }
      , Error::TimeoutExceeded { .. } => {
          from_category(FailureCategory::Timeout, String::new())
        }
      , Error::Blocked(_) => {
          from_category(FailureCategory::SafetyBlocked, String::new())
        }
      , Error::Cancelled => {
          from_category(FailureCategory::Cancelled, String::new())
        }
      , Error::PermanentProvider { status, .. } => {
          match classify_status(*status)
          {   Some(category) => from_category(category, String::new())
            , None => generic(err, api_key)
          }
        }
      , Error::TransientProvider { status: Some(status), .. } => {
          match classify_status(*status)
          {   Some(category) => from_category(category, String::new())
            , None => generic(err, api_key)
          }
        }
      , Error::NoArtifact { model, .. } => Failure
        {   category: FailureCategory::NoArtifact
          , message: format!(
              "{} returned no result. Try a different prompt or model.",
              model
            )
        }
      , Error::AllChunksFailed { last, .. } => {
          let last = redact(last, api_key);
          match classify_text(&last)
          {   Some(category) => from_category(category, last)
            , None => Failure
              {   category: FailureCategory::Other
                , message: "Generation failed: No audio generated from any chunk."
                    .to_string()
              }
          }
        }
      , _ => generic(err, api_key)
    }
}
