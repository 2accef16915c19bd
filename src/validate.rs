use log::warn;

use crate::error::{Error, Result};

pub const MAX_PROMPT_CHARS: usize = 10_000;
pub const MAX_TTS_TEXT_CHARS: usize = 5_000;
pub const MAX_CONTEXT_CHARS: usize = 50_000;

fn take_chars(text: &str, max_chars: usize) -> &str
{   match text.char_indices().nth(max_chars)
    {   Some((idx, _)) => &text[..idx]
      , None => text
    }
}

/// Trimmed text, cut to `max_chars` characters. Empty input is an error.
pub fn validate_prompt(text: &str, max_chars: usize) -> Result<String>
{   let text = text.trim();
    if text.is_empty()
    {   return Err(Error::Validation("Prompt cannot be empty.".to_string()));
    }
    let kept = take_chars(text, max_chars);
    if kept.len() != text.len()
    {   warn!(
          "Prompt truncated from {} to {} chars",
          text.chars().count(), max_chars
        );
    }
    Ok(kept.to_string())
}

/// Context cut to `max_chars` characters; never fails
pub fn clamp_context(text: &str, max_chars: usize) -> String
{   let kept = take_chars(text, max_chars);
    if kept.len() != text.len()
    {   warn!("Context truncated to {} chars", max_chars);
    }
    kept.to_string()
}

/// First `max_chars` characters, without logging
pub fn excerpt(text: &str, max_chars: usize) -> &str
{   take_chars(text, max_chars)
}
