//! Two-speaker dialogue scripts: label cleanup, word ceiling, chunking

use log::{debug, warn};

pub const WORDS_PER_CHUNK: usize = 150;
pub const MAX_SCRIPT_WORDS: usize = 600;

/// The two fixed speaker roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Speaker
{   Host
  , Guest
}

impl Speaker
{   pub fn label(&self) -> &'static str
    {   match self
        {   Speaker::Host => "Host"
          , Speaker::Guest => "Guest"
        }
    }
}

/// Localized labels the script model sometimes emits
const LABEL_REWRITES: &[(&str, Speaker)] = &[
  ("المقدم:", Speaker::Host),
  ("المقدّم:", Speaker::Host),
  ("الضيف:", Speaker::Guest),
];

/// Speaker role of a script line, from its `Host:`/`Guest:` prefix
pub fn speaker_of(line: &str) -> Option<Speaker>
{   let line = line.trim_start().trim_start_matches(['*', '-', ' ']);
    [Speaker::Host, Speaker::Guest]
      .into_iter()
      .find(|s| {
        line.strip_prefix(s.label())
          .map(|rest| rest.trim_start_matches('*').starts_with(':'))
          .unwrap_or(false)
      })
}

/// Rewrite localized speaker labels to `Host:`/`Guest:`
pub fn canonicalize_labels(script: &str) -> String
{   let mut out = script.to_string();
    for (localized, speaker) in LABEL_REWRITES
    {   out = out.replace(localized, &format!("{}:", speaker.label()));
    }
    out
}

fn word_count(text: &str) -> usize
{   text.split_whitespace().count()
}

/// Keep at most `max_words` words, preserving line boundaries
pub fn truncate_words(script: &str, max_words: usize) -> String
{   let total = word_count(script);
    if total <= max_words
    {   return script.to_string();
    }
    warn!(
      "Script exceeded limit ({} words), truncating to {}",
      total, max_words
    );

    let mut remaining = max_words;
    let mut kept: Vec<String> = Vec::new();
    for line in script.lines()
    {   if remaining == 0
        {   break;
        }
        let words = word_count(line);
        if words <= remaining
        {   kept.push(line.to_string());
            remaining -= words;
        } else
        {   let partial: Vec<&str> = line
              .split_whitespace()
              .take(remaining)
              .collect();
            kept.push(partial.join(" "));
            remaining = 0;
        }
    }
    kept.join("\n")
}

/// Ordered run of whole script lines sent to one synthesis call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptChunk
{   pub lines: Vec<String>
  , pub words: usize
}

impl ScriptChunk
{   fn start(line: &str, words: usize) -> Self
    {   ScriptChunk
        {   lines: vec![line.to_string()]
          , words
        }
    }

    pub fn text(&self) -> String
    {   self.lines.join("\n")
    }
}

/// Split a script into chunks of whole lines whose word count stays
/// within `max_words`. A line longer than the budget gets a chunk to
/// itself. Zero or one resulting chunk collapses to the full script.
pub fn chunk(script: &str, max_words: usize) -> Vec<ScriptChunk>
{   let script = script.trim();
    let mut chunks: Vec<ScriptChunk> = Vec::new();
    let mut current: Option<ScriptChunk> = None;

    for line in script.split('\n')
    {   let words = word_count(line);
        let fits = current
          .as_ref()
          .map(|open| open.words + words <= max_words);
        match fits
        {   Some(true) => {
              if let Some(open) = current.as_mut()
              {   open.lines.push(line.to_string());
                  open.words += words;
              }
            }
          , Some(false) => {
              if let Some(done) = current.replace(
                ScriptChunk::start(line, words)
              )
              {   chunks.push(done);
              }
            }
          , None => {
              current = Some(ScriptChunk::start(line, words));
            }
        }
    }
    if let Some(done) = current
    {   chunks.push(done);
    }

    if chunks.len() <= 1
    {   let lines: Vec<String> = script
          .split('\n')
          .map(str::to_string)
          .collect();
        return vec![ScriptChunk
        {   lines
          , words: word_count(script)
        }];
    }

    debug!(
      "Chunked {}-word script into {} chunks",
      word_count(script), chunks.len()
    );
    chunks
}
