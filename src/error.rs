use std::fmt;

/// Custom error type for amedia operations
/// Implements Clone for sending through channels
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error
{   /// Prompt or text rejected before any provider call
    Validation(String)
  , /// Credential or configuration missing/invalid
    Configuration(String)
  , /// Connection failure, read timeout or 5xx that outlived the
    /// retry budget
    TransientProvider
    {   attempts: usize
      , status: Option<u16>
      , last: String
    }
  , /// 4xx response, never retried
    PermanentProvider
    {   status: u16
      , message: String
    }
  , /// Non-retryable transport error (bad URL, redirect loop, body)
    Http(String)
  , /// Provider body was not the JSON we expected
    Parse(String)
  , /// Well-formed response without the expected payload
    NoArtifact
    {   model: String
      , detail: String
    }
  , /// Provider refused the prompt on safety grounds
    Blocked(String)
  , /// Video operation did not finish inside the polling ceiling
    TimeoutExceeded
    {   waited_secs: u64
    }
  , /// Every podcast chunk failed to synthesize
    AllChunksFailed
    {   chunks: usize
      , last: String
    }
  , /// Audio container could not be written or read
    Audio(String)
  , /// Local file handling failed
    Io(String)
  , /// Caller tripped the cancel flag
    Cancelled
  , /// Backend task is gone
    BackendClosed
}

pub type Result<T> = std::result::Result<T, Error>;

impl fmt::Display for Error
{   fn fmt(&self, f: &mut fmt::Formatter<'_>)
      -> fmt::Result
    {   match self
        {   Error::Validation(msg) => {
              write!(f, "{}", msg)
            }
          , Error::Configuration(msg) => {
              write!(f, "Configuration error: {}", msg)
            }
          , Error::TransientProvider { attempts, status, last } => {
              match status
              {   Some(code) => write!(f,
                    "API call failed after {} attempts (HTTP {}): {}",
                    attempts, code, last
                  )
                , None => write!(f,
                    "API call failed after {} attempts: {}",
                    attempts, last
                  )
              }
            }
          , Error::PermanentProvider { status, message } => {
              write!(f, "API error {}: {}", status, message)
            }
          , Error::Http(msg) => {
              write!(f, "HTTP error: {}", msg)
            }
          , Error::Parse(msg) => {
              write!(f, "Parse error: {}", msg)
            }
          , Error::NoArtifact { model, detail } => {
              write!(f, "No artifact from {}: {}", model, detail)
            }
          , Error::Blocked(reason) => {
              write!(f, "Content blocked by safety filters: {}", reason)
            }
          , Error::TimeoutExceeded { waited_secs } => {
              write!(f,
                "Video generation timed out after {} seconds",
                waited_secs
              )
            }
          , Error::AllChunksFailed { chunks, last } => {
              write!(f,
                "No audio generated from any of {} chunks: {}",
                chunks, last
              )
            }
          , Error::Audio(msg) => {
              write!(f, "Audio error: {}", msg)
            }
          , Error::Io(msg) => {
              write!(f, "I/O error: {}", msg)
            }
          , Error::Cancelled => {
              write!(f, "Generation cancelled")
            }
          , Error::BackendClosed => {
              write!(f, "Backend disconnected")
            }
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error
{   fn from(e: std::io::Error) -> Self
    {   Error::Io(e.to_string())
    }
}

impl From<hound::Error> for Error
{   fn from(e: hound::Error) -> Self
    {   Error::Audio(e.to_string())
    }
}

impl From<serde_json::Error> for Error
{   fn from(e: serde_json::Error) -> Self
    {   Error::Parse(e.to_string())
    }
}
