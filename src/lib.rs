pub mod error;
pub mod config;
pub mod retry;
pub mod api;
pub mod providers;
pub mod normalize;
pub mod audio;
pub mod script;
pub mod models;
pub mod prompts;
pub mod request;
pub mod validate;
pub mod sanitize;
pub mod generate;
pub mod client;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use serde::{Deserialize, Serialize};

pub use client::{GenerationTicket, MediaBackend};
pub use config::GeneratorConfig;
pub use error::{Error, Result};
pub use generate::Generator;
pub use request::{GenerationRequest, MediaOptions};
pub use sanitize::{sanitize, Failure, FailureCategory};

/// AMEDIA API INTERFACE:

// ===== Generate =====

pub type GenerateReply = std::result::Result<Artifact, Failure>;
pub type GenerateReplySender
  = tokio::sync::mpsc::UnboundedSender<GenerateReply>;

pub struct GenerateArgs
{   pub request: GenerationRequest
  , pub cancel: CancelFlag
  , pub reply: GenerateReplySender
}

// ===== KillProcess =====

pub type KillProcessReply = std::result::Result<(), Error>;
pub type KillProcessReplySender
  = tokio::sync::mpsc::UnboundedSender<KillProcessReply>;

pub struct KillProcessArgs
{   pub reply: KillProcessReplySender
}

// ===== MediaHand (sender side) =====

pub struct MediaHand
{   pub generate_tx
      : tokio::sync::mpsc::UnboundedSender<GenerateArgs>
  , pub kill_process_tx
      : tokio::sync::mpsc::UnboundedSender<KillProcessArgs>
}

// ===== MediaFoot (receiver side) =====

pub struct MediaFoot
{   pub generate_rx
      : tokio::sync::mpsc::UnboundedReceiver<GenerateArgs>
  , pub kill_process_rx
      : tokio::sync::mpsc::UnboundedReceiver<KillProcessArgs>
}

/// AMEDIA STRUCTURES:

/// Kind of media a request produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind
{   Image
  , Video
  , Voice
  , Podcast
}

impl MediaKind
{   /// MIME type of the artifact handed back to the caller
    pub fn mime_type(&self) -> &'static str
    {   match self
        {   MediaKind::Image => "image/png"
          , MediaKind::Video => "video/mp4"
          , MediaKind::Voice | MediaKind::Podcast => "audio/wav"
        }
    }
}

/// Language the generated content should be in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
pub enum OutputLanguage
{   #[default]
    #[serde(rename = "en")]
    English
  , #[serde(rename = "ar")]
    Arabic
  , /// Mixed Arabic and English
    #[serde(rename = "both")]
    Bilingual
}

impl OutputLanguage
{   pub fn from_key(key: &str) -> Self
    {   match key
        {   "ar" => OutputLanguage::Arabic
          , "both" => OutputLanguage::Bilingual
          , _ => OutputLanguage::English
        }
    }
}

/// Final output; ownership passes to the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact
{   pub bytes: Vec<u8>
  , pub kind: MediaKind
}

impl Artifact
{   pub fn new(bytes: Vec<u8>, kind: MediaKind) -> Self
    {   Artifact
        {   bytes
          , kind
        }
    }

    pub fn mime_type(&self) -> &'static str
    {   self.kind.mime_type()
    }

    /// `(bytes, media type)` pair
    pub fn into_parts(self) -> (Vec<u8>, &'static str)
    {   let mime = self.mime_type();
        (self.bytes, mime)
    }
}

/// Cooperative cancellation, checked between provider calls
#[derive(Debug, Clone, Default)]
pub struct CancelFlag
{   inner: Arc<AtomicBool>
}

impl CancelFlag
{   pub fn new() -> Self
    {   CancelFlag::default()
    }

    pub fn cancel(&self)
    {   self.inner.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool
    {   self.inner.load(Ordering::SeqCst)
    }

    /// `Err(Cancelled)` once tripped
    pub fn check(&self) -> Result<()>
    {   if self.is_cancelled()
        {   Err(Error::Cancelled)
        } else
        {   Ok(())
        }
    }
}

/// Install the process logger. Honors `RUST_LOG`, defaults to `info`.
/// Safe to call more than once.
pub fn init_logging()
{   use std::io::Write;
    let _ = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info")
      )
      .format(|buf, record| {
        writeln!(
          buf,
          "{} [{}] {}: {}",
          buf.timestamp_seconds(),
          record.target(),
          record.level(),
          record.args()
        )
      })
      .try_init();
}
