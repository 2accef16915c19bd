//! Generation request types handed in by the presentation layer

use serde::{Deserialize, Serialize};

use crate::models::{ImageModel, VoiceModel};
use crate::{MediaKind, OutputLanguage};

pub const DEFAULT_ASPECT_RATIO: &str = "16:9";
pub const DEFAULT_VIDEO_SECONDS: u32 = 8;
pub const DEFAULT_VOICE: &str = "Kore";
pub const DEFAULT_GUEST_VOICE: &str = "Puck";

/// File already read by the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment
{   pub name: String
  , pub mime_type: String
  , pub bytes: Vec<u8>
}

impl Attachment
{   pub fn is_image(&self) -> bool
    {   self.mime_type.contains("image")
    }
}

/// Podcast length selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PodcastLength
{   #[default]
    Short
  , Standard
}

impl PodcastLength
{   /// Word range the script model is asked to hit
    pub fn target_words(&self) -> &'static str
    {   match self
        {   PodcastLength::Short => "200-300"
          , PodcastLength::Standard => "400-500"
        }
    }
}

/// Kind-specific options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MediaOptions
{   Image
    {   model: ImageModel
      , aspect_ratio: String
    }
  , Video
    {   aspect_ratio: String
      , duration_secs: u32
    }
  , Voice
    {   voice: String
      , model: VoiceModel
      , style_hint: Option<String>
    }
  , Podcast
    {   length: PodcastLength
      , voice_host: String
      , voice_guest: String
    }
}

impl MediaOptions
{   pub fn image() -> Self
    {   MediaOptions::Image
        {   model: ImageModel::default()
          , aspect_ratio: DEFAULT_ASPECT_RATIO.to_string()
        }
    }

    pub fn video() -> Self
    {   MediaOptions::Video
        {   aspect_ratio: DEFAULT_ASPECT_RATIO.to_string()
          , duration_secs: DEFAULT_VIDEO_SECONDS
        }
    }

    pub fn voice() -> Self
    {   MediaOptions::Voice
        {   voice: DEFAULT_VOICE.to_string()
          , model: VoiceModel::default()
          , style_hint: None
        }
    }

    pub fn podcast() -> Self
    {   MediaOptions::Podcast
        {   length: PodcastLength::default()
          , voice_host: DEFAULT_VOICE.to_string()
          , voice_guest: DEFAULT_GUEST_VOICE.to_string()
        }
    }

    pub fn kind(&self) -> MediaKind
    {   match self
        {   MediaOptions::Image { .. } => MediaKind::Image
          , MediaOptions::Video { .. } => MediaKind::Video
          , MediaOptions::Voice { .. } => MediaKind::Voice
          , MediaOptions::Podcast { .. } => MediaKind::Podcast
        }
    }
}

/// One user action. Lives until its artifact or error is returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest
{   /// Prompt, or the text to speak for voice requests
    pub prompt: String
  , /// Already-extracted reference text
    #[serde(default)]
    pub context: Option<String>
  , #[serde(default)]
    pub attachments: Vec<Attachment>
  , #[serde(default)]
    pub language: OutputLanguage
  , pub options: MediaOptions
}

impl GenerationRequest
{   pub fn new(prompt: impl Into<String>, options: MediaOptions) -> Self
    {   GenerationRequest
        {   prompt: prompt.into()
          , context: None
          , attachments: vec![]
          , language: OutputLanguage::default()
          , options
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self
    {   self.context = Some(context.into());
        self
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self
    {   self.attachments.push(attachment);
        self
    }

    pub fn with_language(mut self, language: OutputLanguage) -> Self
    {   self.language = language;
        self
    }

    pub fn kind(&self) -> MediaKind
    {   self.options.kind()
    }

    /// Context with surrounding whitespace removed, if any remains
    pub fn context_text(&self) -> Option<&str>
    {   self.context
          .as_deref()
          .map(str::trim)
          .filter(|c| !c.is_empty())
    }
}
