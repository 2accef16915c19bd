//! Generation orchestrators.
//!
//! Every request walks `Validating -> Calling -> Normalizing ->
//! Assembling` and ends in an artifact or an error. Provider calls go
//! through `ApiClient`; nothing here talks HTTP directly.

mod image;
mod podcast;
mod video;
mod voice;

use std::fmt;
use std::sync::Arc;
use log::{debug, info, warn};

use crate::api::ApiClient;
use crate::config::GeneratorConfig;
use crate::error::Result;
use crate::request::{GenerationRequest, MediaOptions};
use crate::{Artifact, CancelFlag, MediaKind};

/// Lifecycle stage of one request, for logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage
{   Validating
  , Calling
  , Normalizing
  , Assembling
  , Succeeded
  , Failed
}

impl fmt::Display for Stage
{   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {   let name = match self
        {   Stage::Validating => "validating"
          , Stage::Calling => "calling"
          , Stage::Normalizing => "normalizing"
          , Stage::Assembling => "assembling"
          , Stage::Succeeded => "succeeded"
          , Stage::Failed => "failed"
        };
        write!(f, "{}", name)
    }
}

fn enter(kind: MediaKind, stage: Stage)
{   debug!("{:?} request {}", kind, stage);
}

/// Produces artifacts from requests. Cheap to clone; shares one HTTP
/// client and one read-only configuration.
#[derive(Debug, Clone)]
pub struct Generator
{   api: ApiClient
  , config: Arc<GeneratorConfig>
}

impl Generator
{   pub fn new(config: Arc<GeneratorConfig>) -> Result<Self>
    {   config.validate()?;
        let api = ApiClient::new(config.clone())?;
        Ok(Generator
        {   api
          , config
        })
    }

    pub fn config(&self) -> &GeneratorConfig
    {   &self.config
    }

    fn api_base(&self) -> &str
    {   &self.config.api_base
    }

    /// Run one request to completion
    pub async fn generate(
      &self
    , request: &GenerationRequest
    , cancel: &CancelFlag
    ) -> Result<Artifact>
    {   let kind = request.kind();
        info!(
          "Generating {:?} (lang={:?}, prompt {} chars)",
          kind, request.language, request.prompt.chars().count()
        );
        cancel.check()?;

        let result = match &request.options
        {   MediaOptions::Image { model, aspect_ratio } => {
              self.generate_image(request, *model, aspect_ratio).await
            }
          , MediaOptions::Video { aspect_ratio, duration_secs } => {
              self.generate_video(
                request, aspect_ratio, *duration_secs, cancel
              ).await
            }
          , MediaOptions::Voice { voice, model, style_hint } => {
              self.generate_voice(
                request, voice, *model, style_hint.as_deref()
              ).await
            }
          , MediaOptions::Podcast { length, voice_host, voice_guest } => {
              self.generate_podcast(
                request, *length, voice_host, voice_guest, cancel
              ).await
            }
        };

        match &result
        {   Ok(artifact) => {
              enter(kind, Stage::Succeeded);
              info!("{:?} ready: {} bytes", kind, artifact.bytes.len());
            }
          , Err(e) => {
              enter(kind, Stage::Failed);
              warn!("{:?} generation failed: {}", kind, e);
            }
        }
        result
    }
}
