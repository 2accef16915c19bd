use base64::Engine;
use log::{debug, info};

use super::{enter, Generator, Stage};
use crate::api::ProviderCall;
use crate::error::Result;
use crate::models::{ImageModel, ModelFamily};
use crate::providers::gemini::{
  self, Content, GenerateContentRequest, GenerationConfig, ImageConfig
, Part, PredictRequest
};
use crate::request::{GenerationRequest, DEFAULT_ASPECT_RATIO};
use crate::retry::TimeoutTier;
use crate::validate::{clamp_context, validate_prompt, MAX_CONTEXT_CHARS, MAX_PROMPT_CHARS};
use crate::{normalize, prompts, Artifact, MediaKind};

impl Generator
{   pub(crate) async fn generate_image(
      &self
    , request: &GenerationRequest
    , model: ImageModel
    , aspect_ratio: &str
    ) -> Result<Artifact>
    {   enter(MediaKind::Image, Stage::Validating);
        let prompt = validate_prompt(&request.prompt, MAX_PROMPT_CHARS)?;
        let context = request
          .context_text()
          .map(|c| clamp_context(c, MAX_CONTEXT_CHARS));
        let full_prompt = prompts::image_prompt(
          &prompt, context.as_deref(), request.language
        );
        let model_id = model.model_id();
        info!(
          "Image request: model={}, aspect={}, lang={:?}",
          model_id, aspect_ratio, request.language
        );

        let bytes = match model.family()
        {   ModelFamily::Prediction => {
              let aspect_ratio = match aspect_ratio.trim()
              {   "" => DEFAULT_ASPECT_RATIO
                , a => a
              };
              let payload = serde_json::to_value(
                PredictRequest::image(full_prompt, aspect_ratio)
              )?;
              enter(MediaKind::Image, Stage::Calling);
              let body = self.api.call(
                ProviderCall::post(
                  gemini::predict_endpoint(self.api_base(), model_id),
                  payload
                ).tier(TimeoutTier::Slow)
              ).await?;
              enter(MediaKind::Image, Stage::Normalizing);
              normalize::prediction_image(&body, model_id)?
            }
          , ModelFamily::GenerateContent => {
              let payload = serde_json::to_value(
                content_request(request, full_prompt, aspect_ratio)
              )?;
              enter(MediaKind::Image, Stage::Calling);
              let body = self.api.call(
                ProviderCall::post(
                  gemini::generate_content_endpoint(self.api_base(), model_id),
                  payload
                ).tier(TimeoutTier::Slow)
              ).await?;
              enter(MediaKind::Image, Stage::Normalizing);
              normalize::inline_payload(&body, model_id)?.bytes
            }
        };

        enter(MediaKind::Image, Stage::Assembling);
        Ok(Artifact::new(bytes, MediaKind::Image))
    }
}

/// Text part first, then every image attachment inline
fn content_request(
  request: &GenerationRequest
, full_prompt: String
, aspect_ratio: &str
) -> GenerateContentRequest
{   let mut parts = vec![Part::text(full_prompt)];
    for attachment in request.attachments.iter().filter(|a| a.is_image())
    {   debug!(
          "Attaching {} ({}, {} bytes)",
          attachment.name, attachment.mime_type, attachment.bytes.len()
        );
        parts.push(Part::inline(
          &attachment.mime_type,
          base64::engine::general_purpose::STANDARD.encode(&attachment.bytes)
        ));
    }

    let image_config = Some(aspect_ratio.trim())
      .filter(|a| !a.is_empty())
      .map(|a| ImageConfig { aspect_ratio: a.to_string() });

    GenerateContentRequest
    {   contents: vec![Content::user(parts)]
      , generation_config: Some(GenerationConfig
        {   response_modalities: vec!["TEXT".to_string(), "IMAGE".to_string()]
          , image_config
          , speech_config: None
        })
    }
}
