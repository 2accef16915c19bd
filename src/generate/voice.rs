use log::{debug, info};

use super::{enter, Generator, Stage};
use crate::api::ProviderCall;
use crate::audio::AudioSegment;
use crate::error::Result;
use crate::models::VoiceModel;
use crate::providers::gemini::{self, GenerateContentRequest, SpeechConfig};
use crate::request::GenerationRequest;
use crate::retry::TimeoutTier;
use crate::validate::{clamp_context, validate_prompt, MAX_CONTEXT_CHARS, MAX_TTS_TEXT_CHARS};
use crate::{normalize, prompts, Artifact, MediaKind};

impl Generator
{   pub(crate) async fn generate_voice(
      &self
    , request: &GenerationRequest
    , voice: &str
    , model: VoiceModel
    , style_hint: Option<&str>
    ) -> Result<Artifact>
    {   enter(MediaKind::Voice, Stage::Validating);
        let text = validate_prompt(&request.prompt, MAX_TTS_TEXT_CHARS)?;
        let context = request
          .context_text()
          .map(|c| clamp_context(c, MAX_CONTEXT_CHARS));
        let spoken = prompts::voice_text(
          &text, style_hint, context.as_deref(), request.language
        );
        info!(
          "Voice request: model={}, voice={}, {} chars",
          model.model_id(), voice, spoken.chars().count()
        );

        enter(MediaKind::Voice, Stage::Calling);
        let segment = self.synthesize(
          model.model_id(),
          spoken,
          SpeechConfig::single(voice)
        ).await?;

        enter(MediaKind::Voice, Stage::Assembling);
        Ok(Artifact::new(segment.to_wav()?, MediaKind::Voice))
    }

    /// One speech call; returns the decoded PCM with its declared format
    pub(crate) async fn synthesize(
      &self
    , model_id: &str
    , text: String
    , speech: SpeechConfig
    ) -> Result<AudioSegment>
    {   let payload = serde_json::to_value(
          GenerateContentRequest::speech(text, speech)
        )?;
        let body = self.api.call(
          ProviderCall::post(
            gemini::generate_content_endpoint(self.api_base(), model_id),
            payload
          ).tier(TimeoutTier::Slow)
        ).await?;
        let inline = normalize::inline_payload(&body, model_id)?;
        debug!(
          "Speech payload: {} bytes of {}",
          inline.bytes.len(), inline.mime_type
        );
        Ok(AudioSegment::from_inline(inline.bytes, &inline.mime_type))
    }
}
