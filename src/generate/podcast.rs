use log::{info, warn};

use super::{enter, Generator, Stage};
use crate::api::ProviderCall;
use crate::audio;
use crate::error::{Error, Result};
use crate::models::{VoiceModel, PODCAST_SCRIPT_MODEL_ID};
use crate::providers::gemini::{self, GenerateContentRequest, SpeechConfig};
use crate::request::{GenerationRequest, PodcastLength};
use crate::retry::TimeoutTier;
use crate::script::{self, Speaker, MAX_SCRIPT_WORDS, WORDS_PER_CHUNK};
use crate::validate::{clamp_context, validate_prompt, MAX_CONTEXT_CHARS, MAX_PROMPT_CHARS};
use crate::{normalize, prompts, Artifact, CancelFlag, MediaKind};

impl Generator
{   /// Script first, then one multi-speaker call per chunk
    pub(crate) async fn generate_podcast(
      &self
    , request: &GenerationRequest
    , length: PodcastLength
    , voice_host: &str
    , voice_guest: &str
    , cancel: &CancelFlag
    ) -> Result<Artifact>
    {   enter(MediaKind::Podcast, Stage::Validating);
        let prompt = validate_prompt(&request.prompt, MAX_PROMPT_CHARS)?;
        let source = match request.context_text()
        {   Some(ctx) => format!(
              "{}\n\n---\n\n{}",
              clamp_context(ctx, MAX_CONTEXT_CHARS),
              prompt
            )
          , None => prompt
        };

        enter(MediaKind::Podcast, Stage::Calling);
        let script = self.write_script(&source, length, request).await?;
        info!(
          "Podcast script ready: {} words, host={}, guest={}",
          script.split_whitespace().count(), voice_host, voice_guest
        );

        cancel.check()?;
        let wav = self.synthesize_dialogue(
          &script, voice_host, voice_guest, cancel
        ).await?;
        Ok(Artifact::new(wav, MediaKind::Podcast))
    }

    /// Ask the script model for a two-speaker dialogue, then
    /// canonicalize labels and enforce the word ceiling
    async fn write_script(
      &self
    , source: &str
    , length: PodcastLength
    , request: &GenerationRequest
    ) -> Result<String>
    {   let instruction = prompts::podcast_script_prompt(
          source, length, request.language
        );
        let payload = serde_json::to_value(
          GenerateContentRequest::text(instruction)
        )?;
        let body = self.api.call(
          ProviderCall::post(
            gemini::generate_content_endpoint(
              self.api_base(), PODCAST_SCRIPT_MODEL_ID
            ),
            payload
          ).tier(TimeoutTier::Slow)
        ).await?;

        enter(MediaKind::Podcast, Stage::Normalizing);
        let raw = normalize::text_content(&body, PODCAST_SCRIPT_MODEL_ID)?;
        let labelled = script::canonicalize_labels(&raw);
        Ok(script::truncate_words(&labelled, MAX_SCRIPT_WORDS))
    }

    /// Synthesize each chunk in order and join the survivors. Failed
    /// chunks are dropped; if none survive the whole request fails.
    pub(crate) async fn synthesize_dialogue(
      &self
    , script: &str
    , voice_host: &str
    , voice_guest: &str
    , cancel: &CancelFlag
    ) -> Result<Vec<u8>>
    {   let chunks = script::chunk(script, WORDS_PER_CHUNK);
        let total = chunks.len();
        let model_id = VoiceModel::Flash.model_id();
        let speakers = [
          (Speaker::Host.label(), voice_host),
          (Speaker::Guest.label(), voice_guest),
        ];

        let mut segments = Vec::with_capacity(total);
        let mut last_failure = String::from("no chunks to synthesize");
        for (index, chunk) in chunks.iter().enumerate()
        {   cancel.check()?;
            info!(
              "TTS chunk {}/{} ({} words)",
              index + 1, total, chunk.words
            );
            let synthesized = self.synthesize(
              model_id,
              prompts::podcast_chunk_text(&chunk.text()),
              SpeechConfig::multi(&speakers)
            ).await;
            match synthesized.and_then(|segment| segment.to_wav())
            {   Ok(wav) => segments.push(wav)
              , Err(e) => {
                  warn!("Dropping TTS chunk {}/{}: {}", index + 1, total, e);
                  last_failure = e.to_string();
                }
            }
        }

        if segments.is_empty()
        {   return Err(Error::AllChunksFailed
            {   chunks: total
              , last: last_failure
            });
        }
        if segments.len() < total
        {   warn!(
              "Podcast assembled from {} of {} chunks",
              segments.len(), total
            );
        }

        enter(MediaKind::Podcast, Stage::Assembling);
        audio::concatenate(segments)
    }
}
