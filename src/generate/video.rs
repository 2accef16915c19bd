use std::time::Duration;
use serde_json::Value;
use log::{debug, info, warn};

use super::{enter, Generator, Stage};
use crate::api::ProviderCall;
use crate::error::{Error, Result};
use crate::models::VIDEO_MODEL_ID;
use crate::normalize::{self, OperationState};
use crate::providers::gemini::{self, PromptInstance, VideoParameters, VideoRequest};
use crate::request::{GenerationRequest, DEFAULT_ASPECT_RATIO};
use crate::retry::TimeoutTier;
use crate::validate::{clamp_context, validate_prompt, MAX_CONTEXT_CHARS, MAX_PROMPT_CHARS};
use crate::{prompts, Artifact, CancelFlag, MediaKind};

const PROGRESS_LOG_EVERY: Duration = Duration::from_secs(60);
const SCRATCH_PREFIX: &str = "amedia-video-";

impl Generator
{   pub(crate) async fn generate_video(
      &self
    , request: &GenerationRequest
    , aspect_ratio: &str
    , duration_secs: u32
    , cancel: &CancelFlag
    ) -> Result<Artifact>
    {   enter(MediaKind::Video, Stage::Validating);
        let prompt = validate_prompt(&request.prompt, MAX_PROMPT_CHARS)?;
        let context = request
          .context_text()
          .map(|c| clamp_context(c, MAX_CONTEXT_CHARS));
        let full_prompt = prompts::video_prompt(
          &prompt, context.as_deref(), request.language
        );
        let aspect_ratio = match aspect_ratio.trim()
        {   "" => DEFAULT_ASPECT_RATIO
          , a => a
        };
        info!(
          "Video request: model={}, aspect={}, {}s",
          VIDEO_MODEL_ID, aspect_ratio, duration_secs
        );

        let payload = serde_json::to_value(VideoRequest
        {   instances: vec![PromptInstance { prompt: full_prompt }]
          , parameters: VideoParameters
            {   aspect_ratio: aspect_ratio.to_string()
              , duration_seconds: duration_secs
            }
        })?;

        enter(MediaKind::Video, Stage::Calling);
        let submitted = self.api.call(
          ProviderCall::post(
            gemini::long_running_endpoint(self.api_base(), VIDEO_MODEL_ID),
            payload
          ).tier(TimeoutTier::Slow)
        ).await?;
        let name = normalize::operation_name(&submitted, VIDEO_MODEL_ID)?;
        info!("Video operation started: {}", name);

        let response = match normalize::operation_state(&submitted)
        {   OperationState::Pending => {
              self.wait_for_operation(&name, cancel).await?
            }
          , state => settle(state)?
        };

        enter(MediaKind::Video, Stage::Normalizing);
        let uri = normalize::video_uri(&response, VIDEO_MODEL_ID)?;

        cancel.check()?;
        enter(MediaKind::Video, Stage::Assembling);
        let bytes = self.materialize(&uri).await?;
        Ok(Artifact::new(bytes, MediaKind::Video))
    }

    /// Poll until the operation is done, fails, or the ceiling is hit.
    /// A `done` response is honored even on the last permitted poll.
    async fn wait_for_operation(
      &self
    , name: &str
    , cancel: &CancelFlag
    ) -> Result<Value>
    {   let poll = &self.config.video;
        let interval = poll.poll_interval().max(Duration::from_millis(1));
        let ceiling = poll.max_wait();
        let endpoint = gemini::operation_endpoint(self.api_base(), name);
        let mut waited = Duration::ZERO;
        let mut next_log = PROGRESS_LOG_EVERY;

        loop
        {   cancel.check()?;
            tokio::time::sleep(interval).await;
            waited += interval;
            cancel.check()?;

            let body = self.api.call(
              ProviderCall::get(endpoint.as_str()).tier(TimeoutTier::Fast)
            ).await?;
            match normalize::operation_state(&body)
            {   OperationState::Pending => {
                  debug!("Video operation pending after {:?}", waited);
                }
              , state => {
                  info!("Video operation finished after {}s", waited.as_secs());
                  return settle(state);
                }
            }

            if waited >= ceiling
            {   warn!("Video operation {} exceeded {}s", name, ceiling.as_secs());
                return Err(Error::TimeoutExceeded
                {   waited_secs: waited.as_secs()
                });
            }
            if waited >= next_log
            {   info!("Video generation in progress... ({}s)", waited.as_secs());
                next_log += PROGRESS_LOG_EVERY;
            }
        }
    }

    /// Download the finished video through a scratch file that is
    /// removed whether or not the download succeeds
    async fn materialize(&self, uri: &str) -> Result<Vec<u8>>
    {   let mut builder = tempfile::Builder::new();
        builder.prefix(SCRATCH_PREFIX).suffix(".mp4");
        let scratch = match &self.config.scratch_dir
        {   Some(dir) => builder.tempfile_in(dir)?
          , None => builder.tempfile()?
        };
        debug!("Downloading video to {}", scratch.path().display());

        let result = async {
          let mut out = tokio::fs::File::from_std(scratch.reopen()?);
          let written = self.api
            .download_into(uri, TimeoutTier::Heavy, &mut out)
            .await?;
          drop(out);
          let bytes = tokio::fs::read(scratch.path()).await?;
          debug!("Video file holds {} of {} bytes written", bytes.len(), written);
          Ok::<_, Error>(bytes)
        }.await;

        if let Err(e) = scratch.close()
        {   warn!("Could not remove scratch video file: {}", e);
        }
        result
    }
}

fn settle(state: OperationState) -> Result<Value>
{   match state
    {   OperationState::Complete(response) => Ok(response)
      , OperationState::Failed { status, message } => {
          Err(Error::PermanentProvider { status, message })
        }
      , OperationState::Pending => Err(Error::Parse(
          "operation still pending".to_string()
        ))
    }
}
