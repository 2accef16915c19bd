use serde::{Deserialize, Serialize};
use serde_json::Value;
use log::trace;

// ===== Endpoints =====

/// `{base}/models/{model}:{method}`
pub fn model_endpoint(
  api_base: &str
, model_id: &str
, method: &str
) -> String
{   format!(
      "{}/models/{}:{}",
      api_base.trim_end_matches('/'),
      model_id,
      method
    )
}

pub fn predict_endpoint(api_base: &str, model_id: &str) -> String
{   model_endpoint(api_base, model_id, "predict")
}

pub fn generate_content_endpoint(
  api_base: &str
, model_id: &str
) -> String
{   model_endpoint(api_base, model_id, "generateContent")
}

pub fn long_running_endpoint(
  api_base: &str
, model_id: &str
) -> String
{   model_endpoint(api_base, model_id, "predictLongRunning")
}

/// Operation names come back as `models/.../operations/...`
pub fn operation_endpoint(api_base: &str, name: &str) -> String
{   format!(
      "{}/{}",
      api_base.trim_end_matches('/'),
      name.trim_start_matches('/')
    )
}

// ===== Predict (instances/parameters) =====

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictRequest
{   pub instances: Vec<PromptInstance>
  , pub parameters: PredictParameters
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptInstance
{   pub prompt: String
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictParameters
{   pub sample_count: u32
  , pub aspect_ratio: String
}

impl PredictRequest
{   pub fn image(prompt: String, aspect_ratio: &str) -> Self
    {   PredictRequest
        {   instances: vec![PromptInstance { prompt }]
          , parameters: PredictParameters
            {   sample_count: 1
              , aspect_ratio: aspect_ratio.to_string()
            }
        }
    }
}

// ===== Long-running video =====

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoRequest
{   pub instances: Vec<PromptInstance>
  , pub parameters: VideoParameters
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoParameters
{   pub aspect_ratio: String
  , pub duration_seconds: u32
}

// ===== Generate content (contents/generationConfig) =====

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest
{   pub contents: Vec<Content>
  , #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Content
{   #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>
  , #[serde(default)]
    pub parts: Vec<Part>
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part
{   #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>
  , #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<InlineData>
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData
{   #[serde(default)]
    pub mime_type: String
  , #[serde(default)]
    pub data: String
}

impl Part
{   pub fn text(text: impl Into<String>) -> Self
    {   Part
        {   text: Some(text.into())
          , inline_data: None
        }
    }

    pub fn inline(mime_type: &str, data: String) -> Self
    {   Part
        {   text: None
          , inline_data: Some(InlineData
            {   mime_type: mime_type.to_string()
              , data
            })
        }
    }
}

impl Content
{   pub fn user(parts: Vec<Part>) -> Self
    {   Content
        {   role: Some("user".to_string())
          , parts
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig
{   #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub response_modalities: Vec<String>
  , #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_config: Option<ImageConfig>
  , #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speech_config: Option<SpeechConfig>
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageConfig
{   pub aspect_ratio: String
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechConfig
{   #[serde(skip_serializing_if = "Option::is_none")]
    pub voice_config: Option<VoiceConfig>
  , #[serde(skip_serializing_if = "Option::is_none")]
    pub multi_speaker_voice_config: Option<MultiSpeakerVoiceConfig>
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceConfig
{   pub prebuilt_voice_config: PrebuiltVoiceConfig
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrebuiltVoiceConfig
{   pub voice_name: String
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiSpeakerVoiceConfig
{   pub speaker_voice_configs: Vec<SpeakerVoiceConfig>
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeakerVoiceConfig
{   pub speaker: String
  , pub voice_config: VoiceConfig
}

impl VoiceConfig
{   pub fn prebuilt(voice_name: &str) -> Self
    {   VoiceConfig
        {   prebuilt_voice_config: PrebuiltVoiceConfig
            {   voice_name: voice_name.to_string()
            }
        }
    }
}

impl SpeechConfig
{   pub fn single(voice_name: &str) -> Self
    {   SpeechConfig
        {   voice_config: Some(VoiceConfig::prebuilt(voice_name))
          , multi_speaker_voice_config: None
        }
    }

    /// Each `(speaker label, voice name)` pair becomes one entry
    pub fn multi(speakers: &[(&str, &str)]) -> Self
    {   SpeechConfig
        {   voice_config: None
          , multi_speaker_voice_config: Some(MultiSpeakerVoiceConfig
            {   speaker_voice_configs: speakers
                  .iter()
                  .map(|(speaker, voice)| SpeakerVoiceConfig
                  {   speaker: speaker.to_string()
                    , voice_config: VoiceConfig::prebuilt(voice)
                  })
                  .collect()
            })
        }
    }
}

impl GenerateContentRequest
{   /// Plain text prompt, default generation config
    pub fn text(prompt: String) -> Self
    {   GenerateContentRequest
        {   contents: vec![Content::user(vec![Part::text(prompt)])]
          , generation_config: None
        }
    }

    /// Audio-only response spoken with `speech`
    pub fn speech(text: String, speech: SpeechConfig) -> Self
    {   GenerateContentRequest
        {   contents: vec![Content::user(vec![Part::text(text)])]
          , generation_config: Some(GenerationConfig
            {   response_modalities: vec!["AUDIO".to_string()]
              , image_config: None
              , speech_config: Some(speech)
            })
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse
{   #[serde(default)]
    pub candidates: Vec<Candidate>
  , #[serde(default)]
    pub prompt_feedback: Option<PromptFeedback>
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate
{   #[serde(default)]
    pub content: Option<Content>
  , #[serde(default)]
    pub finish_reason: Option<String>
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptFeedback
{   #[serde(default)]
    pub block_reason: Option<String>
}

// ===== Errors =====

#[derive(Debug, Clone, Deserialize)]
struct ErrorEnvelope
{   error: ErrorBody
}

#[derive(Debug, Clone, Deserialize)]
struct ErrorBody
{   #[serde(default)]
    message: String
  , #[serde(default)]
    status: Option<String>
}

/// Human-readable message from a provider error body, falling back
/// to the raw (bounded) text
pub fn error_message(body: &str) -> String
{   match serde_json::from_str::<ErrorEnvelope>(body)
    {   Ok(envelope) => {
          trace!("Provider error status: {:?}", envelope.error.status);
          match envelope.error.status
          {   Some(status) => {
                format!("{} ({})", envelope.error.message, status)
              }
            , None => envelope.error.message
          }
        }
      , Err(_) => body.chars().take(500).collect()
    }
}

/// HTTP status closest to an RPC status code carried by operations
fn rpc_to_http(code: u64) -> u16
{   match code
    {   3 | 9 | 11 => 400
      , 16 => 401
      , 7 => 403
      , 5 => 404
      , 4 => 408
      , 8 => 429
      , 14 => 503
      , c if (400..600).contains(&c) => c as u16
      , _ => 500
    }
}

/// `error` object embedded in a finished operation
pub fn operation_error(operation: &Value) -> Option<(u16, String)>
{   let err = operation.get("error")?;
    let code = err.get("code")
      .and_then(Value::as_u64)
      .map(rpc_to_http)
      .unwrap_or(500);
    let message = err.get("message")
      .and_then(Value::as_str)
      .unwrap_or("operation failed")
      .to_string();
    Some((code, message))
}
