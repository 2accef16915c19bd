//! Pull generated payloads out of provider responses.
//!
//! Prediction endpoints have moved the image bytes between versions, so
//! extraction there is an ordered list of strategies tried in turn.
//! Generate-content endpoints return a list of parts; the first part
//! carrying inline data wins.

use base64::Engine;
use serde::Deserialize;
use serde_json::Value;
use log::{debug, warn};

use crate::error::{Error, Result};
use crate::providers::gemini::GenerateContentResponse;

/// Finish reasons that mean the provider withheld the output
const BLOCKING_FINISH_REASONS: &[&str] = &[
  "SAFETY",
  "PROHIBITED_CONTENT",
  "BLOCKLIST",
  "IMAGE_SAFETY",
  "SPII",
];

/// One way of locating base64 data inside a prediction
#[derive(Clone, Copy)]
pub struct ExtractionStrategy
{   pub name: &'static str
  , pub extract: fn(&Value) -> Option<&str>
}

fn extract_bytes_base64(p: &Value) -> Option<&str>
{   p.get("bytesBase64Encoded").and_then(Value::as_str)
}

fn extract_b64_json(p: &Value) -> Option<&str>
{   p.get("b64_json").and_then(Value::as_str)
}

fn extract_nested_image(p: &Value) -> Option<&str>
{   p.get("image")
      .filter(|img| img.is_object())
      .and_then(|img| img.get("bytesBase64Encoded"))
      .and_then(Value::as_str)
}

/// Tried in order against `predictions[0]`
pub const PREDICTION_STRATEGIES: &[ExtractionStrategy] = &[
  ExtractionStrategy { name: "bytesBase64Encoded", extract: extract_bytes_base64 },
  ExtractionStrategy { name: "b64_json", extract: extract_b64_json },
  ExtractionStrategy { name: "image.bytesBase64Encoded", extract: extract_nested_image },
];

fn no_artifact(model: &str, detail: &str) -> Error
{   Error::NoArtifact
    {   model: model.to_string()
      , detail: detail.to_string()
    }
}

/// Decode standard base64, mapping failure to `NoArtifact`
pub fn decode_base64(model: &str, data: &str) -> Result<Vec<u8>>
{   base64::engine::general_purpose::STANDARD
      .decode(data.trim())
      .map_err(|e| {
        warn!("Malformed base64 from {}: {}", model, e);
        no_artifact(model, "response data could not be decoded")
      })
}

/// Image bytes from a `{predictions}` response
pub fn prediction_image(body: &Value, model: &str) -> Result<Vec<u8>>
{   let first = body.get("predictions")
      .and_then(Value::as_array)
      .and_then(|preds| preds.first())
      .ok_or_else(|| {
        no_artifact(model, "No image returned. Try a different prompt or model.")
      })?;

    for strategy in PREDICTION_STRATEGIES
    {   if let Some(data) = (strategy.extract)(first).filter(|d| !d.is_empty())
        {   debug!("Prediction payload found under {}", strategy.name);
            return decode_base64(model, data);
        }
    }

    if let Some(reason) = first.get("raiFilteredReason").and_then(Value::as_str)
    {   return Err(Error::Blocked(reason.to_string()));
    }
    Err(no_artifact(model, "Could not extract image data. Try a different model."))
}

/// First inline payload of a generate-content response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlinePayload
{   pub mime_type: String
  , pub bytes: Vec<u8>
}

fn parse_content(body: &Value) -> Result<GenerateContentResponse>
{   GenerateContentResponse::deserialize(body)
      .map_err(|e| Error::Parse(e.to_string()))
}

fn blocked_reason(response: &GenerateContentResponse) -> Option<String>
{   if let Some(reason) = response.prompt_feedback
      .as_ref()
      .and_then(|f| f.block_reason.clone())
    {   return Some(reason);
    }
    response.candidates
      .first()
      .and_then(|c| c.finish_reason.clone())
      .filter(|r| BLOCKING_FINISH_REASONS.contains(&r.as_str()))
}

/// Scan the first candidate's parts for inline data, skipping text
pub fn inline_payload(body: &Value, model: &str) -> Result<InlinePayload>
{   let response = parse_content(body)?;
    let parts = response.candidates
      .first()
      .and_then(|c| c.content.as_ref())
      .map(|c| c.parts.as_slice())
      .unwrap_or(&[]);

    for part in parts
    {   if let Some(inline) = part.inline_data
          .as_ref()
          .filter(|d| !d.data.is_empty())
        {   let bytes = decode_base64(model, &inline.data)?;
            return Ok(InlinePayload
            {   mime_type: inline.mime_type.clone()
              , bytes
            });
        }
    }

    match blocked_reason(&response)
    {   Some(reason) => Err(Error::Blocked(reason))
      , None => Err(no_artifact(model, "response contained no inline data"))
    }
}

/// Concatenated text parts of the first candidate
pub fn text_content(body: &Value, model: &str) -> Result<String>
{   let response = parse_content(body)?;
    let text: String = response.candidates
      .first()
      .and_then(|c| c.content.as_ref())
      .map(|c| {
        c.parts.iter()
          .filter_map(|p| p.text.as_deref())
          .collect::<String>()
      })
      .unwrap_or_default();

    if text.trim().is_empty()
    {   return match blocked_reason(&response)
        {   Some(reason) => Err(Error::Blocked(reason))
          , None => Err(no_artifact(model, "Script generation returned empty result."))
        };
    }
    Ok(text)
}

/// Where a long-running operation stands
#[derive(Debug, Clone, PartialEq)]
pub enum OperationState
{   Pending
  , Failed
    {   status: u16
      , message: String
    }
  , Complete(Value)
}

/// Name of a freshly submitted operation
pub fn operation_name(body: &Value, model: &str) -> Result<String>
{   body.get("name")
      .and_then(Value::as_str)
      .filter(|n| !n.is_empty())
      .map(str::to_string)
      .ok_or_else(|| no_artifact(model, "no operation handle returned"))
}

pub fn operation_state(body: &Value) -> OperationState
{   let done = body.get("done").and_then(Value::as_bool).unwrap_or(false);
    if !done
    {   return OperationState::Pending;
    }
    if let Some((status, message))
      = crate::providers::gemini::operation_error(body)
    {   return OperationState::Failed { status, message };
    }
    OperationState::Complete(
      body.get("response").cloned().unwrap_or(Value::Null)
    )
}

const VIDEO_URI_PATHS: &[&str] = &[
  "/generateVideoResponse/generatedSamples/0/video/uri",
  "/generatedVideos/0/video/uri",
];

/// Remote file handle of the first generated video
pub fn video_uri(response: &Value, model: &str) -> Result<String>
{   for path in VIDEO_URI_PATHS
    {   if let Some(uri) = response.pointer(path)
          .and_then(Value::as_str)
          .filter(|u| !u.is_empty())
        {   return Ok(uri.to_string());
        }
    }

    let filtered = response
      .pointer("/generateVideoResponse/raiMediaFilteredReasons/0")
      .and_then(Value::as_str);
    match filtered
    {   Some(reason) => Err(Error::Blocked(reason.to_string()))
      , None => Err(no_artifact(model, "operation finished without a video"))
    }
}
