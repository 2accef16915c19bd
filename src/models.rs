//! Fixed model lookup table

use serde::{Deserialize, Serialize};

pub const VIDEO_MODEL_ID: &str = "veo-3.1-generate-preview";
pub const PODCAST_SCRIPT_MODEL_ID: &str = "gemini-3-flash-preview";

/// Which endpoint family a model speaks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelFamily
{   /// `{instances, parameters}` → `{predictions}`
    Prediction
  , /// `{contents, generationConfig}` → `{candidates}`
    GenerateContent
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageModel
{   #[default]
    ImagenFast
  , Imagen
  , ImagenUltra
  , NanoBanana
  , NanoBananaPro
}

impl ImageModel
{   /// Unknown keys fall back to `imagen_fast`
    pub fn from_key(key: &str) -> Self
    {   match key
        {   "imagen" => ImageModel::Imagen
          , "imagen_ultra" => ImageModel::ImagenUltra
          , "nano_banana" => ImageModel::NanoBanana
          , "nano_banana_pro" => ImageModel::NanoBananaPro
          , _ => ImageModel::ImagenFast
        }
    }

    pub fn model_id(&self) -> &'static str
    {   match self
        {   ImageModel::ImagenFast => "imagen-4.0-fast-generate-001"
          , ImageModel::Imagen => "imagen-4.0-generate-001"
          , ImageModel::ImagenUltra => "imagen-4.0-ultra-generate-001"
          , ImageModel::NanoBanana => "gemini-2.5-flash-image"
          , ImageModel::NanoBananaPro => "gemini-3-pro-image-preview"
        }
    }

    pub fn family(&self) -> ModelFamily
    {   match self
        {   ImageModel::ImagenFast
          | ImageModel::Imagen
          | ImageModel::ImagenUltra => ModelFamily::Prediction
          , ImageModel::NanoBanana
          | ImageModel::NanoBananaPro => ModelFamily::GenerateContent
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VoiceModel
{   #[default]
    Flash
  , Pro
}

impl VoiceModel
{   pub fn from_key(key: &str) -> Self
    {   match key
        {   "pro" => VoiceModel::Pro
          , _ => VoiceModel::Flash
        }
    }

    pub fn model_id(&self) -> &'static str
    {   match self
        {   VoiceModel::Flash => "gemini-2.5-flash-preview-tts"
          , VoiceModel::Pro => "gemini-2.5-pro-preview-tts"
        }
    }
}

#[cfg(test)]
mod tests
{   use super::*;

    #[test]
    fn unknown_keys_fall_back()
    {   assert_eq!(ImageModel::from_key("dall-e"), ImageModel::ImagenFast);
        assert_eq!(VoiceModel::from_key("ultra"), VoiceModel::Flash);
    }

    #[test]
    fn families_split_on_model_line()
    {   assert_eq!(ImageModel::ImagenUltra.family(), ModelFamily::Prediction);
        assert_eq!(ImageModel::NanoBanana.family(), ModelFamily::GenerateContent);
        assert_eq!(
          ImageModel::from_key("imagen_fast").model_id(),
          "imagen-4.0-fast-generate-001"
        );
    }
}
