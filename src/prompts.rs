//! Prompt text composed around the user's input

use crate::request::PodcastLength;
use crate::validate::excerpt;
use crate::OutputLanguage;

/// Content handed to the script model is capped at this many chars
pub const MAX_SCRIPT_SOURCE_CHARS: usize = 15_000;
/// Voice requests only see the start of the context
pub const VOICE_CONTEXT_CHARS: usize = 500;

const NO_ON_SCREEN_TEXT: &str =
  "CRITICAL: Do NOT include any text, titles, subtitles, captions, \
   watermarks, labels, or writing of any kind in the video. The video \
   must be purely visual with no on-screen text whatsoever. ";

/// Prefix asking image models for output in the requested language
pub fn language_instruction(lang: OutputLanguage) -> &'static str
{   match lang
    {   OutputLanguage::Arabic => {
          "IMPORTANT: Generate ALL output in Arabic (العربية). "
        }
      , OutputLanguage::Bilingual => {
          "IMPORTANT: Generate output in both Arabic and English (bilingual). "
        }
      , OutputLanguage::English => ""
    }
}

pub fn image_prompt(
  prompt: &str
, context: Option<&str>
, lang: OutputLanguage
) -> String
{   let prefix = language_instruction(lang);
    match context
    {   Some(ctx) => {
          format!("{}{}\n\n{}", prefix, ctx, prompt).trim().to_string()
        }
      , None => format!("{}{}", prefix, prompt)
    }
}

pub fn video_prompt(
  prompt: &str
, context: Option<&str>
, lang: OutputLanguage
) -> String
{   let audience = match lang
    {   OutputLanguage::Arabic => {
          "Create a video suitable for an Arabic-speaking audience. "
        }
      , OutputLanguage::Bilingual => {
          "Create a video suitable for a bilingual Arabic/English audience. "
        }
      , OutputLanguage::English => ""
    };
    let mut out = format!("{}{}", NO_ON_SCREEN_TEXT, audience);
    if let Some(ctx) = context
    {   out.push_str(ctx);
        out.push_str("\n\n");
    }
    out.push_str(prompt);
    out
}

/// Text sent to single-voice synthesis
pub fn voice_text(
  text: &str
, style_hint: Option<&str>
, context: Option<&str>
, lang: OutputLanguage
) -> String
{   let style = style_hint
      .map(str::trim)
      .filter(|s| !s.is_empty());
    let spoken = match (lang, style)
    {   (OutputLanguage::Arabic, None) => {
          format!("تحدث باللغة العربية بوضوح: {}", text)
        }
      , (OutputLanguage::Arabic, Some(s)) => {
          format!("تحدث باللغة العربية {}: {}", s, text)
        }
      , (OutputLanguage::Bilingual, None) => {
          format!("Speak bilingually (Arabic and English): {}", text)
        }
      , (OutputLanguage::Bilingual, Some(s)) => {
          format!("Say {}, bilingually: {}", s, text)
        }
      , (OutputLanguage::English, Some(s)) => format!("Say {}: {}", s, text)
      , (OutputLanguage::English, None) => text.to_string()
    };
    match context
    {   Some(ctx) => {
          format!("[Context: {}]\n\n{}", excerpt(ctx, VOICE_CONTEXT_CHARS), spoken)
        }
      , None => spoken
    }
}

/// Instruction for the script model
pub fn podcast_script_prompt(
  source: &str
, length: PodcastLength
, lang: OutputLanguage
) -> String
{   let target = length.target_words();
    let source = excerpt(source, MAX_SCRIPT_SOURCE_CHARS);
    match lang
    {   OutputLanguage::Arabic => format!(
          "أنت كاتب سيناريو بودكاست محترف. أنشئ سيناريو بودكاست جذاب وطبيعي باللغة العربية الفصحى.\n\n\
           المتطلبات:\n\
           - الطول المستهدف: {} كلمة فقط (لا تتجاوز هذا الحد)\n\
           - متحدثان: Host و Guest\n\
           - صيغة كل سطر: Host: [الحوار] أو Guest: [الحوار]\n\
           - اكتب الحوار بالعربية لكن استخدم Host و Guest كأسماء المتحدثين\n\
           - ابدأ بمقدمة واختم بملخص\n\n\
           المحتوى:\n{}\n",
          target, source
        )
      , OutputLanguage::Bilingual => format!(
          "Create a SHORT bilingual podcast script (Arabic + English mixed).\n\n\
           Rules:\n\
           - STRICT limit: {} words total. Do NOT exceed this.\n\
           - Two speakers: Host and Guest\n\
           - Format: Host: [dialogue] or Guest: [dialogue]\n\
           - Mix Arabic and English naturally\n\
           - Open with intro, close with summary\n\n\
           Content:\n{}\n",
          target, source
        )
      , OutputLanguage::English => format!(
          "Create a SHORT podcast script based on this content.\n\n\
           Rules:\n\
           - STRICT limit: {} words total. Do NOT exceed this.\n\
           - Two speakers: Host and Guest\n\
           - Format: Host: [dialogue] or Guest: [dialogue]\n\
           - Conversational, engaging\n\
           - Open with intro, close with summary\n\n\
           Content:\n{}\n",
          target, source
        )
    }
}

/// Text for one multi-speaker synthesis call
pub fn podcast_chunk_text(chunk: &str) -> String
{   format!("Read this podcast dialogue naturally:\n\n{}", chunk)
}
