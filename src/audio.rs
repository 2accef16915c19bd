//! WAV assembly for synthesized speech.
//!
//! Providers return raw little-endian 16-bit PCM. Each buffer is wrapped
//! in a WAV container so it plays on its own; podcast segments are then
//! concatenated into a single container without resampling.

use std::io::Cursor;
use log::{debug, warn};

use crate::error::{Error, Result};

pub const DEFAULT_SAMPLE_RATE: u32 = 24_000;
pub const DEFAULT_CHANNELS: u16 = 1;
const BITS_PER_SAMPLE: u16 = 16;

/// One decoded PCM buffer from a single synthesis call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioSegment
{   pub pcm: Vec<u8>
  , pub sample_rate: u32
  , pub channels: u16
}

impl AudioSegment
{   pub fn new(pcm: Vec<u8>, sample_rate: u32, channels: u16) -> Self
    {   AudioSegment
        {   pcm
          , sample_rate
          , channels
        }
    }

    /// Segment whose format is read from an inline MIME type such as
    /// `audio/L16;codec=pcm;rate=24000`
    pub fn from_inline(pcm: Vec<u8>, mime_type: &str) -> Self
    {   let sample_rate = mime_param(mime_type, "rate")
          .and_then(|v| v.parse::<u32>().ok())
          .filter(|r| *r > 0)
          .unwrap_or(DEFAULT_SAMPLE_RATE);
        let channels = mime_param(mime_type, "channels")
          .and_then(|v| v.parse::<u16>().ok())
          .filter(|c| *c > 0)
          .unwrap_or(DEFAULT_CHANNELS);
        AudioSegment::new(pcm, sample_rate, channels)
    }

    pub fn to_wav(&self) -> Result<Vec<u8>>
    {   pcm_to_wav(&self.pcm, self.sample_rate, self.channels)
    }
}

fn mime_param<'a>(mime_type: &'a str, name: &str) -> Option<&'a str>
{   mime_type
      .split(';')
      .skip(1)
      .filter_map(|p| p.split_once('='))
      .find(|(k, _)| k.trim().eq_ignore_ascii_case(name))
      .map(|(_, v)| v.trim())
}

fn wav_spec(sample_rate: u32, channels: u16) -> hound::WavSpec
{   hound::WavSpec
    {   channels
      , sample_rate
      , bits_per_sample: BITS_PER_SAMPLE
      , sample_format: hound::SampleFormat::Int
    }
}

fn write_wav<I>(spec: hound::WavSpec, samples: I) -> Result<Vec<u8>>
where
  I: IntoIterator<Item = i16>
{   let mut out = Vec::new();
    {   let mut writer = hound::WavWriter::new(
          Cursor::new(&mut out),
          spec
        )?;
        for sample in samples
        {   writer.write_sample(sample)?;
        }
        writer.finalize()?;
    }
    Ok(out)
}

/// Wrap raw LE 16-bit PCM in a WAV header
pub fn pcm_to_wav(
  pcm: &[u8]
, sample_rate: u32
, channels: u16
) -> Result<Vec<u8>>
{   if channels == 0 || sample_rate == 0
    {   return Err(Error::Audio(format!(
          "invalid format: {} Hz, {} channels",
          sample_rate, channels
        )));
    }

    let frame_bytes = 2 * channels as usize;
    let usable = pcm.len() - pcm.len() % frame_bytes;
    if usable != pcm.len()
    {   warn!(
          "Dropping {} trailing PCM bytes (partial frame)",
          pcm.len() - usable
        );
    }

    let samples = pcm[..usable]
      .chunks_exact(2)
      .map(|b| i16::from_le_bytes([b[0], b[1]]));
    write_wav(wav_spec(sample_rate, channels), samples)
}

/// Concatenate WAV containers in order, re-wrapped once with the first
/// segment's parameters. A single segment is returned untouched.
pub fn concatenate(mut segments: Vec<Vec<u8>>) -> Result<Vec<u8>>
{   if segments.len() == 1
    {   return Ok(segments.remove(0));
    }
    if segments.is_empty()
    {   return Err(Error::Audio("no segments to concatenate".to_string()));
    }

    let mut spec: Option<hound::WavSpec> = None;
    let mut samples: Vec<i16> = Vec::new();
    for (i, bytes) in segments.iter().enumerate()
    {   let mut reader = hound::WavReader::new(Cursor::new(bytes))?;
        let segment_spec = reader.spec();
        match spec
        {   None => {
              if segment_spec.bits_per_sample != BITS_PER_SAMPLE
                || segment_spec.sample_format != hound::SampleFormat::Int
              {   return Err(Error::Audio(format!(
                    "segment 0 is not 16-bit PCM ({} bits)",
                    segment_spec.bits_per_sample
                  )));
              }
              spec = Some(segment_spec);
            }
          , Some(first) if first != segment_spec => {
              return Err(Error::Audio(format!(
                "segment {} format {:?} differs from {:?}",
                i, segment_spec, first
              )));
            }
          , Some(_) => {}
        }
        for sample in reader.samples::<i16>()
        {   samples.push(sample?);
        }
    }

    let spec = spec.ok_or_else(|| {
      Error::Audio("no segments to concatenate".to_string())
    })?;
    debug!(
      "Concatenated {} segments into {} samples",
      segments.len(), samples.len()
    );
    write_wav(spec, samples)
}

#[cfg(test)]
mod tests
{   use super::*;

    fn pcm(samples: &[i16]) -> Vec<u8>
    {   samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    fn frames(wav: &[u8]) -> Vec<i16>
    {   hound::WavReader::new(Cursor::new(wav))
          .unwrap()
          .samples::<i16>()
          .map(|s| s.unwrap())
          .collect()
    }

    #[test]
    fn pcm_round_trips_through_header()
    {   let wav = pcm_to_wav(&pcm(&[1, -2, 300]), 24_000, 1).unwrap();
        assert_eq!(&wav[..4], b"RIFF");
        assert_eq!(wav.len(), 44 + 6);
        let reader = hound::WavReader::new(Cursor::new(&wav)).unwrap();
        assert_eq!(reader.spec().sample_rate, 24_000);
        assert_eq!(reader.spec().channels, 1);
        assert_eq!(frames(&wav), vec![1, -2, 300]);
    }

    #[test]
    fn partial_frame_is_dropped()
    {   let mut bytes = pcm(&[7, 8]);
        bytes.push(0xff);
        let wav = pcm_to_wav(&bytes, 16_000, 1).unwrap();
        assert_eq!(frames(&wav), vec![7, 8]);
    }

    #[test]
    fn single_segment_is_byte_identical()
    {   let wav = pcm_to_wav(&pcm(&[5, 6, 7]), 24_000, 1).unwrap();
        let out = concatenate(vec![wav.clone()]).unwrap();
        assert_eq!(out, wav);
    }

    #[test]
    fn concatenation_is_associative_in_frames()
    {   let a = pcm_to_wav(&pcm(&[1, 2]), 24_000, 1).unwrap();
        let b = pcm_to_wav(&pcm(&[3]), 24_000, 1).unwrap();
        let c = pcm_to_wav(&pcm(&[4, 5, 6]), 24_000, 1).unwrap();

        let flat = concatenate(vec![a.clone(), b.clone(), c.clone()])
          .unwrap();
        let ab = concatenate(vec![a, b]).unwrap();
        let nested = concatenate(vec![ab, c]).unwrap();

        assert_eq!(frames(&flat), vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(frames(&flat), frames(&nested));
        assert_eq!(flat.len(), 44 + 12);
    }

    #[test]
    fn mismatched_sample_rates_are_rejected()
    {   let a = pcm_to_wav(&pcm(&[1]), 24_000, 1).unwrap();
        let b = pcm_to_wav(&pcm(&[1]), 16_000, 1).unwrap();
        assert!(matches!(concatenate(vec![a, b]), Err(Error::Audio(_))));
    }

    #[test]
    fn empty_input_is_an_error()
    {   assert!(concatenate(vec![]).is_err());
    }

    #[test]
    fn inline_mime_sets_rate()
    {   let seg = AudioSegment::from_inline(
          vec![],
          "audio/L16;codec=pcm;rate=16000"
        );
        assert_eq!(seg.sample_rate, 16_000);
        assert_eq!(seg.channels, 1);
        let seg = AudioSegment::from_inline(vec![], "audio/pcm");
        assert_eq!(seg.sample_rate, DEFAULT_SAMPLE_RATE);
    }
}
