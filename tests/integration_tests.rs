use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use base64::Engine;
use serde_json::{json, Value};
use tokio::io::AsyncReadExt;
use tokio_test::{assert_err, assert_ok};
use wiremock::matchers::{
  body_partial_json, body_string_contains, method, path, query_param
};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

use amedia::api::{ApiClient, ProviderCall};
use amedia::config::{RetryConfig, TimeoutConfig, VideoPollConfig};
use amedia::models::{ImageModel, VoiceModel};
use amedia::request::PodcastLength;
use amedia::{
  CancelFlag, Error, FailureCategory, GenerationRequest, Generator
, GeneratorConfig, MediaBackend, MediaKind, MediaOptions
};

const TEST_KEY: &str = "test-secret-key";
const TTS_FLASH: &str = "/models/gemini-2.5-flash-preview-tts:generateContent";
const SCRIPT_MODEL: &str = "/models/gemini-3-flash-preview:generateContent";
const PCM_PER_CHUNK: usize = 4_800;

/// Fast budgets so retry and polling paths finish in milliseconds
fn test_config(api_base: &str) -> GeneratorConfig
{   let mut config = GeneratorConfig::with_api_key(TEST_KEY);
    config.api_base = api_base.to_string();
    config.timeouts = TimeoutConfig
    {   connect_ms: 1_000
      , fast_ms: 2_000
      , slow_ms: 2_000
      , heavy_ms: 2_000
    };
    config.retry = RetryConfig
    {   max_retries: 2
      , backoff_step_ms: 10
    };
    config.video = VideoPollConfig
    {   poll_interval_ms: 10
      , max_wait_ms: 2_000
    };
    config
}

fn generator(server: &MockServer) -> Generator
{   Generator::new(Arc::new(test_config(&server.uri())))
      .expect("test config is valid")
}

fn b64(bytes: &[u8]) -> String
{   base64::engine::general_purpose::STANDARD.encode(bytes)
}

fn speech_body(pcm: &[u8]) -> Value
{   json!({"candidates": [{"content": {"role": "model", "parts": [{
      "inlineData": {
        "mimeType": "audio/L16;codec=pcm;rate=24000",
        "data": b64(pcm)
      }
    }]}}]})
}

fn text_body(text: &str) -> Value
{   json!({"candidates": [{"content": {"role": "model", "parts": [{
      "text": text
    }]}}]})
}

/// `lines` 50-word lines; the last one carries `FINALE`
fn dialogue(lines: usize) -> String
{   (0..lines)
      .map(|i| {
        let speaker = if i % 2 == 0 { "Host" } else { "Guest" };
        let tag = if i + 1 == lines { "FINALE".to_string() } else { format!("part{}", i) };
        format!("{}: {} {}", speaker, tag, vec!["lorem"; 48].join(" "))
      })
      .collect::<Vec<_>>()
      .join("\n")
}

/// Answers normally but trips the cancel flag while doing so
struct CancelWhileAnswering
{   cancel: CancelFlag
  , body: Value
}

impl Respond for CancelWhileAnswering
{   fn respond(&self, _request: &Request) -> ResponseTemplate
    {   self.cancel.cancel();
        ResponseTemplate::new(200).set_body_json(self.body.clone())
    }
}

// ===== Resilient client =====

#[tokio::test]
async fn test_read_timeouts_are_retried_until_success()
{   let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/models/m:predict"))
      .respond_with(
        ResponseTemplate::new(200)
          .set_body_json(json!({"late": true}))
          .set_delay(std::time::Duration::from_millis(1_000))
      )
      .up_to_n_times(2)
      .expect(2)
      .mount(&server)
      .await;
    Mock::given(method("POST"))
      .and(path("/models/m:predict"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
      .expect(1)
      .mount(&server)
      .await;

    let mut config = test_config(&server.uri());
    config.timeouts.slow_ms = 200;
    let client = ApiClient::new(Arc::new(config)).unwrap();
    let body = assert_ok!(client.call(ProviderCall::post(
      format!("{}/models/m:predict", server.uri()),
      json!({})
    )).await);
    assert_eq!(body, json!({"ok": true}));
}

#[tokio::test]
async fn test_connection_refused_exhausts_retries()
{   let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let base = format!("http://127.0.0.1:{}", port);
    let client = ApiClient::new(Arc::new(test_config(&base))).unwrap();
    let err = assert_err!(client.call(ProviderCall::post(
      format!("{}/models/m:predict", base),
      json!({})
    )).await);
    match err
    {   Error::TransientProvider { attempts, status, last } => {
          assert_eq!(attempts, 3);
          assert_eq!(status, None);
          assert!(!last.contains(TEST_KEY));
        }
      , other => panic!("unexpected error: {:?}", other)
    }
}

#[tokio::test]
async fn test_dropped_connections_are_retried()
{   let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let accepted = Arc::new(AtomicUsize::new(0));
    let counter = accepted.clone();
    tokio::spawn(async move {
      loop
      {   let (mut stream, _) = match listener.accept().await
          {   Ok(conn) => conn
            , Err(_) => break
          };
          counter.fetch_add(1, Ordering::SeqCst);
          let mut buf = [0u8; 4096];
          let _ = stream.read(&mut buf).await;
          drop(stream);
      }
    });

    let client = ApiClient::new(Arc::new(test_config(&base))).unwrap();
    let err = assert_err!(client.call(ProviderCall::post(
      format!("{}/models/m:predict", base),
      json!({})
    )).await);
    assert!(
      matches!(err, Error::TransientProvider { attempts: 3, status: None, .. }),
      "unexpected error: {:?}", err
    );
    assert_eq!(accepted.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_client_errors_are_not_retried()
{   let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/models/m:predict"))
      .respond_with(ResponseTemplate::new(403).set_body_json(json!({
        "error": {"code": 403, "message": "denied", "status": "PERMISSION_DENIED"}
      })))
      .expect(1)
      .mount(&server)
      .await;

    let client = ApiClient::new(Arc::new(test_config(&server.uri()))).unwrap();
    let err = assert_err!(client.call(ProviderCall::post(
      format!("{}/models/m:predict", server.uri()),
      json!({})
    )).await);
    assert_eq!(err, Error::PermanentProvider
    {   status: 403
      , message: "denied (PERMISSION_DENIED)".to_string()
    });
}

#[tokio::test]
async fn test_server_errors_spend_the_retry_budget()
{   let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/models/m/operations/1"))
      .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
      .expect(3)
      .mount(&server)
      .await;

    let client = ApiClient::new(Arc::new(test_config(&server.uri()))).unwrap();
    let err = assert_err!(client.call(ProviderCall::get(
      format!("{}/models/m/operations/1", server.uri())
    )).await);
    assert!(matches!(
      err,
      Error::TransientProvider { attempts: 3, status: Some(503), .. }
    ));
}

// ===== Image =====

#[tokio::test]
async fn test_imagen_fast_default_aspect()
{   let server = MockServer::start().await;
    let png = [0x89u8, b'P', b'N', b'G', 0, 1, 2];
    Mock::given(method("POST"))
      .and(path("/models/imagen-4.0-fast-generate-001:predict"))
      .and(query_param("key", TEST_KEY))
      .and(body_partial_json(json!({
        "parameters": {"sampleCount": 1, "aspectRatio": "16:9"}
      })))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({
        "predictions": [{"bytesBase64Encoded": b64(&png)}]
      })))
      .expect(1)
      .mount(&server)
      .await;

    let request = GenerationRequest::new("Poster about Jubail", MediaOptions::image());
    let artifact = assert_ok!(
      generator(&server).generate(&request, &CancelFlag::new()).await
    );
    assert_eq!(artifact.bytes, png.to_vec());
    assert_eq!(artifact.mime_type(), "image/png");
}

#[tokio::test]
async fn test_generate_content_image_with_attachment()
{   let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/models/gemini-2.5-flash-image:generateContent"))
      .and(body_partial_json(json!({
        "generationConfig": {
          "responseModalities": ["TEXT", "IMAGE"],
          "imageConfig": {"aspectRatio": "1:1"}
        }
      })))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({
        "candidates": [{"content": {"parts": [
          {"text": "here you go"},
          {"inlineData": {"mimeType": "image/png", "data": b64(b"img")}}
        ]}}]
      })))
      .expect(1)
      .mount(&server)
      .await;

    let request = GenerationRequest::new("Redraw this", MediaOptions::Image
      {   model: ImageModel::NanoBanana
        , aspect_ratio: "1:1".to_string()
      })
      .with_attachment(amedia::request::Attachment
      {   name: "ref.png".to_string()
        , mime_type: "image/png".to_string()
        , bytes: vec![1, 2, 3]
      });
    let artifact = assert_ok!(
      generator(&server).generate(&request, &CancelFlag::new()).await
    );
    assert_eq!(artifact.bytes, b"img".to_vec());
}

#[tokio::test]
async fn test_filtered_prediction_is_blocked()
{   let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/models/imagen-4.0-generate-001:predict"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({
        "predictions": [{"raiFilteredReason": "unsafe"}]
      })))
      .mount(&server)
      .await;

    let request = GenerationRequest::new("x", MediaOptions::Image
    {   model: ImageModel::Imagen
      , aspect_ratio: "16:9".to_string()
    });
    let err = assert_err!(
      generator(&server).generate(&request, &CancelFlag::new()).await
    );
    assert_eq!(err, Error::Blocked("unsafe".to_string()));
}

#[tokio::test]
async fn test_empty_prompt_never_reaches_provider()
{   let server = MockServer::start().await;
    Mock::given(method("POST"))
      .respond_with(ResponseTemplate::new(200))
      .expect(0)
      .mount(&server)
      .await;

    let request = GenerationRequest::new("   \n", MediaOptions::image());
    let err = assert_err!(
      generator(&server).generate(&request, &CancelFlag::new()).await
    );
    assert!(matches!(err, Error::Validation(_)));
}

// ===== Voice =====

#[tokio::test]
async fn test_voice_wraps_pcm_in_wav()
{   let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/models/gemini-2.5-pro-preview-tts:generateContent"))
      .and(body_partial_json(json!({
        "generationConfig": {
          "responseModalities": ["AUDIO"],
          "speechConfig": {"voiceConfig": {"prebuiltVoiceConfig": {"voiceName": "Charon"}}}
        }
      })))
      .respond_with(ResponseTemplate::new(200).set_body_json(speech_body(&[0u8; 480])))
      .expect(1)
      .mount(&server)
      .await;

    let request = GenerationRequest::new("Welcome aboard", MediaOptions::Voice
    {   voice: "Charon".to_string()
      , model: VoiceModel::Pro
      , style_hint: Some("cheerfully".to_string())
    });
    let artifact = assert_ok!(
      generator(&server).generate(&request, &CancelFlag::new()).await
    );
    assert_eq!(artifact.kind, MediaKind::Voice);
    assert_eq!(artifact.bytes.len(), 480 + 44);
    assert_eq!(&artifact.bytes[..4], b"RIFF");
}

// ===== Podcast =====

fn podcast_request() -> GenerationRequest
{   GenerationRequest::new("Explain tidal energy", MediaOptions::Podcast
    {   length: PodcastLength::Standard
      , voice_host: "Kore".to_string()
      , voice_guest: "Puck".to_string()
    })
}

async fn mount_script(server: &MockServer, script: &str)
{   Mock::given(method("POST"))
      .and(path(SCRIPT_MODEL))
      .respond_with(ResponseTemplate::new(200).set_body_json(text_body(script)))
      .expect(1)
      .mount(server)
      .await;
}

#[tokio::test]
async fn test_podcast_concatenates_every_chunk()
{   let server = MockServer::start().await;
    mount_script(&server, &dialogue(8)).await;
    Mock::given(method("POST"))
      .and(path(TTS_FLASH))
      .and(body_string_contains("Guest"))
      .respond_with(ResponseTemplate::new(200).set_body_json(speech_body(&[0u8; PCM_PER_CHUNK])))
      .expect(3)
      .mount(&server)
      .await;

    let artifact = assert_ok!(
      generator(&server).generate(&podcast_request(), &CancelFlag::new()).await
    );
    assert_eq!(artifact.kind, MediaKind::Podcast);
    assert_eq!(artifact.bytes.len(), 3 * PCM_PER_CHUNK + 44);

    let reader = hound::WavReader::new(std::io::Cursor::new(artifact.bytes)).unwrap();
    let spec = reader.spec();
    assert_eq!(spec.sample_rate, 24_000);
    assert_eq!(spec.channels, 1);
    assert_eq!(spec.bits_per_sample, 16);
    assert_eq!(reader.len() as usize, 3 * PCM_PER_CHUNK / 2);
}

#[tokio::test]
async fn test_podcast_drops_failed_chunks()
{   let server = MockServer::start().await;
    mount_script(&server, &dialogue(8)).await;
    Mock::given(method("POST"))
      .and(path(TTS_FLASH))
      .and(body_string_contains("FINALE"))
      .respond_with(ResponseTemplate::new(400).set_body_json(json!({
        "error": {"code": 400, "message": "bad chunk", "status": "INVALID_ARGUMENT"}
      })))
      .expect(1)
      .mount(&server)
      .await;
    Mock::given(method("POST"))
      .and(path(TTS_FLASH))
      .respond_with(ResponseTemplate::new(200).set_body_json(speech_body(&[0u8; PCM_PER_CHUNK])))
      .expect(2)
      .mount(&server)
      .await;

    let artifact = assert_ok!(
      generator(&server).generate(&podcast_request(), &CancelFlag::new()).await
    );
    assert_eq!(artifact.bytes.len(), 2 * PCM_PER_CHUNK + 44);
}

#[tokio::test]
async fn test_podcast_fails_when_no_chunk_survives()
{   let server = MockServer::start().await;
    mount_script(&server, &dialogue(8)).await;
    Mock::given(method("POST"))
      .and(path(TTS_FLASH))
      .respond_with(ResponseTemplate::new(400).set_body_json(json!({
        "error": {"code": 400, "message": "bad chunk", "status": "INVALID_ARGUMENT"}
      })))
      .expect(3)
      .mount(&server)
      .await;

    let err = assert_err!(
      generator(&server).generate(&podcast_request(), &CancelFlag::new()).await
    );
    assert!(matches!(err, Error::AllChunksFailed { chunks: 3, .. }));
    let failure = amedia::sanitize(&err, Some(TEST_KEY));
    assert_eq!(failure.category, FailureCategory::InvalidRequest);
}

#[tokio::test]
async fn test_empty_script_is_terminal()
{   let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path(SCRIPT_MODEL))
      .respond_with(ResponseTemplate::new(200).set_body_json(text_body("  ")))
      .mount(&server)
      .await;
    Mock::given(method("POST"))
      .and(path(TTS_FLASH))
      .respond_with(ResponseTemplate::new(200))
      .expect(0)
      .mount(&server)
      .await;

    let err = assert_err!(
      generator(&server).generate(&podcast_request(), &CancelFlag::new()).await
    );
    assert!(matches!(err, Error::NoArtifact { .. }));
}

#[tokio::test]
async fn test_podcast_cancel_stops_remaining_chunks()
{   let server = MockServer::start().await;
    let cancel = CancelFlag::new();
    mount_script(&server, &dialogue(8)).await;
    Mock::given(method("POST"))
      .and(path(TTS_FLASH))
      .respond_with(CancelWhileAnswering
      {   cancel: cancel.clone()
        , body: speech_body(&[0u8; PCM_PER_CHUNK])
      })
      .up_to_n_times(1)
      .expect(1)
      .mount(&server)
      .await;
    Mock::given(method("POST"))
      .and(path(TTS_FLASH))
      .respond_with(ResponseTemplate::new(200).set_body_json(speech_body(&[0u8; PCM_PER_CHUNK])))
      .expect(0)
      .mount(&server)
      .await;

    let err = assert_err!(
      generator(&server).generate(&podcast_request(), &cancel).await
    );
    assert_eq!(err, Error::Cancelled);
}

#[tokio::test]
async fn test_long_script_is_cut_before_synthesis()
{   let server = MockServer::start().await;
    mount_script(&server, &dialogue(14)).await;
    Mock::given(method("POST"))
      .and(path(TTS_FLASH))
      .respond_with(ResponseTemplate::new(200).set_body_json(speech_body(&[0u8; PCM_PER_CHUNK])))
      .expect(4)
      .mount(&server)
      .await;

    let artifact = assert_ok!(
      generator(&server).generate(&podcast_request(), &CancelFlag::new()).await
    );
    assert_eq!(artifact.bytes.len(), 4 * PCM_PER_CHUNK + 44);

    let requests = server.received_requests().await.unwrap();
    let spoken: Vec<String> = requests
      .iter()
      .filter(|r| r.url.path() == TTS_FLASH)
      .map(|r| {
        let body: Value = serde_json::from_slice(&r.body).unwrap();
        let text = body["contents"][0]["parts"][0]["text"].as_str().unwrap();
        text
          .strip_prefix("Read this podcast dialogue naturally:\n\n")
          .unwrap()
          .to_string()
      })
      .collect();
    assert_eq!(spoken.len(), 4);
    let words: usize = spoken.iter().map(|t| t.split_whitespace().count()).sum();
    assert!(words <= 600, "synthesized {} words", words);
    assert!(spoken.iter().all(|t| !t.contains("FINALE")));
}

// ===== Video =====

const OPERATION: &str = "models/veo-3.1-generate-preview/operations/op1";

async fn mount_submit(server: &MockServer, reply: Value)
{   Mock::given(method("POST"))
      .and(path("/models/veo-3.1-generate-preview:predictLongRunning"))
      .and(body_partial_json(json!({
        "parameters": {"aspectRatio": "16:9", "durationSeconds": 8}
      })))
      .respond_with(ResponseTemplate::new(200).set_body_json(reply))
      .expect(1)
      .mount(server)
      .await;
}

#[tokio::test]
async fn test_video_polls_then_downloads()
{   let server = MockServer::start().await;
    mount_submit(&server, json!({"name": OPERATION})).await;
    Mock::given(method("GET"))
      .and(path(format!("/{}", OPERATION)))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({
        "name": OPERATION, "done": false
      })))
      .up_to_n_times(2)
      .expect(2)
      .mount(&server)
      .await;
    let uri = format!("{}/files/clip:download?alt=media", server.uri());
    Mock::given(method("GET"))
      .and(path(format!("/{}", OPERATION)))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({
        "name": OPERATION,
        "done": true,
        "response": {"generateVideoResponse": {"generatedSamples": [
          {"video": {"uri": uri}}
        ]}}
      })))
      .expect(1)
      .mount(&server)
      .await;
    Mock::given(method("GET"))
      .and(path("/files/clip:download"))
      .and(query_param("alt", "media"))
      .and(query_param("key", TEST_KEY))
      .respond_with(ResponseTemplate::new(200).set_body_bytes(b"fake-mp4-bytes".to_vec()))
      .expect(1)
      .mount(&server)
      .await;

    let scratch = tempfile::tempdir().unwrap();
    let mut config = test_config(&server.uri());
    config.scratch_dir = Some(scratch.path().to_path_buf());
    let generator = Generator::new(Arc::new(config)).unwrap();
    let request = GenerationRequest::new("Harbor at dawn", MediaOptions::video());
    let artifact = assert_ok!(generator.generate(&request, &CancelFlag::new()).await);
    assert_eq!(artifact.bytes, b"fake-mp4-bytes".to_vec());
    assert_eq!(artifact.mime_type(), "video/mp4");
    assert_eq!(std::fs::read_dir(scratch.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_video_gives_up_at_the_ceiling()
{   let server = MockServer::start().await;
    mount_submit(&server, json!({"name": OPERATION})).await;
    Mock::given(method("GET"))
      .and(path(format!("/{}", OPERATION)))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({
        "name": OPERATION, "done": false
      })))
      .mount(&server)
      .await;

    let mut config = test_config(&server.uri());
    config.video.max_wait_ms = 50;
    let generator = Generator::new(Arc::new(config)).unwrap();
    let request = GenerationRequest::new("Harbor at dawn", MediaOptions::video());
    let err = assert_err!(generator.generate(&request, &CancelFlag::new()).await);
    assert!(matches!(err, Error::TimeoutExceeded { .. }));
}

#[tokio::test]
async fn test_failed_operation_is_permanent()
{   let server = MockServer::start().await;
    mount_submit(&server, json!({"name": OPERATION})).await;
    Mock::given(method("GET"))
      .and(path(format!("/{}", OPERATION)))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({
        "name": OPERATION,
        "done": true,
        "error": {"code": 3, "message": "prompt rejected"}
      })))
      .expect(1)
      .mount(&server)
      .await;

    let request = GenerationRequest::new("Harbor at dawn", MediaOptions::video());
    let err = assert_err!(
      generator(&server).generate(&request, &CancelFlag::new()).await
    );
    assert_eq!(err, Error::PermanentProvider
    {   status: 400
      , message: "prompt rejected".to_string()
    });
}

fn finished_operation(uri: &str) -> Value
{   json!({
      "name": OPERATION,
      "done": true,
      "response": {"generateVideoResponse": {"generatedSamples": [
        {"video": {"uri": uri}}
      ]}}
    })
}

#[tokio::test]
async fn test_failed_download_leaves_no_scratch_file()
{   let server = MockServer::start().await;
    let uri = format!("{}/files/clip:download?alt=media", server.uri());
    mount_submit(&server, finished_operation(&uri)).await;
    Mock::given(method("GET"))
      .and(path("/files/clip:download"))
      .respond_with(ResponseTemplate::new(500).set_body_string("storage unavailable"))
      .expect(3)
      .mount(&server)
      .await;

    let scratch = tempfile::tempdir().unwrap();
    let mut config = test_config(&server.uri());
    config.scratch_dir = Some(scratch.path().to_path_buf());
    let generator = Generator::new(Arc::new(config)).unwrap();
    let request = GenerationRequest::new("Harbor at dawn", MediaOptions::video());
    let err = assert_err!(generator.generate(&request, &CancelFlag::new()).await);
    assert!(matches!(
      err,
      Error::TransientProvider { attempts: 3, status: Some(500), .. }
    ));
    let leftovers: Vec<_> = std::fs::read_dir(scratch.path())
      .unwrap()
      .filter_map(|entry| entry.ok())
      .filter(|entry| entry.file_name().to_string_lossy().starts_with("amedia-video-"))
      .collect();
    assert!(leftovers.is_empty(), "scratch files left: {:?}", leftovers);
    assert_eq!(std::fs::read_dir(scratch.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_submit_already_done_skips_polling()
{   let server = MockServer::start().await;
    let uri = format!("{}/files/clip:download?alt=media", server.uri());
    mount_submit(&server, finished_operation(&uri)).await;
    Mock::given(method("GET"))
      .and(path(format!("/{}", OPERATION)))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({
        "name": OPERATION, "done": false
      })))
      .expect(0)
      .mount(&server)
      .await;
    Mock::given(method("GET"))
      .and(path("/files/clip:download"))
      .respond_with(ResponseTemplate::new(200).set_body_bytes(b"quick-mp4".to_vec()))
      .expect(1)
      .mount(&server)
      .await;

    let request = GenerationRequest::new("Harbor at dawn", MediaOptions::video());
    let artifact = assert_ok!(
      generator(&server).generate(&request, &CancelFlag::new()).await
    );
    assert_eq!(artifact.bytes, b"quick-mp4".to_vec());
}

// ===== Cancellation and backend =====

#[tokio::test]
async fn test_cancelled_request_stops_before_calling()
{   let server = MockServer::start().await;
    Mock::given(method("POST"))
      .respond_with(ResponseTemplate::new(200))
      .expect(0)
      .mount(&server)
      .await;

    let cancel = CancelFlag::new();
    cancel.cancel();
    let request = GenerationRequest::new("Harbor at dawn", MediaOptions::video());
    let err = assert_err!(generator(&server).generate(&request, &cancel).await);
    assert_eq!(err, Error::Cancelled);
}

#[tokio::test]
async fn test_cancel_during_polling_skips_download()
{   let server = MockServer::start().await;
    let cancel = CancelFlag::new();
    mount_submit(&server, json!({"name": OPERATION})).await;
    Mock::given(method("GET"))
      .and(path(format!("/{}", OPERATION)))
      .respond_with(CancelWhileAnswering
      {   cancel: cancel.clone()
        , body: json!({"name": OPERATION, "done": false})
      })
      .expect(1)
      .mount(&server)
      .await;
    Mock::given(method("GET"))
      .and(path("/files/clip:download"))
      .respond_with(ResponseTemplate::new(200))
      .expect(0)
      .mount(&server)
      .await;

    let request = GenerationRequest::new("Harbor at dawn", MediaOptions::video());
    let err = assert_err!(generator(&server).generate(&request, &cancel).await);
    assert_eq!(err, Error::Cancelled);
}

#[tokio::test]
async fn test_backend_replies_with_sanitized_failure()
{   let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/models/imagen-4.0-fast-generate-001:predict"))
      .respond_with(ResponseTemplate::new(500).set_body_string(
        format!("upstream echoed key={} back", TEST_KEY)
      ))
      .expect(3)
      .mount(&server)
      .await;

    let backend = MediaBackend::new(test_config(&server.uri()));
    let ticket = backend
      .generate(GenerationRequest::new("Poster", MediaOptions::image()))
      .unwrap();
    let failure = assert_err!(ticket.outcome().await);
    assert_eq!(failure.category, FailureCategory::Other);
    assert!(failure.message.starts_with("Generation failed: "));
    assert!(!failure.message.contains(TEST_KEY));

    assert_ok!(backend.shutdown().await);
}

#[tokio::test]
async fn test_backend_without_key_reports_configuration()
{   let mut config = test_config("http://127.0.0.1:9");
    config.api_key = String::new();
    let backend = MediaBackend::new(config);
    let ticket = backend
      .generate(GenerationRequest::new("Poster", MediaOptions::image()))
      .unwrap();
    let failure = assert_err!(ticket.outcome().await);
    assert_eq!(failure.category, FailureCategory::Configuration);
    assert_ok!(backend.shutdown().await);
}
