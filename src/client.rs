use std::sync::Arc;
use tokio::sync::mpsc;
use log::{debug, error, info};

use crate::config::GeneratorConfig;
use crate::generate::Generator;
use crate::sanitize::sanitize;
use crate::MediaFoot;

/// Handle for one queued request: its single reply and its cancel switch
pub struct GenerationTicket
{   pub reply: mpsc::UnboundedReceiver<crate::GenerateReply>
  , pub cancel: crate::CancelFlag
}

impl GenerationTicket
{   /// Wait for the reply. A dropped backend surfaces as a failure.
    pub async fn outcome(mut self) -> crate::GenerateReply
    {   match self.reply.recv().await
        {   Some(reply) => reply
          , None => {
              error!("Backend dropped the request without replying");
              Err(sanitize(&crate::error::Error::BackendClosed, None))
            }
        }
    }
}

/// Backend state shared by every spawned request
pub struct MediaBackendState
{   pub config: Arc<GeneratorConfig>
  , pub generator: Option<Generator>
}

impl MediaBackendState
{   /// A bad configuration is kept and reported per request
    pub fn new(config: Arc<GeneratorConfig>) -> Self
    {   debug!("Initializing MediaBackendState");
        let generator = match Generator::new(config.clone())
        {   Ok(generator) => Some(generator)
          , Err(e) => {
              error!("Generator unavailable: {}", e);
              None
            }
        };
        MediaBackendState
        {   config
          , generator
        }
    }
}

/// Public API for the media backend - owns the task
pub struct MediaBackend
{   hand: crate::MediaHand
  , _task_handle: tokio::task::JoinHandle<()>
}

impl MediaBackend
{   /// Create and spawn a new media backend.
    /// Returns immediately - spawns background task
    pub fn new(config: GeneratorConfig) -> Self
    {   debug!("Creating MediaBackend with task ownership");

        let (generate_tx, generate_rx)
          = mpsc::unbounded_channel();
        let (kill_process_tx, kill_process_rx)
          = mpsc::unbounded_channel();

        let hand = crate::MediaHand
        {   generate_tx
          , kill_process_tx
        };

        let foot = crate::MediaFoot
        {   generate_rx
          , kill_process_rx
        };

        let config = Arc::new(config);
        let _task_handle = tokio::spawn(async move {
          run_backend_loop(foot, config).await
        });

        MediaBackend
        {   hand
          , _task_handle
        }
    }

    /// Queue a request - returns almost immediately
    pub fn generate(
      &self
    , request: crate::GenerationRequest
    ) -> Result<GenerationTicket, crate::error::Error>
    {   debug!("generate queuing {:?} request", request.kind());
        let (reply_tx, reply_rx)
          = mpsc::unbounded_channel();
        let cancel = crate::CancelFlag::new();

        let cmd = crate::GenerateArgs
        {   request
          , cancel: cancel.clone()
          , reply: reply_tx
        };

        self.hand.generate_tx
          .send(cmd)
          .map_err(|_| {
            error!("Backend channel closed");
            crate::error::Error::BackendClosed
          })?;

        Ok(GenerationTicket
        {   reply: reply_rx
          , cancel
        })
    }

    /// Gracefully shutdown the backend
    pub async fn shutdown(self)
      -> Result<(), crate::error::Error>
    {   debug!("Shutting down MediaBackend");
        let (reply_tx, mut reply_rx)
          = mpsc::unbounded_channel();

        let cmd = crate::KillProcessArgs
        {   reply: reply_tx
        };

        self.hand.kill_process_tx
          .send(cmd)
          .map_err(|_| {
            error!("Backend channel already closed");
            crate::error::Error::BackendClosed
          })?;

        if let Some(result) = reply_rx.recv().await
        {   debug!("Backend shutdown confirmed");
            result
        } else
        {   error!("Backend exited without confirming shutdown");
            Err(crate::error::Error::BackendClosed)
        }
    }
}

/// Main backend event loop
///
/// tokio::select! only queues: each generate command is moved onto
/// its own task, so a slow video never holds up an image.
async fn run_backend_loop(
  foot: MediaFoot
, config: Arc<GeneratorConfig>
)
{   debug!("Starting MediaBackend event loop");
    let state = MediaBackendState::new(config);
    let MediaFoot
    {   mut generate_rx
      , mut kill_process_rx
    } = foot;

    loop
    { tokio::select!
      { Some(cmd) = generate_rx.recv() => {
          debug!("Received Generate for {:?}", cmd.request.kind());
          let generator = state.generator.clone();
          let api_key = state.config.api_key.clone();
          tokio::spawn(async move {
            handle_generate(generator, api_key, cmd).await
          });
        }
      , Some(cmd) = kill_process_rx.recv() => {
          debug!("Received KillProcess");
          let _ = cmd.reply.send(Ok(()));
          info!("MediaBackend shutting down");
          break;
        }
      , else => {
          debug!("All MediaBackend senders dropped");
          break;
        }
      }
    }
}

async fn handle_generate(
  generator: Option<Generator>
, api_key: String
, cmd: crate::GenerateArgs
)
{   let crate::GenerateArgs { request, cancel, reply } = cmd;
    let outcome = match generator
    {   Some(generator) => generator.generate(&request, &cancel).await
      , None => Err(crate::error::Error::Configuration(
          format!("{} not configured", crate::config::API_KEY_VAR)
        ))
    };
    let outcome = outcome.map_err(|e| sanitize(&e, Some(&api_key)));
    if reply.send(outcome).is_err()
    {   debug!("Requester dropped before reply");
    }
}
