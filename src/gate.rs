//! Session acquisition boundary.
//!
//! The pipeline is inert until the upstream call/transcript step finishes
//! and hands over a session identifier. [`SessionSource`] is the seam:
//! production code uses [`HttpSessionGate`] against the analysis service;
//! tests implement the trait directly.

use std::future::Future;
use std::pin::Pin;

use serde::Deserialize;
use tracing::{debug, info};

use crate::config::GlobalConfig;
use crate::{AppError, Result};

/// Supplier of the opaque session identifier gating the pipeline.
pub trait SessionSource: Send + Sync {
    /// Acquire a session identifier once the upstream transcript step has
    /// completed. The identifier is opaque; its format is never
    /// interpreted.
    fn acquire(&self) -> Pin<Box<dyn Future<Output = Result<String>> + Send + '_>>;
}

/// Response envelope of the upstream transcript endpoint.
///
/// The endpoint also returns the transcript text; only the session
/// identifier crosses this boundary.
#[derive(Debug, Deserialize)]
struct TranscriptResponse {
    session_id: String,
}

/// HTTP implementation of [`SessionSource`] against the analysis service.
pub struct HttpSessionGate {
    client: reqwest::Client,
    api_base_url: String,
}

impl HttpSessionGate {
    /// Build a gate for the configured service.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the HTTP client cannot be built.
    pub fn new(config: &GlobalConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.connect_timeout() {
            builder = builder.connect_timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|err| AppError::Config(format!("failed to build http client: {err}")))?;

        Ok(Self {
            client,
            api_base_url: config.api_base_url.clone(),
        })
    }
}

impl SessionSource for HttpSessionGate {
    fn acquire(&self) -> Pin<Box<dyn Future<Output = Result<String>> + Send + '_>> {
        Box::pin(async move {
            let url = format!("{}/get_latest_call_transcript", self.api_base_url);
            debug!(%url, "requesting latest call transcript session");

            let response = self.client.get(&url).send().await?;
            let status = response.status();
            if !status.is_success() {
                return Err(AppError::Transport(format!(
                    "unexpected status {status} from {url}"
                )));
            }

            let envelope: TranscriptResponse = response
                .json()
                .await
                .map_err(|err| AppError::Transport(format!("malformed transcript response: {err}")))?;

            if envelope.session_id.is_empty() {
                return Err(AppError::Session(
                    "upstream returned an empty session identifier".into(),
                ));
            }

            info!(session_id = %envelope.session_id, "session acquired from upstream");
            Ok(envelope.session_id)
        })
    }
}
