//! Text prompt to audio through a hosted music generation service.

use crate::error::ConvertError;
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use scribeconf::GenerationConfig;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info};

/// Produces encoded audio for a prompt.
#[async_trait]
pub trait MusicGenerator: Send + Sync {
    async fn compose(&self, prompt: &str, music_length_ms: u64) -> Result<Bytes, ConvertError>;
}

#[derive(Debug, Serialize)]
struct ComposeRequest<'a> {
    prompt: &'a str,
    music_length_ms: u64,
    model_id: &'a str,
}

/// ElevenLabs music compose API client.
#[derive(Clone)]
pub struct ElevenLabs {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model_id: String,
    output_format: String,
}

impl std::fmt::Debug for ElevenLabs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElevenLabs")
            .field("base_url", &self.base_url)
            .field("model_id", &self.model_id)
            .field("output_format", &self.output_format)
            .finish_non_exhaustive()
    }
}

impl ElevenLabs {
    /// Build a client from config. `Ok(None)` when no credential is set.
    pub fn from_config(config: &GenerationConfig) -> Result<Option<Self>, ConvertError> {
        let Some(api_key) = config.credential() else {
            return Ok(None);
        };

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| ConvertError::Configuration(format!("building HTTP client: {e}")))?;

        Ok(Some(Self {
            client,
            api_key: api_key.to_string(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model_id: config.model_id.clone(),
            output_format: config.output_format.clone(),
        }))
    }

    fn compose_url(&self) -> String {
        format!("{}/v1/music", self.base_url)
    }
}

#[async_trait]
impl MusicGenerator for ElevenLabs {
    #[tracing::instrument(skip(self, prompt), fields(model = %self.model_id))]
    async fn compose(&self, prompt: &str, music_length_ms: u64) -> Result<Bytes, ConvertError> {
        let body = ComposeRequest {
            prompt,
            music_length_ms,
            model_id: &self.model_id,
        };

        let response = self
            .client
            .post(self.compose_url())
            .query(&[("output_format", self.output_format.as_str())])
            .header("xi-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                let message = if e.is_connect() {
                    format!("music service unreachable: {e}")
                } else if e.is_timeout() {
                    format!("music service timed out: {e}")
                } else {
                    format!("music service request failed: {e}")
                };
                ConvertError::Upstream {
                    status: e.status().map(|s| s.as_u16()),
                    message,
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ConvertError::Upstream {
                status: Some(status.as_u16()),
                message: format!("music service error ({status}): {error_text}"),
            });
        }

        let mut audio = BytesMut::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| ConvertError::Upstream {
                status: Some(status.as_u16()),
                message: format!("music stream interrupted: {e}"),
            })?;
            debug!(chunk_bytes = chunk.len(), "received audio chunk");
            audio.extend_from_slice(&chunk);
        }

        if audio.is_empty() {
            return Err(ConvertError::Upstream {
                status: Some(status.as_u16()),
                message: "music service returned no audio".to_string(),
            });
        }

        info!(audio_bytes = audio.len(), "music generated");
        Ok(audio.freeze())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(base_url: &str) -> GenerationConfig {
        GenerationConfig {
            api_key: Some("sk-test".to_string()),
            base_url: base_url.to_string(),
            ..GenerationConfig::default()
        }
    }

    #[test]
    fn no_credential_means_no_client() {
        let config = GenerationConfig::default();
        assert!(ElevenLabs::from_config(&config).unwrap().is_none());
    }

    #[test]
    fn debug_hides_key() {
        let client = ElevenLabs::from_config(&config("http://localhost:1"))
            .unwrap()
            .unwrap();
        assert!(!format!("{client:?}").contains("sk-test"));
    }

    #[tokio::test]
    async fn compose_sends_prompt_and_drains_stream() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/music"))
            .and(query_param("output_format", "mp3_44100_128"))
            .and(header("xi-api-key", "sk-test"))
            .and(body_json(serde_json::json!({
                "prompt": "lofi beat (instrumental version)",
                "music_length_ms": 15000,
                "model_id": "music_v1",
            })))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![7u8; 4096]))
            .expect(1)
            .mount(&server)
            .await;

        let client = ElevenLabs::from_config(&config(&server.uri())).unwrap().unwrap();
        let audio = client
            .compose("lofi beat (instrumental version)", 15000)
            .await
            .unwrap();

        assert_eq!(audio.len(), 4096);
    }

    #[tokio::test]
    async fn error_status_is_forwarded() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
            .mount(&server)
            .await;

        let client = ElevenLabs::from_config(&config(&server.uri())).unwrap().unwrap();
        let err = client.compose("anything", 30000).await.unwrap_err();

        assert_eq!(err.upstream_status(), Some(401));
        assert!(err.to_string().contains("invalid api key"));
    }

    #[tokio::test]
    async fn unreachable_service_has_no_status() {
        let client = ElevenLabs::from_config(&config("http://127.0.0.1:9"))
            .unwrap()
            .unwrap();
        let err = client.compose("anything", 30000).await.unwrap_err();

        assert!(matches!(err, ConvertError::Upstream { status: None, .. }));
    }
}
