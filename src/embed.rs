//! Embedding API clients and vector utilities.
//!
//! [`embed_texts`] dispatches to the configured provider:
//! - **openai** — `POST /v1/embeddings`; requires `OPENAI_API_KEY`.
//! - **ollama** — `POST /api/embed` on a local Ollama instance.
//! - **disabled** — always errors; the store degrades to warnings.
//!
//! Network providers retry transient failures with exponential backoff:
//! HTTP 429 and 5xx retry, other 4xx fail immediately, connection errors
//! retry. Delays run 1s, 2s, 4s, ... capped at 32s.
//!
//! The vector utilities cover the little-endian f32 BLOB encoding the
//! SQLite store uses and the cosine measure its query scan applies.

use anyhow::{anyhow, bail, Result};
use serde::Deserialize;
use std::time::Duration;

use crate::config::EmbeddingConfig;

/// Embed a batch of texts using the configured provider. Returns one vector
/// per input text, in input order.
pub async fn embed_texts(config: &EmbeddingConfig, texts: &[String]) -> Result<Vec<Vec<f32>>> {
    match config.provider.as_str() {
        "openai" => embed_openai(config, texts).await,
        "ollama" => embed_ollama(config, texts).await,
        "disabled" => bail!("Embedding provider is disabled"),
        other => bail!("Unknown embedding provider: {}", other),
    }
}

/// Embed a single query text.
pub async fn embed_query(config: &EmbeddingConfig, text: &str) -> Result<Vec<f32>> {
    let texts = [text.to_string()];
    embed_texts(config, &texts)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("Empty embedding response"))
}

#[derive(Deserialize)]
struct OpenAiEmbeddings {
    data: Vec<OpenAiEmbedding>,
}

#[derive(Deserialize)]
struct OpenAiEmbedding {
    embedding: Vec<f32>,
}

async fn embed_openai(config: &EmbeddingConfig, texts: &[String]) -> Result<Vec<Vec<f32>>> {
    let api_key =
        std::env::var("OPENAI_API_KEY").map_err(|_| anyhow!("OPENAI_API_KEY not set"))?;
    let client = http_client(config.timeout_secs)?;
    let body = serde_json::json!({ "model": config.model, "input": texts });

    let json = post_json_with_retry(
        &client,
        "https://api.openai.com/v1/embeddings",
        Some(&api_key),
        &body,
        config.max_retries,
        "OpenAI embeddings",
    )
    .await?;

    let parsed: OpenAiEmbeddings =
        serde_json::from_value(json).map_err(|e| anyhow!("Invalid embeddings response: {e}"))?;
    Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
}

#[derive(Deserialize)]
struct OllamaEmbeddings {
    embeddings: Vec<Vec<f32>>,
}

async fn embed_ollama(config: &EmbeddingConfig, texts: &[String]) -> Result<Vec<Vec<f32>>> {
    let base = config.url.as_deref().unwrap_or("http://localhost:11434");
    let client = http_client(config.timeout_secs)?;
    let body = serde_json::json!({ "model": config.model, "input": texts });

    let json = post_json_with_retry(
        &client,
        &format!("{}/api/embed", base),
        None,
        &body,
        config.max_retries,
        "Ollama embeddings",
    )
    .await?;

    let parsed: OllamaEmbeddings = serde_json::from_value(json)
        .map_err(|e| anyhow!("Invalid Ollama embeddings response: {e}"))?;
    Ok(parsed.embeddings)
}

fn http_client(timeout_secs: u64) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()?)
}

/// Delay before retry `attempt` (1-based): 1s doubling, capped at 32s.
pub(crate) fn retry_backoff(attempt: u32) -> Duration {
    Duration::from_secs(1 << attempt.saturating_sub(1).min(5))
}

/// POST a JSON body and decode the JSON reply, retrying transient failures.
///
/// 429 and 5xx responses and connection errors retry up to `max_retries`
/// times with [`retry_backoff`] between attempts; any other non-success
/// status fails immediately.
pub(crate) async fn post_json_with_retry(
    client: &reqwest::Client,
    url: &str,
    bearer: Option<&str>,
    body: &serde_json::Value,
    max_retries: u32,
    what: &str,
) -> Result<serde_json::Value> {
    let mut last_err = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            tokio::time::sleep(retry_backoff(attempt)).await;
        }

        let mut request = client.post(url).json(body);
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }

        match request.send().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    return Ok(response.json().await?);
                }

                let detail = response.text().await.unwrap_or_default();
                if status.as_u16() == 429 || status.is_server_error() {
                    last_err = Some(anyhow!("{} error {}: {}", what, status, detail));
                    continue;
                }
                bail!("{} error {}: {}", what, status, detail);
            }
            Err(e) => {
                last_err = Some(anyhow!("{} request failed: {}", what, e));
            }
        }
    }

    Err(last_err.unwrap_or_else(|| anyhow!("{} failed after retries", what)))
}

/// Encode a float vector as little-endian f32 bytes.
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    vec.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Decode little-endian f32 bytes back into a float vector.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

/// Cosine similarity in `[-1.0, 1.0]`. Empty or mismatched-length inputs
/// score `0.0`.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|y| y * y).sum::<f32>().sqrt();

    let denom = norm_a * norm_b;
    if denom < f32::EPSILON {
        return 0.0;
    }
    dot / denom
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec_blob_roundtrip() {
        let vec = vec![1.0f32, -2.5, 3.125, 0.0, -0.001];
        let blob = vec_to_blob(&vec);
        assert_eq!(blob.len(), 20);
        assert_eq!(blob_to_vec(&blob), vec);
    }

    #[test]
    fn test_cosine_identical() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_orthogonal() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_opposite() {
        let a = vec![1.0, 0.0];
        let b = vec![-1.0, 0.0];
        assert!((cosine_similarity(&a, &b) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_degenerate_inputs() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
    }

    #[test]
    fn test_retry_backoff_caps_at_32s() {
        assert_eq!(retry_backoff(1), Duration::from_secs(1));
        assert_eq!(retry_backoff(3), Duration::from_secs(4));
        assert_eq!(retry_backoff(6), Duration::from_secs(32));
        assert_eq!(retry_backoff(40), Duration::from_secs(32));
    }

    #[test]
    fn test_openai_response_decodes_in_order() {
        let json = serde_json::json!({
            "data": [
                { "embedding": [0.1, 0.2] },
                { "embedding": [0.3, 0.4] },
            ]
        });
        let parsed: OpenAiEmbeddings = serde_json::from_value(json).unwrap();
        assert_eq!(parsed.data.len(), 2);
        assert!((parsed.data[1].embedding[0] - 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_openai_response_rejects_missing_data() {
        let json = serde_json::json!({ "unexpected": true });
        assert!(serde_json::from_value::<OpenAiEmbeddings>(json).is_err());
    }

    #[test]
    fn test_ollama_response_decodes() {
        let json = serde_json::json!({ "embeddings": [[1.0, 2.0], [3.0, 4.0]] });
        let parsed: OllamaEmbeddings = serde_json::from_value(json).unwrap();
        assert_eq!(parsed.embeddings[1], vec![3.0, 4.0]);
    }
}
