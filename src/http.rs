//! JSON-over-HTTP with exponential backoff.
//!
//! Shared by the remote embedding providers and the generation backends.
//!
//! - HTTP 429 and 5xx → retry
//! - other 4xx → fail immediately
//! - network errors → retry
//! - backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use anyhow::{bail, Result};
use std::time::{Duration, Instant};

/// A parsed JSON response and how long the attempt that produced it took.
#[derive(Debug)]
pub struct TimedResponse {
    pub body: serde_json::Value,
    /// Send-to-parsed time of the successful attempt. Failed attempts and
    /// backoff sleeps are not included.
    pub elapsed: Duration,
}

/// POST `body` as JSON to `url` and parse the JSON response.
///
/// `headers` are added to every attempt. `label` prefixes error messages
/// (e.g. `"OpenAI"`, `"Ollama"`).
pub async fn post_json_with_retry(
    client: &reqwest::Client,
    url: &str,
    headers: &[(&str, String)],
    body: &serde_json::Value,
    max_retries: u32,
    label: &str,
) -> Result<serde_json::Value> {
    Ok(post_json_timed(client, url, headers, body, max_retries, label)
        .await?
        .body)
}

/// Like [`post_json_with_retry`], also reporting the successful attempt's
/// latency.
pub async fn post_json_timed(
    client: &reqwest::Client,
    url: &str,
    headers: &[(&str, String)],
    body: &serde_json::Value,
    max_retries: u32,
    label: &str,
) -> Result<TimedResponse> {
    let mut last_err = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            let delay = Duration::from_secs(1 << (attempt - 1).min(5));
            tracing::debug!(attempt, ?delay, "{} request retrying", label);
            tokio::time::sleep(delay).await;
        }

        let mut request = client.post(url).json(body);
        for (name, value) in headers {
            request = request.header(*name, value);
        }

        let started = Instant::now();
        match request.send().await {
            Ok(response) => {
                let status = response.status();

                if status.is_success() {
                    let body = response.json().await?;
                    return Ok(TimedResponse {
                        body,
                        elapsed: started.elapsed(),
                    });
                }

                let body_text = response.text().await.unwrap_or_default();
                if status.as_u16() == 429 || status.is_server_error() {
                    last_err = Some(anyhow::anyhow!(
                        "{} API error {}: {}",
                        label,
                        status,
                        body_text
                    ));
                    continue;
                }

                bail!("{} API error {}: {}", label, status, body_text);
            }
            Err(e) => {
                last_err = Some(anyhow::anyhow!(
                    "{} connection error ({}): {}",
                    label,
                    url,
                    e
                ));
                continue;
            }
        }
    }

    Err(last_err.unwrap_or_else(|| anyhow::anyhow!("{} request failed after retries", label)))
}


#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_elapsed_covers_only_the_successful_attempt() {
        let url = test_server::serve(vec![(503, r#"{"error":"busy"}"#), (200, r#"{"ok":true}"#)]).await;
        let client = reqwest::Client::new();

        let wall = Instant::now();
        let timed = post_json_timed(&client, &url, &[], &json!({"q": 1}), 2, "Test")
            .await
            .unwrap();
        assert_eq!(timed.body["ok"], true);
        assert!(wall.elapsed() >= Duration::from_secs(1));
        assert!(timed.elapsed < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_client_error_is_not_retried() {
        let url = test_server::serve(vec![(400, r#"{"error":"bad model"}"#)]).await;
        let client = reqwest::Client::new();

        let err = post_json_with_retry(&client, &url, &[], &json!({}), 3, "Test")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("400"));
    }
}
