//! Transcript delivery to a messaging webhook.
//!
//! The payload follows the enterprise-messenger text contract:
//! `{"msgtype":"text","text":{"content":"<title>\n\n<body>"}}`. A non-2xx
//! response, or a JSON acknowledgement carrying a nonzero `errcode`, counts
//! as a delivery failure. Acknowledgement bodies that are not JSON objects
//! are accepted, so plain webhook endpoints work too.

use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use crate::error::{PipelineError, PipelineResult};

/// Delivery options derived from configuration.
#[derive(Debug, Clone)]
pub struct WebhookOptions {
    /// Absolute URL the message is posted to.
    pub url: String,
    /// Per-request timeout.
    pub request_timeout: Duration,
}

/// Notification sink seam.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver a titled message.
    ///
    /// # Errors
    ///
    /// Returns an error when the request cannot be performed or the endpoint
    /// refuses the message.
    async fn deliver(&self, title: &str, body: &str) -> PipelineResult<()>;
}

/// Production [`Notifier`] posting to an HTTP webhook.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    /// Build a notifier with a bounded request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error when the HTTP client cannot be constructed.
    pub fn new(options: &WebhookOptions) -> PipelineResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(options.request_timeout)
            .build()
            .map_err(|source| PipelineError::Delivery { source })?;
        Ok(Self {
            client,
            url: options.url.clone(),
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn deliver(&self, title: &str, body: &str) -> PipelineResult<()> {
        let payload = serde_json::json!({
            "msgtype": "text",
            "text": { "content": format!("{title}\n\n{body}") }
        });
        let response = self
            .client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(|source| PipelineError::Delivery { source })?;

        let status = response.status();
        if !status.is_success() {
            return Err(PipelineError::DeliveryRejected {
                detail: format!("http status {status}"),
            });
        }

        if let Ok(ack) = response.json::<serde_json::Value>().await
            && let Some(errcode) = ack.get("errcode").and_then(serde_json::Value::as_i64)
            && errcode != 0
        {
            return Err(PipelineError::DeliveryRejected {
                detail: format!("errcode {errcode}: {ack}"),
            });
        }
        info!("transcript delivered to webhook");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one HTTP response, handing back the endpoint URL and the
    /// captured request bytes.
    async fn serve_once(
        response_body: &'static str,
        status_line: &'static str,
    ) -> (String, tokio::sync::oneshot::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        let (request_tx, request_rx) = tokio::sync::oneshot::channel();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.expect("accept");
            let mut buffer = vec![0_u8; 8_192];
            let read = socket.read(&mut buffer).await.expect("read request");
            let response = format!(
                "{status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{response_body}",
                response_body.len()
            );
            socket
                .write_all(response.as_bytes())
                .await
                .expect("write response");
            socket.shutdown().await.expect("shutdown socket");
            let _ = request_tx.send(String::from_utf8_lossy(&buffer[..read]).into_owned());
        });
        (format!("http://{addr}/"), request_rx)
    }

    fn notifier(url: String) -> WebhookNotifier {
        WebhookNotifier::new(&WebhookOptions {
            url,
            request_timeout: Duration::from_secs(2),
        })
        .expect("build notifier")
    }

    #[tokio::test]
    async fn successful_acknowledgement_is_accepted() {
        let (url, request_rx) = serve_once(r#"{"errcode":0,"errmsg":"ok"}"#, "HTTP/1.1 200 OK").await;
        notifier(url)
            .deliver("New video transcribed: clip.mp4", "[00:00 - 00:03] 大家好。")
            .await
            .expect("delivery should succeed");

        let request = request_rx.await.expect("captured request");
        assert!(request.contains(r#""msgtype":"text""#));
        assert!(request.contains("New video transcribed: clip.mp4"));
    }

    #[tokio::test]
    async fn http_error_status_is_a_rejection() {
        let (url, _request_rx) = serve_once("oops", "HTTP/1.1 500 Internal Server Error").await;
        let err = notifier(url)
            .deliver("title", "body")
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::DeliveryRejected { .. }));
    }

    #[tokio::test]
    async fn nonzero_errcode_is_a_rejection() {
        let (url, _request_rx) = serve_once(
            r#"{"errcode":93000,"errmsg":"invalid webhook url"}"#,
            "HTTP/1.1 200 OK",
        )
        .await;
        let err = notifier(url)
            .deliver("title", "body")
            .await
            .unwrap_err();
        match err {
            PipelineError::DeliveryRejected { detail } => {
                assert!(detail.contains("93000"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_a_request_failure() {
        // Port 9 (discard) is almost certainly closed.
        let err = notifier("http://127.0.0.1:9/".to_string())
            .deliver("title", "body")
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Delivery { .. }));
    }
}
