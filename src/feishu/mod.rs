use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, StatusCode};
use std::fmt;
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::feishu::model::{TextContent, WebhookPayload, WebhookResponse};

pub mod model;
pub mod sign;

pub use sign::sign;

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("failed to reach webhook: {0}")]
    Http(#[from] reqwest::Error),
    #[error("webhook returned HTTP {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("webhook rejected message (code {code:?}): {msg}")]
    Rejected { code: Option<i64>, msg: String },
    #[error("invalid webhook response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Delivers one formatted text message to the chat.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_text(&self, text: &str) -> Result<(), DeliveryError>;
}

#[derive(Clone)]
pub struct FeishuClient {
    http: Client,
    webhook_url: String,
    sign_key: String,
}

impl fmt::Debug for FeishuClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeishuClient").finish_non_exhaustive()
    }
}

impl FeishuClient {
    pub fn new(
        webhook_url: impl Into<String>,
        sign_key: impl Into<String>,
    ) -> Result<Self, DeliveryError> {
        let http = Client::builder().user_agent("zsxq-relay/0.1").build()?;
        Ok(Self {
            http,
            webhook_url: webhook_url.into(),
            sign_key: sign_key.into(),
        })
    }

    /// Signed payload for `text` at `timestamp` (Unix seconds).
    pub fn build_payload(&self, text: &str, timestamp: i64) -> WebhookPayload {
        let timestamp = timestamp.to_string();
        let sign = sign(&self.sign_key, &timestamp);
        WebhookPayload {
            timestamp,
            sign,
            msg_type: "text",
            content: TextContent {
                text: text.to_string(),
            },
        }
    }

    pub fn build_request(&self, payload: &WebhookPayload) -> Result<reqwest::Request, DeliveryError> {
        let request = self.http.post(&self.webhook_url).json(payload).build()?;
        Ok(request)
    }

    /// Post `text` once. Success means HTTP 200 and `code == 0` in the body.
    #[instrument(skip_all)]
    pub async fn deliver(&self, text: &str) -> Result<(), DeliveryError> {
        let payload = self.build_payload(text, Utc::now().timestamp());
        let request = self.build_request(&payload)?;
        let res = self.http.execute(request).await?;
        let status = res.status();
        let body = res.text().await?;
        interpret_response(status, &body)?;
        info!("message delivered to feishu");
        Ok(())
    }
}

#[async_trait]
impl Notifier for FeishuClient {
    async fn send_text(&self, text: &str) -> Result<(), DeliveryError> {
        FeishuClient::deliver(self, text).await
    }
}

pub fn interpret_response(status: StatusCode, body: &str) -> Result<(), DeliveryError> {
    if status != StatusCode::OK {
        warn!(%status, "feishu HTTP error");
        return Err(DeliveryError::Status {
            status,
            body: body.to_string(),
        });
    }
    let resp: WebhookResponse = serde_json::from_str(body)?;
    match resp.code {
        Some(0) => Ok(()),
        code => {
            let msg = resp.msg.unwrap_or_default();
            warn!(?code, %msg, "feishu rejected message");
            Err(DeliveryError::Rejected { code, msg })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> FeishuClient {
        FeishuClient::new("https://open.feishu.cn/open-apis/bot/v2/hook/abc", "abc").unwrap()
    }

    #[test]
    fn payload_shape_and_signature() {
        let payload = client().build_payload("时间: x\n内容: y", 1_700_000_000);
        let body = serde_json::to_value(&payload).unwrap();
        assert_eq!(body["timestamp"], "1700000000");
        assert_eq!(body["sign"], "VIS10b0EBvzzSdFnuk4tznEmK5wHaruvf/WnViv2yR4=");
        assert_eq!(body["msg_type"], "text");
        assert_eq!(body["content"]["text"], "时间: x\n内容: y");
        assert_eq!(body.as_object().unwrap().len(), 4);
    }

    #[test]
    fn build_request_posts_json() {
        let c = client();
        let payload = c.build_payload("hi", 1);
        let request = c.build_request(&payload).unwrap();
        assert_eq!(request.method(), reqwest::Method::POST);
        assert_eq!(request.url().path(), "/open-apis/bot/v2/hook/abc");
        assert_eq!(
            request
                .headers()
                .get("Content-Type")
                .and_then(|h| h.to_str().ok())
                .unwrap(),
            "application/json"
        );
        let sent: serde_json::Value =
            serde_json::from_slice(request.body().and_then(|b| b.as_bytes()).unwrap()).unwrap();
        assert_eq!(sent["content"]["text"], "hi");
    }

    #[test]
    fn debug_hides_secrets() {
        let dbg = format!("{:?}", client());
        assert!(!dbg.contains("hook/abc"));
    }

    #[test]
    fn success_requires_200_and_code_zero() {
        assert!(interpret_response(StatusCode::OK, r#"{"code":0,"msg":"success","data":{}}"#).is_ok());
    }

    #[test]
    fn non_zero_code_is_rejected() {
        let err = interpret_response(StatusCode::OK, r#"{"code":19021,"msg":"sign match fail"}"#)
            .unwrap_err();
        match err {
            DeliveryError::Rejected { code, msg } => {
                assert_eq!(code, Some(19021));
                assert_eq!(msg, "sign match fail");
            }
            other => panic!("wrong error: {other:?}"),
        }
    }

    #[test]
    fn missing_code_is_rejected() {
        assert!(matches!(
            interpret_response(StatusCode::OK, r#"{"StatusCode":0}"#),
            Err(DeliveryError::Rejected { code: None, .. })
        ));
    }

    #[test]
    fn non_200_is_a_failure_even_with_code_zero() {
        assert!(matches!(
            interpret_response(StatusCode::ACCEPTED, r#"{"code":0}"#),
            Err(DeliveryError::Status { .. })
        ));
        assert!(matches!(
            interpret_response(StatusCode::BAD_REQUEST, "bad"),
            Err(DeliveryError::Status { .. })
        ));
    }

    #[test]
    fn unparseable_body_is_a_failure() {
        assert!(matches!(
            interpret_response(StatusCode::OK, "<html>"),
            Err(DeliveryError::Decode(_))
        ));
    }
}
