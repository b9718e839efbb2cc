use serde::{Deserialize, Serialize};

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct TextContent {
    pub text: String,
}

/// Body of a signed custom-bot text message.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct WebhookPayload {
    pub timestamp: String,
    pub sign: String,
    pub msg_type: &'static str,
    pub content: TextContent,
}

#[derive(Deserialize, Debug)]
pub struct WebhookResponse {
    pub code: Option<i64>,
    pub msg: Option<String>,
}
