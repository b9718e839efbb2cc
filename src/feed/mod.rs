use async_trait::async_trait;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, COOKIE, REFERER};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::fmt;
use thiserror::Error;
use tracing::{debug, instrument, warn};

pub mod filter;

pub use filter::{decode_unicode_text, FeedFilter};

pub const ZSXQ_DYNAMICS_URL: &str = "https://api.zsxq.com/v2/dynamics?scope=general&count=30";

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to reach feed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("feed returned {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("invalid feed JSON: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Source of raw feed payloads.
#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn fetch(&self) -> Result<Value, FetchError>;
}

#[derive(Clone)]
pub struct FeedClient {
    http: Client,
    url: String,
    cookies: String,
}

impl fmt::Debug for FeedClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeedClient")
            .field("url", &self.url)
            .finish_non_exhaustive()
    }
}

impl FeedClient {
    pub fn new(url: impl Into<String>, cookies: impl Into<String>) -> Result<Self, FetchError> {
        let http = Client::builder().user_agent(BROWSER_USER_AGENT).build()?;
        Ok(Self {
            http,
            url: url.into(),
            cookies: cookies.into(),
        })
    }

    pub fn build_request(&self) -> Result<reqwest::Request, FetchError> {
        let request = self
            .http
            .get(&self.url)
            .header(COOKIE, &self.cookies)
            .header(ACCEPT, "application/json, text/plain, */*")
            .header(ACCEPT_LANGUAGE, "zh-CN,zh;q=0.9,en;q=0.8")
            .header(REFERER, "https://zsxq.com/")
            .build()?;
        Ok(request)
    }
}

#[async_trait]
impl FeedSource for FeedClient {
    #[instrument(skip_all)]
    async fn fetch(&self) -> Result<Value, FetchError> {
        let request = self.build_request()?;
        debug!(url = %request.url(), "fetching feed");
        let res = self.http.execute(request).await?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            warn!(%status, "feed request rejected");
            return Err(FetchError::Status { status, body });
        }

        let body = res.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}
