//! 1Click intent API client.
//!
//! Typed access to the quote, status and token endpoints of the upstream
//! intent exchange. The optional bearer token unlocks the zero protocol fee
//! tier; without it requests go out unauthenticated.

use model::{
    quote::{DryQuoteResponse, QuoteRequest, QuoteResponse, StatusResponse},
    token::TokenInfo,
};
use reqwest::{header::ACCEPT, Client, StatusCode, Url};
use serde::Deserialize;
use thiserror::Error;

pub const DEFAULT_URL: &str = "https://1click.chaindefuser.com";

#[derive(Debug, Error)]
pub enum OneClickError {
    #[error(transparent)]
    Transport(#[from] reqwest::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("one click api returned {status}")]
    Status { status: StatusCode, body: String },
}

/// Parsed status next to the exact bytes the upstream sent, so the raw body
/// can be served verbatim.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StatusWithRaw {
    pub parsed: StatusResponse,
    pub raw: Vec<u8>,
}

#[mockall::automock]
#[async_trait::async_trait]
pub trait OneClickApi: Send + Sync {
    async fn tokens(&self) -> Result<Vec<TokenInfo>, OneClickError>;

    /// Non binding price preview; no deposit address is minted.
    async fn dry_quote(&self, request: &QuoteRequest) -> Result<DryQuoteResponse, OneClickError>;

    /// Binding quote reserving a deposit address until the deadline.
    async fn quote(&self, request: &QuoteRequest) -> Result<QuoteResponse, OneClickError>;

    async fn status(&self, deposit_address: &str) -> Result<StatusWithRaw, OneClickError>;

    /// Whether a credential enabling the zero protocol fee tier is attached.
    fn has_credential(&self) -> bool;
}

pub struct DefaultOneClickApi {
    client: Client,
    base: Url,
    bearer: Option<String>,
}

impl DefaultOneClickApi {
    pub fn new(client: Client, base: Url, bearer: Option<String>) -> Self {
        Self {
            client,
            base,
            bearer,
        }
    }

    fn url(&self, path: &str) -> Url {
        let mut url = self.base.clone();
        url.set_path(path);
        url
    }

    async fn get(&self, url: Url) -> Result<Vec<u8>, OneClickError> {
        let mut request = self.client.get(url).header(ACCEPT, "application/json");
        if let Some(bearer) = &self.bearer {
            request = request.bearer_auth(bearer);
        }
        read_success_body(request.send().await?).await
    }

    async fn post(&self, url: Url, body: &QuoteRequest) -> Result<Vec<u8>, OneClickError> {
        let mut request = self
            .client
            .post(url)
            .header(ACCEPT, "application/json")
            .json(body);
        if let Some(bearer) = &self.bearer {
            request = request.bearer_auth(bearer);
        }
        read_success_body(request.send().await?).await
    }
}

async fn read_success_body(response: reqwest::Response) -> Result<Vec<u8>, OneClickError> {
    let status = response.status();
    let body = response.bytes().await?;
    if !status.is_success() {
        return Err(OneClickError::Status {
            status,
            body: String::from_utf8_lossy(&body).into_owned(),
        });
    }
    Ok(body.to_vec())
}

/// The token endpoint answers either with a bare array or with an object
/// wrapping it in a `tokens` field. The bare shape is tried first.
fn parse_token_list(body: &[u8]) -> Result<Vec<TokenInfo>, serde_json::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum TokenListResponse {
        Bare(Vec<TokenInfo>),
        Wrapped { tokens: Vec<TokenInfo> },
    }

    Ok(match serde_json::from_slice(body)? {
        TokenListResponse::Bare(tokens) => tokens,
        TokenListResponse::Wrapped { tokens } => tokens,
    })
}

#[async_trait::async_trait]
impl OneClickApi for DefaultOneClickApi {
    async fn tokens(&self) -> Result<Vec<TokenInfo>, OneClickError> {
        let body = self.get(self.url("/v0/tokens")).await?;
        Ok(parse_token_list(&body)?)
    }

    async fn dry_quote(&self, request: &QuoteRequest) -> Result<DryQuoteResponse, OneClickError> {
        let request = QuoteRequest {
            dry: true,
            ..request.clone()
        };
        let body = self.post(self.url("/v0/quote"), &request).await?;
        Ok(serde_json::from_slice(&body)?)
    }

    async fn quote(&self, request: &QuoteRequest) -> Result<QuoteResponse, OneClickError> {
        let request = QuoteRequest {
            dry: false,
            ..request.clone()
        };
        let body = self.post(self.url("/v0/quote"), &request).await?;
        Ok(serde_json::from_slice(&body)?)
    }

    async fn status(&self, deposit_address: &str) -> Result<StatusWithRaw, OneClickError> {
        let mut url = self.url("/v0/status");
        url.query_pairs_mut()
            .append_pair("depositAddress", deposit_address);
        let raw = self.get(url).await?;
        let parsed = serde_json::from_slice(&raw)?;
        Ok(StatusWithRaw { parsed, raw })
    }

    fn has_credential(&self) -> bool {
        self.bearer.is_some()
    }
}
