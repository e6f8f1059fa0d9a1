use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use shared::{
    domain::{Order, Product, UserProfile},
    error::ErrorDetail,
    protocol::{LoginResponse, PlaceOrderRequest, RegisterRequest},
};
use tracing::debug;
use url::Url;

use crate::error::OrderServiceError;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Remote calls the controller depends on.
#[async_trait]
pub trait OrderService: Send + Sync {
    async fn fetch_menu(&self) -> Result<Vec<Product>, OrderServiceError>;
    async fn fetch_orders(&self, email: &str) -> Result<Vec<Order>, OrderServiceError>;
    async fn login(&self, email: &str, passcode: &str) -> Result<UserProfile, OrderServiceError>;
    async fn register(&self, request: &RegisterRequest) -> Result<(), OrderServiceError>;
    async fn place_order(&self, request: &PlaceOrderRequest) -> Result<(), OrderServiceError>;
}

pub struct HttpOrderService {
    http: Client,
    base_url: Url,
}

impl HttpOrderService {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, OrderServiceError> {
        let base_url = parse_base_url(base_url)?;
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }
}

fn parse_base_url(raw: &str) -> Result<Url, OrderServiceError> {
    let invalid = |reason: String| OrderServiceError::InvalidBaseUrl {
        url: raw.to_string(),
        reason,
    };
    let url = Url::parse(raw.trim()).map_err(|err| invalid(err.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme '{}'", url.scheme())));
    }
    if url.cannot_be_a_base() {
        return Err(invalid("url cannot carry a path".to_string()));
    }
    Ok(url)
}

async fn ensure_success(response: Response) -> Result<Response, OrderServiceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<ErrorDetail>(&body)
        .ok()
        .and_then(|parsed| parsed.message().map(str::to_string));
    debug!(status = status.as_u16(), ?detail, "order service rejected request");
    Err(OrderServiceError::Status {
        status: status.as_u16(),
        detail,
    })
}

#[async_trait]
impl OrderService for HttpOrderService {
    async fn fetch_menu(&self) -> Result<Vec<Product>, OrderServiceError> {
        let res = self.http.get(self.endpoint(&["menu"])).send().await?;
        Ok(ensure_success(res).await?.json().await?)
    }

    async fn fetch_orders(&self, email: &str) -> Result<Vec<Order>, OrderServiceError> {
        let res = self
            .http
            .get(self.endpoint(&["orders", email]))
            .send()
            .await?;
        Ok(ensure_success(res).await?.json().await?)
    }

    async fn login(&self, email: &str, passcode: &str) -> Result<UserProfile, OrderServiceError> {
        let res = self
            .http
            .post(self.endpoint(&["login"]))
            .query(&[("email", email), ("passcode", passcode)])
            .send()
            .await?;
        let body: LoginResponse = ensure_success(res).await?.json().await?;
        Ok(body.into())
    }

    async fn register(&self, request: &RegisterRequest) -> Result<(), OrderServiceError> {
        let res = self
            .http
            .post(self.endpoint(&["register"]))
            .json(request)
            .send()
            .await?;
        ensure_success(res).await?;
        Ok(())
    }

    async fn place_order(&self, request: &PlaceOrderRequest) -> Result<(), OrderServiceError> {
        let res = self
            .http
            .post(self.endpoint(&["orders"]))
            .json(request)
            .send()
            .await?;
        ensure_success(res).await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/api_tests.rs"]
mod tests;
