//! HTTP implementation of [`OrderApi`].

use std::sync::Arc;

use async_trait::async_trait;
use ququ_core::OrderId;
use reqwest::{RequestBuilder, Response};
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::broadcast;
use tracing::{debug, instrument, warn};
use url::Url;

use super::{
    ApiErrorBody, AuthEvent, CreatedOrder, NewOrder, OrderApi, OrderError, PaymentStatusUpdate,
};
use crate::config::OrderApiConfig;

/// Capacity of the auth event channel. Slow subscribers miss old events.
const AUTH_EVENT_CAPACITY: usize = 16;

/// REST client for the order API.
///
/// Cheap to clone; clones share the connection pool and the auth event
/// channel.
#[derive(Clone)]
pub struct HttpOrderClient {
    inner: Arc<HttpOrderClientInner>,
}

struct HttpOrderClientInner {
    client: reqwest::Client,
    base_url: Url,
    token: Option<SecretString>,
    auth_events: broadcast::Sender<AuthEvent>,
}

impl HttpOrderClient {
    /// Create a new order API client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &OrderApiConfig) -> Result<Self, OrderError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        let (auth_events, _) = broadcast::channel(AUTH_EVENT_CAPACITY);

        Ok(Self {
            inner: Arc::new(HttpOrderClientInner {
                client,
                base_url: config.base_url.clone(),
                token: config.token.clone(),
                auth_events,
            }),
        })
    }

    /// Receive an [`AuthEvent`] whenever the API rejects the token.
    #[must_use]
    pub fn subscribe_auth_events(&self) -> broadcast::Receiver<AuthEvent> {
        self.inner.auth_events.subscribe()
    }

    /// Base URL with `segments` appended as path segments.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, OrderError> {
        let mut url = self.inner.base_url.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|()| OrderError::Url(url::ParseError::RelativeUrlWithCannotBeABaseBase))?;
            path.pop_if_empty().extend(segments);
        }
        Ok(url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.inner.token {
            Some(token) => request.bearer_auth(token.expose_secret()),
            None => request,
        }
    }

    /// Pass success responses through; turn everything else into
    /// [`OrderError::Api`], publishing an auth event for 401/403.
    async fn check(&self, response: Response) -> Result<Response, OrderError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        if let Some(event) = AuthEvent::from_status(status.as_u16()) {
            // No subscribers is fine.
            let _ = self.inner.auth_events.send(event);
        }

        let text = response.text().await.unwrap_or_default();
        let body = serde_json::from_str::<ApiErrorBody>(&text).ok();
        warn!(status = status.as_u16(), body = %text, "Order API returned an error");

        Err(OrderError::Api {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl OrderApi for HttpOrderClient {
    #[instrument(skip(self, order), fields(items = order.items.len(), payment_id = %order.payment_id))]
    async fn create_order(&self, order: &NewOrder) -> Result<CreatedOrder, OrderError> {
        let url = self.endpoint(&["api", "orders"])?;
        let response = self
            .authorize(self.inner.client.post(url))
            .json(order)
            .send()
            .await?;
        let response = self.check(response).await?;

        let text = response.text().await?;
        let created: CreatedOrder = serde_json::from_str(&text)
            .map_err(|e| OrderError::InvalidResponse(format!("{e}: {text}")))?;

        debug!(order_id = %created.id, "Order created");
        Ok(created)
    }

    #[instrument(skip(self, update), fields(payment_id = %update.payment_id, status = %update.status))]
    async fn update_payment_status(
        &self,
        order_id: &OrderId,
        update: &PaymentStatusUpdate,
    ) -> Result<(), OrderError> {
        let url = self.endpoint(&["api", "orders", order_id.as_str(), "payment"])?;
        let response = self
            .authorize(self.inner.client.put(url))
            .json(update)
            .send()
            .await?;
        self.check(response).await?;

        debug!("Payment status recorded");
        Ok(())
    }
}
