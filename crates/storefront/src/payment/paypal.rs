//! PayPal Orders v2 client.
//!
//! Uses OAuth2 client credentials. The access token is cached with `moka`
//! until shortly before PayPal says it expires.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use moka::Expiry;
use moka::future::Cache;
use reqwest::header::CONTENT_TYPE;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};
use url::Url;

use super::{CaptureResult, PaymentCapture, PaymentError, RemoteOrderHandle, RemoteOrderRequest};
use crate::config::PayPalConfig;

const TOKEN_CACHE_KEY: &str = "access_token";
/// Tokens are refreshed this long before PayPal's stated expiry.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const LOCALE: &str = "en-GB";

// =============================================================================
// Wire types
// =============================================================================

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: u64,
}

#[derive(Debug, Serialize)]
struct CreateOrderBody<'a> {
    intent: &'static str,
    purchase_units: [PurchaseUnit<'a>; 1],
    application_context: ApplicationContext<'a>,
}

#[derive(Debug, Serialize)]
struct PurchaseUnit<'a> {
    amount: Amount,
    shipping: Shipping<'a>,
}

#[derive(Debug, Serialize)]
struct Amount {
    currency_code: &'static str,
    value: String,
}

#[derive(Debug, Serialize)]
struct Shipping<'a> {
    name: ShippingName<'a>,
    address: ShippingAddress<'a>,
}

#[derive(Debug, Serialize)]
struct ShippingName<'a> {
    full_name: &'a str,
}

#[derive(Debug, Serialize)]
struct ShippingAddress<'a> {
    address_line_1: &'a str,
    admin_area_1: &'a str,
    admin_area_2: &'a str,
    postal_code: &'a str,
    country_code: &'a str,
}

#[derive(Debug, Serialize)]
struct ApplicationContext<'a> {
    shipping_preference: &'static str,
    locale: &'static str,
    brand_name: &'a str,
    landing_page: &'static str,
    user_action: &'static str,
    return_url: &'a str,
    cancel_url: &'a str,
}

#[derive(Debug, Deserialize)]
struct OrderResponse {
    id: String,
    #[serde(default)]
    status: String,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorResponse {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    details: Vec<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    issue: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

impl ErrorResponse {
    fn summary(&self) -> String {
        let details: Vec<&str> = self
            .details
            .iter()
            .filter_map(|d| d.description.as_deref().or(d.issue.as_deref()))
            .collect();
        let head = self
            .message
            .as_deref()
            .or(self.name.as_deref())
            .unwrap_or("unknown error");
        if details.is_empty() {
            head.to_string()
        } else {
            format!("{head} ({})", details.join(", "))
        }
    }
}

// =============================================================================
// Token cache
// =============================================================================

#[derive(Clone)]
struct AccessToken {
    value: SecretString,
    ttl: Duration,
}

/// Expires each cached token after its own lifetime.
struct TokenExpiry;

impl Expiry<&'static str, AccessToken> for TokenExpiry {
    fn expire_after_create(
        &self,
        _key: &&'static str,
        value: &AccessToken,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

// =============================================================================
// PayPalClient
// =============================================================================

/// Client for the PayPal Orders v2 REST API.
#[derive(Clone)]
pub struct PayPalClient {
    inner: Arc<PayPalClientInner>,
}

struct PayPalClientInner {
    client: reqwest::Client,
    api_base: Url,
    client_id: String,
    client_secret: SecretString,
    return_url: String,
    cancel_url: String,
    token: Cache<&'static str, AccessToken>,
}

impl PayPalClient {
    /// Create a new PayPal client. `site_base` is the storefront's public URL,
    /// used for the return and cancel links.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &PayPalConfig, site_base: &Url) -> Result<Self, PaymentError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        let token = Cache::builder()
            .max_capacity(1)
            .expire_after(TokenExpiry)
            .build();

        Ok(Self {
            inner: Arc::new(PayPalClientInner {
                client,
                api_base: config.api_base.clone(),
                client_id: config.client_id.clone(),
                client_secret: config.client_secret.clone(),
                return_url: site_url(site_base, "order-confirmation"),
                cancel_url: site_url(site_base, "checkout"),
                token,
            }),
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, PaymentError> {
        api_url(&self.inner.api_base, segments)
    }

    /// Get a bearer token, from cache when possible.
    async fn access_token(&self) -> Result<SecretString, PaymentError> {
        if let Some(token) = self.inner.token.get(&TOKEN_CACHE_KEY).await {
            return Ok(token.value);
        }

        let response = self
            .inner
            .client
            .post(self.endpoint(&["v1", "oauth2", "token"])?)
            .basic_auth(
                &self.inner.client_id,
                Some(self.inner.client_secret.expose_secret()),
            )
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;
        let response = check(response).await?;
        let body: TokenResponse = response.json().await?;

        let ttl = Duration::from_secs(body.expires_in).saturating_sub(TOKEN_EXPIRY_MARGIN);
        let value = SecretString::from(body.access_token);
        if !ttl.is_zero() {
            self.inner
                .token
                .insert(
                    TOKEN_CACHE_KEY,
                    AccessToken {
                        value: value.clone(),
                        ttl,
                    },
                )
                .await;
        }

        debug!(ttl_secs = ttl.as_secs(), "PayPal access token refreshed");
        Ok(value)
    }
}

#[async_trait]
impl PaymentCapture for PayPalClient {
    #[instrument(skip(self, request), fields(amount = %request.amount_value(), currency = request.currency.code()))]
    async fn create_remote_order(
        &self,
        request: &RemoteOrderRequest,
    ) -> Result<RemoteOrderHandle, PaymentError> {
        let token = self.access_token().await?;
        let shipping = &request.shipping;
        let body = CreateOrderBody {
            intent: "CAPTURE",
            purchase_units: [PurchaseUnit {
                amount: Amount {
                    currency_code: request.currency.code(),
                    value: request.amount_value(),
                },
                shipping: Shipping {
                    name: ShippingName {
                        full_name: &shipping.full_name,
                    },
                    address: ShippingAddress {
                        address_line_1: &shipping.address_line,
                        admin_area_1: &shipping.region,
                        admin_area_2: &shipping.city,
                        postal_code: &shipping.postal_code,
                        country_code: &shipping.country_code,
                    },
                },
            }],
            application_context: ApplicationContext {
                shipping_preference: "SET_PROVIDED_ADDRESS",
                locale: LOCALE,
                brand_name: &request.brand_name,
                landing_page: "LOGIN",
                user_action: "PAY_NOW",
                return_url: &self.inner.return_url,
                cancel_url: &self.inner.cancel_url,
            },
        };

        let response = self
            .inner
            .client
            .post(self.endpoint(&["v2", "checkout", "orders"])?)
            .bearer_auth(token.expose_secret())
            .json(&body)
            .send()
            .await?;
        let order: OrderResponse = check(response).await?.json().await?;

        debug!(remote_order_id = %order.id, status = %order.status, "PayPal order created");
        Ok(RemoteOrderHandle {
            id: order.id.into(),
        })
    }

    #[instrument(skip(self), fields(remote_order_id = %handle.id))]
    async fn capture_approved(
        &self,
        handle: &RemoteOrderHandle,
    ) -> Result<CaptureResult, PaymentError> {
        if !is_order_id(handle.id.as_str()) {
            return Err(PaymentError::Provider(format!(
                "malformed remote order id '{}'",
                handle.id
            )));
        }

        let token = self.access_token().await?;
        let url = self.endpoint(&["v2", "checkout", "orders", handle.id.as_str(), "capture"])?;
        let response = self
            .inner
            .client
            .post(url)
            .bearer_auth(token.expose_secret())
            .header(CONTENT_TYPE, "application/json")
            .body("{}")
            .send()
            .await?;
        let order: OrderResponse = check(response).await?.json().await?;

        debug!(status = %order.status, "PayPal payment captured");
        Ok(CaptureResult {
            id: order.id,
            status: order.status,
        })
    }
}

/// Turn non-2xx responses into [`PaymentError::Rejected`].
async fn check(response: reqwest::Response) -> Result<reqwest::Response, PaymentError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let body: ErrorResponse = serde_json::from_str(&text).unwrap_or_default();
    let message = body.summary();
    warn!(status = status.as_u16(), %message, "PayPal request failed");

    Err(PaymentError::Rejected {
        status: status.as_u16(),
        message,
    })
}

/// `base` with `segments` appended, each one percent-encoded as a single
/// path segment.
fn api_url(base: &Url, segments: &[&str]) -> Result<Url, PaymentError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|()| PaymentError::Provider(format!("invalid PayPal API base '{base}'")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// PayPal order ids are short runs of letters, digits and dashes.
fn is_order_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 64
        && id.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-')
}

fn site_url(base: &Url, path: &str) -> String {
    let mut url = base.clone();
    url.set_path(&format!("/{path}"));
    url.set_query(None);
    url.to_string()
}
