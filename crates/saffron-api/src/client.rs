//! # HTTP Client
//!
//! ```text
//!  port call ──► endpoint(segments) ──► send() ─┬─► 2xx ──► decode JSON
//!                                              │
//!                                              ├─► transient ──► backoff ──► send() again
//!                                              │                 (same body, same key)
//!                                              └─► other ──► RemoteError
//! ```

use std::time::Duration;

use async_trait::async_trait;
use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use reqwest::{Client, RequestBuilder, StatusCode};
use saffron_billing::{BillingRemote, PaymentRequest, RemoteError, RemoteResult, RemoteSettings};
use saffron_core::{Bill, IdempotencyKey, Order, OrderStatus, Payment, Table, TableStatus};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};
use url::Url;

use crate::error::{ApiClientError, ApiClientResult};

/// Header carrying the client-generated idempotency key.
pub const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

const MAX_BACKOFF: Duration = Duration::from_secs(5);

// =============================================================================
// Wire Bodies
// =============================================================================

#[derive(Debug, Serialize)]
struct StatusUpdate<S> {
    status: S,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateBill<'a> {
    order_id: &'a str,
    idempotency_key: &'a IdempotencyKey,
}

// =============================================================================
// Client
// =============================================================================

/// Back-office API client.
#[derive(Debug, Clone)]
pub struct HttpBillingRemote {
    client: Client,
    base_url: Url,
    token: Option<String>,
    max_retries: u32,
    initial_backoff: Duration,
}

impl HttpBillingRemote {
    /// Builds a client from `[remote]` settings.
    ///
    /// ## Errors
    /// - [`ApiClientError::InvalidBaseUrl`]: unparseable or non-http(s) URL
    /// - [`ApiClientError::Build`]: reqwest could not build its client
    pub fn new(settings: &RemoteSettings) -> ApiClientResult<Self> {
        let base_url = parse_base_url(&settings.base_url)?;

        let client = Client::builder()
            .timeout(settings.timeout())
            .connect_timeout(settings.connect_timeout())
            .user_agent(concat!("saffron-pos/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let token = settings
            .api_token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string);

        Ok(HttpBillingRemote {
            client,
            base_url,
            token,
            max_retries: settings.max_retries,
            initial_backoff: settings.initial_backoff(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Appends path segments to the base URL, percent-encoding each one.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: self.initial_backoff,
            max_interval: MAX_BACKOFF,
            multiplier: 2.0,
            max_elapsed_time: None,
            ..Default::default()
        }
    }

    /// Sends a request built by `build`, retrying transient failures.
    ///
    /// `build` is called once per attempt so every attempt carries an
    /// identical body and headers.
    async fn send<T, F>(&self, operation: &'static str, build: F) -> RemoteResult<T>
    where
        T: DeserializeOwned,
        F: Fn() -> RequestBuilder,
    {
        let mut backoff = self.backoff();
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            debug!(operation, attempt, "Calling back office");

            let err = match self.send_once(build()).await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if !err.is_transient() || attempt > self.max_retries {
                return Err(err);
            }

            let Some(delay) = backoff.next_backoff() else {
                return Err(err);
            };

            warn!(
                operation,
                attempt,
                error = %err,
                delay_ms = delay.as_millis() as u64,
                "Transient failure, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }

    async fn send_once<T: DeserializeOwned>(&self, request: RequestBuilder) -> RemoteResult<T> {
        let request = match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };

        let response = request.send().await.map_err(transport_error)?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, &body));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| RemoteError::Decode(e.to_string()))
    }
}

#[async_trait]
impl BillingRemote for HttpBillingRemote {
    async fn update_order_status(&self, order_id: &str, status: OrderStatus) -> RemoteResult<Order> {
        let url = self.endpoint(&["orders", order_id, "status"]);
        let body = StatusUpdate { status };
        self.send("update_order_status", || {
            self.client.patch(url.clone()).json(&body)
        })
        .await
    }

    async fn create_bill(&self, order_id: &str, key: &IdempotencyKey) -> RemoteResult<Bill> {
        let url = self.endpoint(&["bills"]);
        let body = CreateBill {
            order_id,
            idempotency_key: key,
        };
        self.send("create_bill", || {
            self.client
                .post(url.clone())
                .header(IDEMPOTENCY_HEADER, key.as_str())
                .json(&body)
        })
        .await
    }

    async fn process_payment(&self, request: &PaymentRequest) -> RemoteResult<Payment> {
        let url = self.endpoint(&["payments"]);
        self.send("process_payment", || {
            self.client
                .post(url.clone())
                .header(IDEMPOTENCY_HEADER, request.idempotency_key.as_str())
                .json(request)
        })
        .await
    }

    async fn update_table_status(&self, table_id: &str, status: TableStatus) -> RemoteResult<Table> {
        let url = self.endpoint(&["tables", table_id, "status"]);
        let body = StatusUpdate { status };
        self.send("update_table_status", || {
            self.client.patch(url.clone()).json(&body)
        })
        .await
    }

    async fn list_tables(&self) -> RemoteResult<Vec<Table>> {
        let url = self.endpoint(&["tables"]);
        self.send("list_tables", || self.client.get(url.clone())).await
    }
}

// =============================================================================
// Error Mapping
// =============================================================================

fn parse_base_url(raw: &str) -> ApiClientResult<Url> {
    let invalid = |reason: String| ApiClientError::InvalidBaseUrl {
        url: raw.to_string(),
        reason,
    };

    let url = Url::parse(raw.trim()).map_err(|e| invalid(e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") || url.cannot_be_a_base() {
        return Err(invalid(format!("unsupported scheme '{}'", url.scheme())));
    }
    Ok(url)
}

fn transport_error(err: reqwest::Error) -> RemoteError {
    if err.is_timeout() {
        RemoteError::Timeout(err.to_string())
    } else if err.is_decode() {
        RemoteError::Decode(err.to_string())
    } else {
        RemoteError::Network(err.to_string())
    }
}

/// Maps a non-2xx response onto the port's error kinds.
fn status_error(status: StatusCode, body: &str) -> RemoteError {
    let message = error_message(status, body);
    match status.as_u16() {
        401 | 403 => RemoteError::Unauthorized(message),
        400 | 422 => RemoteError::Validation(message),
        404 => RemoteError::NotFound(message),
        402 | 502 => RemoteError::Gateway(message),
        code => RemoteError::Server {
            status: code,
            message,
        },
    }
}

/// Prefers a `message` or `error` field from a JSON body, then the raw body,
/// then the status reason.
fn error_message(status: StatusCode, body: &str) -> String {
    let from_json = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            ["message", "error"]
                .iter()
                .find_map(|field| value.get(field)?.as_str().map(str::to_string))
        })
        .filter(|m| !m.trim().is_empty());

    if let Some(message) = from_json {
        return message;
    }

    let body = body.trim();
    if body.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("no response body")
            .to_string()
    } else {
        body.to_string()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(base_url: &str) -> RemoteSettings {
        RemoteSettings {
            base_url: base_url.to_string(),
            ..RemoteSettings::default()
        }
    }

    #[test]
    fn test_endpoint_keeps_base_path() {
        let remote = HttpBillingRemote::new(&settings("http://pos.local/api")).unwrap();
        assert_eq!(
            remote.endpoint(&["orders", "ord-1", "status"]).as_str(),
            "http://pos.local/api/orders/ord-1/status"
        );

        let slashed = HttpBillingRemote::new(&settings("http://pos.local/api/")).unwrap();
        assert_eq!(
            slashed.endpoint(&["bills"]).as_str(),
            "http://pos.local/api/bills"
        );
    }

    #[test]
    fn test_endpoint_encodes_ids() {
        let remote = HttpBillingRemote::new(&settings("http://pos.local/api")).unwrap();
        assert_eq!(
            remote.endpoint(&["tables", "a/b c", "status"]).as_str(),
            "http://pos.local/api/tables/a%2Fb%20c/status"
        );
    }

    #[test]
    fn test_rejects_bad_base_url() {
        assert!(matches!(
            HttpBillingRemote::new(&settings("not a url")),
            Err(ApiClientError::InvalidBaseUrl { .. })
        ));
        assert!(matches!(
            HttpBillingRemote::new(&settings("ftp://pos.local")),
            Err(ApiClientError::InvalidBaseUrl { .. })
        ));
    }

    #[test]
    fn test_blank_token_ignored() {
        let mut s = settings("http://pos.local/api");
        s.api_token = Some("  ".into());
        let remote = HttpBillingRemote::new(&s).unwrap();
        assert!(remote.token.is_none());
    }

    #[test]
    fn test_status_mapping() {
        let cases = [
            (StatusCode::UNAUTHORIZED, "unauthorized"),
            (StatusCode::FORBIDDEN, "unauthorized"),
            (StatusCode::BAD_REQUEST, "validation"),
            (StatusCode::UNPROCESSABLE_ENTITY, "validation"),
            (StatusCode::NOT_FOUND, "not_found"),
            (StatusCode::PAYMENT_REQUIRED, "gateway"),
            (StatusCode::BAD_GATEWAY, "gateway"),
            (StatusCode::CONFLICT, "server"),
            (StatusCode::SERVICE_UNAVAILABLE, "server"),
        ];

        for (status, expected) in cases {
            let kind = match status_error(status, "") {
                RemoteError::Unauthorized(_) => "unauthorized",
                RemoteError::Validation(_) => "validation",
                RemoteError::NotFound(_) => "not_found",
                RemoteError::Gateway(_) => "gateway",
                RemoteError::Server { .. } => "server",
                other => panic!("unexpected {:?}", other),
            };
            assert_eq!(kind, expected, "status {}", status);
        }
    }

    #[test]
    fn test_error_message_sources() {
        assert_eq!(
            error_message(StatusCode::BAD_REQUEST, r#"{"message":"discount too large"}"#),
            "discount too large"
        );
        assert_eq!(
            error_message(StatusCode::BAD_REQUEST, r#"{"error":"bad order"}"#),
            "bad order"
        );
        assert_eq!(error_message(StatusCode::BAD_REQUEST, " plain text "), "plain text");
        assert_eq!(error_message(StatusCode::NOT_FOUND, ""), "Not Found");
    }
}
