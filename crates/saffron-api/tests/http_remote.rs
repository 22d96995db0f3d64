//! HttpBillingRemote against a local axum server.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use chrono::Utc;
use saffron_api::{HttpBillingRemote, IDEMPOTENCY_HEADER};
use saffron_billing::{BillingRemote, PaymentRequest, RemoteError, RemoteSettings};
use saffron_core::{
    Bill, IdempotencyKey, Money, OrderStatus, Payment, PaymentMethod, Table, TableStatus,
};
use serde_json::{json, Value};

// =============================================================================
// Mock Server
// =============================================================================

#[derive(Debug, Clone)]
struct Recorded {
    method: Method,
    path: String,
    idempotency_key: Option<String>,
    authorization: Option<String>,
    body: Value,
}

#[derive(Clone, Default)]
struct Mock {
    requests: Arc<Mutex<Vec<Recorded>>>,
    script: Arc<Mutex<VecDeque<(StatusCode, Value)>>>,
    delay: Option<Duration>,
}

impl Mock {
    fn respond(&self, status: StatusCode, body: Value) -> &Self {
        self.script.lock().unwrap().push_back((status, body));
        self
    }

    fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }
}

async fn record(
    State(mock): State<Mock>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };

    mock.requests.lock().unwrap().push(Recorded {
        method,
        path: uri.path().to_string(),
        idempotency_key: header(IDEMPOTENCY_HEADER),
        authorization: header("authorization"),
        body: serde_json::from_slice(&body).unwrap_or(Value::Null),
    });

    if let Some(delay) = mock.delay {
        tokio::time::sleep(delay).await;
    }

    let (status, body) = mock
        .script
        .lock()
        .unwrap()
        .pop_front()
        .unwrap_or((StatusCode::INTERNAL_SERVER_ERROR, json!({"message": "unscripted"})));
    (status, Json(body)).into_response()
}

async fn serve(mock: Mock) -> SocketAddr {
    let app = Router::new().fallback(record).with_state(mock);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn settings(addr: SocketAddr) -> RemoteSettings {
    RemoteSettings {
        base_url: format!("http://{}/api", addr),
        api_token: Some("secret-token".into()),
        timeout_secs: 5,
        max_retries: 2,
        initial_backoff_ms: 5,
        ..RemoteSettings::default()
    }
}

async fn remote_for(mock: &Mock) -> HttpBillingRemote {
    let addr = serve(mock.clone()).await;
    HttpBillingRemote::new(&settings(addr)).unwrap()
}

// =============================================================================
// Fixtures
// =============================================================================

fn bill_json(paid: bool) -> Value {
    serde_json::to_value(Bill {
        id: "bill-1".into(),
        order_id: "ord-1".into(),
        items: Vec::new(),
        subtotal: Money::from_cents(23000),
        tax: Money::from_cents(1150),
        service_charge: Money::zero(),
        discount: Money::zero(),
        total: Money::from_cents(24150),
        paid,
        created_at: Utc::now(),
    })
    .unwrap()
}

fn payment_json(key: &str) -> Value {
    serde_json::to_value(Payment {
        id: "pay-1".into(),
        bill_id: "bill-1".into(),
        method: PaymentMethod::Upi,
        transaction_ref: Some("UTR-88".into()),
        idempotency_key: key.into(),
        gateway_result: None,
        amount: Money::from_cents(24150),
        created_at: Utc::now(),
    })
    .unwrap()
}

fn table_json(id: &str, number: u32, status: TableStatus) -> Value {
    serde_json::to_value(Table {
        id: id.into(),
        table_number: number,
        status,
    })
    .unwrap()
}

// =============================================================================
// Endpoints
// =============================================================================

#[tokio::test]
async fn test_create_bill_sends_key_header_and_body() {
    let mock = Mock::default();
    mock.respond(StatusCode::CREATED, bill_json(false));
    let remote = remote_for(&mock).await;

    let key = IdempotencyKey::from_string("bill_abc");
    let bill = remote.create_bill("ord-1", &key).await.unwrap();
    assert_eq!(bill.id, "bill-1");
    assert_eq!(bill.total, Money::from_cents(24150));

    let requests = mock.requests();
    assert_eq!(requests.len(), 1);
    let sent = &requests[0];
    assert_eq!(sent.method, Method::POST);
    assert_eq!(sent.path, "/api/bills");
    assert_eq!(sent.idempotency_key.as_deref(), Some("bill_abc"));
    assert_eq!(sent.authorization.as_deref(), Some("Bearer secret-token"));
    assert_eq!(sent.body, json!({"orderId": "ord-1", "idempotencyKey": "bill_abc"}));
}

#[tokio::test]
async fn test_process_payment_body_is_camel_case() {
    let mock = Mock::default();
    mock.respond(StatusCode::OK, payment_json("pay_xyz"));
    let remote = remote_for(&mock).await;

    let request = PaymentRequest {
        bill_id: "bill-1".into(),
        idempotency_key: IdempotencyKey::from_string("pay_xyz"),
        method: PaymentMethod::Upi,
        transaction_ref: Some("UTR-88".into()),
        gateway_result: Some(json!({"status": "captured"})),
    };
    let payment = remote.process_payment(&request).await.unwrap();
    assert_eq!(payment.idempotency_key, "pay_xyz");

    let sent = &mock.requests()[0];
    assert_eq!(sent.path, "/api/payments");
    assert_eq!(sent.idempotency_key.as_deref(), Some("pay_xyz"));
    assert_eq!(sent.body["billId"], "bill-1");
    assert_eq!(sent.body["idempotencyKey"], "pay_xyz");
    assert_eq!(sent.body["transactionRef"], "UTR-88");
    assert_eq!(sent.body["gatewayResult"]["status"], "captured");
}

#[tokio::test]
async fn test_status_updates_use_patch() {
    let mock = Mock::default();
    mock.respond(
        StatusCode::OK,
        json!({"id": "ord-1", "tableNumber": 4, "items": [], "status": "served"}),
    )
    .respond(StatusCode::OK, table_json("t-4", 4, TableStatus::Available));
    let remote = remote_for(&mock).await;

    let order = remote
        .update_order_status("ord-1", OrderStatus::Served)
        .await
        .unwrap();
    assert_eq!(order.status, OrderStatus::Served);

    let table = remote
        .update_table_status("t-4", TableStatus::Available)
        .await
        .unwrap();
    assert_eq!(table.status, TableStatus::Available);

    let requests = mock.requests();
    assert_eq!(requests[0].method, Method::PATCH);
    assert_eq!(requests[0].path, "/api/orders/ord-1/status");
    assert_eq!(requests[0].body, json!({"status": "served"}));
    assert!(requests[0].idempotency_key.is_none());
    assert_eq!(requests[1].path, "/api/tables/t-4/status");
    assert_eq!(requests[1].body, json!({"status": "available"}));
}

#[tokio::test]
async fn test_list_tables() {
    let mock = Mock::default();
    mock.respond(
        StatusCode::OK,
        json!([
            table_json("t-1", 1, TableStatus::Available),
            table_json("t-4", 4, TableStatus::Occupied),
        ]),
    );
    let remote = remote_for(&mock).await;

    let tables = remote.list_tables().await.unwrap();
    assert_eq!(tables.len(), 2);
    assert_eq!(tables[1].id, "t-4");
    assert_eq!(mock.requests()[0].method, Method::GET);
}

// =============================================================================
// Error Mapping
// =============================================================================

#[tokio::test]
async fn test_error_statuses_map_to_kinds() {
    let mock = Mock::default();
    mock.respond(StatusCode::FORBIDDEN, json!({"message": "cashier only"}))
        .respond(StatusCode::UNPROCESSABLE_ENTITY, json!({"message": "order not served"}))
        .respond(StatusCode::NOT_FOUND, json!({"message": "no such bill"}))
        .respond(StatusCode::PAYMENT_REQUIRED, json!({"message": "card declined"}));
    let remote = remote_for(&mock).await;
    let key = IdempotencyKey::from_string("bill_k");

    assert_eq!(
        remote.create_bill("ord-1", &key).await.unwrap_err(),
        RemoteError::Unauthorized("cashier only".into())
    );
    assert_eq!(
        remote.create_bill("ord-1", &key).await.unwrap_err(),
        RemoteError::Validation("order not served".into())
    );
    assert_eq!(
        remote.create_bill("ord-1", &key).await.unwrap_err(),
        RemoteError::NotFound("no such bill".into())
    );
    assert_eq!(
        remote.create_bill("ord-1", &key).await.unwrap_err(),
        RemoteError::Gateway("card declined".into())
    );

    // None of these are retried
    assert_eq!(mock.requests().len(), 4);
}

#[tokio::test]
async fn test_undecodable_body_is_decode_error() {
    let mock = Mock::default();
    mock.respond(StatusCode::OK, json!({"unexpected": true}));
    let remote = remote_for(&mock).await;

    let err = remote
        .create_bill("ord-1", &IdempotencyKey::from_string("bill_k"))
        .await
        .unwrap_err();
    assert!(matches!(err, RemoteError::Decode(_)));
}

// =============================================================================
// Retries
// =============================================================================

#[tokio::test]
async fn test_transient_failure_retried_with_same_key() {
    let mock = Mock::default();
    mock.respond(StatusCode::SERVICE_UNAVAILABLE, json!({"message": "busy"}))
        .respond(StatusCode::CREATED, bill_json(false));
    let remote = remote_for(&mock).await;

    let bill = remote
        .create_bill("ord-1", &IdempotencyKey::from_string("bill_same"))
        .await
        .unwrap();
    assert_eq!(bill.id, "bill-1");

    let requests = mock.requests();
    assert_eq!(requests.len(), 2);
    assert!(requests
        .iter()
        .all(|r| r.idempotency_key.as_deref() == Some("bill_same")));
    assert_eq!(requests[0].body, requests[1].body);
}

#[tokio::test]
async fn test_retries_stop_at_limit() {
    let mock = Mock::default();
    for _ in 0..5 {
        mock.respond(StatusCode::INTERNAL_SERVER_ERROR, json!({"message": "down"}));
    }
    let remote = remote_for(&mock).await;

    let err = remote.list_tables().await.unwrap_err();
    assert_eq!(
        err,
        RemoteError::Server {
            status: 500,
            message: "down".into()
        }
    );
    // One attempt plus max_retries (2)
    assert_eq!(mock.requests().len(), 3);
}

#[tokio::test]
async fn test_bad_gateway_not_retried() {
    let mock = Mock::default();
    mock.respond(StatusCode::BAD_GATEWAY, json!({"message": "gateway down"}))
        .respond(StatusCode::OK, payment_json("pay_k"));
    let remote = remote_for(&mock).await;

    let request = PaymentRequest {
        bill_id: "bill-1".into(),
        idempotency_key: IdempotencyKey::from_string("pay_k"),
        method: PaymentMethod::Cash,
        transaction_ref: None,
        gateway_result: None,
    };
    let err = remote.process_payment(&request).await.unwrap_err();
    assert!(matches!(err, RemoteError::Gateway(_)));
    assert_eq!(mock.requests().len(), 1);
}

#[tokio::test]
async fn test_slow_server_times_out() {
    let mock = Mock {
        delay: Some(Duration::from_secs(3)),
        ..Mock::default()
    };
    mock.respond(StatusCode::OK, json!([]));
    let addr = serve(mock.clone()).await;

    let remote = HttpBillingRemote::new(&RemoteSettings {
        timeout_secs: 1,
        max_retries: 0,
        ..settings(addr)
    })
    .unwrap();

    let err = remote.list_tables().await.unwrap_err();
    assert!(matches!(err, RemoteError::Timeout(_)), "got {:?}", err);
}

#[tokio::test]
async fn test_connection_refused_is_network_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let remote = HttpBillingRemote::new(&RemoteSettings {
        max_retries: 1,
        ..settings(addr)
    })
    .unwrap();

    let err = remote.list_tables().await.unwrap_err();
    assert!(matches!(err, RemoteError::Network(_)), "got {:?}", err);
}
