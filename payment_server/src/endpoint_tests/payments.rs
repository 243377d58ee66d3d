use std::sync::Arc;

use actix_web::{http::StatusCode, test, test::TestRequest, web, web::ServiceConfig, App};
use futures::{stream, StreamExt};
use payment_engine::{
    memory::MemoryBackend,
    registry::TransactionRegistry,
    traits::{OrderStoreError, PaymentOrder},
    types::{TxnState, Uti},
    PaymentFlowApi,
};
use serde_json::json;
use tpc_common::Secret;

use super::{
    helpers::{get_request, post_request},
    mocks::{sale_response, MockBackend, MockGateway},
};
use crate::routes::{
    CancelPaymentRoute,
    CompletePaymentRoute,
    InitiatePaymentRoute,
    PaymentEventsRoute,
    PaymentStatusRoute,
};

fn order_42() -> PaymentOrder {
    PaymentOrder {
        id: 42,
        pos_reference: "K-42".to_string(),
        amount_total: 10.50,
        currency: "GBP".to_string(),
        decimal_places: 2,
        access_token: Secret::new("tok".to_string()),
    }
}

#[actix_web::test]
async fn initiate_payment_happy_path() {
    let _ = env_logger::try_init().ok();
    let body = json!({"order_id": 42, "access_token": "tok"});
    let (status, body) = post_request("/payment/initiate", body, configure_initiate).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    let response: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(response["uti"], "abc-123");
    assert_eq!(response["amount"], 10.5);
    assert_eq!(response["amount_smallest_unit"], 1050);
    assert_eq!(response["currency"], "GBP");
    assert_eq!(response["pos_reference"], "K-42");
    assert_eq!(response["access_token"], "tok");
}

#[actix_web::test]
async fn initiate_payment_with_bad_token_is_unauthorized() {
    let _ = env_logger::try_init().ok();
    let body = json!({"order_id": 42, "access_token": "wrong"});
    let (status, body) = post_request("/payment/initiate", body, configure_denied).await.expect("Request failed");
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, r#"{"error":"Unauthorized. Invalid order or access token"}"#);
}

fn configure_initiate(cfg: &mut ServiceConfig) {
    let mut gateway = MockGateway::new();
    gateway.expect_sale().returning(|_, _| Ok(sale_response()));
    gateway.expect_terminal_id().return_const("T1".to_string());
    let mut backend = MockBackend::new();
    backend.expect_order_for_payment().returning(|_, _| Ok(order_42()));
    let api = PaymentFlowApi::new(gateway, backend, Arc::new(TransactionRegistry::new()));
    cfg.service(InitiatePaymentRoute::<MockGateway, MockBackend>::new()).app_data(web::Data::new(api));
}

fn configure_denied(cfg: &mut ServiceConfig) {
    let gateway = MockGateway::new();
    let mut backend = MockBackend::new();
    backend.expect_order_for_payment().returning(|_, _| Err(OrderStoreError::AccessDenied));
    let api = PaymentFlowApi::new(gateway, backend, Arc::new(TransactionRegistry::new()));
    cfg.service(InitiatePaymentRoute::<MockGateway, MockBackend>::new()).app_data(web::Data::new(api));
}

#[actix_web::test]
async fn complete_with_a_missing_field_is_rejected() {
    let _ = env_logger::try_init().ok();
    let body = json!({
        "order_id": 42,
        "access_token": "tok",
        "transaction_data": {
            "uti": "abc-123",
            "bank_id_no": "412345",
            "card_no_4digit": "1111"
        }
    });
    let (status, body) = post_request("/payment/complete", body, configure_complete_mocks).await.expect("Request failed");
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, r#"{"error":"Invalid request. Missing required field: auth_code"}"#);
}

// Validation happens before any collaborator is touched, so the mocks carry no expectations.
fn configure_complete_mocks(cfg: &mut ServiceConfig) {
    let api = PaymentFlowApi::new(MockGateway::new(), MockBackend::new(), Arc::new(TransactionRegistry::new()));
    cfg.service(CompletePaymentRoute::<MockGateway, MockBackend>::new()).app_data(web::Data::new(api));
}

#[actix_web::test]
async fn complete_payment_is_idempotent() {
    let _ = env_logger::try_init().ok();
    let mut gateway = MockGateway::new();
    gateway.expect_sale().returning(|_, _| Ok(sale_response()));
    gateway.expect_terminal_id().return_const("T1".to_string());
    let memory = MemoryBackend::new();
    memory.add_order(order_42());
    let api = PaymentFlowApi::new(gateway, memory, Arc::new(TransactionRegistry::new()));
    let app = App::new()
        .app_data(web::Data::new(api))
        .service(InitiatePaymentRoute::<MockGateway, MemoryBackend>::new())
        .service(CompletePaymentRoute::<MockGateway, MemoryBackend>::new());
    let service = test::init_service(app).await;

    let req = TestRequest::post()
        .uri("/payment/initiate")
        .set_json(json!({"order_id": 42, "access_token": "tok"}))
        .to_request();
    let res = test::call_service(&service, req).await;
    assert_eq!(res.status(), StatusCode::OK);

    let complete_body = json!({
        "order_id": 42,
        "access_token": "tok",
        "transaction_data": {
            "uti": "abc-123",
            "bank_id_no": "412345",
            "card_no_4digit": "1111",
            "auth_code": "AUTH01",
            "cardholder_receipt": "RECEIPT"
        }
    });
    let expected = json!({"status": "success", "order_id": 42, "pos_reference": "K-42", "amount_total": 10.5});
    for _ in 0..2 {
        let req = TestRequest::post().uri("/payment/complete").set_json(complete_body.clone()).to_request();
        let res = test::call_service(&service, req).await;
        assert_eq!(res.status(), StatusCode::OK);
        let body: serde_json::Value = test::read_body_json(res).await;
        assert_eq!(body, expected);
    }
}

#[actix_web::test]
async fn status_reports_the_gateway_snapshot() {
    let _ = env_logger::try_init().ok();
    let (status, body) = get_request("/payment/status/abc-123", configure_status).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    let response: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(response["status"], "approved");
    assert_eq!(response["transApproved"], true);
    assert_eq!(response["auth_code"], "AUTH01");
}

fn configure_status(cfg: &mut ServiceConfig) {
    let mut gateway = MockGateway::new();
    gateway.expect_poll_status().returning(|_| {
        Ok(serde_json::from_value(json!({"transApproved": true, "auth_code": "AUTH01"})).unwrap())
    });
    let api = PaymentFlowApi::new(gateway, MockBackend::new(), Arc::new(TransactionRegistry::new()));
    cfg.service(PaymentStatusRoute::<MockGateway, MockBackend>::new()).app_data(web::Data::new(api));
}

#[actix_web::test]
async fn cancel_reports_gateway_acknowledgement() {
    let _ = env_logger::try_init().ok();
    let body = json!({"uti": "abc-123"});
    let (status, body) = post_request("/payment/cancel", body, configure_cancel).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, r#"{"status":"cancelled"}"#);
}

fn configure_cancel(cfg: &mut ServiceConfig) {
    let mut gateway = MockGateway::new();
    gateway.expect_cancel().returning(|_| Ok(()));
    let api = PaymentFlowApi::new(gateway, MockBackend::new(), Arc::new(TransactionRegistry::new()));
    cfg.service(CancelPaymentRoute::<MockGateway, MockBackend>::new()).app_data(web::Data::new(api));
}

#[actix_web::test]
async fn cancel_without_a_uti_targets_the_sole_pending_transaction() {
    let _ = env_logger::try_init().ok();
    let mut gateway = MockGateway::new();
    gateway.expect_sale().returning(|_, _| Ok(sale_response()));
    gateway.expect_terminal_id().return_const("T1".to_string());
    gateway.expect_cancel().returning(|_| Ok(()));
    let memory = MemoryBackend::new();
    memory.add_order(order_42());
    let api = PaymentFlowApi::new(gateway, memory, Arc::new(TransactionRegistry::new()));
    let registry = Arc::clone(api.registry());
    let app = App::new()
        .app_data(web::Data::new(api))
        .service(InitiatePaymentRoute::<MockGateway, MemoryBackend>::new())
        .service(CancelPaymentRoute::<MockGateway, MemoryBackend>::new());
    let service = test::init_service(app).await;

    let req = TestRequest::post()
        .uri("/payment/initiate")
        .set_json(json!({"order_id": 42, "access_token": "tok"}))
        .to_request();
    let res = test::call_service(&service, req).await;
    assert_eq!(res.status(), StatusCode::OK);

    let req = TestRequest::post().uri("/payment/cancel").set_json(json!({})).to_request();
    let res = test::call_service(&service, req).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = test::read_body_json(res).await;
    assert_eq!(body, json!({"status": "cancelled"}));
    assert_eq!(registry.get(&Uti("abc-123".to_string())).unwrap().state, TxnState::Cancelled);
}

#[actix_web::test]
async fn cancel_without_a_uti_and_nothing_pending_is_not_found() {
    let _ = env_logger::try_init().ok();
    let (status, body) = post_request("/payment/cancel", json!({}), configure_cancel_empty).await.expect("Request failed");
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, r#"{"error":"The data was not found. There is no pending transaction to cancel"}"#);
}

fn configure_cancel_empty(cfg: &mut ServiceConfig) {
    let api = PaymentFlowApi::new(MockGateway::new(), MockBackend::new(), Arc::new(TransactionRegistry::new()));
    cfg.service(CancelPaymentRoute::<MockGateway, MockBackend>::new()).app_data(web::Data::new(api));
}

#[actix_web::test]
async fn event_stream_for_an_unknown_transaction_is_not_found() {
    let _ = env_logger::try_init().ok();
    let (status, body) = get_request("/payment/events/nope", configure_events_empty).await.expect("Request failed");
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, r#"{"error":"The data was not found. Transaction nope"}"#);
}

fn configure_events_empty(cfg: &mut ServiceConfig) {
    let api = PaymentFlowApi::new(MockGateway::new(), MockBackend::new(), Arc::new(TransactionRegistry::new()));
    cfg.service(PaymentEventsRoute::<MockGateway, MockBackend>::new()).app_data(web::Data::new(api));
}

#[actix_web::test]
async fn event_stream_relays_gateway_lines() {
    let _ = env_logger::try_init().ok();
    let mut gateway = MockGateway::new();
    gateway.expect_sale().returning(|_, _| Ok(sale_response()));
    gateway.expect_terminal_id().return_const("T1".to_string());
    gateway.expect_open_event_stream().returning(|_| {
        let lines = vec![
            Ok(r#"data: {"status_code": "connected"}"#.to_string()),
            Ok(r#"data: {"status_code": "206"}"#.to_string()),
        ];
        Ok(stream::iter(lines).boxed())
    });
    let memory = MemoryBackend::new();
    memory.add_order(order_42());
    let api = PaymentFlowApi::new(gateway, memory, Arc::new(TransactionRegistry::new()));
    let app = App::new()
        .app_data(web::Data::new(api))
        .service(InitiatePaymentRoute::<MockGateway, MemoryBackend>::new())
        .service(PaymentEventsRoute::<MockGateway, MemoryBackend>::new());
    let service = test::init_service(app).await;

    let req = TestRequest::post()
        .uri("/payment/initiate")
        .set_json(json!({"order_id": 42, "access_token": "tok"}))
        .to_request();
    let res = test::call_service(&service, req).await;
    assert_eq!(res.status(), StatusCode::OK);

    let req = TestRequest::get().uri("/payment/events/abc-123").to_request();
    let res = test::call_service(&service, req).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers().get("content-type").unwrap(), "text/event-stream");
    let body = test::read_body(res).await;
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert_eq!(text, "data: {\"status_code\": \"connected\"}\n\ndata: {\"status_code\": \"206\"}\n\n");
}
