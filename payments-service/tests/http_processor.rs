use mockito::Matcher;
use payments_service::processor::{ChargeParams, RefundParams};
use payments_service::{Currency, HttpProcessorClient, ProcessorClient, ProcessorError, RefundReason};
use secrecy::SecretString;
use std::collections::BTreeMap;
use std::time::Duration;

const API_KEY: &str = "sk_test_123";

fn client(server: &mockito::Server) -> HttpProcessorClient {
    HttpProcessorClient::new(server.url(), SecretString::new(API_KEY.to_string()), Duration::from_secs(5)).unwrap()
}

fn charge_params() -> ChargeParams {
    let mut metadata = BTreeMap::new();
    metadata.insert("order".to_string(), "A-17".to_string());
    ChargeParams {
        amount: 1000,
        currency: Currency::Usd,
        payment_method_id: "pm_card_visa".to_string(),
        customer_id: Some("cus_acme".to_string()),
        description: Some("Annual plan".to_string()),
        metadata,
        idempotency_key: "key-1".to_string(),
    }
}

#[tokio::test]
async fn test_charge_posts_form_with_idempotency_key() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/payment_intents")
        .match_header("authorization", format!("Bearer {API_KEY}").as_str())
        .match_header("idempotency-key", "key-1")
        .match_body(Matcher::AllOf(vec![
            Matcher::UrlEncoded("amount".into(), "1000".into()),
            Matcher::UrlEncoded("currency".into(), "usd".into()),
            Matcher::UrlEncoded("payment_method".into(), "pm_card_visa".into()),
            Matcher::UrlEncoded("confirm".into(), "true".into()),
            Matcher::UrlEncoded("customer".into(), "cus_acme".into()),
            Matcher::UrlEncoded("metadata[order]".into(), "A-17".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"id":"pi_123","object":"payment_intent","status":"succeeded"}"#)
        .create_async()
        .await;

    let receipt = client(&server).charge(&charge_params()).await.unwrap();

    assert_eq!(receipt.reference_id, "pi_123");
    assert_eq!(receipt.status, "succeeded");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_declined_charge() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/v1/payment_intents")
        .with_status(402)
        .with_header("content-type", "application/json")
        .with_body(r#"{"error":{"code":"card_declined","decline_code":"insufficient_funds","message":"Your card has insufficient funds."}}"#)
        .create_async()
        .await;

    let result = client(&server).charge(&charge_params()).await;

    assert_eq!(
        result,
        Err(ProcessorError::Declined {
            code: "insufficient_funds".to_string(),
            message: "Your card has insufficient funds.".to_string(),
        })
    );
}

#[tokio::test]
async fn test_server_error_and_garbage_responses() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/v1/payment_intents")
        .with_status(500)
        .with_body("upstream exploded")
        .create_async()
        .await;
    server
        .mock("POST", "/v1/refunds")
        .with_status(200)
        .with_body("not json")
        .create_async()
        .await;

    let api = client(&server);
    assert!(matches!(
        api.charge(&charge_params()).await,
        Err(ProcessorError::Api { status: 500, .. })
    ));

    let refund = RefundParams {
        charge_reference_id: "pi_123".to_string(),
        amount: 100,
        reason: RefundReason::Duplicate,
        idempotency_key: "refund-1".to_string(),
    };
    assert!(matches!(api.refund(&refund).await, Err(ProcessorError::InvalidResponse(_))));
}

#[tokio::test]
async fn test_refund_maps_reason() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/refunds")
        .match_header("idempotency-key", "refund-7")
        .match_body(Matcher::AllOf(vec![
            Matcher::UrlEncoded("payment_intent".into(), "pi_123".into()),
            Matcher::UrlEncoded("amount".into(), "250".into()),
            Matcher::UrlEncoded("reason".into(), "requested_by_customer".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"id":"re_9","object":"refund","status":"pending"}"#)
        .create_async()
        .await;

    let receipt = client(&server)
        .refund(&RefundParams {
            charge_reference_id: "pi_123".to_string(),
            amount: 250,
            reason: RefundReason::CustomerRequest,
            idempotency_key: "refund-7".to_string(),
        })
        .await
        .unwrap();

    assert_eq!(receipt.reference_id, "re_9");
    assert_eq!(receipt.status, "pending");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_payment_method_lookup() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/v1/payment_methods/pm_card_visa")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"id":"pm_card_visa","object":"payment_method","customer":"cus_acme"}"#)
        .create_async()
        .await;
    server
        .mock("GET", "/v1/payment_methods/pm_gone")
        .with_status(404)
        .with_header("content-type", "application/json")
        .with_body(r#"{"error":{"code":"resource_missing","message":"No such PaymentMethod"}}"#)
        .create_async()
        .await;

    let api = client(&server);
    let method = api.payment_method("pm_card_visa").await.unwrap();
    assert_eq!(method.customer_id.as_deref(), Some("cus_acme"));

    assert!(matches!(api.payment_method("pm_gone").await, Err(ProcessorError::NotFound(_))));
    // never interpolated into the request path
    assert!(matches!(api.payment_method("../v1/charges").await, Err(ProcessorError::NotFound(_))));
}

#[tokio::test]
async fn test_unreachable_processor_is_transport_error() {
    let api = HttpProcessorClient::new(
        "http://127.0.0.1:9",
        SecretString::new(API_KEY.to_string()),
        Duration::from_secs(2),
    )
    .unwrap();

    assert!(matches!(api.payment_method("pm_1").await, Err(ProcessorError::Transport(_))));
}
