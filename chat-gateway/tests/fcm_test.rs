use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use chat_gateway::config::{ChatConfig, FcmConfig};
use chat_gateway::services::store::StoreHealth;
use chat_gateway::services::{
    FcmLegacyProvider, ProviderError, PushMessage, PushProvider, PushTarget,
};
use chat_gateway::startup::{build_router, AppState};
use secrecy::Secret;
use serde_json::json;
use std::collections::HashMap;
use tower::util::ServiceExt;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn provider(server: &MockServer) -> FcmLegacyProvider {
    FcmLegacyProvider::new(FcmConfig {
        server_key: Secret::new("server-key".to_string()),
        send_url: format!("{}/fcm/send", server.uri()),
        iid_url: format!("{}/iid", server.uri()),
        enabled: true,
    })
}

fn topic_push() -> PushMessage {
    let mut data = HashMap::new();
    data.insert("subject".to_string(), "New post".to_string());
    PushMessage {
        to: PushTarget::Topic("blog-dhruvs-host".to_string()),
        title: "New post".to_string(),
        body: "Read it now".to_string(),
        icon: Some("/default-icon.png".to_string()),
        data,
    }
}

#[tokio::test]
async fn send_posts_legacy_payload_with_server_key() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/fcm/send"))
        .and(header("authorization", "key=server-key"))
        .and(body_json(json!({
            "to": "/topics/blog-dhruvs-host",
            "notification": {
                "title": "New post",
                "body": "Read it now",
                "icon": "/default-icon.png"
            },
            "data": { "subject": "New post" }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "message_id": 42 })))
        .expect(1)
        .mount(&server)
        .await;

    let response = provider(&server).send(&topic_push()).await.unwrap();

    assert!(response.success);
    assert_eq!(response.provider_id.as_deref(), Some("42"));
}

#[tokio::test]
async fn per_token_failure_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/fcm/send"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "multicast_id": 1,
            "success": 0,
            "failure": 1,
            "results": [{ "error": "NotRegistered" }]
        })))
        .mount(&server)
        .await;

    let mut push = topic_push();
    push.to = PushTarget::Token("stale".to_string());
    let err = provider(&server).send(&push).await.unwrap_err();

    assert!(matches!(err, ProviderError::SendFailed(_)));
    assert!(err.to_string().contains("NotRegistered"));
}

#[tokio::test]
async fn rejected_server_key_is_an_authentication_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/fcm/send"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let err = provider(&server).send(&topic_push()).await.unwrap_err();

    assert!(matches!(err, ProviderError::Authentication(_)));
}

#[tokio::test]
async fn subscribe_posts_to_token_topic_relation() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/iid/v1/device-1/rel/topics/blog-dhruvs-host"))
        .and(header("authorization", "key=server-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    provider(&server)
        .subscribe_to_topic("device-1", "blog-dhruvs-host")
        .await
        .unwrap();
}

#[tokio::test]
async fn subscribe_surfaces_gateway_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/iid/v1/bad/rel/topics/blog-dhruvs-host"))
        .respond_with(ResponseTemplate::new(400).set_body_string("InvalidToken"))
        .mount(&server)
        .await;

    let err = provider(&server)
        .subscribe_to_topic("bad", "blog-dhruvs-host")
        .await
        .unwrap_err();

    assert!(err.to_string().contains("InvalidToken"));
}

#[tokio::test]
async fn disabled_provider_refuses_to_send() {
    let provider = FcmLegacyProvider::new(FcmConfig {
        enabled: false,
        ..FcmConfig::default()
    });

    assert!(!provider.is_enabled());
    assert!(matches!(
        provider.send(&topic_push()).await,
        Err(ProviderError::NotEnabled(_))
    ));
}

#[tokio::test]
async fn empty_server_key_on_send_is_rejected_by_the_gateway() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/fcm/send"))
        .and(header("authorization", "key="))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = ChatConfig::default();
    config.fcm.send_url = format!("{}/fcm/send", server.uri());
    config.fcm.iid_url = format!("{}/iid", server.uri());
    let state = AppState::from_config(config).unwrap();
    assert!(state.push_provider.is_enabled());

    let response = build_router(state)
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/send")
                .header("content-type", "application/json")
                .header("origin", "https://blog.dhruvs.host")
                .body(Body::from(
                    json!({ "message_subject": "s", "message_body": "b" }).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert!(json["error"].as_str().unwrap().contains("Authentication"));
}

#[tokio::test]
async fn dev_mode_uses_in_process_stand_ins() {
    let config = ChatConfig {
        dev_mode: true,
        ..ChatConfig::default()
    };
    let state = AppState::from_config(config).unwrap();

    assert!(state.stores.health.health_check().await.is_ok());
    let sent = state.push_provider.send(&topic_push()).await.unwrap();
    assert!(sent.success);
}
