mod common;

use axum::http::{Method, StatusCode};
use chat_gateway::config::ChatConfig;
use chat_gateway::models::{Group, MergeStrategy};
use chat_gateway::services::store::UserStore;
use common::{empty_request, json_request, TestContext};
use serde_json::json;

// =============================================================================
// Messages
// =============================================================================

#[tokio::test]
async fn create_group_message_returns_inserted_row() {
    let ctx = TestContext::new();

    let res = ctx
        .send(json_request(
            Method::POST,
            "/api",
            json!({ "message": "hi", "sender": "alice", "groupId": "g1" }),
        ))
        .await;

    assert_eq!(res.status, StatusCode::OK);
    let row = &res.json["data"][0];
    assert_eq!(row["message"], "hi");
    assert_eq!(row["sender"], "alice");
    assert_eq!(row["group_id"], "g1");
    assert!(row["id"].is_i64());
    assert!(row["created_at"].is_string());
}

#[tokio::test]
async fn messages_are_listed_in_creation_order() {
    let ctx = TestContext::new();
    for text in ["first", "second", "third"] {
        let res = ctx
            .send(json_request(
                Method::POST,
                "/api",
                json!({ "message": text, "sender": "alice", "groupId": "g1" }),
            ))
            .await;
        assert_eq!(res.status, StatusCode::OK);
    }
    ctx.send(json_request(
        Method::POST,
        "/api",
        json!({ "message": "other", "sender": "bob", "groupId": "g2" }),
    ))
    .await;

    let res = ctx.send(empty_request(Method::GET, "/api?groupId=g1")).await;

    assert_eq!(res.status, StatusCode::OK);
    let texts: Vec<_> = res.json["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["message"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(texts, ["first", "second", "third"]);
}

#[tokio::test]
async fn last_id_returns_only_newer_rows() {
    let ctx = TestContext::new();
    let mut ids = Vec::new();
    for text in ["a", "b", "c", "d"] {
        let res = ctx
            .send(json_request(
                Method::POST,
                "/api",
                json!({ "message": text, "sender": "alice", "groupId": "g1" }),
            ))
            .await;
        ids.push(res.json["data"][0]["id"].as_i64().unwrap());
    }

    let res = ctx
        .send(empty_request(
            Method::GET,
            &format!("/api?groupId=g1&lastId={}", ids[1]),
        ))
        .await;

    assert_eq!(res.status, StatusCode::OK);
    let returned: Vec<i64> = res.json["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["id"].as_i64().unwrap())
        .collect();
    assert_eq!(returned, &ids[2..]);
}

#[tokio::test]
async fn direct_messages_list_both_directions() {
    let ctx = TestContext::new();
    ctx.send(json_request(
        Method::POST,
        "/api",
        json!({ "message": "hey bob", "sender": "alice", "receiver": "bob" }),
    ))
    .await;
    ctx.send(json_request(
        Method::POST,
        "/api",
        json!({ "message": "hey alice", "sender": "bob", "receiver": "alice" }),
    ))
    .await;
    ctx.send(json_request(
        Method::POST,
        "/api",
        json!({ "message": "hey carol", "sender": "alice", "receiver": "carol" }),
    ))
    .await;

    let res = ctx
        .send(empty_request(Method::GET, "/api?sender=alice&receiver=bob"))
        .await;

    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.json["data"].as_array().unwrap().len(), 2);
    assert_eq!(res.json["data"][0]["message"], "hey bob");
    assert_eq!(res.json["data"][1]["message"], "hey alice");
}

#[tokio::test]
async fn create_message_rejects_missing_fields() {
    let ctx = TestContext::new();

    for body in [
        json!({ "sender": "alice", "groupId": "g1" }),
        json!({ "message": "hi", "groupId": "g1" }),
        json!({ "message": "hi", "sender": "alice" }),
        json!({ "message": "", "sender": "alice", "groupId": "g1" }),
    ] {
        let res = ctx.send(json_request(Method::POST, "/api", body.clone())).await;
        assert_eq!(res.status, StatusCode::BAD_REQUEST, "body: {body}");
        assert!(res.json["error"].is_string());
    }
    assert!(ctx.push.sent_messages().await.is_empty());
}

#[tokio::test]
async fn create_message_rejects_malformed_json() {
    let ctx = TestContext::new();
    let request = axum::http::Request::builder()
        .method(Method::POST)
        .uri("/api")
        .header("content-type", "application/json")
        .body(axum::body::Body::from("{not json"))
        .unwrap();

    let res = ctx.send(request).await;

    assert_eq!(res.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn list_requires_a_filter() {
    let ctx = TestContext::new();

    for uri in ["/api", "/api?sender=alice", "/api?receiver=bob"] {
        let res = ctx.send(empty_request(Method::GET, uri)).await;
        assert_eq!(res.status, StatusCode::BAD_REQUEST, "uri: {uri}");
    }
}

#[tokio::test]
async fn list_rejects_non_numeric_last_id() {
    let ctx = TestContext::new();

    let res = ctx
        .send(empty_request(Method::GET, "/api?groupId=g1&lastId=latest"))
        .await;

    assert_eq!(res.status, StatusCode::BAD_REQUEST);
}

// =============================================================================
// Groups
// =============================================================================

#[tokio::test]
async fn type_groups_lists_every_group() {
    let ctx = TestContext::new();
    ctx.store.add_group(Group::named("g1", "general")).await;
    ctx.store.add_group(Group::named("g2", "random")).await;

    let res = ctx
        .send(empty_request(Method::GET, "/api?type=groups&groupId=g1"))
        .await;

    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(
        res.json["data"],
        json!([
            { "id": "g1", "name": "general" },
            { "id": "g2", "name": "random" }
        ])
    );
}

// =============================================================================
// Users
// =============================================================================

#[tokio::test]
async fn put_creates_user_once() {
    let ctx = TestContext::new();

    let first = ctx
        .send(json_request(Method::PUT, "/api", json!({ "username": "alice" })))
        .await;
    let second = ctx
        .send(json_request(Method::PUT, "/api", json!({ "username": "alice" })))
        .await;

    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(second.status, StatusCode::OK);
    assert_eq!(first.json["user"]["username"], "alice");
    assert_eq!(first.json["user"], second.json["user"]);
    assert_eq!(ctx.store.user_count().await, 1);
}

#[tokio::test]
async fn put_requires_username() {
    let ctx = TestContext::new();

    let res = ctx
        .send(json_request(Method::PUT, "/api", json!({ "username": "" })))
        .await;

    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(ctx.store.user_count().await, 0);
}

#[tokio::test]
async fn put_with_old_username_transfers_messages_by_default() {
    let ctx = TestContext::new();
    ctx.send(json_request(Method::PUT, "/api", json!({ "username": "guest-1" })))
        .await;
    ctx.send(json_request(
        Method::POST,
        "/api",
        json!({ "message": "hello", "sender": "guest-1", "groupId": "g1" }),
    ))
    .await;

    let res = ctx
        .send(json_request(
            Method::PUT,
            "/api",
            json!({ "username": "alice", "oldUsername": "guest-1" }),
        ))
        .await;

    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.json["user"]["username"], "alice");
    assert!(ctx.store.find_by_username("guest-1").await.unwrap().is_none());

    let messages = ctx.send(empty_request(Method::GET, "/api?groupId=g1")).await;
    assert_eq!(messages.json["data"][0]["sender"], "alice");
}

#[tokio::test]
async fn put_with_old_username_renames_when_configured() {
    let mut config = ChatConfig::default();
    config.gateway.merge_strategy = MergeStrategy::Rename;
    let ctx = TestContext::with_config(config);

    let guest = ctx
        .send(json_request(Method::PUT, "/api", json!({ "username": "guest-1" })))
        .await;
    ctx.send(json_request(
        Method::POST,
        "/api",
        json!({ "message": "hello", "sender": "guest-1", "groupId": "g1" }),
    ))
    .await;

    let res = ctx
        .send(json_request(
            Method::PUT,
            "/api",
            json!({ "username": "alice", "oldUsername": "guest-1" }),
        ))
        .await;

    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.json["user"]["id"], guest.json["user"]["id"]);
    assert_eq!(res.json["user"]["username"], "alice");
    assert_eq!(ctx.store.user_count().await, 1);

    let messages = ctx.send(empty_request(Method::GET, "/api?groupId=g1")).await;
    assert_eq!(messages.json["data"][0]["sender"], "guest-1");
}

// =============================================================================
// Method handling
// =============================================================================

#[tokio::test]
async fn unsupported_method_on_api_is_405_with_allow() {
    let ctx = TestContext::new();

    for method in [Method::DELETE, Method::PATCH] {
        let res = ctx.send(empty_request(method.clone(), "/api")).await;
        assert_eq!(res.status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(res.header("allow"), Some("GET, HEAD, POST, PUT, OPTIONS"));
        assert_eq!(res.text, format!("Method {} Not Allowed", method));
    }
}

#[tokio::test]
async fn every_route_reports_its_own_methods() {
    let ctx = TestContext::new();

    for (uri, allow) in [
        ("/", "GET, HEAD"),
        ("/sign-up", "GET, HEAD"),
        ("/send", "POST, OPTIONS"),
        ("/subscribe", "POST, OPTIONS"),
        ("/health", "GET, HEAD"),
    ] {
        let res = ctx.send(empty_request(Method::DELETE, uri)).await;
        assert_eq!(res.status, StatusCode::METHOD_NOT_ALLOWED, "uri: {uri}");
        assert_eq!(res.header("allow"), Some(allow), "uri: {uri}");
    }
}

#[tokio::test]
async fn options_short_circuits_with_200() {
    let ctx = TestContext::new();

    for uri in ["/api", "/send", "/subscribe"] {
        let res = ctx.send(empty_request(Method::OPTIONS, uri)).await;
        assert_eq!(res.status, StatusCode::OK, "uri: {uri}");
    }
}

#[tokio::test]
async fn cors_preflight_echoes_allowed_origin() {
    let ctx = TestContext::new();
    let request = axum::http::Request::builder()
        .method(Method::OPTIONS)
        .uri("/api")
        .header("origin", "https://blog.dhruvs.host")
        .header("access-control-request-method", "PUT")
        .body(axum::body::Body::empty())
        .unwrap();

    let res = ctx.send(request).await;

    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(
        res.header("access-control-allow-origin"),
        Some("https://blog.dhruvs.host")
    );
    let methods = res.header("access-control-allow-methods").unwrap();
    assert!(methods.contains("PUT"));
}

#[tokio::test]
async fn cors_ignores_foreign_origin() {
    let ctx = TestContext::new();
    let request = axum::http::Request::builder()
        .method(Method::GET)
        .uri("/api?groupId=g1")
        .header("origin", "https://evil.example.com")
        .body(axum::body::Body::empty())
        .unwrap();

    let res = ctx.send(request).await;

    assert_eq!(res.status, StatusCode::OK);
    assert!(res.header("access-control-allow-origin").is_none());
}

// =============================================================================
// Static assets
// =============================================================================

#[tokio::test]
async fn index_and_sign_up_are_served_with_content_types() {
    let ctx = TestContext::new();

    let index = ctx.send(empty_request(Method::GET, "/")).await;
    assert_eq!(index.status, StatusCode::OK);
    assert!(index.header("content-type").unwrap().starts_with("text/html"));
    assert!(index.text.contains("dhruvs-notify-btn"));

    let script = ctx.send(empty_request(Method::GET, "/sign-up")).await;
    assert_eq!(script.status, StatusCode::OK);
    assert!(script
        .header("content-type")
        .unwrap()
        .starts_with("application/javascript"));
    assert!(script.text.contains("/subscribe"));
}
