mod common;

use axum::http::StatusCode;
use common::{
    TestOptions, authed_request, body_json, cookie_request, json_request, test_app, test_app_with,
};
use serde_json::json;
use std::time::Duration;
use taskgate::jwt::{JwtConfig, UserClaim};

async fn create_task(app: &common::TestApp, bearer: &str, title: &str) -> i64 {
    let response = app
        .send(json_request(
            "POST",
            "/tasks",
            Some(bearer),
            json!({ "title": title }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await["data"]["id"].as_i64().unwrap()
}

#[tokio::test]
async fn test_create_task_requires_token() {
    let app = test_app().await;

    let response = app
        .send(json_request("POST", "/tasks", None, json!({ "title": "Buy milk" })))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json = body_json(response).await;
    assert_eq!(json["statusCode"], 401);
    assert_eq!(json["message"], "Not authenticated");
    assert!(json["data"].is_null());

    let response = app
        .send(json_request(
            "POST",
            "/tasks",
            Some("Bearer not.a.jwt"),
            json!({ "title": "Buy milk" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .send(json_request(
            "POST",
            "/tasks",
            Some("Basic dXNlcjpwYXNz"),
            json!({ "title": "Buy milk" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_refresh_token_is_not_a_bearer_credential() {
    let app = test_app().await;
    let ann = app.signed_in_user("Ann", "ann@x.com").await;

    let response = app
        .send(json_request(
            "POST",
            "/tasks",
            Some(&format!("Bearer {}", ann.refresh_token)),
            json!({ "title": "Buy milk" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_token_signed_with_other_secret_rejected() {
    let app = test_app().await;
    let ann = app.signed_in_user("Ann", "ann@x.com").await;

    let forged = JwtConfig::new(
        b"some-other-access-secret-of-32-bytes!!",
        b"some-other-refresh-secret-of-32-bytes!",
    )
    .generate_access_token(&ann.user)
    .unwrap();

    let response = app
        .send(json_request(
            "POST",
            "/tasks",
            Some(&format!("Bearer {}", forged.token)),
            json!({ "title": "Buy milk" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_expired_access_token_rejected() {
    let app = test_app_with(TestOptions {
        access_ttl: 1,
        ..TestOptions::default()
    })
    .await;
    let ann = app.signed_in_user("Ann", "ann@x.com").await;

    let response = app
        .send(json_request(
            "POST",
            "/tasks",
            Some(&ann.bearer()),
            json!({ "title": "Before expiry" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    tokio::time::sleep(Duration::from_millis(2500)).await;

    let response = app
        .send(json_request(
            "POST",
            "/tasks",
            Some(&ann.bearer()),
            json!({ "title": "After expiry" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    // The refresh cookie is left for the client to renew with
    assert!(common::extract_set_cookies(&response).is_empty());
    let json = body_json(response).await;
    assert_eq!(json["message"], "Not authenticated");
}

#[tokio::test]
async fn test_create_task_owned_by_caller() {
    let app = test_app().await;
    let ann = app.signed_in_user("Ann", "ann@x.com").await;

    let response = app
        .send(json_request(
            "POST",
            "/tasks",
            Some(&ann.bearer()),
            json!({ "title": "  Buy milk ", "userId": 9999 }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let json = body_json(response).await;
    assert_eq!(json["statusCode"], 201);
    assert_eq!(json["message"], "Task created successfully");
    assert_eq!(json["data"]["title"], "Buy milk");
    assert_eq!(json["data"]["status"], false);
    assert_eq!(json["data"]["userId"], ann.user.id);
}

#[tokio::test]
async fn test_create_task_requires_title() {
    let app = test_app().await;
    let ann = app.signed_in_user("Ann", "ann@x.com").await;

    let response = app
        .send(json_request(
            "POST",
            "/tasks",
            Some(&ann.bearer()),
            json!({ "title": "   " }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "Title is required");
}

#[tokio::test]
async fn test_create_task_for_deleted_account() {
    let app = test_app().await;
    let ann = app.signed_in_user("Ann", "ann@x.com").await;
    app.db.users().delete(ann.user.id).await.unwrap();

    let response = app
        .send(json_request(
            "POST",
            "/tasks",
            Some(&ann.bearer()),
            json!({ "title": "Orphan" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_owner_can_update_and_delete() {
    let app = test_app().await;
    let ann = app.signed_in_user("Ann", "ann@x.com").await;
    let id = create_task(&app, &ann.bearer(), "Buy milk").await;

    let response = app
        .send(json_request(
            "PUT",
            &format!("/tasks/{}", id),
            Some(&ann.bearer()),
            json!({ "status": true }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["message"], "Task updated successfully");
    assert_eq!(json["data"]["status"], true);
    assert_eq!(json["data"]["title"], "Buy milk");

    let response = app
        .send(authed_request("DELETE", &format!("/tasks/{}", id), &ann.bearer()))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["message"], "Task deleted successfully");

    let response = app.get(&format!("/tasks/{}", id)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_other_user_cannot_modify_task() {
    let app = test_app().await;
    let ann = app.signed_in_user("Ann", "ann@x.com").await;
    let bob = app.signed_in_user("Bob", "bob@x.com").await;
    let id = create_task(&app, &ann.bearer(), "Ann's task").await;

    let response = app
        .send(json_request(
            "PUT",
            &format!("/tasks/{}", id),
            Some(&bob.bearer()),
            json!({ "title": "Hijacked" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let json = body_json(response).await;
    assert_eq!(json["message"], "Access denied");
    assert_eq!(json["error"], "You can only modify your own tasks");

    let response = app
        .send(authed_request("DELETE", &format!("/tasks/{}", id), &bob.bearer()))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // Unchanged
    let task = app.db.tasks().get_by_id(id).await.unwrap().unwrap();
    assert_eq!(task.title, "Ann's task");
    assert_eq!(task.user_id, ann.user.id);
}

#[tokio::test]
async fn test_ownership_uses_current_owner_not_claimed_identity() {
    let app = test_app().await;
    let ann = app.signed_in_user("Ann", "ann@x.com").await;
    let id = create_task(&app, &ann.bearer(), "Ann's task").await;

    // A validly signed token for another id does not own Ann's task
    let stranger = UserClaim {
        id: ann.user.id + 100,
        ..ann.user.clone()
    };
    let token = app.jwt.generate_access_token(&stranger).unwrap();

    let response = app
        .send(authed_request(
            "DELETE",
            &format!("/tasks/{}", id),
            &format!("Bearer {}", token.token),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_modify_missing_or_malformed_task_id() {
    let app = test_app().await;
    let ann = app.signed_in_user("Ann", "ann@x.com").await;

    let response = app
        .send(authed_request("DELETE", "/tasks/4242", &ann.bearer()))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["error"], "Task not found");

    let response = app
        .send(authed_request("DELETE", "/tasks/abc", &ann.bearer()))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Authentication is checked before the task lookup
    let response = app
        .send(cookie_request("DELETE", "/tasks/4242", None))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_update_rejects_empty_title() {
    let app = test_app().await;
    let ann = app.signed_in_user("Ann", "ann@x.com").await;
    let id = create_task(&app, &ann.bearer(), "Buy milk").await;

    let response = app
        .send(json_request(
            "PUT",
            &format!("/tasks/{}", id),
            Some(&ann.bearer()),
            json!({ "title": "" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_public_task_listing() {
    let app = test_app().await;
    let ann = app.signed_in_user("Ann", "ann@x.com").await;
    let bob = app.signed_in_user("Bob", "bob@x.com").await;
    let ann_task = create_task(&app, &ann.bearer(), "Ann's task").await;
    create_task(&app, &bob.bearer(), "Bob's task").await;

    let response = app.get("/tasks").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-content-type-options"], "nosniff");
    let json = body_json(response).await;
    assert_eq!(json["message"], "All tasks");
    assert_eq!(json["data"].as_array().unwrap().len(), 2);

    let response = app.get(&format!("/tasks/user/{}", ann.user.id)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["message"], "User tasks");
    let tasks = json["data"].as_array().unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0]["title"], "Ann's task");
    assert_eq!(tasks[0]["user"]["name"], "Ann");
    assert!(tasks[0]["user"].get("password").is_none());

    let response = app.get(&format!("/tasks/{}", ann_task)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["message"], "Task");
    assert_eq!(json["data"]["user"]["email"], "ann@x.com");
}

#[tokio::test]
async fn test_cors_allows_client_origin_with_credentials() {
    let app = test_app().await;

    let response = app
        .send(
            axum::http::Request::builder()
                .method("OPTIONS")
                .uri("/tasks")
                .header("origin", common::CLIENT_URL)
                .header("access-control-request-method", "POST")
                .header("access-control-request-headers", "authorization,content-type")
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let headers = response.headers();
    assert_eq!(headers["access-control-allow-origin"], common::CLIENT_URL);
    assert_eq!(headers["access-control-allow-credentials"], "true");
}
