mod common;

use axum::http::StatusCode;
use common::{body_json, TestApp};
use serde_json::json;

#[tokio::test]
async fn creator_becomes_manager() {
    let app = TestApp::new().await;
    let (manager_id, cookie) = app.signed_in("manager@example.com").await;

    let resp = app
        .post_json("/pokerboards", &json!({ "title": "Sprint 12" }), Some(&cookie))
        .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body = body_json(resp).await;
    assert_eq!(body["manager_id"], manager_id.as_str());
    let id = body["id"].as_str().unwrap();

    let resp = app.get(&format!("/pokerboards/{id}"), Some(&cookie)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["title"], "Sprint 12");
    assert_eq!(body["members"][0]["role"], "manager");
}

#[tokio::test]
async fn pokerboard_title_is_required() {
    let app = TestApp::new().await;
    let (_, cookie) = app.signed_in("manager@example.com").await;

    let resp = app.post_json("/pokerboards", &json!({ "title": "" }), Some(&cookie)).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn outsiders_cannot_see_pokerboard() {
    let app = TestApp::new().await;
    let (_, manager) = app.signed_in("manager@example.com").await;
    let (_, outsider) = app.signed_in("outsider@example.com").await;
    let id = app.create_pokerboard("Sprint 12", &manager).await;

    let resp = app.get(&format!("/pokerboards/{id}"), Some(&outsider)).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn only_manager_can_invite() {
    let app = TestApp::new().await;
    let (_, manager) = app.signed_in("manager@example.com").await;
    let (_, outsider) = app.signed_in("outsider@example.com").await;
    let id = app.create_pokerboard("Sprint 12", &manager).await;

    let resp = app
        .post_json(
            "/invitations?role=player",
            &json!({ "email": "p@example.com", "purpose": 2, "id": id }),
            Some(&outsider),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}
