mod common;

use axum::http::StatusCode;
use common::{body_json, TestApp};
use serde_json::json;

#[tokio::test]
async fn creating_group_adds_admin_as_member() {
    let app = TestApp::new().await;
    let (admin_id, cookie) = app.signed_in("admin@example.com").await;

    let resp = app
        .post_json("/groups", &json!({ "title": "Backend", "description": "API team" }), Some(&cookie))
        .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body = body_json(resp).await;
    assert_eq!(body["title"], "Backend");
    assert_eq!(body["admin"]["id"], admin_id.as_str());
    let users = body["users"].as_array().unwrap();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0]["email"], "admin@example.com");
}

#[tokio::test]
async fn group_titles_are_unique() {
    let app = TestApp::new().await;
    let (_, cookie) = app.signed_in("admin@example.com").await;
    app.create_group("Backend", &cookie).await;

    let resp = app.post_json("/groups", &json!({ "title": "Backend" }), Some(&cookie)).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(resp).await["errors"]["title"],
        "A group with this title already exists"
    );
}

#[tokio::test]
async fn group_title_is_required() {
    let app = TestApp::new().await;
    let (_, cookie) = app.signed_in("admin@example.com").await;

    let resp = app.post_json("/groups", &json!({ "title": "  " }), Some(&cookie)).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn list_shows_only_own_groups() {
    let app = TestApp::new().await;
    let (_, alice) = app.signed_in("alice@example.com").await;
    let (_, bob) = app.signed_in("bob@example.com").await;
    app.create_group("Alpha", &alice).await;
    app.create_group("Beta", &bob).await;

    let resp = app.get("/groups", Some(&alice)).await;
    let list = body_json(resp).await;
    let titles: Vec<&str> = list
        .as_array()
        .unwrap()
        .iter()
        .map(|g| g["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, vec!["Alpha"]);
}

#[tokio::test]
async fn non_members_cannot_see_group() {
    let app = TestApp::new().await;
    let (_, alice) = app.signed_in("alice@example.com").await;
    let (_, bob) = app.signed_in("bob@example.com").await;
    let group_id = app.create_group("Alpha", &alice).await;

    let resp = app.get(&format!("/groups/{group_id}"), Some(&bob)).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn admin_adds_members_but_cannot_change_admin() {
    let app = TestApp::new().await;
    let (admin_id, admin) = app.signed_in("admin@example.com").await;
    let (member_id, member) = app.signed_in("member@example.com").await;
    let group_id = app.create_group("Backend", &admin).await;

    let resp = app
        .patch_json(
            &format!("/groups/{group_id}"),
            &json!({ "users": [member_id], "description": "New" }),
            Some(&admin),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["description"], "New");
    assert_eq!(body["users"].as_array().unwrap().len(), 2);

    let resp = app.get(&format!("/groups/{group_id}"), Some(&member)).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = app
        .patch_json(&format!("/groups/{group_id}"), &json!({ "admin": member_id }), Some(&admin))
        .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(resp).await["errors"]["admin"], "Admin cannot be updated");

    let resp = app
        .patch_json(&format!("/groups/{group_id}"), &json!({ "admin": admin_id }), Some(&admin))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn update_never_removes_members() {
    let app = TestApp::new().await;
    let (_, admin) = app.signed_in("admin@example.com").await;
    let member_id = app.create_user("member@example.com").await;
    let group_id = app.create_group("Backend", &admin).await;

    app.patch_json(&format!("/groups/{group_id}"), &json!({ "users": [member_id] }), Some(&admin))
        .await;
    let resp = app
        .patch_json(&format!("/groups/{group_id}"), &json!({ "users": [] }), Some(&admin))
        .await;
    assert_eq!(body_json(resp).await["users"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn update_rejects_unknown_member() {
    let app = TestApp::new().await;
    let (_, admin) = app.signed_in("admin@example.com").await;
    let group_id = app.create_group("Backend", &admin).await;

    let resp = app
        .patch_json(&format!("/groups/{group_id}"), &json!({ "users": ["ghost"] }), Some(&admin))
        .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn only_admin_can_update() {
    let app = TestApp::new().await;
    let (_, admin) = app.signed_in("admin@example.com").await;
    let (member_id, member) = app.signed_in("member@example.com").await;
    let group_id = app.create_group("Backend", &admin).await;
    app.patch_json(&format!("/groups/{group_id}"), &json!({ "users": [member_id] }), Some(&admin))
        .await;

    let resp = app
        .patch_json(&format!("/groups/{group_id}"), &json!({ "title": "Mine" }), Some(&member))
        .await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn admin_lists_sent_invitations() {
    let app = TestApp::new().await;
    let (_, admin) = app.signed_in("admin@example.com").await;
    let (_, other) = app.signed_in("other@example.com").await;
    let group_id = app.create_group("Backend", &admin).await;

    app.post_json(
        "/invitations",
        &json!({ "email": "new@example.com", "purpose": 1, "id": group_id }),
        Some(&admin),
    )
    .await;

    let resp = app.get(&format!("/groups/{group_id}/invitations"), Some(&admin)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let list = body_json(resp).await;
    assert_eq!(list[0]["invitee_email"], "new@example.com");
    assert_eq!(list[0]["status"], "pending");

    let resp = app.get(&format!("/groups/{group_id}/invitations"), Some(&other)).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}
