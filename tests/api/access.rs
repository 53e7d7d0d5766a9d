use claim::{assert_err, assert_ok};
use serde_json::Value;

use crate::helpers::{spawn_app, TestContext};
use thesis_vault::core::AppErrorType;
use thesis_vault::gateway::{InMemoryGateway, Table};
use thesis_vault::models::access_requests::{AccessState, RequestStatus};
use thesis_vault::services::access_requests;

#[tokio::test]
async fn requesting_access_files_a_pending_request_and_notifies_admins() {
    let test = TestContext::new();
    let user = test.seed_student();
    let thesis = test.seed_thesis(1);

    let request = assert_ok!(access_requests::request_access(&test.ctx, &user, &thesis).await);
    test.ctx.side_effects.settle().await;

    assert_eq!(request.status, RequestStatus::Pending);
    assert_eq!(request.duration_days, 7);
    assert_eq!(request.approved_date, None);

    let notifications = test.rows(Table::AdminNotifications);
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0]["event_type"], "new_request");
    assert_eq!(notifications[0]["is_read"], false);
    assert_eq!(notifications[0]["data"]["request_id"], request.id);
    assert_eq!(notifications[0]["data"]["thesis_id"], thesis.thesis_id);
}

#[tokio::test]
async fn a_second_pending_request_is_a_duplicate() {
    let test = TestContext::with(InMemoryGateway::new(), Default::default());
    let user = test.seed_student();
    let thesis = test.seed_thesis(1);

    assert_ok!(access_requests::request_access(&test.ctx, &user, &thesis).await);
    let error = assert_err!(access_requests::request_access(&test.ctx, &user, &thesis).await);

    assert!(error.is(AppErrorType::DuplicatePendingError));
    assert_eq!(test.rows(Table::BorrowingRequests).len(), 1);
}

#[tokio::test]
async fn concurrent_requests_are_deduplicated_by_the_backend_index() {
    let test = TestContext::interleaved();
    let user = test.seed_student();
    let thesis = test.seed_thesis(1);

    let (first, second) = tokio::join!(
        access_requests::request_access(&test.ctx, &user, &thesis),
        access_requests::request_access(&test.ctx, &user, &thesis),
    );

    // Both counts see no pending row; the unique index rejects the second insert.
    assert_ok!(first);
    let error = assert_err!(second);
    assert!(error.is(AppErrorType::DuplicatePendingError));
    assert_eq!(test.rows(Table::BorrowingRequests).len(), 1);
}

#[tokio::test]
async fn status_reflects_the_latest_request() {
    let test = TestContext::new();
    let user = test.seed_student();
    let fresh = test.seed_thesis(1);
    let lapsed = test.seed_thesis(1);
    let untouched = test.seed_thesis(1);
    test.seed_approved_access(user.id, fresh.thesis_id, 1);
    test.seed_approved_access(user.id, lapsed.thesis_id, 8);

    let status = assert_ok!(access_requests::get_status(&test.ctx, user.id, fresh.thesis_id).await);
    assert_eq!(status.state, AccessState::Approved);
    assert!(status.has_access);

    let status = assert_ok!(access_requests::get_status(&test.ctx, user.id, lapsed.thesis_id).await);
    assert_eq!(status.state, AccessState::Expired);
    assert!(!status.has_access);

    let status = assert_ok!(access_requests::get_status(&test.ctx, user.id, untouched.thesis_id).await);
    assert_eq!(status.state, AccessState::None);

    let error = assert_err!(access_requests::require_access(&test.ctx, &user, lapsed.thesis_id).await);
    assert!(error.is(AppErrorType::PermissionError));
}

#[tokio::test]
async fn access_routes_round_trip_over_http() {
    let app = spawn_app().await;
    let user = crate::helpers::seed_user(&app.gateway, "user", "active");
    let thesis = crate::helpers::seed_thesis(&app.gateway, 1);
    let token = app.token_for(&user).await;
    let base = format!("/theses/{}", thesis.thesis_id);

    let response = app
        .post(&format!("{}/access-requests", base), &token, serde_json::json!({}))
        .await;
    assert_eq!(201, response.status().as_u16());

    let response = app
        .post(&format!("{}/access-requests", base), &token, serde_json::json!({}))
        .await;
    assert_eq!(409, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "You already have a pending request for this thesis");

    let response = app.get(&format!("{}/access-status", base), &token).await;
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["data"]["state"], "pending");
    assert_eq!(body["data"]["has_access"], false);

    let response = app.get(&format!("{}/document-url", base), &token).await;
    assert_eq!(403, response.status().as_u16());
}

#[tokio::test]
async fn document_url_is_signed_once_access_is_live() {
    let app = spawn_app().await;
    let user = crate::helpers::seed_user(&app.gateway, "user", "active");
    let thesis = crate::helpers::seed_thesis(&app.gateway, 1);
    app.gateway.seed(
        Table::BorrowingRequests,
        serde_json::json!({
            "id": 1,
            "user_id": user.id,
            "thesis_id": thesis.thesis_id,
            "status": "approved",
            "request_date": chrono::Utc::now(),
            "approved_date": chrono::Utc::now(),
            "duration_days": 7,
            "borrow_method": "qr_scan",
        }),
    );
    let token = app.token_for(&user).await;

    let response = app
        .get(&format!("/theses/{}/document-url", thesis.thesis_id), &token)
        .await;

    assert_eq!(200, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    assert_eq!(
        body["data"]["url"],
        format!(
            "memory://thesis_files/thesis-pdfs/thesis_{}.pdf?token=signed&expires_in=3600",
            thesis.thesis_id
        )
    );
    assert_eq!(body["data"]["expires_in"], 3600);
}
