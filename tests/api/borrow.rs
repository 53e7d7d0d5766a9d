use chrono::{Duration, Utc};
use claim::{assert_err, assert_ok};
use serde_json::{json, Value};

use crate::helpers::{spawn_app, TestContext, KIOSK_KEY};
use thesis_vault::core::AppErrorType;
use thesis_vault::gateway::{Filter, Gateway, Table};
use thesis_vault::models::access_requests::AccessState;
use thesis_vault::services::{access_requests, borrow_engine};

fn transaction_row(test: &TestContext, transaction_id: &str) -> Value {
    test.rows(Table::BorrowTransactions)
        .into_iter()
        .find(|row| row["transaction_id"] == json!(transaction_id))
        .unwrap()
}

#[tokio::test]
async fn borrow_qr_round_trip_grants_access_and_takes_a_copy() {
    let app = spawn_app().await;
    let user = crate::helpers::seed_user(&app.gateway, "user", "active");
    let thesis = crate::helpers::seed_thesis(&app.gateway, 2);
    let token = app.token_for(&user).await;

    let response = app
        .post(&format!("/theses/{}/borrow-qr", thesis.thesis_id), &token, json!({}))
        .await;
    assert_eq!(201, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    let payload = body["data"].clone();
    assert_eq!(payload["type"], "borrow");
    assert_eq!(
        payload["expires"].as_i64().unwrap() - payload["timestamp"].as_i64().unwrap(),
        15 * 60 * 1000
    );

    let response = app.kiosk_redeem(KIOSK_KEY, &payload.to_string()).await;
    assert_eq!(200, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "Thesis borrowed successfully");
    assert_eq!(body["data"]["thesis_title"], thesis.title);
    assert_eq!(body["data"]["user_name"], user.display_name());

    let response = app.get(&format!("/theses/{}/access-status", thesis.thesis_id), &token).await;
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["data"]["state"], "approved");
    assert_eq!(body["data"]["request"]["borrow_method"], "qr_scan");

    let copies = app
        .gateway
        .rows(Table::Theses)
        .into_iter()
        .find(|row| row["thesis_id"] == json!(thesis.thesis_id))
        .unwrap()["available_copies"]
        .clone();
    assert_eq!(copies, 1);

    app.ctx.side_effects.settle().await;
    let notifications = app.gateway.rows(Table::AdminNotifications);
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0]["event_type"], "thesis_borrowed");
    assert_eq!(notifications[0]["data"]["transaction_id"], payload["transaction_id"]);
}

#[tokio::test]
async fn kiosk_routes_require_the_kiosk_key() {
    let app = spawn_app().await;

    let response = app.kiosk_redeem("guess", r#"{"type":"borrow","transaction_id":"x"}"#).await;

    assert_eq!(403, response.status().as_u16());
}

#[tokio::test]
async fn kiosk_rejects_payloads_that_are_not_borrow_codes() {
    let app = spawn_app().await;

    let response = app.kiosk_redeem(KIOSK_KEY, r#"{"type":"thesis","thesis_id":1}"#).await;

    assert_eq!(400, response.status().as_u16());
}

#[tokio::test]
async fn no_transaction_is_created_without_copies() {
    let test = TestContext::new();
    let user = test.seed_student();
    let thesis = test.seed_thesis(0);

    let error = assert_err!(borrow_engine::create_borrow_qr(&test.ctx, &user, thesis.thesis_id).await);
    assert!(error.is(AppErrorType::NoCopiesError));

    let error = assert_err!(borrow_engine::create_borrow_qr(&test.ctx, &user, 987_654).await);
    assert!(error.is(AppErrorType::NotFoundError));

    assert!(test.rows(Table::BorrowTransactions).is_empty());
}

#[tokio::test]
async fn a_code_redeems_exactly_once() {
    let test = TestContext::new();
    let user = test.seed_student();
    let thesis = test.seed_thesis(3);
    let payload = assert_ok!(borrow_engine::create_borrow_qr(&test.ctx, &user, thesis.thesis_id).await);

    assert_ok!(borrow_engine::process_borrow(&test.ctx, &payload.transaction_id).await);
    let error = assert_err!(borrow_engine::process_borrow(&test.ctx, &payload.transaction_id).await);

    assert!(error.is(AppErrorType::AlreadyProcessedError));
    assert_eq!(test.thesis_copies(thesis.thesis_id), 2);
    assert_eq!(transaction_row(&test, &payload.transaction_id)["status"], "approved");
    assert_eq!(
        test.gateway
            .rows(Table::BorrowingRequests)
            .iter()
            .filter(|row| row["status"] == "approved")
            .count(),
        1
    );
}

#[tokio::test]
async fn concurrent_redemptions_of_one_code_have_a_single_winner() {
    let test = TestContext::interleaved();
    let user = test.seed_student();
    let thesis = test.seed_thesis(3);
    let payload = assert_ok!(borrow_engine::create_borrow_qr(&test.ctx, &user, thesis.thesis_id).await);

    let (first, second) = tokio::join!(
        borrow_engine::process_borrow(&test.ctx, &payload.transaction_id),
        borrow_engine::process_borrow(&test.ctx, &payload.transaction_id),
    );

    // Both pass the pending check; the conditional approval picks one.
    assert_ok!(first);
    let error = assert_err!(second);
    assert!(error.is(AppErrorType::AlreadyProcessedError));
    assert_eq!(test.thesis_copies(thesis.thesis_id), 2);
    assert_eq!(transaction_row(&test, &payload.transaction_id)["status"], "approved");
    assert_eq!(test.rows(Table::BorrowingRequests).len(), 1);
}

#[tokio::test]
async fn two_borrowers_racing_for_the_last_copy_leave_only_the_winner_with_access() {
    let test = TestContext::interleaved();
    let alice = test.seed_student();
    let bob = test.seed_student();
    let thesis = test.seed_thesis(1);
    let alice_code = assert_ok!(borrow_engine::create_borrow_qr(&test.ctx, &alice, thesis.thesis_id).await);
    let bob_code = assert_ok!(borrow_engine::create_borrow_qr(&test.ctx, &bob, thesis.thesis_id).await);

    let (alice_outcome, bob_outcome) = tokio::join!(
        borrow_engine::process_borrow(&test.ctx, &alice_code.transaction_id),
        borrow_engine::process_borrow(&test.ctx, &bob_code.transaction_id),
    );

    assert_ok!(alice_outcome);
    let error = assert_err!(bob_outcome);
    assert!(error.is(AppErrorType::NoCopiesError));
    assert_eq!(test.thesis_copies(thesis.thesis_id), 0);
    assert_eq!(transaction_row(&test, &alice_code.transaction_id)["status"], "approved");
    assert_eq!(transaction_row(&test, &bob_code.transaction_id)["status"], "failed");

    let alice_status = assert_ok!(access_requests::get_status(&test.ctx, alice.id, thesis.thesis_id).await);
    let bob_status = assert_ok!(access_requests::get_status(&test.ctx, bob.id, thesis.thesis_id).await);
    assert!(alice_status.has_access);
    assert!(!bob_status.has_access);
    assert_eq!(bob_status.state, AccessState::Denied);
}

#[tokio::test]
async fn a_lost_copy_swap_is_retried_against_the_fresh_count() {
    let test = TestContext::interleaved();
    let alice = test.seed_student();
    let bob = test.seed_student();
    let thesis = test.seed_thesis(2);
    let alice_code = assert_ok!(borrow_engine::create_borrow_qr(&test.ctx, &alice, thesis.thesis_id).await);
    let bob_code = assert_ok!(borrow_engine::create_borrow_qr(&test.ctx, &bob, thesis.thesis_id).await);

    let (alice_outcome, bob_outcome) = tokio::join!(
        borrow_engine::process_borrow(&test.ctx, &alice_code.transaction_id),
        borrow_engine::process_borrow(&test.ctx, &bob_code.transaction_id),
    );

    // Both read two copies; the second swap misses, re-reads one and takes it.
    assert_ok!(alice_outcome);
    assert_ok!(bob_outcome);
    assert_eq!(test.thesis_copies(thesis.thesis_id), 0);
    for user_id in [alice.id, bob.id] {
        let status = assert_ok!(access_requests::get_status(&test.ctx, user_id, thesis.thesis_id).await);
        assert!(status.has_access);
    }
}

#[tokio::test]
async fn an_expired_code_is_rejected_and_left_pending() {
    let test = TestContext::new();
    let user = test.seed_student();
    let thesis = test.seed_thesis(1);
    let payload = assert_ok!(borrow_engine::create_borrow_qr(&test.ctx, &user, thesis.thesis_id).await);
    test.gateway
        .update(
            Table::BorrowTransactions,
            &[Filter::eq("transaction_id", payload.transaction_id.as_str())],
            json!({ "expires_at": Utc::now() - Duration::minutes(1) }),
        )
        .await
        .unwrap();

    let error = assert_err!(borrow_engine::process_borrow(&test.ctx, &payload.transaction_id).await);

    assert!(error.is(AppErrorType::ExpiredError));
    assert_eq!(transaction_row(&test, &payload.transaction_id)["status"], "pending");
    assert_eq!(test.thesis_copies(thesis.thesis_id), 1);
}

#[tokio::test]
async fn redeeming_when_the_shelf_emptied_meanwhile_fails_without_side_effects() {
    let test = TestContext::new();
    let user = test.seed_student();
    let thesis = test.seed_thesis(1);
    let payload = assert_ok!(borrow_engine::create_borrow_qr(&test.ctx, &user, thesis.thesis_id).await);
    test.gateway
        .update(
            Table::Theses,
            &[Filter::eq("thesis_id", thesis.thesis_id)],
            json!({ "available_copies": 0 }),
        )
        .await
        .unwrap();

    let error = assert_err!(borrow_engine::process_borrow(&test.ctx, &payload.transaction_id).await);

    assert!(error.is(AppErrorType::NoCopiesError));
    assert_eq!(transaction_row(&test, &payload.transaction_id)["status"], "pending");
    assert!(test.rows(Table::BorrowingRequests).is_empty());
}

#[tokio::test]
async fn a_failure_mid_redemption_marks_the_transaction_failed() {
    let test = TestContext::new();
    let user = test.seed_student();
    let thesis = test.seed_thesis(1);
    let payload = assert_ok!(borrow_engine::create_borrow_qr(&test.ctx, &user, thesis.thesis_id).await);
    test.gateway.fail_writes_to(Table::BorrowingRequests);

    let error = assert_err!(borrow_engine::process_borrow(&test.ctx, &payload.transaction_id).await);

    assert!(error.is(AppErrorType::GatewayError));
    assert_eq!(transaction_row(&test, &payload.transaction_id)["status"], "failed");
    assert_eq!(test.thesis_copies(thesis.thesis_id), 1);
    let status = assert_ok!(access_requests::get_status(&test.ctx, user.id, thesis.thesis_id).await);
    assert_eq!(status.state, AccessState::None);
}

#[tokio::test]
async fn unknown_transactions_are_not_found() {
    let test = TestContext::new();

    let error = assert_err!(borrow_engine::process_borrow(&test.ctx, "BORROW_0_0_0").await);

    assert!(error.is(AppErrorType::NotFoundError));
}

#[tokio::test]
async fn the_reconciler_fails_only_lapsed_pending_transactions() {
    let test = TestContext::new();
    let user = test.seed_student();
    let thesis = test.seed_thesis(5);
    let lapsed = assert_ok!(borrow_engine::create_borrow_qr(&test.ctx, &user, thesis.thesis_id).await);
    tokio::time::sleep(std::time::Duration::from_millis(2)).await;
    let live = assert_ok!(borrow_engine::create_borrow_qr(&test.ctx, &user, thesis.thesis_id).await);
    test.gateway
        .update(
            Table::BorrowTransactions,
            &[Filter::eq("transaction_id", lapsed.transaction_id.as_str())],
            json!({ "expires_at": Utc::now() - Duration::minutes(1) }),
        )
        .await
        .unwrap();

    let failed = assert_ok!(thesis_vault::jobs::borrow_expiry::fail_lapsed_transactions(&test.ctx).await);

    assert_eq!(failed, 1);
    assert_eq!(transaction_row(&test, &lapsed.transaction_id)["status"], "failed");
    assert_eq!(transaction_row(&test, &live.transaction_id)["status"], "pending");
}
