use claim::{assert_err, assert_ok};
use fake::faker::internet::en::SafeEmail;
use fake::faker::name::en::Name;
use fake::Fake;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::helpers::{seed_user, spawn_app, TestContext, PASSWORD};
use thesis_vault::core::{AppErrorType, Session};
use thesis_vault::gateway::Table;
use thesis_vault::models::users::RegisterRequest;
use thesis_vault::services::auth;

fn signup_body() -> Value {
    let tag = Uuid::new_v4().simple().to_string();
    json!({
        "username": format!("student_{}", &tag[..12]),
        "password": PASSWORD,
        "full_name": Name().fake::<String>(),
        "email": SafeEmail().fake::<String>(),
        "phone": "09171234567",
        "student_id": format!("2025-{}", &tag[..8]),
        "college": "College of Computing",
        "course": "BSIT",
        "year_level": "2",
    })
}

fn signup_request(body: Value) -> RegisterRequest {
    serde_json::from_value(body).unwrap()
}

#[tokio::test]
async fn login_returns_a_token_and_profile_for_an_active_student() {
    let app = spawn_app().await;
    let user = seed_user(&app.gateway, "user", "active");

    let response = app.login(&user.username, PASSWORD).await;
    assert_eq!(200, response.status().as_u16());

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["data"]["user"]["id"], user.id);
    assert!(body["data"]["user"].get("password").is_none());
    assert!(!body["data"]["token"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn login_rejects_bad_credentials_with_401() {
    let app = spawn_app().await;
    let user = seed_user(&app.gateway, "user", "active");

    let test_cases = vec![
        (user.username.clone(), "wrong password".to_string(), "wrong password"),
        ("nobody".to_string(), PASSWORD.to_string(), "unknown user"),
    ];
    for (username, password, description) in test_cases {
        let response = app.login(&username, &password).await;
        assert_eq!(401, response.status().as_u16(), "{}", description);
    }
}

#[tokio::test]
async fn login_rejects_empty_fields_with_400() {
    let app = spawn_app().await;

    let response = app.login("", "").await;

    assert_eq!(400, response.status().as_u16());
}

#[tokio::test]
async fn inactive_accounts_and_admins_are_forbidden() {
    let app = spawn_app().await;
    let inactive = seed_user(&app.gateway, "user", "inactive");
    let admin = seed_user(&app.gateway, "admin", "active");

    for user in [inactive, admin] {
        let response = app.login(&user.username, PASSWORD).await;
        assert_eq!(403, response.status().as_u16(), "{}", user.username);
    }
}

#[tokio::test]
async fn session_route_requires_a_valid_token() {
    let app = spawn_app().await;
    let user = seed_user(&app.gateway, "user", "active");
    let token = app.token_for(&user).await;

    let response = app.get("/auth/session", &token).await;
    assert_eq!(200, response.status().as_u16());

    let response = app.get("/auth/session", "not-a-jwt").await;
    assert_eq!(401, response.status().as_u16());
}

#[tokio::test]
async fn session_tracks_login_and_logout() {
    let test = TestContext::new();
    let user = test.seed_student();
    let session = Session::new();

    let error = assert_err!(session.current());
    assert!(error.is(AppErrorType::AuthError));

    let logged_in = assert_ok!(session.login(&test.ctx, &user.username, PASSWORD).await);
    assert_eq!(logged_in.id, user.id);
    assert_eq!(assert_ok!(session.current()).id, user.id);

    session.logout();
    assert_err!(session.current());
}

#[tokio::test]
async fn validate_session_fails_once_the_account_is_gone() {
    let test = TestContext::new();

    let error = assert_err!(auth::validate_session(&test.ctx, 999_999).await);

    assert!(error.is(AppErrorType::AuthError));
}

#[tokio::test]
async fn registering_creates_an_active_student_who_can_log_in() {
    let app = spawn_app().await;
    let body = signup_body();

    let response = app.register(&body).await;
    assert_eq!(201, response.status().as_u16());
    let created: Value = response.json().await.unwrap();
    assert_eq!(created["data"]["username"], body["username"]);
    assert_eq!(created["data"]["role"], "user");
    assert!(created["data"].get("password").is_none());

    let row = app
        .gateway
        .rows(Table::Users)
        .into_iter()
        .find(|row| row["username"] == body["username"])
        .unwrap();
    assert_eq!(row["status"], "active");
    assert!(row["password"].as_str().unwrap().starts_with("$argon2"));

    let response = app.login(body["username"].as_str().unwrap(), PASSWORD).await;
    assert_eq!(200, response.status().as_u16());
}

#[tokio::test]
async fn registering_a_taken_username_or_student_id_is_a_conflict() {
    let app = spawn_app().await;
    let existing = seed_user(&app.gateway, "user", "active");

    let mut same_username = signup_body();
    same_username["username"] = json!(existing.username);
    let mut same_student_id = signup_body();
    same_student_id["student_id"] = json!(existing.student_id);

    for (body, description) in [(same_username, "username"), (same_student_id, "student id")] {
        let response = app.register(&body).await;
        assert_eq!(409, response.status().as_u16(), "{}", description);
    }
    assert_eq!(app.gateway.rows(Table::Users).len(), 1);
}

#[tokio::test]
async fn registering_with_invalid_fields_is_rejected_with_400() {
    let app = spawn_app().await;

    let test_cases = vec![
        ("password", json!("12345"), "short password"),
        ("email", json!("not-an-email"), "malformed email"),
        ("student_id", json!(""), "missing student id"),
    ];
    for (field, value, description) in test_cases {
        let mut body = signup_body();
        body[field] = value;
        let response = app.register(&body).await;
        assert_eq!(400, response.status().as_u16(), "{}", description);
    }
    assert!(app.gateway.rows(Table::Users).is_empty());
}

#[tokio::test]
async fn simultaneous_signups_for_one_username_create_one_account() {
    let test = TestContext::interleaved();
    let first = signup_request(signup_body());
    let mut second_body = signup_body();
    second_body["username"] = json!(first.username);
    let second = signup_request(second_body);

    let (first_outcome, second_outcome) =
        tokio::join!(auth::register(&test.ctx, &first), auth::register(&test.ctx, &second));

    // Both lookups miss; the unique index turns the second insert away.
    assert_ok!(first_outcome);
    let error = assert_err!(second_outcome);
    assert!(error.is(AppErrorType::DuplicateAccountError));
    assert_eq!(test.rows(Table::Users).len(), 1);
}
