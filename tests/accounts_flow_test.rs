//! Signup, email activation and profile management over HTTP.

mod common;

use axum::http::{Method, StatusCode};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use common::{field_messages, response_json, TestApp, TEST_BASE_URL, TEST_MAX_AVATAR_BYTES, TEST_PASSWORD};
use fake::{
    faker::internet::en::{SafeEmail, Username},
    Fake,
};
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};
use serde_json::{json, Value};
use storefront_api::entities::user;

fn signup_form(username: &str, email: &str) -> Value {
    json!({
        "username": username,
        "email": email,
        "password1": TEST_PASSWORD,
        "password2": TEST_PASSWORD,
    })
}

async fn signup(app: &TestApp, form: Value) -> (StatusCode, Value) {
    let response = app
        .request(Method::POST, "/accounts/signup", Some(form), None)
        .await;
    let status = response.status();
    (status, response_json(response).await)
}

async fn login(app: &TestApp, username: &str) -> StatusCode {
    app.request(
        Method::POST,
        "/auth/login",
        Some(json!({ "username": username, "password": TEST_PASSWORD })),
        None,
    )
    .await
    .status()
}

/// Path of the activation link in the most recent email
fn activation_path(app: &TestApp) -> String {
    let sent = app.mailer.sent();
    let message = sent.last().expect("an email was sent");
    message
        .body
        .lines()
        .find_map(|line| line.trim().strip_prefix(TEST_BASE_URL))
        .expect("activation link in body")
        .to_string()
}

fn png(len: usize) -> String {
    let mut bytes = b"\x89PNG\r\n\x1a\n".to_vec();
    bytes.resize(len, 0);
    STANDARD.encode(bytes)
}

// ==================== Signup and activation ====================

#[tokio::test]
async fn signup_emails_a_link_that_activates_the_account() {
    let app = TestApp::new().await;

    let (status, body) = signup(&app, signup_form("olena", "olena@example.com")).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["is_active"], false);

    let sent = app.mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "olena@example.com");
    assert_eq!(sent[0].subject, "Email confirmation");

    assert_eq!(login(&app, "olena").await, StatusCode::UNAUTHORIZED);

    let path = activation_path(&app);
    assert!(path.starts_with("/accounts/activate/"), "{path}");

    let response = app.get(&path, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response_json(response).await["status"], "activated");

    assert_eq!(login(&app, "olena").await, StatusCode::OK);
    assert_eq!(login(&app, "olena@example.com").await, StatusCode::OK);

    let response = app.get(&path, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response_json(response).await["status"], "already_active");
}

#[tokio::test]
async fn generated_signups_each_get_their_own_email() {
    let app = TestApp::new().await;

    for n in 0..3 {
        let raw: String = Username().fake();
        let username: String = raw
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .chain(n.to_string().chars())
            .collect();
        let email = format!("{}{}", n, SafeEmail().fake::<String>());

        let (status, body) = signup(&app, signup_form(&username, &email)).await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        assert_eq!(app.mailer.sent().last().unwrap().to, email);
    }

    assert_eq!(app.mailer.sent().len(), 3);
}

#[tokio::test]
async fn tampered_activation_token_is_rejected() {
    let app = TestApp::new().await;
    signup(&app, signup_form("taras", "taras@example.com")).await;

    let path = activation_path(&app);
    let trimmed = path.trim_end_matches('/');
    let (prefix, token) = trimmed.rsplit_once('/').expect("token segment");
    let flipped = if token.ends_with('0') { '1' } else { '0' };
    let tampered = format!("{}/{}{}/", prefix, &token[..token.len() - 1], flipped);

    let response = app.get(&tampered, None).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(login(&app, "taras").await, StatusCode::UNAUTHORIZED);

    let response = app.get("/accounts/activate/not-a-uid/abc/", None).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn duplicate_accounts_and_mismatched_passwords_are_reported() {
    let app = TestApp::new().await;
    app.create_user("olena", false).await;

    let (status, body) = signup(
        &app,
        json!({
            "username": "olena",
            "email": "olena@example.com",
            "password1": TEST_PASSWORD,
            "password2": "something-else-42",
        }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        field_messages(&body, "username"),
        vec!["A user with that username already exists.".to_string()]
    );
    assert_eq!(
        field_messages(&body, "email"),
        vec!["User with this Email address already exists.".to_string()]
    );
    assert_eq!(
        field_messages(&body, "password2"),
        vec!["The two password fields didn't match.".to_string()]
    );
    assert!(app.mailer.sent().is_empty());
}

#[tokio::test]
async fn weak_passwords_are_rejected() {
    let app = TestApp::new().await;

    let (status, body) = signup(
        &app,
        json!({
            "username": "petro",
            "email": "petro@example.com",
            "password1": "1234",
            "password2": "1234",
        }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(field_messages(&body, "password2").len(), 2);
}

#[tokio::test]
async fn failed_email_rolls_the_account_back() {
    let app = TestApp::new().await;
    app.mailer.fail_next_sends(true);

    let (status, body) = signup(&app, signup_form("sofia", "sofia@example.com")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(!field_messages(&body, "__all__").is_empty());

    let remaining = user::Entity::find()
        .filter(user::Column::Username.eq("sofia"))
        .count(&*app.state.db)
        .await
        .unwrap();
    assert_eq!(remaining, 0);

    app.mailer.fail_next_sends(false);
    let (status, _) = signup(&app, signup_form("sofia", "sofia@example.com")).await;
    assert_eq!(status, StatusCode::CREATED);
}

// ==================== Profile ====================

async fn update_profile(app: &TestApp, token: &str, form: Value) -> (StatusCode, Value) {
    let response = app
        .request(Method::PUT, "/accounts/profile", Some(form), Some(token))
        .await;
    let status = response.status();
    (status, response_json(response).await)
}

#[tokio::test]
async fn profile_shows_placeholder_avatar_and_no_purchases() {
    let app = TestApp::new().await;
    let (_, token) = app.customer("marta").await;

    let response = app.get("/accounts/profile", Some(&token)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["username"], "marta");
    assert_eq!(body["avatar_url"], "/static/img/placeholder.png");
    assert_eq!(body["last_buys"].as_array().unwrap().len(), 0);

    let response = app.get("/accounts/profile", None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn names_are_title_cased_and_own_email_is_kept() {
    let app = TestApp::new().await;
    let (_, token) = app.customer("marta").await;

    let (status, body) = update_profile(
        &app,
        &token,
        json!({
            "email": "marta@example.com",
            "first_name": "  mary-jane ",
            "last_name": "o'neil",
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email"], "marta@example.com");
    assert_eq!(body["first_name"], "Mary-Jane");
    assert_eq!(body["last_name"], "O'Neil");
}

#[tokio::test]
async fn email_of_another_account_is_refused() {
    let app = TestApp::new().await;
    app.create_user("taken", false).await;
    let (_, token) = app.customer("marta").await;

    let (status, body) =
        update_profile(&app, &token, json!({ "email": "taken@example.com" })).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        field_messages(&body, "email"),
        vec!["This email used".to_string()]
    );
}

#[tokio::test]
async fn oversized_or_broken_avatars_are_refused() {
    let app = TestApp::new().await;
    let (_, token) = app.customer("marta").await;

    let (status, body) = update_profile(
        &app,
        &token,
        json!({ "email": "marta@example.com", "avatar": png(TEST_MAX_AVATAR_BYTES + 1) }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        field_messages(&body, "avatar"),
        vec!["Size of image must be 1024*1024 and 4MB.".to_string()]
    );

    let (status, body) = update_profile(
        &app,
        &token,
        json!({ "email": "marta@example.com", "avatar": STANDARD.encode(b"plain text") }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(field_messages(&body, "avatar").len(), 1);
}

#[tokio::test]
async fn avatar_is_stored_under_media() {
    let app = TestApp::new().await;
    let (account, token) = app.customer("marta").await;

    let (status, body) = update_profile(
        &app,
        &token,
        json!({ "email": "marta@example.com", "avatar": format!("data:image/png;base64,{}", png(64)) }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let url = body["avatar_url"].as_str().unwrap();
    let prefix = format!("/media/accounts/profiles/avatars/{}-", account.id);
    assert!(url.starts_with(&prefix), "{url}");
    assert!(url.ends_with(".png"), "{url}");

    let relative = url.trim_start_matches("/media/");
    assert!(app.media_dir.join(relative).exists());

    let (_, cleared) = update_profile(
        &app,
        &token,
        json!({ "email": "marta@example.com", "clear_avatar": true }),
    )
    .await;
    assert_eq!(cleared["avatar_url"], "/static/img/placeholder.png");
}
