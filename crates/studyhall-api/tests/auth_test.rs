//! Registration validation: short passwords and malformed emails are
//! rejected before any row is written, and a duplicate email conflicts
//! without disturbing the existing account.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;

use studyhall_api::{AppState, AppStateInner, auth};
use studyhall_db::Database;
use studyhall_engine::{ChangeFeed, MutationGateway};
use studyhall_types::api::RegisterRequest;

fn make_state() -> AppState {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let gateway = MutationGateway::new(db.clone(), ChangeFeed::new());
    Arc::new(AppStateInner {
        db,
        gateway,
        jwt_secret: "test-secret".into(),
    })
}

fn request(email: &str, password: &str) -> RegisterRequest {
    RegisterRequest {
        email: email.into(),
        password: password.into(),
    }
}

#[tokio::test]
async fn register_rejects_short_passwords_without_writing() {
    let state = make_state();

    let result = auth::register(
        State(state.clone()),
        Json(request("alice@example.com", "short")),
    )
    .await;

    assert_eq!(result.err(), Some(StatusCode::BAD_REQUEST));
    assert!(
        state
            .db
            .get_user_by_email("alice@example.com")
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn register_rejects_malformed_emails() {
    let state = make_state();

    let result = auth::register(
        State(state.clone()),
        Json(request("not-an-email", "longenough")),
    )
    .await;

    assert_eq!(result.err(), Some(StatusCode::BAD_REQUEST));
    assert!(state.db.get_user_by_email("not-an-email").unwrap().is_none());
}

#[tokio::test]
async fn register_rejects_duplicate_emails_keeping_the_first_account() {
    let state = make_state();

    let first = auth::register(
        State(state.clone()),
        Json(request("bob@example.com", "longenough")),
    )
    .await;
    assert!(first.is_ok());

    let original = state
        .db
        .get_user_by_email("bob@example.com")
        .unwrap()
        .expect("first registration should have written a row");

    let second = auth::register(
        State(state.clone()),
        Json(request("bob@example.com", "alsolongenough")),
    )
    .await;
    assert_eq!(second.err(), Some(StatusCode::CONFLICT));

    // still exactly the original account
    let row = state
        .db
        .get_user_by_email("bob@example.com")
        .unwrap()
        .unwrap();
    assert_eq!(row.id, original.id);
    assert_eq!(row.password, original.password);
}
