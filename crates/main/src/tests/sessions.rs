use rocket::http::Status;
use serde_json::json;

use super::{body, test_app, PASSWORD};

#[test]
fn register_login_logout() {
    let app = test_app();
    app.register("Ada", "Ada@Example.com");

    let response = app.get("/api/auth/me");
    assert_eq!(response.status(), Status::Ok);
    let me = body(response);
    assert_eq!(me["user"]["email"], "ada@example.com");
    assert_eq!(me["user"]["role"], "user");
    assert_eq!(me["user"]["userType"], "attendee");
    assert!(me["user"].get("passwordHash").is_none());

    app.logout();
    assert_eq!(app.get("/api/auth/me").status(), Status::Unauthorized);

    app.login("ada@example.com");
    assert_eq!(app.get("/api/auth/me").status(), Status::Ok);
}

#[test]
fn wrong_passwords_are_rejected() {
    let app = test_app();
    app.register("Ada", "ada@example.com");
    app.logout();

    let response = app.post_json(
        "/api/auth/login",
        json!({ "email": "ada@example.com", "password": "not the password" }),
    );
    assert_eq!(response.status(), Status::Unauthorized);

    let response = app.post_json(
        "/api/auth/login",
        json!({ "email": "nobody@example.com", "password": PASSWORD }),
    );
    assert_eq!(response.status(), Status::Unauthorized);
}

#[test]
fn registration_is_validated() {
    let app = test_app();
    app.register("Ada", "ada@example.com");

    let response = app.post_json(
        "/api/auth/register",
        json!({ "email": "ADA@example.com", "password": PASSWORD }),
    );
    assert_eq!(response.status(), Status::BadRequest);

    let response = app.post_json(
        "/api/auth/register",
        json!({ "email": "grace@example.com", "password": "short" }),
    );
    assert_eq!(response.status(), Status::BadRequest);

    let response = app.post_json(
        "/api/auth/register",
        json!({ "email": "not-an-email", "password": PASSWORD }),
    );
    assert_eq!(response.status(), Status::BadRequest);

    let response = app.post_json(
        "/api/auth/register",
        json!({ "email": "grace@example.com\nbcc: x", "password": PASSWORD }),
    );
    assert_eq!(response.status(), Status::BadRequest);
}

#[test]
fn request_ids_are_echoed() {
    let app = test_app();
    let response = app.get_with_request_id("/api/auth/me", "test-request-42");
    assert_eq!(response.request_id.as_deref(), Some("test-request-42"));

    let response = app.get("/api/auth/me");
    assert!(response.request_id.is_some());
}

#[test]
fn errors_are_json() {
    let app = test_app();

    let response = app.get("/api/auth/me");
    assert_eq!(response.status(), Status::Unauthorized);
    assert!(body(response)["error"].is_string());

    let response = app.get("/api/no/such/route");
    assert_eq!(response.status(), Status::NotFound);
    assert!(body(response)["error"].is_string());
}
