use db::user::clear_login_cookie;
use rocket::{http::CookieJar, serde::json::Json};
use serde_json::{json, Value};

#[post("/api/auth/logout")]
pub async fn logout(jar: &CookieJar<'_>) -> Json<Value> {
    clear_login_cookie(jar);
    Json(json!({ "success": true }))
}
