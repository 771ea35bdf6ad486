use db::user::User;
use rocket::serde::json::Json;
use serde_json::{json, Value};

use crate::error::{ApiError, ApiResult};

#[get("/api/auth/me")]
pub async fn me(user: Option<User>) -> ApiResult<Json<Value>> {
    let user = user.ok_or(ApiError::Unauthorized)?;
    Ok(Json(json!({ "user": user })))
}
