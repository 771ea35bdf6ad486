use argon2::{Argon2, PasswordHash, PasswordVerifier};
use db::{
    schema::users,
    user::{set_login_cookie, User},
    DbConn,
};
use diesel::prelude::*;
use rocket::{http::CookieJar, serde::json::Json};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{parse_body, ApiError, ApiResult};

#[derive(Deserialize, Serialize, Debug)]
pub struct PasswordLoginRequest {
    pub email: String,
    pub password: String,
}

fn password_matches(user: &User, password: &str) -> bool {
    match PasswordHash::new(&user.password_hash) {
        Ok(hash) => Argon2::default()
            .verify_password(password.as_bytes(), &hash)
            .is_ok(),
        Err(e) => {
            tracing::error!(user = user.id, "stored password hash is invalid: {e}");
            false
        }
    }
}

/// Unknown emails and wrong passwords are reported the same way.
#[post("/api/auth/login", data = "<body>")]
pub async fn login(
    body: Option<Json<Value>>,
    jar: &CookieJar<'_>,
    db: DbConn,
) -> ApiResult<Json<Value>> {
    let req: PasswordLoginRequest = parse_body(body)?;
    let email = req.email.trim().to_lowercase();

    let user = db
        .run(move |conn| {
            users::table
                .filter(users::email.eq(&email))
                .first::<User>(conn)
                .optional()
        })
        .await?;

    match user {
        Some(user) if password_matches(&user, &req.password) => {
            set_login_cookie(user.id, jar);
            Ok(Json(json!({ "success": true, "user": user })))
        }
        _ => Err(ApiError::Unauthorized),
    }
}
