use argon2::{
    password_hash::{PasswordHasher, SaltString},
    Argon2,
};
use chrono::Utc;
use db::{
    id::gen_public_id,
    schema::users,
    user::{set_login_cookie, user_type, Role, User},
    DbConn,
};
use diesel::{dsl::exists, insert_into, prelude::*, select};
use rand::rngs::OsRng;
use rocket::{
    http::{CookieJar, Status},
    serde::json::Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{
    error::{parse_body, ApiError, ApiResult},
    util::is_valid_email,
};

pub const MIN_PASSWORD_LEN: usize = 8;

#[derive(Deserialize, Serialize)]
pub struct RegisterRequest {
    pub(crate) username: Option<String>,
    pub(crate) email: String,
    pub(crate) password: String,
}

#[post("/api/auth/register", data = "<body>")]
pub async fn register(
    body: Option<Json<Value>>,
    jar: &CookieJar<'_>,
    db: DbConn,
) -> ApiResult<(Status, Json<Value>)> {
    let req: RegisterRequest = parse_body(body)?;
    let email = req.email.trim().to_lowercase();

    if !is_valid_email(&email) {
        return Err(ApiError::bad_request("That email is not valid"));
    }
    if req.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::bad_request(format!(
            "Passwords must be at least {MIN_PASSWORD_LEN} characters long"
        )));
    }

    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(ApiError::PasswordHash)?
        .to_string();
    let username = req
        .username
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty());

    let user = db
        .run(move |conn| {
            conn.transaction(|conn| -> ApiResult<User> {
                let taken = select(exists(
                    users::table.filter(users::email.eq(&email)),
                ))
                .get_result::<bool>(conn)?;
                if taken {
                    return Err(ApiError::bad_request(
                        "An account with that email already exists",
                    ));
                }

                Ok(insert_into(users::table)
                    .values((
                        users::public_id.eq(gen_public_id()),
                        users::username.eq(&username),
                        users::email.eq(&email),
                        users::password_hash.eq(&password_hash),
                        users::role.eq(Role::User.as_str()),
                        users::user_type.eq(user_type::ATTENDEE),
                        users::created_at.eq(Utc::now().naive_utc()),
                    ))
                    .get_result::<User>(conn)?)
            })
        })
        .await?;

    tracing::info!(user = user.id, "registered new account");
    set_login_cookie(user.id, jar);
    Ok((Status::Created, Json(json!({ "success": true, "user": user }))))
}
