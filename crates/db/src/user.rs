use chrono::NaiveDateTime;
use diesel::prelude::*;
use rocket::{
    http::{Cookie, CookieJar, Status},
    outcome::try_outcome,
    request::{self, FromRequest},
    Request,
};
use serde::Serialize;

use crate::{schema, DbConn};

pub const LOGIN_COOKIE: &str = "registrations_session";

/// Authority of an account across the whole site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Admin,
    SuperAdmin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
            Role::SuperAdmin => "super-admin",
        }
    }

    pub fn parse(s: &str) -> Option<Role> {
        match s {
            "user" => Some(Role::User),
            "admin" => Some(Role::Admin),
            "super-admin" => Some(Role::SuperAdmin),
            _ => None,
        }
    }
}

/// What a user takes part in events as. Unlike [`Role`] this never grants
/// any authority.
pub mod user_type {
    pub const ATTENDEE: &str = "attendee";
    pub const ORGANIZER: &str = "organizer";
    pub const SPEAKER: &str = "speaker";
}

#[derive(Debug, Queryable, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(skip)]
    pub id: i64,
    #[serde(rename = "id")]
    pub public_id: String,
    pub username: Option<String>,
    pub email: String,
    #[serde(skip)]
    pub password_hash: String,
    pub role: String,
    pub user_type: String,
    pub created_at: NaiveDateTime,
}

impl User {
    /// Unrecognised roles carry no authority.
    pub fn role(&self) -> Role {
        Role::parse(&self.role).unwrap_or(Role::User)
    }

    pub fn is_super_admin(&self) -> bool {
        self.role() == Role::SuperAdmin
    }

    pub fn is_admin(&self) -> bool {
        matches!(self.role(), Role::Admin | Role::SuperAdmin)
    }

    /// The name to greet this user by.
    pub fn display_name(&self) -> &str {
        self.username.as_deref().unwrap_or(&self.email)
    }
}

#[derive(Debug)]
pub enum AuthError {
    CookieMissingOrMalformed,
    NoDatabase,
    Unauthorized,
}

#[derive(serde::Serialize, serde::Deserialize)]
pub struct LoginSession {
    id: i64,
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for User {
    type Error = AuthError;

    async fn from_request(
        request: &'r Request<'_>,
    ) -> request::Outcome<Self, AuthError> {
        let db = try_outcome!(request
            .guard::<DbConn>()
            .await
            .map_error(|(t, _)| (t, AuthError::NoDatabase)));

        let login_cookie = match request.cookies().get_private(LOGIN_COOKIE) {
            Some(cookie) => cookie,
            None => {
                return request::Outcome::Error((
                    Status::Unauthorized,
                    AuthError::CookieMissingOrMalformed,
                ));
            }
        };

        let login: LoginSession =
            match serde_json::from_str(login_cookie.value()) {
                Ok(t) => t,
                Err(e) => {
                    tracing::debug!("discarding malformed session cookie: {e}");
                    // a malformed cookie would otherwise stop the user from
                    // ever logging in again
                    request.cookies().remove_private(LOGIN_COOKIE);
                    return request::Outcome::Error((
                        Status::Unauthorized,
                        AuthError::CookieMissingOrMalformed,
                    ));
                }
            };

        let user = db
            .run(move |conn| {
                schema::users::table
                    .filter(schema::users::id.eq(login.id))
                    .first::<User>(conn)
                    .optional()
            })
            .await;

        match user {
            Ok(Some(user)) => request::Outcome::Success(user),
            Ok(None) => request::Outcome::Error((
                Status::Unauthorized,
                AuthError::Unauthorized,
            )),
            Err(e) => {
                tracing::error!("could not load session user: {e}");
                request::Outcome::Error((
                    Status::InternalServerError,
                    AuthError::NoDatabase,
                ))
            }
        }
    }
}

pub fn set_login_cookie(id: i64, jar: &CookieJar) {
    let session = LoginSession { id };
    // serializing a struct with a single integer field cannot fail
    if let Ok(value) = serde_json::to_string(&session) {
        jar.add_private(Cookie::new(LOGIN_COOKIE, value));
    }
}

pub fn clear_login_cookie(jar: &CookieJar) {
    jar.remove_private(LOGIN_COOKIE);
}
