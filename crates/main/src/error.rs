use rocket::{
    http::Status,
    response::{self, Responder},
    serde::json::Json,
    Request, Response,
};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

/// Errors returned by the JSON API.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),
    #[error("stored data is malformed: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("could not hash password: {0}")]
    PasswordHash(argon2::password_hash::Error),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        ApiError::BadRequest(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        ApiError::Forbidden(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        ApiError::NotFound(msg.into())
    }

    pub fn status(&self) -> Status {
        match self {
            ApiError::BadRequest(_) => Status::BadRequest,
            ApiError::Unauthorized => Status::Unauthorized,
            ApiError::Forbidden(_) => Status::Forbidden,
            ApiError::NotFound(_) => Status::NotFound,
            ApiError::Database(_)
            | ApiError::Serialization(_)
            | ApiError::PasswordHash(_) => Status::InternalServerError,
        }
    }
}

/// Reads a JSON request body into `T`. Bodies which are missing, are not
/// JSON, or do not have the expected shape are all reported as bad requests.
pub fn parse_body<T: DeserializeOwned>(
    body: Option<Json<Value>>,
) -> ApiResult<T> {
    let Json(value) =
        body.ok_or_else(|| ApiError::bad_request("Expected a JSON body"))?;
    serde_json::from_value(value)
        .map_err(|e| ApiError::bad_request(format!("Invalid request: {e}")))
}

impl<'r> Responder<'r, 'static> for ApiError {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'static> {
        let status = self.status();
        let message = if status == Status::InternalServerError {
            tracing::error!(uri = %req.uri(), "internal error: {self}");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        Response::build_from(Json(json!({ "error": message })).respond_to(req)?)
            .status(status)
            .ok()
    }
}
