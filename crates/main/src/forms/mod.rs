//! The registration forms of an event: their questions, the submissions made
//! through them, and everything organizers do with those submissions.

use db::{event::FormType, id::is_public_id};

use crate::error::{ApiError, ApiResult};

pub mod aggregation;
pub mod answers;
pub mod check_in;
pub mod config;
pub mod intake;
pub mod listing;
pub mod questions;
pub mod review;

pub fn parse_form_type(s: &str) -> ApiResult<FormType> {
    FormType::parse(s).ok_or_else(|| {
        ApiError::bad_request(format!(
            "`{s}` is not a form type (expected `attendee`, `volunteer` or `speaker`)"
        ))
    })
}

pub fn check_submission_id(s: &str) -> ApiResult<String> {
    if is_public_id(s) {
        Ok(s.to_ascii_lowercase())
    } else {
        Err(ApiError::bad_request("Invalid submission id"))
    }
}
