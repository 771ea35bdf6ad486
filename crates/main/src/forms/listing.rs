use std::collections::{HashMap, HashSet};

use chrono::NaiveDateTime;
use db::{
    schema::{form_submissions, users},
    submission::{FormSubmission, SubmissionStatus},
    user::User,
    DbConn,
};
use diesel::prelude::*;
use rocket::serde::json::Json;
use serde::Serialize;
use serde_json::{json, Value};

use crate::{
    error::{ApiError, ApiResult},
    events::find_event,
    forms::parse_form_type,
    permissions::{require_permission, Permission},
};

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionView {
    pub id: String,
    pub form_type: String,
    pub status: String,
    pub user_name: String,
    pub user_email: String,
    pub data: Value,
    pub is_checked_in: bool,
    pub checked_in_at: Option<NaiveDateTime>,
    pub check_in_count: i64,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl SubmissionView {
    fn new(submission: FormSubmission) -> ApiResult<Self> {
        let data = Value::Object(submission.answers()?);
        Ok(SubmissionView {
            id: submission.public_id,
            form_type: submission.form_type,
            status: submission.status,
            user_name: submission.user_name,
            user_email: submission.user_email,
            data,
            is_checked_in: submission.is_checked_in,
            checked_in_at: submission.checked_in_at,
            check_in_count: submission.check_in_count,
            created_at: submission.created_at,
            updated_at: submission.updated_at,
        })
    }
}

/// Newest first.
#[get("/api/events/<id>/submissions/<form_type>?<status>")]
pub async fn list_submissions(
    id: String,
    form_type: String,
    status: Option<String>,
    user: Option<User>,
    db: DbConn,
) -> ApiResult<Json<Value>> {
    let user = user.ok_or(ApiError::Unauthorized)?;
    let form_type = parse_form_type(&form_type)?;
    let status = match status.as_deref() {
        None | Some("") => None,
        Some(s) => Some(SubmissionStatus::parse(s).ok_or_else(|| {
            ApiError::bad_request(format!("`{s}` is not a submission status"))
        })?),
    };

    let submissions = db
        .run(move |conn| -> ApiResult<Vec<FormSubmission>> {
            let event = find_event(&id, conn)?;
            require_permission(
                &user,
                Permission::ReviewSubmissions((&event).into()),
                conn,
            )?;

            let mut query = form_submissions::table
                .filter(form_submissions::event_id.eq(event.id))
                .filter(form_submissions::form_type.eq(form_type.as_str()))
                .order_by((
                    form_submissions::created_at.desc(),
                    form_submissions::id.desc(),
                ))
                .into_boxed();
            if let Some(status) = status {
                query = query.filter(form_submissions::status.eq(status.as_str()));
            }
            Ok(query.load::<FormSubmission>(conn)?)
        })
        .await?;

    let submissions = submissions
        .into_iter()
        .map(SubmissionView::new)
        .collect::<ApiResult<Vec<_>>>()?;

    Ok(Json(json!({
        "total": submissions.len(),
        "submissions": submissions,
    })))
}

#[derive(Serialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub submission_id: String,
    /// Public id of the applicant's account, if they had one.
    pub user_id: Option<String>,
    pub name: String,
    pub email: String,
}

/// Keeps the earliest submission of every participant. Submissions are the
/// same participant when they share an account, or (without one) an email.
pub fn dedupe_participants(
    approved: Vec<FormSubmission>,
    accounts: &HashMap<i64, String>,
) -> Vec<Participant> {
    let mut seen = HashSet::new();
    approved
        .into_iter()
        .filter(|submission| {
            let key = match submission.user_id {
                Some(user_id) => format!("user:{user_id}"),
                None if !submission.user_email.is_empty() => {
                    format!("email:{}", submission.user_email.to_lowercase())
                }
                None => format!("submission:{}", submission.public_id),
            };
            seen.insert(key)
        })
        .map(|submission| Participant {
            user_id: submission
                .user_id
                .and_then(|id| accounts.get(&id).cloned()),
            submission_id: submission.public_id,
            name: submission.user_name,
            email: submission.user_email,
        })
        .collect()
}

/// Who takes part in an event in a given capacity: everyone with an
/// approved submission of that form.
#[get("/api/events/<id>/participants/<form_type>")]
pub async fn list_participants(
    id: String,
    form_type: String,
    user: Option<User>,
    db: DbConn,
) -> ApiResult<Json<Value>> {
    let user = user.ok_or(ApiError::Unauthorized)?;
    let form_type = parse_form_type(&form_type)?;

    let participants = db
        .run(move |conn| -> ApiResult<Vec<Participant>> {
            let event = find_event(&id, conn)?;
            require_permission(
                &user,
                Permission::ReviewSubmissions((&event).into()),
                conn,
            )?;

            let approved = form_submissions::table
                .filter(form_submissions::event_id.eq(event.id))
                .filter(form_submissions::form_type.eq(form_type.as_str()))
                .filter(
                    form_submissions::status
                        .eq(SubmissionStatus::Approved.as_str()),
                )
                .order_by((
                    form_submissions::created_at.asc(),
                    form_submissions::id.asc(),
                ))
                .load::<FormSubmission>(conn)?;

            let user_ids = approved
                .iter()
                .filter_map(|submission| submission.user_id)
                .collect::<Vec<_>>();
            let accounts = users::table
                .filter(users::id.eq_any(user_ids))
                .select((users::id, users::public_id))
                .load::<(i64, String)>(conn)?
                .into_iter()
                .collect::<HashMap<_, _>>();

            Ok(dedupe_participants(approved, &accounts))
        })
        .await?;

    Ok(Json(json!({
        "total": participants.len(),
        "participants": participants,
    })))
}
