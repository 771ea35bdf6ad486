use chrono::{NaiveDateTime, Utc};
use db::{
    event::FormType,
    schema::form_submissions,
    submission::SubmissionStatus,
    user::User,
    DbConn,
};
use diesel::prelude::*;
use rocket::serde::json::Json;
use serde_json::{json, Value};

use crate::{
    error::{ApiError, ApiResult},
    events::find_event,
    forms::{check_submission_id, review::find_submission},
    permissions::{require_permission, Permission},
};

/// Marks an attendee as present. Checking someone in again is allowed and
/// counted.
#[post("/api/events/<id>/check-in/<submission_id>")]
pub async fn check_in(
    id: String,
    submission_id: String,
    user: Option<User>,
    db: DbConn,
) -> ApiResult<Json<Value>> {
    let user = user.ok_or(ApiError::Unauthorized)?;
    let submission_id = check_submission_id(&submission_id)?;

    let (count, at) = db
        .run(move |conn| {
            conn.immediate_transaction(|conn| -> ApiResult<(i64, NaiveDateTime)> {
                let event = find_event(&id, conn)?;
                require_permission(
                    &user,
                    Permission::ReviewSubmissions((&event).into()),
                    conn,
                )?;
                let submission =
                    find_submission(&event, None, &submission_id, conn)?;

                if submission.form_type() != Some(FormType::Attendee)
                    || submission.status() != Some(SubmissionStatus::Approved)
                {
                    return Err(ApiError::bad_request(
                        "Only approved attendee submissions can be checked in",
                    ));
                }

                let now = Utc::now().naive_utc();
                let count = diesel::update(
                    form_submissions::table
                        .filter(form_submissions::id.eq(submission.id)),
                )
                .set((
                    form_submissions::is_checked_in.eq(true),
                    form_submissions::checked_in_at.eq(Some(now)),
                    form_submissions::checked_in_by.eq(Some(user.id)),
                    form_submissions::check_in_count
                        .eq(form_submissions::check_in_count + 1),
                    form_submissions::updated_at.eq(now),
                ))
                .returning(form_submissions::check_in_count)
                .get_result::<i64>(conn)?;

                tracing::info!(submission = %submission.public_id, count, "checked in");
                Ok((count, now))
            })
        })
        .await?;

    Ok(Json(json!({
        "success": true,
        "checkInCount": count,
        "checkedInAt": at,
    })))
}
