use chrono::Utc;
use db::{
    event::{Event, FormType},
    schema::{form_submissions, users},
    submission::{FormSubmission, SubmissionStatus},
    user::{user_type, User},
    DbConn,
};
use diesel::prelude::*;
use email::{Outbox, Recipient};
use rocket::{serde::json::Json, State};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{
    config::AppConfig,
    error::{parse_body, ApiError, ApiResult},
    events::find_event,
    forms::{check_submission_id, parse_form_type},
    notifications,
    permissions::{require_permission, Permission},
    util::is_valid_email,
};

#[derive(Deserialize, Debug)]
pub struct ReviewRequest {
    pub status: String,
    /// Who to address the decision email to. Independent of the name and
    /// address stored with the submission.
    pub name: Option<String>,
    pub email: Option<String>,
}

/// Looks up a submission of one form of one event.
pub fn find_submission(
    event: &Event,
    form_type: Option<FormType>,
    submission_id: &str,
    conn: &mut db::DbWrapper,
) -> ApiResult<FormSubmission> {
    let mut query = form_submissions::table
        .filter(form_submissions::public_id.eq(submission_id))
        .filter(form_submissions::event_id.eq(event.id))
        .into_boxed();
    if let Some(form_type) = form_type {
        query = query.filter(form_submissions::form_type.eq(form_type.as_str()));
    }
    query
        .first::<FormSubmission>(conn)
        .optional()?
        .ok_or_else(|| ApiError::not_found("Submission not found"))
}

/// Makes the submitter of an approved speaker application a speaker.
/// Approving the same application twice changes nothing.
fn promote_to_speaker(
    submission: &FormSubmission,
    conn: &mut db::DbWrapper,
) -> QueryResult<()> {
    if let Some(user_id) = submission.user_id {
        let n = diesel::update(
            users::table
                .filter(users::id.eq(user_id))
                .filter(users::user_type.ne(user_type::SPEAKER)),
        )
        .set(users::user_type.eq(user_type::SPEAKER))
        .execute(conn)?;
        if n > 0 {
            tracing::info!(user = user_id, "promoted user to speaker");
        }
    }
    Ok(())
}

#[patch(
    "/api/events/<id>/submissions/<form_type>/<submission_id>",
    data = "<body>"
)]
pub async fn review_submission(
    id: String,
    form_type: String,
    submission_id: String,
    user: Option<User>,
    body: Option<Json<Value>>,
    db: DbConn,
    outbox: &State<Outbox>,
    config: &State<AppConfig>,
) -> ApiResult<Json<Value>> {
    let user = user.ok_or(ApiError::Unauthorized)?;
    let form_type = parse_form_type(&form_type)?;
    let submission_id = check_submission_id(&submission_id)?;
    let request: ReviewRequest = parse_body(body)?;
    let status = SubmissionStatus::parse(&request.status).ok_or_else(|| {
        ApiError::bad_request(format!(
            "`{}` is not a submission status",
            request.status
        ))
    })?;

    let (event, organizer, submission) = db
        .run(move |conn| {
            conn.immediate_transaction(
                |conn| -> ApiResult<(Event, Option<User>, FormSubmission)> {
                    let event = find_event(&id, conn)?;
                    require_permission(
                        &user,
                        Permission::ReviewSubmissions((&event).into()),
                        conn,
                    )?;
                    let submission = find_submission(
                        &event,
                        Some(form_type),
                        &submission_id,
                        conn,
                    )?;

                    diesel::update(
                        form_submissions::table
                            .filter(form_submissions::id.eq(submission.id)),
                    )
                    .set((
                        form_submissions::status.eq(status.as_str()),
                        form_submissions::updated_at.eq(Utc::now().naive_utc()),
                    ))
                    .execute(conn)?;

                    if status == SubmissionStatus::Approved
                        && form_type == FormType::Speaker
                    {
                        promote_to_speaker(&submission, conn)?;
                    }

                    tracing::info!(
                        submission = %submission.public_id,
                        from = %submission.status,
                        to = status.as_str(),
                        reviewer = user.id,
                        "reviewed submission"
                    );

                    let organizer = users::table
                        .filter(users::id.eq(event.organizer_id))
                        .first::<User>(conn)
                        .optional()?;
                    Ok((event, organizer, submission))
                },
            )
        })
        .await?;

    let recipient = request
        .email
        .as_deref()
        .map(str::trim)
        .filter(|email| is_valid_email(email));
    if let (Some(email), Some(organizer)) = (recipient, &organizer) {
        let name = request
            .name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(&submission.user_name);
        if let Some(decision) = notifications::decision(
            &event,
            organizer,
            form_type,
            status,
            Recipient::new(name, email),
            config,
        ) {
            outbox.enqueue_best_effort(&db, decision).await;
        }
    }

    Ok(Json(json!({
        "success": true,
        "message": format!("{} submission {}", form_type.label(), status.as_str()),
    })))
}
