use chrono::Utc;
use db::{
    event::{Event, FormStatus, FormType},
    id::gen_public_id,
    schema::{form_submissions, users},
    submission::{NewFormSubmission, SubmissionStatus},
    user::User,
    DbConn,
};
use diesel::prelude::*;
use email::{Outbox, Recipient};
use rocket::{http::Status, serde::json::Json, State};
use serde_json::{json, Map, Value};

use crate::{
    config::AppConfig,
    error::{ApiError, ApiResult},
    events::find_event,
    forms::{
        answers::{self, ValidatedAnswers},
        parse_form_type,
    },
    notifications,
    util::is_valid_email,
};

pub const DEFAULT_USER_NAME: &str = "Event Participant";

fn string_at<'a>(data: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    data.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// The name to file a submission under.
pub fn derive_user_name(data: &Map<String, Value>) -> String {
    if let Some(name) = ["name", "fullName", "full_name"]
        .into_iter()
        .find_map(|key| string_at(data, key))
    {
        return name.to_string();
    }

    let composed = [("firstName", "lastName"), ("first_name", "last_name")]
        .into_iter()
        .map(|(first, last)| {
            [string_at(data, first), string_at(data, last)]
                .into_iter()
                .flatten()
                .collect::<Vec<_>>()
                .join(" ")
        })
        .find(|name| !name.is_empty());

    composed.unwrap_or_else(|| DEFAULT_USER_NAME.to_string())
}

/// The address to write to about a submission: the `email` answer, then any
/// answer whose key mentions an email, then the account's address.
pub fn derive_user_email(
    data: &Map<String, Value>,
    user: Option<&User>,
) -> String {
    string_at(data, "email")
        .or_else(|| {
            data.iter()
                .filter(|(key, _)| key.to_lowercase().contains("email"))
                .find_map(|(key, _)| string_at(data, key))
        })
        .map(ToString::to_string)
        .or_else(|| user.map(|user| user.email.clone()))
        .unwrap_or_default()
}

/// The status a new submission starts in.
pub fn initial_status(event: &Event, form_type: FormType) -> SubmissionStatus {
    match form_type {
        FormType::Attendee if !event.require_approval => {
            SubmissionStatus::Approved
        }
        _ => SubmissionStatus::Pending,
    }
}

fn answer_summary(validated: &ValidatedAnswers) -> Vec<(String, String)> {
    let declared = validated
        .answered
        .iter()
        .map(|(question, answer)| (question.label.clone(), answer.display()));
    let extra = validated.extra.iter().map(|(key, value)| {
        let value = match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        (key.clone(), value)
    });
    declared.chain(extra).collect()
}

struct Stored {
    submission_id: String,
    status: SubmissionStatus,
    event: Event,
    organizer: Option<User>,
    applicant: Recipient,
    summary: Vec<(String, String)>,
}

fn answer_map(body: Option<Json<Value>>) -> ApiResult<Map<String, Value>> {
    let missing = || ApiError::bad_request("Submission data is required");
    let Json(body) = body.ok_or_else(missing)?;
    let mut body = match body {
        Value::Object(body) => body,
        _ => return Err(missing()),
    };
    match body.remove("data").or_else(|| body.remove("formData")) {
        Some(Value::Object(data)) => Ok(data),
        _ => Err(missing()),
    }
}

async fn submit(
    id: String,
    form_type: FormType,
    user: Option<User>,
    body: Option<Json<Value>>,
    db: DbConn,
    outbox: &Outbox,
    config: &AppConfig,
) -> ApiResult<(Status, Json<Value>)> {
    let data = answers::normalize(answer_map(body)?);

    let stored = db
        .run(move |conn| {
            conn.immediate_transaction(|conn| -> ApiResult<Stored> {
                let event = find_event(&id, conn)?;

                if form_type != FormType::Attendee
                    && event.form_status(form_type) != FormStatus::Published
                {
                    return Err(ApiError::not_found(format!(
                        "{} form is not available",
                        form_type.label()
                    )));
                }

                let questions = event.questions()?;
                let validated =
                    answers::validate(questions.get(form_type), &data)
                        .map_err(|errors| {
                            ApiError::BadRequest(errors.join("; "))
                        })?;
                let summary = answer_summary(&validated);
                let data = validated.canonicalize(data);

                let status = initial_status(&event, form_type);
                let user_name = derive_user_name(&data);
                let user_email = derive_user_email(&data, user.as_ref());
                let public_id = gen_public_id();
                let now = Utc::now().naive_utc();

                diesel::insert_into(form_submissions::table)
                    .values(NewFormSubmission {
                        public_id: &public_id,
                        event_id: event.id,
                        user_id: user.as_ref().map(|user| user.id),
                        form_type: form_type.as_str(),
                        status: status.as_str(),
                        user_name: &user_name,
                        user_email: &user_email,
                        data: &serde_json::to_string(&data)?,
                        created_at: now,
                        updated_at: now,
                    })
                    .execute(conn)?;

                let organizer = users::table
                    .filter(users::id.eq(event.organizer_id))
                    .first::<User>(conn)
                    .optional()?;

                tracing::info!(
                    event = %event.public_id,
                    submission = %public_id,
                    form = form_type.as_str(),
                    status = status.as_str(),
                    "stored submission"
                );

                Ok(Stored {
                    submission_id: public_id,
                    status,
                    event,
                    organizer,
                    applicant: Recipient::new(user_name, user_email),
                    summary,
                })
            })
        })
        .await?;

    if is_valid_email(&stored.applicant.email) {
        outbox
            .enqueue_best_effort(
                &db,
                notifications::submission_received(
                    &stored.event,
                    form_type,
                    stored.status,
                    stored.applicant.clone(),
                    config,
                ),
            )
            .await;
    }
    if let Some(organizer) = &stored.organizer {
        outbox
            .enqueue_best_effort(
                &db,
                notifications::organizer_notification(
                    &stored.event,
                    organizer,
                    form_type,
                    &stored.applicant,
                    stored.status,
                    &stored.summary,
                    config,
                ),
            )
            .await;
    }

    Ok((
        Status::Created,
        Json(json!({
            "success": true,
            "submissionId": stored.submission_id,
            "status": stored.status.as_str(),
        })),
    ))
}

#[post("/api/events/<id>/forms/<form_type>/submissions", data = "<body>")]
pub async fn submit_form(
    id: String,
    form_type: String,
    user: Option<User>,
    body: Option<Json<Value>>,
    db: DbConn,
    outbox: &State<Outbox>,
    config: &State<AppConfig>,
) -> ApiResult<(Status, Json<Value>)> {
    let form_type = parse_form_type(&form_type)?;
    submit(id, form_type, user, body, db, outbox, config).await
}

#[post("/api/events/<id>/speaker-applications", data = "<body>")]
pub async fn submit_speaker_application(
    id: String,
    user: Option<User>,
    body: Option<Json<Value>>,
    db: DbConn,
    outbox: &State<Outbox>,
    config: &State<AppConfig>,
) -> ApiResult<(Status, Json<Value>)> {
    submit(id, FormType::Speaker, user, body, db, outbox, config).await
}
