use chrono::Utc;
use db::{
    event::{Event, FormType, Question},
    schema::events,
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
    forms::{parse_form_type, questions::parse_question_list},
    permissions::{require_permission, Permission},
};

/// What a client needs to render one of an event's forms.
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct FormDefinition {
    pub title: String,
    pub description: String,
    pub questions: Vec<Question>,
    /// The stored status, as is.
    pub status: String,
}

impl FormDefinition {
    pub fn of(event: &Event, form_type: FormType) -> ApiResult<Self> {
        let (title, description) = match form_type {
            FormType::Attendee => (
                format!("Register for {}", event.title),
                format!(
                    "Fill in the form below to register for {}.",
                    event.title
                ),
            ),
            FormType::Volunteer => (
                format!("Volunteer at {}", event.title),
                format!(
                    "Help make {} happen. Tell us a little about yourself.",
                    event.title
                ),
            ),
            FormType::Speaker => (
                format!("Apply to speak at {}", event.title),
                format!("Share your talk proposal for {}.", event.title),
            ),
        };

        Ok(FormDefinition {
            title,
            description,
            questions: event.questions()?.get(form_type).to_vec(),
            status: event.raw_form_status(form_type).to_string(),
        })
    }
}

/// The form as shown to applicants. Forms which may not be filled in yet
/// are reported as missing.
#[get("/api/events/<id>/forms/<form_type>")]
pub async fn public_form(
    id: String,
    form_type: String,
    db: DbConn,
) -> ApiResult<Json<FormDefinition>> {
    let form_type = parse_form_type(&form_type)?;
    let event = db.run(move |conn| find_event(&id, conn)).await?;

    if !event.form_is_public(form_type) {
        return Err(ApiError::not_found(format!(
            "{} form is not available",
            form_type.label()
        )));
    }

    Ok(Json(FormDefinition::of(&event, form_type)?))
}

#[get("/api/events/<id>/forms/<form_type>/config")]
pub async fn form_config(
    id: String,
    form_type: String,
    user: Option<User>,
    db: DbConn,
) -> ApiResult<Json<FormDefinition>> {
    let user = user.ok_or(ApiError::Unauthorized)?;
    let form_type = parse_form_type(&form_type)?;

    let event = db
        .run(move |conn| -> ApiResult<Event> {
            let event = find_event(&id, conn)?;
            require_permission(
                &user,
                Permission::ViewFormConfig((&event).into()),
                conn,
            )?;
            Ok(event)
        })
        .await?;

    Ok(Json(FormDefinition::of(&event, form_type)?))
}

/// Replaces the questions of a form. Answers already given to questions
/// which are removed stay in the stored submissions.
#[put("/api/events/<id>/forms/<form_type>/config", data = "<body>")]
pub async fn update_form_config(
    id: String,
    form_type: String,
    user: Option<User>,
    body: Option<Json<Value>>,
    db: DbConn,
) -> ApiResult<Json<Value>> {
    let user = user.ok_or(ApiError::Unauthorized)?;
    let form_type = parse_form_type(&form_type)?;

    db.run(move |conn| {
        conn.transaction(|conn| -> ApiResult<()> {
            let event = find_event(&id, conn)?;
            require_permission(
                &user,
                Permission::ModifyEvent((&event).into()),
                conn,
            )?;

            let questions = parse_question_list(
                body.as_ref().and_then(|Json(body)| body.get("questions")),
            )?;
            let count = questions.len();

            let mut all = event.questions()?;
            all.replace(form_type, questions);

            diesel::update(events::table.filter(events::id.eq(event.id)))
                .set((
                    events::custom_questions.eq(serde_json::to_string(&all)?),
                    events::updated_at.eq(Utc::now().naive_utc()),
                ))
                .execute(conn)?;

            tracing::info!(
                event = %event.public_id,
                form = form_type.as_str(),
                count,
                "replaced form questions"
            );
            Ok(())
        })
    })
    .await?;

    Ok(Json(json!({
        "success": true,
        "message": format!("{} form updated", form_type.label()),
    })))
}
