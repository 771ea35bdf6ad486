use chrono::Utc;
use db::{
    event::{EventStatus, FormStatus},
    schema::events,
    user::User,
    DbConn,
};
use diesel::prelude::*;
use rocket::serde::json::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{
    error::{parse_body, ApiError, ApiResult},
    events::find_event,
    forms::parse_form_type,
    permissions::{require_permission, Permission},
};

#[derive(Deserialize)]
struct StatusChange {
    status: String,
}

#[patch("/api/events/<id>/status", data = "<body>")]
pub async fn set_event_status(
    id: String,
    user: Option<User>,
    body: Option<Json<Value>>,
    db: DbConn,
) -> ApiResult<Json<Value>> {
    let user = user.ok_or(ApiError::Unauthorized)?;
    let StatusChange { status } = parse_body(body)?;
    let status = EventStatus::parse(&status).ok_or_else(|| {
        ApiError::bad_request(format!("`{status}` is not an event status"))
    })?;

    db.run(move |conn| {
        conn.transaction(|conn| -> ApiResult<()> {
            let event = find_event(&id, conn)?;
            require_permission(&user, Permission::ModifyEvent((&event).into()), conn)?;

            diesel::update(events::table.filter(events::id.eq(event.id)))
                .set((
                    events::status.eq(status.as_str()),
                    events::updated_at.eq(Utc::now().naive_utc()),
                ))
                .execute(conn)?;
            tracing::info!(event = %event.public_id, status = status.as_str(), "changed event status");
            Ok(())
        })
    })
    .await?;

    Ok(Json(json!({
        "success": true,
        "message": format!("Event status set to {}", status.as_str()),
    })))
}

/// Publishes or unpublishes one of an event's forms.
#[put("/api/events/<id>/forms/<form_type>/status", data = "<body>")]
pub async fn set_form_status(
    id: String,
    form_type: String,
    user: Option<User>,
    body: Option<Json<Value>>,
    db: DbConn,
) -> ApiResult<Json<Value>> {
    let user = user.ok_or(ApiError::Unauthorized)?;
    let form_type = parse_form_type(&form_type)?;
    let StatusChange { status } = parse_body(body)?;
    let status = match status.as_str() {
        "draft" => FormStatus::Draft,
        "published" => FormStatus::Published,
        other => {
            return Err(ApiError::bad_request(format!(
                "`{other}` is not a form status (expected `draft` or `published`)"
            )))
        }
    };

    db.run(move |conn| {
        conn.transaction(|conn| -> ApiResult<()> {
            let event = find_event(&id, conn)?;
            require_permission(&user, Permission::ModifyEvent((&event).into()), conn)?;

            let target = events::table.filter(events::id.eq(event.id));
            let now = Utc::now().naive_utc();
            let value = status.as_str();
            match form_type {
                db::event::FormType::Attendee => diesel::update(target)
                    .set((events::attendee_form_status.eq(value), events::updated_at.eq(now)))
                    .execute(conn)?,
                db::event::FormType::Volunteer => diesel::update(target)
                    .set((events::volunteer_form_status.eq(value), events::updated_at.eq(now)))
                    .execute(conn)?,
                db::event::FormType::Speaker => diesel::update(target)
                    .set((events::speaker_form_status.eq(value), events::updated_at.eq(now)))
                    .execute(conn)?,
            };
            Ok(())
        })
    })
    .await?;

    Ok(Json(json!({
        "success": true,
        "message": format!("{} form {}", form_type.label(), status.as_str()),
    })))
}
