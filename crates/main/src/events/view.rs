use chrono::Utc;
use db::{
    event::{Event, EventStatus, EventTiming, Visibility},
    schema::events,
    user::User,
    DbConn,
};
use diesel::prelude::*;
use rocket::serde::json::Json;
use serde_json::{json, Value};

use crate::{
    error::{ApiError, ApiResult},
    events::{find_event, EventView},
    permissions::{has_permission, Permission},
};

/// Unlisted events (drafts, private events, ...) are only shown to those who
/// run them; everyone else gets the same `NotFound` as for a missing event.
#[get("/api/events/<id>")]
pub async fn view_event(
    id: String,
    user: Option<User>,
    db: DbConn,
) -> ApiResult<Json<EventView>> {
    let event = db
        .run(move |conn| -> ApiResult<Event> {
            let event = find_event(&id, conn)?;
            if event.is_listed()
                || has_permission(
                    user.as_ref(),
                    &Permission::ViewUnlistedEvent((&event).into()),
                    conn,
                )?
            {
                Ok(event)
            } else {
                Err(ApiError::not_found("Event not found"))
            }
        })
        .await?;

    Ok(Json(EventView::new(&event, Utc::now().date_naive())))
}

/// Lists the public events which are open for business, optionally only
/// those with the given timing.
#[get("/api/events?<timing>")]
pub async fn list_events(
    timing: Option<String>,
    db: DbConn,
) -> ApiResult<Json<Value>> {
    let timing = match timing.as_deref() {
        None | Some("") => None,
        Some(s) => Some(EventTiming::parse(s).ok_or_else(|| {
            ApiError::bad_request(
                "timing must be one of `upcoming`, `running` or `past`",
            )
        })?),
    };

    let listed = db
        .run(|conn| {
            events::table
                .filter(events::status.eq_any([
                    EventStatus::Published.as_str(),
                    EventStatus::Active.as_str(),
                ]))
                .filter(events::visibility.eq(Visibility::Public.as_str()))
                .order_by((events::start_date.asc(), events::id.asc()))
                .load::<Event>(conn)
        })
        .await?;

    let today = Utc::now().date_naive();
    let events = listed
        .iter()
        .map(|event| EventView::new(event, today))
        .filter(|view| timing.is_none_or(|t| view.timing == t))
        .collect::<Vec<_>>();

    Ok(Json(json!({ "events": events })))
}
