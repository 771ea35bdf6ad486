use chrono::{NaiveDate, NaiveDateTime};
use db::event::{resolve_event, Event, EventTiming, FormType};
use diesel::{connection::LoadConnection, prelude::*, sqlite::Sqlite};
use serde::Serialize;

use crate::error::{ApiError, ApiResult};

pub mod create;
pub mod status;
pub mod view;

/// Resolves an event identifier (public id or slug) from a request path.
pub fn find_event(
    identifier: &str,
    conn: &mut (impl Connection<Backend = Sqlite> + LoadConnection),
) -> ApiResult<Event> {
    resolve_event(identifier, conn)?
        .ok_or_else(|| ApiError::not_found("Event not found"))
}

#[derive(Serialize, Debug)]
pub struct FormStatuses {
    pub attendee: String,
    pub volunteer: String,
    pub speaker: String,
}

/// An event as returned by the API.
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct EventView {
    pub id: String,
    pub slug: String,
    pub title: String,
    pub description: String,
    pub location: Option<String>,
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub image_url: Option<String>,
    pub capacity: i64,
    pub price: f64,
    pub event_type: String,
    pub visibility: String,
    pub status: String,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub require_approval: bool,
    pub forms: FormStatuses,
    pub timing: EventTiming,
    pub created_at: NaiveDateTime,
}

impl EventView {
    pub fn new(event: &Event, today: NaiveDate) -> Self {
        let form_status =
            |ft| event.form_status(ft).as_str().to_string();
        EventView {
            id: event.public_id.clone(),
            slug: event.slug.clone(),
            title: event.title.clone(),
            description: event.description.clone(),
            location: event.location.clone(),
            category: event.category.clone(),
            tags: event.tags(),
            image_url: event.image_url.clone(),
            capacity: event.capacity,
            price: event.price,
            event_type: event.event_type.clone(),
            visibility: event.visibility.clone(),
            status: event.status.clone(),
            start_date: event.start_date,
            end_date: event.end_date,
            start_time: event.start_time.clone(),
            end_time: event.end_time.clone(),
            require_approval: event.require_approval,
            forms: FormStatuses {
                attendee: form_status(FormType::Attendee),
                volunteer: form_status(FormType::Volunteer),
                speaker: form_status(FormType::Speaker),
            },
            timing: event.timing(today),
            created_at: event.created_at,
        }
    }
}
