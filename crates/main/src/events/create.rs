use chrono::{NaiveDate, Utc};
use db::{
    event::{Event, EventStatus, EventType, NewEvent, Visibility},
    id::gen_public_id,
    schema::{events, users},
    user::{user_type, User},
    DbConn,
};
use diesel::{connection::LoadConnection, prelude::*, sqlite::Sqlite};
use itertools::Itertools;
use rocket::{http::Status, serde::json::Json};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{
    error::{parse_body, ApiError, ApiResult},
    events::EventView,
    permissions::{require_permission, Permission},
    util::{parse_time_of_day, slugify},
};

pub const MAX_TITLE_LEN: usize = 200;
pub const MAX_CAPACITY: i64 = 10_000;

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CreateEventRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub location: Option<String>,
    pub category: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub image_url: Option<String>,
    pub capacity: i64,
    #[serde(default)]
    pub price: f64,
    pub event_type: Option<EventType>,
    pub visibility: Option<Visibility>,
    pub status: Option<EventStatus>,
    pub start_date: String,
    pub end_date: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    #[serde(default)]
    pub require_approval: bool,
}

/// A creation request which passed validation.
#[derive(Debug, PartialEq)]
pub struct ValidEvent {
    pub title: String,
    pub tags: Vec<String>,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
}

fn parse_date(field: &str, s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|_| format!("{field} must be a date (YYYY-MM-DD)"))
}

fn non_empty(s: &Option<String>) -> Option<&str> {
    s.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

pub fn validate_event(req: &CreateEventRequest) -> Result<ValidEvent, String> {
    let title = req.title.trim();
    if title.is_empty() {
        return Err("Title is required".to_string());
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(format!(
            "Title must be at most {MAX_TITLE_LEN} characters long"
        ));
    }

    if !(1..=MAX_CAPACITY).contains(&req.capacity) {
        return Err(format!("Capacity must be between 1 and {MAX_CAPACITY}"));
    }
    if !req.price.is_finite() || req.price < 0.0 {
        return Err("Price cannot be negative".to_string());
    }

    let start_date = parse_date("Start date", &req.start_date)?;
    let end_date = non_empty(&req.end_date)
        .map(|s| parse_date("End date", s))
        .transpose()?;
    if end_date.is_some_and(|end| end < start_date) {
        return Err("End date cannot be before the start date".to_string());
    }

    let start_time = non_empty(&req.start_time)
        .map(|s| {
            parse_time_of_day(s)
                .ok_or_else(|| "Start time must be HH:MM".to_string())
        })
        .transpose()?;
    let end_time = non_empty(&req.end_time)
        .map(|s| {
            parse_time_of_day(s)
                .ok_or_else(|| "End time must be HH:MM".to_string())
        })
        .transpose()?;
    let same_day = end_date.is_none_or(|end| end == start_date);
    if let (Some(start), Some(end)) = (start_time, end_time) {
        if same_day && end <= start {
            return Err("End time must be after the start time".to_string());
        }
    }

    let tags = req
        .tags
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .map(ToString::to_string)
        .unique()
        .collect();

    Ok(ValidEvent {
        title: title.to_string(),
        tags,
        start_date,
        end_date,
    })
}

/// The first free slug among `base`, `base-2`, `base-3`, ...
fn unique_slug(
    base: &str,
    conn: &mut (impl Connection<Backend = Sqlite> + LoadConnection),
) -> QueryResult<String> {
    let mut candidate = base.to_string();
    let mut n = 1;
    loop {
        let taken = diesel::select(diesel::dsl::exists(
            events::table.filter(events::slug.eq(&candidate)),
        ))
        .get_result::<bool>(conn)?;
        if !taken {
            return Ok(candidate);
        }
        n += 1;
        candidate = format!("{base}-{n}");
    }
}

#[post("/api/events", data = "<body>")]
pub async fn create_event(
    user: Option<User>,
    body: Option<Json<Value>>,
    db: DbConn,
) -> ApiResult<(Status, Json<Value>)> {
    let user = user.ok_or(ApiError::Unauthorized)?;
    let req: CreateEventRequest = parse_body(body)?;
    let valid = validate_event(&req).map_err(ApiError::BadRequest)?;

    let event = db
        .run(move |conn| {
            conn.transaction(|conn| -> ApiResult<Event> {
                require_permission(&user, Permission::CreateEvent, conn)?;

                let slug = unique_slug(&slugify(&valid.title), conn)?;
                let public_id = gen_public_id();
                let tags = serde_json::to_string(&valid.tags)?;
                let now = Utc::now().naive_utc();

                let event = diesel::insert_into(events::table)
                    .values(NewEvent {
                        public_id: &public_id,
                        slug: &slug,
                        title: &valid.title,
                        description: req.description.trim(),
                        location: non_empty(&req.location),
                        category: non_empty(&req.category),
                        tags: &tags,
                        image_url: non_empty(&req.image_url),
                        capacity: req.capacity,
                        price: req.price,
                        event_type: req
                            .event_type
                            .unwrap_or(EventType::Offline)
                            .as_str(),
                        visibility: req
                            .visibility
                            .unwrap_or(Visibility::Public)
                            .as_str(),
                        status: req
                            .status
                            .unwrap_or(EventStatus::Draft)
                            .as_str(),
                        start_date: valid.start_date,
                        end_date: valid.end_date,
                        start_time: non_empty(&req.start_time),
                        end_time: non_empty(&req.end_time),
                        organizer_id: user.id,
                        require_approval: req.require_approval,
                        custom_questions: "{}",
                        created_at: now,
                        updated_at: now,
                    })
                    .get_result::<Event>(conn)?;

                if user.user_type != user_type::ORGANIZER {
                    diesel::update(users::table.filter(users::id.eq(user.id)))
                        .set(users::user_type.eq(user_type::ORGANIZER))
                        .execute(conn)?;
                }

                tracing::info!(event = %event.public_id, slug = %event.slug, "created event");
                Ok(event)
            })
        })
        .await?;

    let today = Utc::now().date_naive();
    Ok((
        Status::Created,
        Json(json!({
            "success": true,
            "event": EventView::new(&event, today),
        })),
    ))
}
