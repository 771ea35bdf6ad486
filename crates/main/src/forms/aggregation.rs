//! Distinct answers per field, for building filters over attendees.

use std::collections::{BTreeMap, BTreeSet};

use db::{
    event::FormType,
    schema::form_submissions,
    user::User,
    DbConn,
};
use diesel::prelude::*;
use rocket::serde::json::Json;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::{
    error::{ApiError, ApiResult},
    events::find_event,
    permissions::{require_permission, Permission},
};

#[derive(Serialize, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FieldOptions {
    pub options: BTreeMap<String, BTreeSet<String>>,
    pub total_fields: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Collects, for every key, the distinct scalar values it takes across the
/// given answer maps. Arrays, objects and nulls are skipped.
pub fn aggregate<'a>(
    answer_maps: impl IntoIterator<Item = &'a Map<String, Value>>,
) -> FieldOptions {
    let mut options: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for answers in answer_maps {
        for (key, value) in answers {
            let value = match value {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                Value::Null | Value::Array(_) | Value::Object(_) => continue,
            };
            options.entry(key.clone()).or_default().insert(value);
        }
    }

    FieldOptions {
        total_fields: options.len(),
        options,
        error: None,
    }
}

fn unavailable() -> Json<FieldOptions> {
    Json(FieldOptions {
        error: Some("Could not load field options".to_string()),
        ..FieldOptions::default()
    })
}

/// Always answers with 200 once the caller is known to be allowed to look;
/// failures past that point produce an empty result carrying the error.
/// A missing database connection is answered the same way, before the
/// caller is known.
#[get("/api/events/<id>/field-options")]
pub async fn field_options(
    id: String,
    user: Option<User>,
    db: Option<DbConn>,
) -> ApiResult<Json<FieldOptions>> {
    let Some(db) = db else {
        tracing::error!("no database connection for field options");
        return Ok(unavailable());
    };
    let user = user.ok_or(ApiError::Unauthorized)?;

    let result = db
        .run(move |conn| -> ApiResult<FieldOptions> {
            let event = find_event(&id, conn)?;
            require_permission(
                &user,
                Permission::ViewFieldOptions((&event).into()),
                conn,
            )?;

            let rows = form_submissions::table
                .filter(form_submissions::event_id.eq(event.id))
                .filter(form_submissions::form_type.eq(FormType::Attendee.as_str()))
                .select(form_submissions::data)
                .load::<String>(conn)?;
            let maps = rows
                .iter()
                .map(|data| match serde_json::from_str::<Value>(data)? {
                    Value::Object(map) => Ok(map),
                    _ => Ok(Map::new()),
                })
                .collect::<Result<Vec<_>, serde_json::Error>>()?;

            Ok(aggregate(&maps))
        })
        .await;

    match result {
        Ok(options) => Ok(Json(options)),
        Err(e) if e.status().code >= 500 => {
            tracing::error!("could not aggregate field options: {e}");
            Ok(unavailable())
        }
        Err(e) => Err(e),
    }
}
