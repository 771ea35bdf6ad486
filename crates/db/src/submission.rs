use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{event::FormType, schema::form_submissions};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionStatus {
    Pending,
    Approved,
    Rejected,
}

impl SubmissionStatus {
    pub const ALL: [SubmissionStatus; 3] = [
        SubmissionStatus::Pending,
        SubmissionStatus::Approved,
        SubmissionStatus::Rejected,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SubmissionStatus::Pending => "pending",
            SubmissionStatus::Approved => "approved",
            SubmissionStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<SubmissionStatus> {
        Self::ALL.into_iter().find(|t| t.as_str() == s)
    }
}

/// One applicant's answers to one form of one event.
#[derive(Debug, Queryable, Clone, PartialEq)]
pub struct FormSubmission {
    pub id: i64,
    pub public_id: String,
    pub event_id: i64,
    pub user_id: Option<i64>,
    pub form_type: String,
    pub status: String,
    pub user_name: String,
    pub user_email: String,
    /// JSON object keyed by question id.
    pub data: String,
    pub is_checked_in: bool,
    pub checked_in_at: Option<NaiveDateTime>,
    pub checked_in_by: Option<i64>,
    pub check_in_count: i64,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl FormSubmission {
    pub fn form_type(&self) -> Option<FormType> {
        FormType::parse(&self.form_type)
    }

    pub fn status(&self) -> Option<SubmissionStatus> {
        SubmissionStatus::parse(&self.status)
    }

    /// The stored answers. Rows always hold a JSON object, but anything else
    /// reads back as an empty map.
    pub fn answers(&self) -> Result<Map<String, Value>, serde_json::Error> {
        match serde_json::from_str::<Value>(&self.data)? {
            Value::Object(map) => Ok(map),
            _ => Ok(Map::new()),
        }
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = form_submissions)]
pub struct NewFormSubmission<'a> {
    pub public_id: &'a str,
    pub event_id: i64,
    pub user_id: Option<i64>,
    pub form_type: &'a str,
    pub status: &'a str,
    pub user_name: &'a str,
    pub user_email: &'a str,
    pub data: &'a str,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}
