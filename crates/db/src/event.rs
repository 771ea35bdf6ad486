use chrono::{NaiveDate, NaiveDateTime};
use diesel::{connection::LoadConnection, prelude::*, sqlite::Sqlite};
use serde::{Deserialize, Serialize};

use crate::{id::is_public_id, schema::events};

/// The independent registration tracks of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormType {
    Attendee,
    Volunteer,
    Speaker,
}

impl FormType {
    pub const ALL: [FormType; 3] =
        [FormType::Attendee, FormType::Volunteer, FormType::Speaker];

    pub fn as_str(self) -> &'static str {
        match self {
            FormType::Attendee => "attendee",
            FormType::Volunteer => "volunteer",
            FormType::Speaker => "speaker",
        }
    }

    pub fn parse(s: &str) -> Option<FormType> {
        Self::ALL.into_iter().find(|t| t.as_str() == s)
    }

    /// Capitalised name, for messages.
    pub fn label(self) -> &'static str {
        match self {
            FormType::Attendee => "Attendee",
            FormType::Volunteer => "Volunteer",
            FormType::Speaker => "Speaker",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormStatus {
    Draft,
    Published,
}

impl FormStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            FormStatus::Draft => "draft",
            FormStatus::Published => "published",
        }
    }

    /// Anything other than `published` is treated as a draft.
    pub fn parse_lenient(s: &str) -> FormStatus {
        if s == "published" {
            FormStatus::Published
        } else {
            FormStatus::Draft
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Draft,
    Published,
    Cancelled,
    Completed,
    Active,
}

impl EventStatus {
    pub const ALL: [EventStatus; 5] = [
        EventStatus::Draft,
        EventStatus::Published,
        EventStatus::Cancelled,
        EventStatus::Completed,
        EventStatus::Active,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EventStatus::Draft => "draft",
            EventStatus::Published => "published",
            EventStatus::Cancelled => "cancelled",
            EventStatus::Completed => "completed",
            EventStatus::Active => "active",
        }
    }

    pub fn parse(s: &str) -> Option<EventStatus> {
        Self::ALL.into_iter().find(|t| t.as_str() == s)
    }

    /// Whether applicants without an account may see the event's forms.
    pub fn is_live(self) -> bool {
        matches!(self, EventStatus::Published | EventStatus::Active)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventType {
    Online,
    Offline,
    Hybrid,
}

impl EventType {
    pub fn as_str(self) -> &'static str {
        match self {
            EventType::Online => "Online",
            EventType::Offline => "Offline",
            EventType::Hybrid => "Hybrid",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Visibility {
    Public,
    Private,
}

impl Visibility {
    pub fn as_str(self) -> &'static str {
        match self {
            Visibility::Public => "Public",
            Visibility::Private => "Private",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionType {
    Text,
    Textarea,
    Select,
    Radio,
    Checkbox,
    Date,
    Email,
    Phone,
    Number,
}

impl QuestionType {
    /// Question types whose answers are drawn from a list of options.
    pub fn has_options(self) -> bool {
        matches!(
            self,
            QuestionType::Select | QuestionType::Radio | QuestionType::Checkbox
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionOption {
    pub id: String,
    pub value: String,
}

/// One organizer-defined field of a registration form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: QuestionType,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<QuestionOption>,
}

/// The question lists of all three forms of an event, stored as JSON in
/// `events.custom_questions`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomQuestions {
    #[serde(default)]
    pub attendee: Vec<Question>,
    #[serde(default)]
    pub volunteer: Vec<Question>,
    #[serde(default)]
    pub speaker: Vec<Question>,
}

impl CustomQuestions {
    pub fn get(&self, form_type: FormType) -> &[Question] {
        match form_type {
            FormType::Attendee => &self.attendee,
            FormType::Volunteer => &self.volunteer,
            FormType::Speaker => &self.speaker,
        }
    }

    pub fn replace(&mut self, form_type: FormType, questions: Vec<Question>) {
        match form_type {
            FormType::Attendee => self.attendee = questions,
            FormType::Volunteer => self.volunteer = questions,
            FormType::Speaker => self.speaker = questions,
        }
    }
}

/// Where an event sits relative to a given day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventTiming {
    Upcoming,
    Running,
    Past,
}

impl EventTiming {
    pub fn parse(s: &str) -> Option<EventTiming> {
        match s {
            "upcoming" => Some(EventTiming::Upcoming),
            "running" => Some(EventTiming::Running),
            "past" => Some(EventTiming::Past),
            _ => None,
        }
    }
}

#[derive(Debug, Queryable, Clone, PartialEq)]
pub struct Event {
    pub id: i64,
    pub public_id: String,
    pub slug: String,
    pub title: String,
    pub description: String,
    pub location: Option<String>,
    pub category: Option<String>,
    /// JSON array of strings.
    pub tags: String,
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
    pub organizer_id: i64,
    pub require_approval: bool,
    /// JSON encoded [`CustomQuestions`].
    pub custom_questions: String,
    pub attendee_form_status: String,
    pub volunteer_form_status: String,
    pub speaker_form_status: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Event {
    pub fn status(&self) -> Option<EventStatus> {
        EventStatus::parse(&self.status)
    }

    pub fn form_status(&self, form_type: FormType) -> FormStatus {
        FormStatus::parse_lenient(self.raw_form_status(form_type))
    }

    pub fn raw_form_status(&self, form_type: FormType) -> &str {
        match form_type {
            FormType::Attendee => &self.attendee_form_status,
            FormType::Volunteer => &self.volunteer_form_status,
            FormType::Speaker => &self.speaker_form_status,
        }
    }

    /// A form can be seen without logging in only if both the form and the
    /// event itself have been published.
    pub fn form_is_public(&self, form_type: FormType) -> bool {
        self.status().is_some_and(EventStatus::is_live)
            && self.form_status(form_type) == FormStatus::Published
    }

    pub fn is_listed(&self) -> bool {
        self.status().is_some_and(EventStatus::is_live)
            && self.visibility == Visibility::Public.as_str()
    }

    pub fn questions(&self) -> Result<CustomQuestions, serde_json::Error> {
        if self.custom_questions.trim().is_empty() {
            return Ok(CustomQuestions::default());
        }
        serde_json::from_str(&self.custom_questions)
    }

    pub fn tags(&self) -> Vec<String> {
        serde_json::from_str(&self.tags).unwrap_or_default()
    }

    pub fn timing(&self, today: NaiveDate) -> EventTiming {
        let end = self.end_date.unwrap_or(self.start_date);
        if today < self.start_date {
            EventTiming::Upcoming
        } else if today > end {
            EventTiming::Past
        } else {
            EventTiming::Running
        }
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = events)]
pub struct NewEvent<'a> {
    pub public_id: &'a str,
    pub slug: &'a str,
    pub title: &'a str,
    pub description: &'a str,
    pub location: Option<&'a str>,
    pub category: Option<&'a str>,
    pub tags: &'a str,
    pub image_url: Option<&'a str>,
    pub capacity: i64,
    pub price: f64,
    pub event_type: &'a str,
    pub visibility: &'a str,
    pub status: &'a str,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub start_time: Option<&'a str>,
    pub end_time: Option<&'a str>,
    pub organizer_id: i64,
    pub require_approval: bool,
    pub custom_questions: &'a str,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Finds an event given either its public id or its slug.
///
/// Identifiers shaped like a public id are first looked up as one; if that
/// finds nothing (or the identifier is not id-shaped) it is treated as a
/// slug. Slugs are matched case-insensitively.
#[tracing::instrument(skip(conn))]
pub fn resolve_event(
    identifier: &str,
    conn: &mut (impl Connection<Backend = Sqlite> + LoadConnection),
) -> QueryResult<Option<Event>> {
    if is_public_id(identifier) {
        let by_id = events::table
            .filter(events::public_id.eq(identifier.to_ascii_lowercase()))
            .first::<Event>(conn)
            .optional()?;
        if by_id.is_some() {
            return Ok(by_id);
        }
    }

    events::table
        .filter(events::slug.eq(identifier.to_lowercase()))
        .first::<Event>(conn)
        .optional()
}
