//! End-to-end tests. Every test gets its own application, backed by a fresh
//! SQLite file which the test can also inspect directly.

use chrono::{Days, Utc};
use db::{
    email::EmailRow,
    schema::{emails, users},
};
use diesel::{prelude::*, SqliteConnection};
use rocket::{
    figment::Figment,
    http::{ContentType, Header, Status},
    local::blocking::{Client, LocalResponse},
};
use serde_json::{json, Value};
use tempfile::TempDir;

use crate::{figment, make_rocket, make_rocket_from};

mod events;
mod forms;
mod sessions;

pub const PASSWORD: &str = "correct horse battery";

pub struct TestApp {
    pub client: Client,
    pub conn: SqliteConnection,
    path: String,
    _dir: TempDir,
}

pub fn test_app() -> TestApp {
    test_app_with(|figment| figment)
}

/// Like [`test_app`], with changes to the configuration.
pub fn test_app_with(configure: impl FnOnce(Figment) -> Figment) -> TestApp {
    let dir = tempfile::tempdir().expect("could not create a temporary directory");
    let path = dir.path().join("registrations.db");
    let path = path.to_str().expect("temporary path is not utf-8").to_string();

    let client = Client::tracked(make_rocket_from(configure(figment(&path))))
        .expect("rocket failed to ignite");

    let mut conn = SqliteConnection::establish(&path).expect("database connection failed");
    diesel::sql_query("PRAGMA busy_timeout = 5000")
        .execute(&mut conn)
        .expect("could not set busy timeout");

    TestApp {
        client,
        conn,
        path,
        _dir: dir,
    }
}

/// A response, read in full so that it no longer borrows the client.
pub struct Reply {
    status: Status,
    pub request_id: Option<String>,
    json: Option<Value>,
}

impl Reply {
    fn read(response: LocalResponse<'_>) -> Reply {
        Reply {
            status: response.status(),
            request_id: response
                .headers()
                .get_one("X-Request-Id")
                .map(ToString::to_string),
            json: response.into_json::<Value>(),
        }
    }

    pub fn status(&self) -> Status {
        self.status
    }
}

pub fn body(reply: Reply) -> Value {
    reply.json.expect("response was not json")
}

/// `days` from today, as `YYYY-MM-DD`.
pub fn date_from_today(days: i64) -> String {
    let today = Utc::now().date_naive();
    let date = if days >= 0 {
        today.checked_add_days(Days::new(days as u64))
    } else {
        today.checked_sub_days(Days::new(days.unsigned_abs()))
    };
    date.expect("date out of range").format("%Y-%m-%d").to_string()
}

impl TestApp {
    /// A second, independent application over the same database, with its
    /// own cookies.
    pub fn another_client(&self) -> Client {
        Client::tracked(make_rocket(&self.path)).expect("rocket failed to ignite")
    }

    pub fn post_json(&self, uri: impl ToString, value: Value) -> Reply {
        Reply::read(
            self.client
                .post(uri.to_string())
                .header(ContentType::JSON)
                .body(value.to_string())
                .dispatch(),
        )
    }

    pub fn put_json(&self, uri: impl ToString, value: Value) -> Reply {
        Reply::read(
            self.client
                .put(uri.to_string())
                .header(ContentType::JSON)
                .body(value.to_string())
                .dispatch(),
        )
    }

    pub fn patch_json(&self, uri: impl ToString, value: Value) -> Reply {
        Reply::read(
            self.client
                .patch(uri.to_string())
                .header(ContentType::JSON)
                .body(value.to_string())
                .dispatch(),
        )
    }

    pub fn get(&self, uri: impl ToString) -> Reply {
        Reply::read(self.client.get(uri.to_string()).dispatch())
    }

    pub fn get_with_request_id(&self, uri: impl ToString, id: &str) -> Reply {
        Reply::read(
            self.client
                .get(uri.to_string())
                .header(Header::new("X-Request-Id", id.to_string()))
                .dispatch(),
        )
    }

    /// Creates an account and logs into it.
    pub fn register(&self, username: &str, email: &str) {
        let response = self.post_json(
            "/api/auth/register",
            json!({ "username": username, "email": email, "password": PASSWORD }),
        );
        assert_eq!(response.status(), Status::Created);
    }

    pub fn login(&self, email: &str) {
        let response = self.post_json(
            "/api/auth/login",
            json!({ "email": email, "password": PASSWORD }),
        );
        assert_eq!(response.status(), Status::Ok);
    }

    pub fn logout(&self) {
        self.client.post("/api/auth/logout").dispatch();
    }

    pub fn set_role(&mut self, email: &str, role: &str) {
        diesel::update(users::table.filter(users::email.eq(email)))
            .set(users::role.eq(role))
            .execute(&mut self.conn)
            .unwrap();
    }

    pub fn user_field(&mut self, email: &str) -> (String, String) {
        users::table
            .filter(users::email.eq(email))
            .select((users::role, users::user_type))
            .first::<(String, String)>(&mut self.conn)
            .unwrap()
    }

    /// Creates an event as the logged in user, returning its body.
    pub fn create_event(&self, event: Value) -> Value {
        let response = self.post_json("/api/events", event);
        assert_eq!(response.status(), Status::Created);
        body(response)["event"].clone()
    }

    /// Creates an event whose attendee, volunteer and speaker forms are in
    /// the given states, and which is itself published.
    pub fn published_event(&self, title: &str, forms: [&str; 3]) -> String {
        let event = self.create_event(json!({
            "title": title,
            "capacity": 50,
            "startDate": date_from_today(30),
        }));
        let id = event["id"].as_str().unwrap().to_string();

        let response = self.patch_json(
            format!("/api/events/{id}/status"),
            json!({ "status": "published" }),
        );
        assert_eq!(response.status(), Status::Ok);

        for (form, status) in ["attendee", "volunteer", "speaker"].iter().zip(forms) {
            let response = self.put_json(
                format!("/api/events/{id}/forms/{form}/status"),
                json!({ "status": status }),
            );
            assert_eq!(response.status(), Status::Ok);
        }

        id
    }

    pub fn submit(&self, event: &str, form: &str, data: Value) -> Reply {
        self.post_json(
            format!("/api/events/{event}/forms/{form}/submissions"),
            json!({ "data": data }),
        )
    }

    pub fn emails(&mut self) -> Vec<EmailRow> {
        emails::table
            .order_by(emails::id.asc())
            .load::<EmailRow>(&mut self.conn)
            .unwrap()
    }
}
