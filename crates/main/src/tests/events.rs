use rocket::http::Status;
use serde_json::json;

use super::{body, date_from_today, test_app};

#[test]
fn new_events_start_as_drafts() {
    let mut app = test_app();
    app.register("Olga", "olga@example.com");

    let event = app.create_event(json!({
        "title": "RustConf 2025",
        "capacity": 300,
        "startDate": date_from_today(10),
        "tags": ["rust", "rust", "systems"],
    }));

    assert_eq!(event["slug"], "rustconf-2025");
    assert_eq!(event["status"], "draft");
    assert_eq!(event["forms"], json!({
        "attendee": "draft",
        "volunteer": "draft",
        "speaker": "draft",
    }));
    assert_eq!(event["tags"], json!(["rust", "systems"]));
    assert_eq!(event["eventType"], "Offline");
    assert_eq!(event["visibility"], "Public");
    assert_eq!(event["id"].as_str().unwrap().len(), 24);

    let (role, user_type) = app.user_field("olga@example.com");
    assert_eq!(role, "user");
    assert_eq!(user_type, "organizer");
}

#[test]
fn creating_events_needs_a_session() {
    let app = test_app();
    let response = app.post_json(
        "/api/events",
        json!({ "title": "Meetup", "capacity": 10, "startDate": "2030-01-01" }),
    );
    assert_eq!(response.status(), Status::Unauthorized);
}

#[test]
fn slugs_are_unique_and_case_insensitive() {
    let app = test_app();
    app.register("Olga", "olga@example.com");

    let event = json!({
        "title": "Rust Meetup",
        "capacity": 20,
        "startDate": date_from_today(5),
    });
    let first = app.create_event(event.clone());
    let second = app.create_event(event);
    assert_eq!(first["slug"], "rust-meetup");
    assert_eq!(second["slug"], "rust-meetup-2");

    let response = app.get("/api/events/RUST-MEETUP-2");
    assert_eq!(response.status(), Status::Ok);
    assert_eq!(body(response)["id"], second["id"]);

    let by_id = format!("/api/events/{}", first["id"].as_str().unwrap());
    let response = app.get(by_id);
    assert_eq!(response.status(), Status::Ok);
    assert_eq!(body(response)["slug"], "rust-meetup");
}

#[test]
fn invalid_events_are_rejected() {
    let app = test_app();
    app.register("Olga", "olga@example.com");

    let cases = [
        json!({ "title": "Meetup", "capacity": 10,
                "startDate": "2030-05-02", "endDate": "2030-05-01" }),
        json!({ "title": "Meetup", "capacity": 0, "startDate": "2030-05-01" }),
        json!({ "title": "Meetup", "capacity": 10_001, "startDate": "2030-05-01" }),
        json!({ "title": "Meetup", "capacity": 10, "price": -5,
                "startDate": "2030-05-01" }),
        json!({ "title": "", "capacity": 10, "startDate": "2030-05-01" }),
        json!({ "title": "Meetup", "capacity": 10, "startDate": "May 1st" }),
        json!({ "title": "Meetup", "capacity": 10, "startDate": "2030-05-01",
                "startTime": "18:00", "endTime": "17:00" }),
        json!({ "title": "Meetup", "capacity": 10, "startDate": "2030-05-01",
                "eventType": "Telepathic" }),
    ];
    for case in cases {
        let response = app.post_json("/api/events", case.clone());
        assert_eq!(response.status(), Status::BadRequest, "{case}");
    }
}

#[test]
fn unlisted_events_are_hidden() {
    let app = test_app();
    app.register("Olga", "olga@example.com");
    let event = app.create_event(json!({
        "title": "Secret Meetup",
        "capacity": 10,
        "startDate": date_from_today(3),
    }));
    let uri = format!("/api/events/{}", event["id"].as_str().unwrap());

    app.register("Vic", "vic@example.com");
    assert_eq!(app.get(&uri).status(), Status::NotFound);

    app.login("olga@example.com");
    let response = app.patch_json(
        format!("{uri}/status"),
        json!({ "status": "published" }),
    );
    assert_eq!(response.status(), Status::Ok);

    app.logout();
    assert_eq!(app.get(&uri).status(), Status::Ok);
}

#[test]
fn only_organizers_change_event_status() {
    let mut app = test_app();
    app.register("Olga", "olga@example.com");
    let event = app.create_event(json!({
        "title": "Meetup",
        "capacity": 10,
        "startDate": date_from_today(3),
    }));
    let uri = format!("/api/events/{}/status", event["id"].as_str().unwrap());

    app.register("Vic", "vic@example.com");
    let response = app.patch_json(&uri, json!({ "status": "published" }));
    assert_eq!(response.status(), Status::Forbidden);

    let response = app.patch_json(&uri, json!({ "status": "archived" }));
    assert_eq!(response.status(), Status::BadRequest);

    app.set_role("vic@example.com", "admin");
    let response = app.patch_json(&uri, json!({ "status": "cancelled" }));
    assert_eq!(response.status(), Status::Ok);

    app.login("olga@example.com");
    let response = app.get(format!("/api/events/{}", event["id"].as_str().unwrap()));
    assert_eq!(body(response)["status"], "cancelled");
}

#[test]
fn events_are_listed_by_timing() {
    let app = test_app();
    app.register("Olga", "olga@example.com");

    let schedule = [
        ("Past Event", date_from_today(-10), Some(date_from_today(-9))),
        ("Running Event", date_from_today(-1), Some(date_from_today(1))),
        ("Upcoming Event", date_from_today(10), None),
    ];
    for (title, start, end) in schedule {
        let event = app.create_event(json!({
            "title": title,
            "capacity": 10,
            "startDate": start,
            "endDate": end,
            "status": "published",
        }));
        assert_eq!(event["status"], "published");
    }
    app.create_event(json!({
        "title": "Private Event",
        "capacity": 10,
        "startDate": date_from_today(10),
        "status": "published",
        "visibility": "Private",
    }));
    app.create_event(json!({
        "title": "Draft Event",
        "capacity": 10,
        "startDate": date_from_today(10),
    }));

    let titles = |timing: &str| -> Vec<String> {
        let response = app.get(format!("/api/events?timing={timing}"));
        assert_eq!(response.status(), Status::Ok);
        body(response)["events"]
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["title"].as_str().unwrap().to_string())
            .collect()
    };
    assert_eq!(titles("upcoming"), vec!["Upcoming Event"]);
    assert_eq!(titles("running"), vec!["Running Event"]);
    assert_eq!(titles("past"), vec!["Past Event"]);

    let response = app.get("/api/events");
    let all = body(response)["events"].as_array().unwrap().len();
    assert_eq!(all, 3);

    assert_eq!(
        app.get("/api/events?timing=someday").status(),
        Status::BadRequest
    );
}
