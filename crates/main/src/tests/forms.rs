use db::{
    schema::form_submissions,
    submission::FormSubmission,
};
use diesel::prelude::*;
use rocket::http::Status;
use serde_json::{json, Value};

use super::{body, date_from_today, test_app, TestApp};
use crate::notifications::{
    KIND_CONFIRMATION, KIND_ORGANIZER, KIND_PENDING,
};

fn questions() -> Value {
    json!([
        { "id": "name", "type": "text", "label": "Full name", "required": true },
        { "id": "email", "type": "email", "label": "Email", "required": true },
        {
            "id": "shirt",
            "type": "select",
            "label": "T-shirt size",
            "options": [
                { "id": "s", "value": "Small" },
                { "id": "l", "value": "Large" }
            ]
        }
    ])
}

fn submissions(app: &mut TestApp) -> Vec<FormSubmission> {
    form_submissions::table
        .order_by(form_submissions::id.asc())
        .load::<FormSubmission>(&mut app.conn)
        .unwrap()
}

#[test]
fn public_forms_are_hidden_until_published() {
    let app = test_app();
    app.register("Olga", "olga@example.com");
    let id = app.published_event("Hidden Forms", ["draft", "draft", "draft"]);

    app.logout();
    for form in ["attendee", "volunteer", "speaker"] {
        let response = app.get(format!("/api/events/{id}/forms/{form}"));
        assert_eq!(response.status(), Status::NotFound);
        assert!(body(response).get("questions").is_none());
    }

    app.login("olga@example.com");
    let response = app.get(format!("/api/events/{id}/forms/attendee/config"));
    assert_eq!(response.status(), Status::Ok);
    assert_eq!(body(response)["status"], "draft");

    let response = app.put_json(
        format!("/api/events/{id}/forms/attendee/status"),
        json!({ "status": "published" }),
    );
    assert_eq!(response.status(), Status::Ok);

    app.logout();
    let response = app.get(format!("/api/events/{id}/forms/attendee"));
    assert_eq!(response.status(), Status::Ok);
    let form = body(response);
    assert_eq!(form["title"], "Register for Hidden Forms");
    assert_eq!(form["status"], "published");
    assert_eq!(form["questions"], json!([]));
}

#[test]
fn published_forms_of_draft_events_are_hidden() {
    let app = test_app();
    app.register("Olga", "olga@example.com");
    let event = app.create_event(json!({
        "title": "Not Yet",
        "capacity": 10,
        "startDate": date_from_today(7),
    }));
    let id = event["id"].as_str().unwrap();
    let response = app.put_json(
        format!("/api/events/{id}/forms/attendee/status"),
        json!({ "status": "published" }),
    );
    assert_eq!(response.status(), Status::Ok);

    app.logout();
    let response = app.get(format!("/api/events/{id}/forms/attendee"));
    assert_eq!(response.status(), Status::NotFound);
}

#[test]
fn form_lookups_are_validated() {
    let app = test_app();
    app.register("Olga", "olga@example.com");
    let id = app.published_event("Lookups", ["published", "draft", "draft"]);

    let response = app.get(format!("/api/events/{id}/forms/sponsor"));
    assert_eq!(response.status(), Status::BadRequest);

    let response = app.get("/api/events/no-such-event/forms/attendee");
    assert_eq!(response.status(), Status::NotFound);

    let response = app.get("/api/events/0123456789abcdef01234567/forms/attendee");
    assert_eq!(response.status(), Status::NotFound);
}

#[test]
fn form_config_is_for_organizers() {
    let mut app = test_app();
    app.register("Olga", "olga@example.com");
    let id = app.published_event("Config", ["published", "draft", "draft"]);
    let uri = format!("/api/events/{id}/forms/speaker/config");

    app.logout();
    assert_eq!(app.get(&uri).status(), Status::Unauthorized);

    app.register("Vic", "vic@example.com");
    assert_eq!(app.get(&uri).status(), Status::Forbidden);

    // admins may edit questions but only super-admins may read other
    // organizers' configuration
    app.set_role("vic@example.com", "admin");
    assert_eq!(app.get(&uri).status(), Status::Forbidden);
    let response = app.put_json(&uri, json!({ "questions": questions() }));
    assert_eq!(response.status(), Status::Ok);

    app.set_role("vic@example.com", "super-admin");
    let response = app.get(&uri);
    assert_eq!(response.status(), Status::Ok);
    let form = body(response);
    assert_eq!(form["title"], "Apply to speak at Config");
    assert_eq!(form["questions"].as_array().unwrap().len(), 3);
}

#[test]
fn question_lists_are_replaced_wholesale() {
    let app = test_app();
    app.register("Olga", "olga@example.com");
    let id = app.published_event("Questions", ["published", "draft", "draft"]);
    let uri = format!("/api/events/{id}/forms/attendee/config");

    let response = app.put_json(&uri, json!({ "questions": questions() }));
    assert_eq!(response.status(), Status::Ok);
    let ack = body(response);
    assert_eq!(ack["success"], true);
    assert!(ack.get("questions").is_none());

    let replacement = json!([{
        "id": "diet",
        "type": "textarea",
        "label": "Dietary needs",
        "required": false
    }]);
    let response = app.put_json(&uri, json!({ "questions": replacement }));
    assert_eq!(response.status(), Status::Ok);

    let response = app.get(format!("/api/events/{id}/forms/attendee"));
    let form = body(response);
    assert_eq!(form["questions"], replacement);

    // other forms are untouched
    let response = app.get(format!("/api/events/{id}/forms/volunteer/config"));
    assert_eq!(body(response)["questions"], json!([]));
}

#[test]
fn malformed_question_lists_are_rejected() {
    let app = test_app();
    app.register("Olga", "olga@example.com");
    let id = app.published_event("Bad Questions", ["published", "draft", "draft"]);
    let uri = format!("/api/events/{id}/forms/attendee/config");

    let cases = [
        json!({ "questions": { "id": "name" } }),
        json!({}),
        json!({ "questions": [
            { "id": "a", "type": "text", "label": "A" },
            { "id": "a", "type": "text", "label": "Again" }
        ] }),
        json!({ "questions": [{ "id": "a b", "type": "text", "label": "A" }] }),
        json!({ "questions": [{ "id": "a", "type": "radio", "label": "A" }] }),
        json!({ "questions": [{ "id": "a", "type": "colour", "label": "A" }] }),
    ];
    for case in cases {
        let response = app.put_json(&uri, case.clone());
        assert_eq!(response.status(), Status::BadRequest, "{case}");
    }
}

/// Attendees are let in straight away.
#[test]
fn attendee_submissions_are_approved() {
    let mut app = test_app();
    app.register("Olga", "olga@example.com");
    let id = app.published_event("Open Day", ["published", "draft", "draft"]);
    app.logout();

    let response = app.submit(
        &id,
        "attendee",
        json!({ "name": "Ada Lovelace", "email": "ada@example.com" }),
    );
    assert_eq!(response.status(), Status::Created);
    let created = body(response);
    assert_eq!(created["success"], true);
    assert_eq!(created["status"], "approved");

    let stored = submissions(&mut app);
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].public_id, created["submissionId"].as_str().unwrap());
    assert_eq!(stored[0].status, "approved");
    assert_eq!(stored[0].user_name, "Ada Lovelace");
    assert_eq!(stored[0].user_email, "ada@example.com");
    assert_eq!(stored[0].user_id, None);

    let emails = app.emails();
    assert_eq!(emails.len(), 2);
    assert_eq!(emails[0].kind, KIND_CONFIRMATION);
    assert!(emails[0].recipients.contains("ada@example.com"));
    assert_eq!(emails[1].kind, KIND_ORGANIZER);
    assert!(emails[1].recipients.contains("olga@example.com"));
}

#[test]
fn attendee_submissions_wait_when_approval_is_required() {
    let mut app = test_app();
    app.register("Olga", "olga@example.com");
    let event = app.create_event(json!({
        "title": "Invite Only",
        "capacity": 10,
        "startDate": date_from_today(7),
        "status": "published",
        "requireApproval": true,
    }));
    let id = event["id"].as_str().unwrap().to_string();
    let response = app.put_json(
        format!("/api/events/{id}/forms/attendee/status"),
        json!({ "status": "published" }),
    );
    assert_eq!(response.status(), Status::Ok);

    let response = app.submit(
        &id,
        "attendee",
        json!({ "name": "Ada", "email": "ada@example.com" }),
    );
    assert_eq!(response.status(), Status::Created);
    assert_eq!(body(response)["status"], "pending");

    let kinds = app.emails().into_iter().map(|e| e.kind).collect::<Vec<_>>();
    assert_eq!(kinds, vec![KIND_PENDING, KIND_ORGANIZER]);
}

#[test]
fn volunteer_and_speaker_submissions_are_pending() {
    let app = test_app();
    app.register("Olga", "olga@example.com");
    let id = app.published_event("Helpers", ["published", "published", "published"]);

    for form in ["volunteer", "speaker"] {
        let response = app.submit(&id, form, json!({ "name": "Ada" }));
        assert_eq!(response.status(), Status::Created);
        assert_eq!(body(response)["status"], "pending");
    }

    let response = app.post_json(
        format!("/api/events/{id}/speaker-applications"),
        json!({ "formData": { "name": "Grace", "talk": "Compilers" } }),
    );
    assert_eq!(response.status(), Status::Created);
    assert_eq!(body(response)["status"], "pending");
}

#[test]
fn unpublished_forms_refuse_applications() {
    let mut app = test_app();
    app.register("Olga", "olga@example.com");
    let id = app.published_event("Closed", ["published", "draft", "draft"]);

    // logged in as the organizer
    let response = app.post_json(
        format!("/api/events/{id}/speaker-applications"),
        json!({ "data": { "name": "Grace" } }),
    );
    assert_eq!(response.status(), Status::NotFound);
    assert_eq!(body(response)["error"], "Speaker form is not available");

    app.logout();
    let response = app.submit(&id, "volunteer", json!({ "name": "Grace" }));
    assert_eq!(response.status(), Status::NotFound);
    assert_eq!(body(response)["error"], "Volunteer form is not available");

    assert!(submissions(&mut app).is_empty());
    assert!(app.emails().is_empty());
}

#[test]
fn null_answers_are_stored_as_empty_strings() {
    let mut app = test_app();
    app.register("Olga", "olga@example.com");
    let id = app.published_event("Nulls", ["published", "draft", "draft"]);

    let response = app.submit(
        &id,
        "attendee",
        json!({ "name": "Ada", "phone": null, "notes": null }),
    );
    assert_eq!(response.status(), Status::Created);

    let stored = submissions(&mut app);
    let answers = stored[0].answers().unwrap();
    assert_eq!(answers["phone"], json!(""));
    assert_eq!(answers["notes"], json!(""));

    let response = app.get(format!("/api/events/{id}/submissions/attendee"));
    let listed = body(response);
    assert_eq!(listed["submissions"][0]["data"]["phone"], json!(""));
}

#[test]
fn answers_are_checked_against_questions() {
    let mut app = test_app();
    app.register("Olga", "olga@example.com");
    let id = app.published_event("Typed", ["published", "draft", "draft"]);
    let response = app.put_json(
        format!("/api/events/{id}/forms/attendee/config"),
        json!({ "questions": questions() }),
    );
    assert_eq!(response.status(), Status::Ok);

    let rejected = [
        json!({ "email": "ada@example.com" }),
        json!({ "name": "Ada", "email": "ada-at-example" }),
        json!({ "name": "Ada", "email": "ada@example.com", "shirt": "Huge" }),
    ];
    for data in rejected {
        let response = app.submit(&id, "attendee", data.clone());
        assert_eq!(response.status(), Status::BadRequest, "{data}");
    }
    assert!(submissions(&mut app).is_empty());

    let response = app.submit(
        &id,
        "attendee",
        json!({
            "name": "Ada",
            "email": "ada@example.com",
            "shirt": "l",
            "referrer": "a friend"
        }),
    );
    assert_eq!(response.status(), Status::Created);
    let answers = submissions(&mut app)[0].answers().unwrap();
    assert_eq!(answers["referrer"], "a friend");
    assert_eq!(answers["shirt"], "Large");
}

#[test]
fn options_are_stored_by_value() {
    let mut app = test_app();
    app.register("Olga", "olga@example.com");
    let id = app.published_event("Shirts", ["published", "draft", "draft"]);
    let response = app.put_json(
        format!("/api/events/{id}/forms/attendee/config"),
        json!({ "questions": questions() }),
    );
    assert_eq!(response.status(), Status::Ok);

    for (name, shirt) in [("Ada", "l"), ("Grace", "Large")] {
        let email = format!("{}@example.com", name.to_lowercase());
        let response = app.submit(
            &id,
            "attendee",
            json!({ "name": name, "email": email, "shirt": shirt }),
        );
        assert_eq!(response.status(), Status::Created);
    }

    for submission in submissions(&mut app) {
        assert_eq!(submission.answers().unwrap()["shirt"], "Large");
    }

    let response = app.get(format!("/api/events/{id}/field-options"));
    assert_eq!(response.status(), Status::Ok);
    assert_eq!(body(response)["options"]["shirt"], json!(["Large"]));
}

#[test]
fn submissions_need_an_answer_map() {
    let app = test_app();
    app.register("Olga", "olga@example.com");
    let id = app.published_event("Empty", ["published", "draft", "draft"]);
    let uri = format!("/api/events/{id}/forms/attendee/submissions");

    for payload in [json!({}), json!({ "data": "yes" }), json!([1, 2])] {
        let response = app.post_json(&uri, payload);
        assert_eq!(response.status(), Status::BadRequest);
    }

    let response = app.submit(&id, "organizer", json!({ "name": "Ada" }));
    assert_eq!(response.status(), Status::BadRequest);

    let response = app.submit("missing-event", "attendee", json!({ "name": "Ada" }));
    assert_eq!(response.status(), Status::NotFound);
}

#[test]
fn logged_in_applicants_are_linked() {
    let mut app = test_app();
    app.register("Olga", "olga@example.com");
    let id = app.published_event("Linked", ["published", "draft", "draft"]);

    app.register("Ada", "ada@example.com");
    let response = app.submit(&id, "attendee", json!({ "firstName": "Ada", "lastName": "L" }));
    assert_eq!(response.status(), Status::Created);

    let stored = submissions(&mut app);
    assert!(stored[0].user_id.is_some());
    assert_eq!(stored[0].user_name, "Ada L");
    assert_eq!(stored[0].user_email, "ada@example.com");
}
