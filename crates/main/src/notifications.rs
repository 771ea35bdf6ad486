//! Emails sent about submissions.

use db::{
    event::{Event, FormType},
    submission::SubmissionStatus,
    user::User,
};
use email::{OutgoingEmail, Recipient};
use maud::{html, Markup};

use crate::config::AppConfig;

pub const KIND_CONFIRMATION: &str = "submission_confirmation";
pub const KIND_PENDING: &str = "submission_pending";
pub const KIND_ORGANIZER: &str = "organizer_notification";
pub const KIND_APPROVED: &str = "submission_approved";
pub const KIND_REJECTED: &str = "submission_rejected";

fn when(event: &Event) -> String {
    let mut when = event.start_date.format("%A %-d %B %Y").to_string();
    if let Some(end) = event.end_date.filter(|end| *end != event.start_date) {
        when = format!("{when} to {}", end.format("%A %-d %B %Y"));
    }
    if let Some(start) = &event.start_time {
        when = format!("{when}, {start}");
    }
    when
}

fn event_details(event: &Event, config: &AppConfig) -> Markup {
    html! {
        ul {
            li { strong { "Event: " } (event.title) }
            li { strong { "When: " } (when(event)) }
            @if let Some(location) = &event.location {
                li { strong { "Where: " } (location) }
            }
            li { a href=(config.event_url(&event.slug)) { "View the event" } }
        }
    }
}

fn event_details_text(event: &Event, config: &AppConfig) -> String {
    let mut text = format!("Event: {}\nWhen: {}\n", event.title, when(event));
    if let Some(location) = &event.location {
        text.push_str(&format!("Where: {location}\n"));
    }
    text.push_str(&format!("{}\n", config.event_url(&event.slug)));
    text
}

fn wrap(body: Markup, config: &AppConfig) -> String {
    html! {
        (maud::DOCTYPE)
        html {
            body {
                (body)
                p { "The " (config.site_name) " team" }
            }
        }
    }
    .into_string()
}

/// Sent to an applicant once their submission has been stored.
pub fn submission_received(
    event: &Event,
    form_type: FormType,
    status: SubmissionStatus,
    to: Recipient,
    config: &AppConfig,
) -> OutgoingEmail {
    let approved = status == SubmissionStatus::Approved;
    let (kind, subject, message) = if approved {
        (
            KIND_CONFIRMATION,
            format!("You're registered for {}", event.title),
            "Your registration is confirmed. We look forward to seeing you!",
        )
    } else {
        (
            KIND_PENDING,
            format!("We received your {} application", form_type.as_str()),
            "Your submission is being reviewed by the organizers. We will \
             email you once a decision has been made.",
        )
    };

    let html = wrap(
        html! {
            p { "Hi " (to.name) "," }
            p { (message) }
            (event_details(event, config))
        },
        config,
    );
    let text = format!(
        "Hi {},\n\n{message}\n\n{}\nThe {} team\n",
        to.name,
        event_details_text(event, config),
        config.site_name
    );

    OutgoingEmail {
        kind,
        to: vec![to],
        subject,
        html,
        text,
    }
}

/// Tells the organizer about a new submission, listing its answers as
/// `(label, value)` pairs.
pub fn organizer_notification(
    event: &Event,
    organizer: &User,
    form_type: FormType,
    applicant: &Recipient,
    status: SubmissionStatus,
    answers: &[(String, String)],
    config: &AppConfig,
) -> OutgoingEmail {
    let subject = format!(
        "New {} submission for {}",
        form_type.as_str(),
        event.title
    );

    let html = wrap(
        html! {
            p {
                (applicant.name) " (" (applicant.email) ") submitted the "
                (form_type.as_str()) " form of " (event.title) "."
            }
            p { "Status: " (status.as_str()) }
            @if !answers.is_empty() {
                table {
                    @for (label, value) in answers {
                        tr { th align="left" { (label) } td { (value) } }
                    }
                }
            }
        },
        config,
    );

    let mut text = format!(
        "{applicant} submitted the {} form of {}.\nStatus: {}\n\n",
        form_type.as_str(),
        event.title,
        status.as_str()
    );
    for (label, value) in answers {
        text.push_str(&format!("{label}: {value}\n"));
    }

    OutgoingEmail {
        kind: KIND_ORGANIZER,
        to: vec![Recipient::new(organizer.display_name(), &organizer.email)],
        subject,
        html,
        text,
    }
}

/// The outcome of a review. Returns `None` for statuses which are not a
/// decision.
pub fn decision(
    event: &Event,
    organizer: &User,
    form_type: FormType,
    status: SubmissionStatus,
    to: Recipient,
    config: &AppConfig,
) -> Option<OutgoingEmail> {
    let (kind, subject, message) = match status {
        SubmissionStatus::Approved => (
            KIND_APPROVED,
            format!(
                "Your {} application for {} was approved",
                form_type.as_str(),
                event.title
            ),
            format!(
                "Good news: your {} application has been approved.",
                form_type.as_str()
            ),
        ),
        SubmissionStatus::Rejected => (
            KIND_REJECTED,
            format!(
                "Your {} application for {}",
                form_type.as_str(),
                event.title
            ),
            format!(
                "Thank you for applying. Unfortunately we are unable to \
                 accept your {} application this time.",
                form_type.as_str()
            ),
        ),
        SubmissionStatus::Pending => return None,
    };

    let contact = Recipient::new(organizer.display_name(), &organizer.email);
    let html = wrap(
        html! {
            p { "Hi " (to.name) "," }
            p { (message) }
            (event_details(event, config))
            p {
                "Questions? Contact the organizer, " (contact.name) ", at "
                a href={ "mailto:" (contact.email) } { (contact.email) } "."
            }
        },
        config,
    );
    let text = format!(
        "Hi {},\n\n{message}\n\n{}\nQuestions? Contact the organizer at {contact}.\n\nThe {} team\n",
        to.name,
        event_details_text(event, config),
        config.site_name
    );

    Some(OutgoingEmail {
        kind,
        to: vec![to],
        subject,
        html,
        text,
    })
}
