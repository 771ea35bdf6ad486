use auth::{login::login, logout::logout, me::me, register::register};
use config::AppConfig;
use db::{DbConn, DATABASE_NAME};
use diesel_migrations::{
    embed_migrations, EmbeddedMigrations, MigrationHarness,
};
use events::{
    create::create_event,
    status::{set_event_status, set_form_status},
    view::{list_events, view_event},
};
use forms::{
    aggregation::field_options,
    check_in::check_in,
    config::{form_config, public_form, update_form_config},
    intake::{submit_form, submit_speaker_application},
    listing::{list_participants, list_submissions},
    review::review_submission,
};
use request_ids::RequestIdFairing;
use rocket::{
    fairing::AdHoc,
    figment::{
        util::map,
        value::{Map, Value},
        Figment,
    },
    http::Status,
    response::status,
    serde::json::Json,
    Build, Request, Rocket,
};
use serde_json::json;

pub mod auth;
pub mod config;
pub mod error;
pub mod events;
pub mod forms;
pub mod notifications;
pub mod permissions;
pub mod request_ids;
pub mod resources;
#[cfg(test)]
mod tests;
pub mod util;

#[macro_use]
extern crate rocket;

pub const MIGRATIONS: EmbeddedMigrations =
    embed_migrations!("../../migrations");

/// Rocket's own failures (unknown routes, failing guards, ...) answer in the
/// same `{"error": ...}` shape as the handlers.
#[catch(default)]
fn json_catcher(
    status: Status,
    _req: &Request,
) -> status::Custom<Json<serde_json::Value>> {
    status::Custom(
        status,
        Json(json!({ "error": status.reason().unwrap_or("Unknown error") })),
    )
}

/// Rocket's configuration, with the database pointed at `DATABASE_URL` or
/// else `default_db`.
pub fn figment(default_db: &str) -> Figment {
    let db: Map<_, Value> = map![
        "url" => std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| default_db.to_string())
            .into(),
        "pool_size" => 10.into(),
        "timeout" => 5.into(),
    ];

    rocket::Config::figment().merge(("databases", map![DATABASE_NAME => db]))
}

pub fn make_rocket(default_db: &str) -> Rocket<Build> {
    make_rocket_from(figment(default_db))
}

pub fn make_rocket_from(figment: Figment) -> Rocket<Build> {
    rocket::custom(figment)
        .attach(DbConn::fairing())
        .attach(AdHoc::try_on_ignite("migrations", |rocket| async move {
            let db_conn = match DbConn::get_one(&rocket).await {
                Some(conn) => conn,
                None => {
                    tracing::error!("no database connection for migrations");
                    return Err(rocket);
                }
            };

            let ret: Result<(), Box<dyn std::error::Error + Send + Sync>> =
                db_conn
                    .run(move |conn| {
                        let applied = conn.run_pending_migrations(MIGRATIONS)?;
                        if !applied.is_empty() {
                            tracing::info!("applied {} migrations", applied.len());
                        }
                        Ok(())
                    })
                    .await;

            match ret {
                Ok(_) => Ok(rocket),
                Err(e) => {
                    tracing::error!("could not run migrations: {e}");
                    Err(rocket)
                }
            }
        }))
        .attach(email::fairing())
        .attach(AdHoc::config::<AppConfig>())
        .mount(
            "/",
            routes![
                register,
                login,
                logout,
                me,
                create_event,
                list_events,
                view_event,
                set_event_status,
                set_form_status,
                public_form,
                form_config,
                update_form_config,
                submit_form,
                submit_speaker_application,
                list_submissions,
                review_submission,
                list_participants,
                check_in,
                field_options,
            ],
        )
        .register("/", catchers![json_catcher])
        .attach(RequestIdFairing)
}
