use db::{schema::events, user::User};
use diesel::{connection::LoadConnection, prelude::*, sqlite::Sqlite};

use crate::{
    error::{ApiError, ApiResult},
    resources::EventRef,
};

#[derive(Debug)]
/// A permission for a given resource on the system.
pub enum Permission {
    CreateEvent,
    /// See an event which has not been published (or is private).
    ViewUnlistedEvent(EventRef),
    /// Read the question lists of an event's forms, whatever their status.
    ViewFormConfig(EventRef),
    /// Change the event itself: its status, its forms and their questions.
    ModifyEvent(EventRef),
    /// List, approve, reject and check in submissions.
    ReviewSubmissions(EventRef),
    /// Read the aggregated answers of attendees.
    ViewFieldOptions(EventRef),
}

impl Permission {
    fn denial(&self) -> &'static str {
        match self {
            Permission::CreateEvent => "You must be logged in to create events",
            Permission::ViewUnlistedEvent(_) => "You cannot view this event",
            Permission::ViewFormConfig(_) => {
                "Only the organizer can view this form's configuration"
            }
            Permission::ModifyEvent(_) => "You are not allowed to change this event",
            Permission::ReviewSubmissions(_) => {
                "You are not allowed to manage submissions for this event"
            }
            Permission::ViewFieldOptions(_) => {
                "Only the organizer can view the answers to this event's forms"
            }
        }
    }
}

/// Who, apart from the organizer, holds a permission.
enum Grantees {
    SuperAdmins,
    Admins,
}

/// Returns whether a requester has the requisite permission on the given
/// object.
#[tracing::instrument(skip(conn))]
pub fn has_permission(
    user: Option<&User>,
    permission: &Permission,
    conn: &mut (impl Connection<Backend = Sqlite> + LoadConnection),
) -> QueryResult<bool> {
    let user = match user {
        Some(user) => user,
        None => return Ok(false),
    };

    match permission {
        Permission::CreateEvent => Ok(true),
        Permission::ViewUnlistedEvent(event)
        | Permission::ViewFormConfig(event)
        | Permission::ViewFieldOptions(event) => {
            check_organizer_or(user, Grantees::SuperAdmins, *event, conn)
        }
        Permission::ModifyEvent(event)
        | Permission::ReviewSubmissions(event) => {
            check_organizer_or(user, Grantees::Admins, *event, conn)
        }
    }
}

fn check_organizer_or(
    user: &User,
    grantees: Grantees,
    EventRef(event_id): EventRef,
    conn: &mut (impl Connection<Backend = Sqlite> + LoadConnection),
) -> QueryResult<bool> {
    let granted = match grantees {
        Grantees::SuperAdmins => user.is_super_admin(),
        Grantees::Admins => user.is_admin(),
    };
    if granted {
        return Ok(true);
    }

    let organizer_id = events::table
        .filter(events::id.eq(event_id))
        .select(events::organizer_id)
        .first::<i64>(conn)
        .optional()?;

    Ok(organizer_id == Some(user.id))
}

/// Like [`has_permission`], but a refusal becomes [`ApiError::Forbidden`].
pub fn require_permission(
    user: &User,
    permission: Permission,
    conn: &mut (impl Connection<Backend = Sqlite> + LoadConnection),
) -> ApiResult<()> {
    if has_permission(Some(user), &permission, conn)? {
        Ok(())
    } else {
        tracing::debug!(user = user.id, ?permission, "permission denied");
        Err(ApiError::forbidden(permission.denial()))
    }
}
