//! Sends emails.
//!
//! Request handlers never talk to the mail server directly. They hand an
//! [`OutgoingEmail`] to the [`Outbox`], which records it in the `emails`
//! ledger and pushes it onto a bounded queue. A background worker (started by
//! [`fairing`]) delivers queued messages, retrying failed attempts, and writes
//! the final outcome back to the ledger.

use std::time::Duration;

use chrono::Utc;
use db::{email::EmailStatus, id::gen_public_id, schema::emails, DbConn};
use diesel::prelude::*;
use lettre::{
    message::{Mailbox, MultiPart},
    transport::smtp::authentication::Credentials,
    Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use rocket::{
    fairing::AdHoc,
    tokio::sync::mpsc::{self, error::TrySendError},
};
use serde::Deserialize;
use tracing::Instrument;

/// The `mail` table of the Rocket configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MailConfig {
    /// When unset, emails are written to the log instead of being sent.
    pub smtp_host: Option<String>,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    pub from_address: String,
    pub max_attempts: u32,
    pub retry_base_ms: u64,
    pub queue_capacity: usize,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            smtp_host: None,
            smtp_username: None,
            smtp_password: None,
            from_address: "Events <no-reply@localhost>".to_string(),
            max_attempts: 3,
            retry_base_ms: 500,
            queue_capacity: 256,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Recipient {
    pub name: String,
    pub email: String,
}

impl Recipient {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }

    fn mailbox(&self) -> Result<Mailbox, DeliveryError> {
        let address = self.email.parse::<Address>()?;
        Ok(Mailbox::new(Some(self.name.clone()), address))
    }
}

impl std::fmt::Display for Recipient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} <{}>", self.name, self.email)
    }
}

#[derive(Debug, Clone)]
pub struct OutgoingEmail {
    /// Recorded in the ledger so that deliveries can be told apart.
    pub kind: &'static str,
    pub to: Vec<Recipient>,
    pub subject: String,
    pub html: String,
    pub text: String,
}

#[derive(Debug, thiserror::Error)]
pub enum OutboxError {
    #[error("could not record email: {0}")]
    Database(#[from] diesel::result::Error),
    #[error("email has no recipients")]
    NoRecipients,
    #[error("outbox queue is full")]
    QueueFull,
    #[error("outbox worker has stopped")]
    QueueClosed,
}

#[derive(Debug, thiserror::Error)]
enum DeliveryError {
    #[error("invalid address: {0}")]
    Address(#[from] lettre::address::AddressError),
    #[error("could not build message: {0}")]
    Build(#[from] lettre::error::Error),
    #[error("smtp error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
}

struct QueuedEmail {
    ledger_id: i64,
    email: OutgoingEmail,
}

/// Handle used by request handlers to queue emails.
pub struct Outbox {
    sender: mpsc::Sender<QueuedEmail>,
}

impl Outbox {
    /// Records `email` in the ledger and queues it for delivery, returning
    /// the ledger row's public id.
    #[tracing::instrument(skip(self, db, email), fields(kind = email.kind))]
    pub async fn enqueue(
        &self,
        db: &DbConn,
        email: OutgoingEmail,
    ) -> Result<String, OutboxError> {
        if email.to.is_empty() {
            return Err(OutboxError::NoRecipients);
        }

        let public_id = gen_public_id();
        let recipients = email
            .to
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        let (kind, subject) = (email.kind, email.subject.clone());
        let row_public_id = public_id.clone();
        let ledger_id = db
            .run(move |conn| {
                diesel::insert_into(emails::table)
                    .values((
                        emails::public_id.eq(&row_public_id),
                        emails::kind.eq(kind),
                        emails::recipients.eq(&recipients),
                        emails::subject.eq(&subject),
                        emails::status.eq(EmailStatus::Queued.as_str()),
                        emails::attempts.eq(0i64),
                        emails::created_at.eq(Utc::now().naive_utc()),
                    ))
                    .returning(emails::id)
                    .get_result::<i64>(conn)
            })
            .await?;

        let error = match self.sender.try_send(QueuedEmail { ledger_id, email })
        {
            Ok(()) => return Ok(public_id),
            Err(TrySendError::Full(_)) => OutboxError::QueueFull,
            Err(TrySendError::Closed(_)) => OutboxError::QueueClosed,
        };

        let reason = error.to_string();
        db.run(move |conn| {
            record_outcome(conn, ledger_id, 0, Err(reason.as_str()))
        })
        .await?;
        Err(error)
    }

    /// Like [`Outbox::enqueue`], but failures are only logged.
    pub async fn enqueue_best_effort(&self, db: &DbConn, email: OutgoingEmail) {
        let kind = email.kind;
        if let Err(e) = self.enqueue(db, email).await {
            tracing::warn!("could not queue {kind} email: {e}");
        }
    }
}

enum Transport {
    Smtp {
        mailer: AsyncSmtpTransport<Tokio1Executor>,
        from: Mailbox,
    },
    Log,
}

impl Transport {
    fn from_config(config: &MailConfig) -> Result<Transport, DeliveryError> {
        let host = match &config.smtp_host {
            Some(host) => host,
            None => return Ok(Transport::Log),
        };

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(host)?;
        if let (Some(username), Some(password)) =
            (&config.smtp_username, &config.smtp_password)
        {
            builder = builder
                .credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(Transport::Smtp {
            mailer: builder.build(),
            from: config.from_address.parse::<Mailbox>()?,
        })
    }

    async fn send(&self, email: &OutgoingEmail) -> Result<(), DeliveryError> {
        match self {
            Transport::Smtp { mailer, from } => {
                let mut message = Message::builder()
                    .from(from.clone())
                    .subject(email.subject.clone());
                for recipient in &email.to {
                    message = message.to(recipient.mailbox()?);
                }
                let message = message.multipart(
                    MultiPart::alternative_plain_html(
                        email.text.clone(),
                        email.html.clone(),
                    ),
                )?;
                mailer.send(message).await?;
                Ok(())
            }
            Transport::Log => {
                for recipient in &email.to {
                    recipient.mailbox()?;
                }
                let to = email
                    .to
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", ");
                tracing::info!(
                    kind = email.kind,
                    subject = %email.subject,
                    %to,
                    "email not sent, no smtp host configured"
                );
                tracing::debug!("email body:\n{}", email.text);
                Ok(())
            }
        }
    }
}

fn record_outcome(
    conn: &mut db::DbWrapper,
    ledger_id: i64,
    attempts: u32,
    outcome: Result<(), &str>,
) -> QueryResult<usize> {
    let target = emails::table.filter(emails::id.eq(ledger_id));
    match outcome {
        Ok(()) => diesel::update(target)
            .set((
                emails::status.eq(EmailStatus::Sent.as_str()),
                emails::attempts.eq(attempts as i64),
                emails::sent_at.eq(Some(Utc::now().naive_utc())),
            ))
            .execute(conn),
        Err(reason) => diesel::update(target)
            .set((
                emails::status.eq(EmailStatus::Failed.as_str()),
                emails::attempts.eq(attempts as i64),
                emails::last_error.eq(Some(reason)),
            ))
            .execute(conn),
    }
}

async fn deliver_queued(
    mut receiver: mpsc::Receiver<QueuedEmail>,
    db: DbConn,
    transport: Transport,
    config: MailConfig,
) {
    while let Some(QueuedEmail { ledger_id, email }) = receiver.recv().await {
        let span = tracing::info_span!("deliver_email", ledger_id, kind = email.kind);
        async {
            let mut attempts = 0;
            let outcome = loop {
                attempts += 1;
                match transport.send(&email).await {
                    Ok(()) => break Ok(()),
                    Err(e) if attempts >= config.max_attempts.max(1) => {
                        break Err(e.to_string())
                    }
                    Err(e) => {
                        let backoff = config
                            .retry_base_ms
                            .saturating_mul(2u64.saturating_pow(attempts - 1));
                        tracing::warn!(
                            "attempt {attempts} failed ({e}), retrying in {backoff}ms"
                        );
                        rocket::tokio::time::sleep(Duration::from_millis(backoff))
                            .await;
                    }
                }
            };

            if let Err(e) = &outcome {
                tracing::warn!("giving up on email after {attempts} attempts: {e}");
            }

            let recorded = db
                .run(move |conn| {
                    let outcome = match &outcome {
                        Ok(()) => Ok(()),
                        Err(e) => Err(e.as_str()),
                    };
                    record_outcome(conn, ledger_id, attempts, outcome)
                })
                .await;
            if let Err(e) = recorded {
                tracing::error!("could not record delivery outcome: {e}");
            }
        }
        .instrument(span)
        .await
    }
}

/// Starts the delivery worker and makes an [`Outbox`] available as managed
/// state. Must be attached after the database fairing.
pub fn fairing() -> AdHoc {
    AdHoc::try_on_ignite("email outbox", |rocket| async move {
        let config = match rocket.figment().focus("mail").extract::<MailConfig>()
        {
            Ok(config) => config,
            Err(e) => {
                tracing::error!("invalid mail configuration: {e}");
                return Err(rocket);
            }
        };

        let transport = match Transport::from_config(&config) {
            Ok(transport) => transport,
            Err(e) => {
                tracing::error!("could not set up mail transport: {e}");
                return Err(rocket);
            }
        };

        let db = match DbConn::get_one(&rocket).await {
            Some(db) => db,
            None => {
                tracing::error!("no database connection for the email outbox");
                return Err(rocket);
            }
        };

        let (sender, receiver) = mpsc::channel(config.queue_capacity.max(1));
        rocket::tokio::spawn(deliver_queued(receiver, db, transport, config));

        Ok(rocket.manage(Outbox { sender }))
    })
}
