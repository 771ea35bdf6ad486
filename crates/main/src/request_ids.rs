use rocket::{
    fairing::{Fairing, Info, Kind},
    request::{self, FromRequest, Request},
    Data, Response,
};
use tracing::Span;
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "X-Request-Id";

/// A type that represents a request's ID.
#[derive(Clone)]
pub struct RequestId(pub String);

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Returns the current request's ID, assigning one only as necessary.
#[rocket::async_trait]
impl<'r> FromRequest<'r> for RequestId {
    type Error = ();

    async fn from_request(
        request: &'r Request<'_>,
    ) -> request::Outcome<Self, Self::Error> {
        // `local_cache` runs the closure at most once per request, so every
        // guard sees the same ID
        request::Outcome::Success(
            request
                .local_cache(|| {
                    RequestId(
                        request
                            .headers()
                            .get_one(REQUEST_ID_HEADER)
                            .map(ToString::to_string)
                            .unwrap_or_else(|| Uuid::new_v4().to_string()),
                    )
                })
                .clone(),
        )
    }
}

/// The span opened for the current request by [`RequestIdFairing`].
struct TracingSpan(Option<Span>);

pub struct RequestIdFairing;

#[rocket::async_trait]
impl Fairing for RequestIdFairing {
    fn info(&self) -> Info {
        Info {
            name: "Request ID fairing",
            kind: Kind::Request | Kind::Response,
        }
    }

    async fn on_request(&self, req: &mut Request<'_>, _data: &mut Data<'_>) {
        let request_id = req.guard::<RequestId>().await;

        if let request::Outcome::Success(request_id) = request_id {
            let span = tracing::info_span!(
                "request",
                http.method = %req.method(),
                http.uri = %req.uri().path(),
                http.status_code = tracing::field::Empty,
                http.request_id = %request_id,
            );
            span.in_scope(|| {
                tracing::debug!("received request");
                sentry::configure_scope(|scope| {
                    scope.set_tag("request_id", &request_id);
                });
            });
            req.local_cache(|| TracingSpan(Some(span)));
        }
    }

    async fn on_response<'r>(
        &self,
        req: &'r Request<'_>,
        res: &mut Response<'r>,
    ) {
        if let Some(span) = &req.local_cache(|| TracingSpan(None)).0
        {
            span.record("http.status_code", res.status().code);
            span.in_scope(|| {
                tracing::info!("responded with {}", res.status());
            });
        }

        if let request::Outcome::Success(request_id) =
            req.guard::<RequestId>().await
        {
            res.set_raw_header(REQUEST_ID_HEADER, request_id.0);
        }
    }
}
