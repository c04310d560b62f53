use axum::{
    body::Body,
    http::{HeaderName, HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use nanoid::nanoid;
use tracing::Instrument;

use crate::state::RequestId;

pub static REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

/// Tag every request with a random id, echoed back in `X-Request-Id` and
/// attached to the request's log span. Nothing about the client goes in it.
pub async fn request_id(mut req: Request<Body>, next: Next) -> Response {
    let id = new_request_id();
    req.extensions_mut().insert(RequestId(id.clone()));

    let span = tracing::info_span!("request", request_id = %id, method = %req.method(), path = %req.uri().path());
    let mut resp = next.run(req).instrument(span).await;
    if let Ok(value) = HeaderValue::from_str(&id) {
        resp.headers_mut().insert(REQUEST_ID_HEADER.clone(), value);
    }
    resp
}

fn new_request_id() -> String {
    format!("req_{}", nanoid!(16))
}
