//! Security response headers.
//!
//! The server only returns JSON and uploaded images, so the policy is strict
//! everywhere except `Cross-Origin-Resource-Policy`: avatars are embedded by
//! the client, which runs on a different origin.

use axum::{
    body::Body,
    extract::State,
    http::{HeaderName, HeaderValue, Request, Response, header},
    middleware::Next,
};

// CSP directives:
// - default-src 'none': Nothing is loaded by API responses
// - img-src 'self': Served avatars may render when opened directly
// - frame-ancestors 'none': Prevent embedding in iframes
// - form-action 'none' / base-uri 'none': No documents are served
const CSP: &str = "default-src 'none'; img-src 'self'; frame-ancestors 'none'; form-action 'none'; base-uri 'none'";

const HSTS: &str = "max-age=31536000; includeSubDomains";

/// Middleware that adds security headers to every response.
///
/// State: whether the deployment is served over https. HSTS is only sent then.
pub async fn security_headers(
    State(https): State<bool>,
    request: Request<Body>,
    next: Next,
) -> Response<Body> {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    headers.insert(header::CONTENT_SECURITY_POLICY, HeaderValue::from_static(CSP));
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(
        header::REFERRER_POLICY,
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );
    headers.insert(
        header::X_DNS_PREFETCH_CONTROL,
        HeaderValue::from_static("off"),
    );
    headers.insert(
        HeaderName::from_static("x-permitted-cross-domain-policies"),
        HeaderValue::from_static("none"),
    );
    headers.insert(
        HeaderName::from_static("cross-origin-resource-policy"),
        HeaderValue::from_static("cross-origin"),
    );

    if https {
        headers.insert(
            header::STRICT_TRANSPORT_SECURITY,
            HeaderValue::from_static(HSTS),
        );
    }

    response
}
