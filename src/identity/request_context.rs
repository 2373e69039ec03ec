use axum::http::header::{ACCEPT_LANGUAGE, AUTHORIZATION, COOKIE};
use axum::http::{HeaderMap, HeaderName};

use super::Identity;
use crate::error::AppResult;

pub const USER_HEADER: &str = "x-openhab-user";
pub const ORG_HEADER: &str = "x-openhab-org";
pub const ORIGINAL_URI_HEADER: &str = "x-original-uri";

/// Caller-scoped headers replayed verbatim on every backend call made for the request.
const FORWARDED: [HeaderName; 3] = [AUTHORIZATION, COOKIE, ACCEPT_LANGUAGE];

#[derive(Debug, Clone, Default)]
pub struct ForwardedHeaders(HeaderMap);

impl ForwardedHeaders {
    pub fn from_request(headers: &HeaderMap) -> Self {
        let mut out = HeaderMap::new();
        for name in FORWARDED.iter() {
            for value in headers.get_all(name).iter() {
                out.append(name.clone(), value.clone());
            }
        }
        Self(out)
    }

    pub fn header_map(&self) -> HeaderMap { self.0.clone() }

    pub fn is_empty(&self) -> bool { self.0.is_empty() }
}

/// Per-request view handed from the routing layer to the gateway.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub identity: Identity,
    pub forwarded: ForwardedHeaders,
}

impl RequestContext {
    pub fn from_headers(headers: &HeaderMap, org_delimiter: &str) -> AppResult<Self> {
        let user = headers.get(USER_HEADER).and_then(|v| v.to_str().ok());
        let orgs = headers.get(ORG_HEADER).and_then(|v| v.to_str().ok());
        let identity = Identity::from_header_values(user, orgs, org_delimiter)?;
        Ok(Self { identity, forwarded: ForwardedHeaders::from_request(headers) })
    }
}
