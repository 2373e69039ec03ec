//! Caller identity as established by the upstream identity proxy.
//! Keep the public surface thin and split implementation across sub-modules.

mod principal;
mod request_context;

pub use principal::Identity;
pub use request_context::{ForwardedHeaders, RequestContext, ORG_HEADER, ORIGINAL_URI_HEADER, USER_HEADER};
