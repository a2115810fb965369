//! Request extractors.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use roomdrop_service::context::RequestContext;

use crate::error::ApiError;

/// The already-authenticated actor identity, carried in headers by the
/// external authentication layer.
///
/// `x-peer-id` names the peer; `x-display-name` is optional. Both may be
/// absent for anonymous access to public rooms.
#[derive(Debug, Clone)]
pub struct Identity(pub RequestContext);

impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        Ok(Self(RequestContext {
            peer_id: header("x-peer-id"),
            display_name: header("x-display-name"),
        }))
    }
}
