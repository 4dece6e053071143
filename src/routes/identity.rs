//! Request extractors: the acting identity from the identity proxy headers, and
//! JSON/query wrappers whose rejections use the service error body.

use axum::async_trait;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{FromRequest, FromRequestParts};
use axum::http::request::Parts;

use crate::domain::{Actor, Role};
use crate::error::ServiceError;

pub const ACTOR_ID_HEADER: &str = "x-actor-id";
pub const ACTOR_ROLE_HEADER: &str = "x-actor-role";

#[async_trait]
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = header(parts, ACTOR_ID_HEADER)
            .ok_or_else(|| ServiceError::Unauthenticated(format!("missing {ACTOR_ID_HEADER} header")))?;
        let role = header(parts, ACTOR_ROLE_HEADER)
            .ok_or_else(|| ServiceError::Unauthenticated(format!("missing {ACTOR_ROLE_HEADER} header")))?;
        let role = Role::parse(role)
            .ok_or_else(|| ServiceError::Unauthenticated(format!("unknown role '{role}'")))?;

        Ok(Actor::new(id, role))
    }
}

fn header<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ServiceError))]
pub struct ApiJson<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ServiceError))]
pub struct ApiQuery<T>(pub T);

impl From<JsonRejection> for ServiceError {
    fn from(r: JsonRejection) -> Self {
        ServiceError::Validation(r.body_text())
    }
}

impl From<QueryRejection> for ServiceError {
    fn from(r: QueryRejection) -> Self {
        ServiceError::Validation(r.body_text())
    }
}
