//! Caller identity.
//!
//! The server does not authenticate anyone itself. A fronting proxy verifies
//! the client and forwards its account in [`CALLER_HEADER`]; handlers that
//! run owner, oracle or minter checks take the caller only from there.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use domain::AccountId;

use crate::error::ApiError;

pub const CALLER_HEADER: &str = "x-caller-account";

/// The account on whose behalf the request is made.
#[derive(Debug, Clone)]
pub struct Caller(pub AccountId);

impl<S: Send + Sync> FromRequestParts<S> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts.headers.get(CALLER_HEADER).ok_or_else(|| {
            ApiError::Unauthenticated(format!("missing {CALLER_HEADER} header"))
        })?;
        let raw = value.to_str().map_err(|_| {
            ApiError::BadRequest(format!("{CALLER_HEADER} header is not valid text"))
        })?;
        Ok(Caller(AccountId::parse(raw)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{Request, StatusCode};
    use axum::response::IntoResponse;

    async fn extract(header: Option<&str>) -> Result<Caller, ApiError> {
        let mut builder = Request::builder().uri("/");
        if let Some(value) = header {
            builder = builder.header(CALLER_HEADER, value);
        }
        let (mut parts, ()) = builder.body(()).unwrap().into_parts();
        Caller::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn reads_account_from_header() {
        let Caller(account) = extract(Some("owner.near")).await.unwrap();
        assert_eq!(account.as_str(), "owner.near");
    }

    #[tokio::test]
    async fn missing_header_is_unauthenticated() {
        let err = extract(None).await.unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn malformed_account_is_bad_request() {
        let err = extract(Some("Not Valid")).await.unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }
}
