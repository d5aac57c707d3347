use axum::{extract::FromRequestParts, http::request::Parts};

use crate::{error::AppError, state::game::UserId};

/// Header carrying the caller identity resolved by the session layer in front
/// of this service.
pub const USER_HEADER: &str = "x-user-id";

/// Identity of the calling player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionUser(pub UserId);

impl<S> FromRequestParts<S> for SessionUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(|value| SessionUser(value.to_string()))
            .ok_or_else(|| AppError::Unauthorized(format!("missing `{USER_HEADER}` header")))
    }
}

#[cfg(test)]
mod tests {
    use axum::http::Request;

    use super::*;

    async fn extract(request: Request<()>) -> Result<SessionUser, AppError> {
        let (mut parts, _) = request.into_parts();
        SessionUser::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn reads_the_user_header() {
        let request = Request::builder()
            .header(USER_HEADER, " alice ")
            .body(())
            .unwrap();
        assert_eq!(extract(request).await.unwrap(), SessionUser("alice".into()));
    }

    #[tokio::test]
    async fn blank_or_missing_header_is_unauthorized() {
        let request = Request::builder().header(USER_HEADER, "  ").body(()).unwrap();
        assert!(matches!(extract(request).await, Err(AppError::Unauthorized(_))));

        let request = Request::builder().body(()).unwrap();
        assert!(matches!(extract(request).await, Err(AppError::Unauthorized(_))));
    }
}
