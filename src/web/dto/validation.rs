//! JSON body extraction with validation.

use axum::{
    async_trait,
    body::Bytes,
    extract::{rejection::JsonRejection, FromRequest, Request},
    Json,
};
use serde::de::DeserializeOwned;

use crate::content::ContentInput;
use crate::web::error::ApiError;

/// Parse a JSON body that was read as raw bytes.
///
/// Login and signup read the body only after the rate limit and CSRF checks
/// have passed, so they take `Bytes` and call this afterwards.
pub fn parse_json<T: DeserializeOwned>(body: &Bytes) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(|e| ApiError::bad_request(format!("Invalid JSON: {e}")))
}

async fn json_body<T, S>(req: Request, state: &S) -> Result<T, ApiError>
where
    S: Send + Sync,
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
{
    let Json(value) = Json::<T>::from_request(req, state)
        .await
        .map_err(|e| ApiError::bad_request(format!("Invalid JSON: {}", e.body_text())))?;
    Ok(value)
}

/// A content body validated for creation: field rules plus a required title.
///
/// # Example
///
/// ```ignore
/// use haven::web::dto::CreateJson;
///
/// async fn create_story(CreateJson(story): CreateJson<StoryInput>) -> Result<Json<OkResponse>, ApiError> {
///     // story.title is present and non-blank here
/// }
/// ```
pub struct CreateJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for CreateJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + ContentInput,
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let value: T = json_body(req, state).await?;
        value
            .validate_for_create()
            .map_err(ApiError::from_validation_errors)?;
        Ok(CreateJson(value))
    }
}

/// A content body validated for a partial update.
pub struct PatchJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for PatchJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + ContentInput,
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let value: T = json_body(req, state).await?;
        value
            .validate_for_update()
            .map_err(ApiError::from_validation_errors)?;
        Ok(PatchJson(value))
    }
}

/// JSON body with rejections rendered as [`ApiError`].
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for JsonBody<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Send,
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        json_body(req, state).await.map(JsonBody)
    }
}
