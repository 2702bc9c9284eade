use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Serialize;

use crate::error::AppError;
use crate::quiz::{CreateQuizRequest, Quiz};
use crate::state::AppState;

/// Success envelope shared by every quiz endpoint.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub const fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

pub async fn list_quizzes(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<Quiz>>>, AppError> {
    let quizzes = state.quizzes.list().await?;
    Ok(Json(ApiResponse::ok(quizzes)))
}

pub async fn get_quiz(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Quiz>>, AppError> {
    let quiz = state.quizzes.get(&id).await?;
    Ok(Json(ApiResponse::ok(quiz)))
}

pub async fn create_quiz(
    State(state): State<AppState>,
    payload: Result<Json<CreateQuizRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(request) = payload.map_err(|e| {
        tracing::debug!("rejected quiz payload: {e}");
        AppError::InvalidJson("Invalid request payload".to_string())
    })?;
    let quiz = state.quizzes.create(&request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(quiz))))
}

pub async fn delete_quiz(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.quizzes.delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
