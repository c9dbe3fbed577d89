use serde::{Deserialize, Serialize};
use serde_json::json;
use axum::{
    extract::{Extension, Path, State},
    http::StatusCode, middleware,
    routing::{get, post, put}, Json, Router,
};
use sqlx::types::Uuid;

use crate::{
    ensure_account,
    metrics::{ACHIEVEMENTS_UNLOCKED, POINTS_AWARDED, TOPIC_COMPLETIONS},
    middleware::authenticate,
    response::{AppError, AppSuccess},
    GlobalState,
};

pub fn study_routes() -> Router<GlobalState> {
    Router::new()
        .route("/study/laws/{law_id}",
            get(view_law)
            .route_layer(middleware::from_fn(authenticate))
        )

        // progress tracker
        .route("/study/laws/{law_id}/bookmark",
            post(save_bookmark)
            .route_layer(middleware::from_fn(authenticate))
        )

        .route("/study/laws/{law_id}/complete",
            post(complete_law)
            .route_layer(middleware::from_fn(authenticate))
        )

        .route("/study/laws/{law_id}/review",
            post(reopen_law)
            .route_layer(middleware::from_fn(authenticate))
        )

        .route("/study/laws/{law_id}/favorite",
            post(toggle_favorite)
            .route_layer(middleware::from_fn(authenticate))
        )

        // personal annotations
        .route("/study/laws/{law_id}/note",
            put(save_note)
            .route_layer(middleware::from_fn(authenticate))
        )
        .route("/study/laws/{law_id}/note",
            get(get_note)
            .route_layer(middleware::from_fn(authenticate))
        )

        .route("/study/laws/{law_id}/markup",
            put(save_markup)
            .route_layer(middleware::from_fn(authenticate))
        )
        .route("/study/laws/{law_id}/markup",
            get(get_markup)
            .route_layer(middleware::from_fn(authenticate))
        )

        .route("/study/laws/{law_id}/comments",
            get(list_comments)
            .route_layer(middleware::from_fn(authenticate))
        )
        .route("/study/laws/{law_id}/comments",
            post(create_comment)
            .route_layer(middleware::from_fn(authenticate))
        )

        .route("/study/dashboard",
            get(dashboard)
            .route_layer(middleware::from_fn(authenticate))
        )

        .route("/study/announcements/{announcement_id}/seen",
            post(dismiss_announcement)
            .route_layer(middleware::from_fn(authenticate))
        )
}

async fn view_law(
    State(state): State<GlobalState>,
    Extension(user_id): Extension<Uuid>,
    Path(law_id): Path<Uuid>,
) -> Result<AppSuccess, AppError> {
    ensure_account(&state, user_id).await?;
    let outcome = state.engine.view_topic(user_id, law_id).await?;
    Ok(AppSuccess::new(StatusCode::OK, "Law fetched successfully", json!(outcome)))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BookmarkRequest {
    pub position: String,
}

async fn save_bookmark(
    State(state): State<GlobalState>,
    Extension(user_id): Extension<Uuid>,
    Path(law_id): Path<Uuid>,
    Json(payload): Json<BookmarkRequest>,
) -> Result<AppSuccess, AppError> {
    ensure_account(&state, user_id).await?;
    state.engine.save_bookmark(user_id, law_id, &payload.position).await?;
    Ok(AppSuccess::new(StatusCode::OK, "Bookmark saved successfully", json!(())))
}

async fn complete_law(
    State(state): State<GlobalState>,
    Extension(user_id): Extension<Uuid>,
    Path(law_id): Path<Uuid>,
) -> Result<AppSuccess, AppError> {
    ensure_account(&state, user_id).await?;
    let outcome = state.engine.mark_complete(user_id, law_id).await?;

    if !outcome.already_completed {
        TOPIC_COMPLETIONS.inc();
        POINTS_AWARDED.inc_by(outcome.points_awarded as u64);
        for name in &outcome.newly_unlocked {
            ACHIEVEMENTS_UNLOCKED.with_label_values(&[name.as_str()]).inc();
        }
    }

    Ok(AppSuccess::new(StatusCode::OK, "Law marked as completed", json!(outcome)))
}

async fn reopen_law(
    State(state): State<GlobalState>,
    Extension(user_id): Extension<Uuid>,
    Path(law_id): Path<Uuid>,
) -> Result<AppSuccess, AppError> {
    ensure_account(&state, user_id).await?;
    state.engine.revert_to_in_progress(user_id, law_id).await?;
    Ok(AppSuccess::new(StatusCode::OK, "Law reopened for review", json!(())))
}

async fn toggle_favorite(
    State(state): State<GlobalState>,
    Extension(user_id): Extension<Uuid>,
    Path(law_id): Path<Uuid>,
) -> Result<AppSuccess, AppError> {
    ensure_account(&state, user_id).await?;
    let favorited = state.engine.toggle_favorite(user_id, law_id).await?;
    Ok(AppSuccess::new(StatusCode::OK, "Favorite toggled successfully", json!({
        "favorited": favorited
    })))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NoteRequest {
    pub content: String,
}

async fn save_note(
    State(state): State<GlobalState>,
    Extension(user_id): Extension<Uuid>,
    Path(law_id): Path<Uuid>,
    Json(payload): Json<NoteRequest>,
) -> Result<AppSuccess, AppError> {
    ensure_account(&state, user_id).await?;
    state.engine.save_note(user_id, law_id, &payload.content).await?;
    Ok(AppSuccess::new(StatusCode::OK, "Note saved successfully", json!(())))
}

async fn get_note(
    State(state): State<GlobalState>,
    Extension(user_id): Extension<Uuid>,
    Path(law_id): Path<Uuid>,
) -> Result<AppSuccess, AppError> {
    ensure_account(&state, user_id).await?;
    let note = state.engine.note(user_id, law_id).await?;
    Ok(AppSuccess::new(StatusCode::OK, "Note fetched successfully", json!(note)))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MarkupRequest {
    pub content: String,
}

async fn save_markup(
    State(state): State<GlobalState>,
    Extension(user_id): Extension<Uuid>,
    Path(law_id): Path<Uuid>,
    Json(payload): Json<MarkupRequest>,
) -> Result<AppSuccess, AppError> {
    ensure_account(&state, user_id).await?;
    state.engine.save_markup(user_id, law_id, &payload.content).await?;
    Ok(AppSuccess::new(StatusCode::OK, "Markup saved successfully", json!(())))
}

async fn get_markup(
    State(state): State<GlobalState>,
    Extension(user_id): Extension<Uuid>,
    Path(law_id): Path<Uuid>,
) -> Result<AppSuccess, AppError> {
    ensure_account(&state, user_id).await?;
    let markup = state.engine.markup(user_id, law_id).await?;
    Ok(AppSuccess::new(StatusCode::OK, "Markup fetched successfully", json!(markup)))
}

async fn list_comments(
    State(state): State<GlobalState>,
    Extension(user_id): Extension<Uuid>,
    Path(law_id): Path<Uuid>,
) -> Result<AppSuccess, AppError> {
    ensure_account(&state, user_id).await?;
    let comments = state.engine.comments(law_id).await?;
    Ok(AppSuccess::new(StatusCode::OK, "Comments fetched successfully", json!(comments)))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CommentRequest {
    pub anchor_paragraph_id: String,
    pub content: String,
}

async fn create_comment(
    State(state): State<GlobalState>,
    Extension(user_id): Extension<Uuid>,
    Path(law_id): Path<Uuid>,
    Json(payload): Json<CommentRequest>,
) -> Result<AppSuccess, AppError> {
    ensure_account(&state, user_id).await?;
    let comment = state.engine
        .add_comment(user_id, law_id, &payload.anchor_paragraph_id, &payload.content)
        .await?;
    Ok(AppSuccess::new(StatusCode::CREATED, "Comment created successfully", json!(comment)))
}

async fn dashboard(
    State(state): State<GlobalState>,
    Extension(user_id): Extension<Uuid>,
) -> Result<AppSuccess, AppError> {
    ensure_account(&state, user_id).await?;
    let summary = state.engine.dashboard(user_id).await?;
    Ok(AppSuccess::new(StatusCode::OK, "Dashboard fetched successfully", json!(summary)))
}

async fn dismiss_announcement(
    State(state): State<GlobalState>,
    Extension(user_id): Extension<Uuid>,
    Path(announcement_id): Path<Uuid>,
) -> Result<AppSuccess, AppError> {
    ensure_account(&state, user_id).await?;
    state.engine.dismiss_announcement(user_id, announcement_id).await?;
    Ok(AppSuccess::new(StatusCode::OK, "Announcement dismissed", json!(())))
}
