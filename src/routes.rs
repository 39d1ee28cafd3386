use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower::ServiceBuilder;
use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::article::Article;
use crate::config::Category;
use crate::controller::FeedController;
use crate::db::Database;
use crate::feed::FeedSnapshot;
use crate::fetcher::HttpNewsSource;
use crate::local::LocalNews;
use crate::navigator::{extend_cyclic, FlashView, GestureOutcome, SwipeNavigator};
use crate::opener::{LinkOpener, OpenError};

pub struct AppState {
    pub categories: Vec<Category>,
    pub feed: FeedController<HttpNewsSource>,
    pub local: Option<LocalNews>,
    pub db: Arc<Database>,
    pub opener: Arc<dyn LinkOpener>,
    /// Copies of the feed laid back to back in the flash view
    pub flash_repeat: usize,
    pub navigator: Mutex<SwipeNavigator>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/categories", get(categories))
        .route("/api/feed", get(feed))
        .route("/api/feed/category", post(select_category))
        .route("/api/feed/refresh", post(refresh))
        .route("/api/feed/more", post(load_more))
        .route("/api/bookmarks", get(bookmarks).post(add_bookmark))
        .route("/api/bookmarks/:id", delete(remove_bookmark))
        .route("/api/local/cities", get(local_cities))
        .route("/api/local/city", get(local_city).put(set_local_city))
        .route("/api/local/feed", get(local_feed))
        .route("/api/local/refresh", post(local_refresh))
        .route("/api/flash", get(flash))
        .route("/api/flash/swipe", post(flash_swipe))
        .route("/api/flash/settled", post(flash_settled))
        .route("/api/open", post(open_link))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}

// Error wrapper, rendered as `{ "error": message }`
pub struct AppError {
    status: StatusCode,
    message: String,
}

impl AppError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

impl<E: Into<anyhow::Error>> From<E> for AppError {
    fn from(err: E) -> Self {
        let err = err.into();
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: format!("Error: {}", err),
        }
    }
}

/// Result of a feed operation. `accepted` is false when the controller
/// dropped the request because another fetch was pending or nothing was left.
#[derive(Debug, Serialize)]
pub struct FeedResponse {
    pub accepted: bool,
    pub feed: FeedSnapshot,
}

#[derive(Debug, Deserialize)]
pub struct SelectCategoryRequest {
    pub category: String,
}

#[derive(Debug, Deserialize)]
pub struct CityRequest {
    pub city: String,
}

#[derive(Debug, Serialize)]
pub struct CityResponse {
    pub city: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SwipeRequest {
    pub translation_y: f64,
    pub velocity_y: f64,
    pub viewport_height: f64,
}

#[derive(Debug, Serialize)]
pub struct SwipeResponse {
    pub outcome: GestureOutcome,
    pub view: FlashView<Article>,
}

#[derive(Debug, Deserialize)]
pub struct OpenRequest {
    pub url: String,
}

pub async fn health() -> &'static str {
    "OK"
}

pub async fn categories(State(state): State<Arc<AppState>>) -> Json<Vec<Category>> {
    Json(state.categories.clone())
}

pub async fn feed(State(state): State<Arc<AppState>>) -> Json<FeedSnapshot> {
    Json(state.feed.snapshot())
}

pub async fn select_category(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SelectCategoryRequest>,
) -> Result<Json<FeedResponse>, AppError> {
    if !state.categories.iter().any(|c| c.key == request.category) {
        return Err(AppError::bad_request(format!(
            "unknown category '{}'",
            request.category
        )));
    }

    state.feed.select_category(&request.category).await;
    Ok(Json(FeedResponse {
        accepted: true,
        feed: state.feed.snapshot(),
    }))
}

pub async fn refresh(State(state): State<Arc<AppState>>) -> Json<FeedResponse> {
    let accepted = state.feed.refresh().await.is_some();
    Json(FeedResponse {
        accepted,
        feed: state.feed.snapshot(),
    })
}

pub async fn load_more(State(state): State<Arc<AppState>>) -> Json<FeedResponse> {
    let accepted = state.feed.load_more().await.is_some();
    Json(FeedResponse {
        accepted,
        feed: state.feed.snapshot(),
    })
}

pub async fn bookmarks(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Article>>, AppError> {
    Ok(Json(state.db.bookmarks().await?))
}

pub async fn add_bookmark(
    State(state): State<Arc<AppState>>,
    Json(article): Json<Article>,
) -> Result<impl IntoResponse, AppError> {
    let saved = state.db.add_bookmark(&article).await?;
    Ok((StatusCode::CREATED, Json(saved)))
}

pub async fn remove_bookmark(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    if state.db.remove_bookmark(&id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::not_found(format!("no bookmark with id '{}'", id)))
    }
}

fn local_news(state: &AppState) -> Result<&LocalNews, AppError> {
    state
        .local
        .as_ref()
        .ok_or_else(|| AppError::not_found("local news is not configured"))
}

pub async fn local_cities(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<String>>, AppError> {
    Ok(Json(local_news(&state)?.cities().to_vec()))
}

pub async fn local_city(
    State(state): State<Arc<AppState>>,
) -> Result<Json<CityResponse>, AppError> {
    local_news(&state)?;
    let city = state.db.selected_city().await?;
    Ok(Json(CityResponse { city }))
}

pub async fn set_local_city(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CityRequest>,
) -> Result<Json<FeedResponse>, AppError> {
    let local = local_news(&state)?;
    if !local.is_known_city(&request.city) {
        return Err(AppError::bad_request(format!(
            "unknown city '{}'",
            request.city
        )));
    }

    state.db.set_selected_city(&request.city).await?;
    local.feed.select_category(&request.city).await;
    Ok(Json(FeedResponse {
        accepted: true,
        feed: local.feed.snapshot(),
    }))
}

pub async fn local_feed(
    State(state): State<Arc<AppState>>,
) -> Result<Json<FeedSnapshot>, AppError> {
    Ok(Json(local_news(&state)?.feed.snapshot()))
}

pub async fn local_refresh(
    State(state): State<Arc<AppState>>,
) -> Result<Json<FeedResponse>, AppError> {
    let local = local_news(&state)?;
    if local.feed.snapshot().category.is_empty() {
        return Err(AppError::bad_request("no city selected"));
    }

    let accepted = local.feed.refresh().await.is_some();
    Ok(Json(FeedResponse {
        accepted,
        feed: local.feed.snapshot(),
    }))
}

/// The flash sequence tracks the main feed; the navigator follows its length.
fn flash_items(state: &AppState, navigator: &mut SwipeNavigator) -> Vec<Article> {
    let items = extend_cyclic(&state.feed.snapshot().articles, state.flash_repeat);
    navigator.set_len(items.len());
    items
}

pub async fn flash(State(state): State<Arc<AppState>>) -> Json<FlashView<Article>> {
    let mut navigator = state.navigator.lock().await;
    let items = flash_items(&state, &mut navigator);
    Json(navigator.view(items))
}

pub async fn flash_swipe(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SwipeRequest>,
) -> Result<Json<SwipeResponse>, AppError> {
    if !(request.viewport_height > 0.0) {
        return Err(AppError::bad_request("viewport_height must be positive"));
    }

    let mut navigator = state.navigator.lock().await;
    let items = flash_items(&state, &mut navigator);
    let outcome = navigator.resolve(
        request.translation_y,
        request.velocity_y,
        request.viewport_height,
    );
    Ok(Json(SwipeResponse {
        outcome,
        view: navigator.view(items),
    }))
}

pub async fn flash_settled(State(state): State<Arc<AppState>>) -> Json<FlashView<Article>> {
    let mut navigator = state.navigator.lock().await;
    navigator.settle_finished();
    let items = flash_items(&state, &mut navigator);
    Json(navigator.view(items))
}

pub async fn open_link(
    State(state): State<Arc<AppState>>,
    Json(request): Json<OpenRequest>,
) -> Result<StatusCode, AppError> {
    match state.opener.open(&request.url) {
        Ok(()) => Ok(StatusCode::NO_CONTENT),
        Err(e @ OpenError::InvalidLink(_)) => Err(AppError::bad_request(e.to_string())),
        Err(e) => {
            warn!("{}", e);
            Err(AppError {
                status: StatusCode::BAD_GATEWAY,
                message: e.to_string(),
            })
        }
    }
}
