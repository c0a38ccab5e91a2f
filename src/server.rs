use crate::app::ports::RateLimiterPort;
use crate::app::reconcile::CategoryMatch;
use crate::app::{
    ActionContext, ActionResponse, ItemLifecycle, ProjectQueries, ProjectReconciler,
    RankingReorderer,
};
use crate::domain::{ItemForm, ProjectForm, RankingPosition};
use crate::error::{ActionError, ActionResult};
use crate::infra::{RequestSession, USER_ID_HEADER};
use crate::storage::Storage;
use axum::{
    extract::rejection::{JsonRejection, PathRejection},
    extract::Path,
    http::{HeaderMap, Method, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Extension, Router,
};
use hyper::Server;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;
use uuid::Uuid;

/// Process-wide handles; the session is resolved per request.
#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<dyn Storage>,
    pub rate_limiter: Arc<dyn RateLimiterPort>,
    pub category_match: CategoryMatch,
}

fn session(headers: &HeaderMap) -> RequestSession {
    RequestSession::from_header(headers.get(USER_ID_HEADER).and_then(|v| v.to_str().ok()))
}

impl AppState {
    fn context(&self, headers: &HeaderMap) -> ActionContext {
        ActionContext::new(
            self.storage.clone(),
            Arc::new(session(headers)),
            self.rate_limiter.clone(),
        )
        .with_category_match(self.category_match)
    }

    // Requests that fail to parse still answer anonymous callers with 401.
    fn rejected(&self, headers: &HeaderMap, error: ActionError) -> ActionError {
        if session(headers).is_anonymous() {
            ActionError::Unauthorized
        } else {
            error
        }
    }

    /// A malformed id names nothing, so it reads as not found.
    fn path_id(
        &self,
        headers: &HeaderMap,
        id: Result<Path<Uuid>, PathRejection>,
        resource: &str,
    ) -> ActionResult<Uuid> {
        id.map(|Path(id)| id)
            .map_err(|_| self.rejected(headers, ActionError::NotFound(resource.to_string())))
    }

    fn body<T>(&self, headers: &HeaderMap, body: Result<Json<T>, JsonRejection>) -> ActionResult<T> {
        body.map(|Json(value)| value)
            .map_err(|e| self.rejected(headers, ActionError::Validation(e.body_text())))
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateProjectRequest {
    pub id: Uuid,
    #[serde(flatten)]
    pub form: ProjectForm,
}

#[derive(Debug, Deserialize)]
pub struct UpdateItemRequest {
    pub id: Uuid,
    #[serde(flatten)]
    pub form: ItemForm,
}

#[derive(Debug, Deserialize)]
pub struct IdRequest {
    pub id: Uuid,
}

fn status_for(error: &ActionError) -> StatusCode {
    match error {
        ActionError::Unauthorized => StatusCode::UNAUTHORIZED,
        ActionError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        ActionError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        ActionError::NotFound(_) => StatusCode::NOT_FOUND,
        ActionError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn respond<T: Serialize>(result: ActionResult<T>) -> Response {
    let status = match &result {
        Ok(_) => StatusCode::OK,
        Err(e) => status_for(e),
    };
    (status, Json(ActionResponse::from(result))).into_response()
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "ranklist",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn list_projects(Extension(state): Extension<AppState>, headers: HeaderMap) -> Response {
    respond(ProjectQueries::new(state.context(&headers)).list_projects().await)
}

async fn get_project(
    Extension(state): Extension<AppState>,
    headers: HeaderMap,
    id: Result<Path<Uuid>, PathRejection>,
) -> Response {
    let result = match state.path_id(&headers, id, "Project") {
        Ok(id) => ProjectQueries::new(state.context(&headers)).get_project(id).await,
        Err(e) => Err(e),
    };
    respond(result)
}

async fn get_item(
    Extension(state): Extension<AppState>,
    headers: HeaderMap,
    id: Result<Path<Uuid>, PathRejection>,
) -> Response {
    let result = match state.path_id(&headers, id, "Item") {
        Ok(id) => ProjectQueries::new(state.context(&headers)).get_item(id).await,
        Err(e) => Err(e),
    };
    respond(result)
}

async fn get_category_rankings(
    Extension(state): Extension<AppState>,
    headers: HeaderMap,
    id: Result<Path<Uuid>, PathRejection>,
) -> Response {
    let result = match state.path_id(&headers, id, "Category") {
        Ok(id) => {
            ProjectQueries::new(state.context(&headers))
                .get_category_rankings(id)
                .await
        }
        Err(e) => Err(e),
    };
    respond(result)
}

async fn create_project(
    Extension(state): Extension<AppState>,
    headers: HeaderMap,
    body: Result<Json<ProjectForm>, JsonRejection>,
) -> Response {
    let result = match state.body(&headers, body) {
        Ok(form) => {
            ProjectReconciler::new(state.context(&headers))
                .create_project(&form)
                .await
        }
        Err(e) => Err(e),
    };
    respond(result)
}

async fn update_project(
    Extension(state): Extension<AppState>,
    headers: HeaderMap,
    body: Result<Json<UpdateProjectRequest>, JsonRejection>,
) -> Response {
    let result = match state.body(&headers, body) {
        Ok(req) => {
            ProjectReconciler::new(state.context(&headers))
                .update_project(req.id, &req.form)
                .await
        }
        Err(e) => Err(e),
    };
    respond(result)
}

async fn delete_project(
    Extension(state): Extension<AppState>,
    headers: HeaderMap,
    body: Result<Json<IdRequest>, JsonRejection>,
) -> Response {
    let result = match state.body(&headers, body) {
        Ok(req) => {
            ProjectReconciler::new(state.context(&headers))
                .delete_project(req.id)
                .await
        }
        Err(e) => Err(e),
    };
    respond(result)
}

async fn create_item(
    Extension(state): Extension<AppState>,
    headers: HeaderMap,
    body: Result<Json<ItemForm>, JsonRejection>,
) -> Response {
    let result = match state.body(&headers, body) {
        Ok(form) => ItemLifecycle::new(state.context(&headers)).create_item(&form).await,
        Err(e) => Err(e),
    };
    respond(result)
}

async fn update_item(
    Extension(state): Extension<AppState>,
    headers: HeaderMap,
    body: Result<Json<UpdateItemRequest>, JsonRejection>,
) -> Response {
    let result = match state.body(&headers, body) {
        Ok(req) => {
            ItemLifecycle::new(state.context(&headers))
                .update_item(req.id, &req.form)
                .await
        }
        Err(e) => Err(e),
    };
    respond(result)
}

async fn delete_item(
    Extension(state): Extension<AppState>,
    headers: HeaderMap,
    body: Result<Json<IdRequest>, JsonRejection>,
) -> Response {
    let result = match state.body(&headers, body) {
        Ok(req) => ItemLifecycle::new(state.context(&headers)).delete_item(req.id).await,
        Err(e) => Err(e),
    };
    respond(result)
}

async fn reorder_items(
    Extension(state): Extension<AppState>,
    headers: HeaderMap,
    body: Result<Json<Vec<RankingPosition>>, JsonRejection>,
) -> Response {
    let result = match state.body(&headers, body) {
        Ok(positions) => {
            RankingReorderer::new(state.context(&headers))
                .reorder_items(&positions)
                .await
        }
        Err(e) => Err(e),
    };
    respond(result)
}

/// Build the router: read queries under `/api`, mutating actions under `/api/actions`.
pub fn create_server(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/api/projects", get(list_projects))
        .route("/api/projects/:id", get(get_project))
        .route("/api/items/:id", get(get_item))
        .route("/api/categories/:id/rankings", get(get_category_rankings))
        .route("/api/actions/create-project", post(create_project))
        .route("/api/actions/update-project", post(update_project))
        .route("/api/actions/delete-project", post(delete_project))
        .route("/api/actions/create-item", post(create_item))
        .route("/api/actions/update-item", post(update_item))
        .route("/api/actions/delete-item", post(delete_item))
        .route("/api/actions/reorder-items", post(reorder_items))
        .layer(Extension(state))
        .layer(ServiceBuilder::new().layer(cors))
}

/// Start the HTTP server on the specified port
pub async fn start_server(state: AppState, port: u16) -> anyhow::Result<()> {
    let app = create_server(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    info!("HTTP server running on http://localhost:{}", port);
    info!("Health check: http://localhost:{}/health", port);

    Server::bind(&addr).serve(app.into_make_service()).await?;
    Ok(())
}
