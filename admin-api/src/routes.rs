//! HTTP surface of the render service, documented with OpenAPI.

use crate::config::AdminConfig;
use crate::error::{AdminError, JsonError};
use crate::render::{RenderRequest, RenderRoute, Renderer, Submission};
use crate::templates::{list_templates, read_render_page, read_template};
use axum::{
    body::Bytes,
    extract::{ConnectInfo, Query, State},
    http::{header, HeaderMap},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::{IntoParams, OpenApi, ToSchema};
use utoipa_swagger_ui::{Config, SwaggerUi};

pub const OPENAPI_JSON_PATH: &str = "/openapi/openapi.json";

/// Shared state for the render service handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AdminConfig>,
    pub renderer: Arc<Renderer>,
}

impl AppState {
    pub fn new(config: AdminConfig) -> Result<Self, AdminError> {
        let renderer = Renderer::new(&config)?;
        Ok(Self {
            config: Arc::new(config),
            renderer: Arc::new(renderer),
        })
    }
}

/// OpenAPI documentation for the render service
#[derive(OpenApi)]
#[openapi(
    paths(
        admin_handler,
        status_handler,
        templates_list_handler,
        templates_get_handler,
        render_page_handler,
        render_handler,
        render_json_handler,
    ),
    components(
        schemas(AdminInfo, ServiceStatus, TemplateList, RenderRequest, RenderedJson, ErrorBody)
    ),
    tags(
        (name = "Admin", description = "Administrative endpoints"),
        (name = "Templates", description = "Template management and rendering")
    ),
    servers((url = "http://localhost:9000")),
    info(
        title = "Endpoints",
        version = "1.0.0",
        description = "This service was left in a development state; internal endpoints may be exposed. Accessible only via the training environment; do not use in production."
    )
)]
pub struct ApiDoc;

#[derive(Serialize, Deserialize, ToSchema)]
pub struct AdminInfo {
    pub service: String,
    pub version: String,
    pub notes: String,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct ServiceStatus {
    pub ok: bool,
    pub component: String,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct TemplateList {
    pub templates: Vec<String>,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct RenderedJson {
    pub rendered_html: String,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Deserialize, IntoParams)]
pub struct TemplateQuery {
    /// Template filename to fetch
    pub name: Option<String>,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/admin", get(admin_handler))
        .route("/status", get(status_handler))
        .route("/templates/list", get(templates_list_handler))
        .route("/templates/get", get(templates_get_handler))
        .route("/render", get(render_page_handler).post(render_handler))
        .route("/render/json", post(render_json_handler))
        .route(OPENAPI_JSON_PATH, get(openapi_json_handler))
        .merge(SwaggerUi::new("/openapi/swagger").config(Config::from(OPENAPI_JSON_PATH)))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn openapi_json_handler() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

fn client_ip(connect_info: Option<ConnectInfo<SocketAddr>>) -> String {
    connect_info
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn content_type(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
}

#[utoipa::path(
    get,
    path = "/admin",
    tag = "Admin",
    responses(
        (status = 200, description = "Admin service metadata", body = AdminInfo)
    )
)]
async fn admin_handler() -> Json<AdminInfo> {
    Json(AdminInfo {
        service: "admin".to_string(),
        version: "1.0.0".to_string(),
        notes: "Those who look beyond the surface might find hidden paths. Try Harder"
            .to_string(),
    })
}

#[utoipa::path(
    get,
    path = "/status",
    tag = "Admin",
    responses(
        (status = 200, description = "Service health", body = ServiceStatus)
    )
)]
async fn status_handler() -> Json<ServiceStatus> {
    Json(ServiceStatus {
        ok: true,
        component: "admin-api".to_string(),
    })
}

#[utoipa::path(
    get,
    path = "/templates/list",
    tag = "Templates",
    responses(
        (status = 200, description = "List of templates", body = TemplateList)
    )
)]
async fn templates_list_handler(State(state): State<AppState>) -> Json<TemplateList> {
    Json(TemplateList {
        templates: list_templates(&state.config.templates_dir).await,
    })
}

#[utoipa::path(
    get,
    path = "/templates/get",
    tag = "Templates",
    responses(
        (status = 200, description = "Template content", content_type = "text/plain", body = String),
        (status = 400, description = "Missing name", body = ErrorBody),
        (status = 404, description = "Not found", body = ErrorBody)
    )
)]
async fn templates_get_handler(
    State(state): State<AppState>,
    Query(query): Query<TemplateQuery>,
) -> Result<Response, JsonError> {
    let name = query
        .name
        .filter(|n| !n.is_empty())
        .ok_or_else(|| AdminError::BadRequest("missing 'name' parameter".to_string()))?;

    let content = read_template(&state.config.templates_dir, &name).await?;
    Ok(([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], content).into_response())
}

#[utoipa::path(
    get,
    path = "/render",
    tag = "Templates",
    responses(
        (status = 200, description = "Render page HTML", content_type = "text/html", body = String),
        (status = 500, description = "Operator error")
    )
)]
async fn render_page_handler(State(state): State<AppState>) -> Result<Html<String>, AdminError> {
    read_render_page(&state.config.render_page()).await.map(Html)
}

#[utoipa::path(
    post,
    path = "/render",
    tag = "Templates",
    request_body(
        content = RenderRequest,
        description = "Template text as a form, JSON object or raw body",
        content_type = "application/x-www-form-urlencoded"
    ),
    responses(
        (status = 200, description = "Rendered HTML preview", content_type = "text/html", body = String),
        (status = 400, description = "Template error"),
        (status = 413, description = "Template too large")
    )
)]
async fn render_handler(
    State(state): State<AppState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Html<String>, AdminError> {
    let request = RenderRequest::from_body(content_type(&headers), &body);
    let submission = Submission::new(request, client_ip(connect_info));

    let outcome = state.renderer.render(submission, RenderRoute::Html).await?;

    let mut rendered = outcome.rendered;
    if outcome.flag_observed {
        rendered.push_str("\n\n-- Fake flag observed by server --");
    }

    Ok(Html(preview_page(&rendered)))
}

#[utoipa::path(
    post,
    path = "/render/json",
    tag = "Templates",
    request_body(content = RenderRequest, content_type = "application/json"),
    responses(
        (status = 200, description = "Rendered HTML wrapped in JSON", body = RenderedJson),
        (status = 400, description = "Template error", body = ErrorBody),
        (status = 413, description = "Template too large", body = ErrorBody)
    )
)]
async fn render_json_handler(
    State(state): State<AppState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<RenderedJson>, JsonError> {
    let request = RenderRequest::from_body(content_type(&headers), &body);
    let submission = Submission::new(request, client_ip(connect_info));

    let outcome = state.renderer.render(submission, RenderRoute::Json).await?;

    Ok(Json(RenderedJson {
        rendered_html: outcome.rendered,
    }))
}

/// Rendered output is inserted verbatim.
fn preview_page(rendered: &str) -> String {
    format!(
        r#"<!doctype html><html><head><meta charset="utf-8"><title>Rendered Preview</title></head><body>
<h2>Rendered output</h2>
<div style="padding:12px;border:1px solid #ddd;background:#fff">{}</div>
<hr>
<p><a href="/render">Back to template preview</a></p>
</body></html>
"#,
        rendered
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_document_lists_routes() {
        let doc = ApiDoc::openapi();
        let json = serde_json::to_value(&doc).unwrap();
        let paths = json["paths"].as_object().unwrap();
        for path in ["/admin", "/status", "/templates/list", "/templates/get", "/render", "/render/json"] {
            assert!(paths.contains_key(path), "missing {path}");
        }
        assert_eq!(json["servers"][0]["url"], "http://localhost:9000");
    }

    #[test]
    fn test_preview_page_inserts_raw_output() {
        let page = preview_page("<script>x</script>");
        assert!(page.contains("<div style=\"padding:12px;border:1px solid #ddd;background:#fff\"><script>x</script></div>"));
    }
}
