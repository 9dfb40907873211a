//! HTTP surface of the gateway

use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::feedback::{FeedbackForm, FeedbackLog};
use crate::fetch::{Fetched, Forwarder, Outbound, DEFAULT_CONTENT_TYPE};
use crate::gallery::GalleryPage;
use crate::policy::{FetchPolicy, TargetRules};
use crate::resolver::{HostResolver, SystemResolver};
use crate::rewrite::HtmlRewriter;
use axum::{
    body::Bytes,
    extract::{ConnectInfo, OriginalUri, RawQuery, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode},
    middleware,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use ctf_common::Journal;
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

pub const X_PROXY_STATUS: HeaderName = HeaderName::from_static("x-proxy-status");
pub const X_PROXY_ORIGINAL_URL: HeaderName = HeaderName::from_static("x-proxy-original-url");
pub const X_PROXY_FINAL_URL: HeaderName = HeaderName::from_static("x-proxy-final-url");
pub const X_PROXY_REQUEST_ID: HeaderName = HeaderName::from_static("x-proxy-request-id");

const STATUS_NOTE: &str =
    "Image gallery uses server-side fetching; internal services are reachable only from the server.";

/// Shared state for the gateway handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    rules: Arc<TargetRules>,
    policy: Arc<FetchPolicy>,
    resolver: Arc<dyn HostResolver>,
    forwarder: Forwarder,
    rewriter: Arc<HtmlRewriter>,
    gallery: Arc<GalleryPage>,
    feedback: Arc<FeedbackLog>,
}

impl AppState {
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        Self::with_resolver(config, Arc::new(SystemResolver))
    }

    pub fn with_resolver(
        config: GatewayConfig,
        resolver: Arc<dyn HostResolver>,
    ) -> Result<Self, GatewayError> {
        Ok(Self {
            rules: Arc::new(TargetRules::from_config(&config)?),
            policy: Arc::new(FetchPolicy::from_config(&config)),
            resolver,
            forwarder: Forwarder::new(&config)?,
            rewriter: Arc::new(HtmlRewriter::new()?),
            gallery: Arc::new(GalleryPage::new()?),
            feedback: Arc::new(FeedbackLog::new(Journal::new(&config.feedback_log))),
            config: Arc::new(config),
        })
    }
}

#[derive(Serialize)]
struct ServiceStatus {
    service: &'static str,
    note: &'static str,
}

pub fn build_router(state: AppState) -> Router {
    let fetch_routes = Router::new()
        .route(
            "/fetch",
            get(fetch_handler).post(fetch_handler).options(preflight_handler),
        )
        .route(
            "/fetch/*subpath",
            get(fetch_subpath_handler)
                .post(fetch_subpath_handler)
                .options(preflight_handler),
        )
        .layer(middleware::map_response(cors_headers));

    Router::new()
        .route("/", get(index_handler))
        .route("/status", get(status_handler))
        .route("/feedback", post(feedback_handler))
        .merge(fetch_routes)
        .nest_service("/static/thumbs", ServeDir::new(&state.config.thumbs_dir))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn client_ip(connect_info: Option<ConnectInfo<SocketAddr>>) -> String {
    connect_info
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

async fn index_handler(State(state): State<AppState>) -> Result<Html<String>, GatewayError> {
    state.gallery.render_shuffled().map(Html)
}

async fn status_handler() -> Json<ServiceStatus> {
    Json(ServiceStatus {
        service: "public-app",
        note: STATUS_NOTE,
    })
}

async fn feedback_handler(
    State(state): State<AppState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    Form(form): Form<FeedbackForm>,
) -> Result<Html<&'static str>, GatewayError> {
    state.feedback.record(form, &client_ip(connect_info)).await?;
    Ok(Html(
        "<!doctype html><html><body><p>Thanks for your feedback!</p><p><a href=\"/\">Back to the gallery</a></p></body></html>",
    ))
}

/// CORS headers for every `/fetch` response, including errors
async fn cors_headers(mut response: Response) -> Response {
    let headers = response.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type"),
    );
    response
}

async fn preflight_handler() -> Response {
    (
        StatusCode::NO_CONTENT,
        [(X_PROXY_STATUS, HeaderValue::from_static("preflight"))],
    )
        .into_response()
}

fn url_param(query: Option<&str>) -> Option<String> {
    url::form_urlencoded::parse(query.unwrap_or_default().as_bytes())
        .find(|(key, _)| key == "url")
        .map(|(_, value)| value.into_owned())
}

fn outbound(method: &Method, headers: &HeaderMap, body: Bytes) -> Outbound {
    let header_text = |name: header::HeaderName| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };

    Outbound {
        body: (method == Method::POST).then_some(body),
        content_type: header_text(header::CONTENT_TYPE),
        accept: header_text(header::ACCEPT),
    }
}

async fn fetch_handler(
    State(state): State<AppState>,
    method: Method,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let raw = url_param(query.as_deref()).unwrap_or_default();
    let target = state.rules.from_query(&raw);
    proxy(&state, target, raw, outbound(&method, &headers, body)).await
}

/// The sub-path is taken from the raw request path so that percent-escapes
/// such as `%2F` and `%3F` reach the internal host unchanged.
async fn fetch_subpath_handler(
    State(state): State<AppState>,
    method: Method,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let subpath = uri.path().strip_prefix("/fetch/").unwrap_or_default();
    let target = state.rules.from_subpath(subpath, uri.query());
    let original = uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| uri.path().to_string());
    proxy(&state, target, original, outbound(&method, &headers, body)).await
}

async fn proxy(
    state: &AppState,
    target: Result<Url, GatewayError>,
    original: String,
    outbound: Outbound,
) -> Response {
    let request_id = Uuid::new_v4().to_string();

    let result = async {
        let url = target?;
        let verdict = state.policy.check(&url, state.resolver.as_ref()).await?;
        debug!(request_id = %request_id, target_url = %url, ?verdict, "Fetch permitted");
        let fetched = state.forwarder.forward(&url, outbound).await?;
        Ok::<_, GatewayError>((url, fetched))
    }
    .await;

    match result {
        Ok((url, fetched)) => proxied_response(state, &url, fetched, &original, &request_id),
        Err(err) => {
            match &err {
                GatewayError::Blocked { host } => {
                    info!(request_id = %request_id, host = %host, "Fetch rejected")
                }
                GatewayError::Upstream(reason) => {
                    warn!(request_id = %request_id, "Upstream failure: {}", reason)
                }
                other => debug!(request_id = %request_id, "Fetch refused: {}", other),
            }
            let status = HeaderValue::from_static(err.proxy_status());
            let mut response = err.into_response();
            response.headers_mut().insert(X_PROXY_STATUS, status);
            response
        }
    }
}

fn proxied_response(
    state: &AppState,
    url: &Url,
    fetched: Fetched,
    original: &str,
    request_id: &str,
) -> Response {
    let body = if fetched.is_html() {
        // Relative links resolve against where redirects ended up.
        let base = Url::parse(&fetched.final_url).unwrap_or_else(|_| url.clone());
        let text = String::from_utf8_lossy(&fetched.body);
        Bytes::from(state.rewriter.rewrite(&text, &base))
    } else {
        fetched.body
    };

    let mut response = (fetched.status, body).into_response();
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&fetched.content_type)
            .unwrap_or_else(|_| HeaderValue::from_static(DEFAULT_CONTENT_TYPE)),
    );
    headers.insert(X_PROXY_STATUS, HeaderValue::from_static("proxied"));
    for (name, value) in [
        (X_PROXY_ORIGINAL_URL, original),
        (X_PROXY_FINAL_URL, fetched.final_url.as_str()),
        (X_PROXY_REQUEST_ID, request_id),
    ] {
        match HeaderValue::from_str(value) {
            Ok(value) => {
                headers.insert(name, value);
            }
            Err(_) => debug!("Skipping unrepresentable {} header", name),
        }
    }

    response
}
