use axum::{
    extract::{Request, State},
    http::{header, HeaderName, HeaderValue, Method},
    middleware::Next,
    response::Response,
};
use std::time::Duration;
use tower::{
    layer::util::{Identity, Stack},
    ServiceBuilder,
};
use tower_http::{
    classify::{ServerErrorsAsFailures, SharedClassifier},
    set_header::SetResponseHeaderLayer,
    timeout::TimeoutLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::{error::ApiError, state::AppState};

pub const ALLOWED_METHODS: &str = "GET, POST, OPTIONS";

type HeaderLayer = SetResponseHeaderLayer<HeaderValue>;

type HttpTraceLayer = TraceLayer<
    SharedClassifier<ServerErrorsAsFailures>,
    DefaultMakeSpan,
    DefaultOnRequest,
    DefaultOnResponse,
>;

pub type MiddlewareStack = ServiceBuilder<
    Stack<
        TimeoutLayer,
        Stack<HeaderLayer, Stack<HeaderLayer, Stack<HeaderLayer, Stack<HttpTraceLayer, Identity>>>>,
    >,
>;

/// Creates the complete middleware stack for the application.
/// `api_key_header` is advertised in `Access-Control-Allow-Headers` when set.
pub fn create_middleware_stack(
    api_key_header: Option<&HeaderName>,
    request_timeout: Duration,
) -> MiddlewareStack {
    let [allow_origin, allow_methods, allow_headers] = cors_layers(api_key_header);

    ServiceBuilder::new()
        // Request/response logging with tracing
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        // CORS headers on every response, preflight or not
        .layer(allow_origin)
        .layer(allow_methods)
        .layer(allow_headers)
        .layer(TimeoutLayer::new(request_timeout))
}

/// Value of `Access-Control-Allow-Headers`
pub fn allowed_headers(api_key_header: Option<&HeaderName>) -> String {
    match api_key_header {
        Some(name) => format!("Content-Type, {}", name.as_str()),
        None => "Content-Type".to_string(),
    }
}

fn cors_layers(api_key_header: Option<&HeaderName>) -> [HeaderLayer; 3] {
    // Header names are validated at config time, so the joined list is valid ASCII
    let allow_headers = HeaderValue::from_str(&allowed_headers(api_key_header))
        .unwrap_or_else(|_| HeaderValue::from_static("Content-Type"));

    [
        SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        ),
        SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(ALLOWED_METHODS),
        ),
        SetResponseHeaderLayer::overriding(header::ACCESS_CONTROL_ALLOW_HEADERS, allow_headers),
    ]
}

/// Runs the access gate before the posts handlers.
/// Preflight requests skip it entirely.
pub async fn require_api_key(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if request.method() == Method::OPTIONS {
        return Ok(next.run(request).await);
    }

    let access = state.gate.check(request.headers()).await?;
    request.extensions_mut().insert(access);

    Ok(next.run(request).await)
}

/// Initialize structured logging with JSON format
pub fn init_tracing() -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(true)
                .with_target(true)
                .with_thread_ids(true)
                .with_thread_names(true),
        )
        .try_init()?;

    tracing::info!("Structured logging initialized with JSON format");
    Ok(())
}
