use std::sync::Arc;

use axum::extract::Request;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::trace::TraceLayer;

use crate::api::ApiError;
use crate::customers;
use crate::prometheus;
use crate::sinks::EventSink;
use crate::store::CustomerStore;
use crate::token::validate_token;

#[derive(Clone)]
pub struct State {
    pub store: CustomerStore,
    pub sink: Arc<dyn EventSink + Send + Sync>,
    pub api_token: Arc<String>,
}

async fn index() -> &'static str {
    "customer-api"
}

/// Every /customers route sits behind this. The token is compared before
/// any handler runs, so unauthenticated requests never touch the store.
async fn require_api_token(
    axum::extract::State(state): axum::extract::State<State>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = request
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or(ApiError::NoTokenError)?;

    validate_token(token, &state.api_token)?;

    Ok(next.run(request).await)
}

pub fn router<S: EventSink + Send + Sync + 'static>(
    store: CustomerStore,
    sink: S,
    api_token: String,
    metrics: Option<PrometheusHandle>,
) -> Router {
    let state = State {
        store,
        sink: Arc::new(sink),
        api_token: Arc::new(api_token),
    };

    let customers = Router::new()
        .route(
            "/",
            post(customers::create_customer).get(customers::read_customers),
        )
        .route("/bulk-postgres", post(customers::bulk_insert_customers))
        .route(
            "/:customer_id",
            get(customers::read_customer)
                .put(customers::update_customer)
                .delete(customers::delete_customer),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            require_api_token,
        ));

    Router::new()
        .route("/", get(index))
        .route(
            "/metrics",
            get(move || match metrics {
                Some(ref recorder_handle) => std::future::ready(recorder_handle.render()),
                None => std::future::ready("no metrics recorder installed".to_owned()),
            }),
        )
        .nest("/customers", customers)
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(prometheus::track_metrics))
        .with_state(state)
}
