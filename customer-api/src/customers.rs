use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use tracing::error;

use crate::api::{ApiError, BulkResponse};
use crate::customer::{Customer, CustomerBulkCreate, CustomerCreate, CustomerUpdate, ListQuery};
use crate::event::CustomerEvent;
use crate::router;
use crate::sinks::EventSink;

/// Best-effort publish hook: a sink failure is logged and swallowed, the
/// request outcome is already decided by the time we get here.
async fn publish_mutation(
    sink: &Arc<dyn EventSink + Send + Sync>,
    event: CustomerEvent,
    operation: &str,
) {
    if let Err(e) = sink.send(event).await {
        error!("failed to publish customer {} event: {}", operation, e);
    }
}

pub async fn create_customer(
    state: State<router::State>,
    Json(customer): Json<CustomerCreate>,
) -> Result<Json<Customer>, ApiError> {
    let created = state.store.insert(&customer).await?;

    publish_mutation(&state.sink, CustomerEvent::created(&created), "create").await;

    Ok(Json(created))
}

pub async fn read_customers(
    state: State<router::State>,
    query: Query<ListQuery>,
) -> Result<Json<Vec<Customer>>, ApiError> {
    let customers = state.store.list(query.skip, query.limit).await?;

    Ok(Json(customers))
}

pub async fn read_customer(
    state: State<router::State>,
    Path(customer_id): Path<i64>,
) -> Result<Json<Customer>, ApiError> {
    let customer = state.store.get(customer_id).await?;

    Ok(Json(customer))
}

pub async fn update_customer(
    state: State<router::State>,
    Path(customer_id): Path<i64>,
    Json(changes): Json<CustomerUpdate>,
) -> Result<Json<Customer>, ApiError> {
    let updated = state.store.update(customer_id, &changes).await?;

    publish_mutation(&state.sink, CustomerEvent::updated(&updated), "update").await;

    Ok(Json(updated))
}

pub async fn delete_customer(
    state: State<router::State>,
    Path(customer_id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.store.delete(customer_id).await?;

    // Published only once the row is gone, so a failed delete cannot leave
    // a phantom deletion event behind.
    publish_mutation(&state.sink, CustomerEvent::deleted(customer_id), "delete").await;

    Ok(StatusCode::NO_CONTENT)
}

/// Bulk path: no events are published, distinct from the single-record
/// endpoints.
pub async fn bulk_insert_customers(
    state: State<router::State>,
    Json(payload): Json<CustomerBulkCreate>,
) -> Result<Json<BulkResponse>, ApiError> {
    let response = state.store.bulk_insert(&payload.customers).await?;

    Ok(Json(response))
}
