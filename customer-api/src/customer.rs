use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_derive::Deserialize;

/// A customer row, as stored. `customer_id` and `created_at` are generated
/// by the database and immutable afterwards.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, sqlx::FromRow)]
pub struct Customer {
    pub customer_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// The body of a request to create one customer. Also the per-item shape of
/// the bulk insert payload.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CustomerCreate {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
}

/// Partial update: only fields present in the body overwrite the stored row.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct CustomerUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct CustomerBulkCreate {
    pub customers: Vec<CustomerCreate>,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub skip: i64,

    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    100
}
