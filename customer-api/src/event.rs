use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

use crate::customer::Customer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Update,
    Delete,
}

/// A customer mutation, as published to the downstream topic.
///
/// Create events carry no `operation` tag and delete events carry only the
/// id, so the three shapes are kept as distinct variants serialized without
/// an envelope.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum CustomerEvent {
    Created {
        customer_id: i64,
        first_name: String,
        last_name: String,
        email: String,
        phone: Option<String>,
        #[serde(serialize_with = "serialize_datetime")]
        created_at: DateTime<Utc>,
    },
    Updated {
        customer_id: i64,
        first_name: String,
        last_name: String,
        email: String,
        phone: Option<String>,
        #[serde(serialize_with = "serialize_datetime")]
        created_at: DateTime<Utc>,
        #[serde(serialize_with = "serialize_operation")]
        operation: Operation,
    },
    Deleted {
        customer_id: i64,
        #[serde(serialize_with = "serialize_operation")]
        operation: Operation,
    },
}

impl CustomerEvent {
    pub fn created(customer: &Customer) -> Self {
        Self::Created {
            customer_id: customer.customer_id,
            first_name: customer.first_name.clone(),
            last_name: customer.last_name.clone(),
            email: customer.email.clone(),
            phone: customer.phone.clone(),
            created_at: customer.created_at,
        }
    }

    pub fn updated(customer: &Customer) -> Self {
        Self::Updated {
            customer_id: customer.customer_id,
            first_name: customer.first_name.clone(),
            last_name: customer.last_name.clone(),
            email: customer.email.clone(),
            phone: customer.phone.clone(),
            created_at: customer.created_at,
            operation: Operation::Update,
        }
    }

    pub fn deleted(customer_id: i64) -> Self {
        Self::Deleted {
            customer_id,
            operation: Operation::Delete,
        }
    }

    /// Partition key: all events for one customer stay on one partition.
    pub fn key(&self) -> String {
        match self {
            Self::Created { customer_id, .. }
            | Self::Updated { customer_id, .. }
            | Self::Deleted { customer_id, .. } => customer_id.to_string(),
        }
    }
}

fn serialize_datetime<S>(timestamp: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&timestamp.to_rfc3339())
}

fn serialize_operation<S>(operation: &Operation, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let operation_str = match operation {
        Operation::Update => "update",
        Operation::Delete => "delete",
    };
    serializer.serialize_str(operation_str)
}
