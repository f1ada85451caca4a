use std::collections::HashSet;

use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::api::{ApiError, BulkResponse};
use crate::customer::{Customer, CustomerCreate, CustomerUpdate};

/// All access to the `customers` table. Each method runs against its own
/// connection from the pool; only the bulk path opens an explicit
/// transaction.
#[derive(Clone)]
pub struct CustomerStore {
    pool: PgPool,
}

impl CustomerStore {
    pub fn new(database_url: &str, max_connections: u32) -> Result<Self, ApiError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect_lazy(database_url)
            .map_err(|error| ApiError::PoolCreationError { error })?;

        Ok(Self { pool })
    }

    /// Build a store on top of an existing pool. Used by tests.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, customer: &CustomerCreate) -> Result<Customer, ApiError> {
        sqlx::query_as(
            r#"
INSERT INTO customers (first_name, last_name, email, phone)
VALUES ($1, $2, $3, $4)
RETURNING *
            "#,
        )
        .bind(&customer.first_name)
        .bind(&customer.last_name)
        .bind(&customer.email)
        .bind(&customer.phone)
        .fetch_one(&self.pool)
        .await
        .map_err(|error| ApiError::QueryError {
            command: "INSERT".to_owned(),
            error,
        })
    }

    pub async fn list(&self, skip: i64, limit: i64) -> Result<Vec<Customer>, ApiError> {
        sqlx::query_as(
            r#"
SELECT *
FROM customers
ORDER BY customer_id
OFFSET $1
LIMIT $2
            "#,
        )
        .bind(skip)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| ApiError::QueryError {
            command: "SELECT".to_owned(),
            error,
        })
    }

    pub async fn get(&self, customer_id: i64) -> Result<Customer, ApiError> {
        sqlx::query_as("SELECT * FROM customers WHERE customer_id = $1")
            .bind(customer_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|error| ApiError::QueryError {
                command: "SELECT".to_owned(),
                error,
            })?
            .ok_or(ApiError::CustomerNotFound(customer_id))
    }

    /// Read-modify-write: fields absent from `changes` keep their stored
    /// values. A `phone` of None leaves the stored phone in place, it does
    /// not clear it.
    pub async fn update(
        &self,
        customer_id: i64,
        changes: &CustomerUpdate,
    ) -> Result<Customer, ApiError> {
        let current = self.get(customer_id).await?;

        let first_name = changes.first_name.clone().unwrap_or(current.first_name);
        let last_name = changes.last_name.clone().unwrap_or(current.last_name);
        let email = changes.email.clone().unwrap_or(current.email);
        let phone = changes.phone.clone().or(current.phone);

        sqlx::query_as(
            r#"
UPDATE customers
SET first_name = $1, last_name = $2, email = $3, phone = $4
WHERE customer_id = $5
RETURNING *
            "#,
        )
        .bind(first_name)
        .bind(last_name)
        .bind(email)
        .bind(phone)
        .bind(customer_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|error| ApiError::QueryError {
            command: "UPDATE".to_owned(),
            error,
        })
    }

    pub async fn delete(&self, customer_id: i64) -> Result<(), ApiError> {
        let result = sqlx::query("DELETE FROM customers WHERE customer_id = $1")
            .bind(customer_id)
            .execute(&self.pool)
            .await
            .map_err(|error| ApiError::QueryError {
                command: "DELETE".to_owned(),
                error,
            })?;

        if result.rows_affected() == 0 {
            return Err(ApiError::CustomerNotFound(customer_id));
        }

        Ok(())
    }

    /// Two-phase bulk insert.
    ///
    /// Phase 1 snapshots every stored email once and filters the candidates
    /// in list order: a duplicate against the snapshot or an earlier
    /// candidate is skipped with a per-item error. Phase 2 inserts the
    /// staged rows in a single transaction; any database failure there
    /// (e.g. a uniqueness violation from a concurrent writer) rolls back
    /// the whole batch and is reported as one generic error.
    pub async fn bulk_insert(&self, candidates: &[CustomerCreate]) -> Result<BulkResponse, ApiError> {
        let existing: Vec<String> = sqlx::query_scalar("SELECT email FROM customers")
            .fetch_all(&self.pool)
            .await
            .map_err(|error| ApiError::QueryError {
                command: "SELECT".to_owned(),
                error,
            })?;
        let mut seen: HashSet<String> = existing.into_iter().collect();

        let mut errors = Vec::new();
        let mut staged = Vec::new();
        for candidate in candidates {
            if seen.contains(&candidate.email) {
                errors.push(format!("Email already exists: {}", candidate.email));
                continue;
            }

            seen.insert(candidate.email.clone());
            staged.push(candidate);
        }

        if !staged.is_empty() {
            if let Err(error) = self.insert_batch(&staged).await {
                // The staged rows are discarded together; the per-item skip
                // errors no longer describe what happened.
                return Ok(BulkResponse {
                    success_count: 0,
                    error_count: 1,
                    errors: Some(vec![describe_batch_failure(&error)]),
                });
            }
        }

        Ok(BulkResponse {
            success_count: staged.len(),
            error_count: errors.len(),
            errors: if errors.is_empty() { None } else { Some(errors) },
        })
    }

    async fn insert_batch(&self, staged: &[&CustomerCreate]) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        for customer in staged {
            sqlx::query(
                "INSERT INTO customers (first_name, last_name, email, phone) VALUES ($1, $2, $3, $4)",
            )
            .bind(&customer.first_name)
            .bind(&customer.last_name)
            .bind(&customer.email)
            .bind(&customer.phone)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await
    }
}

fn describe_batch_failure(error: &sqlx::Error) -> String {
    match error.as_database_error() {
        Some(db_error) if matches!(db_error.kind(), sqlx::error::ErrorKind::UniqueViolation) => {
            format!("Database integrity error: {}", db_error.message())
        }
        _ => format!("Database error: {}", error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(email: &str) -> CustomerCreate {
        CustomerCreate {
            first_name: "Test".to_owned(),
            last_name: "Customer".to_owned(),
            email: email.to_owned(),
            phone: None,
        }
    }

    async fn count_customers(pool: &PgPool) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM customers")
            .fetch_one(pool)
            .await
            .expect("failed to count customers")
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn bulk_insert_skips_duplicates_within_batch(db: PgPool) {
        let store = CustomerStore::from_pool(db.clone());

        let response = store
            .bulk_insert(&[candidate("a@x.com"), candidate("a@x.com")])
            .await
            .expect("bulk insert failed");

        assert_eq!(response.success_count, 1);
        assert_eq!(response.error_count, 1);
        let errors = response.errors.expect("expected an error list");
        assert_eq!(errors, vec!["Email already exists: a@x.com".to_owned()]);
        assert_eq!(count_customers(&db).await, 1);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn bulk_insert_skips_emails_already_stored(db: PgPool) {
        let store = CustomerStore::from_pool(db.clone());
        store
            .insert(&candidate("taken@x.com"))
            .await
            .expect("seed insert failed");

        let response = store
            .bulk_insert(&[candidate("taken@x.com"), candidate("new@x.com")])
            .await
            .expect("bulk insert failed");

        assert_eq!(response.success_count, 1);
        assert_eq!(response.error_count, 1);
        let errors = response.errors.expect("expected an error list");
        assert!(errors[0].contains("taken@x.com"));
        assert_eq!(count_customers(&db).await, 2);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn bulk_insert_reports_no_errors_on_clean_batch(db: PgPool) {
        let store = CustomerStore::from_pool(db.clone());

        let response = store
            .bulk_insert(&[candidate("one@x.com"), candidate("two@x.com")])
            .await
            .expect("bulk insert failed");

        assert_eq!(response.success_count, 2);
        assert_eq!(response.error_count, 0);
        assert_eq!(response.errors, None);
        assert_eq!(count_customers(&db).await, 2);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn bulk_insert_rolls_back_whole_batch_on_database_failure(db: PgPool) {
        let store = CustomerStore::from_pool(db.clone());

        // The second row blows the email column width, a database-level
        // failure the in-memory phase cannot see. The valid first row must
        // not survive the rollback.
        let oversized = candidate(&format!("{}@x.com", "a".repeat(300)));
        let response = store
            .bulk_insert(&[candidate("valid@x.com"), oversized])
            .await
            .expect("bulk insert failed");

        assert_eq!(response.success_count, 0);
        assert_eq!(response.error_count, 1);
        let errors = response.errors.expect("expected an error list");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("Database error:"));
        assert_eq!(count_customers(&db).await, 0);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn batch_failure_reports_integrity_errors_distinctly(db: PgPool) {
        let store = CustomerStore::from_pool(db.clone());
        store
            .insert(&candidate("raced@x.com"))
            .await
            .expect("seed insert failed");

        // A concurrent writer winning the race surfaces as a uniqueness
        // violation on the staged insert, past the in-memory check.
        let error = sqlx::query(
            "INSERT INTO customers (first_name, last_name, email, phone) VALUES ($1, $2, $3, $4)",
        )
        .bind("Test")
        .bind("Customer")
        .bind("raced@x.com")
        .bind(Option::<String>::None)
        .execute(&db)
        .await
        .expect_err("expected a uniqueness violation");

        assert!(describe_batch_failure(&error).starts_with("Database integrity error:"));
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn update_changes_only_supplied_fields(db: PgPool) {
        let store = CustomerStore::from_pool(db.clone());
        let created = store
            .insert(&candidate("ada@x.com"))
            .await
            .expect("insert failed");

        let updated = store
            .update(
                created.customer_id,
                &CustomerUpdate {
                    phone: Some("555-0100".to_owned()),
                    ..Default::default()
                },
            )
            .await
            .expect("update failed");

        assert_eq!(updated.first_name, created.first_name);
        assert_eq!(updated.last_name, created.last_name);
        assert_eq!(updated.email, created.email);
        assert_eq!(updated.phone, Some("555-0100".to_owned()));
        assert_eq!(updated.created_at, created.created_at);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn list_orders_by_id_and_honors_skip_and_limit(db: PgPool) {
        let store = CustomerStore::from_pool(db.clone());
        for i in 0..5 {
            store
                .insert(&candidate(&format!("c{}@x.com", i)))
                .await
                .expect("insert failed");
        }

        let page = store.list(1, 2).await.expect("list failed");

        assert_eq!(page.len(), 2);
        assert_eq!(page[0].email, "c1@x.com");
        assert_eq!(page[1].email, "c2@x.com");
    }
}
