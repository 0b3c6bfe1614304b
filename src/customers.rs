//! Customer records and their instrumented CRUD service.

use async_trait::async_trait;
use dashmap::DashMap;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;

use crate::metrics::{Instrumented, SampleRecorder};

/// Entity label under which customer operations are measured.
pub const ENTITY: &str = "Customer";

const SEQ_KEY: &str = "customer:seq";

// ─── Domain type ─────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub id: u64,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Error)]
pub enum CustomerError {
    #[error("customer {0} not found")]
    NotFound(u64),

    #[error("redis: {0}")]
    Redis(#[from] redis::RedisError),
}

// ─── Repository ──────────────────────────────────────────────────

#[async_trait]
pub trait CustomerRepository: Send + Sync {
    async fn insert(&self, name: &str, email: &str) -> Result<Customer, CustomerError>;

    async fn find(&self, id: u64) -> Result<Option<Customer>, CustomerError>;

    /// Fails with `NotFound` when no customer has this id.
    async fn update(&self, id: u64, name: &str, email: &str) -> Result<Customer, CustomerError>;

    /// Whether a customer was removed.
    async fn delete(&self, id: u64) -> Result<bool, CustomerError>;
}

/// Customers as Redis hashes under `customer:{id}`; ids come from `INCR customer:seq`.
#[derive(Clone)]
pub struct RedisCustomerRepository {
    conn: ConnectionManager,
}

impl RedisCustomerRepository {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }

    fn key(id: u64) -> String {
        format!("customer:{id}")
    }

    async fn write(&self, customer: &Customer) -> Result<(), CustomerError> {
        let mut conn = self.conn.clone();
        let _: () = conn
            .hset_multiple(
                Self::key(customer.id),
                &[
                    ("id", customer.id.to_string()),
                    ("name", customer.name.clone()),
                    ("email", customer.email.clone()),
                ],
            )
            .await?;
        Ok(())
    }
}

#[async_trait]
impl CustomerRepository for RedisCustomerRepository {
    async fn insert(&self, name: &str, email: &str) -> Result<Customer, CustomerError> {
        let mut conn = self.conn.clone();
        let id: u64 = conn.incr(SEQ_KEY, 1).await?;
        let customer = Customer {
            id,
            name: name.to_owned(),
            email: email.to_owned(),
        };
        self.write(&customer).await?;
        Ok(customer)
    }

    async fn find(&self, id: u64) -> Result<Option<Customer>, CustomerError> {
        let mut conn = self.conn.clone();
        let map: HashMap<String, String> = conn.hgetall(Self::key(id)).await?;
        if map.is_empty() {
            return Ok(None);
        }
        Ok(Some(customer_from_map(id, &map)))
    }

    async fn update(&self, id: u64, name: &str, email: &str) -> Result<Customer, CustomerError> {
        let mut conn = self.conn.clone();
        let exists: bool = conn.exists(Self::key(id)).await?;
        if !exists {
            return Err(CustomerError::NotFound(id));
        }
        let customer = Customer {
            id,
            name: name.to_owned(),
            email: email.to_owned(),
        };
        self.write(&customer).await?;
        Ok(customer)
    }

    async fn delete(&self, id: u64) -> Result<bool, CustomerError> {
        let mut conn = self.conn.clone();
        let removed: i64 = conn.del(Self::key(id)).await?;
        Ok(removed > 0)
    }
}

fn customer_from_map(id: u64, map: &HashMap<String, String>) -> Customer {
    Customer {
        id,
        name: map.get("name").cloned().unwrap_or_default(),
        email: map.get("email").cloned().unwrap_or_default(),
    }
}

/// Process-local repository for tests and `store = "memory"`.
#[derive(Debug, Default)]
pub struct MemoryCustomerRepository {
    seq: AtomicU64,
    rows: DashMap<u64, Customer>,
}

impl MemoryCustomerRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CustomerRepository for MemoryCustomerRepository {
    async fn insert(&self, name: &str, email: &str) -> Result<Customer, CustomerError> {
        let id = self.seq.fetch_add(1, Ordering::SeqCst) + 1;
        let customer = Customer {
            id,
            name: name.to_owned(),
            email: email.to_owned(),
        };
        self.rows.insert(id, customer.clone());
        Ok(customer)
    }

    async fn find(&self, id: u64) -> Result<Option<Customer>, CustomerError> {
        Ok(self.rows.get(&id).map(|c| c.value().clone()))
    }

    async fn update(&self, id: u64, name: &str, email: &str) -> Result<Customer, CustomerError> {
        let mut row = self.rows.get_mut(&id).ok_or(CustomerError::NotFound(id))?;
        row.name = name.to_owned();
        row.email = email.to_owned();
        Ok(row.clone())
    }

    async fn delete(&self, id: u64) -> Result<bool, CustomerError> {
        Ok(self.rows.remove(&id).is_some())
    }
}

// ─── Service ─────────────────────────────────────────────────────

/// Customer CRUD with every repository call measured under `Customer`.
/// Failures are recorded too, as `{OP}_ERROR`.
#[derive(Clone)]
pub struct CustomerService {
    repo: Arc<dyn CustomerRepository>,
    recorder: SampleRecorder,
}

impl CustomerService {
    pub fn new(repo: Arc<dyn CustomerRepository>, recorder: SampleRecorder) -> Self {
        Self { repo, recorder }
    }

    fn measured(operation: &str) -> Instrumented {
        Instrumented::new(ENTITY, operation).record_on_error(true)
    }

    pub async fn insert(&self, name: &str, email: &str) -> Result<Customer, CustomerError> {
        Self::measured("INSERT")
            .run(&self.recorder, self.repo.insert(name, email))
            .await
    }

    pub async fn find(&self, id: u64) -> Result<Customer, CustomerError> {
        Self::measured("FIND")
            .run(&self.recorder, async {
                self.repo.find(id).await?.ok_or(CustomerError::NotFound(id))
            })
            .await
    }

    pub async fn update(&self, id: u64, name: &str, email: &str) -> Result<Customer, CustomerError> {
        Self::measured("UPDATE")
            .run(&self.recorder, self.repo.update(id, name, email))
            .await
    }

    pub async fn delete(&self, id: u64) -> Result<(), CustomerError> {
        Self::measured("DELETE")
            .run(&self.recorder, async {
                if self.repo.delete(id).await? {
                    Ok(())
                } else {
                    Err(CustomerError::NotFound(id))
                }
            })
            .await
    }
}
