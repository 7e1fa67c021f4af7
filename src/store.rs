//! Practice problem persistence.
//!
//! `PgProblemStore` writes to the shared `practice_problems` table; `MemoryProblemStore`
//! keeps rows in-process and is used when no DATABASE_URL is configured.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{
  postgres::{PgPool, PgPoolOptions},
  types::Json,
  FromRow,
};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::domain::{NewPracticeProblem, PracticeProblem, TestCase};

#[derive(Debug, Error)]
pub enum StoreError {
  #[error("Database connection failed: {0}")]
  Connect(String),

  #[error("Database migration failed: {0}")]
  Migrate(String),

  #[error("Failed to store practice problem: {0}")]
  Insert(String),

  #[error("Failed to load practice problems: {0}")]
  Query(String),
}

#[async_trait]
pub trait ProblemStore: Send + Sync {
  /// Insert one row and return it with its assigned id and timestamp.
  async fn insert(&self, new: NewPracticeProblem) -> Result<PracticeProblem, StoreError>;

  /// Most recent problems first.
  async fn recent(&self, limit: u32) -> Result<Vec<PracticeProblem>, StoreError>;

  fn backend(&self) -> &'static str;
}

// -------------------------------------------------------------------------
// In-memory store
// -------------------------------------------------------------------------

/// Most recent rows kept by `MemoryProblemStore`; older rows are evicted on insert.
pub const MEMORY_STORE_CAPACITY: usize = 500;

#[derive(Clone)]
pub struct MemoryProblemStore {
  rows: Arc<RwLock<VecDeque<PracticeProblem>>>,
  capacity: usize,
}

impl Default for MemoryProblemStore {
  fn default() -> Self {
    Self::with_capacity(MEMORY_STORE_CAPACITY)
  }
}

impl MemoryProblemStore {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_capacity(capacity: usize) -> Self {
    let capacity = capacity.max(1);
    Self { rows: Arc::new(RwLock::new(VecDeque::with_capacity(capacity.min(64)))), capacity }
  }

  #[cfg(test)]
  pub async fn len(&self) -> usize {
    self.rows.read().await.len()
  }
}

#[async_trait]
impl ProblemStore for MemoryProblemStore {
  #[instrument(level = "debug", skip(self, new), fields(created_by = %new.created_by))]
  async fn insert(&self, new: NewPracticeProblem) -> Result<PracticeProblem, StoreError> {
    let row = PracticeProblem::from_new(Uuid::new_v4(), Utc::now(), new);
    let mut rows = self.rows.write().await;
    if rows.len() >= self.capacity {
      rows.pop_front();
    }
    rows.push_back(row.clone());
    Ok(row)
  }

  async fn recent(&self, limit: u32) -> Result<Vec<PracticeProblem>, StoreError> {
    let rows = self.rows.read().await;
    Ok(rows.iter().rev().take(limit as usize).cloned().collect())
  }

  fn backend(&self) -> &'static str {
    "memory"
  }
}

// -------------------------------------------------------------------------
// PostgreSQL store
// -------------------------------------------------------------------------

#[derive(Clone)]
pub struct PgProblemStore {
  pool: PgPool,
}

#[derive(FromRow)]
struct ProblemRow {
  id: Uuid,
  title: String,
  description: String,
  starter_code: String,
  solution: String,
  test_cases: Json<Vec<TestCase>>,
  hints: Json<Vec<String>>,
  concepts: Json<Vec<String>>,
  language: String,
  difficulty: String,
  topic: String,
  created_by: String,
  created_at: DateTime<Utc>,
}

impl From<ProblemRow> for PracticeProblem {
  fn from(r: ProblemRow) -> Self {
    PracticeProblem {
      id: r.id,
      title: r.title,
      description: r.description,
      starter_code: r.starter_code,
      solution: r.solution,
      test_cases: r.test_cases.0,
      hints: r.hints.0,
      concepts: r.concepts.0,
      language: r.language,
      difficulty: r.difficulty,
      topic: r.topic,
      created_by: r.created_by,
      created_at: r.created_at,
    }
  }
}

const RETURNING_COLUMNS: &str =
  "id, title, description, starter_code, solution, test_cases, hints, concepts, language, difficulty, topic, created_by, created_at";

impl PgProblemStore {
  /// Connect and run the embedded migrations.
  #[instrument(skip(database_url))]
  pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
    info!(target: "codementor", max_connections, "Connecting to PostgreSQL");

    let pool = PgPoolOptions::new()
      .max_connections(max_connections)
      .acquire_timeout(Duration::from_secs(30))
      .idle_timeout(Duration::from_secs(600))
      .connect(database_url)
      .await
      .map_err(|e| StoreError::Connect(e.to_string()))?;

    sqlx::migrate!("./migrations")
      .run(&pool)
      .await
      .map_err(|e| StoreError::Migrate(e.to_string()))?;

    info!(target: "codementor", "PostgreSQL pool ready, migrations applied");
    Ok(Self { pool })
  }
}

#[async_trait]
impl ProblemStore for PgProblemStore {
  #[instrument(level = "debug", skip(self, new), fields(created_by = %new.created_by))]
  async fn insert(&self, new: NewPracticeProblem) -> Result<PracticeProblem, StoreError> {
    let p = &new.problem;
    let sql = format!(
      r#"
      INSERT INTO practice_problems
        (id, title, description, starter_code, solution, test_cases, hints, concepts, language, difficulty, topic, created_by)
      VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
      RETURNING {RETURNING_COLUMNS}
      "#
    );

    let row = sqlx::query_as::<_, ProblemRow>(&sql)
      .bind(Uuid::new_v4())
      .bind(&p.title)
      .bind(&p.description)
      .bind(&p.starter_code)
      .bind(&p.solution)
      .bind(Json(&p.test_cases))
      .bind(Json(&p.hints))
      .bind(Json(&p.concepts))
      .bind(&new.language)
      .bind(&new.difficulty)
      .bind(&new.topic)
      .bind(&new.created_by)
      .fetch_one(&self.pool)
      .await
      .map_err(|e| StoreError::Insert(e.to_string()))?;

    Ok(row.into())
  }

  #[instrument(level = "debug", skip(self))]
  async fn recent(&self, limit: u32) -> Result<Vec<PracticeProblem>, StoreError> {
    let sql = format!("SELECT {RETURNING_COLUMNS} FROM practice_problems ORDER BY created_at DESC LIMIT $1");
    let rows = sqlx::query_as::<_, ProblemRow>(&sql)
      .bind(i64::from(limit))
      .fetch_all(&self.pool)
      .await
      .map_err(|e| StoreError::Query(e.to_string()))?;
    Ok(rows.into_iter().map(Into::into).collect())
  }

  fn backend(&self) -> &'static str {
    "postgres"
  }
}
