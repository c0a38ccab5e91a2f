use super::{Mutation, Storage};
use crate::config::DatabaseConfig;
use crate::db::DatabaseManager;
use crate::domain::*;
use crate::error::{Result, StoreError};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use libsql::{Connection, Row, Value};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

const PROJECT_COLUMNS: &str = "id, user_id, name, created_at, updated_at";
const CATEGORY_COLUMNS: &str = "id, user_id, project_id, name, order_index, created_at, updated_at";
const ITEM_COLUMNS: &str = "id, user_id, project_id, name, created_at, updated_at";
const RANKING_COLUMNS: &str = "user_id, category_id, item_id, rank, notes, created_at, updated_at";

/// Database storage implementation using Turso/libSQL with a relational schema
pub struct DatabaseStorage {
    db: Arc<DatabaseManager>,
}

impl DatabaseStorage {
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        let db_manager = DatabaseManager::new(config).await?;
        db_manager.run_migrations().await?;

        Ok(Self {
            db: Arc::new(db_manager),
        })
    }

    async fn query_rows<T>(
        &self,
        sql: &str,
        params: impl libsql::params::IntoParams,
        convert: fn(&Row) -> Result<T>,
    ) -> Result<Vec<T>> {
        let conn = self.db.get_connection().await?;
        let mut rows = conn.query(sql, params).await.map_err(|e| StoreError::Database {
            message: format!("Failed to query: {e}"),
        })?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(|e| StoreError::Database {
            message: format!("Failed to read row: {e}"),
        })? {
            results.push(convert(&row)?);
        }
        Ok(results)
    }

    async fn apply(conn: &Connection, mutation: &Mutation) -> Result<usize> {
        let changed = match mutation {
            Mutation::InsertProject(p) => {
                conn.execute(
                    "INSERT INTO projects (id, user_id, name, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    libsql::params![
                        p.id.to_string(),
                        p.user_id.as_str(),
                        p.name.as_str(),
                        timestamp(&p.created_at),
                        p.updated_at.as_ref().map(timestamp)
                    ],
                )
                .await
            }
            Mutation::RenameProject {
                project_id,
                name,
                updated_at,
            } => {
                conn.execute(
                    "UPDATE projects SET name = ?2, updated_at = ?3 WHERE id = ?1",
                    libsql::params![project_id.to_string(), name.as_str(), timestamp(updated_at)],
                )
                .await
            }
            Mutation::DeleteProject {
                project_id,
                user_id,
            } => {
                conn.execute(
                    "DELETE FROM projects WHERE id = ?1 AND user_id = ?2",
                    libsql::params![project_id.to_string(), user_id.as_str()],
                )
                .await
            }
            Mutation::InsertCategory(c) => {
                conn.execute(
                    "INSERT INTO ranking_categories
                       (id, user_id, project_id, name, order_index, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    libsql::params![
                        c.id.to_string(),
                        c.user_id.as_str(),
                        c.project_id.to_string(),
                        c.name.as_str(),
                        i64::from(c.order_index),
                        timestamp(&c.created_at),
                        c.updated_at.as_ref().map(timestamp)
                    ],
                )
                .await
            }
            Mutation::UpdateCategory {
                category_id,
                name,
                order_index,
                updated_at,
            } => {
                conn.execute(
                    "UPDATE ranking_categories SET name = ?2, order_index = ?3, updated_at = ?4
                     WHERE id = ?1",
                    libsql::params![
                        category_id.to_string(),
                        name.as_str(),
                        i64::from(*order_index),
                        timestamp(updated_at)
                    ],
                )
                .await
            }
            Mutation::DeleteCategory { category_id } => {
                conn.execute(
                    "DELETE FROM ranking_categories WHERE id = ?1",
                    libsql::params![category_id.to_string()],
                )
                .await
            }
            Mutation::InsertItem(i) => {
                conn.execute(
                    "INSERT INTO items (id, user_id, project_id, name, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    libsql::params![
                        i.id.to_string(),
                        i.user_id.as_str(),
                        i.project_id.to_string(),
                        i.name.as_str(),
                        timestamp(&i.created_at),
                        i.updated_at.as_ref().map(timestamp)
                    ],
                )
                .await
            }
            Mutation::RenameItem {
                item_id,
                name,
                updated_at,
            } => {
                conn.execute(
                    "UPDATE items SET name = ?2, updated_at = ?3 WHERE id = ?1",
                    libsql::params![item_id.to_string(), name.as_str(), timestamp(updated_at)],
                )
                .await
            }
            Mutation::DeleteItem { item_id, user_id } => {
                conn.execute(
                    "DELETE FROM items WHERE id = ?1 AND user_id = ?2",
                    libsql::params![item_id.to_string(), user_id.as_str()],
                )
                .await
            }
            Mutation::InsertRanking(r) => {
                conn.execute(
                    "INSERT INTO item_rankings
                       (user_id, category_id, item_id, rank, notes, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    libsql::params![
                        r.user_id.as_str(),
                        r.category_id.to_string(),
                        r.item_id.to_string(),
                        i64::from(r.rank),
                        r.notes.as_deref(),
                        timestamp(&r.created_at),
                        r.updated_at.as_ref().map(timestamp)
                    ],
                )
                .await
            }
            Mutation::SetRankingNotes {
                category_id,
                item_id,
                notes,
                updated_at,
            } => {
                conn.execute(
                    "UPDATE item_rankings SET notes = ?3, updated_at = ?4
                     WHERE category_id = ?1 AND item_id = ?2",
                    libsql::params![
                        category_id.to_string(),
                        item_id.to_string(),
                        notes.as_deref(),
                        timestamp(updated_at)
                    ],
                )
                .await
            }
            Mutation::SetRank {
                user_id,
                category_id,
                item_id,
                rank,
                updated_at,
            } => {
                conn.execute(
                    "UPDATE item_rankings SET rank = ?4, updated_at = ?5
                     WHERE user_id = ?1 AND category_id = ?2 AND item_id = ?3",
                    libsql::params![
                        user_id.as_str(),
                        category_id.to_string(),
                        item_id.to_string(),
                        i64::from(*rank),
                        timestamp(updated_at)
                    ],
                )
                .await
            }
        }
        .map_err(|e| write_error(mutation, e))?;

        Ok(changed as usize)
    }
}

#[async_trait]
impl Storage for DatabaseStorage {
    async fn get_project(&self, project_id: Uuid) -> Result<Option<Project>> {
        let sql = format!("SELECT {PROJECT_COLUMNS} FROM projects WHERE id = ?1");
        let mut rows = self
            .query_rows(&sql, libsql::params![project_id.to_string()], project_from_row)
            .await?;
        Ok(rows.pop())
    }

    async fn get_projects_by_owner(&self, user_id: &UserId) -> Result<Vec<Project>> {
        let sql = format!(
            "SELECT {PROJECT_COLUMNS} FROM projects WHERE user_id = ?1
             ORDER BY created_at DESC, id"
        );
        self.query_rows(&sql, libsql::params![user_id.as_str()], project_from_row)
            .await
    }

    async fn get_category(&self, category_id: Uuid) -> Result<Option<Category>> {
        let sql = format!("SELECT {CATEGORY_COLUMNS} FROM ranking_categories WHERE id = ?1");
        let mut rows = self
            .query_rows(&sql, libsql::params![category_id.to_string()], category_from_row)
            .await?;
        Ok(rows.pop())
    }

    async fn get_categories_by_project(&self, project_id: Uuid) -> Result<Vec<Category>> {
        let sql = format!(
            "SELECT {CATEGORY_COLUMNS} FROM ranking_categories WHERE project_id = ?1
             ORDER BY order_index, created_at, id"
        );
        self.query_rows(&sql, libsql::params![project_id.to_string()], category_from_row)
            .await
    }

    async fn get_item(&self, item_id: Uuid) -> Result<Option<Item>> {
        let sql = format!("SELECT {ITEM_COLUMNS} FROM items WHERE id = ?1");
        let mut rows = self
            .query_rows(&sql, libsql::params![item_id.to_string()], item_from_row)
            .await?;
        Ok(rows.pop())
    }

    async fn get_items_by_project(&self, project_id: Uuid) -> Result<Vec<Item>> {
        let sql = format!(
            "SELECT {ITEM_COLUMNS} FROM items WHERE project_id = ?1 ORDER BY created_at, id"
        );
        self.query_rows(&sql, libsql::params![project_id.to_string()], item_from_row)
            .await
    }

    async fn get_ranking(&self, category_id: Uuid, item_id: Uuid) -> Result<Option<Ranking>> {
        let sql = format!(
            "SELECT {RANKING_COLUMNS} FROM item_rankings WHERE category_id = ?1 AND item_id = ?2"
        );
        let mut rows = self
            .query_rows(
                &sql,
                libsql::params![category_id.to_string(), item_id.to_string()],
                ranking_from_row,
            )
            .await?;
        Ok(rows.pop())
    }

    async fn get_rankings_by_category(&self, category_id: Uuid) -> Result<Vec<Ranking>> {
        let sql = format!(
            "SELECT {RANKING_COLUMNS} FROM item_rankings WHERE category_id = ?1
             ORDER BY rank, created_at, item_id"
        );
        self.query_rows(&sql, libsql::params![category_id.to_string()], ranking_from_row)
            .await
    }

    async fn get_rankings_by_item(&self, item_id: Uuid) -> Result<Vec<Ranking>> {
        let sql = format!(
            "SELECT {RANKING_COLUMNS} FROM item_rankings WHERE item_id = ?1 ORDER BY category_id"
        );
        self.query_rows(&sql, libsql::params![item_id.to_string()], ranking_from_row)
            .await
    }

    async fn commit(&self, mutations: &[Mutation]) -> Result<usize> {
        let conn = self.db.get_connection().await?;
        let tx = conn.transaction().await.map_err(|e| StoreError::Database {
            message: format!("Failed to begin transaction: {e}"),
        })?;

        let mut affected = 0;
        for mutation in mutations {
            let outcome = Self::apply(&tx, mutation).await;
            match outcome {
                Ok(changed) => affected += changed,
                Err(e) => {
                    debug!("Rolling back batch at {}: {}", mutation.label(), e);
                    tx.rollback().await.map_err(|e| StoreError::Database {
                        message: format!("Failed to roll back transaction: {e}"),
                    })?;
                    return Err(e);
                }
            }
        }

        tx.commit().await.map_err(|e| StoreError::Database {
            message: format!("Failed to commit transaction: {e}"),
        })?;

        info!(
            "Committed {} mutations ({} rows affected)",
            mutations.len(),
            affected
        );
        Ok(affected)
    }
}

fn write_error(mutation: &Mutation, e: libsql::Error) -> StoreError {
    let message = format!("Failed to {}: {e}", mutation.label().replace('_', " "));
    if e.to_string().to_lowercase().contains("constraint") {
        StoreError::Constraint { message }
    } else {
        StoreError::Database { message }
    }
}

fn timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn text(row: &Row, idx: i32) -> Result<String> {
    match row.get_value(idx)? {
        Value::Text(s) => Ok(s),
        other => Err(StoreError::database(format!(
            "Expected text in column {idx}, got {other:?}"
        ))),
    }
}

fn optional_text(row: &Row, idx: i32) -> Result<Option<String>> {
    match row.get_value(idx)? {
        Value::Null => Ok(None),
        Value::Text(s) => Ok(Some(s)),
        other => Err(StoreError::database(format!(
            "Expected text or null in column {idx}, got {other:?}"
        ))),
    }
}

fn integer(row: &Row, idx: i32) -> Result<i32> {
    match row.get_value(idx)? {
        Value::Integer(n) => i32::try_from(n).map_err(|_| {
            StoreError::database(format!("Integer in column {idx} out of range: {n}"))
        }),
        other => Err(StoreError::database(format!(
            "Expected integer in column {idx}, got {other:?}"
        ))),
    }
}

fn uuid(row: &Row, idx: i32) -> Result<Uuid> {
    let raw = text(row, idx)?;
    Uuid::parse_str(&raw).map_err(|e| StoreError::Database {
        message: format!("Invalid UUID '{raw}': {e}"),
    })
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StoreError::Database {
            message: format!("Invalid timestamp '{raw}': {e}"),
        })
}

fn created_at(row: &Row, idx: i32) -> Result<DateTime<Utc>> {
    parse_timestamp(&text(row, idx)?)
}

fn updated_at(row: &Row, idx: i32) -> Result<Option<DateTime<Utc>>> {
    optional_text(row, idx)?
        .map(|raw| parse_timestamp(&raw))
        .transpose()
}

fn project_from_row(row: &Row) -> Result<Project> {
    Ok(Project {
        id: uuid(row, 0)?,
        user_id: UserId(text(row, 1)?),
        name: text(row, 2)?,
        created_at: created_at(row, 3)?,
        updated_at: updated_at(row, 4)?,
    })
}

fn category_from_row(row: &Row) -> Result<Category> {
    Ok(Category {
        id: uuid(row, 0)?,
        user_id: UserId(text(row, 1)?),
        project_id: uuid(row, 2)?,
        name: text(row, 3)?,
        order_index: integer(row, 4)?,
        created_at: created_at(row, 5)?,
        updated_at: updated_at(row, 6)?,
    })
}

fn item_from_row(row: &Row) -> Result<Item> {
    Ok(Item {
        id: uuid(row, 0)?,
        user_id: UserId(text(row, 1)?),
        project_id: uuid(row, 2)?,
        name: text(row, 3)?,
        created_at: created_at(row, 4)?,
        updated_at: updated_at(row, 5)?,
    })
}

fn ranking_from_row(row: &Row) -> Result<Ranking> {
    Ok(Ranking {
        user_id: UserId(text(row, 0)?),
        category_id: uuid(row, 1)?,
        item_id: uuid(row, 2)?,
        rank: integer(row, 3)?,
        notes: optional_text(row, 4)?,
        created_at: created_at(row, 5)?,
        updated_at: updated_at(row, 6)?,
    })
}
