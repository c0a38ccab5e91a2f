use crate::domain::*;
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

pub mod in_memory;
#[cfg(feature = "db")]
pub mod database;

pub use in_memory::InMemoryStorage;
#[cfg(feature = "db")]
pub use database::DatabaseStorage;

/// A single write submitted to [`Storage::commit`].
///
/// Inserts fail the whole batch when a referenced parent row is missing or the
/// key already exists. Updates and deletes that match nothing affect zero rows
/// and are not errors.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    InsertProject(Project),
    RenameProject {
        project_id: Uuid,
        name: String,
        updated_at: DateTime<Utc>,
    },
    /// Cascades to the project's categories, items and rankings.
    DeleteProject { project_id: Uuid, user_id: UserId },

    InsertCategory(Category),
    UpdateCategory {
        category_id: Uuid,
        name: String,
        order_index: i32,
        updated_at: DateTime<Utc>,
    },
    /// Cascades to the category's rankings.
    DeleteCategory { category_id: Uuid },

    InsertItem(Item),
    RenameItem {
        item_id: Uuid,
        name: String,
        updated_at: DateTime<Utc>,
    },
    /// Cascades to the item's rankings.
    DeleteItem { item_id: Uuid, user_id: UserId },

    InsertRanking(Ranking),
    SetRankingNotes {
        category_id: Uuid,
        item_id: Uuid,
        notes: Option<String>,
        updated_at: DateTime<Utc>,
    },
    /// Only rows owned by `user_id` are touched.
    SetRank {
        user_id: UserId,
        category_id: Uuid,
        item_id: Uuid,
        rank: i32,
        updated_at: DateTime<Utc>,
    },
}

impl Mutation {
    pub fn label(&self) -> &'static str {
        match self {
            Mutation::InsertProject(_) => "insert_project",
            Mutation::RenameProject { .. } => "rename_project",
            Mutation::DeleteProject { .. } => "delete_project",
            Mutation::InsertCategory(_) => "insert_category",
            Mutation::UpdateCategory { .. } => "update_category",
            Mutation::DeleteCategory { .. } => "delete_category",
            Mutation::InsertItem(_) => "insert_item",
            Mutation::RenameItem { .. } => "rename_item",
            Mutation::DeleteItem { .. } => "delete_item",
            Mutation::InsertRanking(_) => "insert_ranking",
            Mutation::SetRankingNotes { .. } => "set_ranking_notes",
            Mutation::SetRank { .. } => "set_rank",
        }
    }
}

/// Storage trait for persisting projects, categories, items and rankings
#[async_trait]
pub trait Storage: Send + Sync {
    // Project reads
    async fn get_project(&self, project_id: Uuid) -> Result<Option<Project>>;
    /// Newest first.
    async fn get_projects_by_owner(&self, user_id: &UserId) -> Result<Vec<Project>>;

    // Category reads
    async fn get_category(&self, category_id: Uuid) -> Result<Option<Category>>;
    /// Ordered by `order_index`.
    async fn get_categories_by_project(&self, project_id: Uuid) -> Result<Vec<Category>>;

    // Item reads
    async fn get_item(&self, item_id: Uuid) -> Result<Option<Item>>;
    async fn get_items_by_project(&self, project_id: Uuid) -> Result<Vec<Item>>;

    // Ranking reads
    async fn get_ranking(&self, category_id: Uuid, item_id: Uuid) -> Result<Option<Ranking>>;
    /// Ordered by `rank`.
    async fn get_rankings_by_category(&self, category_id: Uuid) -> Result<Vec<Ranking>>;
    async fn get_rankings_by_item(&self, item_id: Uuid) -> Result<Vec<Ranking>>;

    /// Apply every mutation in order as one atomic unit and return the number
    /// of rows affected. On error nothing is written.
    async fn commit(&self, mutations: &[Mutation]) -> Result<usize>;
}
