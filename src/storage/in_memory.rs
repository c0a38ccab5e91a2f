use super::{Mutation, Storage};
use crate::domain::*;
use crate::error::{Result, StoreError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Default)]
struct Tables {
    projects: HashMap<Uuid, Project>,
    categories: HashMap<Uuid, Category>,
    items: HashMap<Uuid, Item>,
    rankings: HashMap<(Uuid, Uuid), Ranking>,
}

/// Prior state of one row, recorded before the row is written.
#[derive(Debug)]
enum Undo {
    Project(Uuid, Option<Project>),
    Category(Uuid, Option<Category>),
    Item(Uuid, Option<Item>),
    Ranking((Uuid, Uuid), Option<Ranking>),
}

/// Rows touched by the batch in flight, newest last.
type Journal = Vec<Undo>;

impl Tables {
    fn apply(&mut self, mutation: &Mutation, journal: &mut Journal) -> Result<usize> {
        let changed = match mutation {
            Mutation::InsertProject(project) => {
                if self.projects.contains_key(&project.id) {
                    return Err(StoreError::constraint(format!(
                        "project {} already exists",
                        project.id
                    )));
                }
                journal.push(Undo::Project(project.id, None));
                self.projects.insert(project.id, project.clone());
                1
            }
            Mutation::RenameProject {
                project_id,
                name,
                updated_at,
            } => match self.projects.get_mut(project_id) {
                Some(project) => {
                    journal.push(Undo::Project(*project_id, Some(project.clone())));
                    project.name = name.clone();
                    project.updated_at = Some(*updated_at);
                    1
                }
                None => 0,
            },
            Mutation::DeleteProject {
                project_id,
                user_id,
            } => {
                let owned = self
                    .projects
                    .get(project_id)
                    .is_some_and(|p| &p.user_id == user_id);
                if !owned {
                    return Ok(0);
                }
                let category_ids: Vec<Uuid> = self
                    .categories
                    .values()
                    .filter(|c| c.project_id == *project_id)
                    .map(|c| c.id)
                    .collect();
                let item_ids: Vec<Uuid> = self
                    .items
                    .values()
                    .filter(|i| i.project_id == *project_id)
                    .map(|i| i.id)
                    .collect();
                for id in category_ids {
                    self.remove_category(id, journal);
                }
                for id in item_ids {
                    self.remove_item(id, journal);
                }
                let removed = self.projects.remove(project_id);
                journal.push(Undo::Project(*project_id, removed));
                1
            }
            Mutation::InsertCategory(category) => {
                if !self.projects.contains_key(&category.project_id) {
                    return Err(StoreError::constraint(format!(
                        "category {} references missing project {}",
                        category.id, category.project_id
                    )));
                }
                if self.categories.contains_key(&category.id) {
                    return Err(StoreError::constraint(format!(
                        "category {} already exists",
                        category.id
                    )));
                }
                journal.push(Undo::Category(category.id, None));
                self.categories.insert(category.id, category.clone());
                1
            }
            Mutation::UpdateCategory {
                category_id,
                name,
                order_index,
                updated_at,
            } => match self.categories.get_mut(category_id) {
                Some(category) => {
                    journal.push(Undo::Category(*category_id, Some(category.clone())));
                    category.name = name.clone();
                    category.order_index = *order_index;
                    category.updated_at = Some(*updated_at);
                    1
                }
                None => 0,
            },
            Mutation::DeleteCategory { category_id } => self.remove_category(*category_id, journal),
            Mutation::InsertItem(item) => {
                if !self.projects.contains_key(&item.project_id) {
                    return Err(StoreError::constraint(format!(
                        "item {} references missing project {}",
                        item.id, item.project_id
                    )));
                }
                if self.items.contains_key(&item.id) {
                    return Err(StoreError::constraint(format!(
                        "item {} already exists",
                        item.id
                    )));
                }
                journal.push(Undo::Item(item.id, None));
                self.items.insert(item.id, item.clone());
                1
            }
            Mutation::RenameItem {
                item_id,
                name,
                updated_at,
            } => match self.items.get_mut(item_id) {
                Some(item) => {
                    journal.push(Undo::Item(*item_id, Some(item.clone())));
                    item.name = name.clone();
                    item.updated_at = Some(*updated_at);
                    1
                }
                None => 0,
            },
            Mutation::DeleteItem { item_id, user_id } => {
                let owned = self
                    .items
                    .get(item_id)
                    .is_some_and(|i| &i.user_id == user_id);
                if owned {
                    self.remove_item(*item_id, journal)
                } else {
                    0
                }
            }
            Mutation::InsertRanking(ranking) => {
                if !self.categories.contains_key(&ranking.category_id) {
                    return Err(StoreError::constraint(format!(
                        "ranking references missing category {}",
                        ranking.category_id
                    )));
                }
                if !self.items.contains_key(&ranking.item_id) {
                    return Err(StoreError::constraint(format!(
                        "ranking references missing item {}",
                        ranking.item_id
                    )));
                }
                if self.rankings.contains_key(&ranking.key()) {
                    return Err(StoreError::constraint(format!(
                        "ranking ({}, {}) already exists",
                        ranking.category_id, ranking.item_id
                    )));
                }
                journal.push(Undo::Ranking(ranking.key(), None));
                self.rankings.insert(ranking.key(), ranking.clone());
                1
            }
            Mutation::SetRankingNotes {
                category_id,
                item_id,
                notes,
                updated_at,
            } => {
                let key = (*category_id, *item_id);
                match self.rankings.get_mut(&key) {
                    Some(ranking) => {
                        journal.push(Undo::Ranking(key, Some(ranking.clone())));
                        ranking.notes = notes.clone();
                        ranking.updated_at = Some(*updated_at);
                        1
                    }
                    None => 0,
                }
            }
            Mutation::SetRank {
                user_id,
                category_id,
                item_id,
                rank,
                updated_at,
            } => {
                let key = (*category_id, *item_id);
                match self.rankings.get_mut(&key) {
                    Some(ranking) if &ranking.user_id == user_id => {
                        journal.push(Undo::Ranking(key, Some(ranking.clone())));
                        ranking.rank = *rank;
                        ranking.updated_at = Some(*updated_at);
                        1
                    }
                    _ => 0,
                }
            }
        };
        Ok(changed)
    }

    fn remove_category(&mut self, category_id: Uuid, journal: &mut Journal) -> usize {
        let Some(category) = self.categories.remove(&category_id) else {
            return 0;
        };
        journal.push(Undo::Category(category_id, Some(category)));
        let keys: Vec<(Uuid, Uuid)> = self
            .rankings
            .keys()
            .filter(|(c, _)| *c == category_id)
            .copied()
            .collect();
        self.remove_rankings(keys, journal);
        1
    }

    fn remove_item(&mut self, item_id: Uuid, journal: &mut Journal) -> usize {
        let Some(item) = self.items.remove(&item_id) else {
            return 0;
        };
        journal.push(Undo::Item(item_id, Some(item)));
        let keys: Vec<(Uuid, Uuid)> = self
            .rankings
            .keys()
            .filter(|(_, i)| *i == item_id)
            .copied()
            .collect();
        self.remove_rankings(keys, journal);
        1
    }

    fn remove_rankings(&mut self, keys: Vec<(Uuid, Uuid)>, journal: &mut Journal) {
        for key in keys {
            if let Some(ranking) = self.rankings.remove(&key) {
                journal.push(Undo::Ranking(key, Some(ranking)));
            }
        }
    }

    /// Put every touched row back the way it was, newest change first.
    fn roll_back(&mut self, journal: Journal) {
        for undo in journal.into_iter().rev() {
            match undo {
                Undo::Project(id, prior) => restore(&mut self.projects, id, prior),
                Undo::Category(id, prior) => restore(&mut self.categories, id, prior),
                Undo::Item(id, prior) => restore(&mut self.items, id, prior),
                Undo::Ranking(key, prior) => restore(&mut self.rankings, key, prior),
            }
        }
    }
}

fn restore<K: std::hash::Hash + Eq, V>(table: &mut HashMap<K, V>, key: K, prior: Option<V>) {
    match prior {
        Some(row) => {
            table.insert(key, row);
        }
        None => {
            table.remove(&key);
        }
    }
}

/// In-memory storage implementation for development/testing
#[derive(Clone, Default)]
pub struct InMemoryStorage {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn get_project(&self, project_id: Uuid) -> Result<Option<Project>> {
        let tables = self.tables.read().await;
        Ok(tables.projects.get(&project_id).cloned())
    }

    async fn get_projects_by_owner(&self, user_id: &UserId) -> Result<Vec<Project>> {
        let tables = self.tables.read().await;
        let mut projects: Vec<Project> = tables
            .projects
            .values()
            .filter(|p| &p.user_id == user_id)
            .cloned()
            .collect();
        projects.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(projects)
    }

    async fn get_category(&self, category_id: Uuid) -> Result<Option<Category>> {
        let tables = self.tables.read().await;
        Ok(tables.categories.get(&category_id).cloned())
    }

    async fn get_categories_by_project(&self, project_id: Uuid) -> Result<Vec<Category>> {
        let tables = self.tables.read().await;
        let mut categories: Vec<Category> = tables
            .categories
            .values()
            .filter(|c| c.project_id == project_id)
            .cloned()
            .collect();
        categories.sort_by(|a, b| {
            a.order_index
                .cmp(&b.order_index)
                .then(a.created_at.cmp(&b.created_at))
                .then(a.id.cmp(&b.id))
        });
        Ok(categories)
    }

    async fn get_item(&self, item_id: Uuid) -> Result<Option<Item>> {
        let tables = self.tables.read().await;
        Ok(tables.items.get(&item_id).cloned())
    }

    async fn get_items_by_project(&self, project_id: Uuid) -> Result<Vec<Item>> {
        let tables = self.tables.read().await;
        let mut items: Vec<Item> = tables
            .items
            .values()
            .filter(|i| i.project_id == project_id)
            .cloned()
            .collect();
        items.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(items)
    }

    async fn get_ranking(&self, category_id: Uuid, item_id: Uuid) -> Result<Option<Ranking>> {
        let tables = self.tables.read().await;
        Ok(tables.rankings.get(&(category_id, item_id)).cloned())
    }

    async fn get_rankings_by_category(&self, category_id: Uuid) -> Result<Vec<Ranking>> {
        let tables = self.tables.read().await;
        let mut rankings: Vec<Ranking> = tables
            .rankings
            .values()
            .filter(|r| r.category_id == category_id)
            .cloned()
            .collect();
        rankings.sort_by(|a, b| {
            a.rank
                .cmp(&b.rank)
                .then(a.created_at.cmp(&b.created_at))
                .then(a.item_id.cmp(&b.item_id))
        });
        Ok(rankings)
    }

    async fn get_rankings_by_item(&self, item_id: Uuid) -> Result<Vec<Ranking>> {
        let tables = self.tables.read().await;
        let mut rankings: Vec<Ranking> = tables
            .rankings
            .values()
            .filter(|r| r.item_id == item_id)
            .cloned()
            .collect();
        rankings.sort_by(|a, b| a.category_id.cmp(&b.category_id));
        Ok(rankings)
    }

    async fn commit(&self, mutations: &[Mutation]) -> Result<usize> {
        let mut tables = self.tables.write().await;

        let mut journal = Journal::new();
        let mut affected = 0;
        for mutation in mutations {
            match tables.apply(mutation, &mut journal) {
                Ok(changed) => affected += changed,
                Err(e) => {
                    debug!(
                        "Rolling back {} row changes after failed {}",
                        journal.len(),
                        mutation.label()
                    );
                    tables.roll_back(journal);
                    return Err(e);
                }
            }
        }

        debug!(
            "Committed {} mutations ({} rows affected)",
            mutations.len(),
            affected
        );
        Ok(affected)
    }
}
