use crate::app::context::{observe, ActionContext};
use crate::app::validation::validate_item_form;
use crate::domain::*;
use crate::error::{ActionError, ActionResult};
use crate::storage::Mutation;
use chrono::Utc;
use tracing::info;
use uuid::Uuid;

/// Item create/update/delete. Creating an item seeds one ranking per category
/// of its project.
pub struct ItemLifecycle {
    ctx: ActionContext,
}

impl ItemLifecycle {
    pub fn new(ctx: ActionContext) -> Self {
        Self { ctx }
    }

    pub async fn create_item(&self, form: &ItemForm) -> ActionResult<Item> {
        observe("create_item", self.create(form).await)
    }

    pub async fn update_item(&self, item_id: Uuid, form: &ItemForm) -> ActionResult<Item> {
        observe("update_item", self.update(item_id, form).await)
    }

    pub async fn delete_item(&self, item_id: Uuid) -> ActionResult<Item> {
        observe("delete_item", self.delete(item_id).await)
    }

    async fn create(&self, form: &ItemForm) -> ActionResult<Item> {
        let user = self.ctx.authorize("create_item").await?;
        let form = validate_item_form(form)?;

        let project = self
            .ctx
            .storage
            .get_project(form.project_id)
            .await?
            .filter(|p| p.user_id == user)
            .ok_or(ActionError::Unauthorized)?;
        let categories = self.ctx.storage.get_categories_by_project(project.id).await?;

        let now = Utc::now();
        let item = Item {
            id: Uuid::new_v4(),
            user_id: user.clone(),
            project_id: project.id,
            name: form.name,
            created_at: now,
            updated_at: None,
        };

        let mut mutations = Vec::with_capacity(categories.len() + 1);
        mutations.push(Mutation::InsertItem(item.clone()));
        for category in &categories {
            let notes = if category.id == form.category_id {
                form.notes.clone()
            } else {
                None
            };
            mutations.push(Mutation::InsertRanking(Ranking {
                user_id: user.clone(),
                category_id: category.id,
                item_id: item.id,
                rank: 0,
                notes,
                created_at: now,
                updated_at: None,
            }));
        }

        self.ctx.storage.commit(&mutations).await?;
        info!(
            "Created item '{}' ({}) in project {} across {} categories",
            item.name,
            item.id,
            project.id,
            categories.len()
        );
        Ok(item)
    }

    async fn update(&self, item_id: Uuid, form: &ItemForm) -> ActionResult<Item> {
        let user = self.ctx.authorize("update_item").await?;
        let form = validate_item_form(form)?;

        let mut item = self
            .ctx
            .storage
            .get_item(item_id)
            .await?
            .filter(|i| i.user_id == user)
            .ok_or(ActionError::Unauthorized)?;

        let now = Utc::now();
        let mutations = [
            Mutation::RenameItem {
                item_id: item.id,
                name: form.name.clone(),
                updated_at: now,
            },
            Mutation::SetRankingNotes {
                category_id: form.category_id,
                item_id: item.id,
                notes: form.notes.clone(),
                updated_at: now,
            },
        ];
        self.ctx.storage.commit(&mutations).await?;

        item.name = form.name;
        item.updated_at = Some(now);
        info!("Updated item {}", item.id);
        Ok(item)
    }

    async fn delete(&self, item_id: Uuid) -> ActionResult<Item> {
        let user = self.ctx.authorize("delete_item").await?;

        let item = self
            .ctx
            .storage
            .get_item(item_id)
            .await?
            .ok_or_else(|| ActionError::NotFound("Item".to_string()))?;
        if item.user_id != user {
            return Err(ActionError::Unauthorized);
        }

        let affected = self
            .ctx
            .storage
            .commit(&[Mutation::DeleteItem {
                item_id,
                user_id: user,
            }])
            .await?;
        if affected == 0 {
            return Err(ActionError::NotFound("Item".to_string()));
        }

        info!("Deleted item '{}' ({})", item.name, item.id);
        Ok(item)
    }
}
