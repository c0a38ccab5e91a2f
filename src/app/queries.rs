use crate::app::context::ActionContext;
use crate::domain::*;
use crate::error::{ActionError, ActionResult};
use std::collections::HashMap;
use uuid::Uuid;

/// Read side. Needs a session but spends no quota.
pub struct ProjectQueries {
    ctx: ActionContext,
}

impl ProjectQueries {
    pub fn new(ctx: ActionContext) -> Self {
        Self { ctx }
    }

    pub async fn list_projects(&self) -> ActionResult<Vec<Project>> {
        let user = self.ctx.require_user().await?;
        Ok(self.ctx.storage.get_projects_by_owner(&user).await?)
    }

    pub async fn get_project(&self, project_id: Uuid) -> ActionResult<ProjectDetail> {
        let user = self.ctx.require_user().await?;
        let project = self
            .ctx
            .storage
            .get_project(project_id)
            .await?
            .filter(|p| p.user_id == user)
            .ok_or_else(|| ActionError::NotFound("Project".to_string()))?;

        let items: HashMap<Uuid, Item> = self
            .ctx
            .storage
            .get_items_by_project(project.id)
            .await?
            .into_iter()
            .map(|item| (item.id, item))
            .collect();

        let mut categories = Vec::new();
        for category in self.ctx.storage.get_categories_by_project(project.id).await? {
            let rankings = self.ctx.storage.get_rankings_by_category(category.id).await?;
            categories.push(CategoryDetail {
                category,
                rankings: join_items(rankings, &items),
            });
        }

        Ok(ProjectDetail {
            project,
            categories,
        })
    }

    pub async fn get_item(&self, item_id: Uuid) -> ActionResult<Item> {
        let user = self.ctx.require_user().await?;
        self.ctx
            .storage
            .get_item(item_id)
            .await?
            .filter(|i| i.user_id == user)
            .ok_or_else(|| ActionError::NotFound("Item".to_string()))
    }

    pub async fn get_category_rankings(&self, category_id: Uuid) -> ActionResult<Vec<RankedItem>> {
        let user = self.ctx.require_user().await?;
        let category = self
            .ctx
            .storage
            .get_category(category_id)
            .await?
            .filter(|c| c.user_id == user)
            .ok_or_else(|| ActionError::NotFound("Category".to_string()))?;

        let items: HashMap<Uuid, Item> = self
            .ctx
            .storage
            .get_items_by_project(category.project_id)
            .await?
            .into_iter()
            .map(|item| (item.id, item))
            .collect();
        let rankings = self.ctx.storage.get_rankings_by_category(category.id).await?;
        Ok(join_items(rankings, &items))
    }
}

// Keeps the store's rank order; rankings whose item vanished are dropped.
fn join_items(rankings: Vec<Ranking>, items: &HashMap<Uuid, Item>) -> Vec<RankedItem> {
    rankings
        .into_iter()
        .filter_map(|ranking| {
            let item = items.get(&ranking.item_id)?.clone();
            Some(RankedItem { ranking, item })
        })
        .collect()
}
