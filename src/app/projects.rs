use crate::app::context::{observe, ActionContext};
use crate::app::reconcile::plan_categories;
use crate::app::validation::validate_project_form;
use crate::domain::*;
use crate::error::{ActionError, ActionResult};
use crate::metrics::ActionMetrics;
use crate::storage::Mutation;
use chrono::Utc;
use tracing::info;
use uuid::Uuid;

/// Create, edit and delete projects, keeping each project's categories and
/// their rankings in step with the submitted category list.
pub struct ProjectReconciler {
    ctx: ActionContext,
}

impl ProjectReconciler {
    pub fn new(ctx: ActionContext) -> Self {
        Self { ctx }
    }

    pub async fn create_project(&self, form: &ProjectForm) -> ActionResult<ProjectRef> {
        observe("create_project", self.create(form).await)
    }

    pub async fn update_project(
        &self,
        project_id: Uuid,
        form: &ProjectForm,
    ) -> ActionResult<ProjectRef> {
        observe("update_project", self.update(project_id, form).await)
    }

    pub async fn delete_project(&self, project_id: Uuid) -> ActionResult<ProjectRef> {
        observe("delete_project", self.delete(project_id).await)
    }

    async fn create(&self, form: &ProjectForm) -> ActionResult<ProjectRef> {
        let user = self.ctx.authorize("create_project").await?;
        let form = validate_project_form(form)?;

        let now = Utc::now();
        let project = Project {
            id: Uuid::new_v4(),
            user_id: user.clone(),
            name: form.name,
            created_at: now,
            updated_at: None,
        };

        let mut mutations = Vec::with_capacity(form.categories.len() + 1);
        mutations.push(Mutation::InsertProject(project.clone()));
        for (position, category) in form.categories.into_iter().enumerate() {
            mutations.push(Mutation::InsertCategory(Category {
                id: Uuid::new_v4(),
                user_id: user.clone(),
                project_id: project.id,
                name: category.name,
                order_index: position as i32,
                created_at: now,
                updated_at: None,
            }));
        }

        self.ctx.storage.commit(&mutations).await?;
        ActionMetrics::record_categories("inserted", mutations.len() - 1);

        info!(
            "Created project '{}' ({}) with {} categories",
            project.name,
            project.id,
            mutations.len() - 1
        );
        Ok(ProjectRef { id: project.id })
    }

    async fn update(&self, project_id: Uuid, form: &ProjectForm) -> ActionResult<ProjectRef> {
        let user = self.ctx.authorize("update_project").await?;
        let form = validate_project_form(form)?;

        let project = self
            .ctx
            .storage
            .get_project(project_id)
            .await?
            .filter(|p| p.user_id == user)
            .ok_or(ActionError::Unauthorized)?;

        let current = self.ctx.storage.get_categories_by_project(project.id).await?;
        let plan = plan_categories(&current, &form.categories, self.ctx.category_match);

        let now = Utc::now();
        let mut mutations = vec![Mutation::RenameProject {
            project_id: project.id,
            name: form.name.clone(),
            updated_at: now,
        }];

        mutations.extend(
            plan.deletes
                .iter()
                .map(|&category_id| Mutation::DeleteCategory { category_id }),
        );

        mutations.extend(plan.updates.iter().map(|u| Mutation::UpdateCategory {
            category_id: u.category_id,
            name: u.name.clone(),
            order_index: u.order_index,
            updated_at: now,
        }));

        let inserted: Vec<Category> = plan
            .inserts
            .iter()
            .map(|insert| Category {
                id: Uuid::new_v4(),
                user_id: user.clone(),
                project_id: project.id,
                name: insert.name.clone(),
                order_index: insert.order_index,
                created_at: now,
                updated_at: None,
            })
            .collect();
        mutations.extend(inserted.iter().cloned().map(Mutation::InsertCategory));

        // New categories need a ranking row for every item already in the project.
        if !inserted.is_empty() {
            let items = self.ctx.storage.get_items_by_project(project.id).await?;
            for item in &items {
                for category in &inserted {
                    mutations.push(Mutation::InsertRanking(Ranking {
                        user_id: user.clone(),
                        category_id: category.id,
                        item_id: item.id,
                        rank: 0,
                        notes: None,
                        created_at: now,
                        updated_at: None,
                    }));
                }
            }
        }

        self.ctx.storage.commit(&mutations).await?;

        ActionMetrics::record_categories("deleted", plan.deletes.len());
        ActionMetrics::record_categories("updated", plan.updates.len());
        ActionMetrics::record_categories("inserted", plan.inserts.len());
        info!(
            "Updated project {}: {} categories deleted, {} updated, {} inserted",
            project.id,
            plan.deletes.len(),
            plan.updates.len(),
            plan.inserts.len()
        );
        Ok(ProjectRef { id: project.id })
    }

    async fn delete(&self, project_id: Uuid) -> ActionResult<ProjectRef> {
        let user = self.ctx.authorize("delete_project").await?;

        let project = self
            .ctx
            .storage
            .get_project(project_id)
            .await?
            .ok_or_else(|| ActionError::NotFound("Project".to_string()))?;
        if project.user_id != user {
            return Err(ActionError::Unauthorized);
        }

        let affected = self
            .ctx
            .storage
            .commit(&[Mutation::DeleteProject {
                project_id,
                user_id: user,
            }])
            .await?;
        // Deleted by a concurrent request between the read and the write.
        if affected == 0 {
            return Err(ActionError::NotFound("Project".to_string()));
        }

        info!("Deleted project '{}' ({})", project.name, project.id);
        Ok(ProjectRef { id: project.id })
    }
}
