use anyhow::Result;
use async_trait::async_trait;
use ranklist::app::ports::{RateLimiterPort, SessionPort};
use ranklist::app::reconcile::CategoryMatch;
use ranklist::app::{
    ActionContext, ItemLifecycle, ProjectQueries, ProjectReconciler, RankingReorderer,
};
use ranklist::domain::*;
use ranklist::error::{ActionError, ActionResult};
use ranklist::storage::{InMemoryStorage, Storage};
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

struct FixedSession(Option<UserId>);

#[async_trait]
impl SessionPort for FixedSession {
    async fn current_user(&self) -> Option<UserId> {
        self.0.clone()
    }
}

/// Allows `remaining` calls, then refuses.
struct CountingLimiter {
    remaining: Mutex<u32>,
}

impl CountingLimiter {
    fn new(remaining: u32) -> Self {
        Self {
            remaining: Mutex::new(remaining),
        }
    }
}

#[async_trait]
impl RateLimiterPort for CountingLimiter {
    async fn check_quota(&self, _user_id: &UserId) -> bool {
        let mut remaining = self.remaining.lock().await;
        if *remaining == 0 {
            return false;
        }
        *remaining -= 1;
        true
    }
}

fn context(storage: &InMemoryStorage, user: Option<&str>) -> ActionContext {
    ActionContext::new(
        Arc::new(storage.clone()),
        Arc::new(FixedSession(user.map(UserId::new))),
        Arc::new(CountingLimiter::new(u32::MAX)),
    )
}

fn project_form(name: &str, categories: &[&str]) -> ProjectForm {
    ProjectForm {
        name: name.to_string(),
        categories: categories.iter().map(|c| CategoryInput::named(*c)).collect(),
    }
}

async fn add_item(ctx: &ActionContext, project: Uuid, category: Uuid, name: &str) -> Result<Item> {
    Ok(ItemLifecycle::new(ctx.clone())
        .create_item(&ItemForm {
            project_id: project,
            category_id: category,
            name: name.to_string(),
            notes: None,
        })
        .await?)
}

#[tokio::test]
async fn create_project_orders_categories_by_input() -> Result<()> {
    let storage = InMemoryStorage::new();
    let ctx = context(&storage, Some("user-1"));

    let project = ProjectReconciler::new(ctx.clone())
        .create_project(&project_form("Films", &["Plot", "Score", "Cast"]))
        .await?;

    let categories = storage.get_categories_by_project(project.id).await?;
    let layout: Vec<(&str, i32)> = categories
        .iter()
        .map(|c| (c.name.as_str(), c.order_index))
        .collect();
    assert_eq!(layout, vec![("Plot", 0), ("Score", 1), ("Cast", 2)]);
    Ok(())
}

#[tokio::test]
async fn update_reconciles_categories_and_backfills_rankings() -> Result<()> {
    let storage = InMemoryStorage::new();
    let ctx = context(&storage, Some("user-1"));
    let projects = ProjectReconciler::new(ctx.clone());

    let project = projects.create_project(&project_form("Films", &["A", "B", "C"])).await?;
    let before = storage.get_categories_by_project(project.id).await?;
    let item = add_item(&ctx, project.id, before[0].id, "Alien").await?;

    projects
        .update_project(project.id, &project_form("Films 2024", &["B", "C", "D"]))
        .await?;

    let after = storage.get_categories_by_project(project.id).await?;
    let layout: Vec<(&str, i32)> = after.iter().map(|c| (c.name.as_str(), c.order_index)).collect();
    assert_eq!(layout, vec![("B", 0), ("C", 1), ("D", 2)]);
    assert_eq!(after[0].id, before[1].id);
    assert_eq!(after[1].id, before[2].id);

    // Rankings of the dropped category cascade away.
    assert!(storage.get_rankings_by_category(before[0].id).await?.is_empty());

    let seeded = storage.get_ranking(after[2].id, item.id).await?.expect("backfilled");
    assert_eq!(seeded.rank, 0);
    assert_eq!(seeded.notes, None);
    assert_eq!(storage.get_rankings_by_item(item.id).await?.len(), 3);

    let renamed = storage.get_project(project.id).await?.expect("project");
    assert_eq!(renamed.name, "Films 2024");
    Ok(())
}

#[tokio::test]
async fn create_item_attaches_notes_to_target_category_only() -> Result<()> {
    let storage = InMemoryStorage::new();
    let ctx = context(&storage, Some("user-1"));

    let project = ProjectReconciler::new(ctx.clone())
        .create_project(&project_form("Films", &["X", "Y"]))
        .await?;
    let categories = storage.get_categories_by_project(project.id).await?;

    let item = ItemLifecycle::new(ctx)
        .create_item(&ItemForm {
            project_id: project.id,
            category_id: categories[1].id,
            name: "Alien".into(),
            notes: Some("n".into()),
        })
        .await?;

    let x = storage.get_ranking(categories[0].id, item.id).await?.expect("x");
    let y = storage.get_ranking(categories[1].id, item.id).await?.expect("y");
    assert_eq!((x.rank, x.notes), (0, None));
    assert_eq!((y.rank, y.notes), (0, Some("n".to_string())));
    Ok(())
}

#[tokio::test]
async fn update_item_touches_only_target_notes() -> Result<()> {
    let storage = InMemoryStorage::new();
    let ctx = context(&storage, Some("user-1"));

    let project = ProjectReconciler::new(ctx.clone())
        .create_project(&project_form("Films", &["X", "Y"]))
        .await?;
    let categories = storage.get_categories_by_project(project.id).await?;
    let item = add_item(&ctx, project.id, categories[0].id, "Alien").await?;

    let updated = ItemLifecycle::new(ctx.clone())
        .update_item(
            item.id,
            &ItemForm {
                project_id: project.id,
                category_id: categories[0].id,
                name: "Aliens".into(),
                notes: Some("sequel".into()),
            },
        )
        .await?;
    assert_eq!(updated.name, "Aliens");

    let x = storage.get_ranking(categories[0].id, item.id).await?.expect("x");
    let y = storage.get_ranking(categories[1].id, item.id).await?.expect("y");
    assert_eq!(x.notes.as_deref(), Some("sequel"));
    assert_eq!(y.notes, None);

    let stranger = context(&storage, Some("user-2"));
    let err = ItemLifecycle::new(stranger)
        .update_item(
            item.id,
            &ItemForm {
                project_id: project.id,
                category_id: categories[0].id,
                name: "Mine".into(),
                notes: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ActionError::Unauthorized));
    Ok(())
}

#[tokio::test]
async fn reorder_sets_dense_ranks_and_is_idempotent() -> Result<()> {
    let storage = InMemoryStorage::new();
    let ctx = context(&storage, Some("user-1"));

    let project = ProjectReconciler::new(ctx.clone())
        .create_project(&project_form("Films", &["Plot"]))
        .await?;
    let cat = storage.get_categories_by_project(project.id).await?[0].id;
    let item1 = add_item(&ctx, project.id, cat, "One").await?;
    let item2 = add_item(&ctx, project.id, cat, "Two").await?;
    let item3 = add_item(&ctx, project.id, cat, "Three").await?;

    let order: Vec<RankingPosition> = [item2.id, item3.id, item1.id]
        .iter()
        .map(|&item_id| RankingPosition {
            category_id: cat,
            item_id,
            project_id: Some(project.id),
        })
        .collect();

    let reorderer = RankingReorderer::new(ctx.clone());
    assert_eq!(reorderer.reorder_items(&order).await?.updated, 3);
    assert_eq!(reorderer.reorder_items(&order).await?.updated, 3);

    let ranked: Vec<(Uuid, i32)> = storage
        .get_rankings_by_category(cat)
        .await?
        .iter()
        .map(|r| (r.item_id, r.rank))
        .collect();
    assert_eq!(ranked, vec![(item2.id, 0), (item3.id, 1), (item1.id, 2)]);

    assert_eq!(reorderer.reorder_items(&[]).await?.updated, 0);
    Ok(())
}

#[tokio::test]
async fn reorder_skips_rows_owned_by_someone_else() -> Result<()> {
    let storage = InMemoryStorage::new();
    let owner = context(&storage, Some("user-1"));

    let project = ProjectReconciler::new(owner.clone())
        .create_project(&project_form("Films", &["Plot"]))
        .await?;
    let cat = storage.get_categories_by_project(project.id).await?[0].id;
    let item = add_item(&owner, project.id, cat, "One").await?;

    let outcome = RankingReorderer::new(context(&storage, Some("user-2")))
        .reorder_items(&[
            RankingPosition {
                category_id: cat,
                item_id: Uuid::new_v4(),
                project_id: None,
            },
            RankingPosition {
                category_id: cat,
                item_id: item.id,
                project_id: None,
            },
        ])
        .await?;
    assert_eq!(outcome.updated, 0);
    Ok(())
}

#[tokio::test]
async fn deleting_a_project_removes_everything_under_it() -> Result<()> {
    let storage = InMemoryStorage::new();
    let ctx = context(&storage, Some("user-1"));
    let projects = ProjectReconciler::new(ctx.clone());
    let queries = ProjectQueries::new(ctx.clone());

    let project = projects.create_project(&project_form("Films", &["Plot", "Score"])).await?;
    let cat = storage.get_categories_by_project(project.id).await?[0].id;
    let item = add_item(&ctx, project.id, cat, "Alien").await?;

    let stranger = ProjectReconciler::new(context(&storage, Some("user-2")));
    assert!(matches!(
        stranger.delete_project(project.id).await.unwrap_err(),
        ActionError::Unauthorized
    ));

    projects.delete_project(project.id).await?;

    assert!(matches!(
        queries.get_project(project.id).await.unwrap_err(),
        ActionError::NotFound(_)
    ));
    assert!(matches!(
        queries.get_item(item.id).await.unwrap_err(),
        ActionError::NotFound(_)
    ));
    assert!(matches!(
        queries.get_category_rankings(cat).await.unwrap_err(),
        ActionError::NotFound(_)
    ));
    assert!(storage.get_rankings_by_item(item.id).await?.is_empty());
    assert!(matches!(
        projects.delete_project(project.id).await.unwrap_err(),
        ActionError::NotFound(_)
    ));
    Ok(())
}

#[tokio::test]
async fn delete_item_returns_the_deleted_item() -> Result<()> {
    let storage = InMemoryStorage::new();
    let ctx = context(&storage, Some("user-1"));

    let project = ProjectReconciler::new(ctx.clone())
        .create_project(&project_form("Films", &["Plot"]))
        .await?;
    let cat = storage.get_categories_by_project(project.id).await?[0].id;
    let item = add_item(&ctx, project.id, cat, "Alien").await?;

    let items = ItemLifecycle::new(ctx);
    let deleted = items.delete_item(item.id).await?;
    assert_eq!(deleted.id, item.id);
    assert!(storage.get_rankings_by_category(cat).await?.is_empty());
    assert!(matches!(
        items.delete_item(item.id).await.unwrap_err(),
        ActionError::NotFound(_)
    ));
    Ok(())
}

#[tokio::test]
async fn empty_category_list_creates_no_project() -> Result<()> {
    let storage = InMemoryStorage::new();
    let ctx = context(&storage, Some("user-1"));

    let err = ProjectReconciler::new(ctx.clone())
        .create_project(&project_form("Films", &[]))
        .await
        .unwrap_err();
    assert!(matches!(err, ActionError::Validation(_)));
    assert!(ProjectQueries::new(ctx).list_projects().await?.is_empty());
    Ok(())
}

struct Seeded {
    project: Uuid,
    categories: Vec<Uuid>,
    items: Vec<Uuid>,
}

/// A project with two categories and two items, owned by `user-1`.
async fn seed(storage: &InMemoryStorage) -> Result<Seeded> {
    let ctx = context(storage, Some("user-1"));
    let project = ProjectReconciler::new(ctx.clone())
        .create_project(&project_form("Films", &["Plot", "Score"]))
        .await?;
    let categories: Vec<Uuid> = storage
        .get_categories_by_project(project.id)
        .await?
        .iter()
        .map(|c| c.id)
        .collect();
    let first = add_item(&ctx, project.id, categories[0], "Alien").await?;
    let second = add_item(&ctx, project.id, categories[0], "Heat").await?;
    Ok(Seeded {
        project: project.id,
        categories,
        items: vec![first.id, second.id],
    })
}

/// Every row visible to `user-1`, for before/after comparisons.
async fn snapshot(storage: &InMemoryStorage) -> Result<Vec<ProjectDetail>> {
    let queries = ProjectQueries::new(context(storage, Some("user-1")));
    let mut details = Vec::new();
    for project in queries.list_projects().await? {
        details.push(queries.get_project(project.id).await?);
    }
    Ok(details)
}

/// Run every mutating action against the seeded rows.
async fn attempt_every_action(ctx: &ActionContext, seeded: &Seeded) -> Vec<ActionResult<()>> {
    let projects = ProjectReconciler::new(ctx.clone());
    let items = ItemLifecycle::new(ctx.clone());
    let item_form = ItemForm {
        project_id: seeded.project,
        category_id: seeded.categories[1],
        name: "Ronin".into(),
        notes: Some("n".into()),
    };
    let order = vec![
        RankingPosition {
            category_id: seeded.categories[0],
            item_id: seeded.items[1],
            project_id: Some(seeded.project),
        },
        RankingPosition {
            category_id: seeded.categories[0],
            item_id: seeded.items[0],
            project_id: Some(seeded.project),
        },
    ];

    vec![
        projects
            .create_project(&project_form("Other", &["A"]))
            .await
            .map(|_| ()),
        projects
            .update_project(seeded.project, &project_form("Renamed", &["Score", "Cast"]))
            .await
            .map(|_| ()),
        items.create_item(&item_form).await.map(|_| ()),
        items
            .update_item(seeded.items[0], &item_form)
            .await
            .map(|_| ()),
        RankingReorderer::new(ctx.clone())
            .reorder_items(&order)
            .await
            .map(|_| ()),
        items.delete_item(seeded.items[1]).await.map(|_| ()),
        projects.delete_project(seeded.project).await.map(|_| ()),
    ]
}

#[tokio::test]
async fn anonymous_callers_write_nothing() -> Result<()> {
    let storage = InMemoryStorage::new();
    let seeded = seed(&storage).await?;
    let before = snapshot(&storage).await?;

    let results = attempt_every_action(&context(&storage, None), &seeded).await;
    assert_eq!(results.len(), 7);
    for result in results {
        assert!(matches!(result, Err(ActionError::Unauthorized)));
    }

    assert_eq!(snapshot(&storage).await?, before);

    let err = ProjectQueries::new(context(&storage, None))
        .list_projects()
        .await
        .unwrap_err();
    assert!(matches!(err, ActionError::Unauthorized));
    Ok(())
}

#[tokio::test]
async fn exhausted_quota_writes_nothing() -> Result<()> {
    let storage = InMemoryStorage::new();
    let seeded = seed(&storage).await?;
    let before = snapshot(&storage).await?;

    let ctx = ActionContext::new(
        Arc::new(storage.clone()),
        Arc::new(FixedSession(Some(UserId::new("user-1")))),
        Arc::new(CountingLimiter::new(0)),
    );
    let results = attempt_every_action(&ctx, &seeded).await;
    assert_eq!(results.len(), 7);
    for result in results {
        assert!(matches!(result, Err(ActionError::RateLimited)));
    }

    assert_eq!(snapshot(&storage).await?, before);

    // Queries spend no quota.
    let listed = ProjectQueries::new(ctx).list_projects().await?;
    assert_eq!(listed.len(), 1);
    Ok(())
}

#[tokio::test]
async fn quota_runs_out_mid_session() -> Result<()> {
    let storage = InMemoryStorage::new();
    let ctx = ActionContext::new(
        Arc::new(storage.clone()),
        Arc::new(FixedSession(Some(UserId::new("user-1")))),
        Arc::new(CountingLimiter::new(1)),
    );
    let projects = ProjectReconciler::new(ctx.clone());

    projects.create_project(&project_form("First", &["Plot"])).await?;
    let err = projects
        .create_project(&project_form("Second", &["Plot"]))
        .await
        .unwrap_err();
    assert!(matches!(err, ActionError::RateLimited));

    let listed = ProjectQueries::new(ctx).list_projects().await?;
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].name, "First");
    Ok(())
}

#[tokio::test]
async fn update_of_someone_elses_project_is_unauthorized() -> Result<()> {
    let storage = InMemoryStorage::new();
    let project = ProjectReconciler::new(context(&storage, Some("user-1")))
        .create_project(&project_form("Films", &["Plot"]))
        .await?;

    let err = ProjectReconciler::new(context(&storage, Some("user-2")))
        .update_project(project.id, &project_form("Mine", &["Other"]))
        .await
        .unwrap_err();
    assert!(matches!(err, ActionError::Unauthorized));

    let categories = storage.get_categories_by_project(project.id).await?;
    assert_eq!(categories.len(), 1);
    assert_eq!(categories[0].name, "Plot");
    Ok(())
}

#[tokio::test]
async fn id_matching_keeps_notes_across_a_rename() -> Result<()> {
    let storage = InMemoryStorage::new();
    let ctx = context(&storage, Some("user-1")).with_category_match(CategoryMatch::Id);
    let projects = ProjectReconciler::new(ctx.clone());

    let project = projects.create_project(&project_form("Films", &["Plot"])).await?;
    let plot = storage.get_categories_by_project(project.id).await?[0].clone();
    let item = ItemLifecycle::new(ctx.clone())
        .create_item(&ItemForm {
            project_id: project.id,
            category_id: plot.id,
            name: "Alien".into(),
            notes: Some("tense".into()),
        })
        .await?;

    projects
        .update_project(
            project.id,
            &ProjectForm {
                name: "Films".into(),
                categories: vec![CategoryInput {
                    id: Some(plot.id),
                    name: "Story".into(),
                }],
            },
        )
        .await?;

    let categories = storage.get_categories_by_project(project.id).await?;
    assert_eq!(categories.len(), 1);
    assert_eq!(categories[0].id, plot.id);
    assert_eq!(categories[0].name, "Story");
    let ranking = storage.get_ranking(plot.id, item.id).await?.expect("kept");
    assert_eq!(ranking.notes.as_deref(), Some("tense"));
    Ok(())
}

#[tokio::test]
async fn project_detail_nests_ranked_items() -> Result<()> {
    let storage = InMemoryStorage::new();
    let ctx = context(&storage, Some("user-1"));

    let project = ProjectReconciler::new(ctx.clone())
        .create_project(&project_form("Films", &["Plot", "Score"]))
        .await?;
    let cats = storage.get_categories_by_project(project.id).await?;
    let first = add_item(&ctx, project.id, cats[0].id, "Alien").await?;
    let second = add_item(&ctx, project.id, cats[0].id, "Heat").await?;

    RankingReorderer::new(ctx.clone())
        .reorder_items(&[
            RankingPosition {
                category_id: cats[1].id,
                item_id: second.id,
                project_id: None,
            },
            RankingPosition {
                category_id: cats[1].id,
                item_id: first.id,
                project_id: None,
            },
        ])
        .await?;

    let detail = ProjectQueries::new(ctx.clone()).get_project(project.id).await?;
    assert_eq!(detail.categories.len(), 2);
    assert_eq!(detail.categories[1].category.name, "Score");
    let names: Vec<&str> = detail.categories[1]
        .rankings
        .iter()
        .map(|r| r.item.name.as_str())
        .collect();
    assert_eq!(names, vec!["Heat", "Alien"]);

    let other = ProjectQueries::new(context(&storage, Some("user-2")));
    assert!(matches!(
        other.get_project(project.id).await.unwrap_err(),
        ActionError::NotFound(_)
    ));
    Ok(())
}
