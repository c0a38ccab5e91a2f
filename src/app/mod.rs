pub mod context;
pub mod items;
pub mod ports;
pub mod projects;
pub mod queries;
pub mod reconcile;
pub mod reorder;
pub mod response;
pub mod validation;

pub use context::ActionContext;
pub use items::ItemLifecycle;
pub use projects::ProjectReconciler;
pub use queries::ProjectQueries;
pub use reorder::RankingReorderer;
pub use response::ActionResponse;
