use crate::app::context::{observe, ActionContext};
use crate::domain::{RankingPosition, ReorderOutcome};
use crate::error::ActionResult;
use crate::metrics::ActionMetrics;
use crate::storage::Mutation;
use chrono::Utc;
use tracing::{debug, info};

/// Persists a new top-to-bottom order: the pair at index `i` gets `rank = i`.
pub struct RankingReorderer {
    ctx: ActionContext,
}

impl RankingReorderer {
    pub fn new(ctx: ActionContext) -> Self {
        Self { ctx }
    }

    /// Returns how many rankings were actually written. Pairs that are stale or
    /// belong to another user are skipped without failing the call.
    pub async fn reorder_items(&self, positions: &[RankingPosition]) -> ActionResult<ReorderOutcome> {
        observe("reorder_items", self.reorder(positions).await)
    }

    async fn reorder(&self, positions: &[RankingPosition]) -> ActionResult<ReorderOutcome> {
        let user = self.ctx.authorize("reorder_items").await?;
        if positions.is_empty() {
            return Ok(ReorderOutcome { updated: 0 });
        }

        let now = Utc::now();
        let mutations: Vec<Mutation> = positions
            .iter()
            .enumerate()
            .map(|(rank, position)| Mutation::SetRank {
                user_id: user.clone(),
                category_id: position.category_id,
                item_id: position.item_id,
                rank: rank as i32,
                updated_at: now,
            })
            .collect();

        let updated = self.ctx.storage.commit(&mutations).await?;
        if updated < positions.len() {
            debug!(
                "Skipped {} of {} reorder rows not owned by {}",
                positions.len() - updated,
                positions.len(),
                user
            );
        }

        ActionMetrics::record_reordered(updated);
        info!("Reordered {} rankings", updated);
        Ok(ReorderOutcome { updated })
    }
}
