//! Diffing a project's stored categories against the list submitted with the
//! project form.
//!
//! The output is a [`CategoryPlan`]: which stored rows to delete, which to
//! update (new name and position) and which names to insert. The plan is pure
//! data; [`crate::app::projects`] turns it into store mutations.

use crate::domain::{Category, CategoryInput};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use uuid::Uuid;

/// How desired entries are paired with stored categories.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoryMatch {
    /// Pair by exact name. A rename looks like delete + insert, so the renamed
    /// category starts over with fresh rankings and no notes.
    #[default]
    Name,
    /// Pair by the id echoed back by the form first, then by name for entries
    /// without a usable id. Renames keep their rankings.
    Id,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryUpdate {
    pub category_id: Uuid,
    pub name: String,
    pub order_index: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryInsert {
    pub name: String,
    pub order_index: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryPlan {
    pub deletes: Vec<Uuid>,
    pub updates: Vec<CategoryUpdate>,
    pub inserts: Vec<CategoryInsert>,
}

/// Build the plan that turns `current` into `desired`.
///
/// Every desired entry ends up either as an update of exactly one stored row or
/// as an insert, with `order_index` equal to its position in `desired`. A stored
/// row is consumed by at most one entry, so duplicate names in `desired` match
/// only once and the extra copies are inserted. Stored rows left unconsumed are
/// deleted, including stored duplicates nobody asked for.
pub fn plan_categories(
    current: &[Category],
    desired: &[CategoryInput],
    policy: CategoryMatch,
) -> CategoryPlan {
    let mut consumed: HashSet<Uuid> = HashSet::new();
    let mut matched: Vec<Option<Uuid>> = vec![None; desired.len()];

    if policy == CategoryMatch::Id {
        let known: HashSet<Uuid> = current.iter().map(|c| c.id).collect();
        for (slot, entry) in matched.iter_mut().zip(desired) {
            if let Some(id) = entry.id {
                if known.contains(&id) && consumed.insert(id) {
                    *slot = Some(id);
                }
            }
        }
    }

    // name -> stored rows with that name, in display order
    let mut by_name: HashMap<&str, VecDeque<Uuid>> = HashMap::new();
    for category in current {
        by_name
            .entry(category.name.as_str())
            .or_default()
            .push_back(category.id);
    }

    let mut plan = CategoryPlan::default();
    for (position, (entry, slot)) in desired.iter().zip(matched).enumerate() {
        let order_index = position as i32;
        let hit = slot.or_else(|| {
            let queue = by_name.get_mut(entry.name.as_str())?;
            while let Some(id) = queue.pop_front() {
                if consumed.insert(id) {
                    return Some(id);
                }
            }
            None
        });

        match hit {
            Some(category_id) => plan.updates.push(CategoryUpdate {
                category_id,
                name: entry.name.clone(),
                order_index,
            }),
            None => plan.inserts.push(CategoryInsert {
                name: entry.name.clone(),
                order_index,
            }),
        }
    }

    plan.deletes = current
        .iter()
        .filter(|c| !consumed.contains(&c.id))
        .map(|c| c.id)
        .collect();

    plan
}
