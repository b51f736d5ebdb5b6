use platelog_core::{aggregate, ChangeEvent, MirrorEntry};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::{debug, info, warn};

use super::{flush, Engine, EngineError};
use crate::ownership::{self, DishReferences};

/// What a resynchronization pass changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResyncReport {
    /// Entries in the recent list afterwards.
    pub entries: usize,
    pub added: usize,
    pub removed: usize,
    /// Records whose stored ingredient flag was corrected.
    pub reclassified: usize,
    /// Records or dishes skipped because of a storage error.
    pub skipped: usize,
}

impl Engine {
    /// Rebuilds the mirror from the structured store.
    ///
    /// Every live dish gets exactly one entry with fresh totals and its
    /// ingredients flagged hidden, every visible food gets an entry, and
    /// everything else (hidden, tombstoned, orphaned, duplicate) is dropped
    /// before the list is ordered and capped. Safe to run at any time; never
    /// brings back a tombstoned id.
    pub async fn resynchronize(&self) -> Result<ResyncReport, EngineError> {
        let mut mirror = self.mirror.lock().await;
        let mut report = ResyncReport::default();

        let foods = self.foods.list().await?;
        let dishes = self.dishes.list().await?;
        let memberships = self.dishes.memberships().await?;
        let refs = DishReferences::from_memberships(&memberships);
        let before: HashSet<_> = mirror.entries().iter().map(|e| e.id).collect();

        let state = mirror.state_mut();
        let mut entries = Vec::new();
        let mut index = BTreeSet::new();
        let by_id: HashMap<_, _> = foods.iter().map(|f| (f.id, f)).collect();

        for mut dish in dishes {
            if state.deleted_dishes.contains(&dish.id) {
                // A crash between tombstoning and purging leaves the row behind.
                if let Err(e) = self.dishes.delete(dish.id).await {
                    warn!(id = %dish.id, error = %e, "Failed to purge deleted dish");
                    report.skipped += 1;
                }
                continue;
            }

            for food_id in dish.ingredient_ids() {
                if !state.flags(food_id).standalone {
                    index.insert(food_id);
                }
            }

            // Snapshots follow the current ingredient records
            let ids: Vec<_> = dish.ingredient_ids().collect();
            let mut refreshed = false;
            for food_id in ids {
                if let Some(food) = by_id.get(&food_id) {
                    refreshed |= dish.refresh_ingredient(food);
                }
            }

            if refreshed || !aggregate::is_consistent(&dish) {
                aggregate::recompute(&mut dish);
                if let Err(e) = self.dishes.update(&dish).await {
                    warn!(id = %dish.id, error = %e, "Failed to store dish totals, skipping");
                    report.skipped += 1;
                    continue;
                }
                debug!(id = %dish.id, "Recomputed dish totals");
            }
            entries.push(MirrorEntry::from(&dish));
        }

        for id in &index {
            state.flags_mut(*id).ingredient = true;
        }
        state.ingredient_index = index;

        for mut food in foods {
            let stored = food.is_ingredient;
            let ownership = ownership::resolve(&mut food, state, &refs);

            if food.is_ingredient != stored {
                if let Err(e) = self.foods.set_is_ingredient(food.id, food.is_ingredient).await {
                    warn!(id = %food.id, error = %e, "Failed to store ownership, skipping");
                    report.skipped += 1;
                    continue;
                }
                report.reclassified += 1;
            }

            if ownership.is_visible() {
                entries.push(MirrorEntry::from(&food));
            }
        }

        let refused = mirror.rebuild(entries);
        debug_assert!(refused.is_empty(), "tombstoned ids reached the mirror: {:?}", refused);

        let after: HashSet<_> = mirror.entries().iter().map(|e| e.id).collect();
        report.entries = after.len();
        report.added = after.difference(&before).count();
        report.removed = before.difference(&after).count();

        flush(&mirror)?;
        drop(mirror);

        info!(
            entries = report.entries,
            added = report.added,
            removed = report.removed,
            reclassified = report.reclassified,
            skipped = report.skipped,
            "Resynchronized"
        );
        self.notify(ChangeEvent::EntriesChanged);
        Ok(report)
    }
}
