//! Decides whether a food record is a standalone entry or a hidden
//! ingredient of some dish.
//!
//! This is the only place that classification happens. Rules are checked in
//! order and the first match wins:
//!
//! 1. explicitly force-hidden
//! 2. listed in the ingredient index
//! 3. tombstoned as a food or as a permanently deleted ingredient
//! 4. explicitly added as standalone
//! 5. referenced by a dish that has not been deleted
//! 6. owns composition lines of its own
//! 7. the most recently logged entry
//! 8. whatever the record and the mirror flag last said

use platelog_core::FoodRecord;
use std::collections::HashMap;
use std::fmt;
use tracing::debug;
use uuid::Uuid;

use crate::db::DishMembership;
use crate::mirror::MirrorState;

/// The rule that decided a classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    ForceHidden,
    IngredientIndex,
    Tombstoned,
    Standalone,
    DishReference,
    OwnsIngredients,
    LastLogged,
    Fallback,
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Rule::ForceHidden => "force-hidden",
            Rule::IngredientIndex => "ingredient-index",
            Rule::Tombstoned => "tombstoned",
            Rule::Standalone => "standalone",
            Rule::DishReference => "dish-reference",
            Rule::OwnsIngredients => "owns-ingredients",
            Rule::LastLogged => "last-logged",
            Rule::Fallback => "fallback",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ownership {
    pub hidden: bool,
    pub rule: Rule,
}

impl Ownership {
    fn hidden(rule: Rule) -> Self {
        Self { hidden: true, rule }
    }

    fn visible(rule: Rule) -> Self {
        Self {
            hidden: false,
            rule,
        }
    }

    pub fn is_visible(&self) -> bool {
        !self.hidden
    }
}

/// Which dishes reference each food id.
#[derive(Debug, Clone, Default)]
pub struct DishReferences {
    by_food: HashMap<Uuid, Vec<Uuid>>,
}

impl DishReferences {
    pub fn from_memberships(memberships: &[DishMembership]) -> Self {
        let mut by_food: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
        for m in memberships {
            by_food.entry(m.food_id).or_default().push(m.dish_id);
        }
        Self { by_food }
    }

    /// Every dish referencing `food_id` that is not tombstoned.
    pub fn live_dishes<'a>(
        &'a self,
        food_id: Uuid,
        state: &'a MirrorState,
    ) -> impl Iterator<Item = Uuid> + 'a {
        self.by_food
            .get(&food_id)
            .into_iter()
            .flatten()
            .copied()
            .filter(move |dish_id| !state.deleted_dishes.contains(dish_id))
    }

    /// A dish referencing `food_id` that is not tombstoned, if any.
    pub fn live_dish(&self, food_id: Uuid, state: &MirrorState) -> Option<Uuid> {
        self.live_dishes(food_id, state).next()
    }

    pub fn is_referenced(&self, food_id: Uuid, state: &MirrorState) -> bool {
        self.live_dish(food_id, state).is_some()
    }
}

/// Classifies `record`, writes the outcome into `record.is_ingredient` and
/// backfills mirror markers where a rule calls for it.
pub fn resolve(record: &mut FoodRecord, state: &mut MirrorState, refs: &DishReferences) -> Ownership {
    let id = record.id;
    let flags = state.flags(id);

    let ownership = if flags.force_hidden {
        Ownership::hidden(Rule::ForceHidden)
    } else if state.ingredient_index.contains(&id) {
        Ownership::hidden(Rule::IngredientIndex)
    } else if state.is_food_tombstoned(id) {
        Ownership::hidden(Rule::Tombstoned)
    } else if flags.standalone {
        Ownership::visible(Rule::Standalone)
    } else if refs.is_referenced(id, state) {
        state.ingredient_index.insert(id);
        state.flags_mut(id).ingredient = true;
        Ownership::hidden(Rule::DishReference)
    } else if record.is_composed() {
        Ownership::visible(Rule::OwnsIngredients)
    } else if state.last_logged == Some(id) {
        let flags = state.flags_mut(id);
        flags.standalone = true;
        flags.ingredient = false;
        Ownership::visible(Rule::LastLogged)
    } else {
        let hidden = record.is_ingredient || flags.ingredient;
        if hidden {
            state.flags_mut(id).ingredient = true;
        } else if let Some(flags) = state.flags.get_mut(&id) {
            flags.ingredient = false;
        }
        Ownership {
            hidden,
            rule: Rule::Fallback,
        }
    };

    record.is_ingredient = ownership.hidden;
    debug!(id = %id, name = %record.name, rule = %ownership.rule, hidden = ownership.hidden, "Resolved ownership");
    ownership
}
