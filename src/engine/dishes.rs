//! Dish lifecycle: creation, ingredient edits, relogging, deletion and
//! restoring a dish whose ingredient records have gone missing.

use chrono::Utc;
use platelog_core::{aggregate, ChangeEvent, Dish, DishIngredient, EntryKind, FoodRecord, MirrorEntry, ModelError};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{flush, guard, Engine, EngineError};
use crate::mirror::MirrorStore;
use crate::ownership::{self, DishReferences};

impl Engine {
    /// Creates a dish from freshly recognized ingredient records. The
    /// ingredients are stored hidden and the dish goes to the front of the
    /// recent list.
    pub async fn create_dish(
        &self,
        name: &str,
        mut ingredients: Vec<FoodRecord>,
        image: Option<Vec<u8>>,
    ) -> Result<Dish, EngineError> {
        if name.trim().is_empty() {
            return Err(ModelError::EmptyName.into());
        }
        if ingredients.is_empty() {
            return Err(ModelError::NoIngredients.into());
        }
        for ingredient in &ingredients {
            ingredient.macros.validate()?;
        }

        let mut mirror = self.mirror.lock().await;

        for ingredient in &mut ingredients {
            self.store_hidden(&mut mirror, ingredient).await;
        }

        let mut dish = Dish::new(name).with_ingredients(&ingredients);
        self.dishes.create(&dish).await?;

        if let Some(blob) = image {
            self.assets
                .put(mirror.state_mut(), EntryKind::Dish, dish.id, &dish.name, &blob)
                .await?;
            dish.image = Some(blob);
        }

        guard(mirror.upsert_front(MirrorEntry::from(&dish)));
        flush(&mirror)?;
        drop(mirror);

        info!(id = %dish.id, name = %dish.name, ingredients = dish.ingredients.len(), "Created dish");
        self.notify(ChangeEvent::EntriesChanged);
        Ok(dish)
    }

    /// Adds an ingredient record to a dish, or refreshes its snapshot if it
    /// is already there.
    pub async fn add_dish_ingredient(
        &self,
        dish_id: Uuid,
        mut ingredient: FoodRecord,
    ) -> Result<Dish, EngineError> {
        ingredient.macros.validate()?;
        let mut mirror = self.mirror.lock().await;
        let mut dish = self.live_dish(&mirror, dish_id).await?;

        self.store_hidden(&mut mirror, &mut ingredient).await;
        dish.add_ingredient(&ingredient);
        self.dishes.update(&dish).await?;

        guard(mirror.replace_in_place(MirrorEntry::from(&dish)));
        flush(&mirror)?;
        drop(mirror);

        debug!(dish = %dish_id, ingredient = %ingredient.id, "Added dish ingredient");
        self.notify(ChangeEvent::EntriesChanged);
        Ok(dish)
    }

    /// Removes an ingredient from a dish. When no other live dish references
    /// the record it is classified afresh, and shows up in the recent list if
    /// it turns out to be standalone.
    pub async fn remove_dish_ingredient(
        &self,
        dish_id: Uuid,
        food_id: Uuid,
    ) -> Result<Dish, EngineError> {
        let mut mirror = self.mirror.lock().await;
        let mut dish = self.live_dish(&mirror, dish_id).await?;

        if !dish.remove_ingredient(food_id) {
            return Err(EngineError::not_found("Ingredient", food_id));
        }
        self.dishes.update(&dish).await?;
        guard(mirror.replace_in_place(MirrorEntry::from(&dish)));

        let refs = self.dish_references().await?;
        if !refs.is_referenced(food_id, mirror.state()) {
            mirror.state_mut().release_hidden(food_id);

            if let Some(mut food) = self.foods.get_by_id(food_id).await? {
                food.is_ingredient = false;
                let ownership = ownership::resolve(&mut food, mirror.state_mut(), &refs);
                self.foods.set_is_ingredient(food_id, food.is_ingredient).await?;

                if ownership.is_visible() {
                    guard(mirror.insert_ordered(MirrorEntry::from(&food)));
                } else {
                    mirror.remove(food_id);
                }
            }
        }

        flush(&mirror)?;
        drop(mirror);

        debug!(dish = %dish_id, ingredient = %food_id, "Removed dish ingredient");
        self.notify(ChangeEvent::EntriesChanged);
        Ok(dish)
    }

    /// Logs a dish again: it becomes the newest entry.
    pub async fn relog_dish(&self, id: Uuid) -> Result<Dish, EngineError> {
        let mut mirror = self.mirror.lock().await;
        let mut dish = self.live_dish(&mirror, id).await?;

        dish.created_at = Utc::now();
        aggregate::recompute(&mut dish);
        self.dishes.update(&dish).await?;

        guard(mirror.upsert_front(MirrorEntry::from(&dish)));
        flush(&mirror)?;
        drop(mirror);

        info!(id = %id, name = %dish.name, "Relogged dish");
        self.notify(ChangeEvent::EntriesChanged);
        Ok(dish)
    }

    /// Deletes a dish. Its ingredient records are kept in the store but are
    /// hidden for good.
    ///
    /// `ingredients` names records the caller knows belong to the dish; they
    /// are handled along with the ones the store knows about. Returns false
    /// when the dish was already deleted.
    pub async fn delete_dish(&self, id: Uuid, ingredients: &[Uuid]) -> Result<bool, EngineError> {
        let mut mirror = self.mirror.lock().await;

        let stored = self.dishes.get_by_id(id).await?;
        if stored.is_none() {
            if mirror.state().deleted_dishes.contains(&id) {
                debug!(id = %id, "Dish already deleted");
                return Ok(false);
            }
            if !mirror.state().contains(id) && ingredients.is_empty() {
                return Err(EngineError::not_found("Dish", id));
            }
        }

        let snapshots: Vec<DishIngredient> = stored
            .as_ref()
            .map(|d| d.ingredients.clone())
            .unwrap_or_default();

        let mut ids: Vec<Uuid> = ingredients.to_vec();
        for snapshot in &snapshots {
            if !ids.contains(&snapshot.food_id) {
                ids.push(snapshot.food_id);
            }
        }

        for food_id in ids {
            let name = match self.foods.get_by_id(food_id).await? {
                Some(food) => {
                    if !food.is_ingredient {
                        self.foods.set_is_ingredient(food_id, true).await?;
                    }
                    food.name
                }
                None => snapshots
                    .iter()
                    .find(|s| s.food_id == food_id)
                    .map(|s| s.name.clone())
                    .unwrap_or_default(),
            };

            let state = mirror.state_mut();
            let flags = state.flags_mut(food_id);
            flags.force_hidden = true;
            flags.ingredient = true;
            flags.standalone = false;
            state.tombstone_ingredient(food_id, name);
            state.remove(food_id);
        }

        self.dishes.delete(id).await?;

        let state = mirror.state_mut();
        state.tombstone_dish(id);
        state.purge(id);

        flush(&mirror)?;
        drop(mirror);

        info!(id = %id, "Deleted dish");
        self.notify(ChangeEvent::EntriesChanged);
        self.notify(ChangeEvent::DishDeleted { id });
        Ok(true)
    }

    /// Loads a dish with every ingredient resolved against the store.
    ///
    /// An ingredient record that has gone missing is rebuilt from the dish's
    /// snapshot, unless it was deleted for good. Fails with
    /// [`EngineError::DishRestore`] when no ingredient can be resolved.
    pub async fn dish(&self, id: Uuid) -> Result<Dish, EngineError> {
        let mut mirror = self.mirror.lock().await;
        let mut dish = self.live_dish(&mirror, id).await?;

        let mut resolved = Vec::with_capacity(dish.ingredients.len());
        let mut rebuilt = 0;
        for snapshot in &dish.ingredients {
            match self.foods.get_by_id(snapshot.food_id).await? {
                Some(food) => resolved.push(DishIngredient::snapshot(&food)),
                None if mirror.state().is_food_tombstoned(snapshot.food_id) => {
                    debug!(dish = %id, ingredient = %snapshot.food_id, "Skipping deleted ingredient");
                }
                None => {
                    let mut food = snapshot.reconstruct();
                    mirror.state_mut().mark_hidden(food.id);
                    self.write_food(&mut food).await;
                    warn!(dish = %id, ingredient = %food.id, name = %food.name, "Rebuilt missing ingredient");
                    resolved.push(snapshot.clone());
                    rebuilt += 1;
                }
            }
        }

        if resolved.is_empty() {
            return Err(EngineError::DishRestore { id });
        }

        if resolved != dish.ingredients || !aggregate::is_consistent(&dish) {
            dish.ingredients = resolved;
            aggregate::recompute(&mut dish);
            self.dishes.update(&dish).await?;
            if mirror.state().contains(id) {
                guard(mirror.replace_in_place(MirrorEntry::from(&dish)));
            }
        }

        if rebuilt > 0 {
            info!(id = %id, rebuilt, "Restored dish ingredients");
        }
        flush(&mirror)?;
        Ok(dish)
    }

    pub async fn list_dishes(&self) -> Result<Vec<Dish>, EngineError> {
        let mirror = self.mirror.lock().await;
        let dishes = self.dishes.list().await?;
        Ok(dishes
            .into_iter()
            .filter(|d| !mirror.state().deleted_dishes.contains(&d.id))
            .collect())
    }

    /// Rewrites the snapshot, totals and recent entry of every live dish
    /// referencing `food` whose copy of it is out of date.
    pub(super) async fn refresh_dishes(
        &self,
        mirror: &mut MirrorStore,
        refs: &DishReferences,
        food: &FoodRecord,
    ) -> Result<(), EngineError> {
        let dish_ids: Vec<Uuid> = refs.live_dishes(food.id, mirror.state()).collect();
        for dish_id in dish_ids {
            let Some(mut dish) = self.dishes.get_by_id(dish_id).await? else {
                continue;
            };
            if !dish.refresh_ingredient(food) {
                continue;
            }

            self.dishes.update(&dish).await?;
            if mirror.state().contains(dish_id) {
                guard(mirror.replace_in_place(MirrorEntry::from(&dish)));
            }
            debug!(dish = %dish_id, ingredient = %food.id, "Refreshed dish totals");
        }
        Ok(())
    }

    async fn live_dish(&self, mirror: &MirrorStore, id: Uuid) -> Result<Dish, EngineError> {
        if mirror.state().deleted_dishes.contains(&id) {
            return Err(EngineError::not_found("Dish", id));
        }
        self.dishes
            .get_by_id(id)
            .await?
            .ok_or_else(|| EngineError::not_found("Dish", id))
    }

    /// Stores a record as a hidden ingredient and takes it off the recent
    /// list.
    async fn store_hidden(&self, mirror: &mut MirrorStore, food: &mut FoodRecord) {
        mirror.state_mut().mark_hidden(food.id);
        food.is_ingredient = true;
        self.write_food(food).await;
        mirror.remove(food.id);
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use crate::assets::test_image;
    use crate::engine::EngineError;
    use platelog_core::{ChangeEvent, EntryKind, EntrySource, Macros, RecognizedEntry};
    use uuid::Uuid;

    #[tokio::test]
    async fn test_create_dish_hides_ingredients() {
        let ctx = setup().await;
        let rice = ingredient("Rice", 130.0, 2.7);
        let salmon = ingredient("Salmon", 208.0, 20.0);

        let dish = ctx
            .engine
            .create_dish("Salmon bowl", vec![rice.clone(), salmon.clone()], None)
            .await
            .unwrap();

        assert_eq!(dish.totals.calories, 338.0);
        assert_eq!(dish.totals.protein, 22.7);
        assert_eq!(recent_names(&ctx.engine).await, vec!["Salmon bowl"]);

        let stored = ctx.engine.food(rice.id).await.unwrap().unwrap();
        assert!(stored.is_ingredient);

        let report = ctx.engine.resynchronize().await.unwrap();
        assert_eq!(report.entries, 1);
        assert_eq!(recent_names(&ctx.engine).await, vec!["Salmon bowl"]);
    }

    #[tokio::test]
    async fn test_create_dish_validation() {
        let ctx = setup().await;

        let empty = ctx.engine.create_dish("Bowl", vec![], None).await;
        assert!(matches!(empty, Err(EngineError::InvalidEntry(_))));

        let unnamed = ctx
            .engine
            .create_dish("  ", vec![ingredient("Rice", 130.0, 2.7)], None)
            .await;
        assert!(matches!(unnamed, Err(EngineError::InvalidEntry(_))));
    }

    #[tokio::test]
    async fn test_create_dish_with_image() {
        let ctx = setup().await;
        let img = test_image(32, 32);

        let dish = ctx
            .engine
            .create_dish("Bowl", vec![ingredient("Rice", 130.0, 2.7)], Some(img.clone()))
            .await
            .unwrap();

        assert!(ctx.engine.recent().await[0].has_image);
        let fetched = ctx.engine.image(EntryKind::Dish, dish.id).await.unwrap();
        assert_eq!(fetched, Some(img));
    }

    #[tokio::test]
    async fn test_standalone_beats_dish_reference() {
        let ctx = setup().await;
        let rice = ingredient("Rice", 130.0, 2.7);
        ctx.engine
            .create_dish("Bowl", vec![rice.clone()], None)
            .await
            .unwrap();

        // The user logs the same rice on its own.
        let saved = ctx
            .engine
            .save(draft("Rice", 130.0).with_id(rice.id), None, EntrySource::Manual)
            .await
            .unwrap();
        assert!(!saved.is_ingredient);
        assert_eq!(recent_names(&ctx.engine).await, vec!["Rice", "Bowl"]);

        ctx.engine.resynchronize().await.unwrap();
        assert_eq!(recent_names(&ctx.engine).await, vec!["Rice", "Bowl"]);
        let stored = ctx.engine.food(rice.id).await.unwrap().unwrap();
        assert!(!stored.is_ingredient);
    }

    #[tokio::test]
    async fn test_delete_dish_hides_ingredients_for_good() {
        let ctx = setup().await;
        let rice = ingredient("Rice", 130.0, 2.7);
        let salmon = ingredient("Salmon", 208.0, 20.0);
        let dish = ctx
            .engine
            .create_dish("Bowl", vec![rice.clone(), salmon.clone()], None)
            .await
            .unwrap();
        let mut events = ctx.engine.subscribe();

        assert!(ctx.engine.delete_dish(dish.id, &[]).await.unwrap());

        assert_eq!(events.try_recv().unwrap(), ChangeEvent::EntriesChanged);
        assert_eq!(events.try_recv().unwrap(), ChangeEvent::DishDeleted { id: dish.id });
        assert!(ctx.engine.recent().await.is_empty());

        // Ingredient records stay in the store, hidden.
        for id in [rice.id, salmon.id] {
            let food = ctx.engine.food(id).await.unwrap().unwrap();
            assert!(food.is_ingredient);
        }

        ctx.engine.resynchronize().await.unwrap();
        assert!(ctx.engine.recent().await.is_empty());

        // Deleting again is a no-op.
        assert!(!ctx.engine.delete_dish(dish.id, &[]).await.unwrap());
        assert!(matches!(
            ctx.engine.dish(dish.id).await,
            Err(EngineError::NotFound { kind: "Dish", .. })
        ));
    }

    #[tokio::test]
    async fn test_rescanned_ingredient_of_deleted_dish_stays_hidden() {
        let ctx = setup().await;
        let lettuce = ingredient("Lettuce", 15.0, 1.4);
        let dish = ctx
            .engine
            .create_dish("Salad", vec![lettuce.clone(), ingredient("Tomato", 18.0, 0.9)], None)
            .await
            .unwrap();
        ctx.engine.delete_dish(dish.id, &[]).await.unwrap();

        // A later recognition run yields the same name.
        let entry = RecognizedEntry::new("lettuce", 0.8, Macros::calories(15.0));
        let food = ctx.engine.ingest(entry).await.unwrap();

        assert_eq!(food.id, lettuce.id);
        assert!(food.is_ingredient);
        assert!(ctx.engine.recent().await.is_empty());

        ctx.engine.resynchronize().await.unwrap();
        assert!(ctx.engine.recent().await.is_empty());
    }

    #[tokio::test]
    async fn test_saving_ingredient_refreshes_dish_totals() {
        let ctx = setup().await;
        let rice = ingredient("Rice", 130.0, 2.7);
        let dish = ctx
            .engine
            .create_dish("Bowl", vec![rice.clone(), ingredient("Egg", 78.0, 6.3)], None)
            .await
            .unwrap();
        assert_eq!(dish.totals.calories, 208.0);

        ctx.engine
            .save(draft("Rice", 200.0).with_id(rice.id), None, EntrySource::Manual)
            .await
            .unwrap();

        let stored = ctx.engine.dishes.get_by_id(dish.id).await.unwrap().unwrap();
        assert_eq!(stored.totals.calories, 278.0);
        let entry = ctx.engine.recent().await.into_iter().find(|e| e.id == dish.id).unwrap();
        assert_eq!(entry.macros.calories, 278.0);

        // Resync and restore agree with the refreshed totals.
        ctx.engine.resynchronize().await.unwrap();
        let entry = ctx.engine.recent().await.into_iter().find(|e| e.id == dish.id).unwrap();
        assert_eq!(entry.macros.calories, 278.0);
        assert_eq!(ctx.engine.dish(dish.id).await.unwrap().totals.calories, 278.0);
    }

    #[tokio::test]
    async fn test_delete_dish_includes_caller_ingredients() {
        let ctx = setup().await;
        let dish = ctx
            .engine
            .create_dish("Bowl", vec![ingredient("Rice", 130.0, 2.7)], None)
            .await
            .unwrap();
        let extra = ctx
            .engine
            .save(draft("Sauce", 40.0), None, EntrySource::Manual)
            .await
            .unwrap();

        ctx.engine.delete_dish(dish.id, &[extra.id]).await.unwrap();

        assert!(ctx.engine.recent().await.is_empty());
        assert!(ctx.engine.food(extra.id).await.unwrap().unwrap().is_ingredient);
    }

    #[tokio::test]
    async fn test_delete_unknown_dish() {
        let ctx = setup().await;
        let result = ctx.engine.delete_dish(Uuid::new_v4(), &[]).await;
        assert!(matches!(result, Err(EngineError::NotFound { kind: "Dish", .. })));
    }

    #[tokio::test]
    async fn test_add_and_remove_ingredient_recomputes() {
        let ctx = setup().await;
        let rice = ingredient("Rice", 130.0, 2.7);
        let dish = ctx
            .engine
            .create_dish("Bowl", vec![rice.clone()], None)
            .await
            .unwrap();
        ctx.engine.save(draft("Tea", 2.0), None, EntrySource::Manual).await.unwrap();

        let egg = ingredient("Egg", 78.0, 6.3);
        let dish = ctx.engine.add_dish_ingredient(dish.id, egg.clone()).await.unwrap();
        assert_eq!(dish.totals.calories, 208.0);

        // Edited in place: the dish keeps its position behind the tea.
        let recent = ctx.engine.recent().await;
        assert_eq!(recent[1].name, "Bowl");
        assert_eq!(recent[1].macros.calories, 208.0);

        let dish = ctx.engine.remove_dish_ingredient(dish.id, rice.id).await.unwrap();
        assert_eq!(dish.totals, Macros::new(78.0, 6.3, 0.0, 0.0));
        assert_eq!(ctx.engine.recent().await[1].macros.calories, 78.0);
    }

    #[tokio::test]
    async fn test_removed_ingredient_is_reclassified() {
        let ctx = setup().await;
        let rice = ingredient("Rice", 130.0, 2.7);
        let egg = ingredient("Egg", 78.0, 6.3);
        let dish = ctx
            .engine
            .create_dish("Bowl", vec![rice.clone(), egg.clone()], None)
            .await
            .unwrap();

        ctx.engine.remove_dish_ingredient(dish.id, rice.id).await.unwrap();

        let stored = ctx.engine.food(rice.id).await.unwrap().unwrap();
        assert!(!stored.is_ingredient);
        assert_eq!(recent_names(&ctx.engine).await, vec!["Bowl", "Rice"]);

        let missing = ctx.engine.remove_dish_ingredient(dish.id, rice.id).await;
        assert!(matches!(missing, Err(EngineError::NotFound { kind: "Ingredient", .. })));
    }

    #[tokio::test]
    async fn test_ingredient_shared_by_two_dishes_stays_hidden() {
        let ctx = setup().await;
        let rice = ingredient("Rice", 130.0, 2.7);
        let first = ctx
            .engine
            .create_dish("Bowl", vec![rice.clone(), ingredient("Egg", 78.0, 6.3)], None)
            .await
            .unwrap();
        ctx.engine
            .create_dish("Fried rice", vec![rice.clone()], None)
            .await
            .unwrap();

        ctx.engine.remove_dish_ingredient(first.id, rice.id).await.unwrap();

        assert!(ctx.engine.food(rice.id).await.unwrap().unwrap().is_ingredient);
        assert_eq!(recent_names(&ctx.engine).await, vec!["Fried rice", "Bowl"]);
    }

    #[tokio::test]
    async fn test_relog_dish_moves_to_front() {
        let ctx = setup().await;
        let dish = ctx
            .engine
            .create_dish("Bowl", vec![ingredient("Rice", 130.0, 2.7)], None)
            .await
            .unwrap();
        ctx.engine.save(draft("Tea", 2.0), None, EntrySource::Manual).await.unwrap();

        let relogged = ctx.engine.relog_dish(dish.id).await.unwrap();
        assert!(relogged.created_at > dish.created_at);
        assert_eq!(recent_names(&ctx.engine).await, vec!["Bowl", "Tea"]);
    }

    #[tokio::test]
    async fn test_restore_rebuilds_missing_ingredient() {
        let ctx = setup().await;
        let rice = ingredient("Rice", 130.0, 2.7);
        let egg = ingredient("Egg", 78.0, 6.3);
        let dish = ctx
            .engine
            .create_dish("Bowl", vec![rice.clone(), egg.clone()], None)
            .await
            .unwrap();

        // The row vanishes behind the engine's back.
        ctx.engine.foods.delete(rice.id).await.unwrap();

        let restored = ctx.engine.dish(dish.id).await.unwrap();
        assert_eq!(restored.ingredients.len(), 2);
        assert_eq!(restored.totals.calories, 208.0);

        let rebuilt = ctx.engine.food(rice.id).await.unwrap().unwrap();
        assert_eq!(rebuilt.name, "Rice");
        assert!(rebuilt.is_ingredient);
        assert_eq!(recent_names(&ctx.engine).await, vec!["Bowl"]);
    }

    #[tokio::test]
    async fn test_restore_skips_deleted_ingredient() {
        let ctx = setup().await;
        let rice = ingredient("Rice", 130.0, 2.7);
        let egg = ingredient("Egg", 78.0, 6.3);
        let dish = ctx
            .engine
            .create_dish("Bowl", vec![rice.clone(), egg.clone()], None)
            .await
            .unwrap();

        ctx.engine.delete_food(rice.id).await.unwrap();

        let restored = ctx.engine.dish(dish.id).await.unwrap();
        assert_eq!(restored.ingredients.len(), 1);
        assert_eq!(restored.totals.calories, 78.0);
        assert!(ctx.engine.food(rice.id).await.unwrap().is_none());
        assert_eq!(ctx.engine.recent().await[0].macros.calories, 78.0);
    }

    #[tokio::test]
    async fn test_restore_with_nothing_left_fails() {
        let ctx = setup().await;
        let rice = ingredient("Rice", 130.0, 2.7);
        let dish = ctx
            .engine
            .create_dish("Bowl", vec![rice.clone()], None)
            .await
            .unwrap();

        ctx.engine.delete_food(rice.id).await.unwrap();

        let result = ctx.engine.dish(dish.id).await;
        assert!(matches!(result, Err(EngineError::DishRestore { id }) if id == dish.id));
    }
}
