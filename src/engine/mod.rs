//! The consistency engine keeps the SQLite store and the mirror store in
//! agreement.
//!
//! SQLite is authoritative for which records exist and how they relate. The
//! mirror holds the recent list, the tombstones and the ownership flags, and
//! is repaired from SQLite by [`Engine::resynchronize`]. Every mutation runs
//! under one lock on the mirror and emits a single change event at the end.

mod dishes;
mod error;
mod resync;

#[cfg(test)]
mod test_support;

pub use error::EngineError;
pub use resync::ResyncReport;

use chrono::{NaiveDate, Utc};
use platelog_core::{
    ChangeEvent, EntryKind, EntrySource, FoodDraft, FoodRecord, LifecycleEvent, Meal, MealType,
    MirrorEntry, RecognizedEntry,
};
use sqlx::SqlitePool;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::assets::{AssetManager, ImageLookup};
use crate::config::Config;
use crate::db::{self, DishRepository, FoodRepository, MealRepository};
use crate::mirror::{MirrorStore, TombstoneViolation};
use crate::ownership::{self, DishReferences};

const EVENT_CAPACITY: usize = 64;

pub struct Engine {
    foods: FoodRepository,
    dishes: DishRepository,
    meals: MealRepository,
    assets: AssetManager,
    mirror: Mutex<MirrorStore>,
    events: broadcast::Sender<ChangeEvent>,
}

impl Engine {
    /// Opens the database (running migrations) and loads the mirror file
    /// from the configured data directory.
    pub async fn open(config: &Config) -> Result<Self, EngineError> {
        let pool = db::init_db(&config.database_path.value).await?;
        let mirror = MirrorStore::load(config.mirror_path(), config.recent_limit.value)?;
        Ok(Self::new(pool, mirror))
    }

    pub fn new(pool: SqlitePool, mirror: MirrorStore) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            foods: FoodRepository::new(pool.clone()),
            dishes: DishRepository::new(pool.clone()),
            meals: MealRepository::new(pool.clone()),
            assets: AssetManager::new(pool),
            mirror: Mutex::new(mirror),
            events,
        }
    }

    pub fn register_image_lookup(&mut self, lookup: impl ImageLookup + 'static) {
        self.assets.register_lookup(lookup);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.events.subscribe()
    }

    /// Upserts a food and puts it at the top of the recent list.
    ///
    /// The identity key is `draft.id`, or the name (case-insensitive) when
    /// no id is given. Re-saving refreshes `created_at` and nothing else
    /// that the draft does not carry.
    pub async fn save(
        &self,
        draft: FoodDraft,
        image: Option<Vec<u8>>,
        source: EntrySource,
    ) -> Result<FoodRecord, EngineError> {
        draft.validate()?;
        let mut mirror = self.mirror.lock().await;

        let existing = match draft.id {
            Some(id) => self.foods.get_by_id(id).await?,
            None => self.foods.find_by_name(&draft.name).await?,
        };
        let mut record = match existing {
            Some(mut record) => {
                draft.apply_to(&mut record);
                record
            }
            None => draft.into_record(),
        };
        record.created_at = Utc::now();
        record.source = source;

        let id = record.id;
        let tombstoned = mirror.state().is_tombstoned(id);
        if tombstoned {
            warn!(id = %id, name = %record.name, "Saving a deleted entry; it stays hidden");
        } else {
            mirror.state_mut().mark_standalone(id);
        }

        let refs = self.dish_references().await?;
        let ownership = ownership::resolve(&mut record, mirror.state_mut(), &refs);
        self.write_food(&mut record).await;
        self.refresh_dishes(&mut mirror, &refs, &record).await?;

        let mut has_image = record.has_image();
        if let Some(blob) = image {
            has_image |= self
                .assets
                .put(mirror.state_mut(), EntryKind::Food, id, &record.name, &blob)
                .await?;
        }

        if !tombstoned {
            if ownership.is_visible() {
                let mut entry = MirrorEntry::from(&record);
                entry.has_image = has_image;
                guard(mirror.upsert_front(entry));
            } else {
                mirror.remove(id);
            }
        }

        flush(&mirror)?;
        drop(mirror);

        info!(id = %id, name = %record.name, source = %source, "Saved food");
        self.notify(ChangeEvent::EntriesChanged);
        Ok(record)
    }

    /// Saves a recognizer result.
    pub async fn ingest(&self, entry: RecognizedEntry) -> Result<FoodRecord, EngineError> {
        let (draft, image) = entry.into_draft();
        self.save(draft, image, EntrySource::Recognition).await
    }

    /// Deletes a food for good.
    ///
    /// Returns false when the id was already deleted. An id that was never
    /// seen is an error.
    pub async fn delete_food(&self, id: Uuid) -> Result<bool, EngineError> {
        let mut mirror = self.mirror.lock().await;

        let stored = self.foods.get_by_id(id).await?;
        let state = mirror.state();
        if stored.is_none() {
            if state.deleted_foods.contains(&id) {
                debug!(id = %id, "Food already deleted");
                return Ok(false);
            }
            if !state.contains(id) && !state.is_food_tombstoned(id) {
                return Err(EngineError::not_found("Food", id));
            }
        }

        let name = stored
            .map(|f| f.name)
            .or_else(|| state.entry(id).map(|e| e.name.clone()))
            .or_else(|| state.deleted_ingredients.get(&id).cloned())
            .unwrap_or_default();

        self.foods.delete(id).await?;

        let state = mirror.state_mut();
        state.tombstone_food(id, name.clone());
        state.purge(id);

        flush(&mirror)?;
        drop(mirror);

        info!(id = %id, name = %name, "Deleted food");
        self.notify(ChangeEvent::EntriesChanged);
        Ok(true)
    }

    pub async fn food(&self, id: Uuid) -> Result<Option<FoodRecord>, EngineError> {
        Ok(self.foods.get_by_id(id).await?)
    }

    /// The recent list, newest first.
    pub async fn recent(&self) -> Vec<MirrorEntry> {
        self.mirror.lock().await.entries().to_vec()
    }

    pub async fn last_logged(&self) -> Option<Uuid> {
        self.mirror.lock().await.state().last_logged
    }

    /// An entry's image, recovered from backups when the stored one is bad.
    pub async fn image(&self, kind: EntryKind, id: Uuid) -> Result<Option<Vec<u8>>, EngineError> {
        let mirror = self.mirror.lock().await;
        Ok(self.assets.get(mirror.state(), kind, id).await?)
    }

    /// Replaces an entry's image.
    pub async fn attach_image(
        &self,
        kind: EntryKind,
        id: Uuid,
        blob: Vec<u8>,
    ) -> Result<(), EngineError> {
        let mut mirror = self.mirror.lock().await;

        let name = match kind {
            EntryKind::Food => self.foods.name_of(id).await?,
            EntryKind::Dish => self.dishes.get_by_id(id).await?.map(|d| d.name),
        }
        .ok_or_else(|| EngineError::not_found(kind_name(kind), id))?;

        self.assets
            .put(mirror.state_mut(), kind, id, &name, &blob)
            .await?;

        if let Some(entry) = mirror.state_mut().entries.iter_mut().find(|e| e.id == id) {
            entry.has_image = true;
        }

        flush(&mirror)?;
        drop(mirror);

        self.notify(ChangeEvent::EntriesChanged);
        Ok(())
    }

    /// Records a meal made of `(food id, amount)` portions.
    pub async fn log_meal(
        &self,
        date: NaiveDate,
        meal_type: MealType,
        portions: &[(Uuid, f64)],
        notes: Option<String>,
    ) -> Result<Meal, EngineError> {
        let mut meal = Meal::new(date, meal_type);
        meal.notes = notes;

        for &(food_id, amount) in portions {
            let food = self
                .foods
                .get_by_id(food_id)
                .await?
                .ok_or_else(|| EngineError::not_found("Food", food_id))?;
            meal.add_food(&food, amount);
        }

        self.meals.create(&meal).await?;
        info!(id = %meal.id, date = %date, meal_type = %meal_type, "Logged meal");
        Ok(meal)
    }

    pub async fn meals_on(&self, date: NaiveDate) -> Result<Vec<Meal>, EngineError> {
        Ok(self.meals.list_for_date(date).await?)
    }

    pub async fn meal(&self, id: Uuid) -> Result<Option<Meal>, EngineError> {
        Ok(self.meals.get_by_id(id).await?)
    }

    /// Removes a logged meal. Meals never reach the recent list, so the
    /// mirror is left alone. Returns false when no such meal exists.
    pub async fn delete_meal(&self, id: Uuid) -> Result<bool, EngineError> {
        let deleted = self.meals.delete(id).await?;
        if deleted {
            info!(id = %id, "Deleted meal");
        }
        Ok(deleted)
    }

    /// Lifecycle checkpoints always end in a full resynchronization.
    pub async fn handle_lifecycle(&self, event: LifecycleEvent) -> Result<ResyncReport, EngineError> {
        debug!(?event, "Lifecycle checkpoint");
        self.resynchronize().await
    }

    async fn dish_references(&self) -> Result<DishReferences, EngineError> {
        let memberships = self.dishes.memberships().await?;
        Ok(DishReferences::from_memberships(&memberships))
    }

    /// Writes a food row, refreshing and retrying once on failure. A second
    /// failure is logged and the in-memory record stands for the session.
    async fn write_food(&self, record: &mut FoodRecord) {
        let first = match self.foods.upsert(record).await {
            Ok(()) => return,
            Err(e) => e,
        };
        warn!(id = %record.id, error = %first, "Food write failed, retrying");

        if record.image.is_none() {
            if let Ok(Some(stored)) = self.foods.get_by_id(record.id).await {
                record.image = stored.image;
            }
        }

        if let Err(e) = self.foods.upsert(record).await {
            error!(id = %record.id, name = %record.name, error = %e, "Food write failed twice");
        }
    }

    fn notify(&self, event: ChangeEvent) {
        // No receivers is fine
        let _ = self.events.send(event);
    }
}

/// Mirror writes of tombstoned ids are bugs in the caller.
fn guard(result: Result<(), TombstoneViolation>) {
    if let Err(violation) = result {
        debug_assert!(false, "{}", violation);
        warn!(id = %violation.0, "Dropped mirror write for a deleted entry");
    }
}

fn flush(mirror: &MirrorStore) -> Result<(), EngineError> {
    mirror.flush().map_err(|e| {
        error!(error = %e, "Failed to flush mirror store");
        EngineError::from(e)
    })
}

fn kind_name(kind: EntryKind) -> &'static str {
    match kind {
        EntryKind::Food => "Food",
        EntryKind::Dish => "Dish",
    }
}
