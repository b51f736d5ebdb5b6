use platelog_core::MirrorEntry;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

/// Per-id ownership markers consulted by the resolver.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntryFlags {
    /// Hidden no matter what else says otherwise.
    pub force_hidden: bool,
    /// Explicitly added by the user as its own entry.
    pub standalone: bool,
    /// Last known ingredient classification.
    pub ingredient: bool,
}

impl EntryFlags {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// A copy of an entry image kept for recovery, keyed by entry name and the
/// id of the record that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageBackup {
    pub name: String,
    pub owner: Uuid,
    /// Hex SHA-256 of `data`.
    pub digest: String,
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
}

/// Everything the flat mirror store persists.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MirrorState {
    /// Recent list, newest first.
    pub entries: Vec<MirrorEntry>,
    pub deleted_foods: BTreeSet<Uuid>,
    pub deleted_dishes: BTreeSet<Uuid>,
    /// Permanently deleted ingredient ids with their last known name.
    pub deleted_ingredients: BTreeMap<Uuid, String>,
    pub flags: BTreeMap<Uuid, EntryFlags>,
    /// Ids known to be referenced by a live dish.
    pub ingredient_index: BTreeSet<Uuid>,
    pub last_logged: Option<Uuid>,
    pub image_backups: Vec<ImageBackup>,
}

/// Returned when something tries to put a tombstoned id back into the list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("refusing to mirror tombstoned id {0}")]
pub struct TombstoneViolation(pub Uuid);

impl MirrorState {
    /// True when the id is in any of the three tombstone sets.
    pub fn is_tombstoned(&self, id: Uuid) -> bool {
        self.is_food_tombstoned(id) || self.deleted_dishes.contains(&id)
    }

    pub fn is_food_tombstoned(&self, id: Uuid) -> bool {
        self.deleted_foods.contains(&id) || self.deleted_ingredients.contains_key(&id)
    }

    pub fn entry(&self, id: Uuid) -> Option<&MirrorEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.entry(id).is_some()
    }

    /// Removes the entry for `id` from the list. Returns whether one existed.
    pub fn remove(&mut self, id: Uuid) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.id != id);
        self.entries.len() != before
    }

    pub fn flags(&self, id: Uuid) -> EntryFlags {
        self.flags.get(&id).copied().unwrap_or_default()
    }

    pub fn flags_mut(&mut self, id: Uuid) -> &mut EntryFlags {
        self.flags.entry(id).or_default()
    }

    /// Records an explicit user add: visible, and the most recently logged.
    pub fn mark_standalone(&mut self, id: Uuid) {
        let flags = self.flags_mut(id);
        flags.standalone = true;
        flags.force_hidden = false;
        flags.ingredient = false;
        self.ingredient_index.remove(&id);
        self.last_logged = Some(id);
    }

    /// Marks an id as owned by a dish.
    pub fn mark_hidden(&mut self, id: Uuid) {
        let flags = self.flags_mut(id);
        flags.force_hidden = true;
        flags.ingredient = true;
        flags.standalone = false;
        self.ingredient_index.insert(id);
    }

    /// Drops the dish-ownership markers so the resolver decides afresh.
    pub fn release_hidden(&mut self, id: Uuid) {
        if let Some(flags) = self.flags.get_mut(&id) {
            flags.force_hidden = false;
            flags.ingredient = false;
            if flags.is_empty() {
                self.flags.remove(&id);
            }
        }
        self.ingredient_index.remove(&id);
    }

    pub fn tombstone_food(&mut self, id: Uuid, name: impl Into<String>) {
        self.deleted_foods.insert(id);
        self.deleted_ingredients.insert(id, name.into());
    }

    pub fn tombstone_ingredient(&mut self, id: Uuid, name: impl Into<String>) {
        self.deleted_ingredients.insert(id, name.into());
    }

    pub fn tombstone_dish(&mut self, id: Uuid) {
        self.deleted_dishes.insert(id);
    }

    /// Removes every key namespaced by `id` except the tombstones.
    pub fn purge(&mut self, id: Uuid) {
        self.remove(id);
        self.flags.remove(&id);
        self.ingredient_index.remove(&id);
        self.image_backups.retain(|b| b.owner != id);
        if self.last_logged == Some(id) {
            self.last_logged = None;
        }
    }

    /// Backups recorded under `name`, newest first.
    pub fn backups_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a ImageBackup> + 'a {
        self.image_backups.iter().rev().filter(move |b| b.name == name)
    }

    /// Stores a backup, replacing any earlier one for the same (name, owner).
    /// Returns false when an identical backup was already present.
    pub fn put_backup(&mut self, backup: ImageBackup) -> bool {
        if let Some(existing) = self
            .image_backups
            .iter()
            .position(|b| b.name == backup.name && b.owner == backup.owner)
        {
            if self.image_backups[existing].digest == backup.digest {
                return false;
            }
            self.image_backups.remove(existing);
        }
        self.image_backups.push(backup);
        true
    }
}

mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}
