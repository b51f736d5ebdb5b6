//! Entry images: storage on the record, backups in the mirror store, and a
//! recovery chain for records whose own image has gone missing or corrupt.

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::GenericImageView;
use platelog_core::EntryKind;
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::db::{DishRepository, FoodRepository};
use crate::mirror::{ImageBackup, MirrorState};

/// Smallest primary image accepted as real data.
pub const MIN_PRIMARY_LEN: usize = 50;
/// Smallest backup accepted during recovery.
pub const MIN_BACKUP_LEN: usize = 100;
/// Longest side of a stored image.
pub const MAX_DIMENSION: u32 = 800;
pub const JPEG_QUALITY: u8 = 60;

/// A last-resort source of images, consulted after backups.
pub trait ImageLookup: Send + Sync {
    fn lookup(&self, id: Uuid, name: &str) -> Option<Vec<u8>>;
}

impl<F> ImageLookup for F
where
    F: Fn(Uuid, &str) -> Option<Vec<u8>> + Send + Sync,
{
    fn lookup(&self, id: Uuid, name: &str) -> Option<Vec<u8>> {
        self(id, name)
    }
}

pub struct AssetManager {
    foods: FoodRepository,
    dishes: DishRepository,
    lookups: Vec<Box<dyn ImageLookup>>,
}

impl AssetManager {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            foods: FoodRepository::new(pool.clone()),
            dishes: DishRepository::new(pool),
            lookups: Vec::new(),
        }
    }

    pub fn register_lookup(&mut self, lookup: impl ImageLookup + 'static) {
        self.lookups.push(Box::new(lookup));
    }

    /// Stores `blob` on the record and keeps a backup under (`name`, `id`).
    ///
    /// Returns false when no record with that id exists; the backup is still
    /// kept so a later record with the same name can recover it.
    pub async fn put(
        &self,
        state: &mut MirrorState,
        kind: EntryKind,
        id: Uuid,
        name: &str,
        blob: &[u8],
    ) -> Result<bool, sqlx::Error> {
        let data = prepare(blob);
        let stored = self.write(kind, id, Some(&data)).await?;

        let backup = ImageBackup {
            name: name.to_string(),
            owner: id,
            digest: digest(&data),
            data,
        };
        if state.put_backup(backup) {
            debug!(id = %id, name, "Backed up image");
        }

        Ok(stored)
    }

    /// The record's image, recovering it from backups or lookups when the
    /// stored one is missing or invalid. A recovered image is written back.
    pub async fn get(
        &self,
        state: &MirrorState,
        kind: EntryKind,
        id: Uuid,
    ) -> Result<Option<Vec<u8>>, sqlx::Error> {
        let (name, primary) = match kind {
            EntryKind::Food => match self.foods.get_by_id(id).await? {
                Some(food) => (food.name, food.image),
                None => return Ok(None),
            },
            EntryKind::Dish => match self.dishes.get_by_id(id).await? {
                Some(dish) => (dish.name, dish.image),
                None => return Ok(None),
            },
        };

        if let Some(blob) = primary {
            if is_valid_primary(&blob) {
                return Ok(Some(blob));
            }
            warn!(id = %id, len = blob.len(), "Stored image is invalid, attempting recovery");
        }

        let recovered = state
            .backups_named(&name)
            .find(|b| is_valid_backup(&b.data))
            .map(|b| b.data.clone())
            .or_else(|| {
                self.lookups
                    .iter()
                    .filter_map(|l| l.lookup(id, &name))
                    .find(|blob| is_valid_primary(blob))
            });

        match recovered {
            Some(blob) => {
                debug!(id = %id, name = %name, "Recovered image");
                self.write(kind, id, Some(&blob)).await?;
                Ok(Some(blob))
            }
            None => Ok(None),
        }
    }

    async fn write(&self, kind: EntryKind, id: Uuid, blob: Option<&[u8]>) -> Result<bool, sqlx::Error> {
        match kind {
            EntryKind::Food => self.foods.set_image(id, blob).await,
            EntryKind::Dish => self.dishes.set_image(id, blob).await,
        }
    }
}

/// Downscales images larger than [`MAX_DIMENSION`] and re-encodes them as
/// JPEG. Anything that does not decode, or is already small enough, is kept
/// as is.
pub fn prepare(blob: &[u8]) -> Vec<u8> {
    let img = match image::load_from_memory(blob) {
        Ok(img) => img,
        Err(_) => return blob.to_vec(),
    };

    let (width, height) = img.dimensions();
    if width.max(height) <= MAX_DIMENSION {
        return blob.to_vec();
    }

    let resized = img.resize(MAX_DIMENSION, MAX_DIMENSION, FilterType::Triangle);
    let rgb = resized.to_rgb8();

    let mut out = Vec::new();
    match JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY).encode_image(&rgb) {
        Ok(()) => out,
        Err(e) => {
            warn!(error = %e, "Failed to re-encode image, keeping original");
            blob.to_vec()
        }
    }
}

pub fn is_valid_primary(blob: &[u8]) -> bool {
    blob.len() >= MIN_PRIMARY_LEN && decodes(blob)
}

pub fn is_valid_backup(blob: &[u8]) -> bool {
    blob.len() >= MIN_BACKUP_LEN && decodes(blob)
}

fn decodes(blob: &[u8]) -> bool {
    image::load_from_memory(blob).is_ok()
}

/// Hex SHA-256 of the blob.
pub fn digest(blob: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(blob);
    format!("{:x}", hasher.finalize())
}

/// A PNG of noise, large enough to pass both validity thresholds.
#[cfg(test)]
pub(crate) fn test_image(width: u32, height: u32) -> Vec<u8> {
    use image::{ImageBuffer, ImageFormat, Rgb};
    use std::io::Cursor;

    let img = ImageBuffer::from_fn(width, height, |x, y| {
        let v = (x.wrapping_mul(31) ^ y.wrapping_mul(17)).wrapping_add(x * y) as u8;
        Rgb([v, v.wrapping_mul(3), v.wrapping_add(91)])
    });
    let mut out = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut out, ImageFormat::Png)
        .unwrap();
    out.into_inner()
}
