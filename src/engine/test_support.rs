use chrono::{NaiveDate, Utc};
use platelog_core::{FoodDraft, FoodRecord, Macros};
use std::path::PathBuf;
use tempfile::TempDir;

use super::Engine;
use crate::db::init_db;
use crate::mirror::{MirrorStore, MIRROR_FILE};

pub struct TestContext {
    pub engine: Engine,
    pub temp_dir: TempDir, // Keep alive for duration of test
}

impl TestContext {
    pub fn mirror_path(&self) -> PathBuf {
        self.temp_dir.path().join(MIRROR_FILE)
    }

    /// A fresh engine over the same database and mirror file, as after a
    /// process restart.
    pub async fn reopen(&self) -> Engine {
        let pool = init_db(&self.temp_dir.path().join("test.db")).await.unwrap();
        let mirror = MirrorStore::load(self.mirror_path(), 50).unwrap();
        Engine::new(pool, mirror)
    }
}

pub async fn setup() -> TestContext {
    setup_with_limit(50).await
}

pub async fn setup_with_limit(limit: usize) -> TestContext {
    let temp_dir = TempDir::new().unwrap();
    let pool = init_db(&temp_dir.path().join("test.db")).await.unwrap();
    let mirror = MirrorStore::new(temp_dir.path().join(MIRROR_FILE), limit);
    TestContext {
        engine: Engine::new(pool, mirror),
        temp_dir,
    }
}

pub fn draft(name: &str, calories: f64) -> FoodDraft {
    FoodDraft::new(name, Macros::calories(calories))
}

pub fn ingredient(name: &str, calories: f64, protein: f64) -> FoodRecord {
    FoodRecord::new(name, Macros::new(calories, protein, 0.0, 0.0))
}

pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

pub async fn recent_names(engine: &Engine) -> Vec<String> {
    engine.recent().await.into_iter().map(|e| e.name).collect()
}
