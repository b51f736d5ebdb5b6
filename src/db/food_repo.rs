use platelog_core::{EntrySource, FoodRecord, IngredientLine, Macros};
use sqlx::SqlitePool;
use tracing::warn;
use uuid::Uuid;

use super::{format_timestamp, parse_timestamp, parse_uuid};

pub struct FoodRepository {
    pool: SqlitePool,
}

#[derive(sqlx::FromRow)]
struct FoodRow {
    id: String,
    name: String,
    calories: f64,
    protein: f64,
    carbs: f64,
    fat: f64,
    fiber: Option<f64>,
    sugar: Option<f64>,
    sodium: Option<f64>,
    serving_size: f64,
    serving_unit: String,
    created_at: String,
    image: Option<Vec<u8>>,
    is_ingredient: bool,
    is_favorite: bool,
    source: String,
    confidence: Option<f64>,
}

#[derive(sqlx::FromRow)]
struct IngredientRow {
    name: String,
    amount: f64,
    unit: String,
    calories: f64,
    protein: f64,
    carbs: f64,
    fat: f64,
}

impl FoodRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Inserts the record or overwrites every column of an existing row with
    /// the same id, replacing its ingredient lines.
    pub async fn upsert(&self, food: &FoodRecord) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let id = food.id.to_string();
        let created_at = format_timestamp(&food.created_at);
        let source = food.source.to_string();

        sqlx::query(
            r#"
            INSERT INTO foods (id, name, calories, protein, carbs, fat, fiber, sugar, sodium,
                               serving_size, serving_unit, created_at, image, is_ingredient,
                               is_favorite, source, confidence)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                calories = excluded.calories,
                protein = excluded.protein,
                carbs = excluded.carbs,
                fat = excluded.fat,
                fiber = excluded.fiber,
                sugar = excluded.sugar,
                sodium = excluded.sodium,
                serving_size = excluded.serving_size,
                serving_unit = excluded.serving_unit,
                created_at = excluded.created_at,
                image = excluded.image,
                is_ingredient = excluded.is_ingredient,
                is_favorite = excluded.is_favorite,
                source = excluded.source,
                confidence = excluded.confidence
            "#,
        )
        .bind(&id)
        .bind(&food.name)
        .bind(food.macros.calories)
        .bind(food.macros.protein)
        .bind(food.macros.carbs)
        .bind(food.macros.fat)
        .bind(food.fiber)
        .bind(food.sugar)
        .bind(food.sodium)
        .bind(food.serving_size)
        .bind(&food.serving_unit)
        .bind(&created_at)
        .bind(food.image.as_deref())
        .bind(food.is_ingredient)
        .bind(food.is_favorite)
        .bind(&source)
        .bind(food.confidence)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM food_ingredients WHERE food_id = ?")
            .bind(&id)
            .execute(&mut *tx)
            .await?;

        for (position, line) in food.ingredients.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO food_ingredients (food_id, position, name, amount, unit, calories, protein, carbs, fat)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&id)
            .bind(position as i64)
            .bind(&line.name)
            .bind(line.amount)
            .bind(&line.unit)
            .bind(line.macros.calories)
            .bind(line.macros.protein)
            .bind(line.macros.carbs)
            .bind(line.macros.fat)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<Option<FoodRecord>, sqlx::Error> {
        let row: Option<FoodRow> = sqlx::query_as("SELECT * FROM foods WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => self.hydrate_food(row).await.map(Some),
            None => Ok(None),
        }
    }

    /// Most recent record with this name, ignoring case.
    pub async fn find_by_name(&self, name: &str) -> Result<Option<FoodRecord>, sqlx::Error> {
        let row: Option<FoodRow> = sqlx::query_as(
            "SELECT * FROM foods WHERE LOWER(name) = LOWER(?) ORDER BY created_at DESC LIMIT 1",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => self.hydrate_food(row).await.map(Some),
            None => Ok(None),
        }
    }

    /// All records, newest first. Rows that fail to decode are skipped.
    pub async fn list(&self) -> Result<Vec<FoodRecord>, sqlx::Error> {
        let rows: Vec<FoodRow> = sqlx::query_as("SELECT * FROM foods ORDER BY created_at DESC")
            .fetch_all(&self.pool)
            .await?;

        let mut foods = Vec::with_capacity(rows.len());
        for row in rows {
            let id = row.id.clone();
            match self.hydrate_food(row).await {
                Ok(food) => foods.push(food),
                Err(sqlx::Error::Decode(e)) => {
                    warn!(id = %id, error = %e, "Skipping undecodable food row");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(foods)
    }

    pub async fn name_of(&self, id: Uuid) -> Result<Option<String>, sqlx::Error> {
        let row: Option<(String,)> = sqlx::query_as("SELECT name FROM foods WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.0))
    }

    /// Returns false when no row matched.
    pub async fn delete(&self, id: Uuid) -> Result<bool, sqlx::Error> {
        // CASCADE removes ingredient lines and meal associations
        let result = sqlx::query("DELETE FROM foods WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn set_image(&self, id: Uuid, image: Option<&[u8]>) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE foods SET image = ? WHERE id = ?")
            .bind(image)
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn set_is_ingredient(&self, id: Uuid, is_ingredient: bool) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE foods SET is_ingredient = ? WHERE id = ?")
            .bind(is_ingredient)
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn hydrate_food(&self, row: FoodRow) -> Result<FoodRecord, sqlx::Error> {
        let lines: Vec<IngredientRow> = sqlx::query_as(
            "SELECT name, amount, unit, calories, protein, carbs, fat FROM food_ingredients WHERE food_id = ? ORDER BY position",
        )
        .bind(&row.id)
        .fetch_all(&self.pool)
        .await?;

        Ok(FoodRecord {
            id: parse_uuid(&row.id)?,
            name: row.name,
            macros: Macros::new(row.calories, row.protein, row.carbs, row.fat),
            fiber: row.fiber,
            sugar: row.sugar,
            sodium: row.sodium,
            serving_size: row.serving_size,
            serving_unit: row.serving_unit,
            created_at: parse_timestamp(&row.created_at)?,
            image: row.image,
            is_ingredient: row.is_ingredient,
            is_favorite: row.is_favorite,
            source: row.source.parse().unwrap_or_default(),
            confidence: row.confidence,
            ingredients: lines
                .into_iter()
                .map(|l| {
                    IngredientLine::new(l.name, l.amount, l.unit)
                        .with_macros(Macros::new(l.calories, l.protein, l.carbs, l.fat))
                })
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db;
    use tempfile::TempDir;

    struct TestContext {
        repo: FoodRepository,
        _temp_dir: TempDir, // Keep alive for duration of test
    }

    async fn setup_repo() -> TestContext {
        let temp_dir = TempDir::new().unwrap();
        let pool = init_db(&temp_dir.path().join("test.db")).await.unwrap();
        TestContext {
            repo: FoodRepository::new(pool),
            _temp_dir: temp_dir,
        }
    }

    #[tokio::test]
    async fn test_upsert_and_get_food() {
        let ctx = setup_repo().await;
        let repo = &ctx.repo;

        let mut food = FoodRecord::new("Banana", Macros::new(89.0, 1.1, 22.8, 0.3))
            .with_serving(118.0, "g")
            .with_image(vec![7u8; 64]);
        food.fiber = Some(2.6);
        food.source = EntrySource::Barcode;
        repo.upsert(&food).await.unwrap();

        let fetched = repo.get_by_id(food.id).await.unwrap().unwrap();
        assert_eq!(fetched, food);
    }

    #[tokio::test]
    async fn test_upsert_overwrites_existing_row() {
        let ctx = setup_repo().await;
        let repo = &ctx.repo;

        let mut food = FoodRecord::new("Pizza", Macros::calories(266.0)).with_ingredients(vec![
            IngredientLine::named("dough"),
            IngredientLine::named("cheese"),
        ]);
        repo.upsert(&food).await.unwrap();

        food.macros.calories = 280.0;
        food.ingredients = vec![IngredientLine::new("dough", 120.0, "g")];
        repo.upsert(&food).await.unwrap();

        let all = repo.list().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].macros.calories, 280.0);
        assert_eq!(all[0].ingredients.len(), 1);
        assert_eq!(all[0].ingredients[0].amount, 120.0);
    }

    #[tokio::test]
    async fn test_find_by_name_case_insensitive() {
        let ctx = setup_repo().await;
        let repo = &ctx.repo;

        let food = FoodRecord::new("Greek Yogurt", Macros::calories(59.0));
        repo.upsert(&food).await.unwrap();

        let found = repo.find_by_name("greek yogurt").await.unwrap().unwrap();
        assert_eq!(found.id, food.id);
        assert!(repo.find_by_name("yogurt").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_newest_first() {
        let ctx = setup_repo().await;
        let repo = &ctx.repo;

        let mut older = FoodRecord::new("Older", Macros::default());
        older.created_at = chrono::Utc::now() - chrono::Duration::hours(1);
        let newer = FoodRecord::new("Newer", Macros::default());
        repo.upsert(&older).await.unwrap();
        repo.upsert(&newer).await.unwrap();

        let names: Vec<String> = repo.list().await.unwrap().into_iter().map(|f| f.name).collect();
        assert_eq!(names, vec!["Newer", "Older"]);
    }

    #[tokio::test]
    async fn test_corrupt_timestamp_is_a_decode_error() {
        let ctx = setup_repo().await;
        let repo = &ctx.repo;

        let good = FoodRecord::new("Apple", Macros::calories(52.0));
        let bad = FoodRecord::new("Pear", Macros::calories(57.0));
        repo.upsert(&good).await.unwrap();
        repo.upsert(&bad).await.unwrap();
        sqlx::query("UPDATE foods SET created_at = 'not a time' WHERE id = ?")
            .bind(bad.id.to_string())
            .execute(&repo.pool)
            .await
            .unwrap();

        assert!(matches!(
            repo.get_by_id(bad.id).await,
            Err(sqlx::Error::Decode(_))
        ));
        let names: Vec<String> = repo.list().await.unwrap().into_iter().map(|f| f.name).collect();
        assert_eq!(names, vec!["Apple"]);
    }

    #[tokio::test]
    async fn test_delete_reports_missing_rows() {
        let ctx = setup_repo().await;
        let repo = &ctx.repo;

        let food = FoodRecord::new("Toast", Macros::calories(75.0))
            .with_ingredients(vec![IngredientLine::named("bread")]);
        repo.upsert(&food).await.unwrap();

        assert!(repo.delete(food.id).await.unwrap());
        assert!(!repo.delete(food.id).await.unwrap());
        assert!(repo.get_by_id(food.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_flag_and_image_updates() {
        let ctx = setup_repo().await;
        let repo = &ctx.repo;

        let food = FoodRecord::new("Tomato", Macros::calories(18.0));
        repo.upsert(&food).await.unwrap();

        assert!(repo.set_is_ingredient(food.id, true).await.unwrap());
        assert!(repo.set_image(food.id, Some(&[1, 2, 3])).await.unwrap());
        assert!(!repo.set_image(Uuid::new_v4(), None).await.unwrap());

        let fetched = repo.get_by_id(food.id).await.unwrap().unwrap();
        assert!(fetched.is_ingredient);
        assert_eq!(fetched.image, Some(vec![1, 2, 3]));
        assert_eq!(repo.name_of(food.id).await.unwrap().as_deref(), Some("Tomato"));
    }
}
