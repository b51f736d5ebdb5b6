use platelog_core::{Dish, DishIngredient, Macros};
use sqlx::SqlitePool;
use tracing::warn;
use uuid::Uuid;

use super::{format_timestamp, parse_timestamp, parse_uuid};

pub struct DishRepository {
    pool: SqlitePool,
}

/// One (dish, ingredient record) edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DishMembership {
    pub dish_id: Uuid,
    pub food_id: Uuid,
}

// Row types for database queries
#[derive(sqlx::FromRow)]
struct DishRow {
    id: String,
    name: String,
    original_name: Option<String>,
    created_at: String,
    image: Option<Vec<u8>>,
    calories: f64,
    protein: f64,
    carbs: f64,
    fat: f64,
}

#[derive(sqlx::FromRow)]
struct DishIngredientRow {
    food_id: String,
    name: String,
    calories: f64,
    protein: f64,
    carbs: f64,
    fat: f64,
    created_at: String,
}

impl DishRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, dish: &Dish) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO dishes (id, name, original_name, created_at, image, calories, protein, carbs, fat)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(dish.id.to_string())
        .bind(&dish.name)
        .bind(&dish.original_name)
        .bind(format_timestamp(&dish.created_at))
        .bind(dish.image.as_deref())
        .bind(dish.totals.calories)
        .bind(dish.totals.protein)
        .bind(dish.totals.carbs)
        .bind(dish.totals.fat)
        .execute(&mut *tx)
        .await?;

        Self::insert_ingredients(&mut tx, dish).await?;

        tx.commit().await
    }

    /// Rewrites the dish row and replaces its ingredient snapshots. The image
    /// column is only touched through `set_image`.
    pub async fn update(&self, dish: &Dish) -> Result<bool, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE dishes
            SET name = ?, original_name = ?, created_at = ?, calories = ?, protein = ?, carbs = ?, fat = ?
            WHERE id = ?
            "#,
        )
        .bind(&dish.name)
        .bind(&dish.original_name)
        .bind(format_timestamp(&dish.created_at))
        .bind(dish.totals.calories)
        .bind(dish.totals.protein)
        .bind(dish.totals.carbs)
        .bind(dish.totals.fat)
        .bind(dish.id.to_string())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(false);
        }

        sqlx::query("DELETE FROM dish_ingredients WHERE dish_id = ?")
            .bind(dish.id.to_string())
            .execute(&mut *tx)
            .await?;

        Self::insert_ingredients(&mut tx, dish).await?;

        tx.commit().await?;
        Ok(true)
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<Option<Dish>, sqlx::Error> {
        let row: Option<DishRow> = sqlx::query_as("SELECT * FROM dishes WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => self.hydrate_dish(row).await.map(Some),
            None => Ok(None),
        }
    }

    /// All dishes, newest first. Rows that fail to decode are skipped.
    pub async fn list(&self) -> Result<Vec<Dish>, sqlx::Error> {
        let rows: Vec<DishRow> = sqlx::query_as("SELECT * FROM dishes ORDER BY created_at DESC")
            .fetch_all(&self.pool)
            .await?;

        let mut dishes = Vec::with_capacity(rows.len());
        for row in rows {
            let id = row.id.clone();
            match self.hydrate_dish(row).await {
                Ok(dish) => dishes.push(dish),
                Err(sqlx::Error::Decode(e)) => {
                    warn!(id = %id, error = %e, "Skipping undecodable dish row");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(dishes)
    }

    /// Every ingredient reference of every stored dish.
    pub async fn memberships(&self) -> Result<Vec<DishMembership>, sqlx::Error> {
        let rows: Vec<(String, String)> =
            sqlx::query_as("SELECT dish_id, food_id FROM dish_ingredients ORDER BY dish_id, position")
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter()
            .map(|(dish_id, food_id)| {
                Ok(DishMembership {
                    dish_id: parse_uuid(&dish_id)?,
                    food_id: parse_uuid(&food_id)?,
                })
            })
            .collect()
    }

    pub async fn delete(&self, id: Uuid) -> Result<bool, sqlx::Error> {
        // CASCADE will handle ingredient snapshots
        let result = sqlx::query("DELETE FROM dishes WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn set_image(&self, id: Uuid, image: Option<&[u8]>) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE dishes SET image = ? WHERE id = ?")
            .bind(image)
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_ingredients(
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        dish: &Dish,
    ) -> Result<(), sqlx::Error> {
        let id = dish.id.to_string();

        for (position, ingredient) in dish.ingredients.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO dish_ingredients (dish_id, position, food_id, name, calories, protein, carbs, fat, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&id)
            .bind(position as i64)
            .bind(ingredient.food_id.to_string())
            .bind(&ingredient.name)
            .bind(ingredient.macros.calories)
            .bind(ingredient.macros.protein)
            .bind(ingredient.macros.carbs)
            .bind(ingredient.macros.fat)
            .bind(format_timestamp(&ingredient.created_at))
            .execute(&mut **tx)
            .await?;
        }

        Ok(())
    }

    async fn hydrate_dish(&self, row: DishRow) -> Result<Dish, sqlx::Error> {
        let ingredients: Vec<DishIngredientRow> = sqlx::query_as(
            "SELECT food_id, name, calories, protein, carbs, fat, created_at FROM dish_ingredients WHERE dish_id = ? ORDER BY position",
        )
        .bind(&row.id)
        .fetch_all(&self.pool)
        .await?;

        let ingredients = ingredients
            .into_iter()
            .map(|i| {
                Ok(DishIngredient {
                    food_id: parse_uuid(&i.food_id)?,
                    name: i.name,
                    macros: Macros::new(i.calories, i.protein, i.carbs, i.fat),
                    created_at: parse_timestamp(&i.created_at)?,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()?;

        Ok(Dish {
            id: parse_uuid(&row.id)?,
            name: row.name,
            original_name: row.original_name,
            created_at: parse_timestamp(&row.created_at)?,
            image: row.image,
            totals: Macros::new(row.calories, row.protein, row.carbs, row.fat),
            ingredients,
        })
    }
}
