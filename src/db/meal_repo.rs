use chrono::NaiveDate;
use platelog_core::{aggregate, Macros, Meal, MealFood, MealType};
use sqlx::SqlitePool;
use uuid::Uuid;

use super::parse_uuid;

pub struct MealRepository {
    pool: SqlitePool,
}

#[derive(sqlx::FromRow)]
struct MealRow {
    id: String,
    name: String,
    meal_type: String,
    date: String,
    notes: Option<String>,
    calories: f64,
    protein: f64,
    carbs: f64,
    fat: f64,
}

#[derive(sqlx::FromRow)]
struct MealFoodRow {
    id: String,
    food_id: String,
    name: String,
    amount: f64,
    unit: String,
    calories: f64,
    protein: f64,
    carbs: f64,
    fat: f64,
}

impl MealRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, meal: &Meal) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        let id = meal.id.to_string();

        sqlx::query(
            r#"
            INSERT INTO meals (id, name, meal_type, date, notes, calories, protein, carbs, fat)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&meal.name)
        .bind(meal.meal_type.as_str())
        .bind(meal.date.to_string())
        .bind(&meal.notes)
        .bind(meal.totals.calories)
        .bind(meal.totals.protein)
        .bind(meal.totals.carbs)
        .bind(meal.totals.fat)
        .execute(&mut *tx)
        .await?;

        for food in &meal.foods {
            sqlx::query(
                r#"
                INSERT INTO meal_foods (id, meal_id, food_id, name, amount, unit, calories, protein, carbs, fat)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(food.id.to_string())
            .bind(&id)
            .bind(food.food_id.to_string())
            .bind(&food.name)
            .bind(food.amount)
            .bind(&food.unit)
            .bind(food.macros.calories)
            .bind(food.macros.protein)
            .bind(food.macros.carbs)
            .bind(food.macros.fat)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<Option<Meal>, sqlx::Error> {
        let row: Option<MealRow> = sqlx::query_as("SELECT * FROM meals WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => self.hydrate_meal(row).await.map(Some),
            None => Ok(None),
        }
    }

    pub async fn list_for_date(&self, date: NaiveDate) -> Result<Vec<Meal>, sqlx::Error> {
        let rows: Vec<MealRow> =
            sqlx::query_as("SELECT * FROM meals WHERE date = ? ORDER BY meal_type, name")
                .bind(date.to_string())
                .fetch_all(&self.pool)
                .await?;

        let mut meals = Vec::with_capacity(rows.len());
        for row in rows {
            meals.push(self.hydrate_meal(row).await?);
        }
        Ok(meals)
    }

    pub async fn delete(&self, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM meals WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn hydrate_meal(&self, row: MealRow) -> Result<Meal, sqlx::Error> {
        let foods: Vec<MealFoodRow> = sqlx::query_as(
            "SELECT id, food_id, name, amount, unit, calories, protein, carbs, fat FROM meal_foods WHERE meal_id = ?",
        )
        .bind(&row.id)
        .fetch_all(&self.pool)
        .await?;

        let foods = foods
            .into_iter()
            .map(|f| {
                Ok(MealFood {
                    id: parse_uuid(&f.id)?,
                    food_id: parse_uuid(&f.food_id)?,
                    name: f.name,
                    amount: f.amount,
                    unit: f.unit,
                    macros: Macros::new(f.calories, f.protein, f.carbs, f.fat),
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()?;

        let meal_type: MealType = row
            .meal_type
            .parse()
            .map_err(|e: String| sqlx::Error::Decode(e.into()))?;
        let date = NaiveDate::parse_from_str(&row.date, "%Y-%m-%d")
            .map_err(|e| sqlx::Error::Decode(Box::new(e)))?;

        let mut meal = Meal {
            id: parse_uuid(&row.id)?,
            name: row.name,
            meal_type,
            date,
            notes: row.notes,
            totals: Macros::new(row.calories, row.protein, row.carbs, row.fat),
            foods,
        };
        // Cascaded food deletes leave the stored totals behind
        aggregate::recompute_meal(&mut meal);
        Ok(meal)
    }
}
