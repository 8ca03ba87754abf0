//! Meal catalog collaborator.
//!
//! The catalog resolves meal names and unit prices for display on the
//! read paths. It is never consulted to re-validate a caller-supplied
//! order total.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::{MealId, Money};
use sqlx::{PgPool, Row};

use crate::{Result, StoreError};

/// A catalog entry: what a meal is called and what one unit costs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Meal {
    pub meal_id: MealId,
    pub name: String,
    pub price: Money,
}

/// Trait for catalog lookups.
#[async_trait]
pub trait MealCatalog: Send + Sync {
    /// Looks up a meal by id. Returns `None` for unknown meals; display
    /// code falls back to a placeholder rather than failing the read.
    async fn get_meal(&self, meal_id: MealId) -> Result<Option<Meal>>;
}

/// In-memory meal catalog for tests and local runs.
#[derive(Clone, Default)]
pub struct InMemoryMealCatalog {
    meals: Arc<RwLock<HashMap<MealId, Meal>>>,
}

impl InMemoryMealCatalog {
    /// Creates a new empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a meal.
    pub fn insert(&self, meal: Meal) {
        self.meals.write().unwrap().insert(meal.meal_id, meal);
    }

    /// Creates a catalog pre-seeded with the given meals.
    pub fn with_meals(meals: impl IntoIterator<Item = Meal>) -> Self {
        let catalog = Self::new();
        for meal in meals {
            catalog.insert(meal);
        }
        catalog
    }
}

#[async_trait]
impl MealCatalog for InMemoryMealCatalog {
    async fn get_meal(&self, meal_id: MealId) -> Result<Option<Meal>> {
        Ok(self.meals.read().unwrap().get(&meal_id).cloned())
    }
}

/// PostgreSQL-backed meal catalog reading from the `meals` table.
#[derive(Clone)]
pub struct PostgresMealCatalog {
    pool: PgPool,
}

impl PostgresMealCatalog {
    /// Creates a new PostgreSQL catalog over an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MealCatalog for PostgresMealCatalog {
    async fn get_meal(&self, meal_id: MealId) -> Result<Option<Meal>> {
        let row = sqlx::query("SELECT meal_id, name, price_cents FROM meals WHERE meal_id = $1")
            .bind(meal_id.as_i64())
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::Database)?;

        match row {
            Some(row) => Ok(Some(Meal {
                meal_id: MealId::new(row.try_get("meal_id")?),
                name: row.try_get("name")?,
                price: Money::from_cents(row.try_get("price_cents")?),
            })),
            None => Ok(None),
        }
    }
}
