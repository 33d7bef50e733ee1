//! # Product Repository
//!
//! Inventory CRUD.
//!
//! Deleting a product is a hard delete. Sale lines keep the product id and
//! their price snapshot, so past sales and receipts stay intact; the name
//! resolves to nothing and prints as "Unknown Product".
//!
//! Stock is only ever taken away inside a checkout transaction (see
//! [`super::sale`]); here it is set outright by an admin.

use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::repository::{generate_id, now};
use tally_core::validation::{
    validate_category, validate_description, validate_price_cents, validate_product_name,
    validate_search_query, validate_stock_quantity,
};
use tally_core::{CoreError, Product};

const PRODUCT_COLUMNS: &str =
    "id, name, description, price_cents, quantity, category, created_at, updated_at";

/// Fields for a new product.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub description: Option<String>,
    pub price_cents: i64,
    pub quantity: i64,
    pub category: Option<String>,
}

impl NewProduct {
    fn validate(&self) -> Result<(), CoreError> {
        validate_product_name(&self.name)?;
        validate_description(self.description.as_deref())?;
        validate_price_cents(self.price_cents)?;
        validate_stock_quantity(self.quantity)?;
        validate_category(self.category.as_deref())?;
        Ok(())
    }
}

/// Partial update. `None` leaves the column unchanged.
#[derive(Debug, Clone, Default)]
pub struct ProductUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price_cents: Option<i64>,
    pub quantity: Option<i64>,
    pub category: Option<String>,
}

impl ProductUpdate {
    fn validate(&self) -> Result<(), CoreError> {
        if let Some(name) = &self.name {
            validate_product_name(name)?;
        }
        validate_description(self.description.as_deref())?;
        if let Some(price) = self.price_cents {
            validate_price_cents(price)?;
        }
        if let Some(quantity) = self.quantity {
            validate_stock_quantity(quantity)?;
        }
        validate_category(self.category.as_deref())?;
        Ok(())
    }
}

/// Listing filter: substring match on name/description, exact category.
#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    pub search: Option<String>,
    pub category: Option<String>,
}

/// Repository for product database operations.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Lists products ordered by name.
    pub async fn list(&self, filter: &ProductFilter) -> DbResult<Vec<Product>> {
        let search = match filter.search.as_deref() {
            Some(q) => Some(validate_search_query(q).map_err(CoreError::from)?),
            None => None,
        }
        .filter(|q| !q.is_empty());
        let category = filter
            .category
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty());

        debug!(search = ?search, category = ?category, "Listing products");

        let sql = format!(
            r#"
            SELECT {PRODUCT_COLUMNS}
            FROM products
            WHERE (?1 IS NULL OR name LIKE '%' || ?1 || '%' OR description LIKE '%' || ?1 || '%')
              AND (?2 IS NULL OR category = ?2)
            ORDER BY name COLLATE NOCASE, id
            "#
        );

        let products = sqlx::query_as::<_, Product>(&sql)
            .bind(search)
            .bind(category)
            .fetch_all(&self.pool)
            .await?;

        debug!(count = products.len(), "Listed products");
        Ok(products)
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1");
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(product)
    }

    /// Inserts a product and returns it.
    pub async fn insert(&self, new: &NewProduct) -> DbResult<Product> {
        new.validate()?;

        let id = generate_id();
        let now = now();

        sqlx::query(
            r#"
            INSERT INTO products (
                id, name, description, price_cents, quantity, category, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
            "#,
        )
        .bind(&id)
        .bind(new.name.trim())
        .bind(&new.description)
        .bind(new.price_cents)
        .bind(new.quantity)
        .bind(new.category.as_deref().map(str::trim))
        .bind(now)
        .execute(&self.pool)
        .await?;

        info!(id = %id, name = %new.name, "Product created");

        self.get_by_id(&id)
            .await?
            .ok_or_else(|| DbError::not_found("Product", &id))
    }

    /// Applies a partial update and returns the updated product.
    pub async fn update(&self, id: &str, changes: &ProductUpdate) -> DbResult<Product> {
        changes.validate()?;

        let result = sqlx::query(
            r#"
            UPDATE products SET
                name        = COALESCE(?2, name),
                description = COALESCE(?3, description),
                price_cents = COALESCE(?4, price_cents),
                quantity    = COALESCE(?5, quantity),
                category    = COALESCE(?6, category),
                updated_at  = ?7
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(changes.name.as_deref().map(str::trim))
        .bind(&changes.description)
        .bind(changes.price_cents)
        .bind(changes.quantity)
        .bind(changes.category.as_deref().map(str::trim))
        .bind(now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        info!(id = %id, "Product updated");

        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Product", id))
    }

    /// Permanently removes a product.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM products WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        info!(id = %id, "Product deleted");
        Ok(())
    }

    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
