//! Product catalog: admin management plus the flash-priced storefront view.

use crate::entities::{product, product_variant, stock_key};
use crate::pricing::{FlashSaleService, effective_price};
use chrono::Utc;
use fulfillment::error::{Error, Result};
use fulfillment::model::{DeliveryType, ModelId, StockKeyStatus};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, NotSet, PaginatorTrait,
    QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub description: Option<String>,
    pub sale_price: i64,
    pub cost_price: i64,
    pub delivery_type: DeliveryType,
    #[serde(default)]
    pub use_manual_stock: bool,
    #[serde(default)]
    pub manual_stock_count: i32,
}

/// Partial update; absent fields keep their value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub sale_price: Option<i64>,
    pub cost_price: Option<i64>,
    pub delivery_type: Option<DeliveryType>,
    pub use_manual_stock: Option<bool>,
    pub manual_stock_count: Option<i32>,
    pub is_active: Option<bool>,
}

/// Storefront projection of a product with the flash price applied.
#[derive(Debug, Clone, Serialize)]
pub struct PricedProduct {
    pub id: ModelId,
    pub name: String,
    pub description: Option<String>,
    pub sale_price: i64,
    /// Price after any running flash discount; equals `sale_price` outside
    /// a sale.
    pub effective_price: i64,
    pub delivery_type: DeliveryType,
}

#[derive(Debug, Clone, Serialize)]
pub struct StockSummary {
    pub product_id: ModelId,
    pub use_manual_stock: bool,
    pub manual_stock_count: i32,
    pub available_keys: u64,
    pub assigned_keys: u64,
}

#[derive(Clone)]
pub struct CatalogService {
    db: DatabaseConnection,
    flash: FlashSaleService,
}

impl CatalogService {
    pub fn new(db: DatabaseConnection) -> Self {
        let flash = FlashSaleService::new(db.clone());
        Self { db, flash }
    }

    pub async fn create_product(&self, new: NewProduct) -> Result<product::Model> {
        if new.name.trim().is_empty() {
            return Err(Error::validation("product name is required"));
        }
        if new.sale_price <= 0 {
            return Err(Error::validation("sale price must be positive"));
        }
        if new.cost_price < 0 || new.manual_stock_count < 0 {
            return Err(Error::validation("prices and stock cannot be negative"));
        }

        let created = product::ActiveModel {
            id: NotSet,
            name: Set(new.name),
            description: Set(new.description),
            sale_price: Set(new.sale_price),
            cost_price: Set(new.cost_price),
            delivery_type: Set(new.delivery_type),
            use_manual_stock: Set(new.use_manual_stock),
            manual_stock_count: Set(new.manual_stock_count),
            is_active: Set(true),
            created_at: Set(Utc::now().naive_utc()),
        }
        .insert(&self.db)
        .await?;
        info!(product_id = created.id, "product created");
        Ok(created)
    }

    pub async fn update_product(
        &self,
        product_id: ModelId,
        patch: ProductPatch,
    ) -> Result<product::Model> {
        let existing = self.get_product(product_id).await?;
        if patch.sale_price.is_some_and(|p| p <= 0) {
            return Err(Error::validation("sale price must be positive"));
        }
        if patch.manual_stock_count.is_some_and(|c| c < 0) {
            return Err(Error::validation("stock cannot be negative"));
        }

        let mut active: product::ActiveModel = existing.into();
        if let Some(name) = patch.name {
            active.name = Set(name);
        }
        if let Some(description) = patch.description {
            active.description = Set(Some(description));
        }
        if let Some(sale_price) = patch.sale_price {
            active.sale_price = Set(sale_price);
        }
        if let Some(cost_price) = patch.cost_price {
            active.cost_price = Set(cost_price);
        }
        if let Some(delivery_type) = patch.delivery_type {
            active.delivery_type = Set(delivery_type);
        }
        if let Some(use_manual_stock) = patch.use_manual_stock {
            active.use_manual_stock = Set(use_manual_stock);
        }
        if let Some(manual_stock_count) = patch.manual_stock_count {
            active.manual_stock_count = Set(manual_stock_count);
        }
        if let Some(is_active) = patch.is_active {
            active.is_active = Set(is_active);
        }
        Ok(active.update(&self.db).await?)
    }

    pub async fn get_product(&self, product_id: ModelId) -> Result<product::Model> {
        product::Entity::find_by_id(product_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| Error::not_found(format!("product {product_id}")))
    }

    pub async fn add_variant(
        &self,
        product_id: ModelId,
        name: String,
        sale_price: i64,
    ) -> Result<product_variant::Model> {
        if name.trim().is_empty() || sale_price <= 0 {
            return Err(Error::validation("variant needs a name and a positive price"));
        }
        self.get_product(product_id).await?;
        Ok(product_variant::ActiveModel {
            id: NotSet,
            product_id: Set(product_id),
            name: Set(name),
            sale_price: Set(sale_price),
            created_at: Set(Utc::now().naive_utc()),
        }
        .insert(&self.db)
        .await?)
    }

    pub async fn list_variants(&self, product_id: ModelId) -> Result<Vec<product_variant::Model>> {
        Ok(product_variant::Entity::find()
            .filter(product_variant::Column::ProductId.eq(product_id))
            .order_by_asc(product_variant::Column::Id)
            .all(&self.db)
            .await?)
    }

    /// Active products with the current flash discount folded into
    /// `effective_price`. The catalog price itself is never mutated.
    pub async fn storefront_listing(&self) -> Result<Vec<PricedProduct>> {
        let now = Utc::now().naive_utc();
        let config = self.flash.get().await?;
        let products = product::Entity::find()
            .filter(product::Column::IsActive.eq(true))
            .order_by_asc(product::Column::Id)
            .all(&self.db)
            .await?;

        Ok(products
            .into_iter()
            .map(|p| {
                let discount = config.discount_for(p.id, now);
                PricedProduct {
                    id: p.id,
                    name: p.name,
                    description: p.description,
                    effective_price: effective_price(
                        p.sale_price,
                        discount,
                        config.enabled,
                        config.ends_at,
                        now,
                    ),
                    sale_price: p.sale_price,
                    delivery_type: p.delivery_type,
                }
            })
            .collect())
    }

    /// Bulk-load single-use keys as `available` inventory.
    pub async fn upload_stock_keys(
        &self,
        product_id: ModelId,
        payloads: Vec<String>,
    ) -> Result<u64> {
        let product = self.get_product(product_id).await?;
        if !product.delivery_type.uses_key_inventory() {
            return Err(Error::validation(format!(
                "product {product_id} is fulfilled manually and takes no stock keys"
            )));
        }
        let payloads: Vec<String> = payloads
            .into_iter()
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();
        if payloads.is_empty() {
            return Err(Error::validation("no stock keys supplied"));
        }

        let now = Utc::now().naive_utc();
        let count = payloads.len() as u64;
        let rows = payloads.into_iter().map(|payload| stock_key::ActiveModel {
            id: NotSet,
            product_id: Set(product_id),
            payload: Set(payload),
            status: Set(StockKeyStatus::Available),
            assigned_order_id: Set(None),
            used_by: Set(None),
            used_at: Set(None),
            created_at: Set(now),
        });
        stock_key::Entity::insert_many(rows).exec(&self.db).await?;
        info!(product_id, count, "stock keys uploaded");
        Ok(count)
    }

    pub async fn set_manual_stock(&self, product_id: ModelId, count: i32) -> Result<()> {
        if count < 0 {
            return Err(Error::validation("stock cannot be negative"));
        }
        let existing = self.get_product(product_id).await?;
        let mut active: product::ActiveModel = existing.into();
        active.manual_stock_count = Set(count);
        active.update(&self.db).await?;
        Ok(())
    }

    pub async fn stock_summary(&self, product_id: ModelId) -> Result<StockSummary> {
        let product = self.get_product(product_id).await?;
        let available_keys = stock_key::Entity::find()
            .filter(stock_key::Column::ProductId.eq(product_id))
            .filter(stock_key::Column::Status.eq(StockKeyStatus::Available))
            .count(&self.db)
            .await?;
        let assigned_keys = stock_key::Entity::find()
            .filter(stock_key::Column::ProductId.eq(product_id))
            .filter(stock_key::Column::Status.eq(StockKeyStatus::Assigned))
            .count(&self.db)
            .await?;
        Ok(StockSummary {
            product_id,
            use_manual_stock: product.use_manual_stock,
            manual_stock_count: product.manual_stock_count,
            available_keys,
            assigned_keys,
        })
    }
}
