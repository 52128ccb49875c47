//! Admin-managed product bundles.

use crate::entities::bundle;
use chrono::{NaiveDateTime, Utc};
use fulfillment::error::{Error, Result};
use fulfillment::model::ModelId;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, NotSet,
    QueryFilter, QueryOrder, Set,
};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct NewBundle {
    pub name: String,
    pub product_ids: Vec<ModelId>,
    pub original_price: i64,
    pub sale_price: i64,
    pub valid_until: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BundlePatch {
    pub name: Option<String>,
    pub product_ids: Option<Vec<ModelId>>,
    pub original_price: Option<i64>,
    pub sale_price: Option<i64>,
    pub is_active: Option<bool>,
    pub valid_until: Option<NaiveDateTime>,
}

fn check_prices(original_price: i64, sale_price: i64) -> Result<()> {
    if original_price <= 0 || sale_price <= 0 {
        return Err(Error::validation("bundle prices must be positive"));
    }
    if sale_price > original_price {
        return Err(Error::validation(
            "bundle sale price cannot exceed the original price",
        ));
    }
    Ok(())
}

#[derive(Clone)]
pub struct BundleService {
    db: DatabaseConnection,
}

impl BundleService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn create(&self, new: NewBundle) -> Result<bundle::Model> {
        if new.name.trim().is_empty() {
            return Err(Error::validation("bundle name is required"));
        }
        if new.product_ids.is_empty() {
            return Err(Error::validation("a bundle needs at least one product"));
        }
        check_prices(new.original_price, new.sale_price)?;

        Ok(bundle::ActiveModel {
            id: NotSet,
            name: Set(new.name),
            product_ids: Set(serde_json::json!(new.product_ids)),
            original_price: Set(new.original_price),
            sale_price: Set(new.sale_price),
            is_active: Set(true),
            valid_until: Set(new.valid_until),
            created_at: Set(Utc::now().naive_utc()),
        }
        .insert(&self.db)
        .await?)
    }

    pub async fn update(&self, id: ModelId, patch: BundlePatch) -> Result<bundle::Model> {
        let existing = bundle::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_else(|| Error::not_found(format!("bundle {id}")))?;

        let original = patch.original_price.unwrap_or(existing.original_price);
        let sale = patch.sale_price.unwrap_or(existing.sale_price);
        check_prices(original, sale)?;
        if patch.product_ids.as_ref().is_some_and(|ids| ids.is_empty()) {
            return Err(Error::validation("a bundle needs at least one product"));
        }

        let mut active: bundle::ActiveModel = existing.into();
        if let Some(name) = patch.name {
            active.name = Set(name);
        }
        if let Some(product_ids) = patch.product_ids {
            active.product_ids = Set(serde_json::json!(product_ids));
        }
        active.original_price = Set(original);
        active.sale_price = Set(sale);
        if let Some(is_active) = patch.is_active {
            active.is_active = Set(is_active);
        }
        if let Some(valid_until) = patch.valid_until {
            active.valid_until = Set(Some(valid_until));
        }
        Ok(active.update(&self.db).await?)
    }

    pub async fn delete(&self, id: ModelId) -> Result<()> {
        let result = bundle::Entity::delete_by_id(id).exec(&self.db).await?;
        if result.rows_affected == 0 {
            return Err(Error::not_found(format!("bundle {id}")));
        }
        Ok(())
    }

    /// Storefront view: active bundles whose validity window is still open.
    pub async fn list_active(&self, now: NaiveDateTime) -> Result<Vec<bundle::Model>> {
        Ok(bundle::Entity::find()
            .filter(bundle::Column::IsActive.eq(true))
            .filter(
                Condition::any()
                    .add(bundle::Column::ValidUntil.is_null())
                    .add(bundle::Column::ValidUntil.gt(now)),
            )
            .order_by_asc(bundle::Column::Id)
            .all(&self.db)
            .await?)
    }

    pub async fn list_all(&self) -> Result<Vec<bundle::Model>> {
        Ok(bundle::Entity::find()
            .order_by_asc(bundle::Column::Id)
            .all(&self.db)
            .await?)
    }
}
