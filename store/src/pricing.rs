//! Flash sale configuration and display-time price projection.
//!
//! The config is one server-owned row; saving overwrites it wholesale and
//! bumps `version` so polling clients can tell a stale copy from a fresh
//! one. Discounts never mutate the product's canonical price.

use crate::entities::flash_sale;
use chrono::NaiveDateTime;
use fulfillment::error::{Error, Result};
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set};
use serde::{Deserialize, Serialize};

const FLASH_SALE_ROW_ID: i32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductDiscount {
    pub product_id: i64,
    pub discount_amount: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlashSaleConfig {
    pub enabled: bool,
    pub ends_at: Option<NaiveDateTime>,
    pub discounts: Vec<ProductDiscount>,
    pub version: i64,
}

impl FlashSaleConfig {
    pub fn active(&self, now: NaiveDateTime) -> bool {
        self.enabled && self.ends_at.is_some_and(|end| now < end)
    }

    pub fn discount_for(&self, product_id: i64, now: NaiveDateTime) -> i64 {
        if !self.active(now) {
            return 0;
        }
        self.discounts
            .iter()
            .find(|d| d.product_id == product_id)
            .map(|d| d.discount_amount)
            .unwrap_or(0)
    }
}

/// Price shown (and charged) while a flash sale covers the product:
/// `max(0, base - discount)` until the sale ends, the base price after.
pub fn effective_price(
    base_price: i64,
    discount: i64,
    enabled: bool,
    ends_at: Option<NaiveDateTime>,
    now: NaiveDateTime,
) -> i64 {
    if enabled && ends_at.is_some_and(|end| now < end) {
        (base_price - discount).max(0)
    } else {
        base_price
    }
}

#[derive(Clone)]
pub struct FlashSaleService {
    db: DatabaseConnection,
}

impl FlashSaleService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Current config; a missing row reads as "no sale, version 0".
    pub async fn get(&self) -> Result<FlashSaleConfig> {
        let row = flash_sale::Entity::find_by_id(FLASH_SALE_ROW_ID)
            .one(&self.db)
            .await?;
        match row {
            Some(model) => {
                let discounts: Vec<ProductDiscount> = serde_json::from_value(model.discounts)
                    .map_err(|e| Error::validation(format!("stored flash sale config: {e}")))?;
                Ok(FlashSaleConfig {
                    enabled: model.enabled,
                    ends_at: model.ends_at,
                    discounts,
                    version: model.version,
                })
            }
            None => Ok(FlashSaleConfig {
                enabled: false,
                ends_at: None,
                discounts: Vec::new(),
                version: 0,
            }),
        }
    }

    /// Overwrite the config wholesale and bump its version.
    pub async fn save(
        &self,
        enabled: bool,
        ends_at: Option<NaiveDateTime>,
        discounts: Vec<ProductDiscount>,
    ) -> Result<FlashSaleConfig> {
        for discount in &discounts {
            if discount.discount_amount < 0 {
                return Err(Error::validation(format!(
                    "negative discount for product {}",
                    discount.product_id
                )));
            }
        }
        if enabled && ends_at.is_none() {
            return Err(Error::validation("an enabled flash sale needs an end time"));
        }

        let now = chrono::Utc::now().naive_utc();
        let discounts_json = serde_json::to_value(&discounts)
            .map_err(|e| Error::validation(format!("flash sale config: {e}")))?;

        let version = match flash_sale::Entity::find_by_id(FLASH_SALE_ROW_ID)
            .one(&self.db)
            .await?
        {
            Some(existing) => {
                let version = existing.version + 1;
                let mut active: flash_sale::ActiveModel = existing.into();
                active.enabled = Set(enabled);
                active.ends_at = Set(ends_at);
                active.discounts = Set(discounts_json);
                active.version = Set(version);
                active.updated_at = Set(now);
                active.update(&self.db).await?;
                version
            }
            None => {
                flash_sale::ActiveModel {
                    id: Set(FLASH_SALE_ROW_ID),
                    enabled: Set(enabled),
                    ends_at: Set(ends_at),
                    discounts: Set(discounts_json),
                    version: Set(1),
                    updated_at: Set(now),
                }
                .insert(&self.db)
                .await?;
                1
            }
        };

        tracing::info!(version, enabled, "flash sale config saved");
        Ok(FlashSaleConfig {
            enabled,
            ends_at,
            discounts,
            version,
        })
    }

    /// Active discount for one product, 0 outside a running sale.
    pub async fn discount_for(&self, product_id: i64, now: NaiveDateTime) -> Result<i64> {
        Ok(self.get().await?.discount_for(product_id, now))
    }
}
