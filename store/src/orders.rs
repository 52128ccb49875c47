//! Customer-facing order lifecycle: checkout, payment proof, reads.
//! Approval and rejection live in `fulfillment::approval`.

use crate::entities::{order, product, product_variant};
use crate::pricing::FlashSaleService;
use crate::proofs::{ProofStore, extension_for, validate_proof};
use chrono::Utc;
use fulfillment::error::{Error, Result};
use fulfillment::model::{ModelId, OrderStatus};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, NotSet, QueryFilter,
    QueryOrder, Set,
};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

#[derive(Clone)]
pub struct OrderService {
    db: DatabaseConnection,
    proofs: Arc<dyn ProofStore>,
    flash: FlashSaleService,
}

impl OrderService {
    pub fn new(db: DatabaseConnection, proofs: Arc<dyn ProofStore>) -> Self {
        let flash = FlashSaleService::new(db.clone());
        Self { db, proofs, flash }
    }

    /// Place an order. The price is resolved server-side: variant price
    /// over product price, minus any running flash discount, floored at
    /// zero. The client never supplies an amount.
    pub async fn create_order(
        &self,
        user_id: &str,
        product_id: ModelId,
        variant_id: Option<ModelId>,
    ) -> Result<order::Model> {
        if user_id.trim().is_empty() {
            return Err(Error::validation("a user id is required"));
        }

        let product = product::Entity::find_by_id(product_id)
            .one(&self.db)
            .await?
            .filter(|p| p.is_active)
            .ok_or_else(|| Error::not_found(format!("product {product_id}")))?;

        let base_price = match variant_id {
            Some(variant_id) => {
                let variant = product_variant::Entity::find_by_id(variant_id)
                    .one(&self.db)
                    .await?
                    .filter(|v| v.product_id == product_id)
                    .ok_or_else(|| {
                        Error::not_found(format!(
                            "variant {variant_id} of product {product_id}"
                        ))
                    })?;
                variant.sale_price
            }
            None => product.sale_price,
        };

        let now = Utc::now().naive_utc();
        let discount = self.flash.discount_for(product_id, now).await?;
        let total_amount = (base_price - discount).max(0);

        let created = order::ActiveModel {
            id: NotSet,
            user_id: Set(user_id.to_string()),
            product_id: Set(product_id),
            variant_id: Set(variant_id),
            status: Set(OrderStatus::Pending),
            total_amount: Set(total_amount),
            payment_proof_url: Set(None),
            credentials: Set(None),
            cancellation_reason: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&self.db)
        .await?;

        info!(
            order_id = created.id,
            product_id, total_amount, "order placed"
        );
        Ok(created)
    }

    /// Attach a payment proof and move the order to `submitted`.
    /// Re-uploading while still pending/submitted replaces the proof;
    /// terminal orders refuse it.
    pub async fn submit_payment_proof(
        &self,
        user_id: &str,
        order_id: ModelId,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<order::Model> {
        let existing = self.get_for_user(user_id, order_id).await?;
        if existing.status.is_terminal() {
            return Err(Error::conflict(format!(
                "order {} is {:?} and no longer accepts payment proofs",
                order_id, existing.status
            )));
        }

        validate_proof(bytes.len(), content_type)?;

        let name = format!(
            "order-{}-{}.{}",
            order_id,
            Uuid::new_v4().simple(),
            extension_for(content_type)
        );
        let url = self.proofs.put(&name, bytes).await?;

        let mut active: order::ActiveModel = existing.into();
        active.payment_proof_url = Set(Some(url));
        active.status = Set(OrderStatus::Submitted);
        active.updated_at = Set(Utc::now().naive_utc());
        let updated = active.update(&self.db).await?;

        info!(order_id, "payment proof submitted");
        Ok(updated)
    }

    pub async fn get_for_user(&self, user_id: &str, order_id: ModelId) -> Result<order::Model> {
        order::Entity::find_by_id(order_id)
            .one(&self.db)
            .await?
            .filter(|o| o.user_id == user_id)
            .ok_or_else(|| Error::not_found(format!("order {order_id}")))
    }

    pub async fn list_for_user(&self, user_id: &str) -> Result<Vec<order::Model>> {
        Ok(order::Entity::find()
            .filter(order::Column::UserId.eq(user_id))
            .order_by_desc(order::Column::CreatedAt)
            .all(&self.db)
            .await?)
    }

    /// Admin view: all orders, optionally narrowed to one status.
    pub async fn list_by_status(&self, status: Option<OrderStatus>) -> Result<Vec<order::Model>> {
        let mut query = order::Entity::find().order_by_desc(order::Column::CreatedAt);
        if let Some(status) = status {
            query = query.filter(order::Column::Status.eq(status));
        }
        Ok(query.all(&self.db).await?)
    }

    /// Admin delete. Removes the row outright; no stock or loyalty effects.
    pub async fn delete_order(&self, order_id: ModelId) -> Result<()> {
        let result = order::Entity::delete_by_id(order_id).exec(&self.db).await?;
        if result.rows_affected == 0 {
            return Err(Error::not_found(format!("order {order_id}")));
        }
        info!(order_id, "order deleted");
        Ok(())
    }
}
