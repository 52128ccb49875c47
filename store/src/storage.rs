//! SeaORM-backed implementation of the fulfillment storage traits.

use crate::entities::{
    bundle, coupon, flash_sale, fulfillment_task, loyalty_account, order, point_transaction,
    premium_membership, product, product_variant, referral, referral_code, stock_key,
    support_ticket,
};
use async_trait::async_trait;
use chrono::Utc;
use fulfillment::error::{Error, Result};
use fulfillment::model::{
    KeyAssignment, ModelId, OrderRecord, OrderStatus, PendingReferral, PointsAward,
    ReferralStatus, RewardsTask, StockKeyStatus, StockProfile, Tier,
};
use fulfillment::storage::{LoyaltyStore, OrderStore, ReferralStore, StockStore, TaskStore};
use sea_orm::sea_query::{Expr, OnConflict, TableCreateStatement};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, Database, DatabaseConnection, DbErr,
    EntityTrait, NotSet, QueryFilter, QueryOrder, Schema, Set,
};
use tracing::debug;

/// Create any missing tables. Used by the binaries at startup and by the
/// test suites against in-memory SQLite.
pub async fn ensure_schema(db: &DatabaseConnection) -> Result<()> {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    async fn create(db: &DatabaseConnection, mut stmt: TableCreateStatement) -> Result<()> {
        stmt.if_not_exists();
        db.execute(db.get_database_backend().build(&stmt)).await?;
        Ok(())
    }

    create(db, schema.create_table_from_entity(product::Entity)).await?;
    create(db, schema.create_table_from_entity(product_variant::Entity)).await?;
    create(db, schema.create_table_from_entity(stock_key::Entity)).await?;
    create(db, schema.create_table_from_entity(order::Entity)).await?;
    create(db, schema.create_table_from_entity(loyalty_account::Entity)).await?;
    create(db, schema.create_table_from_entity(point_transaction::Entity)).await?;
    create(db, schema.create_table_from_entity(referral::Entity)).await?;
    create(db, schema.create_table_from_entity(referral_code::Entity)).await?;
    create(db, schema.create_table_from_entity(premium_membership::Entity)).await?;
    create(db, schema.create_table_from_entity(bundle::Entity)).await?;
    create(db, schema.create_table_from_entity(flash_sale::Entity)).await?;
    create(db, schema.create_table_from_entity(coupon::Entity)).await?;
    create(db, schema.create_table_from_entity(fulfillment_task::Entity)).await?;
    create(db, schema.create_table_from_entity(support_ticket::Entity)).await?;
    Ok(())
}

/// One storage handle implementing every trait seam the workflow engine
/// needs. All state transitions are conditional updates so the database,
/// not the process, arbitrates races.
#[derive(Clone)]
pub struct StoreStorage {
    pub db: DatabaseConnection,
}

impl StoreStorage {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn connect(database_url: &str) -> Result<Self> {
        let db = Database::connect(database_url).await?;
        Ok(Self::new(db))
    }

    async fn apply_to_account(&self, user_id: &str, points: i64) -> Result<()> {
        let now = Utc::now().naive_utc();
        match loyalty_account::Entity::find_by_id(user_id.to_string())
            .one(&self.db)
            .await?
        {
            Some(account) => {
                let total = account.total_points + points;
                let lifetime = account.lifetime_points + points.max(0);
                let mut active: loyalty_account::ActiveModel = account.into();
                active.total_points = Set(total);
                active.lifetime_points = Set(lifetime);
                active.tier = Set(Tier::from_lifetime(lifetime));
                active.updated_at = Set(now);
                active.update(&self.db).await?;
            }
            None => {
                let initial = points.max(0);
                loyalty_account::ActiveModel {
                    user_id: Set(user_id.to_string()),
                    total_points: Set(initial),
                    lifetime_points: Set(initial),
                    tier: Set(Tier::from_lifetime(initial)),
                    updated_at: Set(now),
                }
                .insert(&self.db)
                .await?;
            }
        }
        Ok(())
    }
}

fn to_record(model: order::Model) -> OrderRecord {
    OrderRecord {
        id: model.id,
        user_id: model.user_id,
        product_id: model.product_id,
        variant_id: model.variant_id,
        status: model.status,
        total_amount: model.total_amount,
        created_at: model.created_at,
    }
}

#[async_trait]
impl OrderStore for StoreStorage {
    async fn get_order(&self, order_id: ModelId) -> Result<OrderRecord> {
        let model = order::Entity::find_by_id(order_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| Error::not_found(format!("order {order_id}")))?;
        Ok(to_record(model))
    }

    async fn mark_completed(
        &self,
        order_id: ModelId,
        credentials: serde_json::Value,
    ) -> Result<()> {
        let credentials = (!credentials.is_null()).then_some(credentials);
        let update = order::ActiveModel {
            status: Set(OrderStatus::Completed),
            credentials: Set(credentials),
            updated_at: Set(Utc::now().naive_utc()),
            ..Default::default()
        };
        let result = order::Entity::update_many()
            .set(update)
            .filter(order::Column::Id.eq(order_id))
            .filter(order::Column::Status.eq(OrderStatus::Submitted))
            .exec(&self.db)
            .await?;
        if result.rows_affected == 0 {
            return match order::Entity::find_by_id(order_id).one(&self.db).await? {
                None => Err(Error::not_found(format!("order {order_id}"))),
                Some(current) => Err(Error::conflict(format!(
                    "order {} is {:?}, not submitted",
                    order_id, current.status
                ))),
            };
        }
        debug!(order_id, "order marked completed");
        Ok(())
    }

    async fn mark_cancelled(&self, order_id: ModelId, reason: &str) -> Result<()> {
        let update = order::ActiveModel {
            status: Set(OrderStatus::Cancelled),
            cancellation_reason: Set(Some(reason.to_string())),
            updated_at: Set(Utc::now().naive_utc()),
            ..Default::default()
        };
        let result = order::Entity::update_many()
            .set(update)
            .filter(order::Column::Id.eq(order_id))
            .filter(
                order::Column::Status.is_in([OrderStatus::Pending, OrderStatus::Submitted]),
            )
            .exec(&self.db)
            .await?;
        if result.rows_affected == 0 {
            return match order::Entity::find_by_id(order_id).one(&self.db).await? {
                None => Err(Error::not_found(format!("order {order_id}"))),
                Some(current) => Err(Error::conflict(format!(
                    "order {} is {:?} and cannot be cancelled",
                    order_id, current.status
                ))),
            };
        }
        Ok(())
    }
}

#[async_trait]
impl StockStore for StoreStorage {
    async fn stock_profile(&self, product_id: ModelId) -> Result<StockProfile> {
        let product = product::Entity::find_by_id(product_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| Error::not_found(format!("product {product_id}")))?;
        Ok(StockProfile {
            product_id,
            delivery_type: product.delivery_type,
            use_manual_stock: product.use_manual_stock,
        })
    }

    async fn decrement_manual(&self, product_id: ModelId) -> Result<()> {
        // Atomic conditional decrement: the WHERE clause keeps the counter
        // from ever going below zero, even under concurrent approvals.
        let result = product::Entity::update_many()
            .col_expr(
                product::Column::ManualStockCount,
                Expr::col(product::Column::ManualStockCount).sub(1),
            )
            .filter(product::Column::Id.eq(product_id))
            .filter(product::Column::ManualStockCount.gt(0))
            .exec(&self.db)
            .await?;
        if result.rows_affected == 0 {
            return Err(Error::StockExhausted { product_id });
        }
        Ok(())
    }

    async fn assign_key(
        &self,
        product_id: ModelId,
        order_id: ModelId,
        user_id: &str,
    ) -> Result<KeyAssignment> {
        loop {
            let candidate = stock_key::Entity::find()
                .filter(stock_key::Column::ProductId.eq(product_id))
                .filter(stock_key::Column::Status.eq(StockKeyStatus::Available))
                .order_by_asc(stock_key::Column::Id)
                .one(&self.db)
                .await?;
            let Some(key) = candidate else {
                return Err(Error::StockExhausted { product_id });
            };

            let claim = stock_key::ActiveModel {
                status: Set(StockKeyStatus::Assigned),
                assigned_order_id: Set(Some(order_id)),
                used_by: Set(Some(user_id.to_string())),
                used_at: Set(Some(Utc::now().naive_utc())),
                ..Default::default()
            };
            let result = stock_key::Entity::update_many()
                .set(claim)
                .filter(stock_key::Column::Id.eq(key.id))
                .filter(stock_key::Column::Status.eq(StockKeyStatus::Available))
                .exec(&self.db)
                .await?;
            if result.rows_affected == 1 {
                debug!(key_id = key.id, order_id, "stock key assigned");
                return Ok(KeyAssignment {
                    key_id: key.id,
                    payload: key.payload,
                });
            }
            // Another approval claimed this key first; take the next one.
        }
    }
}

#[async_trait]
impl LoyaltyStore for StoreStorage {
    async fn award_points(&self, award: &PointsAward) -> Result<bool> {
        // One transaction per (kind, reference): a replayed award finds the
        // existing row and does nothing.
        if award.order_id.is_some() || award.referral_id.is_some() {
            let mut existing =
                point_transaction::Entity::find().filter(point_transaction::Column::Kind.eq(award.kind));
            if let Some(order_id) = award.order_id {
                existing = existing.filter(point_transaction::Column::OrderId.eq(order_id));
            }
            if let Some(referral_id) = award.referral_id {
                existing = existing.filter(point_transaction::Column::ReferralId.eq(referral_id));
            }
            if existing.one(&self.db).await?.is_some() {
                debug!(user_id = %award.user_id, kind = ?award.kind, "points already awarded");
                return Ok(false);
            }
        }

        point_transaction::ActiveModel {
            id: NotSet,
            user_id: Set(award.user_id.clone()),
            points: Set(award.points),
            kind: Set(award.kind),
            description: Set(award.description.clone()),
            order_id: Set(award.order_id),
            referral_id: Set(award.referral_id),
            created_at: Set(Utc::now().naive_utc()),
        }
        .insert(&self.db)
        .await?;

        self.apply_to_account(&award.user_id, award.points).await?;
        Ok(true)
    }

    async fn deduct_points(&self, user_id: &str, points: i64, description: &str) -> Result<()> {
        // Conditional deduction; only an account that still covers the cost
        // is touched, so the balance can never go negative.
        let result = loyalty_account::Entity::update_many()
            .col_expr(
                loyalty_account::Column::TotalPoints,
                Expr::col(loyalty_account::Column::TotalPoints).sub(points),
            )
            .col_expr(
                loyalty_account::Column::UpdatedAt,
                Expr::value(Utc::now().naive_utc()),
            )
            .filter(loyalty_account::Column::UserId.eq(user_id))
            .filter(loyalty_account::Column::TotalPoints.gte(points))
            .exec(&self.db)
            .await?;
        if result.rows_affected == 0 {
            let available = loyalty_account::Entity::find_by_id(user_id.to_string())
                .one(&self.db)
                .await?
                .map(|account| account.total_points)
                .unwrap_or(0);
            return Err(Error::InsufficientPoints {
                needed: points,
                available,
            });
        }

        point_transaction::ActiveModel {
            id: NotSet,
            user_id: Set(user_id.to_string()),
            points: Set(-points),
            kind: Set(fulfillment::model::PointKind::Redeemed),
            description: Set(description.to_string()),
            order_id: Set(None),
            referral_id: Set(None),
            created_at: Set(Utc::now().naive_utc()),
        }
        .insert(&self.db)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl ReferralStore for StoreStorage {
    async fn find_pending_for(&self, referred_id: &str) -> Result<Option<PendingReferral>> {
        let found = referral::Entity::find()
            .filter(referral::Column::ReferredId.eq(referred_id))
            .filter(referral::Column::Status.eq(ReferralStatus::Pending))
            .one(&self.db)
            .await?;
        Ok(found.map(|model| PendingReferral {
            id: model.id,
            referrer_id: model.referrer_id,
            referred_id: model.referred_id,
        }))
    }

    async fn begin_completion(&self, referral_id: ModelId) -> Result<bool> {
        // Check-and-set on reward_given; exactly one caller wins.
        let result = referral::Entity::update_many()
            .col_expr(referral::Column::RewardGiven, Expr::value(true))
            .filter(referral::Column::Id.eq(referral_id))
            .filter(referral::Column::RewardGiven.eq(false))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected == 1)
    }

    async fn finish_completion(&self, referral_id: ModelId) -> Result<()> {
        let update = referral::ActiveModel {
            status: Set(ReferralStatus::Completed),
            completed_at: Set(Some(Utc::now().naive_utc())),
            ..Default::default()
        };
        referral::Entity::update_many()
            .set(update)
            .filter(referral::Column::Id.eq(referral_id))
            .exec(&self.db)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl TaskStore for StoreStorage {
    async fn ensure(&self, order_id: ModelId) -> Result<RewardsTask> {
        if let Some(existing) = fulfillment_task::Entity::find_by_id(order_id)
            .one(&self.db)
            .await?
        {
            return Ok(RewardsTask {
                order_id,
                points_awarded: existing.points_awarded,
                referral_completed: existing.referral_completed,
            });
        }

        let now = Utc::now().naive_utc();
        let task = fulfillment_task::ActiveModel {
            order_id: Set(order_id),
            points_awarded: Set(false),
            referral_completed: Set(false),
            created_at: Set(now),
            updated_at: Set(now),
        };
        match fulfillment_task::Entity::insert(task)
            .on_conflict(
                OnConflict::column(fulfillment_task::Column::OrderId)
                    .do_nothing()
                    .to_owned(),
            )
            .exec(&self.db)
            .await
        {
            Ok(_) | Err(DbErr::RecordNotInserted) => {}
            Err(e) => return Err(e.into()),
        }

        let model = fulfillment_task::Entity::find_by_id(order_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| Error::not_found(format!("fulfillment task {order_id}")))?;
        Ok(RewardsTask {
            order_id,
            points_awarded: model.points_awarded,
            referral_completed: model.referral_completed,
        })
    }

    async fn set_points_awarded(&self, order_id: ModelId) -> Result<()> {
        fulfillment_task::Entity::update_many()
            .col_expr(fulfillment_task::Column::PointsAwarded, Expr::value(true))
            .col_expr(
                fulfillment_task::Column::UpdatedAt,
                Expr::value(Utc::now().naive_utc()),
            )
            .filter(fulfillment_task::Column::OrderId.eq(order_id))
            .exec(&self.db)
            .await?;
        Ok(())
    }

    async fn set_referral_completed(&self, order_id: ModelId) -> Result<()> {
        fulfillment_task::Entity::update_many()
            .col_expr(
                fulfillment_task::Column::ReferralCompleted,
                Expr::value(true),
            )
            .col_expr(
                fulfillment_task::Column::UpdatedAt,
                Expr::value(Utc::now().naive_utc()),
            )
            .filter(fulfillment_task::Column::OrderId.eq(order_id))
            .exec(&self.db)
            .await?;
        Ok(())
    }
}
