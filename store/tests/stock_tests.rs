
use fulfillment::error::Error;
use fulfillment::model::{DeliveryType, StockKeyStatus};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use store::entities::stock_key;
use test_helpers::*;

#[tokio::test]
async fn manual_stock_never_goes_below_zero() {
    let store = test_store().await;
    let product = seed_product(&store, DeliveryType::ManualActivation, true, 1, 100).await;

    let first = submitted_order(&store, "alice", product.id).await;
    let second = submitted_order(&store, "bob", product.id).await;

    store.approval.approve(first.id, None).await.unwrap();
    // The single unit is gone; the second approval must fail, not go to -1.
    let result = store.approval.approve(second.id, None).await;
    assert!(matches!(result, Err(Error::StockExhausted { .. })));

    let summary = store.catalog.stock_summary(product.id).await.unwrap();
    assert_eq!(summary.manual_stock_count, 0);
}

#[tokio::test]
async fn each_key_is_assigned_to_exactly_one_order() {
    let store = test_store().await;
    let product = seed_product(&store, DeliveryType::InstantKey, false, 0, 250).await;
    store
        .catalog
        .upload_stock_keys(product.id, vec!["KEY-1".into(), "KEY-2".into()])
        .await
        .unwrap();

    let orders = [
        submitted_order(&store, "alice", product.id).await,
        submitted_order(&store, "bob", product.id).await,
        submitted_order(&store, "carol", product.id).await,
    ];

    store.approval.approve(orders[0].id, None).await.unwrap();
    store.approval.approve(orders[1].id, None).await.unwrap();
    assert!(matches!(
        store.approval.approve(orders[2].id, None).await,
        Err(Error::StockExhausted { .. })
    ));

    let assigned = stock_key::Entity::find()
        .filter(stock_key::Column::Status.eq(StockKeyStatus::Assigned))
        .all(&store.db)
        .await
        .unwrap();
    assert_eq!(assigned.len(), 2);

    // No key serves two orders.
    let mut order_ids: Vec<i64> = assigned
        .iter()
        .map(|key| key.assigned_order_id.unwrap())
        .collect();
    order_ids.sort_unstable();
    order_ids.dedup();
    assert_eq!(order_ids.len(), 2);
}

#[tokio::test]
async fn key_uploads_are_rejected_for_manual_products() {
    let store = test_store().await;
    let product = seed_product(&store, DeliveryType::ManualActivation, true, 5, 100).await;
    let result = store
        .catalog
        .upload_stock_keys(product.id, vec!["KEY-1".into()])
        .await;
    assert!(matches!(result, Err(Error::Validation(_))));
}

#[tokio::test]
async fn blank_key_payloads_are_dropped_before_insert() {
    let store = test_store().await;
    let product = seed_product(&store, DeliveryType::CouponCode, false, 0, 100).await;

    let uploaded = store
        .catalog
        .upload_stock_keys(
            product.id,
            vec!["  CODE-1  ".into(), "".into(), "   ".into()],
        )
        .await
        .unwrap();
    assert_eq!(uploaded, 1);

    let summary = store.catalog.stock_summary(product.id).await.unwrap();
    assert_eq!(summary.available_keys, 1);

    let all_blank = store
        .catalog
        .upload_stock_keys(product.id, vec!["".into()])
        .await;
    assert!(matches!(all_blank, Err(Error::Validation(_))));
}

#[tokio::test]
async fn stock_summary_tracks_claims() {
    let store = test_store().await;
    let product = seed_product(&store, DeliveryType::InstantKey, false, 0, 100).await;
    store
        .catalog
        .upload_stock_keys(product.id, vec!["A".into(), "B".into(), "C".into()])
        .await
        .unwrap();

    let order = submitted_order(&store, "alice", product.id).await;
    store.approval.approve(order.id, None).await.unwrap();

    let summary = store.catalog.stock_summary(product.id).await.unwrap();
    assert_eq!(summary.available_keys, 2);
    assert_eq!(summary.assigned_keys, 1);
}
