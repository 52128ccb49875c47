mod mocks;

use fulfillment::approval::ApprovalService;
use fulfillment::error::Error;
use fulfillment::model::{DeliveryType, KeyAssignment, OrderStatus, StockProfile};
use mocks::*;
use serde_json::json;
use std::sync::Arc;

fn manual_profile(product_id: i64) -> StockProfile {
    StockProfile {
        product_id,
        delivery_type: DeliveryType::ManualActivation,
        use_manual_stock: true,
    }
}

fn key_profile(product_id: i64, delivery_type: DeliveryType) -> StockProfile {
    StockProfile {
        product_id,
        delivery_type,
        use_manual_stock: false,
    }
}

fn service(
    orders: MockOrders,
    stock: MockStock,
    tasks: MockTasks,
    queue: MockQueue,
) -> ApprovalService {
    ApprovalService::new(
        Arc::new(orders),
        Arc::new(stock),
        Arc::new(tasks),
        Arc::new(queue),
    )
}

#[tokio::test]
async fn approving_a_manual_stock_order_decrements_and_enqueues_rewards() {
    let mut orders = MockOrders::new();
    let mut stock = MockStock::new();
    let mut tasks = MockTasks::new();
    let mut queue = MockQueue::new();

    let mut seq = mockall::Sequence::new();
    orders
        .expect_get_order()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|id| Ok(order(id, OrderStatus::Submitted, 599, "u1")));
    orders
        .expect_mark_completed()
        .withf(|id, credentials| *id == 1 && credentials.is_null())
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Ok(()));
    orders
        .expect_get_order()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|id| Ok(order(id, OrderStatus::Completed, 599, "u1")));

    stock
        .expect_stock_profile()
        .returning(|id| Ok(manual_profile(id)));
    stock
        .expect_decrement_manual()
        .with(mockall::predicate::eq(10))
        .times(1)
        .returning(|_| Ok(()));
    tasks.expect_ensure().times(1).returning(|id| Ok(task(id, false, false)));
    queue
        .expect_enqueue()
        .with(mockall::predicate::eq(1))
        .times(1)
        .returning(|_| Ok(()));

    let approved = service(orders, stock, tasks, queue)
        .approve(1, None)
        .await
        .unwrap();
    assert_eq!(approved.status, OrderStatus::Completed);
}

#[tokio::test]
async fn approving_a_key_order_attaches_the_claimed_key() {
    let mut orders = MockOrders::new();
    let mut stock = MockStock::new();
    let mut tasks = MockTasks::new();
    let mut queue = MockQueue::new();

    let mut seq = mockall::Sequence::new();
    orders
        .expect_get_order()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|id| Ok(order(id, OrderStatus::Submitted, 999, "u2")));
    orders
        .expect_mark_completed()
        .withf(|_, credentials| credentials == &json!({ "key": "XXXX-YYYY" }))
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Ok(()));
    orders
        .expect_get_order()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|id| Ok(order(id, OrderStatus::Completed, 999, "u2")));

    stock
        .expect_stock_profile()
        .returning(|id| Ok(key_profile(id, DeliveryType::InstantKey)));
    stock
        .expect_assign_key()
        .withf(|product_id, order_id, user_id| {
            *product_id == 10 && *order_id == 2 && user_id == "u2"
        })
        .times(1)
        .returning(|_, _, _| {
            Ok(KeyAssignment {
                key_id: 31,
                payload: "XXXX-YYYY".into(),
            })
        });
    tasks.expect_ensure().returning(|id| Ok(task(id, false, false)));
    queue.expect_enqueue().returning(|_| Ok(()));

    service(orders, stock, tasks, queue)
        .approve(2, None)
        .await
        .unwrap();
}

#[tokio::test]
async fn exhausted_stock_fails_the_approval_and_leaves_the_order_alone() {
    let mut orders = MockOrders::new();
    let mut stock = MockStock::new();
    let mut tasks = MockTasks::new();
    let mut queue = MockQueue::new();

    orders
        .expect_get_order()
        .returning(|id| Ok(order(id, OrderStatus::Submitted, 599, "u1")));
    orders.expect_mark_completed().never();
    stock
        .expect_stock_profile()
        .returning(|id| Ok(manual_profile(id)));
    stock
        .expect_decrement_manual()
        .returning(|product_id| Err(Error::StockExhausted { product_id }));
    tasks.expect_ensure().never();
    queue.expect_enqueue().never();

    let result = service(orders, stock, tasks, queue).approve(1, None).await;
    assert!(matches!(result, Err(Error::StockExhausted { product_id: 10 })));
}

#[tokio::test]
async fn only_submitted_orders_can_be_approved() {
    let mut orders = MockOrders::new();
    let mut stock = MockStock::new();
    let tasks = MockTasks::new();
    let queue = MockQueue::new();

    orders
        .expect_get_order()
        .returning(|id| Ok(order(id, OrderStatus::Completed, 599, "u1")));
    orders.expect_mark_completed().never();
    stock.expect_stock_profile().never();

    let result = service(orders, stock, tasks, queue).approve(1, None).await;
    assert!(matches!(result, Err(Error::Conflict(_))));
}

#[tokio::test]
async fn invalid_admin_payload_is_rejected_before_stock_is_claimed() {
    let mut orders = MockOrders::new();
    let mut stock = MockStock::new();
    let tasks = MockTasks::new();
    let queue = MockQueue::new();

    orders
        .expect_get_order()
        .returning(|id| Ok(order(id, OrderStatus::Submitted, 599, "u1")));
    orders.expect_mark_completed().never();
    stock
        .expect_stock_profile()
        .returning(|id| Ok(key_profile(id, DeliveryType::Credentials)));
    stock.expect_assign_key().never();

    // Credentials delivery requires email + password.
    let payload = json!({ "email": "acc@mail.test" });
    let result = service(orders, stock, tasks, queue)
        .approve(1, Some(payload))
        .await;
    assert!(matches!(result, Err(Error::Validation(_))));
}

#[tokio::test]
async fn manually_counted_key_products_need_an_admin_payload() {
    let mut orders = MockOrders::new();
    let mut stock = MockStock::new();
    let tasks = MockTasks::new();
    let queue = MockQueue::new();

    orders
        .expect_get_order()
        .returning(|id| Ok(order(id, OrderStatus::Submitted, 599, "u1")));
    orders.expect_mark_completed().never();
    stock.expect_stock_profile().returning(|product_id| {
        Ok(StockProfile {
            product_id,
            delivery_type: DeliveryType::InstantKey,
            use_manual_stock: true,
        })
    });
    // Without a payload there is nothing to deliver; the counter must not
    // be touched.
    stock.expect_decrement_manual().never();

    let result = service(orders, stock, tasks, queue).approve(1, None).await;
    assert!(matches!(result, Err(Error::Validation(_))));
}

#[tokio::test]
async fn rejecting_requires_a_reason() {
    let mut orders = MockOrders::new();
    orders.expect_mark_cancelled().never();

    let service = service(orders, MockStock::new(), MockTasks::new(), MockQueue::new());
    let result = service.reject(5, "   ").await;
    assert!(matches!(result, Err(Error::Validation(_))));
}

#[tokio::test]
async fn rejecting_cancels_with_the_given_reason() {
    let mut orders = MockOrders::new();
    let mut seq = mockall::Sequence::new();
    orders
        .expect_mark_cancelled()
        .withf(|id, reason| *id == 5 && reason == "payment not received")
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Ok(()));
    orders
        .expect_get_order()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|id| Ok(order(id, OrderStatus::Cancelled, 599, "u1")));

    let service = service(orders, MockStock::new(), MockTasks::new(), MockQueue::new());
    let cancelled = service.reject(5, "payment not received").await.unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
}
