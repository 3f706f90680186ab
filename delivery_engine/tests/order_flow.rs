use delivery_engine::{
    db_types::{NewOrderItem, NewShop, PaymentMethod, ShopOrderStatus},
    events::EventProducers,
    order_objects::{Actor, CartLine, NewOrderRequest},
    test_utils::prepare_env::prepare_test_env,
    traits::{DeliveryGatewayError, FullOrder, NoRefunds, SettingsUpdate},
    DeliveryGatewayDatabase,
    OrderFlowApi,
    OrderManagement,
    SettingsManagement,
    SqliteDatabase,
};
use chrono::{Duration, Utc};
use dpe_common::Money;
use log::*;
use tokio::runtime::Runtime;

async fn new_db(url: &str) -> SqliteDatabase {
    prepare_test_env(url).await;
    SqliteDatabase::new_with_url(url, 5).await.expect("Error creating database")
}

fn order_api(db: &SqliteDatabase) -> OrderFlowApi<SqliteDatabase, NoRefunds> {
    OrderFlowApi::new(db.clone(), NoRefunds, EventProducers::default())
}

async fn seed_shop(db: &SqliteDatabase, shop_id: &str, owner_id: &str) {
    let shop = NewShop::new(shop_id, format!("{shop_id} kitchen"), owner_id).at_location(13.7563, 100.5018);
    db.upsert_shop(shop).await.expect("Error seeding shop");
}

fn line(shop_id: &str, item_id: &str, price_baht: i64, quantity: i64) -> CartLine {
    CartLine {
        shop_id: shop_id.to_string(),
        item_id: item_id.to_string(),
        name: format!("item {item_id}"),
        unit_price: Money::from_baht(price_baht),
        quantity,
        options: None,
        note: None,
    }
}

fn two_shop_request(customer: &str) -> NewOrderRequest {
    NewOrderRequest {
        customer_id: customer.to_string(),
        payment_method: PaymentMethod::Cash,
        address_text: "Dorm 4, room 212".to_string(),
        latitude: Some(13.7570),
        longitude: Some(100.5030),
        lines: vec![line("shop-a", "som-tam", 40, 2), line("shop-b", "moo-ping", 10, 3), line("shop-a", "rice", 10, 1)],
    }
}

async fn place(api: &OrderFlowApi<SqliteDatabase, NoRefunds>, request: NewOrderRequest) -> FullOrder {
    api.process_new_order(request).await.expect("Error placing order")
}

#[test]
fn placement_recomputes_totals_and_groups_by_shop() {
    let sys = Runtime::new().unwrap();
    sys.block_on(async {
        let url = "sqlite://../data/test_placement_totals.db";
        let db = new_db(url).await;
        seed_shop(&db, "shop-a", "own-a").await;
        seed_shop(&db, "shop-b", "own-b").await;
        db.update_system_settings(SettingsUpdate::default().with_delivery_pricing(20.0, 0.0))
            .await
            .expect("Error updating settings");
        let api = order_api(&db);
        let full = place(&api, two_shop_request("cust-1")).await;
        assert!(full.order.order_code.as_str().starts_with("ORD-"), "got {}", full.order.order_code);
        assert_eq!(full.shop_orders.len(), 2);
        let a = full.shop_orders.iter().find(|so| so.shop_order.shop_id == "shop-a").unwrap();
        let b = full.shop_orders.iter().find(|so| so.shop_order.shop_id == "shop-b").unwrap();
        // 2 x 40 + 1 x 10 for shop a, 3 x 10 for shop b
        assert_eq!(a.shop_order.subtotal, Money::from_baht(90));
        assert_eq!(b.shop_order.subtotal, Money::from_baht(30));
        assert_eq!(a.items.len(), 2);
        assert_eq!(b.items.len(), 1);
        assert_eq!(a.shop_order.owner_id, "own-a");
        assert_eq!(full.order.delivery_fee, Money::from_baht(20));
        assert_eq!(full.order.total_amount, Money::from_baht(140));
        assert_eq!(a.shop_order.status, ShopOrderStatus::Pending);
        info!("🛒️ Order {} placed correctly", full.order.order_code);
    });
}

#[test]
fn placement_guards() {
    let sys = Runtime::new().unwrap();
    sys.block_on(async {
        let url = "sqlite://../data/test_placement_guards.db";
        let db = new_db(url).await;
        seed_shop(&db, "shop-a", "own-a").await;
        seed_shop(&db, "shop-b", "own-b").await;
        let api = order_api(&db);

        let mut request = two_shop_request("cust-1");
        request.lines.clear();
        let err = api.process_new_order(request).await.unwrap_err();
        assert!(matches!(err, DeliveryGatewayError::EmptyOrder));

        let request = NewOrderRequest { lines: vec![line("no-such-shop", "x", 10, 1)], ..two_shop_request("cust-1") };
        let err = api.process_new_order(request).await.unwrap_err();
        assert!(matches!(err, DeliveryGatewayError::ShopNotFound(s) if s == "no-such-shop"));

        // A tight polygon around the campus. The customer's address below is well outside it.
        let polygon = r#"[{"lat":13.70,"lng":100.50},{"lat":13.70,"lng":100.51},{"lat":13.71,"lng":100.51},{"lat":13.71,"lng":100.50}]"#;
        db.update_system_settings(SettingsUpdate::default().with_service_area(Some(polygon.to_string())))
            .await
            .expect("Error updating settings");
        let err = api.process_new_order(two_shop_request("cust-1")).await.unwrap_err();
        assert!(matches!(err, DeliveryGatewayError::OutsideServiceArea));
        db.update_system_settings(SettingsUpdate::default().with_service_area(None))
            .await
            .expect("Error updating settings");

        db.update_system_settings(SettingsUpdate::default().with_maintenance_mode(true))
            .await
            .expect("Error updating settings");
        let err = api.process_new_order(two_shop_request("cust-1")).await.unwrap_err();
        assert!(matches!(err, DeliveryGatewayError::MaintenanceMode));
    });
}

#[test]
fn merchant_status_transitions() {
    let sys = Runtime::new().unwrap();
    sys.block_on(async {
        let url = "sqlite://../data/test_status_transitions.db";
        let db = new_db(url).await;
        seed_shop(&db, "shop-a", "own-a").await;
        seed_shop(&db, "shop-b", "own-b").await;
        let api = order_api(&db);
        let full = place(&api, two_shop_request("cust-1")).await;
        let so_id = full.shop_orders[0].shop_order.id;
        let merchant = Actor::Merchant("own-a".to_string());

        // A competitor cannot drive someone else's shop order.
        let err = api
            .update_shop_order_status(&Actor::Merchant("own-b".to_string()), so_id, ShopOrderStatus::Preparing)
            .await
            .unwrap_err();
        assert!(matches!(err, DeliveryGatewayError::Forbidden(_)));

        let so = api.update_shop_order_status(&merchant, so_id, ShopOrderStatus::Preparing).await.unwrap();
        assert_eq!(so.status, ShopOrderStatus::Preparing);
        assert!(so.preparing_started_at.is_some());

        let err = api.update_shop_order_status(&merchant, so_id, ShopOrderStatus::Preparing).await.unwrap_err();
        assert!(matches!(err, DeliveryGatewayError::StatusChangeNoOp));
        let err = api.update_shop_order_status(&merchant, so_id, ShopOrderStatus::Pending).await.unwrap_err();
        assert!(matches!(err, DeliveryGatewayError::StatusChangeForbidden { .. }));
        // Delivery is only reachable through settlement, never through the status endpoint.
        let err = api.update_shop_order_status(&merchant, so_id, ShopOrderStatus::Delivered).await.unwrap_err();
        assert!(matches!(err, DeliveryGatewayError::StatusChangeForbidden { .. }));

        let so = api.update_shop_order_status(&merchant, so_id, ShopOrderStatus::OutForDelivery).await.unwrap();
        assert_eq!(so.status, ShopOrderStatus::OutForDelivery);
        assert!(so.ready_at.is_some());
    });
}

#[test]
fn cancellation_matrix() {
    let sys = Runtime::new().unwrap();
    sys.block_on(async {
        let url = "sqlite://../data/test_cancellation_matrix.db";
        let db = new_db(url).await;
        seed_shop(&db, "shop-a", "own-a").await;
        seed_shop(&db, "shop-b", "own-b").await;
        let api = order_api(&db);
        let customer = Actor::Customer("cust-1".to_string());

        let full = place(&api, two_shop_request("cust-1")).await;
        let so_a = full.shop_orders[0].shop_order.id;
        let so_b = full.shop_orders[1].shop_order.id;

        let err = api.cancel_shop_order(&customer, so_a, "  ").await.unwrap_err();
        assert!(matches!(err, DeliveryGatewayError::ReasonRequired));
        let err = api.cancel_shop_order(&Actor::Customer("cust-2".to_string()), so_a, "not mine").await.unwrap_err();
        assert!(matches!(err, DeliveryGatewayError::Forbidden(_)));

        let cancelled = api.cancel_shop_order(&customer, so_a, "changed my mind").await.unwrap();
        assert_eq!(cancelled.status, ShopOrderStatus::Cancelled);
        assert_eq!(cancelled.cancel_reason.as_deref(), Some("changed my mind"));
        assert!(cancelled.cancelled_at.is_some());
        // cancelling one shop order shrinks the order total
        let order = api.db().fetch_order(full.order.id).await.unwrap().unwrap();
        assert_eq!(order.order.total_amount, full.order.total_amount - cancelled.subtotal);

        // Merchants may only cancel before the food is out for delivery.
        api.update_shop_order_status(&Actor::Merchant("own-b".to_string()), so_b, ShopOrderStatus::Preparing)
            .await
            .unwrap();
        api.update_shop_order_status(&Actor::Merchant("own-b".to_string()), so_b, ShopOrderStatus::OutForDelivery)
            .await
            .unwrap();
        let err = api.cancel_shop_order(&Actor::Merchant("own-b".to_string()), so_b, "ran out").await.unwrap_err();
        assert!(matches!(err, DeliveryGatewayError::CancellationForbidden(_)));
        assert!(err.is_conflict());

        // A courier who does not hold the job cannot cancel it; the assignee can, but only before pickup.
        let err = api.cancel_shop_order(&Actor::Courier("rider-9".to_string()), so_b, "traffic").await.unwrap_err();
        assert!(matches!(err, DeliveryGatewayError::NotAssignee));
        let claimed = api.db().try_claim(so_b, "rider-1").await.unwrap();
        assert!(claimed.is_some());
        api.db().settle_pickup(so_b, "rider-1").await.unwrap();
        let err = api.cancel_shop_order(&Actor::Courier("rider-1".to_string()), so_b, "traffic").await.unwrap_err();
        assert!(matches!(err, DeliveryGatewayError::AlreadyPickedUp));
        let err = api.cancel_shop_order(&customer, so_b, "too slow").await.unwrap_err();
        assert!(matches!(err, DeliveryGatewayError::AlreadyPickedUp));

        // The guard lives in the conditional update itself, so a cancel that read the row just before the pickup
        // settled still loses the race instead of cancelling a settled shop order.
        let err = db
            .cancel_shop_order(so_b, &[ShopOrderStatus::OutForDelivery], "raced the pickup", true)
            .await
            .unwrap_err();
        assert!(matches!(err, DeliveryGatewayError::AlreadyPickedUp));
        let so = api.db().fetch_shop_order(so_b).await.unwrap().unwrap();
        assert_eq!(so.status, ShopOrderStatus::OutForDelivery);

        // An admin can still cancel what the state machine allows, but delivered/cancelled rows stay terminal.
        let err = api.cancel_shop_order(&Actor::Admin("root".to_string()), so_a, "cleanup").await.unwrap_err();
        assert!(matches!(err, DeliveryGatewayError::CancellationForbidden(_)));
        // Admins are exempt from the pickup guard.
        let cancelled = api.cancel_shop_order(&Actor::Admin("root".to_string()), so_b, "support override").await.unwrap();
        assert_eq!(cancelled.status, ShopOrderStatus::Cancelled);

        let since = Utc::now() - Duration::days(1);
        let count = db.cancellation_count_for_customer("cust-1", since).await.unwrap();
        assert_eq!(count, 2);
        assert_eq!(db.cancellation_count_for_customer("cust-2", since).await.unwrap(), 0);
    });
}

#[test]
fn line_item_edits_are_pending_only() {
    let sys = Runtime::new().unwrap();
    sys.block_on(async {
        let url = "sqlite://../data/test_item_edits.db";
        let db = new_db(url).await;
        seed_shop(&db, "shop-a", "own-a").await;
        seed_shop(&db, "shop-b", "own-b").await;
        db.update_system_settings(SettingsUpdate::default().with_delivery_pricing(20.0, 0.0)).await.unwrap();
        let api = order_api(&db);
        let customer = Actor::Customer("cust-1".to_string());
        let full = place(&api, two_shop_request("cust-1")).await;
        let so_a = full.shop_orders[0].shop_order.id;

        let new_items = vec![NewOrderItem {
            item_id: "pad-thai".to_string(),
            name: "Pad thai".to_string(),
            unit_price: Money::from_baht(55),
            quantity: 2,
            options: None,
            note: Some("no peanuts".to_string()),
        }];
        let err = api.update_order_items(&Actor::Customer("cust-2".to_string()), so_a, new_items.clone()).await.unwrap_err();
        assert!(matches!(err, DeliveryGatewayError::Forbidden(_)));

        let updated = api.update_order_items(&customer, so_a, new_items.clone()).await.unwrap();
        let a = updated.shop_orders.iter().find(|so| so.shop_order.id == so_a).unwrap();
        assert_eq!(a.shop_order.subtotal, Money::from_baht(110));
        assert_eq!(a.items.len(), 1);
        // 110 + 30 (shop b) + 20 fee
        assert_eq!(updated.order.total_amount, Money::from_baht(160));

        api.update_shop_order_status(&Actor::Merchant("own-a".to_string()), so_a, ShopOrderStatus::Preparing)
            .await
            .unwrap();
        let err = api.update_order_items(&customer, so_a, new_items).await.unwrap_err();
        assert!(matches!(err, DeliveryGatewayError::ItemEditForbidden));
    });
}

#[test]
fn expired_shop_closures_reopen() {
    let sys = Runtime::new().unwrap();
    sys.block_on(async {
        let url = "sqlite://../data/test_shop_closures.db";
        let db = new_db(url).await;
        seed_shop(&db, "shop-a", "own-a").await;
        seed_shop(&db, "shop-b", "own-b").await;
        let api = order_api(&db);

        // A temporarily closed shop takes no orders, and the sweep leaves a live closure alone.
        db.close_shop_until("shop-a", Utc::now() + Duration::hours(1)).await.unwrap();
        let err = api.process_new_order(two_shop_request("cust-1")).await.unwrap_err();
        assert!(matches!(err, DeliveryGatewayError::ShopUnavailable(s) if s == "shop-a"));
        assert_eq!(api.reopen_expired_closures().await.unwrap(), 0);

        // Once the window elapses the sweep clears it and orders flow again.
        db.close_shop_until("shop-a", Utc::now() - Duration::minutes(5)).await.unwrap();
        assert_eq!(api.reopen_expired_closures().await.unwrap(), 1);
        let shop = db.fetch_shop("shop-a").await.unwrap().unwrap();
        assert!(shop.closed_until.is_none());
        let full = place(&api, two_shop_request("cust-1")).await;
        assert_eq!(full.shop_orders.len(), 2);
    });
}
