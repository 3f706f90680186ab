use delivery_engine::{
    db_types::{NewShop, PaymentMethod, RequesterType, ShopOrderStatus},
    events::EventProducers,
    order_objects::{Actor, CartLine, NewOrderRequest},
    test_utils::prepare_env::prepare_test_env,
    traits::{
        DeliveryGatewayError,
        FullOrder,
        GatewayEvent,
        GatewayEventOutcome,
        NoRefunds,
        PayoutResolution,
        SettingsUpdate,
        WalletApiError,
    },
    DeliveryGatewayDatabase,
    OrderFlowApi,
    OrderManagement,
    SettingsManagement,
    SettlementApi,
    SqliteDatabase,
    WalletApi,
};
use chrono::{Duration, Utc};
use dpe_common::Money;
use log::*;
use tokio::runtime::Runtime;

/// The canonical scenario used throughout: subtotal ฿100, delivery fee ฿20, commission 10%.
const SHOP: &str = "shop-1";
const OWNER: &str = "own-1";
const RIDER: &str = "rider-1";

async fn new_db(url: &str) -> SqliteDatabase {
    prepare_test_env(url).await;
    let db = SqliteDatabase::new_with_url(url, 5).await.expect("Error creating database");
    db.upsert_shop(NewShop::new(SHOP, "Shop One", OWNER).at_location(13.7563, 100.5018)).await.unwrap();
    db.update_system_settings(
        SettingsUpdate::default().with_commission_percentage(10.0).with_delivery_pricing(20.0, 0.0),
    )
    .await
    .unwrap();
    db
}

/// Places a ฿100 order and walks it to out-for-delivery with the courier holding the claim.
async fn claimed_shop_order(db: &SqliteDatabase, customer: &str, method: PaymentMethod) -> FullOrder {
    let api = OrderFlowApi::new(db.clone(), NoRefunds, EventProducers::default());
    let request = NewOrderRequest {
        customer_id: customer.to_string(),
        payment_method: method,
        address_text: "Dorm 4".to_string(),
        latitude: Some(13.7570),
        longitude: Some(100.5020),
        lines: vec![CartLine {
            shop_id: SHOP.to_string(),
            item_id: "khao-man-gai".to_string(),
            name: "Khao man gai".to_string(),
            unit_price: Money::from_baht(50),
            quantity: 2,
            options: None,
            note: None,
        }],
    };
    let full = api.process_new_order(request).await.expect("Error placing order");
    let so_id = full.shop_orders[0].shop_order.id;
    let merchant = Actor::Merchant(OWNER.to_string());
    api.update_shop_order_status(&merchant, so_id, ShopOrderStatus::Preparing).await.unwrap();
    api.update_shop_order_status(&merchant, so_id, ShopOrderStatus::OutForDelivery).await.unwrap();
    assert!(db.try_claim(so_id, RIDER).await.unwrap().is_some());
    db.fetch_order(full.order.id).await.unwrap().unwrap()
}

fn settlement_api(db: &SqliteDatabase) -> SettlementApi<SqliteDatabase> {
    SettlementApi::new(db.clone(), EventProducers::default())
}

fn wallet_api(db: &SqliteDatabase) -> WalletApi<SqliteDatabase> {
    WalletApi::new(db.clone(), EventProducers::default())
}

#[test]
fn cash_order_settles_into_job_credit() {
    let sys = Runtime::new().unwrap();
    sys.block_on(async {
        let url = "sqlite://../data/test_settle_cash.db";
        let db = new_db(url).await;
        let full = claimed_shop_order(&db, "cust-1", PaymentMethod::Cash).await;
        let so_id = full.shop_orders[0].shop_order.id;
        let api = settlement_api(&db);
        let wallets = wallet_api(&db);

        let err = api.confirm_pickup(so_id, "rider-9").await.unwrap_err();
        assert!(matches!(err, DeliveryGatewayError::NotAssignee));

        let settlement = api.confirm_pickup(so_id, RIDER).await.unwrap();
        assert!(!settlement.already_settled);
        assert!(settlement.cash);
        assert_eq!(settlement.merchant_net, Money::from_baht(90));
        assert!(settlement.shop_order.is_picked_up());
        // The courier owes the merchant's net: they collect the full amount in cash at the door.
        let account = wallets.courier_account(RIDER).await.unwrap().unwrap();
        assert_eq!(account.job_credit, Money::from_baht(-90));

        // Replaying the pickup is a no-op success and does not debit twice.
        let replay = api.confirm_pickup(so_id, RIDER).await.unwrap();
        assert!(replay.already_settled);
        let account = wallets.courier_account(RIDER).await.unwrap().unwrap();
        assert_eq!(account.job_credit, Money::from_baht(-90));

        let settlement = api.confirm_delivery(so_id, RIDER).await.unwrap();
        assert!(!settlement.already_settled);
        assert_eq!(settlement.platform_income, Money::from_baht(10));
        assert_eq!(settlement.merchant_earnings, Money::from_baht(90));
        // No delivery fee credit for cash orders.
        assert_eq!(settlement.courier_fee, None);
        assert_eq!(settlement.shop_order.status, ShopOrderStatus::Delivered);

        let replay = api.confirm_delivery(so_id, RIDER).await.unwrap();
        assert!(replay.already_settled);

        assert_eq!(wallets.platform_income_total().await.unwrap(), Money::from_baht(10));
        let merchant = wallets.merchant_balance(SHOP).await.unwrap();
        assert_eq!(merchant.total_earnings, Money::from_baht(90));
        assert_eq!(merchant.available, Money::from_baht(90));
        let courier = wallets.courier_balance(RIDER).await.unwrap();
        assert_eq!(courier.available, Money::ZERO);
        info!("💰️ Cash scenario settled: platform 10, merchant 90, job credit -90");
    });
}

#[test]
fn multi_shop_cash_order_debits_job_credit_per_pickup() {
    let sys = Runtime::new().unwrap();
    sys.block_on(async {
        let url = "sqlite://../data/test_settle_multi_shop_cash.db";
        let db = new_db(url).await;
        db.upsert_shop(NewShop::new("shop-2", "Shop Two", "own-2").at_location(13.7565, 100.5020)).await.unwrap();
        let api = OrderFlowApi::new(db.clone(), NoRefunds, EventProducers::default());
        let request = NewOrderRequest {
            customer_id: "cust-1".to_string(),
            payment_method: PaymentMethod::Cash,
            address_text: "Dorm 4".to_string(),
            latitude: Some(13.7570),
            longitude: Some(100.5020),
            lines: vec![
                CartLine {
                    shop_id: SHOP.to_string(),
                    item_id: "khao-man-gai".to_string(),
                    name: "Khao man gai".to_string(),
                    unit_price: Money::from_baht(50),
                    quantity: 2,
                    options: None,
                    note: None,
                },
                CartLine {
                    shop_id: "shop-2".to_string(),
                    item_id: "cha-yen".to_string(),
                    name: "Cha yen".to_string(),
                    unit_price: Money::from_baht(50),
                    quantity: 1,
                    options: None,
                    note: None,
                },
            ],
        };
        let full = api.process_new_order(request).await.unwrap();
        assert_eq!(full.shop_orders.len(), 2);
        let so_one = full.shop_orders.iter().find(|so| so.shop_order.shop_id == SHOP).unwrap().shop_order.id;
        let so_two = full.shop_orders.iter().find(|so| so.shop_order.shop_id == "shop-2").unwrap().shop_order.id;
        for (so_id, owner) in [(so_one, OWNER), (so_two, "own-2")] {
            let merchant = Actor::Merchant(owner.to_string());
            api.update_shop_order_status(&merchant, so_id, ShopOrderStatus::Preparing).await.unwrap();
            api.update_shop_order_status(&merchant, so_id, ShopOrderStatus::OutForDelivery).await.unwrap();
            assert!(db.try_claim(so_id, RIDER).await.unwrap().is_some());
        }

        let settle = settlement_api(&db);
        let wallets = wallet_api(&db);
        // One courier fronts cash for both merchants: ฿90 net for shop one, ฿45 for shop two.
        let first = settle.confirm_pickup(so_one, RIDER).await.unwrap();
        assert!(!first.already_settled);
        assert_eq!(first.merchant_net, Money::from_baht(90));
        let second = settle.confirm_pickup(so_two, RIDER).await.unwrap();
        assert!(!second.already_settled);
        assert_eq!(second.merchant_net, Money::from_baht(45));
        let account = wallets.courier_account(RIDER).await.unwrap().unwrap();
        assert_eq!(account.job_credit, Money::from_baht(-135), "both cash pickups must debit the job credit");

        // Replaying either pickup leaves the float alone.
        assert!(settle.confirm_pickup(so_two, RIDER).await.unwrap().already_settled);
        let account = wallets.courier_account(RIDER).await.unwrap().unwrap();
        assert_eq!(account.job_credit, Money::from_baht(-135));

        settle.confirm_delivery(so_one, RIDER).await.unwrap();
        settle.confirm_delivery(so_two, RIDER).await.unwrap();
        let since = Utc::now() - Duration::days(1);
        let deliveries = db.deliveries_for_courier_since(RIDER, since).await.unwrap();
        assert_eq!(deliveries.len(), 2);
        assert!(deliveries.iter().all(|so| so.status == ShopOrderStatus::Delivered));
        info!("💰️ Multi-shop cash order settled: job credit -135 across two pickups");
    });
}

#[test]
fn paid_online_order_credits_the_courier_fee() {
    let sys = Runtime::new().unwrap();
    sys.block_on(async {
        let url = "sqlite://../data/test_settle_online.db";
        let db = new_db(url).await;
        let full = claimed_shop_order(&db, "cust-1", PaymentMethod::Online).await;
        let so_id = full.shop_orders[0].shop_order.id;
        let api = settlement_api(&db);
        let wallets = wallet_api(&db);

        // Gateway confirms the payment; a replay of the webhook is detected.
        let event = GatewayEvent::PaymentSucceeded {
            payment_ref: "ch_123".to_string(),
            order_code: full.order.order_code.clone(),
        };
        assert_eq!(api.process_gateway_event(event.clone()).await.unwrap(), GatewayEventOutcome::Applied);
        assert_eq!(api.process_gateway_event(event).await.unwrap(), GatewayEventOutcome::AlreadyApplied);

        api.confirm_pickup(so_id, RIDER).await.unwrap();
        // Online pickup never touches the cash float.
        let account = wallets.courier_account(RIDER).await.unwrap();
        assert!(account.is_none() || account.unwrap().job_credit == Money::ZERO);

        let settlement = api.confirm_delivery(so_id, RIDER).await.unwrap();
        assert_eq!(settlement.platform_income, Money::from_baht(10));
        assert_eq!(settlement.merchant_earnings, Money::from_baht(90));
        assert_eq!(settlement.courier_fee, Some(Money::from_baht(20)));

        let courier = wallets.courier_balance(RIDER).await.unwrap();
        assert_eq!(courier.total_earnings, Money::from_baht(20));
        assert_eq!(courier.available, Money::from_baht(20));
        let merchant = wallets.merchant_balance(SHOP).await.unwrap();
        assert_eq!(merchant.available, Money::from_baht(90));
        assert_eq!(wallets.platform_income_total().await.unwrap(), Money::from_baht(10));
    });
}

#[test]
fn delivery_requires_pickup_first() {
    let sys = Runtime::new().unwrap();
    sys.block_on(async {
        let url = "sqlite://../data/test_settle_order_of_operations.db";
        let db = new_db(url).await;
        let full = claimed_shop_order(&db, "cust-1", PaymentMethod::Cash).await;
        let so_id = full.shop_orders[0].shop_order.id;
        let api = settlement_api(&db);
        let err = api.confirm_delivery(so_id, RIDER).await.unwrap_err();
        assert!(matches!(err, DeliveryGatewayError::NotPickedUp));
    });
}

#[test]
fn commission_split_is_exact_on_awkward_subtotals() {
    let sys = Runtime::new().unwrap();
    sys.block_on(async {
        let url = "sqlite://../data/test_settle_exact_split.db";
        let db = new_db(url).await;
        // 3 x ฿16.55 = ฿49.65; 10% of that is ฿4.965 which does not round cleanly.
        let api = OrderFlowApi::new(db.clone(), NoRefunds, EventProducers::default());
        let request = NewOrderRequest {
            customer_id: "cust-9".to_string(),
            payment_method: PaymentMethod::Cash,
            address_text: "Dorm 2".to_string(),
            latitude: None,
            longitude: None,
            lines: vec![CartLine {
                shop_id: SHOP.to_string(),
                item_id: "skewer".to_string(),
                name: "Skewer".to_string(),
                unit_price: Money::from_cents(1655),
                quantity: 3,
                options: None,
                note: None,
            }],
        };
        let full = api.process_new_order(request).await.unwrap();
        let so_id = full.shop_orders[0].shop_order.id;
        let merchant = Actor::Merchant(OWNER.to_string());
        api.update_shop_order_status(&merchant, so_id, ShopOrderStatus::Preparing).await.unwrap();
        api.update_shop_order_status(&merchant, so_id, ShopOrderStatus::OutForDelivery).await.unwrap();
        db.try_claim(so_id, RIDER).await.unwrap();

        let settle = settlement_api(&db);
        settle.confirm_pickup(so_id, RIDER).await.unwrap();
        let settlement = settle.confirm_delivery(so_id, RIDER).await.unwrap();
        let subtotal = full.shop_orders[0].shop_order.subtotal;
        assert_eq!(settlement.platform_income + settlement.merchant_earnings, subtotal);
        assert_eq!(settlement.platform_income, Money::from_cents(497));
        assert_eq!(settlement.merchant_earnings, Money::from_cents(4468));
    });
}

#[test]
fn otp_flow_completes_delivery() {
    let sys = Runtime::new().unwrap();
    sys.block_on(async {
        let url = "sqlite://../data/test_settle_otp.db";
        let db = new_db(url).await;
        let full = claimed_shop_order(&db, "cust-1", PaymentMethod::Cash).await;
        let so_id = full.shop_orders[0].shop_order.id;
        let api = settlement_api(&db);
        api.confirm_pickup(so_id, RIDER).await.unwrap();
        api.confirm_arrival(so_id, RIDER).await.unwrap();

        let so = api.issue_delivery_otp(so_id).await.unwrap();
        let otp = so.otp.clone().expect("an OTP should have been issued");
        assert_eq!(otp.len(), 6);
        assert!(otp.chars().all(|c| c.is_ascii_digit()));
        // Issuing again within the validity window reuses the same code.
        let again = api.issue_delivery_otp(so_id).await.unwrap();
        assert_eq!(again.otp.as_deref(), Some(otp.as_str()));

        let wrong = if otp == "000000" { "000001" } else { "000000" };
        let err = api.verify_delivery_otp(so_id, wrong).await.unwrap_err();
        assert!(matches!(err, DeliveryGatewayError::OtpInvalid));

        let settlement = api.verify_delivery_otp(so_id, &otp).await.unwrap();
        assert_eq!(settlement.shop_order.status, ShopOrderStatus::Delivered);
        assert_eq!(settlement.merchant_earnings, Money::from_baht(90));
    });
}

#[test]
fn withdrawal_lifecycle() {
    let sys = Runtime::new().unwrap();
    sys.block_on(async {
        let url = "sqlite://../data/test_settle_withdrawals.db";
        let db = new_db(url).await;
        let full = claimed_shop_order(&db, "cust-1", PaymentMethod::Online).await;
        let so_id = full.shop_orders[0].shop_order.id;
        let api = settlement_api(&db);
        api.process_gateway_event(GatewayEvent::PaymentSucceeded {
            payment_ref: "ch_456".to_string(),
            order_code: full.order.order_code.clone(),
        })
        .await
        .unwrap();
        api.confirm_pickup(so_id, RIDER).await.unwrap();
        api.confirm_delivery(so_id, RIDER).await.unwrap();

        let wallets = wallet_api(&db);
        // The courier has earned the ฿20 delivery fee.
        let err = wallets.request_payout(RequesterType::Courier, RIDER, Money::from_baht(50)).await.unwrap_err();
        assert!(matches!(err, WalletApiError::InsufficientFunds { .. }));
        let err = wallets.request_payout(RequesterType::Courier, RIDER, Money::ZERO).await.unwrap_err();
        assert!(matches!(err, WalletApiError::InvalidAmount(_)));

        let request = wallets.request_payout(RequesterType::Courier, RIDER, Money::from_baht(15)).await.unwrap();
        assert!(request.payout_ref.starts_with("payout_"));
        // Pending withdrawals lock up the balance immediately.
        let balance = wallets.courier_balance(RIDER).await.unwrap();
        assert_eq!(balance.pending, Money::from_baht(15));
        assert_eq!(balance.available, Money::from_baht(5));
        let err = wallets.request_payout(RequesterType::Courier, RIDER, Money::from_baht(5)).await.unwrap_err();
        assert!(matches!(err, WalletApiError::RequestAlreadyPending(_)));

        // Approve, then pay. Replaying an outcome is a no-op; contradicting one is rejected.
        let approved =
            wallets.resolve_payout_request(request.id, PayoutResolution::Approved, "root", None).await.unwrap();
        assert!(approved.is_resolved());
        let replay = wallets.resolve_payout_request(request.id, PayoutResolution::Approved, "root", None).await.unwrap();
        assert_eq!(replay.status, approved.status);
        let err =
            wallets.resolve_payout_request(request.id, PayoutResolution::Rejected, "root", None).await.unwrap_err();
        assert!(matches!(err, WalletApiError::ResolutionConflict(_)));

        let paid = wallets
            .resolve_payout_request(request.id, PayoutResolution::Paid, "root", Some("transferred"))
            .await
            .unwrap();
        assert_eq!(paid.processed_by.as_deref(), Some("root"));
        let balance = wallets.courier_balance(RIDER).await.unwrap();
        assert_eq!(balance.paid_out, Money::from_baht(15));
        assert_eq!(balance.pending, Money::ZERO);
        assert_eq!(balance.available, Money::from_baht(5));
    });
}

#[test]
fn rejected_withdrawals_restore_the_balance() {
    let sys = Runtime::new().unwrap();
    sys.block_on(async {
        let url = "sqlite://../data/test_settle_rejected_payout.db";
        let db = new_db(url).await;
        let full = claimed_shop_order(&db, "cust-1", PaymentMethod::Online).await;
        let so_id = full.shop_orders[0].shop_order.id;
        let api = settlement_api(&db);
        api.process_gateway_event(GatewayEvent::PaymentSucceeded {
            payment_ref: "ch_789".to_string(),
            order_code: full.order.order_code.clone(),
        })
        .await
        .unwrap();
        api.confirm_pickup(so_id, RIDER).await.unwrap();
        api.confirm_delivery(so_id, RIDER).await.unwrap();

        let wallets = wallet_api(&db);
        let request = wallets.request_payout(RequesterType::Courier, RIDER, Money::from_baht(20)).await.unwrap();
        assert_eq!(wallets.courier_balance(RIDER).await.unwrap().available, Money::ZERO);
        wallets.resolve_payout_request(request.id, PayoutResolution::Rejected, "root", Some("bad bank details"))
            .await
            .unwrap();
        // The failed ledger entry no longer counts as pending or paid out.
        let balance = wallets.courier_balance(RIDER).await.unwrap();
        assert_eq!(balance.pending, Money::ZERO);
        assert_eq!(balance.paid_out, Money::ZERO);
        assert_eq!(balance.available, Money::from_baht(20));
    });
}

#[test]
fn payout_gateway_events_advance_the_ledger() {
    let sys = Runtime::new().unwrap();
    sys.block_on(async {
        let url = "sqlite://../data/test_settle_payout_events.db";
        let db = new_db(url).await;
        let full = claimed_shop_order(&db, "cust-1", PaymentMethod::Online).await;
        let so_id = full.shop_orders[0].shop_order.id;
        let api = settlement_api(&db);
        api.process_gateway_event(GatewayEvent::PaymentSucceeded {
            payment_ref: "ch_abc".to_string(),
            order_code: full.order.order_code.clone(),
        })
        .await
        .unwrap();
        api.confirm_pickup(so_id, RIDER).await.unwrap();
        api.confirm_delivery(so_id, RIDER).await.unwrap();

        let wallets = wallet_api(&db);
        let request = wallets.request_payout(RequesterType::Courier, RIDER, Money::from_baht(10)).await.unwrap();
        let payout_ref = request.payout_ref.clone();

        let created = GatewayEvent::PayoutCreated { payout_ref: payout_ref.clone() };
        assert_eq!(api.process_gateway_event(created.clone()).await.unwrap(), GatewayEventOutcome::Applied);
        assert_eq!(api.process_gateway_event(created).await.unwrap(), GatewayEventOutcome::AlreadyApplied);
        let paid = GatewayEvent::PayoutPaid { payout_ref: payout_ref.clone() };
        assert_eq!(api.process_gateway_event(paid).await.unwrap(), GatewayEventOutcome::Applied);
        let balance = wallets.courier_balance(RIDER).await.unwrap();
        assert_eq!(balance.paid_out, Money::from_baht(10));

        let unknown = GatewayEvent::PayoutFailed { payout_ref: "payout_never_issued".to_string() };
        assert_eq!(api.process_gateway_event(unknown).await.unwrap(), GatewayEventOutcome::Unmatched);
    });
}
