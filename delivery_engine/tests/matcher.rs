use std::sync::{
    atomic::{AtomicU32, Ordering},
    Arc,
};

use delivery_engine::{
    db_types::{NewShop, PaymentMethod, PickupLocation, ShopOrderStatus},
    events::EventProducers,
    helpers::GeoPoint,
    order_objects::{Actor, CartLine, ClaimOutcome, NewOrderRequest},
    test_utils::prepare_env::prepare_test_env,
    traits::{DeliveryGatewayError, NoRefunds},
    DeliveryGatewayDatabase,
    MatcherApi,
    OrderFlowApi,
    OrderManagement,
    SettingsManagement,
    SqliteDatabase,
};
use dpe_common::Money;
use log::*;
use tokio::runtime::Runtime;

const NUM_CONTENDERS: u32 = 8;

async fn new_db(url: &str) -> SqliteDatabase {
    prepare_test_env(url).await;
    SqliteDatabase::new_with_url(url, 5).await.expect("Error creating database")
}

/// Seeds a shop and places a single-line order for it, returning the shop order id.
async fn open_shop_order(db: &SqliteDatabase, shop: NewShop, customer: &str) -> i64 {
    let owner = shop.owner_id.clone();
    let shop_id = shop.shop_id.clone();
    db.upsert_shop(shop).await.expect("Error seeding shop");
    let api = OrderFlowApi::new(db.clone(), NoRefunds, EventProducers::default());
    let request = NewOrderRequest {
        customer_id: customer.to_string(),
        payment_method: PaymentMethod::Cash,
        address_text: "Dorm 4".to_string(),
        latitude: Some(13.7600),
        longitude: Some(100.5020),
        lines: vec![CartLine {
            shop_id,
            item_id: "krapow".to_string(),
            name: "Krapow moo".to_string(),
            unit_price: Money::from_baht(60),
            quantity: 1,
            options: None,
            note: None,
        }],
    };
    let full = api.process_new_order(request).await.expect("Error placing order");
    let so_id = full.shop_orders[0].shop_order.id;
    let merchant = Actor::Merchant(owner);
    api.update_shop_order_status(&merchant, so_id, ShopOrderStatus::Preparing).await.unwrap();
    so_id
}

#[test]
fn feed_orders_offers_by_distance_with_delay_tiers() {
    let sys = Runtime::new().unwrap();
    sys.block_on(async {
        let url = "sqlite://../data/test_matcher_feed.db";
        let db = new_db(url).await;
        // Pending orders never reach the feed; these three are advanced to Preparing below, at increasing
        // distances from the courier. The last shop has no coordinates at all.
        let courier_at = GeoPoint::new(13.7563, 100.5018);
        let near = NewShop::new("near", "Near", "own-1").at_location(13.7567, 100.5018); // ~45 m
        let mid = NewShop::new("mid", "Mid", "own-2").at_location(13.7613, 100.5018); // ~560 m
        let far = NewShop::new("far", "Far", "own-3").at_location(13.7693, 100.5018); // ~1.45 km
        let nowhere = NewShop::new("nowhere", "Nowhere", "own-4");
        let far_id = open_shop_order(&db, far, "cust-1").await;
        let near_id = open_shop_order(&db, near, "cust-2").await;
        let nowhere_id = open_shop_order(&db, nowhere, "cust-3").await;
        let mid_id = open_shop_order(&db, mid, "cust-4").await;

        let matcher = MatcherApi::new(db.clone(), EventProducers::default());
        let offers = matcher.assignment_feed(Some(courier_at)).await.unwrap();
        let ids = offers.iter().map(|o| o.shop_order.id).collect::<Vec<_>>();
        assert_eq!(ids, vec![near_id, mid_id, far_id, nowhere_id]);
        let delays = offers.iter().map(|o| o.visible_after_secs).collect::<Vec<_>>();
        assert_eq!(delays, vec![1, 10, 15, 60]);
        assert!(offers[3].distance_km.is_none());

        // Without a courier location every offer falls into the unknown tier.
        let offers = matcher.assignment_feed(None).await.unwrap();
        assert!(offers.iter().all(|o| o.visible_after_secs == 60));

        // A claimed shop order drops out of the feed.
        let outcome = matcher.try_claim(near_id, "rider-1").await.unwrap();
        assert!(outcome.is_won());
        let offers = matcher.assignment_feed(Some(courier_at)).await.unwrap();
        assert!(offers.iter().all(|o| o.shop_order.id != near_id));
    });
}

#[test]
fn cafeteria_pickup_point_overrides_shop_location() {
    let sys = Runtime::new().unwrap();
    sys.block_on(async {
        let url = "sqlite://../data/test_matcher_cafeteria.db";
        let db = new_db(url).await;
        db.upsert_pickup_location(PickupLocation {
            name: "Cafeteria B".to_string(),
            latitude: 13.7567,
            longitude: 100.5018,
        })
        .await
        .unwrap();
        // The shop itself is far away, but its food is collected from the nearby cafeteria counter.
        let shop = NewShop::new("stall-7", "Stall 7", "own-7").at_location(13.80, 100.52).in_cafeteria("Cafeteria B");
        let so_id = open_shop_order(&db, shop, "cust-1").await;
        let matcher = MatcherApi::new(db.clone(), EventProducers::default());
        let offers = matcher.assignment_feed(Some(GeoPoint::new(13.7563, 100.5018))).await.unwrap();
        let offer = offers.iter().find(|o| o.shop_order.id == so_id).unwrap();
        assert!(offer.distance_km.unwrap() < 0.1, "distance was {:?}", offer.distance_km);
        assert_eq!(offer.visible_after_secs, 1);
    });
}

#[test]
fn exactly_one_contender_wins_the_claim() {
    let sys = Runtime::new().unwrap();
    sys.block_on(async {
        let url = "sqlite://../data/test_matcher_claim_race.db";
        let db = new_db(url).await;
        let shop = NewShop::new("shop-race", "Race", "own-1").at_location(13.7563, 100.5018);
        let so_id = open_shop_order(&db, shop, "cust-1").await;

        let wins = Arc::new(AtomicU32::new(0));
        let mut handles = Vec::new();
        for i in 0..NUM_CONTENDERS {
            let db = db.clone();
            let wins = Arc::clone(&wins);
            handles.push(tokio::spawn(async move {
                let courier = format!("rider-{i}");
                if db.try_claim(so_id, &courier).await.expect("claim errored").is_some() {
                    wins.fetch_add(1, Ordering::SeqCst);
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(wins.load(Ordering::SeqCst), 1, "the claim must have exactly one winner");
        let so = db.fetch_shop_order(so_id).await.unwrap().unwrap();
        assert!(so.courier_id.is_some());
        info!("🚚️ Claim won by {}", so.courier_id.unwrap());
    });
}

#[test]
fn release_and_reassign() {
    let sys = Runtime::new().unwrap();
    sys.block_on(async {
        let url = "sqlite://../data/test_matcher_release.db";
        let db = new_db(url).await;
        let shop = NewShop::new("shop-rel", "Rel", "own-1").at_location(13.7563, 100.5018);
        let so_id = open_shop_order(&db, shop, "cust-1").await;
        let matcher = MatcherApi::new(db.clone(), EventProducers::default());

        let ClaimOutcome::Won(so) = matcher.try_claim(so_id, "rider-1").await.unwrap() else {
            panic!("claim should have been won");
        };
        assert_eq!(so.courier_id.as_deref(), Some("rider-1"));

        // Claiming an already-held job is a loss, not an error.
        let outcome = matcher.try_claim(so_id, "rider-2").await.unwrap();
        assert!(!outcome.is_won());

        // Only the holder can release.
        let err = matcher.release_claim(so_id, "rider-2").await.unwrap_err();
        assert!(matches!(err, DeliveryGatewayError::ReleaseForbidden));
        let released = matcher.release_claim(so_id, "rider-1").await.unwrap();
        assert!(released.courier_id.is_none());

        // Admin reassignment overrides whoever currently holds the job.
        matcher.try_claim(so_id, "rider-2").await.unwrap();
        let so = matcher.reassign(so_id, Some("rider-3")).await.unwrap();
        assert_eq!(so.courier_id.as_deref(), Some("rider-3"));
        let so = matcher.reassign(so_id, None).await.unwrap();
        assert!(so.courier_id.is_none());

        // After pickup the claim is locked in.
        matcher.try_claim(so_id, "rider-4").await.unwrap();
        let merchant = Actor::Merchant("own-1".to_string());
        let api = OrderFlowApi::new(db.clone(), NoRefunds, EventProducers::default());
        api.update_shop_order_status(&merchant, so_id, ShopOrderStatus::OutForDelivery).await.unwrap();
        db.settle_pickup(so_id, "rider-4").await.unwrap();
        let err = matcher.release_claim(so_id, "rider-4").await.unwrap_err();
        assert!(matches!(err, DeliveryGatewayError::ReleaseForbidden));
    });
}
