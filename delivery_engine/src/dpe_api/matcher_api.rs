use std::{cmp::Ordering, collections::HashMap, fmt::Debug};

use log::*;

use crate::{
    db_types::{Shop, ShopOrder},
    events::{AssignmentClaimedEvent, AssignmentOpenedEvent, AssignmentRemovedEvent, EventProducers},
    helpers::{haversine_km, visibility_delay_secs, GeoPoint},
    order_objects::{AssignmentOffer, ClaimOutcome},
    traits::{DeliveryGatewayDatabase, DeliveryGatewayError},
};

/// `MatcherApi` builds the courier assignment feed and arbitrates claims.
///
/// Couriers pull offers from the feed, each with a distance-based visibility delay (closer couriers see fresh
/// offers sooner), and race for them through [`MatcherApi::try_claim`]. The claim is a single conditional update in
/// the backend, so exactly one contender ever wins a given shop order.
pub struct MatcherApi<B> {
    db: B,
    producers: EventProducers,
}

impl<B> Debug for MatcherApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MatcherApi")
    }
}

impl<B> MatcherApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers }
    }
}

impl<B> MatcherApi<B>
where B: DeliveryGatewayDatabase
{
    /// The current assignment feed for a courier.
    ///
    /// Offers are sorted by distance to the pickup point, closest first, with unknown distances last. The
    /// `visible_after_secs` tier tells the host how long to hold each offer back from this courier's screen.
    pub async fn assignment_feed(
        &self,
        courier_location: Option<GeoPoint>,
    ) -> Result<Vec<AssignmentOffer>, DeliveryGatewayError> {
        let open = self.db.open_assignments().await?;
        let pickup_points: HashMap<String, GeoPoint> =
            self.db.fetch_pickup_locations().await?.into_iter().map(|l| (l.name.clone(), l.point())).collect();
        let mut offers = open
            .into_iter()
            .map(|(shop_order, shop)| {
                let pickup = resolve_pickup(&shop, &pickup_points);
                let distance_km = match (courier_location, pickup) {
                    (Some(courier), Some(pickup)) => Some(haversine_km(courier, pickup)),
                    _ => None,
                };
                let visible_after_secs = visibility_delay_secs(distance_km);
                AssignmentOffer { shop_order, pickup, distance_km, visible_after_secs }
            })
            .collect::<Vec<_>>();
        offers.sort_by(|a, b| match (a.distance_km, b.distance_km) {
            (Some(a), Some(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        });
        trace!("🚚️ Assignment feed built: {} offer(s)", offers.len());
        Ok(offers)
    }

    /// Attempts to claim a shop order for a courier. Losing the race is a normal outcome and comes back as
    /// [`ClaimOutcome::Lost`], never an error.
    pub async fn try_claim(&self, shop_order_id: i64, courier_id: &str) -> Result<ClaimOutcome, DeliveryGatewayError> {
        match self.db.try_claim(shop_order_id, courier_id).await? {
            Some(shop_order) => {
                for emitter in &self.producers.assignment_claimed_producer {
                    emitter
                        .publish_event(AssignmentClaimedEvent {
                            shop_order: shop_order.clone(),
                            courier_id: courier_id.to_string(),
                        })
                        .await;
                }
                for emitter in &self.producers.assignment_removed_producer {
                    emitter.publish_event(AssignmentRemovedEvent { shop_order_id }).await;
                }
                Ok(ClaimOutcome::Won(shop_order))
            },
            None => Ok(ClaimOutcome::Lost),
        }
    }

    /// Releases a claim the courier holds and republishes the offer.
    pub async fn release_claim(&self, shop_order_id: i64, courier_id: &str) -> Result<ShopOrder, DeliveryGatewayError> {
        let shop_order = self.db.release_claim(shop_order_id, courier_id).await?;
        for emitter in &self.producers.assignment_opened_producer {
            emitter.publish_event(AssignmentOpenedEvent { shop_order: shop_order.clone() }).await;
        }
        Ok(shop_order)
    }

    /// Admin override of an assignment. Passing `None` clears the assignee and reopens the offer.
    pub async fn reassign(
        &self,
        shop_order_id: i64,
        courier_id: Option<&str>,
    ) -> Result<ShopOrder, DeliveryGatewayError> {
        let shop_order = self.db.reassign(shop_order_id, courier_id).await?;
        match courier_id {
            Some(courier_id) => {
                for emitter in &self.producers.assignment_claimed_producer {
                    emitter
                        .publish_event(AssignmentClaimedEvent {
                            shop_order: shop_order.clone(),
                            courier_id: courier_id.to_string(),
                        })
                        .await;
                }
            },
            None => {
                for emitter in &self.producers.assignment_opened_producer {
                    emitter.publish_event(AssignmentOpenedEvent { shop_order: shop_order.clone() }).await;
                }
            },
        }
        Ok(shop_order)
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

/// The shop's cafeteria counter when one is configured and known, otherwise the shop's own coordinates.
fn resolve_pickup(shop: &Shop, pickup_points: &HashMap<String, GeoPoint>) -> Option<GeoPoint> {
    shop.cafeteria.as_ref().and_then(|name| pickup_points.get(name).copied()).or_else(|| shop.location())
}
