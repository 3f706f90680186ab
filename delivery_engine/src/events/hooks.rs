use std::{future::Future, pin::Pin, sync::Arc};

use crate::events::{
    AssignmentClaimedEvent,
    AssignmentOpenedEvent,
    AssignmentRemovedEvent,
    DeliverySettledEvent,
    EventHandler,
    EventProducer,
    Handler,
    OrderPlacedEvent,
    PayoutResolvedEvent,
    PickupSettledEvent,
    ShopOrderCancelledEvent,
    ShopOrderStatusChangedEvent,
};

#[derive(Default, Clone)]
pub struct EventProducers {
    pub order_placed_producer: Vec<EventProducer<OrderPlacedEvent>>,
    pub status_changed_producer: Vec<EventProducer<ShopOrderStatusChangedEvent>>,
    pub assignment_opened_producer: Vec<EventProducer<AssignmentOpenedEvent>>,
    pub assignment_claimed_producer: Vec<EventProducer<AssignmentClaimedEvent>>,
    pub assignment_removed_producer: Vec<EventProducer<AssignmentRemovedEvent>>,
    pub order_cancelled_producer: Vec<EventProducer<ShopOrderCancelledEvent>>,
    pub pickup_settled_producer: Vec<EventProducer<PickupSettledEvent>>,
    pub delivery_settled_producer: Vec<EventProducer<DeliverySettledEvent>>,
    pub payout_resolved_producer: Vec<EventProducer<PayoutResolvedEvent>>,
}

pub struct EventHandlers {
    pub on_order_placed: Option<EventHandler<OrderPlacedEvent>>,
    pub on_status_changed: Option<EventHandler<ShopOrderStatusChangedEvent>>,
    pub on_assignment_opened: Option<EventHandler<AssignmentOpenedEvent>>,
    pub on_assignment_claimed: Option<EventHandler<AssignmentClaimedEvent>>,
    pub on_assignment_removed: Option<EventHandler<AssignmentRemovedEvent>>,
    pub on_order_cancelled: Option<EventHandler<ShopOrderCancelledEvent>>,
    pub on_pickup_settled: Option<EventHandler<PickupSettledEvent>>,
    pub on_delivery_settled: Option<EventHandler<DeliverySettledEvent>>,
    pub on_payout_resolved: Option<EventHandler<PayoutResolvedEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        Self {
            on_order_placed: hooks.on_order_placed.map(|f| EventHandler::new(buffer_size, f)),
            on_status_changed: hooks.on_status_changed.map(|f| EventHandler::new(buffer_size, f)),
            on_assignment_opened: hooks.on_assignment_opened.map(|f| EventHandler::new(buffer_size, f)),
            on_assignment_claimed: hooks.on_assignment_claimed.map(|f| EventHandler::new(buffer_size, f)),
            on_assignment_removed: hooks.on_assignment_removed.map(|f| EventHandler::new(buffer_size, f)),
            on_order_cancelled: hooks.on_order_cancelled.map(|f| EventHandler::new(buffer_size, f)),
            on_pickup_settled: hooks.on_pickup_settled.map(|f| EventHandler::new(buffer_size, f)),
            on_delivery_settled: hooks.on_delivery_settled.map(|f| EventHandler::new(buffer_size, f)),
            on_payout_resolved: hooks.on_payout_resolved.map(|f| EventHandler::new(buffer_size, f)),
        }
    }

    pub fn producers(&self) -> EventProducers {
        let mut result = EventProducers::default();
        if let Some(handler) = &self.on_order_placed {
            result.order_placed_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_status_changed {
            result.status_changed_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_assignment_opened {
            result.assignment_opened_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_assignment_claimed {
            result.assignment_claimed_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_assignment_removed {
            result.assignment_removed_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_order_cancelled {
            result.order_cancelled_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_pickup_settled {
            result.pickup_settled_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_delivery_settled {
            result.delivery_settled_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_payout_resolved {
            result.payout_resolved_producer.push(handler.subscribe());
        }
        result
    }

    pub async fn start_handlers(self) {
        fn spawn<E: Send + Sync + 'static>(handler: Option<EventHandler<E>>) {
            if let Some(handler) = handler {
                tokio::spawn(async move {
                    handler.start_handler().await;
                });
            }
        }
        spawn(self.on_order_placed);
        spawn(self.on_status_changed);
        spawn(self.on_assignment_opened);
        spawn(self.on_assignment_claimed);
        spawn(self.on_assignment_removed);
        spawn(self.on_order_cancelled);
        spawn(self.on_pickup_settled);
        spawn(self.on_delivery_settled);
        spawn(self.on_payout_resolved);
    }
}

#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_order_placed: Option<Handler<OrderPlacedEvent>>,
    pub on_status_changed: Option<Handler<ShopOrderStatusChangedEvent>>,
    pub on_assignment_opened: Option<Handler<AssignmentOpenedEvent>>,
    pub on_assignment_claimed: Option<Handler<AssignmentClaimedEvent>>,
    pub on_assignment_removed: Option<Handler<AssignmentRemovedEvent>>,
    pub on_order_cancelled: Option<Handler<ShopOrderCancelledEvent>>,
    pub on_pickup_settled: Option<Handler<PickupSettledEvent>>,
    pub on_delivery_settled: Option<Handler<DeliverySettledEvent>>,
    pub on_payout_resolved: Option<Handler<PayoutResolvedEvent>>,
}

impl EventHooks {
    pub fn on_order_placed<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(OrderPlacedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_order_placed = Some(Arc::new(f));
        self
    }

    pub fn on_status_changed<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(ShopOrderStatusChangedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_status_changed = Some(Arc::new(f));
        self
    }

    pub fn on_assignment_opened<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(AssignmentOpenedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_assignment_opened = Some(Arc::new(f));
        self
    }

    pub fn on_assignment_claimed<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(AssignmentClaimedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_assignment_claimed = Some(Arc::new(f));
        self
    }

    pub fn on_assignment_removed<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(AssignmentRemovedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_assignment_removed = Some(Arc::new(f));
        self
    }

    pub fn on_order_cancelled<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(ShopOrderCancelledEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_order_cancelled = Some(Arc::new(f));
        self
    }

    pub fn on_pickup_settled<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(PickupSettledEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_pickup_settled = Some(Arc::new(f));
        self
    }

    pub fn on_delivery_settled<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(DeliverySettledEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_delivery_settled = Some(Arc::new(f));
        self
    }

    pub fn on_payout_resolved<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(PayoutResolvedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_payout_resolved = Some(Arc::new(f));
        self
    }
}
