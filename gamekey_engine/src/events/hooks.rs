use std::{future::Future, pin::Pin, sync::Arc};

use log::*;

use crate::events::{
    EventHandler,
    EventProducer,
    FulfillmentPendingEvent,
    Handler,
    OrderAnnulledEvent,
    OrderCompletedEvent,
    PreorderPlacedEvent,
    RefundFailedEvent,
};

type BoxedHook = Pin<Box<dyn Future<Output = ()> + Send>>;

#[derive(Default, Clone)]
pub struct EventProducers {
    pub order_completed_producer: Vec<EventProducer<OrderCompletedEvent>>,
    pub order_annulled_producer: Vec<EventProducer<OrderAnnulledEvent>>,
    pub preorder_placed_producer: Vec<EventProducer<PreorderPlacedEvent>>,
    pub fulfillment_pending_producer: Vec<EventProducer<FulfillmentPendingEvent>>,
    pub refund_failed_producer: Vec<EventProducer<RefundFailedEvent>>,
}

impl EventProducers {
    pub async fn publish_order_completed(&self, event: OrderCompletedEvent) {
        for emitter in &self.order_completed_producer {
            debug!("📬️ Notifying order completed hook subscribers");
            emitter.publish_event(event.clone()).await;
        }
    }

    pub async fn publish_order_annulled(&self, event: OrderAnnulledEvent) {
        for emitter in &self.order_annulled_producer {
            debug!("📬️ Notifying order annulled hook subscribers");
            emitter.publish_event(event.clone()).await;
        }
    }

    pub async fn publish_preorder_placed(&self, event: PreorderPlacedEvent) {
        for emitter in &self.preorder_placed_producer {
            emitter.publish_event(event.clone()).await;
        }
    }

    pub async fn publish_fulfillment_pending(&self, event: FulfillmentPendingEvent) {
        for emitter in &self.fulfillment_pending_producer {
            emitter.publish_event(event.clone()).await;
        }
    }

    pub async fn publish_refund_failed(&self, event: RefundFailedEvent) {
        for emitter in &self.refund_failed_producer {
            emitter.publish_event(event.clone()).await;
        }
    }
}

pub struct EventHandlers {
    pub on_order_completed: Option<EventHandler<OrderCompletedEvent>>,
    pub on_order_annulled: Option<EventHandler<OrderAnnulledEvent>>,
    pub on_preorder_placed: Option<EventHandler<PreorderPlacedEvent>>,
    pub on_fulfillment_pending: Option<EventHandler<FulfillmentPendingEvent>>,
    pub on_refund_failed: Option<EventHandler<RefundFailedEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        Self {
            on_order_completed: hooks.on_order_completed.map(|f| EventHandler::new(buffer_size, f)),
            on_order_annulled: hooks.on_order_annulled.map(|f| EventHandler::new(buffer_size, f)),
            on_preorder_placed: hooks.on_preorder_placed.map(|f| EventHandler::new(buffer_size, f)),
            on_fulfillment_pending: hooks.on_fulfillment_pending.map(|f| EventHandler::new(buffer_size, f)),
            on_refund_failed: hooks.on_refund_failed.map(|f| EventHandler::new(buffer_size, f)),
        }
    }

    pub fn producers(&self) -> EventProducers {
        let mut result = EventProducers::default();
        if let Some(handler) = &self.on_order_completed {
            result.order_completed_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_order_annulled {
            result.order_annulled_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_preorder_placed {
            result.preorder_placed_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_fulfillment_pending {
            result.fulfillment_pending_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_refund_failed {
            result.refund_failed_producer.push(handler.subscribe());
        }
        result
    }

    /// Spawns every configured handler. Each one shuts down once all of its producers have been dropped.
    pub async fn start_handlers(self) {
        if let Some(handler) = self.on_order_completed {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_order_annulled {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_preorder_placed {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_fulfillment_pending {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_refund_failed {
            tokio::spawn(handler.start_handler());
        }
    }
}

#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_order_completed: Option<Handler<OrderCompletedEvent>>,
    pub on_order_annulled: Option<Handler<OrderAnnulledEvent>>,
    pub on_preorder_placed: Option<Handler<PreorderPlacedEvent>>,
    pub on_fulfillment_pending: Option<Handler<FulfillmentPendingEvent>>,
    pub on_refund_failed: Option<Handler<RefundFailedEvent>>,
}

impl EventHooks {
    pub fn on_order_completed<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(OrderCompletedEvent) -> BoxedHook) + Send + Sync + 'static {
        self.on_order_completed = Some(Arc::new(f));
        self
    }

    pub fn on_order_annulled<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(OrderAnnulledEvent) -> BoxedHook) + Send + Sync + 'static {
        self.on_order_annulled = Some(Arc::new(f));
        self
    }

    pub fn on_preorder_placed<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(PreorderPlacedEvent) -> BoxedHook) + Send + Sync + 'static {
        self.on_preorder_placed = Some(Arc::new(f));
        self
    }

    pub fn on_fulfillment_pending<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(FulfillmentPendingEvent) -> BoxedHook) + Send + Sync + 'static {
        self.on_fulfillment_pending = Some(Arc::new(f));
        self
    }

    pub fn on_refund_failed<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(RefundFailedEvent) -> BoxedHook) + Send + Sync + 'static {
        self.on_refund_failed = Some(Arc::new(f));
        self
    }
}
