//! Fire-and-forget delivery of engine events to async hooks.
//!
//! Each hook gets its own bounded queue. Flows in the engine hold an [`EventProducer`] and push events into it; the
//! matching [`EventHandler`] pulls them off and runs the hook on a fresh task for every event. A hook sees nothing but
//! the event, so a slow or failing hook cannot change the result of the purchase that raised it.
use std::{future::Future, pin::Pin, sync::Arc};

use log::*;
use tokio::{sync::mpsc, task::JoinSet};

pub type Handler<E> = Arc<dyn Fn(E) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

pub struct EventHandler<E: Send + Sync + 'static> {
    queue: mpsc::Receiver<E>,
    // Kept only so that `subscribe` can hand out producers before the handler starts.
    template: mpsc::Sender<E>,
    hook: Handler<E>,
}

impl<E: Send + Sync + 'static> EventHandler<E> {
    pub fn new(buffer_size: usize, hook: Handler<E>) -> Self {
        let (template, queue) = mpsc::channel(buffer_size.max(1));
        Self { queue, template, hook }
    }

    pub fn subscribe(&self) -> EventProducer<E> {
        EventProducer::new(self.template.clone())
    }

    /// Consumes events until the last producer is dropped. Returns once every hook invocation has finished.
    pub async fn start_handler(self) {
        let Self { mut queue, template, hook } = self;
        drop(template);
        debug!("📬️ Event handler is listening");
        let mut running = JoinSet::new();
        loop {
            tokio::select! {
                maybe_event = queue.recv() => match maybe_event {
                    Some(ev) => {
                        let hook = Arc::clone(&hook);
                        running.spawn(async move { hook(ev).await });
                    },
                    None => break,
                },
                Some(done) = running.join_next(), if !running.is_empty() => report(done),
            }
        }
        if !running.is_empty() {
            debug!("📬️ All producers are gone. Waiting on {} hook(s) still running", running.len());
        }
        while let Some(done) = running.join_next().await {
            report(done);
        }
        debug!("📬️ Event handler stopped");
    }
}

fn report(done: Result<(), tokio::task::JoinError>) {
    match done {
        Ok(()) => trace!("📬️ Event hook finished"),
        Err(e) => error!("📬️ An event hook did not finish cleanly. {e}"),
    }
}

#[derive(Clone)]
pub struct EventProducer<E: Send + Sync> {
    sender: mpsc::Sender<E>,
}

impl<E: Send + Sync> EventProducer<E> {
    pub fn new(sender: mpsc::Sender<E>) -> Self {
        Self { sender }
    }

    /// Queues the event. If the handler has gone away the event is logged and dropped.
    pub async fn publish_event(&self, event: E) {
        if self.sender.send(event).await.is_err() {
            warn!("📬️ No handler is listening any more. An event was dropped.");
        }
    }
}

#[cfg(test)]
mod test {
    use std::sync::atomic::{AtomicU64, Ordering};

    use super::*;

    #[tokio::test]
    async fn handler_drains_all_producers() {
        let _ = env_logger::try_init();
        let total = Arc::new(AtomicU64::new(0));
        let seen = total.clone();
        let hook: Handler<u64> = Arc::new(move |v| {
            let total = total.clone();
            Box::pin(async move {
                tokio::time::sleep(tokio::time::Duration::from_millis(20)).await;
                total.fetch_add(v, Ordering::SeqCst);
            }) as Pin<Box<dyn Future<Output = ()> + Send>>
        });
        let handler = EventHandler::new(1, hook);
        let odd = handler.subscribe();
        let even = handler.subscribe();
        tokio::spawn(async move {
            for i in 0..5 {
                odd.publish_event(i * 2 + 1).await;
            }
        });
        tokio::spawn(async move {
            for i in 0..5 {
                even.publish_event(i * 2).await;
            }
        });

        handler.start_handler().await;
        assert_eq!(seen.load(Ordering::SeqCst), 45);
    }

    #[tokio::test]
    async fn events_published_after_the_handler_is_gone_are_dropped() {
        let calls = Arc::new(AtomicU64::new(0));
        let seen = calls.clone();
        let hook: Handler<u64> = Arc::new(move |_: u64| {
            calls.fetch_add(1, Ordering::SeqCst);
            Box::pin(async {}) as Pin<Box<dyn Future<Output = ()> + Send>>
        });
        let handler = EventHandler::new(4, hook);
        let producer = handler.subscribe();
        drop(handler);

        // Returns instead of waiting on a queue nobody reads
        tokio::time::timeout(tokio::time::Duration::from_secs(1), producer.publish_event(1))
            .await
            .expect("Publishing must not block once the handler is gone");
        assert!(producer.sender.is_closed());
        assert_eq!(seen.load(Ordering::SeqCst), 0);
    }
}
