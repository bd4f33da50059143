// implementation of trait Broadcaster

use app_core::ports::{Broadcaster, Envelope, MessageType, NoticeStream};
use async_trait::async_trait;
use dashmap::DashMap;
use futures_core::Stream;
use futures_util::StreamExt;
use serde_json::Value;
use std::{
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::debug;
use uuid::Uuid;

/// Small bounded buffer per tournament; a slow subscriber drops oldest
/// messages rather than back-pressuring the publisher.
const BUS_CAPACITY: usize = 128;

type Buses = Arc<DashMap<Uuid, broadcast::Sender<Envelope>>>;

/// RAII stream wrapper: drops the underlying receiver and removes an empty
/// topic bus once no subscribers remain.
struct SubscriptionStream {
    inner: Pin<Box<dyn Stream<Item = Envelope> + Send>>,
    buses: Buses,
    tournament_id: Uuid,
}

impl Stream for SubscriptionStream {
    type Item = Envelope;
    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

impl Drop for SubscriptionStream {
    fn drop(&mut self) {
        if let Some(bus) = self.buses.get(&self.tournament_id) {
            if bus.receiver_count() == 0 {
                drop(bus);
                self.buses.remove(&self.tournament_id);
            }
        }
    }
}

/// In-memory implementation using DashMap + tokio::broadcast, one bus per
/// tournament, created lazily on first subscribe.
#[derive(Clone, Default)]
pub struct CrSingleInstance {
    buses: Buses,
}

impl CrSingleInstance {
    pub fn new() -> Self {
        Self { buses: Arc::new(DashMap::new()) }
    }

    fn ensure_bus(&self, tournament_id: Uuid) -> broadcast::Sender<Envelope> {
        self.buses.entry(tournament_id).or_insert_with(|| broadcast::channel(BUS_CAPACITY).0).clone()
    }

    fn get_bus(&self, tournament_id: Uuid) -> Option<broadcast::Sender<Envelope>> {
        self.buses.get(&tournament_id).map(|g| g.clone())
    }
}

#[async_trait]
impl Broadcaster for CrSingleInstance {
    async fn subscribe(&self, tournament_id: Uuid) -> NoticeStream {
        let tx = self.ensure_bus(tournament_id);
        let rx = tx.subscribe();
        let base = BroadcastStream::new(rx).filter_map(|res| async move { res.ok() });

        Box::pin(SubscriptionStream {
            inner: Box::pin(base),
            buses: Arc::clone(&self.buses),
            tournament_id,
        })
    }

    async fn broadcast(&self, tournament_id: Uuid, message_type: MessageType, payload: Value) {
        if let Some(tx) = self.get_bus(tournament_id) {
            let envelope = Envelope { tournament_id, message_type, payload };
            // best-effort fan-out: no subscribers currently reading is not an error
            if tx.send(envelope).is_err() {
                debug!(%tournament_id, "broadcast with no active receivers");
            }
        }
    }
}
