use axum::extract::ws::{Message, WebSocket};
use carousel_sync_core::{Error, Role, SyncMessage, SyncSnapshot};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Mutex, broadcast};

/// Frames buffered per connection before a slow receiver starts lagging
pub const RELAY_CAPACITY: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

/// A message on its way to every connection except its sender
#[derive(Debug, Clone)]
pub struct Frame {
    pub from: Option<ConnectionId>,
    pub message: SyncMessage,
}

impl Frame {
    pub fn is_for(&self, id: ConnectionId) -> bool {
        self.from != Some(id)
    }
}

/// What the relay did with an inbound frame
#[derive(Debug)]
pub enum Outcome {
    Relayed(SyncMessage),
    IgnoredFromSlave,
    IgnoredServerOnly,
    Malformed(Error),
}

/// A joined connection: its id, live feed and the state to replay first
pub struct Connection {
    pub id: ConnectionId,
    pub role: Role,
    pub feed: broadcast::Receiver<Frame>,
    pub replay: Vec<SyncMessage>,
}

/// Fan-out hub shared by every socket
pub struct RelayHub {
    tx: broadcast::Sender<Frame>,
    snapshot: Mutex<SyncSnapshot>,
    next_id: AtomicU64,
}

impl RelayHub {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(RELAY_CAPACITY);
        Self {
            tx,
            snapshot: Mutex::new(SyncSnapshot::default()),
            next_id: AtomicU64::new(1),
        }
    }

    pub async fn join(&self, role: Role) -> Connection {
        // Subscribe before reading the snapshot so nothing falls in between.
        // Masters get no replay; they announce their own state on connect.
        let feed = self.tx.subscribe();
        let replay = if role.is_master() {
            Vec::new()
        } else {
            self.snapshot.lock().await.replay()
        };
        let id = ConnectionId(self.next_id.fetch_add(1, Ordering::Relaxed));

        tracing::info!(connection = id.0, %role, "sync client joined");

        Connection {
            id,
            role,
            feed,
            replay,
        }
    }

    /// Handle one text frame from a client
    pub async fn receive(&self, id: ConnectionId, role: Role, text: &str) -> Outcome {
        let message = match SyncMessage::decode(text) {
            Ok(m) => m,
            Err(e) => return Outcome::Malformed(e),
        };

        if !message.is_client_message() {
            return Outcome::IgnoredServerOnly;
        }

        if !role.is_master() {
            return Outcome::IgnoredFromSlave;
        }

        // Apply and broadcast under one guard so feed order matches the snapshot
        let mut snapshot = self.snapshot.lock().await;
        snapshot.apply(&message);
        let _ = self.tx.send(Frame {
            from: Some(id),
            message,
        });
        drop(snapshot);

        Outcome::Relayed(message)
    }

    /// Tell every page to reload, e.g. after the manifest changed
    pub fn broadcast_reload(&self) -> usize {
        self.tx
            .send(Frame {
                from: None,
                message: SyncMessage::Reload,
            })
            .unwrap_or(0)
    }
}

impl Default for RelayHub {
    fn default() -> Self {
        Self::new()
    }
}

async fn send_message(
    sink: &mut SplitSink<WebSocket, Message>,
    message: &SyncMessage,
) -> Result<(), axum::Error> {
    match message.encode() {
        Ok(text) => sink.send(Message::Text(text.into())).await,
        Err(e) => {
            tracing::warn!(?message, error = %e, "dropping unencodable message");
            Ok(())
        }
    }
}

/// Drive one upgraded socket until either side goes away
pub async fn handle_socket(socket: WebSocket, hub: Arc<RelayHub>, role: Role) {
    let Connection {
        id,
        role,
        mut feed,
        replay,
    } = hub.join(role).await;
    let (mut sink, mut stream) = socket.split();

    let mut send_task = tokio::spawn(async move {
        for message in replay {
            if send_message(&mut sink, &message).await.is_err() {
                return;
            }
        }

        loop {
            match feed.recv().await {
                Ok(frame) => {
                    if !frame.is_for(id) {
                        continue;
                    }
                    if send_message(&mut sink, &frame.message).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(connection = id.0, skipped, "sync client lagging, frames skipped");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let recv_hub = hub.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(message)) = stream.next().await {
            match message {
                Message::Text(text) => match recv_hub.receive(id, role, text.as_str()).await {
                    Outcome::Relayed(m) => {
                        tracing::debug!(connection = id.0, message = ?m, "relayed");
                    }
                    Outcome::IgnoredFromSlave => {
                        tracing::debug!(connection = id.0, "ignoring frame from slave");
                    }
                    Outcome::IgnoredServerOnly => {
                        tracing::warn!(connection = id.0, "client sent a server-only frame");
                    }
                    Outcome::Malformed(e) => {
                        tracing::warn!(connection = id.0, error = %e, "dropping malformed frame");
                    }
                },
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    tracing::info!(connection = id.0, %role, "sync client left");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_master_frames_reach_others_not_sender() {
        let hub = RelayHub::new();
        let mut master = hub.join(Role::Master).await;
        let mut slave = hub.join(Role::Slave).await;

        let outcome = hub
            .receive(master.id, master.role, r#"{"type":"slideChange","index":3}"#)
            .await;
        assert!(matches!(
            outcome,
            Outcome::Relayed(SyncMessage::SlideChange { index: 3 })
        ));

        let frame = slave.feed.recv().await.unwrap();
        assert!(frame.is_for(slave.id));
        assert_eq!(frame.message, SyncMessage::SlideChange { index: 3 });

        let echoed = master.feed.recv().await.unwrap();
        assert!(!echoed.is_for(master.id));
    }

    #[tokio::test]
    async fn test_slave_frames_are_dropped() {
        let hub = RelayHub::new();
        let slave = hub.join(Role::Slave).await;
        let mut other = hub.join(Role::Slave).await;

        let outcome = hub
            .receive(slave.id, slave.role, r#"{"type":"slideChange","index":1}"#)
            .await;
        assert!(matches!(outcome, Outcome::IgnoredFromSlave));
        assert!(other.feed.try_recv().is_err());
        assert!(hub.join(Role::Slave).await.replay.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_and_server_only_frames_are_dropped() {
        let hub = RelayHub::new();
        let master = hub.join(Role::Master).await;
        let mut slave = hub.join(Role::Slave).await;

        assert!(matches!(
            hub.receive(master.id, master.role, "{not json").await,
            Outcome::Malformed(_)
        ));
        assert!(matches!(
            hub.receive(master.id, master.role, r#"{"type":"reload"}"#).await,
            Outcome::IgnoredServerOnly
        ));
        assert!(slave.feed.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_late_joiner_gets_snapshot_replay() {
        let hub = RelayHub::new();
        let master = hub.join(Role::Master).await;

        for frame in [
            r#"{"type":"slideChange","index":1}"#,
            r#"{"type":"playState","isPlaying":true}"#,
            r#"{"type":"slideChange","index":4}"#,
        ] {
            hub.receive(master.id, master.role, frame).await;
        }

        let late_master = hub.join(Role::Master).await;
        assert!(late_master.replay.is_empty());

        let late = hub.join(Role::Slave).await;
        assert_eq!(
            late.replay,
            vec![
                SyncMessage::SlideChange { index: 4 },
                SyncMessage::PlayState { is_playing: true },
            ]
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_two_masters_replay_matches_last_delivered() {
        let hub = Arc::new(RelayHub::new());
        let a = hub.join(Role::Master).await;
        let b = hub.join(Role::Master).await;
        let mut watcher = hub.join(Role::Slave).await;

        let mut tasks = Vec::new();
        for (conn, offset) in [(a.id, 0), (b.id, 1)] {
            let hub = hub.clone();
            tasks.push(tokio::spawn(async move {
                for i in 0..40 {
                    let frame = format!(r#"{{"type":"slideChange","index":{}}}"#, i * 2 + offset);
                    hub.receive(conn, Role::Master, &frame).await;
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        let mut last = None;
        while let Ok(frame) = watcher.feed.try_recv() {
            last = Some(frame.message);
        }

        let late = hub.join(Role::Slave).await;
        assert_eq!(late.replay.first().copied(), last);
    }

    #[tokio::test]
    async fn test_reload_reaches_everyone() {
        let hub = RelayHub::new();
        assert_eq!(hub.broadcast_reload(), 0);

        let mut a = hub.join(Role::Master).await;
        let mut b = hub.join(Role::Slave).await;
        assert_eq!(hub.broadcast_reload(), 2);

        for conn in [&mut a, &mut b] {
            let frame = conn.feed.recv().await.unwrap();
            assert!(frame.is_for(conn.id));
            assert_eq!(frame.message, SyncMessage::Reload);
        }
    }

    #[tokio::test]
    async fn test_connection_ids_are_unique() {
        let hub = RelayHub::new();
        let a = hub.join(Role::Slave).await;
        let b = hub.join(Role::Slave).await;
        assert_ne!(a.id, b.id);
    }
}
