use crate::protocol::SyncMessage;
use std::collections::VecDeque;

/// Outbound half of the sync transport. Sends are fire-and-forget.
pub trait SyncChannel {
    fn send(&mut self, message: &SyncMessage);

    fn send_slide_change(&mut self, index: usize) {
        self.send(&SyncMessage::SlideChange { index });
    }

    fn send_play_state(&mut self, is_playing: bool) {
        self.send(&SyncMessage::PlayState { is_playing });
    }
}

/// Stands in for a transport that is not connected
#[derive(Debug, Default, Clone, Copy)]
pub struct DisconnectedChannel;

impl SyncChannel for DisconnectedChannel {
    fn send(&mut self, message: &SyncMessage) {
        tracing::debug!(?message, "sync channel not connected, dropping message");
    }
}

/// Queues encoded frames until a transport drains them
#[derive(Debug, Default)]
pub struct OutboxChannel {
    frames: VecDeque<String>,
}

impl OutboxChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn drain(&mut self) -> Vec<String> {
        self.frames.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl SyncChannel for OutboxChannel {
    fn send(&mut self, message: &SyncMessage) {
        match message.encode() {
            Ok(frame) => self.frames.push_back(frame),
            Err(e) => tracing::warn!(?message, error = %e, "dropping unencodable message"),
        }
    }
}

impl<C: SyncChannel + ?Sized> SyncChannel for Box<C> {
    fn send(&mut self, message: &SyncMessage) {
        (**self).send(message);
    }
}

/// Receiver of inbound sync notifications
pub trait SyncHandler {
    fn on_slide_jump(&mut self, index: usize);
    fn on_play_state(&mut self, is_playing: bool);
    fn on_reload(&mut self) {}
}

/// Route one inbound message to the matching handler callback
pub fn dispatch<H: SyncHandler + ?Sized>(message: SyncMessage, handler: &mut H) {
    match message {
        SyncMessage::SlideChange { index } => handler.on_slide_jump(index),
        SyncMessage::PlayState { is_playing } => handler.on_play_state(is_playing),
        SyncMessage::Reload => handler.on_reload(),
    }
}
