//! One browser session's worth of carousel, sync and playback state.
//!
//! Master sessions broadcast every local slide change and play/pause toggle.
//! Slave sessions apply what they receive and never send anything back, so a
//! master and its slaves cannot feed back into each other.

use crate::carousel::{CarouselController, VideoSurface};
use crate::channel::{SyncChannel, SyncHandler, dispatch};
use crate::controls::{MasterControls, controls_for};
use crate::error::{Error, Result};
use crate::indicator::PlayIndicator;
use crate::protocol::SyncMessage;
use crate::types::{AlbumItem, PlaybackState, Role};

/// Explicit session state, passed to whoever needs it
#[derive(Debug, Clone)]
pub struct SessionState {
    pub role: Role,
    pub album: Vec<AlbumItem>,
    pub current_slide_index: usize,
    pub playback: PlaybackState,
}

impl SessionState {
    pub fn num_slides(&self) -> usize {
        self.album.len()
    }
}

/// Local navigation request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    Next,
    Prev,
    To(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    Local,
    Remote,
}

pub struct AlbumPlayer<V, C> {
    session: SessionState,
    carousel: CarouselController<V>,
    channel: C,
    controls: Box<dyn MasterControls>,
    indicator: PlayIndicator,
}

impl<V: VideoSurface, C: SyncChannel> AlbumPlayer<V, C> {
    /// Build one slide per album item using `make_video`
    pub fn new<F>(role: Role, album: Vec<AlbumItem>, mut make_video: F, channel: C) -> Self
    where
        F: FnMut(&AlbumItem) -> V,
    {
        let slides = album.iter().map(&mut make_video).collect();

        Self {
            session: SessionState {
                role,
                album,
                current_slide_index: 0,
                playback: PlaybackState::default(),
            },
            carousel: CarouselController::new(slides),
            channel,
            controls: controls_for(role),
            indicator: PlayIndicator::new(),
        }
    }

    /// Activate the first slide. Nothing is broadcast.
    pub fn start(&mut self) {
        if let Some(index) = self.carousel.start() {
            self.session.current_slide_index = index;
        }
        self.refresh_views();
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub fn carousel(&self) -> &CarouselController<V> {
        &self.carousel
    }

    pub fn indicator(&self) -> &PlayIndicator {
        &self.indicator
    }

    pub fn controls(&self) -> &dyn MasterControls {
        self.controls.as_ref()
    }

    pub fn channel_mut(&mut self) -> &mut C {
        &mut self.channel
    }

    pub fn current_index(&self) -> usize {
        self.carousel.current_index()
    }

    /// Local navigation. Only a master may navigate.
    pub fn navigate(&mut self, navigation: Navigation) -> Result<Option<usize>> {
        self.require_master()?;

        let changed = match navigation {
            Navigation::Next => self.carousel.next(),
            Navigation::Prev => self.carousel.prev(),
            Navigation::To(index) => self.carousel.slide_to_loop(index),
        };

        if let Some(index) = changed {
            self.on_slide_change(index, Origin::Local);
        }
        Ok(changed)
    }

    /// Flip playback and broadcast the new state. Master only.
    pub fn toggle_play(&mut self) -> Result<bool> {
        let target = !self.session.playback.is_playing;
        self.set_playing(target)?;
        Ok(target)
    }

    pub fn set_playing(&mut self, is_playing: bool) -> Result<()> {
        self.require_master()?;
        self.apply_play_state(is_playing);
        self.channel.send_play_state(is_playing);
        Ok(())
    }

    /// Called each time the transport (re)connects.
    ///
    /// A master announces its current slide and playback state, since
    /// anything it sent while disconnected was lost. Slaves wait for the
    /// relay's replay.
    pub fn on_connected(&mut self) {
        if !self.session.role.is_master() || self.carousel.is_empty() {
            return;
        }
        self.channel.send_slide_change(self.carousel.current_index());
        self.channel
            .send_play_state(self.session.playback.is_playing);
    }

    /// Apply a decoded message from the sync channel
    pub fn handle_message(&mut self, message: SyncMessage) {
        dispatch(message, self);
    }

    /// Decode and apply a raw frame. Malformed frames leave state untouched.
    pub fn handle_text(&mut self, text: &str) -> Result<()> {
        let message = SyncMessage::decode(text)?;
        self.handle_message(message);
        Ok(())
    }

    fn require_master(&self) -> Result<()> {
        if self.controls.is_interactive() && self.session.role.is_master() {
            Ok(())
        } else {
            Err(Error::NotMaster)
        }
    }

    fn on_slide_change(&mut self, index: usize, origin: Origin) {
        self.session.current_slide_index = index;
        self.refresh_views();

        if origin == Origin::Local && self.session.role.is_master() {
            self.channel.send_slide_change(index);
        }
    }

    fn apply_play_state(&mut self, is_playing: bool) {
        self.session.playback.is_playing = is_playing;

        if let Some(video) = self.carousel.active_slide_mut() {
            if is_playing {
                if let Err(e) = video.play() {
                    tracing::warn!(error = %e, "video playback did not resume");
                }
            } else {
                video.pause();
            }
        }

        self.refresh_views();
    }

    fn refresh_views(&mut self) {
        self.indicator.update(&self.session.playback);
        self.controls
            .update_play_pause_button(self.session.playback.is_playing);
    }
}

impl<V: VideoSurface, C: SyncChannel> SyncHandler for AlbumPlayer<V, C> {
    fn on_slide_jump(&mut self, index: usize) {
        if let Some(index) = self.carousel.slide_to_loop(index) {
            self.on_slide_change(index, Origin::Remote);
        }
    }

    fn on_play_state(&mut self, is_playing: bool) {
        self.apply_play_state(is_playing);
    }

    fn on_reload(&mut self) {
        tracing::debug!("reload requested by server");
    }
}
