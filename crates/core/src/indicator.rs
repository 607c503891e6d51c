use crate::types::PlaybackState;

/// Passive display of the current playback state
#[derive(Debug, Default, Clone)]
pub struct PlayIndicator {
    shown: PlaybackState,
    renders: usize,
}

impl PlayIndicator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, state: &PlaybackState) {
        self.shown = *state;
        self.renders += 1;
    }

    pub fn is_playing(&self) -> bool {
        self.shown.is_playing
    }

    pub fn label(&self) -> &'static str {
        if self.shown.is_playing {
            "playing"
        } else {
            "paused"
        }
    }

    pub fn render_count(&self) -> usize {
        self.renders
    }
}
