use crate::types::Role;

/// Master-only playback affordances
pub trait MasterControls {
    fn is_interactive(&self) -> bool;
    fn update_play_pause_button(&mut self, is_playing: bool);
}

/// Buttons shown to a master session
#[derive(Debug, Default)]
pub struct InteractiveControls {
    showing_pause: bool,
}

impl InteractiveControls {
    /// Label the play/pause button currently shows
    pub fn button_label(&self) -> &'static str {
        if self.showing_pause { "Pause" } else { "Play" }
    }
}

impl MasterControls for InteractiveControls {
    fn is_interactive(&self) -> bool {
        true
    }

    fn update_play_pause_button(&mut self, is_playing: bool) {
        self.showing_pause = is_playing;
    }
}

/// Slave sessions get no controls
#[derive(Debug, Default, Clone, Copy)]
pub struct InertControls;

impl MasterControls for InertControls {
    fn is_interactive(&self) -> bool {
        false
    }

    fn update_play_pause_button(&mut self, _is_playing: bool) {}
}

pub fn controls_for(role: Role) -> Box<dyn MasterControls> {
    match role {
        Role::Master => Box::new(InteractiveControls::default()),
        Role::Slave => Box::new(InertControls),
    }
}
