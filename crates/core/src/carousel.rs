use crate::error::Result;

/// Playback controls of the video embedded in one slide
pub trait VideoSurface {
    /// Start playback. May fail, e.g. when autoplay is blocked.
    fn play(&mut self) -> Result<()>;
    fn pause(&mut self);
    /// Seek back to time zero
    fn rewind(&mut self);
    fn is_playing(&self) -> bool;
}

/// Circular carousel of video slides addressed by logical index
pub struct CarouselController<V> {
    slides: Vec<V>,
    current: usize,
    started: bool,
}

impl<V: VideoSurface> CarouselController<V> {
    pub fn new(slides: Vec<V>) -> Self {
        Self {
            slides,
            current: 0,
            started: false,
        }
    }

    pub fn len(&self) -> usize {
        self.slides.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slides.is_empty()
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn slides(&self) -> &[V] {
        &self.slides
    }

    pub fn active_slide_mut(&mut self) -> Option<&mut V> {
        self.slides.get_mut(self.current)
    }

    /// Activate the first slide. Counts as a slide change.
    pub fn start(&mut self) -> Option<usize> {
        if self.slides.is_empty() {
            return None;
        }
        self.started = true;
        self.current = 0;
        self.activate();
        Some(self.current)
    }

    /// Jump to a logical index, wrapping past the end.
    ///
    /// Returns the new index when the active slide changed.
    pub fn slide_to_loop(&mut self, index: usize) -> Option<usize> {
        if self.slides.is_empty() {
            return None;
        }

        let target = index % self.slides.len();
        if self.started && target == self.current {
            return None;
        }

        self.started = true;
        self.current = target;
        self.activate();
        Some(target)
    }

    pub fn next(&mut self) -> Option<usize> {
        self.slide_to_loop(self.current + 1)
    }

    pub fn prev(&mut self) -> Option<usize> {
        let len = self.slides.len();
        if len == 0 {
            return None;
        }
        self.slide_to_loop((self.current + len - 1) % len)
    }

    /// Pause and rewind every other slide, then play the active one
    fn activate(&mut self) {
        let current = self.current;
        for (i, slide) in self.slides.iter_mut().enumerate() {
            if i != current {
                slide.pause();
                slide.rewind();
            }
        }

        if let Some(slide) = self.slides.get_mut(current)
            && let Err(e) = slide.play()
        {
            tracing::warn!(slide = current, error = %e, "video playback did not start");
        }
    }
}
