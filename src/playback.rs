use crate::assets::ClipHandle;

/// Normalized playback state for one clip instance. The ratio lives in
/// [0, 1); looping cursors wrap, one-shot cursors clamp at 1.
#[derive(Clone, Copy, Debug)]
pub struct PlaybackCursor {
    time_ratio: f32,
    previous_time_ratio: f32,
    playback_speed: f32,
    looping: bool,
}

impl PlaybackCursor {
    pub fn new(looping: bool) -> Self {
        Self { time_ratio: 0.0, previous_time_ratio: 0.0, playback_speed: 1.0, looping }
    }

    pub fn time_ratio(&self) -> f32 {
        self.time_ratio
    }

    pub fn previous_time_ratio(&self) -> f32 {
        self.previous_time_ratio
    }

    pub fn playback_speed(&self) -> f32 {
        self.playback_speed
    }

    pub fn set_playback_speed(&mut self, speed: f32) {
        self.playback_speed = speed;
    }

    pub fn looping(&self) -> bool {
        self.looping
    }

    pub fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    pub fn set_time_ratio(&mut self, ratio: f32) {
        self.previous_time_ratio = self.time_ratio;
        self.time_ratio = if self.looping { ratio - ratio.floor() } else { ratio.clamp(0.0, 1.0) };
    }

    /// Advances by `dt` seconds against a clip of `duration` seconds.
    /// Returns true when the cursor wrapped (looping) or first reached the
    /// end (one-shot) during this step.
    pub fn advance(&mut self, duration: f32, dt: f32) -> bool {
        if duration <= 0.0 {
            self.previous_time_ratio = self.time_ratio;
            self.time_ratio = 0.0;
            return false;
        }
        let unwrapped = self.time_ratio + dt * self.playback_speed / duration;
        self.previous_time_ratio = self.time_ratio;
        if self.looping {
            self.time_ratio = unwrapped - unwrapped.floor();
            unwrapped >= 1.0 || unwrapped < 0.0
        } else {
            self.time_ratio = unwrapped.clamp(0.0, 1.0);
            self.previous_time_ratio < 1.0 && unwrapped >= 1.0
        }
    }
}

/// Per-model playback record for one registered clip.
#[derive(Clone, Debug)]
pub struct AnimationHandle {
    pub clip: ClipHandle,
    pub should_loop: bool,
    pub cursor: PlaybackCursor,
}

impl AnimationHandle {
    pub fn new(clip: ClipHandle, should_loop: bool) -> Self {
        Self { clip, should_loop, cursor: PlaybackCursor::new(should_loop) }
    }
}
