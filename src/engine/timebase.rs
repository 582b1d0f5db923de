use crate::io::midi::ScheduleHint;

/// Audio clock for the render thread plus the last external sync point.
///
/// The control thread periodically sends a pair of readings taken at the
/// same instant: its wall clock (ms) and the audio clock (s). The pair gives
/// the offset used to map wall-clock event stamps onto the audio clock.
/// Between syncs the audio clock advances by one block per render.
#[derive(Debug, Clone)]
pub struct Timebase {
    sample_rate: f64,
    sync_wall_ms: f64,
    sync_audio_sec: f64,
    audio_clock_sec: f64,
}

impl Timebase {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            sample_rate: sample_rate as f64,
            sync_wall_ms: 0.0,
            sync_audio_sec: 0.0,
            audio_clock_sec: 0.0,
        }
    }

    /// Resynchronize. Non-finite readings count as zero.
    pub fn sync(&mut self, wall_clock_ms: f64, audio_clock_sec: f64) {
        let finite = |v: f64| if v.is_finite() { v } else { 0.0 };
        self.sync_wall_ms = finite(wall_clock_ms);
        self.sync_audio_sec = finite(audio_clock_sec);
        self.audio_clock_sec = self.sync_audio_sec;
    }

    /// Audio time at the start of the next block.
    pub fn block_start_sec(&self) -> f64 {
        self.audio_clock_sec
    }

    pub fn advance(&mut self, frames: usize) {
        self.audio_clock_sec += frames as f64 / self.sample_rate;
    }

    /// Map a wall-clock stamp onto the audio clock via the last sync point.
    pub fn wall_to_audio_sec(&self, wall_ms: f64) -> f64 {
        wall_ms / 1000.0 + (self.sync_audio_sec - self.sync_wall_ms / 1000.0)
    }

    /// Frame offset inside a block at which `hint` should take effect.
    ///
    /// Explicit frames clamp into the block. Timestamps outside the block
    /// resolve to 0, i.e. "now".
    pub fn resolve_frame(&self, hint: ScheduleHint, block_start_sec: f64, block_frames: usize) -> usize {
        if block_frames == 0 {
            return 0;
        }
        match hint {
            ScheduleHint::AtFrame(frame) if frame.is_finite() => {
                frame.floor().clamp(0.0, (block_frames - 1) as f64) as usize
            }
            ScheduleHint::AtTimeMs(ms) if ms.is_finite() => {
                let event_sec = self.wall_to_audio_sec(ms);
                let offset = ((event_sec - block_start_sec) * self.sample_rate).floor();
                if offset < 0.0 || offset >= block_frames as f64 {
                    0
                } else {
                    offset as usize
                }
            }
            _ => 0,
        }
    }
}
