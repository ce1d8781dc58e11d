use serde::Serialize;
use std::time::Instant;

/// Counters for the live stream
#[derive(Debug, Clone, Default, Serialize)]
pub struct StreamStats {
    pub sessions_started: u64,
    pub frames_streamed: u64,
    pub bytes_streamed: u64,
    pub capture_errors: u64,
    #[serde(skip)]
    pub session_started_at: Option<Instant>,
    #[serde(skip)]
    pub session_frames: u64,
}

impl StreamStats {
    pub fn session_started(&mut self) {
        self.sessions_started += 1;
        self.session_started_at = Some(Instant::now());
        self.session_frames = 0;
    }

    pub fn update_frame_stats(&mut self, frame_size: usize) {
        self.frames_streamed += 1;
        self.session_frames += 1;
        self.bytes_streamed += frame_size as u64;
    }

    pub fn record_capture_error(&mut self) {
        self.capture_errors += 1;
    }

    /// Average frame rate of the current session
    pub fn session_fps(&self) -> f64 {
        match self.session_started_at {
            Some(start) => {
                let elapsed = start.elapsed().as_secs_f64();
                if elapsed > 0.0 {
                    self.session_frames as f64 / elapsed
                } else {
                    0.0
                }
            }
            None => 0.0,
        }
    }
}
