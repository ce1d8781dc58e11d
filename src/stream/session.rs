use super::stats::StreamStats;
use crate::camera::{CameraArbiter, CameraLease, Owner};
use crate::config::TimelapseConfig;
use crate::error::{Result, StreamError};
use crate::settings::{session_config, SessionConfig, SessionPurpose};
use bytes::Bytes;
use futures::Stream;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

struct ActiveStream {
    lease: CameraLease,
    generation: u64,
}

/// On-demand live preview holding the camera between `start` and `stop`
pub struct StreamSession {
    arbiter: Arc<CameraArbiter>,
    session: SessionConfig,
    quality: u8,
    warmup: Duration,
    frame_interval: Duration,
    active: Arc<Mutex<Option<ActiveStream>>>,
    generation: AtomicU64,
    stats: Arc<parking_lot::Mutex<StreamStats>>,
}

impl StreamSession {
    pub fn new(arbiter: Arc<CameraArbiter>, config: &TimelapseConfig) -> Self {
        let stream = &config.stream;
        Self {
            arbiter,
            session: session_config(
                SessionPurpose::Video,
                stream.width,
                stream.height,
                &config.camera_settings,
            ),
            quality: stream.quality,
            warmup: Duration::from_millis(stream.warmup_ms),
            frame_interval: Duration::from_secs_f64(1.0 / f64::from(stream.fps.max(1))),
            active: Arc::new(Mutex::new(None)),
            generation: AtomicU64::new(0),
            stats: Arc::new(parking_lot::Mutex::new(StreamStats::default())),
        }
    }

    pub async fn is_active(&self) -> bool {
        self.active.lock().await.is_some()
    }

    pub fn stats(&self) -> StreamStats {
        self.stats.lock().clone()
    }

    /// Acquire the camera in video mode. Starting an active stream is an error.
    pub async fn start(&self) -> Result<()> {
        let mut active = self.active.lock().await;
        if active.is_some() {
            return Err(StreamError::AlreadyActive.into());
        }

        let mut lease = self.arbiter.acquire(Owner::Stream, &self.session).await?;
        if let Err(e) = lease.prepare(self.warmup).await {
            lease.release().await;
            return Err(e.into());
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        *active = Some(ActiveStream { lease, generation });
        self.stats.lock().session_started();

        info!(
            "Live stream started ({}x{})",
            self.session.width, self.session.height
        );
        Ok(())
    }

    /// Release the camera. Stopping an inactive stream is an error.
    pub async fn stop(&self) -> Result<()> {
        let stream = self
            .active
            .lock()
            .await
            .take()
            .ok_or(StreamError::NotActive)?;

        stream.lease.release().await;
        let stats = self.stats.lock().clone();
        info!(
            "Live stream stopped after {} frames ({:.1} fps)",
            stats.session_frames,
            stats.session_fps()
        );
        Ok(())
    }

    /// JPEG frames at the configured rate while the session that is active
    /// on first poll stays active.
    ///
    /// The sequence ends when that session is stopped or a capture fails;
    /// a failed capture also releases the camera. It is empty if no
    /// session is active.
    pub fn frames(&self) -> impl Stream<Item = Bytes> + Send + 'static {
        let active = Arc::clone(&self.active);
        let stats = Arc::clone(&self.stats);
        let quality = self.quality;
        let frame_interval = self.frame_interval;

        async_stream::stream! {
            let generation = match active.lock().await.as_ref() {
                Some(stream) => stream.generation,
                None => return,
            };

            let mut ticker = interval(frame_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;

                let frame = {
                    let mut guard = active.lock().await;
                    let current = match guard.as_mut() {
                        Some(stream) if stream.generation == generation => stream,
                        _ => break,
                    };

                    match current.lease.capture_jpeg(quality).await {
                        Ok(jpeg) => jpeg,
                        Err(e) => {
                            warn!("Stream capture failed, ending stream: {}", e);
                            stats.lock().record_capture_error();
                            if let Some(stream) = guard.take() {
                                stream.lease.release().await;
                            }
                            break;
                        }
                    }
                };

                stats.lock().update_frame_stats(frame.len());
                debug!("Streaming frame ({} bytes)", frame.len());
                yield Bytes::from(frame);
            }
        }
    }
}
