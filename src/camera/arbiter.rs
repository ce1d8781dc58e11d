use super::device::{CameraBackend, CameraDevice, FrameMetadata};
use super::service::ServiceStatus;
use crate::error::CameraError;
use crate::settings::{ControlSet, SessionConfig};
use parking_lot::Mutex;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Consumer holding the camera, for diagnostics only
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Owner {
    Scheduler,
    Stream,
    OneShot,
}

impl Owner {
    pub fn as_str(&self) -> &'static str {
        match self {
            Owner::Scheduler => "scheduler",
            Owner::Stream => "stream",
            Owner::OneShot => "one-shot",
        }
    }

    /// Map a `Busy` holder back to an in-process owner. External service
    /// units map to `None`.
    pub fn from_holder(holder: &str) -> Option<Self> {
        [Owner::Scheduler, Owner::Stream, Owner::OneShot]
            .into_iter()
            .find(|owner| owner.as_str() == holder)
    }
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ArbiterState {
    Idle,
    Held(Owner),
}

/// Identity of one successful acquisition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LeaseToken(Uuid);

impl fmt::Display for LeaseToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy)]
struct Holder {
    owner: Owner,
    token: LeaseToken,
}

#[derive(Debug, Default)]
struct Slot {
    holder: Mutex<Option<Holder>>,
}

impl Slot {
    fn reserve(&self, owner: Owner) -> Result<LeaseToken, CameraError> {
        let mut holder = self.holder.lock();
        match *holder {
            Some(current) => Err(CameraError::Busy {
                holder: current.owner.to_string(),
            }),
            None => {
                let token = LeaseToken(Uuid::new_v4());
                *holder = Some(Holder { owner, token });
                Ok(token)
            }
        }
    }

    /// Return to idle if `token` is the current holder. Stale tokens are ignored.
    fn clear(&self, token: LeaseToken) -> bool {
        let mut holder = self.holder.lock();
        match *holder {
            Some(current) if current.token == token => {
                *holder = None;
                true
            }
            _ => false,
        }
    }

    fn state(&self) -> ArbiterState {
        match *self.holder.lock() {
            Some(current) => ArbiterState::Held(current.owner),
            None => ArbiterState::Idle,
        }
    }
}

/// Single point of access to the physical camera.
///
/// At most one [`CameraLease`] exists per arbiter at any time. The state
/// lock is held only for the Idle/Held transition, never across device I/O.
/// The slot is reserved before the device is opened so two concurrent
/// callers can never both reach the hardware.
pub struct CameraArbiter {
    backend: Arc<dyn CameraBackend>,
    external: Option<Arc<dyn ServiceStatus>>,
    slot: Arc<Slot>,
}

impl CameraArbiter {
    pub fn new(backend: Arc<dyn CameraBackend>) -> Self {
        Self {
            backend,
            external: None,
            slot: Arc::new(Slot::default()),
        }
    }

    /// Consult an out-of-process capture service before stream and
    /// one-shot acquisitions
    pub fn with_external_service(mut self, status: Arc<dyn ServiceStatus>) -> Self {
        self.external = Some(status);
        self
    }

    pub fn state(&self) -> ArbiterState {
        self.slot.state()
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    pub fn can_meter(&self) -> bool {
        self.backend.can_meter()
    }

    /// Acquire exclusive use of the camera, opened, configured and started.
    ///
    /// Fails with [`CameraError::Busy`] when another consumer holds the
    /// camera or the external capture service reports itself active. A
    /// failed status query does not block acquisition. Any device error
    /// after open closes the device before the error is returned.
    pub async fn acquire(
        &self,
        owner: Owner,
        session: &SessionConfig,
    ) -> Result<CameraLease, CameraError> {
        if owner != Owner::Scheduler {
            self.check_external(owner).await?;
        }

        let token = self.slot.reserve(owner)?;
        debug!(owner = %owner, token = %token, "Camera reserved");

        match self.open_device(session).await {
            Ok(device) => {
                info!(
                    owner = %owner,
                    token = %token,
                    width = session.width,
                    height = session.height,
                    "Camera acquired"
                );
                Ok(CameraLease {
                    owner,
                    token,
                    session: session.clone(),
                    device: Some(device),
                    slot: Arc::clone(&self.slot),
                })
            }
            Err(e) => {
                self.slot.clear(token);
                error!(owner = %owner, "Camera acquisition failed: {}", e);
                Err(e)
            }
        }
    }

    /// Hand a lease back and return to idle.
    ///
    /// A lease issued by a different arbiter is not touched and is handed
    /// back to the caller, still open.
    pub async fn release(&self, lease: CameraLease) -> Option<CameraLease> {
        if !Arc::ptr_eq(&self.slot, &lease.slot) {
            warn!(
                owner = %lease.owner,
                token = %lease.token,
                "Ignoring release of a lease held by a different arbiter"
            );
            return Some(lease);
        }
        lease.release().await;
        None
    }

    async fn check_external(&self, owner: Owner) -> Result<(), CameraError> {
        let Some(status) = &self.external else {
            return Ok(());
        };

        match status.is_active().await {
            Ok(true) => {
                info!(owner = %owner, unit = status.unit(), "Capture service is active");
                Err(CameraError::Busy {
                    holder: status.unit().to_string(),
                })
            }
            Ok(false) => Ok(()),
            Err(e) => {
                warn!(
                    unit = status.unit(),
                    "Service status check failed, proceeding: {}", e
                );
                Ok(())
            }
        }
    }

    async fn open_device(
        &self,
        session: &SessionConfig,
    ) -> Result<Box<dyn CameraDevice>, CameraError> {
        let mut device = self.backend.open().await?;

        let started = async {
            device.configure(session).await?;
            device.start().await
        }
        .await;

        if let Err(e) = started {
            if let Err(close_err) = device.close().await {
                warn!("Failed to close camera after setup error: {}", close_err);
            }
            return Err(e);
        }

        Ok(device)
    }
}

/// Exclusive handle on an open camera.
///
/// Call [`release`](CameraLease::release) on every exit path. Dropping a
/// lease without releasing still closes the device and frees the arbiter,
/// on a background task when a runtime is available.
pub struct CameraLease {
    owner: Owner,
    token: LeaseToken,
    session: SessionConfig,
    device: Option<Box<dyn CameraDevice>>,
    slot: Arc<Slot>,
}

impl CameraLease {
    pub fn owner(&self) -> Owner {
        self.owner
    }

    pub fn token(&self) -> LeaseToken {
        self.token
    }

    pub fn session(&self) -> &SessionConfig {
        &self.session
    }

    fn device(&mut self) -> Result<&mut Box<dyn CameraDevice>, CameraError> {
        self.device.as_mut().ok_or(CameraError::NotAvailable)
    }

    /// Request autofocus, wait for exposure to settle, then apply the
    /// session's controls. Autofocus and control failures are warnings.
    pub async fn prepare(&mut self, warmup: Duration) -> Result<(), CameraError> {
        let controls = self.session.controls.clone();
        let device = self.device()?;

        match device.set_controls(&ControlSet::autofocus()).await {
            Ok(()) => debug!("Continuous autofocus enabled"),
            Err(e) => warn!("Could not enable autofocus: {}", e),
        }

        if !warmup.is_zero() {
            tokio::time::sleep(warmup).await;
        }

        if !controls.is_empty() {
            match device.set_controls(&controls).await {
                Ok(()) => debug!(count = controls.len(), "Applied camera controls"),
                Err(e) => warn!("Failed to apply camera settings: {}", e),
            }
        }

        Ok(())
    }

    pub async fn set_controls(&mut self, controls: &ControlSet) -> Result<(), CameraError> {
        self.device()?.set_controls(controls).await
    }

    pub async fn capture_metadata(&mut self) -> Result<FrameMetadata, CameraError> {
        self.device()?.capture_metadata().await
    }

    pub async fn capture_jpeg(&mut self, quality: u8) -> Result<Vec<u8>, CameraError> {
        self.device()?.capture_jpeg(quality).await
    }

    /// Stop and close the device, then return the arbiter to idle
    pub async fn release(mut self) {
        if let Some(device) = self.device.take() {
            shutdown_device(device).await;
        }
        if self.slot.clear(self.token) {
            info!(owner = %self.owner, token = %self.token, "Camera released");
        }
    }
}

async fn shutdown_device(mut device: Box<dyn CameraDevice>) {
    if let Err(e) = device.stop().await {
        warn!("Failed to stop camera: {}", e);
    }
    if let Err(e) = device.close().await {
        error!("Failed to close camera: {}", e);
    }
}

impl Drop for CameraLease {
    fn drop(&mut self) {
        let Some(device) = self.device.take() else {
            return;
        };

        warn!(owner = %self.owner, token = %self.token, "Camera lease dropped without release");
        let slot = Arc::clone(&self.slot);
        let token = self.token;

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    shutdown_device(device).await;
                    slot.clear(token);
                });
            }
            Err(_) => {
                drop(device);
                slot.clear(token);
            }
        }
    }
}
