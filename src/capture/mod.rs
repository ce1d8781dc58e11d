mod naming;
mod oneshot;
mod record;
mod still;

pub use naming::{capture_path, parse_capture_name, DATE_DIR_FORMAT, FILE_STEM_FORMAT, IMAGE_EXTENSION};
pub use oneshot::OneShotCapture;
pub use record::{CaptureOutcome, CaptureReceipt, CaptureRecord};
pub use still::{capture_still, write_image};
