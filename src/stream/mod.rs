mod session;
mod stats;

pub use session::StreamSession;
pub use stats::StreamStats;
