mod controls;
mod translate;
#[cfg(test)]
mod tests;

pub use controls::{
    AfMode, AfSpeed, Control, ControlSet, MeteringMode, NoiseReductionMode, Rotation,
    SessionConfig, SessionPurpose,
};
pub use translate::{session_config, translate, DEFAULT_AWB_GAINS};
