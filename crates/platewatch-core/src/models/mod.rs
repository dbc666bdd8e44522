//! Data models for PlateWatch

mod notification;
mod rule;
mod sample;

pub use notification::*;
pub use rule::*;
pub use sample::*;
