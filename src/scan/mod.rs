//! # Scan Module
//!
//! Runs the frame-by-frame search for target images across a list of
//! videos on a worker thread, with cooperative pause, resume and stop.

pub mod control;
pub mod engine;

pub use control::{EnginePhase, ScanControl};
pub use engine::{ScanEngine, ScanHandle, ScanJob};
