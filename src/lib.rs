//! Live portrait compositor for a photo-booth kiosk.
//!
//! Streams a camera, separates the person from the background with a
//! portrait-matting model on every frame, composites the subject over a
//! selected artwork (cover-fit, subject mirrored), counts down, and exports
//! one encoded still for the downstream consumer.

pub mod background;
pub mod capture;
pub mod compositor;
pub mod config;
pub mod error;
pub mod export;
pub mod segmentation;
pub mod session;
