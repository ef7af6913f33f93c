//! Vibeorb library - audio-reactive orb rendering

pub mod animation;
pub mod audio;
pub mod cli;
pub mod engine;
pub mod error;
pub mod params;
pub mod pipeline;
pub mod rendering;
pub mod scene;
pub mod viewport;
