//! Video encoding.

/// `ffmpeg`-based MP4 encoding of completed frame sequences.
pub mod ffmpeg;
