//! FFmpeg-backed collaborators for the mixing pipeline: demuxer, audio
//! decoder, audio encoder, and muxer. Everything codec- or
//! container-specific lives here; the scheduling core only sees the
//! `mix_graph` contracts.

/// Registers FFmpeg components. Call once at startup, before opening any
/// input or output.
pub fn init() -> anyhow::Result<()> {
    ffmpeg_next::init().map_err(|e| anyhow::anyhow!("ffmpeg_next init: {}", e))
}

pub mod decoder;
pub mod encoder;
pub mod input;
pub mod output;
