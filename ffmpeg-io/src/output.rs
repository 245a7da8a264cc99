use std::path::Path;

use mix_graph::error::MixError;

use crate::encoder::{AudioEncoder, EncodedPacket};

/// Muxer wrapper for the output container. The format is whatever the
/// output path's extension implies; no explicit format flag is exposed.
pub struct AvOutput {
    inner: ffmpeg_next::format::context::Output,
    have_written_header: bool,
    have_written_trailer: bool,
}

impl AvOutput {
    /// Create the output context, replacing any stale file at `url`.
    pub fn create(url: &str) -> Result<Self, MixError> {
        let path = Path::new(url);
        if path.exists() {
            std::fs::remove_file(path).map_err(|e| MixError::Io(Box::new(e)))?;
        }
        let output = ffmpeg_next::format::output(url).map_err(|e| {
            MixError::Io(format!("could not open output '{}': {}", url, e).into())
        })?;
        Ok(Self {
            inner: output,
            have_written_header: false,
            have_written_trailer: false,
        })
    }

    pub fn add_stream(&mut self, encoder: &AudioEncoder) -> Result<(), MixError> {
        let codec = ffmpeg_next::encoder::find(encoder.codec_id());
        let mut stream = self.inner.add_stream(codec).map_err(|e| {
            MixError::Configuration(format!("could not create output stream: {}", e))
        })?;
        stream.set_parameters(encoder.as_inner());
        Ok(())
    }

    pub fn write_header(&mut self) -> Result<(), MixError> {
        if !self.have_written_header {
            self.inner
                .write_header()
                .map_err(|e| MixError::Io(format!("could not write header: {}", e).into()))?;
            self.have_written_header = true;
        }
        Ok(())
    }

    pub fn write_packet(&mut self, mut packet: EncodedPacket) -> Result<(), MixError> {
        debug_assert!(self.have_written_header, "packet written before header");
        let source_time_base = packet.time_base();
        let out_time_base = match self.inner.stream(0) {
            Some(stream) => stream.time_base(),
            None => return Err(MixError::Io("output stream missing".into())),
        };

        let p = packet.get_mut();
        p.set_stream(0);
        p.set_position(-1);
        p.rescale_ts(source_time_base, out_time_base);
        p.write(&mut self.inner)
            .map_err(|e| MixError::Io(format!("could not write packet: {}", e).into()))
    }

    /// Write the container trailer. Only valid after the header; calling it
    /// twice is a no-op.
    pub fn write_trailer(&mut self) -> Result<(), MixError> {
        if self.have_written_header && !self.have_written_trailer {
            self.have_written_trailer = true;
            self.inner
                .write_trailer()
                .map_err(|e| MixError::Io(format!("could not write trailer: {}", e).into()))?;
        }
        Ok(())
    }
}
