use mix_graph::error::{BoxedError, MixError};
use mix_graph::frame::{ChannelLayout, Frame, Packing, SampleFormat};
use mix_graph::source::{DecodeStep, FrameSource};

use crate::input::AvInput;

enum Recv {
    Frame(ffmpeg_next::frame::Audio),
    Again,
    Eof,
}

/// Audio decoder for one input. Owns its demuxer and feeds it one packet
/// per decode step; at end of file the decoder is flushed once so delayed
/// frames drain through the normal receive path before `Finished`.
pub struct AudioDecoder {
    input: AvInput,
    decoder: ffmpeg_next::codec::decoder::Audio,
    slot: usize,
    flushing: bool,
}

impl AudioDecoder {
    pub fn new(input: AvInput, slot: usize) -> Result<Self, MixError> {
        let mut decoder_ctx = ffmpeg_next::codec::Context::new();
        decoder_ctx.set_parameters(input.parameters()).map_err(|e| {
            MixError::Configuration(format!("input {}: bad codec parameters: {}", slot, e))
        })?;
        let decoder = decoder_ctx.decoder().audio().map_err(|e| {
            MixError::Configuration(format!("no decoder for input {}: {}", slot, e))
        })?;

        Ok(Self {
            input,
            decoder,
            slot,
            flushing: false,
        })
    }

    fn try_receive(&mut self) -> Result<Recv, MixError> {
        let mut frame = ffmpeg_next::frame::Audio::empty();
        match self.decoder.receive_frame(&mut frame) {
            Ok(()) => Ok(Recv::Frame(frame)),
            Err(ffmpeg_next::Error::Eof) => Ok(Recv::Eof),
            Err(ffmpeg_next::Error::Other { errno })
                if errno == ffmpeg_next::util::error::EAGAIN =>
            {
                Ok(Recv::Again)
            }
            Err(e) => Err(decode_error(self.slot, e)),
        }
    }

    fn convert(&self, frame: &ffmpeg_next::frame::Audio) -> Result<Frame, MixError> {
        use ffmpeg_next::format::Sample;

        let format = match frame.format() {
            Sample::I16(t) => SampleFormat::I16(packing(t)),
            Sample::I32(t) => SampleFormat::I32(packing(t)),
            Sample::F32(t) => SampleFormat::F32(packing(t)),
            Sample::F64(t) => SampleFormat::F64(packing(t)),
            other => {
                return Err(decode_error(
                    self.slot,
                    format!("unsupported sample format {:?}", other),
                ));
            }
        };

        let channels = frame.channels();
        let sample_count = frame.samples();
        let (plane_count, plane_bytes) = if format.is_planar() {
            (channels as usize, sample_count * format.bytes_per_sample())
        } else {
            (1, sample_count * format.bytes_per_sample() * channels as usize)
        };
        let mut planes = Vec::with_capacity(plane_count);
        for p in 0..plane_count {
            planes.push(frame.data(p)[..plane_bytes].to_vec());
        }

        // Decoders do not always tag a layout; the mixer defaults it from
        // the channel count.
        let layout = if frame.channel_layout().bits() == 0 {
            ChannelLayout::unspecified(channels)
        } else {
            ChannelLayout::of(channels)
        };

        let mut out = Frame::new(format, layout, frame.rate(), sample_count, planes);
        out.set_pts(frame.pts());
        Ok(out)
    }
}

impl FrameSource for AudioDecoder {
    fn decode_next(&mut self) -> Result<DecodeStep, MixError> {
        // a delayed frame from a previously fed packet?
        match self.try_receive()? {
            Recv::Frame(frame) => return Ok(DecodeStep::Frame(self.convert(&frame)?)),
            Recv::Eof => return Ok(DecodeStep::Finished),
            Recv::Again => {}
        }

        // feed exactly one packet; at end of file flush the decoder once so
        // its delayed frames keep coming out of the receive path
        if !self.flushing {
            let slot = self.slot;
            match self.input.read_packet() {
                Some(packet) => self
                    .decoder
                    .send_packet(&packet)
                    .map_err(|e| decode_error(slot, e))?,
                None => {
                    log::debug!("input {}: end of file, flushing decoder", slot);
                    self.flushing = true;
                    self.decoder
                        .send_eof()
                        .map_err(|e| decode_error(slot, e))?;
                }
            }
        }

        match self.try_receive()? {
            Recv::Frame(frame) => Ok(DecodeStep::Frame(self.convert(&frame)?)),
            Recv::Eof => Ok(DecodeStep::Finished),
            Recv::Again => Ok(DecodeStep::NoData),
        }
    }
}

fn packing(t: ffmpeg_next::format::sample::Type) -> Packing {
    match t {
        ffmpeg_next::format::sample::Type::Packed => Packing::Packed,
        ffmpeg_next::format::sample::Type::Planar => Packing::Planar,
    }
}

fn decode_error(slot: usize, source: impl Into<BoxedError>) -> MixError {
    MixError::Decode {
        input: slot,
        source: source.into(),
    }
}
