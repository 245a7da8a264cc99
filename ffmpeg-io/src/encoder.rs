use std::ffi::CString;

use ffmpeg_next::{ChannelLayout, Rational, format::Sample};
use mix_graph::error::MixError;

/// One encoded packet plus the time base its timestamps are expressed in.
/// The muxer rescales to the output stream's time base on write.
pub struct EncodedPacket {
    packet: ffmpeg_next::codec::packet::Packet,
    time_base: Rational,
}

impl EncodedPacket {
    pub fn pts(&self) -> Option<i64> {
        self.packet.pts()
    }

    pub fn size(&self) -> usize {
        self.packet.size()
    }

    pub fn time_base(&self) -> Rational {
        self.time_base
    }

    pub fn get_mut(&mut self) -> &mut ffmpeg_next::codec::packet::Packet {
        &mut self.packet
    }
}

/// Audio encoder negotiated from the output container and the first input:
/// codec is the container's default audio codec, sample rate and bit rate
/// are carried over from the input, and the output is always 2-channel
/// interleaved s16.
pub struct AudioEncoder {
    encoder: ffmpeg_next::codec::encoder::Audio,
    codec_id: ffmpeg_next::codec::Id,
    time_base: Rational,
    sample_rate: u32,
}

impl AudioEncoder {
    pub fn open(output_url: &str, sample_rate: u32, bit_rate: usize) -> Result<Self, MixError> {
        let (codec_id, global_header) = guess_output_codec(output_url)?;
        let codec = ffmpeg_next::encoder::find(codec_id).ok_or_else(|| {
            MixError::Configuration(format!("no encoder for codec {:?}", codec_id))
        })?;

        let ctx = ffmpeg_next::codec::Context::new_with_codec(codec);
        let mut encoder = ctx.encoder().audio().map_err(|e| {
            MixError::Configuration(format!("codec {:?} cannot encode audio: {}", codec_id, e))
        })?;
        encoder.set_rate(sample_rate as i32);
        encoder.set_format(Sample::I16(ffmpeg_next::format::sample::Type::Packed));
        encoder.set_channel_layout(ChannelLayout::STEREO);
        encoder.set_time_base(Rational(1, sample_rate as i32));
        if bit_rate > 0 {
            encoder.set_bit_rate(bit_rate);
        }
        // Some container formats (like MP4) need global headers; mark the
        // encoder so it behaves accordingly.
        if global_header {
            encoder.set_flags(ffmpeg_next::codec::Flags::GLOBAL_HEADER);
        }

        let encoder = encoder.open_as(codec).map_err(|e| {
            MixError::Configuration(format!("could not open encoder {:?}: {}", codec_id, e))
        })?;
        log::debug!(
            "encoder {:?} opened: {} Hz, stereo s16, bit rate {}",
            codec_id,
            sample_rate,
            bit_rate
        );

        Ok(Self {
            encoder,
            codec_id,
            time_base: Rational(1, sample_rate as i32),
            sample_rate,
        })
    }

    pub fn codec_id(&self) -> ffmpeg_next::codec::Id {
        self.codec_id
    }

    pub fn time_base(&self) -> Rational {
        self.time_base
    }

    /// Fixed frame size the codec demands, or 0 for variable-size codecs
    /// like PCM.
    pub fn frame_size(&self) -> usize {
        self.encoder.frame_size() as usize
    }

    pub(crate) fn as_inner(&self) -> &ffmpeg_next::codec::encoder::Audio {
        &self.encoder
    }

    /// Encode one mixed frame (interleaved s16 stereo) into zero or more
    /// packets, in production order.
    pub fn encode(
        &mut self,
        frame: &mix_graph::frame::Frame,
    ) -> Result<Vec<EncodedPacket>, MixError> {
        let mut audio = ffmpeg_next::frame::Audio::new(
            Sample::I16(ffmpeg_next::format::sample::Type::Packed),
            frame.sample_count(),
            ChannelLayout::STEREO,
        );
        audio.set_rate(self.sample_rate);
        audio.set_pts(frame.pts());

        let pcm = frame.plane(0);
        let data = audio.data_mut(0);
        let len = pcm.len().min(data.len());
        data[..len].copy_from_slice(&pcm[..len]);

        self.encoder
            .send_frame(&audio)
            .map_err(|e| MixError::Encode(Box::new(e)))?;
        self.receive_packets()
    }

    /// Signal end of stream and drain the encoder's delayed packets. No
    /// frame may be sent after this.
    pub fn flush(&mut self) -> Result<Vec<EncodedPacket>, MixError> {
        self.encoder
            .send_eof()
            .map_err(|e| MixError::Encode(Box::new(e)))?;
        self.receive_packets()
    }

    fn receive_packets(&mut self) -> Result<Vec<EncodedPacket>, MixError> {
        let mut packets = Vec::new();
        loop {
            let mut packet = ffmpeg_next::codec::packet::Packet::empty();
            match self.encoder.receive_packet(&mut packet) {
                Ok(()) => packets.push(EncodedPacket {
                    packet,
                    time_base: self.time_base,
                }),
                Err(ffmpeg_next::Error::Other { errno })
                    if errno == ffmpeg_next::util::error::EAGAIN =>
                {
                    break;
                }
                Err(ffmpeg_next::Error::Eof) => break,
                Err(e) => return Err(MixError::Encode(Box::new(e))),
            }
        }
        Ok(packets)
    }
}

/// The default audio codec of the container format `url`'s extension
/// implies, plus whether that container wants global codec headers.
fn guess_output_codec(url: &str) -> Result<(ffmpeg_next::codec::Id, bool), MixError> {
    let cname = CString::new(url)
        .map_err(|e| MixError::Configuration(format!("invalid output path {:?}: {}", url, e)))?;
    let format = unsafe {
        ffmpeg_next::ffi::av_guess_format(std::ptr::null(), cname.as_ptr(), std::ptr::null())
    };
    if format.is_null() {
        return Err(MixError::Configuration(format!(
            "could not infer a container format for '{}'",
            url
        )));
    }
    let codec_id: ffmpeg_next::codec::Id = unsafe { (*format).audio_codec }.into();
    if codec_id == ffmpeg_next::codec::Id::None {
        return Err(MixError::Configuration(format!(
            "container for '{}' has no default audio codec",
            url
        )));
    }
    let global_header =
        unsafe { (*format).flags } & ffmpeg_next::ffi::AVFMT_GLOBALHEADER as i32 != 0;
    Ok((codec_id, global_header))
}
