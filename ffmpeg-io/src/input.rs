use std::path::Path;

use mix_graph::error::MixError;

/// Demuxer wrapper for one input file. Inputs must contain exactly one
/// elementary stream and it must be audio; anything else is rejected here,
/// before any decoding starts.
pub struct AvInput {
    inner: ffmpeg_next::format::context::Input,
    parameters: ffmpeg_next::codec::Parameters,
    time_base: ffmpeg_next::Rational,
}

impl AvInput {
    pub fn open(url: &str) -> Result<Self, MixError> {
        let path = Path::new(url);
        let input = ffmpeg_next::format::input(path).map_err(|e| {
            MixError::Io(format!("could not open input '{}': {}", url, e).into())
        })?;

        let stream_count = input.streams().count();
        if stream_count != 1 {
            return Err(MixError::Configuration(format!(
                "expected one audio stream in '{}', found {}",
                url, stream_count
            )));
        }

        let (parameters, time_base) = {
            let stream = match input.streams().next() {
                Some(stream) => stream,
                None => {
                    return Err(MixError::Configuration(format!(
                        "input '{}' has no streams",
                        url
                    )));
                }
            };
            (stream.parameters(), stream.time_base())
        };

        if parameters.medium() != ffmpeg_next::media::Type::Audio {
            return Err(MixError::Configuration(format!(
                "input '{}' has no audio stream",
                url
            )));
        }

        let opened = Self {
            inner: input,
            parameters,
            time_base,
        };
        log::debug!(
            "input '{}': codec {:?}, {} Hz, bit rate {}, time_base {:?}",
            url,
            opened.parameters.id(),
            opened.sample_rate(),
            opened.bit_rate(),
            opened.time_base
        );
        Ok(opened)
    }

    pub fn parameters(&self) -> ffmpeg_next::codec::Parameters {
        self.parameters.clone()
    }

    pub fn time_base(&self) -> ffmpeg_next::Rational {
        self.time_base
    }

    pub fn sample_rate(&self) -> u32 {
        unsafe {
            let ptr = self.parameters.as_ptr();
            (*ptr).sample_rate.max(0) as u32
        }
    }

    pub fn bit_rate(&self) -> usize {
        unsafe {
            let ptr = self.parameters.as_ptr();
            (*ptr).bit_rate.max(0) as usize
        }
    }

    /// Next demuxed packet, or `None` at end of file.
    pub fn read_packet(&mut self) -> Option<ffmpeg_next::codec::packet::Packet> {
        self.inner.packets().next().map(|(_, packet)| packet)
    }
}
