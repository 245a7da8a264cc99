//! Decoded audio frame model. A `Frame` is produced once by a decoder,
//! pushed into the mixer, and never read again by its producer; ownership
//! moves with it on every push/pull.

/// Whether samples of all channels share one plane (interleaved) or each
/// channel has its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Packing {
    Packed,
    Planar,
}

/// Uncompressed sample formats the pipeline understands. This is the subset
/// audio decoders actually emit; anything else is rejected at the decode
/// boundary before a frame is ever built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleFormat {
    I16(Packing),
    I32(Packing),
    F32(Packing),
    F64(Packing),
}

impl SampleFormat {
    pub fn bytes_per_sample(&self) -> usize {
        match self {
            SampleFormat::I16(_) => 2,
            SampleFormat::I32(_) | SampleFormat::F32(_) => 4,
            SampleFormat::F64(_) => 8,
        }
    }

    pub fn packing(&self) -> Packing {
        match self {
            SampleFormat::I16(p)
            | SampleFormat::I32(p)
            | SampleFormat::F32(p)
            | SampleFormat::F64(p) => *p,
        }
    }

    pub fn is_planar(&self) -> bool {
        self.packing() == Packing::Planar
    }
}

/// Channel layout descriptor: a channel count plus whether the decoder
/// actually tagged a layout. An unspecified layout is defaulted from the
/// channel count when the frame enters the mixer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelLayout {
    channels: u16,
    specified: bool,
}

impl ChannelLayout {
    pub fn of(channels: u16) -> Self {
        Self {
            channels,
            specified: true,
        }
    }

    pub fn unspecified(channels: u16) -> Self {
        Self {
            channels,
            specified: false,
        }
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn is_specified(&self) -> bool {
        self.specified
    }

    /// The default layout for this channel count.
    pub fn or_default(self) -> Self {
        Self::of(self.channels)
    }
}

/// One decoded chunk of audio samples with format and timing metadata.
/// `sample_count` is per channel. Plane data is kept as the decoder handed
/// it over; format conversion happens in the mixer, not here.
pub struct Frame {
    format: SampleFormat,
    layout: ChannelLayout,
    sample_rate: u32,
    sample_count: usize,
    planes: Vec<Vec<u8>>,
    pts: Option<i64>,
}

impl Frame {
    pub fn new(
        format: SampleFormat,
        layout: ChannelLayout,
        sample_rate: u32,
        sample_count: usize,
        planes: Vec<Vec<u8>>,
    ) -> Self {
        debug_assert!(
            planes.len()
                == if format.is_planar() {
                    layout.channels() as usize
                } else {
                    1
                }
        );
        Self {
            format,
            layout,
            sample_rate,
            sample_count,
            planes,
            pts: None,
        }
    }

    /// Interleaved 16-bit frame from raw samples. `samples.len()` must be a
    /// multiple of `channels`.
    pub fn from_i16(samples: &[i16], channels: u16, sample_rate: u32) -> Self {
        let mut bytes = Vec::with_capacity(samples.len() * 2);
        for s in samples {
            bytes.extend_from_slice(&s.to_ne_bytes());
        }
        Self::new(
            SampleFormat::I16(Packing::Packed),
            ChannelLayout::of(channels),
            sample_rate,
            samples.len() / channels as usize,
            vec![bytes],
        )
    }

    pub fn format(&self) -> SampleFormat {
        self.format
    }

    pub fn layout(&self) -> ChannelLayout {
        self.layout
    }

    pub fn channels(&self) -> u16 {
        self.layout.channels()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn sample_count(&self) -> usize {
        self.sample_count
    }

    pub fn pts(&self) -> Option<i64> {
        self.pts
    }

    pub fn set_pts(&mut self, pts: Option<i64>) {
        self.pts = pts;
    }

    pub fn plane(&self, index: usize) -> &[u8] {
        &self.planes[index]
    }

    /// Sample at (channel, index) converted to f32 in roughly [-1.0, 1.0).
    pub fn sample_f32(&self, channel: usize, index: usize) -> f32 {
        let (plane, elem) = if self.format.is_planar() {
            (channel, index)
        } else {
            (0, index * self.channels() as usize + channel)
        };
        let bps = self.format.bytes_per_sample();
        let off = elem * bps;
        let bytes = &self.planes[plane][off..off + bps];
        match self.format {
            SampleFormat::I16(_) => {
                i16::from_ne_bytes([bytes[0], bytes[1]]) as f32 / 32768.0
            }
            SampleFormat::I32(_) => {
                i32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f32
                    / 2_147_483_648.0
            }
            SampleFormat::F32(_) => {
                f32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
            }
            SampleFormat::F64(_) => {
                let mut b = [0u8; 8];
                b.copy_from_slice(bytes);
                f64::from_ne_bytes(b) as f32
            }
        }
    }
}
