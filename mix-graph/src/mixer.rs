//! N-input mixing node. Each input slot normalizes pushed frames to the
//! mixer's working representation (interleaved f32 stereo at the output
//! rate) and buffers them; `pull` combines aligned samples across slots into
//! interleaved s16 stereo output frames. Pulls never block: the outcome is
//! always a frame, `Starved`, or `EndOfStream`.

use std::collections::VecDeque;

use crate::error::MixError;
use crate::frame::{Frame, Packing, SampleFormat};

const OUTPUT_CHANNELS: usize = 2;
const OUTPUT_SAMPLE_FORMAT: SampleFormat = SampleFormat::I16(Packing::Packed);

/// Combination policy. `Attenuate` divides the sum by the slot count so N
/// full-scale inputs cannot clip; `Sum` adds the inputs as-is and relies on
/// output clamping. The default is `Attenuate`; the exact curve is a policy
/// knob, not a correctness requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gain {
    Sum,
    Attenuate,
}

#[derive(Debug, Clone)]
pub struct MixerConfig {
    pub inputs: usize,
    pub sample_rate: u32,
    pub frame_size: usize,
    pub gain: Gain,
}

impl Default for MixerConfig {
    fn default() -> Self {
        Self {
            inputs: 2,
            sample_rate: 44100,
            frame_size: 1024,
            gain: Gain::Attenuate,
        }
    }
}

/// Pull outcome. `Starved` means some still-open slot has too few buffered
/// samples for a full output frame; `EndOfStream` means every slot has
/// delivered its end-of-stream marker and all buffered samples are drained.
pub enum Pull {
    Frame(Frame),
    Starved,
    EndOfStream,
}

struct InputSlot {
    buffer: VecDeque<[f32; 2]>,
    ended: bool,
    failed_requests: u64,
    // linear-interpolation carry across frame boundaries for rate conversion
    resample_pos: f64,
    resample_prev: Option<[f32; 2]>,
}

impl InputSlot {
    fn new() -> Self {
        Self {
            buffer: VecDeque::new(),
            ended: false,
            failed_requests: 0,
            resample_pos: 0.0,
            resample_prev: None,
        }
    }
}

pub struct MixerNode {
    slots: Vec<InputSlot>,
    sample_rate: u32,
    frame_size: usize,
    gain: Gain,
    emitted: u64,
}

impl MixerNode {
    pub fn new(config: MixerConfig) -> Result<Self, MixError> {
        if config.inputs == 0 {
            return Err(MixError::Graph("mixer needs at least one input".into()));
        }
        if config.sample_rate == 0 {
            return Err(MixError::Graph("output sample rate must be positive".into()));
        }
        if config.frame_size == 0 {
            return Err(MixError::Graph("output frame size must be positive".into()));
        }
        Ok(Self {
            slots: (0..config.inputs).map(|_| InputSlot::new()).collect(),
            sample_rate: config.sample_rate,
            frame_size: config.frame_size,
            gain: config.gain,
            emitted: 0,
        })
    }

    pub fn inputs(&self) -> usize {
        self.slots.len()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Normalize `frame` into slot `slot`'s buffer: layout defaulting,
    /// format conversion to f32, up/down-mix to stereo, and linear rate
    /// conversion when the frame's rate differs from the output rate.
    pub fn push(&mut self, slot: usize, frame: Frame) {
        let state = &mut self.slots[slot];
        if state.ended {
            log::warn!("dropping frame pushed to ended input {}", slot);
            return;
        }
        if !frame.layout().is_specified() {
            log::trace!(
                "input {}: defaulting channel layout from {} channels",
                slot,
                frame.channels()
            );
        }

        let n = frame.sample_count();
        let mut samples = Vec::with_capacity(n);
        for i in 0..n {
            samples.push(stereo_sample(&frame, i));
        }

        if frame.sample_rate() == self.sample_rate {
            state.buffer.extend(samples);
        } else {
            resample_append(state, &samples, frame.sample_rate(), self.sample_rate);
        }
    }

    /// Mark slot `slot` ended. Buffered samples remain drainable; once every
    /// slot is ended and drained, `pull` reports `EndOfStream`.
    pub fn push_eos(&mut self, slot: usize) {
        let state = &mut self.slots[slot];
        debug_assert!(!state.ended, "end-of-stream marker delivered twice");
        state.ended = true;
        state.resample_prev = None;
        log::debug!(
            "input {} ended, {} buffered samples left to drain",
            slot,
            state.buffer.len()
        );
    }

    pub fn pull(&mut self) -> Pull {
        let any_open = self.slots.iter().any(|s| !s.ended);
        if any_open {
            let mut starved = false;
            for (i, slot) in self.slots.iter_mut().enumerate() {
                if !slot.ended && slot.buffer.len() < self.frame_size {
                    slot.failed_requests += 1;
                    log::trace!("need to read input {}", i);
                    starved = true;
                }
            }
            if starved {
                return Pull::Starved;
            }
            let n = self.frame_size;
            return Pull::Frame(self.mix_out(n));
        }

        // All inputs ended: drain the residue, possibly as a short tail frame.
        let residue = self.slots.iter().map(|s| s.buffer.len()).max().unwrap_or(0);
        if residue == 0 {
            return Pull::EndOfStream;
        }
        let n = residue.min(self.frame_size);
        Pull::Frame(self.mix_out(n))
    }

    /// Cumulative count of pulls that starved because this slot ran low.
    pub fn failed_requests(&self, slot: usize) -> u64 {
        self.slots[slot].failed_requests
    }

    /// Read and reset the failed-request counter; the scheduler's
    /// backpressure signal for targeted re-reads.
    pub fn take_failed_requests(&mut self, slot: usize) -> u64 {
        std::mem::take(&mut self.slots[slot].failed_requests)
    }

    fn mix_out(&mut self, n: usize) -> Frame {
        let scale = match self.gain {
            Gain::Sum => 1.0,
            Gain::Attenuate => 1.0 / self.slots.len() as f32,
        };
        let mut pcm = Vec::with_capacity(n * OUTPUT_CHANNELS);
        for _ in 0..n {
            let mut l = 0.0f32;
            let mut r = 0.0f32;
            for slot in &mut self.slots {
                // Ended or lagging slots contribute silence.
                if let Some([sl, sr]) = slot.buffer.pop_front() {
                    l += sl;
                    r += sr;
                }
            }
            pcm.push(to_i16(l * scale));
            pcm.push(to_i16(r * scale));
        }
        let mut frame = Frame::from_i16(&pcm, OUTPUT_CHANNELS as u16, self.sample_rate);
        debug_assert_eq!(frame.format(), OUTPUT_SAMPLE_FORMAT);
        frame.set_pts(Some(self.emitted as i64));
        self.emitted += n as u64;
        frame
    }
}

fn to_i16(v: f32) -> i16 {
    (v * 32768.0).round().clamp(-32768.0, 32767.0) as i16
}

/// One frame sample as an (L, R) pair: mono is duplicated, channels beyond
/// the first two are folded equally into both sides.
fn stereo_sample(frame: &Frame, index: usize) -> [f32; 2] {
    let channels = frame.channels() as usize;
    match channels {
        1 => {
            let v = frame.sample_f32(0, index);
            [v, v]
        }
        _ => {
            let mut l = frame.sample_f32(0, index);
            let mut r = frame.sample_f32(1, index);
            for c in 2..channels {
                let v = frame.sample_f32(c, index) * 0.5;
                l += v;
                r += v;
            }
            [l, r]
        }
    }
}

/// Linear-interpolation rate conversion. Carries the last input sample and
/// the fractional read position across pushes so consecutive frames join
/// without drift. The trailing sub-sample fraction at end-of-stream is
/// dropped.
fn resample_append(slot: &mut InputSlot, samples: &[[f32; 2]], in_rate: u32, out_rate: u32) {
    if samples.is_empty() {
        return;
    }
    let step = in_rate as f64 / out_rate as f64;
    let prev = slot.resample_prev;
    let have_prev = prev.is_some() as usize;
    let total = samples.len() + have_prev;
    let at = |idx: usize| -> [f32; 2] {
        match prev {
            Some(p) if idx == 0 => p,
            Some(_) => samples[idx - 1],
            None => samples[idx],
        }
    };

    let mut pos = slot.resample_pos;
    while pos < (total - 1) as f64 {
        let i = pos as usize;
        let frac = (pos - i as f64) as f32;
        let a = at(i);
        let b = at(i + 1);
        slot.buffer.push_back([
            a[0] + (b[0] - a[0]) * frac,
            a[1] + (b[1] - a[1]) * frac,
        ]);
        pos += step;
    }
    slot.resample_prev = Some(at(total - 1));
    slot.resample_pos = pos - (total - 1) as f64;
}
