//! Per-input source node: wraps a decoder collaborator, tracks its
//! lifecycle, and owns the demand flag the scheduler uses to pace reads.
//! Decoding is demand-driven; a source is never decoded ahead of need.

use crate::error::MixError;
use crate::frame::Frame;
use crate::mixer::MixerNode;

/// One decoder step. `NoData` means the decoder produced nothing this call
/// but is not finished (it needs more packets internally); `Finished` means
/// the stream is fully drained, including delayed frames.
pub enum DecodeStep {
    Frame(Frame),
    NoData,
    Finished,
}

/// Decoder collaborator contract. Hard failures are errors and abort the
/// run; `NoData`/`Finished` are normal outcomes.
pub trait FrameSource {
    fn decode_next(&mut self) -> Result<DecodeStep, MixError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceState {
    /// Decoder may still yield frames.
    Active,
    /// Decoder reported finished; the end-of-stream marker is being delivered.
    Flushing,
    /// End-of-stream marker delivered; no further interaction.
    Finished,
}

/// Outcome of one `try_advance` call.
pub enum Advance {
    Pushed(usize),
    SignaledEos,
    NoOp,
}

pub struct SourceNode {
    slot: usize,
    decoder: Box<dyn FrameSource>,
    state: SourceState,
    needs_read: bool,
}

impl SourceNode {
    pub fn new(slot: usize, decoder: Box<dyn FrameSource>) -> Self {
        Self {
            slot,
            decoder,
            state: SourceState::Active,
            needs_read: false,
        }
    }

    pub fn slot(&self) -> usize {
        self.slot
    }

    pub fn state(&self) -> SourceState {
        self.state
    }

    pub fn needs_read(&self) -> bool {
        self.needs_read
    }

    /// Arm the demand flag. No-op once the source is finished.
    pub fn rearm(&mut self) {
        if self.state != SourceState::Finished {
            self.needs_read = true;
        }
    }

    /// Decode one step and feed the mixer, if demand was armed. The demand
    /// flag is consumed by every call; only the scheduler re-arms it.
    pub fn try_advance(&mut self, mixer: &mut MixerNode) -> Result<Advance, MixError> {
        if !self.needs_read || self.state == SourceState::Finished {
            return Ok(Advance::NoOp);
        }
        self.needs_read = false;

        match self.decoder.decode_next()? {
            DecodeStep::Frame(frame) => {
                let n = frame.sample_count();
                log::trace!(
                    "add {} samples on input {} ({} Hz)",
                    n,
                    self.slot,
                    frame.sample_rate()
                );
                mixer.push(self.slot, frame);
                Ok(Advance::Pushed(n))
            }
            DecodeStep::NoData => Ok(Advance::NoOp),
            DecodeStep::Finished => {
                self.state = SourceState::Flushing;
                log::debug!("input {} finished, delivering end-of-stream marker", self.slot);
                mixer.push_eos(self.slot);
                self.state = SourceState::Finished;
                Ok(Advance::SignaledEos)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mixer::{Gain, MixerConfig, MixerNode};

    struct OneFrameSource {
        served: bool,
    }

    impl FrameSource for OneFrameSource {
        fn decode_next(&mut self) -> Result<DecodeStep, MixError> {
            if self.served {
                Ok(DecodeStep::Finished)
            } else {
                self.served = true;
                Ok(DecodeStep::Frame(Frame::from_i16(&[1; 10], 1, 44100)))
            }
        }
    }

    fn test_mixer() -> MixerNode {
        MixerNode::new(MixerConfig {
            inputs: 1,
            sample_rate: 44100,
            frame_size: 4,
            gain: Gain::Sum,
        })
        .unwrap()
    }

    #[test]
    fn test_no_demand_means_no_decode() {
        let mut mixer = test_mixer();
        let mut node = SourceNode::new(0, Box::new(OneFrameSource { served: false }));
        assert!(matches!(node.try_advance(&mut mixer), Ok(Advance::NoOp)));
        assert_eq!(node.state(), SourceState::Active);
    }

    #[test]
    fn test_demand_is_consumed_per_call() {
        let mut mixer = test_mixer();
        let mut node = SourceNode::new(0, Box::new(OneFrameSource { served: false }));
        node.rearm();
        assert!(matches!(node.try_advance(&mut mixer), Ok(Advance::Pushed(10))));
        assert!(!node.needs_read());
        assert!(matches!(node.try_advance(&mut mixer), Ok(Advance::NoOp)));
    }

    #[test]
    fn test_eos_transitions_to_finished_once() {
        let mut mixer = test_mixer();
        let mut node = SourceNode::new(0, Box::new(OneFrameSource { served: true }));
        node.rearm();
        assert!(matches!(node.try_advance(&mut mixer), Ok(Advance::SignaledEos)));
        assert_eq!(node.state(), SourceState::Finished);
        // finished sources cannot be re-armed or advanced again
        node.rearm();
        assert!(!node.needs_read());
        assert!(matches!(node.try_advance(&mut mixer), Ok(Advance::NoOp)));
    }
}
