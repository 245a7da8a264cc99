//! The control loop. Drives every armed source to decode-and-push, pulls
//! mixed output until the mixer starves, and re-arms exactly the sources the
//! mixer reported as running low. Single-threaded and cooperative: every
//! decode/push/pull/write runs to completion before the loop proceeds.

use crate::error::MixError;
use crate::frame::Frame;
use crate::mixer::{MixerNode, Pull};
use crate::source::{Advance, SourceNode, SourceState};

/// Encoder/muxer collaborator contract: encode one mixed frame and write all
/// resulting packets in order. Flushing the encoder and finalizing the
/// container are the owner's job, after `process_all` returns.
pub trait FrameSink {
    fn write_frame(&mut self, frame: Frame) -> Result<(), MixError>;
}

/// Accounting counters for one run. Diagnostic, not load-bearing; exposed so
/// sample conservation and end-of-stream delivery are testable.
#[derive(Debug, Clone, Default)]
pub struct MixSession {
    /// Decoded samples pushed into the mixer, per input.
    pub consumed: Vec<u64>,
    /// Mixed samples pulled out of the mixer.
    pub emitted: u64,
    /// End-of-stream markers delivered to the mixer.
    pub eos_markers: u32,
}

pub struct Scheduler {
    sources: Vec<SourceNode>,
    mixer: MixerNode,
}

impl Scheduler {
    pub fn new(sources: Vec<SourceNode>, mixer: MixerNode) -> Result<Self, MixError> {
        if sources.len() != mixer.inputs() {
            return Err(MixError::Graph(format!(
                "{} sources wired to a {}-input mixer",
                sources.len(),
                mixer.inputs()
            )));
        }
        let mut sched = Self { sources, mixer };
        // bootstrap demand: every source owes the mixer a first read
        for source in &mut sched.sources {
            source.rearm();
        }
        Ok(sched)
    }

    pub fn source_states(&self) -> Vec<SourceState> {
        self.sources.iter().map(|s| s.state()).collect()
    }

    fn all_finished(&self) -> bool {
        self.sources
            .iter()
            .all(|s| s.state() == SourceState::Finished)
    }

    /// Run the pipeline to completion: terminates when every source is
    /// finished and the mixer reports end-of-stream, or aborts on the first
    /// error. Returns the session counters on success; never exits the
    /// process.
    pub fn process_all(&mut self, sink: &mut dyn FrameSink) -> Result<MixSession, MixError> {
        let mut session = MixSession {
            consumed: vec![0; self.sources.len()],
            ..MixSession::default()
        };

        loop {
            let mut progress_made = false;
            for i in 0..self.sources.len() {
                match self.sources[i].try_advance(&mut self.mixer)? {
                    Advance::Pushed(n) => {
                        session.consumed[i] += n as u64;
                        progress_made = true;
                    }
                    Advance::SignaledEos => {
                        session.eos_markers += 1;
                        progress_made = true;
                    }
                    Advance::NoOp => {}
                }
            }

            if !progress_made {
                // Nothing reached the mixer this iteration; re-arm every
                // live source so the next one makes progress (livelock
                // breaker for the bootstrap/stall case).
                log::trace!("no data in graph, re-arming all inputs");
                for source in &mut self.sources {
                    source.rearm();
                }
                continue;
            }

            loop {
                match self.mixer.pull() {
                    Pull::Frame(frame) => {
                        let n = frame.sample_count();
                        log::trace!(
                            "remove {} samples from sink ({} Hz, total={})",
                            n,
                            self.mixer.sample_rate(),
                            session.emitted + n as u64
                        );
                        session.emitted += n as u64;
                        sink.write_frame(frame)?;
                    }
                    Pull::Starved => {
                        for source in &mut self.sources {
                            if self.mixer.take_failed_requests(source.slot()) > 0 {
                                source.rearm();
                            }
                        }
                        break;
                    }
                    Pull::EndOfStream => {
                        if self.all_finished() {
                            log::debug!(
                                "mixer drained, all inputs finished, {} samples emitted",
                                session.emitted
                            );
                            return Ok(session);
                        }
                        break;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "sched_test.rs"]
mod sched_test;
