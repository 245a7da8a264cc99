// ============================================================================
// Scheduler scenario tests: scripted decoders, collecting sink.
// ============================================================================

use std::collections::VecDeque;

use super::{FrameSink, Scheduler};
use crate::error::MixError;
use crate::frame::Frame;
use crate::mixer::{Gain, MixerConfig, MixerNode};
use crate::source::{DecodeStep, FrameSource, SourceNode, SourceState};

enum Script {
    Frame { value: i16, count: usize, rate: u32 },
    NoData,
    Fail,
}

/// Replays a fixed decode script; an exhausted script reports `Finished`,
/// mirroring a drained decoder.
struct ScriptedSource {
    slot: usize,
    script: VecDeque<Script>,
}

impl ScriptedSource {
    fn new(slot: usize, script: Vec<Script>) -> Self {
        Self {
            slot,
            script: script.into(),
        }
    }
}

impl FrameSource for ScriptedSource {
    fn decode_next(&mut self) -> Result<DecodeStep, MixError> {
        match self.script.pop_front() {
            Some(Script::Frame { value, count, rate }) => Ok(DecodeStep::Frame(
                Frame::from_i16(&vec![value; count], 1, rate),
            )),
            Some(Script::NoData) => Ok(DecodeStep::NoData),
            Some(Script::Fail) => Err(MixError::Decode {
                input: self.slot,
                source: "simulated codec failure".into(),
            }),
            None => Ok(DecodeStep::Finished),
        }
    }
}

#[derive(Default)]
struct CollectSink {
    frames: Vec<Frame>,
}

impl CollectSink {
    fn samples(&self) -> u64 {
        self.frames.iter().map(|f| f.sample_count() as u64).sum()
    }

    fn pcm(&self) -> Vec<i16> {
        self.frames
            .iter()
            .flat_map(|f| {
                f.plane(0)
                    .chunks_exact(2)
                    .map(|c| i16::from_ne_bytes([c[0], c[1]]))
                    .collect::<Vec<_>>()
            })
            .collect()
    }
}

impl FrameSink for CollectSink {
    fn write_frame(&mut self, frame: Frame) -> Result<(), MixError> {
        self.frames.push(frame);
        Ok(())
    }
}

struct FailingSink;

impl FrameSink for FailingSink {
    fn write_frame(&mut self, _frame: Frame) -> Result<(), MixError> {
        Err(MixError::Encode("simulated encoder failure".into()))
    }
}

fn frames(value: i16, chunks: &[usize]) -> Vec<Script> {
    chunks
        .iter()
        .map(|&count| Script::Frame {
            value,
            count,
            rate: 44100,
        })
        .collect()
}

fn scheduler(scripts: Vec<Vec<Script>>, frame_size: usize) -> Scheduler {
    let inputs = scripts.len();
    let mixer = MixerNode::new(MixerConfig {
        inputs,
        sample_rate: 44100,
        frame_size,
        gain: Gain::Attenuate,
    })
    .unwrap();
    let sources = scripts
        .into_iter()
        .enumerate()
        .map(|(slot, script)| SourceNode::new(slot, Box::new(ScriptedSource::new(slot, script)) as _))
        .collect();
    Scheduler::new(sources, mixer).unwrap()
}

#[test]
fn test_scenario_equal_inputs() {
    let mut sched = scheduler(
        vec![frames(1000, &[250, 250, 250, 250]), frames(500, &[500, 500])],
        256,
    );
    let mut sink = CollectSink::default();
    let session = sched.process_all(&mut sink).unwrap();

    assert_eq!(session.consumed, vec![1000, 1000]);
    assert_eq!(session.emitted, 1000);
    assert_eq!(session.eos_markers, 2);
    assert_eq!(sink.samples(), 1000);
    assert!(sched
        .source_states()
        .iter()
        .all(|s| *s == SourceState::Finished));
    // (1000 + 500) / 2 on every stereo sample
    assert!(sink.pcm().iter().all(|&s| s == 750));
}

#[test]
fn test_scenario_unequal_lengths_drains_long_tail() {
    let mut sched = scheduler(
        vec![frames(800, &[500, 500, 500, 500]), frames(400, &[500])],
        250,
    );
    let mut sink = CollectSink::default();
    let session = sched.process_all(&mut sink).unwrap();

    assert_eq!(session.consumed, vec![2000, 500]);
    assert_eq!(session.emitted, 2000);
    assert_eq!(session.eos_markers, 2);

    // while both inputs run: (800 + 400) / 2; afterwards the finished input
    // counts as silence: 800 / 2
    let pcm = sink.pcm();
    assert_eq!(pcm.len(), 4000);
    assert!(pcm[..1000].iter().all(|&s| s == 600));
    assert!(pcm[1000..].iter().all(|&s| s == 400));
}

#[test]
fn test_scenario_immediately_finished_source() {
    let mut sched = scheduler(vec![frames(1000, &[300]), vec![]], 100);
    let mut sink = CollectSink::default();
    let session = sched.process_all(&mut sink).unwrap();

    assert_eq!(session.consumed, vec![300, 0]);
    assert_eq!(session.emitted, 300);
    assert_eq!(session.eos_markers, 2);
    assert!(sink.pcm().iter().all(|&s| s == 500));
}

#[test]
fn test_scenario_both_sources_empty() {
    let mut sched = scheduler(vec![vec![], vec![]], 100);
    let mut sink = CollectSink::default();
    let session = sched.process_all(&mut sink).unwrap();

    assert_eq!(session.emitted, 0);
    assert_eq!(session.eos_markers, 2);
    assert!(sink.frames.is_empty());
}

#[test]
fn test_scenario_decode_error_aborts_run() {
    let mut scripts = frames(100, &[500]);
    scripts.push(Script::Fail);
    let mut sched = scheduler(vec![frames(100, &[500, 500, 500]), scripts], 250);
    let mut sink = CollectSink::default();

    match sched.process_all(&mut sink) {
        Err(MixError::Decode { input, .. }) => assert_eq!(input, 1),
        other => panic!("expected a decode failure, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_encode_error_aborts_run() {
    let mut sched = scheduler(vec![frames(100, &[500]), frames(100, &[500])], 250);
    match sched.process_all(&mut FailingSink) {
        Err(MixError::Encode(_)) => {}
        other => panic!("expected an encode failure, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_nodata_stall_is_broken_by_global_rearm() {
    let mut a = vec![Script::NoData, Script::NoData];
    a.extend(frames(100, &[300]));
    let mut b = vec![Script::NoData];
    b.extend(frames(100, &[300]));

    let mut sched = scheduler(vec![a, b], 100);
    let mut sink = CollectSink::default();
    let session = sched.process_all(&mut sink).unwrap();

    assert_eq!(session.emitted, 300);
    assert_eq!(session.consumed, vec![300, 300]);
}

#[test]
fn test_sample_conservation_equal_rate() {
    let mut sched = scheduler(
        vec![frames(10, &[313, 127, 807]), frames(-10, &[890])],
        256,
    );
    let mut sink = CollectSink::default();
    let session = sched.process_all(&mut sink).unwrap();

    assert_eq!(session.consumed, vec![1247, 890]);
    // equal-rate inputs: output length equals the longer input, exactly
    assert_eq!(session.emitted, 1247);
    assert_eq!(sink.samples(), 1247);
}

#[test]
fn test_cross_rate_input_is_converted() {
    let slow = vec![Script::Frame {
        value: 500,
        count: 500,
        rate: 22050,
    }];
    let mut sched = scheduler(vec![slow, frames(500, &[1000])], 250);
    let mut sink = CollectSink::default();
    let session = sched.process_all(&mut sink).unwrap();

    assert_eq!(session.consumed, vec![500, 1000]);
    // the 22050 Hz input stretches to ~1000 samples at the output rate
    assert_eq!(session.emitted, 1000);
}

#[test]
fn test_output_timestamps_are_contiguous() {
    let mut sched = scheduler(
        vec![frames(100, &[700]), frames(100, &[700])],
        256,
    );
    let mut sink = CollectSink::default();
    sched.process_all(&mut sink).unwrap();

    let mut expected = 0i64;
    for frame in &sink.frames {
        assert_eq!(frame.pts(), Some(expected));
        expected += frame.sample_count() as i64;
    }
    assert_eq!(expected, 700);
}

#[test]
fn test_source_count_must_match_mixer_inputs() {
    let mixer = MixerNode::new(MixerConfig {
        inputs: 2,
        ..MixerConfig::default()
    })
    .unwrap();
    let sources = vec![SourceNode::new(
        0,
        Box::new(ScriptedSource::new(0, vec![])) as _,
    )];
    assert!(matches!(
        Scheduler::new(sources, mixer),
        Err(MixError::Graph(_))
    ));
}
