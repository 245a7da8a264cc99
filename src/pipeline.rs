use ffmpeg_io::decoder::AudioDecoder;
use ffmpeg_io::encoder::AudioEncoder;
use ffmpeg_io::input::AvInput;
use ffmpeg_io::output::AvOutput;
use mix_graph::error::MixError;
use mix_graph::frame::Frame;
use mix_graph::mixer::{Gain, MixerConfig, MixerNode};
use mix_graph::sched::{FrameSink, MixSession, Scheduler};
use mix_graph::source::SourceNode;

/// Nominal mixed-frame size when the encoder does not demand a fixed one
/// (PCM containers report 0).
const DEFAULT_FRAME_SIZE: usize = 1024;

/// Encoder/muxer pair behind the scheduler's sink contract: every mixed
/// frame is encoded and its packets written immediately, in order.
struct EncodeSink {
    encoder: AudioEncoder,
    output: AvOutput,
}

impl FrameSink for EncodeSink {
    fn write_frame(&mut self, frame: Frame) -> Result<(), MixError> {
        for packet in self.encoder.encode(&frame)? {
            self.output.write_packet(packet)?;
        }
        Ok(())
    }
}

impl EncodeSink {
    /// Drain the encoder's delayed packets and finalize the container.
    /// Success path only; an aborted run never writes the trailer.
    fn finish(&mut self) -> Result<(), MixError> {
        for packet in self.encoder.flush()? {
            self.output.write_packet(packet)?;
        }
        self.output.write_trailer()
    }
}

/// The assembled pipeline. Construction acquires every collaborator handle
/// in one pass — both inputs, their decoders, the mixer, the encoder and
/// the muxer — so a failure at any step releases everything acquired so far
/// on drop.
pub struct Pipeline {
    scheduler: Scheduler,
    sink: EncodeSink,
}

impl Pipeline {
    pub fn open(input0: &str, input1: &str, output_url: &str) -> Result<Self, MixError> {
        let in0 = AvInput::open(input0)?;
        let in1 = AvInput::open(input1)?;

        // output sample rate and bit rate follow the first input
        let sample_rate = in0.sample_rate();
        let bit_rate = in0.bit_rate();
        if sample_rate == 0 {
            return Err(MixError::Configuration(format!(
                "input '{}' reports no sample rate",
                input0
            )));
        }

        let dec0 = AudioDecoder::new(in0, 0)?;
        let dec1 = AudioDecoder::new(in1, 1)?;

        // opening the encoder only touches codec tables, no output file yet
        let encoder = AudioEncoder::open(output_url, sample_rate, bit_rate)?;
        let frame_size = match encoder.frame_size() {
            0 => DEFAULT_FRAME_SIZE,
            n => n,
        };

        let mixer = MixerNode::new(MixerConfig {
            inputs: 2,
            sample_rate,
            frame_size,
            gain: Gain::Attenuate,
        })?;
        let sources = vec![
            SourceNode::new(0, Box::new(dec0) as _),
            SourceNode::new(1, Box::new(dec1) as _),
        ];
        let scheduler = Scheduler::new(sources, mixer)?;

        let mut output = AvOutput::create(output_url)?;
        output.add_stream(&encoder)?;
        output.write_header()?;

        Ok(Self {
            scheduler,
            sink: EncodeSink { encoder, output },
        })
    }

    /// Run the scheduler to completion, then flush the encoder and write
    /// the container trailer.
    pub fn run(mut self) -> Result<MixSession, MixError> {
        let session = self.scheduler.process_all(&mut self.sink)?;
        self.sink.finish()?;
        log::info!(
            "mixed {:?} input samples into {} output samples",
            session.consumed,
            session.emitted
        );
        Ok(session)
    }
}
