use thiserror::Error;

pub type BoxedError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Fatal pipeline failures. Every variant aborts the whole run; there is no
/// per-frame recovery. Flow-control outcomes (`Starved`, `EndOfStream`,
/// `NoData`, `Finished`) are not errors and live on their own enums so that
/// callers cannot conflate "nothing to do right now" with "something broke".
#[derive(Debug, Error)]
pub enum MixError {
    /// Bad input topology: wrong stream count, missing audio stream, codec
    /// not found. Reported before any processing begins.
    #[error("configuration: {0}")]
    Configuration(String),

    /// Open/read/write failure on the demux/mux boundary.
    #[error("i/o failure: {0}")]
    Io(BoxedError),

    /// Codec-level failure while decoding input `input`.
    #[error("decode failure on input {input}: {source}")]
    Decode { input: usize, source: BoxedError },

    /// Codec-level failure while encoding mixed output.
    #[error("encode failure: {0}")]
    Encode(BoxedError),

    /// Mixer topology could not be built or configured.
    #[error("mixer graph: {0}")]
    Graph(String),
}
