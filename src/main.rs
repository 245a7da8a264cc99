use clap::Parser;

mod pipeline;

/// Mix two audio files into one. The output container format is inferred
/// from the output path's extension.
#[derive(Parser)]
#[command(name = "audiomix", version)]
struct Args {
    /// First input; the output inherits its sample rate and bit rate.
    input1: String,
    /// Second input.
    input2: String,
    /// Output file.
    output: String,
}

fn init_logging() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();
}

fn main() -> std::process::ExitCode {
    init_logging();
    let args = Args::parse();

    match run(&args) {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{:#}", e);
            std::process::ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> anyhow::Result<()> {
    ffmpeg_io::init()?;

    let pipeline = pipeline::Pipeline::open(&args.input1, &args.input2, &args.output)?;
    let session = pipeline.run()?;
    log::info!(
        "wrote {} mixed samples to {}",
        session.emitted,
        args.output
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_require_three_paths() {
        assert!(Args::try_parse_from(["audiomix", "a.wav", "b.wav"]).is_err());
        let args = Args::try_parse_from(["audiomix", "a.wav", "b.wav", "out.wav"]).unwrap();
        assert_eq!(args.input1, "a.wav");
        assert_eq!(args.input2, "b.wav");
        assert_eq!(args.output, "out.wav");
    }
}
