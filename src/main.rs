use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use qoi_trace::{DecoderOptions, QoiDecoder, TraceRecord, TraceSink};

/// Decode a QOI file, optionally narrating every opcode.
#[derive(Debug, Parser)]
#[command(version)]
struct Args {
    /// File to decode.
    file: PathBuf,
    /// Print one line per header field and opcode.
    #[arg(short, long)]
    verbose: bool,
    /// Save the decoded image, format taken from the extension.
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Refuse images with more pixels than this.
    #[arg(long, default_value_t = qoi_trace::PIXELS_MAX)]
    max_pixels: u64,
}

struct Stdout;

impl TraceSink for Stdout {
    fn record(&mut self, record: TraceRecord) {
        println!("{record}");
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let data = std::fs::read(&args.file)
        .with_context(|| format!("failed to read {}", args.file.display()))?;
    let options = DecoderOptions::default().set_max_pixels(args.max_pixels);
    let mut decoder = QoiDecoder::new_with_options(&data, options);

    let decoded = if args.verbose {
        decoder.with_trace(Stdout).decode()
    } else {
        decoder.decode()
    };
    let grid = decoded.with_context(|| format!("failed to decode {}", args.file.display()))?;

    let header = grid.header();
    println!(
        "{}x{}, {}, {}",
        header.width, header.height, header.channels, header.colorspace
    );

    if let Some(output) = &args.output {
        let image = grid
            .to_dynamic_image()
            .context("decoded pixels do not fill the image")?;
        image
            .save(output)
            .with_context(|| format!("failed to save {}", output.display()))?;
        log::info!("Saved {}", output.display());
    }

    Ok(())
}
