// This file is an example of how to use the `wire_logic` library.
// The main library entry point is `src/lib.rs`.
//
// Usage: wire_logic [--flip-vertical] <image> [ticks] [out.png]

use anyhow::{Context, Result};
use clap::Parser;
use futures::StreamExt;
use std::path::PathBuf;
use std::sync::Arc;
use wire_logic::core_modules::utils::image_helper::image_helper::{
    load_frame, render_generation, save_png,
};
use wire_logic::{DecodeWorker, DecoderConfig, EvaluationConfig, Simulation};

#[derive(clap::Parser, Debug)]
#[command(name = "wire_logic")]
#[command(about = "Decode a pixel-drawn circuit and run it for a number of ticks")]
struct Args {
    /// Circuit image in any format the `image` crate reads.
    image: PathBuf,

    /// Generations to simulate.
    #[clap(default_value = "1")]
    ticks: u64,

    /// Where to write a PNG of the final generation.
    output: Option<PathBuf>,

    /// Treat the first image row as the bottom of the circuit.
    #[clap(long)]
    flip_vertical: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    clilog::init_stderr_color_debug();
    let args = Args::parse();
    clilog::info!("wire_logic args:\n{:#?}", args);

    let (frame, wire_hint) = load_frame(&args.image, args.flip_vertical)
        .with_context(|| format!("failed to load {}", args.image.display()))?;

    let timer_decode = clilog::stimer!("decode");
    let worker = DecodeWorker::new(DecoderConfig::default());
    let handle = worker.submit(frame, Some(wire_hint))?;
    let mut progress = Box::pin(handle.progress_stream());
    let reporter = tokio::spawn(async move {
        while let Some(update) = progress.next().await {
            clilog::debug!("traced {}/{} rows", update.rows_processed, update.total_rows);
        }
    });
    let graph = handle.await.context("decode failed")?;
    reporter.await?;
    worker.shutdown().await?;
    clilog::finish!(timer_decode);

    let timer_sim = clilog::stimer!("simulation");
    let mut simulation = Simulation::from_shared(Arc::new(graph), &EvaluationConfig::default());
    simulation.run(args.ticks);
    clilog::finish!(timer_sim);

    clilog::info!(
        "{} wires, {} active after {} ticks",
        simulation.graph().wire_count(),
        simulation.engine().active_count(),
        simulation.generation()
    );

    if let Some(output) = &args.output {
        let image = render_generation(simulation.graph(), simulation.engine().states());
        save_png(output, &image)
            .with_context(|| format!("failed to write {}", output.display()))?;
        clilog::info!("wrote {}", output.display());
    }

    Ok(())
}
