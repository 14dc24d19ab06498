//! Sum a vector of 17s with the two-pass reduction and report timings.

use clap::Parser;
use std::process::ExitCode;
use veda_cl::prelude::*;
use veda_cl::{profiling, samples};

#[derive(Parser)]
#[command(name = "veda-reduce")]
#[command(about = "Two-pass tree reduction of nels elements on the selected device")]
#[command(version)]
struct Cli {
    /// Number of elements
    #[arg(value_parser = clap::value_parser!(u32).range(1..=i32::MAX as i64))]
    nels: u32,

    /// Work-group size (a power of two)
    #[arg(value_parser = clap::value_parser!(u32).range(1..))]
    lws: u32,

    /// Work-groups per compute unit
    #[arg(value_parser = clap::value_parser!(u32).range(1..))]
    nwg_cu: u32,

    /// Print queue metrics as JSON when done
    #[arg(long)]
    metrics: bool,
}

const INIT_VALUE: i32 = 17;

fn main() -> ExitCode {
    let cli = Cli::parse();
    samples::init_logging();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    let nels = cli.nels as usize;
    let lws = cli.lws as usize;
    let nwg_cu = cli.nwg_cu as usize;

    let expected = i32::try_from(cli.nels)
        .ok()
        .and_then(|n| n.checked_mul(INIT_VALUE))
        .ok_or_else(|| {
            Error::argument(format!(
                "{} * {} does not fit in a 32-bit sum",
                INIT_VALUE, cli.nels
            ))
        })?;

    let queue = ComputeQueue::new(&Runtime::discover(), &Config::from_env()?)?;
    let device = queue.device();

    println!("Host? {}", device.is_host());
    println!("Platform name: {}", device.platform_name());
    println!("Device name: {}", device.name());
    println!("Device CUs: {}", device.compute_units());

    let engine = ReductionEngine::new(&queue);
    let nwg = engine.work_groups(nwg_cu)?;

    let vec = Buffer::<i32>::new(nels);

    println!("Submit init ...");
    let init = samples::init_constant(&queue, &vec, INIT_VALUE)?;

    println!("Submit reduce ({}/{}) ...", nwg, lws);
    let reduction = engine.reduce(&vec, lws, nwg_cu)?;

    queue.drain()?;

    let init_ms = profiling::elapsed_millis(&init)?;
    println!("init runtime: {}ms", init_ms);
    match profiling::bandwidth_gbps(vec.size_bytes(), init_ms) {
        Some(bw) => println!("init bw: {}GB/s", bw),
        None => println!("init bw: n/a"),
    }
    println!(
        "reduce pass1 runtime: {}ms",
        profiling::elapsed_millis(&reduction.pass1)?
    );
    println!(
        "reduce pass2 runtime: {}ms",
        profiling::elapsed_millis(&reduction.pass2)?
    );

    samples::verify_sum(reduction.value()?, expected)?;

    if cli.metrics {
        print_metrics(&queue)?;
    }

    println!("OK.");
    Ok(())
}

#[cfg(feature = "telemetry")]
fn print_metrics(queue: &ComputeQueue) -> Result<()> {
    println!("{}", veda_cl::telemetry::JsonExporter::render(&queue.metrics())?);
    Ok(())
}

#[cfg(not(feature = "telemetry"))]
fn print_metrics(_queue: &ComputeQueue) -> Result<()> {
    Err(Error::telemetry("built without the telemetry feature"))
}
