//! Initialize a vector on the selected device, report timings and verify it.

use clap::Parser;
use std::process::ExitCode;
use veda_cl::prelude::*;
use veda_cl::{profiling, samples};

#[derive(Parser)]
#[command(name = "veda-init")]
#[command(about = "Fill a vector with nels - i on the selected device and verify it")]
#[command(long_about = r#"
Fill a vector with nels - i on the selected device and verify it.

The device is chosen from SYCL_PLATFORM / SYCL_DEVICE, or the legacy
OCL_PLATFORM / OCL_DEVICE (OCL_PLATFORM=-1 selects the host device).
"#)]
#[command(version)]
struct Cli {
    /// Number of elements
    #[arg(value_parser = clap::value_parser!(u32).range(0..=i32::MAX as i64))]
    nels: u32,

    /// Ignore device selection variables and use the default ranking
    #[arg(long)]
    default_selector: bool,

    /// Print queue metrics as JSON when done
    #[arg(long)]
    metrics: bool,
}

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

    let config = if cli.default_selector {
        Config::default()
    } else {
        Config::from_env()?
    };

    let vec = Buffer::<i32>::new(nels);
    let queue = ComputeQueue::new(&Runtime::discover(), &config)?;

    println!("Platform name: {}", queue.device().platform_name());
    println!("Device name: {}", queue.device().name());

    println!("Submit ...");
    let init = samples::init_descending(&queue, &vec)?;

    println!("Event status: {}", status_name(&init));
    println!("Wait ...");
    init.wait()?;
    println!("Event status: {}", status_name(&init));

    println!("Queue wait ...");
    queue.drain()?;
    println!("Event status: {}", status_name(&init));

    let runtime_ms = profiling::elapsed_millis(&init)?;
    println!("Runtime: {}ms", runtime_ms);
    match profiling::bandwidth_gbps(vec.size_bytes(), runtime_ms) {
        Some(bw) => println!("Bandwidth: {}GB/s", bw),
        None => println!("Bandwidth: n/a"),
    }

    samples::verify_descending(&vec)?;

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
