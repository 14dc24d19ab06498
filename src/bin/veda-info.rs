//! List the platforms and devices visible to the runtime.

use clap::Parser;
use std::process::ExitCode;
use veda_cl::samples;
use veda_cl::Runtime;

#[derive(Parser)]
#[command(name = "veda-info")]
#[command(about = "Print every platform and device as a tree")]
#[command(version)]
struct Cli {
    /// Also print kind, compute units and work-group limit of each device
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    samples::init_logging();

    let runtime = Runtime::discover();
    print!("{}", samples::platform_tree(&runtime));

    if cli.verbose {
        println!();
        for device in runtime.devices() {
            println!(
                "{} [{}]: {} compute units, max work-group size {}",
                device.name(),
                device.kind(),
                device.compute_units(),
                device.max_work_group_size()
            );
        }
    }

    ExitCode::SUCCESS
}
