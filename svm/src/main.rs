use std::error::Error;
use std::fs;
use std::path::Path;
use std::process;

use clap::Parser;

use pixel::backends::ModuleBuilder;
use pixel::backends::recording::RecordingBuilder;
use pixel::transform::ENTRY_POINT;
use svm::machine::DEFAULT_MAX_STEPS;
use svm::{Machine, MachineConfig, StdoutHost, TraceEntry};

#[derive(Parser)]
#[command(name = "svm")]
#[command(about = "Runs pixel programs on a small stack machine", version)]
struct Cli {
    /// Source file
    input: String,

    /// Function to start from
    #[arg(long, default_value = ENTRY_POINT)]
    entry: String,

    /// Stop with a trap after this many instructions
    #[arg(long, default_value_t = DEFAULT_MAX_STEPS)]
    max_steps: u64,

    /// Print every executed instruction after the run
    #[arg(long)]
    trace: bool,

    /// Optimize the module before running it
    #[arg(long)]
    optimize: bool,
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("{}", e);
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let source = fs::read_to_string(&cli.input)?;
    let unit = Path::new(&cli.input)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("module");

    let mut module = RecordingBuilder::new(unit);
    pixel::build(&source, &mut module)?;
    if cli.optimize {
        module.optimize();
    }

    let mut machine = Machine::new(MachineConfig {
        max_steps: cli.max_steps,
        trace: cli.trace,
    });
    let result = machine.run(&module, &cli.entry, &mut StdoutHost);

    // printed even when the run trapped
    if cli.trace {
        print_trace(machine.trace());
    }
    result?;

    Ok(())
}

fn print_trace(entries: &[TraceEntry]) {
    println!("=== TRACE ===");
    println!("{:>6}  {:<12} {:<28} stack", "step", "function", "instruction");
    for entry in entries {
        let stack: Vec<String> = entry.stack.iter().map(|v| v.to_string()).collect();
        println!(
            "{:>6}  {:<12} {:<28} [{}]",
            entry.step,
            entry.function,
            entry.instr,
            stack.join(", ")
        );
    }
}
