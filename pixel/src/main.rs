use std::fs;
use std::path::Path;

use clap::{Parser, Subcommand};

use pixel::backends::BackendType;
use pixel::{CompileError, CompileOptions, parser, transform};

#[derive(Parser)]
#[command(name = "pixel")]
#[command(about = "Compiler for the pixel language", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a source file for the chosen target
    Compile {
        /// Source file
        input: String,

        /// Target format
        #[arg(short, long, default_value = "wasm")]
        target: String,

        /// Output path without extension
        #[arg(short, long)]
        output: Option<String>,

        /// Run the target's optimization passes
        #[arg(long)]
        optimize: bool,

        /// Print the AST after entry synthesis
        #[arg(long)]
        show_ast: bool,

        /// Print the token stream
        #[arg(long)]
        show_tokens: bool,
    },

    /// Parse and print the AST without compiling
    Parse {
        /// Source file
        input: String,
    },

    /// List supported targets
    Targets,
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), CompileError> {
    match cli.command {
        Commands::Compile { input, target, output, optimize, show_ast, show_tokens } => {
            let Some(backend_type) = BackendType::from_name(&target) else {
                return Err(CompileError::backend(format!("unknown target `{}`", target)));
            };
            println!("Compiling {} for {}...", input, target);

            let source = fs::read_to_string(&input)?;

            if show_tokens {
                println!("=== TOKENS ===");
                for token in parser::lexer::tokenize(&source)? {
                    println!("{}\t{:?} {}", token.location, token.kind, token);
                }
            }
            if show_ast {
                let program = transform::wrap_with_main(parser::parse(&source)?);
                println!("=== AST ===");
                println!("{:#?}", program);
            }

            let unit = unit_name(&input);
            let mut builder = backend_type.create(&unit);
            let options = CompileOptions { optimize };
            let artifact = pixel::compile_with(&source, &unit, &options, builder.as_mut())?;

            let base = output.unwrap_or_else(|| strip_extension(&input));
            match backend_type {
                BackendType::Wasm => {
                    let wat = format!("{}.wat", base);
                    let wasm = format!("{}.wasm", base);
                    fs::write(&wat, &artifact.text)?;
                    fs::write(&wasm, &artifact.binary)?;
                    println!("Compiled to: {} and {}", wat, wasm);
                    println!("Module size: {} bytes", artifact.binary.len());
                }
                BackendType::Listing => {
                    let listing = format!("{}.lst", base);
                    fs::write(&listing, &artifact.text)?;
                    println!("Listing written to: {}", listing);
                }
            }
        }
        Commands::Parse { input } => {
            println!("Parsing {}...", input);

            let source = fs::read_to_string(&input)?;

            println!("=== SOURCE ===");
            println!("{}", source);
            println!("=== TOKENS ===");
            for token in parser::lexer::tokenize(&source)? {
                println!("{:?}", token);
            }

            println!("=== AST ===");
            let program = parser::parse(&source)?;
            println!("{:#?}", program);
        }
        Commands::Targets => {
            println!("Supported targets:");
            for backend in BackendType::all() {
                println!("  {:8} - {}", backend.name(), backend.description());
            }
        }
    }

    Ok(())
}

fn strip_extension(input: &str) -> String {
    input
        .strip_suffix(&format!(".{}", pixel::EXTENSION))
        .unwrap_or(input)
        .to_string()
}

fn unit_name(input: &str) -> String {
    Path::new(input)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("module")
        .to_string()
}
