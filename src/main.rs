//! bahasa compiler driver

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{self, Command};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use log::{debug, info};

use bahasa::backend::{CCodeGen, CodeGen, Linker};
use bahasa::frontend::printer::print_tree;
use bahasa::middle::eval::{Evaluator, StdHost};
use bahasa::middle::ir::IRModule;
use bahasa::middle::ir_printer::IRPrinter;

/// bahasa compiler
#[derive(Parser, Debug)]
#[command(name = "bahasa")]
#[command(author = "Z1529")]
#[command(version)]
#[command(about = "Compiler for the bahasa language")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Compile and write the IR listing or C source
    Ir {
        /// Input source file
        input: PathBuf,

        /// Output file, defaults to <module>.<ext>
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value_t = Emit::Ir)]
        emit: Emit,
    },

    /// Compile to a native executable
    #[command(alias = "susun")]
    Build {
        /// Input source file
        input: PathBuf,

        /// Output executable
        #[arg(short, long, default_value = "a.out")]
        output: PathBuf,

        /// C compiler to use
        #[arg(long, env = "BAHASA_CC")]
        cc: Option<String>,
    },

    /// Compile and run a program
    #[command(alias = "jalankan")]
    Run {
        /// Input source file
        input: PathBuf,

        /// Evaluate the IR in process instead of building natively
        #[arg(long)]
        interpret: bool,

        /// Function to start from (with --interpret)
        #[arg(long, default_value = "main")]
        entry: String,

        /// C compiler to use
        #[arg(long, env = "BAHASA_CC")]
        cc: Option<String>,
    },

    /// Print the syntax tree
    Ast {
        /// Input source file
        input: PathBuf,

        /// Print JSON instead of a tree
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Emit {
    Ir,
    C,
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("error: {:#}", e);
            process::exit(1);
        }
    }
}

fn run(cli: Cli) -> Result<i32> {
    match cli.command {
        Commands::Ir { input, output, emit } => {
            let module = compile_file(&input)?;
            let mut backend: Box<dyn CodeGen> = match emit {
                Emit::Ir => Box::new(IRPrinter::new()),
                Emit::C => Box::new(CCodeGen::new()),
            };
            let text = backend.generate(&module)?;
            let path = output.unwrap_or_else(|| {
                PathBuf::from(format!("{}.{}", module.name, backend.extension()))
            });
            fs::write(&path, text).with_context(|| format!("failed to write {}", path.display()))?;
            info!("wrote {} output to {}", backend.name(), path.display());
            Ok(0)
        }

        Commands::Build { input, output, cc } => {
            let module = compile_file(&input)?;
            link(&module, &output, cc)?;
            info!("built {}", output.display());
            Ok(0)
        }

        Commands::Run { input, interpret, entry, cc } => {
            let module = compile_file(&input)?;
            if interpret {
                let mut eval = Evaluator::new(&module, StdHost);
                return Ok(eval.run(&entry)?);
            }
            if entry != "main" {
                bail!("--entry {} requires --interpret", entry);
            }

            let dir = tempfile::tempdir().context("failed to create a build directory")?;
            let exe = dir.path().join(&module.name);
            link(&module, &exe, cc)?;
            let status = Command::new(&exe)
                .status()
                .with_context(|| format!("failed to run {}", exe.display()))?;
            debug!("{} exited with {}", exe.display(), status);
            Ok(status.code().unwrap_or(1))
        }

        Commands::Ast { input, json } => {
            let source = read_source(&input)?;
            let program = bahasa::parse_source(&source)
                .with_context(|| format!("failed to parse {}", input.display()))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&program)?);
            } else {
                print!("{}", print_tree(&program));
            }
            Ok(0)
        }
    }
}

fn read_source(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

/// Read and compile a source file; the module is named after the file
/// unless the program declares `modul`
fn compile_file(path: &Path) -> Result<IRModule> {
    let source = read_source(path)?;
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("module");
    let module = bahasa::compile_source(&source, stem)
        .with_context(|| format!("failed to compile {}", path.display()))?;
    debug!("module `{}`: {} functions", module.name, module.functions.len());
    Ok(module)
}

fn link(module: &IRModule, output: &Path, cc: Option<String>) -> Result<()> {
    let c_source = CCodeGen::new().generate(module)?;
    let mut linker = Linker::new();
    if let Some(cc) = cc {
        linker = linker.with_compiler(cc);
    }
    linker.link(&c_source, output)?;
    Ok(())
}
