use std::path::PathBuf;
use std::process::ExitCode;
use std::rc::Rc;
use std::sync::Once;

use anyhow::{Context, Result};
use clap::Parser;
use smalt_core::val::Val;
use smalt_core::{Vm, VmConfig};

mod repl;

static TRACE_INIT: Once = Once::new();
const DEFAULT_TRACE_FILTER: &str = "smalt_core=warn,smalt_stdlib=warn,smalt_cli=warn";

#[derive(Debug, Parser)]
#[command(
    name = "smalt",
    author,
    version,
    about = "The Smalt language: scripts and an interactive REPL",
    long_about = None
)]
struct CliArgs {
    /// Script file to run; starts the REPL when omitted
    #[arg(value_name = "FILE")]
    file: Option<PathBuf>,

    /// Arguments passed to the script as the `Arguments` global
    #[arg(value_name = "ARGS", trailing_var_arg = true)]
    script_args: Vec<String>,

    /// Evaluate an expression and print its value
    #[arg(short = 'e', long = "eval", value_name = "EXPR", conflicts_with = "file")]
    eval: Option<String>,

    /// Make every message send a yield point
    #[arg(long)]
    yield_on_send: bool,

    /// Scheduler step bound for draining forked processes
    #[arg(long, value_name = "N")]
    max_steps: Option<u64>,

    /// Skip loading the standard library
    #[arg(long)]
    no_stdlib: bool,
}

fn init_tracing() {
    TRACE_INIT.call_once(|| {
        use tracing_subscriber::EnvFilter;
        let filter = EnvFilter::try_from_env("SMALT_LOG")
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_TRACE_FILTER));
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    });
}

fn build_vm(args: &CliArgs) -> Result<Vm> {
    let mut config = VmConfig::default();
    config.yield_on_send = args.yield_on_send;
    if let Some(max) = args.max_steps {
        config.max_process_steps = max;
    }
    let mut vm = Vm::with_config(config);
    if !args.no_stdlib {
        smalt_stdlib::install(&mut vm)
            .map_err(|err| anyhow::anyhow!("{}", err))
            .context("loading the standard library")?;
    }
    Ok(vm)
}

fn run_file(vm: &mut Vm, path: &PathBuf, script_args: &[String]) -> Result<()> {
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    tracing::debug!(path = %path.display(), bytes = source.len(), "running script");
    let argv = Val::array(script_args.iter().map(Val::str).collect());
    vm.globals().borrow_mut().set(Rc::from("Arguments"), argv);
    vm.eval_script(&source)
        .map_err(|err| anyhow::anyhow!("{}", err))?;
    // Let forked processes drain; a deadlock among them is a script error.
    vm.run_to_completion()
        .map_err(|err| anyhow::anyhow!("{}", err))?;
    Ok(())
}

fn run_eval(vm: &mut Vm, source: &str) -> Result<()> {
    let value = vm.doit(source).map_err(|err| anyhow::anyhow!("{}", err))?;
    vm.run_to_completion()
        .map_err(|err| anyhow::anyhow!("{}", err))?;
    println!("{}", value.print_string());
    Ok(())
}

fn main() -> ExitCode {
    init_tracing();
    let args = CliArgs::parse();

    let mut vm = match build_vm(&args) {
        Ok(vm) => vm,
        Err(err) => {
            eprintln!("smalt: {:#}", err);
            return ExitCode::FAILURE;
        }
    };

    let result = if let Some(source) = &args.eval {
        run_eval(&mut vm, source)
    } else if let Some(file) = &args.file {
        run_file(&mut vm, file, &args.script_args)
    } else {
        repl::run(&mut vm)
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("smalt: {:#}", err);
            ExitCode::FAILURE
        }
    }
}
