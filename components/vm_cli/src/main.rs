//! `loopvm` command-line entry point
//!
//! Parses arguments, loads the configuration and delegates to the
//! Runtime. Set `RUST_LOG=debug` to watch loops get reported, compiled,
//! entered and deoptimized.

use clap::Parser;
use vm_cli::{demos, Cli, CliResult, Command, Runtime, RuntimeConfig};

fn run(cli: &Cli) -> CliResult<()> {
    let config = RuntimeConfig::load(cli.config.as_deref())?.with_flags(cli);
    log::debug!("configuration: {:?}", config);
    let runtime = Runtime::new(config);

    match &cli.command {
        Command::Run { file, args } => {
            let value = runtime.run_file(file, args)?;
            println!("{}", value);
        }
        Command::Demo { demo } => {
            let (program, args) = demos::program_for(*demo)?;
            let value = runtime.run_program(&program, &args)?;
            println!("{}", value);
        }
        Command::Disasm { file } => {
            print!("{}", runtime.disassemble_file(file)?);
        }
    }
    log::info!("{}", runtime.summary());
    Ok(())
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    if let Err(e) = run(&cli) {
        log::error!("{}", e);
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
