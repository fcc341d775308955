// src/bin/run.rs

use anyhow::{Context, Result};
use std::env;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use runcommands::commands::builtin_collection;
use runcommands::core::run::Run;

/// El punto de entrada principal de la aplicación.
fn main() {
    match run_cli() {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            // Un error al construir los comandos es un fallo de programación.
            eprintln!("\nError: {:?}", e);
            std::process::exit(1);
        }
    }
}

fn run_cli() -> Result<i32> {
    let argv: Vec<String> = env::args().skip(1).collect();

    let interrupted = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(signal_hook::consts::SIGINT, Arc::clone(&interrupted))
        .context("No se pudo instalar el manejador de SIGINT")?;

    let collection = builtin_collection().context("Error al construir los comandos")?;
    let run = Run::with_interrupt_flag(collection, interrupted)
        .context("Error al construir el comando run")?;

    // Para ver los logs: `RUST_LOG=debug run ...` o `run -d ...`.
    let default_level = if run.debug_requested(&argv) { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();
    log::debug!("argv: {:?}", argv);

    Ok(run.console_script(&argv))
}
