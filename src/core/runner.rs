// src/core/runner.rs

use crate::core::collection::Collection;
use crate::core::command::Command;
use crate::core::errors::RunError;
use crate::core::partition::{help_requested, partition_argv};
use crate::system::executor::ExecResult;
use crate::system::printer;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

pub const SIGINT_MESSAGE: &str = "Aborted by Ctrl-C (SIGINT)";

/// Lo que queda de una ejecución encadenada.
#[derive(Debug, Default)]
pub struct RunReport {
    /// Los resultados de los comandos que terminaron, en orden.
    pub results: Vec<(String, Value)>,
    /// Los fallos de ejecución que no detuvieron la ejecución.
    pub failures: Vec<(String, Box<ExecResult>)>,
    /// El error que detuvo la ejecución, si lo hubo.
    pub error: Option<RunError>,
}

impl RunReport {
    fn from_error(error: RunError) -> Self {
        Self {
            error: Some(error),
            ..Self::default()
        }
    }

    pub fn succeeded(&self) -> bool {
        self.error.is_none() && self.failures.is_empty()
    }

    pub fn return_code(&self) -> i32 {
        match (&self.error, self.failures.last()) {
            (Some(error), _) => error.return_code(),
            (None, Some((_, result))) => RunError::Failed(result.clone()).return_code(),
            (None, None) => 0,
        }
    }
}

/// Ejecuta los comandos de una colección según un argv encadenado.
pub struct CommandRunner<'a> {
    collection: &'a Collection,
    abort_on_failure: bool,
    interrupted: Arc<AtomicBool>,
}

impl<'a> CommandRunner<'a> {
    pub fn new(collection: &'a Collection) -> Self {
        Self {
            collection,
            abort_on_failure: true,
            interrupted: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Con `false`, un comando que falla no detiene a los siguientes.
    pub fn with_abort_on_failure(mut self, abort_on_failure: bool) -> Self {
        self.abort_on_failure = abort_on_failure;
        self
    }

    /// El flag que se activa al recibir SIGINT.
    pub fn with_interrupt_flag(mut self, interrupted: Arc<AtomicBool>) -> Self {
        self.interrupted = interrupted;
        self
    }

    fn is_interrupted(&self) -> bool {
        self.interrupted.load(Ordering::SeqCst)
    }

    /// Particiona el argv y ejecuta los comandos de izquierda a derecha.
    ///
    /// Si algún comando pide la ayuda, se muestra la de todos los que la
    /// piden y no se ejecuta nada.
    pub fn run(&self, argv: &[String]) -> RunReport {
        let partitions = match partition_argv(self.collection, argv) {
            Ok(partitions) => partitions,
            Err(error) => return RunReport::from_error(error),
        };

        let to_run: Vec<(&Command, Vec<String>)> = partitions
            .into_iter()
            .map(|p| {
                let argv = p.command.expand_short_options(&p.argv).into_owned();
                log::debug!("Comando a ejecutar: {} {:?}", p.command.name(), argv);
                (p.command, argv)
            })
            .collect();

        let show_help_for: Vec<&Command> = to_run
            .iter()
            .filter(|(command, argv)| {
                !command.is_base_command() && command.uses_default_help() && help_requested(command, argv)
            })
            .map(|(command, _)| *command)
            .collect();
        if !show_help_for.is_empty() {
            let count = show_help_for.len();
            for command in show_help_for {
                if count > 1 {
                    printer::info(&format!("{}\nAyuda de {}\n", printer::get_hr(), command.name()));
                }
                command.show_help();
            }
            return RunReport::default();
        }

        let mut report = RunReport::default();
        let mut with_callbacks: Vec<(&Command, Value)> = Vec::new();

        for (command, argv) in to_run {
            if self.is_interrupted() {
                report.error = Some(RunError::aborted(0, SIGINT_MESSAGE));
                break;
            }

            log::info!("Ejecutando el comando `{}`", command.name());
            match command.run_argv(&argv, Map::new(), false) {
                Ok(result) => {
                    if !command.callbacks().is_empty() {
                        with_callbacks.push((command, result.clone()));
                    }
                    report.results.push((command.name().to_string(), result));
                }
                Err(error) => {
                    let error = if self.is_interrupted() && !error.is_abort() {
                        RunError::aborted(0, SIGINT_MESSAGE)
                    } else {
                        error
                    };
                    match error {
                        RunError::Failed(result) if !self.abort_on_failure => {
                            log::warn!(
                                "El comando `{}` falló; se continúa con el siguiente",
                                command.name()
                            );
                            report.failures.push((command.name().to_string(), result));
                        }
                        error => {
                            if error.is_abort() {
                                log::debug!("Saliendo del runner por un abort");
                            } else {
                                log::debug!("Saliendo del runner por un error: {:?}", error);
                            }
                            report.error = Some(error);
                            break;
                        }
                    }
                }
            }
        }

        // Los callbacks se ejecutan también si se abortó, pero no tras otros
        // errores.
        let aborted = report.error.as_ref().is_some_and(RunError::is_abort);
        if report.error.is_none() || aborted {
            for (command, result) in &with_callbacks {
                for callback in command.callbacks() {
                    callback(command, result, aborted);
                }
            }
        }

        report
    }

    /// La lista de comandos disponibles.
    pub fn print_usage(&self) {
        if self.collection.is_empty() {
            printer::warning("No hay comandos disponibles");
            return;
        }
        printer::print("\nComandos disponibles:\n");
        let mut commands: Vec<&Command> = self.collection.iter().collect();
        commands.sort_by_key(|command| command.name());
        for command in commands {
            match command.short_description() {
                Some(description) => {
                    printer::print(&format!("    {:<16} {}", command.name(), description))
                }
                None => printer::print(&format!("    {}", command.name())),
            }
        }
        printer::print("\nPara ver la ayuda de un comando: run <comando> --help");
    }
}
