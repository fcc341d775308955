// src/commands/local.rs

use crate::core::arg_config::{ArgConfig, Container, EnumType, ScalarType};
use crate::core::command::{CallArgs, Command};
use crate::core::errors::{RunError, RunResult};
use crate::core::parameter::Parameter;
use crate::system::executor::{self, CommandLine, LocalCommand, StreamMode};
use crate::system::io;
use clap::ValueEnum;
use serde_json::{Value, json};
use std::path::PathBuf;

/// El tipo de los argumentos `--stdout` y `--stderr`.
pub(crate) fn stream_mode_type() -> ScalarType {
    ScalarType::Enum(EnumType::of::<StreamMode>("StreamMode"))
}

pub(crate) fn stream_mode(call: &CallArgs, name: &str) -> RunResult<Option<StreamMode>> {
    match call.str(name) {
        None => Ok(None),
        Some(mode) => StreamMode::from_str(mode, true)
            .map(Some)
            .map_err(|e| RunError::usage(format!("--{}: {}", name, e))),
    }
}

pub(crate) fn result_to_value<T: serde::Serialize>(result: &T) -> RunResult<Value> {
    serde_json::to_value(result).map_err(|e| RunError::Internal(e.to_string()))
}

/// Con `--confirm` se pide confirmación antes de lanzar el proceso; una
/// negativa aborta la ejecución sin error.
pub(crate) fn confirm_param() -> Parameter {
    Parameter::optional("confirm", Value::Null).annotate("Ask for confirmation with this message first")
}

pub(crate) fn confirm_if_requested(call: &CallArgs) -> RunResult<()> {
    match call.string("confirm") {
        Some(message) if !call.flag("dry_run") => io::confirm_or_abort(&message, 0),
        _ => Ok(()),
    }
}

pub fn command() -> RunResult<Command> {
    Command::builder("local")
        .description(
            "Run a local command.\n\n    \
             A single argument containing spaces is run by the shell; several\n    \
             arguments are run directly unless --shell is passed.",
        )
        .param(Parameter::positional("args").annotate(ArgConfig::new().container(Container::List)))
        .param(Parameter::optional("cd", Value::Null).annotate("Working directory to change to first"))
        .param(Parameter::optional("environ", Value::Null).annotate(
            ArgConfig::new()
                .container(Container::Dict)
                .help("Additional environment variables for the process"),
        ))
        .param(Parameter::optional("replace_env", false).annotate("Only pass the variables from --environ"))
        .param(Parameter::optional("paths", json!([])).annotate("Additional paths to prepend to $PATH"))
        .param(Parameter::optional("shell", Value::Null).annotate(
            ArgConfig::new()
                .arg_type(ScalarType::Bool)
                .help("Run the command through the shell"),
        ))
        .param(Parameter::optional("stdout", Value::Null).annotate(stream_mode_type()))
        .param(Parameter::optional("stderr", Value::Null).annotate(stream_mode_type()))
        .param(Parameter::optional("echo", false).annotate("Echo the command before running it"))
        .param(Parameter::optional("raise_on_error", true))
        .param(Parameter::optional("dry_run", false).annotate("Print the command instead of running it"))
        .param(confirm_param())
        .implementation(local)
        .build()
}

/// Construye el comando a lanzar a partir de los argumentos.
pub(crate) fn local_command(call: &CallArgs) -> RunResult<LocalCommand> {
    let mut args = call.strings("args");
    let shell = call.opt_flag("shell");
    let line = match (args.len(), shell) {
        (1, None) if args[0].contains(char::is_whitespace) => CommandLine::Shell(args.remove(0)),
        _ => CommandLine::Args(args),
    };

    let mut local = LocalCommand::new(line);
    local.cd = call.string("cd").map(PathBuf::from);
    local.environ = call.pairs("environ").into_iter().collect();
    local.replace_env = call.flag("replace_env");
    local.paths = call.strings("paths").into_iter().map(PathBuf::from).collect();
    local.shell = shell;
    local.stdout = stream_mode(call, "stdout")?;
    local.stderr = stream_mode(call, "stderr")?;
    local.echo = call.flag("echo");
    local.raise_on_error = call.opt_flag("raise_on_error").unwrap_or(true);
    local.dry_run = call.flag("dry_run");
    Ok(local)
}

fn local(call: &CallArgs) -> RunResult<Value> {
    let local = local_command(call)?;
    confirm_if_requested(call)?;
    log::info!("Ejecutando localmente: {}", local.display_string());
    let result = executor::run_local(&local)?;
    result_to_value(&result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn argv(tokens: &[&str]) -> Vec<String> {
        tokens.iter().map(|t| t.to_string()).collect()
    }

    fn bound(tokens: &[&str]) -> LocalCommand {
        let command = command().unwrap();
        let parsed = command.parse_args(&argv(tokens)).unwrap();
        let call = command.bind(parsed, Default::default()).unwrap();
        local_command(&call).unwrap()
    }

    #[test]
    fn arguments_reach_the_executor() {
        let local = bound(&[
            "--cd", "/tmp", "--environ", "A:1", "--paths", "/opt/bin", "--stdout", "capture", "--dry-run",
            "--", "ls", "-l",
        ]);
        assert_eq!(local.command, CommandLine::Args(argv(&["ls", "-l"])));
        assert_eq!(local.cd, Some(PathBuf::from("/tmp")));
        assert_eq!(local.environ, BTreeMap::from([("A".to_string(), "1".to_string())]));
        assert_eq!(local.paths, vec![PathBuf::from("/opt/bin")]);
        assert_eq!(local.stdout, Some(StreamMode::Capture));
        assert_eq!(local.stderr, None);
        assert!(local.dry_run);
        assert!(local.raise_on_error);
        assert_eq!(local.shell, None);
    }

    #[test]
    fn a_single_line_runs_in_the_shell() {
        let local = bound(&["echo $HOME"]);
        assert_eq!(local.command, CommandLine::Shell("echo $HOME".into()));

        let local = bound(&["--no-shell", "echo $HOME"]);
        assert_eq!(local.command, CommandLine::Args(argv(&["echo $HOME"])));
    }

    #[test]
    fn empty_arguments_are_kept() {
        let local = bound(&["--cd", "", "echo", ""]);
        assert_eq!(local.command, CommandLine::Args(argv(&["echo", ""])));
        assert_eq!(local.cd, None);

        let command = command().unwrap();
        let result = command.run(&argv(&["--dry-run", "echo", ""]), Default::default()).unwrap();
        assert_eq!(result["args"], json!(["echo", ""]));
    }

    #[test]
    fn dry_run_returns_a_successful_result() {
        let command = command().unwrap();
        let result = command
            .run(&argv(&["--dry-run", "--no-raise-on-error", "false"]), Default::default())
            .unwrap();
        assert_eq!(result["return_code"], json!(0));
        assert_eq!(result["args"], json!(["false"]));
    }

    #[test]
    fn invalid_stream_mode_is_a_usage_error() {
        let command = command().unwrap();
        let error = command.parse_args(&argv(&["--stdout", "loud", "ls"])).unwrap_err();
        assert_eq!(error.return_code(), 2);
    }
}
