// src/commands/remote.rs

use crate::commands::local::{
    confirm_if_requested, confirm_param, result_to_value, stream_mode, stream_mode_type,
};
use crate::core::arg_config::{ArgConfig, Container, ScalarType};
use crate::core::command::{CallArgs, Command};
use crate::core::errors::{RunError, RunResult};
use crate::core::parameter::Parameter;
use crate::system::executor::{self, LocalCommand};
use crate::system::remote::RemoteCommand;
use serde_json::{Value, json};

pub fn command() -> RunResult<Command> {
    Command::builder("remote")
        .description("Run a command on a remote host through ssh.")
        .param(Parameter::positional("cmd").annotate(ArgConfig::new().container(Container::List)))
        .param(Parameter::positional("host"))
        .param(Parameter::optional("user", Value::Null).annotate("User to log in as"))
        .param(Parameter::optional("port", Value::Null).annotate(
            ArgConfig::new().arg_type(ScalarType::Int).help("SSH port on the remote host"),
        ))
        .param(Parameter::optional("sudo", false).annotate("Run the command as root with sudo"))
        .param(Parameter::optional("run_as", Value::Null).annotate("Run the command as this user with sudo"))
        .param(Parameter::optional("shell", "/bin/sh"))
        .param(Parameter::optional("cd", Value::Null))
        .param(Parameter::optional("environ", Value::Null).annotate(ArgConfig::new().container(Container::Dict)))
        .param(Parameter::optional("paths", json!([])))
        .param(Parameter::optional("stdout", Value::Null).annotate(stream_mode_type()))
        .param(Parameter::optional("stderr", Value::Null).annotate(stream_mode_type()))
        .param(Parameter::optional("echo", false))
        .param(Parameter::optional("raise_on_error", true))
        .param(Parameter::optional("dry_run", false))
        .param(confirm_param())
        .implementation(remote)
        .build()
}

pub(crate) fn remote_command(call: &CallArgs) -> RunResult<RemoteCommand> {
    let host = call
        .string("host")
        .ok_or_else(|| RunError::usage("Falta el host remoto"))?;
    let mut remote = RemoteCommand::new(call.strings("cmd").join(" "), host);
    remote.user = call.string("user");
    remote.port = match call.int("port") {
        None => None,
        Some(port) => Some(
            u16::try_from(port).map_err(|_| RunError::usage(format!("Puerto inválido: {}", port)))?,
        ),
    };
    remote.sudo = call.flag("sudo");
    remote.run_as = call.string("run_as");
    if let Some(shell) = call.string("shell") {
        remote.shell = shell;
    }
    remote.cd = call.string("cd");
    remote.environ = call.pairs("environ").into_iter().collect();
    remote.paths = call.strings("paths");
    Ok(remote)
}

fn ssh_command(call: &CallArgs) -> RunResult<LocalCommand> {
    let remote = remote_command(call)?;
    Ok(remote.to_local(
        stream_mode(call, "stdout")?,
        stream_mode(call, "stderr")?,
        call.flag("echo"),
        call.opt_flag("raise_on_error").unwrap_or(true),
        call.flag("dry_run"),
    ))
}

fn remote(call: &CallArgs) -> RunResult<Value> {
    let local = ssh_command(call)?;
    confirm_if_requested(call)?;
    log::info!("Ejecutando en remoto: {}", local.display_string());
    let result = executor::run_local(&local)?;
    result_to_value(&result)
}
