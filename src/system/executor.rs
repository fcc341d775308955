// src/system/executor.rs

use crate::system::printer;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::fmt;
use std::path::{self, PathBuf};
use std::process::{Command as StdCommand, Stdio};
use std::sync::RwLock;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("El comando '{0}' no se pudo ejecutar: {1}")]
    Spawn(String, std::io::Error),
    #[error("{0}")]
    Failed(Box<ExecResult>),
}

/// Variables de entorno añadidas por `run` (sección `environ`) que heredan
/// todos los procesos lanzados después.
static AMBIENT_ENVIRON: RwLock<BTreeMap<String, String>> = RwLock::new(BTreeMap::new());

/// Añade variables de entorno para todos los procesos que se lancen a partir
/// de ahora.
pub fn extend_environ<I>(vars: I)
where
    I: IntoIterator<Item = (String, String)>,
{
    let mut environ = AMBIENT_ENVIRON
        .write()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    environ.extend(vars);
}

fn ambient_environ() -> BTreeMap<String, String> {
    AMBIENT_ENVIRON
        .read()
        .map(|environ| environ.clone())
        .unwrap_or_default()
}

/// Qué hacer con un flujo de salida del subproceso.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamMode {
    /// Capturar la salida en el resultado.
    Capture,
    /// Descartar la salida.
    Hide,
    /// Heredar el flujo del proceso actual.
    None,
}

impl StreamMode {
    fn stdio(mode: Option<StreamMode>) -> Stdio {
        match mode {
            Some(StreamMode::Capture) => Stdio::piped(),
            Some(StreamMode::Hide) => Stdio::null(),
            Some(StreamMode::None) | None => Stdio::inherit(),
        }
    }
}

/// El resultado de un proceso terminado.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ExecResult {
    pub args: Vec<String>,
    pub return_code: i32,
    pub stdout: Option<String>,
    pub stderr: Option<String>,
}

impl ExecResult {
    pub fn new(
        args: Vec<String>,
        return_code: i32,
        stdout: Option<String>,
        stderr: Option<String>,
    ) -> Self {
        Self {
            args,
            return_code,
            stdout,
            stderr,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.return_code == 0
    }

    pub fn failed(&self) -> bool {
        !self.succeeded()
    }

    pub fn args_str(&self) -> String {
        self.args.join(" ")
    }

    pub fn stdout_lines(&self) -> Vec<&str> {
        self.stdout.as_deref().map(|s| s.lines().collect()).unwrap_or_default()
    }

    pub fn stderr_lines(&self) -> Vec<&str> {
        self.stderr.as_deref().map(|s| s.lines().collect()).unwrap_or_default()
    }
}

impl fmt::Display for ExecResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let output = if self.failed() { &self.stderr } else { &self.stdout };
        let output = match output.as_deref() {
            Some(text) if !text.is_empty() => text.strip_suffix('\n').unwrap_or(text),
            _ => "[NO OUTPUT]",
        };
        let status = if self.succeeded() { "SUCCEEDED" } else { "FAILED" };
        write!(
            f,
            "{} ({}): {} -> {}",
            status,
            self.return_code,
            self.args_str(),
            output
        )
    }
}

/// La línea de comando a ejecutar: una lista de argumentos o una cadena
/// para la shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandLine {
    Args(Vec<String>),
    Shell(String),
}

/// Todo lo necesario para lanzar un proceso local.
#[derive(Debug, Clone)]
pub struct LocalCommand {
    pub command: CommandLine,
    pub cd: Option<PathBuf>,
    pub environ: BTreeMap<String, String>,
    pub replace_env: bool,
    pub paths: Vec<PathBuf>,
    /// `None` significa "usar la shell solo si el comando es una cadena".
    pub shell: Option<bool>,
    pub stdout: Option<StreamMode>,
    pub stderr: Option<StreamMode>,
    pub echo: bool,
    pub raise_on_error: bool,
    pub dry_run: bool,
}

impl LocalCommand {
    pub fn new(command: CommandLine) -> Self {
        Self {
            command,
            cd: None,
            environ: BTreeMap::new(),
            replace_env: false,
            paths: Vec::new(),
            shell: None,
            stdout: None,
            stderr: None,
            echo: false,
            raise_on_error: true,
            dry_run: false,
        }
    }

    fn uses_shell(&self) -> bool {
        match self.command {
            CommandLine::Shell(_) => self.shell.unwrap_or(true),
            CommandLine::Args(_) => self.shell.unwrap_or(false),
        }
    }

    /// La línea tal como se muestra al usuario.
    pub fn display_string(&self) -> String {
        match &self.command {
            CommandLine::Shell(line) => line.clone(),
            CommandLine::Args(args) if self.uses_shell() => args.join(" "),
            CommandLine::Args(args) => args
                .iter()
                .map(|a| shell_quote(a))
                .collect::<Vec<_>>()
                .join(" "),
        }
    }

    fn result_args(&self) -> Vec<String> {
        match &self.command {
            CommandLine::Args(args) => args.clone(),
            CommandLine::Shell(line) => line.split_whitespace().map(String::from).collect(),
        }
    }
}

/// Cita un argumento para que la shell lo lea literalmente.
pub fn shell_quote(arg: &str) -> String {
    if arg.is_empty() {
        return "''".to_string();
    }
    let is_safe = arg
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || "@%+=:,./_-".contains(c));
    if is_safe {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r#"'"'"'"#))
    }
}

/// Ejecuta un comando local y espera a que termine.
pub fn run_local(local: &LocalCommand) -> Result<ExecResult, ExecutionError> {
    let display = local.display_string();

    let cd = match &local.cd {
        Some(cd) => Some(path::absolute(cd).map_err(|e| ExecutionError::Spawn(display.clone(), e))?),
        None => None,
    };

    if local.echo {
        match &cd {
            Some(cd) if !local.dry_run => printer::echo(&format!("{}> {}", cd.display(), display)),
            _ if !local.dry_run => printer::echo(&display),
            _ => {}
        }
    }

    if local.dry_run {
        printer::echo(&format!("[DRY RUN] {}", display));
        return Ok(ExecResult::new(local.result_args(), 0, None, None));
    }

    let mut command = if local.uses_shell() {
        // Determina la shell a usar. En Windows, `cmd`.
        let (shell, arg) = if cfg!(target_os = "windows") {
            ("cmd", "/C")
        } else {
            ("sh", "-c")
        };
        let mut command = StdCommand::new(shell);
        command.arg(arg).arg(&display);
        command
    } else {
        let CommandLine::Args(args) = &local.command else {
            unreachable!("las cadenas siempre se ejecutan con la shell");
        };
        let Some((program, rest)) = args.split_first() else {
            return Err(ExecutionError::Spawn(
                display,
                std::io::Error::new(std::io::ErrorKind::InvalidInput, "comando vacío"),
            ));
        };
        let mut command = StdCommand::new(program);
        command.args(rest);
        command
    };

    if let Some(cd) = &cd {
        command.current_dir(cd);
    }

    if local.replace_env {
        command.env_clear();
    } else {
        command.envs(ambient_environ());
    }
    command.envs(&local.environ);

    if !local.paths.is_empty() {
        let mut paths: Vec<PathBuf> = local
            .paths
            .iter()
            .map(|p| path::absolute(p).unwrap_or_else(|_| p.clone()))
            .collect();
        if let Some(current) = env::var_os("PATH") {
            paths.extend(env::split_paths(&current));
        }
        if let Ok(joined) = env::join_paths(paths) {
            command.env("PATH", joined);
        }
    }

    command
        .stdout(StreamMode::stdio(local.stdout))
        .stderr(StreamMode::stdio(local.stderr));

    log::info!("Ejecutando comando: '{}' en {:?}", display, cd);

    // `wait_with_output` vacía stdout y stderr a la vez mientras espera.
    let output = command
        .spawn()
        .and_then(|child| child.wait_with_output())
        .map_err(|e| ExecutionError::Spawn(display.clone(), e))?;

    let captured = |mode: Option<StreamMode>, bytes: &[u8]| match mode {
        Some(StreamMode::Capture) => Some(String::from_utf8_lossy(bytes).into_owned()),
        _ => None,
    };

    let result = ExecResult::new(
        local.result_args(),
        output.status.code().unwrap_or(-1),
        captured(local.stdout, &output.stdout),
        captured(local.stderr, &output.stderr),
    );

    if result.failed() && local.raise_on_error {
        log::warn!("El comando '{}' finalizó con el código {}", display, result.return_code);
        return Err(ExecutionError::Failed(Box::new(result)));
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quoting_leaves_safe_words_alone() {
        assert_eq!(shell_quote("ls"), "ls");
        assert_eq!(shell_quote("--cd=/tmp"), "--cd=/tmp");
        assert_eq!(shell_quote(""), "''");
        assert_eq!(shell_quote("a b"), "'a b'");
        assert_eq!(shell_quote("it's"), r#"'it'"'"'s'"#);
    }

    #[test]
    fn dry_run_does_not_spawn() {
        let mut local = LocalCommand::new(CommandLine::Args(vec![
            "definitely-not-a-real-program".into(),
            "x y".into(),
        ]));
        local.dry_run = true;
        let result = run_local(&local).unwrap();
        assert!(result.succeeded());
        assert_eq!(local.display_string(), "definitely-not-a-real-program 'x y'");
    }

    #[test]
    fn display_of_results() {
        let ok = ExecResult::new(vec!["echo".into(), "hi".into()], 0, Some("hi\n".into()), None);
        assert_eq!(ok.to_string(), "SUCCEEDED (0): echo hi -> hi");
        let failed = ExecResult::new(vec!["false".into()], 1, None, None);
        assert_eq!(failed.to_string(), "FAILED (1): false -> [NO OUTPUT]");
    }

    #[cfg(unix)]
    #[test]
    fn captures_output_and_reports_failures() {
        let mut local = LocalCommand::new(CommandLine::Shell("echo hola; exit 3".into()));
        local.stdout = Some(StreamMode::Capture);
        local.raise_on_error = false;
        let result = run_local(&local).unwrap();
        assert_eq!(result.return_code, 3);
        assert_eq!(result.stdout_lines(), vec!["hola"]);

        local.raise_on_error = true;
        match run_local(&local) {
            Err(ExecutionError::Failed(result)) => assert_eq!(result.return_code, 3),
            other => panic!("se esperaba un fallo, no {:?}", other),
        }
    }
}
