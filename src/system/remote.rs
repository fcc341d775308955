// src/system/remote.rs

use crate::system::executor::{CommandLine, LocalCommand, StreamMode, shell_quote};
use std::collections::BTreeMap;
use std::io::IsTerminal;

/// Un comando que se ejecuta en otra máquina a través del binario `ssh`.
///
/// ```text
/// ssh -q [-t] [-p <port>] [<user>@]<host> [sudo -H [-u <run_as>]] <shell> -c '
///     [cd <cd> &&]
///     [export K="v" &&]
///     [export PATH="<paths>:$PATH" &&]
///     <cmd>
/// '
/// ```
#[derive(Debug, Clone)]
pub struct RemoteCommand {
    pub command: String,
    pub host: String,
    pub user: Option<String>,
    pub port: Option<u16>,
    pub sudo: bool,
    pub run_as: Option<String>,
    pub shell: String,
    pub cd: Option<String>,
    pub environ: BTreeMap<String, String>,
    pub paths: Vec<String>,
}

impl RemoteCommand {
    pub fn new(command: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            host: host.into(),
            user: None,
            port: None,
            sudo: false,
            run_as: None,
            shell: "/bin/sh".to_string(),
            cd: None,
            environ: BTreeMap::new(),
            paths: Vec::new(),
        }
    }

    fn connection(&self) -> String {
        match &self.user {
            Some(user) => format!("{}@{}", user, self.host),
            None => self.host.clone(),
        }
    }

    /// El script que ejecuta la shell remota.
    fn inner_command(&self) -> String {
        let mut steps = Vec::new();
        if let Some(cd) = &self.cd {
            steps.push(format!("cd {}", cd));
        }
        for (name, value) in &self.environ {
            steps.push(format!("export {}=\"{}\"", name, value));
        }
        if !self.paths.is_empty() {
            steps.push(format!("export PATH=\"{}:$PATH\"", self.paths.join(":")));
        }
        steps.push(self.command.clone());
        format!("\n    {}\n", steps.join(" &&\n    "))
    }

    /// La línea que se pasa a `ssh` para ejecutar en el host.
    pub fn remote_command(&self) -> String {
        let mut parts: Vec<String> = Vec::new();
        if self.sudo {
            parts.extend(["sudo".into(), "-H".into()]);
        } else if let Some(user) = &self.run_as {
            parts.extend(["sudo".into(), "-H".into(), "-u".into(), user.clone()]);
        }
        parts.push(self.shell.clone());
        parts.push("-c".into());
        parts.push(shell_quote(&self.inner_command()));
        parts.join(" ")
    }

    /// Los argumentos completos de `ssh`. `tty` pide una terminal remota.
    pub fn ssh_args(&self, tty: bool) -> Vec<String> {
        let mut args = vec!["ssh".to_string(), "-q".to_string()];
        if tty {
            args.push("-t".into());
        }
        if let Some(port) = self.port {
            args.extend(["-p".into(), port.to_string()]);
        }
        args.push(self.connection());
        args.push(self.remote_command());
        args
    }

    /// El comando local que lanza `ssh`. Pide terminal si stdin lo es.
    pub fn to_local(
        &self,
        stdout: Option<StreamMode>,
        stderr: Option<StreamMode>,
        echo: bool,
        raise_on_error: bool,
        dry_run: bool,
    ) -> LocalCommand {
        let tty = std::io::stdin().is_terminal();
        let mut local = LocalCommand::new(CommandLine::Args(self.ssh_args(tty)));
        local.stdout = stdout;
        local.stderr = stderr;
        local.echo = echo;
        local.raise_on_error = raise_on_error;
        local.dry_run = dry_run;
        local
    }
}
