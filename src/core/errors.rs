// src/core/errors.rs

use crate::core::config::ConfigError;
use crate::system::executor::{ExecResult, ExecutionError};
use crate::system::printer;
use thiserror::Error;

/// Código de salida que `clap` usa para los errores de uso.
pub const USAGE_EXIT_CODE: i32 = 2;

/// El error común de todo el ciclo de vida de un comando: declaración,
/// parseo, particionado y ejecución.
#[derive(Error, Debug)]
pub enum RunError {
    /// Error en la declaración de un comando. Es un fallo del autor del
    /// comando y nunca debe capturarse.
    #[error("{0}")]
    Command(String),
    /// Error de parseo (opción desconocida, valor inválido, etc.).
    #[error("{message}")]
    Usage { message: String, code: i32 },
    #[error("Comando desconocido: {0}")]
    UnknownCommand(String),
    #[error("{0}")]
    Runner(String),
    /// El proceso ejecutado terminó con un código distinto de cero.
    #[error("{0}")]
    Failed(Box<ExecResult>),
    /// Abortado por el usuario (Ctrl-C, confirmación rechazada...).
    #[error("{message}")]
    Aborted { return_code: i32, message: String },
    /// Invariante interna violada; nunca debería ocurrir.
    #[error("Error interno: {0}")]
    Internal(String),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Error de Ficheros: {0}")]
    Io(#[from] std::io::Error),
}

pub type RunResult<T> = Result<T, RunError>;

impl RunError {
    pub fn command(message: impl Into<String>) -> Self {
        RunError::Command(message.into())
    }

    pub fn usage(message: impl Into<String>) -> Self {
        RunError::Usage {
            message: message.into(),
            code: USAGE_EXIT_CODE,
        }
    }

    pub fn aborted(return_code: i32, message: impl Into<String>) -> Self {
        RunError::Aborted {
            return_code,
            message: message.into(),
        }
    }

    /// El código de salida del proceso asociado a este error.
    pub fn return_code(&self) -> i32 {
        match self {
            RunError::Usage { code, .. } => *code,
            RunError::Failed(result) => match result.return_code {
                0 => 1,
                code => code,
            },
            RunError::Aborted { return_code, .. } => *return_code,
            _ => 1,
        }
    }

    pub fn is_abort(&self) -> bool {
        matches!(self, RunError::Aborted { .. })
    }

    /// Muestra el error al usuario y devuelve el código de salida.
    ///
    /// Con código cero (un abort voluntario) el mensaje va a la salida
    /// estándar; si no, a la de errores.
    pub fn report(&self) -> i32 {
        let code = self.return_code();
        let message = self.to_string();
        if !message.is_empty() {
            if code == 0 {
                printer::print(&message);
            } else {
                printer::error(&message);
            }
        }
        code
    }
}

impl From<clap::Error> for RunError {
    fn from(error: clap::Error) -> Self {
        RunError::Usage {
            message: error.render().to_string().trim_end().to_string(),
            code: error.exit_code(),
        }
    }
}

impl From<ExecutionError> for RunError {
    fn from(error: ExecutionError) -> Self {
        match error {
            ExecutionError::Failed(result) => RunError::Failed(result),
            ExecutionError::Spawn(command_line, source) => RunError::Runner(format!(
                "El comando '{}' no se pudo ejecutar: {}",
                command_line, source
            )),
        }
    }
}
