// src/constants.rs

/// La versión del programa, tal como se muestra con `--info`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// El nombre con el que se presenta el programa.
pub const PROGRAM_NAME: &str = "RunCommands";

/// El nombre del comando que ejecuta los demás comandos.
pub const RUN_COMMAND_NAME: &str = "runcommands";

/// El fichero de configuración que se busca en el directorio actual.
pub const CONFIG_FILENAME: &str = "commands.toml";

/// El directorio de la configuración del usuario (dentro de su directorio
/// de configuración del sistema).
pub const APP_DIR: &str = "runcommands";

/// Límite de pasadas al interpolar una cadena.
pub const MAX_INTERPOLATION_PASSES: usize = 32;
