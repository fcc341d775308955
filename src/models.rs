// src/models.rs

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::PathBuf;

/// Argumentos por defecto por comando: comando -> parámetro -> valor.
pub type DefaultArgs = IndexMap<String, Map<String, Value>>;

/// Representa la estructura deserializada de un fichero `commands.toml`.
///
/// ```toml
/// extends = "../base.toml"
///
/// [globals]
/// host = "example.com"
///
/// [envs.production]
/// host = "prod.example.com"
/// [envs.production.args.remote]
/// user = "deploy"
///
/// [args.local]
/// echo = true
///
/// [environ]
/// PATH_PREFIX = "/opt/{{ host }}"
/// ```
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    /// Variables globales; también son argumentos por defecto de los
    /// comandos con un parámetro del mismo nombre.
    #[serde(default)]
    pub globals: Map<String, Value>,
    #[serde(default)]
    pub envs: IndexMap<String, EnvConfig>,
    #[serde(default)]
    pub args: DefaultArgs,
    /// Variables de entorno para los procesos lanzados.
    #[serde(default)]
    pub environ: Map<String, Value>,
    /// Fichero base, relativo a este.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extends: Option<PathBuf>,
}

/// Un entorno: globales que se superponen a las comunes y sus propios
/// argumentos por defecto.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
pub struct EnvConfig {
    #[serde(default)]
    pub args: DefaultArgs,
    #[serde(flatten)]
    pub globals: Map<String, Value>,
}
