// src/core/config.rs

use crate::constants::{APP_DIR, CONFIG_FILENAME};
use crate::core::interpolator::Interpolator;
use crate::models::ConfigFile;
use serde_json::{Map, Value};
use std::fs;
use std::path::{self, Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("No se pudo leer el fichero de configuración {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Error al parsear el fichero de configuración {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("La clave `{0}` no existe en la configuración")]
    MissingKey(String),
    #[error("`{0}` no es una tabla de la configuración")]
    NotAMapping(String),
    #[error("Entorno desconocido: {0}")]
    UnknownEnv(String),
    #[error("Comando desconocido en la sección de argumentos del fichero de configuración: {0}")]
    UnknownCommand(String),
    #[error(
        "Argumento desconocido del comando {command} en la sección de argumentos del fichero de configuración: {arg}"
    )]
    UnknownArg { command: String, arg: String },
    #[error("Interpolación recursiva en `{0}`")]
    Recursion(String),
    #[error("Configuración inválida: {0}")]
    Invalid(String),
}

/// Fusiona `other` sobre `base`. Las tablas se fusionan recursivamente; el
/// resto de valores de `other` reemplazan a los de `base`.
pub fn merge_dicts(base: &mut Map<String, Value>, other: Map<String, Value>) {
    for (key, value) in other {
        match value {
            Value::Object(incoming) => match base.get_mut(&key) {
                Some(Value::Object(existing)) => merge_dicts(existing, incoming),
                _ => {
                    base.insert(key, Value::Object(incoming));
                }
            },
            value => {
                base.insert(key, value);
            }
        }
    }
}

/// Una configuración anidada con acceso por claves con puntos
/// (`remote.user`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config(Map<String, Value>);

impl From<Map<String, Value>> for Config {
    fn from(map: Map<String, Value>) -> Self {
        Config(map)
    }
}

impl From<Value> for Config {
    /// Cualquier cosa que no sea una tabla da una configuración vacía.
    fn from(value: Value) -> Self {
        match value {
            Value::Object(map) => Config(map),
            _ => Config::default(),
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }

    pub fn get_dotted(&self, name: &str) -> Result<&Value, ConfigError> {
        let mut segments = name.split('.');
        let first = segments.next().unwrap_or_default();
        let mut current = self
            .0
            .get(first)
            .ok_or_else(|| ConfigError::MissingKey(name.to_string()))?;
        let mut path = first.to_string();
        for segment in segments {
            let Value::Object(map) = current else {
                return Err(ConfigError::NotAMapping(path));
            };
            current = map
                .get(segment)
                .ok_or_else(|| ConfigError::MissingKey(name.to_string()))?;
            path.push('.');
            path.push_str(segment);
        }
        Ok(current)
    }

    /// Asigna un valor creando las tablas intermedias que falten.
    pub fn set_dotted(&mut self, name: &str, value: Value) -> Result<(), ConfigError> {
        let segments: Vec<&str> = name.split('.').collect();
        let Some((last, parents)) = segments.split_last() else {
            return Err(ConfigError::MissingKey(name.to_string()));
        };
        let mut current = &mut self.0;
        let mut path = String::new();
        for segment in parents {
            if !path.is_empty() {
                path.push('.');
            }
            path.push_str(segment);
            let entry = current
                .entry(segment.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            current = match entry {
                Value::Object(map) => map,
                _ => return Err(ConfigError::NotAMapping(path)),
            };
        }
        current.insert(last.to_string(), value);
        Ok(())
    }

    pub fn merge(&mut self, other: Map<String, Value>) {
        merge_dicts(&mut self.0, other);
    }

    /// Interpola los tokens `{{ clave }}` de `value` contra esta
    /// configuración.
    pub fn interpolate(&self, value: &Value) -> Result<Value, ConfigError> {
        Interpolator::new(self).interpolate_value(value)
    }
}

impl ConfigFile {
    /// Este fichero sobre `base`: las tablas se fusionan y lo de este fichero
    /// tiene prioridad.
    pub fn merged_over(self, base: ConfigFile) -> Result<ConfigFile, ConfigError> {
        let to_map = |file: &ConfigFile| match serde_json::to_value(file) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Ok(Map::new()),
            Err(e) => Err(ConfigError::Invalid(e.to_string())),
        };
        let mut merged = to_map(&base)?;
        merge_dicts(&mut merged, to_map(&self)?);
        merged.remove("extends");
        serde_json::from_value(Value::Object(merged)).map_err(|e| ConfigError::Invalid(e.to_string()))
    }
}

/// Lee un fichero de configuración y, si extiende otro, lo fusiona sobre él.
pub fn load_config_file(path: &Path) -> Result<ConfigFile, ConfigError> {
    load_with_ancestors(path, &mut Vec::new())
}

fn load_with_ancestors(path: &Path, seen: &mut Vec<PathBuf>) -> Result<ConfigFile, ConfigError> {
    let path = path::absolute(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    if seen.contains(&path) {
        return Err(ConfigError::Recursion(path.display().to_string()));
    }
    seen.push(path.clone());

    log::debug!("Leyendo el fichero de configuración {:?}", path);
    let content = fs::read_to_string(&path).map_err(|source| ConfigError::Io {
        path: path.clone(),
        source,
    })?;
    let mut file: ConfigFile = toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.clone(),
        source,
    })?;

    if let Some(extends) = file.extends.take() {
        let base_path = match path.parent() {
            Some(dir) => dir.join(extends),
            None => extends,
        };
        let base = load_with_ancestors(&base_path, seen)?;
        file = file.merged_over(base)?;
    }

    Ok(file)
}

/// El fichero de configuración del usuario, si el sistema tiene directorio
/// de configuración.
pub fn user_config_file() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILENAME))
}

/// El fichero indicado o, si no, `commands.toml` en el directorio actual si
/// existe.
pub fn find_config_file(explicit: Option<&Path>) -> Option<PathBuf> {
    match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => {
            let local = PathBuf::from(CONFIG_FILENAME);
            local.is_file().then_some(local)
        }
    }
}

/// Carga el fichero del usuario (si existe) y encima el del proyecto.
pub fn load_layered(
    user_file: Option<&Path>,
    project_file: Option<&Path>,
) -> Result<Option<ConfigFile>, ConfigError> {
    let mut merged = match user_file.filter(|path| path.is_file()) {
        Some(path) => Some(load_config_file(path)?),
        None => None,
    };
    if let Some(path) = project_file {
        let file = load_config_file(path)?;
        merged = Some(match merged {
            Some(base) => file.merged_over(base)?,
            None => file,
        });
    }
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn dotted_access() {
        let mut config = Config::from(json!({"remote": {"host": "h"}, "port": 1}));
        assert_eq!(config.get_dotted("remote.host").unwrap(), &json!("h"));
        assert!(matches!(
            config.get_dotted("remote.user"),
            Err(ConfigError::MissingKey(_))
        ));
        assert!(matches!(
            config.get_dotted("port.x"),
            Err(ConfigError::NotAMapping(key)) if key == "port"
        ));

        config.set_dotted("a.b.c", json!(true)).unwrap();
        assert_eq!(config.get_dotted("a.b.c").unwrap(), &json!(true));
        assert!(config.set_dotted("port.x", json!(1)).is_err());
    }

    #[test]
    fn merging_is_recursive() {
        let mut config = Config::from(json!({"a": {"x": 1, "y": 2}, "b": 1}));
        config.merge(
            json!({"a": {"y": 3}, "b": {"z": 1}})
                .as_object()
                .cloned()
                .unwrap(),
        );
        assert_eq!(
            config.into_map(),
            json!({"a": {"x": 1, "y": 3}, "b": {"z": 1}})
                .as_object()
                .cloned()
                .unwrap()
        );
    }

    #[test]
    fn files_extend_relative_to_themselves() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("base")).unwrap();
        write(
            &dir,
            "base/common.toml",
            "[globals]\nhost = \"base\"\nport = 22\n\n[args.local]\necho = true\n",
        );
        let path = write(
            &dir,
            "commands.toml",
            "extends = \"base/common.toml\"\n\n[globals]\nhost = \"override\"\n\n\
             [envs.prod]\nhost = \"prod\"\n[envs.prod.args.remote]\nuser = \"deploy\"\n",
        );

        let file = load_config_file(&path).unwrap();
        assert_eq!(file.globals.get("host"), Some(&json!("override")));
        assert_eq!(file.globals.get("port"), Some(&json!(22)));
        assert_eq!(file.args["local"].get("echo"), Some(&json!(true)));
        let prod = &file.envs["prod"];
        assert_eq!(prod.globals.get("host"), Some(&json!("prod")));
        assert_eq!(prod.args["remote"].get("user"), Some(&json!("deploy")));
        assert_eq!(file.extends, None);
    }

    #[test]
    fn unknown_sections_are_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "commands.toml", "[commands]\nx = 1\n");
        assert!(matches!(
            load_config_file(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn circular_extends_are_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "a.toml", "extends = \"a.toml\"\n");
        assert!(matches!(
            load_config_file(&path),
            Err(ConfigError::Recursion(_))
        ));
    }

    #[test]
    fn project_file_layers_over_user_file() {
        let dir = TempDir::new().unwrap();
        let user = write(&dir, "user.toml", "[globals]\na = 1\nb = 1\n");
        let project = write(&dir, "project.toml", "[globals]\nb = 2\n");
        let file = load_layered(Some(user.as_path()), Some(project.as_path())).unwrap().unwrap();
        assert_eq!(file.globals, json!({"a": 1, "b": 2}).as_object().cloned().unwrap());

        let missing_user = dir.path().join("missing.toml");
        assert!(load_layered(Some(missing_user.as_path()), None).unwrap().is_none());
        assert!(load_layered(None, Some(missing_user.as_path())).is_err());
    }
}
