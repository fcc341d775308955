// src/core/interpolator.rs

use super::config::{Config, ConfigError};
use crate::constants::MAX_INTERPOLATION_PASSES;
use crate::core::command::value_to_string;
use regex::{Captures, Regex};
use serde_json::{Map, Value};
use std::sync::LazyLock;

static TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([\w.-]+)\s*\}\}").expect("expresión regular de interpolación válida")
});

/// Sustituye los tokens `{{ clave.con.puntos }}` por valores del contexto.
pub struct Interpolator<'a> {
    context: &'a Config,
}

impl<'a> Interpolator<'a> {
    pub fn new(context: &'a Config) -> Self {
        Self { context }
    }

    /// Interpola una cadena hasta que no cambie. Una clave que no existe es
    /// un error.
    pub fn interpolate(&self, input: &str) -> Result<String, ConfigError> {
        let mut current = input.to_string();
        for _ in 0..MAX_INTERPOLATION_PASSES {
            if !current.contains("{{") {
                return Ok(current);
            }
            let next = self.interpolate_once(&current)?;
            if next == current {
                return Ok(current);
            }
            current = next;
        }
        Err(ConfigError::Recursion(input.to_string()))
    }

    fn interpolate_once(&self, input: &str) -> Result<String, ConfigError> {
        let mut missing = None;
        let result = TOKEN.replace_all(input, |caps: &Captures| {
            match self.context.get_dotted(&caps[1]) {
                Ok(value) => value_to_string(value),
                Err(e) => {
                    missing.get_or_insert(e);
                    caps[0].to_string()
                }
            }
        });
        match missing {
            Some(error) => Err(error),
            None => Ok(result.into_owned()),
        }
    }

    /// Interpola todas las cadenas de un valor.
    ///
    /// Una cadena interpolada se vuelve a leer como JSON si lo es, así
    /// `"{{ port }}"` da un número si `port` es un número.
    pub fn interpolate_value(&self, value: &Value) -> Result<Value, ConfigError> {
        Ok(match value {
            Value::String(s) if s.contains("{{") => {
                let interpolated = self.interpolate(s)?;
                serde_json::from_str(&interpolated).unwrap_or(Value::String(interpolated))
            }
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .map(|item| self.interpolate_value(item))
                    .collect::<Result<_, _>>()?,
            ),
            Value::Object(map) => Value::Object(self.interpolate_map(map)?),
            other => other.clone(),
        })
    }

    pub fn interpolate_map(&self, map: &Map<String, Value>) -> Result<Map<String, Value>, ConfigError> {
        map.iter()
            .map(|(k, v)| Ok((k.clone(), self.interpolate_value(v)?)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn context() -> Config {
        Config::from(json!({
            "host": "example.com",
            "port": 22,
            "remote": {"user": "deploy", "home": "/home/{{ remote.user }}"},
            "url": "ssh://{{remote.user}}@{{ host }}:{{ port }}",
            "loop": "{{ loop }}x",
        }))
    }

    #[test]
    fn dotted_keys_and_nested_tokens() {
        let config = context();
        let interpolator = Interpolator::new(&config);
        assert_eq!(
            interpolator.interpolate("{{ url }}").unwrap(),
            "ssh://deploy@example.com:22"
        );
        assert_eq!(interpolator.interpolate("{{ remote.home }}").unwrap(), "/home/deploy");
        assert_eq!(interpolator.interpolate("sin tokens").unwrap(), "sin tokens");
    }

    #[test]
    fn interpolated_json_is_parsed() {
        let config = context();
        let interpolator = Interpolator::new(&config);
        assert_eq!(interpolator.interpolate_value(&json!("{{ port }}")).unwrap(), json!(22));
        assert_eq!(
            interpolator
                .interpolate_value(&json!({"a": ["{{ host }}", 1], "b": "123"}))
                .unwrap(),
            json!({"a": ["example.com", 1], "b": "123"})
        );
    }

    #[test]
    fn missing_keys_and_recursion_are_errors() {
        let config = context();
        let interpolator = Interpolator::new(&config);
        assert!(matches!(
            interpolator.interpolate("{{ nope }}"),
            Err(ConfigError::MissingKey(_))
        ));
        assert!(matches!(
            interpolator.interpolate("{{ loop }}"),
            Err(ConfigError::Recursion(_))
        ));
    }
}
