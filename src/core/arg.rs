// src/core/arg.rs

use crate::core::arg_config::{Action, ArgConfig, ArgType, Choices, Container, Nargs, ScalarType};
use crate::core::errors::{RunError, RunResult};
use crate::core::naming::{invert_string, normalize_name};
use crate::core::parameter::{ParamKind, Parameter};
use serde_json::{Map, Number, Value};
use std::collections::HashSet;
use std::fmt;

/// Lo que un argumento acepta en la línea de comandos.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgKind {
    /// Un flag booleano; no lleva valor.
    Flag,
    Value(ScalarType),
    /// Un flag suelto (verdadero) o seguido de un valor.
    FlagOrValue(ScalarType),
}

impl ArgKind {
    pub fn is_flag(&self) -> bool {
        matches!(self, ArgKind::Flag)
    }

    pub fn is_bool_like(&self) -> bool {
        matches!(self, ArgKind::Flag | ArgKind::FlagOrValue(_))
    }

    pub fn scalar_type(&self) -> &ScalarType {
        match self {
            ArgKind::Flag => &ScalarType::Bool,
            ArgKind::Value(t) | ArgKind::FlagOrValue(t) => t,
        }
    }
}

/// Un argumento de línea de comandos resuelto a partir de un parámetro.
#[derive(Debug, Clone, PartialEq)]
pub struct Arg {
    /// Nombre normalizado (`dry-run`).
    pub name: String,
    /// Nombre del parámetro del que sale (`dry_run`).
    pub dest: String,
    pub is_positional: bool,
    pub is_optional: bool,
    pub is_var_positional: bool,
    pub kind: ArgKind,
    pub container: Option<Container>,
    pub default: Option<Value>,
    pub choices: Option<Choices>,
    pub short_option: Option<String>,
    pub long_option: Option<String>,
    pub inverse_short_option: Option<String>,
    pub inverse_long_option: Option<String>,
    pub no_inverse: bool,
    pub options: Vec<String>,
    pub inverse_options: Vec<String>,
    pub all_options: Vec<String>,
    pub takes_value: bool,
    pub action: Action,
    pub nargs: Option<Nargs>,
    pub metavar: Option<String>,
    pub help: Option<String>,
    pub inverse_help: Option<String>,
    pub mutual_exclusion_group: Option<String>,
    pub envvar: Option<String>,
}

impl Arg {
    /// Deriva el argumento de un parámetro y su configuración.
    ///
    /// `used_short` son las opciones cortas ya ocupadas en el comando; las
    /// que se deriven aquí se añaden.
    pub(crate) fn derive(
        param: &Parameter,
        config: &ArgConfig,
        command_name: &str,
        used_short: &mut HashSet<String>,
    ) -> RunResult<Arg> {
        config.validate()?;

        let name = normalize_name(&param.name);
        let is_var_positional = param.kind == ParamKind::VarPositional;
        let declared_positional = !param.has_default() && !is_var_positional;

        let mut default = param.default.clone();
        if let Some(annotated) = &config.default {
            if declared_positional || is_var_positional {
                default = Some(annotated.clone());
            } else {
                return Err(RunError::command(format!(
                    "El argumento opcional `{}` del comando `{}` recibió un valor por defecto \
                     en su configuración; los argumentos opcionales lo toman del parámetro",
                    name, command_name
                )));
            }
        }

        // 1. Posicional u opcional.
        let is_optional = default.is_some() && !is_var_positional;
        let is_positional = config.positional.unwrap_or(declared_positional);

        // 2. Contenedor.
        let container = config.container.or(match &default {
            Some(Value::Array(_)) => Some(Container::List),
            Some(Value::Object(_)) => Some(Container::Dict),
            _ if is_var_positional => Some(Container::Tuple),
            _ => None,
        });

        // 3. Tipo escalar.
        let arg_type = match (&config.arg_type, &config.choices) {
            (Some(arg_type), _) => arg_type.clone(),
            (None, Some(Choices::Enum(e))) => ArgType::Scalar(ScalarType::Enum(e.clone())),
            (None, _) if container.is_some() => {
                let first = match &default {
                    Some(Value::Array(items)) => items.first(),
                    Some(Value::Object(items)) => items.values().next(),
                    _ => None,
                };
                ArgType::Scalar(first.map(ScalarType::of_value).unwrap_or(ScalarType::Str))
            }
            (None, _) => match &default {
                Some(value) if !value.is_null() => ArgType::Scalar(ScalarType::of_value(value)),
                _ => ArgType::Scalar(ScalarType::Str),
            },
        };

        // 4. Flags, "flag o valor" y valores.
        let kind = match arg_type {
            ArgType::Scalar(ScalarType::Bool) => ArgKind::Flag,
            ArgType::BoolOr(inner) => ArgKind::FlagOrValue(inner),
            ArgType::Scalar(scalar) => ArgKind::Value(scalar),
        };

        let metavar = if kind.is_flag() {
            None
        } else {
            let mut metavar = name.to_uppercase().replace('-', "_");
            if container.is_some() && name.chars().count() > 1 && name.ends_with('s') {
                metavar.pop();
            }
            Some(metavar)
        };

        // 5. Opciones de un enumerado.
        let choices = config.choices.clone().or_else(|| match &kind {
            ArgKind::Value(ScalarType::Enum(e)) | ArgKind::FlagOrValue(ScalarType::Enum(e)) => {
                Some(Choices::Enum(e.clone()))
            }
            _ => None,
        });

        // 6. Los posicionales no llevan opciones.
        if is_positional || is_var_positional {
            let explicit: Vec<&str> = [
                &config.short_option,
                &config.long_option,
                &config.inverse_long_option,
            ]
            .into_iter()
            .flatten()
            .map(String::as_str)
            .collect();
            if !explicit.is_empty() {
                return Err(RunError::command(format!(
                    "Los argumentos posicionales no pueden tener opciones: {}",
                    explicit.join(", ")
                )));
            }
            if kind.is_flag() && container.is_none() {
                return Err(RunError::command(format!(
                    "El argumento posicional `{}` del comando `{}` no puede ser un flag",
                    name, command_name
                )));
            }
        }
        if kind.is_flag() && container.is_some() {
            return Err(RunError::command(format!(
                "El flag `{}` del comando `{}` no puede acumular valores en un contenedor",
                name, command_name
            )));
        }

        // 7. Acción.
        let action = config.action.unwrap_or(match (&kind, container) {
            (ArgKind::FlagOrValue(_), Some(_)) => Action::BoolOrContainer,
            (_, Some(_)) => Action::Container,
            (ArgKind::Flag, None) => Action::StoreTrue,
            (ArgKind::FlagOrValue(_), None) => Action::BoolOr,
            (ArgKind::Value(_), None) => Action::Store,
        });

        // 8. Número de valores.
        let nargs = config.nargs.or(if is_positional {
            match container {
                Some(_) => Some(Nargs::OneOrMore),
                None if is_optional => Some(Nargs::Optional),
                None => None,
            }
        } else if is_var_positional {
            Some(Nargs::ZeroOrMore)
        } else if matches!(kind, ArgKind::FlagOrValue(_)) {
            match container {
                Some(_) => Some(Nargs::ZeroOrMore),
                None => Some(Nargs::Optional),
            }
        } else if is_optional && container.is_some() {
            Some(Nargs::ZeroOrMore)
        } else {
            None
        });

        // 9 y 10. Opciones y opciones inversas.
        let mut short_option = config.short_option.clone();
        let mut long_option = config.long_option.clone();
        let mut inverse_short_option = None;
        let mut inverse_long_option = None;
        let has_inverse = kind.is_bool_like() && !config.no_inverse;

        if !(is_positional || is_var_positional) {
            if short_option.is_none() {
                short_option = short_option_for(&name, used_short);
                if let Some(short) = &short_option {
                    used_short.insert(short.clone());
                }
            }
            if long_option.is_none() {
                long_option = Some(format!("--{}", name));
            }
            if has_inverse {
                inverse_short_option = config.inverse_short_option.clone();
                if inverse_short_option.is_none() {
                    inverse_short_option = short_option
                        .as_deref()
                        .and_then(|short| inverse_short_option_for(short, used_short));
                    if let Some(inverse) = &inverse_short_option {
                        used_short.insert(inverse.clone());
                    }
                }
                inverse_long_option = config
                    .inverse_long_option
                    .clone()
                    .or_else(|| long_option.as_deref().map(inverse_long_option_for));
            }
        }

        let options: Vec<String> = [&short_option, &long_option]
            .into_iter()
            .flatten()
            .cloned()
            .collect();
        let inverse_options: Vec<String> = [&inverse_short_option, &inverse_long_option]
            .into_iter()
            .flatten()
            .cloned()
            .collect();
        let mut all_options = options.clone();
        all_options.extend(inverse_options.iter().cloned());

        if is_var_positional && default.is_none() {
            default = Some(Value::Array(Vec::new()));
        }

        let takes_value = is_positional || (!is_var_positional && !kind.is_flag() && !action.is_flag());

        let inverse_help = if has_inverse {
            config
                .inverse_help
                .clone()
                .or_else(|| config.help.as_deref().map(invert_string))
        } else {
            None
        };

        Ok(Arg {
            name,
            dest: param.name.clone(),
            is_positional,
            is_optional,
            is_var_positional,
            kind,
            container,
            default,
            choices,
            short_option,
            long_option,
            inverse_short_option,
            inverse_long_option,
            no_inverse: config.no_inverse,
            options,
            inverse_options,
            all_options,
            takes_value,
            action,
            nargs,
            metavar,
            help: config.help.clone(),
            inverse_help,
            mutual_exclusion_group: config.mutual_exclusion_group.clone(),
            envvar: config.envvar.clone(),
        })
    }

    /// El argumento `-h/--help` que se añade a todos los comandos.
    pub(crate) fn help_arg() -> Arg {
        Arg {
            name: "help".to_string(),
            dest: "help".to_string(),
            is_positional: false,
            is_optional: true,
            is_var_positional: false,
            kind: ArgKind::Flag,
            container: None,
            default: Some(Value::Bool(false)),
            choices: None,
            short_option: Some("-h".to_string()),
            long_option: Some("--help".to_string()),
            inverse_short_option: None,
            inverse_long_option: None,
            no_inverse: true,
            options: vec!["-h".to_string(), "--help".to_string()],
            inverse_options: Vec::new(),
            all_options: vec!["-h".to_string(), "--help".to_string()],
            takes_value: false,
            action: Action::StoreTrue,
            nargs: None,
            metavar: None,
            help: Some("Muestra esta ayuda y termina".to_string()),
            inverse_help: None,
            mutual_exclusion_group: None,
            envvar: None,
        }
    }

    pub fn has_inverse(&self) -> bool {
        !self.inverse_options.is_empty()
    }

    /// La opción con la que se nombra el argumento en los mensajes.
    pub fn display_name(&self) -> String {
        self.long_option
            .clone()
            .or_else(|| self.short_option.clone())
            .or_else(|| self.metavar.clone())
            .unwrap_or_else(|| self.name.clone())
    }

    /// Convierte un valor de la línea de comandos al tipo del argumento.
    ///
    /// La cadena vacía se convierte en `null`.
    /// Convierte un valor de la línea de comandos al tipo del argumento.
    ///
    /// Una cadena vacía en una opción que toma valor es `null`; los
    /// posicionales la conservan.
    pub fn convert_value(&self, raw: &str) -> Result<Value, String> {
        if raw.is_empty() && !self.is_positional && !self.kind.is_flag() {
            return Ok(Value::Null);
        }
        let value = match &self.kind {
            ArgKind::Flag => Value::Bool(
                parse_bool(raw)
                    .ok_or("el valor booleano debe ser 1, true, 0 o false".to_string())?,
            ),
            ArgKind::FlagOrValue(scalar) => match parse_bool(raw) {
                Some(b) => return Ok(Value::Bool(b)),
                None => convert_scalar(scalar, raw)?,
            },
            ArgKind::Value(scalar) => convert_scalar(scalar, raw)?,
        };
        self.check_choice(&value)?;
        Ok(value)
    }

    fn check_choice(&self, value: &Value) -> Result<(), String> {
        match &self.choices {
            Some(choices) if !value.is_null() && !choices.contains(value) => Err(format!(
                "valor inválido '{}' (opciones posibles: {})",
                value.as_str().map(String::from).unwrap_or_else(|| value.to_string()),
                choices.names().join(", ")
            )),
            _ => Ok(()),
        }
    }

    /// Añade los valores de una aparición del argumento a un contenedor.
    ///
    /// Si `existing` no es un contenedor (no hay valor previo o es un
    /// booleano de un argumento "flag o valor") se empieza uno nuevo.
    pub fn add_items(&self, existing: Option<Value>, items: &[String]) -> Result<Value, String> {
        let container = self.container.unwrap_or(Container::List);
        if container.is_mapping() {
            let mut map = match existing {
                Some(Value::Object(map)) => map,
                _ => Map::new(),
            };
            for item in items {
                let Some((key, value)) = item.split_once(':') else {
                    return Err(format!(
                        "Bad format for {}; expected `name:<value>` but got `{}`",
                        self.display_name(),
                        item
                    ));
                };
                map.insert(key.to_string(), self.convert_item(value)?);
            }
            Ok(Value::Object(map))
        } else {
            let mut values = match existing {
                Some(Value::Array(values)) => values,
                _ => Vec::new(),
            };
            for item in items {
                let value = self.convert_item(item)?;
                if container == Container::Set && values.contains(&value) {
                    continue;
                }
                values.push(value);
            }
            Ok(Value::Array(values))
        }
    }

    fn convert_item(&self, raw: &str) -> Result<Value, String> {
        let value = convert_scalar(self.kind.scalar_type(), raw)?;
        self.check_choice(&value)?;
        Ok(value)
    }
}

impl fmt::Display for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.is_positional { "Positional" } else { "Optional" };
        let default = match &self.default {
            Some(value) if !value.is_null() => format!("[={}]", value),
            _ => String::new(),
        };
        let arg_type = match &self.kind {
            ArgKind::Flag => "flag".to_string(),
            ArgKind::FlagOrValue(t) => format!("flag|{}", t),
            ArgKind::Value(t) => t.to_string(),
        };
        write!(f, "{} arg: {}{}: type={}", kind, self.name, default, arg_type)
    }
}

pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw {
        "1" | "true" => Some(true),
        "0" | "false" => Some(false),
        _ => None,
    }
}

fn convert_scalar(scalar: &ScalarType, raw: &str) -> Result<Value, String> {
    match scalar {
        ScalarType::Str | ScalarType::Path => Ok(Value::String(raw.to_string())),
        ScalarType::Int => raw
            .parse::<i64>()
            .map(Value::from)
            .map_err(|_| format!("valor entero inválido: '{}'", raw)),
        ScalarType::Float => raw
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| format!("valor decimal inválido: '{}'", raw)),
        ScalarType::Bool => parse_bool(raw)
            .map(Value::Bool)
            .ok_or_else(|| "el valor booleano debe ser 1, true, 0 o false".to_string()),
        ScalarType::Json => Ok(serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))),
        ScalarType::Enum(e) if e.contains(raw) => Ok(Value::String(raw.to_string())),
        ScalarType::Enum(e) => Err(format!(
            "valor inválido '{}' (opciones posibles: {})",
            raw,
            e.members.join(", ")
        )),
    }
}

/// Primera opción corta libre: la primera letra y luego su mayúscula.
///
/// `help` solo puede usar `-h`; el resto de nombres que empiezan por `h`
/// solo pueden usar `-H`, porque `-h` es de la ayuda.
fn short_option_for(name: &str, used: &HashSet<String>) -> Option<String> {
    let first = name.chars().next()?;
    let upper: String = first.to_uppercase().collect();
    let candidates: Vec<String> = if name == "help" {
        vec![first.to_string()]
    } else if first == 'h' {
        vec![upper]
    } else {
        vec![first.to_string(), upper]
    };
    candidates
        .into_iter()
        .map(|c| format!("-{}", c))
        .find(|option| !used.contains(option))
}

fn inverse_short_option_for(short: &str, used: &HashSet<String>) -> Option<String> {
    let inverse = short.to_uppercase();
    (!used.contains(&inverse)).then_some(inverse)
}

/// La opción larga inversa: `--yes`/`--no`, `--no-x` -> `--x`,
/// `--is-x` -> `--not-x`, `--with-x` -> `--without-x` y si no `--no-x`.
pub fn inverse_long_option_for(long: &str) -> String {
    match long {
        "--yes" => return "--no".to_string(),
        "--no" => return "--yes".to_string(),
        _ => {}
    }
    if let Some(rest) = long.strip_prefix("--no-") {
        format!("--{}", rest)
    } else if let Some(rest) = long.strip_prefix("--is-") {
        format!("--not-{}", rest)
    } else if let Some(rest) = long.strip_prefix("--with-") {
        format!("--without-{}", rest)
    } else {
        format!("--no-{}", long.trim_start_matches("--"))
    }
}
