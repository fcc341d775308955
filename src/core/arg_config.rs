// src/core/arg_config.rs

use crate::core::errors::{RunError, RunResult};
use clap::ValueEnum;
use regex::Regex;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::LazyLock;

static SHORT_OPTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-[^-\s]$").expect("regex de opción corta válida"));

static LONG_OPTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^--\w+(-\w+)*$").expect("regex de opción larga válida"));

pub fn is_short_option(option: &str) -> bool {
    SHORT_OPTION_RE.is_match(option)
}

pub fn is_long_option(option: &str) -> bool {
    LONG_OPTION_RE.is_match(option)
}

/// Un tipo enumerado: un nombre y sus miembros, en orden.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumType {
    pub name: String,
    pub members: Vec<String>,
}

impl EnumType {
    pub fn new<I, S>(name: impl Into<String>, members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            members: members.into_iter().map(Into::into).collect(),
        }
    }

    /// Construye el tipo a partir de un `ValueEnum` de clap.
    pub fn of<E: ValueEnum>(name: impl Into<String>) -> Self {
        let members = E::value_variants()
            .iter()
            .filter_map(|variant| variant.to_possible_value())
            .map(|value| value.get_name().to_string());
        Self::new(name, members)
    }

    pub fn contains(&self, member: &str) -> bool {
        self.members.iter().any(|m| m == member)
    }
}

/// El tipo escalar al que se convierten los valores de la línea de comandos.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScalarType {
    Str,
    Int,
    Float,
    Bool,
    /// JSON si el texto lo es; si no, el texto tal cual.
    Json,
    Path,
    Enum(EnumType),
}

impl ScalarType {
    /// El tipo de un valor por defecto.
    pub fn of_value(value: &Value) -> ScalarType {
        match value {
            Value::Bool(_) => ScalarType::Bool,
            Value::Number(n) if n.is_f64() => ScalarType::Float,
            Value::Number(_) => ScalarType::Int,
            Value::Array(_) | Value::Object(_) => ScalarType::Json,
            Value::String(_) | Value::Null => ScalarType::Str,
        }
    }

    fn from_name(name: &str) -> Option<ScalarType> {
        match name {
            "str" | "string" => Some(ScalarType::Str),
            "int" | "integer" => Some(ScalarType::Int),
            "float" => Some(ScalarType::Float),
            "bool" => Some(ScalarType::Bool),
            "json" => Some(ScalarType::Json),
            "path" => Some(ScalarType::Path),
            _ => None,
        }
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarType::Str => write!(f, "str"),
            ScalarType::Int => write!(f, "int"),
            ScalarType::Float => write!(f, "float"),
            ScalarType::Bool => write!(f, "bool"),
            ScalarType::Json => write!(f, "json"),
            ScalarType::Path => write!(f, "path"),
            ScalarType::Enum(e) => write!(f, "{}", e.name),
        }
    }
}

/// El tipo declarado de un argumento: un escalar o "flag o valor".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgType {
    Scalar(ScalarType),
    /// Un flag suelto (verdadero) o una opción seguida de un valor.
    BoolOr(ScalarType),
}

impl ArgType {
    pub fn bool_or(inner: ScalarType) -> Self {
        ArgType::BoolOr(inner)
    }

    /// Interpreta nombres como `int`, `bool_or` o `bool_or(int)`.
    pub fn from_name(name: &str) -> Option<ArgType> {
        let name = name.trim();
        if name == "bool_or" {
            return Some(ArgType::BoolOr(ScalarType::Str));
        }
        if let Some(inner) = name
            .strip_prefix("bool_or(")
            .and_then(|rest| rest.strip_suffix(')'))
        {
            return ScalarType::from_name(inner.trim()).map(ArgType::BoolOr);
        }
        ScalarType::from_name(name).map(ArgType::Scalar)
    }
}

impl From<ScalarType> for ArgType {
    fn from(scalar: ScalarType) -> Self {
        ArgType::Scalar(scalar)
    }
}

/// El contenedor en el que se acumulan los valores de un argumento.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Container {
    List,
    Tuple,
    Set,
    Dict,
}

impl Container {
    fn from_name(name: &str) -> Option<Container> {
        match name {
            "list" => Some(Container::List),
            "tuple" => Some(Container::Tuple),
            "set" => Some(Container::Set),
            "dict" => Some(Container::Dict),
            _ => None,
        }
    }

    pub fn is_mapping(self) -> bool {
        self == Container::Dict
    }
}

/// Los valores permitidos para un argumento.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Choices {
    Values(Vec<Value>),
    Enum(EnumType),
}

impl Choices {
    pub fn values<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Choices::Values(values.into_iter().map(Into::into).collect())
    }

    pub fn contains(&self, value: &Value) -> bool {
        match self {
            Choices::Values(values) => values.contains(value),
            Choices::Enum(e) => value.as_str().is_some_and(|s| e.contains(s)),
        }
    }

    /// Las opciones como texto, para la ayuda y el autocompletado.
    pub fn names(&self) -> Vec<String> {
        match self {
            Choices::Values(values) => values
                .iter()
                .map(|v| match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect(),
            Choices::Enum(e) => e.members.clone(),
        }
    }

    pub fn push(&mut self, value: impl Into<String>) {
        match self {
            Choices::Values(values) => values.push(Value::String(value.into())),
            Choices::Enum(e) => e.members.push(value.into()),
        }
    }
}

/// Cuántos valores consume un argumento.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Nargs {
    Exactly(usize),
    /// `?`
    Optional,
    /// `*`
    ZeroOrMore,
    /// `+`
    OneOrMore,
}

impl Nargs {
    fn from_value(value: &Value) -> Option<Nargs> {
        match value {
            Value::Number(n) => n.as_u64().map(|n| Nargs::Exactly(n as usize)),
            Value::String(s) => match s.as_str() {
                "?" => Some(Nargs::Optional),
                "*" => Some(Nargs::ZeroOrMore),
                "+" => Some(Nargs::OneOrMore),
                other => other.parse().ok().map(Nargs::Exactly),
            },
            _ => None,
        }
    }
}

/// Qué se hace con los valores de un argumento al parsearlo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Store,
    StoreTrue,
    StoreFalse,
    /// Añade o fusiona los valores en el contenedor.
    Container,
    /// Guarda el valor, o verdadero si no se pasó ninguno.
    BoolOr,
    /// Acumula en el contenedor; una aparición sin valores da verdadero.
    BoolOrContainer,
    Count,
}

impl Action {
    fn from_name(name: &str) -> Option<Action> {
        match name {
            "store" => Some(Action::Store),
            "store_true" => Some(Action::StoreTrue),
            "store_false" => Some(Action::StoreFalse),
            "append" | "container" => Some(Action::Container),
            "count" => Some(Action::Count),
            _ => None,
        }
    }

    /// ¿La acción no consume valores?
    pub fn is_flag(self) -> bool {
        matches!(self, Action::StoreTrue | Action::StoreFalse | Action::Count)
    }
}

/// Configuración explícita de un argumento.
///
/// Se adjunta a un parámetro para cambiar lo que se deduciría de su nombre
/// y su valor por defecto. Los setters no validan; la validación se hace al
/// construir el comando (ver [`ArgConfig::validate`]).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArgConfig {
    pub short_option: Option<String>,
    pub long_option: Option<String>,
    pub inverse_short_option: Option<String>,
    pub inverse_long_option: Option<String>,
    pub no_inverse: bool,
    pub arg_type: Option<ArgType>,
    pub choices: Option<Choices>,
    pub container: Option<Container>,
    pub help: Option<String>,
    pub inverse_help: Option<String>,
    pub nargs: Option<Nargs>,
    pub mutual_exclusion_group: Option<String>,
    pub envvar: Option<String>,
    pub action: Option<Action>,
    pub positional: Option<bool>,
    /// Solo para argumentos posicionales.
    pub default: Option<Value>,
}

impl ArgConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn short_option(mut self, option: impl Into<String>) -> Self {
        self.short_option = Some(option.into());
        self
    }

    pub fn long_option(mut self, option: impl Into<String>) -> Self {
        self.long_option = Some(option.into());
        self
    }

    pub fn inverse_short_option(mut self, option: impl Into<String>) -> Self {
        self.inverse_short_option = Some(option.into());
        self
    }

    pub fn inverse_long_option(mut self, option: impl Into<String>) -> Self {
        self.inverse_long_option = Some(option.into());
        self
    }

    pub fn no_inverse(mut self) -> Self {
        self.no_inverse = true;
        self
    }

    pub fn arg_type(mut self, arg_type: impl Into<ArgType>) -> Self {
        self.arg_type = Some(arg_type.into());
        self
    }

    pub fn choices(mut self, choices: Choices) -> Self {
        self.choices = Some(choices);
        self
    }

    pub fn container(mut self, container: Container) -> Self {
        self.container = Some(container);
        self
    }

    pub fn help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    pub fn inverse_help(mut self, help: impl Into<String>) -> Self {
        self.inverse_help = Some(help.into());
        self
    }

    pub fn nargs(mut self, nargs: Nargs) -> Self {
        self.nargs = Some(nargs);
        self
    }

    pub fn mutual_exclusion_group(mut self, group: impl Into<String>) -> Self {
        self.mutual_exclusion_group = Some(group.into());
        self
    }

    pub fn envvar(mut self, name: impl Into<String>) -> Self {
        self.envvar = Some(name.into());
        self
    }

    pub fn action(mut self, action: Action) -> Self {
        self.action = Some(action);
        self
    }

    pub fn positional(mut self, positional: bool) -> Self {
        self.positional = Some(positional);
        self
    }

    pub fn default_value(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// Comprueba el formato de las opciones explícitas.
    pub fn validate(&self) -> RunResult<()> {
        let shorts = [&self.short_option, &self.inverse_short_option];
        for option in shorts.into_iter().flatten() {
            if !is_short_option(option) {
                return Err(RunError::command(format!(
                    "Se esperaba una opción corta con la forma -x, no \"{}\"",
                    option
                )));
            }
        }
        let longs = [&self.long_option, &self.inverse_long_option];
        for option in longs.into_iter().flatten() {
            if !is_long_option(option) {
                return Err(RunError::command(format!(
                    "Se esperaba una opción larga con la forma --option, no \"{}\"",
                    option
                )));
            }
        }
        Ok(())
    }
}

impl From<ArgType> for ArgConfig {
    fn from(arg_type: ArgType) -> Self {
        ArgConfig::new().arg_type(arg_type)
    }
}

impl From<ScalarType> for ArgConfig {
    fn from(scalar: ScalarType) -> Self {
        ArgConfig::new().arg_type(scalar)
    }
}

impl From<&str> for ArgConfig {
    fn from(help: &str) -> Self {
        ArgConfig::new().help(help)
    }
}

fn mistyped(key: &str, expected: &str) -> RunError {
    RunError::command(format!(
        "Valor inválido para `{}` en la configuración del argumento: se esperaba {}",
        key, expected
    ))
}

fn expect_str<'a>(key: &str, value: &'a Value) -> RunResult<&'a str> {
    value.as_str().ok_or_else(|| mistyped(key, "una cadena"))
}

fn expect_bool(key: &str, value: &Value) -> RunResult<bool> {
    value.as_bool().ok_or_else(|| mistyped(key, "un booleano"))
}

impl TryFrom<&Map<String, Value>> for ArgConfig {
    type Error = RunError;

    /// Convierte un mapa plano (`{"short_option": "-x", "type": "int"}`) en
    /// una configuración validada.
    fn try_from(map: &Map<String, Value>) -> RunResult<Self> {
        let mut config = ArgConfig::new();
        for (key, value) in map {
            let key = key.as_str();
            match key {
                "short_option" => config.short_option = Some(expect_str(key, value)?.into()),
                "long_option" => config.long_option = Some(expect_str(key, value)?.into()),
                "inverse_short_option" => {
                    config.inverse_short_option = Some(expect_str(key, value)?.into())
                }
                "inverse_long_option" | "inverse_option" => {
                    config.inverse_long_option = Some(expect_str(key, value)?.into())
                }
                "no_inverse" => config.no_inverse = expect_bool(key, value)?,
                "type" => {
                    let name = expect_str(key, value)?;
                    let arg_type = ArgType::from_name(name)
                        .ok_or_else(|| mistyped(key, "un tipo conocido"))?;
                    config.arg_type = Some(arg_type);
                }
                "container" => {
                    let name = expect_str(key, value)?;
                    let container = Container::from_name(name)
                        .ok_or_else(|| mistyped(key, "list, tuple, set o dict"))?;
                    config.container = Some(container);
                }
                "choices" => {
                    let values = value.as_array().ok_or_else(|| mistyped(key, "una lista"))?;
                    config.choices = Some(Choices::Values(values.clone()));
                }
                "help" => config.help = Some(expect_str(key, value)?.into()),
                "inverse_help" => config.inverse_help = Some(expect_str(key, value)?.into()),
                "nargs" => {
                    let nargs = Nargs::from_value(value)
                        .ok_or_else(|| mistyped(key, "un número, ?, * o +"))?;
                    config.nargs = Some(nargs);
                }
                "mutual_exclusion_group" => {
                    config.mutual_exclusion_group = Some(expect_str(key, value)?.into())
                }
                "envvar" => config.envvar = Some(expect_str(key, value)?.into()),
                "action" => {
                    let name = expect_str(key, value)?;
                    let action =
                        Action::from_name(name).ok_or_else(|| mistyped(key, "una acción"))?;
                    config.action = Some(action);
                }
                "positional" => config.positional = Some(expect_bool(key, value)?),
                "default" => config.default = Some(value.clone()),
                unknown => {
                    return Err(RunError::command(format!(
                        "Clave desconocida en la configuración del argumento: {}",
                        unknown
                    )));
                }
            }
        }
        config.validate()?;
        Ok(config)
    }
}
