// src/core/parameter.rs

use crate::core::arg_config::ArgConfig;
use serde_json::Value;

/// El tipo de un parámetro declarado, igual que en una firma de función.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    PositionalOnly,
    PositionalOrKeyword,
    KeywordOnly,
    VarPositional,
    VarKeyword,
}

/// La clasificación de un parámetro a efectos de la línea de comandos.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamClass {
    RequiredPositional,
    /// Tiene valor por defecto pero se sigue pasando por posición.
    OptionalPositional,
    VariadicPositional,
    RequiredKeywordOnly,
    OptionalKeyword,
    VariadicKeyword,
}

/// Un parámetro declarado de un comando.
///
/// `default` es `None` cuando el parámetro no tiene valor por defecto y
/// `Some(Value::Null)` cuando su valor por defecto es nulo.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub kind: ParamKind,
    pub default: Option<Value>,
    pub annotation: Option<ArgConfig>,
}

impl Parameter {
    pub fn new(name: impl Into<String>, kind: ParamKind) -> Self {
        Self {
            name: name.into(),
            kind,
            default: None,
            annotation: None,
        }
    }

    /// Un parámetro posicional obligatorio.
    pub fn positional(name: impl Into<String>) -> Self {
        Self::new(name, ParamKind::PositionalOrKeyword)
    }

    /// Un parámetro con valor por defecto; en la línea de comandos es una
    /// opción.
    pub fn optional(name: impl Into<String>, default: impl Into<Value>) -> Self {
        Self::positional(name).with_default(default)
    }

    /// Un parámetro que solo se puede pasar por nombre.
    pub fn keyword_only(name: impl Into<String>) -> Self {
        Self::new(name, ParamKind::KeywordOnly)
    }

    pub fn var_positional(name: impl Into<String>) -> Self {
        Self::new(name, ParamKind::VarPositional)
    }

    pub fn var_keyword(name: impl Into<String>) -> Self {
        Self::new(name, ParamKind::VarKeyword)
    }

    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// Adjunta la configuración explícita del argumento.
    pub fn annotate(mut self, config: impl Into<ArgConfig>) -> Self {
        self.annotation = Some(config.into());
        self
    }

    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }

    pub fn is_positional(&self) -> bool {
        match self.kind {
            ParamKind::PositionalOnly => true,
            ParamKind::PositionalOrKeyword => !self.has_default(),
            _ => false,
        }
    }

    pub fn is_optional(&self) -> bool {
        matches!(
            self.kind,
            ParamKind::PositionalOrKeyword | ParamKind::KeywordOnly
        ) && self.has_default()
    }

    pub fn is_var_positional(&self) -> bool {
        self.kind == ParamKind::VarPositional
    }

    pub fn is_var_keyword(&self) -> bool {
        self.kind == ParamKind::VarKeyword
    }

    pub fn is_required_keyword_only(&self) -> bool {
        self.kind == ParamKind::KeywordOnly && !self.has_default()
    }

    pub fn is_bool(&self) -> bool {
        matches!(self.default, Some(Value::Bool(_)))
    }

    /// Los nombres que empiezan por `_` son privados de la implementación.
    pub fn is_private(&self) -> bool {
        self.name.starts_with('_')
    }

    /// ¿Queda fuera de la línea de comandos?
    pub fn is_excluded(&self) -> bool {
        self.is_private() || self.is_required_keyword_only() || self.is_var_keyword()
    }

    pub fn classification(&self) -> ParamClass {
        match (self.kind, self.has_default()) {
            (ParamKind::PositionalOnly | ParamKind::PositionalOrKeyword, false) => {
                ParamClass::RequiredPositional
            }
            (ParamKind::PositionalOnly | ParamKind::PositionalOrKeyword, true) => {
                ParamClass::OptionalPositional
            }
            (ParamKind::VarPositional, _) => ParamClass::VariadicPositional,
            (ParamKind::KeywordOnly, false) => ParamClass::RequiredKeywordOnly,
            (ParamKind::KeywordOnly, true) => ParamClass::OptionalKeyword,
            (ParamKind::VarKeyword, _) => ParamClass::VariadicKeyword,
        }
    }
}
