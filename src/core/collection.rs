// src/core/collection.rs

use crate::core::command::Command;
use crate::core::errors::{RunError, RunResult};
use crate::core::naming::normalize_name;
use indexmap::IndexMap;

/// Los comandos disponibles, en el orden en que se registraron.
#[derive(Debug, Clone, Default)]
pub struct Collection {
    commands: IndexMap<String, Command>,
}

impl Collection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registra un comando. Dos comandos con el mismo nombre son un error de
    /// declaración.
    pub fn add(&mut self, command: Command) -> RunResult<()> {
        let name = command.name().to_string();
        if self.commands.contains_key(&name) {
            return Err(RunError::command(format!(
                "Ya hay un comando llamado `{}`",
                name
            )));
        }
        self.commands.insert(name, command);
        Ok(())
    }

    pub fn with(mut self, command: Command) -> RunResult<Self> {
        self.add(command)?;
        Ok(self)
    }

    fn key_for(&self, name: &str) -> Option<String> {
        if self.commands.contains_key(name) {
            return Some(name.to_string());
        }
        let normalized = normalize_name(name);
        self.commands.contains_key(&normalized).then_some(normalized)
    }

    /// Busca por nombre exacto y, si no, por nombre normalizado.
    pub fn get(&self, name: &str) -> Option<&Command> {
        self.commands
            .get(name)
            .or_else(|| self.commands.get(&normalize_name(name)))
    }

    /// Solo por nombre exacto; es la búsqueda que separa las ejecuciones.
    pub fn get_exact(&self, name: &str) -> Option<&Command> {
        self.commands.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Command> {
        let key = self.key_for(name)?;
        self.commands.get_mut(&key)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.commands.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Command> {
        self.commands.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Command> {
        self.commands.values_mut()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn set_debug(&mut self, debug: bool) {
        for command in self.commands.values_mut() {
            command.set_debug(debug);
        }
    }
}

impl<'a> IntoIterator for &'a Collection {
    type Item = &'a Command;
    type IntoIter = indexmap::map::Values<'a, String, Command>;

    fn into_iter(self) -> Self::IntoIter {
        self.commands.values()
    }
}
