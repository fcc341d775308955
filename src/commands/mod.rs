// src/commands/mod.rs

pub mod complete;
pub mod local;
pub mod remote;

use crate::core::collection::Collection;
use crate::core::errors::RunResult;

/// Los comandos que trae el programa.
///
/// `complete` completa sobre el resto de la colección.
pub fn builtin_collection() -> RunResult<Collection> {
    let collection = Collection::new()
        .with(local::command()?)?
        .with(remote::command()?)?;
    let complete = complete::command(collection.clone())?;
    collection.with(complete)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_commands() {
        let collection = builtin_collection().unwrap();
        assert_eq!(
            collection.names().collect::<Vec<_>>(),
            vec!["local", "remote", "complete"]
        );
    }
}
