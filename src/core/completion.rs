// src/core/completion.rs

use crate::core::collection::Collection;
use crate::core::command::Command;

/// El último comando nombrado antes de la palabra actual.
fn find_command<'a>(collection: &'a Collection, tokens: &[String]) -> Option<&'a Command> {
    tokens.iter().rev().find_map(|token| collection.get(token))
}

fn long_options(command: &Command) -> Vec<String> {
    command
        .args()
        .values()
        .flat_map(|arg| arg.all_options.iter())
        .filter(|option| option.starts_with("--"))
        .cloned()
        .collect()
}

/// Candidatos para completar `current_token` tras `tokens`.
///
/// Si la palabra empieza por `-` se ofrecen las opciones largas del comando
/// actual. Si la palabra anterior es una opción que espera valor se ofrecen
/// sus opciones, o nada para que la shell complete ficheros. Si no, las
/// opciones del comando y los nombres de los comandos.
pub fn complete(collection: &Collection, tokens: &[String], current_token: &str) -> Vec<String> {
    let command = find_command(collection, tokens);
    log::debug!(
        "Completando `{}` con comando {:?}",
        current_token,
        command.map(Command::name)
    );

    let mut candidates = Vec::new();
    if current_token.starts_with('-') {
        candidates.extend(command.map(long_options).unwrap_or_default());
    } else {
        let expecting = command.zip(tokens.last()).and_then(|(command, previous)| {
            command
                .parse_optional(previous)
                .filter(|(_, arg, inline)| arg.takes_value && inline.is_none())
                .map(|(_, arg, _)| arg)
        });
        match expecting {
            Some(arg) => {
                if let Some(choices) = &arg.choices {
                    candidates.extend(choices.names());
                }
            }
            None => {
                candidates.extend(command.map(long_options).unwrap_or_default());
                candidates.extend(collection.names().map(String::from));
            }
        }
    }

    candidates.retain(|candidate| candidate.starts_with(current_token));
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::arg_config::{ArgConfig, Choices};
    use crate::core::parameter::Parameter;
    use serde_json::Value;

    fn words(tokens: &[&str]) -> Vec<String> {
        tokens.iter().map(|t| t.to_string()).collect()
    }

    fn collection() -> Collection {
        let deploy = Command::builder("deploy")
            .param(Parameter::optional("env", "dev").annotate(
                ArgConfig::new().choices(Choices::values(["dev", "prod"])),
            ))
            .param(Parameter::optional("cd", Value::Null))
            .param(Parameter::optional("dry_run", false))
            .implementation(|_| Ok(Value::Null))
            .build()
            .unwrap();
        let local = Command::builder("local")
            .param(Parameter::var_positional("args"))
            .implementation(|_| Ok(Value::Null))
            .build()
            .unwrap();
        Collection::new().with(deploy).and_then(|c| c.with(local)).unwrap()
    }

    #[test]
    fn options_of_the_current_command() {
        let collection = collection();
        let candidates = complete(&collection, &words(&["local", "ls", "deploy"]), "--d");
        assert_eq!(candidates, words(&["--dry-run"]));

        let candidates = complete(&collection, &words(&["deploy"]), "--");
        assert!(candidates.contains(&"--env".to_string()));
        assert!(candidates.contains(&"--no-dry-run".to_string()));
        assert!(candidates.contains(&"--help".to_string()));
    }

    #[test]
    fn choices_of_an_option_expecting_a_value() {
        let collection = collection();
        assert_eq!(
            complete(&collection, &words(&["deploy", "--env"]), ""),
            words(&["dev", "prod"])
        );
        assert!(complete(&collection, &words(&["deploy", "--cd"]), "").is_empty());
    }

    #[test]
    fn commands_and_options_otherwise() {
        let collection = collection();
        assert_eq!(complete(&collection, &[], "lo"), words(&["local"]));
        let candidates = complete(&collection, &words(&["deploy", "--dry-run"]), "");
        assert!(candidates.contains(&"deploy".to_string()));
        assert!(candidates.contains(&"--cd".to_string()));
    }
}
