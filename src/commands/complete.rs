// src/commands/complete.rs

use crate::core::arg_config::{ArgConfig, ScalarType};
use crate::core::collection::Collection;
use crate::core::command::{CallArgs, Command};
use crate::core::completion;
use crate::core::errors::RunResult;
use crate::core::parameter::Parameter;
use crate::system::printer;
use serde_json::Value;

/// Las palabras de la línea hasta el cursor, sin el programa ni la palabra
/// que se está completando.
fn preceding_tokens(command_line: &str, current_token: &str, position: Option<usize>) -> Vec<String> {
    let end = position
        .filter(|p| *p <= command_line.len() && command_line.is_char_boundary(*p))
        .unwrap_or(command_line.len());
    let line = &command_line[..end];
    let mut tokens: Vec<String> = line.split_whitespace().skip(1).map(String::from).collect();
    if !current_token.is_empty() && !line.ends_with(char::is_whitespace) {
        tokens.pop();
    }
    tokens
}

/// El comando `complete`: imprime los candidatos para la palabra bajo el
/// cursor separados por espacios.
pub fn command(collection: Collection) -> RunResult<Command> {
    Command::builder("complete")
        .description("Find completions for the current command line.")
        .param(Parameter::positional("command_line"))
        .param(Parameter::positional("current_token"))
        .param(Parameter::optional("position", Value::Null).annotate(
            ArgConfig::new()
                .arg_type(ScalarType::Int)
                .help("Cursor position in the command line"),
        ))
        .implementation(move |call: &CallArgs| {
            let command_line = call.string("command_line").unwrap_or_default();
            let current_token = call.string("current_token").unwrap_or_default();
            let position = call.int("position").and_then(|p| usize::try_from(p).ok());
            let tokens = preceding_tokens(&command_line, &current_token, position);
            let candidates = completion::complete(&collection, &tokens, &current_token);
            printer::print(&candidates.join(" "));
            Ok(Value::Array(candidates.into_iter().map(Value::String).collect()))
        })
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_before_the_cursor() {
        assert_eq!(preceding_tokens("run local --c", "--c", None), vec!["local"]);
        assert_eq!(preceding_tokens("run local ", "", None), vec!["local"]);
        assert_eq!(preceding_tokens("run local --cd /tmp", "", Some(10)), vec!["local"]);
    }
}
