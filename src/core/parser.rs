// src/core/parser.rs

//! Compila los argumentos de un comando en un `clap::Command` y convierte lo
//! que `clap` encuentra de vuelta en valores con nombre.

use crate::core::arg::Arg;
use crate::core::arg_config::{Action, Nargs};
use crate::core::command::Command;
use crate::core::errors::{RunError, RunResult};
use clap::builder::ValueRange;
use clap::parser::ValueSource;
use clap::{Arg as ClapArg, ArgAction, ArgGroup, ArgMatches, Command as ClapCommand};
use indexmap::IndexMap;
use serde_json::Value;

/// Valor que `clap` guarda cuando un argumento "flag o valor" aparece sin
/// valor.
const MISSING_VALUE: &str = "\0";

/// Los argumentos presentes en la línea de comandos, por nombre de parámetro
/// y en el orden de declaración.
pub type ParsedArgs = IndexMap<String, Value>;

fn inverse_id(arg: &Arg) -> String {
    format!("{}::inverse", arg.dest)
}

/// Los grupos viven en su propio espacio de ids para no chocar con los args.
fn group_id(name: &str) -> String {
    format!("group::{}", name)
}

fn long_name(option: &str) -> String {
    option.trim_start_matches("--").to_string()
}

fn short_char(option: &str) -> Option<char> {
    option.chars().nth(1)
}

fn value_range(nargs: Option<Nargs>) -> ValueRange {
    match nargs {
        None => ValueRange::from(1),
        Some(Nargs::Exactly(n)) => ValueRange::from(n.max(1)),
        Some(Nargs::Optional) => ValueRange::from(0..=1),
        Some(Nargs::ZeroOrMore) => ValueRange::from(0..),
        Some(Nargs::OneOrMore) => ValueRange::from(1..),
    }
}

/// Construye el parser del comando.
///
/// Se reconstruye en cada parseo porque los argumentos por defecto del
/// comando cambian su forma: un posicional con valor por defecto pasa a
/// ser una opción larga.
pub(crate) fn compile(command: &Command) -> ClapCommand {
    let mut parser = ClapCommand::new(command.prog_name())
        .no_binary_name(true)
        .disable_help_flag(true)
        .disable_version_flag(true)
        .args_override_self(true)
        .allow_negative_numbers(true);

    if let Some(description) = command.description() {
        parser = parser.about(description.to_string());
    }

    let mut groups: IndexMap<String, Vec<String>> = IndexMap::new();
    let mut seen_optional_positional = false;
    let mut needs_missing_positional = false;

    for arg in command.args().values() {
        let as_option = arg.is_positional && command.default_args().contains_key(&arg.dest);

        if arg.is_positional && !as_option {
            if arg.is_optional {
                seen_optional_positional = true;
            } else if seen_optional_positional {
                needs_missing_positional = true;
            }
        }

        parser = parser.arg(clap_arg(arg, as_option));

        if let Some(inverse) = clap_inverse_arg(arg) {
            parser = parser.arg(inverse);
        }

        if let Some(group) = &arg.mutual_exclusion_group {
            groups.entry(group.clone()).or_default().push(arg.dest.clone());
        }
    }

    if needs_missing_positional {
        parser = parser.allow_missing_positional(true);
    }

    for (name, ids) in groups {
        parser = parser.group(ArgGroup::new(group_id(&name)).args(ids).multiple(false));
    }

    parser
}

fn clap_arg(arg: &Arg, as_option: bool) -> ClapArg {
    let mut clap_arg = ClapArg::new(arg.dest.clone());

    if let Some(help) = &arg.help {
        clap_arg = clap_arg.help(help.clone());
    }
    if let Some(metavar) = &arg.metavar {
        if !(arg.kind.is_flag() || arg.action.is_flag()) {
            clap_arg = clap_arg.value_name(metavar.clone());
        }
    }

    if (arg.is_positional && !as_option) || arg.is_var_positional {
        let multiple = matches!(arg.nargs, Some(Nargs::OneOrMore | Nargs::ZeroOrMore));
        clap_arg = clap_arg.required(arg.is_positional && !arg.is_optional);
        return if multiple {
            clap_arg.action(ArgAction::Append).num_args(1..)
        } else {
            let count = match arg.nargs {
                Some(Nargs::Exactly(n)) => n.max(1),
                _ => 1,
            };
            clap_arg.action(ArgAction::Set).num_args(count)
        };
    }

    if as_option {
        clap_arg = clap_arg.long(long_name(&format!("--{}", arg.name)));
    } else {
        if let Some(short) = arg.short_option.as_deref().and_then(short_char) {
            clap_arg = clap_arg.short(short);
        }
        if let Some(long) = &arg.long_option {
            clap_arg = clap_arg.long(long_name(long));
        }
        clap_arg = clap_arg.required(!arg.is_optional);
        if arg.has_inverse() {
            clap_arg = clap_arg.overrides_with(inverse_id(arg));
        }
    }

    match arg.action {
        Action::StoreTrue => clap_arg.action(ArgAction::SetTrue),
        Action::StoreFalse => clap_arg.action(ArgAction::SetFalse),
        Action::Count => clap_arg.action(ArgAction::Count),
        Action::BoolOr => clap_arg
            .action(ArgAction::Set)
            .num_args(0..=1)
            .default_missing_value(MISSING_VALUE),
        Action::BoolOrContainer => clap_arg
            .action(ArgAction::Append)
            .num_args(0..)
            .default_missing_value(MISSING_VALUE),
        Action::Container => clap_arg
            .action(ArgAction::Append)
            .num_args(value_range(arg.nargs)),
        Action::Store => clap_arg
            .action(ArgAction::Set)
            .num_args(value_range(arg.nargs)),
    }
}

/// La opción inversa (`--no-echo`) es un argumento aparte que anula al
/// original, y viceversa: gana el último que aparece.
fn clap_inverse_arg(arg: &Arg) -> Option<ClapArg> {
    if !arg.has_inverse() {
        return None;
    }
    let mut inverse = ClapArg::new(inverse_id(arg))
        .action(ArgAction::SetTrue)
        .overrides_with(arg.dest.clone());
    if let Some(short) = arg.inverse_short_option.as_deref().and_then(short_char) {
        inverse = inverse.short(short);
    }
    if let Some(long) = &arg.inverse_long_option {
        inverse = inverse.long(long_name(long));
    }
    if let Some(help) = &arg.inverse_help {
        inverse = inverse.help(help.clone());
    }
    Some(inverse)
}

fn on_command_line(matches: &ArgMatches, id: &str) -> bool {
    matches!(matches.value_source(id), Some(ValueSource::CommandLine))
}

fn raw_occurrences(matches: &ArgMatches, id: &str) -> Vec<Vec<String>> {
    matches
        .try_get_raw_occurrences(id)
        .ok()
        .flatten()
        .map(|occurrences| {
            occurrences
                .map(|values| {
                    values
                        .map(|v| v.to_string_lossy().into_owned())
                        .collect::<Vec<_>>()
                })
                .collect()
        })
        .unwrap_or_default()
}

fn usage_error(arg: &Arg, message: String) -> RunError {
    RunError::usage(format!(
        "error: argumento '{}': {}",
        arg.display_name(),
        message
    ))
}

fn is_missing(values: &[String]) -> bool {
    values.is_empty() || (values.len() == 1 && values[0] == MISSING_VALUE)
}

fn read_value(arg: &Arg, matches: &ArgMatches) -> Result<Value, String> {
    let occurrences = raw_occurrences(matches, &arg.dest);
    match arg.action {
        Action::StoreTrue => Ok(Value::Bool(true)),
        Action::StoreFalse => Ok(Value::Bool(false)),
        Action::Count => Ok(Value::from(matches.get_count(&arg.dest))),
        Action::BoolOr => match occurrences.last() {
            Some(values) if !is_missing(values) => arg.convert_value(&values[values.len() - 1]),
            _ => Ok(Value::Bool(true)),
        },
        Action::BoolOrContainer => {
            let mut state: Option<Value> = None;
            for values in &occurrences {
                state = Some(if is_missing(values) {
                    Value::Bool(true)
                } else {
                    arg.add_items(state.take(), values)?
                });
            }
            Ok(state.unwrap_or(Value::Bool(true)))
        }
        Action::Container => {
            let mut state: Option<Value> = None;
            for values in &occurrences {
                state = Some(arg.add_items(state.take(), values)?);
            }
            match state {
                Some(value) => Ok(value),
                None => arg.add_items(None, &[]),
            }
        }
        Action::Store => {
            let values = occurrences.last().cloned().unwrap_or_default();
            match values.as_slice() {
                [] => Ok(Value::Null),
                [single] => arg.convert_value(single),
                many => many
                    .iter()
                    .map(|raw| arg.convert_value(raw))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Value::Array),
            }
        }
    }
}

fn envvar_value(arg: &Arg) -> Result<Option<Value>, String> {
    let Some(name) = &arg.envvar else {
        return Ok(None);
    };
    let Ok(raw) = std::env::var(name) else {
        return Ok(None);
    };
    log::debug!("Usando la variable de entorno {} para {}", name, arg.name);
    let value = if arg.container.is_some() {
        arg.add_items(None, &[raw])?
    } else {
        arg.convert_value(&raw)?
    };
    Ok(Some(value))
}

/// Lee los valores de los argumentos presentes en la línea de comandos (o en
/// su variable de entorno).
pub(crate) fn extract(command: &Command, matches: &ArgMatches) -> RunResult<ParsedArgs> {
    let mut parsed = ParsedArgs::new();
    for arg in command.args().values() {
        if command.uses_default_help() && arg.dest == "help" {
            continue;
        }
        let value = if on_command_line(matches, &arg.dest) {
            Some(read_value(arg, matches).map_err(|e| usage_error(arg, e))?)
        } else if arg.has_inverse() && on_command_line(matches, &inverse_id(arg)) {
            Some(Value::Bool(false))
        } else {
            envvar_value(arg).map_err(|e| usage_error(arg, e))?
        };
        if let Some(value) = value {
            parsed.insert(arg.dest.clone(), value);
        }
    }
    Ok(parsed)
}

/// Parsea un argv ya expandido.
pub(crate) fn parse(command: &Command, argv: &[String]) -> RunResult<ParsedArgs> {
    let matches = compile(command).try_get_matches_from(argv)?;
    extract(command, &matches)
}

pub(crate) fn render_help(command: &Command) -> String {
    compile(command).render_help().to_string()
}

pub(crate) fn render_usage(command: &Command) -> String {
    compile(command).render_usage().to_string()
}
