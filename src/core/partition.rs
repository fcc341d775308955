// src/core/partition.rs

//! Particionado del argv en las ejecuciones de cada comando y expansión de
//! las opciones cortas agrupadas (`-abc` -> `-a -b -c`).

use crate::core::collection::Collection;
use crate::core::command::Command;
use crate::core::errors::{RunError, RunResult};
use std::borrow::Cow;
use std::mem;

/// ¿Se pide la ayuda antes de `--`? Un `-h` que es el valor de la opción
/// anterior no cuenta.
pub fn help_requested(command: &Command, argv: &[String]) -> bool {
    let mut previous: Option<&str> = None;
    for token in argv.iter().take_while(|token| *token != "--") {
        let is_value = previous.is_some_and(|prev| expects_value(command, prev));
        if !is_value && (token == "-h" || token == "--help") {
            return true;
        }
        previous = Some(token);
    }
    false
}

fn is_negative_number(rest: &str) -> bool {
    rest.chars().all(|c| c.is_ascii_digit() || c == '.')
}

/// Expande un grupo de opciones cortas.
///
/// Devuelve `None` si el token no es un grupo: tiene que ser `-` seguido de
/// algo que no sea `-`, con al menos tres caracteres, sin `=` en la tercera
/// posición y sin ser un número negativo. Si no, devuelve una opción por
/// carácter; la primera que lleva valor se queda con el resto del token.
pub fn parse_multi_short_option(
    command: &Command,
    token: &str,
) -> Option<(Vec<String>, Option<String>)> {
    let rest = token.strip_prefix('-')?;
    let mut chars = rest.chars();
    let first = chars.next()?;
    if first == '-' || token.chars().count() < 3 || chars.next() == Some('=') {
        return None;
    }
    if is_negative_number(rest) {
        return None;
    }

    let mut options = Vec::new();
    for (i, c) in rest.char_indices() {
        let option = format!("-{}", c);
        let takes_value = command
            .find_option(&option)
            .is_some_and(|arg| arg.takes_value);
        options.push(option);
        if takes_value {
            let value = &rest[i + c.len_utf8()..];
            let value = (!value.is_empty()).then(|| value.to_string());
            return Some((options, value));
        }
    }
    Some((options, None))
}

/// Expande las opciones cortas agrupadas de un argv. Todo lo que va detrás de
/// `--` se copia tal cual. Si no hay nada que expandir devuelve el mismo
/// argv.
pub fn expand_short_options<'a>(command: &Command, argv: &'a [String]) -> Cow<'a, [String]> {
    let mut expanded: Option<Vec<String>> = None;
    for (i, token) in argv.iter().enumerate() {
        if token == "--" {
            if let Some(expanded) = expanded.as_mut() {
                expanded.extend(argv[i..].iter().cloned());
            }
            break;
        }
        match parse_multi_short_option(command, token) {
            Some((options, value)) => {
                let out = expanded.get_or_insert_with(|| argv[..i].to_vec());
                out.extend(options);
                out.extend(value);
            }
            None => {
                if let Some(out) = expanded.as_mut() {
                    out.push(token.clone());
                }
            }
        }
    }
    match expanded {
        Some(expanded) => {
            log::debug!("Opciones cortas expandidas: {:?} -> {:?}", argv, expanded);
            Cow::Owned(expanded)
        }
        None => Cow::Borrowed(argv),
    }
}

/// ¿El token es una opción del comando que espera su valor en el token
/// siguiente?
pub fn expects_value(command: &Command, token: &str) -> bool {
    if let Some((_, arg, inline)) = command.parse_optional(token) {
        return arg.takes_value && inline.is_none();
    }
    if let Some(name) = token.strip_prefix("--") {
        // Un posicional con argumento por defecto solo se puede pasar como
        // `--nombre`.
        let downgraded = command
            .positionals()
            .any(|arg| arg.name == name && command.default_args().contains_key(&arg.dest));
        if downgraded {
            return true;
        }
    }
    match parse_multi_short_option(command, token) {
        Some((options, None)) => options
            .last()
            .and_then(|option| command.find_option(option))
            .is_some_and(|arg| arg.takes_value),
        _ => false,
    }
}

/// El argv de una de las ejecuciones de un argv particionado.
#[derive(Debug, Clone)]
pub struct Partition<'a> {
    pub command: &'a Command,
    pub argv: Vec<String>,
}

/// `:nombre` se lee como el valor `nombre` cuando `nombre` es un comando.
fn unescape<'t>(collection: &Collection, token: &'t str) -> Option<&'t str> {
    let name = token.strip_prefix(':')?;
    (!name.is_empty() && collection.get_exact(name).is_some()).then_some(name)
}

/// Divide un argv en las ejecuciones de cada comando.
///
/// El primer token tiene que ser un comando. Un token que nombra un comando
/// de la colección empieza una nueva ejecución, salvo que el token anterior
/// sea una opción del comando actual que espera valor.
pub fn partition_argv<'a>(
    collection: &'a Collection,
    argv: &[String],
) -> RunResult<Vec<Partition<'a>>> {
    let mut partitions = Vec::new();
    let mut tokens = argv.iter();

    let Some(first) = tokens.next() else {
        return Ok(partitions);
    };
    let mut command = collection
        .get(first)
        .ok_or_else(|| RunError::UnknownCommand(first.clone()))?;
    let mut command_argv = Vec::new();
    let mut previous: Option<&str> = None;

    for token in tokens {
        if let Some(value) = unescape(collection, token) {
            command_argv.push(value.to_string());
            previous = Some(token);
            continue;
        }
        if let Some(next) = collection.get_exact(token) {
            let is_value = previous.is_some_and(|prev| expects_value(command, prev));
            if !is_value {
                partitions.push(Partition {
                    command,
                    argv: mem::take(&mut command_argv),
                });
                command = next;
                previous = None;
                continue;
            }
        }
        command_argv.push(token.clone());
        previous = Some(token);
    }

    partitions.push(Partition {
        command,
        argv: command_argv,
    });

    log::debug!(
        "Argv particionado: {:?}",
        partitions
            .iter()
            .map(|p| (p.command.name(), &p.argv))
            .collect::<Vec<_>>()
    );

    Ok(partitions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::arg_config::{ArgConfig, Container};
    use crate::core::parameter::Parameter;
    use serde_json::Value;

    fn argv(tokens: &[&str]) -> Vec<String> {
        tokens.iter().map(|t| t.to_string()).collect()
    }

    fn noop(builder: crate::core::command::CommandBuilder) -> Command {
        builder.implementation(|_| Ok(Value::Null)).build().unwrap()
    }

    /// `-a` y `-b` son flags; `-c` lleva valor.
    fn abc() -> Command {
        noop(
            Command::builder("abc")
                .param(Parameter::optional("a", false))
                .param(Parameter::optional("b", false))
                .param(Parameter::optional("c", Value::Null)),
        )
    }

    fn collection() -> Collection {
        let local = noop(
            Command::builder("local")
                .param(
                    Parameter::positional("args")
                        .annotate(ArgConfig::new().container(Container::List)),
                )
                .param(Parameter::optional("cd", Value::Null))
                .param(Parameter::optional("echo", false)),
        );
        Collection::new()
            .with(noop(Command::builder("foo").param(Parameter::positional("x"))))
            .and_then(|c| c.with(noop(Command::builder("bar").param(Parameter::positional("y")))))
            .and_then(|c| c.with(local))
            .and_then(|c| c.with(noop(Command::builder("remote").param(Parameter::positional("cmd")))))
            .unwrap()
    }

    fn names_and_argv(partitions: &[Partition]) -> Vec<(String, Vec<String>)> {
        partitions
            .iter()
            .map(|p| (p.command.name().to_string(), p.argv.clone()))
            .collect()
    }

    #[test]
    fn groups_expand_until_an_option_takes_a_value() {
        let command = abc();
        assert_eq!(
            parse_multi_short_option(&command, "-abc42"),
            Some((argv(&["-a", "-b", "-c"]), Some("42".to_string())))
        );
        assert_eq!(
            parse_multi_short_option(&command, "-ab"),
            Some((argv(&["-a", "-b"]), None))
        );
        assert_eq!(
            expand_short_options(&command, &argv(&["-abc42"])).into_owned(),
            argv(&["-a", "-b", "-c", "42"])
        );
    }

    #[test]
    fn tokens_that_are_not_groups() {
        let command = abc();
        for token in ["-a", "--abc", "-c=1", "-12", "-1.5", "x", "-"] {
            assert_eq!(parse_multi_short_option(&command, token), None, "{}", token);
        }
    }

    #[test]
    fn expansion_stops_at_double_dash() {
        let command = abc();
        let input = argv(&["-ab", "--", "-ab"]);
        let expanded = expand_short_options(&command, &input);
        assert_eq!(expanded.into_owned(), argv(&["-a", "-b", "--", "-ab"]));
    }

    #[test]
    fn expansion_without_groups_borrows() {
        let command = abc();
        let input = argv(&["-a", "--c", "x", "--", "-ab"]);
        let expanded = expand_short_options(&command, &input);
        assert!(matches!(expanded, Cow::Borrowed(_)));
        assert_eq!(&*expanded, input.as_slice());
    }

    #[test]
    fn splits_on_command_names() {
        let collection = collection();
        let partitions = partition_argv(&collection, &argv(&["foo", "x", "bar", "y"])).unwrap();
        assert_eq!(
            names_and_argv(&partitions),
            vec![
                ("foo".to_string(), argv(&["x"])),
                ("bar".to_string(), argv(&["y"])),
            ]
        );
    }

    #[test]
    fn escaped_command_names_are_values() {
        let collection = collection();
        let partitions = partition_argv(&collection, &argv(&["foo", ":bar", "bar", "y"])).unwrap();
        assert_eq!(
            names_and_argv(&partitions),
            vec![
                ("foo".to_string(), argv(&["bar"])),
                ("bar".to_string(), argv(&["y"])),
            ]
        );

        // `:` solo y `:algo` que no es un comando se quedan como están.
        let partitions = partition_argv(&collection, &argv(&["foo", ":", ":nope"])).unwrap();
        assert_eq!(partitions[0].argv, argv(&[":", ":nope"]));
    }

    #[test]
    fn option_values_are_not_boundaries() {
        let collection = collection();
        let partitions =
            partition_argv(&collection, &argv(&["local", "--cd", "remote", "ls"])).unwrap();
        assert_eq!(
            names_and_argv(&partitions),
            vec![("local".to_string(), argv(&["--cd", "remote", "ls"]))]
        );

        // Un flag no espera valor.
        let partitions =
            partition_argv(&collection, &argv(&["local", "ls", "--echo", "remote", "ls"])).unwrap();
        assert_eq!(partitions.len(), 2);

        // Tampoco con el valor en línea.
        let partitions =
            partition_argv(&collection, &argv(&["local", "--cd=/tmp", "remote", "ls"])).unwrap();
        assert_eq!(partitions.len(), 2);
    }

    #[test]
    fn grouped_short_option_ending_in_a_value_option() {
        let collection = collection();
        let partitions =
            partition_argv(&collection, &argv(&["local", "-ec", "remote", "ls"])).unwrap();
        assert_eq!(partitions.len(), 1);
        assert_eq!(partitions[0].argv, argv(&["-ec", "remote", "ls"]));
    }

    #[test]
    fn unknown_first_command() {
        let collection = collection();
        match partition_argv(&collection, &argv(&["nope", "x"])) {
            Err(RunError::UnknownCommand(name)) => assert_eq!(name, "nope"),
            other => panic!("se esperaba un comando desconocido, no {:?}", other.map(|p| p.len())),
        }
        assert!(partition_argv(&collection, &[]).unwrap().is_empty());
    }

    #[test]
    fn only_exact_command_names_are_boundaries() {
        let collection = collection();
        let partitions = partition_argv(&collection, &argv(&["foo", "local_", "bar", "y"])).unwrap();
        assert_eq!(
            names_and_argv(&partitions),
            vec![
                ("foo".to_string(), argv(&["local_"])),
                ("bar".to_string(), argv(&["y"])),
            ]
        );
    }

    #[test]
    fn help_before_double_dash_only() {
        let collection = collection();
        let local = collection.get("local").unwrap();
        assert!(help_requested(local, &argv(&["x", "-h"])));
        assert!(help_requested(local, &argv(&["--help"])));
        assert!(!help_requested(local, &argv(&["--", "-h"])));
    }

    #[test]
    fn help_as_an_option_value_is_not_a_request() {
        let collection = collection();
        let local = collection.get("local").unwrap();
        assert!(!help_requested(local, &argv(&["--cd", "-h", "ls"])));
        assert!(help_requested(local, &argv(&["--echo", "-h"])));
    }
}
