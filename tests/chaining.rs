//! Ejecuciones encadenadas a través de la API pública: declaración de
//! comandos, particionado del argv y runner.

use rstest::{fixture, rstest};
use runcommands::core::arg_config::{ArgConfig, Container};
use runcommands::core::collection::Collection;
use runcommands::core::command::{CallArgs, Command};
use runcommands::core::errors::RunError;
use runcommands::core::parameter::Parameter;
use runcommands::core::partition::{expand_short_options, partition_argv};
use runcommands::core::runner::CommandRunner;
use serde_json::{Value, json};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

type Calls = Arc<Mutex<Vec<(String, Value)>>>;

fn argv(tokens: &[&str]) -> Vec<String> {
    tokens.iter().map(|t| t.to_string()).collect()
}

/// Guarda el nombre del comando y sus argumentos en `calls`.
fn recorder(calls: Calls, name: &'static str) -> impl Fn(&CallArgs) -> Result<Value, RunError> + Send + Sync + 'static {
    move |call: &CallArgs| {
        let mut args = serde_json::Map::new();
        for (param, value) in &call.positional {
            args.insert(param.clone(), value.clone());
        }
        for (param, value) in &call.keywords {
            args.insert(param.clone(), value.clone());
        }
        let args = Value::Object(args);
        calls.lock().unwrap().push((name.to_string(), args.clone()));
        Ok(args)
    }
}

struct Fixture {
    collection: Collection,
    calls: Calls,
}

#[fixture]
fn commands() -> Fixture {
    let calls: Calls = Arc::default();
    let foo = Command::builder("foo")
        .param(Parameter::positional("value"))
        .implementation(recorder(Arc::clone(&calls), "foo"))
        .build()
        .unwrap();
    let bar = Command::builder("bar")
        .param(Parameter::positional("value"))
        .param(Parameter::optional("tag", json!([])))
        .implementation(recorder(Arc::clone(&calls), "bar"))
        .build()
        .unwrap();
    let local = Command::builder("local")
        .param(Parameter::positional("args").annotate(ArgConfig::new().container(Container::List)))
        .param(Parameter::optional("cd", Value::Null))
        .param(Parameter::optional("all", false))
        .param(Parameter::optional("byte", false))
        .implementation(recorder(Arc::clone(&calls), "local"))
        .build()
        .unwrap();
    let remote = Command::builder("remote")
        .param(Parameter::positional("host"))
        .implementation(recorder(Arc::clone(&calls), "remote"))
        .build()
        .unwrap();
    let collection = Collection::new()
        .with(foo)
        .and_then(|c| c.with(bar))
        .and_then(|c| c.with(local))
        .and_then(|c| c.with(remote))
        .unwrap();
    Fixture { collection, calls }
}

fn names_and_argv(collection: &Collection, tokens: &[&str]) -> Vec<(String, Vec<String>)> {
    partition_argv(collection, &argv(tokens))
        .unwrap()
        .into_iter()
        .map(|p| (p.command.name().to_string(), p.argv))
        .collect()
}

#[rstest]
#[case(&["foo", "x", "bar", "y"], vec![("foo", vec!["x"]), ("bar", vec!["y"])])]
#[case(&["foo", ":bar", "bar", "y"], vec![("foo", vec!["bar"]), ("bar", vec!["y"])])]
#[case(&["local", "--cd", "remote", "ls"], vec![("local", vec!["--cd", "remote", "ls"])])]
#[case(&["local", "-c", "remote", "ls", "remote", "h"], vec![
    ("local", vec!["-c", "remote", "ls"]),
    ("remote", vec!["h"]),
])]
fn partitioning(
    commands: Fixture,
    #[case] tokens: &[&str],
    #[case] expected: Vec<(&str, Vec<&str>)>,
) {
    let expected: Vec<(String, Vec<String>)> = expected
        .into_iter()
        .map(|(name, tokens)| (name.to_string(), argv(&tokens)))
        .collect();
    assert_eq!(names_and_argv(&commands.collection, tokens), expected);
}

#[rstest]
fn unknown_first_command(commands: Fixture) {
    let error = partition_argv(&commands.collection, &argv(&["nope", "foo"])).unwrap_err();
    assert!(matches!(error, RunError::UnknownCommand(name) if name == "nope"));
}

#[rstest]
fn grouped_short_options(commands: Fixture) {
    let local = commands.collection.get("local").unwrap();
    assert_eq!(
        expand_short_options(local, &argv(&["-abc42", "ls"])).into_owned(),
        argv(&["-a", "-b", "-c", "42", "ls"])
    );

    let plain = argv(&["-a", "--cd", "/tmp", "ls"]);
    assert_eq!(expand_short_options(local, &plain).as_ref(), plain.as_slice());
}

#[rstest]
fn commands_run_left_to_right(commands: Fixture) {
    let runner = CommandRunner::new(&commands.collection);
    let report = runner.run(&argv(&["bar", "y", "--tag", "a", "--tag", "b", "foo", "x"]));
    assert!(report.succeeded(), "{:?}", report.error);

    let calls = commands.calls.lock().unwrap();
    assert_eq!(
        *calls,
        vec![
            ("bar".to_string(), json!({"value": "y", "tag": ["a", "b"]})),
            ("foo".to_string(), json!({"value": "x"})),
        ]
    );
    assert_eq!(report.results.len(), 2);
}

#[rstest]
fn a_parse_error_stops_the_run(commands: Fixture) {
    let runner = CommandRunner::new(&commands.collection);
    let report = runner.run(&argv(&["foo", "x", "bar", "--bogus", "y", "remote", "h"]));
    assert_eq!(report.return_code(), 2);
    assert_eq!(report.results.len(), 1);
    assert_eq!(commands.calls.lock().unwrap().len(), 1);
}

#[rstest]
fn an_interrupt_skips_the_remaining_commands(commands: Fixture) {
    let interrupted = Arc::new(AtomicBool::new(false));
    interrupted.store(true, Ordering::SeqCst);
    let runner = CommandRunner::new(&commands.collection).with_interrupt_flag(interrupted);
    let report = runner.run(&argv(&["foo", "x"]));
    assert!(commands.calls.lock().unwrap().is_empty());
    assert!(report.error.as_ref().is_some_and(RunError::is_abort));
    assert_eq!(report.return_code(), 0);
}

#[test]
fn duplicate_long_options_are_rejected() {
    let result = Command::builder("deploy")
        .param(Parameter::optional("host", Value::Null))
        .param(
            Parameter::optional("target", Value::Null)
                .annotate(ArgConfig::new().long_option("--host")),
        )
        .implementation(|_| Ok(Value::Null))
        .build();
    assert!(matches!(result, Err(RunError::Command(message)) if message.contains("--host")));
}
