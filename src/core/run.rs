// src/core/run.rs

//! El comando del programa: lee sus propias opciones, carga la
//! configuración y ejecuta los comandos encadenados del resto del argv.

use crate::constants::{PROGRAM_NAME, RUN_COMMAND_NAME, VERSION};
use crate::core::arg_config::{ArgConfig, ArgType, Container, ScalarType};
use crate::core::collection::Collection;
use crate::core::command::{CallArgs, Command, value_to_string};
use crate::core::config::{self, Config, ConfigError, merge_dicts};
use crate::core::errors::{RunError, RunResult};
use crate::core::naming::normalize_name;
use crate::core::parameter::Parameter;
use crate::core::partition::parse_multi_short_option;
use crate::core::runner::{CommandRunner, SIGINT_MESSAGE};
use crate::models::{ConfigFile, DefaultArgs};
use crate::system::executor::extend_environ;
use crate::system::printer;
use serde_json::{Map, Value};
use std::mem;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Lo que sale de combinar la configuración con las opciones de `run`.
#[derive(Debug, Default, PartialEq)]
pub struct Settings {
    pub globals: Map<String, Value>,
    pub default_args: DefaultArgs,
    pub env_default_args: DefaultArgs,
    pub environ: Map<String, Value>,
}

/// Cambia los nombres de comandos y argumentos de una sección de argumentos
/// por defecto a los nombres reales, y rechaza los que no existen.
fn normalize_command_args(args: &mut DefaultArgs, collection: &Collection) -> Result<(), ConfigError> {
    for (command_name, command_args) in mem::take(args) {
        let command = collection
            .get(&command_name)
            .ok_or_else(|| ConfigError::UnknownCommand(command_name.clone()))?;
        let mut normalized = Map::new();
        for (name, value) in command_args {
            let param = command.find_parameter(&name).ok_or_else(|| ConfigError::UnknownArg {
                command: command_name.clone(),
                arg: name.clone(),
            })?;
            normalized.insert(param.name.clone(), value);
        }
        merge_dicts(args.entry(command.name().to_string()).or_default(), normalized);
    }
    Ok(())
}

fn merge_default_args(base: &mut DefaultArgs, other: DefaultArgs) {
    for (command, args) in other {
        merge_dicts(base.entry(command).or_default(), args);
    }
}

fn default_args_to_map(default_args: &DefaultArgs) -> Map<String, Value> {
    default_args
        .iter()
        .map(|(name, args)| (name.clone(), Value::Object(args.clone())))
        .collect()
}

/// Combina el fichero de configuración (si lo hay) con las globales y las
/// variables de entorno de la línea de comandos, y lo interpola todo.
///
/// Las globales que coinciden con un parámetro de un comando pasan a ser
/// argumentos por defecto de ese comando, salvo que ya tenga uno.
pub fn resolve_settings(
    collection: &Collection,
    file: Option<ConfigFile>,
    cli_globals: Map<String, Value>,
    cli_environ: Map<String, Value>,
) -> Result<Settings, ConfigError> {
    let mut settings = Settings::default();
    let mut base_default_args = DefaultArgs::new();

    match file {
        Some(mut file) => {
            normalize_command_args(&mut file.args, collection)?;
            for env in file.envs.values_mut() {
                normalize_command_args(&mut env.args, collection)?;
            }

            let env = cli_globals
                .get("env")
                .or_else(|| file.globals.get("env"))
                .filter(|env| !env.is_null())
                .map(value_to_string);

            let mut globals = file.globals.clone();
            if let Some(env) = env {
                let env_config = file
                    .envs
                    .get(&env)
                    .ok_or_else(|| ConfigError::UnknownEnv(env.clone()))?;
                merge_dicts(&mut globals, env_config.globals.clone());
                merge_dicts(&mut globals, cli_globals);
                let envs = serde_json::to_value(&file.envs).map_err(|e| ConfigError::Invalid(e.to_string()))?;
                globals.insert("envs".to_string(), envs);
                settings.env_default_args = env_config.args.clone();
            } else {
                merge_dicts(&mut globals, cli_globals);
            }
            settings.globals = globals;

            base_default_args = file.args;
            merge_default_args(&mut base_default_args, settings.env_default_args.clone());

            settings.environ = file.environ;
            merge_dicts(&mut settings.environ, cli_environ);
        }
        None => {
            settings.globals = cli_globals;
            settings.environ = cli_environ;
        }
    }

    for command in collection.iter() {
        let mut command_args = base_default_args.get(command.name()).cloned().unwrap_or_default();
        for (name, value) in &settings.globals {
            if let Some(param) = command.find_parameter(name) {
                if !command_args.contains_key(&param.name) {
                    command_args.insert(param.name.clone(), value.clone());
                }
            } else if command.has_kwargs() {
                command_args.insert(normalize_name(name), value.clone());
            }
        }
        if command.find_parameter("default_args").is_some() && !command_args.contains_key("default_args") {
            command_args.insert(
                "default_args".to_string(),
                Value::Object(default_args_to_map(&base_default_args)),
            );
        }
        if !command_args.is_empty() {
            settings.default_args.insert(command.name().to_string(), command_args);
        }
    }

    // Globales contra sí mismas, argumentos contra globales y argumentos, y
    // entorno contra globales.
    let globals_context = Config::from(settings.globals.clone());
    if let Value::Object(globals) = globals_context.interpolate(&Value::Object(mem::take(&mut settings.globals)))? {
        settings.globals = globals;
    }

    let globals_context = Config::from(settings.globals.clone());
    let mut args_context = globals_context.clone();
    args_context.merge(default_args_to_map(&settings.default_args));
    for args in settings.default_args.values_mut() {
        let interpolated = args_context.interpolate(&Value::Object(mem::take(args)))?;
        if let Value::Object(map) = interpolated {
            *args = map;
        }
    }

    if let Value::Object(environ) = globals_context.interpolate(&Value::Object(mem::take(&mut settings.environ)))? {
        settings.environ = environ;
    }

    Ok(settings)
}

struct RunState {
    collection: Mutex<Collection>,
    interrupted: Arc<AtomicBool>,
}

/// El comando `runcommands`.
pub struct Run {
    command: Command,
    state: Arc<RunState>,
}

impl Run {
    pub fn new(collection: Collection) -> RunResult<Run> {
        Self::with_interrupt_flag(collection, Arc::new(AtomicBool::new(false)))
    }

    /// `interrupted` se activa desde fuera (SIGINT) para que no se lancen
    /// más comandos.
    pub fn with_interrupt_flag(collection: Collection, interrupted: Arc<AtomicBool>) -> RunResult<Run> {
        let state = Arc::new(RunState {
            collection: Mutex::new(collection),
            interrupted,
        });
        let implementation_state = Arc::clone(&state);

        let command = Command::builder(RUN_COMMAND_NAME)
            .description(
                "Run one or more commands in succession.\n\n    \
                 When a command name appears in the argv it starts the next command\n    \
                 unless the previous token was an option that expects a value.\n    \
                 Prefix a value with `:` to keep it from being read as a command.",
            )
            .param(
                Parameter::optional("config_file", Value::Null)
                    .annotate(ArgConfig::new().short_option("-f").help("Config file (TOML)")),
            )
            .param(Parameter::optional("globals_", Value::Null).annotate(
                ArgConfig::new()
                    .container(Container::Dict)
                    .arg_type(ScalarType::Json)
                    .help("Global variables & default args for *all* commands"),
            ))
            .param(
                Parameter::optional("env", Value::Null)
                    .annotate(ArgConfig::new().help("env will be added to globals if specified")),
            )
            .param(
                Parameter::optional("version", Value::Null).annotate(
                    ArgConfig::new().help("version will be added to globals if specified"),
                ),
            )
            .param(Parameter::optional("echo", Value::Null).annotate(
                ArgConfig::new()
                    .arg_type(ArgType::Scalar(ScalarType::Bool))
                    .help("echo=True will be added to globals")
                    .inverse_help("echo=False will be added to globals"),
            ))
            .param(Parameter::optional("environ", Value::Null).annotate(
                ArgConfig::new()
                    .container(Container::Dict)
                    .help("Additional environment variables; added just before commands are run"),
            ))
            .param(Parameter::optional("info", false).annotate(
                ArgConfig::new()
                    .no_inverse()
                    .help("Show info and exit")
                    .mutual_exclusion_group("meta-show"),
            ))
            .param(Parameter::optional("list_commands", false).annotate(
                ArgConfig::new()
                    .no_inverse()
                    .help("Show info & commands and exit")
                    .mutual_exclusion_group("meta-show"),
            ))
            .param(Parameter::optional("debug", Value::Null).annotate(
                ArgConfig::new()
                    .arg_type(ArgType::Scalar(ScalarType::Bool))
                    .help("Print debugging info; also added to globals"),
            ))
            .param(Parameter::keyword_only("all_argv"))
            .param(Parameter::keyword_only("run_argv"))
            .param(Parameter::keyword_only("command_argv"))
            .implementation(move |call| run_commands(&implementation_state, call))
            .build()?;

        Ok(Run { command, state })
    }

    pub fn command(&self) -> &Command {
        &self.command
    }

    pub fn interrupt_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.state.interrupted)
    }

    /// Separa el argv en `(todo, opciones de run, argv de los comandos)`.
    ///
    /// Se consumen las opciones (conocidas o no, con sus valores) hasta la
    /// primera palabra que no parece una opción o hasta `--`.
    pub fn partition_argv(&self, argv: &[String]) -> (Vec<String>, Vec<String>, Vec<String>) {
        let command = &self.command;
        let mut run_argv = Vec::new();
        let mut i = 0;

        while i < argv.len() {
            let token = argv[i].as_str();

            if token == "--" {
                i += 1;
                break;
            }

            if let Some((_, arg, value)) = command.parse_optional(token) {
                run_argv.push(token.to_string());
                if value.is_none() && arg.takes_value && i + 1 < argv.len() {
                    i += 1;
                    run_argv.push(argv[i].clone());
                }
            } else if !looks_like_option(token) {
                break;
            } else {
                match parse_multi_short_option(command, token) {
                    None => run_argv.push(token.to_string()),
                    Some((options, value)) => {
                        let takes_value = options
                            .last()
                            .and_then(|option| command.find_option(option))
                            .is_some_and(|arg| arg.takes_value);
                        run_argv.extend(options);
                        match value {
                            Some(value) => run_argv.push(value),
                            None if takes_value && i + 1 < argv.len() => {
                                i += 1;
                                run_argv.push(argv[i].clone());
                            }
                            None => {}
                        }
                    }
                }
            }

            i += 1;
        }

        let command_argv = argv[i.min(argv.len())..].to_vec();
        (argv.to_vec(), run_argv, command_argv)
    }

    /// ¿Se pidió `-d/--debug` entre las opciones de run?
    pub fn debug_requested(&self, argv: &[String]) -> bool {
        let (_, run_argv, _) = self.partition_argv(argv);
        run_argv.iter().any(|token| token == "-d" || token == "--debug")
    }

    pub fn run(&self, argv: &[String]) -> RunResult<Value> {
        let (all_argv, run_argv, command_argv) = self.partition_argv(argv);
        log::debug!("Opciones de run: {:?}; comandos: {:?}", run_argv, command_argv);
        let mut overrides = Map::new();
        overrides.insert("all_argv".into(), string_array(all_argv));
        overrides.insert("run_argv".into(), string_array(run_argv.clone()));
        overrides.insert("command_argv".into(), string_array(command_argv));
        self.command.run(&run_argv, overrides)
    }

    /// Ejecuta el programa y devuelve el código de salida.
    pub fn console_script(&self, argv: &[String]) -> i32 {
        match self.run(argv) {
            Ok(_) => 0,
            Err(error) => {
                let error = if self.state.interrupted.load(Ordering::SeqCst) && !error.is_abort() {
                    RunError::aborted(0, SIGINT_MESSAGE)
                } else {
                    error
                };
                log::debug!("run terminó con error: {:?}", error);
                error.report()
            }
        }
    }
}

fn looks_like_option(token: &str) -> bool {
    token.starts_with('-') && !token.starts_with("---") && !token.trim_matches('-').is_empty()
}

fn string_array(values: Vec<String>) -> Value {
    Value::Array(values.into_iter().map(Value::String).collect())
}

fn run_commands(state: &RunState, call: &CallArgs) -> RunResult<Value> {
    let mut cli_globals = match call.get("globals_") {
        Some(Value::Object(globals)) => globals.clone(),
        _ => Map::new(),
    };
    if let Some(env) = call.string("env") {
        cli_globals.insert("env".into(), Value::String(env));
    }
    if let Some(version) = call.string("version") {
        cli_globals.insert("version".into(), Value::String(version));
    }
    if let Some(echo) = call.opt_flag("echo") {
        cli_globals.insert("echo".into(), Value::Bool(echo));
    }
    if let Some(debug) = call.opt_flag("debug") {
        cli_globals.insert("debug".into(), Value::Bool(debug));
    }
    let cli_environ = match call.get("environ") {
        Some(Value::Object(environ)) => environ.clone(),
        _ => Map::new(),
    };
    let info = call.flag("info");
    let list_commands = call.flag("list_commands");
    let command_argv = call.strings("command_argv");

    let config_file: Option<PathBuf> = call.string("config_file").map(PathBuf::from);
    let project_file = config::find_config_file(config_file.as_deref());
    let user_file = config::user_config_file();
    let file = config::load_layered(user_file.as_deref(), project_file.as_deref())?;

    let mut collection = state
        .collection
        .lock()
        .map_err(|_| RunError::Internal("la colección de comandos quedó envenenada".into()))?;

    let settings = resolve_settings(&collection, file, cli_globals, cli_environ)?;
    let debug = settings.globals.get("debug").and_then(Value::as_bool).unwrap_or(false);

    if info || list_commands || command_argv.is_empty() || debug {
        printer::print(&format!("{} {}", PROGRAM_NAME, VERSION));
    }

    if debug {
        log_settings(project_file.as_deref(), call, &settings);
    }

    extend_environ(
        settings
            .environ
            .iter()
            .map(|(name, value)| (name.clone(), value_to_string(value))),
    );

    collection.set_debug(debug);
    let mut default_args = settings.default_args;
    for command in collection.iter_mut() {
        command.set_default_args(default_args.shift_remove(command.name()).unwrap_or_default());
    }

    let runner = CommandRunner::new(&collection).with_interrupt_flag(Arc::clone(&state.interrupted));

    if info || list_commands {
        if list_commands {
            runner.print_usage();
        }
        return Ok(Value::Null);
    }
    if command_argv.is_empty() {
        printer::warning("\nNo se especificó ningún comando");
        runner.print_usage();
        return Ok(Value::Null);
    }

    let report = runner.run(&command_argv);
    if let Some(error) = report.error {
        return Err(error);
    }
    Ok(Value::Array(report.results.into_iter().map(|(_, result)| result).collect()))
}

fn log_settings(config_file: Option<&Path>, call: &CallArgs, settings: &Settings) {
    log::debug!("Fichero de configuración: {:?}", config_file);
    log::debug!("Argv completo: {:?}", call.strings("all_argv"));
    log::debug!("Opciones de run: {:?}", call.strings("run_argv"));
    log::debug!("Argv de los comandos: {:?}", call.strings("command_argv"));
    log::debug!("Globales: {:?}", settings.globals);
    log::debug!("Argumentos por defecto: {:?}", settings.default_args);
    log::debug!("Argumentos por defecto del entorno: {:?}", settings.env_default_args);
    log::debug!("Variables de entorno: {:?}", settings.environ);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EnvConfig;
    use serde_json::json;

    fn argv(tokens: &[&str]) -> Vec<String> {
        tokens.iter().map(|t| t.to_string()).collect()
    }

    fn object(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    fn collection() -> Collection {
        let local = Command::builder("local")
            .param(Parameter::positional("args"))
            .param(Parameter::optional("cd", Value::Null))
            .param(Parameter::optional("echo", false))
            .param(Parameter::optional("dry_run", false))
            .implementation(|_| Ok(Value::Null))
            .build()
            .unwrap();
        let remote = Command::builder("remote")
            .param(Parameter::positional("cmd"))
            .param(Parameter::positional("host"))
            .param(Parameter::optional("user", Value::Null))
            .implementation(|_| Ok(Value::Null))
            .build()
            .unwrap();
        Collection::new().with(local).and_then(|c| c.with(remote)).unwrap()
    }

    #[test]
    fn run_options_are_split_from_commands() {
        let run = Run::new(collection()).unwrap();
        let (all, run_argv, command_argv) =
            run.partition_argv(&argv(&["-f", "x.toml", "--echo", "-xyz", "local", "ls", "-l"]));
        assert_eq!(all.len(), 7);
        assert_eq!(run_argv, argv(&["-f", "x.toml", "--echo", "-x", "-y", "-z"]));
        assert_eq!(command_argv, argv(&["local", "ls", "-l"]));

        let (_, run_argv, command_argv) = run.partition_argv(&argv(&["--env=prod", "--", "-d"]));
        assert_eq!(run_argv, argv(&["--env=prod"]));
        assert_eq!(command_argv, argv(&["-d"]));

        let (_, run_argv, command_argv) = run.partition_argv(&argv(&["-if", "x.toml", "remote"]));
        assert_eq!(run_argv, argv(&["-i", "-f", "x.toml"]));
        assert_eq!(command_argv, argv(&["remote"]));
    }

    #[test]
    fn debug_detection() {
        let run = Run::new(collection()).unwrap();
        assert!(run.debug_requested(&argv(&["-d", "local", "ls"])));
        assert!(run.debug_requested(&argv(&["--debug"])));
        assert!(!run.debug_requested(&argv(&["local", "-d"])));
    }

    #[test]
    fn run_options_are_derived() {
        let run = Run::new(collection()).unwrap();
        let command = run.command();
        assert_eq!(command.name(), "runcommands");
        assert!(command.find_option("-f").is_some());
        assert!(command.find_option("--globals").is_some());
        assert!(command.find_option("--list-commands").is_some());
        assert_eq!(
            command.find_arg("echo").and_then(|a| a.inverse_long_option.as_deref()),
            Some("--no-echo")
        );
        assert_eq!(
            command.find_arg("debug").and_then(|a| a.short_option.as_deref()),
            Some("-d")
        );
        assert!(command.find_arg("info").is_some_and(|a| !a.has_inverse()));
        assert!(command.find_arg("command-argv").is_none());
    }

    #[test]
    fn meta_options_are_exclusive() {
        let run = Run::new(collection()).unwrap();
        let error = run.run(&argv(&["--info", "--list-commands"])).unwrap_err();
        assert_eq!(error.return_code(), 2);
    }

    #[test]
    fn globals_become_default_args() {
        let collection = collection();
        let settings = resolve_settings(
            &collection,
            None,
            object(json!({"echo": true, "host": "h", "cd": "/{{ host }}"})),
            Map::new(),
        )
        .unwrap();
        assert_eq!(settings.default_args["local"], object(json!({"cd": "/h", "echo": true})));
        assert_eq!(settings.default_args["remote"], object(json!({"host": "h"})));
    }

    #[test]
    fn envs_layer_over_globals_and_args() {
        let collection = collection();
        let mut file = ConfigFile {
            globals: object(json!({"env": "prod", "host": "base", "user": "me"})),
            environ: object(json!({"TARGET": "{{ host }}"})),
            ..ConfigFile::default()
        };
        file.args.insert("remote".into(), object(json!({"user": "root"})));
        file.envs.insert(
            "prod".into(),
            EnvConfig {
                args: [("local".to_string(), object(json!({"cd": "/srv"})))].into_iter().collect(),
                globals: object(json!({"host": "prod.example.com"})),
            },
        );

        let settings =
            resolve_settings(&collection, Some(file), Map::new(), object(json!({"X": "1"}))).unwrap();
        assert_eq!(settings.globals["host"], json!("prod.example.com"));
        assert!(settings.globals.contains_key("envs"));
        assert_eq!(settings.default_args["remote"]["user"], json!("root"));
        assert_eq!(settings.default_args["remote"]["host"], json!("prod.example.com"));
        assert_eq!(settings.default_args["local"]["cd"], json!("/srv"));
        assert_eq!(settings.environ, object(json!({"TARGET": "prod.example.com", "X": "1"})));
    }

    #[test]
    fn unknown_env_command_or_arg() {
        let collection = collection();
        let file = ConfigFile {
            globals: object(json!({"env": "nope"})),
            ..ConfigFile::default()
        };
        assert!(matches!(
            resolve_settings(&collection, Some(file), Map::new(), Map::new()),
            Err(ConfigError::UnknownEnv(_))
        ));

        let mut file = ConfigFile::default();
        file.args.insert("nope".into(), Map::new());
        assert!(matches!(
            resolve_settings(&collection, Some(file), Map::new(), Map::new()),
            Err(ConfigError::UnknownCommand(_))
        ));

        let mut file = ConfigFile::default();
        file.args.insert("local".into(), object(json!({"bogus": 1})));
        assert!(matches!(
            resolve_settings(&collection, Some(file), Map::new(), Map::new()),
            Err(ConfigError::UnknownArg { .. })
        ));
    }

    #[test]
    fn arg_names_in_config_are_normalized() {
        let collection = collection();
        let mut args = DefaultArgs::new();
        args.insert("local".into(), object(json!({"dry-run": true, "cd": "/a"})));
        normalize_command_args(&mut args, &collection).unwrap();
        assert_eq!(args["local"], object(json!({"dry_run": true, "cd": "/a"})));
    }
}
