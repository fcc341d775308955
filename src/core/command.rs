// src/core/command.rs

use crate::core::arg::Arg;
use crate::core::arg_config::{ArgConfig, Choices};
use crate::core::errors::{RunError, RunResult};
use crate::core::naming::{normalize_name, normalize_type_name, process_description};
use crate::core::parameter::Parameter;
use crate::core::parser::{self, ParsedArgs};
use crate::core::partition;
use crate::system::printer;
use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::borrow::Cow;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// La implementación de un comando: recibe los argumentos ya resueltos.
pub type Implementation = Arc<dyn Fn(&CallArgs) -> RunResult<Value> + Send + Sync>;

/// Se llama al final de una ejecución encadenada con el comando, su
/// resultado y si la ejecución se abortó.
pub type Callback = Arc<dyn Fn(&Command, &Value, bool) + Send + Sync>;

/// Los argumentos con los que se llama a una implementación.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallArgs {
    /// Pares (parámetro, valor) en el orden de declaración.
    pub positional: Vec<(String, Value)>,
    pub var_args: Vec<Value>,
    pub keywords: IndexMap<String, Value>,
}

impl CallArgs {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.positional
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
            .or_else(|| self.keywords.get(name))
    }

    pub fn value(&self, name: &str) -> Value {
        self.get(name).cloned().unwrap_or(Value::Null)
    }

    pub fn str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    /// El valor como texto; `null` no tiene texto.
    pub fn string(&self, name: &str) -> Option<String> {
        match self.get(name) {
            None | Some(Value::Null) => None,
            Some(value) => Some(value_to_string(value)),
        }
    }

    pub fn flag(&self, name: &str) -> bool {
        self.opt_flag(name).unwrap_or(false)
    }

    pub fn opt_flag(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(Value::as_bool)
    }

    pub fn int(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(|v| match v {
            Value::String(s) => s.parse().ok(),
            other => other.as_i64(),
        })
    }

    /// Los elementos de una lista como texto. Un escalar es una lista de uno.
    pub fn strings(&self, name: &str) -> Vec<String> {
        match self.get(name) {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items.iter().map(value_to_string).collect(),
            Some(other) => vec![value_to_string(other)],
        }
    }

    /// Las entradas de un diccionario, con los valores como texto.
    pub fn pairs(&self, name: &str) -> Vec<(String, String)> {
        match self.get(name) {
            Some(Value::Object(map)) => map
                .iter()
                .map(|(k, v)| (k.clone(), value_to_string(v)))
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// Texto de un valor: las cadenas tal cual y el resto como JSON.
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn into_items(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        Value::Null => Vec::new(),
        other => vec![other],
    }
}

/// Construye un [`Command`] a partir de sus parámetros declarados.
pub struct CommandBuilder {
    name: String,
    description: Option<String>,
    timed: bool,
    debug: bool,
    parameters: Vec<Parameter>,
    arg_config: HashMap<String, ArgConfig>,
    default_args: Map<String, Value>,
    callbacks: Vec<Callback>,
    implementation: Option<Implementation>,
    subcommands: Vec<Command>,
}

impl CommandBuilder {
    /// El nombre del comando sale del de la implementación, normalizado.
    pub fn new(implementation_name: &str) -> Self {
        Self {
            name: normalize_name(implementation_name),
            description: None,
            timed: false,
            debug: false,
            parameters: Vec::new(),
            arg_config: HashMap::new(),
            default_args: Map::new(),
            callbacks: Vec::new(),
            implementation: None,
            subcommands: Vec::new(),
        }
    }

    /// Para comandos definidos como tipos: `SomeCommand` -> `some-command`.
    pub fn for_type(type_name: &str) -> Self {
        let mut builder = Self::new(type_name);
        builder.name = normalize_type_name(type_name);
        builder
    }

    /// Un nombre explícito; no se normaliza.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn timed(mut self, timed: bool) -> Self {
        self.timed = timed;
        self
    }

    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn param(mut self, parameter: Parameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    pub fn params<I: IntoIterator<Item = Parameter>>(mut self, parameters: I) -> Self {
        self.parameters.extend(parameters);
        self
    }

    /// Configuración para un parámetro sin anotación, por nombre de
    /// parámetro.
    pub fn arg_config(mut self, param_name: impl Into<String>, config: impl Into<ArgConfig>) -> Self {
        self.arg_config.insert(param_name.into(), config.into());
        self
    }

    pub fn default_arg(mut self, param_name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.default_args.insert(param_name.into(), value.into());
        self
    }

    pub fn callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(&Command, &Value, bool) + Send + Sync + 'static,
    {
        self.callbacks.push(Arc::new(callback));
        self
    }

    pub fn implementation<F>(mut self, implementation: F) -> Self
    where
        F: Fn(&CallArgs) -> RunResult<Value> + Send + Sync + 'static,
    {
        self.implementation = Some(Arc::new(implementation));
        self
    }

    pub fn subcommand(mut self, subcommand: Command) -> Self {
        self.subcommands.push(subcommand);
        self
    }

    /// Deriva los argumentos y valida la declaración. Los errores son de
    /// programación del comando.
    pub fn build(self) -> RunResult<Command> {
        let name = self.name;
        let implementation = self.implementation.ok_or_else(|| {
            RunError::command(format!("Falta la implementación del comando `{}`", name))
        })?;

        let mut seen_params = HashSet::new();
        for param in &self.parameters {
            if !seen_params.insert(param.name.as_str()) {
                return Err(RunError::command(format!(
                    "El parámetro `{}` del comando `{}` está repetido",
                    param.name, name
                )));
            }
        }

        let arg_config_for = |param: &Parameter| -> ArgConfig {
            param
                .annotation
                .clone()
                .or_else(|| self.arg_config.get(&param.name).cloned())
                .unwrap_or_default()
        };

        let included: Vec<&Parameter> =
            self.parameters.iter().filter(|p| !p.is_excluded()).collect();

        // Las opciones cortas explícitas se reservan antes de derivar ninguna.
        let mut used_short = HashSet::new();
        for param in &included {
            if let Some(short) = arg_config_for(param).short_option {
                used_short.insert(short);
            }
        }

        let mut args: IndexMap<String, Arg> = IndexMap::new();
        for param in &included {
            let config = arg_config_for(param);
            let arg = Arg::derive(param, &config, &name, &mut used_short)?;
            if args.contains_key(&arg.name) {
                return Err(RunError::command(format!(
                    "Los parámetros del comando `{}` producen dos argumentos `{}`",
                    name, arg.name
                )));
            }
            args.insert(arg.name.clone(), arg);
        }

        let default_help = !args.contains_key("help");
        if default_help {
            args.insert("help".to_string(), Arg::help_arg());
        }

        let mut owners: IndexMap<&str, Vec<&str>> = IndexMap::new();
        for arg in args.values() {
            for option in &arg.all_options {
                owners.entry(option.as_str()).or_default().push(arg.dest.as_str());
            }
        }
        // Un posicional con argumento por defecto se expone como `--nombre`.
        for arg in args.values().filter(|arg| arg.is_positional) {
            let long = format!("--{}", arg.name);
            if let Some(dests) = owners.get(long.as_str()) {
                return Err(RunError::command(format!(
                    "La opción {} del comando {} corresponde a varios parámetros: {}, {}",
                    long,
                    name,
                    arg.dest,
                    dests.join(", ")
                )));
            }
        }
        for (option, dests) in &owners {
            if dests.len() > 1 {
                return Err(RunError::command(format!(
                    "La opción {} del comando {} corresponde a varios parámetros: {}",
                    option,
                    name,
                    dests.join(", ")
                )));
            }
        }

        let mut option_map = IndexMap::new();
        for arg in args.values() {
            for option in &arg.options {
                option_map.insert(option.clone(), arg.name.clone());
            }
        }

        let first_arg_has_choices = args
            .values()
            .next()
            .is_some_and(|arg| arg.choices.is_some());

        let description = self.description.as_deref().and_then(process_description);
        let short_description = description
            .as_deref()
            .and_then(|d| d.lines().next())
            .map(String::from);

        let mut command = Command {
            base_name: name.clone(),
            name,
            description,
            short_description,
            timed: self.timed,
            debug: self.debug,
            parameters: self.parameters,
            args,
            option_map,
            default_help,
            default_args: self.default_args,
            base_command: None,
            depth: 0,
            subcommands: Vec::new(),
            first_arg_has_choices,
            callbacks: self.callbacks,
            implementation,
        };

        for subcommand in self.subcommands {
            command.add_subcommand(subcommand)?;
        }

        Ok(command)
    }
}

/// Un comando: una implementación y el parser derivado de sus parámetros.
#[derive(Clone)]
pub struct Command {
    name: String,
    base_name: String,
    description: Option<String>,
    short_description: Option<String>,
    timed: bool,
    debug: bool,
    parameters: Vec<Parameter>,
    args: IndexMap<String, Arg>,
    /// Opción -> nombre del argumento. Solo opciones directas, no inversas.
    option_map: IndexMap<String, String>,
    default_help: bool,
    default_args: Map<String, Value>,
    /// Nombre cualificado del comando base.
    base_command: Option<String>,
    depth: usize,
    subcommands: Vec<Command>,
    first_arg_has_choices: bool,
    callbacks: Vec<Callback>,
    implementation: Implementation,
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("name", &self.name)
            .field("args", &self.args.keys().collect::<Vec<_>>())
            .field("default_args", &self.default_args)
            .field("subcommands", &self.subcommands)
            .finish()
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.usage())
    }
}

impl Command {
    pub fn builder(implementation_name: &str) -> CommandBuilder {
        CommandBuilder::new(implementation_name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// El nombre sin el prefijo de los comandos base.
    pub fn base_name(&self) -> &str {
        &self.base_name
    }

    /// El nombre con el que aparece en la ayuda: `base sub`.
    pub fn prog_name(&self) -> String {
        self.name.replace(':', " ")
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn short_description(&self) -> Option<&str> {
        self.short_description.as_deref()
    }

    pub fn is_timed(&self) -> bool {
        self.timed
    }

    pub fn is_debug(&self) -> bool {
        self.debug
    }

    pub fn set_debug(&mut self, debug: bool) {
        self.debug = debug;
        for subcommand in &mut self.subcommands {
            subcommand.set_debug(debug);
        }
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub fn args(&self) -> &IndexMap<String, Arg> {
        &self.args
    }

    pub fn has_kwargs(&self) -> bool {
        self.parameters.iter().any(Parameter::is_var_keyword)
    }

    pub fn uses_default_help(&self) -> bool {
        self.default_help
    }

    /// Busca un argumento por nombre normalizado o por nombre de parámetro.
    pub fn find_arg(&self, name: &str) -> Option<&Arg> {
        self.args.get(&normalize_name(name))
    }

    /// Busca un parámetro por nombre o por nombre de argumento.
    pub fn find_parameter(&self, name: &str) -> Option<&Parameter> {
        let arg = self.find_arg(name)?;
        self.parameters.iter().find(|p| p.name == arg.dest)
    }

    /// El argumento de una opción exacta (`-c`, `--cd`).
    pub fn find_option(&self, option: &str) -> Option<&Arg> {
        self.option_map.get(option).and_then(|name| self.args.get(name))
    }

    /// Interpreta `--opt`, `--opt=valor` o `-o=valor` si la opción es del
    /// comando.
    pub fn parse_optional<'a>(&self, token: &'a str) -> Option<(&'a str, &Arg, Option<&'a str>)> {
        if let Some(arg) = self.find_option(token) {
            return Some((token, arg, None));
        }
        let (name, value) = token.split_once('=')?;
        self.find_option(name).map(|arg| (name, arg, Some(value)))
    }

    pub fn positionals(&self) -> impl Iterator<Item = &Arg> {
        self.args.values().filter(|arg| arg.is_positional)
    }

    pub fn optionals(&self) -> impl Iterator<Item = &Arg> {
        self.args
            .values()
            .filter(|arg| arg.is_optional && !arg.is_positional && !arg.is_var_positional)
    }

    pub fn var_positional(&self) -> Option<&Arg> {
        self.args.values().find(|arg| arg.is_var_positional)
    }

    pub fn default_args(&self) -> &Map<String, Value> {
        &self.default_args
    }

    pub fn set_default_args(&mut self, default_args: Map<String, Value>) {
        self.default_args = default_args;
    }

    pub fn callbacks(&self) -> &[Callback] {
        &self.callbacks
    }

    pub fn subcommands(&self) -> &[Command] {
        &self.subcommands
    }

    pub fn is_base_command(&self) -> bool {
        !self.subcommands.is_empty()
    }

    pub fn is_subcommand(&self) -> bool {
        self.base_command.is_some()
    }

    pub fn base_command(&self) -> Option<&str> {
        self.base_command.as_deref()
    }

    pub fn subcommand_depth(&self) -> usize {
        self.depth
    }

    /// Añade un subcomando. Su nombre pasa a ser `base:sub` y su nombre
    /// base se añade a las opciones del primer argumento del comando base.
    pub fn add_subcommand(&mut self, mut subcommand: Command) -> RunResult<()> {
        let first_is_real = self
            .args
            .values()
            .next()
            .is_some_and(|arg| !(self.default_help && arg.dest == "help"));
        if !first_is_real {
            return Err(RunError::command(format!(
                "El comando base `{}` necesita un primer argumento para elegir el subcomando",
                self.name
            )));
        }

        subcommand.qualify(&self.name, self.depth + 1);

        if !self.first_arg_has_choices {
            if let Some(first) = self.args.values_mut().next() {
                first
                    .choices
                    .get_or_insert_with(|| Choices::Values(Vec::new()))
                    .push(subcommand.base_name.clone());
            }
        }

        self.subcommands.push(subcommand);
        Ok(())
    }

    fn qualify(&mut self, base: &str, depth: usize) {
        self.name = format!("{}:{}", base, self.base_name);
        self.base_command = Some(base.to_string());
        self.depth = depth;
        let name = self.name.clone();
        for subcommand in &mut self.subcommands {
            subcommand.qualify(&name, depth + 1);
        }
    }

    pub fn find_subcommand(&self, base_name: &str) -> Option<&Command> {
        self.subcommands.iter().find(|s| s.base_name == base_name)
    }

    pub fn help(&self) -> String {
        parser::render_help(self)
    }

    pub fn usage(&self) -> String {
        parser::render_usage(self)
    }

    pub fn show_help(&self) {
        println!("{}", self.help());
    }

    pub fn expand_short_options<'a>(&self, argv: &'a [String]) -> Cow<'a, [String]> {
        partition::expand_short_options(self, argv)
    }

    /// Parsea el argv del comando (expandiendo antes las opciones cortas
    /// agrupadas).
    pub fn parse_args(&self, argv: &[String]) -> RunResult<ParsedArgs> {
        log::debug!("Parseando argumentos de `{}`: {:?}", self.name, argv);
        let argv = self.expand_short_options(argv);
        parser::parse(self, &argv)
    }

    /// Resuelve los valores parseados en los argumentos de la llamada.
    ///
    /// Prioridad: valores explícitos y `overrides`, luego los argumentos
    /// por defecto del comando, luego los valores por defecto de los
    /// parámetros.
    pub fn bind(&self, parsed: ParsedArgs, overrides: Map<String, Value>) -> RunResult<CallArgs> {
        let mut kwargs = parsed;
        kwargs.extend(overrides);

        let mut passed = Vec::new();
        for arg in self.positionals() {
            let value = match kwargs.shift_remove(&arg.dest) {
                Some(value) => value,
                None => match self.default_args.get(&arg.dest).or(arg.default.as_ref()) {
                    Some(value) => value.clone(),
                    None => {
                        return Err(RunError::Internal(format!(
                            "falta el valor del argumento posicional `{}` del comando `{}`",
                            arg.dest, self.name
                        )));
                    }
                },
            };
            passed.push(value);
        }

        if let Some(var) = self.var_positional() {
            if let Some(value) = kwargs.shift_remove(&var.dest) {
                passed.extend(into_items(value));
            }
        }

        self.bind_call(passed, kwargs)
    }

    /// Resuelve una llamada directa: valores posicionales y por nombre.
    ///
    /// Los posicionales de más van al parámetro variádico si existe y, si
    /// no, a los opcionales en orden de declaración.
    pub fn bind_call(
        &self,
        passed: Vec<Value>,
        mut kwargs: IndexMap<String, Value>,
    ) -> RunResult<CallArgs> {
        let mut call = CallArgs::default();
        let mut passed = passed.into_iter();

        for arg in self.positionals() {
            let value = match passed.next() {
                Some(value) => value,
                None => match kwargs.shift_remove(&arg.dest) {
                    Some(value) => value,
                    None => match self.default_args.get(&arg.dest).or(arg.default.as_ref()) {
                        Some(value) => value.clone(),
                        None => {
                            return Err(RunError::Internal(format!(
                                "falta el valor del argumento posicional `{}` del comando `{}`",
                                arg.dest, self.name
                            )));
                        }
                    },
                },
            };
            call.positional.push((arg.dest.clone(), value));
        }

        let extra: Vec<Value> = passed.collect();
        if let Some(var) = self.var_positional() {
            call.var_args = if !extra.is_empty() {
                extra
            } else if let Some(value) = self.default_args.get(&var.dest) {
                into_items(value.clone())
            } else {
                var.default.clone().map(into_items).unwrap_or_default()
            };
        } else if !extra.is_empty() {
            let optionals: Vec<&Arg> = self
                .optionals()
                .filter(|arg| !(self.default_help && arg.dest == "help"))
                .collect();
            if extra.len() > optionals.len() {
                return Err(RunError::Internal(format!(
                    "el comando `{}` recibió {} valores posicionales de más",
                    self.name,
                    extra.len() - optionals.len()
                )));
            }
            for (arg, value) in optionals.into_iter().zip(extra) {
                kwargs.insert(arg.dest.clone(), value);
            }
        }

        for param in &self.parameters {
            let bound_positionally = call.positional.iter().any(|(name, _)| *name == param.name);
            if bound_positionally || param.is_var_positional() || param.is_var_keyword() {
                continue;
            }
            let value = kwargs
                .shift_remove(&param.name)
                .or_else(|| self.default_args.get(&param.name).cloned())
                .or_else(|| param.default.clone());
            match value {
                Some(value) => {
                    call.keywords.insert(param.name.clone(), value);
                }
                None => {
                    return Err(RunError::Internal(format!(
                        "falta el argumento `{}` del comando `{}`",
                        param.name, self.name
                    )));
                }
            }
        }

        if self.has_kwargs() {
            for (name, value) in &self.default_args {
                if call.get(name).is_none() && !kwargs.contains_key(name) {
                    call.keywords.insert(name.clone(), value.clone());
                }
            }
            call.keywords.extend(kwargs);
        } else if let Some(name) = kwargs.keys().next() {
            return Err(RunError::Internal(format!(
                "el comando `{}` no tiene el parámetro `{}`",
                self.name, name
            )));
        }

        Ok(call)
    }

    /// Llama a la implementación con valores ya resueltos.
    pub fn call(&self, passed: Vec<Value>, kwargs: IndexMap<String, Value>) -> RunResult<Value> {
        let call = self.bind_call(passed, kwargs)?;
        self.invoke(&call)
    }

    fn invoke(&self, call: &CallArgs) -> RunResult<Value> {
        log::debug!("Ejecutando `{}` con {:?}", self.name, call);
        let start = Instant::now();
        let result = (self.implementation)(call);
        if self.timed {
            self.print_elapsed_time(start.elapsed().as_secs_f64());
        }
        result
    }

    fn print_elapsed_time(&self, elapsed: f64) {
        let minutes = (elapsed / 60.0).floor();
        let seconds = elapsed - minutes * 60.0;
        let hr = printer::get_hr();
        printer::info(&format!(
            "{}\nTiempo transcurrido para el comando {}: {}m {:.3}s\n{}",
            hr, self.name, minutes as u64, seconds, hr
        ));
    }

    /// Ejecuta el comando con los valores de un parseo.
    pub fn run_parsed(&self, parsed: ParsedArgs, overrides: Map<String, Value>) -> RunResult<Value> {
        let call = self.bind(parsed, overrides)?;
        self.invoke(&call)
    }

    /// Parsea `argv` y ejecuta el comando.
    pub fn run(&self, argv: &[String], overrides: Map<String, Value>) -> RunResult<Value> {
        self.run_argv(argv, overrides, true)
    }

    pub(crate) fn run_argv(
        &self,
        argv: &[String],
        overrides: Map<String, Value>,
        expand: bool,
    ) -> RunResult<Value> {
        if self.is_base_command() {
            return self.run_subcommands(argv, overrides);
        }
        let argv = if expand {
            self.expand_short_options(argv)
        } else {
            Cow::Borrowed(argv)
        };
        if self.default_help && partition::help_requested(self, &argv) {
            self.show_help();
            return Ok(Value::Null);
        }
        let parsed = parser::parse(self, &argv)?;
        self.run_parsed(parsed, overrides)
    }

    /// Separa el argv de un comando base en el de cada subcomando.
    ///
    /// Los tokens con `:` delante se desescapan y nunca eligen subcomando.
    pub fn split_subcommands(&self, argv: &[String]) -> Vec<(&Command, Vec<String>)> {
        let mut base_argv = Vec::new();
        for (i, token) in argv.iter().enumerate() {
            if let Some(escaped) = token.strip_prefix(':') {
                base_argv.push(escaped.to_string());
                continue;
            }
            base_argv.push(token.clone());
            if let Some(subcommand) = self.find_subcommand(token) {
                let remaining = &argv[i + 1..];
                log::debug!(
                    "Subcomando `{}` encontrado; argv base {:?}, resto {:?}",
                    subcommand.name,
                    base_argv,
                    remaining
                );
                let mut pieces = vec![(self, base_argv)];
                if subcommand.is_base_command() {
                    pieces.extend(subcommand.split_subcommands(remaining));
                } else {
                    pieces.push((subcommand, remaining.to_vec()));
                }
                return pieces;
            }
        }
        vec![(self, base_argv)]
    }

    /// Parsea el argv de un comando base y de sus subcomandos.
    ///
    /// Los argumentos opcionales de cada comando base pasan a los
    /// subcomandos que declaran el mismo argumento y no lo recibieron.
    pub fn partition_subcommands(&self, argv: &[String]) -> RunResult<Vec<(&Command, ParsedArgs)>> {
        let pieces = self.split_subcommands(argv);
        Self::parse_pieces(pieces)
    }

    fn parse_pieces(pieces: Vec<(&Command, Vec<String>)>) -> RunResult<Vec<(&Command, ParsedArgs)>> {
        let mut commands = Vec::with_capacity(pieces.len());
        for (command, argv) in pieces {
            let parsed = command.parse_args(&argv)?;
            commands.push((command, parsed));
        }

        if let Some((first, first_args)) = commands.first() {
            let mut base_command: &Command = first;
            let mut base_args = first_args.clone();
            for (subcommand, sub_args) in commands.iter_mut().skip(1) {
                for (name, value) in &base_args {
                    let is_optional = base_command.find_arg(name).is_some_and(|a| a.is_optional);
                    if !sub_args.contains_key(name)
                        && is_optional
                        && subcommand.find_arg(name).is_some()
                    {
                        sub_args.insert(name.clone(), value.clone());
                    }
                }
                base_command = subcommand;
                base_args.extend(sub_args.clone());
            }
        }

        Ok(commands)
    }

    fn run_subcommands(&self, argv: &[String], overrides: Map<String, Value>) -> RunResult<Value> {
        let pieces = self.split_subcommands(argv);
        for (command, command_argv) in &pieces {
            let command_argv = command.expand_short_options(command_argv);
            if command.default_help && partition::help_requested(command, &command_argv) {
                command.show_help();
                return Ok(Value::Null);
            }
        }
        let mut result = Value::Null;
        for (command, parsed) in Self::parse_pieces(pieces)? {
            result = command.run_parsed(parsed, overrides.clone())?;
        }
        Ok(result)
    }

    /// Punto de entrada de consola: ejecuta el comando, informa del error si
    /// lo hay y devuelve el código de salida.
    pub fn console_script(&self, argv: &[String], overrides: Map<String, Value>) -> i32 {
        match self.run(argv, overrides) {
            Ok(_) => 0,
            Err(error) => {
                if self.debug {
                    log::debug!("Error en `{}`: {:?}", self.name, error);
                }
                error.report()
            }
        }
    }
}
