use std::collections::{HashMap, VecDeque};

use tracing::warn;

use crate::app::{SceneDebugCommand, SceneKey};

use super::ConsoleState;

const MAX_PENDING_DEBUG_COMMANDS: usize = 64;

/// Commands executed by the loop runner after console processing.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum DebugCommand {
    ResetScene,
    SwitchScene { scene: SceneKey },
    Quit,
    Scene(SceneDebugCommand),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum LocalAction {
    Help,
    Clear,
    Echo { text: String },
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ParsedCommand {
    Local(LocalAction),
    Queueable(DebugCommand),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct CommandParseError {
    reason: String,
    usage: String,
}

impl CommandParseError {
    fn new(reason: impl Into<String>, usage: &str) -> Self {
        Self {
            reason: reason.into(),
            usage: usage.to_string(),
        }
    }
}

type ParseFn = dyn Fn(&[String]) -> Result<ParsedCommand, CommandParseError> + Send + Sync;

struct CommandSpec {
    name: String,
    help: String,
    arg_schema: String,
    parse: Box<ParseFn>,
}

type BuiltinParse = fn(&[String]) -> Result<ParsedCommand, CommandParseError>;

const BUILTIN_COMMANDS: &[(&str, &str, &str, BuiltinParse)] = &[
    ("help", "List commands", "", parse_help),
    ("clear", "Clear console output", "", parse_clear),
    ("echo", "Print text", "<text...>", parse_echo),
    ("quit", "Quit app", "", parse_quit),
    ("reset_scene", "Reload active stage", "", parse_reset_scene),
    ("switch_scene", "Switch stage", "<a|b>", parse_switch_scene),
    ("params", "List tunable params", "", parse_params),
    ("get", "Show param value", "<name>", parse_get),
    ("set", "Set param value", "<name> <value>", parse_set),
    ("anim", "Play clip on selected actor", "<clip>", parse_anim),
    ("select", "Select actor by id", "<actor_id:u64>", parse_select),
    ("dump_state", "Print stage state", "", parse_dump_state),
];

pub(crate) struct ConsoleCommandRegistry {
    specs: Vec<CommandSpec>,
    lookup_by_lower_name: HashMap<String, usize>,
}

impl ConsoleCommandRegistry {
    pub(crate) fn new() -> Self {
        Self {
            specs: Vec::new(),
            lookup_by_lower_name: HashMap::new(),
        }
    }

    pub(crate) fn with_builtins() -> Self {
        let mut registry = Self::new();
        for (name, help, arg_schema, parse) in BUILTIN_COMMANDS {
            if let Err(error) = registry.register(*name, *help, *arg_schema, *parse) {
                warn!(command = name, error = %error, "console_builtin_rejected");
            }
        }
        registry
    }

    pub(crate) fn register<F>(
        &mut self,
        name: impl Into<String>,
        help: impl Into<String>,
        arg_schema: impl Into<String>,
        parse: F,
    ) -> Result<(), String>
    where
        F: Fn(&[String]) -> Result<ParsedCommand, CommandParseError> + Send + Sync + 'static,
    {
        let name = name.into();
        if name.trim().is_empty() {
            return Err("command name cannot be empty".to_string());
        }
        let lower = name.to_ascii_lowercase();
        if self.lookup_by_lower_name.contains_key(&lower) {
            return Err(format!("duplicate command registration: {name}"));
        }
        self.specs.push(CommandSpec {
            name,
            help: help.into(),
            arg_schema: arg_schema.into(),
            parse: Box::new(parse),
        });
        self.lookup_by_lower_name.insert(lower, self.specs.len() - 1);
        Ok(())
    }

    fn lookup(&self, input_name: &str) -> Option<&CommandSpec> {
        let index = self
            .lookup_by_lower_name
            .get(&input_name.to_ascii_lowercase())?;
        self.specs.get(*index)
    }

    pub(crate) fn command_names(&self) -> Vec<String> {
        self.specs.iter().map(|spec| spec.name.clone()).collect()
    }

    fn help_lines(&self) -> impl Iterator<Item = String> + '_ {
        self.specs.iter().map(|spec| {
            if spec.arg_schema.is_empty() {
                format!("{} - {}", spec.name, spec.help)
            } else {
                format!("{} {} - {}", spec.name, spec.arg_schema, spec.help)
            }
        })
    }
}

/// Turns submitted console lines into local actions (applied immediately)
/// and queued [`DebugCommand`]s (applied by the loop runner).
pub(crate) struct ConsoleCommandProcessor {
    registry: ConsoleCommandRegistry,
    pending_debug_commands: VecDeque<DebugCommand>,
}

impl Default for ConsoleCommandProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsoleCommandProcessor {
    pub(crate) fn new() -> Self {
        Self {
            registry: ConsoleCommandRegistry::with_builtins(),
            pending_debug_commands: VecDeque::new(),
        }
    }

    pub(crate) fn command_names(&self) -> Vec<String> {
        self.registry.command_names()
    }

    pub(crate) fn process_pending_lines(&mut self, console: &mut ConsoleState) {
        let mut lines = Vec::new();
        console.drain_pending_lines_into(&mut lines);
        for raw_line in lines {
            self.process_line(console, &raw_line);
        }
    }

    pub(crate) fn drain_pending_debug_commands_into(&mut self, out: &mut Vec<DebugCommand>) {
        out.extend(self.pending_debug_commands.drain(..));
    }

    fn process_line(&mut self, console: &mut ConsoleState, raw_line: &str) {
        let tokens = match tokenize_line(raw_line.trim()) {
            Ok(tokens) => tokens,
            Err(reason) => {
                console.append_output_line(format!("error: {reason}. usage: help"));
                return;
            }
        };
        let Some((command_name, args)) = tokens.split_first() else {
            return;
        };
        let Some(spec) = self.registry.lookup(command_name) else {
            console.append_output_line(format!("error: unknown command '{command_name}'. try: help"));
            return;
        };

        match (spec.parse)(args) {
            Ok(ParsedCommand::Local(action)) => self.apply_local_action(console, action),
            Ok(ParsedCommand::Queueable(command)) => {
                while self.pending_debug_commands.len() >= MAX_PENDING_DEBUG_COMMANDS {
                    self.pending_debug_commands.pop_front();
                }
                self.pending_debug_commands.push_back(command);
            }
            Err(error) => console
                .append_output_line(format!("error: {}. usage: {}", error.reason, error.usage)),
        }
    }

    fn apply_local_action(&self, console: &mut ConsoleState, action: LocalAction) {
        match action {
            LocalAction::Help => {
                for line in self.registry.help_lines() {
                    console.append_output_line(line);
                }
            }
            LocalAction::Clear => console.clear_output_lines(),
            LocalAction::Echo { text } => console.append_output_line(text),
        }
    }
}

/// Whitespace split with double-quoted tokens; `""` yields an empty token.
fn tokenize_line(line: &str) -> Result<Vec<String>, String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut token_started = false;

    for ch in line.chars() {
        match ch {
            '"' => {
                in_quotes = !in_quotes;
                token_started = true;
            }
            c if c.is_whitespace() && !in_quotes => {
                if token_started {
                    tokens.push(std::mem::take(&mut current));
                    token_started = false;
                }
            }
            _ => {
                current.push(ch);
                token_started = true;
            }
        }
    }
    if in_quotes {
        return Err("unterminated quoted string".to_string());
    }
    if token_started {
        tokens.push(current);
    }
    Ok(tokens)
}

fn require_no_args(args: &[String], usage: &str) -> Result<(), CommandParseError> {
    if args.is_empty() {
        Ok(())
    } else {
        Err(CommandParseError::new("unexpected extra arguments", usage))
    }
}

fn require_one_arg<'a>(args: &'a [String], what: &str, usage: &str) -> Result<&'a str, CommandParseError> {
    match args {
        [only] => Ok(only.as_str()),
        _ => Err(CommandParseError::new(
            format!("expected exactly one argument <{what}>"),
            usage,
        )),
    }
}

fn parse_help(args: &[String]) -> Result<ParsedCommand, CommandParseError> {
    require_no_args(args, "help")?;
    Ok(ParsedCommand::Local(LocalAction::Help))
}

fn parse_clear(args: &[String]) -> Result<ParsedCommand, CommandParseError> {
    require_no_args(args, "clear")?;
    Ok(ParsedCommand::Local(LocalAction::Clear))
}

fn parse_echo(args: &[String]) -> Result<ParsedCommand, CommandParseError> {
    if args.is_empty() {
        return Err(CommandParseError::new(
            "missing required argument <text...>",
            "echo <text...>",
        ));
    }
    Ok(ParsedCommand::Local(LocalAction::Echo {
        text: args.join(" "),
    }))
}

fn parse_quit(args: &[String]) -> Result<ParsedCommand, CommandParseError> {
    require_no_args(args, "quit")?;
    Ok(ParsedCommand::Queueable(DebugCommand::Quit))
}

fn parse_reset_scene(args: &[String]) -> Result<ParsedCommand, CommandParseError> {
    require_no_args(args, "reset_scene")?;
    Ok(ParsedCommand::Queueable(DebugCommand::ResetScene))
}

fn parse_switch_scene(args: &[String]) -> Result<ParsedCommand, CommandParseError> {
    const USAGE: &str = "switch_scene <a|b>";
    let raw = require_one_arg(args, "scene", USAGE)?;
    let scene = match raw.to_ascii_lowercase().as_str() {
        "a" | "single" => SceneKey::A,
        "b" | "spiders" => SceneKey::B,
        _ => {
            return Err(CommandParseError::new(
                format!("unknown scene '{raw}' (expected a|b)"),
                USAGE,
            ))
        }
    };
    Ok(ParsedCommand::Queueable(DebugCommand::SwitchScene { scene }))
}

fn parse_params(args: &[String]) -> Result<ParsedCommand, CommandParseError> {
    require_no_args(args, "params")?;
    Ok(ParsedCommand::Queueable(DebugCommand::Scene(
        SceneDebugCommand::ListParams,
    )))
}

fn parse_get(args: &[String]) -> Result<ParsedCommand, CommandParseError> {
    let name = require_one_arg(args, "name", "get <name>")?;
    Ok(ParsedCommand::Queueable(DebugCommand::Scene(
        SceneDebugCommand::GetParam {
            name: name.to_string(),
        },
    )))
}

fn parse_set(args: &[String]) -> Result<ParsedCommand, CommandParseError> {
    let [name, value] = args else {
        return Err(CommandParseError::new(
            "expected <name> <value>",
            "set <name> <value>",
        ));
    };
    Ok(ParsedCommand::Queueable(DebugCommand::Scene(
        SceneDebugCommand::SetParam {
            name: name.clone(),
            value: value.clone(),
        },
    )))
}

fn parse_anim(args: &[String]) -> Result<ParsedCommand, CommandParseError> {
    let clip = require_one_arg(args, "clip", "anim <clip>")?;
    Ok(ParsedCommand::Queueable(DebugCommand::Scene(
        SceneDebugCommand::PlayClip {
            clip: clip.to_string(),
        },
    )))
}

fn parse_select(args: &[String]) -> Result<ParsedCommand, CommandParseError> {
    const USAGE: &str = "select <actor_id>";
    let raw = require_one_arg(args, "actor_id", USAGE)?;
    let actor_id = raw.parse::<u64>().map_err(|_| {
        CommandParseError::new(format!("invalid actor id '{raw}' (expected u64)"), USAGE)
    })?;
    Ok(ParsedCommand::Queueable(DebugCommand::Scene(
        SceneDebugCommand::Select { actor_id },
    )))
}

fn parse_dump_state(args: &[String]) -> Result<ParsedCommand, CommandParseError> {
    require_no_args(args, "dump_state")?;
    Ok(ParsedCommand::Queueable(DebugCommand::Scene(
        SceneDebugCommand::DumpState,
    )))
}
