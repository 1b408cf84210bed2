//! Action descriptor reader.
//!
//! An action `name` is described by sibling keys of the control file:
//! `name` (method or block), `name.param.N` (positional arguments) and
//! `name.<modifier>` keys. Everything is read lazily and substituted with
//! the current variables on every read.

use std::fmt;

use crate::context::Variables;
use crate::control::ControlFile;
use crate::template::substitute;

/// Primitives that take the action name as their instance name when the
/// argument is omitted, with the argument-list length (method included)
/// that triggers the completion.
const NAME_COMPLETING_PRIMITIVES: [(&str, usize); 3] = [
    ("objectStreamOpen", 3),
    ("namedInstanceAdd", 2),
    ("namedInstanceReplace", 2),
];

/// Modifier keys recognized on an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Modifier {
    Repeat,
    Foreach,
    RepeatUntilException,
    IgnoreException,
    LoopVariable,
    PostponeUntil,
    OutputFile,
    Assign,
    Description,
    DescriptionAfter,
    RepeatEvery,
}

impl Modifier {
    /// Key suffix used in control files.
    pub fn key(&self) -> &'static str {
        match self {
            Modifier::Repeat => "repeat",
            Modifier::Foreach => "foreach",
            Modifier::RepeatUntilException => "repeatUntilException",
            Modifier::IgnoreException => "ignoreException",
            Modifier::LoopVariable => "loopVariable",
            Modifier::PostponeUntil => "postponeUntil",
            Modifier::OutputFile => "outputFile",
            Modifier::Assign => "assign",
            Modifier::Description => "description",
            Modifier::DescriptionAfter => "descriptionAfter",
            Modifier::RepeatEvery => "repeatEvery",
        }
    }

    /// Full control-file key of this modifier for `action`.
    pub fn key_for(&self, action: &str) -> String {
        format!("{}.{}", action, self.key())
    }
}

impl fmt::Display for Modifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Read the method (or block) name of an action.
///
/// Defaults to the action name itself when the action has no key.
pub fn read_method_name(config: &ControlFile, action: &str, variables: &Variables) -> String {
    match substitute(config.get(action), variables) {
        Some(method) => unquote(&method),
        None => action.to_string(),
    }
}

/// Read the argument list of an action.
///
/// Position 0 holds the method name, followed by `action.param.1`,
/// `action.param.2`, ... until the first missing index. Every entry is
/// substituted, unquoted and trimmed.
pub fn read_arguments(config: &ControlFile, action: &str, variables: &Variables) -> Vec<String> {
    let method = read_method_name(config, action, variables);

    let mut arguments = vec![method];
    for index in 1.. {
        let key = format!("{}.param.{}", action, index);
        match config.get(&key) {
            Some(raw) => {
                let value = substitute(Some(raw), variables).unwrap_or_default();
                arguments.push(unquote(&value));
            }
            None => break,
        }
    }

    if let Some((_, expected)) = NAME_COMPLETING_PRIMITIVES
        .iter()
        .find(|(name, _)| *name == arguments[0])
    {
        if arguments.len() == *expected {
            arguments.push(action.to_string());
        }
    }

    arguments
}

/// Read a modifier of an action, substituted with the current variables.
pub fn read_modifier(
    config: &ControlFile,
    action: &str,
    modifier: Modifier,
    variables: &Variables,
) -> Option<String> {
    substitute(config.get(&modifier.key_for(action)), variables)
}

/// Trim and remove one pair of surrounding double quotes.
pub fn unquote(text: &str) -> String {
    let trimmed = text.trim();
    match trimmed
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
    {
        Some(inner) => inner.to_string(),
        None => trimmed.to_string(),
    }
}

/// Snapshot of an action's definition resolved against the variables at
/// the start of one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionDescriptor {
    /// Action name.
    pub name: String,

    pub repeat: Option<String>,
    pub foreach: Option<String>,
    pub repeat_until_exception: Option<String>,
    pub ignore_exception: Option<String>,
    pub loop_variable: Option<String>,
    pub postpone_until: Option<String>,
    pub output_file: Option<String>,
    pub assign: Option<String>,
    pub repeat_every: Option<String>,
}

impl ActionDescriptor {
    /// Read the descriptor of `action`.
    pub fn read(config: &ControlFile, action: &str, variables: &Variables) -> Self {
        let modifier = |m: Modifier| read_modifier(config, action, m, variables);
        Self {
            name: action.to_string(),
            repeat: modifier(Modifier::Repeat),
            foreach: modifier(Modifier::Foreach),
            repeat_until_exception: modifier(Modifier::RepeatUntilException),
            ignore_exception: modifier(Modifier::IgnoreException),
            loop_variable: modifier(Modifier::LoopVariable),
            postpone_until: modifier(Modifier::PostponeUntil),
            output_file: modifier(Modifier::OutputFile),
            assign: modifier(Modifier::Assign),
            repeat_every: modifier(Modifier::RepeatEvery),
        }
    }

    /// Name of the loop variable, defaulting to the action name.
    pub fn loop_variable_name(&self) -> &str {
        self.loop_variable
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_defaults_to_action_name() {
        let config = ControlFile::parse("other = echo\n");
        assert_eq!(read_method_name(&config, "help", &Variables::new()), "help");
        assert_eq!(read_arguments(&config, "help", &Variables::new()), vec!["help"]);
    }

    #[test]
    fn test_arguments_stop_at_first_gap() {
        let config = ControlFile::parse(
            "a = echo\na.param.1 = one\na.param.2 = two\na.param.3 = three\na.param.5 = five\n",
        );
        let args = read_arguments(&config, "a", &Variables::new());
        assert_eq!(args, vec!["echo", "one", "two", "three"]);
    }

    #[test]
    fn test_arguments_substituted_and_unquoted() {
        let config = ControlFile::parse(
            "a = <cmd:echo>\na.param.1 = \"  spaced <x>  \"\na.param.2 =   <y:dflt>  \n",
        );
        let mut vars = Variables::new();
        vars.set("x", "value");
        let args = read_arguments(&config, "a", &vars);
        assert_eq!(args, vec!["echo", "  spaced value  ", "dflt"]);
    }

    #[test]
    fn test_object_stream_name_completion() {
        let config = ControlFile::parse(
            "myStream = objectStreamOpen\nmyStream.param.1 = file.dat\nmyStream.param.2 = some.Class\n",
        );
        let args = read_arguments(&config, "myStream", &Variables::new());
        assert_eq!(args, vec!["objectStreamOpen", "file.dat", "some.Class", "myStream"]);
    }

    #[test]
    fn test_object_stream_explicit_name_kept() {
        let config = ControlFile::parse(
            "s = objectStreamOpen\ns.param.1 = f\ns.param.2 = Text\ns.param.3 = other\n",
        );
        let args = read_arguments(&config, "s", &Variables::new());
        assert_eq!(args, vec!["objectStreamOpen", "f", "Text", "other"]);
    }

    #[test]
    fn test_named_instance_name_completion() {
        let config = ControlFile::parse("counter = namedInstanceAdd\ncounter.param.1 = Counter(5)\n");
        let args = read_arguments(&config, "counter", &Variables::new());
        assert_eq!(args, vec!["namedInstanceAdd", "Counter(5)", "counter"]);

        let config = ControlFile::parse("c = namedInstanceAdd\n");
        let args = read_arguments(&config, "c", &Variables::new());
        assert_eq!(args, vec!["namedInstanceAdd"]);
    }

    #[test]
    fn test_read_modifier() {
        let config = ControlFile::parse("a = echo\na.repeat = <n:3>\n");
        let mut vars = Variables::new();
        assert_eq!(
            read_modifier(&config, "a", Modifier::Repeat, &vars),
            Some("3".to_string())
        );
        vars.set("n", "7");
        assert_eq!(
            read_modifier(&config, "a", Modifier::Repeat, &vars),
            Some("7".to_string())
        );
        assert_eq!(read_modifier(&config, "a", Modifier::IgnoreException, &vars), None);
    }

    #[test]
    fn test_descriptor() {
        let config = ControlFile::parse(
            "block = first  second\nblock.foreach = a b\nblock.loopVariable = item\n",
        );
        let descriptor = ActionDescriptor::read(&config, "block", &Variables::new());
        assert_eq!(descriptor.loop_variable_name(), "item");
        assert_eq!(descriptor.foreach.as_deref(), Some("a b"));
        assert_eq!(descriptor.repeat, None);

        let single = ActionDescriptor::read(&config, "first", &Variables::new());
        assert_eq!(single.loop_variable_name(), "first");
    }

    #[test]
    fn test_modifier_keys() {
        assert_eq!(Modifier::RepeatUntilException.key_for("a"), "a.repeatUntilException");
        assert_eq!(Modifier::LoopVariable.to_string(), "loopVariable");
    }
}
