//! Object factory: builds values from signature strings.
//!
//! Signatures use a small expression grammar:
//!
//! ```text
//! expr    := literal | call | ident
//! call    := ident '(' [expr (',' expr)*] ')'
//! ident   := [A-Za-z_][A-Za-z0-9_.]*
//! literal := '"' chars '"' | number | true | false | null
//! ```
//!
//! A bare identifier names a stored instance, a zero-argument constructor or
//! a constant, in that order.

use std::collections::HashMap;
use thiserror::Error;

use crate::error::CommandError;
use crate::runtime::{Collection, Counter, InstanceStore, Value};

/// Builds a value from evaluated arguments.
pub type Constructor = fn(&[Value]) -> Result<Value, String>;

/// Errors raised while instantiating a signature.
#[derive(Debug, Clone, Error)]
pub enum FactoryError {
    #[error("Invalid signature '{signature}': {message}")]
    Parse { signature: String, message: String },

    #[error("No such instantiator: {0}")]
    NoSuchInstantiator(String),

    #[error("Cannot instantiate '{name}': {message}")]
    Instantiation { name: String, message: String },
}

impl From<FactoryError> for CommandError {
    fn from(e: FactoryError) -> Self {
        match e {
            FactoryError::Parse { signature, message } => {
                CommandError::IllegalArgument(format!("invalid signature '{}': {}", signature, message))
            }
            FactoryError::NoSuchInstantiator(name) => CommandError::NoSuchInstantiator(name),
            FactoryError::Instantiation { name, message } => {
                CommandError::Instantiation(format!("{}: {}", name, message))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Str(String),
    Int(i64),
    Float(f64),
    LParen,
    RParen,
    Comma,
}

#[derive(Debug, Clone)]
enum Expr {
    Literal(Value),
    Ident(String),
    Call(String, Vec<Expr>),
}

/// Resolves signature strings against a constructor table, a constant table
/// and the named instance store.
#[derive(Debug, Clone)]
pub struct ObjectFactory {
    constructors: HashMap<String, Constructor>,
    constants: HashMap<String, Value>,
}

impl ObjectFactory {
    /// Create a factory with no types.
    pub fn empty() -> Self {
        Self {
            constructors: HashMap::new(),
            constants: HashMap::new(),
        }
    }

    /// Create a factory with the built-in types and constants.
    pub fn new() -> Self {
        let mut factory = Self::empty();
        factory.register("List", construct_list);
        factory.register("Str", construct_str);
        factory.register("Int", construct_int);
        factory.register("Float", construct_float);
        factory.register("Counter", construct_counter);
        factory.register("Collection", construct_collection);
        factory.register_constant("MAX_INT", Value::Int(i64::MAX));
        factory.register_constant("MIN_INT", Value::Int(i64::MIN));
        factory
    }

    pub fn register(&mut self, name: &str, constructor: Constructor) {
        self.constructors.insert(name.to_string(), constructor);
    }

    pub fn register_constant(&mut self, name: &str, value: Value) {
        self.constants.insert(name.to_string(), value);
    }

    /// Evaluate `signature`, resolving identifiers against `instances`.
    pub fn instantiate(&self, signature: &str, instances: &InstanceStore) -> Result<Value, FactoryError> {
        let parse_error = |message: String| FactoryError::Parse {
            signature: signature.to_string(),
            message,
        };

        let tokens = tokenize(signature).map_err(parse_error)?;
        let mut parser = Parser { tokens, pos: 0 };
        let expr = parser.expr().map_err(parse_error)?;
        if parser.pos < parser.tokens.len() {
            return Err(parse_error(format!(
                "unexpected {:?} after expression",
                parser.tokens[parser.pos]
            )));
        }

        let value = self.eval(&expr, instances)?;
        tracing::debug!(signature = %signature, type_name = %value.type_name(), "Instantiated");
        Ok(value)
    }

    fn eval(&self, expr: &Expr, instances: &InstanceStore) -> Result<Value, FactoryError> {
        match expr {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Ident(name) => {
                if let Some(value) = instances.get(name) {
                    Ok(value)
                } else if self.constructors.contains_key(name) {
                    self.construct(name, &[])
                } else if let Some(value) = self.constants.get(name) {
                    Ok(value.clone())
                } else {
                    Err(FactoryError::NoSuchInstantiator(name.clone()))
                }
            }
            Expr::Call(name, args) => {
                let values = args
                    .iter()
                    .map(|arg| self.eval(arg, instances))
                    .collect::<Result<Vec<_>, _>>()?;
                self.construct(name, &values)
            }
        }
    }

    fn construct(&self, name: &str, args: &[Value]) -> Result<Value, FactoryError> {
        let constructor = self
            .constructors
            .get(name)
            .ok_or_else(|| FactoryError::NoSuchInstantiator(format!("{}({} args)", name, args.len())))?;
        constructor(args).map_err(|message| FactoryError::Instantiation {
            name: name.to_string(),
            message,
        })
    }
}

impl Default for ObjectFactory {
    fn default() -> Self {
        Self::new()
    }
}

fn tokenize(text: &str) -> Result<Vec<Token>, String> {
    let chars: Vec<char> = text.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            '"' => {
                let mut literal = String::new();
                i += 1;
                loop {
                    match chars.get(i) {
                        None => return Err("unterminated string literal".to_string()),
                        Some('"') => {
                            i += 1;
                            break;
                        }
                        Some('\\') => {
                            if let Some(next) = chars.get(i + 1) {
                                literal.push(*next);
                            }
                            i += 2;
                        }
                        Some(other) => {
                            literal.push(*other);
                            i += 1;
                        }
                    }
                }
                tokens.push(Token::Str(literal));
            }
            c if c.is_ascii_digit() || (c == '-' && chars.get(i + 1).is_some_and(|d| d.is_ascii_digit())) => {
                let start = i;
                i += 1;
                while i < chars.len() && (chars[i].is_ascii_digit() || matches!(chars[i], '.' | 'e' | 'E')) {
                    i += 1;
                }
                let number: String = chars[start..i].iter().collect();
                let token = match number.parse::<i64>() {
                    Ok(n) => Token::Int(n),
                    Err(_) => Token::Float(
                        number
                            .parse::<f64>()
                            .map_err(|_| format!("invalid number '{}'", number))?,
                    ),
                };
                tokens.push(token);
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || matches!(chars[i], '_' | '.')) {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
            }
            other => return Err(format!("unexpected character '{}'", other)),
        }
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn expr(&mut self) -> Result<Expr, String> {
        match self.next() {
            Some(Token::Str(s)) => Ok(Expr::Literal(Value::Str(s))),
            Some(Token::Int(n)) => Ok(Expr::Literal(Value::Int(n))),
            Some(Token::Float(x)) => Ok(Expr::Literal(Value::Float(x))),
            Some(Token::Ident(name)) => {
                if self.peek() == Some(&Token::LParen) {
                    self.pos += 1;
                    let args = self.arguments()?;
                    return Ok(Expr::Call(name, args));
                }
                Ok(match name.as_str() {
                    "true" => Expr::Literal(Value::Bool(true)),
                    "false" => Expr::Literal(Value::Bool(false)),
                    "null" => Expr::Literal(Value::Null),
                    _ => Expr::Ident(name),
                })
            }
            Some(other) => Err(format!("unexpected {:?}", other)),
            None => Err("empty expression".to_string()),
        }
    }

    fn arguments(&mut self) -> Result<Vec<Expr>, String> {
        let mut args = Vec::new();
        if self.peek() == Some(&Token::RParen) {
            self.pos += 1;
            return Ok(args);
        }
        loop {
            args.push(self.expr()?);
            match self.next() {
                Some(Token::Comma) => continue,
                Some(Token::RParen) => return Ok(args),
                Some(other) => return Err(format!("expected ',' or ')', found {:?}", other)),
                None => return Err("missing ')'".to_string()),
            }
        }
    }
}

fn single<'v>(name: &str, args: &'v [Value]) -> Result<&'v Value, String> {
    match args {
        [value] => Ok(value),
        _ => Err(format!("{} takes exactly one argument, got {}", name, args.len())),
    }
}

fn construct_list(args: &[Value]) -> Result<Value, String> {
    Ok(Value::List(args.to_vec()))
}

fn construct_str(args: &[Value]) -> Result<Value, String> {
    Ok(Value::Str(single("Str", args)?.to_string()))
}

fn construct_int(args: &[Value]) -> Result<Value, String> {
    let value = single("Int", args)?;
    value
        .as_int()
        .map(Value::Int)
        .ok_or_else(|| format!("not an integer: {}", value))
}

fn construct_float(args: &[Value]) -> Result<Value, String> {
    let value = single("Float", args)?;
    value
        .as_float()
        .map(Value::Float)
        .ok_or_else(|| format!("not a number: {}", value))
}

fn construct_counter(args: &[Value]) -> Result<Value, String> {
    let start = match args {
        [] => 0,
        [value] => value
            .as_int()
            .ok_or_else(|| format!("not an integer: {}", value))?,
        _ => return Err(format!("Counter takes at most one argument, got {}", args.len())),
    };
    Ok(Value::object(Counter::new(start)))
}

fn construct_collection(args: &[Value]) -> Result<Value, String> {
    Ok(Value::object(Collection::new(args.to_vec())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literals() {
        let factory = ObjectFactory::new();
        let store = InstanceStore::new();
        assert_eq!(factory.instantiate("42", &store).unwrap().as_int(), Some(42));
        assert_eq!(factory.instantiate("-1.5", &store).unwrap().as_float(), Some(-1.5));
        assert_eq!(
            factory.instantiate("\"a \\\"b\\\"\"", &store).unwrap().as_str(),
            Some("a \"b\"")
        );
        assert!(matches!(factory.instantiate("null", &store).unwrap(), Value::Null));
    }

    #[test]
    fn test_nested_calls() {
        let factory = ObjectFactory::new();
        let store = InstanceStore::new();
        let value = factory
            .instantiate("List(Int(\"7\"), Str(3), List(), MAX_INT)", &store)
            .unwrap();
        assert_eq!(value.to_string(), format!("[7, 3, [], {}]", i64::MAX));
    }

    #[test]
    fn test_named_instance_reference() {
        let factory = ObjectFactory::new();
        let store = InstanceStore::new();
        store.add("base", Value::Int(10)).unwrap();

        let value = factory.instantiate("Collection(base, 2)", &store).unwrap();
        assert_eq!(value.type_name(), "Collection");
        assert_eq!(value.to_string(), "[10, 2]");

        let counter = factory.instantiate("Counter(base)", &store).unwrap();
        assert_eq!(counter.downcast::<Counter>().unwrap().get(), 10);
    }

    #[test]
    fn test_zero_argument_constructor() {
        let factory = ObjectFactory::new();
        let store = InstanceStore::new();
        let value = factory.instantiate("Counter", &store).unwrap();
        assert_eq!(value.to_string(), "0");
    }

    #[test]
    fn test_unknown_type() {
        let factory = ObjectFactory::new();
        let store = InstanceStore::new();
        assert!(matches!(
            factory.instantiate("com.example.Missing", &store),
            Err(FactoryError::NoSuchInstantiator(name)) if name == "com.example.Missing"
        ));
        assert!(matches!(
            factory.instantiate("Missing(1)", &store),
            Err(FactoryError::NoSuchInstantiator(_))
        ));
    }

    #[test]
    fn test_constructor_failure_is_wrapped() {
        let factory = ObjectFactory::new();
        let store = InstanceStore::new();
        let err = factory.instantiate("Int(\"abc\")", &store).unwrap_err();
        assert!(matches!(err, FactoryError::Instantiation { ref name, .. } if name == "Int"));

        let command_err: CommandError = err.into();
        assert_eq!(command_err.kind(), crate::error::ErrorKind::Instantiation);
    }

    #[test]
    fn test_parse_errors() {
        let factory = ObjectFactory::new();
        let store = InstanceStore::new();
        for signature in ["", "List(1,", "List(1 2)", "\"open", "a b", "#"] {
            assert!(
                matches!(factory.instantiate(signature, &store), Err(FactoryError::Parse { .. })),
                "expected parse error for {:?}",
                signature
            );
        }
    }
}
