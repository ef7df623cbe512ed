//! Environment Marker Evaluation
//!
//! Evaluates PEP 508 environment markers (the conditional part of a
//! requirement specifier after `;`) against a fixed set of environment
//! attributes.
//!
//! # Supported Grammar
//!
//! ```text
//! marker  := and_expr ("or" and_expr)*
//! and_expr := atom ("and" atom)*
//! atom    := "(" marker ")" | value op value
//! value   := variable | quoted string
//! op      := "==" | "!=" | "<" | "<=" | ">" | ">=" | "~=" | "in" | "not in"
//! ```
//!
//! Operands that both look like dotted numeric versions are compared
//! componentwise, so `python_version >= "3.8"` holds on Python 3.10.
//! Everything else compares lexically.

use std::cmp::Ordering;
use std::process::Command;

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while parsing or evaluating a marker expression.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MarkerError {
    #[error("unexpected end of marker expression")]
    UnexpectedEnd,

    #[error("unexpected token '{0}' in marker expression")]
    UnexpectedToken(String),

    #[error("unknown marker variable '{0}'")]
    UnknownVariable(String),

    #[error("unbalanced parentheses in marker expression")]
    UnbalancedParens,

    #[error("unterminated string literal in marker expression")]
    UnterminatedString,
}

/// One-liner Python program that reports the attributes markers see.
///
/// Querying the interpreter on PATH keeps the answers consistent with the
/// environment packages will actually be installed into.
const PROBE_PROGRAM: &str = r#"import json,os,platform,sys
print(json.dumps({
 "python_version": ".".join(platform.python_version_tuple()[:2]),
 "python_full_version": platform.python_version(),
 "platform_version": platform.version(),
 "os_name": os.name,
 "sys_platform": sys.platform,
 "platform_release": platform.release(),
 "implementation_name": sys.implementation.name,
 "platform_machine": platform.machine(),
 "platform_python_implementation": platform.python_implementation(),
}))"#;

/// The fixed attribute set environment markers are evaluated against.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct MarkerEnvironment {
    pub python_version: String,
    #[serde(default)]
    pub python_full_version: String,
    #[serde(default)]
    pub platform_version: String,
    pub os_name: String,
    pub sys_platform: String,
    #[serde(default)]
    pub platform_release: String,
    pub implementation_name: String,
    pub platform_machine: String,
    pub platform_python_implementation: String,

    /// Active extra, set while evaluating `extra == "..."` clauses.
    #[serde(skip)]
    pub extra: Option<String>,
}

impl MarkerEnvironment {
    /// Detects the marker environment by probing the `python` interpreter
    /// on PATH, falling back to host-derived values when none is found.
    pub fn detect() -> Self {
        for python in ["python3", "python"] {
            match Command::new(python).arg("-c").arg(PROBE_PROGRAM).output() {
                Ok(output) if output.status.success() => {
                    match serde_json::from_slice::<Self>(&output.stdout) {
                        Ok(env) => {
                            debug!("Marker environment probed via '{}'", python);
                            return env;
                        }
                        Err(e) => warn!("Could not parse interpreter probe output: {}", e),
                    }
                }
                Ok(_) | Err(_) => continue,
            }
        }

        warn!("No Python interpreter found on PATH, using host-derived marker environment");
        Self::host_defaults()
    }

    /// Marker environment derived from the host without a Python interpreter.
    pub fn host_defaults() -> Self {
        let sys_platform = match std::env::consts::OS {
            "macos" => "darwin",
            "windows" => "win32",
            other => other,
        };

        Self {
            python_version: String::new(),
            python_full_version: String::new(),
            platform_version: String::new(),
            os_name: if cfg!(windows) { "nt" } else { "posix" }.to_string(),
            sys_platform: sys_platform.to_string(),
            platform_release: String::new(),
            implementation_name: "cpython".to_string(),
            platform_machine: std::env::consts::ARCH.to_string(),
            platform_python_implementation: "CPython".to_string(),
            extra: None,
        }
    }

    /// Returns a copy of this environment with the given extra active.
    pub fn with_extra(&self, extra: &str) -> Self {
        let mut env = self.clone();
        env.extra = Some(extra.to_string());
        env
    }

    /// Looks up a marker variable by name.
    ///
    /// An absent `extra` resolves to the empty string, matching how PEP 508
    /// evaluation treats non-extra contexts.
    fn get(&self, variable: &str) -> Option<&str> {
        let value = match variable {
            "python_version" => &self.python_version,
            "python_full_version" => &self.python_full_version,
            "platform_version" => &self.platform_version,
            "os_name" => &self.os_name,
            "sys_platform" => &self.sys_platform,
            "platform_release" => &self.platform_release,
            "implementation_name" => &self.implementation_name,
            "platform_machine" => &self.platform_machine,
            "platform_python_implementation" => &self.platform_python_implementation,
            // Deprecated dotted aliases still seen in the wild
            "os.name" => &self.os_name,
            "sys.platform" => &self.sys_platform,
            "platform.version" => &self.platform_version,
            "platform.machine" => &self.platform_machine,
            "platform.python_implementation" => &self.platform_python_implementation,
            "extra" => return Some(self.extra.as_deref().unwrap_or("")),
            _ => return None,
        };
        Some(value)
    }
}

/// Evaluates a marker expression against an environment.
pub fn evaluate(marker: &str, env: &MarkerEnvironment) -> Result<bool, MarkerError> {
    let tokens = tokenize(marker)?;
    let mut parser = Parser {
        tokens: &tokens,
        pos: 0,
        env,
    };
    let result = parser.or_expr()?;
    if parser.pos != tokens.len() {
        return Err(MarkerError::UnexpectedToken(
            parser.tokens[parser.pos].text(),
        ));
    }
    Ok(result)
}

/// Reports whether a marker expression references the `extra` variable.
pub fn references_extra(marker: &str) -> bool {
    tokenize(marker)
        .map(|tokens| {
            tokens
                .iter()
                .any(|t| matches!(t, Token::Ident(name) if name == "extra"))
        })
        .unwrap_or(false)
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    LParen,
    RParen,
    Ident(String),
    Str(String),
    Op(String),
}

impl Token {
    fn text(&self) -> String {
        match self {
            Token::LParen => "(".to_string(),
            Token::RParen => ")".to_string(),
            Token::Ident(s) | Token::Str(s) | Token::Op(s) => s.clone(),
        }
    }
}

fn tokenize(input: &str) -> Result<Vec<Token>, MarkerError> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            '\'' | '"' => {
                let quote = c;
                chars.next();
                let mut value = String::new();
                loop {
                    match chars.next() {
                        Some(ch) if ch == quote => break,
                        Some(ch) => value.push(ch),
                        None => return Err(MarkerError::UnterminatedString),
                    }
                }
                tokens.push(Token::Str(value));
            }
            '<' | '>' | '=' | '!' | '~' => {
                let mut op = String::new();
                op.push(c);
                chars.next();
                if chars.peek() == Some(&'=') {
                    op.push('=');
                    chars.next();
                    // PEP 440 arbitrary equality "===" folds into "=="
                    if op == "==" && chars.peek() == Some(&'=') {
                        chars.next();
                    }
                }
                if op == "=" || op == "!" || op == "~" {
                    return Err(MarkerError::UnexpectedToken(op));
                }
                tokens.push(Token::Op(op));
            }
            c if c.is_ascii_alphanumeric() || c == '_' || c == '.' => {
                let mut ident = String::new();
                while let Some(&ch) = chars.peek() {
                    if ch.is_ascii_alphanumeric() || ch == '_' || ch == '.' {
                        ident.push(ch);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Ident(ident));
            }
            other => return Err(MarkerError::UnexpectedToken(other.to_string())),
        }
    }

    Ok(tokens)
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    env: &'a MarkerEnvironment,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Result<Token, MarkerError> {
        let token = self
            .tokens
            .get(self.pos)
            .cloned()
            .ok_or(MarkerError::UnexpectedEnd)?;
        self.pos += 1;
        Ok(token)
    }

    fn or_expr(&mut self) -> Result<bool, MarkerError> {
        let mut result = self.and_expr()?;
        while matches!(self.peek(), Some(Token::Ident(word)) if word == "or") {
            self.pos += 1;
            let rhs = self.and_expr()?;
            result = result || rhs;
        }
        Ok(result)
    }

    fn and_expr(&mut self) -> Result<bool, MarkerError> {
        let mut result = self.atom()?;
        while matches!(self.peek(), Some(Token::Ident(word)) if word == "and") {
            self.pos += 1;
            let rhs = self.atom()?;
            result = result && rhs;
        }
        Ok(result)
    }

    fn atom(&mut self) -> Result<bool, MarkerError> {
        if matches!(self.peek(), Some(Token::LParen)) {
            self.pos += 1;
            let result = self.or_expr()?;
            match self.next()? {
                Token::RParen => return Ok(result),
                _ => return Err(MarkerError::UnbalancedParens),
            }
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<bool, MarkerError> {
        let lhs = self.value()?;

        let op = match self.next()? {
            Token::Op(op) => op,
            Token::Ident(word) if word == "in" => "in".to_string(),
            Token::Ident(word) if word == "not" => match self.next()? {
                Token::Ident(word) if word == "in" => "not in".to_string(),
                other => return Err(MarkerError::UnexpectedToken(other.text())),
            },
            other => return Err(MarkerError::UnexpectedToken(other.text())),
        };

        let rhs = self.value()?;
        Ok(compare(&lhs, &op, &rhs))
    }

    fn value(&mut self) -> Result<String, MarkerError> {
        match self.next()? {
            Token::Str(s) => Ok(s),
            Token::Ident(name) => self
                .env
                .get(&name)
                .map(str::to_string)
                .ok_or(MarkerError::UnknownVariable(name)),
            other => Err(MarkerError::UnexpectedToken(other.text())),
        }
    }
}

/// Parses a dotted numeric version ("3.10.2") into its components.
fn version_components(value: &str) -> Option<Vec<u64>> {
    if value.is_empty() {
        return None;
    }
    value.split('.').map(|part| part.parse().ok()).collect()
}

/// Compares two operands, numerically when both look like versions.
fn ordering(lhs: &str, rhs: &str) -> Ordering {
    match (version_components(lhs), version_components(rhs)) {
        (Some(a), Some(b)) => a.cmp(&b),
        _ => lhs.cmp(rhs),
    }
}

fn compare(lhs: &str, op: &str, rhs: &str) -> bool {
    match op {
        "==" => ordering(lhs, rhs) == Ordering::Equal,
        "!=" => ordering(lhs, rhs) != Ordering::Equal,
        "<" => ordering(lhs, rhs) == Ordering::Less,
        "<=" => ordering(lhs, rhs) != Ordering::Greater,
        ">" => ordering(lhs, rhs) == Ordering::Greater,
        ">=" => ordering(lhs, rhs) != Ordering::Less,
        "~=" => compatible_release(lhs, rhs),
        "in" => rhs.contains(lhs),
        "not in" => !rhs.contains(lhs),
        _ => false,
    }
}

/// PEP 440 compatible-release check: `lhs ~= rhs` means `lhs >= rhs` while
/// matching rhs with its final component dropped.
fn compatible_release(lhs: &str, rhs: &str) -> bool {
    let (Some(left), Some(right)) = (version_components(lhs), version_components(rhs)) else {
        return lhs == rhs;
    };
    if left < right || right.len() < 2 {
        return false;
    }
    let series = &right[..right.len() - 1];
    left.len() >= series.len() && &left[..series.len()] == series
}
