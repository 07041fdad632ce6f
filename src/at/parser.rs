// Copyright 2026 Daniel Pelikan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! AT command line parser.
//!
//! A line starts with `AT` and carries one or more commands. Extended
//! commands (`+NAME`) are separated by `;`. A basic `D` command consumes
//! the rest of the line as its dial string.

use std::fmt;
use thiserror::Error;

// Delimiters that select the syntactic form. Action has no delimiter.
const DELIMITER_TEST: &str = "=?";
const DELIMITER_READ: &str = "?";
const DELIMITER_SET: &str = "=";

const COMMAND_SEPARATOR: char = ';';
const ARG_DELIMITER: char = ',';

/// Syntactic form of a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandForm {
    /// Single-letter V.250 command, e.g. `A` or `D<number>`.
    Basic,
    /// `AT+CMD=?`
    Test,
    /// `AT+CMD?`
    Read,
    /// `AT+CMD=<args>`
    Set,
    /// `AT+CMD`
    Action,
}

/// A single parsed argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AtArg {
    Int(i64),
    Str(String),
    Empty,
}

impl AtArg {
    fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.is_empty() {
            return AtArg::Empty;
        }
        if raw.len() >= 2 && raw.starts_with('"') && raw.ends_with('"') {
            return AtArg::Str(raw[1..raw.len() - 1].to_string());
        }
        match raw.parse::<i64>() {
            Ok(value) => AtArg::Int(value),
            Err(_) => AtArg::Str(raw.to_string()),
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            AtArg::Int(value) => Some(*value),
            _ => None,
        }
    }

    /// The argument as text; integers are rendered back to digits.
    pub fn as_text(&self) -> Option<String> {
        match self {
            AtArg::Int(value) => Some(value.to_string()),
            AtArg::Str(s) => Some(s.clone()),
            AtArg::Empty => None,
        }
    }
}

/// One command out of an AT line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtCommand {
    /// Upper-cased command token, e.g. `+CIND` or `D`.
    pub name: String,
    pub form: CommandForm,
    /// Unparsed argument text.
    pub raw_args: String,
    pub args: Vec<AtArg>,
}

impl AtCommand {
    fn new(name: String, form: CommandForm, raw_args: &str) -> Self {
        let args = if form == CommandForm::Set {
            split_args(raw_args).iter().map(|a| AtArg::parse(a)).collect()
        } else {
            Vec::new()
        };
        Self {
            name,
            form,
            raw_args: raw_args.to_string(),
            args,
        }
    }

    pub fn arg(&self, index: usize) -> Option<&AtArg> {
        self.args.get(index)
    }

    pub fn int_arg(&self, index: usize) -> Option<i64> {
        self.arg(index).and_then(AtArg::as_int)
    }
}

impl fmt::Display for AtCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.form {
            CommandForm::Basic => write!(f, "{}{}", self.name, self.raw_args),
            CommandForm::Test => write!(f, "{}{}", self.name, DELIMITER_TEST),
            CommandForm::Read => write!(f, "{}{}", self.name, DELIMITER_READ),
            CommandForm::Set => write!(f, "{}{}{}", self.name, DELIMITER_SET, self.raw_args),
            CommandForm::Action => write!(f, "{}", self.name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("line does not start with AT")]
    MissingPrefix,
    #[error("unexpected character {0:?}")]
    UnexpectedChar(char),
    #[error("empty command name")]
    EmptyName,
}

/// Parse a complete AT line into its commands.
///
/// A bare `AT` yields no commands.
pub fn parse_line(line: &str) -> Result<Vec<AtCommand>, ParseError> {
    let line = line.trim();
    let prefix = line.get(..2).ok_or(ParseError::MissingPrefix)?;
    if !prefix.eq_ignore_ascii_case("AT") {
        return Err(ParseError::MissingPrefix);
    }

    let mut commands = Vec::new();
    let mut rest = &line[2..];

    loop {
        rest = rest.trim_start_matches(|c: char| c == COMMAND_SEPARATOR || c.is_whitespace());
        let Some(first) = rest.chars().next() else {
            break;
        };

        if first == '+' {
            let (command, remaining) = parse_extended(rest)?;
            commands.push(command);
            rest = remaining;
        } else if first.is_ascii_alphabetic() {
            let letter = first.to_ascii_uppercase();
            if letter == 'D' {
                // The dial string runs to the end of the line.
                commands.push(AtCommand::new(
                    "D".to_string(),
                    CommandForm::Basic,
                    rest[1..].trim(),
                ));
                break;
            }
            let digits_end = rest[1..]
                .find(|c: char| !c.is_ascii_digit())
                .map(|i| i + 1)
                .unwrap_or(rest.len());
            commands.push(AtCommand::new(
                letter.to_string(),
                CommandForm::Basic,
                &rest[1..digits_end],
            ));
            rest = &rest[digits_end..];
        } else {
            return Err(ParseError::UnexpectedChar(first));
        }
    }

    Ok(commands)
}

/// Parse one `+NAME[...]` command, returning it and the unparsed remainder.
fn parse_extended(input: &str) -> Result<(AtCommand, &str), ParseError> {
    let name_end = input[1..]
        .find(|c: char| !c.is_ascii_alphanumeric())
        .map(|i| i + 1)
        .unwrap_or(input.len());
    if name_end == 1 {
        return Err(ParseError::EmptyName);
    }
    let name = input[..name_end].to_ascii_uppercase();
    let after = &input[name_end..];

    if let Some(rest) = after.strip_prefix(DELIMITER_TEST) {
        return Ok((AtCommand::new(name, CommandForm::Test, ""), rest));
    }
    if let Some(rest) = after.strip_prefix(DELIMITER_READ) {
        return Ok((AtCommand::new(name, CommandForm::Read, ""), rest));
    }
    if let Some(rest) = after.strip_prefix(DELIMITER_SET) {
        let end = find_unquoted(rest, COMMAND_SEPARATOR).unwrap_or(rest.len());
        return Ok((
            AtCommand::new(name, CommandForm::Set, rest[..end].trim()),
            &rest[end..],
        ));
    }
    Ok((AtCommand::new(name, CommandForm::Action, ""), after))
}

/// Byte offset of the first `needle` outside double quotes.
fn find_unquoted(input: &str, needle: char) -> Option<usize> {
    let mut quoted = false;
    for (i, c) in input.char_indices() {
        if c == '"' {
            quoted = !quoted;
        } else if c == needle && !quoted {
            return Some(i);
        }
    }
    None
}

fn split_args(raw: &str) -> Vec<&str> {
    if raw.is_empty() {
        return Vec::new();
    }
    let mut args = Vec::new();
    let mut rest = raw;
    while let Some(i) = find_unquoted(rest, ARG_DELIMITER) {
        args.push(&rest[..i]);
        rest = &rest[i + 1..];
    }
    args.push(rest);
    args
}
