//! Scripting commands and their one-line wire form.
//!
//! A command is a name plus ordered `key=value` parameters:
//! `Export2: Filename="a b.mp3" NumChannels=2`. Values with whitespace, quotes,
//! or no content are double-quoted and embedded quotes become `\"`. Backslashes
//! are passed through untouched because Windows paths are full of them.

pub mod vocab;


use std::fmt;

/// One scripting command. Built once, encoded once, never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    name: String,
    params: Vec<(String, String)>,
}

impl Command {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
        }
    }

    /// Append a parameter; order is kept on the wire.
    pub fn arg(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.params.push((key.into(), value.to_string()));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }

    /// Render the wire line, without the line terminator.
    pub fn encode(&self) -> String {
        if self.params.is_empty() {
            return self.name.clone();
        }
        let params: Vec<String> = self
            .params
            .iter()
            .map(|(key, value)| format!("{key}={}", encode_value(value)))
            .collect();
        format!("{}: {}", self.name, params.join(" "))
    }

    /// Parse a wire line back into a command. Inverse of `encode`.
    pub fn decode(line: &str) -> Option<Self> {
        let line = line.trim();
        let (name, rest) = match line.split_once(':') {
            Some((name, rest)) => (name.trim(), rest),
            None => (line, ""),
        };
        if name.is_empty() || name.chars().any(char::is_whitespace) {
            return None;
        }
        let mut command = Command::new(name);
        let mut chars = rest.chars().peekable();
        loop {
            while chars.next_if(|ch| ch.is_whitespace()).is_some() {}
            if chars.peek().is_none() {
                break;
            }
            let mut key = String::new();
            loop {
                match chars.next() {
                    Some('=') => break,
                    Some(ch) if ch.is_whitespace() => return None,
                    Some(ch) => key.push(ch),
                    None => return None,
                }
            }
            if key.is_empty() {
                return None;
            }
            let mut value = String::new();
            if chars.next_if_eq(&'"').is_some() {
                let mut closed = false;
                while let Some(ch) = chars.next() {
                    match ch {
                        '\\' if chars.peek() == Some(&'"') => {
                            value.push('"');
                            chars.next();
                        }
                        '"' => {
                            closed = true;
                            break;
                        }
                        other => value.push(other),
                    }
                }
                if !closed {
                    return None;
                }
            } else {
                while let Some(ch) = chars.next_if(|ch| !ch.is_whitespace()) {
                    value.push(ch);
                }
            }
            command.params.push((key, value));
        }
        Some(command)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

fn needs_quotes(value: &str) -> bool {
    value.is_empty() || value.chars().any(|ch| ch.is_whitespace() || ch == '"')
}

fn encode_value(value: &str) -> String {
    if !needs_quotes(value) {
        return value.to_string();
    }
    format!("\"{}\"", value.replace('"', "\\\""))
}
