//! In-memory form of an `iptables-save` dump.
//!
//! A [`RuleDump`] is an ordered list of lines. Line order is also rule
//! evaluation order inside a chain, so every transformation yields a new dump
//! and leaves the original untouched.

use thiserror::Error;

use std::fmt::{self, Display};

const GENERATOR_HEADER: &str = "# Generated by iptables-save v";

#[derive(Debug, Error)]
pub enum Error {
    #[error("Rule dump is not valid UTF-8: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RuleDump {
    lines: Vec<String>,
}

impl RuleDump {
    /// Decodes raw command output. A trailing newline becomes a trailing empty
    /// line so that [`RuleDump::to_bytes`] reproduces the input exactly.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, Error> {
        let text = String::from_utf8(bytes)?;
        Ok(Self::from(text.as_str()))
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn line(&self, index: usize) -> Option<&str> {
        self.lines.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.lines.join("\n").into_bytes()
    }

    /// Version of the tool that produced this dump, taken from the leading
    /// `# Generated by iptables-save vX.Y.Z on ...` comment.
    pub fn generator_version(&self) -> Option<&str> {
        self.lines
            .iter()
            .find_map(|line| line.strip_prefix(GENERATOR_HEADER))
            .and_then(|rest| rest.split_whitespace().next())
    }

    /// New dump with `line` placed at `index`; the former line at `index` and
    /// everything after it move down by one.
    pub(crate) fn with_line_inserted(&self, index: usize, line: String) -> Self {
        let mut lines = self.lines.clone();
        lines.insert(index.min(lines.len()), line);
        Self { lines }
    }

    /// New dump with the lines at `a` and `b` exchanged.
    pub(crate) fn with_lines_swapped(&self, a: usize, b: usize) -> Self {
        let mut lines = self.lines.clone();
        if a < lines.len() && b < lines.len() {
            lines.swap(a, b);
        }
        Self { lines }
    }
}

impl From<&str> for RuleDump {
    fn from(text: &str) -> Self {
        Self {
            lines: text.split('\n').map(str::to_string).collect(),
        }
    }
}

impl From<Vec<String>> for RuleDump {
    fn from(lines: Vec<String>) -> Self {
        Self { lines }
    }
}

impl Display for RuleDump {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.lines.join("\n"))
    }
}
