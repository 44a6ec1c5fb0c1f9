//! Minimal reader for desktop key files (`[Group]` headers, `key=value` pairs).
//!
//! Only what the sandbox marker file needs: groups, plain string values and
//! `;`-separated string lists with the usual escapes (`\s \n \t \r \\ \;`).

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum KeyFileError {
    #[error("failed to read key file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("key file is not valid UTF-8")]
    Utf8,

    #[error("line {line}: {message}")]
    Syntax { line: usize, message: String },

    #[error("group {0:?} not found")]
    GroupNotFound(String),

    #[error("key {key:?} not found in group {group:?}")]
    KeyNotFound { group: String, key: String },

    #[error("value of key {key:?} contains an invalid escape sequence")]
    InvalidEscape { key: String },
}

#[derive(Debug, Clone, Default)]
struct Group {
    name: String,
    entries: Vec<(String, String)>,
}

impl Group {
    fn set(&mut self, key: &str, value: &str) {
        match self.entries.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = value.to_string(),
            None => self.entries.push((key.to_string(), value.to_string())),
        }
    }

    fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// A parsed key file. Groups keep their order of first appearance.
#[derive(Debug, Clone, Default)]
pub struct KeyFile {
    groups: Vec<Group>,
}

impl KeyFile {
    /// Read and parse the key file at `path`.
    pub fn load(path: &Path) -> Result<Self, KeyFileError> {
        let bytes = fs::read(path).map_err(|source| KeyFileError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let text = String::from_utf8(bytes).map_err(|_| KeyFileError::Utf8)?;
        Self::parse(&text)
    }

    /// Parse key file contents.
    ///
    /// Repeated groups are merged and a repeated key overwrites the earlier value.
    pub fn parse(text: &str) -> Result<Self, KeyFileError> {
        let mut groups: Vec<Group> = Vec::new();
        let mut current: Option<usize> = None;

        for (idx, raw) in text.lines().enumerate() {
            let line_no = idx + 1;
            let line = raw.trim_start();

            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some(rest) = line.strip_prefix('[') {
                let name = rest
                    .trim_end()
                    .strip_suffix(']')
                    .ok_or_else(|| syntax(line_no, "unterminated group header"))?;
                if name.is_empty() || name.contains(['[', ']']) {
                    return Err(syntax(line_no, format!("invalid group name {:?}", name)));
                }

                let index = match groups.iter().position(|g| g.name == name) {
                    Some(index) => index,
                    None => {
                        groups.push(Group {
                            name: name.to_string(),
                            entries: Vec::new(),
                        });
                        groups.len() - 1
                    }
                };
                current = Some(index);
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                return Err(syntax(
                    line_no,
                    "expected a group header, key=value pair or comment",
                ));
            };

            let key = key.trim_end();
            if key.is_empty() {
                return Err(syntax(line_no, "empty key name"));
            }

            let Some(index) = current else {
                return Err(syntax(line_no, "key/value pair outside of any group"));
            };

            groups[index].set(key, value.trim_start());
        }

        Ok(Self { groups })
    }

    /// Group names in order of first appearance.
    pub fn groups(&self) -> impl Iterator<Item = &str> {
        self.groups.iter().map(|g| g.name.as_str())
    }

    pub fn has_group(&self, group: &str) -> bool {
        self.group(group).is_some()
    }

    /// Raw value of `key` in `group`, without unescaping.
    pub fn raw_value(&self, group: &str, key: &str) -> Result<&str, KeyFileError> {
        self.group(group)
            .ok_or_else(|| KeyFileError::GroupNotFound(group.to_string()))?
            .get(key)
            .ok_or_else(|| KeyFileError::KeyNotFound {
                group: group.to_string(),
                key: key.to_string(),
            })
    }

    /// Unescaped string value of `key` in `group`.
    pub fn string(&self, group: &str, key: &str) -> Result<String, KeyFileError> {
        let raw = self.raw_value(group, key)?;
        let mut items = split_escaped(raw, None).ok_or_else(|| KeyFileError::InvalidEscape {
            key: key.to_string(),
        })?;
        Ok(items.pop().unwrap_or_default())
    }

    /// `;`-separated list value of `key` in `group`.
    ///
    /// A trailing separator does not produce an empty final element.
    pub fn string_list(&self, group: &str, key: &str) -> Result<Vec<String>, KeyFileError> {
        let raw = self.raw_value(group, key)?;
        split_escaped(raw, Some(';')).ok_or_else(|| KeyFileError::InvalidEscape {
            key: key.to_string(),
        })
    }

    fn group(&self, name: &str) -> Option<&Group> {
        self.groups.iter().find(|g| g.name == name)
    }
}

fn syntax(line: usize, message: impl Into<String>) -> KeyFileError {
    KeyFileError::Syntax {
        line,
        message: message.into(),
    }
}

/// Unescape `raw`, splitting on unescaped `separator` when given.
///
/// Returns `None` on an unknown or dangling escape.
fn split_escaped(raw: &str, separator: Option<char>) -> Option<Vec<String>> {
    let mut items = Vec::new();
    let mut current = String::new();
    let mut chars = raw.chars();

    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                let unescaped = match chars.next()? {
                    's' => ' ',
                    'n' => '\n',
                    't' => '\t',
                    'r' => '\r',
                    '\\' => '\\',
                    ';' => ';',
                    _ => return None,
                };
                current.push(unescaped);
            }
            c if Some(c) == separator => items.push(std::mem::take(&mut current)),
            c => current.push(c),
        }
    }

    if separator.is_none() || !current.is_empty() {
        items.push(current);
    }

    Some(items)
}
