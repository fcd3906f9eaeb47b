use std::path::Path;

use crate::error::SessionStoreError;

/// One physical line of a `KEY=value` file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvLine {
    Entry { key: String, value: String },
    /// Blank lines and comments, kept verbatim.
    Verbatim(String),
}

/// Parsed `KEY=value` file that round-trips untouched lines.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvFile {
    lines: Vec<EnvLine>,
}

impl EnvFile {
    pub fn parse(path: &Path, contents: &str) -> Result<Self, SessionStoreError> {
        let mut lines = Vec::new();

        for (index, raw) in contents.lines().enumerate() {
            let line_number = index + 1;
            let trimmed = raw.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                lines.push(EnvLine::Verbatim(raw.to_string()));
                continue;
            }

            let body = trimmed.strip_prefix("export ").unwrap_or(trimmed);
            let Some((key, value)) = body.split_once('=') else {
                return Err(SessionStoreError::MalformedLine {
                    path: path.to_path_buf(),
                    line: line_number,
                    content: raw.to_string(),
                });
            };

            let key = key.trim();
            if !is_valid_key(key) {
                return Err(SessionStoreError::MalformedLine {
                    path: path.to_path_buf(),
                    line: line_number,
                    content: raw.to_string(),
                });
            }

            let value = parse_value(value.trim_start()).ok_or_else(|| {
                SessionStoreError::UnterminatedQuote {
                    path: path.to_path_buf(),
                    line: line_number,
                }
            })?;
            lines.push(EnvLine::Entry {
                key: key.to_string(),
                value,
            });
        }

        Ok(Self { lines })
    }

    /// Value of the last entry for `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.lines.iter().rev().find_map(|line| match line {
            EnvLine::Entry { key: k, value } if k == key => Some(value.as_str()),
            _ => None,
        })
    }

    /// Replaces every entry for `key`, or appends one when absent.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), SessionStoreError> {
        if !is_valid_key(key) {
            return Err(SessionStoreError::InvalidKey {
                key: key.to_string(),
            });
        }
        if value.contains('\n') || value.contains('\r') {
            return Err(SessionStoreError::MultilineValue {
                key: key.to_string(),
            });
        }

        let mut replaced = false;
        for line in &mut self.lines {
            if let EnvLine::Entry { key: k, value: v } = line {
                if k == key {
                    *v = value.to_string();
                    replaced = true;
                }
            }
        }
        if !replaced {
            self.lines.push(EnvLine::Entry {
                key: key.to_string(),
                value: value.to_string(),
            });
        }
        Ok(())
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.lines.iter().filter_map(|line| match line {
            EnvLine::Entry { key, value } => Some((key.as_str(), value.as_str())),
            EnvLine::Verbatim(_) => None,
        })
    }

    #[must_use]
    pub fn lines(&self) -> &[EnvLine] {
        &self.lines
    }

    /// Serializes entries as `KEY='value'`, one per line.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        for line in &self.lines {
            match line {
                EnvLine::Entry { key, value } => {
                    out.push_str(key);
                    out.push('=');
                    out.push_str(&quote_value(value));
                }
                EnvLine::Verbatim(raw) => out.push_str(raw),
            }
            out.push('\n');
        }
        out
    }
}

fn is_valid_key(key: &str) -> bool {
    !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
}

/// Returns `None` for an unterminated quoted value.
fn parse_value(raw: &str) -> Option<String> {
    if let Some(rest) = raw.strip_prefix('\'') {
        let end = rest.find('\'')?;
        return Some(rest[..end].to_string());
    }

    if let Some(rest) = raw.strip_prefix('"') {
        let mut value = String::new();
        let mut chars = rest.chars();
        while let Some(c) = chars.next() {
            match c {
                '"' => return Some(value),
                '\\' => match chars.next()? {
                    'n' => value.push('\n'),
                    't' => value.push('\t'),
                    other => value.push(other),
                },
                other => value.push(other),
            }
        }
        return None;
    }

    let unquoted = match raw.find(" #") {
        Some(comment) => &raw[..comment],
        None => raw,
    };
    Some(unquoted.trim().to_string())
}

fn quote_value(value: &str) -> String {
    if !value.contains('\'') {
        return format!("'{value}'");
    }
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{escaped}\"")
}
