//! Renderer command-line assembly
//!
//! Turns a filtered set of image options into the argument sequence handed to
//! `wkhtmltoimage`. The sequence is kept structured so the process runner can
//! pass raw arguments straight to the OS, while diagnostics get a quoted,
//! copy-pasteable command string produced by a platform [`CommandQuoting`].

use crate::config::{ImageOptions, OptionValue, ALLOWED_IMAGE_OPTIONS};
use crate::error::{RenderError, Result};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

/// One element of a renderer command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// `--name`
    Flag(String),
    /// An argument value, quoted when rendered
    Value(String),
    /// `-`, standard input or output
    Stdio,
}

/// Program plus structured arguments for a single renderer invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    program: PathBuf,
    tokens: Vec<Token>,
}

impl CommandLine {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            tokens: Vec::new(),
        }
    }

    pub fn flag(mut self, name: impl Into<String>) -> Self {
        self.tokens.push(Token::Flag(name.into()));
        self
    }

    pub fn value(mut self, value: impl Into<String>) -> Self {
        self.tokens.push(Token::Value(value.into()));
        self
    }

    pub fn stdio(mut self) -> Self {
        self.tokens.push(Token::Stdio);
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Unquoted argv, as the spawned process sees it.
    pub fn args(&self) -> Vec<String> {
        self.tokens
            .iter()
            .map(|token| match token {
                Token::Flag(name) => format!("--{name}"),
                Token::Value(value) => value.clone(),
                Token::Stdio => "-".to_string(),
            })
            .collect()
    }

    /// Render as a single shell command string using `quoting`.
    pub fn render(&self, quoting: &dyn CommandQuoting) -> String {
        let mut parts = Vec::with_capacity(self.tokens.len() + 1);
        parts.push(quoting.program(&self.program.to_string_lossy()));

        for token in &self.tokens {
            parts.push(match token {
                Token::Flag(name) => format!("--{name}"),
                Token::Value(value) => quoting.value(value),
                Token::Stdio => "-".to_string(),
            });
        }

        quoting.wrap(parts.join(" "))
    }

    pub fn to_shell_string(&self) -> String {
        self.render(Platform::current().quoting())
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_shell_string())
    }
}

/// Quoting rules applied when a [`CommandLine`] is rendered as text
pub trait CommandQuoting: Send + Sync {
    fn program(&self, program: &str) -> String;

    fn value(&self, value: &str) -> String;

    /// Post-processing of the fully assembled line.
    fn wrap(&self, command: String) -> String {
        command
    }
}

/// POSIX shell quoting: values in single quotes
#[derive(Debug, Clone, Copy, Default)]
pub struct PosixQuoting;

impl CommandQuoting for PosixQuoting {
    fn program(&self, program: &str) -> String {
        program.to_string()
    }

    fn value(&self, value: &str) -> String {
        format!("'{}'", value.replace('\'', r"'\''"))
    }
}

/// `cmd.exe` quoting: double quotes everywhere, plus one outer layer
#[derive(Debug, Clone, Copy, Default)]
pub struct WindowsQuoting;

impl CommandQuoting for WindowsQuoting {
    fn program(&self, program: &str) -> String {
        format!("\"{program}\"")
    }

    fn value(&self, value: &str) -> String {
        let cleaned: String = value
            .chars()
            .map(|c| match c {
                '"' | '%' | '!' => ' ',
                c => c,
            })
            .collect();
        format!("\"{cleaned}\"")
    }

    fn wrap(&self, command: String) -> String {
        format!("\"{command}\"")
    }
}

/// Host platform family, the only place quoting is chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Posix,
    Windows,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(windows) {
            Platform::Windows
        } else {
            Platform::Posix
        }
    }

    pub fn quoting(&self) -> &'static dyn CommandQuoting {
        match self {
            Platform::Posix => &PosixQuoting,
            Platform::Windows => &WindowsQuoting,
        }
    }
}

/// Options that survive the allow-list, in their configured order.
pub fn allowed_options(options: &ImageOptions) -> impl Iterator<Item = (&str, &OptionValue)> {
    options
        .iter()
        .filter(|(name, _)| ALLOWED_IMAGE_OPTIONS.contains(name))
}

#[cfg(unix)]
pub fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    std::fs::metadata(path)
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
pub fn is_executable(path: &Path) -> bool {
    path.is_file()
}

pub fn ensure_executable(binary: &Path) -> Result<()> {
    if is_executable(binary) {
        Ok(())
    } else {
        Err(RenderError::BinaryNotExecutable(binary.to_path_buf()))
    }
}

/// Build the renderer command for `binary` and `options`.
///
/// Fails with [`RenderError::BinaryNotExecutable`] before looking at any
/// option when `binary` is missing or not executable. Always ends with
/// `--quiet - -` so the renderer reads HTML from stdin and writes the image
/// to stdout.
pub fn build_command(binary: &Path, options: &ImageOptions) -> Result<CommandLine> {
    ensure_executable(binary)?;

    let mut command = CommandLine::new(binary);

    for (name, value) in allowed_options(options) {
        if value.is_empty() {
            continue;
        }

        command = match value {
            OptionValue::Nested(entries) => entries.iter().fold(command, |cmd, (key, val)| {
                cmd.flag(name).value(key.as_str()).value(val.as_str())
            }),
            OptionValue::Scalar(text) => command.flag(name).value(text.as_str()),
            OptionValue::Flag(_) | OptionValue::Absent => command.flag(name),
        };
    }

    let command = command.flag("quiet").stdio().stdio();
    debug!("Built renderer command: {}", command);

    Ok(command)
}
