//! Runs an external program once per source.
//!
//! The source bytes are fed on stdin and `{input}` in the arguments is
//! replaced by the source location. Whatever the program prints on stdout
//! becomes the target. On failure, the first stderr line shaped like
//! `<file>:<start>:<end>: <message>` is reported as a structured error.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;

use kiln_common::Location;
use kiln_config::RuleOptions;
use tracing::debug;

use crate::transform::{Product, SourceUnit, StructuredError, Transform, TransformError};

/// A transform backed by an external program.
#[derive(Debug, Clone)]
pub struct CommandTransform {
    program: String,
    args: Vec<String>,
    options: RuleOptions,
    working_dir: PathBuf,
}

fn failed(message: String) -> TransformError {
    TransformError::Failed(message.into())
}

fn flag(on: bool) -> &'static str {
    if on {
        "true"
    } else {
        "false"
    }
}

impl CommandTransform {
    /// Creates a transform from a program and its arguments. Returns `None`
    /// if `command` is empty.
    pub fn new(command: &[String], options: RuleOptions, working_dir: &Path) -> Option<Self> {
        let (program, args) = command.split_first()?;
        Some(Self {
            program: program.clone(),
            args: args.to_vec(),
            options,
            working_dir: working_dir.to_path_buf(),
        })
    }

    fn arguments(&self, unit: &SourceUnit) -> Vec<String> {
        let input = unit.location.to_string();
        self.args
            .iter()
            .map(|arg| {
                arg.replace("{input}", &input)
                    .replace("{verify}", flag(self.options.verify))
                    .replace("{emit}", flag(self.options.emit_intermediates))
            })
            .collect()
    }

    fn run(&self, unit: &SourceUnit) -> Result<Vec<u8>, TransformError> {
        let mut child = Command::new(&self.program)
            .args(self.arguments(unit))
            .current_dir(&self.working_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| failed(format!("cannot run '{}': {e}", self.program)))?;

        // A program that never reads stdin closes the pipe early; that is
        // not a failure of the transform.
        let feeder = child.stdin.take().map(|mut stdin| {
            let content = unit.content.clone();
            thread::spawn(move || {
                let _ = stdin.write_all(&content);
            })
        });
        let output = child
            .wait_with_output()
            .map_err(|e| failed(format!("'{}' did not finish: {e}", self.program)))?;
        if let Some(feeder) = feeder {
            let _ = feeder.join();
        }

        if output.status.success() {
            return Ok(output.stdout);
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        if let Some(err) = stderr.lines().find_map(parse_diagnostic) {
            let err = if Location::from_reported(&err.filename) == unit.location {
                err.with_origin(unit.key.clone())
            } else {
                err
            };
            return Err(err.into());
        }
        let detail = stderr.lines().next().unwrap_or_default().trim();
        Err(failed(format!(
            "'{}' {} on {}: {detail}",
            self.program, output.status, unit.location
        )))
    }
}

impl Transform for CommandTransform {
    fn name(&self) -> &str {
        &self.program
    }

    fn apply(&mut self, batch: &[SourceUnit]) -> Result<Vec<Product>, TransformError> {
        let mut products = Vec::with_capacity(batch.len());
        for unit in batch {
            debug!(program = %self.program, input = %unit.location, "running command");
            let content = self.run(unit)?;
            products.push(Product {
                id: unit.key.id.clone(),
                content,
            });
        }
        Ok(products)
    }
}

/// Parses a `<file>:<start>:<end>: <message>` diagnostic line.
///
/// The filename may itself contain colons; the first split that leaves two
/// offsets and a message wins.
pub fn parse_diagnostic(line: &str) -> Option<StructuredError> {
    for (i, _) in line.match_indices(':') {
        let filename = &line[..i];
        if filename.is_empty() {
            continue;
        }
        let mut parts = line[i + 1..].splitn(3, ':');
        let (Some(start), Some(end), Some(message)) = (parts.next(), parts.next(), parts.next())
        else {
            continue;
        };
        let (Ok(start), Ok(end)) = (start.parse::<usize>(), end.parse::<usize>()) else {
            continue;
        };
        if end < start {
            continue;
        }
        return Some(StructuredError::new(filename, start, end, message.trim()));
    }
    None
}
