//! Terminal remediation prompts

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use ess_migration::{
    DiscoveredPath, ExtraFileResolver, FileResolution, MigrationError, MigrationResult,
    MissingSecret, SecretResolver,
};

/// Resolver that asks the operator on a terminal
pub(crate) struct TerminalResolver<I, O> {
    input: I,
    output: O,
}

impl TerminalResolver<io::StdinLock<'static>, io::Stderr> {
    pub(crate) fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stderr())
    }
}

impl<I: BufRead, O: Write> TerminalResolver<I, O> {
    pub(crate) fn new(input: I, output: O) -> Self {
        Self { input, output }
    }

    /// Prompt until a non-empty line is entered
    fn ask(&mut self, prompt: &str) -> MigrationResult<String> {
        loop {
            write!(self.output, "{prompt}")
                .and_then(|()| self.output.flush())
                .map_err(|err| MigrationError::Cancelled(err.to_string()))?;

            let mut line = String::new();
            let read = self
                .input
                .read_line(&mut line)
                .map_err(|err| MigrationError::Cancelled(err.to_string()))?;
            if read == 0 {
                return Err(MigrationError::Cancelled("input closed".to_string()));
            }
            let answer = line.trim();
            if !answer.is_empty() {
                return Ok(answer.to_string());
            }
        }
    }

    fn say(&mut self, message: &str) -> MigrationResult<()> {
        writeln!(self.output, "{message}").map_err(|err| MigrationError::Cancelled(err.to_string()))
    }
}

impl<I: BufRead, O: Write> SecretResolver for TerminalResolver<I, O> {
    fn resolve_secret(
        &mut self,
        component: &str,
        missing: &MissingSecret,
    ) -> MigrationResult<Option<String>> {
        self.say(&format!(
            "{component}: required secret '{}' was not found",
            missing.target_secret_key
        ))?;
        let value = self.ask(&format!("{}: ", missing.description))?;
        Ok(Some(value))
    }
}

impl<I: BufRead, O: Write> ExtraFileResolver for TerminalResolver<I, O> {
    fn resolve_file(
        &mut self,
        missing: &DiscoveredPath,
    ) -> MigrationResult<Option<FileResolution>> {
        self.say(&format!(
            "{} referenced by '{}' in {} was not found",
            missing.source_path.display(),
            missing.config_key,
            missing.source_file
        ))?;
        loop {
            let choice = self.ask("[p]rovide another path, [d]irectory to search, [s]kip: ")?;
            match choice.to_ascii_lowercase().as_str() {
                "p" | "path" => {
                    let path = self.ask("Path: ")?;
                    return Ok(Some(FileResolution::Alternative(PathBuf::from(path))));
                }
                "d" | "directory" => {
                    let dir = self.ask("Directory: ")?;
                    return Ok(Some(FileResolution::SearchDirectory(PathBuf::from(dir))));
                }
                "s" | "skip" => return Ok(Some(FileResolution::Skip)),
                _ => self.say("Please answer p, d or s")?,
            }
        }
    }
}
