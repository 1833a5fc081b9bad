use anyhow::{Context, Result};
use std::io::{BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Output, Stdio};
use std::thread;
use tracing::{debug, error, warn};

/// How much of each streamed output is kept for error messages
const CAPTURE_TAIL_BYTES: usize = 64 * 1024;

/// Output of a finished child process, decoded lossily
#[derive(Debug)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    fn from_output(output: Output) -> Self {
        Self {
            status: output.status,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }
    }

    pub fn success(&self) -> bool {
        self.status.success()
    }

    /// Combined output for error messages, stderr last since that is where tools complain
    pub fn combined(&self) -> String {
        let mut text = String::new();
        for part in [self.stdout.trim(), self.stderr.trim()] {
            if part.is_empty() {
                continue;
            }
            if !text.is_empty() {
                text.push('\n');
            }
            text.push_str(part);
        }
        text
    }

    /// Fail with the exit code and captured output if the command did not succeed
    pub fn ensure_success(&self, description: &str) -> Result<()> {
        if self.success() {
            return Ok(());
        }

        let code = self
            .status
            .code()
            .map(|c| c.to_string())
            .unwrap_or_else(|| "signal".to_string());
        let output = self.combined();
        if output.is_empty() {
            anyhow::bail!("{} failed with exit code {}", description, code);
        }
        anyhow::bail!("{} failed with exit code {}:\n{}", description, code, output)
    }
}

fn display_command(program: &Path, args: &[String]) -> String {
    let mut rendered = program.display().to_string();
    for arg in args {
        rendered.push(' ');
        rendered.push_str(arg);
    }
    rendered
}

/// Run a program with captured stdout/stderr and no stdin
pub fn execute(program: &Path, args: &[String]) -> Result<CommandOutput> {
    debug!(command = %display_command(program, args), "executing");
    let output = Command::new(program)
        .args(args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .stdin(Stdio::null())
        .output()
        .with_context(|| format!("Failed to execute command: {}", program.display()))?;

    let output = CommandOutput::from_output(output);
    debug!(exit_code = ?output.status.code(), "command finished");
    Ok(output)
}

/// Run a program attached to the terminal (stdin/stdout/stderr inherited)
pub fn execute_interactive(program: &Path, args: &[String]) -> Result<ExitStatus> {
    debug!(command = %display_command(program, args), "executing interactively");
    Command::new(program)
        .args(args)
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()
        .with_context(|| {
            format!(
                "Failed to execute interactive command: {}",
                program.display()
            )
        })
}

/// Run a program, echoing its output to our stdout/stderr as it arrives while
/// also keeping a copy of it for error reporting.
pub fn execute_streaming(program: &Path, args: &[String]) -> Result<CommandOutput> {
    debug!(command = %display_command(program, args), "executing with streamed output");
    let mut child = match Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
    {
        Ok(child) => child,
        Err(e) => {
            error!(err = %e, "failed to spawn command");
            return Err(e)
                .with_context(|| format!("Failed to execute command: {}", program.display()));
        }
    };

    let stdout = child
        .stdout
        .take()
        .context("stdout was not piped")?;
    let stderr = child
        .stderr
        .take()
        .context("stderr was not piped")?;

    let stdout_handle =
        thread::spawn(move || tee(stdout, std::io::stdout(), CAPTURE_TAIL_BYTES));
    let stderr_handle =
        thread::spawn(move || tee(stderr, std::io::stderr(), CAPTURE_TAIL_BYTES));

    let status = child
        .wait()
        .with_context(|| format!("Failed to wait for command: {}", program.display()))?;

    let (stdout, stdout_dropped) =
        join_tee(stdout_handle).context("Failed to read command stdout")?;
    let (stderr, stderr_dropped) =
        join_tee(stderr_handle).context("Failed to read command stderr")?;

    if stdout_dropped > 0 || stderr_dropped > 0 {
        warn!(stdout_dropped, stderr_dropped, "kept only the tail of the output");
    }

    debug!(exit_code = ?status.code(), "command finished");
    Ok(CommandOutput {
        status,
        stdout,
        stderr,
    })
}

/// Copy `source` to `sink` line by line, keeping at most the last `limit`
/// bytes. Returns the kept tail and how many bytes were dropped before it.
fn tee<R: Read, W: Write>(
    source: R,
    mut sink: W,
    limit: usize,
) -> std::io::Result<(String, usize)> {
    let mut reader = BufReader::new(source);
    let mut captured = Vec::new();
    let mut dropped = 0usize;
    let mut line = Vec::new();
    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line)? == 0 {
            break;
        }
        sink.write_all(&line)?;
        sink.flush()?;
        captured.extend_from_slice(&line);
        // trim in batches so long outputs are not shifted on every line
        if captured.len() > limit.saturating_mul(2) {
            let excess = captured.len() - limit;
            captured.drain(..excess);
            dropped += excess;
        }
    }
    if captured.len() > limit {
        let excess = captured.len() - limit;
        captured.drain(..excess);
        dropped += excess;
    }
    Ok((String::from_utf8_lossy(&captured).into_owned(), dropped))
}

fn join_tee(
    handle: thread::JoinHandle<std::io::Result<(String, usize)>>,
) -> Result<(String, usize)> {
    match handle.join() {
        Ok(result) => Ok(result?),
        Err(_) => anyhow::bail!("output reader thread panicked"),
    }
}

/// Locate an executable by name on PATH, or validate an explicit path
pub fn resolve_binary(name: &str) -> Result<PathBuf> {
    which::which(name).with_context(|| {
        format!(
            "{} not found. Please install it and make sure it is on your PATH",
            name
        )
    })
}
