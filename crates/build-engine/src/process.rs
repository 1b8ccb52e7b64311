//! External process plumbing
//!
//! Builds java command lines and runs them to completion, collecting every
//! line the process prints. There is no timeout: a hung tool blocks the step.

use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::debug;

use crate::BuildError;

/// A program plus its arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JavaCommandLine {
    pub program: PathBuf,
    pub args: Vec<OsString>,
}

impl JavaCommandLine {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Arguments as UTF-8, lossy
    pub fn args_lossy(&self) -> Vec<String> {
        self.args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    /// Single printable line, arguments with spaces quoted
    pub fn to_command_string(&self) -> String {
        std::iter::once(self.program.to_string_lossy().into_owned())
            .chain(self.args_lossy())
            .map(|part| {
                if part.contains(' ') {
                    format!("\"{}\"", part)
                } else {
                    part
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// `java <vm params> -cp <classpath> <main class> <program params>`
pub fn build_java_command_line(
    java: &Path,
    main_class: &str,
    vm_params: &[&str],
    classpath: &[PathBuf],
    program_params: Vec<OsString>,
) -> Result<JavaCommandLine, BuildError> {
    let mut command = JavaCommandLine::new(java).args(vm_params.iter().copied());

    if !classpath.is_empty() {
        let joined = std::env::join_paths(classpath)
            .map_err(|e| BuildError::ConfigError(format!("Invalid runner classpath: {}", e)))?;
        command = command.arg("-cp").arg(joined);
    }

    Ok(command.arg(main_class).args(program_params))
}

/// Everything a finished process printed, plus how it exited
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Exit code, `None` if killed by a signal
    pub exit_code: Option<i32>,
    pub stdout: Vec<String>,
    pub stderr: Vec<String>,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Runs a command to completion
#[allow(async_fn_in_trait)]
pub trait ToolRunner {
    async fn run(&self, command: &JavaCommandLine) -> io::Result<ProcessOutput>;
}

/// Spawns real processes with tokio
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioProcessRunner;

impl ToolRunner for TokioProcessRunner {
    async fn run(&self, command: &JavaCommandLine) -> io::Result<ProcessOutput> {
        let mut child = Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        // Drain both pipes while waiting, or a chatty tool fills one and stalls
        let (stdout, stderr, status) =
            tokio::join!(read_lines(stdout), read_lines(stderr), child.wait());

        let output = ProcessOutput {
            exit_code: status?.code(),
            stdout: stdout?,
            stderr: stderr?,
        };
        debug!(
            "{:?} exited with {:?} ({} stdout, {} stderr lines)",
            command.program,
            output.exit_code,
            output.stdout.len(),
            output.stderr.len()
        );
        Ok(output)
    }
}

async fn read_lines<R: AsyncRead + Unpin>(stream: Option<R>) -> io::Result<Vec<String>> {
    let mut lines = Vec::new();
    let Some(stream) = stream else {
        return Ok(lines);
    };

    let mut reader = BufReader::new(stream);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            break;
        }
        let line = String::from_utf8_lossy(&buf);
        lines.push(line.trim_end_matches(['\r', '\n']).to_string());
    }
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_java_command_line_layout() {
        let cmd = build_java_command_line(
            Path::new("/jdk/bin/java"),
            "com.example.Runner",
            &["-Xmx1024M"],
            &[PathBuf::from("/a/runner.jar"), PathBuf::from("/b/util.jar")],
            vec!["/sdk/dx.jar".into(), "--exclude".into()],
        )
        .unwrap();

        let separator = if cfg!(windows) { ";" } else { ":" };
        assert_eq!(
            cmd.args_lossy(),
            vec![
                "-Xmx1024M".to_string(),
                "-cp".to_string(),
                format!("/a/runner.jar{}/b/util.jar", separator),
                "com.example.Runner".to_string(),
                "/sdk/dx.jar".to_string(),
                "--exclude".to_string(),
            ]
        );
    }

    #[test]
    fn test_empty_classpath_is_omitted() {
        let cmd = build_java_command_line(Path::new("java"), "Main", &[], &[], vec![]).unwrap();
        assert_eq!(cmd.args_lossy(), vec!["Main".to_string()]);
    }

    #[test]
    fn test_command_string_quotes_spaces() {
        let cmd = JavaCommandLine::new("java").arg("-cp").arg("/Program Files/x.jar");
        assert_eq!(cmd.to_command_string(), "java -cp \"/Program Files/x.jar\"");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_runner_collects_both_streams() {
        let cmd = JavaCommandLine::new("sh")
            .arg("-c")
            .arg("echo out1; echo err1 1>&2; echo out2; exit 3");
        let output = TokioProcessRunner.run(&cmd).await.unwrap();

        assert_eq!(output.exit_code, Some(3));
        assert!(!output.success());
        assert_eq!(output.stdout, vec!["out1".to_string(), "out2".to_string()]);
        assert_eq!(output.stderr, vec!["err1".to_string()]);
    }

    #[tokio::test]
    async fn test_runner_reports_spawn_failure() {
        let cmd = JavaCommandLine::new("/definitely/not/a/real/java");
        assert!(TokioProcessRunner.run(&cmd).await.is_err());
    }
}
