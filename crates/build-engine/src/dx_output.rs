//! Classification of dx output
//!
//! dx reports problems on stderr. A line starting with `warning` opens a
//! warning block; `error`, `trouble`, `exception` or `unexpected top-level`
//! open an error block. Lines without a marker (stack frames, explanations)
//! belong to the block above them. stdout carries informational output, minus
//! the per-file `processing ...` chatter.

use std::path::Path;
use once_cell::sync::Lazy;
use regex::Regex;

use droid_dex_core::{CompilerMessage, MessageKind};

use crate::process::ProcessOutput;

static WARNING_START: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^warning").unwrap());

static ERROR_START: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(error|trouble|exception|unexpected top-level)").unwrap());

static PROGRESS_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^processing").unwrap());

/// dx output split by severity
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DexMessages {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub infos: Vec<String>,
}

impl DexMessages {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    fn push(&mut self, kind: MessageKind, line: String) {
        match kind {
            MessageKind::Error => self.errors.push(line),
            MessageKind::Warning => self.warnings.push(line),
            MessageKind::Info => self.infos.push(line),
        }
    }

    pub fn get(&self, kind: MessageKind) -> &[String] {
        match kind {
            MessageKind::Error => &self.errors,
            MessageKind::Warning => &self.warnings,
            MessageKind::Info => &self.infos,
        }
    }

    /// Compiler messages attributed to `module`; errors first, then warnings, then info
    pub fn into_compiler_messages(self, builder: &str, module: &str) -> Vec<CompilerMessage> {
        let DexMessages { errors, warnings, infos } = self;
        [
            (MessageKind::Error, errors),
            (MessageKind::Warning, warnings),
            (MessageKind::Info, infos),
        ]
        .into_iter()
        .flat_map(|(kind, lines)| {
            lines
                .into_iter()
                .map(move |text| CompilerMessage::new(builder, kind, text).with_module(module))
        })
        .collect()
    }
}

/// Classify everything a dx run printed.
///
/// `output_file` is checked after the fact: a clean exit that produced no
/// dex file and printed no error is still an error.
pub fn classify_output(output: &ProcessOutput, output_file: &Path) -> DexMessages {
    let mut messages = DexMessages::default();

    for line in output.stdout.iter().map(|l| l.trim()) {
        if line.is_empty() || PROGRESS_LINE.is_match(line) {
            continue;
        }
        messages.infos.push(line.to_string());
    }

    let mut category = MessageKind::Error;
    for line in output.stderr.iter().map(|l| l.trim()) {
        if line.is_empty() {
            continue;
        }
        if WARNING_START.is_match(line) {
            category = MessageKind::Warning;
        } else if ERROR_START.is_match(line) {
            category = MessageKind::Error;
        }
        messages.push(category, line.to_string());
    }

    if !messages.has_errors() {
        if !output.success() {
            messages.errors.push(match output.exit_code {
                Some(code) => format!("dx exited with code {}", code),
                None => "dx was terminated by a signal".to_string(),
            });
        } else if !output_file.is_file() {
            messages.errors.push("Cannot create classes.dex file".to_string());
        }
    }

    messages
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output(code: Option<i32>, stdout: &[&str], stderr: &[&str]) -> ProcessOutput {
        ProcessOutput {
            exit_code: code,
            stdout: stdout.iter().map(|s| s.to_string()).collect(),
            stderr: stderr.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn existing_file() -> tempfile::NamedTempFile {
        tempfile::NamedTempFile::new().unwrap()
    }

    #[test]
    fn test_warning_block_keeps_continuation_lines() {
        let dex = existing_file();
        let out = output(
            Some(0),
            &[],
            &[
                "warning: Ignoring InnerClasses attribute for an anonymous inner class",
                "(com.example.Foo$1) that doesn't come with an",
                "",
                "associated EnclosingMethod attribute.",
            ],
        );
        let messages = classify_output(&out, dex.path());

        assert!(messages.errors.is_empty());
        assert_eq!(messages.warnings.len(), 3);
    }

    #[test]
    fn test_error_after_warning_switches_category() {
        let dex = existing_file();
        let out = output(
            Some(2),
            &[],
            &[
                "warning: something minor",
                "UNEXPECTED TOP-LEVEL EXCEPTION:",
                "java.lang.IllegalArgumentException: already added: Lcom/example/Foo;",
                "\tat com.android.dx.dex.file.ClassDefsSection.add(ClassDefsSection.java:123)",
            ],
        );
        let messages = classify_output(&out, dex.path());

        assert_eq!(messages.warnings, vec!["warning: something minor".to_string()]);
        assert_eq!(messages.errors.len(), 3);
        assert!(messages.has_errors());
    }

    #[test]
    fn test_unmarked_stderr_is_an_error() {
        let dex = existing_file();
        let messages = classify_output(&output(Some(1), &[], &["no classfiles specified"]), dex.path());
        assert_eq!(messages.errors, vec!["no classfiles specified".to_string()]);
    }

    #[test]
    fn test_stdout_is_info_without_progress_chatter() {
        let dex = existing_file();
        let out = output(
            Some(0),
            &["processing /out/app/com/example/Foo.class...", "  ", "writing classes.dex; size 1024"],
            &[],
        );
        let messages = classify_output(&out, dex.path());

        assert_eq!(messages.infos, vec!["writing classes.dex; size 1024".to_string()]);
        assert!(!messages.has_errors());
    }

    #[test]
    fn test_silent_failure_gets_an_error() {
        let dex = existing_file();
        let messages = classify_output(&output(Some(1), &[], &[]), dex.path());
        assert_eq!(messages.errors, vec!["dx exited with code 1".to_string()]);

        let messages = classify_output(&output(None, &[], &[]), dex.path());
        assert_eq!(messages.errors, vec!["dx was terminated by a signal".to_string()]);
    }

    #[test]
    fn test_missing_output_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let messages = classify_output(&output(Some(0), &["done"], &[]), &dir.path().join("classes.dex"));
        assert_eq!(messages.errors, vec!["Cannot create classes.dex file".to_string()]);
    }

    #[test]
    fn test_into_compiler_messages_orders_by_severity() {
        let messages = DexMessages {
            errors: vec!["e".into()],
            warnings: vec!["w".into()],
            infos: vec!["i".into()],
        };
        let converted = messages.into_compiler_messages("android-dex", "app");
        let kinds: Vec<MessageKind> = converted.iter().map(|m| m.kind).collect();

        assert_eq!(kinds, vec![MessageKind::Error, MessageKind::Warning, MessageKind::Info]);
        assert!(converted.iter().all(|m| m.module.as_deref() == Some("app")));
    }
}
