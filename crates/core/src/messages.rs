//! Build Messages
//!
//! The messages a build step reports, and the sinks that receive them.
//! `CollectingSink` keeps them in memory.

use std::fmt;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Severity of a compiler message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Error,
    Warning,
    Info,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Error => "error",
            MessageKind::Warning => "warning",
            MessageKind::Info => "info",
        }
    }
}

/// A single diagnostic produced by a builder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilerMessage {
    /// Name of the builder that produced the message
    pub builder: String,
    pub kind: MessageKind,
    pub text: String,
    /// Module the message is about, if any
    pub module: Option<String>,
}

impl CompilerMessage {
    pub fn new(builder: impl Into<String>, kind: MessageKind, text: impl Into<String>) -> Self {
        Self {
            builder: builder.into(),
            kind,
            text: text.into(),
            module: None,
        }
    }

    /// Attach the source module
    pub fn with_module(mut self, module: impl Into<String>) -> Self {
        self.module = Some(module.into());
        self
    }
}

impl fmt::Display for CompilerMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: [{}]", self.kind.as_str(), self.builder)?;
        if let Some(module) = &self.module {
            write!(f, " ({})", module)?;
        }
        write!(f, " {}", self.text)
    }
}

/// Anything a builder can send to its context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BuildMessage {
    /// Diagnostic
    Compiler(CompilerMessage),
    /// Status line, e.g. "Executing DEX"
    Progress { text: String },
}

impl BuildMessage {
    pub fn progress(text: impl Into<String>) -> Self {
        BuildMessage::Progress { text: text.into() }
    }

    pub fn as_compiler(&self) -> Option<&CompilerMessage> {
        match self {
            BuildMessage::Compiler(msg) => Some(msg),
            BuildMessage::Progress { .. } => None,
        }
    }
}

impl From<CompilerMessage> for BuildMessage {
    fn from(msg: CompilerMessage) -> Self {
        BuildMessage::Compiler(msg)
    }
}

/// Receiver of build messages
pub trait MessageSink: Send + Sync {
    fn process_message(&self, message: BuildMessage);
}

/// Sink that records every message
#[derive(Default)]
pub struct CollectingSink {
    messages: Mutex<Vec<BuildMessage>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all messages received so far
    pub fn messages(&self) -> Vec<BuildMessage> {
        self.messages.lock().clone()
    }

    /// Compiler messages only, in arrival order
    pub fn compiler_messages(&self) -> Vec<CompilerMessage> {
        self.messages
            .lock()
            .iter()
            .filter_map(|m| m.as_compiler().cloned())
            .collect()
    }

    /// Compiler messages of one kind
    pub fn of_kind(&self, kind: MessageKind) -> Vec<CompilerMessage> {
        self.compiler_messages()
            .into_iter()
            .filter(|m| m.kind == kind)
            .collect()
    }

    pub fn count(&self, kind: MessageKind) -> usize {
        self.of_kind(kind).len()
    }
}

impl MessageSink for CollectingSink {
    fn process_message(&self, message: BuildMessage) {
        self.messages.lock().push(message);
    }
}
