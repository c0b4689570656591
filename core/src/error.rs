use std::fmt;

use crate::val::Val;

/// Category of a runtime failure. Exception handlers and the CLI both key
/// off this, so the set mirrors the user-visible error taxonomy rather than
/// internal module boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Produced by the ingest layer (lexer/parser), surfaced verbatim.
    Parse,
    /// Method not found after the DNU chain, or wrong arity on a call.
    Dispatch,
    /// Type mismatch or arithmetic failure inside a native routine.
    Value,
    /// Slot-name or selector conflict, or a cycle in the parent graph.
    ClassConstruction,
    /// Non-local return whose home activation is no longer on the stack.
    ReturnFromDeadActivation,
    /// All runnable processes are blocked with no possible wake-up.
    Scheduler,
    /// Raised from user code via `Error signal:`.
    Signal,
    /// VM invariant violated (work queue or eval stack underflow).
    Internal,
}

impl ErrorKind {
    pub fn label(self) -> &'static str {
        match self {
            ErrorKind::Parse => "parse",
            ErrorKind::Dispatch => "dispatch",
            ErrorKind::Value => "value",
            ErrorKind::ClassConstruction => "class-construction",
            ErrorKind::ReturnFromDeadActivation => "return-from-dead-activation",
            ErrorKind::Scheduler => "scheduler",
            ErrorKind::Signal => "signal",
            ErrorKind::Internal => "internal",
        }
    }
}

/// A runtime error carrying its kind, message and the activation trace at
/// the point of raising (selector names, innermost first).
#[derive(Debug, Clone)]
pub struct RuntimeError {
    pub kind: ErrorKind,
    pub message: String,
    pub trace: Vec<String>,
    /// The exception Instance for user signals, so a matching `on:do:`
    /// handler receives the object that was signalled rather than a
    /// reconstruction of it.
    pub(crate) payload: Option<Val>,
}

impl RuntimeError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            trace: Vec::new(),
            payload: None,
        }
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Parse, message)
    }

    pub fn dispatch(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Dispatch, message)
    }

    pub fn value(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Value, message)
    }

    pub fn class_construction(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ClassConstruction, message)
    }

    pub fn dead_activation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ReturnFromDeadActivation, message)
    }

    pub fn scheduler(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Scheduler, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    pub(crate) fn signal(message: impl Into<String>, payload: Val) -> Self {
        let mut err = Self::new(ErrorKind::Signal, message);
        err.payload = Some(payload);
        err
    }

    pub(crate) fn with_trace(mut self, trace: Vec<String>) -> Self {
        if self.trace.is_empty() {
            self.trace = trace;
        }
        self
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} error: {}", self.kind.label(), self.message)?;
        for frame in &self.trace {
            write!(f, "\n  in {}", frame)?;
        }
        Ok(())
    }
}

impl std::error::Error for RuntimeError {}

pub type RtResult<T> = Result<T, RuntimeError>;
