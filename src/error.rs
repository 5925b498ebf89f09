//! Unified error types for the marshaling bridge.
//!
//! Two severities exist and behave differently at a boundary frame:
//!
//! - **Fatal**: [`BridgeError::InvalidTag`] and
//!   [`BridgeError::ConstructorUnavailable`] indicate a corrupted tag or
//!   a foreign-ABI version mismatch. They are never user-triggerable
//!   through normal calls; a boundary entry point reports them and
//!   aborts the process.
//! - **Recoverable**: the coercion-family errors are surfaced to the
//!   caller as a host-level failure naming both the offending host type
//!   and the expected tag or protocol.
//!
//! Foreign stack frames do not understand host errors, so boundary entry
//! points never let a `BridgeError` cross: they format it (including any
//! attached contextual notes), report it through the foreign ABI's error
//! printer, and convert it to a [`CallStatus`] code.
//!
//! [`CallStatus`]: varbridge_abi::CallStatus

use thiserror::Error;
use varbridge_abi::tags::InvalidTag;
use varbridge_abi::VariantTag;

pub type BridgeResult<T> = Result<T, BridgeError>;

#[derive(Debug, Error)]
pub enum BridgeError {
    /// Tag value outside the closed set. Fatal.
    #[error(transparent)]
    InvalidTag(#[from] InvalidTag),

    /// The foreign ABI exposes no constructor for this conversion. Fatal:
    /// it signals a foreign feature/version mismatch, not a bad argument.
    #[error("no variant constructor available for tag {}", tag.name())]
    ConstructorUnavailable { tag: VariantTag },

    /// The host object does not satisfy the coercion protocol the
    /// requested tag needs.
    #[error("host object of type '{host_type}' cannot be interpreted as {expected}")]
    TypeCoercion {
        host_type: String,
        expected: &'static str,
    },

    /// No casting rule matches the source object and the requested tag.
    #[error("host object of type '{host_type}' is not castable to variant of type {}", tag.name())]
    NotCastable { host_type: String, tag: VariantTag },

    /// A non-none source was asked to write through a null destination.
    #[error("cannot copy host object of type '{host_type}' to a null destination")]
    NullTarget { host_type: String },

    /// Argument vector arity mismatch, raised before any conversion runs.
    #[error("argument count mismatch: expected {expected}, got {got}")]
    ArgumentCount { expected: usize, got: usize },

    /// Failure raised by host-level code (a callable body, a class
    /// constructor, a protocol implementation), with contextual notes
    /// attached on the way out.
    #[error("{message}")]
    Host { message: String, notes: Vec<String> },

    /// Host code requested process termination. Special-cased at the
    /// boundary: exits immediately without further cleanup.
    #[error("host requested process exit with code {code}")]
    SystemExit { code: i32 },
}

impl BridgeError {
    pub fn host(message: impl Into<String>) -> Self {
        BridgeError::Host {
            message: message.into(),
            notes: Vec::new(),
        }
    }

    /// Attach a contextual note; non-host errors pass through unchanged
    /// and keep their structured fields.
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        if let BridgeError::Host { notes, .. } = &mut self {
            notes.push(note.into());
        }
        self
    }

    /// Errors that indicate foreign-ABI corruption or mismatch rather
    /// than a bad call.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            BridgeError::InvalidTag(_) | BridgeError::ConstructorUnavailable { .. }
        )
    }

    /// Full report text, notes included, for the foreign error printer.
    pub fn report_text(&self) -> String {
        match self {
            BridgeError::Host { message, notes } if !notes.is_empty() => {
                let mut text = message.clone();
                for note in notes {
                    text.push_str("\n  ");
                    text.push_str(note);
                }
                text
            }
            other => other.to_string(),
        }
    }
}
