//! Bridge error types.

use std::path::PathBuf;

/// Result type for bridge operations
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Errors raised while bringing the foreign VM up.
///
/// Cloneable so that every caller blocked on an in-flight start observes the
/// same failure.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StartupError {
    /// No `libjvm` found for the requested version
    #[error("Could not find libjvm for Java {version} (searched {} locations)", .searched.len())]
    LibraryNotFound {
        /// Requested Java version
        version: String,
        /// Every candidate path that was probed
        searched: Vec<PathBuf>,
    },

    /// The shared library exists but could not be loaded
    #[error("Failed to load {}: {reason}", .path.display())]
    LibraryLoad {
        /// Library path
        path: PathBuf,
        /// Loader message
        reason: String,
    },

    /// The library does not export a required symbol
    #[error("Symbol {symbol} missing from {}", .path.display())]
    SymbolMissing {
        /// Missing symbol
        symbol: String,
        /// Library path
        path: PathBuf,
    },

    /// `JNI_CreateJavaVM` returned non-zero
    #[error("JVM creation failed with code {code}")]
    CreateFailed {
        /// JNI status code
        code: i32,
    },

    /// Configuration rejected before launch
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A JVM already exists in this process
    #[error("A JVM has already been created in this process")]
    AlreadyCreated,

    /// `start` called while running with a different configuration
    #[error("VM is already running with a different configuration")]
    ConfigurationConflict,

    /// The manager was shut down; a VM cannot be recreated
    #[error("VM has been shut down and cannot be restarted")]
    Terminated,
}

/// Errors produced by the bridge
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// VM startup failed
    #[error("Startup error: {0}")]
    Startup(#[from] StartupError),

    /// Class lookup yielded no class
    #[error("Class not found: {0}")]
    ClassNotFound(String),

    /// No method, field, or nested class with this name
    #[error("Member not found: {class}.{member}")]
    MemberNotFound {
        /// Owning class (binary name)
        class: String,
        /// Member name, with arity for methods
        member: String,
    },

    /// Two or more overloads matched equally well
    #[error("Ambiguous call to {class}.{method}: candidates {}", .candidates.join(", "))]
    AmbiguousOverload {
        /// Owning class (binary name)
        class: String,
        /// Method name
        method: String,
        /// Descriptors of the equally ranked overloads
        candidates: Vec<String>,
    },

    /// A foreign exception was raised (and cleared) during a call
    #[error("{class_name}: {}", .message.as_deref().unwrap_or("<no message>"))]
    ForeignException {
        /// Binary name of the throwable's class
        class_name: String,
        /// `Throwable.getMessage()`, if any
        message: Option<String>,
    },

    /// Operation before start or after shutdown
    #[error("VM is not running")]
    NotRunning,

    /// Value not representable under the target signature
    #[error("Conversion error: {0}")]
    Conversion(String),

    /// The current thread could not attach to the VM
    #[error("Failed to attach current thread (code {code})")]
    Attach {
        /// JNI status code
        code: i32,
    },

    /// A local handle used outside the frame or thread that created it
    #[error("Stale native handle")]
    StaleHandle,

    /// Malformed namespace path
    #[error("Invalid namespace path: {0}")]
    InvalidNamespace(String),

    /// Shutdown requested by a thread that still has a call frame open.
    /// The drain would wait on that thread's own call.
    #[error("Cannot shut down from inside an open call frame")]
    ShutdownInFrame,
}

impl BridgeError {
    /// Whether this error is a cleared foreign exception of the given class.
    pub fn is_foreign(&self, class_name: &str) -> bool {
        matches!(self, BridgeError::ForeignException { class_name: c, .. } if c == class_name)
    }
}
