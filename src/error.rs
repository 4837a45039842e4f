use thiserror::Error;

/// The generic Error type covering all errors this library can return.
///
/// Errors are reserved for malformed *input*: an IR that violates the shape
/// the analyses and the pass rely on. Internal inconsistencies discovered
/// while the pass runs are programmer errors and abort via assertions
/// instead of surfacing here.
///
/// # Examples
///
/// ```rust
/// use ssapre::{Error, ir::FunctionBuilder, ir::Type};
///
/// let mut builder = FunctionBuilder::new("broken", &[Type::I32]);
/// builder.create_block();
/// // The single block never received a terminator.
/// match builder.finish() {
///     Err(Error::InvalidIr { message, .. }) => {
///         assert!(message.contains("terminator"));
///     }
///     other => panic!("expected InvalidIr, got {other:?}"),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// The input function is structurally invalid.
    ///
    /// Raised when a basic block is missing its terminator, a terminator
    /// appears in the middle of a block, a φ node sits below a real
    /// instruction, or a φ's incoming list disagrees with the block's CFG
    /// predecessors. The error records the source location that detected
    /// the malformation.
    #[error("invalid IR - {file}:{line}: {message}")]
    InvalidIr {
        /// Description of the malformed construct.
        message: String,
        /// Source file that detected the malformation.
        file: &'static str,
        /// Source line that detected the malformation.
        line: u32,
    },

    /// A use is not dominated by its definition.
    ///
    /// Raised by [`Function::verify`](crate::ir::Function::verify) when the
    /// function is not in valid SSA form. The pass requires SSA input and
    /// guarantees SSA output; this error identifies the offending value.
    #[error("SSA violation: use of {value} in block {block} is not dominated by its definition")]
    SsaViolation {
        /// Index of the value whose use escapes its definition.
        value: usize,
        /// Block containing the offending use.
        block: usize,
    },

    /// A referenced entity (block, value) does not exist.
    #[error("{0}")]
    OutOfBounds(String),

    /// Generic error for miscellaneous failures.
    #[error("{0}")]
    Error(String),
}

macro_rules! invalid_ir {
    ($msg:expr) => {
        crate::Error::InvalidIr {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::InvalidIr {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

pub(crate) use invalid_ir;

/// Convenience `Result` alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
