use thiserror::Error;

use crate::ir::BlockId;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library
/// can potentially return.
///
/// Every classifiable failure in this library is a programmer error: the CFG
/// handed to the layout pass violated a structural rule, or the pass itself
/// was asked to do something its own bookkeeping forbids (lay out a block
/// twice, open a second protected region, follow a branch whose recorded
/// offset disagrees with its target's label). There are no recoverable
/// runtime errors (the CFG is in-memory and under the pass's exclusive
/// control), so callers are expected to treat any `Err` as fatal for the
/// function being compiled. No partial layout is ever produced.
///
/// # Examples
///
/// ```rust
/// use bblayout::{ir::Function, layout::lay_out_function, Error};
///
/// let mut func = Function::new("broken");
/// match lay_out_function(&mut func, false) {
///     Err(Error::Malformed { message, file, line }) => {
///         eprintln!("malformed CFG: {} ({}:{})", message, file, line);
///     }
///     Err(e) => eprintln!("other error: {}", e),
///     Ok(_) => unreachable!("a function with no blocks cannot be laid out"),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// The control flow graph is damaged or an internal invariant was
    /// violated.
    ///
    /// This covers malformed input (a conditional block without exactly two
    /// successors, a block with no terminator where one is required) as well
    /// as violations detected mid-flight (nested `try` without an `endtry`,
    /// an `endtry` emitted before its `try`, a branch offset that does not
    /// match its target's label). The message names the function and block
    /// involved; the source location records where the violation was
    /// detected.
    ///
    /// # Fields
    ///
    /// * `message` - Detailed description of what was malformed
    /// * `file` - Source file where the error was detected
    /// * `line` - Source line where the error was detected
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// A block id was out of range or referred to a removed block.
    ///
    /// Block ids are dense indices into the function's block table. This
    /// error occurs when an edge or a caller names a slot that does not
    /// exist or has been nullified by unreachable-block removal.
    #[error("{0} is out of range or has been removed")]
    InvalidBlock(BlockId),

    /// File I/O error.
    ///
    /// Wraps standard I/O errors from writing the debug CFG dump. No other
    /// operation in this library touches the filesystem.
    #[error("{0}")]
    FileError(#[from] std::io::Error),
}
