//! # bblayout Prelude
//!
//! This module provides a convenient prelude for the most commonly used
//! types from the library. Import this module to get quick access to the
//! essential types for building CFGs and running the layout pass.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all bblayout operations
pub use crate::Error;

/// The result type used throughout bblayout
pub use crate::Result;

// ================================================================================================
// Intermediate Representation
// ================================================================================================

/// Function container and CFG nodes
pub use crate::ir::{BasicBlock, BlockAttributes, BlockId, BlockKind, Function};

/// Statements, terminators, and condition shapes
pub use crate::ir::{BranchOp, CmpOp, Compare, ConstValue, Label, Operand, Stmt, VarId};

// ================================================================================================
// Layout Pass
// ================================================================================================

/// The layout driver and its result
pub use crate::layout::{lay_out_function, LayoutResult};

/// Pass trait and the layout pass object
pub use crate::pass::{BbLayout, FunctionPass};
