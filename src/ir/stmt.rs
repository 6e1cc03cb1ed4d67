//! IR statements and the tagged terminator forms.
//!
//! This module defines the statement type stored in basic blocks, together
//! with the supporting condition shapes used by conditional branches. The
//! design follows a tagged-terminator model: instead of downcasting, the
//! terminating statement of a block is an enum variant carrying its own
//! payload ([`Stmt::Goto`] carries its target label, [`Stmt::CondGoto`]
//! carries the branch sense, the compare, and the taken label).
//!
//! The "opposite" tables used by branch threading and conditional inversion
//! live directly on the variants: [`BranchOp::inverted`] flips the branch
//! sense and [`CmpOp::opposite`] flips a comparison
//! (`eq`↔`ne`, `lt`↔`ge`, `le`↔`gt`).
//!
//! # Usage Examples
//!
//! ```rust
//! use bblayout::ir::{BranchOp, CmpOp, Compare, Label, Operand, Stmt, VarId};
//!
//! let cond = Compare {
//!     op: CmpOp::Gt,
//!     lhs: Operand::Var(VarId::new(0)),
//!     rhs: Operand::int32(3),
//! };
//! let branch = Stmt::CondGoto {
//!     op: BranchOp::BrFalse,
//!     cond,
//!     target: Label::new(1),
//! };
//! assert!(branch.is_cond_branch());
//! assert_eq!(branch.branch_target(), Some(Label::new(1)));
//! ```

use std::fmt;

/// A symbolic branch-target label.
///
/// Labels are minted on demand by [`crate::ir::Function::get_or_create_label`],
/// which is the only legal way to obtain a branch target. Repeated calls for
/// the same block return the same label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Label(u32);

impl Label {
    /// Creates a label from a raw index.
    #[must_use]
    pub const fn new(index: u32) -> Self {
        Label(index)
    }

    /// Returns the raw label index.
    #[must_use]
    pub const fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@L{}", self.0)
    }
}

/// An opaque variable id used in compare operands.
///
/// The layout pass never interprets variables; it only compares them for
/// structural identity when matching branch conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VarId(u32);

impl VarId {
    /// Creates a variable id from a raw index.
    #[must_use]
    pub const fn new(index: u32) -> Self {
        VarId(index)
    }

    /// Returns the raw variable index.
    #[must_use]
    pub const fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Display for VarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// A typed integer constant.
///
/// Constants keep their width and signedness so that structural identity is
/// exact: `Int32(0)` and `Int64(0)` are different constants, even though
/// both satisfy [`ConstValue::is_zero`]. Branch-condition matching relies on
/// this distinction: two zero constants of different types compare unequal
/// structurally but are still recognized as "both zero".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstValue {
    /// Signed 8-bit constant
    Int8(i8),
    /// Signed 16-bit constant
    Int16(i16),
    /// Signed 32-bit constant
    Int32(i32),
    /// Signed 64-bit constant
    Int64(i64),
    /// Unsigned 8-bit constant
    UInt8(u8),
    /// Unsigned 16-bit constant
    UInt16(u16),
    /// Unsigned 32-bit constant
    UInt32(u32),
    /// Unsigned 64-bit constant
    UInt64(u64),
}

impl ConstValue {
    /// Returns `true` if this constant is zero, regardless of its type.
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        match self {
            ConstValue::Int8(v) => *v == 0,
            ConstValue::Int16(v) => *v == 0,
            ConstValue::Int32(v) => *v == 0,
            ConstValue::Int64(v) => *v == 0,
            ConstValue::UInt8(v) => *v == 0,
            ConstValue::UInt16(v) => *v == 0,
            ConstValue::UInt32(v) => *v == 0,
            ConstValue::UInt64(v) => *v == 0,
        }
    }
}

impl fmt::Display for ConstValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstValue::Int8(v) => write!(f, "{v}i8"),
            ConstValue::Int16(v) => write!(f, "{v}i16"),
            ConstValue::Int32(v) => write!(f, "{v}"),
            ConstValue::Int64(v) => write!(f, "{v}i64"),
            ConstValue::UInt8(v) => write!(f, "{v}u8"),
            ConstValue::UInt16(v) => write!(f, "{v}u16"),
            ConstValue::UInt32(v) => write!(f, "{v}u32"),
            ConstValue::UInt64(v) => write!(f, "{v}u64"),
        }
    }
}

/// An operand of a compare expression.
///
/// Operands are compared by structural identity (`PartialEq`). A variable is
/// identical only to itself; constants are identical when both type and
/// value match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    /// A variable reference
    Var(VarId),
    /// An immediate constant
    Const(ConstValue),
}

impl Operand {
    /// Convenience constructor for a signed 32-bit constant operand.
    #[must_use]
    pub const fn int32(value: i32) -> Self {
        Operand::Const(ConstValue::Int32(value))
    }

    /// Returns `true` if this operand is a zero constant of any type.
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        match self {
            Operand::Const(c) => c.is_zero(),
            Operand::Var(_) => false,
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Var(v) => write!(f, "{v}"),
            Operand::Const(c) => write!(f, "{c}"),
        }
    }
}

/// Comparison operator of a branch condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    /// Equal
    Eq,
    /// Not equal
    Ne,
    /// Less than
    Lt,
    /// Greater than or equal
    Ge,
    /// Greater than
    Gt,
    /// Less than or equal
    Le,
}

impl CmpOp {
    /// Returns the logically opposite comparison.
    ///
    /// `eq`↔`ne`, `lt`↔`ge`, `le`↔`gt`. Negating a comparison and flipping
    /// the branch sense at the same time preserves the branch direction,
    /// which is what makes `brfalse (a > 3)` and `brtrue (a <= 3)` the same
    /// test.
    #[must_use]
    pub const fn opposite(self) -> CmpOp {
        match self {
            CmpOp::Eq => CmpOp::Ne,
            CmpOp::Ne => CmpOp::Eq,
            CmpOp::Lt => CmpOp::Ge,
            CmpOp::Ge => CmpOp::Lt,
            CmpOp::Gt => CmpOp::Le,
            CmpOp::Le => CmpOp::Gt,
        }
    }
}

impl fmt::Display for CmpOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CmpOp::Eq => "eq",
            CmpOp::Ne => "ne",
            CmpOp::Lt => "lt",
            CmpOp::Ge => "ge",
            CmpOp::Gt => "gt",
            CmpOp::Le => "le",
        };
        f.write_str(s)
    }
}

/// Sense of a conditional branch: taken when the condition is true or when
/// it is false.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchOp {
    /// Branch to the labeled target when the condition is true
    BrTrue,
    /// Branch to the labeled target when the condition is false
    BrFalse,
}

impl BranchOp {
    /// Returns the inverted branch sense (`brtrue`↔`brfalse`).
    #[must_use]
    pub const fn inverted(self) -> BranchOp {
        match self {
            BranchOp::BrTrue => BranchOp::BrFalse,
            BranchOp::BrFalse => BranchOp::BrTrue,
        }
    }
}

impl fmt::Display for BranchOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BranchOp::BrTrue => f.write_str("brtrue"),
            BranchOp::BrFalse => f.write_str("brfalse"),
        }
    }
}

/// The compare expression tested by a conditional branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Compare {
    /// The comparison operator
    pub op: CmpOp,
    /// Left operand
    pub lhs: Operand,
    /// Right operand (constants are normalized to this side by earlier
    /// phases)
    pub rhs: Operand,
}

impl fmt::Display for Compare {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({} {} {})", self.lhs, self.op, self.rhs)
    }
}

/// An IR statement.
///
/// A block's terminator, if any, is its last non-comment statement and must
/// agree with the block's [`crate::ir::BlockKind`]. Comments are transparent
/// to every classifier and rewrite in this library.
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// A comment; never affects control flow or emptiness checks
    Comment(String),
    /// Opens a protected (exception handling) region. Always the first
    /// statement of the region's opening block.
    Try,
    /// Closes a protected region
    EndTry,
    /// A generic computation with no control-flow effect
    Assign {
        /// Destination variable
        var: VarId,
        /// Assigned value
        value: Operand,
    },
    /// Unconditional jump to a labeled block
    Goto {
        /// The target block's label
        target: Label,
    },
    /// Conditional branch: transfers to `target` depending on `op` and
    /// `cond`; otherwise falls through
    CondGoto {
        /// Branch sense
        op: BranchOp,
        /// The tested compare expression
        cond: Compare,
        /// The taken target's label
        target: Label,
    },
    /// Return from the function
    Return,
    /// Multi-way branch on an operand
    Switch {
        /// The switched-on operand
        operand: Operand,
        /// Case targets in case order
        targets: Vec<Label>,
        /// Default target
        default: Label,
    },
}

impl Stmt {
    /// Returns `true` for comment statements.
    #[must_use]
    pub const fn is_comment(&self) -> bool {
        matches!(self, Stmt::Comment(_))
    }

    /// Returns `true` for unconditional gotos.
    #[must_use]
    pub const fn is_goto(&self) -> bool {
        matches!(self, Stmt::Goto { .. })
    }

    /// Returns `true` for conditional branches.
    #[must_use]
    pub const fn is_cond_branch(&self) -> bool {
        matches!(self, Stmt::CondGoto { .. })
    }

    /// Returns `true` for any statement carrying a single labeled target
    /// (goto or conditional branch).
    #[must_use]
    pub const fn is_branch(&self) -> bool {
        self.is_goto() || self.is_cond_branch()
    }

    /// Returns the labeled target of a goto or conditional branch.
    #[must_use]
    pub const fn branch_target(&self) -> Option<Label> {
        match self {
            Stmt::Goto { target } | Stmt::CondGoto { target, .. } => Some(*target),
            _ => None,
        }
    }

    /// Redirects the labeled target of a goto or conditional branch.
    ///
    /// Returns `true` if the statement carried a target and it was updated,
    /// `false` for any other statement kind.
    pub fn set_branch_target(&mut self, label: Label) -> bool {
        match self {
            Stmt::Goto { target } | Stmt::CondGoto { target, .. } => {
                *target = label;
                true
            }
            _ => false,
        }
    }
}

impl fmt::Display for Stmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stmt::Comment(text) => write!(f, "// {text}"),
            Stmt::Try => f.write_str("try"),
            Stmt::EndTry => f.write_str("endtry"),
            Stmt::Assign { var, value } => write!(f, "{var} = {value}"),
            Stmt::Goto { target } => write!(f, "goto {target}"),
            Stmt::CondGoto { op, cond, target } => write!(f, "{op} {cond} {target}"),
            Stmt::Return => f.write_str("ret"),
            Stmt::Switch {
                operand,
                targets,
                default,
            } => {
                write!(f, "switch {operand} [")?;
                for (i, t) in targets.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{t}")?;
                }
                write!(f, "] default {default}")
            }
        }
    }
}
