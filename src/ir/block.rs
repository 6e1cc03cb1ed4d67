//! Basic blocks: CFG nodes carrying statements, attributes, and edges.
//!
//! A [`BasicBlock`] is a maximal straight-line region with a single entry
//! and a single exit by control flow. Its `kind` names the terminator shape
//! (fall-through, goto, conditional goto, return, switch); the terminator
//! itself, when present, is the last non-comment statement and must agree
//! with the kind.
//!
//! Blocks never own their neighbors: predecessor and successor edges are
//! [`BlockId`] lists kept mutual by the owning [`crate::ir::Function`].
//! For conditional blocks the successor order matters: `succs[0]` is the
//! fall-through edge and `succs[1]` is the taken edge.

use std::fmt;

use bitflags::bitflags;

use crate::ir::stmt::{Label, Stmt};

/// Dense index of a block within its function's block table.
///
/// Ids are stable across the layout pass: removing a block nullifies its
/// table slot instead of shifting later entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockId(usize);

impl BlockId {
    /// Creates a block id from a raw index.
    #[must_use]
    pub const fn new(index: usize) -> Self {
        BlockId(index)
    }

    /// Returns the raw index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "B{}", self.0)
    }
}

/// Terminator shape of a basic block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    /// Control continues to the sole successor with no branch statement
    Fallthru,
    /// Ends in an unconditional `goto`
    Goto,
    /// Ends in a conditional branch; two successors (fall-through, taken)
    CondGoto,
    /// Ends in a return; no successors
    Return,
    /// Ends in a multi-way switch
    Switch,
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BlockKind::Fallthru => "fallthru",
            BlockKind::Goto => "goto",
            BlockKind::CondGoto => "condgoto",
            BlockKind::Return => "return",
            BlockKind::Switch => "switch",
        };
        f.write_str(s)
    }
}

bitflags! {
    /// Block attribute flags.
    ///
    /// Attributes record properties that earlier phases established and the
    /// layout pass must respect: the function entry is never removed,
    /// protected-region membership restricts motion, and wont-exit blocks
    /// are never threaded through.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct BlockAttributes: u8 {
        /// The function's common entry block.
        ///
        /// Never removed by unreachable-block pruning, and always the first
        /// block laid out.
        const ENTRY = 0x01;

        /// A block synthesized by the layout pass itself.
        ///
        /// Artificial blocks are goto-only trampolines and may be relocated
        /// freely.
        const ARTIFICIAL = 0x02;

        /// The block belongs to a protected (`try`) region.
        ///
        /// Inside a protected region block order strictly follows source
        /// order; such blocks are not moved across the region boundary.
        const TRY = 0x04;

        /// The block closes a protected region.
        ///
        /// Region boundaries are never classified as trivial trampolines
        /// and never spliced out.
        const TRY_END = 0x08;

        /// Control never returns from this block at runtime (e.g. an abort
        /// helper). Branches are not threaded through such blocks.
        const WONT_EXIT = 0x10;
    }
}

/// A node of the control flow graph.
///
/// # Examples
///
/// ```rust
/// use bblayout::ir::{BasicBlock, BlockId, BlockKind, Stmt};
///
/// let mut block = BasicBlock::new(BlockId::new(0));
/// assert_eq!(block.kind(), BlockKind::Fallthru);
/// assert!(block.is_stmt_empty());
///
/// block.push_stmt(Stmt::Comment("prologue".into()));
/// assert!(block.is_stmt_empty()); // comments do not count
///
/// block.push_stmt(Stmt::Return);
/// block.set_kind(BlockKind::Return);
/// assert!(!block.is_stmt_empty());
/// ```
#[derive(Debug, Clone)]
pub struct BasicBlock {
    /// Block index within the function.
    id: BlockId,

    /// Terminator shape; must agree with the last non-comment statement.
    kind: BlockKind,

    /// Attribute flags established by earlier phases (or by layout for
    /// synthesized blocks).
    attributes: BlockAttributes,

    /// Statements in execution order.
    stmts: Vec<Stmt>,

    /// Symbolic label, minted on demand when the block becomes a branch
    /// target.
    label: Option<Label>,

    /// Predecessor block ids.
    preds: Vec<BlockId>,

    /// Successor block ids. For `CondGoto`, index 0 is the fall-through
    /// edge and index 1 the taken edge.
    succs: Vec<BlockId>,

    /// Execution frequency hint; preserved but not consulted.
    frequency: u64,
}

impl BasicBlock {
    /// Creates a new empty fall-through block.
    #[must_use]
    pub fn new(id: BlockId) -> Self {
        Self {
            id,
            kind: BlockKind::Fallthru,
            attributes: BlockAttributes::empty(),
            stmts: Vec::new(),
            label: None,
            preds: Vec::new(),
            succs: Vec::new(),
            frequency: 0,
        }
    }

    /// Returns the block id.
    #[must_use]
    pub const fn id(&self) -> BlockId {
        self.id
    }

    /// Returns the terminator shape.
    #[must_use]
    pub const fn kind(&self) -> BlockKind {
        self.kind
    }

    /// Sets the terminator shape.
    pub fn set_kind(&mut self, kind: BlockKind) {
        self.kind = kind;
    }

    /// Returns the attribute flags.
    #[must_use]
    pub const fn attributes(&self) -> BlockAttributes {
        self.attributes
    }

    /// Adds an attribute flag.
    pub fn set_attribute(&mut self, attribute: BlockAttributes) {
        self.attributes.insert(attribute);
    }

    /// Returns the statements in this block.
    #[must_use]
    pub fn stmts(&self) -> &[Stmt] {
        &self.stmts
    }

    /// Appends a statement.
    pub fn push_stmt(&mut self, stmt: Stmt) {
        self.stmts.push(stmt);
    }

    /// Removes and returns the last statement, if any.
    pub fn remove_last_stmt(&mut self) -> Option<Stmt> {
        self.stmts.pop()
    }

    /// Returns the first statement, if any.
    #[must_use]
    pub fn first_stmt(&self) -> Option<&Stmt> {
        self.stmts.first()
    }

    /// Returns the terminator: the last non-comment statement.
    #[must_use]
    pub fn terminator(&self) -> Option<&Stmt> {
        self.stmts.iter().rev().find(|s| !s.is_comment())
    }

    /// Returns a mutable reference to the terminator.
    pub fn terminator_mut(&mut self) -> Option<&mut Stmt> {
        self.stmts.iter_mut().rev().find(|s| !s.is_comment())
    }

    /// Returns `true` if the block holds no non-comment statements.
    #[must_use]
    pub fn is_stmt_empty(&self) -> bool {
        self.stmts.iter().all(Stmt::is_comment)
    }

    /// Returns `true` if this block opens a protected region (its first
    /// statement is `try`).
    #[must_use]
    pub fn opens_try(&self) -> bool {
        matches!(self.stmts.first(), Some(Stmt::Try))
    }

    /// Returns the block's label, if one has been minted.
    #[must_use]
    pub const fn label(&self) -> Option<Label> {
        self.label
    }

    /// Records the block's label. Used by the function's label allocator.
    pub(crate) fn set_label(&mut self, label: Label) {
        self.label = Some(label);
    }

    /// Returns the predecessor block ids.
    #[must_use]
    pub fn preds(&self) -> &[BlockId] {
        &self.preds
    }

    /// Returns the successor block ids.
    #[must_use]
    pub fn succs(&self) -> &[BlockId] {
        &self.succs
    }

    /// Mutable predecessor list. Edge mutations flow through
    /// [`crate::ir::Function`] so the two directions stay mutual.
    pub(crate) fn preds_mut(&mut self) -> &mut Vec<BlockId> {
        &mut self.preds
    }

    /// Mutable successor list. Edge mutations flow through
    /// [`crate::ir::Function`] so the two directions stay mutual.
    pub(crate) fn succs_mut(&mut self) -> &mut Vec<BlockId> {
        &mut self.succs
    }

    /// Returns the frequency hint.
    #[must_use]
    pub const fn frequency(&self) -> u64 {
        self.frequency
    }

    /// Sets the frequency hint.
    pub fn set_frequency(&mut self, frequency: u64) {
        self.frequency = frequency;
    }
}

impl fmt::Display for BasicBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.id, self.kind)?;
        if let Some(label) = self.label {
            write!(f, " {label}")?;
        }
        writeln!(f, ":")?;
        for stmt in &self.stmts {
            writeln!(f, "  {stmt}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::stmt::{BranchOp, CmpOp, Compare, Operand, VarId};

    fn make_block(id: usize) -> BasicBlock {
        BasicBlock::new(BlockId::new(id))
    }

    #[test]
    fn test_block_creation() {
        let block = make_block(3);
        assert_eq!(block.id(), BlockId::new(3));
        assert_eq!(block.kind(), BlockKind::Fallthru);
        assert!(block.attributes().is_empty());
        assert!(block.is_stmt_empty());
        assert_eq!(block.label(), None);
        assert!(block.preds().is_empty());
        assert!(block.succs().is_empty());
        assert_eq!(block.frequency(), 0);
    }

    #[test]
    fn test_block_emptiness_ignores_comments() {
        let mut block = make_block(0);
        assert!(block.is_stmt_empty());

        block.push_stmt(Stmt::Comment("dead store removed".into()));
        assert!(block.is_stmt_empty());

        block.push_stmt(Stmt::Assign {
            var: VarId::new(0),
            value: Operand::int32(1),
        });
        assert!(!block.is_stmt_empty());
    }

    #[test]
    fn test_block_terminator_skips_trailing_comments() {
        let mut block = make_block(0);
        block.push_stmt(Stmt::Goto {
            target: Label::new(0),
        });
        block.push_stmt(Stmt::Comment("loop latch".into()));
        block.set_kind(BlockKind::Goto);

        assert!(block.terminator().is_some_and(Stmt::is_goto));
    }

    #[test]
    fn test_block_terminator_mut_redirects() {
        let mut block = make_block(0);
        block.set_kind(BlockKind::CondGoto);
        block.push_stmt(Stmt::CondGoto {
            op: BranchOp::BrTrue,
            cond: Compare {
                op: CmpOp::Eq,
                lhs: Operand::Var(VarId::new(0)),
                rhs: Operand::int32(0),
            },
            target: Label::new(1),
        });

        let term = block.terminator_mut().unwrap();
        assert!(term.set_branch_target(Label::new(5)));
        assert_eq!(block.terminator().unwrap().branch_target(), Some(Label::new(5)));
    }

    #[test]
    fn test_block_attributes() {
        let mut block = make_block(0);
        block.set_attribute(BlockAttributes::ENTRY);
        block.set_attribute(BlockAttributes::TRY);
        assert!(block.attributes().contains(BlockAttributes::ENTRY));
        assert!(block.attributes().contains(BlockAttributes::TRY));
        assert!(!block.attributes().contains(BlockAttributes::TRY_END));
    }

    #[test]
    fn test_block_opens_try() {
        let mut block = make_block(0);
        assert!(!block.opens_try());
        block.push_stmt(Stmt::Try);
        assert!(block.opens_try());

        // Only the first statement counts.
        let mut other = make_block(1);
        other.push_stmt(Stmt::Comment("x".into()));
        other.push_stmt(Stmt::Try);
        assert!(!other.opens_try());
    }

    #[test]
    fn test_block_remove_last_stmt() {
        let mut block = make_block(0);
        block.push_stmt(Stmt::Assign {
            var: VarId::new(1),
            value: Operand::int32(7),
        });
        block.push_stmt(Stmt::Goto {
            target: Label::new(0),
        });

        let removed = block.remove_last_stmt().unwrap();
        assert!(removed.is_goto());
        assert_eq!(block.stmts().len(), 1);
    }

    #[test]
    fn test_block_display() {
        let mut block = make_block(2);
        block.set_kind(BlockKind::Return);
        block.push_stmt(Stmt::Return);
        let text = format!("{block}");
        assert!(text.contains("B2 (return):"));
        assert!(text.contains("  ret"));
    }

    #[test]
    fn test_block_id_ordering() {
        assert!(BlockId::new(1) < BlockId::new(2));
        assert_eq!(format!("{}", BlockId::new(9)), "B9");
    }
}
