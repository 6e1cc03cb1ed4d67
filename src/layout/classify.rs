//! Block classifiers used by the layout rewrites.
//!
//! All classifiers treat comments as transparent and return `false` for any
//! block carrying the [`BlockAttributes::TRY_END`] attribute: region
//! boundaries are never trivial trampolines, which protects exception
//! handling regions from being spliced or threaded away.

use crate::ir::{BlockAttributes, BlockId, BlockKind, Function, Stmt};

/// Returns `true` if the block is a fall-through with no non-comment
/// statements.
#[must_use]
pub fn is_empty_and_fallthru(func: &Function, id: BlockId) -> bool {
    let Some(block) = func.block(id) else {
        return false;
    };
    if block.attributes().contains(BlockAttributes::TRY_END) {
        return false;
    }
    block.kind() == BlockKind::Fallthru && block.is_stmt_empty()
}

/// Returns `true` if the block is a pure goto trampoline: kind goto, a
/// non-empty statement list holding only gotos and comments, terminated by
/// a goto.
#[must_use]
pub fn contains_only_goto(func: &Function, id: BlockId) -> bool {
    let Some(block) = func.block(id) else {
        return false;
    };
    if block.kind() != BlockKind::Goto || block.attributes().contains(BlockAttributes::TRY_END) {
        return false;
    }
    if block.is_stmt_empty() {
        return false;
    }
    block
        .stmts()
        .iter()
        .all(|s| s.is_goto() || s.is_comment())
        && block.terminator().is_some_and(Stmt::is_goto)
}

/// Returns `true` if the block holds nothing but a conditional branch (and
/// comments), terminated by the branch.
#[must_use]
pub fn contains_only_cond_goto(func: &Function, id: BlockId) -> bool {
    let Some(block) = func.block(id) else {
        return false;
    };
    if block.kind() != BlockKind::CondGoto || block.attributes().contains(BlockAttributes::TRY_END)
    {
        return false;
    }
    if block.is_stmt_empty() {
        return false;
    }
    block
        .stmts()
        .iter()
        .all(|s| s.is_cond_branch() || s.is_comment())
        && block.terminator().is_some_and(Stmt::is_cond_branch)
}

/// Returns `true` if two conditional blocks test the same branch direction
/// over the same compare operands.
///
/// Two forms match: the identical form (same branch sense, same compare)
/// and the contrapositive form (both the branch sense and the compare are
/// negated), so `brfalse (a > 3)` matches both `brfalse (a > 3)` and
/// `brtrue (a <= 3)`.
///
/// Operands are compared by structural identity, with one leniency: two
/// zero constants on the right-hand side match even when their types
/// differ. Non-zero constants get no such leniency, and the left-hand side
/// must always be structurally identical.
#[must_use]
pub fn has_same_branch_cond(func: &Function, first: BlockId, second: BlockId) -> bool {
    let (Some(b1), Some(b2)) = (func.block(first), func.block(second)) else {
        return false;
    };
    let (
        Some(Stmt::CondGoto {
            op: op1,
            cond: cond1,
            ..
        }),
        Some(Stmt::CondGoto {
            op: op2,
            cond: cond2,
            ..
        }),
    ) = (b1.terminator(), b2.terminator())
    else {
        return false;
    };

    let identical = op1 == op2 && cond1.op == cond2.op;
    let contrapositive = *op1 == op2.inverted() && cond1.op == cond2.op.opposite();
    if !identical && !contrapositive {
        return false;
    }
    if cond1.lhs != cond2.lhs {
        return false;
    }
    // Constants sit on the right-hand side; distinct zero constants still
    // count as the same bound.
    cond1.rhs == cond2.rhs || (cond1.rhs.is_zero() && cond2.rhs.is_zero())
}
