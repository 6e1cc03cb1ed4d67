//! The basic-block layout driver.
//!
//! This module orders a function's blocks for code emission. Starting from
//! the common entry, the driver walks blocks in source order and, for each
//! block it appends, repairs the local control flow so the linear order is
//! cheap to execute:
//!
//! | Step | Rewrite |
//! |------|---------|
//! | Branch threading | Retargets branches past goto-only blocks, empty fall-throughs, and conditionals re-testing the same condition |
//! | Conditional inversion | Flips a conditional and inlines its taken target as the physical fall-through |
//! | Fall-through repair | Moves a fall-through target next to its predecessor, or synthesizes a goto trampoline when it cannot move |
//! | Jump elimination | Drops a goto whose target ends up as the next emitted block |
//! | Unreachable pruning | Removes blocks whose predecessor set drains to empty |
//!
//! Inside protected (`try`) regions the driver strictly obeys source order:
//! blocks belonging to a region are never relocated across its boundary
//! unless they are pure goto trampolines, and at most one region may be
//! outstanding at a time.
//!
//! # Usage Examples
//!
//! ```rust
//! use bblayout::ir::{BlockKind, Function, Stmt};
//! use bblayout::layout::lay_out_function;
//!
//! let mut func = Function::new("f");
//! let entry = func.new_block();
//! let exit = func.new_block();
//! func.block_mut(exit).unwrap().set_kind(BlockKind::Return);
//! func.block_mut(exit).unwrap().push_stmt(Stmt::Return);
//! func.connect(entry, exit)?;
//!
//! let result = lay_out_function(&mut func, false)?;
//! assert_eq!(result.blocks().len(), 2);
//! assert!(!result.new_block_in_layout());
//! # Ok::<(), bblayout::Error>(())
//! ```
//!
//! # Analysis invalidation
//!
//! When no block can be moved next to its fall-through predecessor, the
//! driver synthesizes an artificial goto block. Synthesis changes the block
//! set, so [`LayoutResult::invalidates_dominance`] reports `true` and a
//! previously computed dominance analysis must be recomputed downstream.

mod classify;
mod rewrite;

pub use classify::{
    contains_only_cond_goto, contains_only_goto, has_same_branch_cond, is_empty_and_fallthru,
};

use crate::{
    ir::{BlockAttributes, BlockId, BlockKind, Function},
    Error, Result,
};

/// The emission order produced by [`lay_out_function`], plus the signals a
/// pass manager needs.
#[derive(Debug, Clone)]
pub struct LayoutResult {
    /// Blocks in emission order.
    layout: Vec<BlockId>,

    /// Bit per block id: laid out or dropped as unreachable.
    laid_out: Vec<bool>,

    /// Whether any artificial block was synthesized.
    new_block_in_layout: bool,
}

impl LayoutResult {
    /// Returns the blocks in emission order.
    #[must_use]
    pub fn blocks(&self) -> &[BlockId] {
        &self.layout
    }

    /// Returns `true` if `id` was emitted or dropped as unreachable.
    #[must_use]
    pub fn is_laid_out(&self, id: BlockId) -> bool {
        self.laid_out.get(id.index()).copied().unwrap_or(false)
    }

    /// Returns `true` if the pass synthesized at least one artificial
    /// block.
    #[must_use]
    pub const fn new_block_in_layout(&self) -> bool {
        self.new_block_in_layout
    }

    /// Returns `true` if a previously computed dominance analysis is stale
    /// after this pass.
    ///
    /// Dominance is invalidated exactly when the block set changed, i.e.
    /// when an artificial block was synthesized.
    #[must_use]
    pub const fn invalidates_dominance(&self) -> bool {
        self.new_block_in_layout
    }
}

/// Pass-local layout state.
///
/// Tracks which blocks have been laid out (or dropped), the emission order
/// built so far, the source-order cursor, and whether a protected region is
/// currently outstanding.
pub(crate) struct BlockLayout {
    /// Blocks in emission order.
    layout: Vec<BlockId>,

    /// Bit per block id; a block is laid out once it appears in `layout` or
    /// has been dropped as unreachable.
    laid_out: Vec<bool>,

    /// True between emitting a `try`-opening block and its matching region
    /// close.
    try_outstanding: bool,

    /// Sticky: set when an artificial block is synthesized.
    new_block_in_layout: bool,

    /// Source-order scan position for the next not-yet-laid-out block.
    cursor: usize,

    /// Per-function debug tracing flag.
    debug: bool,
}

impl BlockLayout {
    pub(crate) fn new(block_count: usize, debug: bool) -> Self {
        Self {
            layout: Vec::with_capacity(block_count),
            laid_out: vec![false; block_count],
            try_outstanding: false,
            new_block_in_layout: false,
            cursor: 0,
            debug,
        }
    }

    pub(crate) fn is_laid_out(&self, id: BlockId) -> bool {
        self.laid_out.get(id.index()).copied().unwrap_or(false)
    }

    pub(crate) fn mark_laid_out(&mut self, id: BlockId) {
        if id.index() >= self.laid_out.len() {
            self.laid_out.resize(id.index() + 1, false);
        }
        self.laid_out[id.index()] = true;
    }

    /// Grows the laid-out table to cover a freshly created block.
    pub(crate) fn ensure_slot(&mut self, id: BlockId) {
        if id.index() >= self.laid_out.len() {
            self.laid_out.resize(id.index() + 1, false);
        }
    }

    pub(crate) const fn try_outstanding(&self) -> bool {
        self.try_outstanding
    }

    pub(crate) const fn debug(&self) -> bool {
        self.debug
    }

    pub(crate) fn set_new_block_in_layout(&mut self) {
        self.new_block_in_layout = true;
    }

    /// Appends `id` to the emission order and updates try-region tracking.
    ///
    /// # Errors
    ///
    /// Laying out a block twice, or opening a protected region while one is
    /// outstanding, is a fatal invariant violation.
    pub(crate) fn add_block(&mut self, func: &Function, id: BlockId) -> Result<()> {
        let block = func.block(id).ok_or(Error::InvalidBlock(id))?;
        if id.index() >= self.laid_out.len() {
            return Err(Error::InvalidBlock(id));
        }
        if self.laid_out[id.index()] {
            return Err(malformed_error!(
                "{}: {} is already laid out",
                func.name(),
                id
            ));
        }
        self.layout.push(id);
        self.laid_out[id.index()] = true;
        if self.debug {
            log::debug!("{}: lay out {} kind {}", func.name(), id, block.kind());
        }

        if block.opens_try() {
            if self.try_outstanding {
                return Err(malformed_error!(
                    "{}: {} opens a try region before the outstanding one ends",
                    func.name(),
                    id
                ));
            }
            self.try_outstanding = true;
            if self.debug {
                log::debug!("{}: {} opens try", func.name(), id);
            }
        }
        if block.attributes().contains(BlockAttributes::TRY_END) && func.scoped_eh() {
            self.try_outstanding = false;
            if self.debug {
                log::debug!("{}: {} ends try", func.name(), id);
            }
        }
        Ok(())
    }

    /// Returns the next block in source order that is neither laid out nor
    /// removed.
    ///
    /// The scan position only moves forward, which bounds the driver loop.
    pub(crate) fn next_block(&mut self, func: &Function) -> Option<BlockId> {
        while self.cursor < func.block_count() {
            let id = BlockId::new(self.cursor);
            if func.block(id).is_some() && !self.is_laid_out(id) {
                return Some(id);
            }
            self.cursor += 1;
        }
        None
    }

    fn into_result(self) -> LayoutResult {
        LayoutResult {
            layout: self.layout,
            laid_out: self.laid_out,
            new_block_in_layout: self.new_block_in_layout,
        }
    }
}

/// Lays out a function's blocks for emission, rewriting branches along the
/// way.
///
/// The driver starts at the common entry (block 0) and walks blocks in
/// source order. Each iteration appends the current block, threads its
/// branch target if it ends in a branch, and then repairs the block's
/// fall-through against the next block to be emitted: moving targets,
/// inverting conditionals, or synthesizing goto trampolines as needed.
/// Unreachable blocks uncovered by retargeting are pruned.
///
/// # Arguments
///
/// * `func` - The function to lay out; its CFG is rewritten in place
/// * `debug` - Enables per-block debug tracing via [`log`]
///
/// # Errors
///
/// Any malformed input or violated invariant aborts the pass with
/// [`Error::Malformed`] (or [`Error::InvalidBlock`] for a dangling id); no
/// partial result is produced. See [`crate::Error`].
pub fn lay_out_function(func: &mut Function, debug: bool) -> Result<LayoutResult> {
    let Some(first) = func.first_block() else {
        return Err(malformed_error!("{}: function has no blocks", func.name()));
    };
    if first != func.entry() {
        return Err(malformed_error!(
            "{}: the first block must be the common entry",
            func.name()
        ));
    }

    let mut state = BlockLayout::new(func.block_count(), debug);
    let mut bb = Some(first);

    while let Some(cur) = bb {
        state.add_block(func, cur)?;

        let kind = func.block(cur).ok_or(Error::InvalidBlock(cur))?.kind();
        if matches!(kind, BlockKind::CondGoto | BlockKind::Goto) {
            state.optimize_branch_target(func, cur)?;
        }

        let mut next = state.next_block(func);
        if let Some(n) = next {
            validate_try_order(func, &state, n)?;
        }

        // Fall-through repair below may convert the current block to a
        // goto, and threading may then make its target movable, so the
        // goto case is re-checked after the dispatch rather than chained
        // as an alternative.
        match func.block(cur).ok_or(Error::InvalidBlock(cur))?.kind() {
            BlockKind::Fallthru => state.resolve_unconditional_fall_through(func, cur, next)?,
            BlockKind::CondGoto => state.lay_out_cond_goto_target(func, cur, next)?,
            _ => {}
        }
        if func.block(cur).is_some_and(|b| b.kind() == BlockKind::Goto) {
            state.lay_out_goto_target(func, cur, next)?;
        }

        if let Some(n) = next {
            if state.is_laid_out(n) || func.block(n).is_none() {
                next = state.next_block(func);
            }
        }
        bb = next;
    }

    Ok(state.into_result())
}

/// Checks that emitting `next` would not break try-region ordering: a new
/// region may not open while one is outstanding, and a region-closing block
/// requires its opening block to be laid out already (or to be the closing
/// block itself).
fn validate_try_order(func: &Function, state: &BlockLayout, next: BlockId) -> Result<()> {
    let block = func.block(next).ok_or(Error::InvalidBlock(next))?;
    if block.opens_try() && state.try_outstanding() {
        return Err(malformed_error!(
            "{}: {} opens a try region before the outstanding one ends",
            func.name(),
            next
        ));
    }
    if block.attributes().contains(BlockAttributes::TRY_END) {
        let opening = func.try_block_for_end(next).ok_or_else(|| {
            malformed_error!(
                "{}: {} closes a try region with no recorded opening block",
                func.name(),
                next
            )
        })?;
        if opening != next && !state.is_laid_out(opening) {
            return Err(malformed_error!(
                "{}: {} closes a try region before its opening {} is laid out",
                func.name(),
                next,
                opening
            ));
        }
    }
    Ok(())
}
