//! The function container: block table, label allocator, and edge
//! maintenance.
//!
//! A [`Function`] owns its basic blocks in a dense table indexed by
//! [`BlockId`]. Table order is source order: the layout driver walks blocks
//! with [`Function::first_block`] / [`Function::next_block`], and block 0 is
//! always the common entry. Removing a block nullifies its slot so that ids
//! (and therefore edges) stay stable.
//!
//! # Edge discipline
//!
//! Predecessor/successor lists are kept mutual by the edge helpers on this
//! type ([`Function::connect`], [`Function::replace_succ`],
//! [`Function::replace_pred`], [`Function::remove_pred`]). Rewrites in
//! [`crate::layout`] only ever touch edges through these helpers.
//!
//! # Labels
//!
//! [`Function::get_or_create_label`] is the only way to obtain a branch
//! target and is idempotent: repeated calls for the same block return the
//! same label. The allocator also maintains the reverse label→block table
//! used by debug dumps and consistency checks.
//!
//! # Usage Examples
//!
//! ```rust
//! use bblayout::ir::{BlockKind, Function, Stmt};
//!
//! let mut func = Function::new("max");
//! let entry = func.new_block();
//! let exit = func.new_block();
//! func.block_mut(exit).unwrap().set_kind(BlockKind::Return);
//! func.block_mut(exit).unwrap().push_stmt(Stmt::Return);
//! func.connect(entry, exit)?;
//!
//! assert_eq!(func.first_block(), Some(entry));
//! assert_eq!(func.block(entry).unwrap().succs(), &[exit]);
//! # Ok::<(), bblayout::Error>(())
//! ```

use rustc_hash::FxHashMap;

use crate::{
    ir::{
        block::{BasicBlock, BlockAttributes, BlockId},
        stmt::Label,
    },
    Error, Result,
};

/// A function under layout: the block table plus the bookkeeping the pass
/// needs (label allocator, try-region map, exception-handling mode).
///
/// # Construction
///
/// Blocks are appended with [`Function::new_block`]; the first block created
/// becomes the common entry and is marked
/// [`BlockAttributes::ENTRY`] automatically. Edges are then added with
/// [`Function::connect`].
#[derive(Debug, Clone)]
pub struct Function {
    /// Function name, used in diagnostics and dump file names.
    name: String,

    /// Dense block table; `None` marks a removed block.
    blocks: Vec<Option<BasicBlock>>,

    /// Next label index to mint.
    next_label: u32,

    /// Reverse map from minted labels to their blocks.
    label_blocks: FxHashMap<Label, BlockId>,

    /// Map from a region-closing block to its opening `try` block.
    try_end_map: FxHashMap<BlockId, BlockId>,

    /// Whether an `endtry` block closes the outstanding protected region
    /// for layout purposes. Dialects that scope exception handling strictly
    /// per region set this; others leave region tracking to later phases.
    scoped_eh: bool,
}

impl Function {
    /// Creates an empty function.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            blocks: Vec::new(),
            next_label: 0,
            label_blocks: FxHashMap::default(),
            try_end_map: FxHashMap::default(),
            scoped_eh: false,
        }
    }

    /// Returns the function name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the size of the block table, including removed slots.
    #[must_use]
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Returns the common entry block id.
    ///
    /// The entry is always block 0; it exists once the first block has been
    /// created.
    #[must_use]
    pub const fn entry(&self) -> BlockId {
        BlockId::new(0)
    }

    /// Gets a block by id. Returns `None` for out-of-range ids and removed
    /// blocks.
    #[must_use]
    pub fn block(&self, id: BlockId) -> Option<&BasicBlock> {
        self.blocks.get(id.index()).and_then(Option::as_ref)
    }

    /// Gets a mutable block by id.
    pub fn block_mut(&mut self, id: BlockId) -> Option<&mut BasicBlock> {
        self.blocks.get_mut(id.index()).and_then(Option::as_mut)
    }

    /// Appends a new empty fall-through block and returns its id.
    ///
    /// The first block created becomes the common entry and is marked
    /// [`BlockAttributes::ENTRY`].
    pub fn new_block(&mut self) -> BlockId {
        let id = BlockId::new(self.blocks.len());
        let mut block = BasicBlock::new(id);
        if id.index() == 0 {
            block.set_attribute(BlockAttributes::ENTRY);
        }
        self.blocks.push(Some(block));
        id
    }

    /// Removes a block from the table, leaving a `None` slot behind.
    ///
    /// The block's label, if any, is retired from the label table. Edges
    /// referring to the block must already have been detached by the
    /// caller.
    pub fn nullify(&mut self, id: BlockId) {
        if let Some(slot) = self.blocks.get_mut(id.index()) {
            if let Some(block) = slot.take() {
                if let Some(label) = block.label() {
                    self.label_blocks.remove(&label);
                }
            }
        }
    }

    /// Returns the first live block in source order.
    #[must_use]
    pub fn first_block(&self) -> Option<BlockId> {
        self.blocks
            .iter()
            .position(Option::is_some)
            .map(BlockId::new)
    }

    /// Returns the next live block after `after` in source order.
    #[must_use]
    pub fn next_block(&self, after: BlockId) -> Option<BlockId> {
        self.blocks
            .iter()
            .enumerate()
            .skip(after.index() + 1)
            .find(|(_, slot)| slot.is_some())
            .map(|(index, _)| BlockId::new(index))
    }

    /// Returns an iterator over the live blocks in source order.
    pub fn blocks(&self) -> impl Iterator<Item = &BasicBlock> {
        self.blocks.iter().filter_map(Option::as_ref)
    }

    /// Returns the label of `id`, minting one if the block has none yet.
    ///
    /// This is the only legal way to obtain a branch target. The call is
    /// idempotent: the same block always yields the same label.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidBlock`] if `id` is out of range or removed.
    pub fn get_or_create_label(&mut self, id: BlockId) -> Result<Label> {
        let block = self.block(id).ok_or(Error::InvalidBlock(id))?;
        if let Some(label) = block.label() {
            return Ok(label);
        }
        let label = Label::new(self.next_label);
        self.next_label += 1;
        // The lookup above proved the block exists.
        if let Some(block) = self.block_mut(id) {
            block.set_label(label);
        }
        self.label_blocks.insert(label, id);
        Ok(label)
    }

    /// Returns the block a label was minted for, if it is still live.
    #[must_use]
    pub fn block_with_label(&self, label: Label) -> Option<BlockId> {
        self.label_blocks.get(&label).copied()
    }

    /// Records that `end` closes the protected region opened by `try_block`.
    pub fn record_try_region(&mut self, try_block: BlockId, end: BlockId) {
        self.try_end_map.insert(end, try_block);
    }

    /// Returns the opening `try` block for a region-closing block.
    #[must_use]
    pub fn try_block_for_end(&self, end: BlockId) -> Option<BlockId> {
        self.try_end_map.get(&end).copied()
    }

    /// Sets whether an `endtry` block closes the outstanding region during
    /// layout.
    pub fn set_scoped_eh(&mut self, scoped: bool) {
        self.scoped_eh = scoped;
    }

    /// Returns whether an `endtry` block closes the outstanding region
    /// during layout.
    #[must_use]
    pub const fn scoped_eh(&self) -> bool {
        self.scoped_eh
    }

    /// Adds the edge `from → to`, updating both directions.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidBlock`] if either endpoint is out of range or
    /// removed.
    pub fn connect(&mut self, from: BlockId, to: BlockId) -> Result<()> {
        self.block_mut(from)
            .ok_or(Error::InvalidBlock(from))?
            .succs_mut()
            .push(to);
        self.block_mut(to)
            .ok_or(Error::InvalidBlock(to))?
            .preds_mut()
            .push(from);
        Ok(())
    }

    /// Redirects the first `old` entry in `of`'s successor list to `new`
    /// and registers `of` as a predecessor of `new`.
    ///
    /// The edge from `of` to `old` is half-removed by this call: the caller
    /// is responsible for deleting `of` from `old`'s predecessor list.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidBlock`] if a block is missing, or a malformed
    /// error if `old` is not a successor of `of`.
    pub fn replace_succ(&mut self, of: BlockId, old: BlockId, new: BlockId) -> Result<()> {
        let name = self.name.clone();
        let block = self.block_mut(of).ok_or(Error::InvalidBlock(of))?;
        let slot = block
            .succs_mut()
            .iter_mut()
            .find(|s| **s == old)
            .ok_or_else(|| {
                malformed_error!("{}: {} is not a successor of {}", name, old, of)
            })?;
        *slot = new;
        self.block_mut(new)
            .ok_or(Error::InvalidBlock(new))?
            .preds_mut()
            .push(of);
        Ok(())
    }

    /// Redirects the first `old` entry in `of`'s predecessor list to `new`
    /// and registers `of` as a successor of `new`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidBlock`] if a block is missing, or a malformed
    /// error if `old` is not a predecessor of `of`.
    pub fn replace_pred(&mut self, of: BlockId, old: BlockId, new: BlockId) -> Result<()> {
        let name = self.name.clone();
        let block = self.block_mut(of).ok_or(Error::InvalidBlock(of))?;
        let slot = block
            .preds_mut()
            .iter_mut()
            .find(|p| **p == old)
            .ok_or_else(|| {
                malformed_error!("{}: {} is not a predecessor of {}", name, old, of)
            })?;
        *slot = new;
        self.block_mut(new)
            .ok_or(Error::InvalidBlock(new))?
            .succs_mut()
            .push(of);
        Ok(())
    }

    /// Deletes the first `pred` entry from `of`'s predecessor list.
    ///
    /// Missing blocks and absent entries are tolerated: unreachable-block
    /// removal walks edge sets that may already be partially detached.
    pub fn remove_pred(&mut self, of: BlockId, pred: BlockId) {
        if let Some(block) = self.block_mut(of) {
            let preds = block.preds_mut();
            if let Some(position) = preds.iter().position(|p| *p == pred) {
                preds.remove(position);
            }
        }
    }

    /// Swaps the two successor slots of a conditional block.
    ///
    /// Used after inverting a conditional branch so that `succs[0]` remains
    /// the fall-through edge and `succs[1]` the taken edge.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidBlock`] if the block is missing, or a
    /// malformed error if it does not have exactly two successors.
    pub fn swap_succs(&mut self, of: BlockId) -> Result<()> {
        let name = self.name.clone();
        let block = self.block_mut(of).ok_or(Error::InvalidBlock(of))?;
        let succs = block.succs_mut();
        if succs.len() != 2 {
            return Err(malformed_error!(
                "{}: {} must have exactly 2 successors to swap, has {}",
                name,
                of,
                succs.len()
            ));
        }
        succs.swap(0, 1);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{BlockKind, Stmt};

    fn make_linear_function(len: usize) -> (Function, Vec<BlockId>) {
        let mut func = Function::new("test");
        let ids: Vec<BlockId> = (0..len).map(|_| func.new_block()).collect();
        for pair in ids.windows(2) {
            func.connect(pair[0], pair[1]).unwrap();
        }
        (func, ids)
    }

    #[test]
    fn test_function_creation() {
        let func = Function::new("empty");
        assert_eq!(func.name(), "empty");
        assert_eq!(func.block_count(), 0);
        assert_eq!(func.first_block(), None);
    }

    #[test]
    fn test_first_block_is_entry() {
        let (func, ids) = make_linear_function(3);
        assert_eq!(func.first_block(), Some(ids[0]));
        assert_eq!(func.entry(), ids[0]);
        assert!(func
            .block(ids[0])
            .unwrap()
            .attributes()
            .contains(BlockAttributes::ENTRY));
        assert!(!func
            .block(ids[1])
            .unwrap()
            .attributes()
            .contains(BlockAttributes::ENTRY));
    }

    #[test]
    fn test_connect_is_mutual() {
        let (func, ids) = make_linear_function(2);
        assert_eq!(func.block(ids[0]).unwrap().succs(), &[ids[1]]);
        assert_eq!(func.block(ids[1]).unwrap().preds(), &[ids[0]]);
    }

    #[test]
    fn test_source_order_iteration_skips_removed() {
        let (mut func, ids) = make_linear_function(4);
        func.nullify(ids[1]);

        assert_eq!(func.next_block(ids[0]), Some(ids[2]));
        assert_eq!(func.next_block(ids[2]), Some(ids[3]));
        assert_eq!(func.next_block(ids[3]), None);
        assert_eq!(func.blocks().count(), 3);
    }

    #[test]
    fn test_label_minting_is_idempotent() {
        let (mut func, ids) = make_linear_function(2);
        let first = func.get_or_create_label(ids[1]).unwrap();
        let second = func.get_or_create_label(ids[1]).unwrap();
        assert_eq!(first, second);
        assert_eq!(func.block_with_label(first), Some(ids[1]));

        let other = func.get_or_create_label(ids[0]).unwrap();
        assert_ne!(first, other);
    }

    #[test]
    fn test_label_retired_on_nullify() {
        let (mut func, ids) = make_linear_function(2);
        let label = func.get_or_create_label(ids[1]).unwrap();
        func.nullify(ids[1]);
        assert_eq!(func.block_with_label(label), None);
        assert!(func.block(ids[1]).is_none());
    }

    #[test]
    fn test_label_for_missing_block_errors() {
        let mut func = Function::new("test");
        assert!(func.get_or_create_label(BlockId::new(5)).is_err());
    }

    #[test]
    fn test_replace_succ_rewires_both_directions() {
        let mut func = Function::new("test");
        let a = func.new_block();
        let b = func.new_block();
        let c = func.new_block();
        func.connect(a, b).unwrap();

        func.replace_succ(a, b, c).unwrap();
        assert_eq!(func.block(a).unwrap().succs(), &[c]);
        assert_eq!(func.block(c).unwrap().preds(), &[a]);
        // Half-removed: the caller still has to detach a from b's preds.
        assert_eq!(func.block(b).unwrap().preds(), &[a]);
        func.remove_pred(b, a);
        assert!(func.block(b).unwrap().preds().is_empty());
    }

    #[test]
    fn test_replace_succ_unknown_edge_errors() {
        let mut func = Function::new("test");
        let a = func.new_block();
        let b = func.new_block();
        assert!(func.replace_succ(a, b, a).is_err());
    }

    #[test]
    fn test_replace_pred_rewires_both_directions() {
        let mut func = Function::new("test");
        let a = func.new_block();
        let b = func.new_block();
        let n = func.new_block();
        func.connect(a, b).unwrap();

        func.replace_pred(b, a, n).unwrap();
        assert_eq!(func.block(b).unwrap().preds(), &[n]);
        assert_eq!(func.block(n).unwrap().succs(), &[b]);
    }

    #[test]
    fn test_remove_pred_tolerates_missing() {
        let mut func = Function::new("test");
        let a = func.new_block();
        let b = func.new_block();
        // Nothing connected yet; both calls are no-ops.
        func.remove_pred(b, a);
        func.remove_pred(BlockId::new(17), a);
    }

    #[test]
    fn test_swap_succs() {
        let mut func = Function::new("test");
        let a = func.new_block();
        let b = func.new_block();
        let c = func.new_block();
        func.connect(a, b).unwrap();
        func.connect(a, c).unwrap();

        func.swap_succs(a).unwrap();
        assert_eq!(func.block(a).unwrap().succs(), &[c, b]);
    }

    #[test]
    fn test_swap_succs_requires_two() {
        let (mut func, ids) = make_linear_function(2);
        assert!(func.swap_succs(ids[0]).is_err());
    }

    #[test]
    fn test_try_region_map() {
        let (mut func, ids) = make_linear_function(3);
        func.record_try_region(ids[0], ids[2]);
        assert_eq!(func.try_block_for_end(ids[2]), Some(ids[0]));
        assert_eq!(func.try_block_for_end(ids[1]), None);
    }

    #[test]
    fn test_scoped_eh_flag() {
        let mut func = Function::new("test");
        assert!(!func.scoped_eh());
        func.set_scoped_eh(true);
        assert!(func.scoped_eh());
    }

    #[test]
    fn test_block_kind_default_and_mutation() {
        let (mut func, ids) = make_linear_function(1);
        assert_eq!(func.block(ids[0]).unwrap().kind(), BlockKind::Fallthru);
        let block = func.block_mut(ids[0]).unwrap();
        block.set_kind(BlockKind::Return);
        block.push_stmt(Stmt::Return);
        assert_eq!(func.block(ids[0]).unwrap().kind(), BlockKind::Return);
    }
}
