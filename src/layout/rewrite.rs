//! CFG rewriters backing the layout driver.
//!
//! These are the mutation primitives the driver composes: the movability
//! oracle, unreachable-block pruning, the branch-threading fixed point,
//! empty-fall-through splicing, fall-through resolution, and trampoline
//! synthesis. All of them keep predecessor/successor lists mutual and all
//! of them funnel edge changes through [`crate::ir::Function`].

use crate::{
    ir::{BlockAttributes, BlockId, BlockKind, Function, Stmt},
    layout::{
        classify::{
            contains_only_cond_goto, contains_only_goto, has_same_branch_cond,
            is_empty_and_fallthru,
        },
        BlockLayout,
    },
    Error, Result,
};

impl BlockLayout {
    /// Decides whether `from` may be relocated to immediately follow
    /// `to_after`.
    ///
    /// All of the following must hold:
    ///
    /// 1. `from` has at most one predecessor (single-entry is preserved),
    /// 2. `from` has not been laid out yet, and
    /// 3. either `from` is artificial, or neither block belongs to a
    ///    protected region (in which case a single successor suffices),
    ///    or `from` is a pure goto trampoline, which may cross region
    ///    boundaries because it has no effects.
    pub(crate) fn can_be_moved(&self, func: &Function, from: BlockId, to_after: BlockId) -> bool {
        let (Some(from_block), Some(after_block)) = (func.block(from), func.block(to_after))
        else {
            return false;
        };
        if from_block.preds().len() > 1 {
            return false;
        }
        if self.is_laid_out(from) {
            return false;
        }
        if from_block.attributes().contains(BlockAttributes::ARTIFICIAL)
            || (!from_block.attributes().contains(BlockAttributes::TRY)
                && !after_block.attributes().contains(BlockAttributes::TRY))
        {
            return from_block.succs().len() == 1;
        }
        contains_only_goto(func, from)
    }

    /// Removes a block whose predecessor set has drained, cascading into
    /// successors that become unreachable in turn.
    ///
    /// The entry block is never removed. The block is taken out of the
    /// table before its successors are visited, so cyclic regions
    /// terminate: a removed block has no successors left to revisit.
    /// Removed ids count as laid out so the driver never resumes on them.
    pub(crate) fn remove_unreachable(&mut self, func: &mut Function, id: BlockId) {
        let Some(block) = func.block(id) else {
            return;
        };
        if block.attributes().contains(BlockAttributes::ENTRY) {
            return;
        }
        let succs: Vec<BlockId> = block.succs().to_vec();
        self.mark_laid_out(id);
        func.nullify(id);
        for succ in succs {
            if func.block(succ).is_none() {
                continue;
            }
            func.remove_pred(succ, id);
            if func.block(succ).is_some_and(|b| b.preds().is_empty()) {
                self.remove_unreachable(func, succ);
            }
        }
    }

    /// Threads the branch at the end of `id` past trivial intermediaries
    /// until a fixed point.
    ///
    /// Three target shapes are threaded through: a pure goto trampoline, an
    /// empty fall-through, and, for conditional branches, a target that is
    /// itself nothing but a conditional re-testing the same condition (in
    /// which case control provably takes the target's taken edge). Targets
    /// marked wont-exit are left alone.
    ///
    /// Blocks orphaned by retargeting are pruned on the spot.
    pub(crate) fn optimize_branch_target(&mut self, func: &mut Function, id: BlockId) -> Result<()> {
        {
            let block = func.block(id).ok_or(Error::InvalidBlock(id))?;
            match block.terminator() {
                Some(stmt) if stmt.is_branch() => {}
                _ => return Ok(()),
            }
        }
        // Each retarget removes a CFG edge or shortens a trampoline chain,
        // so anything that runs longer than the block table is a cycle of
        // pure gotos with no wont-exit marking.
        let bound = func.block_count() + 1;
        for _ in 0..bound {
            let (kind, target) = {
                let block = func.block(id).ok_or(Error::InvalidBlock(id))?;
                let succ = if block.kind() == BlockKind::CondGoto {
                    block.succs().get(1)
                } else {
                    block.succs().first()
                };
                let Some(succ) = succ else {
                    return Err(malformed_error!(
                        "{}: {} ends in a branch but has no labeled successor",
                        func.name(),
                        id
                    ));
                };
                (block.kind(), *succ)
            };
            {
                let target_block = func.block(target).ok_or(Error::InvalidBlock(target))?;
                if target_block.attributes().contains(BlockAttributes::WONT_EXIT) {
                    return Ok(());
                }
                let threadable = contains_only_goto(func, target)
                    || is_empty_and_fallthru(func, target)
                    || (kind == BlockKind::CondGoto
                        && target_block.kind() == BlockKind::CondGoto
                        && id != target
                        && contains_only_cond_goto(func, target)
                        && has_same_branch_cond(func, id, target));
                if !threadable {
                    return Ok(());
                }
            }

            let new_target = {
                let target_block = func.block(target).ok_or(Error::InvalidBlock(target))?;
                let succ = if target_block.kind() == BlockKind::CondGoto {
                    target_block.succs().get(1)
                } else {
                    target_block.succs().first()
                };
                let Some(succ) = succ else {
                    return Err(malformed_error!(
                        "{}: threading target {} has no successor",
                        func.name(),
                        target
                    ));
                };
                *succ
            };

            let target_label = func.block(target).and_then(|b| b.label());
            let new_label = func.get_or_create_label(new_target)?;
            {
                let name = func.name().to_string();
                let block = func.block_mut(id).ok_or(Error::InvalidBlock(id))?;
                let term = block.terminator_mut().ok_or_else(|| {
                    malformed_error!("{}: {} lost its terminator while threading", name, id)
                })?;
                let Some(recorded) = term.branch_target() else {
                    return Err(malformed_error!(
                        "{}: terminator of {} carries no branch target",
                        name,
                        id
                    ));
                };
                if Some(recorded) != target_label {
                    return Err(malformed_error!(
                        "{}: branch offset {} of {} does not match the label of {}",
                        name,
                        recorded,
                        id,
                        target
                    ));
                }
                term.set_branch_target(new_label);
            }

            func.replace_succ(id, target, new_target)?;
            func.remove_pred(target, id);
            if func.block(target).is_some_and(|b| b.preds().is_empty()) {
                self.mark_laid_out(target);
                self.remove_unreachable(func, target);
            }
        }
        Err(malformed_error!(
            "{}: branch threading from {} did not converge",
            func.name(),
            id
        ))
    }

    /// Walks the fall-through edge of `id` past empty fall-through blocks,
    /// splicing each one out of the CFG, and returns the first real
    /// fall-through target.
    ///
    /// The walk stops at a block with more than one predecessor or at any
    /// block that is not an empty fall-through (which covers non-empty
    /// blocks and region-closing blocks). Spliced blocks count as laid out
    /// and are pruned once orphaned.
    pub(crate) fn skip_empty_fall_throughs(
        &mut self,
        func: &mut Function,
        id: BlockId,
    ) -> Result<BlockId> {
        {
            let block = func.block(id).ok_or(Error::InvalidBlock(id))?;
            if !matches!(block.kind(), BlockKind::Fallthru | BlockKind::CondGoto) {
                return Err(malformed_error!(
                    "{}: {} has no fall-through edge to walk",
                    func.name(),
                    id
                ));
            }
            if block.succs().is_empty() {
                return Err(malformed_error!(
                    "{}: {} has no successors",
                    func.name(),
                    id
                ));
            }
        }
        let mut fallthru = func.block(id).ok_or(Error::InvalidBlock(id))?.succs()[0];
        loop {
            let preds_len = func
                .block(fallthru)
                .ok_or(Error::InvalidBlock(fallthru))?
                .preds()
                .len();
            if preds_len > 1 || !is_empty_and_fallthru(func, fallthru) {
                return Ok(fallthru);
            }
            self.mark_laid_out(fallthru);
            let old = fallthru;
            fallthru = {
                let old_block = func.block(old).ok_or(Error::InvalidBlock(old))?;
                let Some(succ) = old_block.succs().first() else {
                    return Err(malformed_error!(
                        "{}: empty fall-through {} has no successor",
                        func.name(),
                        old
                    ));
                };
                *succ
            };
            func.replace_succ(id, old, fallthru)?;
            func.remove_pred(old, id);
            if func.block(old).is_some_and(|b| b.preds().is_empty()) {
                self.remove_unreachable(func, old);
            }
        }
    }

    /// Repairs the fall-through of `id` against the block that will be
    /// emitted next.
    ///
    /// After splicing empty fall-throughs, either the real fall-through
    /// target already is the next block (nothing to do), or it is moved
    /// here when the movability oracle allows, or `id` gets an explicit
    /// goto appended and becomes a goto block.
    pub(crate) fn resolve_unconditional_fall_through(
        &mut self,
        func: &mut Function,
        id: BlockId,
        next: Option<BlockId>,
    ) -> Result<()> {
        let kind = func.block(id).ok_or(Error::InvalidBlock(id))?.kind();
        if kind == BlockKind::Goto {
            return Ok(());
        }
        if kind != BlockKind::Fallthru {
            return Err(malformed_error!(
                "{}: {} is neither a fall-through nor a goto block",
                func.name(),
                id
            ));
        }
        let fallthru = self.skip_empty_fall_throughs(func, id)?;
        if Some(fallthru) == next {
            return Ok(());
        }
        if self.can_be_moved(func, fallthru, id) {
            self.add_block(func, fallthru)?;
            self.resolve_unconditional_fall_through(func, fallthru, next)?;
            self.optimize_branch_target(func, fallthru)?;
        } else {
            append_goto(func, id, fallthru)?;
            self.optimize_branch_target(func, id)?;
        }
        Ok(())
    }

    /// Synthesizes an artificial goto block between `from` and its
    /// fall-through target `fallthru`, splicing it into the CFG as
    /// `from → trampoline → fallthru`.
    ///
    /// The trampoline carries the bypassed target's frequency. The caller
    /// lays it out. Synthesis invalidates dominance, which is recorded in
    /// the sticky new-block flag.
    pub(crate) fn new_fallthru_goto(
        &mut self,
        func: &mut Function,
        from: BlockId,
        fallthru: BlockId,
    ) -> Result<BlockId> {
        let id = func.new_block();
        self.ensure_slot(id);
        let label = func.get_or_create_label(fallthru)?;
        {
            let block = func.block_mut(id).ok_or(Error::InvalidBlock(id))?;
            block.set_attribute(BlockAttributes::ARTIFICIAL);
            block.set_kind(BlockKind::Goto);
            block.push_stmt(Stmt::Goto { target: label });
        }
        self.set_new_block_in_layout();
        func.replace_succ(from, fallthru, id)?;
        func.replace_pred(fallthru, from, id)?;
        let frequency = func
            .block(fallthru)
            .ok_or(Error::InvalidBlock(fallthru))?
            .frequency();
        if let Some(block) = func.block_mut(id) {
            block.set_frequency(frequency);
        }
        if self.debug() {
            log::debug!(
                "{}: created fall-through trampoline {} to {}",
                func.name(),
                id,
                fallthru
            );
        }
        Ok(id)
    }

    /// Handles a conditional block: flip-and-inline the taken target when
    /// it can move here, otherwise make sure the fall-through target ends
    /// up adjacent (moving it or synthesizing a trampoline).
    pub(crate) fn lay_out_cond_goto_target(
        &mut self,
        func: &mut Function,
        id: BlockId,
        next: Option<BlockId>,
    ) -> Result<()> {
        let old_fallthru = {
            let block = func.block(id).ok_or(Error::InvalidBlock(id))?;
            if block.succs().len() != 2 {
                return Err(malformed_error!(
                    "{}: conditional {} must have exactly 2 successors, has {}",
                    func.name(),
                    id,
                    block.succs().len()
                ));
            }
            block.succs()[0]
        };
        let fallthru = self.skip_empty_fall_throughs(func, id)?;
        let target = {
            let block = func.block(id).ok_or(Error::InvalidBlock(id))?;
            block.succs()[1]
        };
        let fallthru_preds = func
            .block(fallthru)
            .ok_or(Error::InvalidBlock(fallthru))?
            .preds()
            .len();

        if target != fallthru
            && (old_fallthru != fallthru || fallthru_preds > 1)
            && self.can_be_moved(func, target, id)
        {
            // Flip the branch sense and lay out the former taken target as
            // the physical fall-through.
            let target_label = func.block(target).and_then(|b| b.label());
            let fallthru_label = func.get_or_create_label(fallthru)?;
            {
                let name = func.name().to_string();
                let block = func.block_mut(id).ok_or(Error::InvalidBlock(id))?;
                let Some(Stmt::CondGoto { op, target: offset, .. }) = block.terminator_mut()
                else {
                    return Err(malformed_error!(
                        "{}: {} does not end in a conditional branch",
                        name,
                        id
                    ));
                };
                if Some(*offset) != target_label {
                    return Err(malformed_error!(
                        "{}: branch offset {} of {} does not match the label of {}",
                        name,
                        *offset,
                        id,
                        target
                    ));
                }
                *op = op.inverted();
                *offset = fallthru_label;
            }
            // succs[0] stays the fall-through edge, succs[1] the taken edge.
            func.swap_succs(id)?;
            self.add_block(func, target)?;
            self.resolve_unconditional_fall_through(func, target, next)?;
            self.optimize_branch_target(func, target)?;
        } else if Some(fallthru) != next {
            if self.can_be_moved(func, fallthru, id) {
                self.add_block(func, fallthru)?;
                self.resolve_unconditional_fall_through(func, fallthru, next)?;
                self.optimize_branch_target(func, fallthru)?;
            } else {
                let trampoline = self.new_fallthru_goto(func, id, fallthru)?;
                self.add_block(func, trampoline)?;
                self.optimize_branch_target(func, trampoline)?;
            }
        }
        Ok(())
    }

    /// Handles a goto block: place the target (or, for a single-predecessor
    /// conditional target, the target plus its fall-through) right here and
    /// delete the goto.
    pub(crate) fn lay_out_goto_target(
        &mut self,
        func: &mut Function,
        id: BlockId,
        next: Option<BlockId>,
    ) -> Result<()> {
        let target = {
            let block = func.block(id).ok_or(Error::InvalidBlock(id))?;
            let Some(succ) = block.succs().first() else {
                return Err(malformed_error!(
                    "{}: goto {} has no successor",
                    func.name(),
                    id
                ));
            };
            *succ
        };

        if Some(target) != next && self.can_be_moved(func, target, id) {
            self.add_block(func, target)?;
            change_to_fallthru(func, id)?;
            self.resolve_unconditional_fall_through(func, target, next)?;
            self.optimize_branch_target(func, target)?;
            return Ok(());
        }

        let (target_kind, target_preds) = {
            let block = func.block(target).ok_or(Error::InvalidBlock(target))?;
            (block.kind(), block.preds().len())
        };
        if target_kind == BlockKind::CondGoto && target_preds == 1 {
            let target_next = {
                let block = func.block(target).ok_or(Error::InvalidBlock(target))?;
                let Some(succ) = block.succs().first() else {
                    return Err(malformed_error!(
                        "{}: conditional {} has no successors",
                        func.name(),
                        target
                    ));
                };
                *succ
            };
            if Some(target_next) != next && self.can_be_moved(func, target_next, id) {
                self.add_block(func, target)?;
                change_to_fallthru(func, id)?;
                self.optimize_branch_target(func, target)?;
                self.add_block(func, target_next)?;
                self.resolve_unconditional_fall_through(func, target_next, next)?;
                self.optimize_branch_target(func, target_next)?;
            }
        }
        Ok(())
    }
}

/// Appends `goto <target>` to `id` and flips its kind to goto. Used when a
/// fall-through target cannot be placed adjacently.
fn append_goto(func: &mut Function, id: BlockId, target: BlockId) -> Result<()> {
    let label = func.get_or_create_label(target)?;
    let block = func.block_mut(id).ok_or(Error::InvalidBlock(id))?;
    block.push_stmt(Stmt::Goto { target: label });
    block.set_kind(BlockKind::Goto);
    Ok(())
}

/// Deletes the trailing goto of `id` and flips its kind back to
/// fall-through. Used once the goto target has been laid out adjacently.
fn change_to_fallthru(func: &mut Function, id: BlockId) -> Result<()> {
    let name = func.name().to_string();
    let block = func.block_mut(id).ok_or(Error::InvalidBlock(id))?;
    if block.kind() != BlockKind::Goto {
        return Err(malformed_error!("{}: {} is not a goto block", name, id));
    }
    match block.remove_last_stmt() {
        Some(stmt) if stmt.is_goto() => {}
        _ => {
            return Err(malformed_error!(
                "{}: {} does not end in a goto statement",
                name,
                id
            ))
        }
    }
    block.set_kind(BlockKind::Fallthru);
    Ok(())
}
