//! Pass traits and the layout pass object.
//!
//! This module defines the [`FunctionPass`] trait that per-function
//! transformation passes implement, and [`BbLayout`], the basic-block layout
//! pass. The pass manager that schedules passes and owns analysis results
//! lives outside this library; [`FunctionPass`] is the seam it invokes.

use std::path::PathBuf;

use crate::{
    ir::Function,
    layout::{lay_out_function, LayoutResult},
    Result,
};

/// A transformation pass over a single function.
///
/// Passes receive mutable access to the function and report whether they
/// changed the block set in a way that invalidates previously computed
/// analyses (dominance in particular). The scheduler decides ordering and
/// recomputation; passes only report.
pub trait FunctionPass {
    /// Unique name for logging and debugging.
    fn name(&self) -> &'static str;

    /// Get a description of what this pass does.
    fn description(&self) -> &'static str {
        "No description available"
    }

    /// Run the pass on a single function.
    ///
    /// Returns `true` if downstream analyses are invalidated by the
    /// transformation, `false` if previously computed results remain valid.
    ///
    /// # Errors
    ///
    /// Returns an error if the function's CFG is malformed or an internal
    /// invariant is violated; the function must then be considered
    /// unusable.
    fn run_on_function(&self, func: &mut Function) -> Result<bool>;
}

/// The basic-block layout pass.
///
/// Orders a function's blocks for emission while threading branches,
/// inverting conditionals for fall-through placement, and pruning
/// unreachable blocks. See [`crate::layout`] for the algorithm.
///
/// # Examples
///
/// ```rust
/// use bblayout::{BbLayout, FunctionPass};
/// use bblayout::ir::{BlockKind, Function, Stmt};
///
/// let mut func = Function::new("f");
/// let entry = func.new_block();
/// let exit = func.new_block();
/// func.block_mut(exit).unwrap().set_kind(BlockKind::Return);
/// func.block_mut(exit).unwrap().push_stmt(Stmt::Return);
/// func.connect(entry, exit)?;
///
/// let pass = BbLayout::new();
/// let result = pass.lay_out(&mut func)?;
/// assert_eq!(result.blocks(), &[entry, exit]);
/// # Ok::<(), bblayout::Error>(())
/// ```
#[derive(Debug, Default)]
pub struct BbLayout {
    /// Per-function debug tracing flag.
    debug: bool,

    /// Directory the debug CFG dump is written to, when set.
    dump_dir: Option<PathBuf>,
}

impl BbLayout {
    /// Creates the pass with debugging disabled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables or disables debug tracing for the functions this pass runs
    /// on.
    #[must_use]
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Sets the directory the `afterBBLayout` CFG dump is written to when
    /// debugging is enabled.
    #[must_use]
    pub fn with_dump_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dump_dir = Some(dir.into());
        self
    }

    /// Runs the layout and returns the full result object.
    ///
    /// With debugging enabled and a dump directory configured, the rewritten
    /// CFG is dumped to `afterBBLayout_<function>.dot` after the layout
    /// completes.
    ///
    /// # Errors
    ///
    /// See [`crate::layout::lay_out_function`].
    pub fn lay_out(&self, func: &mut Function) -> Result<LayoutResult> {
        let result = lay_out_function(func, self.debug)?;
        if self.debug {
            if let Some(dir) = &self.dump_dir {
                func.dump_to_file(dir, "afterBBLayout")?;
            }
        }
        Ok(result)
    }
}

impl FunctionPass for BbLayout {
    fn name(&self) -> &'static str {
        "bblayout"
    }

    fn description(&self) -> &'static str {
        "Orders basic blocks for emission; threads branches and prunes unreachable blocks"
    }

    fn run_on_function(&self, func: &mut Function) -> Result<bool> {
        let result = self.lay_out(func)?;
        Ok(result.invalidates_dominance())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{BlockKind, Stmt};

    fn make_two_block_function() -> Function {
        let mut func = Function::new("f");
        let entry = func.new_block();
        let exit = func.new_block();
        func.block_mut(exit).unwrap().set_kind(BlockKind::Return);
        func.block_mut(exit).unwrap().push_stmt(Stmt::Return);
        func.connect(entry, exit).unwrap();
        func
    }

    #[test]
    fn test_pass_metadata() {
        let pass = BbLayout::new();
        assert_eq!(pass.name(), "bblayout");
        assert!(!pass.description().is_empty());
    }

    #[test]
    fn test_pass_reports_no_invalidation_for_clean_layout() {
        let mut func = make_two_block_function();
        let pass = BbLayout::new();
        assert!(!pass.run_on_function(&mut func).unwrap());
    }

    #[test]
    fn test_pass_writes_dump_when_debugging() {
        let dir = tempfile::tempdir().unwrap();
        let mut func = make_two_block_function();
        let pass = BbLayout::new().with_debug(true).with_dump_dir(dir.path());
        pass.lay_out(&mut func).unwrap();

        let dump = dir.path().join("afterBBLayout_f.dot");
        assert!(dump.exists());
        let contents = std::fs::read_to_string(dump).unwrap();
        assert!(contents.contains("digraph CFG"));
    }

    #[test]
    fn test_pass_no_dump_without_debug() {
        let dir = tempfile::tempdir().unwrap();
        let mut func = make_two_block_function();
        let pass = BbLayout::new().with_dump_dir(dir.path());
        pass.lay_out(&mut func).unwrap();
        assert!(!dir.path().join("afterBBLayout_f.dot").exists());
    }
}
