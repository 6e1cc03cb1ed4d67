// Copyright 2025-2026 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]

//! # bblayout
//!
//! A basic-block layout pass for compiler middle-end control flow graphs.
//! Given a function whose CFG has been produced by earlier phases, `bblayout`
//! emits a linear block ordering suitable for code emission while performing
//! three local CFG rewrites along the way:
//!
//! - **Branch threading** - branches that target a trivial trampoline block
//!   (a pure `goto`, an empty fall-through, or a conditional re-testing the
//!   same condition) are retargeted past it.
//! - **Conditional inversion** - when the taken side of a conditional can be
//!   placed directly after the branch, the condition is flipped so the former
//!   taken target becomes the physical fall-through.
//! - **Jump elimination** - an unconditional `goto` whose target ends up as
//!   the next emitted block is deleted and the block becomes a fall-through.
//!
//! # Architecture
//!
//! The library is organized into three layers:
//!
//! - **IR Layer** ([`crate::ir`]) - Functions, basic blocks, statements, and
//!   labels. Blocks are addressed by dense ids; predecessor/successor edges
//!   are lists of ids, so the cyclic CFG carries no owning pointers.
//! - **Layout Layer** ([`crate::layout`]) - The layout driver and its
//!   rewriters: block classifiers, the movability oracle, unreachable-block
//!   pruning, branch-target threading, and fall-through repair.
//! - **Pass Layer** ([`crate::pass`]) - The [`FunctionPass`] seam a pass
//!   manager invokes, and the [`BbLayout`] pass configuration (debug
//!   tracing, CFG dump directory).
//!
//! # Key Components
//!
//! - [`crate::ir::Function`] - Function container: block table, label
//!   allocator, try-region bookkeeping
//! - [`crate::ir::BasicBlock`] - A CFG node with statements, attributes, and
//!   edge lists
//! - [`crate::layout::lay_out_function`] - The layout driver
//! - [`crate::layout::LayoutResult`] - The emission order plus invalidation
//!   signals
//! - [`crate::pass::BbLayout`] - Pass object wiring debug dumps and the
//!   [`FunctionPass`] trait
//! - [`crate::Error`] and [`crate::Result`] - Error handling
//!
//! # Usage Examples
//!
//! ```rust
//! use bblayout::ir::{BlockKind, Function, Stmt};
//! use bblayout::layout::lay_out_function;
//!
//! // Build a two-block function: entry falls through to a return block.
//! let mut func = Function::new("demo");
//! let entry = func.new_block();
//! let exit = func.new_block();
//! func.block_mut(exit).unwrap().set_kind(BlockKind::Return);
//! func.block_mut(exit).unwrap().push_stmt(Stmt::Return);
//! func.connect(entry, exit)?;
//!
//! let result = lay_out_function(&mut func, false)?;
//! assert_eq!(result.blocks(), &[entry, exit]);
//! # Ok::<(), bblayout::Error>(())
//! ```
//!
//! # Scope
//!
//! The pass performs purely local decisions: no profile-driven trace
//! selection, no block splitting or cloning, and no inter-procedural
//! reasoning. Block frequencies are preserved on synthesized blocks but not
//! otherwise consulted. Exception-handling regions (`try`/`endtry`) are kept
//! intact: blocks inside a protected region are never moved across its
//! boundary unless they are pure goto trampolines.

#[macro_use]
pub(crate) mod error;
pub mod ir;
pub mod layout;
pub mod pass;
pub mod prelude;

pub use crate::error::Error;
pub use crate::pass::{BbLayout, FunctionPass};

/// The result type used throughout `bblayout`.
pub type Result<T> = std::result::Result<T, Error>;
