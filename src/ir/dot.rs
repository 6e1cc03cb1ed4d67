//! DOT rendering of a function's control flow graph.
//!
//! The generated DOT can be rendered with Graphviz tools like `dot`. The
//! entry block is highlighted in green, exit blocks (no successors) in red.
//! The layout pass writes a dump tagged `afterBBLayout` when debugging is
//! enabled.

use std::{
    fmt::Write as _,
    fs,
    path::{Path, PathBuf},
};

use crate::{
    ir::{block::BlockKind, function::Function},
    Result,
};

/// Escapes a string for use inside a DOT label.
fn escape_dot(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

impl Function {
    /// Generates a DOT format representation of this function's CFG.
    ///
    /// # Arguments
    ///
    /// * `title` - Optional title for the graph (e.g. a pass tag)
    ///
    /// # Returns
    ///
    /// A string containing the DOT representation of the CFG.
    #[must_use]
    pub fn to_dot(&self, title: Option<&str>) -> String {
        let mut dot = String::new();

        dot.push_str("digraph CFG {\n");
        if let Some(tag) = title {
            let _ = writeln!(
                dot,
                "    label=\"{}: {}\";",
                escape_dot(tag),
                escape_dot(self.name())
            );
        } else {
            let _ = writeln!(dot, "    label=\"{}\";", escape_dot(self.name()));
        }
        dot.push_str("    labelloc=t;\n");
        dot.push_str("    node [shape=box, fontname=\"Courier\", fontsize=10];\n\n");

        for block in self.blocks() {
            let is_entry = block.id() == self.entry();
            let is_exit = block.succs().is_empty();

            let mut label = format!("{} ({})", block.id(), block.kind());
            if let Some(l) = block.label() {
                let _ = write!(label, " {l}");
            }
            label.push_str("\\l");
            for stmt in block.stmts() {
                let _ = write!(label, "{}", escape_dot(&stmt.to_string()));
                label.push_str("\\l");
            }

            let style = if is_entry {
                ", style=filled, fillcolor=lightgreen"
            } else if is_exit {
                ", style=filled, fillcolor=lightcoral"
            } else {
                ""
            };

            let _ = writeln!(dot, "    {} [label=\"{label}\"{style}];", block.id());
        }

        dot.push('\n');

        for block in self.blocks() {
            for (index, succ) in block.succs().iter().enumerate() {
                let edge_label = edge_label(block.succs().len(), block.kind(), index);
                if edge_label.is_empty() {
                    let _ = writeln!(dot, "    {} -> {};", block.id(), succ);
                } else {
                    let _ = writeln!(
                        dot,
                        "    {} -> {} [label=\"{edge_label}\"];",
                        block.id(),
                        succ
                    );
                }
            }
        }

        dot.push_str("}\n");
        dot
    }

    /// Writes the DOT dump to `<dir>/<tag>_<function>.dot`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::FileError`] if the file cannot be written.
    pub fn dump_to_file(&self, dir: &Path, tag: &str) -> Result<PathBuf> {
        let path = dir.join(format!("{tag}_{}.dot", self.name()));
        fs::write(&path, self.to_dot(Some(tag)))?;
        Ok(path)
    }
}

/// Labels the edge at `index` of a block with `succ_count` successors.
fn edge_label(succ_count: usize, kind: BlockKind, index: usize) -> &'static str {
    match kind {
        BlockKind::CondGoto if succ_count == 2 => {
            if index == 0 {
                "fallthru"
            } else {
                "taken"
            }
        }
        BlockKind::Switch => "case",
        _ => "",
    }
}
