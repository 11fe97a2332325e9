//! # Peephole Passes
//!
//! Local rewrites run on the flat IR before structural recovery:
//! - `rewrite_operators`: compound-assignment synthesis and redundant
//!   assignment removal
//! - `rewrite_pointer`: normalizes `ip += rX` into `rX = rX == 1; ip += rX`
//!   so the if-else fusion pattern can see it
//!
//! Both passes return the edited list together with the positions they
//! touched; any renumbering is applied once, after the scan.

use super::ir::{self, BinOp, BinaryExpr, Expr, IrNode};
use crate::machine::Reg;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// What happens to jump targets when `rewrite_operators` deletes nodes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeadStorePolicy {
    /// Targets are left untouched, so a target past a deleted node names
    /// the node that followed its original destination.
    #[default]
    PreserveTargets,
    /// Targets are shifted down past every deleted node and keep naming
    /// the same statement. A target that named a deleted node lands on
    /// the next surviving one.
    Renumber,
}

/// Peephole rewriter
#[derive(Debug, Clone, Copy)]
pub struct Peephole {
    ip: Reg,
    policy: DeadStorePolicy,
}

impl Peephole {
    /// Create a rewriter for programs whose pointer lives in `ip`
    pub fn new(ip: Reg, policy: DeadStorePolicy) -> Self {
        Self { ip, policy }
    }

    /// Synthesize compound assignments and drop assignments that store a
    /// value the register already holds.
    ///
    /// Returns the rewritten list and the original indices of deleted nodes.
    pub fn rewrite_operators(&self, nodes: Vec<IrNode>) -> (Vec<IrNode>, Vec<usize>) {
        let mut known: HashMap<Reg, Expr> = HashMap::new();
        let mut deleted = Vec::new();
        let mut out = Vec::with_capacity(nodes.len());

        for (line, node) in nodes.into_iter().enumerate() {
            let (dest, value) = match node {
                IrNode::Assignment { dest, value } => (dest, value),
                other => {
                    // Anything else may change registers in ways we don't track
                    known.clear();
                    out.push(other);
                    continue;
                }
            };

            match value {
                Expr::Binary(bin) => {
                    known.clear();
                    out.push(Self::compound(dest, bin));
                }
                value => {
                    if value == Expr::Register(dest) || known.get(&dest) == Some(&value) {
                        tracing::trace!(line, "dropping redundant assignment {} = {}", dest, value);
                        deleted.push(line);
                        continue;
                    }
                    known.retain(|_, tracked| !tracked.reads(dest));
                    known.insert(dest, value.clone());
                    out.push(IrNode::Assignment { dest, value });
                }
            }
        }

        if self.policy == DeadStorePolicy::Renumber && !deleted.is_empty() {
            ir::map_targets(&mut out, |t| {
                t - deleted.iter().filter(|&&line| line < t).count()
            });
        }

        (out, deleted)
    }

    /// Insert `rX = rX == 1` before every `ip += rX` that is not already
    /// preceded by a comparison. Index 0 is never rewritten.
    ///
    /// This assumes `rX` holds 0 or 1 at that point. Returns the rewritten
    /// list and the original indices in front of which a node was inserted.
    pub fn rewrite_pointer(&self, nodes: Vec<IrNode>) -> (Vec<IrNode>, Vec<usize>) {
        let mut inserted = Vec::new();
        let mut out = Vec::with_capacity(nodes.len());
        let mut after_comparison = true;

        for (line, node) in nodes.into_iter().enumerate() {
            if !after_comparison {
                if let Some(reg) = self.pointer_skip(&node) {
                    tracing::warn!(line, "assuming {} is 0 or 1 where it is added to the pointer", reg);
                    out.push(IrNode::Comparison {
                        cond: BinaryExpr::new(BinOp::Eq, Expr::Register(reg), Expr::Literal(1)),
                        dest: reg,
                    });
                    inserted.push(line);
                }
            }
            after_comparison = matches!(node, IrNode::Comparison { .. });
            out.push(node);
        }

        // A jump to the original `ip += rX` lands on the inserted comparison.
        if !inserted.is_empty() {
            ir::map_targets(&mut out, |t| {
                t + inserted.iter().filter(|&&line| line < t).count()
            });
        }

        (out, inserted)
    }

    /// Register added to the pointer by `ip += rX`
    fn pointer_skip(&self, node: &IrNode) -> Option<Reg> {
        match node {
            IrNode::CompoundAssignment {
                op: BinOp::Add,
                dest,
                value: Expr::Register(reg),
            } if *dest == self.ip => Some(*reg),
            _ => None,
        }
    }

    fn compound(dest: Reg, bin: BinaryExpr) -> IrNode {
        let BinaryExpr { op, lhs, rhs } = bin;
        if *lhs == Expr::Register(dest) {
            IrNode::CompoundAssignment {
                op,
                dest,
                value: *rhs,
            }
        } else if *rhs == Expr::Register(dest) && op.is_commutative() {
            IrNode::CompoundAssignment {
                op,
                dest,
                value: *lhs,
            }
        } else {
            IrNode::Assignment {
                dest,
                value: Expr::Binary(BinaryExpr { op, lhs, rhs }),
            }
        }
    }
}
