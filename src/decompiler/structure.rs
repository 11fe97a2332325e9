//! # Structural Recovery
//!
//! Folds flat IR into nested control flow by applying four local rewrites
//! until none applies. Each pass tries the patterns in priority order; the
//! first match anywhere in the list is applied and the pass restarts.
//!
//! ```text
//! if-else fusion   L: rX = cond          L: if cond goto L+3 else goto G
//!                  L+1: ip += rX    =>
//!                  L+2: goto G
//!
//! single-if        L: if c goto L+1 else goto L+2   =>   if (c) { IR[L+1] }
//!
//! for-loop         L: rV = init                      =>   for (rV = init; ..)
//!                  L+1: do { ..; rV += 1 } while ..
//!
//! do-while         M: ..                             =>   do { IR[M..L] }
//!                  L: if c goto L+1 else goto M           while (!c)
//! ```
//!
//! Every fold replaces a run of nodes with one node and shifts all later
//! jump targets by the size difference. A fold is refused when some jump
//! targets a node that would end up inside the new structure, so targets
//! always name top-level nodes.

use super::ir::{self, BinOp, BinaryExpr, Expr, IrNode};
use crate::machine::Reg;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Structural rewrite patterns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Pattern {
    /// Comparison + pointer skip + jump into a two-way branch
    IfElseFusion,
    /// Branch over a single statement
    SingleIf,
    /// Initialization followed by a counting do-while
    ForLoop,
    /// Backward branch closing a jump-free block
    DoWhile,
}

impl Pattern {
    /// Order in which patterns are tried on every pass
    pub const PRIORITY: [Pattern; 4] = [
        Pattern::IfElseFusion,
        Pattern::SingleIf,
        Pattern::ForLoop,
        Pattern::DoWhile,
    ];

    /// Human-readable name
    pub fn name(self) -> &'static str {
        match self {
            Pattern::IfElseFusion => "if-else fusion",
            Pattern::SingleIf => "single-if",
            Pattern::ForLoop => "for-loop",
            Pattern::DoWhile => "do-while",
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Counts of applied rewrites
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryReport {
    /// If-else fusions applied
    pub if_else_fusions: usize,
    /// Single-if folds applied
    pub single_ifs: usize,
    /// For-loop folds applied
    pub for_loops: usize,
    /// Do-while folds applied
    pub do_whiles: usize,
    /// Passes over the list, including the final one that found nothing
    pub passes: usize,
}

impl RecoveryReport {
    /// Total number of rewrites
    pub fn total(&self) -> usize {
        self.if_else_fusions + self.single_ifs + self.for_loops + self.do_whiles
    }

    /// Rewrites applied for one pattern
    pub fn count(&self, pattern: Pattern) -> usize {
        match pattern {
            Pattern::IfElseFusion => self.if_else_fusions,
            Pattern::SingleIf => self.single_ifs,
            Pattern::ForLoop => self.for_loops,
            Pattern::DoWhile => self.do_whiles,
        }
    }

    fn record(&mut self, pattern: Pattern) {
        match pattern {
            Pattern::IfElseFusion => self.if_else_fusions += 1,
            Pattern::SingleIf => self.single_ifs += 1,
            Pattern::ForLoop => self.for_loops += 1,
            Pattern::DoWhile => self.do_whiles += 1,
        }
    }
}

/// A located match, ready to be applied
#[derive(Debug)]
enum Fold {
    IfElse {
        at: usize,
        cond: BinaryExpr,
        exit: usize,
    },
    SingleIf {
        at: usize,
        cond: BinaryExpr,
    },
    ForLoop {
        at: usize,
        var: Reg,
        init: Expr,
    },
    DoWhile {
        head: usize,
        tail: usize,
        cond: BinaryExpr,
    },
}

/// Fixpoint structural recovery engine
#[derive(Debug, Clone, Copy)]
pub struct StructureRecovery {
    ip: Reg,
}

impl StructureRecovery {
    /// Create an engine for programs whose pointer lives in `ip`
    pub fn new(ip: Reg) -> Self {
        Self { ip }
    }

    /// Rewrite until no pattern applies
    pub fn recover(&self, mut nodes: Vec<IrNode>) -> (Vec<IrNode>, RecoveryReport) {
        let mut report = RecoveryReport::default();

        loop {
            report.passes += 1;
            match self.step(&mut nodes) {
                Some(pattern) => report.record(pattern),
                None => break,
            }
        }

        tracing::debug!(
            rewrites = report.total(),
            passes = report.passes,
            len = nodes.len(),
            "structural recovery reached fixpoint"
        );
        (nodes, report)
    }

    /// Apply the first matching pattern, in priority order.
    ///
    /// Returns the pattern applied, or `None` at the fixpoint. Every
    /// successful step shortens the list.
    pub fn step(&self, nodes: &mut Vec<IrNode>) -> Option<Pattern> {
        Pattern::PRIORITY
            .into_iter()
            .find(|&pattern| self.apply(pattern, nodes))
    }

    /// Apply `pattern` at its earliest match, if any
    pub fn apply(&self, pattern: Pattern, nodes: &mut Vec<IrNode>) -> bool {
        let fold = match pattern {
            Pattern::IfElseFusion => self.find_if_else(nodes),
            Pattern::SingleIf => self.find_single_if(nodes),
            Pattern::ForLoop => self.find_for_loop(nodes),
            Pattern::DoWhile => self.find_do_while(nodes),
        };

        match fold {
            Some(fold) => {
                let at = fold.start();
                Self::fold(nodes, fold);
                tracing::debug!(pattern = %pattern, line = at, len = nodes.len(), "folded");
                true
            }
            None => false,
        }
    }

    fn find_if_else(&self, nodes: &[IrNode]) -> Option<Fold> {
        nodes.windows(3).enumerate().find_map(|(at, window)| match window {
            [IrNode::Comparison { cond, dest }, IrNode::CompoundAssignment {
                op: BinOp::Add,
                dest: ptr,
                value: Expr::Register(skip),
            }, IrNode::UnconditionalJump { target }]
                if *ptr == self.ip && skip == dest =>
            {
                if Self::is_targeted(nodes, None, |t| t == at + 1 || t == at + 2) {
                    tracing::trace!(line = at, "if-else fusion refused: jump into the pattern");
                    return None;
                }
                Some(Fold::IfElse {
                    at,
                    cond: cond.clone(),
                    exit: *target,
                })
            }
            _ => None,
        })
    }

    fn find_single_if(&self, nodes: &[IrNode]) -> Option<Fold> {
        nodes.windows(2).enumerate().find_map(|(at, window)| match window {
            [IrNode::ConditionalJump {
                cond,
                if_true,
                if_false,
            }, body]
                if *if_true == at + 1 && *if_false == at + 2 =>
            {
                if self.writes_pointer(body) {
                    tracing::trace!(line = at, "single-if refused: body moves the pointer");
                    return None;
                }
                if Self::is_targeted(nodes, Some(at), |t| t == at + 1) {
                    tracing::trace!(line = at, "single-if refused: jump into the body");
                    return None;
                }
                Some(Fold::SingleIf {
                    at,
                    cond: cond.clone(),
                })
            }
            _ => None,
        })
    }

    fn find_for_loop(&self, nodes: &[IrNode]) -> Option<Fold> {
        nodes.windows(2).enumerate().find_map(|(at, window)| match window {
            [IrNode::Assignment { dest, value }, IrNode::DoWhile { body, .. }] => {
                let counts = matches!(
                    body.last(),
                    Some(IrNode::CompoundAssignment {
                        op: BinOp::Add,
                        dest: var,
                        value: Expr::Literal(1),
                    }) if var == dest
                );
                if !counts || body.iter().any(|n| n.has_control_flow(self.ip)) {
                    return None;
                }
                if Self::is_targeted(nodes, None, |t| t == at + 1) {
                    tracing::trace!(line = at, "for-loop refused: jump past the initializer");
                    return None;
                }
                Some(Fold::ForLoop {
                    at,
                    var: *dest,
                    init: value.clone(),
                })
            }
            _ => None,
        })
    }

    fn find_do_while(&self, nodes: &[IrNode]) -> Option<Fold> {
        (1..nodes.len()).find_map(|at| match &nodes[at] {
            IrNode::ConditionalJump {
                cond,
                if_true,
                if_false: head,
            } if *if_true == at + 1 && *head < at => {
                let head = *head;
                if nodes[head..at].iter().any(|n| n.has_control_flow(self.ip)) {
                    tracing::trace!(line = at, head, "do-while refused: control flow in the body");
                    return None;
                }
                if Self::is_targeted(nodes, Some(at), |t| t > head && t <= at) {
                    tracing::trace!(line = at, head, "do-while refused: jump into the loop");
                    return None;
                }
                Some(Fold::DoWhile {
                    head,
                    tail: at,
                    cond: cond.clone(),
                })
            }
            _ => None,
        })
    }

    fn fold(nodes: &mut Vec<IrNode>, fold: Fold) {
        let (start, removed) = match fold {
            Fold::IfElse { at, cond, exit } => {
                nodes.drain(at + 1..at + 3);
                nodes[at] = IrNode::ConditionalJump {
                    cond,
                    if_true: at + 3,
                    if_false: exit,
                };
                (at, 2)
            }
            Fold::SingleIf { at, cond } => {
                let statement = nodes.remove(at + 1);
                nodes[at] = IrNode::IfStatement {
                    cond,
                    body: vec![statement],
                };
                (at, 1)
            }
            Fold::ForLoop { at, var, init } => {
                if let IrNode::DoWhile { cond, mut body } = nodes.remove(at + 1) {
                    body.pop();
                    nodes[at] = IrNode::ForLoop {
                        var,
                        init,
                        cond,
                        body,
                    };
                }
                (at, 1)
            }
            Fold::DoWhile { head, tail, cond } => {
                let body: Vec<IrNode> = nodes.drain(head..tail).collect();
                let removed = body.len();
                nodes[head] = IrNode::DoWhile { cond, body };
                (head, removed)
            }
        };
        ir::shift_targets(nodes, start, -(removed as isize));
    }

    /// True if a jump in any node except `skip` has a target matching `pred`
    fn is_targeted(nodes: &[IrNode], skip: Option<usize>, pred: impl Fn(usize) -> bool) -> bool {
        let mut targets = Vec::new();
        nodes
            .iter()
            .enumerate()
            .filter(|(line, _)| Some(*line) != skip)
            .any(|(_, node)| {
                targets.clear();
                node.collect_targets(&mut targets);
                targets.iter().any(|&t| pred(t))
            })
    }

    fn writes_pointer(&self, node: &IrNode) -> bool {
        matches!(
            node,
            IrNode::Assignment { dest, .. } | IrNode::CompoundAssignment { dest, .. }
                if *dest == self.ip
        )
    }
}

impl Fold {
    fn start(&self) -> usize {
        match self {
            Fold::IfElse { at, .. } | Fold::SingleIf { at, .. } | Fold::ForLoop { at, .. } => *at,
            Fold::DoWhile { head, .. } => *head,
        }
    }
}
