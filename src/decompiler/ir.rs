//! IR node and expression definitions

use crate::machine::{Reg, Registers};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Binary operator appearing in expressions and compound assignments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinOp {
    /// `+`
    Add,
    /// `*`
    Mul,
    /// `&`
    BitAnd,
    /// `|`
    BitOr,
    /// `>` (evaluates to 0 or 1)
    Gt,
    /// `==` (evaluates to 0 or 1)
    Eq,
}

impl BinOp {
    /// Source symbol
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Mul => "*",
            BinOp::BitAnd => "&",
            BinOp::BitOr => "|",
            BinOp::Gt => ">",
            BinOp::Eq => "==",
        }
    }

    /// True if operand order does not matter
    pub fn is_commutative(self) -> bool {
        !matches!(self, BinOp::Gt)
    }

    /// Apply the operator with the machine's wrapping semantics
    pub fn apply(self, lhs: i64, rhs: i64) -> i64 {
        match self {
            BinOp::Add => lhs.wrapping_add(rhs),
            BinOp::Mul => lhs.wrapping_mul(rhs),
            BinOp::BitAnd => lhs & rhs,
            BinOp::BitOr => lhs | rhs,
            BinOp::Gt => (lhs > rhs) as i64,
            BinOp::Eq => (lhs == rhs) as i64,
        }
    }
}

impl fmt::Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Value expression
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Expr {
    /// Current value of a register
    Register(Reg),
    /// Literal value
    Literal(i64),
    /// `lhs op rhs`
    Binary(BinaryExpr),
}

impl Expr {
    /// Shorthand for `Expr::Binary`
    pub fn binary(op: BinOp, lhs: Expr, rhs: Expr) -> Self {
        Expr::Binary(BinaryExpr::new(op, lhs, rhs))
    }

    /// Evaluate against a register file
    pub fn eval(&self, regs: &Registers) -> i64 {
        match self {
            Expr::Register(r) => regs[r.index()],
            Expr::Literal(v) => *v,
            Expr::Binary(bin) => bin.eval(regs),
        }
    }

    /// True if the expression reads `reg`
    pub fn reads(&self, reg: Reg) -> bool {
        match self {
            Expr::Register(r) => *r == reg,
            Expr::Literal(_) => false,
            Expr::Binary(bin) => bin.lhs.reads(reg) || bin.rhs.reads(reg),
        }
    }
}

impl From<Reg> for Expr {
    fn from(reg: Reg) -> Self {
        Expr::Register(reg)
    }
}

impl From<i64> for Expr {
    fn from(value: i64) -> Self {
        Expr::Literal(value)
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Register(r) => write!(f, "{}", r),
            Expr::Literal(v) => write!(f, "{}", v),
            Expr::Binary(bin) => write!(f, "{}", bin),
        }
    }
}

/// Binary operation; also used as the condition of comparisons and branches
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BinaryExpr {
    /// Operator
    pub op: BinOp,
    /// Left operand
    pub lhs: Box<Expr>,
    /// Right operand
    pub rhs: Box<Expr>,
}

impl BinaryExpr {
    /// Creates a binary expression
    pub fn new(op: BinOp, lhs: Expr, rhs: Expr) -> Self {
        Self {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    /// Evaluate against a register file
    pub fn eval(&self, regs: &Registers) -> i64 {
        self.op.apply(self.lhs.eval(regs), self.rhs.eval(regs))
    }

    /// Evaluate as a condition (non-zero is true)
    pub fn holds(&self, regs: &Registers) -> bool {
        self.eval(regs) != 0
    }
}

impl fmt::Display for BinaryExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let wrap = |e: &Expr| match e {
            Expr::Binary(_) => format!("({})", e),
            _ => e.to_string(),
        };
        write!(f, "{} {} {}", wrap(&self.lhs), self.op, wrap(&self.rhs))
    }
}

/// IR node: flat forms produced by translation, structured forms produced
/// by structural recovery.
///
/// Jump targets are indices into the top-level node list the node lives in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum IrNode {
    // Flat forms
    /// `dest = value`
    Assignment {
        /// Destination register
        dest: Reg,
        /// Assigned value
        value: Expr,
    },
    /// `dest op= value`
    CompoundAssignment {
        /// Operator
        op: BinOp,
        /// Destination register (also the left operand)
        dest: Reg,
        /// Right operand
        value: Expr,
    },
    /// `dest = cond ? 1 : 0`
    Comparison {
        /// Condition
        cond: BinaryExpr,
        /// Destination register
        dest: Reg,
    },
    /// `goto target`
    UnconditionalJump {
        /// Target line
        target: usize,
    },
    /// `if cond goto if_true else goto if_false`
    ConditionalJump {
        /// Condition
        cond: BinaryExpr,
        /// Target when the condition holds
        if_true: usize,
        /// Target otherwise
        if_false: usize,
    },
    /// Program termination
    End,

    // Structured forms
    /// `if (cond) { body }`
    IfStatement {
        /// Condition
        cond: BinaryExpr,
        /// Statements run when the condition holds
        body: Vec<IrNode>,
    },
    /// `do { body } while (!cond)`: `cond` is the exit condition
    DoWhile {
        /// Exit condition
        cond: BinaryExpr,
        /// Loop body
        body: Vec<IrNode>,
    },
    /// `for (var = init; !cond; var++) { body }` with do-while semantics:
    /// the body runs at least once
    ForLoop {
        /// Loop variable
        var: Reg,
        /// Initial value
        init: Expr,
        /// Exit condition
        cond: BinaryExpr,
        /// Loop body (without the trailing increment)
        body: Vec<IrNode>,
    },
}

impl IrNode {
    /// True for IfStatement, DoWhile and ForLoop
    pub fn is_structured(&self) -> bool {
        matches!(
            self,
            IrNode::IfStatement { .. } | IrNode::DoWhile { .. } | IrNode::ForLoop { .. }
        )
    }

    /// Nested body of a structured node
    pub fn body(&self) -> Option<&[IrNode]> {
        match self {
            IrNode::IfStatement { body, .. }
            | IrNode::DoWhile { body, .. }
            | IrNode::ForLoop { body, .. } => Some(body),
            _ => None,
        }
    }

    /// Consume a structured node, returning its body
    pub fn into_body(self) -> Option<Vec<IrNode>> {
        match self {
            IrNode::IfStatement { body, .. }
            | IrNode::DoWhile { body, .. }
            | IrNode::ForLoop { body, .. } => Some(body),
            _ => None,
        }
    }

    fn body_mut(&mut self) -> Option<&mut Vec<IrNode>> {
        match self {
            IrNode::IfStatement { body, .. }
            | IrNode::DoWhile { body, .. }
            | IrNode::ForLoop { body, .. } => Some(body),
            _ => None,
        }
    }

    /// True if this node, or anything nested in it, transfers control by
    /// line: a jump, a branch, or arithmetic on the instruction pointer.
    pub fn has_control_flow(&self, ip: Reg) -> bool {
        match self {
            IrNode::UnconditionalJump { .. } | IrNode::ConditionalJump { .. } => true,
            IrNode::CompoundAssignment { dest, .. } | IrNode::Assignment { dest, .. } => {
                *dest == ip
            }
            _ => self
                .body()
                .is_some_and(|body| body.iter().any(|n| n.has_control_flow(ip))),
        }
    }

    /// Append this node's jump targets (including nested ones) to `out`
    pub fn collect_targets(&self, out: &mut Vec<usize>) {
        match self {
            IrNode::UnconditionalJump { target } => out.push(*target),
            IrNode::ConditionalJump {
                if_true, if_false, ..
            } => {
                out.push(*if_true);
                out.push(*if_false);
            }
            _ => {
                if let Some(body) = self.body() {
                    for node in body {
                        node.collect_targets(out);
                    }
                }
            }
        }
    }

    /// Rewrite every jump target (including nested ones) through `f`
    pub fn map_targets(&mut self, f: &impl Fn(usize) -> usize) {
        match self {
            IrNode::UnconditionalJump { target } => *target = f(*target),
            IrNode::ConditionalJump {
                if_true, if_false, ..
            } => {
                *if_true = f(*if_true);
                *if_false = f(*if_false);
            }
            _ => {
                if let Some(body) = self.body_mut() {
                    for node in body {
                        node.map_targets(f);
                    }
                }
            }
        }
    }
}

/// All jump targets in a node list, nested ones included
pub fn jump_targets(nodes: &[IrNode]) -> Vec<usize> {
    let mut out = Vec::new();
    for node in nodes {
        node.collect_targets(&mut out);
    }
    out
}

/// Targets that do not name a node of `nodes`
pub fn out_of_range_targets(nodes: &[IrNode]) -> Vec<usize> {
    jump_targets(nodes)
        .into_iter()
        .filter(|&t| t >= nodes.len())
        .collect()
}

/// Rewrite every target in `nodes` through `f`
pub fn map_targets(nodes: &mut [IrNode], f: impl Fn(usize) -> usize) {
    for node in nodes.iter_mut() {
        node.map_targets(&f);
    }
}

/// Shift every target strictly greater than `line` by `delta`
pub fn shift_targets(nodes: &mut [IrNode], line: usize, delta: isize) {
    map_targets(nodes, |t| {
        if t > line {
            t.saturating_add_signed(delta)
        } else {
            t
        }
    });
}
