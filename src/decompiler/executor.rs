//! IR executor
//!
//! Runs flat, structured or mixed IR directly, so a decompiled program can
//! be checked against the machine interpreter. Execution starts at node 0.
//! A jump anywhere, nested bodies included, continues at that top-level
//! index; leaving `[0, len)` or reaching `end` halts.

use super::ir::IrNode;
use crate::machine::{Execution, Reg, Registers};
use crate::{Error, Result};

/// Control transfer requested by a node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Next,
    Goto(usize),
    Halt,
}

/// Simulates IR lists
#[derive(Debug, Clone, Copy)]
pub struct IrExecutor {
    ip: Reg,
    step_limit: Option<u64>,
}

impl IrExecutor {
    /// Create an executor for IR whose pointer register is `ip`
    pub fn new(ip: Reg) -> Self {
        Self {
            ip,
            step_limit: None,
        }
    }

    /// Abort with [`Error::ExecutionLimitExceeded`] after `limit` steps
    pub fn with_step_limit(mut self, limit: Option<u64>) -> Self {
        self.step_limit = limit;
        self
    }

    /// Run `nodes` from the given register file
    pub fn run(&self, nodes: &[IrNode], registers: Registers) -> Result<Execution> {
        let mut run = Run {
            ip: self.ip,
            limit: self.step_limit,
            regs: registers,
            steps: 0,
        };
        let mut pc = 0usize;

        while let Some(node) = nodes.get(pc) {
            if run.writes_pointer(node) {
                // Relative skip: the pointer holds the current line while the
                // node executes, then advances past the result.
                run.regs[self.ip.index()] = pc as i64;
                run.exec(node)?;
                match usize::try_from(run.regs[self.ip.index()].wrapping_add(1)) {
                    Ok(next) => pc = next,
                    Err(_) => break,
                }
                continue;
            }

            match run.exec(node)? {
                Flow::Next => pc += 1,
                Flow::Goto(target) => pc = target,
                Flow::Halt => break,
            }
        }

        tracing::debug!(steps = run.steps, "ir execution halted at node {}", pc);
        Ok(Execution {
            registers: run.regs,
            steps: run.steps,
        })
    }

    /// Run and return the final value of register 0
    pub fn run_register_zero(&self, nodes: &[IrNode], registers: Registers) -> Result<i64> {
        Ok(self.run(nodes, registers)?.registers[0])
    }
}

struct Run {
    ip: Reg,
    limit: Option<u64>,
    regs: Registers,
    steps: u64,
}

impl Run {
    fn tick(&mut self) -> Result<()> {
        if let Some(limit) = self.limit {
            if self.steps >= limit {
                return Err(Error::ExecutionLimitExceeded { limit });
            }
        }
        self.steps += 1;
        Ok(())
    }

    fn writes_pointer(&self, node: &IrNode) -> bool {
        matches!(
            node,
            IrNode::Assignment { dest, .. } | IrNode::CompoundAssignment { dest, .. }
                if *dest == self.ip
        )
    }

    fn exec(&mut self, node: &IrNode) -> Result<Flow> {
        self.tick()?;

        let flow = match node {
            IrNode::Assignment { dest, value } => {
                self.regs[dest.index()] = value.eval(&self.regs);
                Flow::Next
            }
            IrNode::CompoundAssignment { op, dest, value } => {
                let rhs = value.eval(&self.regs);
                self.regs[dest.index()] = op.apply(self.regs[dest.index()], rhs);
                Flow::Next
            }
            IrNode::Comparison { cond, dest } => {
                self.regs[dest.index()] = cond.eval(&self.regs);
                Flow::Next
            }
            IrNode::UnconditionalJump { target } => Flow::Goto(*target),
            IrNode::ConditionalJump {
                cond,
                if_true,
                if_false,
            } => {
                if cond.holds(&self.regs) {
                    Flow::Goto(*if_true)
                } else {
                    Flow::Goto(*if_false)
                }
            }
            IrNode::End => Flow::Halt,
            IrNode::IfStatement { cond, body } => {
                if cond.holds(&self.regs) {
                    self.exec_block(body)?
                } else {
                    Flow::Next
                }
            }
            IrNode::DoWhile { cond, body } => loop {
                match self.exec_block(body)? {
                    Flow::Next => {}
                    flow => break flow,
                }
                if cond.holds(&self.regs) {
                    break Flow::Next;
                }
                self.tick()?;
            },
            IrNode::ForLoop {
                var,
                init,
                cond,
                body,
            } => {
                self.regs[var.index()] = init.eval(&self.regs);
                loop {
                    match self.exec_block(body)? {
                        Flow::Next => {}
                        flow => break flow,
                    }
                    self.regs[var.index()] = self.regs[var.index()].wrapping_add(1);
                    if cond.holds(&self.regs) {
                        break Flow::Next;
                    }
                    self.tick()?;
                }
            }
        };
        Ok(flow)
    }

    fn exec_block(&mut self, body: &[IrNode]) -> Result<Flow> {
        for node in body {
            if self.writes_pointer(node) {
                return Err(Error::runtime(
                    "pointer arithmetic inside a structured block",
                ));
            }
            match self.exec(node)? {
                Flow::Next => {}
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Next)
    }
}
