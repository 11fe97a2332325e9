//! # C-like Code Emitter
//!
//! Renders IR as readable pseudocode. Nested bodies are indented with
//! [`DecompileOptions::indent`]; top-level nodes can carry their index as
//! a `NNNN: ` prefix so remaining `goto`s stay readable.

use super::ir::IrNode;
use super::{DecompileOptions, LineNumbers};
use crate::machine::Reg;

/// Width of the `NNNN: ` line prefix
const PREFIX_WIDTH: usize = 6;

/// C-like pseudocode emitter
pub struct CEmitter<'a> {
    options: &'a DecompileOptions,
    ip: Reg,
}

impl<'a> CEmitter<'a> {
    /// Creates an emitter for IR whose pointer register is `ip`
    pub fn new(options: &'a DecompileOptions, ip: Reg) -> Self {
        Self { options, ip }
    }

    /// Emit the whole node list
    pub fn emit(&self, nodes: &[IrNode]) -> String {
        let numbered = match self.options.line_numbers {
            LineNumbers::Always => true,
            LineNumbers::Never => false,
            LineNumbers::WhenJumpsRemain => nodes.iter().any(|n| n.has_control_flow(self.ip)),
        };

        let mut output = String::new();
        output.push_str(&format!("// Decompiled elfcode (#ip {})\n", self.ip.index()));

        let mut lines = Vec::new();
        for (line, node) in nodes.iter().enumerate() {
            lines.clear();
            self.emit_node(node, 0, &mut lines);

            for (i, text) in lines.iter().enumerate() {
                if numbered {
                    if i == 0 {
                        output.push_str(&format!("{:04}: ", line));
                    } else {
                        output.push_str(&" ".repeat(PREFIX_WIDTH));
                    }
                }
                output.push_str(text);
                output.push('\n');
            }
        }

        output
    }

    fn emit_node(&self, node: &IrNode, depth: usize, lines: &mut Vec<String>) {
        let pad = self.options.indent.repeat(depth);

        match node {
            IrNode::Assignment { dest, value } => {
                lines.push(format!("{}{} = {};", pad, dest, value));
            }
            IrNode::CompoundAssignment { op, dest, value } => {
                lines.push(format!("{}{} {}= {};", pad, dest, op, value));
            }
            IrNode::Comparison { cond, dest } => {
                lines.push(format!("{}{} = ({}) ? 1 : 0;", pad, dest, cond));
            }
            IrNode::UnconditionalJump { target } => {
                lines.push(format!("{}goto {};", pad, target));
            }
            IrNode::ConditionalJump {
                cond,
                if_true,
                if_false,
            } => {
                lines.push(format!(
                    "{}if ({}) goto {}; else goto {};",
                    pad, cond, if_true, if_false
                ));
            }
            IrNode::End => lines.push(format!("{}end;", pad)),
            IrNode::IfStatement { cond, body } => {
                lines.push(format!("{}if ({}) {{", pad, cond));
                self.emit_body(body, depth + 1, lines);
                lines.push(format!("{}}}", pad));
            }
            IrNode::DoWhile { cond, body } => {
                lines.push(format!("{}do {{", pad));
                self.emit_body(body, depth + 1, lines);
                lines.push(format!("{}}} while (!({}));", pad, cond));
            }
            IrNode::ForLoop {
                var,
                init,
                cond,
                body,
            } => {
                lines.push(format!(
                    "{}for ({} = {}; !({}); {}++) {{",
                    pad, var, init, cond, var
                ));
                self.emit_body(body, depth + 1, lines);
                lines.push(format!("{}}}", pad));
            }
        }
    }

    fn emit_body(&self, body: &[IrNode], depth: usize, lines: &mut Vec<String>) {
        for node in body {
            self.emit_node(node, depth, lines);
        }
    }
}
