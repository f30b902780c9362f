//! Compilation of a rule condition into instructions.
use std::collections::HashMap;

use quarry_parser::expression::{Expression, ExpressionKind, ForSelection, VariableSet};

use super::error::{CompilationError, CompilationErrorKind};
use crate::bytecode::{Op, Reg};

/// Compilation state of a single rule condition.
pub(super) struct RuleCompiler<'a> {
    /// Variables declared in the rule, as `(name, match_index)`, in
    /// declaration order.
    variables: &'a [(String, usize)],

    /// Identifiers bound by enclosing `for` expressions, to the register
    /// holding their current value.
    bound_identifiers: HashMap<String, Reg>,

    /// Pattern bound by the enclosing `for` over a set of variables,
    /// referred to by `$`, `#` and `@` inside the body.
    current_variable: Option<usize>,

    /// Emitted instructions.
    ops: Vec<Op>,
}

/// Compile a rule condition into an instruction sequence.
pub(super) fn compile_condition(
    variables: &[(String, usize)],
    condition: &Expression,
) -> Result<Vec<Op>, CompilationError> {
    let mut compiler = RuleCompiler {
        variables,
        bound_identifiers: HashMap::new(),
        current_variable: None,
        ops: Vec::new(),
    };
    compiler.compile_expression(condition)?;
    Ok(compiler.ops)
}

impl RuleCompiler<'_> {
    fn push(&mut self, op: Op) {
        self.ops.push(op);
    }

    /// Resolve a variable name to its match index.
    ///
    /// An empty name refers to the variable bound by the enclosing `for`
    /// over a set.
    fn resolve(&self, name: &str, expr: &Expression) -> Result<usize, CompilationError> {
        if name.is_empty() {
            return self.current_variable.ok_or_else(|| CompilationError {
                kind: CompilationErrorKind::UnboundAnonymousVariable,
                span: expr.span.clone(),
            });
        }

        self.variables
            .iter()
            .find(|(n, _)| n == name)
            .map(|&(_, match_index)| match_index)
            .ok_or_else(|| CompilationError {
                kind: CompilationErrorKind::UnknownVariable {
                    name: name.to_owned(),
                },
                span: expr.span.clone(),
            })
    }

    /// Expand a variable set into the match indexes of its elements.
    ///
    /// An empty set means `them`: every variable of the rule.
    fn expand_set(
        &self,
        set: &VariableSet,
        expr: &Expression,
    ) -> Result<Vec<usize>, CompilationError> {
        if set.elements.is_empty() {
            return Ok(self.variables.iter().map(|&(_, mi)| mi).collect());
        }

        let mut out = Vec::new();
        for element in &set.elements {
            let before = out.len();
            if element.is_wildcard {
                out.extend(
                    self.variables
                        .iter()
                        .filter(|(name, _)| name.starts_with(&element.name))
                        .map(|&(_, mi)| mi),
                );
            } else {
                out.extend(
                    self.variables
                        .iter()
                        .filter(|(name, _)| *name == element.name)
                        .map(|&(_, mi)| mi),
                );
            }
            if out.len() == before {
                let mut name = element.name.clone();
                if element.is_wildcard {
                    name.push('*');
                }
                return Err(CompilationError {
                    kind: CompilationErrorKind::UnknownVariable { name },
                    span: expr.span.clone(),
                });
            }
        }
        Ok(out)
    }

    fn compile_expression(&mut self, expr: &Expression) -> Result<(), CompilationError> {
        match &expr.kind {
            ExpressionKind::Boolean(b) => self.push(Op::Push(i64::from(*b))),
            ExpressionKind::Integer(n) => self.push(Op::Push(*n)),
            ExpressionKind::Filesize => self.push(Op::LoadStatic(0)),

            // A variable test and a count are the same value: the number
            // of matches, truthy when positive.
            ExpressionKind::Variable(name) | ExpressionKind::Count(name) => {
                let match_index = self.resolve(name, expr)?;
                self.push(Op::LoadCount(match_index));
            }

            ExpressionKind::Offset {
                variable_name,
                occurrence,
            } => {
                let match_index = self.resolve(variable_name, expr)?;
                match occurrence {
                    Some(occurrence) => self.compile_expression(occurrence)?,
                    None => self.push(Op::Push(0)),
                }
                self.push(Op::LoadOffset(match_index));
            }

            ExpressionKind::Identifier(name) => {
                match self.bound_identifiers.get(name).copied() {
                    Some(reg) => self.push(Op::PushR(reg)),
                    None => {
                        return Err(CompilationError {
                            kind: CompilationErrorKind::UnknownIdentifier {
                                name: name.clone(),
                            },
                            span: expr.span.clone(),
                        })
                    }
                }
            }

            ExpressionKind::Neg(sub) => {
                self.compile_expression(sub)?;
                self.push(Op::Neg);
            }

            ExpressionKind::Add(left, right) => self.compile_binary(left, right, Op::Add)?,
            ExpressionKind::Sub(left, right) => self.compile_binary(left, right, Op::Sub)?,
            ExpressionKind::BitwiseAnd(left, right) => {
                self.compile_binary(left, right, Op::BitAnd)?;
            }
            ExpressionKind::BitwiseOr(left, right) => {
                self.compile_binary(left, right, Op::BitOr)?;
            }
            ExpressionKind::BitwiseXor(left, right) => {
                self.compile_binary(left, right, Op::BitXor)?;
            }
            ExpressionKind::ShiftLeft(left, right) => self.compile_binary(left, right, Op::Shl)?,
            ExpressionKind::ShiftRight(left, right) => self.compile_binary(left, right, Op::Shr)?,
            ExpressionKind::And(left, right) => self.compile_binary(left, right, Op::And)?,
            ExpressionKind::Or(left, right) => self.compile_binary(left, right, Op::Or)?,
            ExpressionKind::Eq(left, right) => self.compile_binary(left, right, Op::Eq)?,
            ExpressionKind::NotEq(left, right) => self.compile_binary(left, right, Op::NotEq)?,

            ExpressionKind::Cmp {
                left,
                right,
                less_than,
                can_be_equal,
            } => {
                let op = match (less_than, can_be_equal) {
                    (true, false) => Op::Lt,
                    (true, true) => Op::Le,
                    (false, false) => Op::Gt,
                    (false, true) => Op::Ge,
                };
                self.compile_binary(left, right, op)?;
            }

            ExpressionKind::VariableAt {
                variable_name,
                offset,
            } => {
                let match_index = self.resolve(variable_name, expr)?;
                self.compile_expression(offset)?;
                self.push(Op::At(match_index));
            }

            ExpressionKind::VariableIn {
                variable_name,
                from,
                to,
            } => {
                let match_index = self.resolve(variable_name, expr)?;
                self.compile_expression(from)?;
                self.compile_expression(to)?;
                self.push(Op::In(match_index));
            }

            ExpressionKind::Of { selection, set } => {
                let match_indexes = self.expand_set(set, expr)?;
                let count = match_indexes.len();
                for match_index in match_indexes {
                    self.push(Op::LoadCount(match_index));
                }
                self.push(Op::Push(count as i64));

                let wanted = match selection {
                    ForSelection::Count(n) => *n,
                    ForSelection::All => self.variables.len() as i64,
                    ForSelection::Any => 1,
                    ForSelection::None => 0,
                };
                self.push(Op::Of(wanted));
            }

            ExpressionKind::ForIn {
                selection,
                identifier,
                from,
                to,
                body,
            } => {
                self.push(Op::Clear);

                // Iterator and total, both starting at the lower bound.
                self.compile_expression(from)?;
                self.push(Op::MovR(Reg::R1));
                self.compile_expression(from)?;
                self.push(Op::MovR(Reg::R3));

                let previous = self
                    .bound_identifiers
                    .insert(identifier.clone(), Reg::R1);

                // Iteration count in the loop counter.
                self.compile_expression(to)?;
                self.compile_expression(from)?;
                self.push(Op::Sub);
                self.push(Op::MovR(Reg::Rc));

                let start = self.ops.len();
                self.compile_expression(body)?;
                self.push(Op::IncR(Reg::R1));
                self.push(Op::AddR(Reg::R2));
                self.push(Op::Loop(start));
                self.push(Op::PushR(Reg::R2));

                match previous {
                    Some(reg) => {
                        let _ = self.bound_identifiers.insert(identifier.clone(), reg);
                    }
                    None => {
                        let _ = self.bound_identifiers.remove(identifier);
                    }
                }

                self.finish_selection(selection, expr)?;
            }

            ExpressionKind::ForOf {
                selection,
                set,
                body,
            } => {
                let match_indexes = self.expand_set(set, expr)?;

                self.push(Op::Clear);
                self.push(Op::Push(match_indexes.len() as i64));
                self.push(Op::MovR(Reg::R3));

                let previous = self.current_variable;
                for match_index in match_indexes {
                    self.current_variable = Some(match_index);
                    self.compile_expression(body)?;
                    self.push(Op::AddR(Reg::R2));
                }
                self.current_variable = previous;

                self.push(Op::PushR(Reg::R2));
                self.finish_selection(selection, expr)?;
            }
        }

        Ok(())
    }

    fn compile_binary(
        &mut self,
        left: &Expression,
        right: &Expression,
        op: Op,
    ) -> Result<(), CompilationError> {
        self.compile_expression(left)?;
        self.compile_expression(right)?;
        self.push(op);
        Ok(())
    }

    /// Turn the accumulated truth count left on the stack into the final
    /// verdict of a `for` expression.
    fn finish_selection(
        &mut self,
        selection: &ForSelection,
        expr: &Expression,
    ) -> Result<(), CompilationError> {
        match selection {
            ForSelection::Count(n) => {
                self.push(Op::Push(*n));
                self.push(Op::Eq);
            }
            ForSelection::All => {
                self.push(Op::PushR(Reg::R3));
                self.push(Op::Eq);
            }
            ForSelection::Any => {
                self.push(Op::Push(1));
                self.push(Op::Ge);
            }
            ForSelection::None => {
                return Err(CompilationError {
                    kind: CompilationErrorKind::UnsupportedForSelection,
                    span: expr.span.clone(),
                })
            }
        }
        Ok(())
    }
}
