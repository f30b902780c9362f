//! Evaluation of a compiled condition against the match table.
use crate::bytecode::{Op, Reg};

/// Values available to every rule evaluation of a scan.
pub(crate) struct EvalContext<'a> {
    /// Match offsets per pattern, indexed by match index.
    pub(crate) matches: &'a [Vec<usize>],

    /// Scan-wide static values. Index 0 is the size of the input.
    pub(crate) statics: &'a [i64],
}

/// Internal fault while evaluating a condition.
///
/// A fault is a defect of the compiler, not of the scanned rule: the
/// instruction sequences it emits always leave exactly one value on the
/// stack and never pop more than they pushed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EvalFault {
    /// An instruction popped from an empty stack.
    EmptyStack,
    /// The stack did not hold exactly one value at the end.
    FinalStack {
        /// Number of values on the stack.
        size: usize,
    },
}

impl std::fmt::Display for EvalFault {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::EmptyStack => write!(f, "pop on an empty stack"),
            Self::FinalStack { size } => {
                write!(f, "expected a single final value on the stack, found {size}")
            }
        }
    }
}

/// Run a compiled condition; the verdict is whether the final value is
/// truthy.
///
/// All arithmetic wraps around on two's complement 64-bit integers,
/// overflow is not an error.
pub(crate) fn evaluate(ops: &[Op], ctx: &EvalContext) -> Result<bool, EvalFault> {
    let mut stack: Vec<i64> = Vec::new();
    let mut regs = [0_i64; 4];
    let mut index = 0;

    fn pop(stack: &mut Vec<i64>) -> Result<i64, EvalFault> {
        stack.pop().ok_or(EvalFault::EmptyStack)
    }

    while let Some(op) = ops.get(index) {
        match op {
            Op::Push(value) => stack.push(*value),

            Op::LoadCount(mi) => {
                stack.push(ctx.matches.get(*mi).map_or(0, |m| m.len() as i64));
            }

            Op::LoadOffset(mi) => {
                let occurrence = pop(&mut stack)?;
                let offset = usize::try_from(occurrence)
                    .ok()
                    .and_then(|k| ctx.matches.get(*mi)?.get(k))
                    .map_or(0, |&o| o as i64);
                stack.push(offset);
            }

            Op::LoadStatic(i) => stack.push(ctx.statics.get(*i).copied().unwrap_or(0)),

            Op::Add => binary(&mut stack, i64::wrapping_add)?,
            Op::Sub => binary(&mut stack, i64::wrapping_sub)?,
            Op::Neg => {
                let value = pop(&mut stack)?;
                stack.push(value.wrapping_neg());
            }

            Op::BitAnd => binary(&mut stack, |l, r| l & r)?,
            Op::BitOr => binary(&mut stack, |l, r| l | r)?,
            Op::BitXor => binary(&mut stack, |l, r| l ^ r)?,
            Op::Shl => binary(&mut stack, |l, r| l.wrapping_shl(r as u32))?,
            Op::Shr => binary(&mut stack, |l, r| l.wrapping_shr(r as u32))?,

            Op::And => binary(&mut stack, |l, r| i64::from(l > 0 && r > 0))?,
            Op::Or => binary(&mut stack, |l, r| i64::from(l > 0 || r > 0))?,

            Op::Eq => binary(&mut stack, |l, r| i64::from(l == r))?,
            Op::NotEq => binary(&mut stack, |l, r| i64::from(l != r))?,
            Op::Gt => binary(&mut stack, |l, r| i64::from(l > r))?,
            Op::Ge => binary(&mut stack, |l, r| i64::from(l >= r))?,
            Op::Lt => binary(&mut stack, |l, r| i64::from(l < r))?,
            Op::Le => binary(&mut stack, |l, r| i64::from(l <= r))?,

            Op::At(mi) => {
                let target = pop(&mut stack)?;
                let found = ctx
                    .matches
                    .get(*mi)
                    .is_some_and(|m| m.iter().any(|&o| o as i64 == target));
                stack.push(i64::from(found));
            }

            Op::In(mi) => {
                let high = pop(&mut stack)?;
                let low = pop(&mut stack)?;
                let count = ctx.matches.get(*mi).map_or(0, |m| {
                    m.iter()
                        .filter(|&&o| (o as i64) > low && (o as i64) < high)
                        .count()
                });
                stack.push(count as i64);
            }

            Op::Of(wanted) => {
                let size = pop(&mut stack)?;
                let mut truthy = 0_i64;
                for _ in 0..size {
                    if pop(&mut stack)? > 0 {
                        truthy += 1;
                    }
                }
                let verdict = if *wanted == 0 {
                    truthy == 0
                } else {
                    truthy >= *wanted
                };
                stack.push(i64::from(verdict));
            }

            Op::MovR(reg) => regs[reg.index()] = pop(&mut stack)?,
            Op::AddR(reg) => {
                let value = pop(&mut stack)?;
                regs[reg.index()] = regs[reg.index()].wrapping_add(value);
            }
            Op::IncR(reg) => regs[reg.index()] = regs[reg.index()].wrapping_add(1),
            Op::DecR(reg) => regs[reg.index()] = regs[reg.index()].wrapping_sub(1),
            Op::PushR(reg) => stack.push(regs[reg.index()]),
            Op::Clear => regs = [0; 4],

            Op::Loop(target) => {
                if regs[Reg::Rc.index()] > 0 {
                    regs[Reg::Rc.index()] -= 1;
                    index = *target;
                    continue;
                }
            }
        }

        index += 1;
    }

    if stack.len() != 1 {
        return Err(EvalFault::FinalStack { size: stack.len() });
    }
    Ok(stack[0] > 0)
}

fn binary<F>(stack: &mut Vec<i64>, f: F) -> Result<(), EvalFault>
where
    F: Fn(i64, i64) -> i64,
{
    let right = stack.pop().ok_or(EvalFault::EmptyStack)?;
    let left = stack.pop().ok_or(EvalFault::EmptyStack)?;
    stack.push(f(left, right));
    Ok(())
}
