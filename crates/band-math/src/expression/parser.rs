//! Shunting-yard conversion of tokens to a postfix instruction list.

use super::token::{Function, Operator, Token};
use super::ExpressionError;

/// One postfix (RPN) instruction.
#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    Push(f64),
    /// Load the variable in this slot of the expression's variable list
    Load(usize),
    Binary(Operator),
    Call(Function),
    /// Flip the sign of the top of the stack
    Negate,
}

/// Prefix negation binds tighter than `* /` and looser than `^`, so
/// `-a ^ 2` is `-(a ^ 2)` and `a / -b` divides by `-b`.
const NEGATE_PRECEDENCE: u8 = 3;

enum Pending {
    Operator(Operator),
    Function(Function),
    Negate,
    LParen,
}

/// Pop pending operators and negations down to the nearest `(` or function.
fn flush_operators(stack: &mut Vec<Pending>, output: &mut Vec<Instruction>) {
    loop {
        match stack.last() {
            Some(Pending::Operator(op)) => output.push(Instruction::Binary(*op)),
            Some(Pending::Negate) => output.push(Instruction::Negate),
            _ => break,
        }
        stack.pop();
    }
}

/// Convert infix tokens to RPN.
///
/// Variables are interned into `variables` in order of first appearance and
/// referenced by slot.
pub fn to_postfix(
    tokens: &[Token],
    variables: &mut Vec<String>,
) -> Result<Vec<Instruction>, ExpressionError> {
    let mut output = Vec::with_capacity(tokens.len());
    let mut stack: Vec<Pending> = Vec::new();

    for token in tokens {
        match token {
            Token::Number(n) => output.push(Instruction::Push(*n)),
            Token::Variable(name) => {
                let slot = match variables.iter().position(|v| v == name) {
                    Some(slot) => slot,
                    None => {
                        variables.push(name.clone());
                        variables.len() - 1
                    }
                };
                output.push(Instruction::Load(slot));
            }
            Token::Function(f) => stack.push(Pending::Function(*f)),
            Token::Negate => stack.push(Pending::Negate),
            Token::Comma => {
                flush_operators(&mut stack, &mut output);
                if !matches!(stack.last(), Some(Pending::LParen)) {
                    return Err(ExpressionError::MisplacedComma);
                }
            }
            Token::Operator(op) => {
                loop {
                    let instruction = match stack.last() {
                        Some(Pending::Operator(top)) => {
                            let pops = top.precedence() > op.precedence()
                                || (top.precedence() == op.precedence()
                                    && !op.is_right_associative());
                            if !pops {
                                break;
                            }
                            Instruction::Binary(*top)
                        }
                        Some(Pending::Negate) if NEGATE_PRECEDENCE > op.precedence() => {
                            Instruction::Negate
                        }
                        _ => break,
                    };
                    output.push(instruction);
                    stack.pop();
                }
                stack.push(Pending::Operator(*op));
            }
            Token::LParen => stack.push(Pending::LParen),
            Token::RParen => {
                loop {
                    match stack.pop() {
                        Some(Pending::LParen) => break,
                        Some(Pending::Operator(op)) => output.push(Instruction::Binary(op)),
                        Some(Pending::Function(f)) => output.push(Instruction::Call(f)),
                        Some(Pending::Negate) => output.push(Instruction::Negate),
                        None => return Err(ExpressionError::MismatchedParentheses),
                    }
                }
                if let Some(Pending::Function(f)) = stack.last() {
                    output.push(Instruction::Call(*f));
                    stack.pop();
                }
            }
        }
    }

    while let Some(pending) = stack.pop() {
        match pending {
            Pending::Operator(op) => output.push(Instruction::Binary(op)),
            Pending::Function(f) => output.push(Instruction::Call(f)),
            Pending::Negate => output.push(Instruction::Negate),
            Pending::LParen => return Err(ExpressionError::MismatchedParentheses),
        }
    }

    Ok(output)
}

/// Check that the program leaves exactly one value on the stack and never
/// underflows, without evaluating anything.
pub fn check_stack_depth(program: &[Instruction]) -> Result<(), ExpressionError> {
    let mut depth: usize = 0;
    for instruction in program {
        let pops = match instruction {
            Instruction::Push(_) | Instruction::Load(_) => 0,
            Instruction::Binary(_) => 2,
            Instruction::Call(f) => f.arity(),
            Instruction::Negate => 1,
        };
        if depth < pops {
            let label = match instruction {
                Instruction::Binary(op) => op.symbol().to_string(),
                Instruction::Call(f) => f.name().to_string(),
                Instruction::Negate => "-".to_string(),
                _ => String::new(),
            };
            return Err(ExpressionError::MissingOperand(label));
        }
        depth = depth - pops + 1;
    }
    match depth {
        1 => Ok(()),
        0 => Err(ExpressionError::Empty),
        n => Err(ExpressionError::LeftoverOperands(n)),
    }
}
