//! A small arithmetic language over band aliases.
//!
//! Formulas are compiled once (tokenize, then shunting-yard to RPN) and the
//! resulting program is evaluated once per pixel on a reusable stack.

pub mod parser;
pub mod token;

use std::collections::HashMap;
use thiserror::Error;
use tile_common::TileError;

pub use parser::Instruction;
pub use token::{Function, Operator, Token};

#[derive(Debug, Error)]
pub enum ExpressionError {
    #[error("Unexpected character at position {position}: {character}")]
    UnexpectedCharacter { position: usize, character: char },

    #[error("Invalid number: {0}")]
    InvalidNumber(String),

    #[error("Mismatched parentheses")]
    MismatchedParentheses,

    #[error("Comma outside of a function call")]
    MisplacedComma,

    #[error("Expression is empty")]
    Empty,

    #[error("Not enough operands for '{0}'")]
    MissingOperand(String),

    #[error("Invalid expression: {0} values left on the stack, expected 1")]
    LeftoverOperands(usize),

    #[error("Undefined variable: {0}")]
    UndefinedVariable(String),
}

impl ExpressionError {
    /// Errors raised while compiling, as opposed to evaluating.
    pub fn is_syntax(&self) -> bool {
        !matches!(self, ExpressionError::UndefinedVariable(_))
    }
}

impl From<ExpressionError> for TileError {
    fn from(err: ExpressionError) -> Self {
        match err {
            ExpressionError::UndefinedVariable(alias) => TileError::UnresolvedBandAlias {
                alias,
                available: Vec::new(),
            },
            other => TileError::ExpressionSyntaxError(other.to_string()),
        }
    }
}

/// A formula compiled to postfix form.
#[derive(Debug, Clone)]
pub struct CompiledExpression {
    source: String,
    tokens: Vec<Token>,
    program: Vec<Instruction>,
    variables: Vec<String>,
}

impl CompiledExpression {
    /// Tokenize and compile a formula, rejecting malformed ones up front.
    pub fn compile(source: &str) -> Result<Self, ExpressionError> {
        let tokens = token::tokenize(source)?;
        let mut variables = Vec::new();
        let program = parser::to_postfix(&tokens, &mut variables)?;
        parser::check_stack_depth(&program)?;

        Ok(Self {
            source: source.to_string(),
            tokens,
            program,
            variables,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn program(&self) -> &[Instruction] {
        &self.program
    }

    /// Distinct variable names, in order of first appearance. Slot `i` of
    /// [`evaluate_slots`](Self::evaluate_slots) binds `variables()[i]`.
    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    /// Evaluate with named bindings. Convenient for one-off evaluation.
    pub fn evaluate(&self, bindings: &HashMap<String, f64>) -> Result<f64, ExpressionError> {
        let mut stack = Vec::with_capacity(self.program.len());
        self.execute(&mut stack, |slot| {
            let name = &self.variables[slot];
            bindings
                .get(name)
                .copied()
                .ok_or_else(|| ExpressionError::UndefinedVariable(name.clone()))
        })
    }

    /// Evaluate with positional bindings matching [`variables`](Self::variables).
    ///
    /// This is the per-pixel path: `stack` is reused between calls.
    #[inline]
    pub fn evaluate_slots(&self, values: &[f64], stack: &mut Vec<f64>) -> Result<f64, ExpressionError> {
        self.execute(stack, |slot| {
            values
                .get(slot)
                .copied()
                .ok_or_else(|| ExpressionError::UndefinedVariable(self.variables[slot].clone()))
        })
    }

    fn execute<F>(&self, stack: &mut Vec<f64>, load: F) -> Result<f64, ExpressionError>
    where
        F: Fn(usize) -> Result<f64, ExpressionError>,
    {
        stack.clear();
        for instruction in &self.program {
            match instruction {
                Instruction::Push(n) => stack.push(*n),
                Instruction::Load(slot) => stack.push(load(*slot)?),
                Instruction::Binary(op) => {
                    let (a, b) = pop_two(stack, || op.symbol().to_string())?;
                    stack.push(op.apply(a, b));
                }
                Instruction::Call(f) if f.arity() == 2 => {
                    let (a, b) = pop_two(stack, || f.name().to_string())?;
                    stack.push(f.apply_binary(a, b));
                }
                Instruction::Negate => {
                    let x = stack
                        .pop()
                        .ok_or_else(|| ExpressionError::MissingOperand("-".to_string()))?;
                    stack.push(-x);
                }
                Instruction::Call(f) => {
                    let x = stack
                        .pop()
                        .ok_or_else(|| ExpressionError::MissingOperand(f.name().to_string()))?;
                    stack.push(f.apply_unary(x));
                }
            }
        }

        match stack.len() {
            1 => Ok(stack[0]),
            0 => Err(ExpressionError::Empty),
            n => Err(ExpressionError::LeftoverOperands(n)),
        }
    }
}

fn pop_two(
    stack: &mut Vec<f64>,
    label: impl Fn() -> String,
) -> Result<(f64, f64), ExpressionError> {
    let b = stack.pop().ok_or_else(|| ExpressionError::MissingOperand(label()))?;
    let a = stack.pop().ok_or_else(|| ExpressionError::MissingOperand(label()))?;
    Ok((a, b))
}
