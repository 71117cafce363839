//! Tokenizer for band-algebra formulas.

use super::ExpressionError;

/// Binary arithmetic operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

impl Operator {
    fn from_char(c: char) -> Option<Self> {
        match c {
            '+' => Some(Operator::Add),
            '-' => Some(Operator::Sub),
            '*' => Some(Operator::Mul),
            '/' => Some(Operator::Div),
            '^' => Some(Operator::Pow),
            _ => None,
        }
    }

    /// Binding strength. Prefix negation sits between `* /` and `^`.
    pub fn precedence(&self) -> u8 {
        match self {
            Operator::Add | Operator::Sub => 1,
            Operator::Mul | Operator::Div => 2,
            Operator::Pow => 4,
        }
    }

    pub fn is_right_associative(&self) -> bool {
        matches!(self, Operator::Pow)
    }

    /// Apply to two operands. Division by zero yields 0.
    pub fn apply(&self, a: f64, b: f64) -> f64 {
        match self {
            Operator::Add => a + b,
            Operator::Sub => a - b,
            Operator::Mul => a * b,
            Operator::Div => {
                if b == 0.0 {
                    0.0
                } else {
                    a / b
                }
            }
            Operator::Pow => a.powf(b),
        }
    }

    pub fn symbol(&self) -> char {
        match self {
            Operator::Add => '+',
            Operator::Sub => '-',
            Operator::Mul => '*',
            Operator::Div => '/',
            Operator::Pow => '^',
        }
    }
}

/// Built-in functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    Sqrt,
    Abs,
    Log,
    Log10,
    Exp,
    Sin,
    Cos,
    Tan,
    Min,
    Max,
}

impl Function {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "sqrt" => Some(Function::Sqrt),
            "abs" => Some(Function::Abs),
            "log" => Some(Function::Log),
            "log10" => Some(Function::Log10),
            "exp" => Some(Function::Exp),
            "sin" => Some(Function::Sin),
            "cos" => Some(Function::Cos),
            "tan" => Some(Function::Tan),
            "min" => Some(Function::Min),
            "max" => Some(Function::Max),
            _ => None,
        }
    }

    pub fn arity(&self) -> usize {
        match self {
            Function::Min | Function::Max => 2,
            _ => 1,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Function::Sqrt => "sqrt",
            Function::Abs => "abs",
            Function::Log => "log",
            Function::Log10 => "log10",
            Function::Exp => "exp",
            Function::Sin => "sin",
            Function::Cos => "cos",
            Function::Tan => "tan",
            Function::Min => "min",
            Function::Max => "max",
        }
    }

    pub fn apply_unary(&self, x: f64) -> f64 {
        match self {
            Function::Sqrt => x.sqrt(),
            Function::Abs => x.abs(),
            Function::Log => x.ln(),
            Function::Log10 => x.log10(),
            Function::Exp => x.exp(),
            Function::Sin => x.sin(),
            Function::Cos => x.cos(),
            Function::Tan => x.tan(),
            Function::Min | Function::Max => f64::NAN,
        }
    }

    pub fn apply_binary(&self, a: f64, b: f64) -> f64 {
        match self {
            Function::Min => a.min(b),
            Function::Max => a.max(b),
            _ => f64::NAN,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Number(f64),
    /// Lower-cased identifier that is not a function name
    Variable(String),
    Operator(Operator),
    Function(Function),
    /// Prefix minus in front of anything but a number literal
    Negate,
    LParen,
    RParen,
    Comma,
}

impl Token {
    /// True when the next token must start an operand, which is where a
    /// leading `-` is a sign rather than subtraction.
    fn expects_operand(prev: Option<&Token>) -> bool {
        matches!(
            prev,
            None | Some(Token::Operator(_))
                | Some(Token::Negate)
                | Some(Token::LParen)
                | Some(Token::Comma)
        )
    }
}

/// Split a formula into tokens.
///
/// A `-` in operand position is a sign: it is folded into a following number
/// literal, and becomes a prefix [`Token::Negate`] before anything else.
pub fn tokenize(source: &str) -> Result<Vec<Token>, ExpressionError> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens: Vec<Token> = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if c.is_whitespace() {
            i += 1;
            continue;
        }

        let starts_number = |at: usize| {
            chars.get(at).is_some_and(|c| c.is_ascii_digit())
                || (chars.get(at) == Some(&'.')
                    && chars.get(at + 1).is_some_and(|c| c.is_ascii_digit()))
        };

        if c == '-' && Token::expects_operand(tokens.last()) {
            if starts_number(i + 1) {
                let (value, next) = read_number(&chars, i + 1)?;
                tokens.push(Token::Number(-value));
                i = next;
            } else {
                tokens.push(Token::Negate);
                i += 1;
            }
            continue;
        }

        if starts_number(i) {
            let (value, next) = read_number(&chars, i)?;
            tokens.push(Token::Number(value));
            i = next;
            continue;
        }

        if let Some(op) = Operator::from_char(c) {
            tokens.push(Token::Operator(op));
            i += 1;
            continue;
        }

        match c {
            '(' => tokens.push(Token::LParen),
            ')' => tokens.push(Token::RParen),
            ',' => tokens.push(Token::Comma),
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let ident: String = chars[start..i].iter().collect::<String>().to_lowercase();
                match Function::from_name(&ident) {
                    Some(f) => tokens.push(Token::Function(f)),
                    None => tokens.push(Token::Variable(ident)),
                }
                continue;
            }
            other => {
                return Err(ExpressionError::UnexpectedCharacter {
                    position: i,
                    character: other,
                })
            }
        }
        i += 1;
    }

    Ok(tokens)
}

fn read_number(chars: &[char], start: usize) -> Result<(f64, usize), ExpressionError> {
    let mut end = start;
    while end < chars.len() && (chars[end].is_ascii_digit() || chars[end] == '.') {
        end += 1;
    }
    let literal: String = chars[start..end].iter().collect();
    let value = literal
        .parse::<f64>()
        .map_err(|_| ExpressionError::InvalidNumber(literal.clone()))?;
    Ok((value, end))
}
