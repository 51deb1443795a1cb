//! Arithmetic for calculator displays
//!
//! Grammar, lowest precedence first:
//!
//! ```text
//! expr   := term (('+' | '-') term)*
//! term   := unary (('*' | '/') unary)*
//! unary  := '-' unary | '+' unary | atom
//! atom   := number | '(' expr ')'
//! ```
//!
//! `×`, `÷` and `−` are accepted as their ASCII equivalents.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExprError {
    #[error("unexpected character '{0}'")]
    UnexpectedChar(char),

    #[error("unexpected end of expression")]
    UnexpectedEnd,

    #[error("invalid number '{0}'")]
    InvalidNumber(String),

    #[error("division by zero")]
    DivisionByZero,

    #[error("trailing input after expression")]
    Trailing,

    #[error("parentheses nested deeper than {MAX_NESTING}")]
    TooDeep,
}

/// Deepest parenthesis nesting [`evaluate`] accepts
pub const MAX_NESTING: usize = 256;

/// Evaluate an expression
pub fn evaluate(source: &str) -> Result<f64, ExprError> {
    let normalized: Vec<char> = source
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| match c {
            '×' | 'x' => '*',
            '÷' => '/',
            '−' => '-',
            other => other,
        })
        .collect();

    let mut parser = Parser {
        chars: &normalized,
        pos: 0,
        depth: 0,
    };
    let value = parser.expr()?;
    if parser.pos != normalized.len() {
        return Err(ExprError::Trailing);
    }
    if !value.is_finite() {
        return Err(ExprError::DivisionByZero);
    }
    Ok(value)
}

/// Render a result the way a calculator display shows it
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        let text = format!("{:.10}", value);
        text.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

struct Parser<'a> {
    chars: &'a [char],
    pos: usize,
    depth: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn expr(&mut self) -> Result<f64, ExprError> {
        let mut value = self.term()?;
        while let Some(op) = self.peek() {
            match op {
                '+' => {
                    self.pos += 1;
                    value += self.term()?;
                }
                '-' => {
                    self.pos += 1;
                    value -= self.term()?;
                }
                _ => break,
            }
        }
        Ok(value)
    }

    fn term(&mut self) -> Result<f64, ExprError> {
        let mut value = self.unary()?;
        while let Some(op) = self.peek() {
            match op {
                '*' => {
                    self.pos += 1;
                    value *= self.unary()?;
                }
                '/' => {
                    self.pos += 1;
                    let divisor = self.unary()?;
                    if divisor == 0.0 {
                        return Err(ExprError::DivisionByZero);
                    }
                    value /= divisor;
                }
                _ => break,
            }
        }
        Ok(value)
    }

    fn unary(&mut self) -> Result<f64, ExprError> {
        let mut negate = false;
        while let Some(sign @ ('-' | '+')) = self.peek() {
            self.pos += 1;
            negate ^= sign == '-';
        }
        let value = self.atom()?;
        Ok(if negate { -value } else { value })
    }

    fn atom(&mut self) -> Result<f64, ExprError> {
        match self.peek() {
            None => Err(ExprError::UnexpectedEnd),
            Some('(') => {
                if self.depth == MAX_NESTING {
                    return Err(ExprError::TooDeep);
                }
                self.pos += 1;
                self.depth += 1;
                let value = self.expr()?;
                self.depth -= 1;
                match self.peek() {
                    Some(')') => {
                        self.pos += 1;
                        Ok(value)
                    }
                    Some(c) => Err(ExprError::UnexpectedChar(c)),
                    None => Err(ExprError::UnexpectedEnd),
                }
            }
            Some(c) if c.is_ascii_digit() || c == '.' => self.number(),
            Some(c) => Err(ExprError::UnexpectedChar(c)),
        }
    }

    fn number(&mut self) -> Result<f64, ExprError> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() || c == '.' {
                self.pos += 1;
            } else {
                break;
            }
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        text.parse().map_err(|_| ExprError::InvalidNumber(text))
    }
}
