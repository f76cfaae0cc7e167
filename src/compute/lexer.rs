// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Tokenizer for compute programs

use super::ComputeError;

/// Comparison operators usable in `where` stages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    Contains,
}

impl CmpOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            CmpOp::Eq => "==",
            CmpOp::Ne => "!=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Contains => "contains",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Identifier or dotted field path
    Ident(String),
    Number(f64),
    Str(String),
    Cmp(CmpOp),
    Pipe,
    Comma,
    Assign,
    LParen,
    RParen,
    /// Newline or `;`
    Separator,
}

/// A token and the byte offset it starts at
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub offset: usize,
}

/// Split `source` into tokens. `#` starts a comment running to end of line.
pub fn tokenize(source: &str) -> Result<Vec<Spanned>, ComputeError> {
    let chars: Vec<(usize, char)> = source.char_indices().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let (offset, c) = chars[i];
        let peek = chars.get(i + 1).map(|(_, c)| *c);

        let token = match c {
            ' ' | '\t' | '\r' => {
                i += 1;
                continue;
            }
            '#' => {
                while i < chars.len() && chars[i].1 != '\n' {
                    i += 1;
                }
                continue;
            }
            '\n' | ';' => {
                i += 1;
                Token::Separator
            }
            '|' => {
                i += 1;
                Token::Pipe
            }
            ',' => {
                i += 1;
                Token::Comma
            }
            '(' => {
                i += 1;
                Token::LParen
            }
            ')' => {
                i += 1;
                Token::RParen
            }
            '=' if peek == Some('=') => {
                i += 2;
                Token::Cmp(CmpOp::Eq)
            }
            '=' => {
                i += 1;
                Token::Assign
            }
            '!' if peek == Some('=') => {
                i += 2;
                Token::Cmp(CmpOp::Ne)
            }
            '>' if peek == Some('=') => {
                i += 2;
                Token::Cmp(CmpOp::Ge)
            }
            '>' => {
                i += 1;
                Token::Cmp(CmpOp::Gt)
            }
            '<' if peek == Some('=') => {
                i += 2;
                Token::Cmp(CmpOp::Le)
            }
            '<' => {
                i += 1;
                Token::Cmp(CmpOp::Lt)
            }
            '"' | '\'' => {
                let (text, next) = read_string(&chars, i, c)?;
                i = next;
                Token::Str(text)
            }
            c if c.is_ascii_digit()
                || (c == '-' && peek.is_some_and(|p| p.is_ascii_digit())) =>
            {
                let start = i;
                i += 1;
                while i < chars.len() && (chars[i].1.is_ascii_digit() || chars[i].1 == '.') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().map(|(_, c)| c).collect();
                let value = text.parse::<f64>().map_err(|_| ComputeError::Syntax {
                    offset,
                    message: format!("invalid number '{}'", text),
                })?;
                Token::Number(value)
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len()
                    && (chars[i].1.is_alphanumeric() || chars[i].1 == '_' || chars[i].1 == '.')
                {
                    i += 1;
                }
                let word: String = chars[start..i].iter().map(|(_, c)| c).collect();
                if word == "contains" {
                    Token::Cmp(CmpOp::Contains)
                } else {
                    Token::Ident(word.trim_end_matches('.').to_string())
                }
            }
            other => {
                return Err(ComputeError::Syntax {
                    offset,
                    message: format!("unexpected character '{}'", other),
                })
            }
        };

        tokens.push(Spanned { token, offset });
    }

    Ok(tokens)
}

/// Read a quoted string starting at `start`; returns the text and the index
/// after the closing quote.
fn read_string(
    chars: &[(usize, char)],
    start: usize,
    quote: char,
) -> Result<(String, usize), ComputeError> {
    let mut text = String::new();
    let mut i = start + 1;
    while i < chars.len() {
        match chars[i].1 {
            '\\' if i + 1 < chars.len() => {
                let escaped = chars[i + 1].1;
                text.push(match escaped {
                    'n' => '\n',
                    't' => '\t',
                    other => other,
                });
                i += 2;
            }
            c if c == quote => return Ok((text, i + 1)),
            c => {
                text.push(c);
                i += 1;
            }
        }
    }
    Err(ComputeError::Syntax {
        offset: chars[start].0,
        message: "unterminated string".to_string(),
    })
}
