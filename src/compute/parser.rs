// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Parser for compute programs
//!
//! ```text
//! program   := statement (SEP statement)*
//! statement := "let" IDENT "=" pipeline | pipeline
//! pipeline  := expr ("|" stage)*
//! expr      := IDENT | NUMBER | STRING | IDENT "(" [NUMBER] ")"
//! ```
//!
//! A line starting with `|` continues the pipeline on the previous line.

use serde_json::Value;

use super::lexer::{tokenize, CmpOp, Spanned, Token};
use super::ComputeError;

/// Built-in value functions
#[derive(Debug, Clone, PartialEq)]
pub enum Func {
    /// RFC 3339 timestamp `n` days before now
    DaysAgo(f64),
    /// Midnight UTC today
    Today,
    /// Current instant
    Now,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Var(String),
    Value(Value),
    Call(Func),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggKind {
    Sum,
    Avg,
    Min,
    Max,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GroupAgg {
    Count,
    Sum(String),
    Avg(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    Where { path: String, op: CmpOp, rhs: Expr },
    Select(Vec<String>),
    SortBy { path: String, descending: bool },
    Take(usize),
    Flatten(String),
    Distinct(Option<String>),
    Count,
    Aggregate { kind: AggKind, path: Option<String> },
    GroupBy { path: String, agg: GroupAgg },
    Table(Vec<String>),
    Keys,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Pipeline {
    pub source: Expr,
    pub stages: Vec<Stage>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Let { name: String, pipeline: Pipeline },
    Eval(Pipeline),
}

/// Parse a whole program.
pub fn parse(source: &str) -> Result<Vec<Statement>, ComputeError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        end: source.len(),
    };
    parser.program()
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    end: usize,
}

impl Parser {
    fn program(&mut self) -> Result<Vec<Statement>, ComputeError> {
        let mut statements = Vec::new();
        loop {
            self.skip_separators();
            if self.at_end() {
                break;
            }
            statements.push(self.statement()?);
            match self.peek() {
                None | Some(Token::Separator) => {}
                Some(other) => {
                    let message = format!("unexpected {} after statement", describe(other));
                    return Err(self.error(message));
                }
            }
        }
        if statements.is_empty() {
            return Err(ComputeError::Empty);
        }
        Ok(statements)
    }

    fn statement(&mut self) -> Result<Statement, ComputeError> {
        if matches!(self.peek(), Some(Token::Ident(word)) if word == "let") {
            self.pos += 1;
            let name = self.ident("variable name after 'let'")?;
            if name.contains('.') {
                return Err(self.error(format!("invalid variable name '{}'", name)));
            }
            self.expect(Token::Assign, "'=' after variable name")?;
            let pipeline = self.pipeline()?;
            return Ok(Statement::Let { name, pipeline });
        }
        Ok(Statement::Eval(self.pipeline()?))
    }

    fn pipeline(&mut self) -> Result<Pipeline, ComputeError> {
        let source = self.expr()?;
        let mut stages = Vec::new();
        loop {
            let mut lookahead = self.pos;
            while matches!(self.tokens.get(lookahead).map(|s| &s.token), Some(Token::Separator)) {
                lookahead += 1;
            }
            if !matches!(self.tokens.get(lookahead).map(|s| &s.token), Some(Token::Pipe)) {
                break;
            }
            self.pos = lookahead + 1;
            stages.push(self.stage()?);
        }
        Ok(Pipeline { source, stages })
    }

    fn expr(&mut self) -> Result<Expr, ComputeError> {
        match self.next() {
            Some(Token::Number(n)) => Ok(Expr::Value(number(n))),
            Some(Token::Str(s)) => Ok(Expr::Value(Value::String(s))),
            Some(Token::Ident(word)) => {
                if matches!(self.peek(), Some(Token::LParen)) {
                    self.pos += 1;
                    return self.call(&word);
                }
                Ok(match word.as_str() {
                    "true" => Expr::Value(Value::Bool(true)),
                    "false" => Expr::Value(Value::Bool(false)),
                    "null" | "None" => Expr::Value(Value::Null),
                    _ => Expr::Var(word),
                })
            }
            Some(other) => Err(self.error_before(format!(
                "expected a value or variable, found {}",
                describe(&other)
            ))),
            None => Err(self.error("expected a value or variable".to_string())),
        }
    }

    fn call(&mut self, name: &str) -> Result<Expr, ComputeError> {
        let func = match name {
            "days_ago" => {
                let days = match self.next() {
                    Some(Token::Number(n)) => n,
                    _ => return Err(self.error_before("days_ago expects a number".to_string())),
                };
                Func::DaysAgo(days)
            }
            "today" => Func::Today,
            "now" => Func::Now,
            other => return Err(self.error_before(format!("unknown function '{}'", other))),
        };
        self.expect(Token::RParen, "')'")?;
        Ok(Expr::Call(func))
    }

    fn stage(&mut self) -> Result<Stage, ComputeError> {
        let name = self.ident("stage name after '|'")?;
        let stage = match name.as_str() {
            "where" | "filter" => {
                let path = self.ident("field after 'where'")?;
                let op = match self.next() {
                    Some(Token::Cmp(op)) => op,
                    _ => {
                        return Err(self.error_before(
                            "expected a comparison (== != > >= < <= contains)".to_string(),
                        ))
                    }
                };
                let rhs = match self.expr()? {
                    // Bare words on the right-hand side are string literals.
                    Expr::Var(word) => Expr::Value(Value::String(word)),
                    other => other,
                };
                Stage::Where { path, op, rhs }
            }
            "select" => Stage::Select(self.path_list(true)?),
            "sort_by" | "sort" => {
                let path = self.ident("field after 'sort_by'")?;
                let descending = match self.peek() {
                    Some(Token::Ident(dir)) if dir == "desc" => {
                        self.pos += 1;
                        true
                    }
                    Some(Token::Ident(dir)) if dir == "asc" => {
                        self.pos += 1;
                        false
                    }
                    _ => false,
                };
                Stage::SortBy { path, descending }
            }
            "take" | "head" | "limit" => match self.next() {
                Some(Token::Number(n)) if n >= 0.0 => Stage::Take(n as usize),
                _ => return Err(self.error_before("take expects a count".to_string())),
            },
            "flatten" => Stage::Flatten(self.ident("field after 'flatten'")?),
            "distinct" | "unique" => Stage::Distinct(self.optional_path()),
            "count" | "len" => Stage::Count,
            "sum" => self.aggregate(AggKind::Sum),
            "avg" | "mean" => self.aggregate(AggKind::Avg),
            "min" => self.aggregate(AggKind::Min),
            "max" => self.aggregate(AggKind::Max),
            "group_by" => {
                let path = self.ident("field after 'group_by'")?;
                let agg = match self.peek() {
                    Some(Token::Ident(word)) if word == "count" => {
                        self.pos += 1;
                        GroupAgg::Count
                    }
                    Some(Token::Ident(word)) if word == "sum" => {
                        self.pos += 1;
                        GroupAgg::Sum(self.ident("field after 'sum'")?)
                    }
                    Some(Token::Ident(word)) if word == "avg" || word == "mean" => {
                        self.pos += 1;
                        GroupAgg::Avg(self.ident("field after 'avg'")?)
                    }
                    _ => GroupAgg::Count,
                };
                Stage::GroupBy { path, agg }
            }
            "table" => Stage::Table(self.path_list(false)?),
            "keys" | "columns" => Stage::Keys,
            other => return Err(ComputeError::UnknownStage(other.to_string())),
        };
        Ok(stage)
    }

    fn aggregate(&mut self, kind: AggKind) -> Stage {
        Stage::Aggregate {
            kind,
            path: self.optional_path(),
        }
    }

    fn optional_path(&mut self) -> Option<String> {
        match self.peek() {
            Some(Token::Ident(word)) => {
                let word = word.clone();
                self.pos += 1;
                Some(word)
            }
            _ => None,
        }
    }

    fn path_list(&mut self, required: bool) -> Result<Vec<String>, ComputeError> {
        let mut paths = Vec::new();
        if !required && !matches!(self.peek(), Some(Token::Ident(_))) {
            return Ok(paths);
        }
        paths.push(self.ident("field name")?);
        while matches!(self.peek(), Some(Token::Comma)) {
            self.pos += 1;
            paths.push(self.ident("field name after ','")?);
        }
        Ok(paths)
    }

    fn ident(&mut self, what: &str) -> Result<String, ComputeError> {
        match self.next() {
            Some(Token::Ident(word)) => Ok(word),
            Some(Token::Str(word)) => Ok(word),
            _ => Err(self.error_before(format!("expected {}", what))),
        }
    }

    fn expect(&mut self, expected: Token, what: &str) -> Result<(), ComputeError> {
        match self.next() {
            Some(token) if token == expected => Ok(()),
            _ => Err(self.error_before(format!("expected {}", what))),
        }
    }

    fn skip_separators(&mut self) {
        while matches!(self.peek(), Some(Token::Separator)) {
            self.pos += 1;
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|s| &s.token)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|s| s.token.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn offset_at(&self, pos: usize) -> usize {
        self.tokens.get(pos).map(|s| s.offset).unwrap_or(self.end)
    }

    fn error(&self, message: String) -> ComputeError {
        ComputeError::Syntax {
            offset: self.offset_at(self.pos),
            message,
        }
    }

    /// Error pointing at the token just consumed.
    fn error_before(&self, message: String) -> ComputeError {
        ComputeError::Syntax {
            offset: self.offset_at(self.pos.saturating_sub(1)),
            message,
        }
    }
}

fn describe(token: &Token) -> String {
    match token {
        Token::Ident(word) => format!("'{}'", word),
        Token::Number(n) => format!("number {}", n),
        Token::Str(s) => format!("string \"{}\"", s),
        Token::Cmp(op) => format!("'{}'", op.symbol()),
        Token::Pipe => "'|'".to_string(),
        Token::Comma => "','".to_string(),
        Token::Assign => "'='".to_string(),
        Token::LParen => "'('".to_string(),
        Token::RParen => "')'".to_string(),
        Token::Separator => "end of statement".to_string(),
    }
}

/// Integral literals stay integers so they print without a fraction.
fn number(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < 9.0e15 {
        Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn single(source: &str) -> Pipeline {
        match parse(source).unwrap().remove(0) {
            Statement::Eval(p) => p,
            other => panic!("expected pipeline, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_simple_pipeline() {
        let p = single("shopify_data | avg total_price");
        assert_eq!(p.source, Expr::Var("shopify_data".into()));
        assert_eq!(
            p.stages,
            vec![Stage::Aggregate {
                kind: AggKind::Avg,
                path: Some("total_price".into())
            }]
        );
    }

    #[test]
    fn test_parse_let_and_multiline_continuation() {
        let statements = parse(
            "let items = orders_data\n  | flatten line_items\n  | group_by title sum quantity\nitems | take 3",
        )
        .unwrap();
        assert_eq!(statements.len(), 2);
        match &statements[0] {
            Statement::Let { name, pipeline } => {
                assert_eq!(name, "items");
                assert_eq!(pipeline.stages.len(), 2);
                assert_eq!(
                    pipeline.stages[1],
                    Stage::GroupBy {
                        path: "title".into(),
                        agg: GroupAgg::Sum("quantity".into())
                    }
                );
            }
            other => panic!("expected let, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_where_with_function_and_bare_word() {
        let p = single("orders | where created_at >= days_ago(7) | where status == paid");
        assert_eq!(
            p.stages[0],
            Stage::Where {
                path: "created_at".into(),
                op: CmpOp::Ge,
                rhs: Expr::Call(Func::DaysAgo(7.0))
            }
        );
        assert_eq!(
            p.stages[1],
            Stage::Where {
                path: "status".into(),
                op: CmpOp::Eq,
                rhs: Expr::Value(json!("paid"))
            }
        );
    }

    #[test]
    fn test_parse_sort_select_table() {
        let p = single("rows | sort_by value desc | select key, value | table key, value");
        assert_eq!(
            p.stages[0],
            Stage::SortBy {
                path: "value".into(),
                descending: true
            }
        );
        assert_eq!(p.stages[1], Stage::Select(vec!["key".into(), "value".into()]));
        assert_eq!(p.stages[2], Stage::Table(vec!["key".into(), "value".into()]));
    }

    #[test]
    fn test_parse_group_by_defaults_to_count() {
        let p = single("orders | group_by customer.id | where value > 1 | count");
        assert_eq!(
            p.stages[0],
            Stage::GroupBy {
                path: "customer.id".into(),
                agg: GroupAgg::Count
            }
        );
        assert_eq!(p.stages[2], Stage::Count);
    }

    #[test]
    fn test_parse_unknown_stage() {
        let err = parse("orders | explode").unwrap_err();
        assert!(matches!(err, ComputeError::UnknownStage(ref s) if s == "explode"));
    }

    #[test]
    fn test_parse_empty_program() {
        assert!(matches!(parse("  \n# nothing\n").unwrap_err(), ComputeError::Empty));
    }

    #[test]
    fn test_parse_trailing_garbage() {
        let err = parse("orders count").unwrap_err();
        assert!(err.to_string().contains("unexpected 'count'"));
    }

    #[test]
    fn test_parse_literal_sources() {
        assert_eq!(single("42").source, Expr::Value(json!(42)));
        assert_eq!(single("2.5").source, Expr::Value(json!(2.5)));
        assert_eq!(single("\"hi\"").source, Expr::Value(json!("hi")));
        assert_eq!(single("today()").source, Expr::Call(Func::Today));
    }
}
