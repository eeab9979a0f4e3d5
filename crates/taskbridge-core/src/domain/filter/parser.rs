//! Tokenizer and recursive-descent parser for filter expressions.

use std::fmt;

use chrono::{NaiveDate, TimeDelta};

use super::{CompareOp, Condition, DateValue, Field, FilterExpr, Value, ValueType};
use crate::domain::date::parse_wire_lenient;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FilterParseError {
    #[error("filter expression is empty")]
    Empty,

    #[error("unexpected character '{0}' in filter expression")]
    UnexpectedChar(char),

    #[error("unterminated quoted string in filter expression")]
    UnterminatedString,

    #[error("filter expression ended early, expected {0}")]
    UnexpectedEnd(&'static str),

    #[error("unexpected '{found}' in filter expression, expected {expected}")]
    UnexpectedToken {
        found: String,
        expected: &'static str,
    },

    #[error("unknown filter field '{0}'")]
    UnknownField(String),

    #[error("operator '{op}' cannot be used with field '{field}'")]
    UnsupportedOperator {
        field: &'static str,
        op: &'static str,
    },

    #[error("invalid value '{value}' for field '{field}': expected {expected}")]
    InvalidValue {
        field: &'static str,
        value: String,
        expected: &'static str,
    },
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    LParen,
    RParen,
    And,
    Or,
    Comma,
    Op(CompareOp),
    Word(String),
    Quoted(String),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::LParen => f.write_str("("),
            Token::RParen => f.write_str(")"),
            Token::And => f.write_str("&&"),
            Token::Or => f.write_str("||"),
            Token::Comma => f.write_str(","),
            Token::Op(op) => f.write_str(op.as_str()),
            Token::Word(w) => f.write_str(w),
            Token::Quoted(s) => write!(f, "\"{s}\""),
        }
    }
}

fn is_word_char(c: char) -> bool {
    !c.is_whitespace() && !"()<>=!,&|\"'".contains(c)
}

fn tokenize(input: &str) -> Result<Vec<Token>, FilterParseError> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }
        chars.next();
        let token = match c {
            '(' => Token::LParen,
            ')' => Token::RParen,
            ',' => Token::Comma,
            '&' if chars.next_if_eq(&'&').is_some() => Token::And,
            '|' if chars.next_if_eq(&'|').is_some() => Token::Or,
            '=' => {
                chars.next_if_eq(&'=');
                Token::Op(CompareOp::Eq)
            }
            '!' if chars.next_if_eq(&'=').is_some() => Token::Op(CompareOp::Ne),
            '<' if chars.next_if_eq(&'=').is_some() => Token::Op(CompareOp::Le),
            '<' => Token::Op(CompareOp::Lt),
            '>' if chars.next_if_eq(&'=').is_some() => Token::Op(CompareOp::Ge),
            '>' => Token::Op(CompareOp::Gt),
            '"' | '\'' => {
                let mut s = String::new();
                loop {
                    match chars.next() {
                        Some(q) if q == c => break,
                        Some('\\') => match chars.next() {
                            Some(escaped) => s.push(escaped),
                            None => return Err(FilterParseError::UnterminatedString),
                        },
                        Some(other) => s.push(other),
                        None => return Err(FilterParseError::UnterminatedString),
                    }
                }
                Token::Quoted(s)
            }
            c if is_word_char(c) => {
                let mut w = String::from(c);
                while let Some(next) = chars.next_if(|n| is_word_char(*n)) {
                    w.push(next);
                }
                Token::Word(w)
            }
            other => return Err(FilterParseError::UnexpectedChar(other)),
        };
        tokens.push(token);
    }

    Ok(tokens)
}

pub(super) fn parse(input: &str) -> Result<FilterExpr, FilterParseError> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err(FilterParseError::Empty);
    }

    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.parse_or()?;
    match parser.next() {
        None => Ok(expr),
        Some(tok) => Err(FilterParseError::UnexpectedToken {
            found: tok.to_string(),
            expected: "'&&', '||' or end of expression",
        }),
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn expect_next(&mut self, expected: &'static str) -> Result<Token, FilterParseError> {
        self.next().ok_or(FilterParseError::UnexpectedEnd(expected))
    }

    fn parse_or(&mut self) -> Result<FilterExpr, FilterParseError> {
        let mut lhs = self.parse_and()?;
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            let rhs = self.parse_and()?;
            lhs = FilterExpr::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<FilterExpr, FilterParseError> {
        let mut lhs = self.parse_primary()?;
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            let rhs = self.parse_primary()?;
            lhs = FilterExpr::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_primary(&mut self) -> Result<FilterExpr, FilterParseError> {
        if self.peek() == Some(&Token::LParen) {
            self.pos += 1;
            let inner = self.parse_or()?;
            return match self.expect_next("')'")? {
                Token::RParen => Ok(inner),
                other => Err(FilterParseError::UnexpectedToken {
                    found: other.to_string(),
                    expected: "')'",
                }),
            };
        }
        self.parse_condition().map(FilterExpr::Condition)
    }

    fn parse_condition(&mut self) -> Result<Condition, FilterParseError> {
        let field = match self.expect_next("a field name")? {
            Token::Word(name) => {
                Field::lookup(&name).ok_or(FilterParseError::UnknownField(name))?
            }
            other => {
                return Err(FilterParseError::UnexpectedToken {
                    found: other.to_string(),
                    expected: "a field name",
                });
            }
        };

        let op = match self.expect_next("an operator")? {
            Token::Op(op) => op,
            Token::Word(w) if w.eq_ignore_ascii_case("like") => CompareOp::Like,
            Token::Word(w) if w.eq_ignore_ascii_case("in") => CompareOp::In,
            other => {
                return Err(FilterParseError::UnexpectedToken {
                    found: other.to_string(),
                    expected: "an operator (=, !=, >, >=, <, <=, like, in)",
                });
            }
        };
        if !op.allowed_for(field.value_type()) {
            return Err(FilterParseError::UnsupportedOperator {
                field: field.as_str(),
                op: op.as_str(),
            });
        }

        let mut values = vec![self.parse_value(field)?];
        if op == CompareOp::In {
            while self.peek() == Some(&Token::Comma) {
                self.pos += 1;
                values.push(self.parse_value(field)?);
            }
        }

        Ok(Condition { field, op, values })
    }

    fn parse_value(&mut self, field: Field) -> Result<Value, FilterParseError> {
        let raw = match self.expect_next("a value")? {
            Token::Word(w) | Token::Quoted(w) => w,
            other => {
                return Err(FilterParseError::UnexpectedToken {
                    found: other.to_string(),
                    expected: "a value",
                });
            }
        };

        let invalid = |expected: &'static str| FilterParseError::InvalidValue {
            field: field.as_str(),
            value: raw.clone(),
            expected,
        };

        match field.value_type() {
            ValueType::Integer => raw
                .parse::<i64>()
                .map(Value::Integer)
                .map_err(|_| invalid("an integer")),
            ValueType::IdSet => match raw.parse::<i64>() {
                Ok(n) if n >= 1 => Ok(Value::Integer(n)),
                _ => Err(invalid("a positive integer id")),
            },
            ValueType::Boolean => match raw.to_ascii_lowercase().as_str() {
                "true" => Ok(Value::Boolean(true)),
                "false" => Ok(Value::Boolean(false)),
                _ => Err(invalid("true or false")),
            },
            ValueType::Date => parse_date_value(&raw)
                .map(Value::Date)
                .ok_or_else(|| invalid("a date like 2025-10-30T04:05:22.422Z, 2025-10-30 or now+7d")),
            ValueType::Text => Ok(Value::Text(raw.clone())),
        }
    }
}

fn parse_date_value(raw: &str) -> Option<DateValue> {
    let lower = raw.to_ascii_lowercase();
    if let Some(rest) = lower.strip_prefix("now") {
        return parse_offset(rest).map(|offset| DateValue::Relative {
            offset,
            literal: lower.clone(),
        });
    }
    if let Some(t) = parse_wire_lenient(raw) {
        return Some(DateValue::Absolute(t));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| DateValue::Absolute(naive.and_utc()))
}

/// `""`, `+7d`, `-2w`, `+12h`
fn parse_offset(rest: &str) -> Option<TimeDelta> {
    if rest.is_empty() {
        return Some(TimeDelta::zero());
    }
    let (sign, body) = if let Some(body) = rest.strip_prefix('+') {
        (1, body)
    } else if let Some(body) = rest.strip_prefix('-') {
        (-1, body)
    } else {
        return None;
    };
    let unit = body.chars().last()?;
    let amount: i64 = body[..body.len() - unit.len_utf8()].parse().ok()?;
    let delta = match unit {
        'h' => TimeDelta::try_hours(amount)?,
        'd' => TimeDelta::try_days(amount)?,
        'w' => TimeDelta::try_weeks(amount)?,
        _ => return None,
    };
    Some(delta * sign)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn and_binds_tighter_than_or() {
        let expr = parse("done = true || priority > 3 && labels = 2").unwrap();
        match expr {
            FilterExpr::Or(_, rhs) => assert!(matches!(*rhs, FilterExpr::And(..))),
            other => panic!("expected Or at the root, got {other:?}"),
        }
    }

    #[test]
    fn in_takes_a_comma_separated_list() {
        let expr = parse("assignees in 1, 2,3").unwrap();
        let FilterExpr::Condition(c) = expr else {
            panic!("expected a single condition");
        };
        assert_eq!(c.op, CompareOp::In);
        assert_eq!(c.values.len(), 3);
    }

    #[test]
    fn relative_dates_keep_their_literal() {
        let expr = parse("dueDate <= now+2w").unwrap();
        let FilterExpr::Condition(c) = expr else {
            panic!("expected a single condition");
        };
        assert_eq!(
            c.values[0],
            Value::Date(DateValue::Relative {
                offset: TimeDelta::weeks(2),
                literal: "now+2w".to_string(),
            })
        );
    }

    #[test]
    fn quoted_text_values() {
        let expr = parse("title = 'quarterly report'").unwrap();
        let FilterExpr::Condition(c) = expr else {
            panic!("expected a single condition");
        };
        assert_eq!(c.values, vec![Value::Text("quarterly report".to_string())]);
    }

    #[test]
    fn backslash_escapes_inside_quotes() {
        let expr = parse(r#"title = "say \"hi\" it's \\ done""#).unwrap();
        let FilterExpr::Condition(c) = expr else {
            panic!("expected a single condition");
        };
        assert_eq!(c.values, vec![Value::Text(r#"say "hi" it's \ done"#.to_string())]);
    }

    #[rstest]
    #[case::empty("   ", FilterParseError::Empty)]
    #[case::unknown_field("colour = red", FilterParseError::UnknownField("colour".into()))]
    #[case::like_on_number(
        "priority like 3",
        FilterParseError::UnsupportedOperator { field: "priority", op: "like" }
    )]
    #[case::range_on_bool(
        "done > false",
        FilterParseError::UnsupportedOperator { field: "done", op: ">" }
    )]
    #[case::dangling("done =", FilterParseError::UnexpectedEnd("a value"))]
    #[case::unterminated("title = \"abc", FilterParseError::UnterminatedString)]
    #[case::trailing_escape("title = \"abc\\", FilterParseError::UnterminatedString)]
    #[case::single_ampersand("done = true & priority = 1", FilterParseError::UnexpectedChar('&'))]
    fn rejects_malformed_expressions(#[case] input: &str, #[case] expected: FilterParseError) {
        assert_eq!(parse(input).unwrap_err(), expected);
    }

    #[test]
    fn rejects_bad_values_with_expectation() {
        let err = parse("due_date > tomorrow").unwrap_err();
        assert!(matches!(err, FilterParseError::InvalidValue { field: "due_date", .. }));

        let err = parse("labels = 0").unwrap_err();
        assert!(matches!(err, FilterParseError::InvalidValue { field: "labels", .. }));
    }

    #[test]
    fn unbalanced_parenthesis() {
        let err = parse("(done = true").unwrap_err();
        assert_eq!(err, FilterParseError::UnexpectedEnd("')'"));
    }
}
