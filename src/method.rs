//! 方法名的语法分析器
//!
//! 把 `findFirst10ByNameAndAgeGreaterThanOrderByNameDesc` 这类方法名解析成有序的
//! [`ParseEvent`] 序列。
//!
//! ## 方法名结构
//!
//! ```text
//! 前缀      find | query | read | get | search | stream | count
//! 主语      任意单词；First / Top [N] 产生 Limit(N)，省略 N 时为 1
//! By        条件部分开始
//! 条件      [Not] 属性[_属性...] [Is] [Not] [关键字] [IgnoreCase]
//!           条件之间用 And / Or 连接
//! OrderBy   属性 [IgnoreCase] [Asc | Desc]，可重复，可用 And 分隔
//! ```
//!
//! 条件关键字（缺省为 Equals）：
//! `GreaterThan`, `GreaterThanEqual`, `LessThan`, `LessThanEqual`, `Like`,
//! `Containing` / `Contains`, `StartingWith` / `StartsWith`,
//! `EndingWith` / `EndsWith`, `In`, `Between`, `Equals`, `True`, `False`, `Null`。

use crate::condition::{Connective, Operator};
use crate::event::{Direction, ParseEvent, Predicate};
use crate::lexer::WordLexer;
use crate::parser::ParseError;
use crate::token::{Span, Token, TokenKind};
use crate::value::QueryValue;

const PREFIXES: &[&str] = &["find", "query", "read", "get", "search", "stream", "count"];

/// 不需要调用参数的条件关键字
#[derive(Debug, Clone, Copy)]
enum Fixed {
    True,
    False,
    Null,
}

impl Fixed {
    fn value(self) -> QueryValue {
        match self {
            Fixed::True => QueryValue::boolean(true),
            Fixed::False => QueryValue::boolean(false),
            Fixed::Null => QueryValue::null(),
        }
    }
}

/// 条件关键字表，同一前缀下较长的写在前面
const KEYWORDS: &[(&[&str], Operator, Option<Fixed>)] = &[
    (&["Greater", "Than", "Equal"], Operator::GreaterEquals, None),
    (&["Greater", "Than"], Operator::GreaterThan, None),
    (&["Less", "Than", "Equal"], Operator::LesserEquals, None),
    (&["Less", "Than"], Operator::LesserThan, None),
    (&["Starting", "With"], Operator::StartsWith, None),
    (&["Starts", "With"], Operator::StartsWith, None),
    (&["Ending", "With"], Operator::EndsWith, None),
    (&["Ends", "With"], Operator::EndsWith, None),
    (&["Containing"], Operator::Contains, None),
    (&["Contains"], Operator::Contains, None),
    (&["Like"], Operator::Like, None),
    (&["In"], Operator::In, None),
    (&["Between"], Operator::Between, None),
    (&["Equals"], Operator::Equals, None),
    (&["True"], Operator::Equals, Some(Fixed::True)),
    (&["False"], Operator::Equals, Some(Fixed::False)),
    (&["Null"], Operator::Equals, Some(Fixed::Null)),
];

/// 词法分析 + 语法分析
pub fn parse_method(name: &str) -> Result<Vec<ParseEvent>, ParseError> {
    let words: Vec<_> = WordLexer::new(name).collect();
    if let Some(illegal) = words.iter().find(|t| t.kind == TokenKind::Illegal) {
        return Err(ParseError::at_position(
            format!("Illegal character '{}' in method name", &name[illegal.span.start..illegal.span.end]),
            illegal.span,
        ));
    }
    MethodParser { input: name, words: &words, position: 0 }.parse()
}

struct MethodParser<'a, 'w> {
    input: &'a str,
    words: &'w [Token<'a>],
    position: usize,
}

impl<'a, 'w> MethodParser<'a, 'w> {
    /// 检查从当前位置开始是否为给定的单词序列
    fn at(&self, sequence: &[&str]) -> bool {
        is_sequence(&self.words[self.position.min(self.words.len())..], sequence)
    }

    fn is_done(&self) -> bool {
        self.position >= self.words.len()
    }

    fn parse(mut self) -> Result<Vec<ParseEvent>, ParseError> {
        let mut events = Vec::new();

        let Some(prefix) = self.words.first() else {
            return Err(ParseError::new("Empty method name".to_string(), None));
        };
        match prefix.kind {
            TokenKind::Identifier(word) if PREFIXES.contains(&word) => {
                if word == "count" {
                    events.push(ParseEvent::Count);
                }
            }
            _ => {
                return Err(ParseError::at_position(
                    format!("Unknown query prefix '{}', expected one of {}", self.text(prefix.span), PREFIXES.join(", ")),
                    prefix.span,
                ))
            }
        }
        self.position = 1;

        // 主语部分，直到 By 或 OrderBy
        let mut limited = false;
        while !self.is_done() && !self.at(&["By"]) && !self.at(&["Order", "By"]) {
            if self.at(&["First"]) || self.at(&["Top"]) {
                let modifier = self.words[self.position].span;
                if limited {
                    return Err(ParseError::at_position("Duplicate First / Top modifier".to_string(), modifier));
                }
                limited = true;
                self.position += 1;
                events.push(ParseEvent::Limit(self.parse_limit(modifier)?));
            } else {
                self.position += 1;
            }
        }

        if self.at(&["By"]) {
            let by = self.words[self.position].span;
            self.position += 1;
            self.parse_criteria(by, &mut events)?;
        }

        if self.at(&["Order", "By"]) {
            let order_by = self.words[self.position].span.to(self.words[self.position + 1].span);
            self.position += 2;
            self.parse_sorts(order_by, &mut events)?;
        }

        events.push(ParseEvent::End);
        Ok(events)
    }

    /// First / Top 之后的可选数字，必须为正数
    fn parse_limit(&mut self, modifier: Span) -> Result<usize, ParseError> {
        match self.words.get(self.position) {
            Some(Token { kind: TokenKind::Number(digits), span }) => {
                self.position += 1;
                match digits.parse::<usize>() {
                    Ok(0) => Err(ParseError::at_position(
                        "Limit must be at least 1".to_string(),
                        modifier.to(*span),
                    )),
                    Ok(limit) => Ok(limit),
                    Err(_) => Err(ParseError::at_position(format!("Limit {} is out of range", digits), *span)),
                }
            }
            _ => Ok(1),
        }
    }

    /// 解析 By 之后的条件，直到 OrderBy 或输入结束
    fn parse_criteria(&mut self, by: Span, events: &mut Vec<ParseEvent>) -> Result<(), ParseError> {
        let mut start = self.position;
        let mut connective = None;
        loop {
            let boundary = if self.is_done() || self.at(&["Order", "By"]) {
                None
            } else if self.at(&["And"]) {
                Some(Connective::And)
            } else if self.at(&["Or"]) {
                Some(Connective::Or)
            } else {
                self.position += 1;
                continue;
            };

            let clause = &self.words[start..self.position];
            if clause.is_empty() {
                let span = self.words.get(self.position).map(|t| t.span).unwrap_or(by);
                return Err(ParseError::at_position("Expected a criterion".to_string(), span));
            }
            if let Some(connective) = connective {
                events.push(ParseEvent::Connective(connective));
            }
            events.push(ParseEvent::Predicate(self.parse_clause(clause)?));

            match boundary {
                Some(next) => {
                    connective = Some(next);
                    self.position += 1;
                    start = self.position;
                }
                None => return Ok(()),
            }
        }
    }

    /// 解析单个条件，例如 `AgeIsNotGreaterThanIgnoreCase`
    fn parse_clause(&self, clause: &[Token<'a>]) -> Result<Predicate, ParseError> {
        let mut words = clause;
        let mut negated = false;

        if words.len() > 1 && is_sequence(words, &["Not"]) {
            negated = true;
            words = &words[1..];
        }
        let (rest, ignore_case) = strip_ignore_case(words);
        words = rest;

        let mut operator = Operator::Equals;
        let mut fixed = None;
        for (keyword, keyword_operator, keyword_fixed) in KEYWORDS {
            if let Some(rest) = strip_suffix(words, keyword) {
                operator = *keyword_operator;
                fixed = *keyword_fixed;
                words = rest;
                break;
            }
        }
        if let Some(rest) = strip_suffix(words, &["Not"]) {
            negated = !negated;
            words = rest;
        }
        if let Some(rest) = strip_suffix(words, &["Is"]) {
            words = rest;
        }

        let attribute = self.parse_path(words)?;
        let predicate = Predicate::new(attribute, operator)
            .negated(negated)
            .ignore_case(ignore_case);
        Ok(match fixed {
            Some(fixed) => predicate.with_value(fixed.value()),
            None => predicate,
        })
    }

    /// 解析 OrderBy 之后的排序项
    fn parse_sorts(&mut self, order_by: Span, events: &mut Vec<ParseEvent>) -> Result<(), ParseError> {
        loop {
            let start = self.position;
            while !self.is_done() && !self.at(&["Asc"]) && !self.at(&["Desc"]) && !self.at(&["And"]) {
                self.position += 1;
            }

            let (words, ignore_case) = strip_ignore_case(&self.words[start..self.position]);
            if words.is_empty() {
                let span = self.words.get(self.position).map(|t| t.span).unwrap_or(order_by);
                return Err(ParseError::at_position("Expected a sort attribute".to_string(), span));
            }
            let attribute = self.parse_path(words)?;

            let direction = if self.at(&["Desc"]) {
                self.position += 1;
                Direction::Desc
            } else {
                if self.at(&["Asc"]) {
                    self.position += 1;
                }
                Direction::Asc
            };
            if self.at(&["And"]) {
                self.position += 1;
            }
            events.push(ParseEvent::OrderBy { attribute, direction, ignore_case });

            if self.is_done() {
                return Ok(());
            }
        }
    }

    /// 以 `_` 分隔属性路径，每段由相邻单词拼接而成
    fn parse_path(&self, words: &[Token<'a>]) -> Result<Vec<String>, ParseError> {
        let mut segments = Vec::new();
        for segment in words.split(|t| t.kind == TokenKind::Underscore) {
            match (segment.first(), segment.last()) {
                (Some(first), Some(last)) => {
                    segments.push(self.text(first.span.to(last.span)).to_string());
                }
                _ => {
                    let span = match (words.first(), words.last()) {
                        (Some(first), Some(last)) => Some(first.span.to(last.span)),
                        _ => None,
                    };
                    return Err(ParseError::new("Expected an attribute name".to_string(), span));
                }
            }
        }
        Ok(segments)
    }

    fn text(&self, span: Span) -> &'a str {
        &self.input[span.start..span.end]
    }
}

fn is_word(token: &Token, word: &str) -> bool {
    matches!(token.kind, TokenKind::Identifier(w) if w == word)
}

fn is_sequence(words: &[Token], sequence: &[&str]) -> bool {
    words.len() >= sequence.len()
        && words.iter().zip(sequence).all(|(token, word)| is_word(token, word))
}

/// 去掉结尾的关键字，但至少保留一个单词作为属性名
fn strip_suffix<'t, 'a>(words: &'t [Token<'a>], keyword: &[&str]) -> Option<&'t [Token<'a>]> {
    if words.len() <= keyword.len() {
        return None;
    }
    let split = words.len() - keyword.len();
    is_sequence(&words[split..], keyword).then(|| &words[..split])
}

fn strip_ignore_case<'t, 'a>(words: &'t [Token<'a>]) -> (&'t [Token<'a>], bool) {
    match strip_suffix(words, &["Ignore", "Case"]).or_else(|| strip_suffix(words, &["Ignoring", "Case"])) {
        Some(rest) => (rest, true),
        None => (words, false),
    }
}
