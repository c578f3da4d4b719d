//! 文本查询的语法分析器
//!
//! 把文本查询解析成有序的 [`ParseEvent`] 序列，交给构建器折叠成查询描述符。
//!
//! ## 解析流程图
//!
//! ```text
//! parse()
//!   ├─ "count"               → Count
//!   ├─ "first" [N]           → Limit(N)，省略 N 时为 1
//!   ├─ "where"               （可选，忽略）
//!   ├─ parse_predicate()     → Predicate
//!   │    ├─ ["not"]
//!   │    ├─ 属性路径 (Identifier，可带点)
//!   │    ├─ parse_operator()
//!   │    │    ├─ 比较运算符 = != > >= < <=  + parse_value()
//!   │    │    ├─ like / contains / starts with / ends with + parse_value()
//!   │    │    ├─ ["not"] in + 数组或参数
//!   │    │    ├─ between v and v
//!   │    │    └─ is [not] (null | true | false)
//!   │    └─ ["ignore case"]
//!   ├─ ("and" | "or") parse_predicate()  → Connective, Predicate
//!   ├─ "order by" 排序项 ("," 排序项)*   → OrderBy
//!   ├─ "limit" N             → Limit(N)
//!   └─ 输入结束              → End
//! ```
//!
//! 没有括号分组：条件按从左到右的顺序交给构建器合并。
//!
//! ## 解析示例
//!
//! ```text
//! name = :name and age > 18
//! count where status in ["OPEN", "PENDING"]
//! first 10 not city like "Ber%" ignore case order by age desc
//! age between :low and :high or nickname is null limit 5
//! ```

use crate::condition::{Connective, Operator};
use crate::event::{Direction, ParseEvent, Predicate};
use crate::lexer::Lexer;
use crate::token::{Span, Token, TokenKind};
use crate::value::QueryValue;
use thiserror::Error as ThisError;

/// 数组字面量允许的最大嵌套层数
const MAX_NESTING: usize = 32;

pub struct Parser<'a> {
    tokens: &'a [Token<'a>],
    position: usize,
    /// 当前数组嵌套层数
    depth: usize,
}

#[derive(Debug, Clone, PartialEq, ThisError)]
#[error("{message}")]
pub struct ParseError {
    pub message: String,
    pub span: Option<Span>,
}

impl ParseError {
    pub(crate) fn new(message: String, span: Option<Span>) -> Self {
        Self { message, span }
    }

    pub(crate) fn at_position(message: String, span: Span) -> Self {
        Self { message, span: Some(span) }
    }
}

/// 词法分析 + 语法分析
pub fn parse_text(input: &str) -> Result<Vec<ParseEvent>, ParseError> {
    let tokens: Vec<_> = Lexer::new(input).collect();
    if let Some(illegal) = tokens.iter().find(|t| t.kind == TokenKind::Illegal) {
        return Err(ParseError::at_position(
            format!("Illegal input '{}'", &input[illegal.span.start..illegal.span.end]),
            illegal.span,
        ));
    }
    Parser::new(&tokens).parse()
}

impl<'a> Parser<'a> {
    pub fn new(tokens: &'a [Token<'a>]) -> Self {
        Self {
            tokens,
            position: 0,
            depth: 0,
        }
    }

    /// 返回当前 token，不推进位置
    fn peek(&self) -> Option<&'a Token<'a>> {
        self.tokens.get(self.position)
    }

    /// 返回当前 token 并推进位置
    fn advance(&mut self) -> Option<&'a Token<'a>> {
        let token = self.tokens.get(self.position)?;
        self.position += 1;
        Some(token)
    }

    /// 期望特定类型的 token 并推进，否则返回错误
    fn expect(&mut self, expected: TokenKind) -> Result<&'a Token<'a>, ParseError> {
        match self.advance() {
            Some(token) if std::mem::discriminant(&token.kind) == std::mem::discriminant(&expected) => {
                Ok(token)
            }
            Some(token) => Err(ParseError::at_position(
                format!("Expected {:?}, found {:?}", expected, token.kind),
                token.span,
            )),
            None => Err(ParseError::new(
                format!("Expected {:?}, but reached end of input", expected),
                None,
            )),
        }
    }

    /// 检查当前 token 是否匹配给定类型
    fn match_token(&self, kind: &TokenKind) -> bool {
        if let Some(token) = self.peek() {
            std::mem::discriminant(&token.kind) == std::mem::discriminant(kind)
        } else {
            false
        }
    }

    /// 匹配则消费
    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.match_token(kind) {
            self.position += 1;
            true
        } else {
            false
        }
    }

    pub fn parse(&mut self) -> Result<Vec<ParseEvent>, ParseError> {
        let mut events = Vec::new();

        if self.eat(&TokenKind::Count) {
            events.push(ParseEvent::Count);
        }
        let limited = self.eat(&TokenKind::First);
        if limited {
            let limit = if self.match_token(&TokenKind::Number("")) {
                self.parse_count()?
            } else {
                1
            };
            events.push(ParseEvent::Limit(limit));
        }
        self.eat(&TokenKind::Where);

        if !self.at_clause_end() {
            events.push(ParseEvent::Predicate(self.parse_predicate()?));
            loop {
                let connective = if self.eat(&TokenKind::And) {
                    Connective::And
                } else if self.eat(&TokenKind::Or) {
                    Connective::Or
                } else {
                    break;
                };
                events.push(ParseEvent::Connective(connective));
                events.push(ParseEvent::Predicate(self.parse_predicate()?));
            }
        }

        if self.eat(&TokenKind::Order) {
            self.expect(TokenKind::By)?;
            loop {
                events.push(self.parse_sort()?);
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }

        if let Some(token) = self.peek().filter(|token| token.kind == TokenKind::Limit) {
            if limited {
                return Err(ParseError::at_position(
                    "Limit already set by 'first'".to_string(),
                    token.span,
                ));
            }
            self.position += 1;
            events.push(ParseEvent::Limit(self.parse_count()?));
        }

        if let Some(token) = self.peek() {
            return Err(ParseError::at_position(
                format!("Unexpected token: {:?}", token.kind),
                token.span,
            ));
        }
        events.push(ParseEvent::End);
        Ok(events)
    }

    /// 条件部分是否已经结束
    fn at_clause_end(&self) -> bool {
        match self.peek() {
            None => true,
            Some(token) => matches!(token.kind, TokenKind::Order | TokenKind::Limit),
        }
    }

    /// 解析单个条件
    ///
    /// 语法: `[not] attribute operator [ignore case]`
    fn parse_predicate(&mut self) -> Result<Predicate, ParseError> {
        let negated = self.eat(&TokenKind::Not);
        let attribute = self.parse_attribute()?;
        let (operator, value, operator_negated) = self.parse_operator()?;
        let ignore_case = self.parse_ignore_case()?;

        Ok(Predicate::new(attribute, operator)
            .with_value(value)
            .negated(negated != operator_negated)
            .ignore_case(ignore_case))
    }

    /// 属性路径按点拆分成段
    fn parse_attribute(&mut self) -> Result<Vec<String>, ParseError> {
        let (path, span) = match self.advance() {
            Some(Token { kind: TokenKind::Identifier(path), span }) => (*path, *span),
            Some(token) => {
                return Err(ParseError::at_position(
                    format!("Expected attribute, found {:?}", token.kind),
                    token.span,
                ))
            }
            None => {
                return Err(ParseError::new(
                    "Expected attribute, but reached end of input".to_string(),
                    None,
                ))
            }
        };
        if path.split('.').any(str::is_empty) {
            return Err(ParseError::at_position(
                format!("Malformed attribute path '{}'", path),
                span,
            ));
        }
        Ok(path.split('.').map(str::to_string).collect())
    }

    /// 解析运算符及其值，返回 (运算符, 值, 是否取反)
    ///
    /// 运算符前可以有任意个 `not`（not in / not like ...），每个翻转一次。
    fn parse_operator(&mut self) -> Result<(Operator, QueryValue, bool), ParseError> {
        let mut negated = false;
        while self.eat(&TokenKind::Not) {
            negated = !negated;
        }
        let Some(token) = self.advance() else {
            return Err(ParseError::new("Expected operator, but reached end of input".to_string(), None));
        };

        let operator = match &token.kind {
            TokenKind::Eq => Operator::Equals,
            TokenKind::NotEq => {
                negated = !negated;
                Operator::Equals
            }
            TokenKind::Gt => Operator::GreaterThan,
            TokenKind::Gte => Operator::GreaterEquals,
            TokenKind::Lt => Operator::LesserThan,
            TokenKind::Lte => Operator::LesserEquals,
            TokenKind::Like => Operator::Like,
            TokenKind::Contains => Operator::Contains,
            TokenKind::Starts => {
                self.expect(TokenKind::With)?;
                Operator::StartsWith
            }
            TokenKind::Ends => {
                self.expect(TokenKind::With)?;
                Operator::EndsWith
            }
            TokenKind::In => return Ok((Operator::In, self.parse_list()?, negated)),
            TokenKind::Between => {
                let low = self.parse_value()?;
                self.expect(TokenKind::And)?;
                let high = self.parse_value()?;
                return Ok((Operator::Between, QueryValue::array([low, high]), negated));
            }
            TokenKind::Is => {
                if self.eat(&TokenKind::Not) {
                    negated = !negated;
                }
                let value = match self.advance() {
                    Some(Token { kind: TokenKind::Null, .. }) => QueryValue::null(),
                    Some(Token { kind: TokenKind::True, .. }) => QueryValue::boolean(true),
                    Some(Token { kind: TokenKind::False, .. }) => QueryValue::boolean(false),
                    Some(token) => {
                        return Err(ParseError::at_position(
                            format!("Expected null, true or false after 'is', found {:?}", token.kind),
                            token.span,
                        ))
                    }
                    None => {
                        return Err(ParseError::new(
                            "Expected null, true or false after 'is'".to_string(),
                            None,
                        ))
                    }
                };
                return Ok((Operator::Equals, value, negated));
            }
            _ => {
                return Err(ParseError::at_position(
                    format!("Expected operator, found {:?}", token.kind),
                    token.span,
                ))
            }
        };

        Ok((operator, self.parse_value()?, negated))
    }

    /// IN 的右侧：数组字面量或参数
    fn parse_list(&mut self) -> Result<QueryValue, ParseError> {
        match self.peek() {
            Some(Token { kind: TokenKind::LBracket, .. }) => self.parse_value(),
            Some(Token { kind: TokenKind::Parameter(_), .. }) => self.parse_value(),
            Some(token) => Err(ParseError::at_position(
                format!("Expected array or parameter after 'in', found {:?}", token.kind),
                token.span,
            )),
            None => Err(ParseError::new("Expected array or parameter after 'in'".to_string(), None)),
        }
    }

    fn parse_ignore_case(&mut self) -> Result<bool, ParseError> {
        if self.eat(&TokenKind::Ignore) {
            self.expect(TokenKind::Case)?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// 解析排序项
    ///
    /// 语法: `attribute [ignore case] [asc | desc]`
    fn parse_sort(&mut self) -> Result<ParseEvent, ParseError> {
        let attribute = self.parse_attribute()?;
        let ignore_case = self.parse_ignore_case()?;
        let direction = if self.eat(&TokenKind::Desc) {
            Direction::Desc
        } else {
            self.eat(&TokenKind::Asc);
            Direction::Asc
        };
        Ok(ParseEvent::OrderBy { attribute, direction, ignore_case })
    }

    /// 解析正整数 (first N / limit N)
    fn parse_count(&mut self) -> Result<usize, ParseError> {
        let token = self.expect(TokenKind::Number(""))?;
        match token.kind {
            TokenKind::Number(text) => match text.parse::<usize>() {
                Ok(0) => Err(ParseError::at_position("Limit must be at least 1".to_string(), token.span)),
                Ok(count) => Ok(count),
                Err(_) => Err(ParseError::at_position(
                    format!("Expected a positive integer, found {}", text),
                    token.span,
                )),
            },
            _ => Err(ParseError::at_position(
                format!("Expected a number, found {:?}", token.kind),
                token.span,
            )),
        }
    }

    fn parse_value(&mut self) -> Result<QueryValue, ParseError> {
        let Some(token) = self.advance() else {
            return Err(ParseError::new("Expected value".to_string(), None));
        };
        match &token.kind {
            TokenKind::String(s) => Ok(QueryValue::string(*s)),
            TokenKind::Number(n) => parse_number(n, token.span),
            TokenKind::True => Ok(QueryValue::boolean(true)),
            TokenKind::False => Ok(QueryValue::boolean(false)),
            TokenKind::Null => Ok(QueryValue::null()),
            TokenKind::Parameter(name) => Ok(QueryValue::param(*name)),
            TokenKind::LBracket => {
                if self.depth >= MAX_NESTING {
                    return Err(ParseError::at_position(
                        format!("Arrays nested deeper than {} levels", MAX_NESTING),
                        token.span,
                    ));
                }
                self.depth += 1;
                let mut items = Vec::new();

                // 解析逗号分隔的值列表
                if !self.match_token(&TokenKind::RBracket) {
                    loop {
                        items.push(self.parse_value()?);
                        if self.match_token(&TokenKind::RBracket) {
                            break;
                        }
                        self.expect(TokenKind::Comma)?;
                    }
                }

                self.expect(TokenKind::RBracket)?;
                self.depth -= 1;
                Ok(QueryValue::array(items))
            }
            _ => Err(ParseError::at_position(
                format!("Expected literal value, found {:?}", token.kind),
                token.span,
            )),
        }
    }
}

fn parse_number(text: &str, span: Span) -> Result<QueryValue, ParseError> {
    let invalid = || ParseError::at_position(format!("Invalid number {}", text), span);
    if text.contains('.') {
        let value = text.parse::<f64>().map_err(|_| invalid())?;
        let number = serde_json::Number::from_f64(value).ok_or_else(invalid)?;
        Ok(QueryValue::number(number))
    } else {
        text.parse::<i64>().map(QueryValue::number).map_err(|_| invalid())
    }
}
