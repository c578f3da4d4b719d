//! 查询描述符的词法分析器
//!
//! - [`Lexer`]：文本查询，例如 `first 5 name = :name and age > 18 order by age desc`
//! - [`WordLexer`]：方法名，按 camelCase 拆分，例如 `findByNameAndAgeGreaterThan`

use crate::token::{Span, Token, TokenKind};

/// 两个词法分析器共用的字符游标，按字节索引前进
#[derive(Debug, Clone, Copy)]
struct Cursor<'a> {
    input: &'a str,
    position: usize,
}

impl<'a> Cursor<'a> {
    fn new(input: &'a str) -> Self {
        Cursor { input, position: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.input[self.position..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn peek_next(&self) -> Option<char> {
        self.rest().chars().nth(1)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.position += c.len_utf8();
        Some(c)
    }

    /// 消费满足条件的连续字符
    fn bump_while(&mut self, predicate: impl Fn(char) -> bool) {
        while self.peek().is_some_and(&predicate) {
            self.bump();
        }
    }

    /// 从 start 到当前位置的原文
    fn slice(&self, start: usize) -> &'a str {
        &self.input[start..self.position]
    }
}

pub struct Lexer<'a> {
    cursor: Cursor<'a>,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Lexer { cursor: Cursor::new(input) }
    }

    fn token(&self, kind: TokenKind<'a>, start: usize) -> Token<'a> {
        Token { kind, span: Span::new(start, self.cursor.position) }
    }

    /// 读取数字字面量，可带负号和小数部分
    /// 注意：第一个字符（数字或负号）已经被调用者消费
    fn read_number(&mut self, start: usize) -> Token<'a> {
        let cursor = &mut self.cursor;
        cursor.bump_while(|c| c.is_ascii_digit());
        if cursor.peek() == Some('.') && cursor.peek_next().is_some_and(|c| c.is_ascii_digit()) {
            cursor.bump();
            cursor.bump_while(|c| c.is_ascii_digit());
        }
        self.token(TokenKind::Number(self.cursor.slice(start)), start)
    }

    /// 读取引号包围的字符串字面量，单引号和双引号均可
    /// 注意：开始的引号已经被调用者消费
    fn read_string(&mut self, start: usize, quote: char) -> Token<'a> {
        let content_start = self.cursor.position;
        self.cursor.bump_while(|c| c != quote);
        let content = self.cursor.slice(content_start);
        if self.cursor.bump().is_none() {
            // 缺少结束引号
            return self.token(TokenKind::Illegal, start);
        }
        self.token(TokenKind::String(content), start)
    }

    /// 读取 `:name` / `@name` 形式的命名参数
    /// 注意：前缀符号已经被调用者消费
    fn read_parameter(&mut self, start: usize) -> Token<'a> {
        let name_start = self.cursor.position;
        self.cursor.bump_while(|c| c.is_alphanumeric() || c == '_');
        if self.cursor.position == name_start {
            return self.token(TokenKind::Illegal, start);
        }
        self.token(TokenKind::Parameter(self.cursor.slice(name_start)), start)
    }

    /// 读取标识符或关键字
    /// 标识符可以包含字母、数字、下划线和点（属性路径）
    fn read_identifier(&mut self, start: usize) -> Token<'a> {
        self.cursor.bump_while(|c| c.is_alphanumeric() || c == '_' || c == '.');
        self.token(match_keyword(self.cursor.slice(start)), start)
    }
}

fn match_keyword(s: &str) -> TokenKind {
    match s.to_ascii_lowercase().as_str() {
        "count" => TokenKind::Count,
        "first" => TokenKind::First,
        "where" => TokenKind::Where,
        "and" => TokenKind::And,
        "or" => TokenKind::Or,
        "not" => TokenKind::Not,
        "in" => TokenKind::In,
        "is" => TokenKind::Is,
        "null" => TokenKind::Null,
        "true" => TokenKind::True,
        "false" => TokenKind::False,
        "like" => TokenKind::Like,
        "contains" => TokenKind::Contains,
        "starts" => TokenKind::Starts,
        "ends" => TokenKind::Ends,
        "with" => TokenKind::With,
        "between" => TokenKind::Between,
        "order" => TokenKind::Order,
        "by" => TokenKind::By,
        "ignore" => TokenKind::Ignore,
        "case" => TokenKind::Case,
        "asc" => TokenKind::Asc,
        "desc" => TokenKind::Desc,
        "limit" => TokenKind::Limit,
        _ => TokenKind::Identifier(s),
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        self.cursor.bump_while(char::is_whitespace);
        let start = self.cursor.position;

        let Some(c) = self.cursor.bump() else {
            return None; // 到达输入末尾
        };

        let token = match c {
            '=' => self.token(TokenKind::Eq, start),
            '[' => self.token(TokenKind::LBracket, start),
            ']' => self.token(TokenKind::RBracket, start),
            ',' => self.token(TokenKind::Comma, start),
            '<' => {
                if self.cursor.peek() == Some('=') {
                    self.cursor.bump();
                    self.token(TokenKind::Lte, start)
                } else {
                    self.token(TokenKind::Lt, start)
                }
            }
            '>' => {
                if self.cursor.peek() == Some('=') {
                    self.cursor.bump();
                    self.token(TokenKind::Gte, start)
                } else {
                    self.token(TokenKind::Gt, start)
                }
            }
            '!' => {
                if self.cursor.peek() == Some('=') {
                    self.cursor.bump();
                    self.token(TokenKind::NotEq, start)
                } else {
                    self.token(TokenKind::Illegal, start)
                }
            }
            '-' if self.cursor.peek().is_some_and(|c| c.is_ascii_digit()) => self.read_number(start),
            '"' | '\'' => self.read_string(start, c),
            ':' | '@' => self.read_parameter(start),
            c if c.is_ascii_digit() => self.read_number(start),
            c if c.is_alphabetic() || c == '_' => self.read_identifier(start),
            _ => self.token(TokenKind::Illegal, start),
        };
        Some(token)
    }
}

/// 方法名词法分析器
///
/// 按 camelCase 边界切分单词：小写开头的前缀（`find`）、大写开头的单词（`Name`）、
/// 连续大写的缩写（`URLPath` → `URL`, `Path`）、数字串（`Top10` → `Top`, `10`）
/// 以及作为属性路径分隔符的 `_`。
pub struct WordLexer<'a> {
    cursor: Cursor<'a>,
}

impl<'a> WordLexer<'a> {
    pub fn new(input: &'a str) -> Self {
        WordLexer { cursor: Cursor::new(input) }
    }

    /// 读取大写开头的单词
    /// 注意：首字母已经被调用者消费
    fn read_capitalized(&mut self) {
        let cursor = &mut self.cursor;
        if cursor.peek().is_some_and(char::is_uppercase) {
            // 缩写：吃掉连续大写，但保留下一个单词的首字母
            while let Some(c) = cursor.peek() {
                if !c.is_uppercase() || cursor.peek_next().is_some_and(char::is_lowercase) {
                    break;
                }
                cursor.bump();
            }
        } else {
            cursor.bump_while(char::is_lowercase);
        }
    }
}

impl<'a> Iterator for WordLexer<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let start = self.cursor.position;
        let c = self.cursor.bump()?;

        let kind = match c {
            '_' => TokenKind::Underscore,
            c if c.is_ascii_digit() => {
                self.cursor.bump_while(|c| c.is_ascii_digit());
                TokenKind::Number(self.cursor.slice(start))
            }
            c if c.is_uppercase() => {
                self.read_capitalized();
                TokenKind::Identifier(self.cursor.slice(start))
            }
            c if c.is_lowercase() => {
                self.cursor.bump_while(char::is_lowercase);
                TokenKind::Identifier(self.cursor.slice(start))
            }
            _ => TokenKind::Illegal,
        };
        Some(Token { kind, span: Span::new(start, self.cursor.position) })
    }
}
