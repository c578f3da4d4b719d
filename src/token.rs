//! The token definition shared by the textual query lexer and the method-name lexer.

/// A token is a single unit of the language, with a specific kind and location.
#[derive(Debug, Clone, PartialEq)]
pub struct Token<'a> {
    pub kind: TokenKind<'a>,
    pub span: Span,
}

/// The kind of a token.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind<'a> {
    // Keywords
    Count,   // "count"
    First,   // "first"
    Where,   // "where"
    And,     // "and"
    Or,      // "or"
    Not,     // "not"
    In,      // "in"
    Is,      // "is"
    Null,    // "null"
    True,    // "true"
    False,   // "false"
    Like,    // "like"
    Contains, // "contains"
    Starts,  // "starts"
    Ends,    // "ends"
    With,    // "with"
    Between, // "between"
    Order,   // "order"
    By,      // "by"
    Ignore,  // "ignore"
    Case,    // "case"
    Asc,     // "asc"
    Desc,    // "desc"
    Limit,   // "limit"

    // Literals
    /// An attribute path such as `address.zipCode`, or one camelCase word of a method name.
    Identifier(&'a str),
    /// The string contents, without quotes.
    String(&'a str),
    /// The raw number text, e.g. `-12` or `3.5`.
    Number(&'a str),
    /// A named parameter, without its `:` / `@` sigil.
    Parameter(&'a str),

    // Punctuation
    LBracket,   // [
    RBracket,   // ]
    Comma,      // ,
    Underscore, // _ (method names only)

    // Operators
    Eq,    // =
    NotEq, // !=
    Gt,    // >
    Lt,    // <
    Gte,   // >=
    Lte,   // <=

    // Special
    Illegal, // An illegal/unknown character, or an unterminated string
}

/// Represents a span in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    /// The starting byte offset.
    pub start: usize,
    /// The ending byte offset.
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// The smallest span covering both `self` and `other`.
    pub fn to(self, other: Span) -> Span {
        Span::new(self.start.min(other.start), self.end.max(other.end))
    }
}
