/// Token types for SQL lexer
use phf::phf_map;

// Perfect hash map for O(1) keyword lookup.
// Type names and aggregate functions are deliberately absent: they stay
// identifiers so columns may be called `date`, `text` or `count`.
static KEYWORDS: phf::Map<&'static str, TokenType> = phf_map! {
    "select" => TokenType::Select,
    "from" => TokenType::From,
    "where" => TokenType::Where,
    "insert" => TokenType::Insert,
    "into" => TokenType::Into,
    "values" => TokenType::Values,
    "update" => TokenType::Update,
    "set" => TokenType::Set,
    "delete" => TokenType::Delete,
    "create" => TokenType::Create,
    "table" => TokenType::Table,
    "index" => TokenType::Index,
    "drop" => TokenType::Drop,
    "if" => TokenType::If,
    "exists" => TokenType::Exists,
    "and" => TokenType::And,
    "or" => TokenType::Or,
    "not" => TokenType::Not,
    "like" => TokenType::Like,
    "is" => TokenType::Is,
    "null" => TokenType::Null,
    "as" => TokenType::As,
    "order" => TokenType::Order,
    "by" => TokenType::By,
    "asc" => TokenType::Asc,
    "desc" => TokenType::Desc,
    "limit" => TokenType::Limit,
    "offset" => TokenType::Offset,
    "distinct" => TokenType::Distinct,
    "group" => TokenType::Group,
    "having" => TokenType::Having,
    "join" => TokenType::Join,
    "left" => TokenType::Left,
    "right" => TokenType::Right,
    "inner" => TokenType::Inner,
    "outer" => TokenType::Outer,
    "on" => TokenType::On,
    "primary" => TokenType::Primary,
    "key" => TokenType::Key,
    "unique" => TokenType::Unique,
    "default" => TokenType::Default,
    "auto_increment" => TokenType::AutoIncrement,
    "show" => TokenType::Show,
    "describe" => TokenType::Describe,
    "tables" => TokenType::Tables,
    "true" => TokenType::True,
    "false" => TokenType::False,
};

#[derive(Debug, Clone, PartialEq)]
pub enum TokenType {
    // Keywords
    Select,
    From,
    Where,
    Insert,
    Into,
    Values,
    Update,
    Set,
    Delete,
    Create,
    Table,
    Index,
    Drop,
    If,
    Exists,
    And,
    Or,
    Not,
    Like,
    Is,
    Null,
    As,
    Order,
    By,
    Asc,
    Desc, // DESC (ordering) or DESCRIBE shorthand
    Limit,
    Offset,
    Distinct,
    Group,
    Having,
    Join,
    Left,
    Right,
    Inner,
    Outer,
    On,
    Primary,
    Key,
    Unique,
    Default,
    AutoIncrement,
    Show,
    Describe,
    Tables,
    True,
    False,

    // Operators
    Eq,    // =
    Ne,    // != or <>
    Lt,    // <
    Gt,    // >
    Le,    // <=
    Ge,    // >=
    Plus,  // +
    Minus, // -
    Star,  // *

    // Punctuation
    LParen,    // (
    RParen,    // )
    Comma,     // ,
    Semicolon, // ;
    Dot,       // .

    // Literals
    Number(String),
    String(String),
    Identifier(String),

    Eof,
}

/// Coarse token classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Keyword,
    Identifier,
    String,
    Number,
    Operator,
    Punctuation,
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub token_type: TokenType,
    /// Normalized text: uppercased keyword, unescaped string body, digits
    pub text: String,
    /// Byte offset of the first character in the source
    pub offset: usize,
    /// Byte offset one past the last character
    pub end: usize,
}

impl Token {
    pub fn new(token_type: TokenType, text: String, offset: usize, end: usize) -> Self {
        Self {
            token_type,
            text,
            offset,
            end,
        }
    }

    pub fn kind(&self) -> TokenKind {
        self.token_type.kind()
    }

    /// Source text exactly as written
    pub fn raw<'a>(&self, source: &'a str) -> &'a str {
        &source[self.offset..self.end]
    }
}

impl TokenType {
    /// Check if this word is a keyword (case-insensitive perfect hash lookup)
    pub fn from_keyword(s: &str) -> Option<Self> {
        let lowercase = s.to_ascii_lowercase();
        KEYWORDS.get(lowercase.as_str()).cloned()
    }

    pub fn kind(&self) -> TokenKind {
        match self {
            TokenType::Eq
            | TokenType::Ne
            | TokenType::Lt
            | TokenType::Gt
            | TokenType::Le
            | TokenType::Ge
            | TokenType::Plus
            | TokenType::Minus
            | TokenType::Star => TokenKind::Operator,
            TokenType::LParen
            | TokenType::RParen
            | TokenType::Comma
            | TokenType::Semicolon
            | TokenType::Dot => TokenKind::Punctuation,
            TokenType::Number(_) => TokenKind::Number,
            TokenType::String(_) => TokenKind::String,
            TokenType::Identifier(_) => TokenKind::Identifier,
            TokenType::Eof => TokenKind::Eof,
            _ => TokenKind::Keyword,
        }
    }

    /// Human-readable form used in parse errors
    pub fn describe(&self) -> String {
        match self {
            TokenType::Number(n) => format!("number {}", n),
            TokenType::String(s) => format!("string '{}'", s),
            TokenType::Identifier(i) => format!("identifier '{}'", i),
            TokenType::Eof => "end of input".to_string(),
            TokenType::Eq => "'='".to_string(),
            TokenType::Ne => "'!='".to_string(),
            TokenType::Lt => "'<'".to_string(),
            TokenType::Gt => "'>'".to_string(),
            TokenType::Le => "'<='".to_string(),
            TokenType::Ge => "'>='".to_string(),
            TokenType::Plus => "'+'".to_string(),
            TokenType::Minus => "'-'".to_string(),
            TokenType::Star => "'*'".to_string(),
            TokenType::LParen => "'('".to_string(),
            TokenType::RParen => "')'".to_string(),
            TokenType::Comma => "','".to_string(),
            TokenType::Semicolon => "';'".to_string(),
            TokenType::Dot => "'.'".to_string(),
            keyword => format!("{:?}", keyword).to_uppercase(),
        }
    }
}
