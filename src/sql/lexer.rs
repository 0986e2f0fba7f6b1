/// SQL Lexer - converts SQL string into tokens

use super::token::{Token, TokenType};
use crate::error::{EngineError, Result};

pub struct Lexer {
    /// (byte offset, char) pairs of the source
    input: Vec<(usize, char)>,
    source_len: usize,
    position: usize,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        Self {
            input: input.char_indices().collect(),
            source_len: input.len(),
            position: 0,
        }
    }

    pub fn tokenize(&mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();

        loop {
            let token = self.next_token()?;
            let is_eof = matches!(token.token_type, TokenType::Eof);
            tokens.push(token);
            if is_eof {
                break;
            }
        }

        Ok(tokens)
    }

    pub fn next_token(&mut self) -> Result<Token> {
        loop {
            self.skip_whitespace();
            if self.is_eof() {
                break;
            }
            let ch = self.current_char();
            if ch == '-' && self.peek_char() == Some('-') {
                self.skip_line_comment();
            } else if ch == '/' && self.peek_char() == Some('*') {
                self.skip_block_comment()?;
            } else {
                break;
            }
        }

        let start = self.offset();

        if self.is_eof() {
            return Ok(Token::new(TokenType::Eof, String::new(), start, start));
        }

        let ch = self.current_char();

        let (token_type, text) = match ch {
            '\'' | '"' => {
                let value = self.read_string(ch)?;
                (TokenType::String(value.clone()), value)
            }

            '0'..='9' => {
                let digits = self.read_number();
                (TokenType::Number(digits.clone()), digits)
            }

            'a'..='z' | 'A'..='Z' | '_' => self.read_identifier(),

            '!' => {
                self.advance();
                if self.current_char() == '=' {
                    self.advance();
                    (TokenType::Ne, "!=".to_string())
                } else {
                    return Err(self.error("unexpected character '!'", start));
                }
            }
            '<' => {
                self.advance();
                match self.current_char() {
                    '=' => {
                        self.advance();
                        (TokenType::Le, "<=".to_string())
                    }
                    '>' => {
                        self.advance();
                        (TokenType::Ne, "!=".to_string())
                    }
                    _ => (TokenType::Lt, "<".to_string()),
                }
            }
            '>' => {
                self.advance();
                if self.current_char() == '=' {
                    self.advance();
                    (TokenType::Ge, ">=".to_string())
                } else {
                    (TokenType::Gt, ">".to_string())
                }
            }
            _ => {
                let token_type = match ch {
                    '=' => TokenType::Eq,
                    '+' => TokenType::Plus,
                    '-' => TokenType::Minus,
                    '*' => TokenType::Star,
                    '(' => TokenType::LParen,
                    ')' => TokenType::RParen,
                    ',' => TokenType::Comma,
                    ';' => TokenType::Semicolon,
                    '.' => TokenType::Dot,
                    _ => {
                        return Err(self.error(&format!("unexpected character '{}'", ch), start));
                    }
                };
                self.advance();
                (token_type, ch.to_string())
            }
        };

        Ok(Token::new(token_type, text, start, self.offset()))
    }

    fn error(&self, message: &str, offset: usize) -> EngineError {
        EngineError::Lex {
            message: message.to_string(),
            offset,
        }
    }

    /// Byte offset of the current position
    fn offset(&self) -> usize {
        self.input
            .get(self.position)
            .map(|(o, _)| *o)
            .unwrap_or(self.source_len)
    }

    fn current_char(&self) -> char {
        self.input.get(self.position).map(|(_, c)| *c).unwrap_or('\0')
    }

    fn peek_char(&self) -> Option<char> {
        self.input.get(self.position + 1).map(|(_, c)| *c)
    }

    fn advance(&mut self) {
        if !self.is_eof() {
            self.position += 1;
        }
    }

    fn is_eof(&self) -> bool {
        self.position >= self.input.len()
    }

    fn skip_whitespace(&mut self) {
        while !self.is_eof() && self.current_char().is_whitespace() {
            self.advance();
        }
    }

    fn skip_line_comment(&mut self) {
        while !self.is_eof() && self.current_char() != '\n' {
            self.advance();
        }
    }

    fn skip_block_comment(&mut self) -> Result<()> {
        let start = self.offset();
        self.advance(); // skip '/'
        self.advance(); // skip '*'

        while !self.is_eof() {
            if self.current_char() == '*' && self.peek_char() == Some('/') {
                self.advance();
                self.advance();
                return Ok(());
            }
            self.advance();
        }

        Err(self.error("unterminated block comment", start))
    }

    /// Quoted string; a doubled quote stands for one literal quote
    fn read_string(&mut self, quote: char) -> Result<String> {
        let start = self.offset();
        self.advance(); // skip opening quote
        let mut value = String::new();

        loop {
            if self.is_eof() {
                return Err(self.error("unterminated string", start));
            }
            let ch = self.current_char();
            if ch == quote {
                if self.peek_char() == Some(quote) {
                    value.push(quote);
                    self.advance();
                    self.advance();
                    continue;
                }
                self.advance(); // skip closing quote
                return Ok(value);
            }
            value.push(ch);
            self.advance();
        }
    }

    /// Digits with at most one decimal point; a second '.' ends the number
    fn read_number(&mut self) -> String {
        let mut value = String::new();
        let mut seen_dot = false;

        while !self.is_eof() {
            let ch = self.current_char();
            if ch.is_ascii_digit() {
                value.push(ch);
            } else if ch == '.'
                && !seen_dot
                && self.peek_char().map_or(false, |c| c.is_ascii_digit())
            {
                seen_dot = true;
                value.push(ch);
            } else {
                break;
            }
            self.advance();
        }

        value
    }

    fn read_identifier(&mut self) -> (TokenType, String) {
        let mut value = String::new();

        while !self.is_eof() {
            let ch = self.current_char();
            if ch.is_ascii_alphanumeric() || ch == '_' {
                value.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        match TokenType::from_keyword(&value) {
            Some(keyword) => (keyword, value.to_ascii_uppercase()),
            None => (TokenType::Identifier(value.clone()), value),
        }
    }
}

/// Tokenize a complete statement
pub fn tokenize(sql: &str) -> Result<Vec<Token>> {
    Lexer::new(sql).tokenize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::token::TokenKind;

    /// Stitches token spans back together with the gaps between them
    fn reconstruct(source: &str, tokens: &[Token]) -> String {
        let mut out = String::new();
        let mut last = 0;
        for token in tokens {
            out.push_str(&source[last..token.offset]);
            out.push_str(token.raw(source));
            last = token.end;
        }
        out.push_str(&source[last..]);
        out
    }

    #[test]
    fn test_lexer_simple_select() {
        let tokens = tokenize("SELECT * FROM users").unwrap();

        assert_eq!(tokens.len(), 5); // SELECT, *, FROM, users, EOF
        assert!(matches!(tokens[0].token_type, TokenType::Select));
        assert!(matches!(tokens[1].token_type, TokenType::Star));
        assert!(matches!(tokens[2].token_type, TokenType::From));
        assert!(matches!(tokens[3].token_type, TokenType::Identifier(_)));
        assert!(matches!(tokens[4].token_type, TokenType::Eof));
    }

    #[test]
    fn test_keywords_uppercased() {
        let tokens = tokenize("select name from Users").unwrap();
        assert_eq!(tokens[0].text, "SELECT");
        assert_eq!(tokens[0].kind(), TokenKind::Keyword);
        assert_eq!(tokens[1].text, "name");
        assert_eq!(tokens[3].text, "Users");
    }

    #[test]
    fn test_lexer_with_where() {
        let tokens = tokenize("SELECT id FROM users WHERE age > 18").unwrap();

        // SELECT, id, FROM, users, WHERE, age, >, 18, EOF
        assert_eq!(tokens.len(), 9);
        assert!(matches!(tokens[5].token_type, TokenType::Identifier(_)));
        assert!(matches!(tokens[6].token_type, TokenType::Gt));
        assert!(matches!(tokens[7].token_type, TokenType::Number(ref n) if n == "18"));
    }

    #[test]
    fn test_lexer_string_literal() {
        let tokens = tokenize("SELECT * FROM users WHERE name = 'O''Brien'").unwrap();
        assert!(matches!(tokens[7].token_type, TokenType::String(ref s) if s == "O'Brien"));
        assert_eq!(tokens[7].raw("SELECT * FROM users WHERE name = 'O''Brien'"), "'O''Brien'");
    }

    #[test]
    fn test_lexer_operators() {
        let tokens = tokenize("= != <> < > <= >= + - *").unwrap();

        assert!(matches!(tokens[0].token_type, TokenType::Eq));
        assert!(matches!(tokens[1].token_type, TokenType::Ne));
        assert!(matches!(tokens[2].token_type, TokenType::Ne));
        assert!(matches!(tokens[3].token_type, TokenType::Lt));
        assert!(matches!(tokens[4].token_type, TokenType::Gt));
        assert!(matches!(tokens[5].token_type, TokenType::Le));
        assert!(matches!(tokens[6].token_type, TokenType::Ge));
        assert!(tokens[..10].iter().all(|t| t.kind() == TokenKind::Operator));
    }

    #[test]
    fn test_number_single_decimal_point() {
        let tokens = tokenize("1.5.2").unwrap();
        assert!(matches!(tokens[0].token_type, TokenType::Number(ref n) if n == "1.5"));
        assert!(matches!(tokens[1].token_type, TokenType::Dot));
        assert!(matches!(tokens[2].token_type, TokenType::Number(ref n) if n == "2"));
    }

    #[test]
    fn test_qualified_name() {
        let tokens = tokenize("u.name").unwrap();
        assert!(matches!(tokens[0].token_type, TokenType::Identifier(ref s) if s == "u"));
        assert!(matches!(tokens[1].token_type, TokenType::Dot));
        assert!(matches!(tokens[2].token_type, TokenType::Identifier(ref s) if s == "name"));
    }

    #[test]
    fn test_lexer_comments() {
        let tokens = tokenize("SELECT * -- this is a comment\nFROM /* block */ users").unwrap();
        assert_eq!(tokens.len(), 5);
        assert!(matches!(tokens[2].token_type, TokenType::From));
    }

    #[test]
    fn test_unterminated_string() {
        match tokenize("SELECT 'abc") {
            Err(EngineError::Lex { offset, .. }) => assert_eq!(offset, 7),
            other => panic!("Expected lex error, got {:?}", other),
        }
    }

    #[test]
    fn test_unexpected_character() {
        assert!(matches!(tokenize("SELECT # FROM t"), Err(EngineError::Lex { offset: 7, .. })));
        assert!(matches!(tokenize("SELECT /* open"), Err(EngineError::Lex { .. })));
    }

    #[test]
    fn test_spans_reconstruct_input() {
        let inputs = [
            "SELECT * FROM users",
            "  select  u.name ,COUNT(*) AS c FROM users u\n\tLEFT JOIN orders o ON u.id = o.user_id  ",
            "INSERT INTO t (a, b) VALUES ('it''s', 3.25), (\"x\", -1);",
            "DELETE FROM t WHERE name LIKE '%ü_' -- trailing comment",
            "UPDATE t SET a = 1 /* note */ WHERE b <> 2 AND c >= 4.5",
        ];
        for input in inputs {
            let tokens = tokenize(input).unwrap();
            assert_eq!(reconstruct(input, &tokens), input);
        }
    }
}
