use crate::lexer::cursor::Cursor;
use crate::symbol::{Span, SrcOffset};

pub mod cursor;

/// A single token inside one source line.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Token {
    pub kind: TokenKind,
    /// Location relative to the start of the whole source, not the line
    pub span: Span,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum LiteralKind {
    /// `"text"`
    Str { terminated: bool },
    /// `'c'`
    Char { terminated: bool },
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TokenKind {
    /// Mnemonics, labels, registers and bare numbers. Classified by the parser.
    Ident,
    /// `[...]`
    Address { terminated: bool },
    Lit(LiteralKind),
    Colon,
    Comma,
    Comment,
    Whitespace,
    Unknown,
}

/// Tokenize a single line. `line_offs` is the byte offset of the line inside the source, so
/// that spans can be used directly for diagnostics.
pub fn tokenize(line: &str, line_offs: usize) -> impl Iterator<Item = Token> + '_ {
    let mut cursor = Cursor::new(line);
    let mut offs = line_offs;
    std::iter::from_fn(move || {
        let kind = cursor.advance_token()?;
        let len = cursor.pos_in_token();
        cursor.reset_pos();
        let span = Span::new(SrcOffset(offs), len);
        offs += len;
        Some(Token { kind, span })
    })
}

/// Test if a character is considered to be whitespace.
pub(crate) fn is_whitespace(c: char) -> bool {
    // Carriage returns are left over from CRLF line endings
    matches!(c, ' ' | '\t' | '\r')
}

/// Test if a character may start an identifier.
pub(crate) fn is_id_start(c: char) -> bool {
    // Digits and `+` are allowed so that bare numbers are read as one token
    matches!(c, '.' | '+' | 'a'..='z' | 'A'..='Z' | '0'..='9')
}

/// Test if a character may continue an identifier.
pub(crate) fn is_id(c: char) -> bool {
    matches!(c, 'a'..='z' | 'A'..='Z' | '0'..='9' | '_')
}

impl Cursor<'_> {
    /// Returns `None` once the line is exhausted.
    pub fn advance_token(&mut self) -> Option<TokenKind> {
        let first_char = self.bump()?;
        let token_kind = match first_char {
            ';' => {
                self.take_while(|_| true);
                TokenKind::Comment
            }
            c if is_whitespace(c) => {
                self.take_while(is_whitespace);
                TokenKind::Whitespace
            }
            ':' => TokenKind::Colon,
            ',' => TokenKind::Comma,
            '[' => {
                self.take_while(|c| c != ']');
                TokenKind::Address {
                    terminated: self.bump().is_some(),
                }
            }
            '"' => TokenKind::Lit(LiteralKind::Str {
                terminated: self.quoted('"'),
            }),
            '\'' => TokenKind::Lit(LiteralKind::Char {
                terminated: self.quoted('\''),
            }),
            c if is_id_start(c) => {
                self.take_while(is_id);
                TokenKind::Ident
            }
            _ => TokenKind::Unknown,
        };
        Some(token_kind)
    }

    /// Consume a quoted literal body and its closing quote. The body holds at least one
    /// character, so `'''` is a quote character.
    fn quoted(&mut self, quote: char) -> bool {
        if self.bump().is_none() {
            return false;
        }
        self.take_while(|c| c != quote);
        self.bump().is_some()
    }
}
