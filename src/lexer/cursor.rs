// Heavily inspired and referenced from `rustc_lexer` and adapted to suit the project.
// See https://doc.rust-lang.org/beta/nightly-rustc/src/rustc_lexer/cursor.rs.html

use std::str::Chars;

/// Returned by [`Cursor::first`] once the input is exhausted.
pub const EOF_CHAR: char = '\0';

/// Peekable iterator over a char sequence.
#[derive(Clone, Debug)]
pub struct Cursor<'a> {
    /// Bytes remaining at the start of the current token
    len_remaining: usize,
    /// Iterator over chars in a &str
    chars: Chars<'a>,
}

impl<'a> Cursor<'a> {
    pub fn new(input: &'a str) -> Cursor<'a> {
        Cursor {
            len_remaining: input.len(),
            chars: input.chars(),
        }
    }

    /// Peek at the next char without consuming it. Returns [`EOF_CHAR`] at the end.
    pub fn first(&self) -> char {
        self.chars.clone().next().unwrap_or(EOF_CHAR)
    }

    /// Line is finished lexing
    pub fn is_eof(&self) -> bool {
        self.chars.as_str().is_empty()
    }

    /// Byte length of the token consumed since the last [`Cursor::reset_pos`].
    pub fn pos_in_token(&self) -> usize {
        self.len_remaining - self.chars.as_str().len()
    }

    /// Start a new token at the current position.
    pub fn reset_pos(&mut self) {
        self.len_remaining = self.chars.as_str().len();
    }

    /// Advance by one character
    pub fn bump(&mut self) -> Option<char> {
        self.chars.next()
    }

    /// Consume characters while `predicate` holds, or until end of input.
    pub fn take_while(&mut self, mut predicate: impl FnMut(char) -> bool) {
        while predicate(self.first()) && !self.is_eof() {
            self.bump();
        }
    }
}
