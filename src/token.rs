//! Tokenizer: splits raw text into typed tokens

use std::ops::Range;

use unicode_normalization::char::is_combining_mark;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::language::Language;

/// Token category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TokenKind {
    /// Alphabetic run, or a single ideograph
    Word,
    /// Alphanumeric run containing at least one digit (`94102`, `4B`, `5th`, `94102-1234`)
    Numeric,
    /// Any other single character
    Punct,
    /// Whitespace run
    Whitespace,
}

/// A token and its byte span in the input
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Token {
    /// Exact input text
    pub text: String,
    /// Byte offset of the first character
    pub start: usize,
    /// Byte offset one past the last character
    pub end: usize,
    pub kind: TokenKind,
}

impl Token {
    pub fn new(text: impl Into<String>, start: usize, end: usize, kind: TokenKind) -> Self {
        Self {
            text: text.into(),
            start,
            end,
            kind,
        }
    }

    pub fn span(&self) -> Range<usize> {
        self.start..self.end
    }

    /// Word or numeric token
    pub fn is_content(&self) -> bool {
        matches!(self.kind, TokenKind::Word | TokenKind::Numeric)
    }
}

/// Tokenizes `text`.
///
/// Fails with [`Error::UnparsableInput`] when the text contains no word or
/// numeric token (empty, whitespace-only or punctuation-only input).
///
/// ```rust
/// use addrnorm::{tokenize, TokenKind};
///
/// let tokens = tokenize("CA 94102-1234", None).unwrap();
/// assert_eq!(tokens[2].text, "94102-1234");
/// assert_eq!(tokens[2].kind, TokenKind::Numeric);
/// ```
pub fn tokenize(text: &str, language_hint: Option<Language>) -> Result<Vec<Token>> {
    let tokens = scan(text, language_hint);
    if tokens.iter().any(Token::is_content) {
        Ok(tokens)
    } else {
        Err(Error::UnparsableInput)
    }
}

/// Tokenizes raw bytes, failing with [`Error::InvalidEncoding`] if they are not UTF-8.
pub fn tokenize_bytes(bytes: &[u8], language_hint: Option<Language>) -> Result<Vec<Token>> {
    let text = std::str::from_utf8(bytes)?;
    tokenize(text, language_hint)
}

/// `94102`, `94102-1234`, `75002`, `1010`
pub(crate) fn is_postal_code(text: &str) -> bool {
    let digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    match text.split_once('-') {
        Some((head, tail)) => head.len() == 5 && tail.len() == 4 && digits(head) && digits(tail),
        None => (4..=6).contains(&text.len()) && digits(text),
    }
}

/// Han ideographs and kana are written without spaces and tokenized per character
fn is_ideographic(c: char) -> bool {
    matches!(c,
        '\u{3040}'..='\u{30FF}'
        | '\u{3400}'..='\u{4DBF}'
        | '\u{4E00}'..='\u{9FFF}'
        | '\u{F900}'..='\u{FAFF}'
        | '\u{20000}'..='\u{2A6DF}')
}

fn is_apostrophe(c: char) -> bool {
    c == '\'' || c == '\u{2019}'
}

/// Continues a word run; runs only start on an alphanumeric character
fn continues_word(c: char) -> bool {
    (c.is_alphanumeric() || is_combining_mark(c)) && !is_ideographic(c)
}

/// Infallible scanner behind [`tokenize`]
pub(crate) fn scan(text: &str, language_hint: Option<Language>) -> Vec<Token> {
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let n = chars.len();
    let byte_at = |idx: usize| if idx < n { chars[idx].0 } else { text.len() };
    let split_elision = language_hint.is_some_and(Language::splits_elision);

    let mut tokens = Vec::new();
    let mut i = 0;

    while i < n {
        let c = chars[i].1;
        let start = chars[i].0;

        let (j, kind) = if c.is_whitespace() {
            let mut j = i + 1;
            while j < n && chars[j].1.is_whitespace() {
                j += 1;
            }
            (j, TokenKind::Whitespace)
        } else if is_ideographic(c) {
            (i + 1, TokenKind::Word)
        } else if c.is_alphanumeric() {
            let mut j = i + 1;
            while j < n {
                let cj = chars[j].1;
                if continues_word(cj) {
                    j += 1;
                    continue;
                }
                let flanked = |pred: fn(char) -> bool| {
                    pred(chars[j - 1].1) && j + 1 < n && pred(chars[j + 1].1)
                };
                // 94102-1234, 1/2
                if (cj == '-' || cj == '/') && flanked(char::is_numeric) {
                    j += 2;
                    continue;
                }
                // O'Farrell, but l'avenue splits when the hint asks for it
                if is_apostrophe(cj) && flanked(char::is_alphabetic) {
                    if split_elision && j == i + 1 {
                        break;
                    }
                    j += 2;
                    continue;
                }
                break;
            }
            let numeric = chars[i..j].iter().any(|(_, ch)| ch.is_numeric());
            (j, if numeric { TokenKind::Numeric } else { TokenKind::Word })
        } else {
            (i + 1, TokenKind::Punct)
        };

        let end = byte_at(j);
        tokens.push(Token::new(&text[start..end], start, end, kind));
        i = j;
    }

    tokens
}
