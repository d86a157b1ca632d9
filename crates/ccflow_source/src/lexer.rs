//! Comment-stripping tokenizer shared by the VHDL and Verilog scanners.
//!
//! Only identifiers and single punctuation characters survive. Numbers,
//! string literals, VHDL character literals and comments are dropped.

use crate::language::HdlLanguage;

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Tok {
    Ident(String),
    Punct(char),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Token {
    pub tok: Tok,
    pub line: u32,
}

impl Token {
    pub fn ident(&self) -> Option<&str> {
        match &self.tok {
            Tok::Ident(s) => Some(s),
            Tok::Punct(_) => None,
        }
    }

    pub fn is_punct(&self, c: char) -> bool {
        self.tok == Tok::Punct(c)
    }

    pub fn is_word(&self, word: &str) -> bool {
        self.ident() == Some(word)
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$'
}

pub(crate) fn tokenize(text: &str, language: HdlLanguage) -> Vec<Token> {
    let chars: Vec<char> = text.chars().collect();
    let fold = language.folds_case();
    let vhdl = language == HdlLanguage::Vhdl;
    let mut tokens = Vec::new();
    let mut line = 1u32;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();

        if c == '\n' {
            line += 1;
            i += 1;
        } else if c.is_whitespace() {
            i += 1;
        } else if (vhdl && c == '-' && next == Some('-')) || (!vhdl && c == '/' && next == Some('/')) {
            while i < chars.len() && chars[i] != '\n' {
                i += 1;
            }
        } else if c == '/' && next == Some('*') {
            i += 2;
            while i < chars.len() && !(chars[i] == '*' && chars.get(i + 1) == Some(&'/')) {
                if chars[i] == '\n' {
                    line += 1;
                }
                i += 1;
            }
            i += 2;
        } else if c == '"' {
            i += 1;
            while i < chars.len() && chars[i] != '"' && chars[i] != '\n' {
                if !vhdl && chars[i] == '\\' {
                    i += 1;
                }
                i += 1;
            }
            i += 1;
        } else if vhdl && c == '\'' && chars.get(i + 2) == Some(&'\'') {
            // character literal such as '0'
            i += 3;
        } else if !vhdl && c == '\\' {
            // Verilog escaped identifier, terminated by whitespace
            let start = i + 1;
            i = start;
            while i < chars.len() && !chars[i].is_whitespace() {
                i += 1;
            }
            let name: String = chars[start..i].iter().collect();
            if !name.is_empty() {
                tokens.push(Token {
                    tok: Tok::Ident(name),
                    line,
                });
            }
        } else if is_ident_start(c) {
            let start = i;
            while i < chars.len() && is_ident_continue(chars[i]) {
                i += 1;
            }
            let mut word: String = chars[start..i].iter().collect();
            if fold {
                word.make_ascii_lowercase();
            }
            tokens.push(Token {
                tok: Tok::Ident(word),
                line,
            });
        } else if c.is_ascii_digit() {
            while i < chars.len() && (is_ident_continue(chars[i]) || chars[i] == '.') {
                i += 1;
            }
        } else {
            tokens.push(Token {
                tok: Tok::Punct(c),
                line,
            });
            i += 1;
        }
    }
    tokens
}
