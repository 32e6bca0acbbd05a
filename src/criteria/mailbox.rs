//! Minimal RFC 5322 mailbox recognizer.
//!
//! Accepts exactly one `mailbox`:
//!
//! ```text
//! mailbox      = name-addr / addr-spec
//! name-addr    = [display-name] "<" addr-spec ">"
//! addr-spec    = local-part "@" domain
//! local-part   = dot-atom / quoted-string
//! domain       = dot-atom / "[" *dtext "]"
//! ```
//!
//! Folding whitespace and comments are allowed around tokens. Group syntax
//! and address lists are rejected.

/// `true` when `s` is exactly one mailbox, optionally padded by CFWS.
pub fn is_single_mailbox(s: &str) -> bool {
    let mut bare = Cursor::new(s);
    if bare.skip_cfws() && bare.addr_spec() && bare.skip_cfws() && bare.is_empty() {
        return true;
    }

    let mut named = Cursor::new(s);
    named.skip_cfws()
        && named.optional_phrase()
        && named.eat('<')
        && named.addr_spec()
        && named.eat('>')
        && named.skip_cfws()
        && named.is_empty()
}

struct Cursor<'a> {
    rest: &'a str,
}

impl<'a> Cursor<'a> {
    fn new(s: &'a str) -> Self {
        Self { rest: s }
    }

    fn is_empty(&self) -> bool {
        self.rest.is_empty()
    }

    fn peek(&self) -> Option<char> {
        self.rest.chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.rest = &self.rest[c.len_utf8()..];
        Some(c)
    }

    fn eat(&mut self, want: char) -> bool {
        if self.peek() == Some(want) {
            self.bump();
            true
        } else {
            false
        }
    }

    /// Skip whitespace and (nested) comments. Returns `false` on an
    /// unterminated comment.
    fn skip_cfws(&mut self) -> bool {
        loop {
            self.rest = self.rest.trim_start_matches([' ', '\t', '\r', '\n']);
            if self.peek() != Some('(') {
                return true;
            }
            if !self.comment() {
                return false;
            }
        }
    }

    fn comment(&mut self) -> bool {
        let mut depth = 0usize;
        while let Some(c) = self.bump() {
            match c {
                '(' => depth += 1,
                ')' => {
                    depth -= 1;
                    if depth == 0 {
                        return true;
                    }
                }
                '\\' => {
                    if self.bump().is_none() {
                        return false;
                    }
                }
                _ => {}
            }
        }
        false
    }

    fn addr_spec(&mut self) -> bool {
        let local_ok = if self.peek() == Some('"') {
            self.quoted_string()
        } else {
            self.dot_atom()
        };
        if !local_ok || !self.eat('@') {
            return false;
        }
        if self.peek() == Some('[') {
            self.domain_literal()
        } else {
            self.dot_atom()
        }
    }

    /// `atom *("." atom)` with no leading, trailing or doubled dots.
    fn dot_atom(&mut self) -> bool {
        loop {
            if !self.atom() {
                return false;
            }
            if !self.eat('.') {
                return true;
            }
        }
    }

    fn atom(&mut self) -> bool {
        let len = self
            .rest
            .find(|c: char| !is_atext(c))
            .unwrap_or(self.rest.len());
        self.rest = &self.rest[len..];
        len > 0
    }

    fn quoted_string(&mut self) -> bool {
        if !self.eat('"') {
            return false;
        }
        while let Some(c) = self.bump() {
            match c {
                '"' => return true,
                '\\' => match self.bump() {
                    Some(q) if is_vchar(q) || q == ' ' || q == '\t' => {}
                    _ => return false,
                },
                c if is_vchar(c) || c == ' ' || c == '\t' => {}
                _ => return false,
            }
        }
        false
    }

    fn domain_literal(&mut self) -> bool {
        if !self.eat('[') {
            return false;
        }
        while let Some(c) = self.bump() {
            match c {
                ']' => return true,
                '[' | '\\' => return false,
                c if is_vchar(c) || c == ' ' || c == '\t' => {}
                _ => return false,
            }
        }
        false
    }

    /// Display name: zero or more words (atoms, which may carry the obsolete
    /// embedded dots, or quoted strings) separated by CFWS.
    fn optional_phrase(&mut self) -> bool {
        loop {
            let progressed = match self.peek() {
                Some('"') => {
                    if !self.quoted_string() {
                        return false;
                    }
                    true
                }
                Some(c) if is_atext(c) => {
                    let len = self
                        .rest
                        .find(|c: char| !is_atext(c) && c != '.')
                        .unwrap_or(self.rest.len());
                    self.rest = &self.rest[len..];
                    true
                }
                _ => false,
            };
            if !self.skip_cfws() {
                return false;
            }
            if !progressed {
                return true;
            }
        }
    }
}

fn is_atext(c: char) -> bool {
    c.is_ascii_alphanumeric()
        || matches!(
            c,
            '!' | '#' | '$' | '%' | '&' | '\'' | '*' | '+' | '-' | '/' | '=' | '?' | '^' | '_'
                | '`' | '{' | '|' | '}' | '~'
        )
        || (!c.is_ascii() && !c.is_whitespace() && !c.is_control())
}

fn is_vchar(c: char) -> bool {
    c.is_ascii_graphic() || (!c.is_ascii() && !c.is_control())
}
