use crate::ast::Span;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    // Top-level keywords
    Config,
    MenuConfig,
    Choice,
    EndChoice,
    CommentKw, // `comment` keyword (distinct from `#` line comments)
    Menu,
    EndMenu,
    If,
    EndIf,
    Source,
    MainMenu,

    // Type keywords
    Bool,
    Tristate,
    StringType,
    Hex,
    Int,

    // Attribute keywords
    Prompt,
    Default,
    DefBool,
    DefTristate,
    Depends,
    On,
    Select,
    Imply,
    Visible,
    Range,
    Help,
    Optional,
    OptionKw,
    Env,
    Modules,
    DefconfigList,
    AllnoconfigY,

    // Operators
    Eq,         // =
    NotEq,      // !=
    Less,       // <
    Greater,    // >
    LessEq,     // <=
    GreaterEq,  // >=
    Not,        // !
    And,        // &&
    Or,         // ||
    OpenParen,  // (
    CloseParen, // )

    // Literals & identifiers
    StringLit(String), // "..." or '...', environment references expanded
    Ident(String),     // unquoted identifier / symbol / number

    // Line comment: # ...
    LineComment(String),

    // Whitespace / structure
    Newline,
    Eof,
}

#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

// ---------------------------------------------------------------------------

pub struct Lexer<'a> {
    src: &'a str,
    off: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Self { src, off: 0 }
    }

    pub fn tokenize(mut self) -> Vec<Token> {
        let mut out = Vec::new();
        loop {
            let tok = self.scan();
            let done = tok.kind == TokenKind::Eof;
            out.push(tok);
            if done {
                return out;
            }
        }
    }

    /// Byte `ahead` positions past the cursor, if any.
    fn look(&self, ahead: usize) -> Option<u8> {
        self.src.as_bytes().get(self.off + ahead).copied()
    }

    fn eat_while(&mut self, keep: fn(u8) -> bool) {
        while self.look(0).is_some_and(keep) {
            self.off += 1;
        }
    }

    fn token(&self, kind: TokenKind, start: usize) -> Token {
        Token {
            kind,
            span: Span::new(start, self.off),
        }
    }

    /// Horizontal whitespace and backslash-newline continuations vanish
    /// between tokens.
    fn skip_padding(&mut self) {
        loop {
            match (self.look(0), self.look(1)) {
                (Some(b' ' | b'\t' | b'\r'), _) => self.off += 1,
                (Some(b'\\'), Some(b'\n')) => self.off += 2,
                _ => return,
            }
        }
    }

    fn scan(&mut self) -> Token {
        self.skip_padding();
        let start = self.off;
        let Some(byte) = self.look(0) else {
            return self.token(TokenKind::Eof, start);
        };
        self.off += 1;

        match byte {
            b'\n' => self.token(TokenKind::Newline, start),

            b'#' => {
                self.eat_while(|b| b != b'\n');
                let text = self.src[start + 1..self.off].to_string();
                self.token(TokenKind::LineComment(text), start)
            }

            b'"' | b'\'' => self.scan_quoted(byte, start),

            b'(' => self.token(TokenKind::OpenParen, start),
            b')' => self.token(TokenKind::CloseParen, start),
            b'=' => self.token(TokenKind::Eq, start),

            b'!' => self.maybe_eq(start, TokenKind::NotEq, TokenKind::Not),
            b'<' => self.maybe_eq(start, TokenKind::LessEq, TokenKind::Less),
            b'>' => self.maybe_eq(start, TokenKind::GreaterEq, TokenKind::Greater),

            b'&' => self.doubled(b'&', start, TokenKind::And),
            b'|' => self.doubled(b'|', start, TokenKind::Or),

            b if is_word_start(b) => self.scan_word(start),

            // Anything else is dropped and scanning restarts; this also
            // swallows the leading dashes of "---help---".
            _ => self.scan(),
        }
    }

    /// One-byte operator that extends to its `=` form when followed by
    /// `=` (`!`/`!=`, `<`/`<=`, `>`/`>=`).
    fn maybe_eq(&mut self, start: usize, with_eq: TokenKind, bare: TokenKind) -> Token {
        if self.look(0) == Some(b'=') {
            self.off += 1;
            self.token(with_eq, start)
        } else {
            self.token(bare, start)
        }
    }

    /// `&&` / `||`; a lone `&` or `|` is an invalid byte and is ignored.
    fn doubled(&mut self, second: u8, start: usize, kind: TokenKind) -> Token {
        if self.look(0) == Some(second) {
            self.off += 1;
            self.token(kind, start)
        } else {
            self.scan()
        }
    }

    fn scan_word(&mut self, start: usize) -> Token {
        self.eat_while(is_word_byte);
        let word = &self.src[start..self.off];
        let kind = keyword(word).unwrap_or_else(|| TokenKind::Ident(word.to_string()));
        self.token(kind, start)
    }

    fn scan_quoted(&mut self, quote: u8, start: usize) -> Token {
        let mut raw = Vec::new();
        loop {
            match self.look(0) {
                // Unterminated string: recover at the line end, keeping
                // the newline for the parser.
                None | Some(b'\n') => break,
                Some(b) if b == quote => {
                    self.off += 1;
                    break;
                }
                Some(b'\\') => {
                    self.off += 1;
                    if let Some(escaped) = self.look(0) {
                        raw.push(escaped);
                        self.off += 1;
                    }
                }
                Some(b) => {
                    raw.push(b);
                    self.off += 1;
                }
            }
        }
        let text = String::from_utf8_lossy(&raw).into_owned();
        self.token(TokenKind::StringLit(expand_env(&text)), start)
    }
}

/// Expand `$NAME` and `$(NAME)` references against the process
/// environment. Unset variables expand to the empty string.
fn expand_env(s: &str) -> String {
    if !s.contains('$') {
        return s.to_string();
    }
    let bytes = s.as_bytes();
    let mut out = String::with_capacity(s.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'$' {
            // Copy the full char, not just the byte.
            let ch_len = utf8_len(bytes[i]);
            out.push_str(&s[i..i + ch_len]);
            i += ch_len;
            continue;
        }
        // `$(NAME)` form
        if bytes.get(i + 1) == Some(&b'(') {
            if let Some(close) = s[i + 2..].find(')') {
                let name = &s[i + 2..i + 2 + close];
                out.push_str(&std::env::var(name).unwrap_or_default());
                i += 2 + close + 1;
                continue;
            }
        }
        // `$NAME` form
        let mut end = i + 1;
        while end < bytes.len() && is_env_name_byte(bytes[end]) {
            end += 1;
        }
        if end > i + 1 {
            let name = &s[i + 1..end];
            out.push_str(&std::env::var(name).unwrap_or_default());
            i = end;
        } else {
            out.push('$');
            i += 1;
        }
    }
    out
}

fn utf8_len(first: u8) -> usize {
    match first {
        b if b < 0x80 => 1,
        b if b >= 0xF0 => 4,
        b if b >= 0xE0 => 3,
        _ => 2,
    }
}

fn is_env_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

fn is_word_start(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'_' | b'-' | b'.' | b'/')
}

fn keyword(s: &str) -> Option<TokenKind> {
    Some(match s {
        "allnoconfig_y" => TokenKind::AllnoconfigY,
        "bool" => TokenKind::Bool,
        "boolean" => TokenKind::Bool,
        "choice" => TokenKind::Choice,
        "comment" => TokenKind::CommentKw,
        "config" => TokenKind::Config,
        "def_bool" => TokenKind::DefBool,
        "def_tristate" => TokenKind::DefTristate,
        "default" => TokenKind::Default,
        "defconfig_list" => TokenKind::DefconfigList,
        "depends" => TokenKind::Depends,
        "endchoice" => TokenKind::EndChoice,
        "endif" => TokenKind::EndIf,
        "endmenu" => TokenKind::EndMenu,
        "env" => TokenKind::Env,
        "help" => TokenKind::Help,
        // The leading dashes of "---help---" are dropped as stray bytes,
        // which leaves this ident behind.
        "help---" => TokenKind::Help,
        "hex" => TokenKind::Hex,
        "if" => TokenKind::If,
        "imply" => TokenKind::Imply,
        "int" => TokenKind::Int,
        "mainmenu" => TokenKind::MainMenu,
        "menu" => TokenKind::Menu,
        "menuconfig" => TokenKind::MenuConfig,
        "modules" => TokenKind::Modules,
        "on" => TokenKind::On,
        "option" => TokenKind::OptionKw,
        "optional" => TokenKind::Optional,
        "prompt" => TokenKind::Prompt,
        "range" => TokenKind::Range,
        "select" => TokenKind::Select,
        "source" => TokenKind::Source,
        "string" => TokenKind::StringType,
        "tristate" => TokenKind::Tristate,
        "visible" => TokenKind::Visible,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_refs_expand_inside_strings() {
        std::env::set_var("KCONFIG_EVAL_LEX_TEST", "arch/x86");
        let tokens = Lexer::new("source \"$KCONFIG_EVAL_LEX_TEST/Kconfig\"\n").tokenize();
        assert!(tokens
            .iter()
            .any(|t| t.kind == TokenKind::StringLit("arch/x86/Kconfig".to_string())));

        let tokens = Lexer::new("source \"$(KCONFIG_EVAL_LEX_TEST)/Kconfig\"\n").tokenize();
        assert!(tokens
            .iter()
            .any(|t| t.kind == TokenKind::StringLit("arch/x86/Kconfig".to_string())));
    }

    #[test]
    fn unset_env_refs_expand_to_empty() {
        std::env::remove_var("KCONFIG_EVAL_UNSET_VAR");
        let tokens = Lexer::new("menu \"x$(KCONFIG_EVAL_UNSET_VAR)y\"\n").tokenize();
        assert!(tokens
            .iter()
            .any(|t| t.kind == TokenKind::StringLit("xy".to_string())));
    }

    #[test]
    fn continuations_and_operators_lex() {
        let tokens = Lexer::new("depends on A && \\\n\tB || !C != D\n").tokenize();
        let kinds: Vec<_> = tokens.iter().map(|t| t.kind.clone()).collect();
        assert!(kinds.contains(&TokenKind::And));
        assert!(kinds.contains(&TokenKind::Or));
        assert!(kinds.contains(&TokenKind::Not));
        assert!(kinds.contains(&TokenKind::NotEq));
        // The continuation joins both halves into one logical line.
        assert_eq!(
            kinds.iter().filter(|k| **k == TokenKind::Newline).count(),
            1
        );
    }

    #[test]
    fn dashed_help_lexes_as_help() {
        let tokens = Lexer::new("---help---\n").tokenize();
        assert_eq!(tokens[0].kind, TokenKind::Help);
    }
}
