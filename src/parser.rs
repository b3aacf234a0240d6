use crate::ast::*;
use crate::lexer::{Lexer, Token, TokenKind};

pub struct ParseResult {
    pub file: KconfigFile,
    pub diagnostics: Vec<ParseDiagnostic>,
}

pub fn parse(source: &str, tokens: Vec<Token>) -> ParseResult {
    let mut p = Parser::new(source, tokens);
    let entries = p.block_items(BlockEnd::File);
    ParseResult {
        file: KconfigFile { entries },
        diagnostics: p.diags,
    }
}

/// Parse a standalone expression, for ad-hoc evaluation against a model.
pub fn parse_expr_str(source: &str) -> (RawExpr, Vec<ParseDiagnostic>) {
    let mut p = Parser::new(source, Lexer::new(source).tokenize());
    let expr = p.expr();
    if !matches!(p.cur(), TokenKind::Newline | TokenKind::Eof) {
        p.error_here("trailing input after expression");
    }
    (expr, p.diags)
}

/// What closes the block currently being parsed.
#[derive(Clone, Copy, PartialEq, Eq)]
enum BlockEnd {
    File,
    Menu,
    Choice,
    If,
}

struct Parser<'a> {
    source: &'a str,
    tokens: Vec<Token>,
    cursor: usize,
    diags: Vec<ParseDiagnostic>,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str, tokens: Vec<Token>) -> Self {
        Parser {
            source,
            tokens,
            cursor: 0,
            diags: Vec::new(),
        }
    }

    // -- cursor primitives ----------------------------------------------

    fn cur(&self) -> &TokenKind {
        match self.tokens.get(self.cursor) {
            Some(t) => &t.kind,
            None => &TokenKind::Eof,
        }
    }

    fn span(&self) -> Span {
        match self.tokens.get(self.cursor) {
            Some(t) => t.span,
            None => Span::new(self.source.len(), self.source.len()),
        }
    }

    fn bump(&mut self) {
        self.cursor += 1;
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.cur() == kind {
            self.bump();
            true
        } else {
            false
        }
    }

    fn error_here(&mut self, msg: &str) {
        let span = self.span();
        self.diags.push(ParseDiagnostic {
            message: msg.to_string(),
            span,
            severity: DiagSeverity::Error,
        });
    }

    fn warn_here(&mut self, msg: &str) {
        let span = self.span();
        self.diags.push(ParseDiagnostic {
            message: msg.to_string(),
            span,
            severity: DiagSeverity::Warning,
        });
    }

    // -- line structure ---------------------------------------------------

    /// Step over blank lines and whole-line comments.
    fn skip_blank_lines(&mut self) {
        while matches!(self.cur(), TokenKind::Newline | TokenKind::LineComment(_)) {
            self.bump();
        }
    }

    /// Drop everything up to and including the next newline. Returns the
    /// byte offset where the following line begins.
    fn sync_to_line_start(&mut self) -> usize {
        loop {
            match self.cur() {
                TokenKind::Eof => return self.source.len(),
                TokenKind::Newline => {
                    let next_line = self.span().end;
                    self.bump();
                    return next_line;
                }
                _ => self.bump(),
            }
        }
    }

    /// A construct must stop at the line end; a trailing comment is fine,
    /// anything else gets flagged and skipped.
    fn end_of_line(&mut self) {
        if matches!(self.cur(), TokenKind::LineComment(_)) {
            self.bump();
        }
        match self.cur() {
            TokenKind::Newline => self.bump(),
            TokenKind::Eof => {}
            _ => {
                self.warn_here("expected end of line");
                self.sync_to_line_start();
            }
        }
    }

    // -- entries ------------------------------------------------------------

    fn block_items(&mut self, end: BlockEnd) -> Vec<Entry> {
        let mut items = Vec::new();
        loop {
            self.skip_blank_lines();
            if self.at_block_end(end) {
                return items;
            }
            match self.cur() {
                TokenKind::Config => items.push(self.symbol_block(false)),
                TokenKind::MenuConfig => items.push(self.symbol_block(true)),
                TokenKind::Choice => items.push(self.choice_block()),
                TokenKind::Menu => items.push(self.menu_block()),
                TokenKind::CommentKw => items.push(self.comment_block()),
                TokenKind::If => items.push(self.if_block()),
                TokenKind::Source => items.push(self.source_line()),
                TokenKind::MainMenu => items.push(self.mainmenu_line()),
                _ => {
                    self.error_here("unexpected token at start of entry");
                    self.sync_to_line_start();
                }
            }
        }
    }

    /// Only the matching `end*` keyword closes a block; a stray one from
    /// another construct falls through to the entry dispatch and gets
    /// reported there.
    fn at_block_end(&self, end: BlockEnd) -> bool {
        match self.cur() {
            TokenKind::Eof => true,
            TokenKind::EndMenu => end == BlockEnd::Menu,
            TokenKind::EndChoice => end == BlockEnd::Choice,
            TokenKind::EndIf => end == BlockEnd::If,
            _ => false,
        }
    }

    fn close_block(&mut self, end: &TokenKind, keyword: &str) -> Span {
        let span = self.span();
        if self.eat(end) {
            self.end_of_line();
        } else {
            let msg = format!("expected `{}`", keyword);
            self.diags.push(ParseDiagnostic {
                message: msg,
                span,
                severity: DiagSeverity::Error,
            });
        }
        span
    }

    // -- config / menuconfig --------------------------------------------

    fn symbol_block(&mut self, is_menuconfig: bool) -> Entry {
        let lead = self.span();
        self.bump(); // config / menuconfig
        let (name, name_span) = self.ident();
        self.end_of_line();

        let attributes = self.symbol_props();
        let span = lead.merge(attributes.last().map(prop_span).unwrap_or(name_span));
        let entry = ConfigEntry {
            name,
            name_span,
            attributes,
            span,
        };
        if is_menuconfig {
            Entry::MenuConfig(entry)
        } else {
            Entry::Config(entry)
        }
    }

    fn symbol_props(&mut self) -> Vec<Attribute> {
        let mut props = Vec::new();
        loop {
            self.skip_blank_lines();
            if let Some(kind) = type_kind_of(self.cur()) {
                props.push(self.type_prop(kind));
                continue;
            }
            match self.cur() {
                TokenKind::Prompt => props.push(self.prompt_prop()),
                TokenKind::Default => props.push(self.default_prop(None)),
                TokenKind::DefBool => props.push(self.default_prop(Some(TypeKind::Bool))),
                TokenKind::DefTristate => {
                    props.push(self.default_prop(Some(TypeKind::Tristate)));
                }
                TokenKind::Depends => props.push(self.depends_prop()),
                TokenKind::Select => props.push(self.select_imply_prop(true)),
                TokenKind::Imply => props.push(self.select_imply_prop(false)),
                TokenKind::Range => props.push(self.range_prop()),
                TokenKind::Visible => props.push(self.visible_prop()),
                TokenKind::Help => props.push(self.help_prop()),
                TokenKind::OptionKw => props.push(self.option_prop()),
                TokenKind::Modules => {
                    // Bare `modules`, the pre-`option` spelling.
                    let span = self.span();
                    self.bump();
                    self.end_of_line();
                    props.push(Attribute::Option(OptionAttr {
                        kind: OptionKind::Modules,
                        span,
                    }));
                }
                _ => return props,
            }
        }
    }

    // -- properties -------------------------------------------------------

    fn type_prop(&mut self, kind: TypeKind) -> Attribute {
        let lead = self.span();
        self.bump();
        let prompt = match self.cur() {
            TokenKind::StringLit(_) => Some(self.prompt_body(self.span())),
            _ => None,
        };
        let span = lead.merge(prompt.as_ref().map(|p| p.span).unwrap_or(lead));
        self.end_of_line();
        Attribute::Type(TypeAttr { kind, prompt, span })
    }

    fn prompt_prop(&mut self) -> Attribute {
        let lead = self.span();
        self.bump(); // prompt
        let prompt = self.prompt_body(lead);
        self.end_of_line();
        Attribute::Prompt(prompt)
    }

    fn prompt_body(&mut self, lead: Span) -> PromptAttr {
        let (text, text_span) = self.string();
        let condition = self.if_clause();
        let span = lead.merge(condition.as_ref().map(|c| c.span()).unwrap_or(text_span));
        PromptAttr {
            text,
            text_span,
            condition,
            span,
        }
    }

    /// `default EXPR [if COND]`, plus the `def_bool`/`def_tristate`
    /// shorthands that set a type along the way.
    fn default_prop(&mut self, shorthand: Option<TypeKind>) -> Attribute {
        let lead = self.span();
        self.bump();
        let value = self.expr();
        let condition = self.if_clause();
        let span = lead.merge(condition.as_ref().map(|c| c.span()).unwrap_or(value.span()));
        self.end_of_line();
        match shorthand {
            None => Attribute::Default(DefaultAttr {
                value,
                condition,
                span,
            }),
            Some(kind) => Attribute::DefType(DefTypeAttr {
                kind,
                value,
                condition,
                span,
            }),
        }
    }

    fn depends_prop(&mut self) -> Attribute {
        let lead = self.span();
        self.bump(); // depends
        if !self.eat(&TokenKind::On) {
            self.error_here("expected `on` after `depends`");
        }
        let expr = self.expr();
        let span = lead.merge(expr.span());
        self.end_of_line();
        Attribute::DependsOn(DependsOnAttr { expr, span })
    }

    fn select_imply_prop(&mut self, select: bool) -> Attribute {
        let lead = self.span();
        self.bump();
        let (symbol, symbol_span) = self.ident();
        let condition = self.if_clause();
        let span = lead.merge(condition.as_ref().map(|c| c.span()).unwrap_or(symbol_span));
        self.end_of_line();
        let prop = SelectImplyAttr {
            symbol,
            symbol_span,
            condition,
            span,
        };
        if select {
            Attribute::Select(prop)
        } else {
            Attribute::Imply(prop)
        }
    }

    fn range_prop(&mut self) -> Attribute {
        let lead = self.span();
        self.bump(); // range
        let low = self.operand();
        let high = self.operand();
        let condition = self.if_clause();
        let span = lead.merge(condition.as_ref().map(|c| c.span()).unwrap_or(high.span()));
        self.end_of_line();
        Attribute::Range(RangeAttr {
            low,
            high,
            condition,
            span,
        })
    }

    fn visible_prop(&mut self) -> Attribute {
        let lead = self.span();
        self.bump(); // visible
        if !self.eat(&TokenKind::If) {
            self.error_here("expected `if` after `visible`");
        }
        let expr = self.expr();
        let span = lead.merge(expr.span());
        self.end_of_line();
        Attribute::VisibleIf(VisibleIfAttr { expr, span })
    }

    fn option_prop(&mut self) -> Attribute {
        let lead = self.span();
        self.bump(); // option
        let kind = match self.cur() {
            TokenKind::Env => {
                self.bump();
                if !self.eat(&TokenKind::Eq) {
                    self.error_here("expected `=` after `env`");
                }
                OptionKind::Env(self.string().0)
            }
            TokenKind::Modules => {
                self.bump();
                OptionKind::Modules
            }
            TokenKind::DefconfigList => {
                self.bump();
                OptionKind::DefconfigList
            }
            TokenKind::AllnoconfigY => {
                self.bump();
                OptionKind::AllnoconfigY
            }
            _ => {
                self.error_here("unrecognized option");
                self.sync_to_line_start();
                return Attribute::Option(OptionAttr {
                    kind: OptionKind::Modules,
                    span: lead,
                });
            }
        };
        let span = lead.merge(self.span());
        self.end_of_line();
        Attribute::Option(OptionAttr { kind, span })
    }

    fn help_prop(&mut self) -> Attribute {
        let lead = self.span();
        self.bump(); // help
        let body_start = self.sync_to_line_start();
        let text = self.collect_help(body_start);
        let span = Span::new(lead.start, body_start + text.len());
        Attribute::Help(HelpAttr { text, span })
    }

    /// Gather the indented body that follows a `help` line. The first
    /// non-blank line fixes the reference indentation; the body runs
    /// until a non-blank line indented less than that. An unindented
    /// first line means there is no body at all.
    fn collect_help(&mut self, body_start: usize) -> String {
        let mut body = String::new();
        let mut base_indent: Option<usize> = None;
        let mut consumed = body_start;

        for raw in self.source[body_start..].split_inclusive('\n') {
            let line = raw.trim_end_matches(|c| c == '\n' || c == '\r');
            let stripped = line.trim_start();
            if stripped.is_empty() {
                consumed += raw.len();
                // Blank lines before the body starts are not part of it.
                if base_indent.is_some() {
                    body.push('\n');
                }
                continue;
            }
            let indent = line.len() - stripped.len();
            match base_indent {
                None if indent == 0 => break,
                None => base_indent = Some(indent),
                Some(base) if indent < base => break,
                Some(_) => {}
            }
            consumed += raw.len();
            body.push_str(&line[base_indent.unwrap_or(0)..]);
            body.push('\n');
        }

        // Drop the tokens the body swallowed.
        while self
            .tokens
            .get(self.cursor)
            .is_some_and(|t| t.span.start < consumed)
        {
            self.bump();
        }

        body.truncate(body.trim_end().len());
        body
    }

    // -- compound blocks ----------------------------------------------------

    fn choice_block(&mut self) -> Entry {
        let lead = self.span();
        self.bump(); // choice
        let name = match self.cur().clone() {
            // Named choices can be extended from several blocks.
            TokenKind::Ident(n) => {
                self.bump();
                Some(n)
            }
            _ => None,
        };
        self.end_of_line();

        let mut attributes = Vec::new();
        loop {
            self.skip_blank_lines();
            match self.cur() {
                TokenKind::Bool => attributes.push(self.type_prop(TypeKind::Bool)),
                TokenKind::Tristate => attributes.push(self.type_prop(TypeKind::Tristate)),
                TokenKind::Prompt => attributes.push(self.prompt_prop()),
                TokenKind::Default => attributes.push(self.default_prop(None)),
                TokenKind::Depends => attributes.push(self.depends_prop()),
                TokenKind::Help => attributes.push(self.help_prop()),
                TokenKind::Optional => {
                    let span = self.span();
                    self.bump();
                    self.end_of_line();
                    attributes.push(Attribute::Optional(span));
                }
                _ => break,
            }
        }

        let entries = self.block_items(BlockEnd::Choice);
        let end_span = self.close_block(&TokenKind::EndChoice, "endchoice");

        Entry::Choice(ChoiceEntry {
            name,
            attributes,
            entries,
            span: lead.merge(end_span),
        })
    }

    fn menu_block(&mut self) -> Entry {
        let lead = self.span();
        self.bump(); // menu
        let (prompt, prompt_span) = self.string();
        self.end_of_line();

        let attributes = self.menu_comment_props();
        let entries = self.block_items(BlockEnd::Menu);
        let end_span = self.close_block(&TokenKind::EndMenu, "endmenu");

        Entry::Menu(MenuEntry {
            prompt,
            prompt_span,
            attributes,
            entries,
            span: lead.merge(end_span),
        })
    }

    fn comment_block(&mut self) -> Entry {
        let lead = self.span();
        self.bump(); // comment
        let (prompt, prompt_span) = self.string();
        self.end_of_line();

        let attributes = self.menu_comment_props();
        let span = lead.merge(attributes.last().map(prop_span).unwrap_or(prompt_span));
        Entry::Comment(CommentEntry {
            prompt,
            prompt_span,
            attributes,
            span,
        })
    }

    /// Menus and comments only take `depends on` and `visible if`.
    fn menu_comment_props(&mut self) -> Vec<Attribute> {
        let mut props = Vec::new();
        loop {
            self.skip_blank_lines();
            match self.cur() {
                TokenKind::Depends => props.push(self.depends_prop()),
                TokenKind::Visible => props.push(self.visible_prop()),
                _ => return props,
            }
        }
    }

    fn if_block(&mut self) -> Entry {
        let lead = self.span();
        self.bump(); // if
        let condition = self.expr();
        self.end_of_line();

        let entries = self.block_items(BlockEnd::If);
        let end_span = self.close_block(&TokenKind::EndIf, "endif");

        Entry::If(IfEntry {
            condition,
            entries,
            span: lead.merge(end_span),
        })
    }

    fn source_line(&mut self) -> Entry {
        let lead = self.span();
        self.bump(); // source
        let (path, path_span) = self.string();
        self.end_of_line();
        Entry::Source(SourceEntry {
            path,
            path_span,
            span: lead.merge(path_span),
        })
    }

    fn mainmenu_line(&mut self) -> Entry {
        let lead = self.span();
        self.bump(); // mainmenu
        let (prompt, prompt_span) = self.string();
        self.end_of_line();
        Entry::MainMenu(MainMenuEntry {
            prompt,
            prompt_span,
            span: lead.merge(prompt_span),
        })
    }

    // -- expressions --------------------------------------------------------
    //
    // Binding power, loosest first: `||` (1), `&&` (2); relations and
    // unary `!` bind tighter and live in relational_expr/operand.

    fn expr(&mut self) -> RawExpr {
        self.binary_expr(0)
    }

    fn binary_expr(&mut self, min_bp: u8) -> RawExpr {
        let mut lhs = self.relational_expr();
        loop {
            let bp = match self.cur() {
                TokenKind::Or => 1,
                TokenKind::And => 2,
                _ => break,
            };
            if bp < min_bp {
                break;
            }
            let is_and = *self.cur() == TokenKind::And;
            self.bump();
            let rhs = self.binary_expr(bp + 1);
            lhs = if is_and {
                RawExpr::And(Box::new(lhs), Box::new(rhs))
            } else {
                RawExpr::Or(Box::new(lhs), Box::new(rhs))
            };
        }
        lhs
    }

    fn relational_expr(&mut self) -> RawExpr {
        let lhs = self.operand();
        let build: fn(Box<RawExpr>, Box<RawExpr>) -> RawExpr = match self.cur() {
            TokenKind::Eq => RawExpr::Eq,
            TokenKind::NotEq => RawExpr::NotEq,
            TokenKind::Less => RawExpr::Less,
            TokenKind::LessEq => RawExpr::LessEq,
            TokenKind::Greater => RawExpr::Greater,
            TokenKind::GreaterEq => RawExpr::GreaterEq,
            _ => return lhs,
        };
        self.bump();
        let rhs = self.operand();
        build(Box::new(lhs), Box::new(rhs))
    }

    fn operand(&mut self) -> RawExpr {
        match self.cur().clone() {
            TokenKind::Not => {
                self.bump();
                RawExpr::Not(Box::new(self.operand()))
            }
            TokenKind::OpenParen => {
                self.bump();
                let inner = self.expr();
                if !self.eat(&TokenKind::CloseParen) {
                    self.error_here("expected `)`");
                }
                RawExpr::Paren(Box::new(inner))
            }
            TokenKind::StringLit(text) => {
                let span = self.span();
                self.bump();
                RawExpr::StringLit(text, span)
            }
            TokenKind::Ident(name) => {
                let span = self.span();
                self.bump();
                RawExpr::Symbol(name, span)
            }
            ref tok => match keyword_name(tok) {
                Some(name) => {
                    let span = self.span();
                    self.bump();
                    RawExpr::Symbol(name.to_string(), span)
                }
                None => {
                    self.error_here("expected expression");
                    RawExpr::Symbol(String::new(), self.span())
                }
            },
        }
    }

    // -- token helpers ------------------------------------------------------

    fn ident(&mut self) -> (String, Span) {
        let span = self.span();
        match self.cur().clone() {
            TokenKind::Ident(name) => {
                self.bump();
                (name, span)
            }
            ref tok => match keyword_name(tok) {
                Some(name) => {
                    self.bump();
                    (name.to_string(), span)
                }
                None => {
                    self.error_here("expected identifier");
                    (String::new(), span)
                }
            },
        }
    }

    fn string(&mut self) -> (String, Span) {
        let span = self.span();
        match self.cur().clone() {
            // Unquoted prompts and paths are tolerated.
            TokenKind::StringLit(text) | TokenKind::Ident(text) => {
                self.bump();
                (text, span)
            }
            _ => {
                self.error_here("expected string");
                (String::new(), span)
            }
        }
    }

    fn if_clause(&mut self) -> Option<RawExpr> {
        if self.eat(&TokenKind::If) {
            Some(self.expr())
        } else {
            None
        }
    }
}

/// Keywords that double as plain symbol names in expression position.
fn keyword_name(tok: &TokenKind) -> Option<&'static str> {
    Some(match tok {
        TokenKind::On => "on",
        TokenKind::Env => "env",
        TokenKind::Modules => "modules",
        TokenKind::Optional => "optional",
        TokenKind::Bool => "bool",
        TokenKind::Tristate => "tristate",
        TokenKind::Int => "int",
        TokenKind::Hex => "hex",
        _ => return None,
    })
}

fn type_kind_of(tok: &TokenKind) -> Option<TypeKind> {
    Some(match tok {
        TokenKind::Bool => TypeKind::Bool,
        TokenKind::Tristate => TypeKind::Tristate,
        TokenKind::StringType => TypeKind::String,
        TokenKind::Int => TypeKind::Int,
        TokenKind::Hex => TypeKind::Hex,
        _ => return None,
    })
}

fn prop_span(a: &Attribute) -> Span {
    match a {
        Attribute::Type(t) => t.span,
        Attribute::Prompt(p) => p.span,
        Attribute::Default(d) => d.span,
        Attribute::DefType(d) => d.span,
        Attribute::DependsOn(d) => d.span,
        Attribute::Select(s) | Attribute::Imply(s) => s.span,
        Attribute::VisibleIf(v) => v.span,
        Attribute::Range(r) => r.span,
        Attribute::Help(h) => h.span,
        Attribute::Option(o) => o.span,
        Attribute::Optional(s) => *s,
    }
}
