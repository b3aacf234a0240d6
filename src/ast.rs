/// Byte-offset span in source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn merge(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

/// Byte-offset to line-number lookup for diagnostics.
#[derive(Debug, Clone)]
pub struct LineIndex {
    /// Offset of every `\n` in the source, ascending.
    newlines: Vec<usize>,
}

impl LineIndex {
    pub fn new(text: &str) -> Self {
        let newlines = text
            .bytes()
            .enumerate()
            .filter_map(|(i, b)| (b == b'\n').then_some(i))
            .collect();
        Self { newlines }
    }

    /// 1-based line containing the byte at `offset`.
    pub fn line_number(&self, offset: usize) -> u32 {
        self.newlines.partition_point(|&nl| nl < offset) as u32 + 1
    }
}

// ---------------------------------------------------------------------------
// Parse-tree types. One `KconfigFile` per physical file; `source` entries
// are inlined later, when the model is built.
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct KconfigFile {
    pub entries: Vec<Entry>,
}

#[derive(Debug, Clone)]
pub enum Entry {
    Config(ConfigEntry),
    MenuConfig(ConfigEntry),
    Choice(ChoiceEntry),
    Comment(CommentEntry),
    Menu(MenuEntry),
    If(IfEntry),
    Source(SourceEntry),
    MainMenu(MainMenuEntry),
}

/// Shared between `config` and `menuconfig`.
#[derive(Debug, Clone)]
pub struct ConfigEntry {
    pub name: String,
    pub name_span: Span,
    pub attributes: Vec<Attribute>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum Attribute {
    Type(TypeAttr),
    Prompt(PromptAttr),
    Default(DefaultAttr),
    DefType(DefTypeAttr),
    DependsOn(DependsOnAttr),
    Select(SelectImplyAttr),
    Imply(SelectImplyAttr),
    VisibleIf(VisibleIfAttr),
    Range(RangeAttr),
    Help(HelpAttr),
    Option(OptionAttr),
    Optional(Span),
}

#[derive(Debug, Clone)]
pub struct TypeAttr {
    pub kind: TypeKind,
    pub prompt: Option<PromptAttr>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    Bool,
    Tristate,
    String,
    Hex,
    Int,
}

impl TypeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TypeKind::Bool => "bool",
            TypeKind::Tristate => "tristate",
            TypeKind::String => "string",
            TypeKind::Hex => "hex",
            TypeKind::Int => "int",
        }
    }
}

#[derive(Debug, Clone)]
pub struct PromptAttr {
    pub text: String,
    pub text_span: Span,
    pub condition: Option<RawExpr>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct DefaultAttr {
    pub value: RawExpr,
    pub condition: Option<RawExpr>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct DefTypeAttr {
    pub kind: TypeKind,
    pub value: RawExpr,
    pub condition: Option<RawExpr>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct DependsOnAttr {
    pub expr: RawExpr,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct SelectImplyAttr {
    pub symbol: String,
    pub symbol_span: Span,
    pub condition: Option<RawExpr>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct VisibleIfAttr {
    pub expr: RawExpr,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct RangeAttr {
    pub low: RawExpr,
    pub high: RawExpr,
    pub condition: Option<RawExpr>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct HelpAttr {
    pub text: String,
    pub span: Span,
}

/// `option <flag>` property.
#[derive(Debug, Clone)]
pub struct OptionAttr {
    pub kind: OptionKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionKind {
    /// `option env="NAME"` — bind the symbol's default to an environment
    /// variable, captured at parse time.
    Env(String),
    /// `option modules`; only honored on the conventional `MODULES` symbol.
    Modules,
    /// `option defconfig_list` — the symbol's defaults name candidate
    /// defconfig paths.
    DefconfigList,
    /// `option allnoconfig_y` — forced to `y` under allnoconfig.
    AllnoconfigY,
}

// -- Compound entries -------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ChoiceEntry {
    /// Optional name (`choice FOO`); named choices can be extended from
    /// several blocks.
    pub name: Option<String>,
    pub attributes: Vec<Attribute>,
    pub entries: Vec<Entry>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct CommentEntry {
    pub prompt: String,
    pub prompt_span: Span,
    pub attributes: Vec<Attribute>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct MenuEntry {
    pub prompt: String,
    pub prompt_span: Span,
    pub attributes: Vec<Attribute>,
    pub entries: Vec<Entry>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct IfEntry {
    pub condition: RawExpr,
    pub entries: Vec<Entry>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct SourceEntry {
    pub path: String,
    pub path_span: Span,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct MainMenuEntry {
    pub prompt: String,
    pub prompt_span: Span,
    pub span: Span,
}

// -- Expressions ------------------------------------------------------------

/// Unresolved expression as parsed. Symbol names are plain strings here;
/// resolution against the symbol table happens during model construction.
#[derive(Debug, Clone)]
pub enum RawExpr {
    Symbol(String, Span),
    StringLit(String, Span),
    Not(Box<RawExpr>),
    And(Box<RawExpr>, Box<RawExpr>),
    Or(Box<RawExpr>, Box<RawExpr>),
    Eq(Box<RawExpr>, Box<RawExpr>),
    NotEq(Box<RawExpr>, Box<RawExpr>),
    Less(Box<RawExpr>, Box<RawExpr>),
    LessEq(Box<RawExpr>, Box<RawExpr>),
    Greater(Box<RawExpr>, Box<RawExpr>),
    GreaterEq(Box<RawExpr>, Box<RawExpr>),
    Paren(Box<RawExpr>),
}

impl RawExpr {
    pub fn span(&self) -> Span {
        match self {
            RawExpr::Symbol(_, s) | RawExpr::StringLit(_, s) => *s,
            RawExpr::Not(e) | RawExpr::Paren(e) => e.span(),
            RawExpr::And(a, b)
            | RawExpr::Or(a, b)
            | RawExpr::Eq(a, b)
            | RawExpr::NotEq(a, b)
            | RawExpr::Less(a, b)
            | RawExpr::LessEq(a, b)
            | RawExpr::Greater(a, b)
            | RawExpr::GreaterEq(a, b) => a.span().merge(b.span()),
        }
    }
}

// -- Parse diagnostics (errors / warnings) ----------------------------------

#[derive(Debug, Clone)]
pub struct ParseDiagnostic {
    pub message: String,
    pub span: Span,
    pub severity: DiagSeverity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagSeverity {
    Error,
    Warning,
}
