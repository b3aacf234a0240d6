//! Symbols, choices, and the item tree.
//!
//! These are the resolved model types the value engine runs over. The
//! structure is immutable after parsing; only the user-value slots and the
//! memoized evaluation caches mutate afterwards.

use std::cell::{Cell, RefCell};

use crate::expr::{Expr, Tristate};

index_vec::define_index_type! {
    /// Handle into the model's symbol table.
    pub struct SymbolId = u32;
}

index_vec::define_index_type! {
    /// Handle into the model's choice list.
    pub struct ChoiceId = u32;
}

index_vec::define_index_type! {
    /// Handle into the item tree.
    pub struct NodeId = u32;
}

index_vec::define_index_type! {
    /// Handle into the list of parsed files.
    pub struct FileId = u32;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Unknown,
    Bool,
    Tristate,
    String,
    Int,
    Hex,
}

impl SymbolKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SymbolKind::Unknown => "unknown",
            SymbolKind::Bool => "bool",
            SymbolKind::Tristate => "tristate",
            SymbolKind::String => "string",
            SymbolKind::Int => "int",
            SymbolKind::Hex => "hex",
        }
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, SymbolKind::Int | SymbolKind::Hex)
    }
}

/// The displayed value of a symbol: a tristate for bool/tristate kinds,
/// a string (in its written form) for string/int/hex and undefined kinds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SymbolValue {
    Tristate(Tristate),
    String(String),
}

impl SymbolValue {
    pub fn as_tristate(&self) -> Option<Tristate> {
        match self {
            SymbolValue::Tristate(t) => Some(*t),
            SymbolValue::String(_) => None,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            SymbolValue::Tristate(t) => t.as_str(),
            SymbolValue::String(s) => s,
        }
    }
}

/// A prompt with its fully propagated visibility condition (the written
/// condition ANDed with the node's dependencies and any enclosing
/// `visible if`).
#[derive(Debug, Clone)]
pub struct Prompt {
    pub text: String,
    pub(crate) cond: Option<Expr>,
}

/// One `default` clause, condition already ANDed with node dependencies.
#[derive(Debug, Clone)]
pub struct DefaultProp {
    pub value: Expr,
    pub cond: Option<Expr>,
}

/// One `select` or `imply` clause as written on the source symbol.
#[derive(Debug, Clone)]
pub struct SelectProp {
    pub target: SymbolId,
    pub cond: Option<Expr>,
}

/// One `range LO HI` clause for a numeric symbol.
#[derive(Debug, Clone)]
pub struct RangeProp {
    pub low: Expr,
    pub high: Expr,
    pub cond: Option<Expr>,
}

#[derive(Debug, Default)]
pub(crate) struct SymCache {
    pub epoch: u64,
    pub value: Option<SymbolValue>,
    pub vis: Option<Tristate>,
    /// Whether the symbol should appear in .config output; determined
    /// alongside the value.
    pub write: bool,
}

/// A named configuration option.
#[derive(Debug)]
pub struct Symbol {
    pub(crate) name: String,
    pub(crate) kind: SymbolKind,
    /// Menu nodes defining this symbol, in declaration order. Empty for
    /// symbols only referenced in expressions.
    pub(crate) nodes: Vec<NodeId>,
    pub(crate) defaults: Vec<DefaultProp>,
    pub(crate) selects: Vec<SelectProp>,
    pub(crate) implies: Vec<SelectProp>,
    pub(crate) ranges: Vec<RangeProp>,
    /// OR of `source && cond` for every `select` targeting this symbol.
    pub(crate) rev_dep: Expr,
    /// Same, for `imply`.
    pub(crate) weak_rev_dep: Expr,
    /// OR of the dependency conditions of all defining nodes.
    pub(crate) direct_deps: Expr,
    pub(crate) choice: Option<ChoiceId>,
    pub(crate) env_var: Option<String>,
    pub(crate) is_allnoconfig_y: bool,
    pub(crate) help: Option<String>,
    pub(crate) user_value: Option<String>,
    pub(crate) cache: RefCell<SymCache>,
    /// Set while this symbol's value is being computed; a re-entrant
    /// visit reads the symbol as `n` to break dependency cycles.
    pub(crate) visiting: Cell<bool>,
    pub(crate) cycle_logged: Cell<bool>,
}

impl Symbol {
    pub(crate) fn new(name: String) -> Self {
        Symbol {
            name,
            kind: SymbolKind::Unknown,
            nodes: Vec::new(),
            defaults: Vec::new(),
            selects: Vec::new(),
            implies: Vec::new(),
            ranges: Vec::new(),
            rev_dep: Expr::Tri(Tristate::No),
            weak_rev_dep: Expr::Tri(Tristate::No),
            direct_deps: Expr::Tri(Tristate::No),
            choice: None,
            env_var: None,
            is_allnoconfig_y: false,
            help: None,
            user_value: None,
            cache: RefCell::new(SymCache::default()),
            visiting: Cell::new(false),
            cycle_logged: Cell::new(false),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> SymbolKind {
        self.kind
    }

    /// True if the symbol appears in the item tree (as opposed to being
    /// auto-created by a reference in some expression).
    pub fn is_defined(&self) -> bool {
        !self.nodes.is_empty()
    }

    pub fn help(&self) -> Option<&str> {
        self.help.as_deref()
    }

    pub fn user_value(&self) -> Option<&str> {
        self.user_value.as_deref()
    }

    pub fn env_var(&self) -> Option<&str> {
        self.env_var.as_deref()
    }

    pub fn is_allnoconfig_y(&self) -> bool {
        self.is_allnoconfig_y
    }

    pub fn defaults(&self) -> &[DefaultProp] {
        &self.defaults
    }

    pub fn selects(&self) -> &[SelectProp] {
        &self.selects
    }

    pub fn implies(&self) -> &[SelectProp] {
        &self.implies
    }

    pub fn ranges(&self) -> &[RangeProp] {
        &self.ranges
    }

    /// The choice this symbol is a member of, if any.
    pub fn choice(&self) -> Option<ChoiceId> {
        self.choice
    }
}

#[derive(Debug, Default)]
pub(crate) struct ChoiceCache {
    pub epoch: u64,
    pub mode: Option<Tristate>,
    pub vis: Option<Tristate>,
    /// `Some(None)` caches "no selection".
    pub selection: Option<Option<SymbolId>>,
}

/// A choice group. Its mode is a tristate: in `y` mode exactly one member
/// is elected, in `m` mode members resolve independently capped at `m`,
/// in `n` mode all members are `n`.
#[derive(Debug)]
pub struct Choice {
    pub(crate) name: Option<String>,
    pub(crate) kind: SymbolKind,
    pub(crate) members: Vec<SymbolId>,
    /// `default` clauses naming member symbols.
    pub(crate) defaults: Vec<(SymbolId, Option<Expr>)>,
    pub(crate) is_optional: bool,
    pub(crate) nodes: Vec<NodeId>,
    pub(crate) user_value: Option<Tristate>,
    pub(crate) user_selection: Option<SymbolId>,
    pub(crate) cache: RefCell<ChoiceCache>,
}

impl Choice {
    pub(crate) fn new(name: Option<String>) -> Self {
        Choice {
            name,
            kind: SymbolKind::Unknown,
            members: Vec::new(),
            defaults: Vec::new(),
            is_optional: false,
            nodes: Vec::new(),
            user_value: None,
            user_selection: None,
            cache: RefCell::new(ChoiceCache::default()),
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn kind(&self) -> SymbolKind {
        self.kind
    }

    pub fn members(&self) -> &[SymbolId] {
        &self.members
    }

    pub fn is_optional(&self) -> bool {
        self.is_optional
    }

    /// The mode the user asked for, before visibility clamping.
    pub fn user_mode(&self) -> Option<Tristate> {
        self.user_value
    }

    /// The member the user elected, remembered across mode changes.
    pub fn user_selection(&self) -> Option<SymbolId> {
        self.user_selection
    }
}

/// What an item-tree node stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Item {
    Root,
    Symbol(SymbolId),
    Choice(ChoiceId),
    Menu,
    Comment,
}

/// A node in the ordered item tree. In-order traversal is display order.
/// `if` blocks are flattened into child conditions at parse time and get
/// no node.
#[derive(Debug)]
pub struct Node {
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) item: Item,
    pub(crate) prompt: Option<Prompt>,
    /// AND of all enclosing `if`/`menu`/`depends on` conditions.
    pub(crate) dep: Option<Expr>,
    /// `visible if` on menus.
    pub(crate) visible_if: Option<Expr>,
    pub(crate) is_menuconfig: bool,
    pub(crate) file: FileId,
    pub(crate) line: u32,
}

impl Node {
    pub fn item(&self) -> Item {
        self.item
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn prompt(&self) -> Option<&str> {
        self.prompt.as_ref().map(|p| p.text.as_str())
    }

    pub fn is_menuconfig(&self) -> bool {
        self.is_menuconfig
    }

    pub fn line(&self) -> u32 {
        self.line
    }

    pub(crate) fn file(&self) -> FileId {
        self.file
    }
}
