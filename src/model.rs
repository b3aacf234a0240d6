//! Model construction and the value engine.
//!
//! `Model::load` parses a tree of Kconfig files rooted at one top-level
//! file into an immutable structure: a symbol table, choice groups, and
//! the ordered item tree. Dependencies from enclosing `if`/`menu` blocks
//! and `depends on` lines are propagated into property conditions at
//! build time, and `select`/`imply` clauses accumulate into reverse
//! dependency expressions on their targets, mirroring the inner workings
//! of the C tools.
//!
//! After construction only user-value slots mutate. Every mutation bumps
//! a global epoch; values, visibilities, and choice elections are cached
//! per epoch and recomputed lazily.

use std::cell::Cell;
use std::path::{Path, PathBuf};

use index_vec::IndexVec;
use rustc_hash::FxHashMap;

use crate::ast::{
    Attribute, ChoiceEntry, CommentEntry, ConfigEntry, DiagSeverity, Entry, IfEntry, LineIndex,
    MenuEntry, OptionKind, RawExpr,
};
use crate::expr::{self, and_opt, eval, eval_cond, parse_int, Expr, Relation, Tristate};
use crate::lexer::Lexer;
use crate::parser;
use crate::symbol::{
    Choice, ChoiceId, DefaultProp, FileId, Item, Node, NodeId, Prompt, RangeProp, SelectProp,
    Symbol, SymbolId, SymbolKind, SymbolValue,
};

/// The conventional modules symbol. `option modules` on any other symbol
/// only draws a warning.
const MODULES_NAME: &str = "MODULES";

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{}:{line}: {message}", file.display())]
    Syntax {
        file: PathBuf,
        line: u32,
        message: String,
    },
    #[error("{}:{line}: {message}", file.display())]
    Semantic {
        file: PathBuf,
        line: u32,
        message: String,
    },
    #[error("could not read {}", file.display())]
    Io {
        file: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A non-fatal problem accumulated on the model.
#[derive(Debug, Clone)]
pub struct Warning {
    pub message: String,
    pub file: Option<PathBuf>,
    pub line: Option<u32>,
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.file, self.line) {
            (Some(file), Some(line)) => {
                write!(f, "{}:{}: warning: {}", file.display(), line, self.message)
            }
            (Some(file), None) => write!(f, "{}: warning: {}", file.display(), self.message),
            _ => write!(f, "warning: {}", self.message),
        }
    }
}

#[derive(Debug)]
pub struct Model {
    pub(crate) symbols: IndexVec<SymbolId, Symbol>,
    by_name: FxHashMap<String, SymbolId>,
    /// Symbols with at least one defining node, in declaration order.
    defined_syms: Vec<SymbolId>,
    pub(crate) choices: IndexVec<ChoiceId, Choice>,
    named_choices: FxHashMap<String, ChoiceId>,
    pub(crate) nodes: IndexVec<NodeId, Node>,
    root: NodeId,
    files: IndexVec<FileId, PathBuf>,
    base_dir: PathBuf,
    mainmenu: Option<String>,
    modules: SymbolId,
    defconfig_list: Option<SymbolId>,
    warnings: Vec<Warning>,
    log_warnings: bool,
    log_undef_assign: bool,
    epoch: Cell<u64>,
}

impl Model {
    /// Parse the Kconfig tree rooted at `path` into a model.
    ///
    /// The process environment is consulted here, once, for `$VAR`
    /// expansion and `option env=`; later environment changes do not
    /// affect the model.
    pub fn load(path: impl AsRef<Path>) -> Result<Model, Error> {
        let path = path.as_ref();
        let base_dir = path.parent().unwrap_or(Path::new(".")).to_path_buf();

        let mut nodes = IndexVec::new();
        let root = nodes.push(Node {
            parent: None,
            children: Vec::new(),
            item: Item::Root,
            prompt: None,
            dep: None,
            visible_if: None,
            is_menuconfig: false,
            file: FileId::from_raw(0),
            line: 1,
        });

        let mut model = Model {
            symbols: IndexVec::new(),
            by_name: FxHashMap::default(),
            defined_syms: Vec::new(),
            choices: IndexVec::new(),
            named_choices: FxHashMap::default(),
            nodes,
            root,
            files: IndexVec::new(),
            base_dir,
            mainmenu: None,
            modules: SymbolId::from_raw(0),
            defconfig_list: None,
            warnings: Vec::new(),
            log_warnings: true,
            log_undef_assign: false,
            epoch: Cell::new(1),
        };
        model.modules = model.intern(MODULES_NAME);

        let mut include_stack = Vec::new();
        model.parse_file(path, root, &None, &None, &mut include_stack)?;
        model.finalize_choices();
        Ok(model)
    }

    // -----------------------------------------------------------------------
    // Construction
    // -----------------------------------------------------------------------

    fn parse_file(
        &mut self,
        path: &Path,
        parent: NodeId,
        dep: &Option<Expr>,
        visible_if: &Option<Expr>,
        include_stack: &mut Vec<PathBuf>,
    ) -> Result<(), Error> {
        let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        if include_stack.contains(&canonical) {
            return Err(Error::Semantic {
                file: path.to_path_buf(),
                line: 1,
                message: format!("inclusion cycle through {}", path.display()),
            });
        }

        let source = std::fs::read_to_string(path).map_err(|e| Error::Io {
            file: path.to_path_buf(),
            source: e,
        })?;

        let tokens = Lexer::new(&source).tokenize();
        let result = parser::parse(&source, tokens);
        let lines = LineIndex::new(&source);

        for diag in &result.diagnostics {
            let line = lines.line_number(diag.span.start);
            match diag.severity {
                DiagSeverity::Error => {
                    return Err(Error::Syntax {
                        file: path.to_path_buf(),
                        line,
                        message: diag.message.clone(),
                    });
                }
                DiagSeverity::Warning => {
                    self.warn_at(diag.message.clone(), Some(path.to_path_buf()), Some(line));
                }
            }
        }

        let file = self.files.push(path.to_path_buf());

        include_stack.push(canonical);
        let ret = self.build_entries(
            &result.file.entries,
            file,
            &lines,
            parent,
            dep,
            visible_if,
            include_stack,
        );
        include_stack.pop();
        ret
    }

    #[allow(clippy::too_many_arguments)]
    fn build_entries(
        &mut self,
        entries: &[Entry],
        file: FileId,
        lines: &LineIndex,
        parent: NodeId,
        dep: &Option<Expr>,
        visible_if: &Option<Expr>,
        include_stack: &mut Vec<PathBuf>,
    ) -> Result<(), Error> {
        for entry in entries {
            match entry {
                Entry::Config(c) => {
                    self.build_config(c, false, file, lines, parent, dep, visible_if)?;
                }
                Entry::MenuConfig(c) => {
                    self.build_config(c, true, file, lines, parent, dep, visible_if)?;
                }
                Entry::Choice(c) => {
                    self.build_choice(c, file, lines, parent, dep, visible_if, include_stack)?;
                }
                Entry::Menu(m) => {
                    self.build_menu(m, file, lines, parent, dep, visible_if, include_stack)?;
                }
                Entry::Comment(c) => {
                    self.build_comment(c, file, lines, parent, dep);
                }
                Entry::If(i) => {
                    self.build_if(i, file, lines, parent, dep, visible_if, include_stack)?;
                }
                Entry::Source(s) => {
                    let sub = Path::new(&s.path);
                    let resolved = if sub.is_absolute() {
                        sub.to_path_buf()
                    } else {
                        self.base_dir.join(sub)
                    };
                    self.parse_file(&resolved, parent, dep, visible_if, include_stack)?;
                }
                Entry::MainMenu(m) => {
                    self.mainmenu = Some(m.prompt.clone());
                }
            }
        }
        Ok(())
    }

    fn add_node(&mut self, parent: NodeId, item: Item, file: FileId, line: u32) -> NodeId {
        let id = self.nodes.push(Node {
            parent: Some(parent),
            children: Vec::new(),
            item,
            prompt: None,
            dep: None,
            visible_if: None,
            is_menuconfig: false,
            file,
            line,
        });
        self.nodes[parent].children.push(id);
        id
    }

    #[allow(clippy::too_many_arguments)]
    fn build_config(
        &mut self,
        c: &ConfigEntry,
        is_menuconfig: bool,
        file: FileId,
        lines: &LineIndex,
        parent: NodeId,
        dep: &Option<Expr>,
        visible_if: &Option<Expr>,
    ) -> Result<(), Error> {
        let sym_id = self.intern(&c.name);
        let line = lines.line_number(c.name_span.start);
        let node_id = self.add_node(parent, Item::Symbol(sym_id), file, line);
        self.nodes[node_id].is_menuconfig = is_menuconfig;

        let mut local_dep: Option<Expr> = None;
        let mut prompt: Option<(String, Option<Expr>)> = None;
        let mut defaults: Vec<(Expr, Option<Expr>)> = Vec::new();
        let mut selects: Vec<(SymbolId, Option<Expr>)> = Vec::new();
        let mut implies: Vec<(SymbolId, Option<Expr>)> = Vec::new();
        let mut ranges: Vec<(Expr, Expr, Option<Expr>)> = Vec::new();
        let mut help: Option<String> = None;

        for attr in &c.attributes {
            match attr {
                Attribute::Type(t) => {
                    self.set_kind(sym_id, t.kind.into(), file, lines, t.span.start)?;
                    if let Some(p) = &t.prompt {
                        let cond = p.condition.as_ref().map(|e| self.resolve_expr(e, true));
                        prompt = Some((p.text.clone(), cond));
                    }
                }
                Attribute::Prompt(p) => {
                    // A later `prompt` overrides an earlier one within one
                    // definition of the symbol.
                    let cond = p.condition.as_ref().map(|e| self.resolve_expr(e, true));
                    prompt = Some((p.text.clone(), cond));
                }
                Attribute::Default(d) => {
                    let value = self.resolve_expr(&d.value, false);
                    let cond = d.condition.as_ref().map(|e| self.resolve_expr(e, true));
                    defaults.push((value, cond));
                }
                Attribute::DefType(d) => {
                    self.set_kind(sym_id, d.kind.into(), file, lines, d.span.start)?;
                    let value = self.resolve_expr(&d.value, false);
                    let cond = d.condition.as_ref().map(|e| self.resolve_expr(e, true));
                    defaults.push((value, cond));
                }
                Attribute::DependsOn(d) => {
                    let e = self.resolve_expr(&d.expr, true);
                    local_dep = and_opt(local_dep, Some(e));
                }
                Attribute::Select(s) => {
                    // `select y` and friends are meaningless; skip them.
                    if Tristate::from_str(&s.symbol).is_none() {
                        let target = self.intern(&s.symbol);
                        let cond = s.condition.as_ref().map(|e| self.resolve_expr(e, true));
                        selects.push((target, cond));
                    }
                }
                Attribute::Imply(i) => {
                    if Tristate::from_str(&i.symbol).is_none() {
                        let target = self.intern(&i.symbol);
                        let cond = i.condition.as_ref().map(|e| self.resolve_expr(e, true));
                        implies.push((target, cond));
                    }
                }
                Attribute::Range(r) => {
                    let low = self.resolve_expr(&r.low, false);
                    let high = self.resolve_expr(&r.high, false);
                    let cond = r.condition.as_ref().map(|e| self.resolve_expr(e, true));
                    ranges.push((low, high, cond));
                }
                Attribute::Help(h) => {
                    help = Some(h.text.clone());
                }
                Attribute::Option(o) => {
                    let line = lines.line_number(o.span.start);
                    match &o.kind {
                        OptionKind::Env(var) => {
                            self.symbols[sym_id].env_var = Some(var.clone());
                            match std::env::var(var) {
                                Ok(val) => defaults.push((Expr::Literal(val), None)),
                                Err(_) => self.warn_at(
                                    format!(
                                        "symbol {} references unset environment variable {}",
                                        c.name, var
                                    ),
                                    Some(self.files[file].clone()),
                                    Some(line),
                                ),
                            }
                        }
                        OptionKind::Modules => {
                            if c.name != MODULES_NAME {
                                self.warn_at(
                                    format!(
                                        "'option modules' on {} has no effect; the modules \
                                         symbol is always {}",
                                        c.name, MODULES_NAME
                                    ),
                                    Some(self.files[file].clone()),
                                    Some(line),
                                );
                            }
                        }
                        OptionKind::DefconfigList => {
                            if self.defconfig_list.is_none() {
                                self.defconfig_list = Some(sym_id);
                            } else {
                                self.warn_at(
                                    format!(
                                        "'option defconfig_list' set on multiple symbols; \
                                         keeping the first, ignoring {}",
                                        c.name
                                    ),
                                    Some(self.files[file].clone()),
                                    Some(line),
                                );
                            }
                        }
                        OptionKind::AllnoconfigY => {
                            self.symbols[sym_id].is_allnoconfig_y = true;
                        }
                    }
                }
                Attribute::VisibleIf(v) => {
                    let line = lines.line_number(v.span.start);
                    self.warn_at(
                        "'visible if' is only valid on menus".to_string(),
                        Some(self.files[file].clone()),
                        Some(line),
                    );
                }
                Attribute::Optional(span) => {
                    let line = lines.line_number(span.start);
                    self.warn_at(
                        "'optional' is only valid for choices".to_string(),
                        Some(self.files[file].clone()),
                        Some(line),
                    );
                }
            }
        }

        let node_dep = and_opt(local_dep, dep.clone());
        self.nodes[node_id].dep = node_dep.clone();

        // Direct dependencies accumulate as an OR over all defining nodes;
        // a node without conditions makes them unconditionally met.
        let dep_or = node_dep.clone().unwrap_or(Expr::Tri(Tristate::Yes));
        let old = self.symbols[sym_id].direct_deps.clone();
        self.symbols[sym_id].direct_deps = Expr::or(old, dep_or);

        if let Some((text, cond)) = prompt {
            let full = and_opt(and_opt(cond, node_dep.clone()), visible_if.clone());
            self.nodes[node_id].prompt = Some(Prompt { text, cond: full });
        }

        for (value, cond) in defaults {
            let cond = and_opt(cond, node_dep.clone());
            self.symbols[sym_id].defaults.push(DefaultProp { value, cond });
        }
        for (low, high, cond) in ranges {
            let cond = and_opt(cond, node_dep.clone());
            self.symbols[sym_id].ranges.push(RangeProp { low, high, cond });
        }
        for (target, cond) in selects {
            let cond = and_opt(cond, node_dep.clone());
            self.symbols[sym_id].selects.push(SelectProp {
                target,
                cond: cond.clone(),
            });
            let link = Expr::and(
                Expr::Symbol(sym_id),
                cond.unwrap_or(Expr::Tri(Tristate::Yes)),
            );
            let old = self.symbols[target].rev_dep.clone();
            self.symbols[target].rev_dep = Expr::or(old, link);
        }
        for (target, cond) in implies {
            let cond = and_opt(cond, node_dep.clone());
            self.symbols[sym_id].implies.push(SelectProp {
                target,
                cond: cond.clone(),
            });
            let link = Expr::and(
                Expr::Symbol(sym_id),
                cond.unwrap_or(Expr::Tri(Tristate::Yes)),
            );
            let old = self.symbols[target].weak_rev_dep.clone();
            self.symbols[target].weak_rev_dep = Expr::or(old, link);
        }

        if self.symbols[sym_id].help.is_none() {
            self.symbols[sym_id].help = help;
        }

        if self.symbols[sym_id].nodes.is_empty() {
            self.defined_syms.push(sym_id);
        }
        self.symbols[sym_id].nodes.push(node_id);
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn build_choice(
        &mut self,
        c: &ChoiceEntry,
        file: FileId,
        lines: &LineIndex,
        parent: NodeId,
        dep: &Option<Expr>,
        visible_if: &Option<Expr>,
        include_stack: &mut Vec<PathBuf>,
    ) -> Result<(), Error> {
        let choice_id = match &c.name {
            Some(name) => match self.named_choices.get(name) {
                Some(&id) => id,
                None => {
                    let id = self.choices.push(Choice::new(Some(name.clone())));
                    self.named_choices.insert(name.clone(), id);
                    id
                }
            },
            None => self.choices.push(Choice::new(None)),
        };

        let line = lines.line_number(c.span.start);
        let node_id = self.add_node(parent, Item::Choice(choice_id), file, line);

        let mut local_dep: Option<Expr> = None;
        let mut prompt: Option<(String, Option<Expr>)> = None;
        let mut defaults: Vec<(SymbolId, Option<Expr>)> = Vec::new();

        for attr in &c.attributes {
            match attr {
                Attribute::Type(t) => {
                    self.choices[choice_id].kind = t.kind.into();
                    if let Some(p) = &t.prompt {
                        let cond = p.condition.as_ref().map(|e| self.resolve_expr(e, true));
                        prompt = Some((p.text.clone(), cond));
                    }
                }
                Attribute::Prompt(p) => {
                    let cond = p.condition.as_ref().map(|e| self.resolve_expr(e, true));
                    prompt = Some((p.text.clone(), cond));
                }
                Attribute::Default(d) => {
                    // Choice defaults name a member symbol.
                    match symbol_atom(&d.value) {
                        Some(name) => {
                            let target = self.intern(name);
                            let cond = d.condition.as_ref().map(|e| self.resolve_expr(e, true));
                            defaults.push((target, cond));
                        }
                        None => {
                            let line = lines.line_number(d.span.start);
                            self.warn_at(
                                "choice default must name a symbol".to_string(),
                                Some(self.files[file].clone()),
                                Some(line),
                            );
                        }
                    }
                }
                Attribute::DependsOn(d) => {
                    let e = self.resolve_expr(&d.expr, true);
                    local_dep = and_opt(local_dep, Some(e));
                }
                Attribute::Optional(_) => {
                    self.choices[choice_id].is_optional = true;
                }
                Attribute::Help(_) => {}
                _ => {
                    let line = lines.line_number(c.span.start);
                    self.warn_at(
                        "unsupported property on choice".to_string(),
                        Some(self.files[file].clone()),
                        Some(line),
                    );
                }
            }
        }

        let node_dep = and_opt(local_dep, dep.clone());
        self.nodes[node_id].dep = node_dep.clone();

        if let Some((text, cond)) = prompt {
            let full = and_opt(and_opt(cond, node_dep.clone()), visible_if.clone());
            self.nodes[node_id].prompt = Some(Prompt { text, cond: full });
        }
        for (target, cond) in defaults {
            let cond = and_opt(cond, node_dep.clone());
            self.choices[choice_id].defaults.push((target, cond));
        }
        self.choices[choice_id].nodes.push(node_id);

        self.build_entries(
            &c.entries,
            file,
            lines,
            node_id,
            &node_dep,
            visible_if,
            include_stack,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn build_menu(
        &mut self,
        m: &MenuEntry,
        file: FileId,
        lines: &LineIndex,
        parent: NodeId,
        dep: &Option<Expr>,
        visible_if: &Option<Expr>,
        include_stack: &mut Vec<PathBuf>,
    ) -> Result<(), Error> {
        let line = lines.line_number(m.prompt_span.start);
        let node_id = self.add_node(parent, Item::Menu, file, line);

        let mut local_dep: Option<Expr> = None;
        let mut local_vis: Option<Expr> = None;
        for attr in &m.attributes {
            match attr {
                Attribute::DependsOn(d) => {
                    let e = self.resolve_expr(&d.expr, true);
                    local_dep = and_opt(local_dep, Some(e));
                }
                Attribute::VisibleIf(v) => {
                    let e = self.resolve_expr(&v.expr, true);
                    local_vis = and_opt(local_vis, Some(e));
                }
                _ => {}
            }
        }

        let node_dep = and_opt(local_dep, dep.clone());
        self.nodes[node_id].dep = node_dep.clone();
        self.nodes[node_id].visible_if = local_vis.clone();
        self.nodes[node_id].prompt = Some(Prompt {
            text: m.prompt.clone(),
            cond: node_dep.clone(),
        });

        let child_vis = and_opt(visible_if.clone(), local_vis);
        self.build_entries(
            &m.entries,
            file,
            lines,
            node_id,
            &node_dep,
            &child_vis,
            include_stack,
        )
    }

    fn build_comment(
        &mut self,
        c: &CommentEntry,
        file: FileId,
        lines: &LineIndex,
        parent: NodeId,
        dep: &Option<Expr>,
    ) {
        let line = lines.line_number(c.prompt_span.start);
        let node_id = self.add_node(parent, Item::Comment, file, line);

        let mut local_dep: Option<Expr> = None;
        for attr in &c.attributes {
            if let Attribute::DependsOn(d) = attr {
                let e = self.resolve_expr(&d.expr, true);
                local_dep = and_opt(local_dep, Some(e));
            }
        }
        let node_dep = and_opt(local_dep, dep.clone());
        self.nodes[node_id].dep = node_dep.clone();
        self.nodes[node_id].prompt = Some(Prompt {
            text: c.prompt.clone(),
            cond: node_dep,
        });
    }

    /// `if COND ... endif` leaves no node: the condition is ANDed into the
    /// dependency context of the children.
    #[allow(clippy::too_many_arguments)]
    fn build_if(
        &mut self,
        i: &IfEntry,
        file: FileId,
        lines: &LineIndex,
        parent: NodeId,
        dep: &Option<Expr>,
        visible_if: &Option<Expr>,
        include_stack: &mut Vec<PathBuf>,
    ) -> Result<(), Error> {
        let cond = self.resolve_expr(&i.condition, true);
        let child_dep = and_opt(dep.clone(), Some(cond));
        self.build_entries(
            &i.entries,
            file,
            lines,
            parent,
            &child_dep,
            visible_if,
            include_stack,
        )
    }

    fn set_kind(
        &mut self,
        id: SymbolId,
        kind: SymbolKind,
        file: FileId,
        lines: &LineIndex,
        offset: usize,
    ) -> Result<(), Error> {
        let current = self.symbols[id].kind;
        if current == SymbolKind::Unknown || current == kind {
            self.symbols[id].kind = kind;
            Ok(())
        } else {
            Err(Error::Semantic {
                file: self.files[file].clone(),
                line: lines.line_number(offset),
                message: format!(
                    "{} redeclared with type {}, already has type {}",
                    self.symbols[id].name,
                    kind.as_str(),
                    current.as_str()
                ),
            })
        }
    }

    /// Mark choice members and infer missing types, in both directions:
    /// an untyped choice takes the type of its first typed member, and
    /// untyped members take the choice's type.
    fn finalize_choices(&mut self) {
        for choice_id in (0..self.choices.len()).map(ChoiceId::from_usize) {
            let nodes = self.choices[choice_id].nodes.clone();
            for node in nodes {
                let children = self.nodes[node].children.clone();
                for child in children {
                    if let Item::Symbol(sym) = self.nodes[child].item {
                        if self.symbols[sym].choice.is_none() {
                            self.symbols[sym].choice = Some(choice_id);
                            self.choices[choice_id].members.push(sym);
                        }
                    }
                }
            }

            if self.choices[choice_id].kind == SymbolKind::Unknown {
                let inferred = self.choices[choice_id]
                    .members
                    .iter()
                    .map(|&m| self.symbols[m].kind)
                    .find(|&k| k != SymbolKind::Unknown);
                if let Some(kind) = inferred {
                    self.choices[choice_id].kind = kind;
                }
            }
            let kind = self.choices[choice_id].kind;
            let members = self.choices[choice_id].members.clone();
            for member in members {
                if self.symbols[member].kind == SymbolKind::Unknown {
                    self.symbols[member].kind = kind;
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Expression resolution
    // -----------------------------------------------------------------------

    pub(crate) fn intern(&mut self, name: &str) -> SymbolId {
        if let Some(&id) = self.by_name.get(name) {
            return id;
        }
        let id = self.symbols.push(Symbol::new(name.to_string()));
        self.by_name.insert(name.to_string(), id);
        id
    }

    /// Resolve a parsed expression against the symbol table, creating
    /// symbols on first use. With `transform_m`, the constant `m` is
    /// rewritten to `m && MODULES`, the rule applied to all conditional
    /// expressions.
    fn resolve_expr(&mut self, raw: &RawExpr, transform_m: bool) -> Expr {
        match raw {
            RawExpr::Symbol(name, _) => self.resolve_atom(name, transform_m),
            RawExpr::StringLit(s, _) => Expr::Literal(s.clone()),
            RawExpr::Not(e) => Expr::Not(Box::new(self.resolve_expr(e, transform_m))),
            RawExpr::And(a, b) => Expr::And(
                Box::new(self.resolve_expr(a, transform_m)),
                Box::new(self.resolve_expr(b, transform_m)),
            ),
            RawExpr::Or(a, b) => Expr::Or(
                Box::new(self.resolve_expr(a, transform_m)),
                Box::new(self.resolve_expr(b, transform_m)),
            ),
            RawExpr::Eq(a, b) => self.resolve_cmp(Relation::Eq, a, b),
            RawExpr::NotEq(a, b) => self.resolve_cmp(Relation::Neq, a, b),
            RawExpr::Less(a, b) => self.resolve_cmp(Relation::Lt, a, b),
            RawExpr::LessEq(a, b) => self.resolve_cmp(Relation::Leq, a, b),
            RawExpr::Greater(a, b) => self.resolve_cmp(Relation::Gt, a, b),
            RawExpr::GreaterEq(a, b) => self.resolve_cmp(Relation::Geq, a, b),
            RawExpr::Paren(e) => self.resolve_expr(e, transform_m),
        }
    }

    fn resolve_cmp(&mut self, rel: Relation, a: &RawExpr, b: &RawExpr) -> Expr {
        // Comparison operands are atoms; `m` is not rewritten there.
        Expr::Cmp(
            rel,
            Box::new(self.resolve_expr(a, false)),
            Box::new(self.resolve_expr(b, false)),
        )
    }

    fn resolve_atom(&mut self, name: &str, transform_m: bool) -> Expr {
        match name {
            "y" => Expr::Tri(Tristate::Yes),
            "n" => Expr::Tri(Tristate::No),
            "m" => {
                if transform_m {
                    Expr::And(
                        Box::new(Expr::Tri(Tristate::Mod)),
                        Box::new(Expr::Symbol(self.modules)),
                    )
                } else {
                    Expr::Tri(Tristate::Mod)
                }
            }
            // Error-recovery placeholder from the parser.
            "" => Expr::Tri(Tristate::No),
            _ if expr::parse_int_auto(name).is_some() => Expr::Literal(name.to_string()),
            _ => Expr::Symbol(self.intern(name)),
        }
    }

    // -----------------------------------------------------------------------
    // Lookup and iteration
    // -----------------------------------------------------------------------

    pub fn symbol(&self, name: &str) -> Option<SymbolId> {
        self.by_name.get(name).copied()
    }

    pub fn sym(&self, id: SymbolId) -> &Symbol {
        &self.symbols[id]
    }

    /// Defined symbols in declaration order.
    pub fn all_symbols(&self) -> impl Iterator<Item = SymbolId> + '_ {
        self.defined_syms.iter().copied()
    }

    pub fn choice(&self, id: ChoiceId) -> &Choice {
        &self.choices[id]
    }

    pub fn all_choices(&self) -> impl Iterator<Item = ChoiceId> + '_ {
        (0..self.choices.len()).map(ChoiceId::from_usize)
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    pub fn node_file(&self, id: NodeId) -> &Path {
        &self.files[self.nodes[id].file()]
    }

    pub(crate) fn node_dep(&self, id: NodeId) -> &Option<Expr> {
        &self.nodes[id].dep
    }

    pub(crate) fn node_visible_if(&self, id: NodeId) -> &Option<Expr> {
        &self.nodes[id].visible_if
    }

    /// Total number of symbols in the table, defined or referenced.
    pub fn symbol_count(&self) -> usize {
        self.symbols.len()
    }

    /// Pre-order walk over the item tree.
    pub fn iter_items(&self) -> ItemIter<'_> {
        let mut stack: Vec<NodeId> = self.nodes[self.root].children.clone();
        stack.reverse();
        ItemIter { model: self, stack }
    }

    /// The first prompt text attached to a symbol, if any.
    pub fn prompt(&self, id: SymbolId) -> Option<&str> {
        self.symbols[id]
            .nodes
            .iter()
            .find_map(|&n| self.nodes[n].prompt())
    }

    pub fn mainmenu_text(&self) -> &str {
        self.mainmenu.as_deref().unwrap_or("Configuration")
    }

    /// The first readable defconfig named by the `defconfig_list` symbol's
    /// applicable defaults.
    pub fn defconfig_filename(&self) -> Option<PathBuf> {
        let list = self.defconfig_list?;
        for d in &self.symbols[list].defaults {
            if eval_cond(self, &d.cond) == Tristate::No {
                continue;
            }
            let name = self.expr_str_value(&d.value);
            let path = Path::new(&name);
            let resolved = if path.is_absolute() {
                path.to_path_buf()
            } else {
                self.base_dir.join(path)
            };
            if resolved.is_file() {
                return Some(resolved);
            }
        }
        None
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    /// Control mirroring of accumulated warnings to the log.
    pub fn set_log_warnings(&mut self, on: bool) {
        self.log_warnings = on;
    }

    /// Control warnings about `.config` assignments to undefined symbols.
    pub fn set_log_undef_assignments(&mut self, on: bool) {
        self.log_undef_assign = on;
    }

    pub(crate) fn warn(&mut self, message: String) {
        self.warn_at(message, None, None);
    }

    pub(crate) fn warn_at(&mut self, message: String, file: Option<PathBuf>, line: Option<u32>) {
        let w = Warning {
            message,
            file,
            line,
        };
        if self.log_warnings {
            log::warn!("{}", w);
        }
        self.warnings.push(w);
    }

    pub(crate) fn warn_undef_assign(&mut self, message: String) {
        let enabled = self.log_undef_assign;
        let w = Warning {
            message,
            file: None,
            line: None,
        };
        if enabled {
            log::warn!("{}", w);
        }
        self.warnings.push(w);
    }

    // -----------------------------------------------------------------------
    // Value engine
    // -----------------------------------------------------------------------

    fn epoch(&self) -> u64 {
        self.epoch.get()
    }

    pub(crate) fn bump_epoch(&self) {
        self.epoch.set(self.epoch.get() + 1);
    }

    fn modules_off(&self) -> bool {
        self.tristate_value(self.modules) == Tristate::No
    }

    /// The kind the symbol currently presents as: tristate demotes to bool
    /// when its choice is in `y` mode or when modules are disabled.
    pub fn effective_kind(&self, id: SymbolId) -> SymbolKind {
        let kind = self.symbols[id].kind;
        if kind == SymbolKind::Tristate {
            if let Some(choice) = self.symbols[id].choice {
                if self.choice_mode(choice) == Tristate::Yes {
                    return SymbolKind::Bool;
                }
            }
            if self.modules_off() {
                return SymbolKind::Bool;
            }
        }
        kind
    }

    /// Visibility: the maximum value the user may assign without help from
    /// reverse dependencies. `n` for promptless symbols.
    pub fn visibility(&self, id: SymbolId) -> Tristate {
        {
            let cache = self.symbols[id].cache.borrow();
            if cache.epoch == self.epoch() {
                if let Some(v) = cache.vis {
                    return v;
                }
            }
        }
        let vis = self.compute_visibility(id);
        let mut cache = self.symbols[id].cache.borrow_mut();
        if cache.epoch != self.epoch() {
            *cache = Default::default();
            cache.epoch = self.epoch();
        }
        cache.vis = Some(vis);
        vis
    }

    fn compute_visibility(&self, id: SymbolId) -> Tristate {
        let sym = &self.symbols[id];
        let mut vis = Tristate::No;
        for &node in &sym.nodes {
            if let Some(p) = &self.nodes[node].prompt {
                vis = vis.or(eval_cond(self, &p.cond));
            }
        }

        if let Some(choice_id) = sym.choice {
            let choice = &self.choices[choice_id];
            // Non-tristate symbols in a tristate choice are only visible
            // while the choice is in `y` mode.
            if choice.kind == SymbolKind::Tristate
                && sym.kind != SymbolKind::Tristate
                && self.choice_mode(choice_id) != Tristate::Yes
            {
                return Tristate::No;
            }
            // Tristate members with `m` visibility disappear while the
            // choice is in `y` mode.
            if sym.kind == SymbolKind::Tristate
                && vis == Tristate::Mod
                && self.choice_mode(choice_id) == Tristate::Yes
            {
                return Tristate::No;
            }
            vis = vis.and(self.choice_visibility(choice_id));
        }

        // `m` promotes to `y` where modules cannot apply.
        if vis == Tristate::Mod && (sym.kind != SymbolKind::Tristate || self.modules_off()) {
            return Tristate::Yes;
        }
        vis
    }

    /// The symbol's displayed value in the current model state.
    pub fn value(&self, id: SymbolId) -> SymbolValue {
        {
            let cache = self.symbols[id].cache.borrow();
            if cache.epoch == self.epoch() {
                if let Some(v) = &cache.value {
                    return v.clone();
                }
            }
        }

        let sym = &self.symbols[id];
        if sym.visiting.get() {
            // Dependency cycle: the in-progress symbol reads as n/empty for
            // the duration of the recursive visit.
            if !sym.cycle_logged.get() {
                sym.cycle_logged.set(true);
                log::warn!("dependency cycle while evaluating symbol {}", sym.name);
            }
            return match sym.kind {
                SymbolKind::Bool | SymbolKind::Tristate => SymbolValue::Tristate(Tristate::No),
                _ => SymbolValue::String(String::new()),
            };
        }

        sym.visiting.set(true);
        let (value, write) = self.compute_value(id);
        sym.visiting.set(false);

        let mut cache = self.symbols[id].cache.borrow_mut();
        if cache.epoch != self.epoch() {
            *cache = Default::default();
            cache.epoch = self.epoch();
        }
        cache.value = Some(value.clone());
        cache.write = write;
        value
    }

    pub fn tristate_value(&self, id: SymbolId) -> Tristate {
        match self.value(id) {
            SymbolValue::Tristate(t) => t,
            SymbolValue::String(_) => Tristate::No,
        }
    }

    pub fn string_value(&self, id: SymbolId) -> String {
        match self.value(id) {
            SymbolValue::Tristate(t) => t.as_str().to_string(),
            SymbolValue::String(s) => s,
        }
    }

    /// Whether the symbol gets a `.config` entry; determined alongside the
    /// value, mirroring the reference tools.
    pub(crate) fn write_to_conf(&self, id: SymbolId) -> bool {
        let _ = self.value(id);
        self.symbols[id].cache.borrow().write
    }

    fn compute_value(&self, id: SymbolId) -> (SymbolValue, bool) {
        let sym = &self.symbols[id];
        match sym.kind {
            // Undefined symbols evaluate to their own name as a string;
            // this is what makes `FOO = "FOO"` style tests work.
            SymbolKind::Unknown => (SymbolValue::String(sym.name.clone()), false),
            SymbolKind::Bool | SymbolKind::Tristate => self.compute_tri_value(id),
            SymbolKind::Int | SymbolKind::Hex => self.compute_numeric_value(id),
            SymbolKind::String => self.compute_string_value(id),
        }
    }

    fn compute_tri_value(&self, id: SymbolId) -> (SymbolValue, bool) {
        let sym = &self.symbols[id];
        let vis = self.visibility(id);
        let mut val = Tristate::No;
        let mut write;

        if let Some(choice_id) = sym.choice {
            write = false;
            if vis != Tristate::No {
                let mode = self.choice_mode(choice_id);
                if mode != Tristate::No {
                    write = true;
                    if mode == Tristate::Yes {
                        if self.choice_selection(choice_id) == Some(id) {
                            val = Tristate::Yes;
                        }
                    } else if matches!(
                        sym.user_value.as_deref(),
                        Some("m") | Some("y")
                    ) {
                        val = Tristate::Mod;
                    }
                }
            }
        } else {
            write = vis != Tristate::No;
            let user = sym
                .user_value
                .as_deref()
                .and_then(Tristate::from_str)
                .filter(|_| vis != Tristate::No);

            if let Some(user) = user {
                val = user.and(vis);
            } else {
                for d in &sym.defaults {
                    let cond = eval_cond(self, &d.cond);
                    if cond != Tristate::No {
                        write = true;
                        val = eval(self, &d.value).and(cond);
                        break;
                    }
                }
                // `imply` is weak: it only takes effect when the symbol
                // would otherwise be n, and only while the symbol's direct
                // dependencies are met.
                if val == Tristate::No && eval(self, &sym.direct_deps) != Tristate::No {
                    let weak = eval(self, &sym.weak_rev_dep);
                    if weak != Tristate::No {
                        write = true;
                        val = weak;
                    }
                }
            }

            // Reverse dependencies from `select` force a lower bound.
            let rev = eval(self, &sym.rev_dep);
            if rev != Tristate::No {
                write = true;
                val = val.or(rev);
            }
        }

        // Bool symbols read m as y.
        if val == Tristate::Mod && self.effective_kind(id) == SymbolKind::Bool {
            val = Tristate::Yes;
        }
        (SymbolValue::Tristate(val), write)
    }

    fn compute_numeric_value(&self, id: SymbolId) -> (SymbolValue, bool) {
        let sym = &self.symbols[id];
        let base = if sym.kind == SymbolKind::Hex { 16 } else { 10 };
        let vis = self.visibility(id);

        // First applicable range clause, if any.
        let mut active_range: Option<(i64, i64)> = None;
        for r in &sym.ranges {
            if eval_cond(self, &r.cond) != Tristate::No {
                let low = parse_int(&self.expr_str_value(&r.low), base).unwrap_or(0);
                let high = parse_int(&self.expr_str_value(&r.high), base).unwrap_or(0);
                active_range = Some((low, high));
                break;
            }
        }

        let mut write = vis != Tristate::No;
        let format_num = |v: i64| -> String {
            if sym.kind == SymbolKind::Hex {
                format!("{:#x}", v)
            } else {
                v.to_string()
            }
        };

        if vis != Tristate::No {
            if let Some(user) = sym.user_value.as_deref() {
                if let Some(num) = parse_int(user, base) {
                    // An in-range user value is kept in exactly the form it
                    // was written; out-of-range values clamp to the nearest
                    // bound.
                    let val = match active_range {
                        Some((low, _)) if num < low => format_num(low),
                        Some((_, high)) if num > high => format_num(high),
                        _ => user.to_string(),
                    };
                    return (SymbolValue::String(val), write);
                }
            }
        }

        for d in &sym.defaults {
            if eval_cond(self, &d.cond) == Tristate::No {
                continue;
            }
            write = true;
            let s = self.expr_str_value(&d.value);
            let val = match (parse_int(&s, base), active_range) {
                (Some(num), Some((low, _))) if num < low => format_num(low),
                (Some(num), Some((_, high))) if num > high => format_num(high),
                _ => s,
            };
            return (SymbolValue::String(val), write);
        }

        // No user value and no applicable default: the low end of an
        // active range when positive, else the kind's zero form.
        let val = match active_range {
            Some((low, _)) if low > 0 => format_num(low),
            _ => {
                if sym.kind == SymbolKind::Hex {
                    "0x0".to_string()
                } else {
                    "0".to_string()
                }
            }
        };
        (SymbolValue::String(val), write)
    }

    fn compute_string_value(&self, id: SymbolId) -> (SymbolValue, bool) {
        let sym = &self.symbols[id];
        let vis = self.visibility(id);
        let mut write = vis != Tristate::No;

        if vis != Tristate::No {
            if let Some(user) = &sym.user_value {
                return (SymbolValue::String(user.clone()), write);
            }
        }
        for d in &sym.defaults {
            if eval_cond(self, &d.cond) != Tristate::No {
                write = true;
                return (SymbolValue::String(self.expr_str_value(&d.value)), write);
            }
        }
        (SymbolValue::String(String::new()), write)
    }

    /// String form of an expression used in value position (defaults,
    /// range bounds, defconfig paths).
    pub(crate) fn expr_str_value(&self, e: &Expr) -> String {
        match e {
            Expr::Tri(t) => t.as_str().to_string(),
            Expr::Literal(s) => s.clone(),
            Expr::Symbol(id) => self.string_value(*id),
            other => eval(self, other).as_str().to_string(),
        }
    }

    /// The set of values the user can currently assign: everything between
    /// the forced lower bound from `select` and the visibility ceiling.
    pub fn assignable(&self, id: SymbolId) -> Vec<Tristate> {
        let kind = self.symbols[id].kind;
        if !matches!(kind, SymbolKind::Bool | SymbolKind::Tristate) {
            return Vec::new();
        }
        let vis = self.visibility(id);
        if vis == Tristate::No {
            return Vec::new();
        }
        let rev = eval(self, &self.symbols[id].rev_dep);
        let ceiling = vis.max(rev);
        let tristate_capable = self.effective_kind(id) == SymbolKind::Tristate;

        [Tristate::No, Tristate::Mod, Tristate::Yes]
            .into_iter()
            .filter(|&t| t >= rev && t <= ceiling)
            .filter(|&t| t != Tristate::Mod || tristate_capable)
            .collect()
    }

    // -----------------------------------------------------------------------
    // Choice election
    // -----------------------------------------------------------------------

    pub fn choice_effective_kind(&self, id: ChoiceId) -> SymbolKind {
        let kind = self.choices[id].kind;
        if kind == SymbolKind::Tristate && self.modules_off() {
            return SymbolKind::Bool;
        }
        kind
    }

    pub fn choice_visibility(&self, id: ChoiceId) -> Tristate {
        {
            let cache = self.choices[id].cache.borrow();
            if cache.epoch == self.epoch() {
                if let Some(v) = cache.vis {
                    return v;
                }
            }
        }
        let choice = &self.choices[id];
        let mut vis = Tristate::No;
        for &node in &choice.nodes {
            if let Some(p) = &self.nodes[node].prompt {
                vis = vis.or(eval_cond(self, &p.cond));
            }
        }
        if vis == Tristate::Mod && (choice.kind != SymbolKind::Tristate || self.modules_off()) {
            vis = Tristate::Yes;
        }
        let mut cache = self.choices[id].cache.borrow_mut();
        if cache.epoch != self.epoch() {
            *cache = Default::default();
            cache.epoch = self.epoch();
        }
        cache.vis = Some(vis);
        vis
    }

    /// The mode of the choice: `y` elects exactly one member, `m` lets
    /// tristate members resolve independently capped at `m`, `n` forces
    /// all members to `n`. Non-optional choices never drop below `m`.
    pub fn choice_mode(&self, id: ChoiceId) -> Tristate {
        {
            let cache = self.choices[id].cache.borrow();
            if cache.epoch == self.epoch() {
                if let Some(v) = cache.mode {
                    return v;
                }
            }
        }
        let choice = &self.choices[id];
        let mut mode = match choice.user_value {
            Some(user) => user.and(self.choice_visibility(id)),
            None => Tristate::No,
        };
        if mode == Tristate::No && !choice.is_optional {
            mode = Tristate::Mod;
        }
        if mode == Tristate::Mod && self.choice_effective_kind(id) == SymbolKind::Bool {
            mode = Tristate::Yes;
        }
        let mut cache = self.choices[id].cache.borrow_mut();
        if cache.epoch != self.epoch() {
            *cache = Default::default();
            cache.epoch = self.epoch();
        }
        cache.mode = Some(mode);
        mode
    }

    /// The elected member in `y` mode: the user's pick while visible,
    /// otherwise the first applicable default, otherwise the first
    /// visible member.
    pub fn choice_selection(&self, id: ChoiceId) -> Option<SymbolId> {
        {
            let cache = self.choices[id].cache.borrow();
            if cache.epoch == self.epoch() {
                if let Some(v) = cache.selection {
                    return v;
                }
            }
        }
        let selection = self.compute_choice_selection(id);
        let mut cache = self.choices[id].cache.borrow_mut();
        if cache.epoch != self.epoch() {
            *cache = Default::default();
            cache.epoch = self.epoch();
        }
        cache.selection = Some(selection);
        selection
    }

    fn compute_choice_selection(&self, id: ChoiceId) -> Option<SymbolId> {
        if self.choice_mode(id) != Tristate::Yes {
            return None;
        }
        let choice = &self.choices[id];
        if let Some(user) = choice.user_selection {
            if self.visibility(user) == Tristate::Yes {
                return Some(user);
            }
        }
        for (sym, cond) in &choice.defaults {
            if eval_cond(self, cond) != Tristate::No && self.visibility(*sym) != Tristate::No {
                return Some(*sym);
            }
        }
        choice
            .members
            .iter()
            .copied()
            .find(|&m| self.visibility(m) != Tristate::No)
    }

    pub fn choice_assignable(&self, id: ChoiceId) -> Vec<Tristate> {
        let vis = self.choice_visibility(id);
        if vis == Tristate::No {
            return Vec::new();
        }
        let tristate = self.choice_effective_kind(id) == SymbolKind::Tristate;
        let optional = self.choices[id].is_optional;
        let mut out = Vec::new();
        if optional {
            out.push(Tristate::No);
        }
        if tristate {
            out.push(Tristate::Mod);
        }
        if vis == Tristate::Yes {
            out.push(Tristate::Yes);
        }
        out
    }

    // -----------------------------------------------------------------------
    // Mutation
    // -----------------------------------------------------------------------

    /// Set a symbol's user value from its string form. Returns whether the
    /// value was accepted: type-invalid values are ignored outright, and a
    /// stored value that visibility, ranges, or the choice election will
    /// override reports `false` while still being remembered.
    pub fn set_value(&mut self, id: SymbolId, value: &str) -> bool {
        let stored = self.set_value_quiet(id, value, false);
        self.bump_epoch();
        stored && self.value_accepted(id, value)
    }

    /// Convenience wrapper for bool/tristate symbols.
    pub fn set_tristate_value(&mut self, id: SymbolId, value: Tristate) -> bool {
        self.set_value(id, value.as_str())
    }

    pub(crate) fn set_value_quiet(
        &mut self,
        id: SymbolId,
        value: &str,
        from_config: bool,
    ) -> bool {
        let kind = self.symbols[id].kind;
        let type_valid = match kind {
            SymbolKind::Bool => matches!(value, "n" | "y"),
            SymbolKind::Tristate => matches!(value, "n" | "m" | "y"),
            SymbolKind::String => true,
            SymbolKind::Int => parse_int(value, 10).is_some(),
            SymbolKind::Hex => parse_int(value, 16).is_some(),
            SymbolKind::Unknown => false,
        };
        if !type_valid {
            let name = self.symbols[id].name.clone();
            self.warn(format!(
                "the value \"{}\" is invalid for {}, which has type {}; assignment ignored",
                value,
                name,
                kind.as_str()
            ));
            return false;
        }

        if !self.symbols[id].is_defined() {
            let name = self.symbols[id].name.clone();
            self.warn_undef_assign(format!(
                "assigning \"{}\" to the undefined symbol {} has no effect",
                value, name
            ));
        } else if !from_config && self.prompt(id).is_none() {
            let name = self.symbols[id].name.clone();
            self.warn(format!(
                "assigning \"{}\" to the promptless symbol {} has no effect",
                value, name
            ));
        }

        self.symbols[id].user_value = Some(value.to_string());

        // Assignments to choice members are interpreted as selecting
        // within the choice.
        if let Some(choice_id) = self.symbols[id].choice {
            if matches!(kind, SymbolKind::Bool | SymbolKind::Tristate) {
                match value {
                    "y" => {
                        self.choices[choice_id].user_selection = Some(id);
                        self.choices[choice_id].user_value = Some(Tristate::Yes);
                    }
                    "m" => {
                        self.choices[choice_id].user_value = Some(Tristate::Mod);
                    }
                    _ => {}
                }
            }
        }
        true
    }

    /// Whether the stored assignment actually takes effect right now.
    fn value_accepted(&self, id: SymbolId, value: &str) -> bool {
        match self.symbols[id].kind {
            SymbolKind::Bool | SymbolKind::Tristate => match Tristate::from_str(value) {
                Some(t) => self.assignable(id).contains(&t),
                None => false,
            },
            SymbolKind::Int | SymbolKind::Hex => {
                if self.visibility(id) == Tristate::No {
                    return false;
                }
                let base = if self.symbols[id].kind == SymbolKind::Hex {
                    16
                } else {
                    10
                };
                let Some(num) = parse_int(value, base) else {
                    return false;
                };
                for r in &self.symbols[id].ranges {
                    if eval_cond(self, &r.cond) != Tristate::No {
                        let low = parse_int(&self.expr_str_value(&r.low), base).unwrap_or(0);
                        let high = parse_int(&self.expr_str_value(&r.high), base).unwrap_or(0);
                        return num >= low && num <= high;
                    }
                }
                true
            }
            SymbolKind::String => self.visibility(id) != Tristate::No,
            SymbolKind::Unknown => false,
        }
    }

    /// Reset a symbol's user value, as if it was never assigned.
    pub fn unset_value(&mut self, id: SymbolId) {
        self.symbols[id].user_value = None;
        self.bump_epoch();
    }

    /// Reset every user value and choice selection.
    pub fn unset_values(&mut self) {
        for sym in self.symbols.iter_mut() {
            sym.user_value = None;
        }
        for choice in self.choices.iter_mut() {
            choice.user_value = None;
            choice.user_selection = None;
        }
        self.bump_epoch();
    }

    /// Set the mode of a choice. The visibility may truncate the stored
    /// mode; non-optional choices never reach `n`.
    pub fn set_choice_mode(&mut self, id: ChoiceId, mode: Tristate) -> bool {
        let kind = self.choices[id].kind;
        let valid = match kind {
            SymbolKind::Bool => matches!(mode, Tristate::No | Tristate::Yes),
            SymbolKind::Tristate => true,
            _ => false,
        };
        if !valid {
            self.warn(format!(
                "the mode \"{}\" is invalid for a choice of type {}; assignment ignored",
                mode,
                kind.as_str()
            ));
            return false;
        }
        self.choices[id].user_value = Some(mode);
        self.bump_epoch();
        self.choice_assignable(id).contains(&mode)
    }

    /// Elect a member of the choice. Equivalent to assigning `y` to the
    /// member symbol.
    pub fn set_selection(&mut self, id: ChoiceId, member: SymbolId) -> bool {
        if !self.choices[id].members.contains(&member) {
            return false;
        }
        self.set_value(member, "y")
    }

    // -----------------------------------------------------------------------
    // Ad-hoc evaluation
    // -----------------------------------------------------------------------

    /// Evaluate an expression string, e.g. `"FOO && (BAR || BAZ=7)"`, in
    /// the current model state. `m` is rewritten to `m && MODULES` as in
    /// conditional expressions. Symbols named here but absent from the
    /// configuration are created undefined and evaluate to `n`.
    pub fn eval_expression(&mut self, text: &str) -> Result<Tristate, Error> {
        let (raw, diagnostics) = parser::parse_expr_str(text);
        if let Some(diag) = diagnostics
            .iter()
            .find(|d| d.severity == DiagSeverity::Error)
        {
            return Err(Error::Syntax {
                file: PathBuf::from("<expression>"),
                line: 1,
                message: diag.message.clone(),
            });
        }
        let expr = self.resolve_expr(&raw, true);
        Ok(eval(self, &expr))
    }
}

/// Pre-order traversal over the item tree.
pub struct ItemIter<'a> {
    model: &'a Model,
    stack: Vec<NodeId>,
}

impl<'a> Iterator for ItemIter<'a> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.stack.pop()?;
        let model = self.model;
        self.stack
            .extend(model.nodes[id].children.iter().rev().copied());
        Some(id)
    }
}

impl From<crate::ast::TypeKind> for SymbolKind {
    fn from(t: crate::ast::TypeKind) -> SymbolKind {
        match t {
            crate::ast::TypeKind::Bool => SymbolKind::Bool,
            crate::ast::TypeKind::Tristate => SymbolKind::Tristate,
            crate::ast::TypeKind::String => SymbolKind::String,
            crate::ast::TypeKind::Hex => SymbolKind::Hex,
            crate::ast::TypeKind::Int => SymbolKind::Int,
        }
    }
}

/// A bare symbol reference in value position, unwrapping parentheses.
fn symbol_atom(raw: &RawExpr) -> Option<&str> {
    match raw {
        RawExpr::Symbol(name, _) => Some(name),
        RawExpr::Paren(inner) => symbol_atom(inner),
        _ => None,
    }
}
