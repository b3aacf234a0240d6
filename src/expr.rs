//! Tristate logic and resolved dependency expressions.
//!
//! Expressions here are the post-resolution form: symbol references are
//! `SymbolId` handles into the model's symbol table, never owning pointers,
//! so `select`/`imply` back-edges cannot create ownership cycles.

use crate::model::Model;
use crate::symbol::{SymbolId, SymbolKind};

/// Three-valued logic: `n` < `m` < `y`. AND is `min`, OR is `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Tristate {
    No,
    Mod,
    Yes,
}

impl Tristate {
    pub fn and(self, other: Tristate) -> Tristate {
        self.min(other)
    }

    pub fn or(self, other: Tristate) -> Tristate {
        self.max(other)
    }

    /// `!n = y`, `!y = n`, `!m = m`.
    pub fn not(self) -> Tristate {
        match self {
            Tristate::No => Tristate::Yes,
            Tristate::Mod => Tristate::Mod,
            Tristate::Yes => Tristate::No,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Tristate::No => "n",
            Tristate::Mod => "m",
            Tristate::Yes => "y",
        }
    }

    pub fn from_str(s: &str) -> Option<Tristate> {
        match s {
            "n" => Some(Tristate::No),
            "m" => Some(Tristate::Mod),
            "y" => Some(Tristate::Yes),
            _ => None,
        }
    }
}

impl std::fmt::Display for Tristate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    Eq,
    Neq,
    Lt,
    Leq,
    Gt,
    Geq,
}

impl Relation {
    pub fn as_str(self) -> &'static str {
        match self {
            Relation::Eq => "=",
            Relation::Neq => "!=",
            Relation::Lt => "<",
            Relation::Leq => "<=",
            Relation::Gt => ">",
            Relation::Geq => ">=",
        }
    }
}

/// A resolved dependency expression.
///
/// `Tri` and `Literal` are the constant forms: the reserved `y`/`m`/`n`
/// atoms and quoted strings or numbers. They have a fixed value and no
/// properties. A missing condition is represented as `None` at the use
/// site and evaluates to `y`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Tri(Tristate),
    Literal(String),
    Symbol(SymbolId),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Cmp(Relation, Box<Expr>, Box<Expr>),
}

impl Expr {
    fn is_const(&self, t: Tristate) -> bool {
        matches!(self, Expr::Tri(v) if *v == t)
    }

    /// AND two expressions, folding constant `y` operands away.
    pub fn and(a: Expr, b: Expr) -> Expr {
        if a.is_const(Tristate::Yes) {
            return b;
        }
        if b.is_const(Tristate::Yes) {
            return a;
        }
        Expr::And(Box::new(a), Box::new(b))
    }

    /// OR two expressions, folding constant `y` and `n` operands.
    pub fn or(a: Expr, b: Expr) -> Expr {
        if a.is_const(Tristate::Yes) || b.is_const(Tristate::Yes) {
            return Expr::Tri(Tristate::Yes);
        }
        if a.is_const(Tristate::No) {
            return b;
        }
        if b.is_const(Tristate::No) {
            return a;
        }
        Expr::Or(Box::new(a), Box::new(b))
    }

    /// Collect every symbol handle referenced by this expression.
    pub fn collect_symbols(&self, out: &mut Vec<SymbolId>) {
        match self {
            Expr::Tri(_) | Expr::Literal(_) => {}
            Expr::Symbol(id) => out.push(*id),
            Expr::Not(e) => e.collect_symbols(out),
            Expr::And(a, b) | Expr::Or(a, b) | Expr::Cmp(_, a, b) => {
                a.collect_symbols(out);
                b.collect_symbols(out);
            }
        }
    }
}

/// AND two optional conditions. `None` stands for a missing condition and
/// equates to `y`; ANDing two missing conditions stays missing.
pub(crate) fn and_opt(a: Option<Expr>, b: Option<Expr>) -> Option<Expr> {
    match (a, b) {
        (None, b) => b,
        (a, None) => a,
        (Some(a), Some(b)) => Some(Expr::and(a, b)),
    }
}

/// Evaluate an optional condition; a missing condition is `y`.
pub(crate) fn eval_cond(model: &Model, cond: &Option<Expr>) -> Tristate {
    match cond {
        None => Tristate::Yes,
        Some(e) => eval(model, e),
    }
}

/// Evaluate an expression to a tristate in the current model state.
///
/// `&&` is `min`, `||` is `max` and both short-circuit; `!` swaps `n`/`y`.
/// Atoms coerce per symbol kind: bool/tristate symbols contribute their
/// value, numeric symbols contribute `y` when nonzero, strings when
/// nonempty, undefined symbols always `n`.
pub(crate) fn eval(model: &Model, expr: &Expr) -> Tristate {
    match expr {
        Expr::Tri(t) => *t,
        Expr::Literal(s) => coerce_str(s),
        Expr::Symbol(id) => atom_value(model, *id),
        Expr::Not(e) => eval(model, e).not(),
        Expr::And(a, b) => {
            let va = eval(model, a);
            if va == Tristate::No {
                return Tristate::No;
            }
            va.and(eval(model, b))
        }
        Expr::Or(a, b) => {
            let va = eval(model, a);
            if va == Tristate::Yes {
                return Tristate::Yes;
            }
            va.or(eval(model, b))
        }
        Expr::Cmp(rel, a, b) => eval_cmp(model, *rel, a, b),
    }
}

fn atom_value(model: &Model, id: SymbolId) -> Tristate {
    match model.sym(id).kind() {
        SymbolKind::Bool | SymbolKind::Tristate => model.tristate_value(id),
        SymbolKind::Int | SymbolKind::Hex | SymbolKind::String => {
            coerce_str(&model.string_value(id))
        }
        SymbolKind::Unknown => Tristate::No,
    }
}

/// Tristate coercion for string-shaped values: `y`/`m`/`n` map directly,
/// zero and the empty string are `n`, everything else is `y`.
fn coerce_str(s: &str) -> Tristate {
    if let Some(t) = Tristate::from_str(s) {
        return t;
    }
    if s.is_empty() {
        return Tristate::No;
    }
    match parse_int_auto(s) {
        Some(0) => Tristate::No,
        _ => Tristate::Yes,
    }
}

fn eval_cmp(model: &Model, rel: Relation, a: &Expr, b: &Expr) -> Tristate {
    let (a_num, a_str) = cmp_operand(model, a);
    let (b_num, b_str) = cmp_operand(model, b);

    let ord = match (a_num, b_num) {
        // Both operands parse as numbers: compare numerically.
        (Some(x), Some(y)) => x.cmp(&y),
        // Otherwise only (in)equality falls back to string comparison;
        // ordering relations on non-numbers are n.
        _ => {
            if !matches!(rel, Relation::Eq | Relation::Neq) {
                return Tristate::No;
            }
            a_str.cmp(&b_str)
        }
    };

    let holds = match rel {
        Relation::Eq => ord == std::cmp::Ordering::Equal,
        Relation::Neq => ord != std::cmp::Ordering::Equal,
        Relation::Lt => ord == std::cmp::Ordering::Less,
        Relation::Leq => ord != std::cmp::Ordering::Greater,
        Relation::Gt => ord == std::cmp::Ordering::Greater,
        Relation::Geq => ord != std::cmp::Ordering::Less,
    };
    if holds {
        Tristate::Yes
    } else {
        Tristate::No
    }
}

/// Comparison operand: the string form plus the numeric parse, where the
/// base is fixed by the symbol kind (int: 10, hex: 16) and auto-detected
/// for constants and everything else.
fn cmp_operand(model: &Model, e: &Expr) -> (Option<i64>, String) {
    let (kind, s) = match e {
        Expr::Tri(t) => (SymbolKind::Unknown, t.as_str().to_string()),
        Expr::Literal(s) => (SymbolKind::Unknown, s.clone()),
        Expr::Symbol(id) => (model.sym(*id).kind(), model.string_value(*id)),
        // Composite operands never appear in comparisons; the parser only
        // produces atoms there. Treat defensively as their tristate form.
        other => (SymbolKind::Unknown, eval(model, other).as_str().to_string()),
    };
    let num = match kind {
        SymbolKind::Int => parse_int(&s, 10),
        SymbolKind::Hex => parse_int(&s, 16),
        _ => parse_int_auto(&s),
    };
    (num, s)
}

/// Parse an integer in the given base. Base 16 accepts an optional `0x`
/// prefix; both accept a leading minus.
pub(crate) fn parse_int(s: &str, base: u32) -> Option<i64> {
    let (neg, body) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s),
    };
    let body = if base == 16 {
        body.strip_prefix("0x").or_else(|| body.strip_prefix("0X")).unwrap_or(body)
    } else {
        body
    };
    if body.is_empty() {
        return None;
    }
    let v = i64::from_str_radix(body, base).ok()?;
    Some(if neg { -v } else { v })
}

/// Parse with the base inferred from the format: `0x` means hex,
/// otherwise decimal.
pub(crate) fn parse_int_auto(s: &str) -> Option<i64> {
    let body = s.strip_prefix('-').unwrap_or(s);
    if body.starts_with("0x") || body.starts_with("0X") {
        parse_int(s, 16)
    } else {
        parse_int(s, 10)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tristate_ordering_and_ops() {
        assert!(Tristate::No < Tristate::Mod && Tristate::Mod < Tristate::Yes);
        assert_eq!(Tristate::Mod.and(Tristate::Yes), Tristate::Mod);
        assert_eq!(Tristate::Mod.or(Tristate::No), Tristate::Mod);
        assert_eq!(Tristate::Mod.not(), Tristate::Mod);
        assert_eq!(Tristate::Yes.not(), Tristate::No);
    }

    #[test]
    fn and_or_fold_constants() {
        let e = Expr::and(Expr::Tri(Tristate::Yes), Expr::Literal("x".into()));
        assert_eq!(e, Expr::Literal("x".into()));

        let e = Expr::or(Expr::Tri(Tristate::No), Expr::Literal("x".into()));
        assert_eq!(e, Expr::Literal("x".into()));

        let e = Expr::or(Expr::Literal("x".into()), Expr::Tri(Tristate::Yes));
        assert_eq!(e, Expr::Tri(Tristate::Yes));
    }

    #[test]
    fn int_parsing() {
        assert_eq!(parse_int("42", 10), Some(42));
        assert_eq!(parse_int("-7", 10), Some(-7));
        assert_eq!(parse_int("0x1F", 16), Some(31));
        assert_eq!(parse_int("1f", 16), Some(31));
        assert_eq!(parse_int("zz", 16), None);
        assert_eq!(parse_int_auto("0x10"), Some(16));
        assert_eq!(parse_int_auto("10"), Some(10));
    }
}
