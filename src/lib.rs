//! A standalone Kconfig engine.
//!
//! Parses a tree of Kconfig files into a queryable model of symbols,
//! choices, menus, and comments; evaluates the tristate dependency
//! expressions attached to them; and reads and writes `.config` files
//! compatibly with the kernel's own configuration tools.
//!
//! ```no_run
//! use kconfig_eval::Model;
//!
//! let mut model = Model::load("Kconfig")?;
//! model.load_config_file(".config", true)?;
//! if let Some(sym) = model.symbol("AUDIT") {
//!     println!("AUDIT = {}", model.string_value(sym));
//! }
//! # Ok::<(), kconfig_eval::Error>(())
//! ```

pub mod ast;
pub mod config;
pub mod expr;
pub mod lexer;
pub mod model;
pub mod parser;
pub mod symbol;

pub use expr::{Expr, Relation, Tristate};
pub use model::{Error, Model, Warning};
pub use symbol::{
    Choice, ChoiceId, DefaultProp, Item, Node, NodeId, RangeProp, SelectProp, Symbol, SymbolId,
    SymbolKind, SymbolValue,
};
