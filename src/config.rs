//! `.config` reading and writing, plus the auto-header output.
//!
//! The writer walks the item tree in display order and reproduces the
//! reference tool's formatting exactly: `CONFIG_<NAME>=<value>` lines,
//! `# CONFIG_<NAME> is not set` for disabled bool/tristate symbols, and
//! blank-line-delimited banner comments for menus and comments.

use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;

use crate::expr::{eval_cond, Tristate};
use crate::model::{Error, Model};
use crate::symbol::{Item, SymbolId, SymbolKind};

const CONFIG_PREFIX: &str = "CONFIG_";

impl Model {
    /// Load symbol values from a `.config`-format stream. With `replace`,
    /// all existing user values are cleared first; otherwise assignments
    /// are merged over them.
    pub fn load_config(&mut self, reader: impl io::Read, replace: bool) -> io::Result<()> {
        if replace {
            self.unset_values();
        }

        let reader = BufReader::new(reader);
        for (linenr, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim_end();
            self.apply_config_line(line, linenr as u32 + 1);
        }
        self.bump_epoch();
        Ok(())
    }

    /// Convenience wrapper opening `path`.
    pub fn load_config_file(&mut self, path: impl AsRef<Path>, replace: bool) -> Result<(), Error> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|e| Error::Io {
            file: path.to_path_buf(),
            source: e,
        })?;
        self.load_config(file, replace).map_err(|e| Error::Io {
            file: path.to_path_buf(),
            source: e,
        })
    }

    fn apply_config_line(&mut self, line: &str, linenr: u32) {
        // `# CONFIG_FOO is not set` assigns n; any other comment line and
        // anything unrecognized is skipped.
        let (name, value) = if let Some(rest) = line.strip_prefix("# ") {
            let Some(rest) = rest.strip_prefix(CONFIG_PREFIX) else {
                return;
            };
            let Some(name) = rest.strip_suffix(" is not set") else {
                return;
            };
            (name.to_string(), "n".to_string())
        } else if let Some(rest) = line.strip_prefix(CONFIG_PREFIX) {
            let Some(eq) = rest.find('=') else {
                return;
            };
            (rest[..eq].to_string(), rest[eq + 1..].to_string())
        } else {
            return;
        };

        let Some(id) = self.symbol(&name) else {
            self.warn_undef_assign(format!(
                "line {}: attempt to assign \"{}\" to the unknown symbol {}",
                linenr, value, name
            ));
            return;
        };

        let mut value = value;
        if self.sym(id).kind() == SymbolKind::String && value.starts_with('"') {
            match unquote(&value) {
                Some(v) => value = v,
                None => {
                    self.warn(format!("line {}: malformed string literal", linenr));
                    return;
                }
            }
        }

        // An assignment to a choice member that conflicts with the mode a
        // previous line established is worth flagging.
        if let Some(choice_id) = self.sym(id).choice() {
            if let Some(tri) = Tristate::from_str(&value) {
                let mode = self.choice(choice_id).user_mode();
                if let Some(mode) = mode {
                    if tri != Tristate::No && tri != mode {
                        self.warn(format!(
                            "line {}: assignment to {} changes the mode of its choice from {} \
                             to {}",
                            linenr, name, mode, tri
                        ));
                    }
                }
            }
        }

        if self.sym(id).user_value().is_some() {
            let old = self.sym(id).user_value().unwrap_or("").to_string();
            self.warn(format!(
                "line {}: {} set more than once; old value \"{}\", new value \"{}\"",
                linenr, name, old, value
            ));
        }

        self.set_value_quiet(id, &value, true);
    }

    /// Write the configuration as `.config` text.
    ///
    /// Symbols appear in item-tree order, once each; menus and comments
    /// whose dependencies hold become banner comments.
    pub fn write_config(&self, mut out: impl Write) -> io::Result<()> {
        writeln!(out, "# Generated by kconfig-eval")?;

        let mut written = vec![false; self.symbol_count()];
        for node_id in self.iter_items() {
            let node = self.node(node_id);
            match node.item() {
                Item::Symbol(sym) => {
                    if written[sym.index()] {
                        continue;
                    }
                    written[sym.index()] = true;
                    if let Some(s) = self.config_string(sym) {
                        out.write_all(s.as_bytes())?;
                    }
                }
                Item::Menu => {
                    if eval_cond(self, self.node_dep(node_id)) != Tristate::No
                        && eval_cond(self, self.node_visible_if(node_id)) != Tristate::No
                    {
                        write!(out, "\n#\n# {}\n#\n", node.prompt().unwrap_or(""))?;
                    }
                }
                Item::Comment => {
                    if eval_cond(self, self.node_dep(node_id)) != Tristate::No {
                        write!(out, "\n#\n# {}\n#\n", node.prompt().unwrap_or(""))?;
                    }
                }
                Item::Choice(_) | Item::Root => {}
            }
        }
        Ok(())
    }

    /// The `.config` line (with trailing newline) for one symbol, or
    /// `None` when the symbol should not appear in the output.
    pub(crate) fn config_string(&self, id: SymbolId) -> Option<String> {
        let sym = self.sym(id);
        // Symbols bound to environment variables are never written out.
        if sym.env_var().is_some() {
            return None;
        }
        let value = self.value(id);
        if !self.write_to_conf(id) {
            return None;
        }

        let name = sym.name();
        match sym.kind() {
            SymbolKind::Bool | SymbolKind::Tristate => {
                let tri = value.as_tristate().unwrap_or(Tristate::No);
                if tri == Tristate::No {
                    Some(format!("# {}{} is not set\n", CONFIG_PREFIX, name))
                } else {
                    Some(format!("{}{}={}\n", CONFIG_PREFIX, name, tri))
                }
            }
            SymbolKind::Int | SymbolKind::Hex => {
                Some(format!("{}{}={}\n", CONFIG_PREFIX, name, value.as_str()))
            }
            SymbolKind::String => Some(format!(
                "{}{}=\"{}\"\n",
                CONFIG_PREFIX,
                name,
                escape(value.as_str())
            )),
            SymbolKind::Unknown => None,
        }
    }

    /// Write the C preprocessor header derived from the configuration.
    pub fn write_autoconf(&self, mut out: impl Write) -> io::Result<()> {
        writeln!(out, "/*")?;
        writeln!(out, " * Automatically generated file; DO NOT EDIT.")?;
        writeln!(out, " * {}", self.mainmenu_text())?;
        writeln!(out, " */")?;

        let mut written = vec![false; self.symbol_count()];
        for node_id in self.iter_items() {
            let Item::Symbol(sym_id) = self.node(node_id).item() else {
                continue;
            };
            if written[sym_id.index()] {
                continue;
            }
            written[sym_id.index()] = true;

            let sym = self.sym(sym_id);
            if sym.env_var().is_some() {
                continue;
            }
            let value = self.value(sym_id);
            if !self.write_to_conf(sym_id) {
                continue;
            }
            let name = sym.name();
            match sym.kind() {
                SymbolKind::Bool | SymbolKind::Tristate => {
                    match value.as_tristate().unwrap_or(Tristate::No) {
                        Tristate::No => {}
                        Tristate::Mod => {
                            writeln!(out, "#define {}{}_MODULE 1", CONFIG_PREFIX, name)?;
                        }
                        Tristate::Yes => {
                            writeln!(out, "#define {}{} 1", CONFIG_PREFIX, name)?;
                        }
                    }
                }
                SymbolKind::Int => {
                    writeln!(out, "#define {}{} {}", CONFIG_PREFIX, name, value.as_str())?;
                }
                SymbolKind::Hex => {
                    let v = value.as_str();
                    if v.starts_with("0x") || v.starts_with("0X") {
                        writeln!(out, "#define {}{} {}", CONFIG_PREFIX, name, v)?;
                    } else {
                        writeln!(out, "#define {}{} 0x{}", CONFIG_PREFIX, name, v)?;
                    }
                }
                SymbolKind::String => {
                    writeln!(
                        out,
                        "#define {}{} \"{}\"",
                        CONFIG_PREFIX,
                        name,
                        escape(value.as_str())
                    )?;
                }
                SymbolKind::Unknown => {}
            }
        }
        Ok(())
    }
}

/// Escape `\` and `"` for quoted output.
fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        if ch == '\\' || ch == '"' {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

/// Strip surrounding double quotes and undo `\"` / `\\` escapes. Returns
/// `None` for a malformed literal.
fn unquote(s: &str) -> Option<String> {
    let body = s.strip_prefix('"')?.strip_suffix('"')?;
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            match chars.next() {
                Some(esc) => out.push(esc),
                None => return None,
            }
        } else {
            out.push(ch);
        }
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_and_unquote_round_trip() {
        let raw = r#"a "quoted" \ value"#;
        let quoted = format!("\"{}\"", escape(raw));
        assert_eq!(unquote(&quoted).as_deref(), Some(raw));
    }

    #[test]
    fn unquote_rejects_malformed() {
        assert_eq!(unquote("\"unterminated"), None);
        assert_eq!(unquote("no quotes"), None);
        // An escaped closing quote means the literal never terminated.
        assert_eq!(unquote("\"trailing escape\\\""), None);
    }
}
