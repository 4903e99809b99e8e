// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Symbol table with zone, cheap-local, and anonymous-label scoping.
//!
//! Name spaces:
//! - global: bare identifiers.
//! - zone-local: `.name`, visible inside the current `!zone`.
//! - cheap-local: `@name`, visible under the most recently defined global
//!   label; defining a new global label starts a fresh cheap scope.
//! - anonymous: runs of `+`/`-`, resolved positionally per zone.
//!
//! Bare identifier lookup order is cheap-local, then zone-local, then
//! global. Sigiled lookups consult only their own namespace.
//!
//! The table persists across both passes. Pass 2 re-traverses the source and
//! re-defines every symbol; a redefinition with a differing value means the
//! layout moved between passes and is reported as a phase mismatch.

use crate::core::value::Value;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone)]
pub struct Symbol {
    pub value: Value,
    pub is_variable: bool,
    pub defined_in_pass: u8,
}

/// Outcome of a symbol definition.
#[derive(Debug, Clone, PartialEq)]
#[must_use]
pub enum DefineOutcome {
    Ok,
    /// Second definition of a non-variable symbol within one pass.
    Duplicate,
    /// Pass-2 redefinition with a different value; carries the pass-1 value.
    PhaseMismatch(Value),
}

/// One anonymous-label occurrence: statement index and effective PC.
#[derive(Debug, Clone, Copy)]
pub struct AnonRecord {
    pub stmt: u64,
    pub pc: i64,
}

#[derive(Debug, Default)]
pub struct SymbolTable {
    globals: HashMap<String, Symbol>,
    zones: Vec<HashMap<String, Symbol>>,
    current_zone: usize,
    zone_seq: usize,
    cheap: HashMap<(u32, String), Symbol>,
    parent_seq: u32,
    anon: HashMap<(usize, String), Vec<AnonRecord>>,
    defined_this_pass: HashSet<String>,
    pass: u8,
}

impl SymbolTable {
    #[must_use]
    pub fn new() -> Self {
        let mut table = Self::default();
        table.zones.push(HashMap::new());
        table.pass = 1;
        table.zone_seq = 1;
        table
    }

    /// Reset per-pass scoping state. Pass 1 starts from an empty table;
    /// pass 2 keeps all values for forward-reference resolution.
    pub fn begin_pass(&mut self, pass: u8) {
        self.pass = pass;
        self.current_zone = 0;
        self.zone_seq = 1;
        self.parent_seq = 0;
        self.defined_this_pass.clear();
        if pass == 1 {
            self.globals.clear();
            self.zones.clear();
            self.zones.push(HashMap::new());
            self.cheap.clear();
            self.anon.clear();
        }
    }

    #[must_use]
    pub fn pass(&self) -> u8 {
        self.pass
    }

    /// Switch to the next zone. Zone identities are handed out in source
    /// order, so pass 2 re-enters the same zones as pass 1.
    pub fn enter_zone(&mut self) -> usize {
        let previous = self.current_zone;
        if self.zone_seq >= self.zones.len() {
            self.zones.push(HashMap::new());
        }
        self.current_zone = self.zone_seq;
        self.zone_seq += 1;
        previous
    }

    /// Restore a zone saved by [`SymbolTable::enter_zone`]. Used when a
    /// macro body's private zone ends.
    pub fn restore_zone(&mut self, zone: usize) {
        self.current_zone = zone;
    }

    /// Define a label at an address. Global labels open a fresh cheap-local
    /// scope.
    pub fn define_label(&mut self, name: &str, value: Value) -> DefineOutcome {
        if Self::is_global_name(name) {
            self.parent_seq += 1;
        }
        self.define(name, value, false)
    }

    /// Define a symbol. Variables (`!set`) may be reassigned freely.
    pub fn define(&mut self, name: &str, value: Value, is_variable: bool) -> DefineOutcome {
        let key = self.pass_key(name);
        let existing = self.peek(name);

        let mut sticky_variable = is_variable;
        if let Some(existing) = &existing {
            sticky_variable |= existing.is_variable;
            if !sticky_variable {
                if self.defined_this_pass.contains(&key) {
                    return DefineOutcome::Duplicate;
                }
                // A pass-1 value of Undefined is a placeholder, not a layout
                // decision, so it cannot mismatch.
                if self.pass == 2
                    && !existing.value.is_undefined()
                    && !same_value(&existing.value, &value)
                {
                    return DefineOutcome::PhaseMismatch(existing.value.clone());
                }
            }
        }

        let symbol = Symbol {
            value,
            is_variable: sticky_variable,
            defined_in_pass: self.pass,
        };
        self.insert(name, symbol);
        self.defined_this_pass.insert(key);
        DefineOutcome::Ok
    }

    /// Look in the exact namespace a definition targets, without the bare
    /// lookup fallback chain.
    fn peek(&self, name: &str) -> Option<Symbol> {
        if let Some(bare) = name.strip_prefix('@') {
            return self.cheap.get(&(self.parent_seq, bare.to_string())).cloned();
        }
        if let Some(bare) = name.strip_prefix('.') {
            return self.zones[self.current_zone].get(bare).cloned();
        }
        self.globals.get(name).cloned()
    }

    fn insert(&mut self, name: &str, symbol: Symbol) {
        if let Some(bare) = name.strip_prefix('@') {
            self.cheap
                .insert((self.parent_seq, bare.to_string()), symbol);
        } else if let Some(bare) = name.strip_prefix('.') {
            self.zones[self.current_zone].insert(bare.to_string(), symbol);
        } else {
            self.globals.insert(name.to_string(), symbol);
        }
    }

    /// Resolve a name. Returns the value and whether the reference is a
    /// forward one (not yet defined in the current pass).
    #[must_use]
    pub fn resolve(&self, name: &str) -> Option<(Value, bool)> {
        if let Some(stripped) = name.strip_prefix('@') {
            return self.get_cheap(stripped);
        }
        if let Some(stripped) = name.strip_prefix('.') {
            return self.get_zone_local(stripped);
        }
        self.get_cheap(name)
            .or_else(|| self.get_zone_local(name))
            .or_else(|| {
                self.globals.get(name).map(|sym| {
                    (
                        sym.value.clone(),
                        !self.defined_this_pass.contains(name),
                    )
                })
            })
    }

    /// Check if a name is visible in any scope, for `!ifdef`/`!ifndef`.
    #[must_use]
    pub fn is_defined(&self, name: &str) -> bool {
        self.resolve(name).is_some()
    }

    fn get_cheap(&self, bare: &str) -> Option<(Value, bool)> {
        let key = (self.parent_seq, bare.to_string());
        self.cheap.get(&key).map(|sym| {
            let pass_key = format!("@{}/{bare}", self.parent_seq);
            (
                sym.value.clone(),
                !self.defined_this_pass.contains(&pass_key),
            )
        })
    }

    fn get_zone_local(&self, bare: &str) -> Option<(Value, bool)> {
        self.zones[self.current_zone].get(bare).map(|sym| {
            let pass_key = format!(".{}/{bare}", self.current_zone);
            (
                sym.value.clone(),
                !self.defined_this_pass.contains(&pass_key),
            )
        })
    }

    fn is_global_name(name: &str) -> bool {
        !name.starts_with('.') && !name.starts_with('@')
    }

    fn pass_key(&self, name: &str) -> String {
        if let Some(stripped) = name.strip_prefix('@') {
            format!("@{}/{stripped}", self.parent_seq)
        } else if let Some(stripped) = name.strip_prefix('.') {
            format!(".{}/{stripped}", self.current_zone)
        } else {
            name.to_string()
        }
    }

    /// Record an anonymous label occurrence during pass 1.
    pub fn record_anon(&mut self, marker: &str, stmt: u64, pc: i64) {
        if self.pass != 1 {
            return;
        }
        self.anon
            .entry((self.current_zone, marker.to_string()))
            .or_default()
            .push(AnonRecord { stmt, pc });
    }

    /// Resolve an anonymous reference at statement `stmt`. `+` markers find
    /// the nearest following occurrence, `-` markers the nearest preceding
    /// one. Returns the PC and the forward flag.
    #[must_use]
    pub fn resolve_anon(&self, marker: &str, stmt: u64) -> Option<(i64, bool)> {
        let records = self.anon.get(&(self.current_zone, marker.to_string()))?;
        if marker.starts_with('+') {
            let ix = records.partition_point(|r| r.stmt <= stmt);
            records.get(ix).map(|r| (r.pc, true))
        } else {
            let ix = records.partition_point(|r| r.stmt < stmt);
            ix.checked_sub(1).map(|ix| (records[ix].pc, false))
        }
    }

    /// All global symbols, sorted by name, for the symbol dump and the VICE
    /// label file.
    #[must_use]
    pub fn globals_sorted(&self) -> Vec<(&str, &Symbol)> {
        let mut entries: Vec<(&str, &Symbol)> = self
            .globals
            .iter()
            .map(|(name, sym)| (name.as_str(), sym))
            .collect();
        entries.sort_by_key(|(name, _)| *name);
        entries
    }
}

/// Numeric-aware value equality for the phase-error check.
fn same_value(a: &Value, b: &Value) -> bool {
    match (a.as_float(), b.as_float()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn define_and_resolve_global() {
        let mut table = SymbolTable::new();
        table.begin_pass(1);
        assert_eq!(
            table.define_label("start", Value::Int(0xc000)),
            DefineOutcome::Ok
        );
        assert_eq!(table.resolve("start"), Some((Value::Int(0xc000), false)));
        assert_eq!(table.resolve("missing"), None);
    }

    #[test]
    fn duplicate_in_same_pass_rejected() {
        let mut table = SymbolTable::new();
        table.begin_pass(1);
        assert_eq!(table.define("x", Value::Int(1), false), DefineOutcome::Ok);
        assert_eq!(
            table.define("x", Value::Int(2), false),
            DefineOutcome::Duplicate
        );
    }

    #[test]
    fn variables_reassign_freely() {
        let mut table = SymbolTable::new();
        table.begin_pass(1);
        assert_eq!(table.define("v", Value::Int(1), true), DefineOutcome::Ok);
        assert_eq!(table.define("v", Value::Int(2), true), DefineOutcome::Ok);
        assert_eq!(table.resolve("v"), Some((Value::Int(2), false)));
    }

    #[test]
    fn pass2_redefinition_with_same_value_is_ok() {
        let mut table = SymbolTable::new();
        table.begin_pass(1);
        assert_eq!(
            table.define_label("lbl", Value::Int(0x1000)),
            DefineOutcome::Ok
        );
        table.begin_pass(2);
        // Before redefinition the pass-1 value resolves as a forward ref.
        assert_eq!(table.resolve("lbl"), Some((Value::Int(0x1000), true)));
        assert_eq!(
            table.define_label("lbl", Value::Int(0x1000)),
            DefineOutcome::Ok
        );
        assert_eq!(table.resolve("lbl"), Some((Value::Int(0x1000), false)));
    }

    #[test]
    fn pass2_value_change_is_phase_mismatch() {
        let mut table = SymbolTable::new();
        table.begin_pass(1);
        assert_eq!(
            table.define_label("lbl", Value::Int(0x1000)),
            DefineOutcome::Ok
        );
        table.begin_pass(2);
        assert_eq!(
            table.define_label("lbl", Value::Int(0x1002)),
            DefineOutcome::PhaseMismatch(Value::Int(0x1000))
        );
    }

    #[test]
    fn zone_locals_are_scoped() {
        let mut table = SymbolTable::new();
        table.begin_pass(1);
        assert_eq!(
            table.define_label(".loop", Value::Int(0x10)),
            DefineOutcome::Ok
        );
        assert_eq!(table.resolve(".loop"), Some((Value::Int(0x10), false)));
        let _ = table.enter_zone();
        assert_eq!(table.resolve(".loop"), None);
        // Same local name in a new zone is fine.
        assert_eq!(
            table.define_label(".loop", Value::Int(0x20)),
            DefineOutcome::Ok
        );
        assert_eq!(table.resolve(".loop"), Some((Value::Int(0x20), false)));
    }

    #[test]
    fn cheap_locals_reset_at_global_labels() {
        let mut table = SymbolTable::new();
        table.begin_pass(1);
        assert_eq!(
            table.define_label("first", Value::Int(0x1000)),
            DefineOutcome::Ok
        );
        assert_eq!(
            table.define_label("@tmp", Value::Int(0x1002)),
            DefineOutcome::Ok
        );
        assert_eq!(table.resolve("@tmp"), Some((Value::Int(0x1002), false)));
        // A new global label opens a fresh cheap scope.
        assert_eq!(
            table.define_label("second", Value::Int(0x1010)),
            DefineOutcome::Ok
        );
        assert_eq!(table.resolve("@tmp"), None);
        assert_eq!(
            table.define_label("@tmp", Value::Int(0x1012)),
            DefineOutcome::Ok
        );
        assert_eq!(table.resolve("@tmp"), Some((Value::Int(0x1012), false)));
    }

    #[test]
    fn bare_lookup_checks_cheap_then_zone_then_global() {
        let mut table = SymbolTable::new();
        table.begin_pass(1);
        assert_eq!(table.define("name", Value::Int(1), false), DefineOutcome::Ok);
        assert_eq!(
            table.define(".name", Value::Int(2), false),
            DefineOutcome::Ok
        );
        assert_eq!(table.resolve("name"), Some((Value::Int(2), false)));
        assert_eq!(
            table.define_label("anchor", Value::Int(0)),
            DefineOutcome::Ok
        );
        assert_eq!(
            table.define("@name", Value::Int(3), false),
            DefineOutcome::Ok
        );
        assert_eq!(table.resolve("name"), Some((Value::Int(3), false)));
    }

    #[test]
    fn anonymous_resolution_is_positional() {
        let mut table = SymbolTable::new();
        table.begin_pass(1);
        table.record_anon("-", 5, 0x0800);
        table.record_anon("-", 9, 0x0810);
        table.record_anon("+", 12, 0x0820);

        assert_eq!(table.resolve_anon("-", 7), Some((0x0800, false)));
        assert_eq!(table.resolve_anon("-", 10), Some((0x0810, false)));
        assert_eq!(table.resolve_anon("-", 5), None);
        assert_eq!(table.resolve_anon("+", 10), Some((0x0820, true)));
        assert_eq!(table.resolve_anon("+", 12), None);
        assert_eq!(table.resolve_anon("++", 10), None);
    }

    #[test]
    fn anonymous_labels_are_zone_scoped() {
        let mut table = SymbolTable::new();
        table.begin_pass(1);
        table.record_anon("-", 1, 0x0800);
        let _ = table.enter_zone();
        assert_eq!(table.resolve_anon("-", 5), None);
    }
}
