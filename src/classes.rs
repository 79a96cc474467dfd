//! The lexically scoped element class table.

use crate::compound::Compound;
use fxhash::FxHashMap;
use log::warn;

/// Index of a class slot in the [ClassTable].
pub type ClassId = usize;

/// The built-in pseudo class marking tunnel endpoints.
pub const TUNNEL_TYPE: ClassId = 0;
/// The built-in placeholder class installed at error sites.
pub const ERROR_TYPE: ClassId = 1;

///
/// The body of an element class.
///
#[derive(Debug, Clone)]
pub enum ElementClass {
    /// An opaque class provided by the embedding host.
    Builtin(BuiltinClass),
    /// A class that delegates entirely to another class.
    Synonym(ClassId),
    /// A user-defined, parameterized class with a captured subgraph.
    Compound(Box<Compound>),
}

impl ElementClass {
    /// Creates a host-provided builtin class body.
    pub fn builtin(name: impl Into<String>) -> Self {
        ElementClass::Builtin(BuiltinClass { name: name.into() })
    }

    ///
    /// The placeholder body installed wherever a class is missing, so
    /// that parsing can continue.
    ///
    pub fn error_placeholder() -> Self {
        ElementClass::builtin("Error")
    }
}

///
/// An opaque host-provided class. The front-end only ever forwards it
/// to the router sink.
///
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltinClass {
    pub name: String,
}

///
/// An opaque cookie naming the top of the class table at scope entry.
/// Passing it to [ClassTable::scope_out] rolls the table back exactly
/// to that state.
///
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub struct ScopeCookie {
    pub(crate) last: Option<ClassId>,
}

#[derive(Debug)]
struct ClassSlot {
    name: String,
    class: ElementClass,
    /// The previously added slot, forming the scope chain.
    prev: Option<ClassId>,
}

///
/// The class table: a vector of slots with a free list, a name map and
/// a scope chain through the `prev` links.
///
/// For any name, the map holds the most recently added live slot of
/// that name; older slots of the same name stay reachable through the
/// scope chain and become visible again when the newer one is removed.
///
#[derive(Debug)]
pub struct ClassTable {
    slots: Vec<Option<ClassSlot>>,
    map: FxHashMap<String, ClassId>,
    last: Option<ClassId>,
    free: Vec<ClassId>,
}

impl ClassTable {
    ///
    /// Creates a table with the two required builtins installed:
    /// `<tunnel>` and `Error`.
    ///
    pub fn new() -> Self {
        let mut table = Self {
            slots: Vec::new(),
            map: FxHashMap::default(),
            last: None,
            free: Vec::new(),
        };
        let tunnel = table.add("<tunnel>", ElementClass::builtin("<tunnel>"));
        let error = table.add("Error", ElementClass::error_placeholder());
        debug_assert_eq!(tunnel, TUNNEL_TYPE);
        debug_assert_eq!(error, ERROR_TYPE);
        table
    }

    ///
    /// Appends a new class under the given name, displacing any prior
    /// binding of that name, and returns its id.
    ///
    pub fn add(&mut self, name: impl Into<String>, class: ElementClass) -> ClassId {
        let name = name.into();
        let slot = ClassSlot {
            name: name.clone(),
            class,
            prev: self.last,
        };
        let id = match self.free.pop() {
            Some(id) => {
                self.slots[id] = Some(slot);
                id
            }
            None => {
                self.slots.push(Some(slot));
                self.slots.len() - 1
            }
        };
        self.map.insert(name, id);
        self.last = Some(id);
        id
    }

    /// Looks up the currently visible class of the given name.
    pub fn lookup(&self, name: &str) -> Option<ClassId> {
        self.map.get(name).copied()
    }

    /// The body of a live class.
    pub fn get(&self, id: ClassId) -> &ElementClass {
        &self.slot(id).class
    }

    /// The name a class was registered under.
    pub fn class_name(&self, id: ClassId) -> &str {
        &self.slot(id).name
    }

    ///
    /// Follows synonym links down to the terminal class.
    ///
    pub fn resolve_synonyms(&self, mut id: ClassId) -> ClassId {
        while let ElementClass::Synonym(target) = self.slot(id).class {
            id = target;
        }
        id
    }

    ///
    /// Returns the compound body of a class, looking through synonyms.
    ///
    pub fn compound(&self, id: ClassId) -> Option<&Compound> {
        match &self.slot(self.resolve_synonyms(id)).class {
            ElementClass::Compound(compound) => Some(compound),
            _ => None,
        }
    }

    ///
    /// Enumerates the currently visible class names, excluding the
    /// internal `<tunnel>` class. The order is unspecified.
    ///
    pub fn type_names(&self) -> Vec<String> {
        self.map
            .keys()
            .filter(|name| name.as_str() != "<tunnel>")
            .cloned()
            .collect()
    }

    // === Lexical scoping ===

    ///
    /// Marks the current top of the table.
    ///
    pub fn scope_in(&self) -> ScopeCookie {
        ScopeCookie { last: self.last }
    }

    ///
    /// Removes every class added after the cookie was taken, rebinding
    /// the name map to the nearest surviving class of each removed
    /// name. A cookie that is no longer on the scope chain is ignored.
    ///
    pub fn scope_out(&mut self, cookie: ScopeCookie) {
        if let Some(boundary) = cookie.last {
            let mut trav = self.last;
            let mut found = false;
            while let Some(id) = trav {
                if id == boundary {
                    found = true;
                    break;
                }
                trav = self.slot(id).prev;
            }
            if !found {
                warn!("stale scope cookie, class table left untouched");
                return;
            }
        }

        while self.last != cookie.last {
            let Some(id) = self.last else { break };
            self.remove(id);
        }
    }

    fn remove(&mut self, removed: ClassId) {
        // unlink from the scope chain
        let mut prev: Option<ClassId> = None;
        let mut trav = self.last;
        while let Some(id) = trav {
            if id == removed {
                break;
            }
            prev = Some(id);
            trav = self.slot(id).prev;
        }
        if trav.is_none() {
            return;
        }
        let removed_prev = self.slot(removed).prev;
        match prev {
            Some(p) => self.slot_mut(p).prev = removed_prev,
            None => self.last = removed_prev,
        }

        // rebind the name map to the next older class of the same name
        let name = self.slot(removed).name.clone();
        if self.map.get(&name) == Some(&removed) {
            let mut trav = removed_prev;
            while let Some(id) = trav {
                if self.slot(id).name == name {
                    break;
                }
                trav = self.slot(id).prev;
            }
            match trav {
                Some(id) => {
                    self.map.insert(name, id);
                }
                None => {
                    self.map.remove(&name);
                }
            }
        }

        self.slots[removed] = None;
        self.free.push(removed);
    }

    // === Per-body map snapshots for compound scoping ===

    pub(crate) fn map_snapshot(&self) -> FxHashMap<String, ClassId> {
        self.map.clone()
    }

    pub(crate) fn restore_map(&mut self, map: FxHashMap<String, ClassId>) {
        self.map = map;
    }

    fn slot(&self, id: ClassId) -> &ClassSlot {
        self.slots[id].as_ref().expect("stale class id")
    }

    fn slot_mut(&mut self, id: ClassId) -> &mut ClassSlot {
        self.slots[id].as_mut().expect("stale class id")
    }
}

impl Default for ClassTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_installed() {
        let table = ClassTable::new();
        assert_eq!(table.lookup("<tunnel>"), Some(TUNNEL_TYPE));
        assert_eq!(table.lookup("Error"), Some(ERROR_TYPE));
    }

    #[test]
    fn latest_of_name_wins() {
        let mut table = ClassTable::new();
        let first = table.add("Foo", ElementClass::builtin("Foo"));
        let second = table.add("Foo", ElementClass::builtin("Foo"));
        assert_ne!(first, second);
        assert_eq!(table.lookup("Foo"), Some(second));
    }

    #[test]
    fn scope_roundtrip_restores_bindings() {
        let mut table = ClassTable::new();
        let outer = table.add("Foo", ElementClass::builtin("Foo"));
        let cookie = table.scope_in();
        let inner = table.add("Foo", ElementClass::builtin("Foo"));
        let only_inner = table.add("Bar", ElementClass::builtin("Bar"));
        assert_eq!(table.lookup("Foo"), Some(inner));
        assert_eq!(table.lookup("Bar"), Some(only_inner));

        table.scope_out(cookie);
        assert_eq!(table.lookup("Foo"), Some(outer));
        assert_eq!(table.lookup("Bar"), None);
    }

    #[test]
    fn removed_slots_are_reused() {
        let mut table = ClassTable::new();
        let cookie = table.scope_in();
        let scoped = table.add("Tmp", ElementClass::builtin("Tmp"));
        table.scope_out(cookie);
        let reused = table.add("New", ElementClass::builtin("New"));
        assert_eq!(scoped, reused);
    }

    #[test]
    fn stale_cookie_is_ignored() {
        let mut table = ClassTable::new();
        let cookie = table.scope_in();
        let id = table.add("Foo", ElementClass::builtin("Foo"));
        let stale = table.scope_in();
        table.scope_out(cookie);
        // `stale` named a slot that no longer exists
        table.scope_out(stale);
        assert_eq!(table.lookup("Foo"), None);
        let _ = id;
    }

    #[test]
    fn synonyms_resolve_transitively() {
        let mut table = ClassTable::new();
        let base = table.add("Base", ElementClass::builtin("Base"));
        let syn = table.add("Syn", ElementClass::Synonym(base));
        let syn2 = table.add("Syn2", ElementClass::Synonym(syn));
        assert_eq!(table.resolve_synonyms(syn2), base);
    }

    #[test]
    fn type_names_hide_tunnel() {
        let mut table = ClassTable::new();
        table.add("Foo", ElementClass::builtin("Foo"));
        let mut names = table.type_names();
        names.sort();
        assert_eq!(names, vec!["Error", "Foo"]);
    }
}
