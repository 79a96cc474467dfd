//! The downstream router interface.
//!
//! The expansion pass only ever talks to a [Router] sink. The crate
//! ships [GraphRouter], a plain collector that records the resolved
//! graph and can serialize it back into canonical configuration text;
//! hosts with a real runtime implement [Router] themselves.

use crate::classes::ElementClass;
use crate::Landmark;

use std::fmt::Display;

///
/// The sink receiving the fully resolved graph.
///
/// `add_element` is called once per element in index order, then
/// `add_connection` once per resolved connection, then
/// `add_requirement` once per requirement, with no duplicates.
///
pub trait Router {
    ///
    /// Registers an element and returns the router-side id used in
    /// later `add_connection` calls.
    ///
    fn add_element(
        &mut self,
        class: &ElementClass,
        name: &str,
        configuration: &str,
        landmark: &Landmark,
    ) -> usize;

    fn add_connection(&mut self, from: usize, from_port: usize, to: usize, to_port: usize);

    fn add_requirement(&mut self, requirement: &str);
}

///
/// One element as seen by the router.
///
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouterElement {
    pub name: String,
    pub class: String,
    pub configuration: String,
    pub landmark: Landmark,
}

///
/// One resolved port-to-port connection.
///
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RouterConnection {
    pub from: usize,
    pub from_port: usize,
    pub to: usize,
    pub to_port: usize,
}

///
/// The default sink: records the resolved graph verbatim.
///
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GraphRouter {
    pub elements: Vec<RouterElement>,
    pub connections: Vec<RouterConnection>,
    pub requirements: Vec<String>,
}

impl GraphRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up an element id by name.
    pub fn element(&self, name: &str) -> Option<usize> {
        self.elements.iter().position(|e| e.name == name)
    }

    /// Indicates whether the given named elements are connected.
    pub fn connected(&self, from: &str, to: &str) -> bool {
        match (self.element(from), self.element(to)) {
            (Some(from), Some(to)) => self
                .connections
                .iter()
                .any(|c| c.from == from && c.to == to),
            _ => false,
        }
    }
}

impl Router for GraphRouter {
    fn add_element(
        &mut self,
        class: &ElementClass,
        name: &str,
        configuration: &str,
        landmark: &Landmark,
    ) -> usize {
        let class = match class {
            ElementClass::Builtin(builtin) => builtin.name.clone(),
            ElementClass::Compound(compound) => compound.name().to_string(),
            ElementClass::Synonym(_) => "<synonym>".to_string(),
        };
        self.elements.push(RouterElement {
            name: name.to_string(),
            class,
            configuration: configuration.to_string(),
            landmark: landmark.clone(),
        });
        self.elements.len() - 1
    }

    fn add_connection(&mut self, from: usize, from_port: usize, to: usize, to_port: usize) {
        self.connections.push(RouterConnection {
            from,
            from_port,
            to,
            to_port,
        });
    }

    fn add_requirement(&mut self, requirement: &str) {
        self.requirements.push(requirement.to_string());
    }
}

///
/// Serializes the graph as canonical configuration text: requirements,
/// element declarations, then one connection per line. Re-parsing the
/// output (with the same classes registered) reproduces the graph.
///
impl Display for GraphRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for requirement in &self.requirements {
            writeln!(f, "require({});", requirement)?;
        }
        for element in &self.elements {
            if element.configuration.is_empty() {
                writeln!(f, "{} :: {};", element.name, element.class)?;
            } else {
                writeln!(f, "{} :: {}({});", element.name, element.class, element.configuration)?;
            }
        }
        for c in &self.connections {
            writeln!(
                f,
                "{} [{}] -> [{}] {};",
                self.elements[c.from].name, c.from_port, c.to_port, self.elements[c.to].name
            )?;
        }
        Ok(())
    }
}
