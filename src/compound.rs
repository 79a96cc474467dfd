//! User-defined, parameterized element classes.

use crate::classes::{ClassId, ClassTable};
use crate::error::{ErrorCode, ErrorContext};
use crate::graph::{Graph, PortRef};
use crate::Landmark;

use std::mem;

///
/// A link in an overload chain: either another captured body of the
/// same class declaration, or a previously declared class it extends.
///
#[derive(Debug, Clone)]
pub enum Overload {
    Compound(Box<Compound>),
    Class(ClassId),
}

///
/// The result of overload resolution over a chain.
///
#[derive(Debug)]
pub enum Resolved<'a> {
    /// A compound body with matching arity.
    Compound(&'a Compound),
    /// The chain ended in a non-compound class, which is adopted.
    Class(ClassId),
}

///
/// The captured body of a user-defined element class.
///
/// Elements 0 and 1 of the captured subgraph are always the `input`
/// and `output` tunnel stubs; `finish` derives the class arity from
/// how the body uses them.
///
#[derive(Debug, Clone)]
pub struct Compound {
    name: String,
    landmark: Landmark,
    /// The compound nesting level this body was parsed at.
    depth: usize,

    formals: Vec<String>,
    ninputs: usize,
    noutputs: usize,

    pub(crate) elements: Vec<ClassId>,
    pub(crate) element_names: Vec<String>,
    pub(crate) element_configurations: Vec<String>,
    pub(crate) element_landmarks: Vec<Landmark>,

    pub(crate) hookup_from: Vec<PortRef>,
    pub(crate) hookup_to: Vec<PortRef>,

    next: Option<Overload>,
}

impl Compound {
    pub fn new(name: String, landmark: Landmark, depth: usize, next: Option<Overload>) -> Self {
        Self {
            name,
            landmark,
            depth,
            formals: Vec::new(),
            ninputs: 0,
            noutputs: 0,
            elements: Vec::new(),
            element_names: Vec::new(),
            element_configurations: Vec::new(),
            element_landmarks: Vec::new(),
            hookup_from: Vec::new(),
            hookup_to: Vec::new(),
            next,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn landmark(&self) -> &Landmark {
        &self.landmark
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn formals(&self) -> &[String] {
        &self.formals
    }

    pub fn nformals(&self) -> usize {
        self.formals.len()
    }

    pub fn ninputs(&self) -> usize {
        self.ninputs
    }

    pub fn noutputs(&self) -> usize {
        self.noutputs
    }

    pub fn add_formal(&mut self, formal: impl Into<String>) {
        self.formals.push(formal.into());
    }

    ///
    /// Swaps the captured subgraph with the live graph of the parser.
    /// Called once to stash the outer graph while the body is being
    /// parsed, and once to capture the finished body.
    ///
    pub(crate) fn swap_graph(&mut self, graph: &mut Graph) {
        mem::swap(&mut self.elements, &mut graph.elements);
        mem::swap(&mut self.element_names, &mut graph.element_names);
        mem::swap(&mut self.element_configurations, &mut graph.element_configurations);
        mem::swap(&mut self.element_landmarks, &mut graph.element_landmarks);
        mem::swap(&mut self.hookup_from, &mut graph.hookup_from);
        mem::swap(&mut self.hookup_to, &mut graph.hookup_to);
    }

    ///
    /// Derives `(ninputs, noutputs)` from the uses of the `input` and
    /// `output` stub elements and reports misuse: every input port must
    /// be connected, `input` may only source connections and `output`
    /// may only sink them.
    ///
    pub fn finish(&mut self, ectx: &mut ErrorContext) {
        debug_assert!(self.element_names[0] == "input" && self.element_names[1] == "output");

        let mut from_in: Vec<bool> = Vec::new();
        let mut to_out: Vec<bool> = Vec::new();
        let mut to_in = false;
        let mut from_out = false;

        for i in 0..self.hookup_from.len() {
            let hf = self.hookup_from[i];
            let ht = self.hookup_to[i];

            if hf.element == 0 {
                if from_in.len() <= hf.port {
                    from_in.resize(hf.port + 1, false);
                }
                from_in[hf.port] = true;
            } else if hf.element == 1 {
                from_out = true;
            }

            if ht.element == 1 {
                if to_out.len() <= ht.port {
                    to_out.resize(ht.port + 1, false);
                }
                to_out[ht.port] = true;
            } else if ht.element == 0 {
                to_in = true;
            }
        }

        self.ninputs = from_in.len();
        if to_in {
            ectx.error(
                self.landmark.clone(),
                ErrorCode::ExpPseudoelementMisuse,
                format!("`{}' pseudoelement `input' may only be used as output", self.name),
            );
        }
        for (port, used) in from_in.iter().enumerate() {
            if !used {
                ectx.error(
                    self.landmark.clone(),
                    ErrorCode::ExpUnusedCompoundPort,
                    format!("compound element `{}' input {} unused", self.name, port),
                );
            }
        }

        self.noutputs = to_out.len();
        if from_out {
            ectx.error(
                self.landmark.clone(),
                ErrorCode::ExpPseudoelementMisuse,
                format!("`{}' pseudoelement `output' may only be used as input", self.name),
            );
        }
        for (port, used) in to_out.iter().enumerate() {
            if !used {
                ectx.error(
                    self.landmark.clone(),
                    ErrorCode::ExpUnusedCompoundPort,
                    format!("compound element `{}' output {} unused", self.name, port),
                );
            }
        }
    }

    // === Overload resolution ===

    ///
    /// Selects the first overload whose arity equals the given triple,
    /// searching most-recent-first. A chain that runs out into a
    /// non-compound class yields that class for adoption; an exhausted
    /// chain yields `None`.
    ///
    pub fn find_relevant_class<'a>(
        &'a self,
        classes: &'a ClassTable,
        ninputs: usize,
        noutputs: usize,
        nformals: usize,
    ) -> Option<Resolved<'a>> {
        let mut ct = self;
        loop {
            if ct.ninputs == ninputs && ct.noutputs == noutputs && ct.formals.len() == nformals {
                return Some(Resolved::Compound(ct));
            }
            match &ct.next {
                None => return None,
                Some(Overload::Compound(next)) => ct = next,
                Some(Overload::Class(id)) => match classes.compound(*id) {
                    Some(next) => ct = next,
                    None => return Some(Resolved::Class(*id)),
                },
            }
        }
    }

    ///
    /// Reports one note per overload signature in the chain, oldest
    /// first, for "possibilities are:" listings.
    ///
    pub fn report_signatures(&self, classes: &ClassTable, ectx: &mut ErrorContext) {
        match &self.next {
            None => {}
            Some(Overload::Compound(next)) => next.report_signatures(classes, ectx),
            Some(Overload::Class(id)) => match classes.compound(*id) {
                Some(next) => next.report_signatures(classes, ectx),
                None => ectx.message(self.landmark.clone(), format!("`{}[...]'", self.name)),
            },
        }
        ectx.message(self.landmark.clone(), format!("`{}'", self.signature()));
    }

    ///
    /// Reports every pair of overloads of this declaration that share
    /// the same `(ninputs, noutputs, nformals)` triple.
    ///
    pub fn check_duplicates(&self, ectx: &mut ErrorContext) {
        let mut chain: Vec<&Compound> = vec![self];
        let mut cur = self;
        while let Some(Overload::Compound(next)) = &cur.next {
            chain.push(next);
            cur = next;
        }

        for i in 0..chain.len() {
            for j in (i + 1)..chain.len() {
                let (a, b) = (chain[i], chain[j]);
                if a.ninputs == b.ninputs
                    && a.noutputs == b.noutputs
                    && a.formals.len() == b.formals.len()
                {
                    ectx.error(
                        a.landmark.clone(),
                        ErrorCode::ExpDuplicateSignature,
                        format!("redeclaration of `{}'", a.signature()),
                    );
                    ectx.error(
                        b.landmark.clone(),
                        ErrorCode::ExpDuplicateSignature,
                        format!("`{}' previously declared here", b.signature()),
                    );
                    break;
                }
            }
        }
    }

    // === Signatures ===

    pub fn signature(&self) -> String {
        Self::signature_of(&self.name, self.formals.len(), self.ninputs, self.noutputs)
    }

    pub fn signature_of(name: &str, nargs: usize, ninputs: usize, noutputs: usize) -> String {
        let pl_args = if nargs == 1 { " argument, " } else { " arguments, " };
        let pl_ins = if ninputs == 1 { " input, " } else { " inputs, " };
        let pl_outs = if noutputs == 1 { " output" } else { " outputs" };
        format!(
            "{}[{}{}{}{}{}{}]",
            name, nargs, pl_args, ninputs, pl_ins, noutputs, pl_outs
        )
    }
}
