//! The graph expansion pass.
//!
//! Walks the provisional graph, resolves every compound invocation
//! against its overload chain, instantiates the selected body as a
//! renamed subgraph with the invocation's variables substituted, and
//! finally emits the fully resolved graph to the router sink: elements
//! first, then connections, then requirements, each exactly once.

use crate::classes::{ClassTable, ERROR_TYPE, TUNNEL_TYPE};
use crate::compound::{Compound, Resolved};
use crate::config;
use crate::env::VariableEnvironment;
use crate::error::{ErrorCode, ErrorContext};
use crate::graph::{Graph, PortRef};
use crate::parser::Parser;
use crate::router::{GraphRouter, Router};
use crate::tunnel::{add_tunnel, TunnelRegistry};

use fxhash::FxHashSet;
use log::trace;

impl Parser {
    ///
    /// Runs the expansion pass into a fresh [GraphRouter].
    ///
    pub fn create_router(&mut self) -> GraphRouter {
        let mut router = GraphRouter::new();
        self.expand_router(&mut router);
        router
    }

    ///
    /// Runs the expansion pass, emitting the resolved graph to the
    /// given sink.
    ///
    pub fn expand_router<R: Router>(&mut self, router: &mut R) {
        // expand compounds; the loop bound grows as expansion appends
        // elements, so nested compounds are reached in later turns
        let mut environment_map: Vec<usize> = vec![0; self.graph.len()];
        let mut environments: Vec<VariableEnvironment> = vec![VariableEnvironment::new()];

        let mut i = 0;
        while i < self.graph.len() {
            let class = self.graph.elements[i];
            if class != TUNNEL_TYPE && self.classes.compound(class).is_some() {
                self.expand_compound_element(i, &mut environment_map, &mut environments);
            }
            i += 1;
        }
        trace!(
            "expanded provisional graph to {} elements, {} environments",
            self.graph.len(),
            environments.len()
        );

        // add elements to the router
        let mut router_id: Vec<Option<usize>> = Vec::with_capacity(self.graph.len());
        for i in 0..self.graph.len() {
            let class = self.graph.elements[i];
            if class != TUNNEL_TYPE {
                let terminal = self.classes.resolve_synonyms(class);
                let id = router.add_element(
                    self.classes.get(terminal),
                    &self.graph.element_names[i],
                    &self.graph.element_configurations[i],
                    &self.graph.element_landmarks[i],
                );
                router_id.push(Some(id));
            } else {
                router_id.push(None);
            }
        }

        // add connections to the router
        let mut emitted: FxHashSet<(usize, usize, usize, usize)> = FxHashSet::default();
        for c in 0..self.graph.hookup_from.len() {
            let hf = self.graph.hookup_from[c];
            let ht = self.graph.hookup_to[c];
            match (router_id[hf.element], router_id[ht.element]) {
                (Some(from), Some(to)) => {
                    if emitted.insert((from, hf.port, to, ht.port)) {
                        router.add_connection(from, hf.port, to, ht.port);
                    }
                }
                _ => self.add_router_connections(c, &router_id, &mut emitted, router),
            }
        }

        // add requirements to the router
        for requirement in &self.graph.requirements {
            router.add_requirement(requirement);
        }
    }

    ///
    /// Emits the leaf connections one tunnel-involving hookup stands
    /// for: the cross product of the expanded from- and to-sides.
    ///
    fn add_router_connections<R: Router>(
        &mut self,
        c: usize,
        router_id: &[Option<usize>],
        emitted: &mut FxHashSet<(usize, usize, usize, usize)>,
        router: &mut R,
    ) {
        let mut hfrom = Vec::new();
        self.tunnels.expand_connection(
            self.graph.hookup_from[c],
            true,
            &mut hfrom,
            &self.graph,
            &mut self.ectx,
        );
        let mut hto = Vec::new();
        self.tunnels.expand_connection(
            self.graph.hookup_to[c],
            false,
            &mut hto,
            &self.graph,
            &mut self.ectx,
        );

        for f in &hfrom {
            let Some(from) = router_id[f.element] else { continue };
            for t in &hto {
                let Some(to) = router_id[t.element] else { continue };
                if emitted.insert((from, f.port, to, t.port)) {
                    router.add_connection(from, f.port, to, t.port);
                }
            }
        }
    }

    ///
    /// Resolves one compound invocation: selects the overload matching
    /// the element's used ports and argument count, picks or builds the
    /// variable environment, and instantiates the body.
    ///
    fn expand_compound_element(
        &mut self,
        which: usize,
        environment_map: &mut Vec<usize>,
        environments: &mut Vec<VariableEnvironment>,
    ) {
        let etype = self.graph.elements[which];
        let old_nelements = self.graph.len();

        let args = config::split_args(&self.graph.element_configurations[which]);
        let mut inputs_used = 0usize;
        let mut outputs_used = 0usize;
        for i in 0..self.graph.hookup_from.len() {
            let hf = self.graph.hookup_from[i];
            let ht = self.graph.hookup_to[i];
            if ht.element == which && ht.port >= inputs_used {
                inputs_used = ht.port + 1;
            }
            if hf.element == which && hf.port >= outputs_used {
                outputs_used = hf.port + 1;
            }
        }

        let Some(compound) = self.classes.compound(etype) else {
            return;
        };
        match compound.find_relevant_class(&self.classes, inputs_used, outputs_used, args.len()) {
            None => {
                self.ectx.error(
                    compound.landmark().clone(),
                    ErrorCode::ExpNoMatchingOverload,
                    format!(
                        "no match for `{}'",
                        Compound::signature_of(compound.name(), args.len(), inputs_used, outputs_used)
                    ),
                );
                self.ectx.set_context("possibilities are:");
                compound.report_signatures(&self.classes, &mut self.ectx);
                self.ectx.clear_context();
                self.graph.elements[which] = ERROR_TYPE;
            }
            Some(Resolved::Class(id)) => {
                // the chain ran out into a non-compound class: adopt it
                self.graph.elements[which] = id;
            }
            Some(Resolved::Compound(found)) => {
                let mut vei = environment_map[which];
                if args.is_empty() && found.depth() == 0 {
                    vei = 0;
                } else if !args.is_empty()
                    || environments[vei].depth().map_or(false, |d| d >= found.depth())
                {
                    let mut new_ve = VariableEnvironment::new();
                    if vei > 0 {
                        new_ve.enter_env(&environments[vei]);
                    }
                    new_ve.limit_depth(found.depth());
                    new_ve.enter(found.formals(), &args, found.depth());
                    environments.push(new_ve);
                    vei = environments.len() - 1;
                }

                expand_into(
                    found,
                    which,
                    &environments[vei],
                    &self.classes,
                    &mut self.graph,
                    &mut self.tunnels,
                    &mut self.ectx,
                );

                // new elements inherit the invocation's environment
                for _ in old_nelements..self.graph.len() {
                    environment_map.push(vei);
                }
            }
        }
    }
}

///
/// Instantiates a compound body in place of element `which`: the
/// element becomes a tunnel pair threading its ports into the body,
/// and every inner element is created under a `name/` prefix with the
/// environment interpolated into its configuration.
///
fn expand_into(
    compound: &Compound,
    which: usize,
    ve: &VariableEnvironment,
    classes: &ClassTable,
    graph: &mut Graph,
    tunnels: &mut TunnelRegistry,
    ectx: &mut ErrorContext,
) {
    debug_assert!(compound.element_names[0] == "input" && compound.element_names[1] == "output");

    // `ename_slash` is `ename` constrained to end with a slash
    let ename = graph.element_names[which].clone();
    let ename_slash = if ename.ends_with('/') {
        ename.clone()
    } else {
        format!("{}/", ename)
    };
    let landmark = graph.element_landmark(which);

    graph.elements[which] = TUNNEL_TYPE;
    let input_name = format!("{}input", ename_slash);
    let output_name = format!("{}output", ename_slash);
    add_tunnel(graph, tunnels, ectx, landmark.clone(), ename.clone(), input_name.clone());
    add_tunnel(graph, tunnels, ectx, landmark.clone(), output_name.clone(), ename);

    let mut eidx_map: Vec<Option<usize>> = Vec::with_capacity(compound.elements.len());
    eidx_map.push(graph.element_map.get(&input_name).copied());
    eidx_map.push(graph.element_map.get(&output_name).copied());

    for i in 2..compound.elements.len() {
        let cname = format!("{}{}", ename_slash, compound.element_names[i]);
        if let Some(&eidx) = graph.element_map.get(&cname) {
            ectx.error(
                graph.element_landmark(which),
                ErrorCode::NetRedeclaredElement,
                format!("redeclaration of element `{}'", cname),
            );
            ectx.message(
                graph.element_landmark(eidx),
                format!("`{}' previously declared here", cname),
            );
            eidx_map.push(None);
        } else {
            if classes.lookup(&cname).is_some() {
                ectx.error(
                    graph.element_landmark(which),
                    ErrorCode::NetElementClassClash,
                    format!("`{}' is an element class", cname),
                );
            }
            let eidx = graph.get_element(
                cname,
                compound.elements[i],
                ve.interpolate(&compound.element_configurations[i]),
                compound.element_landmarks[i].clone(),
            );
            eidx_map.push(Some(eidx));
        }
    }

    // replay the captured connections through the index map
    for i in 0..compound.hookup_from.len() {
        let hf = compound.hookup_from[i];
        let ht = compound.hookup_to[i];
        if let (Some(from), Some(to)) = (eidx_map[hf.element], eidx_map[ht.element]) {
            graph.connect_ports(PortRef::new(from, hf.port), PortRef::new(to, ht.port));
        }
    }
}
