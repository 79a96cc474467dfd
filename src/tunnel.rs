//! Port tunnels.
//!
//! A tunnel is a pair of linked pseudo-elements that forwards
//! connections across a boundary, most prominently the `input` /
//! `output` stubs of an expanded compound element. Tunnel endpoints
//! live in an arena and are resolved transitively during expansion
//! into direct leaf connections.

use crate::classes::TUNNEL_TYPE;
use crate::error::{ErrorCode, ErrorContext};
use crate::graph::{Graph, PortRef};
use crate::Landmark;

type EndId = usize;

///
/// The memoization state of one endpoint. `InProgress` breaks cycles:
/// a tunnel loop contributes no leaves instead of recursing forever.
///
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExpandState {
    Unvisited,
    InProgress,
    Done,
}

#[derive(Debug)]
struct TunnelEnd {
    port: PortRef,
    output: bool,
    other: EndId,
    next: Option<EndId>,

    correspond: Vec<PortRef>,
    state: ExpandState,
}

///
/// The registry of all tunnel endpoints: two linked lists through the
/// arena, one of input ends and one of output ends.
///
#[derive(Debug, Default)]
pub struct TunnelRegistry {
    ends: Vec<TunnelEnd>,
    inputs: Option<EndId>,
    outputs: Option<EndId>,
}

impl TunnelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.ends.clear();
        self.inputs = None;
        self.outputs = None;
    }

    ///
    /// Registers a fresh endpoint pair.
    ///
    fn add_pair(&mut self, hin: PortRef, hout: PortRef) {
        let in_id = self.ends.len();
        let out_id = in_id + 1;
        self.ends.push(TunnelEnd {
            port: hin,
            output: false,
            other: out_id,
            next: self.inputs,
            correspond: Vec::new(),
            state: ExpandState::Unvisited,
        });
        self.ends.push(TunnelEnd {
            port: hout,
            output: true,
            other: in_id,
            next: self.outputs,
            correspond: Vec::new(),
            state: ExpandState::Unvisited,
        });
        self.inputs = Some(in_id);
        self.outputs = Some(out_id);
    }

    ///
    /// Finds the endpoint for an exact port reference on one side.
    ///
    /// When only the element matches, a child endpoint for the
    /// requested port number is materialized lazily (together with its
    /// twin on the paired element) and grafted in behind the parent.
    /// This is what lets a declared tunnel carry every port number
    /// used through it.
    ///
    fn find(&mut self, head: Option<EndId>, h: PortRef, output: bool) -> Option<EndId> {
        let mut walk = head;
        let mut parent: Option<EndId> = None;
        while let Some(id) = walk {
            if self.ends[id].port == h {
                return Some(id);
            }
            if self.ends[id].port.element == h.element {
                parent = Some(id);
            }
            walk = self.ends[id].next;
        }

        let parent = parent?;
        let parent_other = self.ends[parent].other;
        let other = PortRef::new(self.ends[parent_other].port.element, h.port);
        let parent_next = self.ends[parent].next;
        let parent_other_next = self.ends[parent_other].next;

        let new_me = self.ends.len();
        let new_other = new_me + 1;
        self.ends.push(TunnelEnd {
            port: h,
            output,
            other: new_other,
            next: parent_next,
            correspond: Vec::new(),
            state: ExpandState::Unvisited,
        });
        self.ends.push(TunnelEnd {
            port: other,
            output: !output,
            other: new_me,
            next: parent_other_next,
            correspond: Vec::new(),
            state: ExpandState::Unvisited,
        });
        self.ends[parent].next = Some(new_me);
        self.ends[parent_other].next = Some(new_other);
        Some(new_me)
    }

    fn find_input(&mut self, h: PortRef) -> Option<EndId> {
        self.find(self.inputs, h, false)
    }

    fn find_output(&mut self, h: PortRef) -> Option<EndId> {
        self.find(self.outputs, h, true)
    }

    ///
    /// Resolves one connection end to the leaf (non-tunnel) ports it
    /// ultimately stands for, appending them to `into`.
    ///
    pub(crate) fn expand_connection(
        &mut self,
        this_end: PortRef,
        is_out: bool,
        into: &mut Vec<PortRef>,
        graph: &Graph,
        ectx: &mut ErrorContext,
    ) {
        if graph.elements[this_end.element] != TUNNEL_TYPE {
            into.push(this_end);
            return;
        }

        let end = if is_out {
            self.find_output(this_end)
        } else {
            self.find_input(this_end)
        };
        if let Some(id) = end {
            self.expand_end(id, graph, ectx, into);
            return;
        }

        // a tunnel element without an endpoint on this side was used
        // against its direction
        let opposite = if is_out {
            self.find_input(this_end)
        } else {
            self.find_output(this_end)
        };
        if opposite.is_some() {
            ectx.error(
                graph.element_landmark(this_end.element),
                ErrorCode::ExpTunnelDirection,
                format!(
                    "`{}' used as {}",
                    graph.element_name(this_end.element),
                    if is_out { "output" } else { "input" }
                ),
            );
        }
    }

    ///
    /// Expands one endpoint: walks every connection of the paired
    /// endpoint's element and resolves each far end transitively. The
    /// result is memoized; endpoints currently in progress contribute
    /// nothing, which terminates tunnel cycles.
    ///
    fn expand_end(&mut self, id: EndId, graph: &Graph, ectx: &mut ErrorContext, into: &mut Vec<PortRef>) {
        match self.ends[id].state {
            ExpandState::InProgress => return,
            ExpandState::Done => {}
            ExpandState::Unvisited => {
                self.ends[id].state = ExpandState::InProgress;

                let output = self.ends[id].output;
                let this_port = self.ends[id].port;
                let other_port = self.ends[self.ends[id].other].port;

                let mut connections = Vec::new();
                graph.find_connections(other_port, !output, &mut connections);

                if connections.is_empty() {
                    self.report_unused(id, this_port, other_port, output, graph, ectx);
                }

                let mut correspond = Vec::new();
                for connection in connections {
                    self.expand_connection(connection, output, &mut correspond, graph, ectx);
                }
                self.ends[id].correspond = correspond;
                self.ends[id].state = ExpandState::Done;
            }
        }

        let correspond = self.ends[id].correspond.clone();
        into.extend(correspond);
    }

    ///
    /// Precise diagnostics for endpoints that resolve to nothing,
    /// tailored to whether the pair stems from a compound's `input` /
    /// `output` stub or from a user-declared tunnel.
    ///
    fn report_unused(
        &self,
        _id: EndId,
        this_port: PortRef,
        other_port: PortRef,
        output: bool,
        graph: &Graph,
        ectx: &mut ErrorContext,
    ) {
        let (inh, outh) = if output {
            (other_port, this_port)
        } else {
            (this_port, other_port)
        };
        let in_name = graph.element_name(inh.element);
        let out_name = graph.element_name(outh.element);

        if format!("{}/input", in_name) == out_name {
            let (code, msg) = if output {
                (
                    ErrorCode::ExpUnusedCompoundPort,
                    format!("`{}' input {} unused", in_name, inh.port),
                )
            } else {
                (
                    ErrorCode::ExpNonexistentCompoundPort,
                    format!("`{}' has no input {}", in_name, inh.port),
                )
            };
            ectx.error(graph.element_landmark(inh.element), code, msg);
        } else if in_name == format!("{}/output", out_name) {
            let (code, msg) = if output {
                (
                    ErrorCode::ExpNonexistentCompoundPort,
                    format!("`{}' has no output {}", out_name, outh.port),
                )
            } else {
                (
                    ErrorCode::ExpUnusedCompoundPort,
                    format!("`{}' output {} unused", out_name, outh.port),
                )
            };
            ectx.error(graph.element_landmark(outh.element), code, msg);
        } else {
            ectx.error(
                graph.element_landmark(other_port.element),
                ErrorCode::ExpTunnelUnused,
                format!(
                    "tunnel `{} -> {}' {} {} unused",
                    in_name,
                    out_name,
                    if output { "input" } else { "output" },
                    this_port.port
                ),
            );
        }
    }
}

///
/// Declares a tunnel pair between two named elements, creating the
/// tunnel-typed elements as needed. Reports redeclarations of either
/// name as a non-tunnel element and of either endpoint.
///
pub(crate) fn add_tunnel(
    graph: &mut Graph,
    tunnels: &mut TunnelRegistry,
    ectx: &mut ErrorContext,
    landmark: Landmark,
    name_in: String,
    name_out: String,
) {
    let hin = PortRef::new(
        graph.get_element(name_in.clone(), TUNNEL_TYPE, String::new(), landmark.clone()),
        0,
    );
    let hout = PortRef::new(
        graph.get_element(name_out.clone(), TUNNEL_TYPE, String::new(), landmark.clone()),
        0,
    );

    let mut ok = true;
    if graph.elements[hin.element] != TUNNEL_TYPE {
        ectx.error(
            landmark.clone(),
            ErrorCode::NetRedeclaredElement,
            format!("redeclaration of element `{}'", name_in),
        );
        ectx.message(
            graph.element_landmark(hin.element),
            format!("`{}' previously declared here", name_in),
        );
        ok = false;
    }
    if graph.elements[hout.element] != TUNNEL_TYPE {
        ectx.error(
            landmark.clone(),
            ErrorCode::NetRedeclaredElement,
            format!("redeclaration of element `{}'", name_out),
        );
        ectx.message(
            graph.element_landmark(hout.element),
            format!("`{}' previously declared here", name_out),
        );
        ok = false;
    }
    if tunnels.find_input(hin).is_some() {
        ectx.error(
            landmark.clone(),
            ErrorCode::NetRedeclaredTunnel,
            format!("redeclaration of connection tunnel input `{}'", name_in),
        );
        ok = false;
    }
    if tunnels.find_output(hout).is_some() {
        ectx.error(
            landmark,
            ErrorCode::NetRedeclaredTunnel,
            format!("redeclaration of connection tunnel output `{}'", name_out),
        );
        ok = false;
    }

    if ok {
        tunnels.add_pair(hin, hout);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classes::ERROR_TYPE;

    fn setup() -> (Graph, TunnelRegistry, ErrorContext) {
        (Graph::new(), TunnelRegistry::new(), ErrorContext::new())
    }

    fn leaf(graph: &mut Graph, name: &str) -> usize {
        graph.get_element(name.into(), ERROR_TYPE, String::new(), Landmark::unknown())
    }

    #[test]
    fn simple_tunnel_resolves_to_leaves() {
        let (mut graph, mut tunnels, mut ectx) = setup();
        add_tunnel(
            &mut graph,
            &mut tunnels,
            &mut ectx,
            Landmark::unknown(),
            "t_in".into(),
            "t_out".into(),
        );
        let src = leaf(&mut graph, "src");
        let dst = leaf(&mut graph, "dst");
        let t_in = graph.element_map["t_in"];
        let t_out = graph.element_map["t_out"];
        graph.connect(src, None, t_in, None);
        graph.connect(t_out, None, dst, None);

        let mut into = Vec::new();
        tunnels.expand_connection(PortRef::new(t_in, 0), false, &mut into, &graph, &mut ectx);
        assert_eq!(into, vec![PortRef::new(dst, 0)]);
        assert!(!ectx.has_errors());
    }

    #[test]
    fn per_port_child_endpoints_materialize() {
        let (mut graph, mut tunnels, mut ectx) = setup();
        add_tunnel(
            &mut graph,
            &mut tunnels,
            &mut ectx,
            Landmark::unknown(),
            "t_in".into(),
            "t_out".into(),
        );
        let src = leaf(&mut graph, "src");
        let dst = leaf(&mut graph, "dst");
        let t_in = graph.element_map["t_in"];
        let t_out = graph.element_map["t_out"];
        // port 5 has no declared endpoint, it springs into existence
        graph.connect(src, Some(1), t_in, Some(5));
        graph.connect(t_out, Some(5), dst, Some(2));

        let mut into = Vec::new();
        tunnels.expand_connection(PortRef::new(t_in, 5), false, &mut into, &graph, &mut ectx);
        assert_eq!(into, vec![PortRef::new(dst, 2)]);
    }

    #[test]
    fn cyclic_tunnels_terminate() {
        let (mut graph, mut tunnels, mut ectx) = setup();
        add_tunnel(
            &mut graph,
            &mut tunnels,
            &mut ectx,
            Landmark::unknown(),
            "a_in".into(),
            "a_out".into(),
        );
        add_tunnel(
            &mut graph,
            &mut tunnels,
            &mut ectx,
            Landmark::unknown(),
            "b_in".into(),
            "b_out".into(),
        );
        let a_in = graph.element_map["a_in"];
        let a_out = graph.element_map["a_out"];
        let b_in = graph.element_map["b_in"];
        let b_out = graph.element_map["b_out"];
        // a feeds b and b feeds a, no leaves anywhere
        graph.connect(a_out, None, b_in, None);
        graph.connect(b_out, None, a_in, None);

        let mut into = Vec::new();
        tunnels.expand_connection(PortRef::new(a_in, 0), false, &mut into, &graph, &mut ectx);
        assert!(into.is_empty());
    }

    #[test]
    fn wrong_direction_reported() {
        let (mut graph, mut tunnels, mut ectx) = setup();
        add_tunnel(
            &mut graph,
            &mut tunnels,
            &mut ectx,
            Landmark::unknown(),
            "t_in".into(),
            "t_out".into(),
        );
        let t_in = graph.element_map["t_in"];

        // t_in only has an input endpoint; using it as a connection
        // source is a directional misuse
        let mut into = Vec::new();
        tunnels.expand_connection(PortRef::new(t_in, 0), true, &mut into, &graph, &mut ectx);
        assert!(into.is_empty());
        assert_eq!(ectx.n_errors(), 1);
        assert!(ectx.errors()[0].msg.contains("used as output"));
    }

    #[test]
    fn duplicate_tunnel_reported() {
        let (mut graph, mut tunnels, mut ectx) = setup();
        add_tunnel(
            &mut graph,
            &mut tunnels,
            &mut ectx,
            Landmark::unknown(),
            "t_in".into(),
            "t_out".into(),
        );
        add_tunnel(
            &mut graph,
            &mut tunnels,
            &mut ectx,
            Landmark::unknown(),
            "t_in".into(),
            "t_out".into(),
        );
        assert_eq!(ectx.n_errors(), 2);
    }
}
