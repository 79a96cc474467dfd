use fcl::{ElementClass, GraphRouter, Parser};

fn host_parser() -> Parser {
    let mut parser = Parser::new();
    parser.add_element_type("Source", ElementClass::builtin("Source"));
    parser.add_element_type("Queue", ElementClass::builtin("Queue"));
    parser.add_element_type("Counter", ElementClass::builtin("Counter"));
    parser.add_element_type("Sink", ElementClass::builtin("Sink"));
    parser
}

fn expand(text: &str) -> (GraphRouter, usize) {
    let mut parser = host_parser();
    let cookie = parser.begin_parse(text, "expand.fcl", None);
    parser.parse();
    let router = parser.create_router();
    let n_errors = parser.errors().n_errors();
    parser.end_parse(cookie);
    (router, n_errors)
}

fn expand_clean(text: &str) -> GraphRouter {
    let (router, n_errors) = expand(text);
    assert_eq!(n_errors, 0, "expected a clean expansion");
    router
}

fn names(router: &GraphRouter) -> Vec<&str> {
    router.elements.iter().map(|e| e.name.as_str()).collect()
}

#[test]
fn plain_declarations_and_connection() {
    let router = expand_clean("a :: Source; b :: Sink; a -> b;");
    assert_eq!(names(&router), vec!["a", "b"]);
    assert_eq!(router.elements[0].class, "Source");
    assert_eq!(router.elements[1].class, "Sink");
    assert_eq!(router.connections.len(), 1);
    let c = router.connections[0];
    assert_eq!((c.from, c.from_port, c.to, c.to_port), (0, 0, 1, 0));
}

#[test]
fn anonymous_chain() {
    let router = expand_clean("Source -> Queue -> Sink;");
    assert_eq!(names(&router), vec!["Source@1", "Queue@2", "Sink@3"]);
    assert_eq!(router.connections.len(), 2);
    assert!(router.connected("Source@1", "Queue@2"));
    assert!(router.connected("Queue@2", "Sink@3"));
}

#[test]
fn identity_compound_coalesces() {
    let router = expand_clean(
        "elementclass Id { input -> output }\n\
         x :: Id;\n\
         src :: Source; dst :: Sink;\n\
         src -> x -> dst;\n",
    );
    // the compound dissolves entirely, only the tunnel-threaded leaf
    // connection remains
    assert_eq!(names(&router), vec!["src", "dst"]);
    assert_eq!(router.connections.len(), 1);
    assert!(router.connected("src", "dst"));
}

#[test]
fn parameterized_compound() {
    let router = expand_clean(
        "elementclass C { $a | input -> Queue($a) -> output }\n\
         y :: C(42);\n\
         src :: Source; dst :: Sink;\n\
         src -> y -> dst;\n",
    );
    assert_eq!(names(&router), vec!["y/Queue@1", "src", "dst"]);
    let q = router.element("y/Queue@1").unwrap();
    assert_eq!(router.elements[q].configuration, "42");
    assert_eq!(router.connections.len(), 2);
    assert!(router.connected("src", "y/Queue@1"));
    assert!(router.connected("y/Queue@1", "dst"));
}

#[test]
fn overload_selection_by_used_ports() {
    let text = "elementclass C {\n\
                  input -> Queue -> output\n\
                ||\n\
                  input [0] -> Queue -> output;\n\
                  input [1] -> Counter -> output;\n\
                }\n\
                x :: C;\n\
                a :: Source; b :: Source; dst :: Sink;\n";

    // two incoming connections select the two-input overload
    let router = expand_clean(&format!("{} a -> x; b -> [1] x; x -> dst;", text));
    assert!(router.element("x/Counter@2").is_some());

    // one incoming connection selects the one-input overload
    let router = expand_clean(&format!("{} a -> x; x -> dst;", text));
    assert!(router.element("x/Queue@1").is_some());
    assert!(router.element("x/Counter@2").is_none());
}

#[test]
fn connection_tunnels_thread_through() {
    let router = expand_clean(
        "connectiontunnel t_in -> t_out;\n\
         src :: Source; dst :: Sink;\n\
         src -> t_in;\n\
         t_out -> dst;\n",
    );
    assert_eq!(names(&router), vec!["src", "dst"]);
    assert_eq!(router.connections.len(), 1);
    assert!(router.connected("src", "dst"));
}

#[test]
fn nested_compounds_substitute_variables() {
    let router = expand_clean(
        "elementclass A { $v | input -> Queue($v) -> output }\n\
         elementclass B { $v | input -> A($v) -> output }\n\
         y :: B(7);\n\
         src :: Source; dst :: Sink;\n\
         src -> y -> dst;\n",
    );
    let q = router
        .element("y/A@1/Queue@1")
        .expect("inner compound expanded under a nested prefix");
    assert_eq!(router.elements[q].configuration, "7");
    assert!(router.connected("src", "y/A@1/Queue@1"));
    assert!(router.connected("y/A@1/Queue@1", "dst"));
}

#[test]
fn synonym_of_compound_expands() {
    let router = expand_clean(
        "elementclass Id { input -> output }\n\
         elementclass Alias Id;\n\
         x :: Alias;\n\
         src :: Source; dst :: Sink;\n\
         src -> x -> dst;\n",
    );
    assert_eq!(names(&router), vec!["src", "dst"]);
    assert!(router.connected("src", "dst"));
}

#[test]
fn no_matching_overload_reports_and_degrades() {
    let (router, n_errors) = expand(
        "elementclass C { input -> output }\n\
         x :: C(1);\n\
         src :: Source; dst :: Sink;\n\
         src -> x -> dst;\n",
    );
    assert_eq!(n_errors, 1);
    let x = router.element("x").unwrap();
    assert_eq!(router.elements[x].class, "Error");
    // the connections still reach the placeholder
    assert!(router.connected("src", "x"));
    assert!(router.connected("x", "dst"));
}

#[test]
fn unused_compound_output_reported() {
    let (_router, n_errors) = expand(
        "elementclass Id { input -> output }\n\
         x :: Id;\n\
         src :: Source;\n\
         src -> x;\n",
    );
    assert_eq!(n_errors, 1);
}

#[test]
fn no_tunnels_reach_the_router() {
    let router = expand_clean(
        "elementclass Id { input -> output }\n\
         connectiontunnel t_in -> t_out;\n\
         x :: Id;\n\
         src :: Source; dst :: Sink;\n\
         src -> x -> t_in; t_out -> dst;\n",
    );
    for element in &router.elements {
        assert_ne!(element.class, "<tunnel>");
    }
    assert!(router.connected("src", "dst"));
}

#[test]
fn multiport_fanout_through_compound() {
    let router = expand_clean(
        "elementclass T { input -> output; input -> Queue -> output; }\n\
         x :: T;\n\
         src :: Source; dst :: Sink;\n\
         src -> x -> dst;\n",
    );
    // both captured paths survive: a direct connection and the queued one
    assert!(router.connected("src", "dst"));
    assert!(router.connected("src", "x/Queue@1"));
    assert!(router.connected("x/Queue@1", "dst"));
}

#[test]
fn roundtrip_canonical_config() {
    let original = expand_clean(
        "elementclass C { $a | input -> Queue($a) -> output }\n\
         y :: C(64);\n\
         src :: Source; dst :: Sink;\n\
         require(fast);\n\
         src -> y -> dst;\n",
    );

    let serialized = original.to_string();
    let reparsed = expand_clean(&serialized);

    let shape = |r: &GraphRouter| -> (Vec<(String, String, String)>, Vec<(usize, usize, usize, usize)>, Vec<String>) {
        (
            r.elements
                .iter()
                .map(|e| (e.name.clone(), e.class.clone(), e.configuration.clone()))
                .collect(),
            r.connections
                .iter()
                .map(|c| (c.from, c.from_port, c.to, c.to_port))
                .collect(),
            r.requirements.clone(),
        )
    };
    assert_eq!(shape(&original), shape(&reparsed));
}
