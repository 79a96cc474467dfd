use fcl::{ElementClass, ErrorContext, Parser, ParserExtra};

fn host_parser() -> Parser {
    let mut parser = Parser::new();
    parser.add_element_type("Source", ElementClass::builtin("Source"));
    parser.add_element_type("Queue", ElementClass::builtin("Queue"));
    parser.add_element_type("Sink", ElementClass::builtin("Sink"));
    parser
}

#[test]
fn clean_parse_has_no_errors() {
    let mut parser = host_parser();
    let cookie = parser.begin_parse(
        "src :: Source;\n\
         q :: Queue(200);\n\
         snk :: Sink;\n\
         src -> q -> snk;\n",
        "wiring.fcl",
        None,
    );
    parser.parse();
    assert!(!parser.errors().has_errors());
    let router = parser.create_router();
    parser.end_parse(cookie);

    assert_eq!(router.elements.len(), 3);
    assert_eq!(router.connections.len(), 2);
    assert_eq!(router.elements[1].configuration, "200");
}

#[test]
fn errors_carry_landmarks() {
    let mut parser = host_parser();
    let cookie = parser.begin_parse("src :: Source;\n\nsrc -> nowhere;\n", "wiring.fcl", None);
    parser.parse();

    assert_eq!(parser.errors().n_errors(), 1);
    let error = &parser.errors().errors()[0];
    assert!(error.msg.contains("undeclared element `nowhere'"));
    assert_eq!(error.landmark.file, "wiring.fcl");
    assert_eq!(error.landmark.line, 3);
    parser.end_parse(cookie);
}

#[test]
fn line_directives_relocate_diagnostics() {
    let mut parser = host_parser();
    let cookie = parser.begin_parse(
        "# 40 \"generated.fcl\"\nsrc -> nowhere;\n",
        "wiring.fcl",
        None,
    );
    parser.parse();

    let error = &parser.errors().errors()[0];
    assert_eq!(error.landmark.file, "generated.fcl");
    assert_eq!(error.landmark.line, 40);
    parser.end_parse(cookie);
}

#[test]
fn class_table_restored_exactly() {
    let mut parser = host_parser();
    let ids_before: Vec<_> = ["Source", "Queue", "Sink", "Error"]
        .iter()
        .map(|name| parser.element_type(name))
        .collect();
    let mut names_before = parser.element_type_names();
    names_before.sort();

    let cookie = parser.begin_parse(
        "elementclass Queue { input -> output }\n\
         elementclass Gadget Source;\n\
         x :: Queue; y :: Gadget;\n",
        "scoped.fcl",
        None,
    );
    parser.parse();
    assert_ne!(parser.element_type("Queue"), ids_before[1]);
    parser.end_parse(cookie);

    let ids_after: Vec<_> = ["Source", "Queue", "Sink", "Error"]
        .iter()
        .map(|name| parser.element_type(name))
        .collect();
    let mut names_after = parser.element_type_names();
    names_after.sort();

    assert_eq!(ids_before, ids_after);
    assert_eq!(names_before, names_after);
    assert_eq!(parser.element_type("Gadget"), None);
}

#[test]
fn parser_survives_garbage() {
    let mut parser = host_parser();
    let cookie = parser.begin_parse(
        "-> q; ] [ :: ; elementclass ; connectiontunnel ->;\n$x % &\n",
        "garbage.fcl",
        None,
    );
    parser.parse();
    assert!(parser.errors().has_errors());
    // the pass still finishes and produces a (mostly empty) router
    let _ = parser.create_router();
    parser.end_parse(cookie);
}

struct RecordingHost {
    words: std::rc::Rc<std::cell::RefCell<Vec<String>>>,
}

impl ParserExtra for RecordingHost {
    fn require(&mut self, word: &str, _ectx: &mut ErrorContext) {
        self.words.borrow_mut().push(word.to_string());
    }
}

#[test]
fn requirements_reach_host_and_router() {
    let words = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
    let mut parser = host_parser();
    let cookie = parser.begin_parse(
        "require(linuxmodule);\nsrc :: Source;\nrequire(umultipath, experimental);\n",
        "req.fcl",
        Some(Box::new(RecordingHost { words: words.clone() })),
    );
    parser.parse();
    let router = parser.create_router();
    parser.end_parse(cookie);

    assert_eq!(
        *words.borrow(),
        vec!["linuxmodule", "umultipath", "experimental"]
    );
    assert_eq!(
        router.requirements,
        vec!["linuxmodule", "umultipath", "experimental"]
    );
}

#[test]
fn reuse_across_inputs() {
    let mut parser = host_parser();
    for _ in 0..3 {
        let cookie = parser.begin_parse("a :: Source; b :: Sink; a -> b;", "multi.fcl", None);
        parser.parse();
        let router = parser.create_router();
        assert_eq!(router.elements.len(), 2);
        parser.end_parse(cookie);
    }
    assert!(!parser.errors().has_errors());
}
