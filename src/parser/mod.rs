//! The recursive-descent parser.
//!
//! One [Parser] instance owns the scanner, the class table, the
//! provisional graph and the tunnel registry. `begin_parse` installs an
//! input blob and opens a class scope, `parse_statement` consumes one
//! statement at a time, and `create_router` (see the expansion pass)
//! resolves the provisional graph into a router. `end_parse` tears all
//! per-input state down and rolls the class table back.
//!
//! Parsing never aborts: every error site installs a placeholder and
//! continues, so one run surfaces as many errors as possible.

use crate::classes::{ClassId, ClassTable, ElementClass, ScopeCookie, ERROR_TYPE, TUNNEL_TYPE};
use crate::compound::{Compound, Overload};
use crate::config;
use crate::error::*;
use crate::graph::Graph;
use crate::lexer::{Lexeme, LexemeKind, Lexer};
use crate::tunnel::{add_tunnel, TunnelRegistry};
use crate::Landmark;

use std::mem;


///
/// Host hooks invoked while parsing.
///
pub trait ParserExtra {
    ///
    /// Called once per well-formed `require()` word, at parse time.
    ///
    fn require(&mut self, word: &str, ectx: &mut ErrorContext);
}

///
/// The parser over one configuration input.
///
pub struct Parser {
    pub(crate) lexer: Lexer,
    pub(crate) classes: ClassTable,
    pub(crate) graph: Graph,
    pub(crate) tunnels: TunnelRegistry,
    pub(crate) ectx: ErrorContext,

    compound_depth: usize,
    extra: Option<Box<dyn ParserExtra>>,
}

impl Parser {
    ///
    /// Creates a parser with the built-in classes `<tunnel>` and
    /// `Error` installed.
    ///
    pub fn new() -> Self {
        Self {
            lexer: Lexer::new(),
            classes: ClassTable::new(),
            graph: Graph::new(),
            tunnels: TunnelRegistry::new(),
            ectx: ErrorContext::new(),
            compound_depth: 0,
            extra: None,
        }
    }

    // === Class registration ===

    ///
    /// Registers a class under the given name and returns its id. Any
    /// prior binding of the name is shadowed until the current scope
    /// closes.
    ///
    pub fn add_element_type(&mut self, name: impl Into<String>, class: ElementClass) -> ClassId {
        self.classes.add(name, class)
    }

    /// Looks up the currently visible class of the given name.
    pub fn element_type(&self, name: &str) -> Option<ClassId> {
        self.classes.lookup(name)
    }

    ///
    /// Like [element_type](Self::element_type), but a miss reports an
    /// error and installs a placeholder class under the name so later
    /// lookups find something.
    ///
    pub fn force_element_type(&mut self, name: &str) -> ClassId {
        if let Some(id) = self.classes.lookup(name) {
            return id;
        }
        self.ectx.error(
            self.lexer.landmark(),
            NetUnknownElementClass,
            format!("unknown element class `{}'", name),
        );
        self.classes.add(name, ElementClass::error_placeholder())
    }

    /// Enumerates the visible class names, excluding `<tunnel>`.
    pub fn element_type_names(&self) -> Vec<String> {
        self.classes.type_names()
    }

    // === Parse lifecycle ===

    ///
    /// Installs an input blob and opens a class scope. The returned
    /// cookie MUST be passed to [end_parse](Self::end_parse) on every
    /// exit path.
    ///
    pub fn begin_parse(
        &mut self,
        text: impl Into<String>,
        filename: &str,
        extra: Option<Box<dyn ParserExtra>>,
    ) -> ScopeCookie {
        self.lexer.begin(text.into(), filename);
        self.extra = extra;
        self.classes.scope_in()
    }

    ///
    /// Releases all per-input state and restores the class table to
    /// the cookie's snapshot.
    ///
    pub fn end_parse(&mut self, cookie: ScopeCookie) {
        self.classes.scope_out(cookie);
        self.tunnels.clear();
        self.graph.clear();
        self.lexer.end();
        self.compound_depth = 0;
        self.extra = None;
    }

    /// The errors collected so far.
    pub fn errors(&self) -> &ErrorContext {
        &self.ectx
    }

    pub fn errors_mut(&mut self) -> &mut ErrorContext {
        &mut self.ectx
    }

    ///
    /// Parses statements until end of input.
    ///
    pub fn parse(&mut self) {
        while self.parse_statement(false) {}
    }

    // === Shorthands ===

    fn lex(&mut self) -> Lexeme {
        self.lexer.lex(&mut self.ectx)
    }

    fn unlex(&mut self, t: Lexeme) {
        self.lexer.unlex(t);
    }

    fn expect(&mut self, kind: LexemeKind) -> bool {
        self.lexer.expect(kind, true, &mut self.ectx)
    }

    fn lerror(&mut self, code: ErrorCode, msg: String) {
        self.ectx.error(self.lexer.landmark(), code, msg);
    }

    fn get_element(
        &mut self,
        name: String,
        class: ClassId,
        configuration: String,
        landmark: Option<Landmark>,
    ) -> usize {
        let landmark = landmark.unwrap_or_else(|| self.lexer.landmark());
        self.graph.get_element(name, class, configuration, landmark)
    }

    /// Generates an unused `@Class@N` style class name.
    fn anon_class_name(&self, prefix: &str) -> String {
        let mut anonymizer = self.graph.len() - self.graph.anonymous_offset + 1;
        let mut name = format!("{}{}", prefix, anonymizer);
        while self.classes.lookup(&name).is_some() {
            anonymizer += 1;
            name = format!("{}{}", prefix, anonymizer);
        }
        name
    }

    // === Statements ===

    ///
    /// Parses one statement. Returns `false` at the close of a nested
    /// block or at end of input.
    ///
    pub fn parse_statement(&mut self, nested: bool) -> bool {
        self.ectx.reset_transient();
        let t = self.lex();
        match t.kind {
            LexemeKind::Ident | LexemeKind::Char('[') | LexemeKind::Char('{') => {
                self.unlex(t);
                self.parse_connection();
                true
            }
            LexemeKind::Elementclass => {
                self.parse_element_class();
                true
            }
            LexemeKind::Tunnel => {
                self.parse_tunnel();
                true
            }
            LexemeKind::Require => {
                self.parse_require();
                true
            }
            LexemeKind::Char(';') => true,
            LexemeKind::Char('}') | LexemeKind::BarBar if nested => {
                self.unlex(t);
                false
            }
            LexemeKind::Eof => {
                if nested {
                    self.lerror(ParExpectedToken, "expected `}'".to_string());
                }
                false
            }
            _ => {
                self.lerror(ParSyntaxError, format!("syntax error near `{}'", t.text));
                true
            }
        }
    }

    ///
    /// `[port] element { '->' [port] element }*`
    ///
    /// Returns `false` only if the chain is empty.
    ///
    fn parse_connection(&mut self) -> bool {
        let mut element1: Option<usize> = None;
        let mut port1: Option<usize> = None;

        loop {
            // get element
            let port2 = self.parse_port();
            let element2 = match self.parse_element(element1.is_none()) {
                Some(element) => element,
                None => {
                    if port1.is_some() {
                        self.lerror(
                            ParStrayOutputPort,
                            "output port useless at end of chain".to_string(),
                        );
                    }
                    return element1.is_some();
                }
            };

            if let Some(element1) = element1 {
                self.graph.connect(element1, port1, element2, port2);
            } else if port2.is_some() {
                self.lerror(
                    ParStrayInputPort,
                    "input port useless at start of chain".to_string(),
                );
            }

            port1 = None;

            loop {
                let t = self.lex();
                match t.kind {
                    LexemeKind::Char(',') | LexemeKind::ColonColon => {
                        self.lerror(ParSyntaxError, format!("syntax error before `{}'", t.text));
                        continue;
                    }

                    LexemeKind::Arrow => break,

                    LexemeKind::Char('[') => {
                        self.unlex(t);
                        port1 = self.parse_port();
                        continue;
                    }

                    LexemeKind::Ident
                    | LexemeKind::Char('{')
                    | LexemeKind::Char('}')
                    | LexemeKind::BarBar
                    | LexemeKind::Tunnel
                    | LexemeKind::Elementclass
                    | LexemeKind::Require => {
                        self.unlex(t);
                        if port1.is_some() {
                            self.lerror(
                                ParStrayOutputPort,
                                "output port useless at end of chain".to_string(),
                            );
                        }
                        return true;
                    }

                    LexemeKind::Char(';') | LexemeKind::Eof => {
                        if port1.is_some() {
                            self.lerror(
                                ParStrayOutputPort,
                                "output port useless at end of chain".to_string(),
                            );
                        }
                        return true;
                    }

                    _ => {
                        self.lerror(ParSyntaxError, format!("syntax error near `{}'", t.text));
                        // save meaningful lexemes
                        if !matches!(t.kind, LexemeKind::Char(_)) {
                            self.unlex(t);
                        }
                        return true;
                    }
                }
            }

            // have `x ->`
            element1 = Some(element2);
        }
    }

    ///
    /// `'[' integer ']'`, or `None` if no port syntax was consumed.
    ///
    fn parse_port(&mut self) -> Option<usize> {
        let tlbrack = self.lex();
        if !tlbrack.is(LexemeKind::Char('[')) {
            self.unlex(tlbrack);
            return None;
        }

        let tword = self.lex();
        if tword.is(LexemeKind::Ident) {
            let port = match config::parse_integer(&tword.text) {
                Some(port) if port >= 0 => port as usize,
                _ => {
                    self.lerror(
                        ParExpectedPortNumber,
                        "syntax error: port number should be integer".to_string(),
                    );
                    0
                }
            };
            self.expect(LexemeKind::Char(']'));
            Some(port)
        } else if tword.is(LexemeKind::Char(']')) {
            self.lerror(
                ParExpectedPortNumber,
                "syntax error: expected port number".to_string(),
            );
            Some(0)
        } else {
            self.lerror(
                ParExpectedPortNumber,
                "syntax error: expected port number".to_string(),
            );
            self.unlex(tword);
            None
        }
    }

    ///
    /// One element position in a connection chain: a class reference
    /// (producing an anonymous element), an inline compound, or the
    /// name of a declared element. A name followed by `::` or `,`
    /// re-enters declaration parsing.
    ///
    fn parse_element(&mut self, comma_ok: bool) -> Option<usize> {
        let t = self.lex();
        let name;
        let mut etype;

        match t.kind {
            LexemeKind::Ident => {
                name = t.text;
                etype = self.classes.lookup(&name);
            }
            LexemeKind::Char('{') => {
                let id = self.parse_compound(None);
                name = self.classes.class_name(id).to_string();
                etype = Some(id);
            }
            _ => {
                self.unlex(t);
                return None;
            }
        }

        let mut configuration = String::new();
        let mut landmark = None;
        let tparen = self.lex();
        if tparen.is(LexemeKind::Char('(')) {
            // report the landmark from before the configuration string
            landmark = Some(self.lexer.landmark());
            if etype.is_none() {
                etype = Some(self.force_element_type(&name));
            }
            configuration = self.lexer.lex_config();
            self.expect(LexemeKind::Char(')'));
        } else {
            self.unlex(tparen);
        }

        if let Some(etype) = etype {
            let anon = self.graph.anon_element_name(&name);
            Some(self.get_element(anon, etype, configuration, landmark))
        } else {
            match self.graph.element_map.get(&name) {
                Some(&element) => Some(element),
                None => {
                    let t2colon = self.lex();
                    let is_declaration =
                        t2colon.is(LexemeKind::ColonColon) || (t2colon.is(LexemeKind::Char(',')) && comma_ok);
                    self.unlex(t2colon);
                    if is_declaration {
                        self.parse_declaration(Some(name.clone()));
                    } else {
                        self.lerror(
                            NetUndeclaredElement,
                            format!("undeclared element `{}' (first use this block)", name),
                        );
                    }
                    match self.graph.element_map.get(&name) {
                        Some(&element) => Some(element),
                        // the declaration failed outright, keep the
                        // graph indices valid with a placeholder
                        None => Some(self.get_element(name, ERROR_TYPE, String::new(), None)),
                    }
                }
            }
        }
    }

    ///
    /// `ident { ',' ident }* '::' class ['(' config ')']`
    ///
    /// `first_element` is set when the leading name was already
    /// consumed by [parse_element](Self::parse_element).
    ///
    fn parse_declaration(&mut self, first_element: Option<String>) {
        let mut decls: Vec<String> = Vec::new();
        let mut need_name = first_element.is_none();
        if let Some(first) = first_element {
            decls.push(first);
        }

        loop {
            if need_name {
                let t = self.lex();
                if !t.is(LexemeKind::Ident) {
                    self.lerror(
                        ParExpectedElementName,
                        "syntax error: expected element name".to_string(),
                    );
                } else {
                    decls.push(t.text);
                }
            }
            need_name = true;

            let tsep = self.lex();
            if tsep.is(LexemeKind::Char(',')) {
                continue;
            } else if tsep.is(LexemeKind::ColonColon) {
                break;
            } else {
                self.lerror(
                    ParExpectedSeparator,
                    "syntax error: expected `::' or `,'".to_string(),
                );
                self.unlex(tsep);
                return;
            }
        }

        let landmark = self.lexer.landmark();
        let etype;
        let t = self.lex();
        if t.is(LexemeKind::Ident) {
            etype = self.force_element_type(&t.text);
        } else if t.is(LexemeKind::Char('{')) {
            etype = self.parse_compound(None);
        } else {
            self.lerror(
                ParMissingElementType,
                "missing element type in declaration".to_string(),
            );
            return;
        }

        let mut configuration = String::new();
        let t = self.lex();
        if t.is(LexemeKind::Char('(')) {
            configuration = self.lexer.lex_config();
            self.expect(LexemeKind::Char(')'));
        } else {
            self.unlex(t);
        }

        for name in decls {
            if let Some(&element) = self.graph.element_map.get(&name) {
                self.lerror(
                    NetRedeclaredElement,
                    format!("redeclaration of element `{}'", name),
                );
                if self.graph.elements[element] != TUNNEL_TYPE {
                    self.ectx.message(
                        self.graph.element_landmark(element),
                        format!("element `{}' previously declared here", name),
                    );
                }
            } else if self.classes.lookup(&name).is_some() {
                self.lerror(NetElementClassClash, format!("`{}' is an element class", name));
            } else {
                self.get_element(name, etype, configuration.clone(), Some(landmark.clone()));
            }
        }
    }

    ///
    /// `'elementclass' ident ('{' compound '}' | ident)`
    ///
    fn parse_element_class(&mut self) {
        let tname = self.lex();
        let name = if tname.is(LexemeKind::Ident) {
            tname.text
        } else {
            self.unlex(tname);
            self.lerror(ParExpectedClassName, "expected element type name".to_string());
            self.anon_class_name("@Class")
        };

        let tnext = self.lex();
        if tnext.is(LexemeKind::Char('{')) {
            self.parse_compound(Some(name));
        } else if tnext.is(LexemeKind::Ident) {
            // define a synonym type
            let target = self.force_element_type(&tnext.text);
            self.classes.add(name, ElementClass::Synonym(target));
        } else {
            self.lerror(ParSyntaxError, format!("syntax error near `{}'", tnext.text));
            self.classes.add(name, ElementClass::error_placeholder());
        }
    }

    ///
    /// `'connectiontunnel' ident '->' ident { ',' ident '->' ident }*`
    ///
    fn parse_tunnel(&mut self) {
        loop {
            let tname1 = self.lex();
            let name1 = if tname1.is(LexemeKind::Ident) {
                Some(tname1.text)
            } else {
                self.unlex(tname1);
                self.lerror(ParExpectedPortName, "expected port name".to_string());
                None
            };

            self.expect(LexemeKind::Arrow);

            let tname2 = self.lex();
            let name2 = if tname2.is(LexemeKind::Ident) {
                Some(tname2.text)
            } else {
                self.unlex(tname2);
                self.lerror(ParExpectedPortName, "expected port name".to_string());
                None
            };

            if let (Some(name1), Some(name2)) = (name1, name2) {
                add_tunnel(
                    &mut self.graph,
                    &mut self.tunnels,
                    &mut self.ectx,
                    self.lexer.landmark(),
                    name1,
                    name2,
                );
            }

            let t = self.lex();
            if !t.is(LexemeKind::Char(',')) {
                self.unlex(t);
                return;
            }
        }
    }

    ///
    /// Optional compound formals: `$a { ',' $b }* '|'`.
    ///
    fn parse_compound_formals(&mut self, compound: &mut Compound) {
        loop {
            let tvar = self.lex();
            if !tvar.is(LexemeKind::Variable) {
                self.unlex(tvar);
                return;
            }
            compound.add_formal(tvar.text);

            let tsep = self.lex();
            if tsep.is(LexemeKind::Char('|')) {
                return;
            } else if !tsep.is(LexemeKind::Char(',')) {
                self.lerror(
                    ParExpectedFormalSeparator,
                    "expected `,' or `|'".to_string(),
                );
                self.unlex(tsep);
                return;
            }
        }
    }

    ///
    /// Parses a compound class body chain after its opening `{`:
    /// `['...' '||'] body { '||' body }* '}'`. Registers the class
    /// under `name` (or a generated anonymous class name) and returns
    /// its id.
    ///
    pub(crate) fn parse_compound(&mut self, name: Option<String>) -> ClassId {
        let name = name.unwrap_or_else(|| self.anon_class_name("@Class"));

        let old_element_map = mem::take(&mut self.graph.element_map);
        let old_offset = self.graph.anonymous_offset;

        // check for '...'
        let t = self.lex();
        let mut created: Option<Overload> = None;
        if t.is(LexemeKind::Ellipsis) {
            if self.classes.lookup(&name).is_none() {
                self.lerror(
                    NetExtendsUnknownClass,
                    format!("extending unknown element class `{}'", name),
                );
                self.classes.add(name.clone(), ElementClass::error_placeholder());
            }
            created = self.classes.lookup(&name).map(Overload::Class);
            self.expect(LexemeKind::BarBar);
        } else {
            self.unlex(t);
        }

        loop {
            // prepare a fresh body
            self.graph.element_map.clear();
            let mut compound = Compound::new(
                name.clone(),
                self.lexer.landmark(),
                self.compound_depth,
                created.take(),
            );
            compound.swap_graph(&mut self.graph);
            self.get_element("input".to_string(), TUNNEL_TYPE, String::new(), None);
            self.get_element("output".to_string(), TUNNEL_TYPE, String::new(), None);
            self.graph.anonymous_offset = 2;
            self.compound_depth += 1;
            let saved_type_map = self.classes.map_snapshot();

            self.parse_compound_formals(&mut compound);
            while self.parse_statement(true) {}

            self.compound_depth -= 1;
            self.graph.anonymous_offset = old_offset;
            self.classes.restore_map(saved_type_map);
            compound.swap_graph(&mut self.graph);

            compound.finish(&mut self.ectx);
            created = Some(Overload::Compound(Box::new(compound)));

            // check for '||' or '}'
            let t = self.lex();
            if !t.is(LexemeKind::BarBar) {
                break;
            }
        }

        if let Some(Overload::Compound(compound)) = &created {
            compound.check_duplicates(&mut self.ectx);
        }
        self.graph.element_map = old_element_map;

        match created {
            Some(Overload::Compound(compound)) => {
                self.classes.add(name, ElementClass::Compound(compound))
            }
            // unreachable: the loop always runs at least once
            _ => self.classes.add(name, ElementClass::error_placeholder()),
        }
    }

    ///
    /// `'require' '(' word { ',' word }* ')'`
    ///
    fn parse_require(&mut self) {
        if self.expect(LexemeKind::Char('(')) {
            let requirement = self.lexer.lex_config();
            for arg in config::split_args(&requirement) {
                match config::parse_word(&arg) {
                    None => self.lerror(
                        ParBadRequirement,
                        "bad requirement: should be a single word".to_string(),
                    ),
                    Some(word) => {
                        let word = word.to_string();
                        if let Some(mut extra) = self.extra.take() {
                            extra.require(&word, &mut self.ectx);
                            self.extra = Some(extra);
                        }
                        self.graph.requirements.push(word);
                    }
                }
            }
            self.expect(LexemeKind::Char(')'));
        }
    }
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}
