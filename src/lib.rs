//! A crate for parsing FCL configurations.
//!
//! # Use Case
//!
//! FCL (FlowConfigurationLanguage) is a language for describing the
//! dataflow graph of a packet-processing router: named elements,
//! connected port to port, configured by opaque argument strings. This
//! crate is the front-end of the FCL compiler: it turns configuration
//! text into an expanded, fully-resolved graph ready for instantiation
//! by a downstream runtime. The runtime itself (element
//! implementations, scheduling, packet handling) is out of scope and
//! reached only through the [Router] sink trait.
//!
//! # Usage
//!
//! ## Steps in the compile process
//!
//! | process step |           input           |       output       |
//! |:------------:|:-------------------------:|:------------------:|
//! |    lexing    |  text blob (on demand)    |      lexemes       |
//! |    parsing   |          lexemes          | provisional graph  |
//! |   expansion  | provisional graph + table | router sink calls  |
//!
//! A typical run registers the host's element classes, parses and
//! expands:
//!
//! ```
//! use fcl::{ElementClass, Parser};
//!
//! let mut parser = Parser::new();
//! parser.add_element_type("Source", ElementClass::builtin("Source"));
//! parser.add_element_type("Sink", ElementClass::builtin("Sink"));
//!
//! let cookie = parser.begin_parse("Source -> Sink;", "example.fcl", None);
//! parser.parse();
//! let router = parser.create_router();
//! parser.end_parse(cookie);
//!
//! assert_eq!(router.elements.len(), 2);
//! assert!(!parser.errors().has_errors());
//! ```
//!
//! ## Error management
//!
//! Nothing aborts: every error site installs a placeholder and keeps
//! going, so one run reports as many problems as possible. All
//! diagnostics carry a [Landmark] and accumulate in the parser's
//! [ErrorContext]; its severity counter is the host's signal whether
//! the produced graph should be used.

mod classes;
mod compound;
mod config;
mod env;
mod error;
mod expand;
mod graph;
mod landmark;
mod lexer;
mod parser;
mod router;
mod tunnel;

// ### Exports ###

// > Global primitives
pub use error::Error;
pub use error::ErrorCode;
pub use error::ErrorContext;
pub use landmark::Landmark;
pub use lexer::Lexeme;
pub use lexer::LexemeKind;

// > Classes
pub use classes::BuiltinClass;
pub use classes::ClassId;
pub use classes::ElementClass;
pub use classes::ScopeCookie;
pub use classes::ERROR_TYPE;
pub use classes::TUNNEL_TYPE;
pub use compound::Compound;

// > Parsing
pub use graph::PortRef;
pub use parser::Parser;
pub use parser::ParserExtra;

// > Router emission
pub use router::GraphRouter;
pub use router::Router;
pub use router::RouterConnection;
pub use router::RouterElement;

// > Configuration helpers
pub use config::parse_integer;
pub use config::parse_word;
pub use config::split_args;
pub use env::VariableEnvironment;
