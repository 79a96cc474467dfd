use crate::Landmark;

use std::io::Write;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

pub use ErrorCode::*;

///
/// Classes of FCL errors.
///
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    LexUnknownDirective,

    ParExpectedToken,
    ParExpectedPortNumber,
    ParExpectedPortName,
    ParExpectedElementName,
    ParExpectedSeparator,
    ParExpectedClassName,
    ParExpectedFormalSeparator,
    ParMissingElementType,
    ParStrayInputPort,
    ParStrayOutputPort,
    ParSyntaxError,
    ParBadRequirement,

    NetUndeclaredElement,
    NetRedeclaredElement,
    NetRedeclaredTunnel,
    NetElementClassClash,
    NetUnknownElementClass,
    NetExtendsUnknownClass,

    ExpNoMatchingOverload,
    ExpDuplicateSignature,
    ExpPseudoelementMisuse,
    ExpUnusedCompoundPort,
    ExpNonexistentCompoundPort,
    ExpTunnelUnused,
    ExpTunnelDirection,

    /// A follow-up note, attached to a preceding error.
    Note,
}

///
/// A generic FCL error.
///
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    /// An unique identifer for the error class.
    pub code: ErrorCode,
    /// An instance-specific error message.
    pub msg: String,
    /// The source location of the error.
    pub landmark: Landmark,
    /// A indicator whether this error syntacticly was caused by another.
    pub transient: bool,
}

impl Error {
    ///
    /// Creates a new instance.
    ///
    pub fn new(code: ErrorCode, msg: String, landmark: Landmark, transient: bool) -> Self {
        Self {
            code,
            msg,
            landmark,
            transient,
        }
    }

    ///
    /// Prints the error to the given stream (colored) using termcolor.
    ///
    pub fn print(&self, stream: &mut StandardStream) -> std::io::Result<()> {
        if self.code == ErrorCode::Note {
            stream.set_color(ColorSpec::new().set_fg(Some(Color::Blue)).set_bold(true))?;
            write!(stream, "  note: ")?;
        } else {
            stream.set_color(ColorSpec::new().set_fg(Some(Color::Red)).set_bold(true))?;
            if self.transient {
                write!(stream, "*error[{:?}]: ", self.code)?;
            } else {
                write!(stream, " error[{:?}]: ", self.code)?;
            }
        }

        stream.reset()?;
        stream.set_color(ColorSpec::new().set_bold(true))?;
        writeln!(stream, "{}", self.msg)?;

        stream.set_color(ColorSpec::new().set_fg(Some(Color::Blue)).set_bold(true))?;
        write!(stream, "   --> ")?;
        stream.reset()?;
        writeln!(stream, "{}", self.landmark)
    }
}

///
/// A context for storing the errors and notes produced while
/// processing one input.
///
/// This is the only channel through which the embedding host learns
/// about problems: parsing never aborts, so the severity counter
/// decides whether the resulting graph should be used.
///
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorContext {
    errors: Vec<Error>,
    n_errors: usize,

    transient: bool,
    context: Option<String>,
    indent: bool,
}

impl ErrorContext {
    ///
    /// Creates a new raw instace.
    ///
    pub fn new() -> Self {
        Self {
            errors: Vec::new(),
            n_errors: 0,
            transient: false,
            context: None,
            indent: false,
        }
    }

    /// The errors and notes recorded so far.
    pub fn errors(&self) -> &[Error] {
        &self.errors
    }

    /// The number of real errors (notes excluded).
    pub fn n_errors(&self) -> usize {
        self.n_errors
    }

    ///
    /// Indicates whether an error has occured.
    ///
    pub fn has_errors(&self) -> bool {
        self.n_errors > 0
    }

    ///
    /// Records an error, determining transients automaticly.
    ///
    pub fn error(&mut self, landmark: Landmark, code: ErrorCode, msg: impl Into<String>) {
        debug_assert!(code != ErrorCode::Note);
        self.errors.push(Error {
            code,
            msg: msg.into(),
            landmark,
            transient: self.transient,
        });
        self.transient = true;
        self.n_errors += 1;
    }

    ///
    /// Records a note that does not count towards the severity counter.
    /// If a context prefix is pending it is emitted first and all
    /// following notes are indented under it.
    ///
    pub fn message(&mut self, landmark: Landmark, msg: impl Into<String>) {
        if let Some(context) = self.context.take() {
            self.errors.push(Error {
                code: ErrorCode::Note,
                msg: context,
                landmark: landmark.clone(),
                transient: true,
            });
            self.indent = true;
        }
        let msg = if self.indent {
            format!("  {}", msg.into())
        } else {
            msg.into()
        };
        self.errors.push(Error {
            code: ErrorCode::Note,
            msg,
            landmark,
            transient: true,
        });
    }

    ///
    /// Installs a context prefix (e.g. "possibilities are:") that is
    /// emitted once before the next note.
    ///
    pub fn set_context(&mut self, context: impl Into<String>) {
        self.context = Some(context.into());
        self.indent = false;
    }

    /// Drops any pending context prefix and indentation.
    pub fn clear_context(&mut self) {
        self.context = None;
        self.indent = false;
    }

    ///
    /// Resets the transient flag.
    ///
    pub fn reset_transient(&mut self) {
        self.transient = false;
    }

    /// Removes all recorded errors, keeping the context reusable.
    pub fn clear(&mut self) {
        self.errors.clear();
        self.n_errors = 0;
        self.transient = false;
        self.context = None;
        self.indent = false;
    }

    ///
    /// Prints all recorded errors to stderr.
    ///
    pub fn print_all(&self) -> std::io::Result<()> {
        let mut stream = StandardStream::stderr(ColorChoice::Always);
        for e in &self.errors {
            e.print(&mut stream)?;
        }
        Ok(())
    }
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self::new()
    }
}
