//! Macros: named `<<...>>` directives dispatched by the scanner.

pub mod builtin;

use crate::expr::ExprError;
use crate::node::{error_node, Element, Node, Tag};
use crate::persist::PersistenceStore;
use crate::store::Store;
use crate::value::Variables;
use crate::wikifier::Wikifier;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Errors raised by macro handlers. The dispatcher renders them inline.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MacroError {
    #[error("bad expression: {0}")]
    BadExpression(ExprError),

    #[error("bad condition: {0}")]
    BadCondition(ExprError),

    #[error("can't find matching {end}")]
    MissingEnd { end: &'static str },

    #[error("can't remember ${name} ({kind})")]
    CannotRemember { name: String, kind: &'static str },

    #[error("no $variable to remember in \"{statement}\"")]
    NothingToRemember { statement: String },

    #[error("can't go back from the first passage read")]
    NoHistory,

    #[error("can't find passage \"{title}\" in history")]
    NotInHistory { title: String },

    #[error("<<{macro_name}>> needs a passage title")]
    MissingParameter { macro_name: String },

    #[error("passages nested more than {limit} deep")]
    TooDeep { limit: usize },

    #[error("{0}")]
    Custom(String),
}

/// One macro invocation as read from the source.
#[derive(Debug, Clone, PartialEq)]
pub struct MacroCall<'c> {
    pub name: &'c str,
    /// Everything between the name and the closing `>>`.
    pub args: &'c str,
    /// `args` split into parameters.
    pub params: Vec<String>,
}

/// What a macro's startup hook may read and seed.
pub struct MacroInit<'a> {
    pub store: &'a Store,
    pub persistence: &'a dyn PersistenceStore,
    pub persist_prefix: &'a str,
    /// The variables the first history entry starts with.
    pub variables: &'a mut Variables,
}

/// A macro handler.
pub trait Macro: Send + Sync {
    /// Render the invocation into `out`. The scanner cursor sits just past
    /// the invocation; block macros advance it past what they consume.
    fn handle(
        &self,
        out: &mut Vec<Node>,
        call: &MacroCall<'_>,
        w: &mut Wikifier<'_, '_>,
    ) -> Result<(), MacroError>;

    /// Runs whenever history is reset, before anything renders.
    fn init(&self, _init: &mut MacroInit<'_>) -> Result<(), MacroError> {
        Ok(())
    }
}

/// Name -> handler table, built once and passed to every render.
#[derive(Default)]
pub struct MacroRegistry {
    macros: BTreeMap<String, Box<dyn Macro>>,
}

impl MacroRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard story macros.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        builtin::register_all(&mut registry);
        registry
    }

    /// Register a handler, replacing any previous one of the same name.
    pub fn register(&mut self, name: impl Into<String>, handler: impl Macro + 'static) {
        self.macros.insert(name.into(), Box::new(handler));
    }

    pub fn with_macro(mut self, name: impl Into<String>, handler: impl Macro + 'static) -> Self {
        self.register(name, handler);
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.macros.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&dyn Macro> {
        self.macros.get(name).map(|m| m.as_ref())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.macros.keys().map(String::as_str)
    }

    /// Run one invocation. Failures become inline error markup and never
    /// escape the render pass.
    pub fn dispatch(
        &self,
        out: &mut Vec<Node>,
        name: &str,
        args: &str,
        params: Vec<String>,
        w: &mut Wikifier<'_, '_>,
    ) {
        let Some(handler) = self.get(name) else {
            tracing::debug!(name, "macro not found");
            out.push(
                Element::new(Tag::Span)
                    .with_class("marked")
                    .with_text(format!("macro not found: {name}"))
                    .into(),
            );
            return;
        };

        let call = MacroCall { name, args, params };
        if let Err(e) = handler.handle(out, &call, w) {
            tracing::warn!(name, error = %e, "macro failed");
            out.push(error_node(e.to_string()));
        }
    }

    /// Run every macro's startup hook, in name order.
    pub fn run_init(&self, init: &mut MacroInit<'_>) {
        for (name, handler) in &self.macros {
            if let Err(e) = handler.init(init) {
                tracing::warn!(name = %name, error = %e, "macro init failed");
            }
        }
    }
}

impl fmt::Debug for MacroRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.names()).finish()
    }
}

/// Delimiters of a block macro such as `<<if>>` .. `<<endif>>`.
#[derive(Debug, Clone, Copy)]
pub struct BlockDelimiters {
    /// Text that opens a nested block of the same kind.
    pub open: &'static str,
    /// Optional separator between the primary and alternate bodies.
    pub split: Option<&'static str>,
    pub close: &'static str,
}

/// A block found by [`scan_block`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block<'s> {
    pub body: &'s str,
    /// Text after the first same-level split token, when one occurs.
    pub alternate: Option<&'s str>,
    /// Offset just past the matching close token.
    pub end: usize,
}

/// Find the close token matching an already-open block, starting at
/// `from`. Nested opens raise the depth and only a split at depth one
/// divides the body. `None` when the block never closes.
pub fn scan_block<'s>(source: &'s str, from: usize, delims: &BlockDelimiters) -> Option<Block<'s>> {
    let bytes = source.as_bytes();
    let mut depth = 1usize;
    let mut split_at: Option<(usize, usize)> = None;
    let mut i = from;

    while i < bytes.len() {
        let rest = &bytes[i..];

        if rest.starts_with(delims.close.as_bytes()) {
            depth -= 1;
            if depth == 0 {
                let body_end = split_at.map_or(i, |(start, _)| start);
                return Some(Block {
                    body: source.get(from..body_end)?,
                    alternate: match split_at {
                        Some((_, after)) => Some(source.get(after..i)?),
                        None => None,
                    },
                    end: i + delims.close.len(),
                });
            }
            i += delims.close.len();
            continue;
        }

        if let Some(split) = delims.split {
            if depth == 1 && split_at.is_none() && rest.starts_with(split.as_bytes()) {
                split_at = Some((i, i + split.len()));
                i += split.len();
                continue;
            }
        }

        if rest.starts_with(delims.open.as_bytes()) {
            depth += 1;
            i += delims.open.len();
            continue;
        }

        i += 1;
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const IF: BlockDelimiters = BlockDelimiters {
        open: "<<if ",
        split: Some("<<else>>"),
        close: "<<endif>>",
    };

    #[test]
    fn test_scan_block_split() {
        let src = "A<<else>>B<<endif>> after";
        let block = scan_block(src, 0, &IF).unwrap();
        assert_eq!(block.body, "A");
        assert_eq!(block.alternate, Some("B"));
        assert_eq!(&src[block.end..], " after");
    }

    #[test]
    fn test_scan_block_nested() {
        let src = "x<<if $b>>y<<else>>z<<endif>><<else>>w<<endif>>";
        let block = scan_block(src, 0, &IF).unwrap();
        assert_eq!(block.body, "x<<if $b>>y<<else>>z<<endif>>");
        assert_eq!(block.alternate, Some("w"));
        assert_eq!(block.end, src.len());
    }

    #[test]
    fn test_scan_block_unclosed() {
        assert!(scan_block("A<<if $x>>B<<endif>>", 0, &IF).is_none());
    }

    #[test]
    fn test_scan_block_multibyte_text() {
        let src = "café ☕<<endif>>";
        let block = scan_block(src, 0, &IF).unwrap();
        assert_eq!(block.body, "café ☕");
    }
}
