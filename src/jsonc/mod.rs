//! JSON with comments.
//!
//! Config files written by hand carry `//` and `/* */` comments, trailing
//! commas and their author's indentation. [`parse`] reads such documents
//! tolerantly; [`set_value`] and [`remove_value`] edit them by splicing the
//! original text, so bytes outside the touched property are never rewritten.

mod edit;
mod parser;
mod scanner;

pub use edit::{remove_value, set_value, EditError};
pub use parser::{parse, parse_tree, Node, NodeKind, ParseError};
