//! Source Index: discovers HDL files and extracts the design units they
//! declare and instantiate.
//!
//! The scan is lexical. Comments and string literals are stripped, then a
//! small pattern matcher recognises VHDL `entity`/`architecture` declarations
//! with component and direct entity instantiations, and Verilog/SystemVerilog
//! `module` declarations with module instantiations. Files whose declarations
//! cannot be identified produce a [`ParseWarning`] and indexing continues.

#![warn(missing_docs)]

pub mod discover;
pub mod index;
pub mod language;
mod lexer;
mod scan;
pub mod unit;
pub mod warning;

pub use discover::discover_source_files;
pub use index::{index, resolve_reference, ChangeSet, IndexReport, SourceFile, SourceIndex};
pub use language::HdlLanguage;
pub use unit::{DesignUnit, UnitRole};
pub use warning::{ParseWarning, ParseWarningKind};
