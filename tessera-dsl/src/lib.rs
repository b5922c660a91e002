//! Tessera DSL - Schema Definition Normalizer
//!
//! Turns a compact schema document into the canonical model shared by the
//! migration generator and the ORM.
//!
//! Architecture:
//! ```text
//! Schema Source (.json / .yaml / .toml)
//!     ↓
//! SchemaSource (order-preserving maps)
//!     ↓
//! Mixin expansion
//!     ↓
//! Column Lexer (per definition string)
//!     ↓
//! Compiler (tokens → Column, index validation)
//!     ↓
//! CanonicalSchema
//! ```

pub mod compiler;
pub mod lexer;
pub mod source;

// Re-export key types for convenience
pub use compiler::{compile, parse_column, parse_index, CompileResult, MIXIN_PREFIX};
pub use source::{ColumnMap, ColumnSpec, SchemaSource, SourceFormat};
