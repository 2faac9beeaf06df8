//! The action language: a compact text DSL an agent emits to drive a
//! spreadsheet, plus the interpreter that applies it to a model.
//!
//! Wire form, one entry per line or `;`:
//!
//! ```text
//! REGEX ^.*$ | SELECT C1:C-1
//! REGEX ^\?.*$ | FORMAT style: backgroundcolor, color: yellow
//! ```

pub mod action;
pub mod error;
pub mod interpret;
pub mod parser;

pub use action::{Action, ActionKind, CellRef, FormatSpec, FormatStyle, RangeRef, RowRef, DEFAULT_PATTERN};
pub use error::{ExecutionError, ParseError};
pub use interpret::{interpret, ExecutionResult};
pub use parser::{parse, serialize};
