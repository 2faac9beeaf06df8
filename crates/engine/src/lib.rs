pub mod cell;
pub mod color;
pub mod model;
pub mod refs;
pub mod selection;
pub mod sheet;

pub use cell::{Alignment, Borders, Cell, CellFormat, CellValue, NumberFormat, TextOverflow, VerticalAlignment};
pub use model::{Clipboard, InputField, SpreadsheetModel};
pub use selection::Range;
pub use sheet::Sheet;
