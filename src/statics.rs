// Central place for document keys, display literals and CLI strings.
// Keep these out of the model/document code to reduce duplication.

// Document structure keys
pub const DOC_COLUMNS: &str = "columns";
pub const DOC_ITEMS: &str = "items";
// Reserved per-item key holding nested items; never treated as a field.
pub const DOC_CHILDREN: &str = "children";

// Display text for values (filter menus, `show` output).
pub const LITERAL_NONE: &str = "None";
pub const LITERAL_TRUE: &str = "true";
pub const LITERAL_FALSE: &str = "false";

// Writer settings.
pub const NL: &str = "\n";
pub const INDENT_WIDTH: usize = 4;

// Row paths (`0/2/1`).
pub const PATH_SEPARATOR: char = '/';

// File handling
pub const EXT_GZIP: &str = "gz";
pub const GZIP_MAGIC: [u8; 2] = [0x1F, 0x8B];

// CLI strings (EN_ prefix to make future localization easier)
pub const EN_APP_ABOUT: &str = "Inspect and edit column-tagged JSON record trees";
pub const EN_NO_MATCHES: &str = "No matches.";
pub const EN_NO_COLUMNS: &str = "(no columns)";
pub const EN_HEADER_ROW: &str = "Row";
pub const EN_ERR_UNKNOWN_COLUMN: &str = "Unknown column";
pub const EN_ERR_BAD_PATH: &str = "Invalid row path";
pub const EN_ERR_NO_SOURCE_PATH: &str = "Document has no source path; use save_to_path";
