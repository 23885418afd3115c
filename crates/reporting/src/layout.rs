//! Rendered worksheet contents, independent of any backend.

use folio_sync_core::{row, CellFormat, CellRef, Row};

/// Rows written with their top-left cell at `anchor`.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub anchor: String,
    pub rows: Vec<Row>,
}

/// Everything a stage publishes to one worksheet.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetLayout {
    pub title: String,
    pub grid_rows: u32,
    pub grid_cols: u32,
    pub blocks: Vec<Block>,
    pub formats: Vec<(String, CellFormat)>,
    /// Data rows, excluding titles and headers.
    pub data_rows: usize,
    /// Set when the layout only carries an empty-data message.
    pub placeholder: Option<String>,
}

pub(crate) const DEFAULT_GRID_ROWS: u32 = 1000;
pub(crate) const DEFAULT_GRID_COLS: u32 = 20;

impl SheetLayout {
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            grid_rows: DEFAULT_GRID_ROWS,
            grid_cols: DEFAULT_GRID_COLS,
            blocks: Vec::new(),
            formats: Vec::new(),
            data_rows: 0,
            placeholder: None,
        }
    }

    /// A worksheet holding only `message` in A1.
    #[must_use]
    pub fn placeholder(title: impl Into<String>, message: &str) -> Self {
        let mut layout = Self::new(title);
        layout.push_block("A1", vec![row([message])]);
        layout.placeholder = Some(message.to_string());
        layout
    }

    #[must_use]
    pub fn with_grid(mut self, rows: u32, cols: u32) -> Self {
        self.grid_rows = rows;
        self.grid_cols = cols;
        self
    }

    pub fn push_block(&mut self, anchor: impl Into<String>, rows: Vec<Row>) {
        self.blocks.push(Block {
            anchor: anchor.into(),
            rows,
        });
    }

    pub fn push_format(&mut self, range: impl Into<String>, format: CellFormat) {
        self.formats.push((range.into(), format));
    }

    /// Grid size large enough for every block.
    #[must_use]
    pub fn required_grid(&self) -> (u32, u32) {
        self.blocks.iter().fold((self.grid_rows, self.grid_cols), |(r, c), block| {
            let Ok(anchor) = CellRef::parse(&block.anchor) else {
                return (r, c);
            };
            let height = u32::try_from(block.rows.len()).unwrap_or(u32::MAX);
            let width = u32::try_from(block.rows.iter().map(Vec::len).max().unwrap_or(0))
                .unwrap_or(u32::MAX);
            (
                r.max(anchor.row.saturating_add(height)),
                c.max(anchor.col.saturating_add(width)),
            )
        })
    }
}
