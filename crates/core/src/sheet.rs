//! Spreadsheet cells, formats and the backend trait reports are written to.

use async_trait::async_trait;
use serde::{Serialize, Serializer};

use crate::error::SheetError;

#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Text(String),
    Number(f64),
    Empty,
}

impl CellValue {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    /// Rendered form used by plain-text dumps and comparisons.
    #[must_use]
    pub fn display(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::Number(n) => n.to_string(),
            Self::Empty => String::new(),
        }
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl Serialize for CellValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Text(s) => serializer.serialize_str(s),
            Self::Number(n) => serializer.serialize_f64(*n),
            Self::Empty => serializer.serialize_str(""),
        }
    }
}

pub type Row = Vec<CellValue>;

/// Builds a row from anything convertible to cells.
pub fn row<I, T>(cells: I) -> Row
where
    I: IntoIterator<Item = T>,
    T: Into<CellValue>,
{
    cells.into_iter().map(Into::into).collect()
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub red: f32,
    pub green: f32,
    pub blue: f32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CellFormat {
    pub bold: bool,
    pub font_size: Option<u32>,
    pub background: Option<Color>,
}

impl CellFormat {
    #[must_use]
    pub fn bold() -> Self {
        Self {
            bold: true,
            ..Self::default()
        }
    }

    /// Bold heading at the given point size.
    #[must_use]
    pub fn heading(font_size: u32) -> Self {
        Self {
            bold: true,
            font_size: Some(font_size),
            background: None,
        }
    }

    #[must_use]
    pub fn with_background(mut self, color: Color) -> Self {
        self.background = Some(color);
        self
    }
}

/// Spreadsheet operations used to publish reports. Worksheets are addressed
/// by title within the spreadsheet selected by [`SpreadsheetBackend::open`].
#[async_trait]
pub trait SpreadsheetBackend: Send + Sync {
    /// Selects the spreadsheet with this exact name.
    async fn open(&self, name: &str) -> Result<(), SheetError>;

    async fn worksheets(&self) -> Result<Vec<String>, SheetError>;

    /// Returns once a worksheet with `title` exists, creating it if needed.
    async fn ensure_worksheet(&self, title: &str, rows: u32, cols: u32) -> Result<(), SheetError>;

    async fn clear(&self, title: &str) -> Result<(), SheetError>;

    /// Writes a rectangular block with its top-left cell at `anchor`.
    async fn write(&self, title: &str, anchor: &str, rows: &[Row]) -> Result<(), SheetError>;

    async fn format(&self, title: &str, range: &str, format: &CellFormat) -> Result<(), SheetError>;

    async fn delete_worksheet(&self, title: &str) -> Result<(), SheetError>;
}
