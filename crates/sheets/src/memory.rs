//! In-memory [`SpreadsheetBackend`] for dry runs and tests.
//!
//! Mirrors the observable behavior of the Google backend: worksheets are
//! addressed by title, writes outside the grid fail, and `clear` removes
//! values but keeps formatting.

use std::collections::{BTreeMap, VecDeque};

use async_trait::async_trait;
use parking_lot::Mutex;

use folio_sync_core::{CellFormat, CellRef, CellValue, GridRange, Row, SheetError, SpreadsheetBackend};

#[derive(Debug, Clone, Default)]
struct Worksheet {
    rows: u32,
    cols: u32,
    cells: BTreeMap<CellRef, CellValue>,
    formats: Vec<(GridRange, CellFormat)>,
}

#[derive(Debug, Default)]
struct State {
    is_open: bool,
    order: Vec<String>,
    sheets: BTreeMap<String, Worksheet>,
    failing: Vec<String>,
    injected: VecDeque<SheetError>,
    calls: usize,
}

/// A single named spreadsheet held in memory.
#[derive(Debug)]
pub struct MemorySpreadsheet {
    name: String,
    state: Mutex<State>,
}

impl MemorySpreadsheet {
    /// A spreadsheet with this name and one empty "Sheet1".
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let mut state = State::default();
        state.order.push("Sheet1".to_string());
        state.sheets.insert(
            "Sheet1".to_string(),
            Worksheet {
                rows: 1000,
                cols: 26,
                ..Worksheet::default()
            },
        );
        Self {
            name: name.into(),
            state: Mutex::new(state),
        }
    }

    /// Makes every write and format against `title` fail.
    pub fn fail_worksheet(&self, title: impl Into<String>) {
        self.state.lock().failing.push(title.into());
    }

    /// Queues an error returned by the next backend call.
    pub fn inject_error(&self, error: SheetError) {
        self.state.lock().injected.push_back(error);
    }

    /// Number of backend calls made so far, including failed ones.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.state.lock().calls
    }

    #[must_use]
    pub fn cell(&self, title: &str, a1: &str) -> Option<CellValue> {
        let cell = CellRef::parse(a1).ok()?;
        self.state
            .lock()
            .sheets
            .get(title)
            .and_then(|s| s.cells.get(&cell).cloned())
    }

    /// Cell text, or an empty string when unset.
    #[must_use]
    pub fn text(&self, title: &str, a1: &str) -> String {
        self.cell(title, a1).map(|c| c.display()).unwrap_or_default()
    }

    /// Rendered grid trimmed to the last populated row and column.
    #[must_use]
    pub fn dump(&self, title: &str) -> Vec<Vec<String>> {
        let state = self.state.lock();
        let Some(sheet) = state.sheets.get(title) else {
            return Vec::new();
        };
        let populated = sheet
            .cells
            .iter()
            .filter(|(_, v)| !matches!(v, CellValue::Empty) && !v.display().is_empty());
        let (max_row, max_col) = populated.fold((None, None), |(r, c), (cell, _)| {
            (
                Some(r.map_or(cell.row, |r: u32| r.max(cell.row))),
                Some(c.map_or(cell.col, |c: u32| c.max(cell.col))),
            )
        });
        let (Some(max_row), Some(max_col)) = (max_row, max_col) else {
            return Vec::new();
        };

        (0..=max_row)
            .map(|r| {
                (0..=max_col)
                    .map(|c| {
                        sheet
                            .cells
                            .get(&CellRef::new(r, c))
                            .map(CellValue::display)
                            .unwrap_or_default()
                    })
                    .collect()
            })
            .collect()
    }

    /// Formats applied to `title`, in application order.
    #[must_use]
    pub fn formats(&self, title: &str) -> Vec<(GridRange, CellFormat)> {
        self.state
            .lock()
            .sheets
            .get(title)
            .map(|s| s.formats.clone())
            .unwrap_or_default()
    }

    /// Grid dimensions of `title`.
    #[must_use]
    pub fn dimensions(&self, title: &str) -> Option<(u32, u32)> {
        self.state.lock().sheets.get(title).map(|s| (s.rows, s.cols))
    }

    fn begin(&self) -> Result<parking_lot::MutexGuard<'_, State>, SheetError> {
        let mut state = self.state.lock();
        state.calls += 1;
        if let Some(error) = state.injected.pop_front() {
            return Err(error);
        }
        Ok(state)
    }
}

fn sheet_mut<'a>(state: &'a mut State, title: &str) -> Result<&'a mut Worksheet, SheetError> {
    if !state.is_open {
        return Err(SheetError::NotOpen);
    }
    if state.failing.iter().any(|t| t == title) {
        return Err(SheetError::api(500, format!("backend failure on {title}")));
    }
    state
        .sheets
        .get_mut(title)
        .ok_or_else(|| SheetError::WorksheetNotFound(title.to_string()))
}

#[async_trait]
impl SpreadsheetBackend for MemorySpreadsheet {
    async fn open(&self, name: &str) -> Result<(), SheetError> {
        let mut state = self.begin()?;
        if name != self.name {
            return Err(SheetError::SpreadsheetNotFound(name.to_string()));
        }
        state.is_open = true;
        Ok(())
    }

    async fn worksheets(&self) -> Result<Vec<String>, SheetError> {
        let state = self.begin()?;
        if !state.is_open {
            return Err(SheetError::NotOpen);
        }
        Ok(state.order.clone())
    }

    async fn ensure_worksheet(&self, title: &str, rows: u32, cols: u32) -> Result<(), SheetError> {
        let mut state = self.begin()?;
        if !state.is_open {
            return Err(SheetError::NotOpen);
        }
        if !state.sheets.contains_key(title) {
            state.order.push(title.to_string());
            state.sheets.insert(
                title.to_string(),
                Worksheet {
                    rows,
                    cols,
                    ..Worksheet::default()
                },
            );
        }
        Ok(())
    }

    async fn clear(&self, title: &str) -> Result<(), SheetError> {
        let mut state = self.begin()?;
        sheet_mut(&mut state, title)?.cells.clear();
        Ok(())
    }

    async fn write(&self, title: &str, anchor: &str, rows: &[Row]) -> Result<(), SheetError> {
        let start = CellRef::parse(anchor)?;
        let mut state = self.begin()?;
        let sheet = sheet_mut(&mut state, title)?;

        let height = u32::try_from(rows.len()).unwrap_or(u32::MAX);
        let width = u32::try_from(rows.iter().map(Vec::len).max().unwrap_or(0)).unwrap_or(u32::MAX);
        if start.row.saturating_add(height) > sheet.rows || start.col.saturating_add(width) > sheet.cols {
            return Err(SheetError::InvalidRange(format!(
                "{anchor} + {height}x{width} exceeds grid limits of {title}"
            )));
        }

        for (r, values) in (start.row..).zip(rows) {
            for (c, value) in (start.col..).zip(values) {
                sheet.cells.insert(CellRef::new(r, c), value.clone());
            }
        }
        Ok(())
    }

    async fn format(&self, title: &str, range: &str, format: &CellFormat) -> Result<(), SheetError> {
        let grid = GridRange::parse(range)?;
        let mut state = self.begin()?;
        let sheet = sheet_mut(&mut state, title)?;
        sheet.formats.retain(|(existing, _)| *existing != grid);
        sheet.formats.push((grid, format.clone()));
        Ok(())
    }

    async fn delete_worksheet(&self, title: &str) -> Result<(), SheetError> {
        let mut state = self.begin()?;
        sheet_mut(&mut state, title)?;
        state.sheets.remove(title);
        state.order.retain(|t| t != title);
        Ok(())
    }
}
