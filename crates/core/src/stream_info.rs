//! The stream-info cell table and its persisted text form.
//!
//! One row per rasterized stream cell, in raster scan order. The persisted
//! form is the space-delimited text table the flood-routing solver reads:
//!
//! ```text
//! DEM_1D_Index Row Col StreamID StreamDirection Slope Flow
//! ```
//!
//! Trailing columns are optional depending on how far the preparation
//! pipeline has run; a column is written only once every row carries it.
//! Row order is the contract: it must match raster scan order and survive
//! read/write round trips unchanged.

use crate::error::{Error, Result};
use crate::io::temp_sibling;
use std::fs::File;
use std::path::Path;

const CANONICAL_COLUMNS: [&str; 7] = [
    "DEM_1D_Index",
    "Row",
    "Col",
    "StreamID",
    "StreamDirection",
    "Slope",
    "Flow",
];

/// One rasterized stream cell.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamCell {
    /// Position in the flattened (row-major) DEM grid
    pub index: u64,
    /// Raster row of the cell
    pub row: u32,
    /// Raster column of the cell
    pub col: u32,
    /// Stream reach occupying the cell
    pub stream_id: i32,
    /// Flow direction code, once the direction stage has run
    pub direction: Option<u8>,
    /// Channel slope, once the slope stage has run
    pub slope: Option<f64>,
    /// Representative flow, once streamflow has been joined
    pub flow: Option<f64>,
}

impl StreamCell {
    /// A cell with only the index stage filled in
    pub fn new(index: u64, row: u32, col: u32, stream_id: i32) -> Self {
        Self {
            index,
            row,
            col,
            stream_id,
            direction: None,
            slope: None,
            flow: None,
        }
    }
}

/// Ordered sequence of stream cells for one watershed tile.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamInfoTable {
    cells: Vec<StreamCell>,
}

impl StreamInfoTable {
    pub fn new(cells: Vec<StreamCell>) -> Self {
        Self { cells }
    }

    pub fn cells(&self) -> &[StreamCell] {
        &self.cells
    }

    pub fn cells_mut(&mut self) -> &mut [StreamCell] {
        &mut self.cells
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, StreamCell> {
        self.cells.iter()
    }

    /// Distinct stream ids, sorted ascending.
    pub fn unique_ids(&self) -> Vec<i32> {
        let mut ids: Vec<i32> = self.cells.iter().map(|c| c.stream_id).collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    /// Number of columns the persisted form of this table carries.
    fn column_count(&self) -> usize {
        let all = |f: fn(&StreamCell) -> bool| self.cells.iter().all(f);
        if !self.cells.is_empty() && all(|c| c.flow.is_some()) {
            7
        } else if !self.cells.is_empty() && all(|c| c.slope.is_some()) {
            6
        } else if !self.cells.is_empty() && all(|c| c.direction.is_some()) {
            5
        } else {
            4
        }
    }

    /// Read a table from its space-delimited text form.
    pub fn read_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|_| Error::SourceNotFound {
            path: path.to_path_buf(),
        })?;

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b' ')
            .has_headers(true)
            .from_reader(file);

        let n_columns = {
            let headers = reader
                .headers()
                .map_err(|e| Error::Table(format!("{}: bad header: {e}", path.display())))?;
            let n = headers.len();
            if !(4..=7).contains(&n) {
                return Err(Error::Table(format!(
                    "{}: expected 4..=7 columns, found {n}",
                    path.display()
                )));
            }
            for (i, name) in headers.iter().enumerate() {
                if !name.eq_ignore_ascii_case(CANONICAL_COLUMNS[i]) {
                    return Err(Error::Table(format!(
                        "{}: unexpected column '{name}' at position {i}",
                        path.display()
                    )));
                }
            }
            n
        };

        let mut cells = Vec::new();
        for (line, record) in reader.records().enumerate() {
            let record =
                record.map_err(|e| Error::Table(format!("{}: {e}", path.display())))?;
            if record.len() != n_columns {
                return Err(Error::Table(format!(
                    "{}: row {} has {} fields, expected {n_columns}",
                    path.display(),
                    line + 2,
                    record.len()
                )));
            }
            cells.push(parse_record(&record, n_columns, path, line + 2)?);
        }

        Ok(Self { cells })
    }

    /// Write the table in its space-delimited text form.
    ///
    /// Written to a temporary sibling then renamed into place, so a crash
    /// mid-write cannot leave a truncated table at the destination.
    pub fn write_to<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let tmp_path = temp_sibling(path);

        let result = self.write_records(&tmp_path);
        match result {
            Ok(()) => {
                std::fs::rename(&tmp_path, path)?;
                Ok(())
            }
            Err(e) => {
                let _ = std::fs::remove_file(&tmp_path);
                Err(e)
            }
        }
    }

    fn write_records(&self, path: &Path) -> Result<()> {
        let n_columns = self.column_count();
        let file = File::create(path)?;
        let mut writer = csv::WriterBuilder::new()
            .delimiter(b' ')
            .from_writer(file);

        writer
            .write_record(&CANONICAL_COLUMNS[..n_columns])
            .map_err(|e| Error::Table(e.to_string()))?;

        let mut fields: Vec<String> = Vec::with_capacity(n_columns);
        for cell in &self.cells {
            fields.clear();
            fields.push(cell.index.to_string());
            fields.push(cell.row.to_string());
            fields.push(cell.col.to_string());
            fields.push(cell.stream_id.to_string());
            if n_columns >= 5 {
                fields.push(cell.direction.unwrap_or(0).to_string());
            }
            if n_columns >= 6 {
                fields.push(format_float(cell.slope.unwrap_or(0.0)));
            }
            if n_columns >= 7 {
                fields.push(format_float(cell.flow.unwrap_or(0.0)));
            }
            writer
                .write_record(fields.iter())
                .map_err(|e| Error::Table(e.to_string()))?;
        }

        writer.flush()?;
        Ok(())
    }
}

impl<'a> IntoIterator for &'a StreamInfoTable {
    type Item = &'a StreamCell;
    type IntoIter = std::slice::Iter<'a, StreamCell>;

    fn into_iter(self) -> Self::IntoIter {
        self.cells.iter()
    }
}

fn format_float(value: f64) -> String {
    // Stable text form: integers stay integral, fractions keep full precision.
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

fn parse_record(
    record: &csv::StringRecord,
    n_columns: usize,
    path: &Path,
    line: usize,
) -> Result<StreamCell> {
    let field = |i: usize| -> &str { record.get(i).unwrap_or("") };
    let bad = |what: &str, value: &str| {
        Error::Table(format!(
            "{}: row {line}: bad {what} '{value}'",
            path.display()
        ))
    };

    let mut cell = StreamCell::new(
        field(0).parse().map_err(|_| bad("index", field(0)))?,
        field(1).parse().map_err(|_| bad("row", field(1)))?,
        field(2).parse().map_err(|_| bad("col", field(2)))?,
        field(3).parse().map_err(|_| bad("stream id", field(3)))?,
    );
    if n_columns >= 5 {
        cell.direction = Some(field(4).parse().map_err(|_| bad("direction", field(4)))?);
    }
    if n_columns >= 6 {
        cell.slope = Some(field(5).parse().map_err(|_| bad("slope", field(5)))?);
    }
    if n_columns >= 7 {
        cell.flow = Some(field(6).parse().map_err(|_| bad("flow", field(6)))?);
    }
    Ok(cell)
}
