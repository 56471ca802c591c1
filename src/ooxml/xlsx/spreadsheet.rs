//! The streaming spreadsheet writer.
//!
//! A [`Spreadsheet`] writes one worksheet at a time, top to bottom, straight
//! into the destination stream. Rows are staged in a small buffer that is
//! flushed into the open ZIP entry whenever the next cell does not fit, so
//! memory use does not depend on the number of rows.
//!
//! Everything a worksheet needs after its last row (merged cells,
//! validations, tables, images) is collected while the rows stream and
//! written when the worksheet is finished. Styles and the workbook parts are
//! written by [`Spreadsheet::finish`].

use crate::common::error::{Error, Result};
use crate::common::reference::{CellRange, MAX_COLUMNS, MAX_ROWS, parse_sqref};
use crate::ooxml::opc::constants::relationship_type as rt;
use crate::ooxml::opc::{ArchiveWriter, EntryMethod, Relationships};
use crate::ooxml::xlsx::cell::{Cell, DataCell, RowCell};
use crate::ooxml::xlsx::format::CellFormat;
use crate::ooxml::xlsx::image::{EmbeddedImage, ImageCanvas, png_dimensions};
use crate::ooxml::xlsx::options::{
    DocumentProperties, RowOptions, SpreadsheetOptions, WorksheetOptions, WorksheetVisibility,
};
use crate::ooxml::xlsx::table::Table;
use crate::ooxml::xlsx::validation::{DataValidation, MAX_VALIDATIONS_PER_WORKSHEET};
use crate::ooxml::xlsx::writer::buffer::{SpreadsheetBuffer, WriteOutcome};
use crate::ooxml::xlsx::writer::drawing::WorksheetDrawing;
use crate::ooxml::xlsx::writer::sheet::{
    WorksheetTail, column_runs, try_write_row_end, try_write_row_start, worksheet_preamble,
};
use crate::ooxml::xlsx::writer::styles::{DefaultStyling, StyleId, StylesBuilder};
use crate::ooxml::xlsx::writer::table::{ActiveTable, FinishedTable, TotalRowCell};
use crate::ooxml::xlsx::writer::value::{CellWriter, check_text_length};
use crate::ooxml::xlsx::writer::workbook::{
    PartCounts, SheetEntry, app_xml, content_types, core_xml, package_rels, workbook_rels,
    workbook_xml,
};
use chrono::{NaiveDateTime, Utc};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tracing::{debug, instrument, warn};

/// Longest worksheet name, in characters.
pub const MAX_WORKSHEET_NAME_LENGTH: usize = 31;

const INVALID_WORKSHEET_NAME_CHARS: &[char] = &['[', ']', '*', '?', '/', '\\', ':'];

/// Source of the token tying an [`EmbeddedImage`] to its document.
static NEXT_DOCUMENT: AtomicU64 = AtomicU64::new(1);

enum State {
    /// Between worksheets.
    Open,
    WorksheetOpen(Box<WorksheetState>),
    /// An I/O operation failed or was cancelled part way.
    Failed,
}

/// Everything collected for the open worksheet.
struct WorksheetState {
    number: u32,
    next_row: u32,
    auto_filter: Option<CellRange>,
    merged_cells: Vec<CellRange>,
    validations: Vec<(Vec<CellRange>, DataValidation)>,
    validation_count: usize,
    active_table: Option<ActiveTable>,
    tables: Vec<FinishedTable>,
    drawing: WorksheetDrawing,
}

impl WorksheetState {
    fn new(number: u32, auto_filter: Option<CellRange>) -> Self {
        Self {
            number,
            next_row: 1,
            auto_filter,
            merged_cells: Vec::new(),
            validations: Vec::new(),
            validation_count: 0,
            active_table: None,
            tables: Vec::new(),
            drawing: WorksheetDrawing::new(),
        }
    }
}

/// A spreadsheet being streamed to `W`.
///
/// # Examples
///
/// ```no_run
/// use spreadstream::{Cell, Spreadsheet, SpreadsheetOptions, WorksheetOptions};
///
/// # async fn demo() -> spreadstream::Result<()> {
/// let file = tokio::fs::File::create("report.xlsx").await?;
/// let mut spreadsheet = Spreadsheet::create(file, SpreadsheetOptions::default())?;
///
/// spreadsheet.start_worksheet("Report", WorksheetOptions::default()).await?;
/// spreadsheet.add_row(&[Cell::new("Item"), Cell::new("Count")]).await?;
/// spreadsheet.add_row(&[Cell::new("Apples"), Cell::new(12)]).await?;
/// spreadsheet.finish_worksheet().await?;
///
/// spreadsheet.finish().await?;
/// # Ok(())
/// # }
/// ```
pub struct Spreadsheet<W> {
    archive: ArchiveWriter<W>,
    buffer: SpreadsheetBuffer,
    cells: CellWriter,
    styles: StylesBuilder,
    defaults: DefaultStyling,
    properties: DocumentProperties,
    created: NaiveDateTime,
    state: State,
    sheets: Vec<SheetEntry>,
    sheet_names: HashSet<String>,
    table_names: HashSet<String>,
    table_count: u32,
    table_parts: Vec<u32>,
    drawing_count: u32,
    image_count: u32,
    document: u64,
}

impl<W: AsyncWrite + Unpin> Spreadsheet<W> {
    /// Start a document. Nothing is written until the first worksheet or
    /// image.
    pub fn create(sink: W, options: SpreadsheetOptions) -> Result<Self> {
        options.validate()?;

        let mut styles = StylesBuilder::new();
        let defaults =
            DefaultStyling::register(&mut styles, options.default_date_time_format.as_ref())?;
        let created = options
            .properties
            .created
            .unwrap_or_else(|| Utc::now().naive_utc());

        Ok(Self {
            archive: ArchiveWriter::new(sink, options.compression.to_flate2(), created),
            buffer: SpreadsheetBuffer::new(options.buffer_size),
            cells: CellWriter::new(),
            styles,
            defaults,
            properties: options.properties,
            created,
            state: State::Open,
            sheets: Vec::new(),
            sheet_names: HashSet::new(),
            table_names: HashSet::new(),
            table_count: 0,
            table_parts: Vec::new(),
            drawing_count: 0,
            image_count: 0,
            document: NEXT_DOCUMENT.fetch_add(1, Ordering::Relaxed),
        })
    }

    /// Register a cell format and return its handle. Equal formats share a
    /// handle.
    pub fn add_style(&mut self, format: &CellFormat) -> Result<StyleId> {
        if matches!(self.state, State::Failed) {
            return Err(Error::Poisoned);
        }
        self.styles.add_cell_format(format)
    }

    /// Style handles applied to cells without an explicit style.
    pub fn default_styling(&self) -> DefaultStyling {
        self.defaults
    }

    /// Open a new worksheet. The previous one must be finished.
    #[instrument(skip(self, options))]
    pub async fn start_worksheet(&mut self, name: &str, options: WorksheetOptions) -> Result<()> {
        match self.state {
            State::Open => {},
            State::WorksheetOpen(_) => {
                return Err(Error::invalid_operation(
                    "Finish the current worksheet before starting another",
                ));
            },
            State::Failed => return Err(Error::Poisoned),
        }

        validate_worksheet_name(name)?;
        let key = name.to_lowercase();
        if self.sheet_names.contains(&key) {
            return Err(Error::invalid_argument(format!(
                "A worksheet named '{}' already exists",
                name
            )));
        }
        options.validate()?;

        let columns = column_runs(&options)?;
        let selected = options.visibility == WorksheetVisibility::Visible
            && !self
                .sheets
                .iter()
                .any(|s| s.visibility == WorksheetVisibility::Visible);
        let preamble = worksheet_preamble(&options, &columns, selected);
        let number = self.sheets.len() as u32 + 1;

        self.state = State::Failed;
        let result = self.open_worksheet_entry(number, &preamble).await;
        self.settle(State::Open, result)?;

        self.sheet_names.insert(key);
        self.sheets.push(SheetEntry {
            name: name.to_string(),
            visibility: options.visibility,
        });
        self.state = State::WorksheetOpen(Box::new(WorksheetState::new(
            number,
            options.auto_filter,
        )));
        debug!(sheet = number, "worksheet started");
        Ok(())
    }

    async fn open_worksheet_entry(&mut self, number: u32, preamble: &str) -> Result<()> {
        self.archive
            .start_entry(&format!("xl/worksheets/sheet{}.xml", number))
            .await?;
        write_unit(&mut self.buffer, &mut self.archive, |b| {
            Ok(b.try_append(preamble.as_bytes()))
        })
        .await
    }

    /// Append a row to the open worksheet.
    pub async fn add_row<'c, C: RowCell<'c>>(&mut self, cells: &[C]) -> Result<()> {
        self.add_row_with_options(cells, None).await
    }

    /// Append a row with a height, default style or hidden flag.
    pub async fn add_row_with_options<'c, C: RowCell<'c>>(
        &mut self,
        cells: &[C],
        options: Option<RowOptions>,
    ) -> Result<()> {
        let mut sheet = self.take_worksheet()?;
        let result = self.write_data_row(&mut sheet, cells, options.as_ref()).await;
        self.settle(State::WorksheetOpen(sheet), result)
    }

    async fn write_data_row<'c, C: RowCell<'c>>(
        &mut self,
        sheet: &mut WorksheetState,
        cells: &[C],
        options: Option<&RowOptions>,
    ) -> Result<()> {
        let row = sheet.next_row;
        check_row(row, cells.len())?;
        if let Some(options) = options {
            options.validate()?;
        }
        for cell in cells {
            if let Some(text) = cell.to_cell().data.as_text() {
                check_text_length(text)?;
            }
        }

        match sheet.active_table.as_mut() {
            Some(table) if !table.has_header() => {
                let mut header: Vec<Cell<'c>> = cells.iter().map(RowCell::to_cell).collect();
                let names = table.header_names(&header)?;

                // Header cells must hold exactly the column names
                let skip = (table.first_column() - 1) as usize;
                if header.len() < skip + names.len() {
                    header.resize(skip + names.len(), Cell::default());
                }
                let header: Vec<Cell<'_>> = header
                    .into_iter()
                    .enumerate()
                    .map(|(i, cell)| match i.checked_sub(skip).and_then(|n| names.get(n)) {
                        Some(name) => Cell {
                            data: DataCell::from(name.as_str()),
                            style: cell.style,
                            formula: None,
                        },
                        None => cell,
                    })
                    .collect();
                self.write_row(row, options, header).await?;
                table.set_header(row, names);
            },
            Some(table) => {
                self.write_row(row, options, cells.iter().map(RowCell::to_cell))
                    .await?;
                table.record_row(row);
            },
            None => {
                self.write_row(row, options, cells.iter().map(RowCell::to_cell))
                    .await?
            },
        }

        sheet.next_row = row + 1;
        Ok(())
    }

    async fn write_row<'c, I>(
        &mut self,
        row: u32,
        options: Option<&RowOptions>,
        cells: I,
    ) -> Result<()>
    where
        I: IntoIterator<Item = Cell<'c>>,
    {
        let defaults = self.defaults;
        write_unit(&mut self.buffer, &mut self.archive, |b| {
            Ok(try_write_row_start(b, row, options))
        })
        .await?;
        for cell in cells {
            write_unit(&mut self.buffer, &mut self.archive, |b| {
                self.cells.try_write(&cell, &defaults, b)
            })
            .await
            .map_err(|err| inside_open_row(row, err))?;
        }
        write_unit(&mut self.buffer, &mut self.archive, |b| {
            Ok(try_write_row_end(b))
        })
        .await
        .map_err(|err| inside_open_row(row, err))
    }

    /// 1-based number of the row the next `add_row` writes.
    pub fn next_row_number(&self) -> Result<u32> {
        match &self.state {
            State::WorksheetOpen(sheet) => Ok(sheet.next_row),
            State::Open => Err(no_worksheet()),
            State::Failed => Err(Error::Poisoned),
        }
    }

    /// Merge the cells of `reference`, e.g. `"A1:C1"`.
    pub fn merge_cells(&mut self, reference: &str) -> Result<()> {
        let sheet = self.worksheet_mut()?;
        let range: CellRange = reference.parse()?;
        if range.first == range.last {
            return Err(Error::invalid_argument(format!(
                "Cannot merge the single cell {}",
                range
            )));
        }
        if let Some(existing) = sheet.merged_cells.iter().find(|m| m.overlaps(&range)) {
            return Err(Error::invalid_argument(format!(
                "Merged range {} overlaps {}",
                range, existing
            )));
        }
        sheet.merged_cells.push(range);
        Ok(())
    }

    /// Apply `validation` to the cells of `reference`. Several ranges may
    /// be given separated by spaces.
    pub fn add_data_validation(
        &mut self,
        reference: &str,
        validation: DataValidation,
    ) -> Result<()> {
        let sheet = self.worksheet_mut()?;
        if sheet.validation_count >= MAX_VALIDATIONS_PER_WORKSHEET {
            return Err(Error::invalid_operation(format!(
                "A worksheet cannot have more than {} data validations",
                MAX_VALIDATIONS_PER_WORKSHEET
            )));
        }
        let ranges = parse_sqref(reference)?;
        sheet.validations.push((ranges, validation));
        sheet.validation_count += 1;
        Ok(())
    }

    /// Start a table whose header is the next row written, beginning at
    /// 1-based `first_column`.
    pub fn start_table(&mut self, table: Table, first_column: u32) -> Result<()> {
        let sheet = self.worksheet_mut()?;
        if let Some(active) = &sheet.active_table {
            return Err(Error::invalid_operation(format!(
                "Table '{}' is still active",
                active.name()
            )));
        }
        // The header and at least one data row must fit
        if sheet.next_row >= MAX_ROWS {
            return Err(Error::invalid_operation(format!(
                "A table header on row {} leaves no room for a data row",
                sheet.next_row
            )));
        }
        if !(1..=MAX_COLUMNS).contains(&first_column) {
            return Err(Error::invalid_argument(format!(
                "Table column {} is outside 1..={}",
                first_column, MAX_COLUMNS
            )));
        }
        table.validate()?;

        let id = self.table_count + 1;
        let taken = &self.table_names;
        let name = match table.name() {
            Some(name) if taken.contains(&name.to_lowercase()) => {
                return Err(Error::invalid_argument(format!(
                    "A table named '{}' already exists",
                    name
                )));
            },
            Some(name) => name.to_string(),
            None => (id..)
                .map(|n| format!("Table{}", n))
                .find(|name| !taken.contains(&name.to_lowercase()))
                .unwrap_or_default(),
        };

        self.table_count = id;
        self.table_names.insert(name.to_lowercase());
        debug!(table = name.as_str(), id, "table started");
        self.worksheet_mut()?.active_table = Some(ActiveTable::new(table, id, name, first_column));
        Ok(())
    }

    /// Close the active table, writing its total row if it has one.
    #[instrument(skip(self))]
    pub async fn finish_table(&mut self) -> Result<()> {
        let mut sheet = self.take_worksheet()?;
        let result = self.close_table(&mut sheet).await;
        self.settle(State::WorksheetOpen(sheet), result)
    }

    async fn close_table(&mut self, sheet: &mut WorksheetState) -> Result<()> {
        let Some(table) = sheet.active_table.take() else {
            return Err(Error::invalid_operation("No table is active"));
        };
        let Some(header_row) = table.header_row() else {
            let err = Error::invalid_operation(format!(
                "Table '{}' needs a header row before it can be finished",
                table.name()
            ));
            sheet.active_table = Some(table);
            return Err(err);
        };

        // A total row never takes the place of the first data row
        let total_row = table.total_row().and_then(|cells| {
            let Some(cells) = cells else {
                return Ok(None);
            };
            let row = sheet.next_row.max(header_row + 2);
            check_row(row, cells.len())?;
            for cell in &cells {
                if let TotalRowCell::Label(label) = cell {
                    check_text_length(label)?;
                }
            }
            Ok(Some((row, cells)))
        });
        let checked = total_row.and_then(|total_row| {
            let ranges = table.ranges(total_row.as_ref().map(|(row, _)| *row))?;
            Ok((total_row, ranges))
        });
        let (total_row, ranges) = match checked {
            Ok(checked) => checked,
            Err(err) => {
                sheet.active_table = Some(table);
                return Err(err);
            },
        };

        if let Some((row, cells)) = &total_row {
            let written = self
                .write_row(*row, None, cells.iter().map(TotalRowCell::as_cell))
                .await;
            if let Err(err) = written {
                sheet.active_table = Some(table);
                return Err(err);
            }
            sheet.next_row = row + 1;
        }

        let finished = table.finish(ranges);
        debug!(table = finished.name.as_str(), range = %finished.range, "table finished");
        sheet.tables.push(finished);
        Ok(())
    }

    /// Store a PNG image in the document so worksheets can show it.
    ///
    /// Only allowed between worksheets, since the image becomes its own
    /// archive entry.
    #[instrument(skip(self, reader))]
    pub async fn embed_image<R: AsyncRead + Unpin>(&mut self, mut reader: R) -> Result<EmbeddedImage> {
        match self.state {
            State::Open => {},
            State::WorksheetOpen(_) => {
                return Err(Error::invalid_operation(
                    "Images must be embedded while no worksheet is open",
                ));
            },
            State::Failed => return Err(Error::Poisoned),
        }

        let mut data = Vec::new();
        reader.read_to_end(&mut data).await?;
        let (width, height) = png_dimensions(&data)?;
        let id = self.image_count + 1;

        self.state = State::Failed;
        let result = self
            .archive
            .write_entry(&format!("xl/media/image{}.png", id), &data, EntryMethod::Stored)
            .await;
        self.settle(State::Open, result)?;

        self.image_count = id;
        debug!(image = id, width, height, "image embedded");
        Ok(EmbeddedImage {
            id,
            width,
            height,
            document: self.document,
        })
    }

    /// Show an embedded image on the open worksheet.
    pub fn add_image(&mut self, canvas: ImageCanvas, image: &EmbeddedImage) -> Result<()> {
        let document = self.document;
        let sheet = self.worksheet_mut()?;
        if image.document != document {
            return Err(Error::invalid_argument(
                "Image was embedded in a different spreadsheet",
            ));
        }
        let anchor = canvas.resolve(image)?;
        sheet.drawing.add(anchor, image);
        Ok(())
    }

    /// Write the deferred sections and close the worksheet.
    ///
    /// An active table is finished first.
    #[instrument(skip(self))]
    pub async fn finish_worksheet(&mut self) -> Result<()> {
        let mut sheet = self.take_worksheet()?;
        let result = self.close_worksheet(&mut sheet).await;
        let restored = if result.is_ok() {
            State::Open
        } else {
            State::WorksheetOpen(sheet)
        };
        self.settle(restored, result)
    }

    async fn close_worksheet(&mut self, sheet: &mut WorksheetState) -> Result<()> {
        if sheet.active_table.is_some() {
            self.close_table(sheet).await?;
        }

        let mut rels = Relationships::new();
        let drawing = if sheet.drawing.is_empty() {
            None
        } else {
            let number = self.drawing_count + 1;
            let r_id = rels
                .add(rt::DRAWING, format!("../drawings/drawing{}.xml", number))
                .to_string();
            Some((number, r_id))
        };
        let table_rel_ids: Vec<String> = sheet
            .tables
            .iter()
            .map(|t| {
                rels.add(rt::TABLE, format!("../tables/table{}.xml", t.id))
                    .to_string()
            })
            .collect();

        let tail = WorksheetTail {
            auto_filter: sheet.auto_filter,
            merged_cells: &sheet.merged_cells,
            validations: &sheet.validations,
            drawing_rel_id: drawing.as_ref().map(|(_, r_id)| r_id.as_str()),
            table_rel_ids: &table_rel_ids,
        }
        .to_xml();

        write_unit(&mut self.buffer, &mut self.archive, |b| {
            Ok(b.try_append(tail.as_bytes()))
        })
        .await?;
        self.buffer.flush(&mut self.archive).await?;
        let summary = self.archive.finish_entry().await?;
        debug!(
            sheet = sheet.number,
            rows = sheet.next_row - 1,
            bytes = summary.uncompressed_size,
            "worksheet finished"
        );

        if !rels.is_empty() {
            let name = format!("xl/worksheets/_rels/sheet{}.xml.rels", sheet.number);
            self.write_part(&name, &rels.to_xml()).await?;
        }
        if let Some((number, _)) = drawing {
            self.write_part(
                &format!("xl/drawings/drawing{}.xml", number),
                &sheet.drawing.to_xml(),
            )
            .await?;
            self.write_part(
                &format!("xl/drawings/_rels/drawing{}.xml.rels", number),
                &sheet.drawing.rels_xml(),
            )
            .await?;
            self.drawing_count = number;
        }
        for table in &sheet.tables {
            self.write_part(&format!("xl/tables/table{}.xml", table.id), &table.to_xml())
                .await?;
            self.table_parts.push(table.id);
        }
        Ok(())
    }

    async fn write_part(&mut self, name: &str, xml: &str) -> Result<()> {
        self.archive
            .write_entry(name, xml.as_bytes(), EntryMethod::Deflated)
            .await
            .map(|_| ())
    }

    /// Write the styles and workbook parts, close the archive and return
    /// the destination.
    #[instrument(skip(self))]
    pub async fn finish(self) -> Result<W> {
        match self.state {
            State::Open => {},
            State::WorksheetOpen(_) => {
                return Err(Error::invalid_operation(
                    "Finish the current worksheet before finishing the spreadsheet",
                ));
            },
            State::Failed => return Err(Error::Poisoned),
        }
        if self.sheets.is_empty() {
            return Err(Error::invalid_operation(
                "A spreadsheet needs at least one worksheet",
            ));
        }
        if self
            .sheets
            .iter()
            .all(|s| s.visibility == WorksheetVisibility::Hidden)
        {
            return Err(Error::invalid_operation(
                "A spreadsheet needs at least one visible worksheet",
            ));
        }

        let result = self.write_document_parts().await;
        if let Err(err) = &result {
            warn!(error = %err, "spreadsheet could not be finished");
        }
        result
    }

    async fn write_document_parts(mut self) -> Result<W> {
        let table_parts = std::mem::take(&mut self.table_parts);
        let counts = PartCounts {
            worksheets: self.sheets.len() as u32,
            tables: &table_parts,
            drawings: self.drawing_count,
            images: self.image_count,
        };
        let parts = [
            ("xl/styles.xml", self.styles.to_xml()),
            ("xl/workbook.xml", workbook_xml(&self.sheets)),
            ("xl/_rels/workbook.xml.rels", workbook_rels(counts.worksheets)),
            ("docProps/app.xml", app_xml(&self.properties, &self.sheets)),
            ("docProps/core.xml", core_xml(&self.properties, self.created)),
            ("_rels/.rels", package_rels()),
            ("[Content_Types].xml", content_types(counts)),
        ];
        for (name, xml) in &parts {
            self.write_part(name, xml).await?;
        }

        debug!(
            worksheets = counts.worksheets,
            styles = self.styles.len(),
            "spreadsheet finished"
        );
        self.archive.finish().await
    }

    fn worksheet_mut(&mut self) -> Result<&mut WorksheetState> {
        match &mut self.state {
            State::WorksheetOpen(sheet) => Ok(sheet),
            State::Open => Err(no_worksheet()),
            State::Failed => Err(Error::Poisoned),
        }
    }

    /// Move the open worksheet out, leaving the document failed until it is
    /// put back. A dropped future therefore poisons the document.
    fn take_worksheet(&mut self) -> Result<Box<WorksheetState>> {
        match std::mem::replace(&mut self.state, State::Failed) {
            State::WorksheetOpen(sheet) => Ok(sheet),
            State::Open => {
                self.state = State::Open;
                Err(no_worksheet())
            },
            State::Failed => Err(Error::Poisoned),
        }
    }

    /// Restore `state` unless `result` failed the document.
    fn settle<T>(&mut self, state: State, result: Result<T>) -> Result<T> {
        match result {
            Err(err) if err.is_fatal() => {
                warn!(error = %err, "spreadsheet failed, further writes are rejected");
                Err(err)
            },
            other => {
                self.state = state;
                other
            },
        }
    }
}

/// A failure after `<row>` went out leaves the sheet XML unbalanced, so
/// every error there fails the document.
fn inside_open_row(row: u32, err: Error) -> Error {
    if err.is_fatal() {
        return err;
    }
    warn!(row, error = %err, "row could not be completed");
    Error::Poisoned
}

/// Write one unit, making room for it if the buffer is too full.
///
/// A unit larger than the whole buffer grows the buffer instead of being
/// split. A flush happens only when the grown buffer still lacks room.
async fn write_unit<W, F>(
    buffer: &mut SpreadsheetBuffer,
    archive: &mut ArchiveWriter<W>,
    mut write: F,
) -> Result<()>
where
    W: AsyncWrite + Unpin,
    F: FnMut(&mut SpreadsheetBuffer) -> Result<WriteOutcome>,
{
    let WriteOutcome::InsufficientSpace { required } = write(buffer)? else {
        return Ok(());
    };

    buffer.grow(required);
    if buffer.remaining() < required {
        buffer.flush(archive).await?;
    }

    match write(buffer)? {
        WriteOutcome::Written => Ok(()),
        WriteOutcome::InsufficientSpace { required } => Err(Error::invalid_operation(format!(
            "A {} byte unit does not fit the output buffer",
            required
        ))),
    }
}

fn check_row(row: u32, cell_count: usize) -> Result<()> {
    if row > MAX_ROWS {
        return Err(Error::invalid_operation(format!(
            "Worksheet is full ({} rows)",
            MAX_ROWS
        )));
    }
    if cell_count > MAX_COLUMNS as usize {
        return Err(Error::invalid_operation(format!(
            "Row has {} cells, more than {} columns",
            cell_count, MAX_COLUMNS
        )));
    }
    Ok(())
}

fn no_worksheet() -> Error {
    Error::invalid_operation("No worksheet is open")
}

/// Check the shape of a worksheet name. Uniqueness is checked by the
/// spreadsheet.
pub fn validate_worksheet_name(name: &str) -> Result<()> {
    let invalid = |reason: &str| {
        Err(Error::invalid_argument(format!(
            "Invalid worksheet name '{}': {}",
            name, reason
        )))
    };

    let length = name.chars().count();
    if length == 0 {
        return invalid("name is empty");
    }
    if length > MAX_WORKSHEET_NAME_LENGTH {
        return invalid("name is longer than 31 characters");
    }
    if let Some(c) = name.chars().find(|c| INVALID_WORKSHEET_NAME_CHARS.contains(c)) {
        return invalid(&format!("'{}' is not allowed", c));
    }
    if name.starts_with('\'') || name.ends_with('\'') {
        return invalid("name cannot start or end with an apostrophe");
    }
    if name.eq_ignore_ascii_case("history") {
        return invalid("'History' is reserved");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ooxml::xlsx::format::{NumberFormat, StandardNumberFormat};
    use crate::ooxml::xlsx::image::tests::png_bytes;
    use crate::ooxml::xlsx::table::{TableStyle, TotalRowFunction};
    use crate::ooxml::xlsx::validation::ValidationCondition;
    use std::io::{Cursor, Read};
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use std::time::Duration;

    fn spreadsheet() -> Spreadsheet<Vec<u8>> {
        Spreadsheet::create(Vec::new(), SpreadsheetOptions::default()).unwrap()
    }

    fn read_part(bytes: &[u8], name: &str) -> String {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut file = archive.by_name(name).unwrap();
        let mut text = String::new();
        file.read_to_string(&mut text).unwrap();
        text
    }

    /// Accepts a few bytes, then fails or stalls.
    struct BrokenSink {
        accept: usize,
        stall: bool,
    }

    impl AsyncWrite for BrokenSink {
        fn poll_write(
            mut self: Pin<&mut Self>,
            _: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<std::io::Result<usize>> {
            if self.accept >= buf.len() {
                self.accept -= buf.len();
                return Poll::Ready(Ok(buf.len()));
            }
            if self.stall {
                Poll::Pending
            } else {
                Poll::Ready(Err(std::io::Error::other("disk full")))
            }
        }

        fn poll_flush(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    #[test]
    fn test_worksheet_names() {
        for name in ["Sheet1", "Q1 'draft'x", "Données", "x".repeat(31).as_str()] {
            assert!(validate_worksheet_name(name).is_ok(), "{name}");
        }
        for name in ["", "a/b", "a:b", "[x]", "'quoted", "end'", "HISTORY", "x".repeat(32).as_str()] {
            assert!(validate_worksheet_name(name).is_err(), "{name}");
        }
    }

    #[tokio::test]
    async fn test_operations_need_an_open_worksheet() {
        let mut spreadsheet = spreadsheet();
        let err = spreadsheet.add_row(&[Cell::new(1)]).await.unwrap_err();
        assert!(matches!(err, Error::InvalidOperation(_)));
        assert!(spreadsheet.merge_cells("A1:B1").is_err());
        assert!(spreadsheet.next_row_number().is_err());
        assert!(spreadsheet.finish_worksheet().await.is_err());

        // Still usable afterwards
        spreadsheet
            .start_worksheet("Data", WorksheetOptions::default())
            .await
            .unwrap();
        assert_eq!(spreadsheet.next_row_number().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_one_worksheet_at_a_time() {
        let mut spreadsheet = spreadsheet();
        spreadsheet
            .start_worksheet("One", WorksheetOptions::default())
            .await
            .unwrap();
        let err = spreadsheet
            .start_worksheet("Two", WorksheetOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidOperation(_)));

        spreadsheet.finish_worksheet().await.unwrap();
        let duplicate = spreadsheet
            .start_worksheet("ONE", WorksheetOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(duplicate, Error::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_finish_without_worksheets() {
        let err = spreadsheet().finish().await.unwrap_err();
        assert!(matches!(err, Error::InvalidOperation(_)));
    }

    #[tokio::test]
    async fn test_rows_are_written_in_order() {
        let mut spreadsheet = spreadsheet();
        spreadsheet
            .start_worksheet("Data", WorksheetOptions::default())
            .await
            .unwrap();
        spreadsheet.add_row(&[Cell::new("a"), Cell::new(1)]).await.unwrap();
        spreadsheet
            .add_row_with_options(&[DataCell::from(2.5)], Some(RowOptions::new().with_height(30.0)))
            .await
            .unwrap();
        assert_eq!(spreadsheet.next_row_number().unwrap(), 3);
        spreadsheet.finish_worksheet().await.unwrap();

        let bytes = spreadsheet.finish().await.unwrap();
        let sheet = read_part(&bytes, "xl/worksheets/sheet1.xml");
        assert!(sheet.contains(
            r#"<sheetData><row r="1"><c t="inlineStr"><is><t>a</t></is></c><c><v>1</v></c></row><row r="2" ht="30" customHeight="1"><c><v>2.5</v></c></row></sheetData>"#
        ));
    }

    #[tokio::test]
    async fn test_oversized_string_grows_buffer_once() {
        let options = SpreadsheetOptions::default().with_buffer_size(1024);
        let mut spreadsheet = Spreadsheet::create(Vec::new(), options).unwrap();
        spreadsheet
            .start_worksheet("Big", WorksheetOptions::default())
            .await
            .unwrap();

        let text = "<&>".repeat(1000);
        spreadsheet.add_row(&[Cell::new(text.as_str())]).await.unwrap();
        assert_eq!(spreadsheet.buffer.growth_count(), 1);
        assert_eq!(spreadsheet.buffer.flush_count(), 0);
        assert!(spreadsheet.buffer.capacity() >= 12_000);

        spreadsheet.finish_worksheet().await.unwrap();
        let bytes = spreadsheet.finish().await.unwrap();
        let sheet = read_part(&bytes, "xl/worksheets/sheet1.xml");
        assert_eq!(sheet.matches("&lt;&amp;&gt;").count(), 1000);
    }

    #[tokio::test]
    async fn test_many_rows_flush_through_small_buffer() {
        let options = SpreadsheetOptions::default().with_buffer_size(512);
        let mut spreadsheet = Spreadsheet::create(Vec::new(), options).unwrap();
        spreadsheet
            .start_worksheet("Rows", WorksheetOptions::default())
            .await
            .unwrap();
        for n in 0..2000 {
            spreadsheet
                .add_row(&[Cell::new(n), Cell::new("row")])
                .await
                .unwrap();
        }
        assert!(spreadsheet.buffer.flush_count() > 10);
        assert_eq!(spreadsheet.buffer.growth_count(), 0);
        spreadsheet.finish_worksheet().await.unwrap();

        let bytes = spreadsheet.finish().await.unwrap();
        let sheet = read_part(&bytes, "xl/worksheets/sheet1.xml");
        assert_eq!(sheet.matches("<row ").count(), 2000);
        assert!(sheet.contains(r#"<row r="2000"><c><v>1999</v></c>"#));
    }

    #[tokio::test]
    async fn test_rejected_row_leaves_worksheet_open() {
        let mut spreadsheet = spreadsheet();
        spreadsheet
            .start_worksheet("Data", WorksheetOptions::default())
            .await
            .unwrap();
        let long = "x".repeat(40_000);
        let err = spreadsheet
            .add_row(&[Cell::new(1), Cell::new(long.as_str())])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
        assert_eq!(spreadsheet.next_row_number().unwrap(), 1);
        assert!(spreadsheet.buffer.as_bytes().ends_with(b"<sheetData>"));
    }

    #[tokio::test]
    async fn test_failed_cell_inside_open_row_poisons_document() {
        let mut spreadsheet = spreadsheet();
        spreadsheet
            .start_worksheet("Data", WorksheetOptions::default())
            .await
            .unwrap();
        let long = "x".repeat(40_000);
        let err = spreadsheet
            .write_row(1, None, [Cell::new(1), Cell::new(long.as_str())])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Poisoned));
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_io_failure_poisons_document() {
        let sink = BrokenSink {
            accept: 0,
            stall: false,
        };
        let mut spreadsheet = Spreadsheet::create(sink, SpreadsheetOptions::default()).unwrap();
        let err = spreadsheet
            .start_worksheet("Data", WorksheetOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Io(_)));

        let err = spreadsheet
            .start_worksheet("Other", WorksheetOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Poisoned));
        assert!(matches!(
            spreadsheet.add_style(&CellFormat::new()),
            Err(Error::Poisoned)
        ));
    }

    #[tokio::test]
    async fn test_cancelled_flush_poisons_document() {
        let sink = BrokenSink {
            accept: 4096,
            stall: true,
        };
        let options = SpreadsheetOptions::default()
            .with_buffer_size(512)
            .with_compression(crate::ooxml::xlsx::options::CompressionLevel::Fastest);
        let mut spreadsheet = Spreadsheet::create(sink, options).unwrap();
        spreadsheet
            .start_worksheet("Data", WorksheetOptions::default())
            .await
            .unwrap();

        // Poorly compressible rows force the encoder to hand bytes to the sink
        let cancelled = tokio::time::timeout(Duration::from_millis(50), async {
            let mut seed = 0x2545_f491_u64;
            loop {
                seed ^= seed << 13;
                seed ^= seed >> 7;
                seed ^= seed << 17;
                let text = format!("{seed:x}{:x}", seed.rotate_left(29));
                if spreadsheet.add_row(&[Cell::new(text.as_str())]).await.is_err() {
                    break;
                }
            }
        })
        .await;
        assert!(cancelled.is_err());

        let err = spreadsheet.add_row(&[Cell::new(1)]).await.unwrap_err();
        assert!(matches!(err, Error::Poisoned));
        assert!(matches!(spreadsheet.finish().await, Err(Error::Poisoned)));
    }

    #[tokio::test]
    async fn test_date_cells_use_default_style() {
        let mut spreadsheet = spreadsheet();
        let defaults = spreadsheet.default_styling();
        let date_style = defaults.date_time.unwrap();
        let explicit = spreadsheet
            .add_style(&CellFormat::new().with_number_format(NumberFormat::Standard(
                StandardNumberFormat::ShortDate,
            )))
            .unwrap();

        spreadsheet
            .start_worksheet("Dates", WorksheetOptions::default())
            .await
            .unwrap();
        let date = chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        spreadsheet
            .add_row(&[Cell::new(date), Cell::new(date).with_style(explicit)])
            .await
            .unwrap();
        spreadsheet.finish_worksheet().await.unwrap();

        let bytes = spreadsheet.finish().await.unwrap();
        let sheet = read_part(&bytes, "xl/worksheets/sheet1.xml");
        assert!(sheet.contains(&format!(
            r#"<c s="{}"><v>45292</v></c><c s="{}"><v>45292</v></c>"#,
            date_style.index(),
            explicit.index()
        )));
    }

    #[tokio::test]
    async fn test_table_header_and_total_row() {
        let mut spreadsheet = spreadsheet();
        spreadsheet
            .start_worksheet("Sales", WorksheetOptions::default())
            .await
            .unwrap();

        let table = Table::new(TableStyle::Medium(9))
            .with_name("Sales")
            .unwrap()
            .with_total_row_label(1, "Total")
            .with_total_row_function(2, TotalRowFunction::Sum);
        spreadsheet.start_table(table, 1).unwrap();
        assert!(
            spreadsheet
                .start_table(Table::default(), 1)
                .is_err()
        );

        spreadsheet
            .add_row(&[Cell::new("Item"), Cell::new(2024)])
            .await
            .unwrap();
        spreadsheet.add_row(&[Cell::new("a"), Cell::new(1)]).await.unwrap();
        spreadsheet.add_row(&[Cell::new("b"), Cell::new(2)]).await.unwrap();
        spreadsheet.finish_table().await.unwrap();
        assert_eq!(spreadsheet.next_row_number().unwrap(), 5);
        spreadsheet.finish_worksheet().await.unwrap();

        let bytes = spreadsheet.finish().await.unwrap();
        let sheet = read_part(&bytes, "xl/worksheets/sheet1.xml");
        assert!(sheet.contains(
            r#"<row r="1"><c t="inlineStr"><is><t>Item</t></is></c><c t="inlineStr"><is><t>Column2</t></is></c></row>"#
        ));
        assert!(sheet.contains(
            r#"<row r="4"><c t="inlineStr"><is><t>Total</t></is></c><c><f>SUBTOTAL(109,Sales[Column2])</f></c></row>"#
        ));
        assert!(sheet.contains(r#"<tableParts count="1"><tablePart r:id="rId1"/></tableParts>"#));

        let table = read_part(&bytes, "xl/tables/table1.xml");
        assert!(table.contains(r#"ref="A1:B4" totalsRowCount="1""#));
        let rels = read_part(&bytes, "xl/worksheets/_rels/sheet1.xml.rels");
        assert!(rels.contains(r#"Target="../tables/table1.xml""#));
    }

    #[tokio::test]
    async fn test_table_names_are_unique_per_workbook() {
        let mut spreadsheet = spreadsheet();
        spreadsheet
            .start_worksheet("A", WorksheetOptions::default())
            .await
            .unwrap();
        spreadsheet
            .start_table(Table::default().with_name("Table2").unwrap(), 1)
            .unwrap();
        spreadsheet.add_row(&[Cell::new("x")]).await.unwrap();
        spreadsheet.finish_table().await.unwrap();

        // The default name skips the taken one
        spreadsheet.start_table(Table::default(), 1).unwrap();
        spreadsheet.add_row(&[Cell::new("y")]).await.unwrap();
        spreadsheet.finish_worksheet().await.unwrap();

        spreadsheet
            .start_worksheet("B", WorksheetOptions::default())
            .await
            .unwrap();
        let err = spreadsheet
            .start_table(Table::default().with_name("TABLE2").unwrap(), 1)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
        spreadsheet.finish_worksheet().await.unwrap();

        let bytes = spreadsheet.finish().await.unwrap();
        let second = read_part(&bytes, "xl/tables/table2.xml");
        assert!(second.contains(r#"name="Table3""#));
    }

    #[tokio::test]
    async fn test_long_total_row_label_is_rejected_up_front() {
        let mut spreadsheet = spreadsheet();
        spreadsheet
            .start_worksheet("A", WorksheetOptions::default())
            .await
            .unwrap();
        let table = Table::new(TableStyle::Medium(2)).with_total_row_label(1, "x".repeat(40_000));
        let err = spreadsheet.start_table(table, 1).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));

        spreadsheet.add_row(&[Cell::new("H")]).await.unwrap();
        spreadsheet.add_row(&[Cell::new(2)]).await.unwrap();
        spreadsheet.finish_worksheet().await.unwrap();

        let bytes = spreadsheet.finish().await.unwrap();
        let sheet = read_part(&bytes, "xl/worksheets/sheet1.xml");
        assert!(sheet.contains(r#"<row r="1"><c t="inlineStr"><is><t>H</t></is></c></row><row r="2">"#));
        assert_eq!(sheet.matches("<row ").count(), 2);
        assert!(!sheet.contains("tableParts"));
        let types = read_part(&bytes, "[Content_Types].xml");
        assert!(!types.contains("/xl/tables/"));
    }

    #[tokio::test]
    async fn test_table_needs_room_for_a_data_row() {
        let mut spreadsheet = spreadsheet();
        spreadsheet
            .start_worksheet("A", WorksheetOptions::default())
            .await
            .unwrap();
        spreadsheet.worksheet_mut().unwrap().next_row = MAX_ROWS;
        let err = spreadsheet.start_table(Table::default(), 1).unwrap_err();
        assert!(matches!(err, Error::InvalidOperation(_)));
        spreadsheet.add_row(&[Cell::new("H")]).await.unwrap();
        spreadsheet.finish_worksheet().await.unwrap();

        spreadsheet
            .start_worksheet("B", WorksheetOptions::default())
            .await
            .unwrap();
        spreadsheet.worksheet_mut().unwrap().next_row = MAX_ROWS - 1;
        spreadsheet.start_table(Table::default(), 1).unwrap();
        spreadsheet.add_row(&[Cell::new("H")]).await.unwrap();
        spreadsheet.finish_worksheet().await.unwrap();

        let bytes = spreadsheet.finish().await.unwrap();
        let table = read_part(&bytes, "xl/tables/table1.xml");
        assert!(table.contains(r#"ref="A1048575:A1048576""#));
        let types = read_part(&bytes, "[Content_Types].xml");
        assert_eq!(types.matches("/xl/tables/table").count(), 1);
    }

    #[tokio::test]
    async fn test_table_without_header_cannot_finish() {
        let mut spreadsheet = spreadsheet();
        spreadsheet
            .start_worksheet("A", WorksheetOptions::default())
            .await
            .unwrap();
        spreadsheet.start_table(Table::default(), 1).unwrap();
        let err = spreadsheet.finish_worksheet().await.unwrap_err();
        assert!(matches!(err, Error::InvalidOperation(_)));

        spreadsheet.add_row(&[Cell::new("Header")]).await.unwrap();
        spreadsheet.finish_worksheet().await.unwrap();
    }

    #[tokio::test]
    async fn test_images() {
        let mut spreadsheet = spreadsheet();
        let image = spreadsheet
            .embed_image(Cursor::new(png_bytes(120, 80)))
            .await
            .unwrap();
        assert_eq!((image.id(), image.width(), image.height()), (1, 120, 80));
        assert!(spreadsheet.embed_image(Cursor::new(b"not a png".to_vec())).await.is_err());

        spreadsheet
            .start_worksheet("Pictures", WorksheetOptions::default())
            .await
            .unwrap();
        let anchor: crate::common::reference::CellRef = "B2".parse().unwrap();
        spreadsheet
            .add_image(ImageCanvas::scaled(anchor, 0.5), &image)
            .unwrap();
        assert!(
            spreadsheet
                .embed_image(Cursor::new(png_bytes(1, 1)))
                .await
                .is_err()
        );

        let mut other = Spreadsheet::create(Vec::new(), SpreadsheetOptions::default()).unwrap();
        let foreign = other.embed_image(Cursor::new(png_bytes(1, 1))).await.unwrap();
        assert!(spreadsheet.add_image(ImageCanvas::original_size(anchor), &foreign).is_err());

        spreadsheet.finish_worksheet().await.unwrap();
        let bytes = spreadsheet.finish().await.unwrap();

        assert_eq!(read_part_bytes(&bytes, "xl/media/image1.png"), png_bytes(120, 80));
        let drawing = read_part(&bytes, "xl/drawings/drawing1.xml");
        assert!(drawing.contains(r#"<xdr:ext cx="571500" cy="381000"/>"#));
        let sheet = read_part(&bytes, "xl/worksheets/sheet1.xml");
        assert!(sheet.contains(r#"<drawing r:id="rId1"/>"#));
        let types = read_part(&bytes, "[Content_Types].xml");
        assert!(types.contains(r#"<Default Extension="png" ContentType="image/png"/>"#));
    }

    fn read_part_bytes(bytes: &[u8], name: &str) -> Vec<u8> {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut file = archive.by_name(name).unwrap();
        let mut data = Vec::new();
        file.read_to_end(&mut data).unwrap();
        data
    }

    #[tokio::test]
    async fn test_merges_and_validations() {
        let mut spreadsheet = spreadsheet();
        spreadsheet
            .start_worksheet("Form", WorksheetOptions::default())
            .await
            .unwrap();
        spreadsheet.merge_cells("A1:C1").unwrap();
        assert!(spreadsheet.merge_cells("B1:B4").is_err());
        assert!(spreadsheet.merge_cells("D4").is_err());
        assert!(spreadsheet.merge_cells("not a range").is_err());

        let rule = DataValidation::whole(ValidationCondition::Between(1, 10)).unwrap();
        spreadsheet.add_data_validation("B2:B9 D2", rule).unwrap();
        spreadsheet.finish_worksheet().await.unwrap();

        let bytes = spreadsheet.finish().await.unwrap();
        let sheet = read_part(&bytes, "xl/worksheets/sheet1.xml");
        assert!(sheet.contains(r#"<mergeCells count="1"><mergeCell ref="A1:C1"/></mergeCells>"#));
        assert!(sheet.contains(r#"sqref="B2:B9 D2""#));
    }

    #[tokio::test]
    async fn test_hidden_worksheets() {
        let mut spreadsheet = spreadsheet();
        let hidden = WorksheetOptions::default().with_visibility(WorksheetVisibility::Hidden);
        spreadsheet.start_worksheet("Lookup", hidden.clone()).await.unwrap();
        spreadsheet.finish_worksheet().await.unwrap();
        spreadsheet.start_worksheet("Main", WorksheetOptions::default()).await.unwrap();
        spreadsheet.finish_worksheet().await.unwrap();

        let bytes = spreadsheet.finish().await.unwrap();
        let first = read_part(&bytes, "xl/worksheets/sheet1.xml");
        let second = read_part(&bytes, "xl/worksheets/sheet2.xml");
        assert!(!first.contains("tabSelected"));
        assert!(second.contains(r#"tabSelected="1""#));

        let mut only_hidden = self::spreadsheet();
        only_hidden.start_worksheet("Lookup", hidden).await.unwrap();
        only_hidden.finish_worksheet().await.unwrap();
        assert!(matches!(only_hidden.finish().await, Err(Error::InvalidOperation(_))));
    }
}
