//! # Receipts
//!
//! PDF rendering and on-disk storage of receipt artifacts.
//!
//! ```text
//! SaleDetail ──► ReceiptDocument (tally-core) ──► render_pdf ──► bytes
//!                                                                 │
//!                 RECEIPTS_DIR/receipt_<sale_id>.pdf ◄── ReceiptStore::save
//!                        │                                (temp + rename)
//!                        ▼
//!           GET /api/receipts/pdf/{sale_id}  (bytes served unchanged)
//! ```

use std::io;
use std::path::PathBuf;

use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfLayerReference};
use tracing::{debug, warn};
use uuid::Uuid;

use tally_core::receipt::truncate;
use tally_core::validation::validate_uuid;
use tally_core::ReceiptDocument;

use crate::error::{ApiError, ApiResult};

const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const MARGIN_X: f32 = 20.0;
const TOP: f32 = 277.0;
const BOTTOM: f32 = 25.0;
const LINE_HEIGHT: f32 = 7.0;

const COL_QTY: f32 = 115.0;
const COL_UNIT: f32 = 135.0;
const COL_TOTAL: f32 = 165.0;

/// Renders a receipt as an A4 PDF, paginating long item lists.
pub fn render_pdf(doc: &ReceiptDocument) -> ApiResult<Vec<u8>> {
    let (pdf, page, layer) =
        PdfDocument::new(doc.title.as_str(), Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
    let regular = pdf
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|e| ApiError::internal(format!("PDF font: {e}")))?;
    let bold = pdf
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(|e| ApiError::internal(format!("PDF font: {e}")))?;

    let mut canvas = pdf.get_page(page).get_layer(layer);
    let mut y = TOP;

    canvas.use_text(doc.title.as_str(), 18.0, Mm(MARGIN_X), Mm(y), &bold);
    y -= LINE_HEIGHT * 2.0;

    for line in doc.header_lines() {
        canvas.use_text(line, 10.0, Mm(MARGIN_X), Mm(y), &regular);
        y -= LINE_HEIGHT;
    }
    y -= LINE_HEIGHT;

    table_header(&canvas, &bold, y);
    y -= LINE_HEIGHT;

    for row in &doc.rows {
        if y < BOTTOM {
            let (next_page, next_layer) =
                pdf.add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
            canvas = pdf.get_page(next_page).get_layer(next_layer);
            y = TOP;
            table_header(&canvas, &bold, y);
            y -= LINE_HEIGHT;
        }

        canvas.use_text(truncate(&row.name, 48), 10.0, Mm(MARGIN_X), Mm(y), &regular);
        canvas.use_text(row.quantity.to_string(), 10.0, Mm(COL_QTY), Mm(y), &regular);
        canvas.use_text(row.unit_price.as_str(), 10.0, Mm(COL_UNIT), Mm(y), &regular);
        canvas.use_text(row.line_total.as_str(), 10.0, Mm(COL_TOTAL), Mm(y), &regular);
        y -= LINE_HEIGHT;
    }

    if y < BOTTOM {
        let (next_page, next_layer) = pdf.add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
        canvas = pdf.get_page(next_page).get_layer(next_layer);
        y = TOP;
    }
    y -= LINE_HEIGHT / 2.0;
    canvas.use_text("Total", 12.0, Mm(COL_UNIT), Mm(y), &bold);
    canvas.use_text(doc.total.as_str(), 12.0, Mm(COL_TOTAL), Mm(y), &bold);

    pdf.save_to_bytes()
        .map_err(|e| ApiError::internal(format!("PDF encoding: {e}")))
}

fn table_header(canvas: &PdfLayerReference, font: &IndirectFontRef, y: f32) {
    canvas.use_text("Item", 10.0, Mm(MARGIN_X), Mm(y), font);
    canvas.use_text("Qty", 10.0, Mm(COL_QTY), Mm(y), font);
    canvas.use_text("Unit", 10.0, Mm(COL_UNIT), Mm(y), font);
    canvas.use_text("Total", 10.0, Mm(COL_TOTAL), Mm(y), font);
}

/// Receipt files under one directory, one per sale.
#[derive(Debug, Clone)]
pub struct ReceiptStore {
    dir: PathBuf,
}

impl ReceiptStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        ReceiptStore { dir: dir.into() }
    }

    /// File name for a sale. Rejects anything that is not a UUID.
    pub fn file_name(sale_id: &str) -> ApiResult<String> {
        validate_uuid(sale_id)?;
        Ok(format!("receipt_{sale_id}.pdf"))
    }

    fn path_for(&self, sale_id: &str) -> ApiResult<PathBuf> {
        Ok(self.dir.join(Self::file_name(sale_id)?))
    }

    /// Writes the artifact atomically, replacing any earlier one.
    pub async fn save(&self, sale_id: &str, bytes: &[u8]) -> ApiResult<PathBuf> {
        let path = self.path_for(sale_id)?;
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| ApiError::internal(format!("Receipts directory: {e}")))?;

        let tmp = self.dir.join(format!(".{}.tmp", Uuid::new_v4().simple()));
        let written = async {
            tokio::fs::write(&tmp, bytes).await?;
            tokio::fs::rename(&tmp, &path).await
        }
        .await;

        if let Err(e) = written {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(ApiError::internal(format!("Writing receipt: {e}")));
        }

        debug!(sale_id = %sale_id, bytes = bytes.len(), "Receipt stored");
        Ok(path)
    }

    /// Stored bytes, or `None` when no artifact exists.
    pub async fn load(&self, sale_id: &str) -> ApiResult<Option<Vec<u8>>> {
        let path = self.path_for(sale_id)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ApiError::internal(format!("Reading receipt: {e}"))),
        }
    }

    pub async fn exists(&self, sale_id: &str) -> bool {
        match self.path_for(sale_id) {
            Ok(path) => tokio::fs::try_exists(path).await.unwrap_or(false),
            Err(_) => false,
        }
    }

    /// Best-effort removal. A missing file is not an error.
    pub async fn remove(&self, sale_id: &str) {
        let Ok(path) = self.path_for(sale_id) else {
            return;
        };
        match tokio::fs::remove_file(&path).await {
            Ok(()) => debug!(sale_id = %sale_id, "Receipt removed"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(sale_id = %sale_id, error = %e, "Failed to remove receipt"),
        }
    }
}
