//! Output renderer: rows and charts to downloadable artifacts.
//!
//! Encoding is a pure function of rows, charts, and format ([`encode`]);
//! [`OutputRenderer`] adds naming, checksumming, and the store write.

use indexmap::IndexMap;
use prism_core::ExecutionId;
use prism_core::record::{Record, Value, to_plain_string};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::builder::columns_of;
use crate::chart::ChartPayload;
use crate::error::RenderResult;
use crate::format::OutputFormat;
use crate::store::ArtifactStore;

/// A rendered file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    /// Format it was rendered as
    pub format: OutputFormat,
    /// `report_<execution id>.<ext>`
    pub filename: String,
    /// Location returned by the store
    pub path: String,
    /// Size in bytes
    pub size_bytes: u64,
    /// blake3 of the bytes, hex encoded
    pub checksum: String,
}

/// Deterministic artifact name, `None` for unsupported formats
#[must_use]
pub fn artifact_filename(execution_id: &ExecutionId, format: &OutputFormat) -> Option<String> {
    format
        .extension()
        .map(|ext| format!("report_{}.{}", execution_id, ext))
}

/// Encode rows and charts in `format`; `None` for unsupported formats
///
/// # Errors
///
/// Returns error if JSON encoding fails
pub fn encode(
    rows: &[Record],
    charts: &IndexMap<String, ChartPayload>,
    format: &OutputFormat,
    execution_id: &ExecutionId,
) -> RenderResult<Option<Vec<u8>>> {
    let bytes = match format {
        OutputFormat::Csv => encode_csv(rows).into_bytes(),
        OutputFormat::Json => serde_json::to_vec_pretty(rows)?,
        OutputFormat::Excel => encode_workbook(rows, charts)?.into_bytes(),
        OutputFormat::Pdf => encode_placeholder_pdf(execution_id, rows.len(), charts.len()),
        OutputFormat::Unsupported(_) => return Ok(None),
    };
    Ok(Some(bytes))
}

/// Renders artifacts into an [`ArtifactStore`]
#[derive(Clone)]
pub struct OutputRenderer {
    store: Arc<dyn ArtifactStore>,
}

impl OutputRenderer {
    /// Create a renderer writing to `store`
    #[must_use]
    pub fn new(store: Arc<dyn ArtifactStore>) -> Self {
        Self { store }
    }

    /// The underlying store
    #[must_use]
    pub fn store(&self) -> &Arc<dyn ArtifactStore> {
        &self.store
    }

    /// Render one format
    ///
    /// Unsupported formats are skipped: no artifact and no error.
    ///
    /// # Errors
    ///
    /// Returns error if encoding or the store write fails
    pub async fn render(
        &self,
        rows: &[Record],
        charts: &IndexMap<String, ChartPayload>,
        format: &OutputFormat,
        execution_id: &ExecutionId,
    ) -> RenderResult<Option<Artifact>> {
        let (Some(filename), Some(bytes)) = (
            artifact_filename(execution_id, format),
            encode(rows, charts, format, execution_id)?,
        ) else {
            warn!(%format, %execution_id, "skipping unsupported output format");
            return Ok(None);
        };

        let size_bytes = bytes.len() as u64;
        let checksum = blake3::hash(&bytes).to_hex().to_string();
        let path = self.store.put(&filename, bytes).await?;

        debug!(%format, %filename, size_bytes, "artifact rendered");
        Ok(Some(Artifact {
            format: format.clone(),
            filename,
            path,
            size_bytes,
            checksum,
        }))
    }

    /// Render every requested format in order, skipping unsupported ones
    ///
    /// # Errors
    ///
    /// Returns the first render failure
    pub async fn render_all(
        &self,
        rows: &[Record],
        charts: &IndexMap<String, ChartPayload>,
        formats: &[OutputFormat],
        execution_id: &ExecutionId,
    ) -> RenderResult<Vec<Artifact>> {
        let mut artifacts = Vec::with_capacity(formats.len());
        for format in formats {
            if let Some(artifact) = self.render(rows, charts, format, execution_id).await? {
                artifacts.push(artifact);
            }
        }
        Ok(artifacts)
    }
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// One header record plus one record per row
///
/// Records are newline-terminated, but a quoted field keeps its embedded
/// line breaks, so the physical line count only equals rows + 1 when no
/// value contains a newline.
fn encode_csv(rows: &[Record]) -> String {
    let columns = columns_of(rows);
    let mut out = String::new();

    let header: Vec<String> = columns.iter().map(|c| csv_field(c)).collect();
    out.push_str(&header.join(","));
    out.push('\n');

    for row in rows {
        let line: Vec<String> = columns
            .iter()
            .map(|c| csv_field(&row.get(c).map(to_plain_string).unwrap_or_default()))
            .collect();
        out.push_str(&line.join(","));
        out.push('\n');
    }
    out
}

fn xml_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\n' => out.push_str("&#10;"),
            c => out.push(c),
        }
    }
    out
}

fn xml_cell(out: &mut String, value: &Value) {
    let (kind, text) = match value {
        Value::Number(n) => ("Number", n.to_string()),
        Value::Bool(b) => ("Boolean", if *b { "1" } else { "0" }.to_string()),
        other => ("String", to_plain_string(other)),
    };
    let _ = write!(
        out,
        "<Cell><Data ss:Type=\"{}\">{}</Data></Cell>",
        kind,
        xml_escape(&text)
    );
}

fn xml_row(out: &mut String, cells: &[Value]) {
    out.push_str("<Row>");
    for cell in cells {
        xml_cell(out, cell);
    }
    out.push_str("</Row>\n");
}

/// XML Spreadsheet 2003 workbook with a `Data` and a `Visualizations` sheet
fn encode_workbook(rows: &[Record], charts: &IndexMap<String, ChartPayload>) -> RenderResult<String> {
    let mut out = String::from(concat!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n",
        "<?mso-application progid=\"Excel.Sheet\"?>\n",
        "<Workbook xmlns=\"urn:schemas-microsoft-com:office:spreadsheet\" ",
        "xmlns:ss=\"urn:schemas-microsoft-com:office:spreadsheet\">\n",
    ));

    let columns = columns_of(rows);
    out.push_str("<Worksheet ss:Name=\"Data\"><Table>\n");
    let header: Vec<Value> = columns.iter().map(|c| Value::String(c.clone())).collect();
    xml_row(&mut out, &header);
    for row in rows {
        let cells: Vec<Value> = columns
            .iter()
            .map(|c| row.get(c).cloned().unwrap_or(Value::Null))
            .collect();
        xml_row(&mut out, &cells);
    }
    out.push_str("</Table></Worksheet>\n");

    out.push_str("<Worksheet ss:Name=\"Visualizations\"><Table>\n");
    xml_row(
        &mut out,
        &["name", "type", "title", "rows", "config"].map(|h| Value::String(h.to_string())),
    );
    for (name, chart) in charts {
        xml_row(
            &mut out,
            &[
                Value::String(name.clone()),
                Value::String(chart.chart_type.to_string()),
                Value::String(chart.title.clone()),
                Value::from(chart.data.len()),
                Value::String(serde_json::to_string(&chart.config)?),
            ],
        );
    }
    out.push_str("</Table></Worksheet>\n</Workbook>\n");
    Ok(out)
}

fn pdf_text(text: &str) -> String {
    text.replace('\\', "\\\\").replace('(', "\\(").replace(')', "\\)")
}

/// Single-page PDF stating what the report contains
fn encode_placeholder_pdf(execution_id: &ExecutionId, row_count: usize, chart_count: usize) -> Vec<u8> {
    let lines = [
        format!("Report {}", execution_id),
        format!("Rows: {}", row_count),
        format!("Charts: {}", chart_count),
    ];
    let mut content = String::from("BT /F1 12 Tf 16 TL 72 720 Td\n");
    for line in &lines {
        let _ = writeln!(content, "({}) Tj T*", pdf_text(line));
    }
    content.push_str("ET\n");

    let objects = [
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string(),
        concat!(
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] ",
            "/Contents 4 0 R /Resources << /Font << /F1 5 0 R >> >> >>"
        )
        .to_string(),
        format!("<< /Length {} >>\nstream\n{}endstream", content.len(), content),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_string(),
    ];

    let mut out = String::from("%PDF-1.4\n");
    let mut offsets = Vec::with_capacity(objects.len());
    for (i, object) in objects.iter().enumerate() {
        offsets.push(out.len());
        let _ = write!(out, "{} 0 obj\n{}\nendobj\n", i + 1, object);
    }

    let xref_at = out.len();
    let _ = write!(out, "xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1);
    for offset in offsets {
        let _ = write!(out, "{:010} 00000 n \n", offset);
    }
    let _ = write!(
        out,
        "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
        objects.len() + 1,
        xref_at
    );
    out.into_bytes()
}
