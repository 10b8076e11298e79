// 🖼️ Summary Report - top countries by estimated GDP, rendered to PNG
//
// Built from the in-memory reconciled set, never from a post-write read.
// Layout, top to bottom:
//
//   Total countries: N
//   Top 5 Countries by Estimated GDP:
//   1. <name> - <gdp .2>
//   ...
//   Last refreshed: <timestamp>
//
// Rendering is best-effort: the refresh pipeline logs a failure here and
// still reports success.

use crate::entities::CountryRecord;
use crate::error::{LedgerError, LedgerResult};
use crate::query::latest_refresh;
use ab_glyph::{FontVec, PxScale};
use chrono::{DateTime, Utc};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use imageproc::drawing::{draw_text_mut, text_size};
use serde::Serialize;
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

pub const TOP_N: usize = 5;

// ============================================================================
// SUMMARY REPORT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedCountry {
    pub rank: usize,
    pub name: String,
    pub estimated_gdp: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryReport {
    pub total_countries: usize,
    pub top: Vec<RankedCountry>,
    /// Latest refresh across the FULL input, not just the ranked rows
    pub last_refreshed_at: DateTime<Utc>,
}

impl SummaryReport {
    pub fn from_records(records: &[CountryRecord]) -> Self {
        let total_countries = records.len();

        // Stable sort on a copy keeps input order among equal GDPs
        let mut ranked: Vec<&CountryRecord> = records.iter().collect();
        ranked.sort_by(|a, b| b.estimated_gdp.total_cmp(&a.estimated_gdp));

        let top = ranked
            .into_iter()
            .take(TOP_N)
            .enumerate()
            .map(|(i, r)| RankedCountry {
                rank: i + 1,
                name: r.name.clone(),
                estimated_gdp: r.estimated_gdp,
            })
            .collect();

        SummaryReport {
            total_countries,
            top,
            last_refreshed_at: latest_refresh(records),
        }
    }

    pub fn lines(&self) -> Vec<String> {
        let mut lines = Vec::with_capacity(self.top.len() + 3);
        lines.push(format!("Total countries: {}", self.total_countries));
        lines.push(format!("Top {TOP_N} Countries by Estimated GDP:"));
        for entry in &self.top {
            lines.push(format!("{}. {} - {:.2}", entry.rank, entry.name, entry.estimated_gdp));
        }
        lines.push(format!(
            "Last refreshed: {}",
            self.last_refreshed_at.format("%a, %d %b %Y %H:%M:%S UTC")
        ));
        lines
    }
}

// ============================================================================
// RENDER COLLABORATOR
// ============================================================================

/// Turns ordered text lines into an image file.
pub trait ReportRenderer: Send + Sync {
    /// Write the image to `path`, creating parent directories as needed.
    fn render_to(&self, lines: &[String], path: &Path) -> LedgerResult<()>;
}

/// Centered black text on a white canvas, one line per row.
#[derive(Debug, Clone)]
pub struct PngRenderer {
    pub font_path: PathBuf,
    pub font_size: f32,
    pub width: u32,
    pub line_height: u32,
    pub margin: u32,
}

impl PngRenderer {
    pub fn new(font_path: impl Into<PathBuf>) -> Self {
        PngRenderer {
            font_path: font_path.into(),
            font_size: 20.0,
            width: 600,
            line_height: 32,
            margin: 40,
        }
    }

    fn load_font(&self) -> LedgerResult<FontVec> {
        let bytes = fs::read(&self.font_path).map_err(|e| {
            LedgerError::Render(format!("failed to load font {}: {e}", self.font_path.display()))
        })?;

        FontVec::try_from_vec(bytes).map_err(|e| {
            LedgerError::Render(format!("invalid font {}: {e}", self.font_path.display()))
        })
    }

    /// Encode the lines as PNG bytes.
    pub fn render_png(&self, lines: &[String]) -> LedgerResult<Vec<u8>> {
        let font = self.load_font()?;
        let scale = PxScale::from(self.font_size);

        let height = self.margin * 2 + self.line_height * lines.len() as u32;
        let mut canvas = RgbImage::from_pixel(self.width, height, Rgb([255, 255, 255]));

        for (i, line) in lines.iter().enumerate() {
            let (text_width, _) = text_size(scale, &font, line);
            let x = (self.width.saturating_sub(text_width) / 2) as i32;
            let y = (self.margin + self.line_height * i as u32) as i32;
            draw_text_mut(&mut canvas, Rgb([0, 0, 0]), x, y, scale, &font, line);
        }

        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(canvas)
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .map_err(|e| LedgerError::Render(format!("png encoding failed: {e}")))?;

        Ok(bytes)
    }
}

impl ReportRenderer for PngRenderer {
    fn render_to(&self, lines: &[String], path: &Path) -> LedgerResult<()> {
        let bytes = self.render_png(lines)?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                LedgerError::Render(format!("failed to create {}: {e}", parent.display()))
            })?;
        }

        write_replacing(path, &bytes)
    }
}

/// Write next to `path` and rename over it, so readers see either the old
/// image or the new one, never a partial file.
pub fn write_replacing(path: &Path, bytes: &[u8]) -> LedgerResult<()> {
    let mut staging = path.as_os_str().to_owned();
    staging.push(".tmp");
    let staging = PathBuf::from(staging);

    fs::write(&staging, bytes)
        .map_err(|e| LedgerError::Render(format!("failed to write {}: {e}", staging.display())))?;

    fs::rename(&staging, path).map_err(|e| {
        let _ = fs::remove_file(&staging);
        LedgerError::Render(format!("failed to replace {}: {e}", path.display()))
    })
}
