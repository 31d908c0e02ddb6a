//! Summary image written after every successful refresh.
//!
//! The image is an 800x600 PNG listing the total country count, the five
//! highest GDP estimates in rank order and the batch timestamp. Text is drawn
//! with a built-in 5x7 bitmap font, upper-cased.

use crate::errors::AppError;
use crate::models::Country;
use chrono::{DateTime, Utc};
use image::{ImageFormat, Rgb, RgbImage};
use std::io::Cursor;
use std::path::PathBuf;

pub const WIDTH: u32 = 800;
pub const HEIGHT: u32 = 600;
pub const TOP_COUNT: usize = 5;

const BACKGROUND: Rgb<u8> = Rgb([248, 249, 252]);
const HEADER: Rgb<u8> = Rgb([31, 56, 100]);
const HEADER_TEXT: Rgb<u8> = Rgb([255, 255, 255]);
const TEXT: Rgb<u8> = Rgb([33, 37, 41]);
const MUTED: Rgb<u8> = Rgb([108, 117, 125]);
const BAR: Rgb<u8> = Rgb([206, 222, 245]);

const MARGIN: u32 = 40;
const TITLE_SCALE: u32 = 5;
const BODY_SCALE: u32 = 3;
const FOOTER_SCALE: u32 = 2;

/// Informational content of the summary image.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryData {
    pub total_countries: i64,
    /// `(name, estimated_gdp)` in rank order, at most five entries.
    pub top: Vec<(String, f64)>,
    pub refreshed_at: String,
}

impl SummaryData {
    pub fn new(total_countries: i64, top: &[Country], refreshed_at: DateTime<Utc>) -> Self {
        Self {
            total_countries,
            top: top
                .iter()
                .filter_map(|c| c.estimated_gdp.map(|gdp| (c.name.clone(), gdp)))
                .take(TOP_COUNT)
                .collect(),
            refreshed_at: format_timestamp(refreshed_at),
        }
    }
}

pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

/// Two decimals with thousands separators, e.g. `1,234,567.89`.
pub fn format_gdp(value: f64) -> String {
    let formatted = format!("{:.2}", value.abs());
    let (int_part, frac_part) = formatted.split_once('.').unwrap_or((&formatted, "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if value < 0.0 { "-" } else { "" };
    format!("{}{}.{}", sign, grouped, frac_part)
}

/// Text lines of the image, top to bottom.
pub fn summary_lines(data: &SummaryData) -> Vec<String> {
    let mut lines = vec![
        "Country Summary".to_string(),
        format!("Total countries: {}", data.total_countries),
        format!("Top {} by estimated GDP:", TOP_COUNT),
    ];

    if data.top.is_empty() {
        lines.push("No GDP estimates available".to_string());
    }
    for (rank, (name, gdp)) in data.top.iter().enumerate() {
        lines.push(format!("{}. {} - {}", rank + 1, name, format_gdp(*gdp)));
    }

    lines.push(format!("Last refreshed: {}", data.refreshed_at));
    lines
}

/// Renders the summary PNG and manages its file on disk.
#[derive(Debug, Clone)]
pub struct SummaryRenderer {
    path: PathBuf,
}

impl SummaryRenderer {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Encodes the image and replaces the file at `path`.
    ///
    /// The PNG goes to a sibling temp file first and is renamed into place,
    /// so readers see either the previous image or the new one.
    pub async fn render(&self, data: &SummaryData) -> Result<(), AppError> {
        let data = data.clone();
        let png = tokio::task::spawn_blocking(move || encode_png(&draw(&data)))
            .await
            .map_err(|e| AppError::InternalError(format!("Image render task failed: {}", e)))??;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let tmp = self.temp_path();
        tokio::fs::write(&tmp, &png).await?;
        if let Err(e) = tokio::fs::rename(&tmp, &self.path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }

        tracing::info!(
            "Summary image written to {} ({} bytes)",
            self.path.display(),
            png.len()
        );
        Ok(())
    }

    /// Current image bytes, or `None` if no refresh has produced one yet.
    pub async fn read(&self) -> Result<Option<Vec<u8>>, AppError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "summary.png".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

fn encode_png(img: &RgbImage) -> Result<Vec<u8>, AppError> {
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png)
        .map_err(|e| AppError::InternalError(format!("Failed to encode summary image: {}", e)))?;
    Ok(buf.into_inner())
}

fn draw(data: &SummaryData) -> RgbImage {
    let mut img = RgbImage::from_pixel(WIDTH, HEIGHT, BACKGROUND);
    let lines = summary_lines(data);

    let header_height = MARGIN + glyph_height(TITLE_SCALE) + MARGIN / 2;
    fill_rect(&mut img, 0, 0, WIDTH, header_height, HEADER);
    draw_text(&mut img, MARGIN, MARGIN * 3 / 4, &lines[0], TITLE_SCALE, HEADER_TEXT);

    let line_step = glyph_height(BODY_SCALE) + 22;
    let mut y = header_height + 30;
    draw_text(&mut img, MARGIN, y, &lines[1], BODY_SCALE, TEXT);
    y += line_step + 10;
    draw_text(&mut img, MARGIN, y, &lines[2], BODY_SCALE, TEXT);
    y += line_step;

    let max_gdp = data.top.iter().map(|(_, gdp)| *gdp).fold(0.0_f64, f64::max);
    let bar_span = WIDTH - 2 * MARGIN;
    let ranked = &lines[3..lines.len() - 1];
    for (i, line) in ranked.iter().enumerate() {
        if let Some((_, gdp)) = data.top.get(i) {
            if max_gdp > 0.0 {
                let width = ((gdp / max_gdp) * bar_span as f64).round() as u32;
                fill_rect(&mut img, MARGIN, y - 6, width.max(1), glyph_height(BODY_SCALE) + 12, BAR);
            }
        }
        draw_text(&mut img, MARGIN + 10, y, line, BODY_SCALE, TEXT);
        y += line_step;
    }

    let footer_y = HEIGHT - MARGIN - glyph_height(FOOTER_SCALE);
    if let Some(footer) = lines.last() {
        draw_text(&mut img, MARGIN, footer_y, footer, FOOTER_SCALE, MUTED);
    }

    img
}

fn glyph_height(scale: u32) -> u32 {
    7 * scale
}

fn fill_rect(img: &mut RgbImage, x: u32, y: u32, w: u32, h: u32, color: Rgb<u8>) {
    for py in y..(y + h).min(img.height()) {
        for px in x..(x + w).min(img.width()) {
            img.put_pixel(px, py, color);
        }
    }
}

/// Draws `text` left to right, clipping at the right edge.
fn draw_text(img: &mut RgbImage, x: u32, y: u32, text: &str, scale: u32, color: Rgb<u8>) {
    let advance = 6 * scale;
    let mut cursor = x;
    for ch in text.chars() {
        if cursor + 5 * scale > img.width() {
            break;
        }
        for (row, bits) in glyph(ch).iter().enumerate() {
            for col in 0..5u32 {
                if bits & (0x10 >> col) != 0 {
                    fill_rect(
                        img,
                        cursor + col * scale,
                        y + row as u32 * scale,
                        scale,
                        scale,
                        color,
                    );
                }
            }
        }
        cursor += advance;
    }
}

/// 5x7 glyph rows, most significant of the low five bits is the left column.
fn glyph(ch: char) -> [u8; 7] {
    match ch.to_ascii_uppercase() {
        '0' => [0x0E, 0x11, 0x13, 0x15, 0x19, 0x11, 0x0E],
        '1' => [0x04, 0x0C, 0x04, 0x04, 0x04, 0x04, 0x0E],
        '2' => [0x0E, 0x11, 0x01, 0x02, 0x04, 0x08, 0x1F],
        '3' => [0x1F, 0x02, 0x04, 0x02, 0x01, 0x11, 0x0E],
        '4' => [0x02, 0x06, 0x0A, 0x12, 0x1F, 0x02, 0x02],
        '5' => [0x1F, 0x10, 0x1E, 0x01, 0x01, 0x11, 0x0E],
        '6' => [0x06, 0x08, 0x10, 0x1E, 0x11, 0x11, 0x0E],
        '7' => [0x1F, 0x01, 0x02, 0x04, 0x08, 0x08, 0x08],
        '8' => [0x0E, 0x11, 0x11, 0x0E, 0x11, 0x11, 0x0E],
        '9' => [0x0E, 0x11, 0x11, 0x0F, 0x01, 0x02, 0x0C],
        'A' => [0x0E, 0x11, 0x11, 0x11, 0x1F, 0x11, 0x11],
        'B' => [0x1E, 0x11, 0x11, 0x1E, 0x11, 0x11, 0x1E],
        'C' => [0x0E, 0x11, 0x10, 0x10, 0x10, 0x11, 0x0E],
        'D' => [0x1C, 0x12, 0x11, 0x11, 0x11, 0x12, 0x1C],
        'E' => [0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x1F],
        'F' => [0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x10],
        'G' => [0x0E, 0x11, 0x10, 0x17, 0x11, 0x11, 0x0F],
        'H' => [0x11, 0x11, 0x11, 0x1F, 0x11, 0x11, 0x11],
        'I' => [0x0E, 0x04, 0x04, 0x04, 0x04, 0x04, 0x0E],
        'J' => [0x07, 0x02, 0x02, 0x02, 0x02, 0x12, 0x0C],
        'K' => [0x11, 0x12, 0x14, 0x18, 0x14, 0x12, 0x11],
        'L' => [0x10, 0x10, 0x10, 0x10, 0x10, 0x10, 0x1F],
        'M' => [0x11, 0x1B, 0x15, 0x15, 0x11, 0x11, 0x11],
        'N' => [0x11, 0x11, 0x19, 0x15, 0x13, 0x11, 0x11],
        'O' => [0x0E, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E],
        'P' => [0x1E, 0x11, 0x11, 0x1E, 0x10, 0x10, 0x10],
        'Q' => [0x0E, 0x11, 0x11, 0x11, 0x15, 0x12, 0x0D],
        'R' => [0x1E, 0x11, 0x11, 0x1E, 0x14, 0x12, 0x11],
        'S' => [0x0F, 0x10, 0x10, 0x0E, 0x01, 0x01, 0x1E],
        'T' => [0x1F, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04],
        'U' => [0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E],
        'V' => [0x11, 0x11, 0x11, 0x11, 0x11, 0x0A, 0x04],
        'W' => [0x11, 0x11, 0x11, 0x15, 0x15, 0x15, 0x0A],
        'X' => [0x11, 0x11, 0x0A, 0x04, 0x0A, 0x11, 0x11],
        'Y' => [0x11, 0x11, 0x11, 0x0A, 0x04, 0x04, 0x04],
        'Z' => [0x1F, 0x01, 0x02, 0x04, 0x08, 0x10, 0x1F],
        ' ' => [0x00; 7],
        '.' => [0x00, 0x00, 0x00, 0x00, 0x00, 0x0C, 0x0C],
        ',' => [0x00, 0x00, 0x00, 0x00, 0x0C, 0x04, 0x08],
        ':' => [0x00, 0x0C, 0x0C, 0x00, 0x0C, 0x0C, 0x00],
        '-' => [0x00, 0x00, 0x00, 0x1F, 0x00, 0x00, 0x00],
        '+' => [0x00, 0x04, 0x04, 0x1F, 0x04, 0x04, 0x00],
        '_' => [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x1F],
        '(' => [0x02, 0x04, 0x08, 0x08, 0x08, 0x04, 0x02],
        ')' => [0x08, 0x04, 0x02, 0x02, 0x02, 0x04, 0x08],
        '/' => [0x00, 0x01, 0x02, 0x04, 0x08, 0x10, 0x00],
        '\'' => [0x0C, 0x04, 0x08, 0x00, 0x00, 0x00, 0x00],
        '$' => [0x04, 0x0F, 0x14, 0x0E, 0x05, 0x1E, 0x04],
        '#' => [0x0A, 0x0A, 0x1F, 0x0A, 0x1F, 0x0A, 0x0A],
        '&' => [0x0C, 0x12, 0x14, 0x08, 0x15, 0x12, 0x0D],
        _ => [0x0E, 0x11, 0x01, 0x02, 0x04, 0x00, 0x04],
    }
}
