//! Signal/result card rendering
//!
//! Cards are a dark canvas with one centered word ("4.37x", "WIN", "CRASH").
//! The preferred TTF font is loaded once; if it is missing or invalid the
//! renderer falls back to a built-in 5x7 bitmap font instead of failing.

use crate::config::RenderConfig;
use ab_glyph::{FontVec, PxScale};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use std::io::Cursor;
use thiserror::Error;
use tracing::{info, warn};

const BACKGROUND: Rgb<u8> = Rgb([30, 30, 30]);

/// Fraction of the canvas the text may occupy
const MAX_TEXT_WIDTH: f32 = 0.9;
const MAX_TEXT_HEIGHT: f32 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextColor {
    White,
    Green,
    Red,
}

impl TextColor {
    pub fn rgb(self) -> Rgb<u8> {
        match self {
            TextColor::White => Rgb([255, 255, 255]),
            TextColor::Green => Rgb([0, 128, 0]),
            TextColor::Red => Rgb([255, 0, 0]),
        }
    }
}

impl std::str::FromStr for TextColor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "white" => Ok(TextColor::White),
            "green" => Ok(TextColor::Green),
            "red" => Ok(TextColor::Red),
            other => Err(format!("unknown color: {}", other)),
        }
    }
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("image encoding failed: {0}")]
    Encode(#[from] image::ImageError),
    #[error("render worker failed: {0}")]
    Worker(String),
}

/// Pure `text, color -> JPEG bytes`
pub trait ImageRenderer: Send + Sync {
    fn render(&self, text: &str, color: TextColor) -> Result<Vec<u8>, RenderError>;
}

pub struct CardRenderer {
    width: u32,
    height: u32,
    font_size: f32,
    font: Option<FontVec>,
}

impl CardRenderer {
    pub fn new(config: &RenderConfig) -> Self {
        let font = match std::fs::read(&config.font_path) {
            Ok(bytes) => match FontVec::try_from_vec(bytes) {
                Ok(font) => {
                    info!("Loaded font: {}", config.font_path);
                    Some(font)
                }
                Err(e) => {
                    warn!("Invalid font {}: {} - using bitmap fallback", config.font_path, e);
                    None
                }
            },
            Err(e) => {
                warn!("Font not available {}: {} - using bitmap fallback", config.font_path, e);
                None
            }
        };

        Self {
            width: config.width,
            height: config.height,
            font_size: config.font_size,
            font,
        }
    }

    /// Renderer that always uses the bitmap font
    pub fn bitmap_only(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            font_size: 0.0,
            font: None,
        }
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    fn draw_ttf(&self, img: &mut RgbImage, font: &FontVec, text: &str, color: Rgb<u8>) {
        let mut scale = PxScale::from(self.font_size);
        let (mut w, mut h) = text_size(scale, font, text);

        // Shrink long strings so they stay on the canvas
        let max_w = self.width as f32 * MAX_TEXT_WIDTH;
        let max_h = self.height as f32 * MAX_TEXT_HEIGHT;
        if w as f32 > max_w || h as f32 > max_h {
            let factor = (max_w / w.max(1) as f32).min(max_h / h.max(1) as f32);
            scale = PxScale::from(self.font_size * factor);
            (w, h) = text_size(scale, font, text);
        }

        let x = (self.width as i32 - w as i32) / 2;
        let y = (self.height as i32 - h as i32) / 2;
        draw_text_mut(img, color, x, y, scale, font, text);
    }

    fn draw_bitmap(&self, img: &mut RgbImage, text: &str, color: Rgb<u8>) {
        let chars: Vec<char> = text.chars().collect();
        if chars.is_empty() {
            return;
        }

        // Each glyph is GLYPH_W columns plus one column of spacing
        let cols = (chars.len() * (GLYPH_W + 1) - 1) as f32;
        let cell = ((self.width as f32 * MAX_TEXT_WIDTH) / cols)
            .min((self.height as f32 * MAX_TEXT_HEIGHT) / GLYPH_H as f32)
            .floor()
            .max(1.0) as u32;

        let text_w = cols as u32 * cell;
        let text_h = GLYPH_H as u32 * cell;
        let origin_x = (self.width.saturating_sub(text_w) / 2) as i32;
        let origin_y = (self.height.saturating_sub(text_h) / 2) as i32;

        for (i, ch) in chars.iter().enumerate() {
            let rows = glyph(*ch);
            let glyph_x = origin_x + (i * (GLYPH_W + 1)) as i32 * cell as i32;
            for (row, bits) in rows.iter().enumerate() {
                for col in 0..GLYPH_W {
                    if bits & (1 << (GLYPH_W - 1 - col)) != 0 {
                        let x = glyph_x + col as i32 * cell as i32;
                        let y = origin_y + row as i32 * cell as i32;
                        draw_filled_rect_mut(img, Rect::at(x, y).of_size(cell, cell), color);
                    }
                }
            }
        }
    }
}

impl ImageRenderer for CardRenderer {
    fn render(&self, text: &str, color: TextColor) -> Result<Vec<u8>, RenderError> {
        let mut img = RgbImage::from_pixel(self.width, self.height, BACKGROUND);

        match &self.font {
            Some(font) => self.draw_ttf(&mut img, font, text, color.rgb()),
            None => self.draw_bitmap(&mut img, text, color.rgb()),
        }

        let mut buf = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img).write_to(&mut buf, ImageFormat::Jpeg)?;
        Ok(buf.into_inner())
    }
}

const GLYPH_W: usize = 5;
const GLYPH_H: usize = 7;

/// 5x7 bitmap rows, most significant of the low 5 bits is the leftmost column
fn glyph(ch: char) -> [u8; GLYPH_H] {
    match ch.to_ascii_uppercase() {
        '0' => [0b01110, 0b10001, 0b10011, 0b10101, 0b11001, 0b10001, 0b01110],
        '1' => [0b00100, 0b01100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        '2' => [0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0b01000, 0b11111],
        '3' => [0b11110, 0b00001, 0b00001, 0b01110, 0b00001, 0b00001, 0b11110],
        '4' => [0b00010, 0b00110, 0b01010, 0b10010, 0b11111, 0b00010, 0b00010],
        '5' => [0b11111, 0b10000, 0b11110, 0b00001, 0b00001, 0b10001, 0b01110],
        '6' => [0b00110, 0b01000, 0b10000, 0b11110, 0b10001, 0b10001, 0b01110],
        '7' => [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b01000, 0b01000],
        '8' => [0b01110, 0b10001, 0b10001, 0b01110, 0b10001, 0b10001, 0b01110],
        '9' => [0b01110, 0b10001, 0b10001, 0b01111, 0b00001, 0b00010, 0b01100],
        '.' => [0b00000, 0b00000, 0b00000, 0b00000, 0b00000, 0b01100, 0b01100],
        // lowercase-looking x for the multiplier suffix
        'X' => [0b00000, 0b00000, 0b10001, 0b01010, 0b00100, 0b01010, 0b10001],
        'W' => [0b10001, 0b10001, 0b10001, 0b10101, 0b10101, 0b10101, 0b01010],
        'I' => [0b01110, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        'N' => [0b10001, 0b11001, 0b10101, 0b10011, 0b10001, 0b10001, 0b10001],
        'C' => [0b01110, 0b10001, 0b10000, 0b10000, 0b10000, 0b10001, 0b01110],
        'R' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10100, 0b10010, 0b10001],
        'A' => [0b01110, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001],
        'S' => [0b01111, 0b10000, 0b10000, 0b01110, 0b00001, 0b00001, 0b11110],
        'H' => [0b10001, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001],
        ' ' => [0; GLYPH_H],
        _ => [0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0b00000, 0b00100],
    }
}
