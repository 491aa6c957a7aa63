use image::Rgba;
use serde::{Deserialize, Serialize};

use crate::ops::strokes::Ink;

// ============================================================================
// TOOLS & BRUSH PALETTE
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Tool {
    #[default]
    Brush,
    Fill,
    PaintFill,
}

impl Tool {
    pub fn label(&self) -> &'static str {
        match self {
            Tool::Brush => "Brush",
            Tool::Fill => "Fill",
            Tool::PaintFill => "Paint Fill",
        }
    }
}

/// One entry of the brush picker. `size` is the on-screen pen width; the
/// stroke width in image pixels is `size / zoom`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BrushChoice {
    pub id: u32,
    pub size: u32,
    pub tool: Tool,
}

impl BrushChoice {
    pub fn label(&self) -> String {
        match self.tool {
            Tool::Brush => format!("{} px", self.size),
            other => other.label().to_string(),
        }
    }
}

pub const BRUSH_PALETTE: [BrushChoice; 7] = [
    BrushChoice { id: 0, size: 5, tool: Tool::Brush },
    BrushChoice { id: 1, size: 10, tool: Tool::Brush },
    BrushChoice { id: 2, size: 25, tool: Tool::Brush },
    BrushChoice { id: 3, size: 50, tool: Tool::Brush },
    BrushChoice { id: 4, size: 100, tool: Tool::Brush },
    BrushChoice { id: 5, size: 0, tool: Tool::Fill },
    BrushChoice { id: 6, size: 0, tool: Tool::PaintFill },
];

pub const DEFAULT_BRUSH_ID: u32 = 2;

pub fn brush_by_id(id: u32) -> Option<BrushChoice> {
    BRUSH_PALETTE.iter().copied().find(|b| b.id == id)
}

pub fn default_brush() -> BrushChoice {
    BRUSH_PALETTE[DEFAULT_BRUSH_ID as usize]
}

// ============================================================================
// CATEGORY COLOURS
// ============================================================================

pub const ERASE_COLOR: &str = "erase";
pub const DRAG_COLOR: &str = "drag";

/// Parsed category colour: real ink or one of the reserved tool selectors.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Swatch {
    Color(Rgba<u8>),
    Erase,
    Drag,
}

impl Swatch {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            ERASE_COLOR => Some(Swatch::Erase),
            DRAG_COLOR => Some(Swatch::Drag),
            other => parse_hex_color(other).map(Swatch::Color),
        }
    }

    /// Ink deposited by a stroke in this swatch. `Drag` draws nothing.
    pub fn ink(&self) -> Option<Ink> {
        match self {
            Swatch::Color(c) => Some(Ink::Color(*c)),
            Swatch::Erase => Some(Ink::Erase),
            Swatch::Drag => None,
        }
    }

    pub fn color(&self) -> Option<Rgba<u8>> {
        match self {
            Swatch::Color(c) => Some(*c),
            _ => None,
        }
    }
}

/// `#rrggbb` or `#rgb` (leading `#` optional), always opaque.
pub fn parse_hex_color(s: &str) -> Option<Rgba<u8>> {
    let hex = s.strip_prefix('#').unwrap_or(s);
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let channel = |i: usize, len: usize| u8::from_str_radix(&hex[i..i + len], 16).ok();
    match hex.len() {
        6 => Some(Rgba([channel(0, 2)?, channel(2, 2)?, channel(4, 2)?, 255])),
        3 => {
            let expand = |v: u8| v * 17;
            Some(Rgba([
                expand(channel(0, 1)?),
                expand(channel(1, 1)?),
                expand(channel(2, 1)?),
                255,
            ]))
        }
        _ => None,
    }
}

// ============================================================================
// CATEGORIES
// ============================================================================

/// Annotation category as served by the category store. `color` is a hex
/// colour or one of the reserved sentinels.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub color: String,
    #[serde(default)]
    pub job_id: i64,
}

impl Category {
    pub fn erase() -> Self {
        Self {
            id: -1,
            name: "Erase".to_string(),
            color: ERASE_COLOR.to_string(),
            job_id: -1,
        }
    }

    pub fn drag() -> Self {
        Self {
            id: -2,
            name: "Drag&Drop".to_string(),
            color: DRAG_COLOR.to_string(),
            job_id: -2,
        }
    }

    pub fn swatch(&self) -> Option<Swatch> {
        Swatch::parse(&self.color)
    }
}

/// Service categories followed by the Erase and Drag&Drop sentinels.
pub fn with_sentinels(mut categories: Vec<Category>) -> Vec<Category> {
    categories.retain(|c| c.color != ERASE_COLOR && c.color != DRAG_COLOR);
    categories.push(Category::erase());
    categories.push(Category::drag());
    categories
}
