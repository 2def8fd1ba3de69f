//! Text payloads and the text metrics contract.

use serde::{Deserialize, Serialize};

/// Font weight options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FontWeight {
    Light,
    #[default]
    Regular,
    Medium,
    Bold,
    Heavy,
}

impl FontWeight {
    /// CSS-style numeric weight.
    pub fn numeric(&self) -> u16 {
        match self {
            FontWeight::Light => 300,
            FontWeight::Regular => 400,
            FontWeight::Medium => 500,
            FontWeight::Bold => 700,
            FontWeight::Heavy => 900,
        }
    }
}

/// Horizontal alignment of lines within the text box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TextAlign {
    #[default]
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FontStyle {
    #[default]
    Normal,
    Italic,
}

/// A text node's content and typography.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextDefinition {
    pub content: String,
    pub font_family: String,
    /// Font size in scene units.
    pub font_size: f64,
    pub font_weight: FontWeight,
    /// Line height as a multiple of the font size.
    pub line_height: f64,
    pub align: TextAlign,
    pub font_style: FontStyle,
    pub underline: bool,
}

impl TextDefinition {
    pub const DEFAULT_FAMILY: &'static str = "Inter";
    pub const DEFAULT_LINE_HEIGHT: f64 = 1.2;

    pub fn new(content: impl Into<String>, font_size: f64) -> Self {
        Self {
            content: content.into(),
            font_family: Self::DEFAULT_FAMILY.to_string(),
            font_size,
            font_weight: FontWeight::default(),
            line_height: Self::DEFAULT_LINE_HEIGHT,
            align: TextAlign::default(),
            font_style: FontStyle::default(),
            underline: false,
        }
    }

    /// The subset of fields that affects layout bounds.
    pub fn measure_input(&self) -> TextMeasureInput {
        TextMeasureInput {
            content: self.content.clone(),
            font_family: self.font_family.clone(),
            font_size: self.font_size,
            line_height: self.line_height,
            align: self.align,
        }
    }
}

/// Partial typography update; `None` fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextStyle {
    pub font_family: Option<String>,
    pub font_size: Option<f64>,
    pub font_weight: Option<FontWeight>,
    pub line_height: Option<f64>,
    pub align: Option<TextAlign>,
    pub font_style: Option<FontStyle>,
    pub underline: Option<bool>,
}

impl TextStyle {
    /// Apply to a definition. Returns true if any layout-affecting field changed.
    pub fn apply_to(&self, text: &mut TextDefinition) -> bool {
        let before = text.measure_input();
        if let Some(family) = &self.font_family {
            text.font_family = family.clone();
        }
        if let Some(size) = self.font_size {
            text.font_size = crate::validate::positive(size, text.font_size, "font size").into_value();
        }
        if let Some(weight) = self.font_weight {
            text.font_weight = weight;
        }
        if let Some(line_height) = self.line_height {
            text.line_height = crate::validate::positive(line_height, text.line_height, "line height").into_value();
        }
        if let Some(align) = self.align {
            text.align = align;
        }
        if let Some(style) = self.font_style {
            text.font_style = style;
        }
        if let Some(underline) = self.underline {
            text.underline = underline;
        }
        before != text.measure_input()
    }
}

/// Input to a text metrics provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextMeasureInput {
    pub content: String,
    pub font_family: String,
    pub font_size: f64,
    pub line_height: f64,
    pub align: TextAlign,
}

/// Layout bounds returned by a text metrics provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextBounds {
    pub width: f64,
    pub height: f64,
    /// Baseline offset of each line from the top of the box.
    pub baselines: Vec<f64>,
}

/// Synchronous text metrics provider.
pub trait TextMeasurer {
    fn measure(&self, input: &TextMeasureInput) -> TextBounds;
}

/// Character-count heuristic used when the host installs no real measurer.
#[derive(Debug, Clone, Copy)]
pub struct ApproximateTextMeasurer {
    /// Average advance as a fraction of the font size.
    pub advance_ratio: f64,
    /// Baseline position as a fraction of the font size below the line top.
    pub ascent_ratio: f64,
}

impl Default for ApproximateTextMeasurer {
    fn default() -> Self {
        Self {
            advance_ratio: 0.55,
            ascent_ratio: 0.8,
        }
    }
}

impl TextMeasurer for ApproximateTextMeasurer {
    fn measure(&self, input: &TextMeasureInput) -> TextBounds {
        // `split` keeps a trailing empty line, which `lines` would drop.
        let lines: Vec<&str> = input.content.split('\n').collect();
        let widest = lines.iter().map(|line| line.chars().count()).max().unwrap_or(0).max(1);
        let line_px = input.font_size * input.line_height;
        let leading = (line_px - input.font_size) / 2.0;
        TextBounds {
            width: widest as f64 * input.font_size * self.advance_ratio,
            height: lines.len() as f64 * line_px,
            baselines: (0..lines.len())
                .map(|i| i as f64 * line_px + leading + input.font_size * self.ascent_ratio)
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_approximate_measure_multiline() {
        let text = TextDefinition::new("hello\nhi\n", 20.0);
        let bounds = ApproximateTextMeasurer::default().measure(&text.measure_input());
        assert!((bounds.width - 5.0 * 20.0 * 0.55).abs() < 1e-9);
        assert!((bounds.height - 3.0 * 24.0).abs() < 1e-9);
        assert_eq!(bounds.baselines.len(), 3);
        assert!((bounds.baselines[1] - (24.0 + 2.0 + 16.0)).abs() < 1e-9);
    }

    #[test]
    fn test_empty_text_has_caret_width() {
        let text = TextDefinition::new("", 10.0);
        let bounds = ApproximateTextMeasurer::default().measure(&text.measure_input());
        assert!(bounds.width > 0.0);
        assert!((bounds.height - 12.0).abs() < 1e-9);
    }

    #[test]
    fn test_style_apply_reports_layout_change() {
        let mut text = TextDefinition::new("abc", 12.0);
        let underline_only = TextStyle {
            underline: Some(true),
            ..Default::default()
        };
        assert!(!underline_only.apply_to(&mut text));
        assert!(text.underline);

        let bigger = TextStyle {
            font_size: Some(30.0),
            ..Default::default()
        };
        assert!(bigger.apply_to(&mut text));
        assert!((text.font_size - 30.0).abs() < f64::EPSILON);

        let invalid = TextStyle {
            font_size: Some(-4.0),
            ..Default::default()
        };
        assert!(!invalid.apply_to(&mut text));
        assert!((text.font_size - 30.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_font_weight_numeric() {
        assert_eq!(FontWeight::default().numeric(), 400);
        assert_eq!(FontWeight::Bold.numeric(), 700);
    }
}
