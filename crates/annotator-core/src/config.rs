//! Editor configuration
//!
//! Every field has a default, so an empty TOML document is a valid
//! configuration. Values are checked by [`EditorConfig::validate`].

use crate::bake::parse_hex_color;
use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EditorConfig {
    /// Maximum number of undo snapshots kept (default: 5)
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,
    #[serde(default)]
    pub zoom: ZoomConfig,
    /// Minimum side length for stamps, signatures and text boxes (default: 20)
    #[serde(default = "default_min_element_size")]
    pub min_element_size: f64,
    #[serde(default)]
    pub highlight: HighlightConfig,
    #[serde(default)]
    pub text: TextConfig,
    #[serde(default = "default_stamp_size")]
    pub stamp_size: ElementSize,
    #[serde(default = "default_signature_size")]
    pub signature_size: ElementSize,
    /// Pointer distance in screen pixels that still grabs a resize handle
    #[serde(default = "default_handle_hit_radius")]
    pub handle_hit_radius: f64,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            history_capacity: default_history_capacity(),
            zoom: ZoomConfig::default(),
            min_element_size: default_min_element_size(),
            highlight: HighlightConfig::default(),
            text: TextConfig::default(),
            stamp_size: default_stamp_size(),
            signature_size: default_signature_size(),
            handle_hit_radius: default_handle_hit_radius(),
        }
    }
}

impl EditorConfig {
    /// Parse and validate a TOML configuration
    ///
    /// # Example
    ///
    /// ```
    /// use annotator_core::config::EditorConfig;
    ///
    /// # fn example() -> anyhow::Result<()> {
    /// let config = EditorConfig::from_toml_str(r#"
    ///     history_capacity = 10
    ///
    ///     [zoom]
    ///     max = 4.0
    /// "#)?;
    /// assert_eq!(config.history_capacity, 10);
    /// # Ok(())
    /// # }
    /// ```
    pub fn from_toml_str(s: &str) -> anyhow::Result<Self> {
        let config: EditorConfig =
            toml::from_str(s).context("Failed to parse editor configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.history_capacity == 0 {
            bail!("history_capacity must be at least 1");
        }
        self.zoom.validate()?;
        if self.min_element_size <= 0.0 {
            bail!("min_element_size must be positive");
        }
        if self.text.font_size <= 0.0 || self.text.box_width <= 0.0 {
            bail!("text.font_size and text.box_width must be positive");
        }
        if !(0.0..=1.0).contains(&self.highlight.opacity) {
            bail!("highlight.opacity must be within [0, 1]");
        }
        parse_hex_color(&self.highlight.color)
            .with_context(|| format!("Invalid highlight.color: {}", self.highlight.color))?;
        parse_hex_color(&self.text.color)
            .with_context(|| format!("Invalid text.color: {}", self.text.color))?;
        Ok(())
    }
}

fn default_history_capacity() -> usize {
    crate::history::DEFAULT_CAPACITY
}

fn default_min_element_size() -> f64 {
    20.0
}

fn default_handle_hit_radius() -> f64 {
    8.0
}

fn default_stamp_size() -> ElementSize {
    ElementSize {
        width: 150.0,
        height: 150.0,
    }
}

fn default_signature_size() -> ElementSize {
    ElementSize {
        width: 200.0,
        height: 80.0,
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ElementSize {
    pub width: f64,
    pub height: f64,
}

/// Zoom range and step
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ZoomConfig {
    #[serde(default = "default_zoom_min")]
    pub min: f64,
    #[serde(default = "default_zoom_max")]
    pub max: f64,
    #[serde(default = "default_zoom_step")]
    pub step: f64,
    #[serde(default = "default_zoom_initial")]
    pub initial: f64,
}

impl Default for ZoomConfig {
    fn default() -> Self {
        Self {
            min: default_zoom_min(),
            max: default_zoom_max(),
            step: default_zoom_step(),
            initial: default_zoom_initial(),
        }
    }
}

impl ZoomConfig {
    fn validate(&self) -> anyhow::Result<()> {
        if self.min <= 0.0 || self.min > self.max {
            bail!("zoom range [{}, {}] is invalid", self.min, self.max);
        }
        if self.step <= 0.0 {
            bail!("zoom.step must be positive");
        }
        if !(self.min..=self.max).contains(&self.initial) {
            bail!("zoom.initial {} is outside [{}, {}]", self.initial, self.min, self.max);
        }
        Ok(())
    }
}

fn default_zoom_min() -> f64 {
    0.5
}

fn default_zoom_max() -> f64 {
    3.0
}

fn default_zoom_step() -> f64 {
    0.25
}

fn default_zoom_initial() -> f64 {
    1.0
}

/// Highlight drawing and baking settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HighlightConfig {
    #[serde(default = "default_highlight_color")]
    pub color: String,
    #[serde(default = "default_highlight_opacity")]
    pub opacity: f64,
    /// Highlights narrower than this on release are dropped
    #[serde(default = "default_highlight_min_width")]
    pub min_width: f64,
    /// Highlights shorter than this on release are dropped
    #[serde(default = "default_highlight_min_height")]
    pub min_height: f64,
    /// Height a highlight gets while drawing, however small the drag
    #[serde(default = "default_highlight_min_draw_height")]
    pub min_draw_height: f64,
}

impl Default for HighlightConfig {
    fn default() -> Self {
        Self {
            color: default_highlight_color(),
            opacity: default_highlight_opacity(),
            min_width: default_highlight_min_width(),
            min_height: default_highlight_min_height(),
            min_draw_height: default_highlight_min_draw_height(),
        }
    }
}

fn default_highlight_color() -> String {
    "#FFEB3B".to_string()
}

fn default_highlight_opacity() -> f64 {
    0.3
}

fn default_highlight_min_width() -> f64 {
    10.0
}

fn default_highlight_min_height() -> f64 {
    5.0
}

fn default_highlight_min_draw_height() -> f64 {
    14.0
}

/// Defaults for newly committed text elements
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TextConfig {
    #[serde(default = "default_font_size")]
    pub font_size: f64,
    #[serde(default = "default_text_color")]
    pub color: String,
    #[serde(default = "default_box_width")]
    pub box_width: f64,
    #[serde(default = "default_line_height_factor")]
    pub line_height_factor: f64,
}

impl Default for TextConfig {
    fn default() -> Self {
        Self {
            font_size: default_font_size(),
            color: default_text_color(),
            box_width: default_box_width(),
            line_height_factor: default_line_height_factor(),
        }
    }
}

fn default_font_size() -> f64 {
    14.0
}

fn default_text_color() -> String {
    "#000000".to_string()
}

fn default_box_width() -> f64 {
    200.0
}

fn default_line_height_factor() -> f64 {
    1.2
}
