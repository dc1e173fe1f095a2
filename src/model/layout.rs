//! Canonical placements on the 1920x1080 canvas.
//!
//! Source Scenes are canvas-sized, so a referenced Source Scene at scale 1.0
//! fills the canvas. Positions are the item's top-left corner.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const CANVAS_WIDTH: f64 = 1920.0;
pub const CANVAS_HEIGHT: f64 = 1080.0;

/// Margin between a picture-in-picture item and the canvas edge
pub const PIP_MARGIN: f64 = 40.0;

const PIP_SCALE: f64 = 0.25;
const PIP_SCALE_CONTENT_FOCUS: f64 = 0.15;

/// Horizontal crop on each side of a split-layout source
const SPLIT_CROP: u32 = 480;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Crop {
    pub left: u32,
    pub right: u32,
    pub top: u32,
    pub bottom: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub x: f64,
    pub y: f64,
    pub scale_x: f64,
    pub scale_y: f64,
    /// Fit-inside bounding box, width and height
    pub bounds: Option<(f64, f64)>,
    pub crop: Crop,
}

impl Default for Transform {
    fn default() -> Self {
        Self::full_canvas()
    }
}

impl Transform {
    pub fn full_canvas() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            bounds: None,
            crop: Crop::default(),
        }
    }

    /// Scale a device of unknown resolution to fit the canvas.
    pub fn fit_canvas() -> Self {
        Self {
            bounds: Some((CANVAS_WIDTH, CANVAS_HEIGHT)),
            ..Self::full_canvas()
        }
    }

    pub fn scaled(x: f64, y: f64, scale: f64) -> Self {
        Self {
            x,
            y,
            scale_x: scale,
            scale_y: scale,
            ..Self::full_canvas()
        }
    }

    /// Half-scale, centered.
    pub fn centered_half() -> Self {
        let scale = 0.5;
        Self::scaled(
            (CANVAS_WIDTH - CANVAS_WIDTH * scale) / 2.0,
            (CANVAS_HEIGHT - CANVAS_HEIGHT * scale) / 2.0,
            scale,
        )
    }

    /// Bottom-right corner inset, sized by the layout variant.
    pub fn picture_in_picture(variant: LayoutVariant) -> Self {
        let scale = match variant {
            LayoutVariant::Standard => PIP_SCALE,
            LayoutVariant::ContentFocus => PIP_SCALE_CONTENT_FOCUS,
        };
        Self::scaled(
            CANVAS_WIDTH - PIP_MARGIN - CANVAS_WIDTH * scale,
            CANVAS_HEIGHT - PIP_MARGIN - CANVAS_HEIGHT * scale,
            scale,
        )
    }

    /// Centre strip of a canvas-sized source placed in half `slot` (0 = left).
    /// OBS positions the cropped region, not the uncropped source.
    pub fn split(slot: u32) -> Self {
        Self {
            x: f64::from(slot) * CANVAS_WIDTH / 2.0,
            crop: Crop {
                left: SPLIT_CROP,
                right: SPLIT_CROP,
                top: 0,
                bottom: 0,
            },
            ..Self::full_canvas()
        }
    }

    /// `sceneItemTransform` payload for SetSceneItemTransform.
    pub fn to_obs(&self) -> Value {
        let mut value = json!({
            "positionX": self.x,
            "positionY": self.y,
            "scaleX": self.scale_x,
            "scaleY": self.scale_y,
            "cropLeft": self.crop.left,
            "cropRight": self.crop.right,
            "cropTop": self.crop.top,
            "cropBottom": self.crop.bottom,
        });
        if let (Some((w, h)), Some(obj)) = (self.bounds, value.as_object_mut()) {
            obj.insert("boundsType".into(), json!("OBS_BOUNDS_SCALE_INNER"));
            obj.insert("boundsWidth".into(), json!(w));
            obj.insert("boundsHeight".into(), json!(h));
        }
        value
    }
}

/// Layout family applied to every Session Scene.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LayoutVariant {
    #[default]
    Standard,
    /// Smaller camera inset, more room for content
    ContentFocus,
}

impl std::str::FromStr for LayoutVariant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "standard" => Ok(Self::Standard),
            "content-focus" => Ok(Self::ContentFocus),
            other => Err(format!(
                "unknown layout variant '{other}' (expected standard or content-focus)"
            )),
        }
    }
}
