//! Saving and loading stamp configurations as JSON templates.
//!
//! A template captures every stamp field in paint order so a reloaded set
//! renders identically; image bytes travel as base64 text inside the JSON.

use crate::error::{Result, StampError};
use crate::stamp::{Stamp, StampSet};
use serde::{Deserialize, Serialize};

const TEMPLATE_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct Template {
    version: u32,
    stamps: Vec<Stamp>,
}

pub fn to_json(stamps: &StampSet) -> Result<String> {
    let template = Template {
        version: TEMPLATE_VERSION,
        stamps: stamps.iter().map(|(_, stamp)| stamp.clone()).collect(),
    };
    serde_json::to_string_pretty(&template).map_err(|e| StampError::Template(e.to_string()))
}

/// Parses a template back into a fresh stamp set with new ids, preserving
/// paint order.
pub fn from_json(json: &str) -> Result<StampSet> {
    let template: Template =
        serde_json::from_str(json).map_err(|e| StampError::Template(e.to_string()))?;
    if template.version != TEMPLATE_VERSION {
        return Err(StampError::Template(format!(
            "unsupported template version {}",
            template.version
        )));
    }
    let mut set = StampSet::new();
    for stamp in template.stamps {
        set.insert(stamp);
    }
    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stamp::{PageRange, StampKind};
    use crate::types::Color;

    #[test]
    fn round_trip_preserves_every_field_and_order() {
        let mut set = StampSet::new();

        let mut text = Stamp::text("CONFIDENTIAL\nDO NOT COPY");
        text.geometry.x_mm = 12.5;
        text.geometry.rotation_deg = -30.0;
        text.page_range = PageRange::new(2, 7);
        if let StampKind::Text(style) = &mut text.kind {
            style.font_size = 14.0;
            style.italic = true;
            style.fill_color = Color::rgb(1.0, 0.5, 0.0);
            style.box_opacity = 0.4;
            style.tiling.enabled = true;
            style.tiling.spacing_x_mm = 80.0;
        }
        set.insert(text);
        set.insert(Stamp::image(vec![0x89, b'P', b'N', b'G', 0, 1, 2, 255]));

        let json = to_json(&set).unwrap();
        let restored = from_json(&json).unwrap();

        assert_eq!(restored.len(), 2);
        let original: Vec<&Stamp> = set.iter().map(|(_, s)| s).collect();
        let reloaded: Vec<&Stamp> = restored.iter().map(|(_, s)| s).collect();
        assert_eq!(original, reloaded);
    }

    #[test]
    fn image_bytes_are_base64_in_the_json() {
        let mut set = StampSet::new();
        set.insert(Stamp::image(vec![1, 2, 3, 4]));
        let json = to_json(&set).unwrap();
        assert!(json.contains("AQIDBA=="));
    }

    #[test]
    fn malformed_json_is_a_template_error() {
        let err = from_json("{not json").unwrap_err();
        assert!(matches!(err, StampError::Template(_)));
    }

    #[test]
    fn future_versions_are_rejected() {
        let err = from_json(r#"{"version": 99, "stamps": []}"#).unwrap_err();
        assert!(matches!(err, StampError::Template(_)));
    }
}
