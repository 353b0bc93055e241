use once_cell::sync::Lazy;
use std::collections::HashMap;

use crate::core::error::{ChartError, ChartResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChartFormat {
    Png,
    Jpeg,
    Gif,
}

impl ChartFormat {
    pub fn name(&self) -> &'static str {
        match self {
            ChartFormat::Png => "png",
            ChartFormat::Jpeg => "jpeg",
            ChartFormat::Gif => "gif",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ChartFormat::Png => "image/png",
            ChartFormat::Jpeg => "image/jpeg",
            ChartFormat::Gif => "image/gif",
        }
    }
}

/// Extensions accepted in the final path segment, aliases included.
pub static FORMAT_REGISTRY: Lazy<HashMap<&'static str, ChartFormat>> = Lazy::new(|| {
    let mut registry = HashMap::new();
    registry.insert("png", ChartFormat::Png);
    registry.insert("jpeg", ChartFormat::Jpeg);
    registry.insert("jpg", ChartFormat::Jpeg);
    registry.insert("gif", ChartFormat::Gif);
    registry
});

/// Resolves a file name such as `image.png` to its output format.
///
/// The stem is restricted to ASCII letters, digits, `-` and `_`, so anything
/// path-like (`..`, `/`, `\`) is refused before the extension is looked at.
pub fn format_from_file_name(file_name: &str) -> ChartResult<ChartFormat> {
    let unsupported = || ChartError::UnsupportedFormat(file_name.to_string());

    let (stem, extension) = file_name.rsplit_once('.').ok_or_else(unsupported)?;
    let stem_ok = !stem.is_empty()
        && stem
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !stem_ok {
        return Err(unsupported());
    }

    FORMAT_REGISTRY
        .get(extension.to_ascii_lowercase().as_str())
        .copied()
        .ok_or_else(unsupported)
}
