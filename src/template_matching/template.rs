//! Icon templates: loading reference images and preparing them for matching

use super::types::IconId;
use crate::error::{AutomationError, AutomationResult};
use image::GrayImage;
use std::path::{Path, PathBuf};

/// Source of raw icon image bytes
pub trait TemplateStore {
    fn load(&self, path: &Path) -> std::io::Result<Vec<u8>>;
}

/// Reads icon assets straight from the filesystem
#[derive(Debug, Default, Clone)]
pub struct FsTemplateStore;

impl TemplateStore for FsTemplateStore {
    fn load(&self, path: &Path) -> std::io::Result<Vec<u8>> {
        std::fs::read(path)
    }
}

/// Immutable grayscale reference image for one configured icon
#[derive(Debug, Clone)]
pub struct IconTemplate {
    pub id: IconId,
    pub name: String,
    pub path: PathBuf,
    pixels: GrayImage,
}

impl IconTemplate {
    /// Decode an encoded image (PNG/JPEG) into a grayscale template.
    ///
    /// With `white_mask_cutoff`, pixels not brighter than the cutoff are zeroed so
    /// only the bright glyph of the icon takes part in matching.
    pub fn decode(
        id: IconId,
        path: &Path,
        bytes: &[u8],
        white_mask_cutoff: Option<u8>,
    ) -> AutomationResult<Self> {
        let image = image::load_from_memory(bytes).map_err(|e| AutomationError::TemplateLoad {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let mut gray = image.to_luma8();
        if gray.width() == 0 || gray.height() == 0 {
            return Err(AutomationError::TemplateLoad {
                path: path.to_path_buf(),
                reason: "image has no pixels".to_string(),
            });
        }
        if let Some(cutoff) = white_mask_cutoff {
            apply_white_mask(&mut gray, cutoff);
        }

        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("unknown")
            .to_string();

        Ok(Self {
            id,
            name,
            path: path.to_path_buf(),
            pixels: gray,
        })
    }

    /// Build a template from pixels already in memory
    pub fn from_gray(id: IconId, name: &str, pixels: GrayImage) -> Self {
        Self {
            id,
            name: name.to_string(),
            path: PathBuf::from(format!("{name}.png")),
            pixels,
        }
    }

    pub fn pixels(&self) -> &GrayImage {
        &self.pixels
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }
}

/// Zero every pixel at or below `cutoff`, keep the brighter ones unchanged.
pub fn apply_white_mask(gray: &mut GrayImage, cutoff: u8) {
    for pixel in gray.pixels_mut() {
        if pixel[0] <= cutoff {
            pixel[0] = 0;
        }
    }
}

/// Load every configured icon, in priority order.
///
/// Any missing or undecodable asset fails the whole set: matching with a
/// partial icon list would silently skip steps of the sequence.
pub fn load_icon_set(
    store: &dyn TemplateStore,
    paths: &[PathBuf],
    white_mask_cutoff: Option<u8>,
) -> AutomationResult<Vec<IconTemplate>> {
    let mut templates = Vec::with_capacity(paths.len());
    for (rank, path) in paths.iter().enumerate() {
        let bytes = store
            .load(path)
            .map_err(|e| AutomationError::TemplateLoad {
                path: path.clone(),
                reason: e.to_string(),
            })?;
        let template = IconTemplate::decode(IconId(rank), path, &bytes, white_mask_cutoff)?;
        log::info!(
            "🧩 Loaded icon {} '{}' ({}x{})",
            template.id,
            template.name,
            template.width(),
            template.height()
        );
        templates.push(template);
    }
    Ok(templates)
}
