//! Map view that writes the attached overlay to disk.
//!
//! The attached overlay is `overlay.png` (flux images only) plus
//! `overlay.json`, a manifest with the georeferencing bounds and display
//! styling. Detaching removes both files.

use std::fs;
use std::path::{Path, PathBuf};

use renderer::{IntensityBand, MapView, OverlayContent, OverlayHandle, RenderedOverlay};
use serde::Serialize;
use solar_common::{GeoBounds, LatLng, SolarError, SolarResult};
use tracing::{debug, info, warn};

pub const IMAGE_FILE: &str = "overlay.png";
pub const MANIFEST_FILE: &str = "overlay.json";

#[derive(Debug, Serialize)]
pub struct OverlayManifest {
    pub handle: u64,
    pub kind: &'static str,
    pub bounds: GeoBounds,
    pub opacity: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageManifest>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shape: Option<ShapeManifest>,
}

#[derive(Debug, Serialize)]
pub struct ImageManifest {
    pub file: &'static str,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Serialize)]
pub struct ShapeManifest {
    pub outline: Vec<LatLng>,
    pub fill_color: String,
    pub stroke_color: String,
    pub stroke_weight: f32,
    pub band: IntensityBand,
    pub intensity: f32,
}

/// Writes the attached overlay into a directory.
#[derive(Debug)]
pub struct FileMapView {
    dir: PathBuf,
    next_handle: u64,
    attached: Option<(OverlayHandle, Vec<PathBuf>)>,
}

impl FileMapView {
    pub fn new(dir: impl Into<PathBuf>) -> SolarResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .map_err(|e| SolarError::Config(format!("cannot create output directory {:?}: {}", dir, e)))?;
        Ok(Self {
            dir,
            next_handle: 0,
            attached: None,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Files written for the attached overlay.
    pub fn attached_files(&self) -> &[PathBuf] {
        self.attached.as_ref().map(|(_, files)| files.as_slice()).unwrap_or(&[])
    }

    /// Write `name`, recording it in `files` once it exists on disk.
    fn write(&self, files: &mut Vec<PathBuf>, name: &str, bytes: &[u8]) -> SolarResult<()> {
        let path = self.dir.join(name);
        fs::write(&path, bytes).map_err(|e| SolarError::MapView(format!("failed to write {:?}: {}", path, e)))?;
        files.push(path);
        Ok(())
    }

    fn write_overlay(
        &self,
        handle: OverlayHandle,
        overlay: &RenderedOverlay,
        files: &mut Vec<PathBuf>,
    ) -> SolarResult<()> {
        let (image, shape) = match &overlay.content {
            OverlayContent::Image(img) => {
                let png = img.to_png()?;
                self.write(files, IMAGE_FILE, &png)?;
                debug!(bytes = png.len(), "Wrote overlay image");
                let image = ImageManifest {
                    file: IMAGE_FILE,
                    width: img.width,
                    height: img.height,
                };
                (Some(image), None)
            }
            OverlayContent::Simulated(s) => {
                let shape = ShapeManifest {
                    outline: s.outline.clone(),
                    fill_color: s.fill.to_hex(),
                    stroke_color: s.stroke.to_hex(),
                    stroke_weight: s.stroke_weight,
                    band: s.band,
                    intensity: s.intensity,
                };
                (None, Some(shape))
            }
        };

        let manifest = OverlayManifest {
            handle: handle.0,
            kind: overlay.kind(),
            bounds: overlay.bounds,
            opacity: overlay.opacity,
            image,
            shape,
        };
        let json = serde_json::to_vec_pretty(&manifest)
            .map_err(|e| SolarError::MapView(format!("failed to encode manifest: {}", e)))?;
        self.write(files, MANIFEST_FILE, &json)
    }
}

fn remove_files(files: &[PathBuf]) {
    for file in files {
        if let Err(e) = fs::remove_file(file) {
            warn!(file = ?file, error = %e, "Failed to remove overlay file");
        }
    }
}

impl MapView for FileMapView {
    /// A failed attach removes whatever it already wrote.
    fn attach(&mut self, overlay: &RenderedOverlay) -> SolarResult<OverlayHandle> {
        let handle = OverlayHandle(self.next_handle + 1);
        let mut files = Vec::with_capacity(2);

        if let Err(e) = self.write_overlay(handle, overlay, &mut files) {
            remove_files(&files);
            return Err(e);
        }

        self.next_handle = handle.0;
        info!(handle = handle.0, kind = overlay.kind(), dir = ?self.dir, "Overlay written");
        self.attached = Some((handle, files));
        Ok(handle)
    }

    fn detach(&mut self, handle: OverlayHandle) {
        match self.attached.take() {
            Some((current, files)) if current == handle => remove_files(&files),
            other => self.attached = other,
        }
    }
}
