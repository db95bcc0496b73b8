//! Manual photo uploads for the gallery page.

use std::path::{Path, PathBuf};

use chrono::Local;
use image::ImageFormat;
use thiserror::Error;

use crate::compose::{self, ComposeError, Dither};
use crate::coordinator::SharedCoordinator;
use crate::page::{Mode, Page};

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("no gallery_dir is configured")]
    NoGallery,
    #[error(transparent)]
    Compose(#[from] ComposeError),
    #[error("failed to store {path}: {source}")]
    Store {
        path: PathBuf,
        source: image::ImageError,
    },
    #[error("failed to create {path}: {source}")]
    Dir {
        path: PathBuf,
        source: std::io::Error,
    },
}

pub struct GalleryUpload {
    coordinator: SharedCoordinator,
    gallery_dir: Option<PathBuf>,
    width: u32,
    height: u32,
    dither: Dither,
}

impl GalleryUpload {
    pub fn new(
        coordinator: SharedCoordinator,
        gallery_dir: Option<PathBuf>,
        width: u32,
        height: u32,
        dither: Dither,
    ) -> Self {
        Self {
            coordinator,
            gallery_dir,
            width,
            height,
            dither,
        }
    }

    /// Store `path` in the gallery as PNG and show it on page 3 mode 1.
    /// Returns where the photo was stored.
    pub fn upload_file(&self, path: &Path) -> Result<PathBuf, UploadError> {
        let dir = self.gallery_dir.as_deref().ok_or(UploadError::NoGallery)?;

        let img = image::open(path).map_err(ComposeError::from)?;
        let frame = compose::compose_image(&img, self.width, self.height, self.dither)?;

        std::fs::create_dir_all(dir).map_err(|source| UploadError::Dir {
            path: dir.to_path_buf(),
            source,
        })?;
        let dest = unused_name(dir);
        img.save_with_format(&dest, ImageFormat::Png)
            .map_err(|source| UploadError::Store {
                path: dest.clone(),
                source,
            })?;

        log::info!(
            "[upload] {} stored as {} (black {} px, red {} px)",
            path.display(),
            dest.display(),
            frame.black.ink_count(),
            frame.red.ink_count()
        );
        self.coordinator.set_page_mode(Page::Gallery, Mode::FIRST);
        Ok(dest)
    }
}

fn unused_name(dir: &Path) -> PathBuf {
    let stem = Local::now().format("upload-%Y%m%d-%H%M%S-%3f").to_string();
    let mut dest = dir.join(format!("{}.png", stem));
    let mut n = 1;
    while dest.exists() {
        dest = dir.join(format!("{}-{}.png", stem, n));
        n += 1;
    }
    dest
}
