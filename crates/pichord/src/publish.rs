//! Overwrite-by-name storage for the most recent [`ImageSet`].
//!
//! Publishing swaps the whole set at once, so readers see either the previous
//! set or the new one and never a mix. With a mirror directory configured,
//! every file is staged next to its target and only renamed into place after
//! all of them were written.

use crate::{
    error::PublishError,
    render::ImageSet,
    time::{SystemClock, TimeSource},
};
use bytes::Bytes;
use parking_lot::RwLock;
use portable_atomic::{AtomicU64, Ordering};
use serde::Serialize;
use std::{
    collections::BTreeMap,
    fs,
    io::Write,
    path::{Path, PathBuf},
    sync::Arc,
};

/// Logical name of the canonical alias.
pub const LATEST: &str = "latest";

/// Cache-busted addresses of the published images.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WallpaperUrls {
    pub latest: String,
    pub resolutions: BTreeMap<String, String>,
}

#[derive(Debug)]
pub struct ImageStore<C = SystemClock> {
    current: RwLock<Option<Arc<ImageSet>>>,
    base_url: String,
    latest: String,
    mirror: Option<PathBuf>,
    clock: C,
    seq: AtomicU64,
}

impl ImageStore {
    /// Creates an empty store addressing images under `base_url`, aliasing
    /// `latest` to the resolution named `latest`.
    pub fn new(base_url: impl Into<String>, latest: impl Into<String>) -> Self {
        Self::with_clock(base_url, latest, SystemClock)
    }
}

impl<C: TimeSource> ImageStore<C> {
    pub fn with_clock(base_url: impl Into<String>, latest: impl Into<String>, clock: C) -> Self {
        Self {
            current: RwLock::new(None),
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            latest: latest.into(),
            mirror: None,
            clock,
            seq: AtomicU64::new(0),
        }
    }

    /// Also writes every published set to `dir` as `{name}.png`, plus
    /// `latest.png`.
    pub fn with_mirror(mut self, dir: impl Into<PathBuf>) -> Self {
        self.mirror = Some(dir.into());
        self
    }

    /// Replaces the published set.
    ///
    /// # Errors
    ///
    /// Fails without touching the current set if `images` has no entry for
    /// the latest alias or if mirroring to disk fails.
    pub fn publish(&self, images: ImageSet) -> Result<(), PublishError> {
        if !images.images.contains_key(&self.latest) {
            return Err(PublishError::MissingAlias(self.latest.clone()));
        }
        if let Some(dir) = &self.mirror {
            self.write_mirror(dir, &images)?;
        }

        let count = images.assigned_count;
        *self.current.write() = Some(Arc::new(images));
        tracing::debug!(assigned_count = count, "Published image set");
        Ok(())
    }

    fn write_mirror(&self, dir: &Path, images: &ImageSet) -> Result<(), PublishError> {
        let io_err = |path: &Path| {
            let path = path.to_path_buf();
            move |source: std::io::Error| PublishError::Io { path, source }
        };
        fs::create_dir_all(dir).map_err(io_err(dir))?;

        let latest = &images.images[&self.latest];
        let files = images
            .images
            .iter()
            .map(|(name, png)| (format!("{name}.png"), png))
            .chain([(format!("{LATEST}.png"), latest)]);

        let mut staged = Vec::with_capacity(images.images.len() + 1);
        for (file, png) in files {
            let target = dir.join(file);
            let tmp = target.with_extension("png.tmp");
            let mut f = fs::File::create(&tmp).map_err(io_err(&tmp))?;
            f.write_all(png).map_err(io_err(&tmp))?;
            f.sync_all().map_err(io_err(&tmp))?;
            staged.push((tmp, target));
        }
        for (tmp, target) in staged {
            fs::rename(&tmp, &target).map_err(io_err(&target))?;
        }
        Ok(())
    }

    /// Returns the image published as `name`, resolving the latest alias.
    pub fn get(&self, name: &str) -> Option<Bytes> {
        let current = self.current.read();
        let set = current.as_ref()?;
        let name = if name == LATEST { self.latest.as_str() } else { name };
        set.get(name).cloned()
    }

    /// Returns the currently published set.
    pub fn current(&self) -> Option<Arc<ImageSet>> {
        self.current.read().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.current.read().is_none()
    }

    /// Drops the published set. Mirrored files are left for the next publish
    /// to overwrite.
    pub fn clear(&self) {
        *self.current.write() = None;
    }

    /// Returns addresses for every published image and the latest alias.
    ///
    /// Each call mints a fresh `v` token, so two calls never return the same
    /// address even when the images did not change.
    pub fn urls(&self) -> WallpaperUrls {
        let token = format!(
            "{}-{}",
            self.clock.now_millis(),
            self.seq.fetch_add(1, Ordering::Relaxed)
        );
        let url = |name: &str| format!("{}/wallpapers/{name}.png?v={token}", self.base_url);

        let resolutions: BTreeMap<String, String> = self
            .current
            .read()
            .as_ref()
            .map(|set| set.images.keys().map(|name| (name.clone(), url(name))).collect())
            .unwrap_or_default();

        WallpaperUrls {
            latest: url(LATEST),
            resolutions,
        }
    }
}
