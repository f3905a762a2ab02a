use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine as _};
use image::RgbaImage;

use crate::error::BackgroundLoadError;

/// Resolves an artwork reference into a decoded background image.
///
/// A reference may be a `data:` URI, an `http(s)` URL, or a filesystem path
/// (relative paths resolve against the configured assets directory). One
/// decoded image is cached per normalized reference for the lifetime of an
/// art selection; resolving a different reference discards the previous
/// entry wholesale.
///
/// Load failures are absorbed here: the caller gets `None` and composites
/// over the fallback fill instead. A failed background never fails a session.
pub struct BackgroundResolver {
    assets_dir: PathBuf,
    http_timeout: Duration,
    cache: Option<(String, RgbaImage)>,
}

enum SourceKind {
    DataUri,
    Url,
    File(PathBuf),
}

impl BackgroundResolver {
    pub fn new<P: AsRef<Path>>(assets_dir: P, http_timeout: Duration) -> Self {
        Self {
            assets_dir: assets_dir.as_ref().to_path_buf(),
            http_timeout,
            cache: None,
        }
    }

    /// Resolve a reference to a decoded image, or `None` when the reference
    /// is absent or fails to load.
    pub fn resolve(&mut self, source_ref: Option<&str>) -> Option<&RgbaImage> {
        let reference = match source_ref.map(str::trim).filter(|r| !r.is_empty()) {
            Some(r) => r.to_owned(),
            None => {
                self.cache = None;
                return None;
            }
        };

        let (key, kind) = self.normalize(&reference);

        let cached = self
            .cache
            .as_ref()
            .map(|(k, _)| *k == key)
            .unwrap_or(false);

        if !cached {
            match self.load(&reference, &kind) {
                Ok(image) => {
                    tracing::info!(
                        "Background resolved: {} ({}x{})",
                        key,
                        image.width(),
                        image.height()
                    );
                    self.cache = Some((key, image));
                }
                Err(err) => {
                    tracing::warn!("Background unavailable, using fallback fill: {}", err);
                    self.cache = None;
                    return None;
                }
            }
        }

        self.cache.as_ref().map(|(_, image)| image)
    }

    /// Turn a raw reference into a fetchable form plus its cache key.
    fn normalize(&self, reference: &str) -> (String, SourceKind) {
        if reference.starts_with("data:") {
            (reference.to_owned(), SourceKind::DataUri)
        } else if reference.starts_with("http://") || reference.starts_with("https://") {
            (reference.to_owned(), SourceKind::Url)
        } else {
            let path = Path::new(reference);
            let path = if path.is_absolute() {
                path.to_path_buf()
            } else {
                self.assets_dir.join(path)
            };
            (path.display().to_string(), SourceKind::File(path))
        }
    }

    fn load(
        &self,
        reference: &str,
        kind: &SourceKind,
    ) -> Result<RgbaImage, BackgroundLoadError> {
        let bytes = match kind {
            SourceKind::DataUri => decode_data_uri(reference)?,
            SourceKind::Url => self.fetch_url(reference)?,
            SourceKind::File(path) => {
                fs::read(path).map_err(|e| BackgroundLoadError::Unreadable {
                    reference: path.display().to_string(),
                    reason: e.to_string(),
                })?
            }
        };

        let decoded =
            image::load_from_memory(&bytes).map_err(|e| BackgroundLoadError::Decode {
                reference: reference.to_owned(),
                reason: e.to_string(),
            })?;

        Ok(decoded.to_rgba8())
    }

    fn fetch_url(&self, url: &str) -> Result<Vec<u8>, BackgroundLoadError> {
        let unreadable = |reason: String| BackgroundLoadError::Unreadable {
            reference: url.to_owned(),
            reason,
        };

        let client = reqwest::blocking::Client::builder()
            .timeout(self.http_timeout)
            .build()
            .map_err(|e| unreadable(e.to_string()))?;

        let response = client
            .get(url)
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| unreadable(e.to_string()))?;

        let bytes = response.bytes().map_err(|e| unreadable(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

fn decode_data_uri(uri: &str) -> Result<Vec<u8>, BackgroundLoadError> {
    let unreadable = |reason: &str| BackgroundLoadError::Unreadable {
        reference: "data: URI".to_owned(),
        reason: reason.to_owned(),
    };

    let payload = uri
        .split_once("base64,")
        .map(|(_, p)| p)
        .ok_or_else(|| unreadable("missing base64 payload"))?;

    BASE64_STANDARD
        .decode(payload.trim())
        .map_err(|e| unreadable(&e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgba};
    use std::io::Cursor;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let image = RgbaImage::from_pixel(width, height, Rgba([10, 20, 30, 255]));
        let mut bytes = Vec::new();
        image::DynamicImage::ImageRgba8(image)
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    #[test]
    fn absent_reference_resolves_to_none() {
        let mut resolver = BackgroundResolver::new(".", Duration::from_secs(1));
        assert!(resolver.resolve(None).is_none());
        assert!(resolver.resolve(Some("   ")).is_none());
    }

    #[test]
    fn missing_file_is_absorbed_to_none() {
        let mut resolver = BackgroundResolver::new(".", Duration::from_secs(1));
        assert!(resolver.resolve(Some("no/such/artwork.png")).is_none());
    }

    #[test]
    fn file_reference_is_loaded_and_cached() {
        let dir = std::env::temp_dir().join("artbooth-bg-test");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("art.png");
        fs::write(&path, png_bytes(8, 6)).unwrap();

        let mut resolver = BackgroundResolver::new(&dir, Duration::from_secs(1));
        let image = resolver.resolve(Some("art.png")).expect("should resolve");
        assert_eq!(image.dimensions(), (8, 6));

        // Second resolve of the same reference hits the cache even after the
        // file disappears.
        fs::remove_file(&path).unwrap();
        assert!(resolver.resolve(Some("art.png")).is_some());
    }

    #[test]
    fn switching_references_invalidates_the_cache() {
        let dir = std::env::temp_dir().join("artbooth-bg-switch-test");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("a.png"), png_bytes(4, 4)).unwrap();

        let mut resolver = BackgroundResolver::new(&dir, Duration::from_secs(1));
        assert!(resolver.resolve(Some("a.png")).is_some());

        // A failing reference drops the previous entry entirely.
        assert!(resolver.resolve(Some("b.png")).is_none());
        fs::remove_file(dir.join("a.png")).unwrap();
        assert!(resolver.resolve(Some("a.png")).is_none());
    }

    #[test]
    fn data_uri_reference_is_decoded() {
        let encoded = BASE64_STANDARD.encode(png_bytes(5, 7));
        let uri = format!("data:image/png;base64,{}", encoded);

        let mut resolver = BackgroundResolver::new(".", Duration::from_secs(1));
        let image = resolver.resolve(Some(&uri)).expect("should decode");
        assert_eq!(image.dimensions(), (5, 7));
    }
}
