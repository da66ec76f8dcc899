//! Gallery lookup
//!
//! Photos and videos live in a shared media index. The camera only needs the
//! newest item of each kind (for thumbnails), the newest item overall, and a
//! way to add freshly captured files.

use crate::errors::CameraError;
use crate::types::{MediaItem, MediaKind};
use chrono::{DateTime, Local, TimeZone};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

const PHOTO_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];
const VIDEO_EXTENSIONS: [&str; 3] = ["mp4", "mov", "webm"];

/// Shared gallery of photos and videos
pub trait MediaIndex: Send + Sync {
    /// Most recently added item of `kind`
    fn latest(&self, kind: MediaKind) -> Result<Option<MediaItem>, CameraError>;

    /// Register a new item and return it ready for writing
    fn insert(&self, kind: MediaKind, display_name: &str, mime_type: &str) -> Result<MediaItem, CameraError>;

    fn write(&self, item: &MediaItem, data: &[u8]) -> Result<(), CameraError> {
        fs::write(&item.path, data)
            .map_err(|e| CameraError::MediaStoreError(format!("Failed to write {}: {}", item.path.display(), e)))
    }

    /// Drop an item that never received its content
    fn delete(&self, item: &MediaItem) -> Result<(), CameraError> {
        match fs::remove_file(&item.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CameraError::MediaStoreError(format!(
                "Failed to delete {}: {}",
                item.path.display(),
                e
            ))),
        }
    }

    /// Whether the item can still be read
    fn is_accessible(&self, item: &MediaItem) -> bool;
}

/// `<prefix><yyyyMMdd_HHmmss>.<extension>`
pub fn timestamped_name<Tz: TimeZone>(prefix: &str, extension: &str, time: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!("{}{}.{}", prefix, time.format("%Y%m%d_%H%M%S"), extension)
}

pub fn photo_file_name(prefix: &str) -> String {
    timestamped_name(prefix, "jpg", &Local::now())
}

pub fn video_file_name(prefix: &str) -> String {
    timestamped_name(prefix, "mp4", &Local::now())
}

/// Newer of the two; a tie goes to the photo
pub fn select_latest(photo: Option<MediaItem>, video: Option<MediaItem>) -> Option<MediaItem> {
    match (photo, video) {
        (Some(photo), Some(video)) => {
            if photo.date_added >= video.date_added {
                Some(photo)
            } else {
                Some(video)
            }
        }
        (Some(photo), None) => Some(photo),
        (None, video) => video,
    }
}

/// Media index over two directories on the local filesystem
#[derive(Debug, Clone)]
pub struct FsMediaIndex {
    pictures_dir: PathBuf,
    movies_dir: PathBuf,
}

impl FsMediaIndex {
    pub fn new(pictures_dir: impl Into<PathBuf>, movies_dir: impl Into<PathBuf>) -> Self {
        Self {
            pictures_dir: pictures_dir.into(),
            movies_dir: movies_dir.into(),
        }
    }

    pub fn from_config(config: &crate::config::CamerakConfig) -> Self {
        Self::new(config.pictures_dir(), config.movies_dir())
    }

    fn dir_for(&self, kind: MediaKind) -> &Path {
        match kind {
            MediaKind::Image => &self.pictures_dir,
            MediaKind::Video => &self.movies_dir,
        }
    }

    fn extensions(kind: MediaKind) -> &'static [&'static str] {
        match kind {
            MediaKind::Image => &PHOTO_EXTENSIONS,
            MediaKind::Video => &VIDEO_EXTENSIONS,
        }
    }

    fn mime_for(path: &Path, kind: MediaKind) -> String {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match ext.as_str() {
            "png" => "image/png".to_string(),
            "mov" => "video/quicktime".to_string(),
            "webm" => "video/webm".to_string(),
            _ => kind.default_mime_type().to_string(),
        }
    }

    fn item_for(path: PathBuf, kind: MediaKind, date_added: i64) -> MediaItem {
        let id = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        MediaItem {
            id,
            kind,
            mime_type: Self::mime_for(&path, kind),
            path,
            date_added,
        }
    }

    /// Free name in `dir`, appending ` (n)` before the extension on collision
    fn unique_path(dir: &Path, display_name: &str) -> PathBuf {
        let candidate = dir.join(display_name);
        if !candidate.exists() {
            return candidate;
        }
        let name = Path::new(display_name);
        let stem = name.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
        let ext = name.extension().map(|e| e.to_string_lossy().into_owned());
        (1..)
            .map(|n| match &ext {
                Some(ext) => dir.join(format!("{} ({}).{}", stem, n, ext)),
                None => dir.join(format!("{} ({})", stem, n)),
            })
            .find(|p| !p.exists())
            .unwrap_or(candidate)
    }
}

fn modified_secs(metadata: &fs::Metadata) -> i64 {
    metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

impl MediaIndex for FsMediaIndex {
    fn latest(&self, kind: MediaKind) -> Result<Option<MediaItem>, CameraError> {
        let dir = self.dir_for(kind);
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let extensions = Self::extensions(kind);
        let mut best: Option<(i64, PathBuf)> = None;
        for entry in entries.flatten() {
            let path = entry.path();
            let matches_ext = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| extensions.iter().any(|x| x.eq_ignore_ascii_case(e)))
                .unwrap_or(false);
            if !matches_ext {
                continue;
            }
            let Ok(metadata) = entry.metadata() else {
                continue;
            };
            if !metadata.is_file() {
                continue;
            }
            let added = modified_secs(&metadata);
            // same second: the later name wins, timestamped names sort by time
            let newer = match &best {
                Some((best_added, best_path)) => (added, &path) > (*best_added, best_path),
                None => true,
            };
            if newer {
                best = Some((added, path));
            }
        }

        Ok(best.map(|(added, path)| Self::item_for(path, kind, added)))
    }

    fn insert(&self, kind: MediaKind, display_name: &str, mime_type: &str) -> Result<MediaItem, CameraError> {
        let dir = self.dir_for(kind);
        fs::create_dir_all(dir)
            .map_err(|e| CameraError::MediaStoreError(format!("Failed to create {}: {}", dir.display(), e)))?;

        let path = Self::unique_path(dir, display_name);
        fs::File::create(&path)
            .map_err(|e| CameraError::MediaStoreError(format!("Failed to create {}: {}", path.display(), e)))?;

        let mut item = Self::item_for(path, kind, Local::now().timestamp());
        item.mime_type = mime_type.to_string();
        log::debug!("Inserted {:?} {}", kind, item.path.display());
        Ok(item)
    }

    /// Readable and non-empty; a placeholder that never got written is not media
    fn is_accessible(&self, item: &MediaItem) -> bool {
        let mut byte = [0u8; 1];
        matches!(
            fs::File::open(&item.path).and_then(|mut f| f.read(&mut byte)),
            Ok(n) if n > 0
        )
    }
}

/// Latest-media references shown by the camera screen
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GalleryState {
    pub last_photo: Option<MediaItem>,
    pub last_video: Option<MediaItem>,
    pub latest: Option<MediaItem>,
}

impl GalleryState {
    /// Re-query the index. Failed lookups keep the previous value.
    pub fn refresh(&mut self, index: &dyn MediaIndex) {
        let photo = index.latest(MediaKind::Image);
        let video = index.latest(MediaKind::Video);

        match &photo {
            Ok(item) => self.last_photo = item.clone(),
            Err(e) => log::warn!("Failed to query latest photo: {}", e),
        }
        match &video {
            Ok(item) => self.last_video = item.clone(),
            Err(e) => log::warn!("Failed to query latest video: {}", e),
        }

        // a failed side counts as empty; with both failed the old value stays
        let (photo, video) = match (photo, video) {
            (Err(_), Err(_)) => return,
            (photo, video) => (photo.unwrap_or(None), video.unwrap_or(None)),
        };
        self.latest = select_latest(photo, video);
        log::debug!("Latest gallery media: {:?}", self.latest.as_ref().map(|m| &m.path));
    }

    /// Whether the latest item is still readable
    pub fn validate_latest(&self, index: &dyn MediaIndex) -> bool {
        match &self.latest {
            Some(item) => {
                let ok = index.is_accessible(item);
                if !ok {
                    log::debug!("Latest media {} is no longer accessible", item.path.display());
                }
                ok
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(kind: MediaKind, added: i64) -> MediaItem {
        MediaItem {
            id: format!("{:?}-{}", kind, added),
            kind,
            path: PathBuf::from(format!("/tmp/{}", added)),
            mime_type: kind.default_mime_type().to_string(),
            date_added: added,
        }
    }

    #[test]
    fn test_select_latest() {
        let photo = item(MediaKind::Image, 100);
        let video = item(MediaKind::Video, 200);
        assert_eq!(select_latest(Some(photo.clone()), Some(video.clone())), Some(video.clone()));
        assert_eq!(select_latest(Some(photo.clone()), None), Some(photo.clone()));
        assert_eq!(select_latest(None, Some(video.clone())), Some(video));
        assert_eq!(select_latest(None, None), None);
    }

    #[test]
    fn test_select_latest_tie_prefers_photo() {
        let photo = item(MediaKind::Image, 100);
        let video = item(MediaKind::Video, 100);
        assert_eq!(select_latest(Some(photo.clone()), Some(video)), Some(photo));
    }

    #[test]
    fn test_timestamped_name() {
        let time = chrono::Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        assert_eq!(timestamped_name("IMG_", "jpg", &time), "IMG_20240309_070501.jpg");
        assert_eq!(timestamped_name("VID_", "mp4", &time), "VID_20240309_070501.mp4");
    }

    #[test]
    fn test_unique_path_appends_counter() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("IMG_1.jpg"), b"x").unwrap();
        let path = FsMediaIndex::unique_path(dir.path(), "IMG_1.jpg");
        assert_eq!(path, dir.path().join("IMG_1 (1).jpg"));
    }

    struct OneSidedIndex {
        photo: Result<Option<MediaItem>, ()>,
        video: Result<Option<MediaItem>, ()>,
    }

    impl MediaIndex for OneSidedIndex {
        fn latest(&self, kind: MediaKind) -> Result<Option<MediaItem>, CameraError> {
            let side = match kind {
                MediaKind::Image => &self.photo,
                MediaKind::Video => &self.video,
            };
            side.clone()
                .map_err(|_| CameraError::PermissionDenied(format!("{:?} access denied", kind)))
        }

        fn insert(&self, _kind: MediaKind, _name: &str, _mime: &str) -> Result<MediaItem, CameraError> {
            Err(CameraError::MediaStoreError("read only".to_string()))
        }

        fn is_accessible(&self, _item: &MediaItem) -> bool {
            true
        }
    }

    #[test]
    fn test_refresh_uses_readable_side_when_other_fails() {
        let photo = item(MediaKind::Image, 100);
        let mut gallery = GalleryState::default();
        gallery.refresh(&OneSidedIndex {
            photo: Ok(Some(photo.clone())),
            video: Err(()),
        });
        assert_eq!(gallery.last_photo, Some(photo.clone()));
        assert_eq!(gallery.latest, Some(photo.clone()));

        let video = item(MediaKind::Video, 300);
        gallery.refresh(&OneSidedIndex {
            photo: Err(()),
            video: Ok(Some(video.clone())),
        });
        assert_eq!(gallery.last_photo, Some(photo));
        assert_eq!(gallery.latest, Some(video.clone()));

        gallery.refresh(&OneSidedIndex {
            photo: Err(()),
            video: Err(()),
        });
        assert_eq!(gallery.latest, Some(video));
    }

    #[test]
    fn test_empty_file_is_not_accessible() {
        let dir = tempfile::tempdir().unwrap();
        let index = FsMediaIndex::new(dir.path().join("pics"), dir.path().join("movies"));
        let item = index.insert(MediaKind::Video, "VID_1.mp4", "video/mp4").unwrap();
        assert!(!index.is_accessible(&item));

        index.write(&item, b"data").unwrap();
        assert!(index.is_accessible(&item));

        index.delete(&item).unwrap();
        assert!(!item.path.exists());
        // already gone
        index.delete(&item).unwrap();
    }

    #[test]
    fn test_missing_directory_is_empty() {
        let index = FsMediaIndex::new("/nonexistent/pics", "/nonexistent/movies");
        assert_eq!(index.latest(MediaKind::Image).unwrap(), None);
    }
}
