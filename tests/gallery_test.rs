//! Filesystem media index against temporary directories

use camerak::gallery::{FsMediaIndex, GalleryState, MediaIndex};
use camerak::types::MediaKind;
use std::fs::{self, File};
use std::path::Path;
use std::time::{Duration, SystemTime};
use tempfile::tempdir;

fn touch(path: &Path, secs_ago: u64) {
    fs::write(path, b"data").unwrap();
    let file = File::options().write(true).open(path).unwrap();
    file.set_modified(SystemTime::now() - Duration::from_secs(secs_ago)).unwrap();
}

#[test]
fn test_latest_picks_newest_matching_file() {
    let dir = tempdir().unwrap();
    let pictures = dir.path().join("Pictures");
    fs::create_dir_all(&pictures).unwrap();

    touch(&pictures.join("IMG_old.jpg"), 300);
    touch(&pictures.join("IMG_new.jpg"), 10);
    touch(&pictures.join("notes.txt"), 0);
    fs::create_dir(pictures.join("album.jpg")).unwrap();

    let index = FsMediaIndex::new(&pictures, dir.path().join("Movies"));
    let latest = index.latest(MediaKind::Image).unwrap().unwrap();
    assert_eq!(latest.id, "IMG_new.jpg");
    assert_eq!(latest.mime_type, "image/jpeg");
    assert_eq!(index.latest(MediaKind::Video).unwrap(), None);
}

#[test]
fn test_gallery_state_combines_kinds() {
    let dir = tempdir().unwrap();
    let pictures = dir.path().join("Pictures");
    let movies = dir.path().join("Movies");
    fs::create_dir_all(&pictures).unwrap();
    fs::create_dir_all(&movies).unwrap();
    touch(&pictures.join("IMG_a.png"), 100);
    touch(&movies.join("VID_a.mp4"), 50);

    let index = FsMediaIndex::new(&pictures, &movies);
    let mut gallery = GalleryState::default();
    gallery.refresh(&index);

    assert_eq!(gallery.last_photo.as_ref().unwrap().mime_type, "image/png");
    assert_eq!(gallery.latest.as_ref().unwrap().kind, MediaKind::Video);
    assert!(gallery.validate_latest(&index));

    fs::remove_file(movies.join("VID_a.mp4")).unwrap();
    assert!(!gallery.validate_latest(&index));
    gallery.refresh(&index);
    assert_eq!(gallery.latest.as_ref().unwrap().kind, MediaKind::Image);
}

#[test]
fn test_insert_creates_directory_and_avoids_collisions() {
    let dir = tempdir().unwrap();
    let index = FsMediaIndex::new(dir.path().join("Pictures"), dir.path().join("Movies"));

    let first = index.insert(MediaKind::Video, "VID_20240101_120000.mp4", "video/mp4").unwrap();
    let second = index.insert(MediaKind::Video, "VID_20240101_120000.mp4", "video/mp4").unwrap();
    assert!(first.path.exists());
    assert_eq!(second.id, "VID_20240101_120000 (1).mp4");

    index.write(&first, b"payload").unwrap();
    assert_eq!(fs::read(&first.path).unwrap(), b"payload");
    assert!(index.is_accessible(&first));
    // registered but never written
    assert!(!index.is_accessible(&second));
}
