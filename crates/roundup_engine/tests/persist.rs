use std::fs;

use roundup_engine::{ensure_dir, AtomicFileWriter, DownloadedArtifact, PersistError};
use tempfile::TempDir;

#[test]
fn creates_missing_dir() {
    let temp = TempDir::new().unwrap();
    let new_dir = temp.path().join("downloads");
    assert!(!new_dir.exists());
    ensure_dir(&new_dir).unwrap();
    assert!(new_dir.is_dir());
}

#[test]
fn atomic_write_replaces_existing() {
    let temp = TempDir::new().unwrap();
    let writer = AtomicFileWriter::new(temp.path().to_path_buf());

    let first = writer.write("state.ron", b"hello").unwrap();
    assert_eq!(first.file_name().unwrap(), "state.ron");
    assert_eq!(fs::read(&first).unwrap(), b"hello");

    let second = writer.write("state.ron", b"world").unwrap();
    assert_eq!(first, second);
    assert_eq!(fs::read(&second).unwrap(), b"world");
}

#[test]
fn no_partial_file_on_error() {
    let temp = TempDir::new().unwrap();
    let file_path = temp.path().join("not_a_dir");
    fs::write(&file_path, "x").unwrap();

    let writer = AtomicFileWriter::new(file_path.clone());
    let result = writer.write("roundup.pdf", b"data");
    assert!(matches!(result, Err(PersistError::Dir(_))));
    assert!(!file_path.with_file_name("roundup.pdf").exists());
}

#[test]
fn rejects_names_with_path_separators() {
    let temp = TempDir::new().unwrap();
    let writer = AtomicFileWriter::new(temp.path().to_path_buf());

    for name in ["", "..", "../escape.pdf", "nested/file.pdf"] {
        assert!(matches!(
            writer.write(name, b"data"),
            Err(PersistError::FileName(_))
        ));
    }
}

#[test]
fn artifact_saves_under_its_own_name() {
    let temp = TempDir::new().unwrap();
    let artifact = DownloadedArtifact {
        filename: "Reading-Roundup-5.pdf".to_string(),
        bytes: vec![1, 2, 3],
    };

    let path = artifact.save(&temp.path().join("out")).unwrap();
    assert_eq!(path, temp.path().join("out").join("Reading-Roundup-5.pdf"));
    assert_eq!(fs::read(path).unwrap(), vec![1, 2, 3]);
}
