//! Directory emulation over flat object keys

mod common;

use common::*;
use futures::TryStreamExt;
use gcs_vfs::fs::{Fs, DEFAULT_DIR_MODE};
use gcs_vfs::walk::{walk, walk_with_separator};
use gcs_vfs::{Result, VfsError};

/// Test that writing a nested file makes its ancestors visible as directories
#[tokio::test]
async fn test_implicit_directories() -> Result<()> {
    let fs = memory_fs();
    write_str(&fs, "/bucket/a/b/c.txt", "deep").await?;

    assert!(fs.stat("/bucket/a").await?.is_dir());
    assert!(fs.stat("/bucket/a/b").await?.is_dir());
    assert!(fs.stat("/bucket").await?.is_dir());
    assert_eq!(list_names(&fs, "/bucket/a").await?, vec!["b"]);
    Ok(())
}

/// Test mkdir / mkdir_all and their failure modes
#[tokio::test]
async fn test_mkdir_semantics() -> Result<()> {
    let fs = memory_fs();

    fs.mkdir("/bucket/docs", DEFAULT_DIR_MODE).await?;
    assert!(fs.stat("/bucket/docs").await?.is_dir());
    assert!(list_names(&fs, "/bucket/docs").await?.is_empty());

    assert!(matches!(
        fs.mkdir("/bucket/docs", DEFAULT_DIR_MODE).await,
        Err(VfsError::AlreadyExists(_))
    ));
    assert!(matches!(
        fs.mkdir("/bucket/missing/child", DEFAULT_DIR_MODE).await,
        Err(VfsError::NotFound(_))
    ));

    fs.mkdir_all("/bucket/x/y/z", DEFAULT_DIR_MODE).await?;
    assert!(fs.stat("/bucket/x/y/z").await?.is_dir());

    write_str(&fs, "/bucket/plain", "").await?;
    assert!(matches!(
        fs.mkdir_all("/bucket/plain/sub", DEFAULT_DIR_MODE).await,
        Err(VfsError::NotADirectory(_))
    ));
    Ok(())
}

/// Test that a directory must be empty for remove but not for remove_all
#[tokio::test]
async fn test_remove_directories() -> Result<()> {
    let fs = memory_fs();
    fs.mkdir_all("/bucket/tree/branch", DEFAULT_DIR_MODE).await?;
    write_str(&fs, "/bucket/tree/branch/leaf", "x").await?;
    write_str(&fs, "/bucket/treetop", "sibling").await?;

    assert!(matches!(
        fs.remove("/bucket/tree").await,
        Err(VfsError::NotEmpty(_))
    ));

    fs.remove_all("/bucket/tree").await?;
    assert_not_exists(&fs, "/bucket/tree").await;
    assert_not_exists(&fs, "/bucket/tree/branch/leaf").await;
    assert_eq!(read_string(&fs, "/bucket/treetop").await?, "sibling");

    // Already gone is fine
    fs.remove_all("/bucket/tree").await?;
    Ok(())
}

/// Test rename of a whole directory tree
#[tokio::test]
async fn test_rename_directory() -> Result<()> {
    let fs = memory_fs();
    fs.mkdir_all("/bucket/src/empty", DEFAULT_DIR_MODE).await?;
    write_str(&fs, "/bucket/src/one.txt", "1").await?;
    write_str(&fs, "/bucket/src/nested/two.txt", "2").await?;

    fs.rename("/bucket/src", "/bucket/dst").await?;

    assert_not_exists(&fs, "/bucket/src").await;
    assert_eq!(
        list_names(&fs, "/bucket/dst").await?,
        vec!["empty", "nested", "one.txt"]
    );
    assert_eq!(read_string(&fs, "/bucket/dst/nested/two.txt").await?, "2");
    Ok(())
}

/// Test rename conflicts for directories
#[tokio::test]
async fn test_rename_directory_conflicts() -> Result<()> {
    let fs = memory_fs();
    write_str(&fs, "/bucket/d/f", "").await?;
    write_str(&fs, "/bucket/occupied/g", "").await?;
    write_str(&fs, "/bucket/file", "").await?;

    assert!(matches!(
        fs.rename("/bucket/d", "/bucket/occupied").await,
        Err(VfsError::NotEmpty(_))
    ));
    assert!(matches!(
        fs.rename("/bucket/d", "/bucket/file").await,
        Err(VfsError::NotADirectory(_))
    ));
    assert!(matches!(
        fs.rename("/bucket/file", "/bucket/d").await,
        Err(VfsError::IsADirectory(_))
    ));
    assert!(matches!(
        fs.rename("/bucket/d", "/bucket/d/inside").await,
        Err(VfsError::InvalidArgument(_))
    ));
    Ok(())
}

/// Test that opening a directory for writing fails
#[tokio::test]
async fn test_directory_not_writable() -> Result<()> {
    let fs = memory_fs();
    fs.mkdir("/bucket/dir", DEFAULT_DIR_MODE).await?;
    assert!(matches!(
        fs.create("/bucket/dir").await,
        Err(VfsError::IsADirectory(_))
    ));
    Ok(())
}

/// Test recursive traversal through the adapter
#[tokio::test]
async fn test_walk_through_adapter() -> Result<()> {
    let fs = memory_fs();
    write_str(&fs, "/bucket/w/b.txt", "").await?;
    write_str(&fs, "/bucket/w/a/x.txt", "").await?;

    let paths: Vec<String> = walk(&fs, "/bucket/w")
        .map_ok(|(path, _)| path)
        .try_collect()
        .await?;
    assert_eq!(
        paths,
        vec!["/bucket/w", "/bucket/w/a", "/bucket/w/a/x.txt", "/bucket/w/b.txt"]
    );
    Ok(())
}

/// Test that a custom folder separator changes how keys are split
#[tokio::test]
async fn test_custom_separator() -> Result<()> {
    let fs = memory_fs_with_separator(":");
    fs.mkdir_all("bucket:photos:2024", DEFAULT_DIR_MODE).await?;
    write_str(&fs, "bucket:photos:2024:beach.jpg", "jpeg").await?;
    write_str(&fs, "bucket:photos:index", "list").await?;

    assert_eq!(list_names(&fs, "bucket:photos").await?, vec!["2024", "index"]);
    assert_eq!(
        list_names(&fs, "bucket:photos:2024").await?,
        vec!["beach.jpg"]
    );

    let paths: Vec<String> = walk_with_separator(&fs, "bucket:photos", ":")
        .map_ok(|(path, _)| path)
        .try_collect()
        .await?;
    assert_eq!(
        paths,
        vec![
            "bucket:photos",
            "bucket:photos:2024",
            "bucket:photos:2024:beach.jpg",
            "bucket:photos:index",
        ]
    );

    fs.rename("bucket:photos", "bucket:archive").await?;
    assert_eq!(
        read_string(&fs, "bucket:archive:2024:beach.jpg").await?,
        "jpeg"
    );
    assert_not_exists(&fs, "bucket:photos").await;
    Ok(())
}
