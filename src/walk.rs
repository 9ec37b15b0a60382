//! Recursive traversal over any [`Fs`]

use std::pin::Pin;

use async_stream::try_stream;
use futures::Stream;

use crate::error::Result;
use crate::fs::{FileInfo, Fs};

/// Stream of `(path, info)` pairs produced by [`walk`]
pub type WalkStream<'a> = Pin<Box<dyn Stream<Item = Result<(String, FileInfo)>> + Send + 'a>>;

/// Walk the tree rooted at `root`, joining names with `/`.
///
/// See [`walk_with_separator`].
pub fn walk<'a, F: Fs + ?Sized>(fs: &'a F, root: &str) -> WalkStream<'a> {
    walk_with_separator(fs, root, "/")
}

/// Walk the tree rooted at `root` depth-first.
///
/// The root is yielded first, then each directory's entries in lexical
/// order, each directory immediately followed by its contents. The first
/// error ends the stream.
pub fn walk_with_separator<'a, F: Fs + ?Sized>(
    fs: &'a F,
    root: &str,
    separator: &str,
) -> WalkStream<'a> {
    let root = root.to_string();
    let separator = separator.to_string();

    Box::pin(try_stream! {
        let info = fs.stat(&root).await?;
        let mut stack = vec![(root, info)];

        while let Some((path, info)) = stack.pop() {
            let is_dir = info.is_dir();
            yield (path.clone(), info);

            if !is_dir {
                continue;
            }

            let mut dir = fs.open(&path).await?;
            // A key that is both an object and a prefix opens as the object;
            // its children are not reachable by path, so skip them
            if !dir.stat().await?.is_dir() {
                dir.close().await?;
                continue;
            }
            let listed = dir.read_dir(None).await;
            dir.close().await?;

            let mut entries = listed?;
            entries.sort_by(|a, b| a.name.cmp(&b.name));
            // Pushed in reverse so the smallest name pops first
            for entry in entries.into_iter().rev() {
                let child = join(&path, &entry.name, &separator);
                stack.push((child, entry));
            }
        }
    })
}

fn join(parent: &str, name: &str, separator: &str) -> String {
    if parent.is_empty() || parent.ends_with(separator) {
        format!("{}{}", parent, name)
    } else {
        format!("{}{}{}", parent, separator, name)
    }
}
