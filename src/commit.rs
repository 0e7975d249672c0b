//! Atomic multi-file commits.
//!
//! [`commit_files`] writes N files as exactly one commit on the branch, or
//! leaves the branch untouched. The steps run in a fixed order:
//!
//! 1. resolve the branch head
//! 2. resolve the head commit's tree (the base tree)
//! 3. upload one blob per file, concurrently
//! 4. create one tree layering the blobs onto the base tree
//! 5. create one commit on that tree, parented on the head from step 1
//! 6. move the branch ref to the new commit
//!
//! The ref move is last, so a failure in steps 1-5 leaves the branch as it
//! was. Objects created before a failure stay behind unreferenced; the remote
//! store is content-addressed and collects them. A failed step 6 is not
//! retried. Step 6 only fast-forwards: if another writer moved the branch
//! after step 1 the remote refuses and the call fails with
//! [`StoreError::Conflict`].

use std::collections::HashSet;

use futures_util::future::try_join_all;
use tracing::{debug, info};

use crate::error::StoreError;
use crate::models::{to_file_text, FileChange, Revision};
use crate::remote::{GitDataApi, TreeEntry};

/// Persists every file in `files` in a single commit with `message`.
///
/// Returns the new commit's revision.
pub async fn commit_files(
    api: &dyn GitDataApi,
    files: &[FileChange],
    message: &str,
) -> Result<Revision, StoreError> {
    if files.is_empty() {
        return Err(StoreError::BadRequest("nothing to commit".to_string()));
    }
    let mut seen = HashSet::new();
    for file in files {
        if !seen.insert(file.path.as_str()) {
            return Err(StoreError::BadRequest(format!(
                "duplicate path in commit: {}",
                file.path
            )));
        }
    }
    // Serialize up front so a bad document never reaches the remote.
    let texts = files
        .iter()
        .map(|f| to_file_text(&f.content))
        .collect::<Result<Vec<_>, _>>()?;

    // 1. branch head
    let head = api.get_branch_head().await?;
    // 2. base tree
    let base_tree = api.get_commit_tree(&head).await?;
    debug!(target: "docstore::commit", "head {} base tree {}", head, base_tree);

    // 3. blobs (independent objects, uploaded together)
    let blobs = try_join_all(texts.iter().map(|text| api.create_blob(text))).await?;
    let entries: Vec<TreeEntry> = files
        .iter()
        .zip(blobs)
        .map(|(file, revision)| TreeEntry {
            path: file.path.clone(),
            revision,
        })
        .collect();

    // 4. tree
    let tree = api.create_tree(&base_tree, &entries).await?;
    // 5. commit
    let commit = api.create_commit(message, &tree, &head).await?;
    // 6. ref move
    api.update_branch_head(&commit).await?;

    info!(
        target: "docstore::commit",
        "committed {} file(s) as {}: {}",
        files.len(),
        commit,
        message
    );
    Ok(commit)
}
