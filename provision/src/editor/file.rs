//! File-level block operations.

use super::{apply_block, atomic_write, strip_block, BlockEditError, ManagedBlock, Placement};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use tracing::debug;

/// The effect of a block operation on its target file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOutcome {
    /// The file already had the requested content and was not rewritten.
    Unchanged,
    /// The file was created or replaced.
    Written,
}

impl EditOutcome {
    /// Returns true if the file was rewritten.
    #[must_use]
    pub fn changed(self) -> bool {
        matches!(self, Self::Written)
    }
}

/// The content a block operation would leave in a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedEdit {
    /// The complete file content after the edit.
    pub content: String,
    /// Whether committing the plan rewrites the file.
    pub outcome: EditOutcome,
}

/// Computes what [`upsert_block`] would write to `path` without touching it.
///
/// A missing file is treated as empty.
pub fn plan_block(
    path: &Path,
    block: &ManagedBlock,
    body: &str,
    placement: &Placement,
) -> Result<PlannedEdit, BlockEditError> {
    let original = read_existing(path)?;
    let content = apply_block(original.as_deref().unwrap_or(""), block, body, placement)
        .map_err(|e| e.in_file(path))?;
    let outcome = if original.as_deref() == Some(content.as_str()) {
        EditOutcome::Unchanged
    } else {
        EditOutcome::Written
    };
    Ok(PlannedEdit { content, outcome })
}

/// Writes a planned edit to `path`. Unchanged plans leave the file alone.
pub fn commit_edit(path: &Path, plan: &PlannedEdit) -> Result<EditOutcome, BlockEditError> {
    if !plan.outcome.changed() {
        debug!(path = %path.display(), "Managed block already current");
        return Ok(EditOutcome::Unchanged);
    }

    atomic_write(path, plan.content.as_bytes()).map_err(|source| BlockEditError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), "Managed block written");
    Ok(EditOutcome::Written)
}

/// Inserts or replaces `block` in `path` with the given body.
///
/// A missing file is treated as empty. Nothing is written unless the whole
/// file was read and parsed, and nothing is written when the result equals
/// the current content.
pub fn upsert_block(
    path: &Path,
    block: &ManagedBlock,
    body: &str,
    placement: &Placement,
) -> Result<EditOutcome, BlockEditError> {
    let plan = plan_block(path, block, body, placement)?;
    debug!(
        path = %path.display(),
        marker = block.start_marker(),
        changed = plan.outcome.changed(),
        "Managed block planned"
    );
    commit_edit(path, &plan)
}

/// Deletes `block` (and any legacy instances) from `path`.
///
/// A missing file, or a file without the block, is left alone.
pub fn remove_block(path: &Path, block: &ManagedBlock) -> Result<EditOutcome, BlockEditError> {
    let Some(original) = read_existing(path)? else {
        return Ok(EditOutcome::Unchanged);
    };

    let stripped = strip_block(&original, block).map_err(|e| e.in_file(path))?;
    if stripped.removed == 0 {
        return Ok(EditOutcome::Unchanged);
    }

    atomic_write(path, stripped.to_content().as_bytes()).map_err(|source| BlockEditError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), removed = stripped.removed, "Managed block removed");
    Ok(EditOutcome::Written)
}

fn read_existing(path: &Path) -> Result<Option<String>, BlockEditError> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(source) => Err(BlockEditError::Read {
            path: path.to_path_buf(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn block() -> ManagedBlock {
        ManagedBlock::new("# BEGIN X", "# END X")
    }

    #[test]
    fn test_upsert_creates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("target.conf");

        let outcome = upsert_block(&path, &block(), "hello", &Placement::AtEnd).unwrap();

        assert_eq!(outcome, EditOutcome::Written);
        assert_eq!(fs::read_to_string(&path).unwrap(), "# BEGIN X\nhello\n# END X\n");
    }

    #[test]
    fn test_upsert_twice_is_byte_identical_and_skips_write() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("target.conf");
        fs::write(&path, "[general]\nenabled = yes\n").unwrap();

        upsert_block(&path, &block(), "hello", &Placement::AtEnd).unwrap();
        let first = fs::read(&path).unwrap();
        let outcome = upsert_block(&path, &block(), "hello", &Placement::AtEnd).unwrap();

        assert_eq!(outcome, EditOutcome::Unchanged);
        assert_eq!(fs::read(&path).unwrap(), first);
    }

    #[test]
    fn test_plan_leaves_file_alone_until_committed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("target.conf");
        fs::write(&path, "keep\n").unwrap();

        let plan = plan_block(&path, &block(), "hello", &Placement::AtEnd).unwrap();

        assert_eq!(plan.outcome, EditOutcome::Written);
        assert_eq!(plan.content, "keep\n# BEGIN X\nhello\n# END X\n");
        assert_eq!(fs::read_to_string(&path).unwrap(), "keep\n");

        assert_eq!(commit_edit(&path, &plan).unwrap(), EditOutcome::Written);
        assert_eq!(fs::read_to_string(&path).unwrap(), plan.content);
        let again = plan_block(&path, &block(), "hello", &Placement::AtEnd).unwrap();
        assert_eq!(again.outcome, EditOutcome::Unchanged);
    }

    #[test]
    fn test_upsert_replaces_body() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("target.conf");

        upsert_block(&path, &block(), "hello", &Placement::AtEnd).unwrap();
        upsert_block(&path, &block(), "world", &Placement::AtEnd).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "# BEGIN X\nworld\n# END X\n");
    }

    #[test]
    fn test_unterminated_block_leaves_file_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("target.conf");
        let content = "keep\n# BEGIN X\ndangling\n";
        fs::write(&path, content).unwrap();

        let err = upsert_block(&path, &block(), "new", &Placement::AtEnd).unwrap_err();

        assert!(err.to_string().contains("target.conf"));
        assert_eq!(fs::read_to_string(&path).unwrap(), content);
    }

    #[test]
    fn test_unreadable_target_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        // A directory cannot be read as a file.
        let err = upsert_block(dir.path(), &block(), "x", &Placement::AtEnd).unwrap_err();
        assert!(matches!(err, BlockEditError::Read { .. }));
    }

    #[test]
    fn test_remove_block() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("target.conf");
        fs::write(&path, "a\n# BEGIN X\nb\n# END X\nc\n").unwrap();

        assert_eq!(remove_block(&path, &block()).unwrap(), EditOutcome::Written);
        assert_eq!(fs::read_to_string(&path).unwrap(), "a\nc\n");
        assert_eq!(remove_block(&path, &block()).unwrap(), EditOutcome::Unchanged);
    }

    #[test]
    fn test_remove_from_missing_file_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.conf");

        assert_eq!(remove_block(&path, &block()).unwrap(), EditOutcome::Unchanged);
        assert!(!path.exists());
    }
}
