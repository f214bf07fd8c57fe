//! Pure text transformation behind the block editor.

use super::BlockEditError;

/// A region of a text file owned by the orchestrator.
///
/// The block is identified by its start and end marker lines. Marker pairs
/// used by earlier releases can be registered as legacy pairs; they are
/// recognized and removed on the next edit so the format can evolve without
/// leaving orphaned content behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedBlock {
    start: String,
    end: String,
    legacy: Vec<(String, String)>,
}

impl ManagedBlock {
    /// Creates a block delimited by the given marker lines.
    #[must_use]
    pub fn new(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
            legacy: Vec::new(),
        }
    }

    /// Registers a marker pair from an earlier format version.
    #[must_use]
    pub fn with_legacy(mut self, start: impl Into<String>, end: impl Into<String>) -> Self {
        self.legacy.push((start.into(), end.into()));
        self
    }

    /// Returns the start marker.
    #[must_use]
    pub fn start_marker(&self) -> &str {
        &self.start
    }

    /// Returns the end marker.
    #[must_use]
    pub fn end_marker(&self) -> &str {
        &self.end
    }

    /// Renders the complete block for the given body.
    ///
    /// Every body line is newline terminated; trailing newlines on the body
    /// itself are ignored so callers may pass either form.
    #[must_use]
    pub fn render(&self, body: &str) -> String {
        let body = body.trim_end_matches(|c| c == '\n' || c == '\r');
        let mut out = String::with_capacity(self.start.len() + body.len() + self.end.len() + 3);
        out.push_str(&self.start);
        out.push('\n');
        if !body.is_empty() {
            for line in body.lines() {
                out.push_str(line);
                out.push('\n');
            }
        }
        out.push_str(&self.end);
        out.push('\n');
        out
    }

    fn validate(&self) -> Result<(), BlockEditError> {
        let pairs = std::iter::once((&self.start, &self.end)).chain(self.legacy.iter().map(|(s, e)| (s, e)));
        for (start, end) in pairs {
            for marker in [start, end] {
                if marker.trim().is_empty() {
                    return Err(BlockEditError::InvalidMarkers("markers must not be blank".into()));
                }
                if marker.contains('\n') || marker.contains('\r') {
                    return Err(BlockEditError::InvalidMarkers(format!(
                        "marker '{}' spans multiple lines",
                        marker.trim()
                    )));
                }
            }
            if start.trim() == end.trim() {
                return Err(BlockEditError::InvalidMarkers(format!(
                    "start and end marker are both '{}'",
                    start.trim()
                )));
            }
        }
        Ok(())
    }

    /// Rejects a body containing a current or legacy marker line.
    fn check_body(&self, body: &str) -> Result<(), BlockEditError> {
        let markers: Vec<&str> = [self.start.as_str(), self.end.as_str()]
            .into_iter()
            .chain(self.legacy.iter().flat_map(|(s, e)| [s.as_str(), e.as_str()]))
            .map(str::trim)
            .collect();
        for (idx, line) in body.lines().enumerate() {
            if let Some(marker) = markers.iter().find(|m| **m == line.trim()) {
                return Err(BlockEditError::InvalidBody {
                    line: idx + 1,
                    marker: (*marker).to_string(),
                });
            }
        }
        Ok(())
    }

    /// Returns the end marker that closes a block opened by `line`, if `line`
    /// is a current or legacy start marker.
    fn closing_for(&self, line: &str) -> Option<&str> {
        let line = line.trim();
        if line == self.start.trim() {
            return Some(&self.end);
        }
        self.legacy
            .iter()
            .find(|(start, _)| start.trim() == line)
            .map(|(_, end)| end.as_str())
    }
}

/// Where a freshly rendered block is placed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placement {
    /// Appended at end of file.
    AtEnd,
    /// Inserted immediately before an anchor line.
    ///
    /// With a section, the anchor is the first matching line after the
    /// section header line. A missing anchor is created at end of file,
    /// preceded by the section header when that is missing too.
    BeforeAnchor {
        /// The anchor line.
        anchor: String,
        /// Optional section header scoping the anchor search.
        section: Option<String>,
    },
}

impl Placement {
    /// Places the block before the first line equal to `anchor`.
    #[must_use]
    pub fn before(anchor: impl Into<String>) -> Self {
        Self::BeforeAnchor {
            anchor: anchor.into(),
            section: None,
        }
    }

    /// Places the block before the first `anchor` line following `section`.
    #[must_use]
    pub fn before_in_section(anchor: impl Into<String>, section: impl Into<String>) -> Self {
        Self::BeforeAnchor {
            anchor: anchor.into(),
            section: Some(section.into()),
        }
    }
}

/// File content with every recognized block removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrippedContent<'a> {
    /// Lines outside any block, each with its original terminator.
    pub kept: Vec<&'a str>,
    /// Number of blocks (current or legacy) that were dropped.
    pub removed: usize,
}

impl StrippedContent<'_> {
    /// Joins the kept lines back into file content.
    #[must_use]
    pub fn to_content(&self) -> String {
        self.kept.concat()
    }
}

/// Removes every current and legacy instance of `block` from `content`.
pub fn strip_block<'a>(content: &'a str, block: &ManagedBlock) -> Result<StrippedContent<'a>, BlockEditError> {
    block.validate()?;

    let mut kept = Vec::new();
    let mut removed = 0;
    let mut open: Option<(&str, usize)> = None;

    for (idx, line) in content.split_inclusive('\n').enumerate() {
        match open {
            Some((end, _)) => {
                if line.trim() == end.trim() {
                    open = None;
                    removed += 1;
                }
            }
            None => match block.closing_for(line) {
                Some(end) => open = Some((end, idx + 1)),
                None => kept.push(line),
            },
        }
    }

    if let Some((end, line)) = open {
        return Err(BlockEditError::UnterminatedBlock {
            path: None,
            line,
            end_marker: end.trim().to_string(),
        });
    }

    Ok(StrippedContent { kept, removed })
}

/// Produces `content` with `block` holding `body` at the requested placement.
///
/// Applying the same block and body to the result again yields the result
/// unchanged.
pub fn apply_block(
    content: &str,
    block: &ManagedBlock,
    body: &str,
    placement: &Placement,
) -> Result<String, BlockEditError> {
    let stripped = strip_block(content, block)?;
    block.check_body(body)?;
    let rendered = block.render(body);
    let mut out = String::with_capacity(content.len() + rendered.len() + 1);

    match placement {
        Placement::AtEnd => {
            stripped.kept.iter().for_each(|line| out.push_str(line));
            terminate_last_line(&mut out);
            out.push_str(&rendered);
        }
        Placement::BeforeAnchor { anchor, section } => {
            match find_anchor(&stripped.kept, anchor, section.as_deref()) {
                Some(pos) => {
                    stripped.kept[..pos].iter().for_each(|line| out.push_str(line));
                    out.push_str(&rendered);
                    stripped.kept[pos..].iter().for_each(|line| out.push_str(line));
                }
                None => {
                    stripped.kept.iter().for_each(|line| out.push_str(line));
                    terminate_last_line(&mut out);
                    if let Some(section) = section {
                        if !stripped.kept.iter().any(|line| line.trim() == section.trim()) {
                            out.push_str(section);
                            out.push('\n');
                        }
                    }
                    out.push_str(&rendered);
                    out.push_str(anchor);
                    out.push('\n');
                }
            }
        }
    }

    Ok(out)
}

fn find_anchor(lines: &[&str], anchor: &str, section: Option<&str>) -> Option<usize> {
    let from = match section {
        Some(section) => lines.iter().position(|line| line.trim() == section.trim())? + 1,
        None => 0,
    };
    lines[from..]
        .iter()
        .position(|line| line.trim() == anchor.trim())
        .map(|offset| from + offset)
}

fn terminate_last_line(out: &mut String) {
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn block_x() -> ManagedBlock {
        ManagedBlock::new("# BEGIN X", "# END X")
    }

    #[test]
    fn test_insert_into_empty_content() {
        let out = apply_block("", &block_x(), "hello", &Placement::AtEnd).unwrap();
        assert_eq!(out, "# BEGIN X\nhello\n# END X\n");
    }

    #[test]
    fn test_body_repeating_a_marker_is_rejected() {
        let err = apply_block("", &block_x(), "a\n  # END X\nb", &Placement::AtEnd).unwrap_err();
        assert!(matches!(err, BlockEditError::InvalidBody { line: 2, ref marker } if marker == "# END X"));

        let legacy = block_x().with_legacy("# OLD X START", "# OLD X END");
        let err = apply_block("keep\n", &legacy, "# OLD X START", &Placement::AtEnd).unwrap_err();
        assert!(matches!(err, BlockEditError::InvalidBody { line: 1, .. }));
    }

    #[test]
    fn test_replace_body_without_duplicating_markers() {
        let first = apply_block("", &block_x(), "hello", &Placement::AtEnd).unwrap();
        let second = apply_block(&first, &block_x(), "world", &Placement::AtEnd).unwrap();
        assert_eq!(second, "# BEGIN X\nworld\n# END X\n");
    }

    #[test]
    fn test_foreign_content_is_preserved() {
        let content = "[general]\nenabled = yes\n\n; operator note\n";
        let out = apply_block(content, &block_x(), "a\nb", &Placement::AtEnd).unwrap();
        assert_eq!(out, "[general]\nenabled = yes\n\n; operator note\n# BEGIN X\na\nb\n# END X\n");
    }

    #[test]
    fn test_missing_trailing_newline_is_terminated() {
        let out = apply_block("last line", &block_x(), "x", &Placement::AtEnd).unwrap();
        assert_eq!(out, "last line\n# BEGIN X\nx\n# END X\n");
    }

    #[test]
    fn test_block_in_middle_moves_to_end() {
        let content = "top\n# BEGIN X\nold\n# END X\nbottom\n";
        let out = apply_block(content, &block_x(), "new", &Placement::AtEnd).unwrap();
        assert_eq!(out, "top\nbottom\n# BEGIN X\nnew\n# END X\n");
    }

    #[test]
    fn test_legacy_block_is_removed() {
        let block = block_x().with_legacy("; OLD START", "; OLD END");
        let content = "keep\n; OLD START\nstale\n; OLD END\n";
        let out = apply_block(content, &block, "fresh", &Placement::AtEnd).unwrap();
        assert_eq!(out, "keep\n# BEGIN X\nfresh\n# END X\n");
    }

    #[test]
    fn test_duplicate_blocks_collapse_to_one() {
        let content = "# BEGIN X\none\n# END X\nmid\n# BEGIN X\ntwo\n# END X\n";
        let out = apply_block(content, &block_x(), "three", &Placement::AtEnd).unwrap();
        assert_eq!(out, "mid\n# BEGIN X\nthree\n# END X\n");
    }

    #[test]
    fn test_markers_match_with_surrounding_whitespace() {
        let content = "  # BEGIN X  \nold\n# END X\t\nrest\n";
        let out = apply_block(content, &block_x(), "new", &Placement::AtEnd).unwrap();
        assert_eq!(out, "rest\n# BEGIN X\nnew\n# END X\n");
    }

    #[test]
    fn test_before_existing_anchor() {
        let content = "*filter\n-A INPUT -i lo -j ACCEPT\nCOMMIT\n";
        let out = apply_block(content, &block_x(), "rule", &Placement::before("COMMIT")).unwrap();
        assert_eq!(out, "*filter\n-A INPUT -i lo -j ACCEPT\n# BEGIN X\nrule\n# END X\nCOMMIT\n");
    }

    #[test]
    fn test_anchor_is_created_when_missing() {
        let out = apply_block("head\n", &block_x(), "rule", &Placement::before("COMMIT")).unwrap();
        assert_eq!(out, "head\n# BEGIN X\nrule\n# END X\nCOMMIT\n");

        let again = apply_block(&out, &block_x(), "rule", &Placement::before("COMMIT")).unwrap();
        assert_eq!(again, out);
    }

    #[test]
    fn test_anchor_scoped_to_section() {
        let content = "*nat\n-A POSTROUTING -j MASQUERADE\nCOMMIT\n*filter\n:INPUT ACCEPT [0:0]\nCOMMIT\n";
        let placement = Placement::before_in_section("COMMIT", "*filter");
        let out = apply_block(content, &block_x(), "rule", &placement).unwrap();
        assert_eq!(
            out,
            "*nat\n-A POSTROUTING -j MASQUERADE\nCOMMIT\n*filter\n:INPUT ACCEPT [0:0]\n# BEGIN X\nrule\n# END X\nCOMMIT\n"
        );
    }

    #[test]
    fn test_missing_section_is_created() {
        let placement = Placement::before_in_section("COMMIT", "*filter");
        let out = apply_block("", &block_x(), "rule", &placement).unwrap();
        assert_eq!(out, "*filter\n# BEGIN X\nrule\n# END X\nCOMMIT\n");

        let again = apply_block(&out, &block_x(), "rule", &placement).unwrap();
        assert_eq!(again, out);
    }

    #[test]
    fn test_unterminated_block_is_rejected() {
        let content = "a\n# BEGIN X\nb\n";
        let err = apply_block(content, &block_x(), "c", &Placement::AtEnd).unwrap_err();
        match err {
            BlockEditError::UnterminatedBlock { line, end_marker, .. } => {
                assert_eq!(line, 2);
                assert_eq!(end_marker, "# END X");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_invalid_markers_are_rejected() {
        let same = ManagedBlock::new("# X", "# X");
        assert!(matches!(
            apply_block("", &same, "", &Placement::AtEnd),
            Err(BlockEditError::InvalidMarkers(_))
        ));

        let blank = ManagedBlock::new("  ", "# END");
        assert!(strip_block("", &blank).is_err());
    }

    #[test]
    fn test_empty_body_renders_markers_only() {
        assert_eq!(block_x().render(""), "# BEGIN X\n# END X\n");
        assert_eq!(block_x().render("a\n\nb\n"), "# BEGIN X\na\n\nb\n# END X\n");
    }

    #[test]
    fn test_strip_reports_removed_blocks() {
        let stripped = strip_block("a\n# BEGIN X\nb\n# END X\nc", &block_x()).unwrap();
        assert_eq!(stripped.removed, 1);
        assert_eq!(stripped.to_content(), "a\nc");
    }

    fn foreign_lines() -> impl Strategy<Value = Vec<String>> {
        prop::collection::vec("[a-z =;\\[\\]]{0,16}", 0..24)
    }

    proptest! {
        #[test]
        fn prop_upsert_is_idempotent(lines in foreign_lines(), body in "[a-z\\n]{0,40}") {
            let content = lines.join("\n");
            let once = apply_block(&content, &block_x(), &body, &Placement::AtEnd).unwrap();
            let twice = apply_block(&once, &block_x(), &body, &Placement::AtEnd).unwrap();
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn prop_anchored_upsert_is_idempotent(lines in foreign_lines(), body in "[a-z\\n]{0,40}") {
            let content = lines.join("\n");
            let placement = Placement::before_in_section("COMMIT", "*filter");
            let once = apply_block(&content, &block_x(), &body, &placement).unwrap();
            let twice = apply_block(&once, &block_x(), &body, &placement).unwrap();
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn prop_foreign_content_survives_repeated_upserts(
            lines in foreign_lines(),
            bodies in prop::collection::vec("[a-z]{0,12}", 1..5),
        ) {
            let original: String = lines.iter().map(|l| format!("{l}\n")).collect();
            let mut current = original.clone();
            for body in &bodies {
                current = apply_block(&current, &block_x(), body, &Placement::AtEnd).unwrap();
            }
            let stripped = strip_block(&current, &block_x()).unwrap();
            prop_assert_eq!(stripped.to_content(), original);
            prop_assert_eq!(stripped.removed, 1);
        }
    }
}
