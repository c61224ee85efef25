//! In-memory model of a segmented GMT-style document: free header lines,
//! then blocks of one `# @D...` metadata line plus vertex rows, each block
//! preceded by a `>` sentinel.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::warn;

use crate::cursor::{starts_numeric, LineCursor};

#[derive(Debug, Clone)]
pub struct Vertex {
    /// The line as read, for stages that copy rows through verbatim.
    pub raw: String,
    pub c1: f64,
    pub c2: f64,
}

#[derive(Debug, Clone)]
pub struct Block {
    /// The raw `# @D...` metadata line.
    pub metadata: String,
    pub vertices: Vec<Vertex>,
    /// Non-numeric, non-metadata lines found inside the block, preserved so
    /// a rewrite can carry them with the block instead of relocating them.
    pub trailing: Vec<String>,
}

impl Block {
    /// Feature-class name: second pipe-delimited field of the metadata line.
    /// `None` when the record is too short to carry one.
    pub fn feature_class(&self) -> Option<&str> {
        self.metadata.split('|').nth(1)
    }
}

#[derive(Debug)]
pub struct SegmentedDocument {
    /// File name the document was read from, used for catalog entries.
    pub name: String,
    /// Lines preceding the first block, preserved verbatim.
    pub header: Vec<String>,
    pub blocks: Vec<Block>,
    /// Sentinel (`>`) lines seen while reading. Must equal the block count;
    /// a mismatch is a recoverable anomaly, not an error.
    pub sentinels: usize,
    /// Stray sentinels dropped by the repair heuristic.
    pub repaired: usize,
}

impl SegmentedDocument {
    pub fn read(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading document {}", path.display()))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self::parse(&name, &text))
    }

    pub fn parse(name: &str, text: &str) -> Self {
        let mut cursor = LineCursor::new(text);
        let mut header = Vec::new();
        let mut blocks: Vec<Block> = Vec::new();
        let mut sentinels = 0usize;
        let mut repaired = 0usize;

        while let Some(line) = cursor.advance() {
            if line.starts_with('>') {
                // A sentinel inside a block that is not followed by metadata
                // is a stray delimiter; drop it once and keep filling the
                // current block.
                let next_is_data = cursor.peek().is_some_and(starts_numeric);
                if next_is_data && blocks.last().is_some_and(|b| !b.vertices.is_empty()) {
                    warn!("{name}: stray '>' inside block {}, dropped", blocks.len() - 1);
                    repaired += 1;
                } else {
                    sentinels += 1;
                }
            } else if line.contains("@D") && !starts_numeric(line) {
                blocks.push(Block {
                    metadata: line.to_string(),
                    vertices: Vec::new(),
                    trailing: Vec::new(),
                });
            } else if starts_numeric(line) {
                let mut it = line.split_whitespace();
                let c1 = it.next().and_then(|t| t.parse().ok());
                let c2 = it.next().and_then(|t| t.parse().ok());
                match (blocks.last_mut(), c1, c2) {
                    (Some(block), Some(c1), Some(c2)) => block.vertices.push(Vertex {
                        raw: line.to_string(),
                        c1,
                        c2,
                    }),
                    _ => warn!("{name}: unattached or malformed vertex row skipped: {line}"),
                }
            } else if let Some(block) = blocks.last_mut() {
                // Stray line after data started stays with its block.
                block.trailing.push(line.to_string());
            } else {
                header.push(line.to_string());
            }
        }

        Self {
            name: name.to_string(),
            header,
            blocks,
            sentinels,
            repaired,
        }
    }

    /// True when sentinel delimiters and blocks do not pair up one-to-one.
    pub fn sentinel_mismatch(&self) -> bool {
        self.sentinels != self.blocks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = "\
# @VGMT1.0 @GLINESTRING
# FEATURE_DATA
>
# @D0|Base_Cenozoic|a|b|
0.5 -2.0
0.6 2.0
>
# @D0|Top_Basement|c|d|
1.0 3.0
";

    #[test]
    fn parses_header_blocks_and_sentinels() {
        let doc = SegmentedDocument::parse("t.gmt", DOC);
        assert_eq!(doc.header.len(), 2);
        assert_eq!(doc.blocks.len(), 2);
        assert_eq!(doc.sentinels, 2);
        assert!(!doc.sentinel_mismatch());
        assert_eq!(doc.blocks[0].feature_class(), Some("Base_Cenozoic"));
        assert_eq!(doc.blocks[0].vertices.len(), 2);
        assert_eq!(doc.blocks[0].vertices[1].c2, 2.0);
        assert_eq!(doc.blocks[1].vertices[0].raw, "1.0 3.0");
    }

    #[test]
    fn stray_sentinel_is_repaired() {
        let text = "\
>
# @D0|Base_Cenozoic|
0.5 1.0
>
0.6 2.0
>
# @D0|Top_Basement|
1.0 3.0
";
        let doc = SegmentedDocument::parse("t.gmt", text);
        assert_eq!(doc.blocks.len(), 2);
        assert_eq!(doc.blocks[0].vertices.len(), 2);
        assert_eq!(doc.repaired, 1);
        assert_eq!(doc.sentinels, 2);
    }

    #[test]
    fn stray_lines_stay_with_their_block() {
        let text = "\
# header
>
# @D0|Base_Cenozoic|
0.5 1.0
# a stray remark
0.6 2.0
";
        let doc = SegmentedDocument::parse("t.gmt", text);
        assert_eq!(doc.header, vec!["# header".to_string()]);
        assert_eq!(doc.blocks[0].trailing, vec!["# a stray remark".to_string()]);
        assert_eq!(doc.blocks[0].vertices.len(), 2);
    }

    #[test]
    fn mismatch_is_reported_not_fatal() {
        let text = "\
# header
# @D0|Base_Cenozoic|
0.5 1.0
";
        let doc = SegmentedDocument::parse("t.gmt", text);
        assert_eq!(doc.blocks.len(), 1);
        assert_eq!(doc.sentinels, 0);
        assert!(doc.sentinel_mismatch());
    }

    #[test]
    fn short_metadata_has_no_class() {
        let doc = SegmentedDocument::parse("t.gmt", ">\n# @D0\n1 2\n");
        assert_eq!(doc.blocks[0].feature_class(), None);
    }

    #[test]
    fn empty_document() {
        let doc = SegmentedDocument::parse("t.gmt", "");
        assert!(doc.blocks.is_empty());
        assert!(doc.header.is_empty());
        assert!(!doc.sentinel_mismatch());
    }
}
