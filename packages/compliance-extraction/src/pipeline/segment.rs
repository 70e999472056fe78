//! Segmenter - split page text into bounded, section-labelled chunks.
//!
//! Three modes are supported (see [`SegmentMode`]). All of them share one
//! accumulator that guarantees `chunk.char_len() <= max_chars`. Paragraphs
//! are appended whole, so a full buffer is flushed at a paragraph break;
//! paragraphs longer than the room left after the carried overlap are
//! pre-split at the last sentence end, or hard cut when there is none.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::types::chunk::Chunk;
use crate::types::config::{SegmentMode, SegmenterConfig};
use crate::types::page::Page;

/// Section label used before the first heading.
pub const UNKNOWN_SECTION: &str = "Unknown";

/// Longest line that can still be a heading.
const MAX_HEADING_CHARS: usize = 100;

static RE_SECTION_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?i:section|sec\.|§|article|part)\s*[A-Za-z0-9IVX]").unwrap()
});

static RE_OUTLINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[A-Z]\.\d+(?:\.\d+)*|\d+(?:\.\d+)+\.?|\d+\.)(?:\s+\S.*)?$").unwrap()
});

static RE_PAGE_FOOTER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^page\s+\d+").unwrap());

static RE_PARAGRAPH_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n[ \t\r]*\n").unwrap());

/// Split pages into chunks according to `config`.
///
/// Pages are processed in page-number order; whitespace-only pages
/// contribute nothing. Empty input yields no chunks.
pub fn segment(pages: &[Page], config: &SegmenterConfig) -> Vec<Chunk> {
    let mut pages: Vec<&Page> = pages.iter().filter(|p| !p.is_blank()).collect();
    pages.sort_by_key(|p| p.number);

    let chunks = match config.mode {
        SegmentMode::HeadingAware => heading_aware(&pages, config),
        SegmentMode::PerPage => per_page(&pages, config),
        SegmentMode::PageGroups { pages_per_chunk } => {
            page_groups(&pages, config, pages_per_chunk.max(1))
        }
    };

    debug!(
        pages = pages.len(),
        chunks = chunks.len(),
        mode = ?config.mode,
        "Segmented document"
    );

    chunks
}

/// Heading-aware segmentation across page boundaries.
///
/// Blank-line separated paragraphs are the unit of accumulation, so a size
/// flush lands on a paragraph break. Wrapped lines inside a paragraph are
/// only scanned for headings, which start a new section and a new paragraph.
fn heading_aware(pages: &[&Page], config: &SegmenterConfig) -> Vec<Chunk> {
    let mut builder = ChunkBuilder::new(config, "\n\n");

    for page in pages {
        for paragraph in paragraphs(&page.text) {
            let mut lines: Vec<&str> = Vec::new();

            for line in paragraph.lines().map(str::trim_end) {
                if line.trim().is_empty() {
                    continue;
                }
                if is_heading_line(line) {
                    if !lines.is_empty() {
                        builder.push(&lines.join("\n"), page.number);
                        lines.clear();
                    }
                    builder.flush(true);
                    builder.section = line.trim().to_string();
                }
                lines.push(line);
            }

            if !lines.is_empty() {
                builder.push(&lines.join("\n"), page.number);
            }
        }
    }

    builder.finish()
}

/// One chunk per page, splitting oversized pages at paragraph boundaries.
fn per_page(pages: &[&Page], config: &SegmenterConfig) -> Vec<Chunk> {
    let mut builder = ChunkBuilder::new(config, "\n\n");

    for page in pages {
        let first = builder.chunks.len();

        if page.text.chars().count() <= builder.max_chars {
            builder.push_fragment(&page.text, page.number, false);
        } else {
            for paragraph in paragraphs(&page.text) {
                builder.push(paragraph, page.number);
            }
        }
        builder.flush(false);

        let parts = builder.chunks.len() - first;
        for (i, chunk) in builder.chunks[first..].iter_mut().enumerate() {
            chunk.section = if parts == 1 {
                format!("Page {}", page.number)
            } else {
                format!("Page {} (part {}/{})", page.number, i + 1, parts)
            };
        }
    }

    builder.finish()
}

/// N pages per chunk, each page prefixed with a `[Page k]` marker.
fn page_groups(pages: &[&Page], config: &SegmenterConfig, pages_per_chunk: usize) -> Vec<Chunk> {
    let mut builder = ChunkBuilder::new(config, "\n\n");

    for group in pages.chunks(pages_per_chunk) {
        let first = builder.chunks.len();

        for page in group {
            builder.push(&format!("[Page {}]", page.number), page.number);
            for paragraph in paragraphs(&page.text) {
                builder.push(paragraph, page.number);
            }
        }
        builder.flush(false);

        for chunk in &mut builder.chunks[first..] {
            chunk.section = if chunk.start_page == chunk.end_page {
                format!("Page {}", chunk.start_page)
            } else {
                format!("Pages {}-{}", chunk.start_page, chunk.end_page)
            };
        }
    }

    builder.finish()
}

fn paragraphs(text: &str) -> impl Iterator<Item = &str> {
    RE_PARAGRAPH_BREAK
        .split(text)
        .filter(|p| !p.trim().is_empty())
}

/// Whether a line looks like a section heading.
///
/// Accepts explicit `Section`/`Sec.`/`§`/`Article`/`Part` prefixes, numeric
/// outline prefixes (`3.2.1 Title`, `L.4`), mostly-uppercase short lines and
/// short title-case lines without terminal punctuation.
pub fn is_heading_line(line: &str) -> bool {
    let line = line.trim();
    if line.is_empty() || line.chars().count() > MAX_HEADING_CHARS {
        return false;
    }

    if RE_SECTION_PREFIX.is_match(line) {
        return true;
    }

    let sentence_like = line.ends_with(['.', ';', ',']) && line.split_whitespace().count() > 1;

    if RE_OUTLINE.is_match(line) {
        return !sentence_like;
    }

    if RE_PAGE_FOOTER.is_match(line) {
        return false;
    }

    let letters: Vec<char> = line.chars().filter(|c| c.is_alphabetic()).collect();
    if letters.len() >= 3 {
        let upper = letters.iter().filter(|c| c.is_uppercase()).count();
        if upper * 5 >= letters.len() * 4 {
            return true;
        }
    }

    is_title_case(line) && !sentence_like && !line.ends_with(['.', '!', '?'])
}

fn is_title_case(line: &str) -> bool {
    let words: Vec<&str> = line.split_whitespace().collect();
    if words.is_empty() || words.len() > 8 || line.chars().count() > 60 {
        return false;
    }
    if !line.chars().next().is_some_and(|c| c.is_uppercase()) {
        return false;
    }

    let mut significant = 0;
    for word in &words {
        let alpha: String = word.chars().filter(|c| c.is_alphabetic()).collect();
        if alpha.chars().count() < 4 {
            continue;
        }
        significant += 1;
        if !alpha.chars().next().is_some_and(|c| c.is_uppercase()) {
            return false;
        }
    }
    significant > 0
}

// =============================================================================
// Accumulator
// =============================================================================

struct ChunkBuilder {
    max_chars: usize,
    overlap: usize,
    separator: &'static str,
    separator_chars: usize,
    chunks: Vec<Chunk>,
    buf: String,
    buf_chars: usize,
    /// Leading chars of `buf` repeated from the previous chunk
    carried: usize,
    start_page: Option<u32>,
    end_page: u32,
    section: String,
}

impl ChunkBuilder {
    fn new(config: &SegmenterConfig, separator: &'static str) -> Self {
        let max_chars = config.max_chars.max(1);
        let separator_chars = separator.chars().count();
        let overlap = config
            .overlap
            .min((max_chars - 1) / 2)
            .min(max_chars.saturating_sub(separator_chars + 1));

        Self {
            max_chars,
            overlap,
            separator,
            separator_chars,
            chunks: Vec::new(),
            buf: String::new(),
            buf_chars: 0,
            carried: 0,
            start_page: None,
            end_page: 0,
            section: UNKNOWN_SECTION.to_string(),
        }
    }

    /// Longest fragment that always fits after the carried overlap.
    fn room(&self) -> usize {
        self.max_chars
            .saturating_sub(self.overlap + self.separator_chars)
            .max(1)
    }

    /// Append one paragraph. Oversized paragraphs are pre-split at sentence
    /// ends and the pieces rejoin without a separator, so a flush between
    /// them cuts at the sentence end.
    fn push(&mut self, piece: &str, page: u32) {
        let room = self.room();
        for (i, fragment) in split_to_fit(piece, room).into_iter().enumerate() {
            self.push_fragment(fragment, page, i > 0);
        }
    }

    /// Append a fragment, flushing first when it would overflow. `joined`
    /// fragments continue the previous one directly.
    fn push_fragment(&mut self, fragment: &str, page: u32, joined: bool) {
        let len = fragment.chars().count();
        let sep = if self.buf.is_empty() || joined { 0 } else { self.separator_chars };
        if self.buf_chars + sep + len > self.max_chars && self.has_fresh() {
            self.flush(true);
        }

        let fragment = if joined && self.buf.is_empty() {
            fragment.trim_start()
        } else {
            fragment
        };
        if fragment.is_empty() {
            return;
        }

        if !self.buf.is_empty() && !joined {
            self.buf.push_str(self.separator);
            self.buf_chars += self.separator_chars;
        }
        self.buf.push_str(fragment);
        self.buf_chars += fragment.chars().count();

        if self.start_page.is_none() {
            self.start_page = Some(page);
        }
        self.end_page = page;
    }

    fn has_fresh(&self) -> bool {
        self.buf_chars > self.carried
    }

    /// Emit the buffer as a chunk. With `carry`, the trailing overlap seeds
    /// the next chunk.
    fn flush(&mut self, carry: bool) {
        if !self.has_fresh() {
            if !carry {
                self.reset();
            }
            return;
        }

        let start_page = self.start_page.unwrap_or(self.end_page);
        self.chunks.push(
            Chunk::new(
                self.chunks.len(),
                self.buf.clone(),
                self.section.clone(),
                start_page,
                self.end_page,
            )
            .with_overlap(self.carried),
        );

        if carry && self.overlap > 0 {
            let tail = tail_chars(&self.buf, self.overlap).to_string();
            self.buf_chars = tail.chars().count();
            self.carried = self.buf_chars;
            self.buf = tail;
            self.start_page = Some(self.end_page);
        } else {
            self.reset();
        }
    }

    fn reset(&mut self) {
        self.buf.clear();
        self.buf_chars = 0;
        self.carried = 0;
        self.start_page = None;
    }

    fn finish(mut self) -> Vec<Chunk> {
        self.flush(false);
        self.chunks
    }
}

/// Split `text` into pieces of at most `limit` chars, preferring sentence ends.
fn split_to_fit(text: &str, limit: usize) -> Vec<&str> {
    let limit = limit.max(1);
    let mut pieces = Vec::new();
    let mut rest = text;

    while rest.chars().count() > limit {
        let window_end = byte_offset(rest, limit);
        let cut = last_sentence_break(&rest[..window_end]).unwrap_or(window_end);
        pieces.push(&rest[..cut]);
        rest = &rest[cut..];
    }
    if !rest.is_empty() {
        pieces.push(rest);
    }
    pieces
}

/// Byte index just after the last `.`/`!`/`?` followed by whitespace.
fn last_sentence_break(window: &str) -> Option<usize> {
    let chars: Vec<(usize, char)> = window.char_indices().collect();
    chars.windows(2).rev().find_map(|pair| {
        let (pos, c) = pair[0];
        (matches!(c, '.' | '!' | '?') && pair[1].1.is_whitespace()).then(|| pos + c.len_utf8())
    })
}

fn byte_offset(text: &str, chars: usize) -> usize {
    text.char_indices()
        .nth(chars)
        .map(|(byte, _)| byte)
        .unwrap_or(text.len())
}

fn tail_chars(text: &str, n: usize) -> &str {
    let count = text.chars().count();
    if count <= n {
        text
    } else {
        &text[byte_offset(text, count - n)..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn config(max_chars: usize, overlap: usize, mode: SegmentMode) -> SegmenterConfig {
        SegmenterConfig::new()
            .with_max_chars(max_chars)
            .with_overlap(overlap)
            .with_mode(mode)
    }

    fn squash(text: &str) -> String {
        text.chars().filter(|c| !c.is_whitespace()).collect()
    }

    #[test]
    fn test_heading_detection() {
        assert!(is_heading_line("Section L - Instructions to Offerors"));
        assert!(is_heading_line("§ 3.1 Scope"));
        assert!(is_heading_line("3.2.1 Technical Approach"));
        assert!(is_heading_line("L.4"));
        assert!(is_heading_line("STATEMENT OF WORK"));
        assert!(is_heading_line("Instructions to Offerors"));

        assert!(!is_heading_line("The contractor shall provide monthly reports."));
        assert!(!is_heading_line("1. The contractor shall provide monthly reports."));
        assert!(!is_heading_line("Page 3 of 40"));
        assert!(!is_heading_line(&"SECTION ".repeat(20)[..101].to_lowercase()));
        assert!(!is_heading_line("2024"));
    }

    #[test]
    fn test_empty_input_yields_nothing() {
        let cfg = SegmenterConfig::default();
        assert!(segment(&[], &cfg).is_empty());
        assert!(segment(&[Page::new(1, "   \n\n ")], &cfg).is_empty());
    }

    #[test]
    fn test_heading_sets_section_and_flushes() {
        let pages = vec![
            Page::new(1, "SECTION L\nOfferors shall submit one volume.\n"),
            Page::new(2, "SECTION M\nProposals will be evaluated on price."),
        ];
        let chunks = segment(&pages, &config(6000, 0, SegmentMode::HeadingAware));

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].section, "SECTION L");
        assert_eq!((chunks[0].start_page, chunks[0].end_page), (1, 1));
        assert_eq!(chunks[1].section, "SECTION M");
        assert!(chunks[1].text.contains("evaluated on price"));
    }

    #[test]
    fn test_heading_flush_carries_overlap() {
        let pages = vec![Page::new(
            1,
            "Intro\nThe offeror shall comply.\nSECTION C\nThe contractor shall deliver.",
        )];
        let chunks = segment(&pages, &config(200, 10, SegmentMode::HeadingAware));

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].overlap, 10);
        assert!(chunks[1].text.starts_with("ll comply."));
        assert!(chunks[1].fresh_text().contains("SECTION C"));
    }

    #[test]
    fn test_size_flush_lands_on_sentence_end_in_wrapped_text() {
        let text = "intro para one.\n\nthe offeror shall register in sam. the contractor\n\
                    shall deliver the monthly status report to\n\
                    the contracting officer by the fifth day.";
        let chunks = segment(&[Page::new(1, text)], &config(110, 0, SegmentMode::HeadingAware));

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text, "intro para one.\n\nthe offeror shall register in sam.");
        assert_eq!(
            chunks[1].text,
            "the contractor\nshall deliver the monthly status report to\nthe contracting officer by the fifth day."
        );
        assert!(chunks.iter().all(|c| c.text.ends_with('.')));
    }

    #[test]
    fn test_size_flush_lands_on_paragraph_break() {
        let text = "The offeror shall submit one volume\nwith a cover letter.\n\n\
                    The contractor shall deliver\nmonthly reports.\n\n\
                    Proposals are due on the fifth\nbusiness day after release.";
        let chunks = segment(&[Page::new(1, text)], &config(120, 0, SegmentMode::HeadingAware));

        assert_eq!(chunks.len(), 2);
        assert_eq!(
            chunks[0].text,
            "The offeror shall submit one volume\nwith a cover letter.\n\nThe contractor shall deliver\nmonthly reports."
        );
        assert_eq!(
            chunks[1].text,
            "Proposals are due on the fifth\nbusiness day after release."
        );
    }

    #[test]
    fn test_oversized_page_without_breaks_is_hard_cut() {
        let pages = vec![Page::new(1, "x".repeat(250))];
        let chunks = segment(&pages, &config(100, 0, SegmentMode::PerPage));

        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.char_len() <= 100));
        assert_eq!(chunks[0].section, "Page 1 (part 1/3)");
        assert_eq!(chunks[2].section, "Page 1 (part 3/3)");
    }

    #[test]
    fn test_per_page_keeps_small_pages_whole() {
        let pages = vec![Page::new(4, "short page"), Page::new(7, "another page")];
        let chunks = segment(&pages, &config(100, 20, SegmentMode::PerPage));

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text, "short page");
        assert_eq!(chunks[0].section, "Page 4");
        assert_eq!(chunks[1].section, "Page 7");
        assert_eq!(chunks[1].overlap, 0);
    }

    #[test]
    fn test_split_prefers_sentence_end() {
        let text = "First sentence here. Second sentence that runs on";
        let pieces = split_to_fit(text, 30);
        assert_eq!(pieces[0], "First sentence here.");
        assert_eq!(pieces.concat(), text);
    }

    #[test]
    fn test_page_groups_mark_pages() {
        let pages: Vec<Page> = (1..=5).map(|n| Page::new(n, format!("text of page {n}"))).collect();
        let chunks = segment(
            &pages,
            &config(6000, 0, SegmentMode::PageGroups { pages_per_chunk: 2 }),
        );

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].section, "Pages 1-2");
        assert!(chunks[0].text.starts_with("[Page 1]"));
        assert!(chunks[0].text.contains("[Page 2]"));
        assert_eq!(chunks[2].section, "Page 5");
    }

    #[test]
    fn test_multibyte_text_never_splits_chars() {
        let pages = vec![Page::new(1, "§ é ü ".repeat(100))];
        let chunks = segment(&pages, &config(50, 10, SegmentMode::HeadingAware));
        assert!(chunks.iter().all(|c| c.char_len() <= 50));
    }

    fn page_strategy() -> impl Strategy<Value = Vec<Page>> {
        let line = prop_oneof![
            "[a-z ]{0,40}\\.",
            "SECTION [A-Z]",
            "[0-9]\\.[0-9] [A-Z][a-z]{3,8}",
            "[a-zé§]{0,120}",
        ];
        let page_text = prop::collection::vec(line, 0..12).prop_map(|lines| lines.join("\n"));
        prop::collection::vec(page_text, 0..6).prop_map(|texts| {
            texts
                .into_iter()
                .enumerate()
                .map(|(i, text)| Page::new(i as u32 * 2 + 1, text))
                .collect()
        })
    }

    fn mode_strategy() -> impl Strategy<Value = SegmentMode> {
        prop_oneof![
            Just(SegmentMode::HeadingAware),
            Just(SegmentMode::PerPage),
            (1usize..4).prop_map(|n| SegmentMode::PageGroups { pages_per_chunk: n }),
        ]
    }

    proptest! {
        #[test]
        fn prop_chunks_respect_size_and_page_order(
            pages in page_strategy(),
            max_chars in 8usize..300,
            overlap in 0usize..80,
            mode in mode_strategy(),
        ) {
            let chunks = segment(&pages, &config(max_chars, overlap, mode));

            for chunk in &chunks {
                prop_assert!(chunk.char_len() <= max_chars);
                prop_assert!(chunk.start_page <= chunk.end_page);
            }
            for pair in chunks.windows(2) {
                prop_assert!(pair[0].start_page <= pair[1].start_page);
                prop_assert!(pair[0].end_page <= pair[1].end_page);
                prop_assert_eq!(pair[0].index + 1, pair[1].index);
            }
        }

        #[test]
        fn prop_fresh_text_reconstructs_input(
            pages in page_strategy(),
            max_chars in 8usize..300,
            overlap in 0usize..80,
            per_page in any::<bool>(),
        ) {
            let mode = if per_page { SegmentMode::PerPage } else { SegmentMode::HeadingAware };
            let chunks = segment(&pages, &config(max_chars, overlap, mode));

            let rebuilt: String = chunks.iter().map(|c| squash(c.fresh_text())).collect();
            let original: String = pages.iter().map(|p| squash(&p.text)).collect();
            prop_assert_eq!(rebuilt, original);
        }
    }
}
