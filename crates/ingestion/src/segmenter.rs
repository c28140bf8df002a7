//! Section segmentation
//!
//! Turns pages in reading order into sections by detecting heading lines.
//! Headings open a section, subheadings label the open one, every other
//! line becomes body text of the open section.

use outlook_common::models::{PageRecord, Section, SectionBuilder};
use regex_lite::Regex;
use std::sync::OnceLock;
use tracing::{debug, warn};

/// Segmentation options
#[derive(Debug, Clone, Copy, Default)]
pub struct SegmenterConfig {
    /// Keep the lines found before a document's first heading as a
    /// heading-less section instead of dropping them
    pub keep_preamble: bool,
}

/// Result of segmenting a page sequence
#[derive(Debug, Clone, Default)]
pub struct Segmentation {
    pub sections: Vec<Section>,
    /// Non-empty lines dropped because no section was open
    pub orphan_lines: usize,
}

/// How a single trimmed, non-empty line is treated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Heading,
    Subheading,
    Body,
}

/// Classify a trimmed line. Heading takes precedence over subheading.
pub fn classify_line(line: &str) -> LineKind {
    if is_heading(line) {
        LineKind::Heading
    } else if is_subheading(line) {
        LineKind::Subheading
    } else {
        LineKind::Body
    }
}

/// Entirely upper-case, 4 to 119 characters, not purely numeric
pub fn is_heading(line: &str) -> bool {
    let len = line.chars().count();
    is_upper(line) && len > 3 && len < 120 && !is_digits(line)
}

/// Short numbered label ("1 Market Summary") or a title-cased line under 100 characters
pub fn is_subheading(line: &str) -> bool {
    numbered_label().is_match(line) || (is_title(line) && line.chars().count() < 100)
}

fn numbered_label() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\d{1,2}\s[A-Z]").expect("valid subheading pattern"))
}

/// At least one cased character and none of them lower-case
fn is_upper(line: &str) -> bool {
    let mut cased = false;
    for c in line.chars() {
        if c.is_lowercase() {
            return false;
        }
        cased |= c.is_uppercase();
    }
    cased
}

/// Upper-case letters only start words, lower-case letters only continue them
fn is_title(line: &str) -> bool {
    let mut cased = false;
    let mut previous_cased = false;
    for c in line.chars() {
        if c.is_uppercase() {
            if previous_cased {
                return false;
            }
            previous_cased = true;
            cased = true;
        } else if c.is_lowercase() {
            if !previous_cased {
                return false;
            }
            previous_cased = true;
            cased = true;
        } else {
            previous_cased = false;
        }
    }
    cased
}

fn is_digits(line: &str) -> bool {
    !line.is_empty() && line.chars().all(char::is_numeric)
}

/// Segment pages with default options, dropping text before each document's first heading
pub fn segment(pages: &[PageRecord]) -> Vec<Section> {
    segment_with(pages, SegmenterConfig::default()).sections
}

/// Segment pages in the given order. Pages are never reordered; a change of
/// `doc_name` closes the open section so documents never share one.
pub fn segment_with(pages: &[PageRecord], config: SegmenterConfig) -> Segmentation {
    let mut state = Segmenter::new(config);

    for page in pages {
        state.page(page);
    }

    let result = state.finish();

    if result.orphan_lines > 0 {
        warn!(
            orphan_lines = result.orphan_lines,
            "Dropped lines that appeared before the first heading of a document"
        );
    }
    debug!(
        pages = pages.len(),
        sections = result.sections.len(),
        "Pages segmented"
    );

    result
}

struct Segmenter {
    config: SegmenterConfig,
    sections: Vec<Section>,
    current: Option<SectionBuilder>,
    /// Whether `current` was opened by a heading rather than as a preamble
    current_has_heading: bool,
    orphan_lines: usize,
}

impl Segmenter {
    fn new(config: SegmenterConfig) -> Self {
        Self {
            config,
            sections: Vec::new(),
            current: None,
            current_has_heading: false,
            orphan_lines: 0,
        }
    }

    fn page(&mut self, page: &PageRecord) {
        if self
            .current
            .as_ref()
            .is_some_and(|open| open.doc_name() != page.doc_name)
        {
            self.close();
        }

        for raw_line in page.text.lines() {
            let line = raw_line.trim();
            if line.is_empty() {
                continue;
            }
            self.line(line, page);
        }

        if let Some(open) = self.current.as_mut() {
            open.extend_images(page.images.iter().cloned());
        }
    }

    fn line(&mut self, line: &str, page: &PageRecord) {
        match classify_line(line) {
            LineKind::Heading => {
                self.close();
                self.current = Some(SectionBuilder::new(
                    page.doc_name.as_str(),
                    Some(line.to_string()),
                    page.page,
                ));
                self.current_has_heading = true;
            }
            LineKind::Subheading if self.current_has_heading => {
                if let Some(open) = self.current.as_mut() {
                    open.set_subheading(line);
                }
            }
            // Before the first heading a subheading-looking line is preamble text
            LineKind::Subheading | LineKind::Body => match self.current.as_mut() {
                Some(open) => open.push_line(line, page.page),
                None if self.config.keep_preamble => {
                    let mut preamble = SectionBuilder::new(page.doc_name.as_str(), None, page.page);
                    preamble.push_line(line, page.page);
                    self.current = Some(preamble);
                    self.current_has_heading = false;
                }
                None => self.orphan_lines += 1,
            },
        }
    }

    fn close(&mut self) {
        if let Some(open) = self.current.take() {
            let id = self.sections.len();
            self.sections.push(open.finish(id));
        }
        self.current_has_heading = false;
    }

    fn finish(mut self) -> Segmentation {
        self.close();
        Segmentation {
            sections: self.sections,
            orphan_lines: self.orphan_lines,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use outlook_common::models::ImageRecord;

    fn page(doc: &str, number: u32, text: &str) -> PageRecord {
        PageRecord::new(doc, number, text)
    }

    fn image(number: u32, ocr: &str) -> ImageRecord {
        ImageRecord {
            page: number,
            image_path: format!("data/images/p{}.jpg", number),
            ocr_text: ocr.to_string(),
        }
    }

    #[test]
    fn test_line_classification_examples() {
        assert_eq!(classify_line("INTRODUCTION"), LineKind::Heading);
        assert_eq!(classify_line("1 Market Summary"), LineKind::Subheading);
        assert_eq!(classify_line("the market rose"), LineKind::Body);
    }

    #[test]
    fn test_heading_length_bounds() {
        assert!(!is_heading("USA"));
        assert!(is_heading("RISK"));
        assert!(is_heading(&"A".repeat(119)));
        assert!(!is_heading(&"A".repeat(120)));
    }

    #[test]
    fn test_heading_rejects_numbers_and_mixed_case() {
        assert!(!is_heading("2025"));
        assert!(!is_heading("12345"));
        assert!(is_heading("2025 OUTLOOK"));
        assert!(!is_heading("Equity Outlook"));
        assert!(is_heading("S&P 500: WHAT NEXT?"));
    }

    #[test]
    fn test_subheading_patterns() {
        assert!(is_subheading("12 Fixed Income"));
        assert!(!is_subheading("123 Fixed income"));
        assert!(is_subheading("Artificial Intelligence Leaders"));
        assert!(!is_subheading("Artificial intelligence leaders"));
        assert!(!is_subheading(&format!("Word {}", "Title ".repeat(20))));
    }

    #[test]
    fn test_basic_sectioning() {
        let pages = vec![
            page("outlook_2025", 1, "INTRODUCTION\nMarkets rallied.\n\n1 Market Summary\nbroad gains"),
            page("outlook_2025", 2, "more gains\nEQUITY OUTLOOK\nearnings grow"),
        ];

        let sections = segment(&pages);
        assert_eq!(sections.len(), 2);

        let intro = &sections[0];
        assert_eq!(intro.id, 0);
        assert_eq!(intro.heading.as_deref(), Some("INTRODUCTION"));
        assert_eq!(intro.subheading.as_deref(), Some("1 Market Summary"));
        assert_eq!(intro.text, "Markets rallied. broad gains more gains ");
        assert_eq!((intro.page_start, intro.page_end), (1, 2));

        let equity = &sections[1];
        assert_eq!(equity.id, 1);
        assert_eq!(equity.text, "earnings grow ");
        assert_eq!((equity.page_start, equity.page_end), (2, 2));
    }

    #[test]
    fn test_lines_before_first_heading_are_dropped() {
        let pages = vec![page("outlook_2025", 1, "cover page text\nMore Cover\nINTRODUCTION\nbody")];

        let result = segment_with(&pages, SegmenterConfig::default());
        assert_eq!(result.sections.len(), 1);
        assert_eq!(result.sections[0].text, "body ");
        assert_eq!(result.orphan_lines, 2);
    }

    #[test]
    fn test_keep_preamble_emits_headingless_section() {
        let pages = vec![page("outlook_2025", 1, "cover page text\nINTRODUCTION\nbody")];

        let result = segment_with(&pages, SegmenterConfig { keep_preamble: true });
        assert_eq!(result.sections.len(), 2);
        assert_eq!(result.sections[0].heading, None);
        assert_eq!(result.sections[0].text, "cover page text ");
        assert_eq!(result.sections[1].heading.as_deref(), Some("INTRODUCTION"));
        assert_eq!(result.orphan_lines, 0);
    }

    #[test]
    fn test_heading_only_page_keeps_page_end() {
        let pages = vec![
            page("outlook_2025", 1, "RATES\nyields fell"),
            page("outlook_2025", 2, "Chart Title Only"),
        ];

        let sections = segment(&pages);
        assert_eq!(sections[0].page_end, 1);
        assert_eq!(sections[0].subheading.as_deref(), Some("Chart Title Only"));
    }

    #[test]
    fn test_images_attach_to_section_open_at_page_end() {
        let pages = vec![
            page("midyear_2025", 1, "no heading yet").with_images(vec![image(1, "dropped")]),
            page("midyear_2025", 2, "RATES\nyields fell\nCREDIT\nspreads tight")
                .with_images(vec![image(2, "spread chart")]),
        ];

        let sections = segment(&pages);
        assert_eq!(sections.len(), 2);
        assert!(sections[0].images.is_empty());
        assert_eq!(sections[1].images.len(), 1);
        assert_eq!(sections[1].images[0].ocr_text, "spread chart");
    }

    #[test]
    fn test_new_document_closes_open_section() {
        let pages = vec![
            page("outlook_2025", 1, "CLOSING THOUGHTS\nstay invested"),
            page("midyear_2025", 1, "orphan first line\nMID-YEAR REVIEW\ngood half"),
        ];

        let result = segment_with(&pages, SegmenterConfig::default());
        assert_eq!(result.sections.len(), 2);
        assert_eq!(result.sections[0].doc_name, "outlook_2025");
        assert_eq!(result.sections[0].text, "stay invested ");
        assert_eq!(result.sections[1].doc_name, "midyear_2025");
        assert_eq!(result.orphan_lines, 1);
    }

    #[test]
    fn test_page_ranges_never_decrease() {
        let pages: Vec<PageRecord> = (1..=6)
            .map(|n| {
                let text = if n % 2 == 1 {
                    format!("SECTION {}\nline on page {}", n, n)
                } else {
                    format!("continuation on page {}", n)
                };
                page("outlook_2025", n, &text)
            })
            .collect();

        for section in segment(&pages) {
            assert!(section.page_start <= section.page_end);
        }
    }

    #[test]
    fn test_empty_input() {
        assert!(segment(&[]).is_empty());
    }
}
