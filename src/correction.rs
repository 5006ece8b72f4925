use pulldown_cmark::{Event, Parser};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::model::TextFragment;
use crate::text::{char_count, split_cjk_clauses};

pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.6;
/// Lines longer than this also contribute their clauses as segments.
const LONG_LINE_CHARS: usize = 20;
const MIN_SEGMENT_CHARS: usize = 2;
/// Share of fragment chars that must appear in order inside a candidate.
const PARTIAL_MATCH_COVERAGE: f64 = 0.8;
const PARTIAL_MATCH_BONUS: f64 = 0.3;
const PARTIAL_MATCH_CAP: f64 = 0.95;
const PAGE_LABEL_PREFIXES: [&str; 3] = ["页面标题：", "页面文字：", "其他页面素材："];

/// Replaces OCR text with the closest line of a known-good reference text.
///
/// The reference is parsed once per deck into per-page lines (pages are delimited
/// by `##第N页` markers) and a deck-wide segment list. Replacements are always
/// taken verbatim from one of those two lists.
#[derive(Debug, Clone)]
pub struct ReferenceCorrector {
    pages: BTreeMap<usize, Vec<String>>,
    segments: Vec<String>,
    threshold: f64,
}

impl ReferenceCorrector {
    pub fn new(reference: &str) -> Self {
        let (pages, segments) = parse_reference(reference);
        debug!(
            "reference text: {} pages, {} segments",
            pages.len(),
            segments.len()
        );
        Self {
            pages,
            segments,
            threshold: DEFAULT_SIMILARITY_THRESHOLD,
        }
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold.clamp(0.0, 1.0);
        self
    }

    pub fn page_lines(&self, page: usize) -> &[String] {
        self.pages.get(&page).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn correct(&self, fragments: Vec<TextFragment>, page_hint: Option<usize>) -> Vec<TextFragment> {
        fragments
            .into_iter()
            .map(|fragment| self.correct_one(fragment, page_hint))
            .collect()
    }

    fn correct_one(&self, fragment: TextFragment, page_hint: Option<usize>) -> TextFragment {
        let text = fragment.text().trim();
        match self.best_match(text, page_hint) {
            Some((candidate, score)) if score >= self.threshold => {
                if candidate == text {
                    return fragment;
                }
                info!("corrected '{}' -> '{}' (score {:.2})", text, candidate, score);
                let candidate = candidate.to_string();
                fragment.with_text(candidate)
            }
            best => {
                debug!("no reference match for '{}' (best {:?})", text, best);
                fragment
            }
        }
    }

    /// Best candidate and its score. Page lines are searched first; the deck-wide
    /// segments only when the page gives nothing above the threshold.
    pub fn best_match(&self, text: &str, page_hint: Option<usize>) -> Option<(&str, f64)> {
        if char_count(text) < MIN_SEGMENT_CHARS {
            return None;
        }
        let mut best = None;
        if let Some(lines) = page_hint.and_then(|page| self.pages.get(&page)) {
            match scan(text, lines, best) {
                Scan::Exact(line) => return Some((line, 1.0)),
                Scan::Best(found) => best = found,
            }
        }
        if best.map_or(0.0, |(_, score)| score) < self.threshold {
            match scan(text, &self.segments, best) {
                Scan::Exact(segment) => return Some((segment, 1.0)),
                Scan::Best(found) => best = found,
            }
        }
        best
    }
}

enum Scan<'a> {
    Exact(&'a str),
    Best(Option<(&'a str, f64)>),
}

fn scan<'a>(text: &str, candidates: &'a [String], mut best: Option<(&'a str, f64)>) -> Scan<'a> {
    let text_len = char_count(text) as f64;
    for candidate in candidates {
        if candidate.contains(text) {
            return Scan::Exact(candidate);
        }
        let best_score = best.map_or(0.0, |(_, score)| score);
        if is_partial_match(text, candidate) {
            let score = text_len / char_count(candidate) as f64 + PARTIAL_MATCH_BONUS;
            if score > best_score {
                best = Some((candidate, score.min(PARTIAL_MATCH_CAP)));
            }
        }
        let score = similarity(text, candidate);
        if score > best.map_or(0.0, |(_, score)| score) {
            best = Some((candidate, score));
        }
    }
    Scan::Best(best)
}

/// True when most of `text` appears in order inside a longer `candidate`,
/// e.g. a fragment that lost a character to OCR.
fn is_partial_match(text: &str, candidate: &str) -> bool {
    let text_len = char_count(text);
    if text_len >= char_count(candidate) {
        return false;
    }
    let mut rest = candidate.chars();
    let mut matched = 0usize;
    for ch in text.chars() {
        if rest.by_ref().any(|other| other == ch) {
            matched += 1;
        }
    }
    matched as f64 >= text_len as f64 * PARTIAL_MATCH_COVERAGE
}

/// Ratcliff/Obershelp similarity: twice the matched characters over the total.
pub(crate) fn similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    2.0 * matching_chars(&a, &b) as f64 / (a.len() + b.len()) as f64
}

fn matching_chars(a: &[char], b: &[char]) -> usize {
    let mut total = 0;
    let mut pending = vec![(0, a.len(), 0, b.len())];
    while let Some((alo, ahi, blo, bhi)) = pending.pop() {
        let (i, j, size) = longest_match(a, b, alo, ahi, blo, bhi);
        if size == 0 {
            continue;
        }
        total += size;
        if alo < i && blo < j {
            pending.push((alo, i, blo, j));
        }
        if i + size < ahi && j + size < bhi {
            pending.push((i + size, ahi, j + size, bhi));
        }
    }
    total
}

/// Longest common block inside the given windows, earliest in `a` on ties.
fn longest_match(
    a: &[char],
    b: &[char],
    alo: usize,
    ahi: usize,
    blo: usize,
    bhi: usize,
) -> (usize, usize, usize) {
    let width = bhi - blo + 1;
    let mut best = (alo, blo, 0);
    let mut prev = vec![0usize; width];
    for i in alo..ahi {
        let mut current = vec![0usize; width];
        for j in blo..bhi {
            if a[i] != b[j] {
                continue;
            }
            let size = prev[j - blo] + 1;
            current[j - blo + 1] = size;
            if size > best.2 {
                best = (i + 1 - size, j + 1 - size, size);
            }
        }
        prev = current;
    }
    best
}

fn parse_reference(reference: &str) -> (BTreeMap<usize, Vec<String>>, Vec<String>) {
    let mut pages: BTreeMap<usize, Vec<String>> = BTreeMap::new();
    let mut segments = Vec::new();
    let mut current_page = None;

    for raw in reference.lines() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(page) = page_marker(line) {
            current_page = (page > 0).then_some(page);
            continue;
        }
        let cleaned = clean_line(line);
        if cleaned.is_empty() {
            continue;
        }
        if let Some(page) = current_page {
            pages.entry(page).or_default().push(cleaned.clone());
        }
        if char_count(&cleaned) >= MIN_SEGMENT_CHARS {
            if char_count(&cleaned) > LONG_LINE_CHARS {
                let clauses: Vec<String> = split_cjk_clauses(&cleaned)
                    .filter(|part| char_count(part) >= MIN_SEGMENT_CHARS)
                    .map(str::to_string)
                    .collect();
                segments.push(cleaned);
                segments.extend(clauses);
            } else {
                segments.push(cleaned);
            }
        }
    }
    (pages, segments)
}

/// Parses `##第N页`, ignoring anything after the marker.
fn page_marker(line: &str) -> Option<usize> {
    let rest = line.strip_prefix("##第")?;
    let digits: String = rest.chars().take_while(char::is_ascii_digit).collect();
    if digits.is_empty() || !rest[digits.len()..].starts_with('页') {
        return None;
    }
    digits.parse().ok()
}

/// Strips markdown decoration and the page-label prefixes used by slide scripts.
fn clean_line(line: &str) -> String {
    let line = line.trim();
    if line.len() >= 2 && line.starts_with('|') && line.ends_with('|') {
        return String::new();
    }
    if is_table_separator(line) {
        return String::new();
    }
    let line = match line.strip_prefix('-') {
        Some(rest) => rest.trim_start(),
        None => line.strip_prefix("* ").map(str::trim_start).unwrap_or(line),
    };

    let mut plain = String::new();
    for event in Parser::new(line) {
        match event {
            Event::Text(text) | Event::Code(text) => plain.push_str(&text),
            Event::SoftBreak | Event::HardBreak => plain.push(' '),
            _ => {}
        }
    }
    let mut plain = plain.trim();
    for prefix in PAGE_LABEL_PREFIXES {
        if let Some(rest) = plain.strip_prefix(prefix) {
            plain = rest;
            break;
        }
    }
    plain.trim().to_string()
}

fn is_table_separator(line: &str) -> bool {
    let inner = line.strip_prefix(':').unwrap_or(line);
    let inner = inner.strip_suffix(':').unwrap_or(inner);
    !inner.is_empty() && inner.chars().all(|ch| ch == '-')
}

/// Reads the `.txt` file that sits next to `source` (same stem), if any.
pub fn load_reference_text(source: &Path) -> Option<String> {
    let candidate = source.with_extension("txt");
    if candidate == source || !candidate.is_file() {
        debug!("no reference text next to {}", source.display());
        return None;
    }
    match std::fs::read_to_string(&candidate) {
        Ok(text) => {
            info!("using reference text {}", candidate.display());
            Some(text)
        }
        Err(err) => {
            warn!("failed to read reference text {}: {}", candidate.display(), err);
            None
        }
    }
}
