pub(crate) fn is_cjk(ch: char) -> bool {
    matches!(ch as u32, 0x4E00..=0x9FFF)
}

/// Wider CJK range used when deciding whether a run carries real content.
pub(crate) fn is_cjk_like(ch: char) -> bool {
    matches!(
        ch as u32,
        0x4E00..=0x9FFF | 0x3400..=0x4DBF | 0x3040..=0x30FF | 0x31F0..=0x31FF | 0xAC00..=0xD7AF
    )
}

/// True when the run has no alphanumeric or CJK character at all.
pub(crate) fn is_symbol_only(text: &str) -> bool {
    !text
        .chars()
        .any(|ch| ch.is_alphanumeric() || is_cjk_like(ch))
}

pub(crate) fn char_count(text: &str) -> usize {
    text.chars().count()
}

/// Splits on CJK sentence punctuation, used to derive sub-segments of long lines.
pub(crate) fn split_cjk_clauses(text: &str) -> impl Iterator<Item = &str> {
    text.split(['，', '。', '、', '；', '：', '！', '？'])
        .map(str::trim)
        .filter(|part| !part.is_empty())
}
