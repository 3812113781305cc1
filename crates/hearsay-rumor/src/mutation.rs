//! Deterministic local garbling used when the mutation service is
//! unavailable.
//!
//! The transform walks a fixed phrase table (certainty, location, time,
//! source, quantity, emotion) and replaces the first whole-word match of
//! each phrase, up to [`MAX_SUBSTITUTIONS`] replacements. Matches are found
//! in the original text and applied together, so a replacement is never
//! itself rewritten by a later entry. When nothing matches, a hedging
//! suffix is appended instead. The output always differs from the input.

/// Most phrase replacements applied to one piece of content.
pub const MAX_SUBSTITUTIONS: usize = 3;

/// Phrase table, applied in order.
const SUBSTITUTIONS: &[(&str, &str)] = &[
    // certainty
    ("is", "might be"),
    ("was", "supposedly was"),
    ("will", "could"),
    ("definitely", "probably"),
    ("certainly", "possibly"),
    ("always", "often"),
    ("never", "rarely"),
    // location
    ("at the", "somewhere near the"),
    ("in the", "around the"),
    ("near", "somewhere close to"),
    // time
    ("yesterday", "recently"),
    ("today", "lately"),
    ("tomorrow", "soon"),
    ("last week", "not long ago"),
    // source
    ("i saw", "someone saw"),
    ("i heard", "word is that"),
    ("he said", "they say"),
    ("she told me", "I heard that"),
    // quantity
    ("a few", "several"),
    ("many", "quite a few"),
    ("some", "a number of"),
    ("all", "most"),
    // emotion
    ("angry", "quite upset"),
    ("happy", "pleased"),
    ("sad", "rather down"),
    ("excited", "enthusiastic"),
];

/// Suffixes used when no phrase matches.
const HEDGES: &[&str] = &[
    " (or so I heard)",
    " (though I'm not certain)",
    " (if the rumors are true)",
    " (according to some)",
    " (allegedly)",
];

/// A chosen replacement: byte range in the original plus its new text.
struct Replacement {
    start: usize,
    end: usize,
    text: String,
}

/// Garble `content` deterministically.
pub fn garble(content: &str) -> String {
    let lowered = content.to_ascii_lowercase();
    let mut chosen: Vec<Replacement> = Vec::new();

    for (needle, replacement) in SUBSTITUTIONS {
        if chosen.len() >= MAX_SUBSTITUTIONS {
            break;
        }
        let Some(start) = find_word(&lowered, needle, &chosen) else {
            continue;
        };
        let end = start.saturating_add(needle.len());
        let capitalize = content
            .get(start..end)
            .and_then(|s| s.chars().next())
            .is_some_and(char::is_uppercase);
        let text = if capitalize {
            capitalize_first(replacement)
        } else {
            (*replacement).to_owned()
        };
        chosen.push(Replacement { start, end, text });
    }

    let garbled = apply(content, &mut chosen);
    if garbled == content {
        let mut hedged = content.to_owned();
        hedged.push_str(hedge_for(content));
        hedged
    } else {
        garbled
    }
}

/// The hedge appended when no phrase matches.
fn hedge_for(content: &str) -> &'static str {
    content
        .len()
        .checked_rem(HEDGES.len())
        .and_then(|i| HEDGES.get(i))
        .copied()
        .unwrap_or(" (allegedly)")
}

/// First whole-word occurrence of `needle` that does not overlap a
/// replacement already chosen.
fn find_word(haystack: &str, needle: &str, taken: &[Replacement]) -> Option<usize> {
    let bytes = haystack.as_bytes();
    let mut from = 0usize;
    while let Some(offset) = haystack.get(from..).and_then(|rest| rest.find(needle)) {
        let start = from.saturating_add(offset);
        let end = start.saturating_add(needle.len());
        let before_ok = start
            .checked_sub(1)
            .and_then(|i| bytes.get(i))
            .is_none_or(|b| !is_word_byte(*b));
        let after_ok = bytes.get(end).is_none_or(|b| !is_word_byte(*b));
        let overlaps = taken.iter().any(|r| start < r.end && r.start < end);
        if before_ok && after_ok && !overlaps {
            return Some(start);
        }
        from = start.saturating_add(1);
        while from < haystack.len() && !haystack.is_char_boundary(from) {
            from = from.saturating_add(1);
        }
    }
    None
}

/// Bytes that continue a word. Non-ASCII bytes count so that accented
/// letters never form a boundary.
const fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'\'' || b >= 0x80
}

fn capitalize_first(s: &str) -> String {
    let mut chars = s.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}

/// Splice the chosen replacements into `content`.
fn apply(content: &str, chosen: &mut [Replacement]) -> String {
    chosen.sort_by_key(|r| r.start);
    let mut out = String::with_capacity(content.len().saturating_add(32));
    let mut cursor = 0usize;
    for r in chosen.iter() {
        out.push_str(content.get(cursor..r.start).unwrap_or_default());
        out.push_str(&r.text);
        cursor = r.end;
    }
    out.push_str(content.get(cursor..).unwrap_or_default());
    out
}
