//! Whitespace-aware tokenization for the word-level diff

/// Split `text` into diff tokens.
///
/// A token is a maximal run of non-whitespace together with the maximal run of
/// whitespace that follows it. Whitespace at the very start of the text is a
/// token of its own. Concatenating the tokens yields `text` exactly.
#[must_use]
pub fn tokenize(text: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut start = 0;
    // Set once the current token has reached its trailing whitespace run
    let mut trailing = false;

    for (idx, ch) in text.char_indices() {
        let space = ch.is_whitespace();
        if idx == start {
            trailing = space;
            continue;
        }
        if trailing && !space {
            tokens.push(&text[start..idx]);
            start = idx;
            trailing = false;
        } else if space {
            trailing = true;
        }
    }

    if start < text.len() {
        tokens.push(&text[start..]);
    }
    tokens
}
