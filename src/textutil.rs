//! Text helpers: ASCII folding for inbound message display and single-line
//! escaping for logging untrusted content.

/// Fold accented Latin letters to their unaccented ASCII equivalent and drop
/// every other non-ASCII character (emoji, CJK, control sequences embedded
/// in multi-byte forms).
///
/// The mapping matches the companion mobile client's display convention so
/// both ends render the same text on ASCII-only terminals.
pub fn fold_to_ascii(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        if ch.is_ascii() {
            out.push(ch);
            continue;
        }
        let folded = match ch {
            'á' => 'a', 'é' => 'e', 'í' => 'i', 'ó' => 'o', 'ú' => 'u', 'ý' => 'y',
            'Á' => 'A', 'É' => 'E', 'Í' => 'I', 'Ó' => 'O', 'Ú' => 'U', 'Ý' => 'Y',
            'č' => 'c', 'ď' => 'd', 'ě' => 'e',
            'Č' => 'C', 'Ď' => 'D', 'Ě' => 'E',
            'ň' => 'n', 'ř' => 'r', 'š' => 's', 'ť' => 't', 'ů' => 'u', 'ž' => 'z',
            'Ň' => 'N', 'Ř' => 'R', 'Š' => 'S', 'Ť' => 'T', 'Ů' => 'U', 'Ž' => 'Z',
            _ => continue,
        };
        out.push(folded);
    }
    out
}

/// Escape a string for single-line logging:
/// - `\n` => `\\n`, `\r` => `\\r`, `\t` => `\\t`, backslash => `\\\\`
/// - other control characters become `\xNN`
///
/// Long strings are truncated with an ellipsis to cap log noise.
pub fn escape_log(s: &str) -> String {
    const MAX_PREVIEW: usize = 200;
    let mut out = String::with_capacity(s.len().min(MAX_PREVIEW) + 8);
    for (count, ch) in s.chars().enumerate() {
        if count >= MAX_PREVIEW {
            out.push('…');
            break;
        }
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                use std::fmt::Write;
                let _ = write!(&mut out, "\\x{:02X}", c as u32);
            }
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folds_czech_diacritics() {
        assert_eq!(fold_to_ascii("Příliš žluťoučký kůň"), "Prilis zlutoucky kun");
        assert_eq!(fold_to_ascii("ÁÉÍÓÚÝ"), "AEIOUY");
    }

    #[test]
    fn drops_other_non_ascii() {
        // The ASCII spaces around dropped characters stay.
        assert_eq!(fold_to_ascii("hi 👋 你好 there"), "hi   there");
        assert_eq!(fold_to_ascii("plain ascii!"), "plain ascii!");
    }

    #[test]
    fn escapes_newlines() {
        assert_eq!(escape_log("a\nb\r\tc"), "a\\nb\\r\\tc");
    }
}
