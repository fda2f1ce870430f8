use std::num::{IntErrorKind, ParseIntError};

/// To be used as `The xx number ` + the explanation from here (does not have a dot).
pub(crate) const fn explain_number_error(error: &ParseIntError) -> &'static str {
    match error.kind() {
        IntErrorKind::Empty => "is empty",
        IntErrorKind::InvalidDigit => "contains an invalid character",
        IntErrorKind::NegOverflow => "is too small to fit in the internal representation",
        IntErrorKind::PosOverflow => "is too big to fit in the internal representation",
        IntErrorKind::Zero => "is zero, which is not allowed here",
        _ => "is not a valid number",
    }
}

/// Check if 'a' starts with 'b' with or without ignoring casing
pub(crate) fn str_starts_with<const IGNORE_CASING: bool>(a: &str, b: &str) -> bool {
    a.len() >= b.len()
        && a.chars().zip(b.chars()).all(|(a, b)| {
            if IGNORE_CASING {
                a.eq_ignore_ascii_case(&b)
            } else {
                a == b
            }
        })
}

/// Split a list on commas, but not on commas inside parentheses, so `K,S(0.2,1),T` gives
/// three items. Items are trimmed and empty items skipped.
pub(crate) fn split_list(text: &str) -> Vec<&str> {
    let mut items = Vec::new();
    let mut depth = 0_usize;
    let mut start = 0;
    for (index, c) in text.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                items.push(text[start..index].trim());
                start = index + 1;
            }
            _ => (),
        }
    }
    items.push(text[start..].trim());
    items.retain(|item| !item.is_empty());
    items
}

#[test]
#[allow(clippy::missing_panics_doc)]
fn starts_with() {
    assert!(str_starts_with::<false>("aaabbb", "aa"));
    assert!(!str_starts_with::<false>("aaabbb", "ab"));
    assert!(str_starts_with::<true>("aaabbb", "AAA"));
    assert!(!str_starts_with::<false>("aaabbb", "A"));
    assert!(!str_starts_with::<true>("aa", "aaa"));
}

#[test]
#[allow(clippy::missing_panics_doc)]
fn test_split_list() {
    assert_eq!(split_list("K,S(0.2),T(0.2), nterm"), vec!["K", "S(0.2)", "T(0.2)", "nterm"]);
    assert_eq!(split_list(""), Vec::<&str>::new());
}
