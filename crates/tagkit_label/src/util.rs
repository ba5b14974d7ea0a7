//! Stateless helpers shared by the label modules.

use crate::conf::{N_EMU_PER_MM, N_TWIPS_PER_INCH, N_WORD_WEIGHT};

/// Complexity score used by the autosize tables: characters plus weighted words.
pub fn calculate_complexity(text: &str) -> usize {
    text.chars().count() + text.split_whitespace().count() * N_WORD_WEIGHT
}

/// Partition `items` in order into groups of `n_size` (the last may be short).
pub fn chunk_records<T: Clone>(items: &[T], n_size: usize) -> Vec<Vec<T>> {
    items
        .chunks(usize::max(1, n_size))
        .map(<[T]>::to_vec)
        .collect()
}

/// Convert inches to twips (truncating, like the word processor does).
pub fn convert_inches_to_twips(inches: f64) -> u32 {
    (inches * N_TWIPS_PER_INCH) as u32
}

/// Convert millimetres to EMU.
pub fn convert_mm_to_emu(mm: f64) -> u64 {
    (mm * N_EMU_PER_MM).round() as u64
}

/// Escape `&` only; marker text carries no other escaping.
pub fn escape_ampersand(text: &str) -> String {
    text.replace('&', "&amp;")
}

/// Resolve HTML/XML character references (`&amp;`, `&#39;`, `&#x41;` ...).
///
/// Unknown or malformed references are kept verbatim.
pub fn unescape_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }

    let mut c_out = String::with_capacity(text.len());
    let mut c_rest = text;
    while let Some(n_amp) = c_rest.find('&') {
        c_out.push_str(&c_rest[..n_amp]);
        let c_tail = &c_rest[n_amp..];
        let resolved = c_tail.find(';').and_then(|n_semi| {
            let c_name = &c_tail[1..n_semi];
            resolve_entity(c_name).map(|chr| (chr, n_semi + 1))
        });
        match resolved {
            Some((chr, n_len)) => {
                c_out.push(chr);
                c_rest = &c_tail[n_len..];
            }
            None => {
                c_out.push('&');
                c_rest = &c_tail[1..];
            }
        }
    }
    c_out.push_str(c_rest);
    c_out
}

fn resolve_entity(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some('\u{00A0}'),
        _ => {
            let c_num = name.strip_prefix('#')?;
            let n_code = match c_num.strip_prefix(['x', 'X']) {
                Some(c_hex) => u32::from_str_radix(c_hex, 16).ok()?,
                None => c_num.parse::<u32>().ok()?,
            };
            char::from_u32(n_code)
        }
    }
}

/// Strip characters that make poor file-name fragments (space, `/`, `-`, `*`).
pub fn sanitize_file_fragment(text: &str) -> String {
    text.chars()
        .filter(|chr| !matches!(chr, ' ' | '/' | '-' | '*' | '\\' | ':'))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calculate_complexity() {
        assert_eq!(calculate_complexity(""), 0);
        assert_eq!(calculate_complexity("Blue Dream"), 10 + 2 * 5);
        assert_eq!(calculate_complexity("a\u{00A0}b"), 3 + 2 * 5);
    }

    #[test]
    fn test_chunk_records_sizes() {
        let l_items: Vec<usize> = (0..22).collect();
        let l_sizes: Vec<usize> = chunk_records(&l_items, 9).iter().map(Vec::len).collect();
        assert_eq!(l_sizes, vec![9, 9, 4]);
        assert!(chunk_records::<usize>(&[], 9).is_empty());
    }

    #[test]
    fn test_unit_conversions() {
        assert_eq!(convert_inches_to_twips(3.5), 5040);
        assert_eq!(convert_inches_to_twips(0.001), 1);
        assert_eq!(convert_mm_to_emu(14.0), 504_000);
    }

    #[test]
    fn test_unescape_entities() {
        assert_eq!(unescape_entities("A &amp; B"), "A & B");
        assert_eq!(unescape_entities("&#39;x&#x41;"), "'xA");
        assert_eq!(unescape_entities("R&D; &bogus; &"), "R&D; &bogus; &");
        assert_eq!(unescape_entities(&escape_ampersand("Salt & Pepper")), "Salt & Pepper");
    }

    #[test]
    fn test_sanitize_file_fragment() {
        assert_eq!(sanitize_file_fragment("Pre-Roll/Infused *"), "PreRollInfused");
    }
}
