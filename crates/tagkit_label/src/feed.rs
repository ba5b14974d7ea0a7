//! Transfer-feed matcher: fuzzy-match a JSON inventory transfer against loaded records.
//!
//! Fetching the feed is the host's job; this module starts from the payload
//! text or the decoded payload.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;

use crate::conf::{
    F_FEED_JACCARD_MIN, F_FEED_SEQUENCE_RATIO_MIN, N_FEED_TOKEN_OVERLAP_MIN,
    TUP_FEED_TYPE_OVERRIDES,
};
use crate::spec::{LabelError, SpecLabelRecord};

static RE_DIGIT_UNIT: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"\b\d+(?:g|mg)\b"));
static RE_NON_WORD: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"[^\w\s-]"));
static RE_SPLIT: LazyLock<Result<Regex, regex::Error>> = LazyLock::new(|| Regex::new(r"[-\s]+"));

////////////////////////////////////////////////////////////////////////////////
// #region Payload

/// One transferred line item.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct SpecFeedItem {
    #[serde(default)]
    pub product_name: Option<String>,
    #[serde(default)]
    pub product_brand: Option<String>,
}

/// Inventory transfer payload.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct SpecFeedPayload {
    #[serde(default)]
    pub inventory_transfer_items: Vec<SpecFeedItem>,
    #[serde(default)]
    pub from_license_name: Option<String>,
    #[serde(default)]
    pub from_license_number: Option<String>,
}

/// Decode a feed payload.
pub fn parse_feed(c_json: &str) -> Result<SpecFeedPayload, LabelError> {
    serde_json::from_str(c_json).map_err(|err| LabelError::Feed(format!("Malformed feed JSON: {err}")))
}

/// Options for [`match_feed_records`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecFeedMatchOptions {
    /// Append every brand/vendor-prefiltered record after the direct matches.
    pub if_include_prefiltered: bool,
}

impl Default for SpecFeedMatchOptions {
    fn default() -> Self {
        Self {
            if_include_prefiltered: true,
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Similarity

fn replace_all(re: &LazyLock<Result<Regex, regex::Error>>, text: &str, c_with: &str) -> String {
    match re.as_ref() {
        Ok(re) => re.replace_all(text, c_with).into_owned(),
        Err(_) => text.to_string(),
    }
}

/// Lower-case, drop `<n>g`/`<n>mg`, punctuation to spaces, collapse dashes and whitespace.
pub fn normalize_feed_text(text: &str) -> String {
    let c_lower = text.to_lowercase();
    let c_no_units = replace_all(&RE_DIGIT_UNIT, &c_lower, "");
    let c_words = replace_all(&RE_NON_WORD, &c_no_units, " ");
    replace_all(&RE_SPLIT, &c_words, " ").trim().to_string()
}

fn find_longest_match(
    a: &[char],
    b: &[char],
    (n_a_lo, n_a_hi): (usize, usize),
    (n_b_lo, n_b_hi): (usize, usize),
) -> (usize, usize, usize) {
    let (mut n_best_i, mut n_best_j, mut n_best_k) = (n_a_lo, n_b_lo, 0usize);
    let mut l_prev = vec![0usize; n_b_hi - n_b_lo + 1];
    for i in n_a_lo..n_a_hi {
        let mut l_curr = vec![0usize; n_b_hi - n_b_lo + 1];
        for j in n_b_lo..n_b_hi {
            if a[i] == b[j] {
                let k = l_prev[j - n_b_lo] + 1;
                l_curr[j - n_b_lo + 1] = k;
                if k > n_best_k {
                    (n_best_i, n_best_j, n_best_k) = (i + 1 - k, j + 1 - k, k);
                }
            }
        }
        l_prev = l_curr;
    }
    (n_best_i, n_best_j, n_best_k)
}

fn count_matching_chars(a: &[char], b: &[char]) -> usize {
    let mut l_stack = vec![((0, a.len()), (0, b.len()))];
    let mut n_matched = 0;
    while let Some((range_a, range_b)) = l_stack.pop() {
        let (i, j, k) = find_longest_match(a, b, range_a, range_b);
        if k == 0 {
            continue;
        }
        n_matched += k;
        if range_a.0 < i && range_b.0 < j {
            l_stack.push(((range_a.0, i), (range_b.0, j)));
        }
        if i + k < range_a.1 && j + k < range_b.1 {
            l_stack.push(((i + k, range_a.1), (j + k, range_b.1)));
        }
    }
    n_matched
}

/// Ratcliff/Obershelp similarity `2 * M / (len(a) + len(b))`, 1.0 for two empty strings.
pub fn calculate_sequence_ratio(a: &str, b: &str) -> f64 {
    let l_a: Vec<char> = a.chars().collect();
    let l_b: Vec<char> = b.chars().collect();
    let n_total = l_a.len() + l_b.len();
    if n_total == 0 {
        return 1.0;
    }
    2.0 * count_matching_chars(&l_a, &l_b) as f64 / n_total as f64
}

/// Best ratio of the shorter text against every same-length window of the longer one.
pub fn calculate_window_ratio(a: &str, b: &str) -> f64 {
    let (c_short, c_long) = if a.chars().count() < b.chars().count() {
        (a, b)
    } else {
        (b, a)
    };
    let l_long: Vec<char> = c_long.chars().collect();
    let n_win = c_short.chars().count();
    if n_win == 0 {
        return 0.0;
    }
    (0..=l_long.len() - n_win)
        .map(|n_start| {
            let c_window: String = l_long[n_start..n_start + n_win].iter().collect();
            calculate_sequence_ratio(&c_window, c_short)
        })
        .fold(0.0, f64::max)
}

fn derive_tokens(text: &str) -> HashSet<&str> {
    text.split_whitespace().collect()
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Match

struct SpecRecordKey<'a> {
    record: &'a SpecLabelRecord,
    c_norm: String,
    c_type: String,
}

fn if_names_match(c_item: &str, set_item_tokens: &HashSet<&str>, c_record: &str) -> bool {
    if c_record.contains(c_item) || c_item.contains(c_record) {
        return true;
    }
    let set_record_tokens = derive_tokens(c_record);
    let n_common = set_item_tokens.intersection(&set_record_tokens).count();
    if n_common >= N_FEED_TOKEN_OVERLAP_MIN {
        return true;
    }
    let n_union = set_item_tokens.union(&set_record_tokens).count();
    if n_union > 0 && n_common as f64 / n_union as f64 >= F_FEED_JACCARD_MIN {
        return true;
    }
    calculate_window_ratio(c_item, c_record) >= F_FEED_SEQUENCE_RATIO_MIN
}

/// Product names of `records` that the feed refers to.
///
/// Records are first narrowed to those whose brand appears in the feed or
/// whose vendor is the sending license; sample descriptions never match.
/// Direct matches come first in record order per feed item, then (when
/// enabled) the remaining prefiltered records. Names are unique.
pub fn match_feed_records(
    records: &[SpecLabelRecord],
    payload: &SpecFeedPayload,
    options: &SpecFeedMatchOptions,
) -> Vec<String> {
    let set_brands: HashSet<String> = payload
        .inventory_transfer_items
        .iter()
        .filter_map(|item| item.product_brand.as_deref())
        .map(str::to_lowercase)
        .filter(|brand| !brand.is_empty())
        .collect();
    let c_vendor = payload
        .from_license_name
        .as_deref()
        .unwrap_or_default()
        .to_lowercase();

    let l_prefiltered: Vec<SpecRecordKey<'_>> = records
        .iter()
        .filter(|record| {
            let c_desc = record.description.to_lowercase();
            !c_desc.is_empty() && !c_desc.contains("sample")
        })
        .filter(|record| {
            set_brands.contains(&record.product_brand.to_lowercase())
                || (!c_vendor.is_empty() && record.vendor.to_lowercase() == c_vendor)
        })
        .map(|record| SpecRecordKey {
            record,
            c_norm: normalize_feed_text(&record.description),
            c_type: record.product_type_key(),
        })
        .collect();

    let mut l_names: Vec<String> = Vec::new();
    let mut set_seen: HashSet<String> = HashSet::new();
    let mut push_name = |record: &SpecLabelRecord, l_names: &mut Vec<String>| {
        if set_seen.insert(record.product_name.clone()) {
            l_names.push(record.product_name.clone());
        }
    };

    for item in &payload.inventory_transfer_items {
        let c_item = normalize_feed_text(item.product_name.as_deref().unwrap_or_default());
        if c_item.is_empty() {
            continue;
        }
        let set_item_tokens = derive_tokens(&c_item);
        let type_override = TUP_FEED_TYPE_OVERRIDES
            .iter()
            .find(|(c_keyword, _)| c_item.contains(c_keyword))
            .map(|(_, c_type)| *c_type);

        for key in &l_prefiltered {
            if type_override.is_some_and(|c_type| key.c_type != c_type) {
                continue;
            }
            if if_names_match(&c_item, &set_item_tokens, &key.c_norm) {
                push_name(key.record, &mut l_names);
            }
        }
    }
    let n_direct = l_names.len();

    if options.if_include_prefiltered {
        for key in &l_prefiltered {
            push_name(key.record, &mut l_names);
        }
    }
    tracing::debug!(
        "Feed matched {n_direct} records directly, {} with prefiltered ({} candidates).",
        l_names.len(),
        l_prefiltered.len()
    );
    l_names
}

/// Parse `c_json` and match it against `records`.
pub fn match_feed_json(
    records: &[SpecLabelRecord],
    c_json: &str,
    options: &SpecFeedMatchOptions,
) -> Result<Vec<String>, LabelError> {
    let payload = parse_feed(c_json)?;
    Ok(match_feed_records(records, &payload, options))
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
