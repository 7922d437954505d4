//! Comma-separated list and key=value parsing for single-line tags.

use crate::command::Entries;

/// Parse `a=1, b=2` into a map.
///
/// Pairs are split on `,` and then on `=`. Everything after the first `=`
/// is the value, so `url=https://x.io/?a=b` keeps its inner `=`. Pairs with
/// an empty key or an empty value are dropped. A repeated key keeps the last
/// value.
pub fn parse_pairs(raw: &str) -> Entries {
    raw.split(',')
        .filter_map(|segment| {
            let mut parts = segment.split('=');
            let key = parts.next()?.trim();
            let value = parts.collect::<Vec<_>>().join("=");
            let value = value.trim();

            if key.is_empty() || value.is_empty() {
                return None;
            }
            Some((key.to_string(), value.to_string()))
        })
        .collect()
}

/// Parse `Home, About Us, Contact` into trimmed, non-empty items.
pub fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}
