//! Raw, untyped query parameters as supplied by a client.
//!
//! [`QueryParams`] keeps every `(key, value)` pair in the order it was given,
//! including repeated keys, because filter translation depends on that order
//! (last equality wins, every range applies).

use std::borrow::Cow;

/// Reserved parameter holding the 1-indexed page number.
pub const PAGE: &str = "page";
/// Reserved parameter holding the comma-separated sort keys.
pub const SORT: &str = "sort";
/// Reserved parameter holding the page size.
pub const LIMIT: &str = "limit";
/// Reserved parameter holding the comma-separated projection.
pub const FIELDS: &str = "fields";

/// Keys that control the query shape and are never treated as filter fields.
pub const RESERVED: [&str; 4] = [PAGE, SORT, LIMIT, FIELDS];

/// An ordered list of raw query parameters.
///
/// ```ignore
/// use docgate::params::QueryParams;
///
/// let params = QueryParams::parse("difficulty=easy&duration[gte]=5&sort=-price");
/// assert_eq!(params.get("sort"), Some("-price"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    entries: Vec<(String, String)>,
}

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds parameters from already decoded pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        pairs.into_iter().collect()
    }

    /// Parses a URL query string such as `page=2&price[lt]=500`.
    ///
    /// A leading `?` is ignored, `+` decodes to a space and percent escapes are
    /// decoded. Pieces that fail to decode are kept verbatim.
    pub fn parse(query_string: &str) -> Self {
        query_string
            .trim_start_matches('?')
            .split('&')
            .filter(|pair| !pair.is_empty())
            .map(|pair| match pair.split_once('=') {
                Some((key, value)) => (decode(key), decode(value)),
                None => (decode(pair), String::new()),
            })
            .collect()
    }

    /// Returns the last value given for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Appends a pair, keeping earlier values for the same key.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.entries.push((key.into(), value.into()));
        self
    }

    /// Replaces every value for `key` with a single new value.
    pub fn set(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        self.entries.retain(|(k, _)| *k != key);
        self.entries.push((key, value.into()));
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for QueryParams
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

fn decode(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(Cow::Borrowed(_)) => spaced,
        Ok(Cow::Owned(decoded)) => decoded,
        Err(_) => spaced,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_decodes_brackets_and_spaces() {
        let params = QueryParams::parse("?name=The+Forest%20Hiker&duration%5Bgte%5D=5");

        assert_eq!(params.get("name"), Some("The Forest Hiker"));
        assert_eq!(params.get("duration[gte]"), Some("5"));
    }

    #[test]
    fn get_returns_last_value() {
        let params = QueryParams::parse("price=100&price=200");
        assert_eq!(params.get("price"), Some("200"));
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn set_replaces_all_values() {
        let params = QueryParams::parse("limit=10&limit=20").set("limit", "5");
        assert_eq!(params.iter().collect::<Vec<_>>(), vec![("limit", "5")]);
    }

    #[test]
    fn bare_key_has_empty_value() {
        let params = QueryParams::parse("sort&&page=2");
        assert_eq!(params.get("sort"), Some(""));
        assert_eq!(params.get("page"), Some("2"));
    }
}
