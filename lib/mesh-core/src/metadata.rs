//! Header metadata carried on contexts, nodes and messages

use std::collections::HashMap;

/// Key/value metadata
pub type Metadata = HashMap<String, String>;

/// Header carrying the payload content type of a published message
pub const HEADER_CONTENT_TYPE: &str = "Content-Type";

/// Header carrying the logical topic of a published message
pub const HEADER_TOPIC: &str = "Micro-Topic";

/// Build metadata from borrowed pairs
pub fn from_pairs<'a, I>(pairs: I) -> Metadata
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_pairs() {
        let md = from_pairs([("a", "1"), ("b", "2"), ("a", "3")]);
        assert_eq!(md.len(), 2);
        assert_eq!(md.get("a").map(String::as_str), Some("3"));
        assert_eq!(md.get("b").map(String::as_str), Some("2"));
    }
}
