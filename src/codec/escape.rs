use std::borrow::Cow;
use std::fmt::Display;

use quick_xml::escape::escape;

use crate::data::osm::Tags;

/// Makes a tag key safe for a `k` attribute: spaces become underscores and
/// `&` becomes `and` before XML escaping.
pub fn escape_key(key: &str) -> String {
    let key = key.replace(' ', "_").replace('&', "and");
    escape(key.as_str()).into_owned()
}

/// XML-escapes an attribute or tag value.
pub fn escape_value(value: &str) -> Cow<'_, str> {
    escape(value)
}

/// Normalizes a raw form value into a single-entry tag map.
///
/// `&` is spelled out as `and` and double quotes are dropped. A value of the
/// form `key=value` overrides the field name, so one bulk field can carry a
/// structured tag; failing that, a field name of the same form supplies the
/// key.
pub fn make_tag(field: &str, raw_value: impl Display) -> Tags {
    let value = raw_value.to_string().replace('&', "and").replace('"', "");

    let (key, value) = if let Some((key, rest)) = value.split_once('=') {
        // Anything after a second `=` is discarded.
        let rest = rest.split('=').next().unwrap_or_default();
        (key.to_string(), rest.to_string())
    } else if let Some((key, _)) = field.split_once('=') {
        (key.to_string(), value)
    } else {
        (field.to_string(), value)
    };

    Tags::from([(key, Some(value))])
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("name", "Tom & Jerry", "name", "Tom and Jerry")]
    #[case("name", "\"quoted\"", "name", "quoted")]
    #[case("bulk", "amenity=cafe", "amenity", "cafe")]
    #[case("bulk", "a=b=c", "a", "b")]
    #[case("shop=bakery", "yes", "shop", "yes")]
    fn make_tag_normalizes(
        #[case] field: &str,
        #[case] raw: &str,
        #[case] key: &str,
        #[case] value: &str,
    ) {
        let tag = make_tag(field, raw);
        assert_eq!(tag.len(), 1);
        assert_eq!(tag.get(key), Some(&Some(value.to_string())));
    }

    #[test]
    fn make_tag_stringifies_numbers() {
        let tag = make_tag("levels", 3);
        assert_eq!(tag.get("levels"), Some(&Some("3".to_string())));
    }

    #[test]
    fn keys_lose_spaces_and_markup() {
        assert_eq!(escape_key("opening hours"), "opening_hours");
        assert_eq!(escape_key("a&b"), "aandb");
        assert_eq!(escape_key("<x>"), "&lt;x&gt;");
    }

    #[test]
    fn values_are_xml_escaped() {
        assert_eq!(escape_value("Fish & \"Chips\""), "Fish &amp; &quot;Chips&quot;");
    }
}
