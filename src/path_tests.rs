#[cfg(test)]
mod tests {
    use crate::path::{
        canonicalize, is_ancestor_of, is_descendant_of, parse, prefix_relative, to_canonical,
        Path, PathKey,
    };
    use proptest::prelude::*;

    fn name(s: &str) -> PathKey {
        PathKey::Name(s.to_string())
    }

    #[test]
    fn test_parse_dotted_and_bracketed() {
        let path = parse("a.b[0].c");
        assert_eq!(
            path.keys(),
            &[name("a"), name("b"), PathKey::Index(0), name("c")]
        );
        assert_eq!(path.to_canonical(), "a.b[0].c");
    }

    #[test]
    fn test_equivalent_spellings_share_a_canonical_form() {
        assert_eq!(canonicalize("a.b"), "a.b");
        assert_eq!(canonicalize(".a.b"), "a.b");
        assert_eq!(canonicalize(r#"a["b"]"#), "a.b");
        assert_eq!(canonicalize("a['b']"), "a.b");
        assert_eq!(canonicalize("items[ 2 ]"), "items[2]");
    }

    #[test]
    fn test_non_identifier_names_are_quoted() {
        let path = Path::from_keys(vec![name("a"), name("weird key"), name("q\"uote")]);
        assert_eq!(to_canonical(&path), r#"a["weird key"]["q\"uote"]"#);
        assert_eq!(parse(&to_canonical(&path)), path);
    }

    #[test]
    fn test_digit_names_stay_names() {
        let path = Path::from_keys(vec![name("a"), name("0")]);
        assert_eq!(to_canonical(&path), r#"a["0"]"#);
        assert_eq!(parse(r#"a["0"]"#).keys()[1], name("0"));
    }

    #[test]
    fn test_dotted_digit_segments_are_indices() {
        assert_eq!(parse("items.0").keys(), &[name("items"), PathKey::Index(0)]);
        assert_eq!(canonicalize("items.0.name"), "items[0].name");
        assert_eq!(canonicalize("items.0"), canonicalize("items[0]"));
        assert_eq!(canonicalize("0"), "[0]");
        // mixed digits and letters stay names
        assert_eq!(parse("a.0b").keys()[1], name("0b"));
    }

    #[test]
    fn test_root_forms() {
        assert!(parse("").is_root());
        assert!(parse(".").is_root());
        assert!(parse("   ").is_root());
        assert_eq!(to_canonical(&Path::root()), "");
    }

    #[test]
    fn test_malformed_input_keeps_longest_valid_prefix() {
        assert_eq!(canonicalize("a[0"), "a");
        assert_eq!(canonicalize("a..b"), "a");
        assert_eq!(canonicalize("a.b]"), "a");
        assert_eq!(canonicalize(r#"a["open"#), "a");
        assert_eq!(canonicalize("a[]"), "a");
        assert_eq!(canonicalize("user.tags[1]x"), "user.tags[1]");
    }

    #[test]
    fn test_parent_and_child() {
        let path = parse("a.b[3]");
        assert_eq!(path.parent().map(|p| p.to_canonical()), Some("a.b".to_string()));
        assert_eq!(path.last(), Some(&PathKey::Index(3)));
        assert_eq!(path.child(name("c")).to_canonical(), "a.b[3].c");
        assert!(Path::root().parent().is_none());
    }

    #[test]
    fn test_ancestor_checks() {
        assert!(is_ancestor_of("a", "a.b"));
        assert!(is_ancestor_of("a", "a[0]"));
        assert!(is_ancestor_of("a.b", "a.b"));
        assert!(is_ancestor_of("", "anything"));
        assert!(!is_ancestor_of("a", "ab"));
        assert!(!is_ancestor_of("a.b", "a"));

        assert!(is_descendant_of("a.b", "a"));
        assert!(!is_descendant_of("a", "a"));
    }

    #[test]
    fn test_prefix_relative() {
        let prefix = parse("items[0]");
        assert_eq!(prefix_relative(&prefix, "name"), "items[0].name");
        assert_eq!(prefix_relative(&prefix, "tags[1]"), "items[0].tags[1]");
        assert_eq!(prefix_relative(&prefix, ""), "items[0]");
        assert_eq!(prefix_relative(&prefix, "."), "items[0]");
        // already prefixed
        assert_eq!(prefix_relative(&prefix, "items[0].name"), "items[0].name");
        assert_eq!(prefix_relative(&prefix, "items[0]"), "items[0]");
    }

    fn key_strategy() -> impl Strategy<Value = PathKey> {
        prop_oneof![
            "[A-Za-z_$][A-Za-z0-9_$]{0,8}".prop_map(PathKey::Name),
            "[ -~]{0,8}".prop_map(PathKey::Name),
            (0usize..10_000).prop_map(PathKey::Index),
        ]
    }

    proptest! {
        #[test]
        fn test_canonical_round_trip(keys in prop::collection::vec(key_strategy(), 0..6)) {
            let path = Path::from_keys(keys);
            prop_assert_eq!(parse(&to_canonical(&path)), path);
        }

        #[test]
        fn test_parse_is_stable_under_canonicalization(text in r#"[a-c0-9 .\[\]"'\\]{0,16}"#) {
            let parsed = parse(&text);
            prop_assert_eq!(parse(&to_canonical(&parsed)), parsed);
        }
    }
}
