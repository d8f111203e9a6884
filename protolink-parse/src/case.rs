//! Identifier checks and the name transforms used when building descriptors.

/// Returns `true` if `s` is a valid protobuf identifier.
pub fn is_valid_ident(s: &str) -> bool {
    match s.as_bytes().split_first() {
        Some((first, rest)) => {
            (first.is_ascii_alphabetic() || *first == b'_')
                && rest.iter().all(|&ch| ch.is_ascii_alphanumeric() || ch == b'_')
        }
        None => false,
    }
}

/// Returns `true` if `s` is a valid group name: an identifier starting with a capital letter.
pub fn is_valid_group_name(s: &str) -> bool {
    match s.as_bytes().split_first() {
        Some((first, rest)) => {
            first.is_ascii_uppercase()
                && rest.iter().all(|&ch| ch.is_ascii_alphanumeric() || ch == b'_')
        }
        None => false,
    }
}

/// Computes the default JSON name of a field: underscores are dropped and the following
/// character is capitalized.
pub fn to_json_name(name: &str) -> String {
    let mut result = String::with_capacity(name.len());
    let mut uppercase_next = false;

    for ch in name.chars() {
        if ch == '_' {
            uppercase_next = true
        } else if uppercase_next {
            result.push(ch.to_ascii_uppercase());
            uppercase_next = false;
        } else {
            result.push(ch);
        }
    }

    result
}

/// Converts a snake case name to pascal case, as used for map entry message names.
pub fn to_pascal_case(name: &str) -> String {
    let mut result = String::with_capacity(name.len());
    let mut uppercase_next = true;

    for ch in name.chars() {
        if ch == '_' {
            uppercase_next = true
        } else if uppercase_next {
            result.push(ch.to_ascii_uppercase());
            uppercase_next = false;
        } else {
            result.push(ch);
        }
    }

    result
}

/// Lowercases a name and strips underscores. Two field names with the same result conflict
/// in proto3 files.
pub fn to_lower_without_underscores(name: &str) -> String {
    name.chars()
        .filter_map(|ch| match ch {
            '_' => None,
            _ => Some(ch.to_ascii_lowercase()),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_name() {
        assert_eq!(to_json_name("foo_bar"), "fooBar");
        assert_eq!(to_json_name("foo__bar_"), "fooBar");
        assert_eq!(to_json_name("_foo"), "Foo");
        assert_eq!(to_json_name("fooBar"), "fooBar");
        assert_eq!(to_json_name("foo_1bar"), "foo1bar");
    }

    #[test]
    fn pascal_case() {
        assert_eq!(to_pascal_case("map_field"), "MapField");
        assert_eq!(to_pascal_case("mapField"), "MapField");
        assert_eq!(to_pascal_case("_map"), "Map");
    }

    #[test]
    fn idents() {
        assert!(is_valid_ident("foo_1"));
        assert!(is_valid_ident("_foo"));
        assert!(!is_valid_ident("1foo"));
        assert!(!is_valid_ident(""));
        assert!(!is_valid_ident("foo.bar"));

        assert!(is_valid_group_name("Foo"));
        assert!(!is_valid_group_name("foo"));
        assert!(!is_valid_group_name("_Foo"));
    }

    #[test]
    fn lower_without_underscores() {
        assert_eq!(to_lower_without_underscores("Foo_Bar"), "foobar");
        assert_eq!(
            to_lower_without_underscores("foo_bar"),
            to_lower_without_underscores("fooBar")
        );
    }
}
