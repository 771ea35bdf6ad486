use once_cell::sync::Lazy;
use regex::Regex;

pub fn is_valid_email(string: &str) -> bool {
    static RE: Lazy<Regex> = Lazy::new(|| {
        Regex::new(
            r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$",
        )
        .unwrap()
    });
    RE.is_match(string)
}

/// Turns a title into the base of a URL slug: lowercase ASCII alphanumerics
/// separated by single dashes.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }

    if slug.is_empty() {
        "event".to_string()
    } else {
        slug
    }
}

/// Parses a 24 hour `HH:MM` time of day.
pub fn parse_time_of_day(s: &str) -> Option<chrono::NaiveTime> {
    static RE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"^([01][0-9]|2[0-3]):[0-5][0-9]$").unwrap());
    if !RE.is_match(s) {
        return None;
    }
    chrono::NaiveTime::parse_from_str(s, "%H:%M").ok()
}


#[cfg(test)]
mod test_slugify {
    use super::slugify;

    #[test]
    fn collapses_punctuation() {
        assert_eq!(slugify("  RustConf 2025: The Return!! "), "rustconf-2025-the-return");
    }

    #[test]
    fn empty_titles_still_get_a_slug() {
        assert_eq!(slugify("¡¡!!"), "event");
    }
}

#[cfg(test)]
mod test_time_of_day {
    use super::parse_time_of_day;

    #[test]
    fn accepts_24_hour_times() {
        assert!(parse_time_of_day("09:30").is_some());
        assert!(parse_time_of_day("23:59").is_some());
    }

    #[test]
    fn rejects_other_formats() {
        assert!(parse_time_of_day("9:30").is_none());
        assert!(parse_time_of_day("24:00").is_none());
        assert!(parse_time_of_day("09:30:00").is_none());
    }
}
