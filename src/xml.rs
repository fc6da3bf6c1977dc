/// XML 1.0 valid char ranges:
/// - 0x09, 0x0A, 0x0D
/// - 0x20..=0xD7FF
/// - 0xE000..=0xFFFD
/// - 0x10000..=0x10FFFF
fn is_valid_xml_char(c: char) -> bool {
    matches!(
        c as u32,
        0x09 | 0x0A | 0x0D | 0x20..=0xD7FF | 0xE000..=0xFFFD | 0x10000..=0x10FFFF
    )
}

/// Escapes text or attribute content coming from the task store. Characters
/// XML cannot carry at all are dropped.
pub fn escape_xml(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if !is_valid_xml_char(c) {
            continue;
        }
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// A colour from the task store, or `fallback` when it is not a plain
/// `#rgb` / `#rrggbb` / `#rrggbbaa` hex value.
pub fn sanitize_color<'a>(color: Option<&'a str>, fallback: &'a str) -> &'a str {
    match color.map(str::trim) {
        Some(c) if is_hex_color(c) => c,
        _ => fallback,
    }
}

fn is_hex_color(value: &str) -> bool {
    let Some(digits) = value.strip_prefix('#') else {
        return false;
    };
    matches!(digits.len(), 3 | 4 | 6 | 8) && digits.chars().all(|c| c.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::{escape_xml, sanitize_color};

    #[test]
    fn remove_invalid_control_chars() {
        assert_eq!(escape_xml("Ship\u{0007} v2\u{000C}"), "Ship v2");
    }

    #[test]
    fn keep_valid_whitespace_controls() {
        let s = "plan\tbuild\nship";
        assert_eq!(escape_xml(s), s);
    }

    #[test]
    fn escape_special_xml_chars() {
        assert_eq!(
            escape_xml(r#"Q&A <"draft"> 'v1'"#),
            "Q&amp;A &lt;&quot;draft&quot;&gt; &apos;v1&apos;"
        );
    }

    #[test]
    fn colors_must_be_hex() {
        assert_eq!(sanitize_color(Some("#FF9500"), "#000"), "#FF9500");
        assert_eq!(sanitize_color(Some(" #abc "), "#000"), "#abc");
        assert_eq!(sanitize_color(Some("red\" onload=\"x"), "#000"), "#000");
        assert_eq!(sanitize_color(Some("#12345"), "#000"), "#000");
        assert_eq!(sanitize_color(None, "#000"), "#000");
    }
}
