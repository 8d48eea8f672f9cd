/// HTML encoding utilities
pub struct HtmlEncoder;

impl HtmlEncoder {
    /// Encode HTML entities so markup renders as visible text
    pub fn encode_html(text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        for c in text.chars() {
            match c {
                '<' => out.push_str("&lt;"),
                '>' => out.push_str("&gt;"),
                '"' => out.push_str("&quot;"),
                '\'' => out.push_str("&#x27;"),
                '&' => out.push_str("&amp;"),
                '/' => out.push_str("&#x2F;"),
                _ => out.push(c),
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_html() {
        let encoded = HtmlEncoder::encode_html("<marquee>Rex & 'Co'</marquee>");
        assert_eq!(
            encoded,
            "&lt;marquee&gt;Rex &amp; &#x27;Co&#x27;&lt;&#x2F;marquee&gt;"
        );
    }

    #[test]
    fn test_plain_text_untouched() {
        assert_eq!(HtmlEncoder::encode_html("Fluffy the cat"), "Fluffy the cat");
    }
}
