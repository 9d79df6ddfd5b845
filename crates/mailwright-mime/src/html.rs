//! Plain-text fallback derived from an HTML body.
//!
//! Markup is dropped, block-level elements stay on separate lines and every
//! link keeps a visible destination, so nothing clickable in the HTML version
//! is lost in the text version.

use crate::error::{Error, Result};
use regex::Regex;
use scraper::{ElementRef, Html, Node};
use std::sync::LazyLock;

#[allow(clippy::expect_used)]
static BLOCK_CLOSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)</(?:p|div|li)\s*>").expect("valid block regex"));

/// Converts an HTML fragment to plain text.
///
/// Anchors whose visible text is empty get their destination appended,
/// prefixed with the `alt` text of a contained image or the anchor's `title`
/// when one is available. Anchors whose text already reads as their `href`
/// are left alone.
///
/// # Errors
///
/// Returns [`Error::HtmlParse`] if the input cannot be converted faithfully.
pub fn to_plain_text(html: &str) -> Result<String> {
    if html.contains('\0') {
        return Err(Error::HtmlParse("input contains NUL characters".into()));
    }

    let separated = BLOCK_CLOSE.replace_all(html, "\n${0}");
    let document = Html::parse_fragment(&separated);

    let mut text = String::with_capacity(html.len());
    // Anchors whose subtree is still being walked, with the text to emit once it closes.
    let mut open_anchors: Vec<(ElementRef<'_>, String)> = Vec::new();

    for node in document.root_element().descendants() {
        while let Some((anchor, _)) = open_anchors.last() {
            if node.ancestors().any(|ancestor| ancestor.id() == anchor.id()) {
                break;
            }
            if let Some((_, suffix)) = open_anchors.pop() {
                text.push_str(&suffix);
            }
        }

        match node.value() {
            Node::Text(content) => text.push_str(content),
            Node::Element(element) if element.name() == "a" => {
                if let Some(anchor) = ElementRef::wrap(node)
                    && let Some(suffix) = anchor_suffix(anchor)
                {
                    open_anchors.push((anchor, suffix));
                }
            }
            _ => {}
        }
    }

    while let Some((_, suffix)) = open_anchors.pop() {
        text.push_str(&suffix);
    }

    Ok(text.trim().to_string())
}

/// Text to append after an anchor's own content, if any.
fn anchor_suffix(anchor: ElementRef<'_>) -> Option<String> {
    let href = non_empty_attr(anchor, "href")?;

    let visible: String = anchor.text().collect();
    let visible = visible.trim();

    if visible == href || !visible.is_empty() {
        return None;
    }

    let image_alt = anchor
        .descendants()
        .filter_map(ElementRef::wrap)
        .filter(|element| element.value().name() == "img")
        .find_map(|image| non_empty_attr(image, "alt"));

    if let Some(alt) = image_alt {
        return Some(format!("{alt}: {href}"));
    }

    if let Some(title) = non_empty_attr(anchor, "title") {
        return Some(format!("{title}: {href}"));
    }

    Some(href.to_string())
}

fn non_empty_attr<'a>(element: ElementRef<'a>, name: &str) -> Option<&'a str> {
    element
        .value()
        .attr(name)
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_markup() {
        let text = to_plain_text("<b>Hello</b>, <i>World</i>!").unwrap();
        assert_eq!(text, "Hello, World!");
    }

    #[test]
    fn test_blocks_end_up_on_separate_lines() {
        let text = to_plain_text("<p>First</p><P>Second</P><div>Third</div><ul><li>Fourth</li></ul>")
            .unwrap();
        let lines: Vec<&str> = text.lines().map(str::trim).collect();
        assert_eq!(lines, vec!["First", "Second", "Third", "Fourth"]);
    }

    #[test]
    fn test_anchor_with_title_and_no_text() {
        let text = to_plain_text(r#"<a href="http://x.example" title="Click"></a>"#).unwrap();
        assert!(text.contains("Click: http://x.example"));
    }

    #[test]
    fn test_anchor_text_equal_to_href_is_not_duplicated() {
        let text =
            to_plain_text(r#"<p>See <a href="https://x.example">https://x.example</a></p>"#)
                .unwrap();
        assert_eq!(text.matches("https://x.example").count(), 1);
    }

    #[test]
    fn test_image_alt_wins_over_title() {
        let text = to_plain_text(
            r#"<a href="https://shop.example" title="Shop"><img src="cid:logo" alt="Logo"></a>"#,
        )
        .unwrap();
        assert_eq!(text, "Logo: https://shop.example");
    }

    #[test]
    fn test_image_without_alt_falls_back_to_title() {
        let text = to_plain_text(
            r#"<a href="https://shop.example" title="Shop"><img src="cid:logo"></a>"#,
        )
        .unwrap();
        assert_eq!(text, "Shop: https://shop.example");
    }

    #[test]
    fn test_bare_href_for_empty_anchor() {
        let text = to_plain_text(r#"Go <a href="https://x.example/go"></a> now"#).unwrap();
        assert_eq!(text, "Go https://x.example/go now");
    }

    #[test]
    fn test_anchor_with_own_text_left_alone() {
        let text = to_plain_text(r#"<a href="https://x.example">Read more</a>"#).unwrap();
        assert_eq!(text, "Read more");
    }

    #[test]
    fn test_anchor_without_href_left_alone() {
        let text = to_plain_text(r#"<a name="top"></a>Top"#).unwrap();
        assert_eq!(text, "Top");
    }

    #[test]
    fn test_suffix_follows_nested_content() {
        let text = to_plain_text(
            r#"<a href="https://x.example"><span><img alt="Icon"></span></a> <span>then</span>"#,
        )
        .unwrap();
        assert_eq!(text, "Icon: https://x.example then");
    }

    #[test]
    fn test_nul_is_rejected() {
        assert!(matches!(to_plain_text("a\0b"), Err(Error::HtmlParse(_))));
    }
}
