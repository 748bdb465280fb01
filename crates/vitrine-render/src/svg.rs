//! Vector placeholders

/// Default skeleton size when the element carries no dimensions
pub const DEFAULT_WIDTH: u32 = 400;
pub const DEFAULT_HEIGHT: u32 = 300;

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

/// Loading skeleton: a light grey diagonal gradient with a `Loading...` label
pub fn skeleton_svg(width: Option<u32>, height: Option<u32>) -> String {
    let width = width.filter(|w| *w > 0).unwrap_or(DEFAULT_WIDTH);
    let height = height.filter(|h| *h > 0).unwrap_or(DEFAULT_HEIGHT);

    format!(
        concat!(
            r#"<svg width="{w}" height="{h}" xmlns="http://www.w3.org/2000/svg">"#,
            r#"<defs><linearGradient id="grad" x1="0%" y1="0%" x2="100%" y2="100%">"#,
            r#"<stop offset="0%" style="stop-color:#f0f0f0;stop-opacity:1" />"#,
            r#"<stop offset="100%" style="stop-color:#e0e0e0;stop-opacity:1" />"#,
            r#"</linearGradient></defs>"#,
            r#"<rect width="100%" height="100%" fill="url(#grad)" />"#,
            r##"<text x="50%" y="50%" font-family="Arial, sans-serif" font-size="14" fill="#999" text-anchor="middle" dy=".3em">Loading...</text>"##,
            r#"</svg>"#,
        ),
        w = width,
        h = height,
    )
}

/// Stand-in served for an image that is neither cached nor reachable
pub fn offline_svg(filename: &str) -> String {
    format!(
        concat!(
            r#"<svg width="400" height="300" xmlns="http://www.w3.org/2000/svg">"#,
            r##"<rect width="100%" height="100%" fill="#f0f0f0"/>"##,
            r##"<text x="50%" y="50%" font-family="Arial, sans-serif" font-size="14" fill="#999" text-anchor="middle" dy=".3em">{name}</text>"##,
            r##"<text x="50%" y="60%" font-family="Arial, sans-serif" font-size="12" fill="#ccc" text-anchor="middle" dy=".3em">Offline</text>"##,
            r#"</svg>"#,
        ),
        name = escape(filename),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skeleton_defaults() {
        let svg = skeleton_svg(None, Some(0));
        assert!(svg.contains(r#"width="400""#));
        assert!(svg.contains(r#"height="300""#));
        assert!(svg.contains("#f0f0f0"));
        assert!(svg.contains("#e0e0e0"));
        assert!(svg.contains("Loading..."));
    }

    #[test]
    fn test_skeleton_uses_dimensions() {
        let svg = skeleton_svg(Some(640), Some(480));
        assert!(svg.starts_with(r#"<svg width="640" height="480""#));
    }

    #[test]
    fn test_offline_names_file() {
        let svg = offline_svg("sunset<1>.jpg");
        assert!(svg.contains("sunset&lt;1&gt;.jpg"));
        assert!(svg.contains("Offline"));
    }
}
