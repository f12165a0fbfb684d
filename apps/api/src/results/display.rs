use serde_json::Value;

/// Pretty-prints a parsed resume with two-space indentation.
/// An absent result renders as an empty string.
pub fn pretty_json(parsed: Option<&Value>) -> String {
    parsed
        .and_then(|value| serde_json::to_string_pretty(value).ok())
        .unwrap_or_default()
}

/// Renders the "Parsed Resume" page. Always succeeds, with or without a result.
pub fn render_page(parsed: Option<&Value>) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>Parsed Resume</title>
</head>
<body>
<main>
<h1>Parsed Resume</h1>
<pre style="white-space: pre-wrap">{}</pre>
</main>
</body>
</html>
"#,
        escape_html(&pretty_json(parsed))
    )
}

/// Escapes text placed inside an element body.
fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
    out
}
