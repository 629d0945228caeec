//! HTML pages

use html_escape::{encode_double_quoted_attribute, encode_text};

const STYLESHEET: &str = "https://cdn.jsdelivr.net/npm/water.css@2/out/water.css";

const PAGE_TITLE: &str = "Random Cat Photo";

fn page(title: &str, content: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
  <head>
    <title>{title}</title>
    <link rel="stylesheet" href="{STYLESHEET}" />
  </head>
  <body style="height: 100vh; margin: 0; display: flex; justify-content: center; align-items: center; max-width: 100vw;">
    <div style="display: flex; flex-direction: column; gap: 8px; align-items: center;">
{content}
    </div>
  </body>
</html>
"#,
        title = encode_text(title),
    )
}

/// The photo page: the image and its attribution below it
#[must_use]
pub fn render_photo_page(image_url: &str, attribution: &str) -> String {
    let content = format!(
        "      <img style=\"height: 500px\" src=\"{}\" />\n      <p>{}</p>",
        encode_double_quoted_attribute(image_url),
        encode_text(attribution.trim()),
    );
    page(PAGE_TITLE, &content)
}

/// A page with a heading and a single message, for uploads and errors
#[must_use]
pub fn render_message(title: &str, message: &str) -> String {
    let content = format!("      <h2>{}</h2>\n      <p>{}</p>", encode_text(title), encode_text(message));
    page(title, &content)
}
