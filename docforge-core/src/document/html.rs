use super::blocks::enable_extensions;
use comrak::{markdown_to_html as render_fragment, Options};

const STYLE: &str = "\
body { font-family: Arial, sans-serif; margin: 40px; }
code { background-color: #f4f4f4; padding: 2px 5px; }
pre { background-color: #f4f4f4; padding: 10px; }";

/// Render markdown to a standalone HTML page with the embedded stylesheet.
pub fn markdown_to_html(source: &str) -> String {
    let mut options = Options::default();
    enable_extensions(&mut options);
    let body = render_fragment(source, &options);

    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<style>\n{STYLE}\n</style>\n</head>\n<body>\n{body}</body>\n</html>\n"
    )
}
