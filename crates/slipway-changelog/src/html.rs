//! Release-note rendering from markdown to HTML
//!
//! Rendering is total: any input produces some HTML. Malformed markup simply
//! degrades to plain paragraphs, which is what the update feed wants anyway.

use pulldown_cmark::{html, Options, Parser};

/// Convert release-note markdown to an HTML fragment.
///
/// Tables, strikethrough and task lists are enabled on top of CommonMark
/// (fenced code blocks and autolinks are part of the core dialect).
pub fn render_fragment(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);

    let parser = Parser::new_ext(markdown, options);
    let mut out = String::with_capacity(markdown.len() * 2);
    html::push_html(&mut out, parser);
    out
}

/// Wrap rendered release notes in a minimal standalone HTML document.
pub fn render_document(markdown: &str, version: Option<&str>) -> String {
    let title = match version {
        Some(v) => format!("Release Notes - Version {v}"),
        None => "Release Notes".to_string(),
    };

    format!(
        "<!DOCTYPE html>\n\
         <html>\n\
         <head>\n\
         \x20   <meta charset=\"utf-8\">\n\
         \x20   <title>{title}</title>\n\
         </head>\n\
         <body>\n\
         {}\
         </body>\n\
         </html>",
        render_fragment(markdown)
    )
}
