use std::fmt::Write as _;
use std::sync::Arc;

use axum::{response::Html, Extension};

use super::reply::entity_sets;
use crate::state::AppState;

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

/// Welcome page listing every mounted service and its entity sets.
pub fn render_index(state: &AppState) -> String {
    let mut body = String::new();
    for mounted in state.mounted_services() {
        let name = escape(&mounted.name);
        let _ = write!(
            body,
            "<h2>{name}</h2>\n<p><a href=\"/odata/v4/{name}/\">/odata/v4/{name}</a> \
             &middot; <a href=\"/v2/{name}/\">/v2/{name}</a>",
        );
        if !mounted.requires.is_empty() {
            let _ = write!(body, " &middot; requires <code>{}</code>", escape(&mounted.requires.join(", ")));
        }
        body.push_str("</p>\n<ul>\n");
        for set in entity_sets(&state.model, &mounted.name) {
            let set = escape(set);
            let _ = writeln!(
                body,
                "  <li><a href=\"/odata/v4/{name}/{set}\">{set}</a></li>"
            );
        }
        body.push_str("</ul>\n");
    }
    if body.is_empty() {
        body.push_str("<p>No services are mounted.</p>\n");
    }

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="utf-8"/>
  <title>CDS OData Server</title>
</head>
<body>
<h1>Welcome to the CDS OData server</h1>
{body}<p><a href="/health">/health</a></p>
</body>
</html>"#
    )
}

pub async fn index_page(Extension(state): Extension<Arc<AppState>>) -> Html<String> {
    Html(render_index(&state))
}
