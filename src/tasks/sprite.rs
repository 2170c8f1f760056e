//! SVG stack sprite
//!
//! Every icon becomes a nested `<svg id="…">` inside one document. Only the
//! icon addressed by the URL fragment is displayed:
//!
//! ```text
//! sprite.svg#menu  ──►  :root>svg:target { display: block }
//! ```

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use tracing::{debug, warn};

use crate::runner::{Task, TaskContext, TaskKind, TaskReport};
use crate::utils::{extension, file_stem, list_files, write_file};

static PROLOG_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<\?xml.*?\?>|<!DOCTYPE[^>]*>|<!--.*?-->").unwrap()
});

static ROOT_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^\s*<svg\b([^>]*)>(.*)</svg>\s*$").unwrap()
});

static ATTR_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"([\w:.-]+)\s*=\s*(?:"([^"]*)"|'([^']*)')"#).unwrap()
});

static ID_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(^|\s)id\s*=\s*(?:"([^"]*)"|'([^']*)')"#).unwrap()
});

/// Root attributes that only make sense on the standalone document
fn is_dropped_attribute(name: &str) -> bool {
    name == "xmlns"
        || name.starts_with("xmlns:")
        || matches!(name, "id" | "version" | "x" | "y")
}

const STACK_STYLE: &str = ":root>svg{display:none}:root>svg:target{display:block}";

pub struct SpriteTask;

#[async_trait]
impl Task for SpriteTask {
    fn kind(&self) -> TaskKind {
        TaskKind::Sprite
    }

    async fn run(&self, ctx: &TaskContext) -> Result<TaskReport> {
        let config = &ctx.config;
        let output = config.sprite_output();
        let mut report = TaskReport::new();

        let mut icons = Vec::new();
        for path in list_files(&config.sprite_source())? {
            if extension(&path) != "svg" || path == output {
                continue;
            }

            let source = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read icon: {}", path.display()))?;
            icons.push((icon_id(&path), source));
        }

        if icons.is_empty() {
            warn!("No SVG icons found in {}", ctx.display_path(&config.sprite_source()));
            return Ok(report);
        }

        let sprite = build_sprite(&icons)?;
        write_file(&output, sprite)?;
        report.wrote(output);

        if config.sprite.example {
            let example = config.sprite_source().join("stack").join("sprite.stack.html");
            let ids: Vec<&str> = icons.iter().map(|(id, _)| id.as_str()).collect();
            write_file(&example, example_page(&config.sprite.output, &ids))?;
            report.wrote(example);
        }

        Ok(report)
    }
}

/// Sprite id for an icon file: its stem with unsafe characters replaced
fn icon_id(path: &Path) -> String {
    file_stem(path)
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '-' })
        .collect()
}

/// Stack `(id, svg source)` pairs into a sprite document
pub fn build_sprite(icons: &[(String, String)]) -> Result<String> {
    let mut sprite = String::from(
        r#"<?xml version="1.0" encoding="utf-8"?><svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink">"#,
    );
    sprite.push_str("<style>");
    sprite.push_str(STACK_STYLE);
    sprite.push_str("</style>");

    for (id, source) in icons {
        sprite.push_str(&nest_icon(id, source)?);
    }

    sprite.push_str("</svg>");
    Ok(sprite)
}

fn nest_icon(id: &str, source: &str) -> Result<String> {
    let cleaned = PROLOG_REGEX.replace_all(source, "");
    let root = ROOT_REGEX
        .captures(&cleaned)
        .with_context(|| format!("Icon `{}` is not an SVG document", id))?;

    let attributes: Vec<(String, String)> = ATTR_REGEX
        .captures_iter(&root[1])
        .map(|cap| {
            let value = cap.get(2).or_else(|| cap.get(3)).map(|m| m.as_str()).unwrap_or("");
            (cap[1].to_string(), value.to_string())
        })
        .collect();

    let lookup = |name: &str| {
        attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    };

    let mut nested = String::from("<svg");

    if lookup("viewBox").is_none() {
        if let (Some(w), Some(h)) = (lookup("width").and_then(dimension), lookup("height").and_then(dimension)) {
            nested.push_str(&format!(r#" viewBox="0 0 {} {}""#, w, h));
        }
    }

    for (name, value) in &attributes {
        if !is_dropped_attribute(name) {
            nested.push_str(&format!(r#" {}="{}""#, name, value.replace('"', "&quot;")));
        }
    }

    nested.push_str(&format!(r#" id="{}" xmlns="http://www.w3.org/2000/svg">"#, id));
    nested.push_str(namespace_ids(id, root[2].trim()).as_str());
    nested.push_str("</svg>");

    debug!("Stacked icon `{}`", id);
    Ok(nested)
}

/// Numeric value of a width/height attribute, `px` allowed
fn dimension(value: &str) -> Option<f64> {
    value.trim().trim_end_matches("px").parse().ok()
}

/// Prefix ids inside an icon so icons cannot clash with each other
fn namespace_ids(prefix: &str, body: &str) -> String {
    let ids: Vec<String> = ID_REGEX
        .captures_iter(body)
        .filter_map(|cap| cap.get(2).or_else(|| cap.get(3)).map(|m| m.as_str().to_string()))
        .collect();

    if ids.is_empty() {
        return body.to_string();
    }

    let mut result = ID_REGEX
        .replace_all(body, |cap: &Captures| {
            let id = cap.get(2).or_else(|| cap.get(3)).map(|m| m.as_str()).unwrap_or("");
            format!(r#"{}id="{}_{}""#, &cap[1], prefix, id)
        })
        .into_owned();

    for id in &ids {
        result = result
            .replace(&format!("url(#{})", id), &format!("url(#{}_{})", prefix, id))
            .replace(&format!("=\"#{}\"", id), &format!("=\"#{}_{}\"", prefix, id));
    }

    result
}

/// Preview page listing every icon of the sprite
fn example_page(sprite_name: &str, ids: &[&str]) -> String {
    let items: String = ids
        .iter()
        .map(|id| {
            format!(
                "      <li><img src=\"../{sprite}#{id}\" alt=\"{id}\" width=\"48\" height=\"48\"><code>{id}</code></li>\n",
                sprite = sprite_name,
                id = id
            )
        })
        .collect();

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
  <head>
    <meta charset="UTF-8" />
    <title>{sprite} preview</title>
    <style>
      body {{ font-family: sans-serif; margin: 2rem; }}
      ul {{ display: flex; flex-wrap: wrap; gap: 1.5rem; list-style: none; padding: 0; }}
      li {{ display: flex; flex-direction: column; align-items: center; gap: .5rem; }}
    </style>
  </head>
  <body>
    <h1>{sprite}</h1>
    <p>{count} icon(s). Reference one with <code>{sprite}#id</code>.</p>
    <ul>
{items}    </ul>
  </body>
</html>
"#,
        sprite = sprite_name,
        count = ids.len(),
        items = items
    )
}
