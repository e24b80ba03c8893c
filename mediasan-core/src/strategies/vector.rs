//! SVG strategies.
//!
//! The structural editor removes active content by node. The text rewrite is
//! the fallback when the editor fails or leaves something behind: it deletes
//! the same constructs with regexes, repeating until the markup stops
//! changing so that nested or split payloads collapse.
//!
//! License: MIT OR APACHE 2.0

use async_trait::async_trait;
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Cow;
use std::path::Path;

use super::{io_failure, SanitizationStrategy};
use crate::errors::ToolError;
use crate::tools::Toolkit;

/// Upper bound on rewrite passes.
pub const MAX_REWRITE_PASSES: usize = 8;

const ACTIVE_ELEMENTS: [&str; 5] = ["script", "foreignobject", "iframe", "object", "embed"];

/// Optional namespace prefix in front of an element name, e.g. `svg:`.
const PREFIX: &str = r"(?:[a-z_][a-z0-9_.-]*:)?";

/// Element with its content, one regex per name (no backreferences).
static PAIRED_ELEMENTS: Lazy<Vec<Regex>> = Lazy::new(|| {
    ACTIVE_ELEMENTS
        .iter()
        .map(|name| {
            Regex::new(&format!(
                r"(?is)<\s*{PREFIX}{name}\b[^>]*>.*?<\s*/\s*{PREFIX}{name}\s*>"
            ))
            .expect("paired element pattern is valid")
        })
        .collect()
});

/// Any opening, self-closing or closing tag left over after pairs are gone.
static LONE_TAGS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)<\s*/?\s*{PREFIX}(?:{})\b[^>]*>",
        ACTIVE_ELEMENTS.join("|")
    ))
    .expect("lone tag pattern is valid")
});

/// `on*` attribute with a quoted or bare value. The leading delimiter is kept.
static EVENT_HANDLERS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)([\s"'/])on[a-z]+\s*=\s*(?:"[^"]*"|'[^']*'|[^\s>]+)"#).expect("event handler pattern is valid")
});

/// `on*=` with no value at all.
static BARE_EVENT_HANDLERS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)([\s"'/])on[a-z]+\s*="#).expect("bare handler pattern is valid"));

static JAVASCRIPT_URIS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)javascript\s*:").expect("javascript uri pattern is valid"));

#[derive(Debug, Clone, Copy)]
pub struct StructuralRemoval;

#[async_trait]
impl SanitizationStrategy for StructuralRemoval {
    fn name(&self) -> &'static str {
        "structural-removal"
    }

    async fn attempt(&self, input: &Path, output: &Path, tools: &dyn Toolkit) -> Result<(), ToolError> {
        tools.structural_edit(input, output).await
    }
}

/// In-process regex rewrite. Needs no external tool.
#[derive(Debug, Clone, Copy)]
pub struct TextRewrite;

#[async_trait]
impl SanitizationStrategy for TextRewrite {
    fn name(&self) -> &'static str {
        "text-rewrite"
    }

    async fn attempt(&self, input: &Path, output: &Path, _tools: &dyn Toolkit) -> Result<(), ToolError> {
        let bytes = tokio::fs::read(input).await.map_err(|e| io_failure("read", e))?;
        let markup = String::from_utf8_lossy(&bytes);
        let rewritten = rewrite_markup(&markup);
        tokio::fs::write(output, rewritten.as_bytes())
            .await
            .map_err(|e| io_failure("write", e))
    }
}

/// Removes active content from SVG markup until a pass changes nothing or
/// [`MAX_REWRITE_PASSES`] is reached.
pub fn rewrite_markup(markup: &str) -> String {
    let mut current = markup.to_string();
    for pass in 1..=MAX_REWRITE_PASSES {
        let next = rewrite_once(&current);
        if next == current {
            debug!("Text rewrite reached a fixpoint after {} pass(es).", pass);
            return next;
        }
        current = next;
    }
    debug!("Text rewrite stopped after {} passes.", MAX_REWRITE_PASSES);
    current
}

/// One pass. Whole elements go first; lone tags and attributes are only
/// touched once no pair is left, so a payload reassembled by this pass is
/// removed whole by the next.
fn rewrite_once(markup: &str) -> String {
    let mut text = markup.to_string();
    for re in PAIRED_ELEMENTS.iter() {
        text = replace(re, &text, "");
    }
    if text != markup {
        return text;
    }
    text = replace(&LONE_TAGS, &text, "");
    text = replace(&EVENT_HANDLERS, &text, "$1");
    text = replace(&BARE_EVENT_HANDLERS, &text, "$1");
    replace(&JAVASCRIPT_URIS, &text, "")
}

fn replace(re: &Regex, text: &str, with: &str) -> String {
    match re.replace_all(text, with) {
        Cow::Borrowed(_) => text.to_string(),
        Cow::Owned(s) => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::MediaKind;
    use crate::predicates::SafetyPredicates;

    fn assert_safe(markup: &str) {
        let result = SafetyPredicates::builtin().unwrap().evaluate(MediaKind::Vector, markup);
        assert!(result.safe, "{markup}\n{:?}", result.violations);
    }

    #[test]
    fn script_elements_are_removed_with_content() {
        let out = rewrite_markup(r#"<svg><script type="text/javascript">alert(1)</script><rect/></svg>"#);
        assert_eq!(out, "<svg><rect/></svg>");
    }

    #[test]
    fn split_payloads_collapse() {
        let out = rewrite_markup("<svg><scr<script></script>ipt>alert(1)</script></svg>");
        assert_eq!(out, "<svg></svg>");
    }

    #[test]
    fn event_handlers_keep_surrounding_attributes() {
        let out = rewrite_markup(r#"<svg width="10" onload="alert(1)" height='5'><rect ONCLICK=go() fill="red"/></svg>"#);
        for kept in [r#"width="10""#, "height='5'", r#"fill="red""#] {
            assert!(out.contains(kept), "{out}");
        }
        assert!(!out.to_lowercase().contains("onload"));
        assert!(!out.to_lowercase().contains("onclick"));
        assert_safe(&out);
    }

    #[test]
    fn every_active_element_is_removed() {
        let markup = r#"<svg xmlns:svg="http://www.w3.org/2000/svg">
<foreignObject width="1"><div>x</div></foreignObject>
<iframe src="https://example.com"></iframe>
<object data="x.swf"/>
<EMBED src="x"/>
<svg:script>alert(1)</svg:script>
<a href=" JavaScript :alert(1)">link</a>
<script src="unterminated.js">
</svg>"#;
        let out = rewrite_markup(markup);
        assert_safe(&out);
        assert!(out.contains("link"));
    }

    #[test]
    fn clean_markup_is_left_alone() {
        let svg = r#"<svg xmlns="http://www.w3.org/2000/svg"><text>one online option</text></svg>"#;
        assert_eq!(rewrite_markup(svg), svg);
    }
}
