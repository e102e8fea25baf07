//! The rewrite rules, in pipeline order.
//!
//! Each rule is a tree predicate plus an edit. A rule that finds nothing
//! records nothing, and a rule whose target is already in its rewritten
//! shape records nothing, which keeps every rule idempotent.

use scraper::{ElementRef, Html};

use super::document::{all_elements, elements, escape_attr, has_doctype, Edits};
use super::guard::{GUARD_BODY, GUARD_MARKER, GUARD_SCRIPT};
use super::RewriteRule;

/// `src` substrings of scripts that are always dropped: ad loader, hit
/// counter, anti-devtools, and the upstream's obfuscated local loaders.
pub const SCRIPT_SRC_DENYLIST: &[&str] = &[
    "cloudnestra",
    "histats",
    "disable-devtool",
    "/asdf.js",
    "/sbx.js",
];

/// Ids of the upstream's ad containers.
pub const AD_CONTAINER_IDS: &[&str] = &["AdWidgetContainer", "ad720"];

/// Id of the upstream's inner player frame.
pub const PLAYER_FRAME_ID: &str = "player_iframe";

/// Sandbox granted to the player frame. No popups, no top navigation.
pub const PLAYER_SANDBOX: &str = "allow-scripts allow-same-origin allow-forms allow-presentation";

pub const PLAYER_REFERRER_POLICY: &str = "origin";

/// 1. Make relative URLs resolve against the upstream.
#[derive(Debug, Clone)]
pub struct BaseHref {
    href: String,
}

impl BaseHref {
    pub fn new(upstream_origin: &str) -> Self {
        Self {
            href: format!("{}/", upstream_origin.trim_end_matches('/')),
        }
    }

    pub fn href(&self) -> &str {
        &self.href
    }
}

impl RewriteRule for BaseHref {
    fn name(&self) -> &'static str {
        "base_href"
    }

    fn rewrite(&self, html: &Html, edits: &mut Edits) {
        if !has_doctype(html) {
            edits.prepend_doctype();
        }

        // The parser synthesizes <head> when the source has none.
        let Some(head) = elements(html, "head").next() else {
            return;
        };

        let bases: Vec<ElementRef> = elements(html, "base").collect();
        let leading = head.children().find_map(ElementRef::wrap).map(|el| el.id());
        let in_place = matches!(
            bases.as_slice(),
            [only] if Some(only.id()) == leading
                && only.value().attr("href") == Some(self.href.as_str())
        );
        if in_place {
            return;
        }

        for base in bases {
            edits.remove(base.id());
        }
        edits.prepend_html(head.id(), &format!(r#"<base href="{}">"#, escape_attr(&self.href)));
    }
}

/// 2. Drop scripts loaded from denylisted sources.
#[derive(Debug, Clone)]
pub struct ScriptDenylist {
    patterns: Vec<String>,
}

impl ScriptDenylist {
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            patterns: patterns
                .into_iter()
                .map(|p| p.as_ref().to_ascii_lowercase())
                .collect(),
        }
    }

    fn is_denied(&self, src: &str) -> bool {
        let src = src.to_ascii_lowercase();
        self.patterns.iter().any(|p| src.contains(p.as_str()))
    }
}

impl Default for ScriptDenylist {
    fn default() -> Self {
        Self::new(SCRIPT_SRC_DENYLIST)
    }
}

impl RewriteRule for ScriptDenylist {
    fn name(&self) -> &'static str {
        "script_denylist"
    }

    fn rewrite(&self, html: &Html, edits: &mut Edits) {
        for script in elements(html, "script") {
            // SVG scripts load from `href` or `xlink:href`.
            let attrs = script.value();
            let denied = ["src", "href"]
                .into_iter()
                .filter_map(|name| attrs.attr(name))
                .any(|url| self.is_denied(url));
            if denied {
                edits.remove(script.id());
            }
        }
    }
}

/// 3. Drop inline scripts that consist of a single `document.write(...)`.
///
/// This is how the upstream pulls in its obfuscated loader without a static
/// `src`, so it is matched by shape rather than by domain.
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineDocumentWrite;

impl RewriteRule for InlineDocumentWrite {
    fn name(&self) -> &'static str {
        "inline_document_write"
    }

    fn rewrite(&self, html: &Html, edits: &mut Edits) {
        for script in elements(html, "script") {
            if script.value().attr("src").is_some() {
                continue;
            }
            let source: String = script.text().collect();
            if is_lone_document_write(&source) {
                edits.remove(script.id());
            }
        }
    }
}

/// True when `source` is exactly one `document.write(...)` or
/// `document.writeln(...)` statement.
fn is_lone_document_write(source: &str) -> bool {
    let Some(args) = strip_write_call(source.trim()) else {
        return false;
    };
    match closing_paren(args) {
        Some(end) => matches!(args[end + 1..].trim(), "" | ";"),
        None => false,
    }
}

fn strip_write_call(source: &str) -> Option<&str> {
    let rest = source.strip_prefix("document")?.trim_start();
    let rest = rest.strip_prefix('.')?.trim_start();
    let rest = rest
        .strip_prefix("writeln")
        .or_else(|| rest.strip_prefix("write"))?
        .trim_start();
    rest.strip_prefix('(')
}

/// Byte offset of the `)` that closes an already-opened call, skipping
/// string literals and nested parentheses.
fn closing_paren(args: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (i, c) in args.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' | '`' => quote = Some(c),
            '(' => depth += 1,
            ')' if depth == 0 => return Some(i),
            ')' => depth -= 1,
            _ => {}
        }
    }
    None
}

/// 4. Drop known ad containers.
#[derive(Debug, Clone)]
pub struct AdContainers {
    ids: Vec<String>,
}

impl AdContainers {
    pub fn new<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ids: ids.into_iter().map(Into::into).collect(),
        }
    }
}

impl Default for AdContainers {
    fn default() -> Self {
        Self::new(AD_CONTAINER_IDS.iter().copied())
    }
}

impl RewriteRule for AdContainers {
    fn name(&self) -> &'static str {
        "ad_containers"
    }

    fn rewrite(&self, html: &Html, edits: &mut Edits) {
        for div in elements(html, "div") {
            let Some(id) = div.value().id() else {
                continue;
            };
            if self.ids.iter().any(|known| known.eq_ignore_ascii_case(id)) {
                edits.remove(div.id());
            }
        }
    }
}

/// 5. Strip `target="_blank"` from every element.
#[derive(Debug, Clone, Copy, Default)]
pub struct TargetBlank;

impl RewriteRule for TargetBlank {
    fn name(&self) -> &'static str {
        "target_blank"
    }

    fn rewrite(&self, html: &Html, edits: &mut Edits) {
        for el in all_elements(html) {
            let opens_new_context = el
                .value()
                .attr("target")
                .is_some_and(|target| target.trim().eq_ignore_ascii_case("_blank"));
            if opens_new_context {
                edits.remove_attr(el.id(), "target");
            }
        }
    }
}

/// 6. Sandbox the upstream's player frame. Other frames are left alone.
///
/// Ids are compared ASCII case-insensitively, like the ad container ids.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlayerSandbox;

impl RewriteRule for PlayerSandbox {
    fn name(&self) -> &'static str {
        "player_sandbox"
    }

    fn rewrite(&self, html: &Html, edits: &mut Edits) {
        let Some(frame) = elements(html, "iframe").find(|el| {
            el.value()
                .id()
                .is_some_and(|id| id.eq_ignore_ascii_case(PLAYER_FRAME_ID))
        }) else {
            return;
        };

        let attrs = frame.value();
        if attrs.attr("sandbox") == Some(PLAYER_SANDBOX)
            && attrs.attr("referrerpolicy") == Some(PLAYER_REFERRER_POLICY)
        {
            return;
        }
        edits.set_attr(frame.id(), "sandbox", PLAYER_SANDBOX);
        edits.set_attr(frame.id(), "referrerpolicy", PLAYER_REFERRER_POLICY);
    }
}

/// 7. Inject the guard script at the end of `<head>`.
///
/// Must stay last so no stripping rule can see the guard.
#[derive(Debug, Clone, Copy, Default)]
pub struct GuardScript;

impl RewriteRule for GuardScript {
    fn name(&self) -> &'static str {
        "guard_script"
    }

    fn rewrite(&self, html: &Html, edits: &mut Edits) {
        let present = elements(html, "script").any(|script| {
            script.value().attr(GUARD_MARKER).is_some()
                && script.text().collect::<String>() == GUARD_BODY
        });
        if present {
            return;
        }

        match elements(html, "head").next() {
            Some(head) => edits.append_html(head.id(), GUARD_SCRIPT),
            None => edits.prepend_html(html.tree.root().id(), GUARD_SCRIPT),
        }
    }
}
