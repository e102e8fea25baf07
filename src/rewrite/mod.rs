//! HTML sanitization pipeline.
//!
//! # Responsibilities
//! - Apply the fixed sequence of rewrite rules to an upstream document
//! - Leave non-matching documents byte-for-byte untouched
//!
//! # Design Decisions
//! - Each rule parses the output of the previous one, so later rules see
//!   exactly the markup earlier rules produced
//! - Rules record edits against an immutable tree; see [`document`]
//! - The pipeline is synchronous: `scraper::Html` is not `Send` and never
//!   lives across an await point
//!
//! # Data Flow
//! ```text
//! text ─▶ parse ─▶ rule.rewrite ─▶ edits? ─┬─ none ─▶ text (unchanged)
//!                                          └─ some ─▶ serialize ─▶ next rule
//! ```

pub mod document;
pub mod guard;
pub mod rules;

use scraper::Html;

use crate::observability::metrics;
pub use document::Edits;
pub use rules::{
    AdContainers, BaseHref, GuardScript, InlineDocumentWrite, PlayerSandbox, ScriptDenylist,
    TargetBlank,
};

/// A single document transformation.
pub trait RewriteRule: Send + Sync {
    /// Stable name used in logs and metrics.
    fn name(&self) -> &'static str;

    /// Inspect `document` and record the changes this rule wants.
    fn rewrite(&self, document: &Html, edits: &mut Edits);
}

/// Ordered list of rules applied to every HTML response.
pub struct RewritePipeline {
    rules: Vec<Box<dyn RewriteRule>>,
}

impl RewritePipeline {
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    /// The production rule set, in its required order.
    pub fn standard(upstream_origin: &str) -> Self {
        Self::new()
            .add(BaseHref::new(upstream_origin))
            .add(ScriptDenylist::default())
            .add(InlineDocumentWrite)
            .add(AdContainers::default())
            .add(TargetBlank)
            .add(PlayerSandbox)
            .add(GuardScript)
    }

    pub fn add<R: RewriteRule + 'static>(mut self, rule: R) -> Self {
        self.rules.push(Box::new(rule));
        self
    }

    /// Run every rule over `source`.
    pub fn rewrite(&self, source: &str) -> String {
        self.rules
            .iter()
            .fold(source.to_owned(), |text, rule| apply_rule(rule.as_ref(), text))
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|rule| rule.name()).collect()
    }
}

impl Default for RewritePipeline {
    fn default() -> Self {
        Self::new()
    }
}

fn apply_rule(rule: &dyn RewriteRule, text: String) -> String {
    let document = Html::parse_document(&text);
    let mut edits = Edits::default();
    rule.rewrite(&document, &mut edits);

    if edits.is_empty() {
        tracing::trace!(rule = rule.name(), "rule did not match");
        return text;
    }

    metrics::record_rule_applied(rule.name());
    tracing::debug!(rule = rule.name(), edits = edits.len(), "rule applied");
    document::serialize(&document, &edits)
}
