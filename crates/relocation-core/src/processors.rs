//! Built-in processors.

use std::collections::BTreeMap;

use crate::pipeline::{Processor, ProcessorError};
use crate::relocated::Relocated;
use crate::store::{content_hash, SectionStore, StoreKey, StoredSection};

/// How one section is turned into an external reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternifyRule {
    /// Snippet left in the page; `{url}` is replaced by the section URL.
    pub reference: String,
    pub mimetype: String,
}

impl ExternifyRule {
    pub fn new(reference: impl Into<String>, mimetype: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
            mimetype: mimetype.into(),
        }
    }
}

/// Rules for `javascript` and `css` sections.
pub fn default_rules() -> BTreeMap<String, ExternifyRule> {
    BTreeMap::from([
        (
            "javascript".to_string(),
            ExternifyRule::new(
                r#"<script type="text/javascript" src="{url}"></script>"#,
                "application/javascript",
            ),
        ),
        (
            "css".to_string(),
            ExternifyRule::new(
                r#"<link rel="stylesheet" type="text/css" href="{url}"/>"#,
                "text/css",
            ),
        ),
    ])
}

/// Default URL template; `{document}`, `{section}` and `{hash}` are
/// substituted.
pub const DEFAULT_URL_FORMAT: &str = "/relocation/{document}/{section}/{hash}";

/// Moves section content into a [`SectionStore`] and leaves a reference to
/// it in the page.
///
/// For each configured section that exists, the current content is stored
/// under its hash and under [`LATEST`](crate::store::LATEST), the section
/// is rewritten to the reference snippet (so every destination renders the
/// reference), and the section name is rebound to a copy of the original
/// content so later processors still see it.
pub struct Externify<S> {
    store: S,
    url_format: String,
    rules: BTreeMap<String, ExternifyRule>,
}

impl<S: SectionStore> Externify<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            url_format: DEFAULT_URL_FORMAT.to_string(),
            rules: default_rules(),
        }
    }

    pub fn with_url_format(mut self, url_format: impl Into<String>) -> Self {
        self.url_format = url_format.into();
        self
    }

    pub fn with_rules(mut self, rules: BTreeMap<String, ExternifyRule>) -> Self {
        self.rules = rules;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn url(&self, key: &StoreKey) -> String {
        self.url_format
            .replace("{document}", &key.document)
            .replace("{section}", &key.section)
            .replace("{hash}", &key.hash)
    }
}

impl<S: SectionStore> Processor for Externify<S> {
    fn name(&self) -> &str {
        "externify"
    }

    fn process(&self, document: &str, relocated: &mut Relocated<'_>) -> Result<(), ProcessorError> {
        for (section, rule) in &self.rules {
            let Some(id) = relocated.section_id(section) else {
                continue;
            };
            let content = relocated.segments().flatten(id);
            let key = StoreKey::new(document, section, &content_hash(&content));
            let stored = StoredSection {
                content,
                mimetype: rule.mimetype.clone(),
            };
            self.store.put(&key.latest(), stored.clone())?;
            self.store.put(&key, stored)?;

            let reference = rule.reference.replace("{url}", &self.url(&key));
            let segments = relocated.segments_mut();
            let original = segments.deep_copy(id);
            segments.segment_mut(id).replace(reference);
            relocated.rebind_section(section, original);
        }
        Ok(())
    }
}

/// Appends the content of section `from` to section `into` when both are
/// present.
///
/// `from` is copied as it stands when the processor runs, as one owned
/// chunk. Later rewrites of `from` do not reach `into`.
#[derive(Debug, Clone)]
pub struct Concat {
    from: String,
    into: String,
}

impl Concat {
    pub fn new(from: impl Into<String>, into: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            into: into.into(),
        }
    }
}

impl Processor for Concat {
    fn name(&self) -> &str {
        "concat"
    }

    fn process(&self, _document: &str, relocated: &mut Relocated<'_>) -> Result<(), ProcessorError> {
        if !relocated.contains_section(&self.into) {
            return Ok(());
        }
        let Some(from) = relocated.section(&self.from) else {
            return Ok(());
        };
        let text = from.flatten();
        relocated.ensure_section(&self.into).append_back(text);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::emit::{capture, inject_here};
    use crate::pipeline::Pipeline;
    use crate::store::{MemoryStore, LATEST};

    fn page() -> String {
        format!(
            "<head>{}</head><body>{}{}</body>",
            inject_here("css").unwrap(),
            capture("css", "p{}").unwrap(),
            capture("javascript", "go();").unwrap(),
        ) + &inject_here("javascript").unwrap()
    }

    #[test]
    fn externify_replaces_sections_with_references() {
        let store = Arc::new(MemoryStore::new());
        let pipeline = Pipeline::new().with(Externify::new(Arc::clone(&store)));
        let doc = page();
        let relocated = pipeline.run("home", &doc).unwrap();

        let css_hash = content_hash("p{}");
        let js_hash = content_hash("go();");
        assert_eq!(
            relocated.render(),
            format!(
                r#"<head><link rel="stylesheet" type="text/css" href="/relocation/home/css/{css_hash}"/></head><body></body><script type="text/javascript" src="/relocation/home/javascript/{js_hash}"></script>"#
            )
        );
        // The map now points at the original content.
        assert_eq!(relocated.section("css").unwrap().flatten(), "p{}");

        let stored = store
            .get(&StoreKey::new("home", "css", &css_hash))
            .unwrap()
            .unwrap();
        assert_eq!(stored.content, "p{}");
        assert_eq!(stored.mimetype, "text/css");
        let latest = store
            .get(&StoreKey::new("home", "javascript", LATEST))
            .unwrap()
            .unwrap();
        assert_eq!(latest.content, "go();");
        assert_eq!(store.len(), 4);
    }

    #[test]
    fn externify_skips_unconfigured_and_missing_sections() {
        let store = Arc::new(MemoryStore::new());
        let mut rules = BTreeMap::new();
        rules.insert("fonts".to_string(), ExternifyRule::new("<x {url}>", "font/woff2"));
        rules.insert("css".to_string(), ExternifyRule::new("[{url}]", "text/css"));
        let externify = Externify::new(Arc::clone(&store))
            .with_rules(rules)
            .with_url_format("/s/{section}");
        let pipeline = Pipeline::new().with(externify);

        let doc = page();
        let relocated = pipeline.run("home", &doc).unwrap();
        assert_eq!(relocated.render(), "<head>[/s/css]</head><body></body>go();");
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn concat_appends_when_both_exist() {
        let doc = format!(
            "{}{}{}",
            capture("coffee", "x = 1").unwrap(),
            capture("javascript", "y();").unwrap(),
            inject_here("javascript").unwrap()
        );
        let pipeline = Pipeline::new().with(Concat::new("coffee", "javascript"));
        assert_eq!(pipeline.relocate("p", &doc).unwrap(), "y();x = 1");
    }

    #[test]
    fn concat_copies_source_at_run_time() {
        let doc = format!(
            "{}{}{}",
            capture("coffee", "x = 1").unwrap(),
            capture("javascript", "y();").unwrap(),
            inject_here("javascript").unwrap()
        );
        let pipeline = Pipeline::new()
            .with(Concat::new("coffee", "javascript"))
            .with_fn("rewrite", |_, relocated| {
                relocated.replace_section("coffee", "x = 2");
                Ok(())
            });
        let relocated = pipeline.run("p", &doc).unwrap();
        assert_eq!(relocated.render(), "y();x = 1");
        assert_eq!(relocated.section("coffee").unwrap().flatten(), "x = 2");
    }

    #[test]
    fn concat_requires_target() {
        let doc = capture("coffee", "x = 1").unwrap();
        let pipeline = Pipeline::new().with(Concat::new("coffee", "javascript"));
        let relocated = pipeline.run("p", &doc).unwrap();
        assert!(!relocated.contains_section("javascript"));
    }
}
