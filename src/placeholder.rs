//! PlaceholderIdentityCache: run-scoped placeholder allocator and label map
//!
//! Shared by every resolver task in one compilation run. Hands out strictly
//! decreasing negative ids and keeps id → FSN/PT labels so generated axiom
//! text can be rewritten into something a name generator can read.

use regex::{Captures, Regex};
use rustc_hash::FxHashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{OnceLock, RwLock};

use crate::graph::Identifier;
use crate::model::constants::LABELLED;

/// First placeholder handed out in a run
pub const FIRST_PLACEHOLDER: i64 = -2;

fn id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(<http://snomed\.info/id/(-?\d+)>|: *'?(-?\d+)'?)")
            .expect("identifier pattern is valid")
    })
}

/// Thread-safe placeholder allocator and id → label lookup
pub struct PlaceholderIdentityCache {
    next_id: AtomicI64,
    fsn_labels: RwLock<FxHashMap<String, String>>,
    pt_labels: RwLock<FxHashMap<String, String>>,
}

impl PlaceholderIdentityCache {
    /// Seed with caller hints, then with every labelled constant not already present
    pub fn new<F, P>(fsn_hints: F, pt_hints: P) -> Self
    where
        F: IntoIterator<Item = (String, String)>,
        P: IntoIterator<Item = (String, String)>,
    {
        let mut fsn_labels: FxHashMap<String, String> = fsn_hints.into_iter().collect();
        let mut pt_labels: FxHashMap<String, String> = pt_hints.into_iter().collect();
        for (id, label) in LABELLED {
            if !fsn_labels.contains_key(*id) {
                fsn_labels.insert(id.to_string(), label.to_string());
                pt_labels.insert(id.to_string(), label.to_string());
            }
        }
        Self {
            next_id: AtomicI64::new(FIRST_PLACEHOLDER),
            fsn_labels: RwLock::new(fsn_labels),
            pt_labels: RwLock::new(pt_labels),
        }
    }

    /// Next unused placeholder value
    pub fn next_placeholder_id(&self) -> i64 {
        self.next_id.fetch_sub(1, Ordering::SeqCst)
    }

    pub fn next_identifier(&self) -> Identifier {
        Identifier::Placeholder(self.next_placeholder_id())
    }

    /// Record labels for an id, replacing any earlier ones
    pub fn register_label(&self, id: &Identifier, fsn: &str, pt: &str) {
        let key = id.to_string();
        self.fsn_labels
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.clone(), fsn.to_string());
        self.pt_labels
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key, pt.to_string());
    }

    pub fn label_for(&self, id: &Identifier) -> Option<String> {
        self.fsn_labels
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&id.to_string())
            .cloned()
    }

    pub fn preferred_term_for(&self, id: &Identifier) -> Option<String> {
        self.pt_labels
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&id.to_string())
            .cloned()
    }

    /// Replace known ids with their FSN; the subject's own id is blanked
    pub fn substitute_ids_in_axiom(&self, axiom: &str, subject: &Identifier) -> String {
        let labels = self.fsn_labels.read().unwrap_or_else(|e| e.into_inner());
        substitute(axiom, &subject.to_string(), &labels)
    }

    /// Replace known ids with their preferred term; the subject's own id is blanked
    pub fn substitute_pt_ids_in_axiom(&self, axiom: &str, subject: &Identifier) -> String {
        let labels = self.pt_labels.read().unwrap_or_else(|e| e.into_inner());
        substitute(axiom, &subject.to_string(), &labels)
    }
}

impl Default for PlaceholderIdentityCache {
    fn default() -> Self {
        Self::new(Vec::new(), Vec::new())
    }
}

fn substitute(axiom: &str, subject: &str, labels: &FxHashMap<String, String>) -> String {
    id_pattern()
        .replace_all(axiom, |caps: &Captures| {
            let id = caps
                .get(2)
                .or_else(|| caps.get(3))
                .map(|m| m.as_str())
                .unwrap_or_default();
            if id == subject {
                ":".to_string()
            } else if let Some(label) = labels.get(id) {
                format!(":'{}'", label)
            } else {
                caps[0].to_string()
            }
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn test_placeholders_decrease_from_minus_two() {
        let cache = PlaceholderIdentityCache::default();
        assert_eq!(cache.next_placeholder_id(), -2);
        assert_eq!(cache.next_placeholder_id(), -3);
        assert_eq!(cache.next_identifier(), Identifier::Placeholder(-4));
    }

    #[test]
    fn test_hints_win_over_constants() {
        let cache = PlaceholderIdentityCache::new(
            vec![("116680003".to_string(), "Is a".to_string())],
            Vec::new(),
        );
        assert_eq!(cache.label_for(&Identifier::real("116680003")).as_deref(), Some("Is a"));
        assert_eq!(
            cache.label_for(&Identifier::real("763158003")).as_deref(),
            Some("Medicinal product (product)")
        );
    }

    #[test]
    fn test_substitution_replaces_whole_tokens_only() {
        let cache = PlaceholderIdentityCache::default();
        cache.register_label(&Identifier::real("12345"), "Paracetamol (substance)", "Paracetamol");
        cache.register_label(&Identifier::Placeholder(-3), "Thing (clinical drug)", "Thing");

        let axiom = "EquivalentClasses(:-4 ObjectIntersectionOf(:123456 ObjectSomeValuesFrom(:127489000 :12345) :-3))";
        let out = cache.substitute_ids_in_axiom(axiom, &Identifier::Placeholder(-4));
        assert_eq!(
            out,
            "EquivalentClasses(: ObjectIntersectionOf(:123456 ObjectSomeValuesFrom(:'Has active ingredient (attribute)' :'Paracetamol (substance)') :'Thing (clinical drug)'))"
        );

        let pt = cache.substitute_pt_ids_in_axiom("<http://snomed.info/id/12345>", &Identifier::Placeholder(-4));
        assert_eq!(pt, ":'Paracetamol'");
    }

    #[tokio::test]
    async fn test_concurrent_placeholders_are_unique() {
        let cache = Arc::new(PlaceholderIdentityCache::default());
        let tasks = 16;
        let per_task = 250;
        let mut handles = Vec::new();
        for t in 0..tasks {
            let cache = cache.clone();
            handles.push(tokio::spawn(async move {
                let mut ids = Vec::with_capacity(per_task);
                for i in 0..per_task {
                    let id = cache.next_placeholder_id();
                    cache.register_label(&Identifier::Placeholder(id), &format!("{}-{}", t, i), "");
                    ids.push(id);
                    if i % 50 == 0 {
                        tokio::task::yield_now().await;
                    }
                }
                ids
            }));
        }
        let mut all = HashSet::new();
        for handle in handles {
            for id in handle.await.unwrap() {
                assert!(id < 0);
                all.insert(id);
            }
        }
        assert_eq!(all.len(), tasks * per_task);
    }
}
