use std::collections::HashMap;

use workflow_core::{Spec, SpecStatus};

use crate::parser::ParseFailure;

/// The full set of loaded specs, indexed for the lookups the Integrity
/// Validator, Constraint Engine, and Task Router all need, plus the
/// failures collected from files that did not parse. Loading never aborts
/// on a single bad file: it appears in [`SpecGraph::errors`] instead.
#[derive(Debug, Default)]
pub struct SpecGraph {
    by_id: HashMap<String, Spec>,
    by_status: HashMap<SpecStatus, Vec<String>>,
    by_tag: HashMap<String, Vec<String>>,
    /// Ids claimed by more than one file, each mapped to every path that
    /// claimed it. Recorded before the colliding specs are folded into
    /// `by_id`, so the collision survives even though only one of them ends
    /// up indexed by id.
    duplicate_ids: HashMap<String, Vec<String>>,
    /// Non-fatal warnings collected while parsing (e.g. a recovered id, an
    /// unparseable date), keyed by the file path they came from.
    pub warnings: Vec<(String, String)>,
    /// Files that failed to parse entirely.
    pub errors: Vec<ParseFailure>,
}

impl SpecGraph {
    /// Build a graph from a set of successfully parsed specs plus the
    /// parse failures encountered alongside them.
    pub fn build(specs: Vec<Spec>, warnings: Vec<(String, String)>, errors: Vec<ParseFailure>) -> Self {
        let mut paths_by_id: HashMap<&str, Vec<&str>> = HashMap::new();
        for spec in &specs {
            paths_by_id.entry(&spec.id).or_default().push(spec.file_path.as_deref().unwrap_or(""));
        }

        let mut graph = SpecGraph {
            by_id: HashMap::new(),
            by_status: HashMap::new(),
            by_tag: HashMap::new(),
            duplicate_ids: paths_by_id
                .into_iter()
                .filter(|(_, paths)| paths.len() > 1)
                .map(|(id, paths)| (id.to_string(), paths.into_iter().map(str::to_string).collect()))
                .collect(),
            warnings,
            errors,
        };
        for spec in specs {
            graph.insert(spec);
        }
        graph
    }

    /// Ids claimed by more than one file, each mapped to every claiming
    /// path. Empty when every spec's id is unique.
    pub fn duplicate_ids(&self) -> &HashMap<String, Vec<String>> {
        &self.duplicate_ids
    }

    fn insert(&mut self, spec: Spec) {
        self.by_status.entry(spec.status).or_default().push(spec.id.clone());
        for tag in &spec.tags {
            self.by_tag.entry(tag.clone()).or_default().push(spec.id.clone());
        }
        self.by_id.insert(spec.id.clone(), spec);
    }

    /// Replace (or add) a single spec, re-indexing it. Used after a reload
    /// of one changed file rather than the whole tree.
    pub fn upsert(&mut self, spec: Spec) {
        self.remove(&spec.id);
        self.insert(spec);
    }

    /// Remove a spec and its index entries by id.
    pub fn remove(&mut self, id: &str) {
        let Some(old) = self.by_id.remove(id) else { return };
        if let Some(ids) = self.by_status.get_mut(&old.status) {
            ids.retain(|existing| existing != id);
        }
        for tag in &old.tags {
            if let Some(ids) = self.by_tag.get_mut(tag) {
                ids.retain(|existing| existing != id);
            }
        }
    }

    /// Look up a spec by id.
    pub fn get(&self, id: &str) -> Option<&Spec> {
        self.by_id.get(id)
    }

    /// All specs, in no particular order.
    pub fn all(&self) -> impl Iterator<Item = &Spec> {
        self.by_id.values()
    }

    /// Number of specs currently indexed.
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    /// Whether the graph holds no specs.
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Specs with the given status.
    pub fn by_status(&self, status: SpecStatus) -> impl Iterator<Item = &Spec> {
        self.by_status
            .get(&status)
            .into_iter()
            .flatten()
            .filter_map(move |id| self.by_id.get(id))
    }

    /// Specs carrying the given tag.
    pub fn by_tag(&self, tag: &str) -> impl Iterator<Item = &Spec> {
        self.by_tag
            .get(tag)
            .into_iter()
            .flatten()
            .filter_map(move |id| self.by_id.get(id))
    }

    /// Resolve a task dependency id relative to `owning_spec_id`. Bare
    /// `TASK-###` ids resolve within the owning spec; `SPEC-ID/TASK-ID`
    /// resolves cross-spec.
    pub fn resolve_task(&self, owning_spec_id: &str, dep: &str) -> Option<(&Spec, &workflow_core::Task)> {
        if let Some((spec_id, task_id)) = dep.split_once('/') {
            let spec = self.by_id.get(spec_id)?;
            spec.task(task_id).map(|t| (spec, t))
        } else {
            let spec = self.by_id.get(owning_spec_id)?;
            spec.task(dep).map(|t| (spec, t))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_spec;

    fn spec(id: &str, status: &str, tags: &str) -> Spec {
        let doc = format!(
            "---\nid: {id}\ntype: feature\nstatus: {status}\ntitle: x\npriority: P2\ntags: [{tags}]\n---\nbody\n"
        );
        parse_spec(&doc, &format!("{id}.md")).expect("parses").spec
    }

    fn spec_at(id: &str, status: &str, path: &str) -> Spec {
        let doc = format!("---\nid: {id}\ntype: feature\nstatus: {status}\ntitle: x\npriority: P2\n---\nbody\n");
        parse_spec(&doc, path).expect("parses").spec
    }

    #[test]
    fn indexes_by_status_and_tag() {
        let graph = SpecGraph::build(
            vec![spec("FEAT-001", "backlog", "ui"), spec("FEAT-002", "active", "ui, backend")],
            Vec::new(),
            Vec::new(),
        );
        assert_eq!(graph.by_status(SpecStatus::Backlog).count(), 1);
        assert_eq!(graph.by_tag("ui").count(), 2);
        assert_eq!(graph.by_tag("backend").count(), 1);
    }

    #[test]
    fn colliding_ids_are_recorded_as_duplicates_not_silently_overwritten() {
        let graph = SpecGraph::build(
            vec![
                spec_at("FEAT-001", "backlog", "backlog/feat-001-a.md"),
                spec_at("FEAT-001", "backlog", "backlog/feat-001-b.md"),
            ],
            Vec::new(),
            Vec::new(),
        );
        // Only one physical entry can be indexed by id, but the collision
        // itself must still be visible.
        assert_eq!(graph.len(), 1);
        let paths = graph.duplicate_ids().get("FEAT-001").expect("duplicate recorded");
        assert_eq!(paths.len(), 2);
        assert!(paths.contains(&"backlog/feat-001-a.md".to_string()));
        assert!(paths.contains(&"backlog/feat-001-b.md".to_string()));
    }

    #[test]
    fn upsert_reindexes() {
        let mut graph = SpecGraph::build(vec![spec("FEAT-001", "backlog", "ui")], Vec::new(), Vec::new());
        graph.upsert(spec("FEAT-001", "active", "backend"));
        assert_eq!(graph.by_status(SpecStatus::Backlog).count(), 0);
        assert_eq!(graph.by_status(SpecStatus::Active).count(), 1);
        assert_eq!(graph.by_tag("ui").count(), 0);
        assert_eq!(graph.by_tag("backend").count(), 1);
    }

    #[test]
    fn resolves_cross_spec_task_dependency() {
        let mut dep_doc = spec("FEAT-002", "active", "");
        dep_doc.tasks.push(workflow_core::Task {
            id: "TASK-001".into(),
            title: "t".into(),
            status: workflow_core::TaskStatus::Ready,
            agent: None,
            effort: None,
            progress: 0,
            started: None,
            completed: None,
            estimated_completion: None,
            depends_on: Default::default(),
            subtasks: Vec::new(),
        });
        let graph = SpecGraph::build(vec![spec("FEAT-001", "backlog", ""), dep_doc], Vec::new(), Vec::new());
        let resolved = graph.resolve_task("FEAT-001", "FEAT-002/TASK-001");
        assert!(resolved.is_some());
    }
}
