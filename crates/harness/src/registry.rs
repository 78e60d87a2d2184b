//! Test registry - groups of test cases with duplicate-id protection
//!
//! Registration is the only write path. No browser or network I/O
//! happens here; the registry only organizes declarative data for the
//! runner.

use std::path::Path;

use crate::error::{HarnessResult, RegistrationError};
use crate::spec::{TestCase, TestGroup};

/// Holds registered test groups for one run.
#[derive(Debug, Clone, Default)]
pub struct TestRegistry {
    groups: Vec<TestGroup>,
}

impl TestRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a test case under a group, creating the group on first
    /// use. A duplicate case id within the same group is rejected,
    /// never silently overwritten.
    pub fn register(&mut self, group_id: &str, case: TestCase) -> Result<(), RegistrationError> {
        let group = match self.groups.iter_mut().find(|g| g.id == group_id) {
            Some(group) => group,
            None => {
                self.groups.push(TestGroup { id: group_id.to_string(), cases: Vec::new() });
                self.groups.last_mut().expect("group just pushed")
            }
        };

        if group.cases.iter().any(|c| c.id == case.id) {
            return Err(RegistrationError::DuplicateIdentifier {
                group: group_id.to_string(),
                id: case.id,
            });
        }

        group.cases.push(case);
        Ok(())
    }

    /// Lazy, finite, restartable sequence of groups. Each call yields a
    /// fresh iterator over the same registration order.
    pub fn groups(&self) -> impl Iterator<Item = &TestGroup> + '_ {
        self.groups.iter()
    }

    pub fn group(&self, id: &str) -> Option<&TestGroup> {
        self.groups.iter().find(|g| g.id == id)
    }

    pub fn is_empty(&self) -> bool {
        self.case_count() == 0
    }

    /// Total number of registered cases across all groups
    pub fn case_count(&self) -> usize {
        self.groups.iter().map(|g| g.cases.len()).sum()
    }

    /// Build a registry from a directory of YAML spec files. Cases pass
    /// through [`register`](Self::register), so duplicate ids are caught
    /// even across files, and step patterns are validated up front.
    pub fn load_dir(dir: &Path) -> HarnessResult<Self> {
        let mut registry = Self::new();

        for group in TestGroup::load_all(dir)? {
            for case in group.cases {
                case.validate()?;
                registry.register(&group.id, case)?;
            }
        }

        Ok(registry)
    }

    /// Narrow the registry to an optional group id and optional case id.
    pub fn filtered(&self, group: Option<&str>, case: Option<&str>) -> Self {
        let groups = self
            .groups
            .iter()
            .filter(|g| group.map_or(true, |id| g.id == id))
            .map(|g| TestGroup {
                id: g.id.clone(),
                cases: g
                    .cases
                    .iter()
                    .filter(|c| case.map_or(true, |id| c.id == id))
                    .cloned()
                    .collect(),
            })
            .filter(|g| !g.cases.is_empty())
            .collect();

        Self { groups }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::Step;

    fn case(id: &str) -> TestCase {
        TestCase {
            id: id.to_string(),
            description: String::new(),
            tags: Vec::new(),
            steps: vec![Step::Navigate { url: "/".to_string() }],
        }
    }

    #[test]
    fn test_register_and_list() {
        let mut registry = TestRegistry::new();
        registry.register("smoke", case("a")).unwrap();
        registry.register("smoke", case("b")).unwrap();
        registry.register("api", case("a")).unwrap();

        assert_eq!(registry.case_count(), 3);
        let ids: Vec<&str> = registry.groups().map(|g| g.id.as_str()).collect();
        assert_eq!(ids, vec!["smoke", "api"]);
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let mut registry = TestRegistry::new();
        registry.register("smoke", case("a")).unwrap();

        let err = registry.register("smoke", case("a")).unwrap_err();
        match err {
            RegistrationError::DuplicateIdentifier { group, id } => {
                assert_eq!(group, "smoke");
                assert_eq!(id, "a");
            }
        }

        // The original registration is untouched
        assert_eq!(registry.group("smoke").unwrap().cases.len(), 1);
    }

    #[test]
    fn test_same_id_in_different_groups_is_fine() {
        let mut registry = TestRegistry::new();
        registry.register("smoke", case("a")).unwrap();
        registry.register("api", case("a")).unwrap();
        assert_eq!(registry.case_count(), 2);
    }

    #[test]
    fn test_groups_iterator_is_restartable() {
        let mut registry = TestRegistry::new();
        registry.register("smoke", case("a")).unwrap();

        let first: Vec<String> = registry.groups().map(|g| g.id.clone()).collect();
        let second: Vec<String> = registry.groups().map(|g| g.id.clone()).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_filtered() {
        let mut registry = TestRegistry::new();
        registry.register("smoke", case("a")).unwrap();
        registry.register("smoke", case("b")).unwrap();
        registry.register("api", case("c")).unwrap();

        let narrowed = registry.filtered(Some("smoke"), Some("b"));
        assert_eq!(narrowed.case_count(), 1);
        assert_eq!(narrowed.group("smoke").unwrap().cases[0].id, "b");
        assert!(narrowed.group("api").is_none());

        assert_eq!(registry.filtered(None, None).case_count(), 3);
    }

    #[test]
    fn test_load_dir_catches_duplicates_across_files() {
        let dir = tempfile::tempdir().unwrap();
        let spec = |name: &str| {
            format!(
                "group: shared\ncases:\n  - id: {}\n    steps:\n      - action: navigate\n        url: /\n",
                name
            )
        };
        std::fs::write(dir.path().join("one.yaml"), spec("dup")).unwrap();
        std::fs::write(dir.path().join("two.yaml"), spec("dup")).unwrap();

        let err = TestRegistry::load_dir(dir.path()).unwrap_err();
        assert!(err.to_string().contains("duplicate test case id 'dup'"));
    }

    #[test]
    fn test_load_dir() {
        let dir = tempfile::tempdir().unwrap();
        let yaml = r#"
group: api
cases:
  - id: missing-resource
    steps:
      - action: http_request
        method: GET
        url: /posts/99999
      - action: assert_status
        code: 404
"#;
        std::fs::write(dir.path().join("api.yaml"), yaml).unwrap();

        let registry = TestRegistry::load_dir(dir.path()).unwrap();
        assert_eq!(registry.case_count(), 1);
        assert!(registry.group("api").is_some());
    }
}
