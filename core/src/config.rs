//! Workflow configuration: flows, triggers, validation toggles, cleanup and
//! cascade policy. Loaded from YAML; falls back to the shipped
//! "v2" default status sets when no config file is found.

use crate::error::{OrchestratorError, Result};
use crate::role::Role;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// Hard ceiling on cascade recursion depth. Config's `auto_cascade.max_depth`
/// is clamped to this regardless of what the file says (open question #3).
pub const CASCADE_DEPTH_HARD_CAP: u32 = 3;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorkflowConfig {
    pub status_progression: StatusProgressionSection,
    #[serde(default)]
    pub status_validation: StatusValidationConfig,
    #[serde(default)]
    pub completion_cleanup: CompletionCleanupConfig,
    #[serde(default)]
    pub auto_cascade: AutoCascadeConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StatusProgressionSection {
    pub tasks: KindFlowConfig,
    pub features: KindFlowConfig,
    pub projects: KindFlowConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TagFlowMapping {
    pub tag: String,
    pub flow: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct KindFlowConfig {
    pub allowed_statuses: Vec<String>,
    pub default_flow: Vec<String>,
    pub terminal_statuses: Vec<String>,
    pub emergency_transitions: Vec<String>,
    /// Named alternative flows, keyed by flow name.
    #[serde(default)]
    pub flows: HashMap<String, Vec<String>>,
    /// Ordered tag -> flow-name routing; first match wins.
    #[serde(default)]
    pub tag_flow_mapping: Vec<TagFlowMapping>,
    /// status label -> role name.
    pub status_roles: HashMap<String, String>,
}

impl KindFlowConfig {
    /// The flow sequence an entity with the given tags should follow.
    pub fn active_flow_name(&self, tags: &[String]) -> Option<&str> {
        for mapping in &self.tag_flow_mapping {
            if tags.iter().any(|t| t == &mapping.tag) {
                return Some(mapping.flow.as_str());
            }
        }
        None
    }

    /// Resolve the ordered status sequence for the active flow.
    pub fn active_flow(&self, tags: &[String]) -> (&str, &[String]) {
        if let Some(name) = self.active_flow_name(tags) {
            if let Some(seq) = self.flows.get(name) {
                return (name, seq.as_slice());
            }
        }
        ("default", self.default_flow.as_slice())
    }

    pub fn role_of(&self, status: &str) -> Option<Role> {
        self.status_roles
            .get(status)
            .and_then(|r| Role::parse(r))
    }

    pub fn is_allowed(&self, status: &str) -> bool {
        self.allowed_statuses.iter().any(|s| s == status)
    }

    pub fn is_terminal(&self, status: &str) -> bool {
        self.terminal_statuses.iter().any(|s| s == status)
    }

    pub fn is_emergency(&self, status: &str) -> bool {
        self.emergency_transitions.iter().any(|s| s == status)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StatusValidationConfig {
    pub enforce_sequential: bool,
    pub allow_backward: bool,
    pub allow_emergency: bool,
    pub validate_prerequisites: bool,
}

impl Default for StatusValidationConfig {
    fn default() -> Self {
        Self {
            enforce_sequential: true,
            allow_backward: false,
            allow_emergency: true,
            validate_prerequisites: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CompletionCleanupConfig {
    pub enabled: bool,
    pub retain_tags: HashSet<String>,
}

impl Default for CompletionCleanupConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            retain_tags: ["bug", "bugfix", "fix", "hotfix", "critical"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AutoCascadeConfig {
    pub enabled: bool,
    pub max_depth: u32,
}

impl Default for AutoCascadeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_depth: CASCADE_DEPTH_HARD_CAP,
        }
    }
}

impl AutoCascadeConfig {
    /// Effective depth: configured value clamped by the hard cap.
    pub fn effective_max_depth(&self) -> u32 {
        self.max_depth.min(CASCADE_DEPTH_HARD_CAP)
    }
}

impl WorkflowConfig {
    pub fn for_kind(&self, kind: crate::models::EntityKind) -> &KindFlowConfig {
        match kind {
            crate::models::EntityKind::Task => &self.status_progression.tasks,
            crate::models::EntityKind::Feature => &self.status_progression.features,
            crate::models::EntityKind::Project => &self.status_progression.projects,
        }
    }

    /// Validate internal consistency: every role name must be one of the
    /// five valid roles, and every `default_flow` entry must be present in
    /// `allowed_statuses`.
    pub fn validate(&self) -> Result<()> {
        for (kind_name, cfg) in [
            ("tasks", &self.status_progression.tasks),
            ("features", &self.status_progression.features),
            ("projects", &self.status_progression.projects),
        ] {
            for status in &cfg.default_flow {
                if !cfg.is_allowed(status) {
                    return Err(OrchestratorError::Configuration(format!(
                        "{kind_name}: default_flow entry '{status}' is not in allowed_statuses"
                    )));
                }
            }
            for (status, role) in &cfg.status_roles {
                if Role::parse(role).is_none() {
                    return Err(OrchestratorError::Configuration(format!(
                        "{kind_name}: status '{status}' maps to unknown role '{role}'"
                    )));
                }
            }
            for flow in cfg.flows.values() {
                for status in flow {
                    if !cfg.is_allowed(status) {
                        return Err(OrchestratorError::Configuration(format!(
                            "{kind_name}: alternative flow references unknown status '{status}'"
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    /// Parse from a YAML document.
    pub fn from_yaml(contents: &str) -> Result<Self> {
        let cfg: WorkflowConfig = serde_yaml::from_str(contents)
            .map_err(|e| OrchestratorError::Configuration(format!("invalid config.yaml: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Discover `.taskorchestrator/config.yaml` by walking up from `start`
    /// (or the directory named by `TASK_ORCHESTRATOR_CONFIG_DIR`, when set).
    /// Falls back to [`WorkflowConfig::default`] when no file is found.
    pub fn load(start: &Path) -> Result<Self> {
        let start = if let Ok(dir) = std::env::var("TASK_ORCHESTRATOR_CONFIG_DIR") {
            PathBuf::from(dir)
        } else {
            start.to_path_buf()
        };

        let mut dir = Some(start.as_path());
        while let Some(d) = dir {
            let candidate = d.join(".taskorchestrator").join("config.yaml");
            if candidate.is_file() {
                let contents = std::fs::read_to_string(&candidate).map_err(|e| {
                    OrchestratorError::Configuration(format!(
                        "failed to read {}: {e}",
                        candidate.display()
                    ))
                })?;
                return Self::from_yaml(&contents);
            }
            dir = d.parent();
        }

        Ok(Self::default())
    }
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            status_progression: StatusProgressionSection {
                tasks: default_task_flow(),
                features: default_feature_flow(),
                projects: default_project_flow(),
            },
            status_validation: StatusValidationConfig::default(),
            completion_cleanup: CompletionCleanupConfig::default(),
            auto_cascade: AutoCascadeConfig::default(),
        }
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn roles(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn default_task_flow() -> KindFlowConfig {
    let mut flows = HashMap::new();
    flows.insert(
        "bug".to_string(),
        strings(&["pending", "in-progress", "testing", "completed"]),
    );

    KindFlowConfig {
        allowed_statuses: strings(&[
            "backlog",
            "pending",
            "in-progress",
            "in-review",
            "changes-requested",
            "testing",
            "ready-for-qa",
            "investigating",
            "blocked",
            "on-hold",
            "deployed",
            "completed",
            "cancelled",
            "deferred",
        ]),
        default_flow: strings(&["pending", "in-progress", "testing", "completed"]),
        terminal_statuses: strings(&["completed", "cancelled"]),
        emergency_transitions: strings(&["blocked", "on-hold", "cancelled"]),
        flows,
        tag_flow_mapping: vec![
            TagFlowMapping {
                tag: "bug".into(),
                flow: "bug".into(),
            },
            TagFlowMapping {
                tag: "bugfix".into(),
                flow: "bug".into(),
            },
            TagFlowMapping {
                tag: "hotfix".into(),
                flow: "bug".into(),
            },
        ],
        status_roles: roles(&[
            ("backlog", "queue"),
            ("pending", "queue"),
            ("deferred", "queue"),
            ("in-progress", "work"),
            ("investigating", "work"),
            ("changes-requested", "work"),
            ("testing", "work"),
            ("ready-for-qa", "review"),
            ("in-review", "review"),
            ("blocked", "blocked"),
            ("on-hold", "blocked"),
            ("completed", "terminal"),
            ("cancelled", "terminal"),
            ("deployed", "terminal"),
        ]),
    }
}

fn default_feature_flow() -> KindFlowConfig {
    KindFlowConfig {
        allowed_statuses: strings(&[
            "draft",
            "planning",
            "in-development",
            "testing",
            "validating",
            "pending-review",
            "blocked",
            "on-hold",
            "completed",
            "archived",
            "deployed",
        ]),
        default_flow: strings(&[
            "draft",
            "planning",
            "in-development",
            "testing",
            "validating",
            "completed",
        ]),
        terminal_statuses: strings(&["completed", "archived"]),
        emergency_transitions: strings(&["blocked", "on-hold"]),
        flows: HashMap::new(),
        tag_flow_mapping: Vec::new(),
        status_roles: roles(&[
            ("draft", "queue"),
            ("planning", "queue"),
            ("in-development", "work"),
            ("testing", "work"),
            ("validating", "review"),
            ("pending-review", "review"),
            ("blocked", "blocked"),
            ("on-hold", "blocked"),
            ("completed", "terminal"),
            ("archived", "terminal"),
            ("deployed", "terminal"),
        ]),
    }
}

fn default_project_flow() -> KindFlowConfig {
    KindFlowConfig {
        allowed_statuses: strings(&[
            "planning",
            "in-development",
            "on-hold",
            "cancelled",
            "completed",
            "archived",
        ]),
        default_flow: strings(&["planning", "in-development", "completed", "archived"]),
        terminal_statuses: strings(&["completed", "archived", "cancelled"]),
        emergency_transitions: strings(&["on-hold", "cancelled"]),
        flows: HashMap::new(),
        tag_flow_mapping: Vec::new(),
        status_roles: roles(&[
            ("planning", "queue"),
            ("in-development", "work"),
            ("on-hold", "blocked"),
            ("completed", "terminal"),
            ("archived", "terminal"),
            ("cancelled", "terminal"),
        ]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(WorkflowConfig::default().validate().is_ok());
    }

    #[test]
    fn active_flow_prefers_tag_mapping_in_insertion_order() {
        let cfg = default_task_flow();
        let (name, seq) = cfg.active_flow(&["bug".to_string()]);
        assert_eq!(name, "bug");
        assert_eq!(seq, cfg.default_flow.as_slice());
    }

    #[test]
    fn active_flow_falls_back_to_default_with_no_matching_tag() {
        let cfg = default_task_flow();
        let (name, seq) = cfg.active_flow(&["unrelated".to_string()]);
        assert_eq!(name, "default");
        assert_eq!(seq, cfg.default_flow.as_slice());
    }

    #[test]
    fn rejects_default_flow_entry_not_in_allowed_statuses() {
        let mut cfg = WorkflowConfig::default();
        cfg.status_progression.tasks.default_flow.push("made-up".into());
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_unknown_role_name() {
        let mut cfg = WorkflowConfig::default();
        cfg.status_progression
            .tasks
            .status_roles
            .insert("pending".into(), "not-a-role".into());
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn load_falls_back_to_defaults_when_no_file_present() {
        let dir = tempfile::tempdir().unwrap();
        std::env::remove_var("TASK_ORCHESTRATOR_CONFIG_DIR");
        let cfg = WorkflowConfig::load(dir.path()).unwrap();
        assert_eq!(
            cfg.status_progression.tasks.default_flow,
            default_task_flow().default_flow
        );
    }

    #[test]
    fn cascade_depth_is_clamped_to_hard_cap() {
        let cfg = AutoCascadeConfig {
            enabled: true,
            max_depth: 50,
        };
        assert_eq!(cfg.effective_max_depth(), CASCADE_DEPTH_HARD_CAP);
    }

    #[test]
    fn deployed_is_allowed_but_not_in_default_task_flow() {
        // Open question #1: preserve as shipped.
        let cfg = default_task_flow();
        assert!(cfg.is_allowed("deployed"));
        assert!(!cfg.default_flow.iter().any(|s| s == "deployed"));
    }
}
