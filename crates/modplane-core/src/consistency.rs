//! Dependency consistency across a set of module instances.
//!
//! Evaluates every declared dependency of every module against the other
//! modules in scope (and, at agent scope, the agent's own version) to produce
//! a [`ConsistencyReport`]. Evaluation is pure and never fails: an
//! unresolvable dependency is reported as unsatisfied.

use serde::{Deserialize, Serialize};

use crate::domain::{Agent, DependencyItem, DependencyType, ModuleInstance};
use crate::metrics::METRICS;
use crate::obs;
use crate::version::compare_versions;

/// Verdict for one dependency of one module.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DependencyVerdict {
    /// Module declaring the dependency.
    pub source_module_name: String,
    /// Owning policy, stamped at group and agent scope.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_id: Option<u64>,
    pub satisfied: bool,
    #[serde(flatten)]
    pub dependency: DependencyItem,
}

/// Aggregate consistency of a scope.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConsistencyReport {
    pub consistent: bool,
    pub dependencies: Vec<DependencyVerdict>,
}

impl ConsistencyReport {
    fn from_verdicts(dependencies: Vec<DependencyVerdict>) -> Self {
        let consistent = dependencies.iter().all(|v| v.satisfied);
        Self {
            consistent,
            dependencies,
        }
    }

    /// Verdicts that failed.
    pub fn unsatisfied(&self) -> impl Iterator<Item = &DependencyVerdict> {
        self.dependencies.iter().filter(|v| !v.satisfied)
    }
}

/// Check inter-module dependencies of the modules attached to one policy.
pub fn policy_consistency(modules: &[ModuleInstance]) -> ConsistencyReport {
    let report = ConsistencyReport::from_verdicts(module_verdicts(modules));
    record("policy", modules, &report);
    report
}

/// Check inter-module dependencies across every policy of a group.
///
/// Each verdict carries the policy of the first module whose name matches
/// the verdict's source module.
pub fn group_consistency(modules: &[ModuleInstance]) -> ConsistencyReport {
    let report = ConsistencyReport::from_verdicts(stamped_verdicts(modules));
    record("group", modules, &report);
    report
}

/// Group-scope check plus `agent_version` dependencies against `agent`.
pub fn agent_consistency(modules: &[ModuleInstance], agent: &Agent) -> ConsistencyReport {
    let mut verdicts = stamped_verdicts(modules);
    for module in modules {
        for dep in module.dependencies() {
            if dep.dep_type != DependencyType::AgentVersion {
                continue;
            }
            let satisfied = compare_versions(&agent.version, &dep.min_agent_version).is_satisfied();
            verdicts.push(DependencyVerdict {
                source_module_name: module.name().to_string(),
                policy_id: Some(module.policy_id),
                satisfied,
                dependency: dep.clone(),
            });
        }
    }
    let report = ConsistencyReport::from_verdicts(verdicts);
    record("agent", modules, &report);
    report
}

fn module_verdicts(modules: &[ModuleInstance]) -> Vec<DependencyVerdict> {
    let mut verdicts = Vec::new();
    for module in modules {
        for dep in module.dependencies() {
            if dep.dep_type == DependencyType::AgentVersion || dep.is_self_reference() {
                continue;
            }
            verdicts.push(DependencyVerdict {
                source_module_name: module.name().to_string(),
                policy_id: None,
                satisfied: is_module_dependency_satisfied(module, dep, modules),
                dependency: dep.clone(),
            });
        }
    }
    verdicts
}

fn stamped_verdicts(modules: &[ModuleInstance]) -> Vec<DependencyVerdict> {
    let mut verdicts = module_verdicts(modules);
    for verdict in &mut verdicts {
        verdict.policy_id = modules
            .iter()
            .find(|m| m.name() == verdict.source_module_name)
            .map(|m| m.policy_id);
    }
    verdicts
}

/// The first module named by the dependency decides the verdict.
fn is_module_dependency_satisfied(
    dependent: &ModuleInstance,
    dep: &DependencyItem,
    modules: &[ModuleInstance],
) -> bool {
    let Some(target) = modules.iter().find(|m| m.name() == dep.module_name) else {
        return false;
    };
    covers_platforms(dependent, target)
        && compare_versions(&target.info.version.to_string(), &dep.min_module_version).is_satisfied()
}

/// Every OS the dependent targets must be targeted by `target` with at least
/// the same architectures.
fn covers_platforms(dependent: &ModuleInstance, target: &ModuleInstance) -> bool {
    dependent.info.os.iter().all(|(os, archs)| {
        target
            .info
            .os
            .get(os)
            .is_some_and(|provided| archs.iter().all(|arch| provided.contains(arch)))
    })
}

fn record(scope: &str, modules: &[ModuleInstance], report: &ConsistencyReport) {
    METRICS.inc_consistency_evaluations();
    obs::emit_consistency_evaluated(scope, modules.len(), report.dependencies.len(), report.consistent);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ModuleDefinition, SemVersion, SELF_MODULE};

    fn module(name: &str, version: SemVersion, policy_id: u64) -> ModuleInstance {
        let mut def = ModuleDefinition::new(name, version);
        def.info
            .os
            .insert("linux".to_string(), vec!["amd64".to_string()]);
        let mut inst = def.to_instance();
        inst.policy_id = policy_id;
        inst
    }

    fn sender(min: &str) -> ModuleInstance {
        let mut a = module("a", SemVersion::new(1, 0, 0), 1);
        a.static_dependencies
            .push(DependencyItem::on_module(DependencyType::ToSendData, "b", min));
        a
    }

    #[test]
    fn test_no_dependencies_is_consistent() {
        let report = policy_consistency(&[module("a", SemVersion::new(1, 0, 0), 1)]);
        assert!(report.consistent);
        assert!(report.dependencies.is_empty());
    }

    #[test]
    fn test_missing_target_is_unsatisfied() {
        let report = policy_consistency(&[sender("")]);
        assert!(!report.consistent);
        assert_eq!(report.unsatisfied().count(), 1);
    }

    #[test]
    fn test_empty_min_version_only_needs_presence() {
        let modules = vec![sender(""), module("b", SemVersion::new(0, 0, 1), 1)];
        assert!(policy_consistency(&modules).consistent);
    }

    #[test]
    fn test_self_and_agent_dependencies_skipped_at_policy_scope() {
        let mut a = module("a", SemVersion::new(1, 0, 0), 1);
        a.static_dependencies
            .push(DependencyItem::on_module(DependencyType::ToMakeAction, SELF_MODULE, ""));
        a.static_dependencies.push(DependencyItem::on_agent("9.0.0"));
        let report = policy_consistency(&[a]);
        assert!(report.consistent);
        assert!(report.dependencies.is_empty());
    }

    #[test]
    fn test_target_missing_architecture_is_unsatisfied() {
        let mut a = sender("");
        a.info
            .os
            .insert("linux".to_string(), vec!["amd64".to_string(), "arm64".to_string()]);
        let b = module("b", SemVersion::new(1, 0, 0), 1);
        assert!(!policy_consistency(&[a, b]).consistent);
    }

    #[test]
    fn test_target_missing_os_is_unsatisfied() {
        let mut a = sender("");
        a.info
            .os
            .insert("windows".to_string(), vec!["386".to_string()]);
        let b = module("b", SemVersion::new(1, 0, 0), 1);
        assert!(!policy_consistency(&[a, b]).consistent);
    }

    #[test]
    fn test_target_with_wider_platforms_is_satisfied() {
        let a = sender("1.0");
        let mut b = module("b", SemVersion::new(1, 0, 0), 1);
        b.info
            .os
            .insert("windows".to_string(), vec!["amd64".to_string()]);
        b.info
            .os
            .insert("linux".to_string(), vec!["amd64".to_string(), "arm64".to_string()]);
        assert!(policy_consistency(&[a, b]).consistent);
    }

    #[test]
    fn test_group_scope_stamps_policy() {
        let modules = vec![sender(""), module("b", SemVersion::new(1, 0, 0), 7)];
        let mut a_other = sender("");
        a_other.policy_id = 2;
        let report = group_consistency(&[modules[0].clone(), a_other, modules[1].clone()]);
        assert!(report.consistent);
        assert_eq!(report.dependencies.len(), 2);
        assert!(report.dependencies.iter().all(|v| v.policy_id == Some(1)));
    }

    #[test]
    fn test_agent_version_dependency() {
        let mut a = module("a", SemVersion::new(1, 0, 0), 3);
        a.static_dependencies.push(DependencyItem::on_agent("1.4.0"));

        let old = Agent::new("h1", "1.3.9");
        let report = agent_consistency(std::slice::from_ref(&a), &old);
        assert!(!report.consistent);
        assert_eq!(report.dependencies[0].policy_id, Some(3));

        let new = Agent::new("h1", "v1.4.0-rc1");
        assert!(agent_consistency(&[a], &new).consistent);
    }

    #[test]
    fn test_agent_with_unparseable_version_fails_agent_dependency() {
        let mut a = module("a", SemVersion::new(1, 0, 0), 3);
        a.static_dependencies.push(DependencyItem::on_agent("1.0.0"));
        let agent = Agent::new("h1", "nightly");
        assert!(!agent_consistency(&[a], &agent).consistent);
    }
}
