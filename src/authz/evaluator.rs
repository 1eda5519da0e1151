use async_trait::async_trait;

use super::principal::Principal;
use super::resource::ResourceAttributes;
use super::rules::{self, Rule, Verdict};
use super::Operation;

/// Policy evaluator trait for pluggable authorization logic
#[async_trait]
pub trait PolicyEvaluator: Send + Sync {
    /// Decide whether the principal may perform `operation` on the resource.
    /// `None` stands for an unauthenticated caller.
    async fn evaluate(
        &self,
        principal: Option<&Principal>,
        resource: &ResourceAttributes,
        operation: Operation,
    ) -> Verdict;

    /// Same as [`PolicyEvaluator::evaluate`] for operation names that arrive
    /// as text. Unknown names deny.
    async fn evaluate_named(
        &self,
        principal: Option<&Principal>,
        resource: &ResourceAttributes,
        operation: &str,
    ) -> Verdict {
        match operation.parse::<Operation>() {
            Ok(operation) => self.evaluate(principal, resource, operation).await,
            Err(_) => Verdict::deny(Rule::UnknownOperation),
        }
    }
}

/// Default evaluator backed by the static decision table in [`rules`].
#[derive(Debug, Clone, Default)]
pub struct RuleTablePolicy;

impl RuleTablePolicy {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PolicyEvaluator for RuleTablePolicy {
    async fn evaluate(
        &self,
        principal: Option<&Principal>,
        resource: &ResourceAttributes,
        operation: Operation,
    ) -> Verdict {
        let verdict = rules::evaluate(principal, resource, operation);

        tracing::debug!(
            user_id = ?principal.map(|p| p.user_id),
            resource_kind = %resource.kind,
            resource_id = ?resource.id,
            operation = %operation,
            decision = ?verdict.decision,
            rule = verdict.rule.as_str(),
            "policy evaluated"
        );

        verdict
    }
}
