//! Authentication policies.
//!
//! A policy declares which interaction methods are available for a
//! transaction and a predicate tree (`success_conditions`) over the
//! per-method success and failure counters that decides when the
//! transaction may be authorized.
//!
//! Condition leaves address counters with a JSONPath-like selector, e.g.
//! `$.password-authentication.success_count`, and compare them with an
//! integer operation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::oauth::transaction::InteractionResult;

// =============================================================================
// Condition leaves
// =============================================================================

/// Comparison operations for condition leaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOperation {
    /// Greater than or equal.
    Gte,
    /// Strictly greater than.
    Gt,
    /// Equal.
    Eq,
    /// Less than or equal.
    Lte,
    /// Strictly less than.
    Lt,
}

impl ConditionOperation {
    fn apply(self, left: i64, right: i64) -> bool {
        match self {
            Self::Gte => left >= right,
            Self::Gt => left > right,
            Self::Eq => left == right,
            Self::Lte => left <= right,
            Self::Lt => left < right,
        }
    }
}

/// A single predicate over an interaction counter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionLeaf {
    /// Counter selector, `$.{method}.{field}` where field is
    /// `success_count` or `failure_count`.
    pub path: String,

    /// Value type of the addressed counter. Only `integer` is defined.
    #[serde(rename = "type")]
    pub value_type: String,

    /// Comparison operation.
    pub operation: ConditionOperation,

    /// Right-hand comparison value.
    pub value: i64,
}

impl ConditionLeaf {
    /// Splits the selector into `(method, field)`.
    ///
    /// Returns `None` when the path does not follow the
    /// `$.{method}.{field}` shape.
    #[must_use]
    pub fn selector(&self) -> Option<(&str, &str)> {
        let rest = self.path.strip_prefix("$.")?;
        let (method, field) = rest.rsplit_once('.')?;
        if method.is_empty() || field.is_empty() {
            return None;
        }
        Some((method, field))
    }

    /// Evaluates this leaf against the accumulated interaction results.
    ///
    /// Counters for methods that never ran read as zero. A malformed path
    /// evaluates to `false` so a broken policy can never authorize.
    #[must_use]
    pub fn evaluate(&self, results: &BTreeMap<String, InteractionResult>) -> bool {
        let Some((method, field)) = self.selector() else {
            return false;
        };
        let counter = match field {
            "success_count" => results.get(method).map_or(0, |r| i64::from(r.success_count)),
            "failure_count" => results.get(method).map_or(0, |r| i64::from(r.failure_count)),
            _ => return false,
        };
        self.operation.apply(counter, self.value)
    }
}

/// Disjunctive-normal-form predicate tree: outer list OR, inner lists AND.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SuccessConditions {
    /// Satisfied when every leaf of at least one inner list holds.
    #[serde(default)]
    pub any_of: Vec<Vec<ConditionLeaf>>,
}

impl SuccessConditions {
    /// Evaluates the tree against accumulated interaction results.
    ///
    /// An empty `any_of` is never satisfied.
    #[must_use]
    pub fn evaluate(&self, results: &BTreeMap<String, InteractionResult>) -> bool {
        self.any_of
            .iter()
            .any(|conjunction| {
                !conjunction.is_empty() && conjunction.iter().all(|leaf| leaf.evaluate(results))
            })
    }

    /// Returns the methods a session must have performed, i.e. those named
    /// by a `success_count >= 1` (or stricter) leaf in any conjunction.
    ///
    /// Used when deciding whether an existing sign-on session satisfies the
    /// policy via its AMR values.
    #[must_use]
    pub fn required_methods(&self) -> Vec<Vec<String>> {
        self.any_of
            .iter()
            .map(|conjunction| {
                conjunction
                    .iter()
                    .filter(|leaf| {
                        matches!(
                            leaf.selector(),
                            Some((_, "success_count"))
                        ) && requires_at_least_one(leaf)
                    })
                    .filter_map(|leaf| leaf.selector().map(|(m, _)| m.to_string()))
                    .collect()
            })
            .collect()
    }
}

fn requires_at_least_one(leaf: &ConditionLeaf) -> bool {
    match leaf.operation {
        ConditionOperation::Gte => leaf.value >= 1,
        ConditionOperation::Gt => leaf.value >= 0,
        ConditionOperation::Eq => leaf.value >= 1,
        ConditionOperation::Lte | ConditionOperation::Lt => false,
    }
}

// =============================================================================
// Policies
// =============================================================================

/// Conditions selecting which policy applies to a transaction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PolicyConditions {
    /// The policy applies when any of these scopes is requested.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scopes: Vec<String>,

    /// The policy applies when any of these ACR values is requested.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub acr_values: Vec<String>,
}

impl PolicyConditions {
    /// Returns `true` when the conditions match the request. Empty
    /// conditions match everything.
    #[must_use]
    pub fn matches(&self, requested_scopes: &[String], requested_acr_values: &[String]) -> bool {
        let scope_match = self.scopes.is_empty()
            || self.scopes.iter().any(|s| requested_scopes.contains(s));
        let acr_match = self.acr_values.is_empty()
            || self
                .acr_values
                .iter()
                .any(|a| requested_acr_values.contains(a));
        scope_match && acr_match
    }
}

/// An authentication policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthenticationPolicy {
    /// Human-readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Selection priority; higher wins when several policies match.
    #[serde(default)]
    pub priority: i32,

    /// Conditions under which this policy applies.
    #[serde(default)]
    pub conditions: PolicyConditions,

    /// Interaction methods available under this policy.
    #[serde(default)]
    pub available_methods: Vec<String>,

    /// Predicate tree deciding when the transaction may be authorized.
    pub success_conditions: SuccessConditions,
}

impl AuthenticationPolicy {
    /// Returns `true` if the given interaction method may run under this
    /// policy. An empty `available_methods` list allows every method.
    #[must_use]
    pub fn is_method_available(&self, method: &str) -> bool {
        self.available_methods.is_empty() || self.available_methods.iter().any(|m| m == method)
    }

    /// Returns `true` when a session's AMR values satisfy this policy, i.e.
    /// the session performed every method of at least one conjunction.
    #[must_use]
    pub fn satisfied_by_amr(&self, amr: &[String]) -> bool {
        self.success_conditions
            .required_methods()
            .iter()
            .any(|conjunction| {
                !conjunction.is_empty()
                    && conjunction
                        .iter()
                        .all(|method| amr.iter().any(|a| a == method || amr_alias(method) == *a))
            })
    }

    /// The default policy applied when neither the client nor the tenant
    /// configures one: password authentication succeeds at least once.
    #[must_use]
    pub fn default_password() -> Self {
        Self {
            description: Some("default password policy".to_string()),
            priority: 0,
            conditions: PolicyConditions::default(),
            available_methods: vec!["password-authentication".to_string()],
            success_conditions: SuccessConditions {
                any_of: vec![vec![ConditionLeaf {
                    path: "$.password-authentication.success_count".to_string(),
                    value_type: "integer".to_string(),
                    operation: ConditionOperation::Gte,
                    value: 1,
                }]],
            },
        }
    }
}

/// Maps an interaction method name to its AMR value.
///
/// AMR values follow RFC 8176 where one exists; otherwise the method name
/// itself is recorded.
#[must_use]
pub fn amr_alias(method: &str) -> String {
    match method {
        "password-authentication" => "pwd".to_string(),
        "email-authentication" => "otp".to_string(),
        "sms-authentication" => "sms".to_string(),
        "fido-uaf-authentication" | "fido2-authentication" | "webauthn-authentication" => {
            "hwk".to_string()
        }
        "authentication-device" => "user_approval".to_string(),
        other => other.to_string(),
    }
}

/// Derives the ACR achieved by the performed interaction methods.
///
/// The tenant orders its ACR values weakest to strongest; each distinct
/// authentication factor climbs one level up that ladder. Registration
/// steps do not count as factors. The requested `acr_values` play no part
/// here: a session's level is earned by what the user actually performed.
#[must_use]
pub fn achieved_acr(methods: &[String], acr_order: &[String], default_acr: &str) -> String {
    let factors = methods
        .iter()
        .filter(|m| !matches!(m.as_str(), "initial-registration" | "fido-uaf-registration"))
        .count();
    if factors == 0 || acr_order.is_empty() {
        return default_acr.to_string();
    }
    acr_order[factors.min(acr_order.len()) - 1].clone()
}

/// A prioritized set of authentication policies.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthenticationPolicySet {
    /// Whether policy evaluation is enabled at all.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Candidate policies.
    #[serde(default)]
    pub policies: Vec<AuthenticationPolicy>,
}

fn default_enabled() -> bool {
    true
}

impl AuthenticationPolicySet {
    /// Selects the applicable policy for a transaction.
    ///
    /// The highest-priority policy whose conditions match wins; falls back
    /// to the default password policy when nothing matches or the set is
    /// disabled.
    #[must_use]
    pub fn select(
        &self,
        requested_scopes: &[String],
        requested_acr_values: &[String],
    ) -> AuthenticationPolicy {
        if !self.enabled {
            return AuthenticationPolicy::default_password();
        }
        self.policies
            .iter()
            .filter(|p| p.conditions.matches(requested_scopes, requested_acr_values))
            .max_by_key(|p| p.priority)
            .cloned()
            .unwrap_or_else(AuthenticationPolicy::default_password)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn results(entries: &[(&str, u32, u32)]) -> BTreeMap<String, InteractionResult> {
        entries
            .iter()
            .map(|(method, ok, fail)| {
                (
                    (*method).to_string(),
                    InteractionResult {
                        success_count: *ok,
                        failure_count: *fail,
                        last_error: None,
                    },
                )
            })
            .collect()
    }

    fn leaf(path: &str, op: ConditionOperation, value: i64) -> ConditionLeaf {
        ConditionLeaf {
            path: path.to_string(),
            value_type: "integer".to_string(),
            operation: op,
            value,
        }
    }

    #[test]
    fn test_leaf_evaluation() {
        let r = results(&[("password-authentication", 1, 0)]);
        assert!(
            leaf(
                "$.password-authentication.success_count",
                ConditionOperation::Gte,
                1
            )
            .evaluate(&r)
        );
        assert!(
            !leaf(
                "$.sms-authentication.success_count",
                ConditionOperation::Gte,
                1
            )
            .evaluate(&r)
        );
    }

    #[test]
    fn test_failure_does_not_satisfy() {
        let r = results(&[("password-authentication", 0, 3)]);
        assert!(
            !leaf(
                "$.password-authentication.success_count",
                ConditionOperation::Gte,
                1
            )
            .evaluate(&r)
        );
    }

    #[test]
    fn test_malformed_path_never_satisfies() {
        let r = results(&[("password-authentication", 5, 0)]);
        assert!(!leaf("password-authentication", ConditionOperation::Gte, 1).evaluate(&r));
        assert!(
            !leaf(
                "$.password-authentication.bogus_field",
                ConditionOperation::Gte,
                1
            )
            .evaluate(&r)
        );
    }

    #[test]
    fn test_any_of_disjunction() {
        let conditions = SuccessConditions {
            any_of: vec![
                vec![leaf(
                    "$.password-authentication.success_count",
                    ConditionOperation::Gte,
                    1,
                )],
                vec![
                    leaf(
                        "$.sms-authentication.success_count",
                        ConditionOperation::Gte,
                        1,
                    ),
                    leaf(
                        "$.email-authentication.success_count",
                        ConditionOperation::Gte,
                        1,
                    ),
                ],
            ],
        };
        assert!(conditions.evaluate(&results(&[("password-authentication", 1, 0)])));
        assert!(!conditions.evaluate(&results(&[("sms-authentication", 1, 0)])));
        assert!(conditions.evaluate(&results(&[
            ("sms-authentication", 1, 0),
            ("email-authentication", 1, 0)
        ])));
    }

    #[test]
    fn test_empty_conditions_never_satisfied() {
        let conditions = SuccessConditions::default();
        assert!(!conditions.evaluate(&results(&[("password-authentication", 9, 0)])));
    }

    #[test]
    fn test_policy_selection_by_priority() {
        let set = AuthenticationPolicySet {
            enabled: true,
            policies: vec![
                AuthenticationPolicy {
                    description: Some("base".to_string()),
                    priority: 1,
                    conditions: PolicyConditions::default(),
                    available_methods: vec![],
                    success_conditions: SuccessConditions::default(),
                },
                AuthenticationPolicy {
                    description: Some("mfa for payments".to_string()),
                    priority: 10,
                    conditions: PolicyConditions {
                        scopes: vec!["payments".to_string()],
                        acr_values: vec![],
                    },
                    available_methods: vec![],
                    success_conditions: SuccessConditions::default(),
                },
            ],
        };
        let selected = set.select(&["openid".to_string(), "payments".to_string()], &[]);
        assert_eq!(selected.description.as_deref(), Some("mfa for payments"));

        let selected = set.select(&["openid".to_string()], &[]);
        assert_eq!(selected.description.as_deref(), Some("base"));
    }

    #[test]
    fn test_disabled_set_falls_back_to_default() {
        let set = AuthenticationPolicySet {
            enabled: false,
            policies: vec![],
        };
        let selected = set.select(&[], &[]);
        assert!(selected.is_method_available("password-authentication"));
    }

    #[test]
    fn test_achieved_acr_climbs_with_factor_count() {
        let order = vec![
            "urn:veridian:loa:1".to_string(),
            "urn:veridian:loa:2".to_string(),
            "urn:veridian:loa:3".to_string(),
        ];
        let one = vec!["password-authentication".to_string()];
        let two = vec![
            "password-authentication".to_string(),
            "sms-authentication".to_string(),
        ];
        let four = vec![
            "password-authentication".to_string(),
            "sms-authentication".to_string(),
            "email-authentication".to_string(),
            "fido-uaf-authentication".to_string(),
        ];
        assert_eq!(achieved_acr(&one, &order, "urn:veridian:loa:1"), "urn:veridian:loa:1");
        assert_eq!(achieved_acr(&two, &order, "urn:veridian:loa:1"), "urn:veridian:loa:2");
        assert_eq!(achieved_acr(&four, &order, "urn:veridian:loa:1"), "urn:veridian:loa:3");
    }

    #[test]
    fn test_achieved_acr_ignores_registration_and_falls_back() {
        let order = vec!["urn:veridian:loa:1".to_string()];
        let registration_only = vec!["initial-registration".to_string()];
        assert_eq!(
            achieved_acr(&registration_only, &order, "urn:veridian:loa:0"),
            "urn:veridian:loa:0"
        );
        assert_eq!(achieved_acr(&[], &order, "urn:veridian:loa:0"), "urn:veridian:loa:0");
    }

    #[test]
    fn test_satisfied_by_amr() {
        let policy = AuthenticationPolicy::default_password();
        assert!(policy.satisfied_by_amr(&["password-authentication".to_string()]));
        assert!(policy.satisfied_by_amr(&["pwd".to_string()]));
        assert!(!policy.satisfied_by_amr(&["sms".to_string()]));
    }
}
