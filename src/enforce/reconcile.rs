//! Merging policy matchers into a selector's matcher list.

use crate::error::EnforceError;
use crate::matcher::Matcher;
use crate::policy::Policy;

impl Policy {
    /// Merges the required matchers into `targets` and returns the new list.
    ///
    /// For every existing matcher on a policy-controlled label:
    /// * strict mode rejects it unless it is identical to the required one,
    /// * an equality requirement replaces it,
    /// * any other requirement is added next to it.
    ///
    /// Every required matcher is then appended in policy order.
    pub fn enforce_matchers(&self, targets: &[Matcher]) -> Result<Vec<Matcher>, EnforceError> {
        let mut res = Vec::with_capacity(targets.len() + self.len());

        for target in targets {
            if let Some(required) = self.get(target.name()) {
                let (existing, wanted) = (target.canonical(), required.canonical());
                if self.is_strict() && existing != wanted {
                    tracing::warn!(
                        policy_id = %self.id(),
                        existing = %existing,
                        required = %wanted,
                        "label matcher conflicts with policy"
                    );
                    return Err(EnforceError::Conflict {
                        existing,
                        required: wanted,
                    });
                }

                if Self::is_exclusive(required) {
                    continue;
                }
            }

            res.push(target.clone());
        }

        res.extend(self.matchers().cloned());
        Ok(res)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::MatchOp;

    fn eq(name: &str, value: &str) -> Matcher {
        Matcher::equal(name, value).unwrap()
    }

    fn canon(ms: &[Matcher]) -> Vec<String> {
        ms.iter().map(Matcher::canonical).collect()
    }

    #[test]
    fn test_appends_missing_label() {
        let policy = Policy::new(false, [eq("tenant", "acme")]);
        let out = policy.enforce_matchers(&[eq("job", "api")]).unwrap();
        assert_eq!(canon(&out), vec![r#"job="api""#, r#"tenant="acme""#]);
    }

    #[test]
    fn test_equality_replaces_existing() {
        let policy = Policy::new(false, [eq("tenant", "acme")]);
        let existing = [
            eq("tenant", "other"),
            Matcher::regex_match("tenant", "o.*").unwrap(),
            eq("job", "api"),
        ];
        let out = policy.enforce_matchers(&existing).unwrap();
        assert_eq!(canon(&out), vec![r#"job="api""#, r#"tenant="acme""#]);
    }

    #[test]
    fn test_non_equality_is_additive() {
        let required = Matcher::regex_match("tenant", "acme|umbrella").unwrap();
        let policy = Policy::new(false, [required.clone()]);
        let out = policy.enforce_matchers(&[eq("tenant", "acme")]).unwrap();
        assert_eq!(out, vec![eq("tenant", "acme"), required]);
    }

    #[test]
    fn test_identical_non_equality_still_appended() {
        let required = Matcher::not_equal("env", "dev").unwrap();
        let policy = Policy::new(false, [required.clone()]);
        let out = policy.enforce_matchers(&[required.clone()]).unwrap();
        assert_eq!(out, vec![required.clone(), required]);
    }

    #[test]
    fn test_strict_conflict() {
        let policy = Policy::new(true, [eq("tenant", "acme")]);
        let err = policy.enforce_matchers(&[eq("tenant", "other")]).unwrap_err();
        assert_eq!(
            err,
            EnforceError::Conflict {
                existing: r#"tenant="other""#.to_string(),
                required: r#"tenant="acme""#.to_string(),
            }
        );
    }

    #[test]
    fn test_strict_conflict_on_op_mismatch() {
        let policy = Policy::new(true, [eq("tenant", "acme")]);
        let existing = [Matcher::new(MatchOp::RegexMatch, "tenant", "acme").unwrap()];
        assert!(policy.enforce_matchers(&existing).is_err());
    }

    #[test]
    fn test_strict_accepts_identical() {
        let policy = Policy::new(true, [eq("tenant", "acme")]);
        let out = policy
            .enforce_matchers(&[eq("tenant", "acme"), eq("job", "api")])
            .unwrap();
        assert_eq!(canon(&out), vec![r#"job="api""#, r#"tenant="acme""#]);
    }

    #[test]
    fn test_strict_ignores_unrelated_labels() {
        let policy = Policy::new(true, [eq("tenant", "acme")]);
        let out = policy.enforce_matchers(&[eq("job", "api")]).unwrap();
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn test_empty_input_gets_policy() {
        let policy = Policy::new(
            false,
            [eq("tenant", "acme"), Matcher::not_equal("env", "dev").unwrap()],
        );
        let out = policy.enforce_matchers(&[]).unwrap();
        assert_eq!(canon(&out), vec![r#"env!="dev""#, r#"tenant="acme""#]);
    }

    #[test]
    fn test_empty_policy_is_identity() {
        let policy = Policy::new(true, Vec::new());
        let input = [eq("job", "api"), eq("tenant", "x")];
        assert_eq!(policy.enforce_matchers(&input).unwrap(), input.to_vec());
    }
}
