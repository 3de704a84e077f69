//! Criteria matcher: an ordered decision list over active criteria.

use crate::models::{Client, EvaluationCriteria};

use super::{evaluate, ClientField, EvaluationResult, FieldWhitelist};

/// Outcome of one criteria against one client.
#[derive(Debug, Clone, PartialEq)]
pub struct CriteriaOutcome<'a> {
    pub criteria: &'a EvaluationCriteria,
    pub matched: bool,
}

/// Active criteria resolved against the whitelist, in evaluation order.
#[derive(Debug)]
pub struct CriteriaMatcher<'a> {
    rules: Vec<(&'a EvaluationCriteria, ClientField)>,
}

impl<'a> CriteriaMatcher<'a> {
    /// Prepare the decision list.
    ///
    /// Inactive criteria are dropped. Any active criteria whose field is outside
    /// the whitelist rejects the whole list before anything is evaluated.
    /// Remaining criteria are sorted by ascending priority; ties keep input order.
    pub fn new(criteria: &'a [EvaluationCriteria], whitelist: &FieldWhitelist) -> EvaluationResult<Self> {
        let mut rules = criteria
            .iter()
            .filter(|c| c.is_active)
            .map(|c| whitelist.resolve(&c.field).map(|field| (c, field)))
            .collect::<EvaluationResult<Vec<_>>>()?;

        // sort_by_key is stable
        rules.sort_by_key(|(c, _)| c.priority);

        Ok(Self { rules })
    }

    /// Number of active criteria.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    fn test(criteria: &EvaluationCriteria, field: ClientField, client: &Client) -> bool {
        evaluate(field.read(client), criteria.operator, &criteria.value)
    }

    /// Evaluate every active criteria, in order.
    pub fn evaluate_all(&self, client: &Client) -> Vec<CriteriaOutcome<'a>> {
        self.rules
            .iter()
            .map(|&(criteria, field)| CriteriaOutcome {
                criteria,
                matched: Self::test(criteria, field, client),
            })
            .collect()
    }

    /// Matching criteria only, in order.
    pub fn matches(&self, client: &Client) -> Vec<&'a EvaluationCriteria> {
        self.rules
            .iter()
            .filter(|&&(criteria, field)| Self::test(criteria, field, client))
            .map(|&(criteria, _)| criteria)
            .collect()
    }

    /// First applicable criteria wins.
    pub fn first_match(&self, client: &Client) -> Option<&'a EvaluationCriteria> {
        self.rules
            .iter()
            .find(|&&(criteria, field)| Self::test(criteria, field, client))
            .map(|&(criteria, _)| criteria)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluation::EvaluationError;
    use crate::models::{CriteriaAction, NewClient, NewCriteria, Operator};

    fn criteria(name: &str, field: &str, operator: Operator, value: &str, priority: i32) -> EvaluationCriteria {
        EvaluationCriteria::new(
            NewCriteria {
                name: name.into(),
                description: None,
                field: field.into(),
                operator,
                value: value.into(),
                action: CriteriaAction::Flag,
                priority,
                is_active: true,
            },
            None,
        )
    }

    fn client(age: &str, payment: &str) -> Client {
        Client::new(NewClient {
            first_name: "Sam".into(),
            last_name: "Rivera".into(),
            age: Some(age.into()),
            payment_type: Some(payment.into()),
            ..Default::default()
        })
    }

    #[test]
    fn test_first_match_respects_priority() {
        let mut minor = criteria("Minor", "age", Operator::Equals, "15", 0);
        minor.action = CriteriaAction::FlagUrgent;
        let self_pay = criteria("Self pay", "paymentType", Operator::Equals, "Self-Pay", 1);
        // Input order deliberately reversed
        let list = vec![self_pay, minor];

        let matcher = CriteriaMatcher::new(&list, &FieldWhitelist::all()).unwrap();
        let first = matcher.first_match(&client("15", "Self-Pay")).unwrap();
        assert_eq!(first.name, "Minor");
        assert_eq!(first.action, CriteriaAction::FlagUrgent);
        assert_eq!(matcher.matches(&client("15", "Self-Pay")).len(), 2);
    }

    #[test]
    fn test_ties_keep_input_order() {
        let list = vec![
            criteria("A", "age", Operator::Exists, "", 1),
            criteria("B", "age", Operator::Exists, "", 1),
            criteria("C", "age", Operator::Exists, "", 0),
        ];
        let matcher = CriteriaMatcher::new(&list, &FieldWhitelist::all()).unwrap();
        let names: Vec<_> = matcher
            .evaluate_all(&client("30", "Insurance"))
            .iter()
            .map(|o| o.criteria.name.as_str())
            .collect();
        assert_eq!(names, vec!["C", "A", "B"]);
    }

    #[test]
    fn test_inactive_criteria_excluded() {
        let mut inactive = criteria("Minor", "age", Operator::Equals, "15", 0);
        inactive.is_active = false;
        // Inactive criteria may even reference a non-whitelisted field
        let mut stale = criteria("Stale", "status", Operator::Exists, "", 0);
        stale.is_active = false;
        let list = vec![inactive, stale, criteria("Self pay", "paymentType", Operator::Equals, "Self-Pay", 5)];

        let matcher = CriteriaMatcher::new(&list, &FieldWhitelist::all()).unwrap();
        assert_eq!(matcher.len(), 1);
        let outcomes = matcher.evaluate_all(&client("15", "Self-Pay"));
        assert!(outcomes.iter().all(|o| o.criteria.name != "Minor"));
        assert_eq!(matcher.first_match(&client("15", "Self-Pay")).unwrap().name, "Self pay");
        assert!(matcher.first_match(&client("15", "Insurance")).is_none());
    }

    #[test]
    fn test_field_outside_whitelist_rejected() {
        let list = vec![
            criteria("Minor", "age", Operator::Equals, "15", 0),
            criteria("Email", "email", Operator::Exists, "", 1),
        ];
        let whitelist = FieldWhitelist::from_names(&["age"]).unwrap();
        let err = CriteriaMatcher::new(&list, &whitelist).unwrap_err();
        assert_eq!(err, EvaluationError::FieldNotAllowed("email".into()));
    }

    #[test]
    fn test_missing_field_reads_as_empty() {
        let list = vec![criteria("No insurer", "insuranceProvider", Operator::NotExists, "", 0)];
        let matcher = CriteriaMatcher::new(&list, &FieldWhitelist::all()).unwrap();
        assert!(matcher.first_match(&client("40", "Self-Pay")).is_some());
    }

    #[test]
    fn test_deterministic() {
        let list = vec![
            criteria("A", "presentingConcerns", Operator::Contains, "", 2),
            criteria("B", "age", Operator::InList, "15,16,17", 1),
        ];
        let matcher = CriteriaMatcher::new(&list, &FieldWhitelist::all()).unwrap();
        let c = client("16", "Self-Pay");
        assert_eq!(matcher.evaluate_all(&c), matcher.evaluate_all(&c));
    }
}
