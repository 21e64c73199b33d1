//! Inclusion screening.
//!
//! Evaluates the configured criteria against each candidate in order,
//! short-circuiting on the first failure; that criterion's name becomes the
//! rejection rationale. Purely local and deterministic: identical candidates
//! and configuration always produce identical verdicts, and there is no
//! error path (malformed configuration is rejected at pipeline start).

use crate::config::{Criterion, PrescreenConfig};
use crate::types::{CandidateWork, InclusionVerdict};

pub struct PrescreenStage {
    criteria: Vec<Criterion>,
}

impl PrescreenStage {
    pub fn new(config: &PrescreenConfig) -> Self {
        Self {
            criteria: config.criteria.clone(),
        }
    }

    /// Produce one verdict per candidate, in input order.
    pub fn run(&self, candidates: &[CandidateWork]) -> Vec<(String, InclusionVerdict)> {
        candidates
            .iter()
            .map(|work| (work.id.clone(), self.evaluate(work)))
            .collect()
    }

    fn evaluate(&self, work: &CandidateWork) -> InclusionVerdict {
        for criterion in &self.criteria {
            if !Self::passes(criterion, work) {
                return InclusionVerdict::exclude(criterion.name());
            }
        }
        InclusionVerdict::include()
    }

    fn passes(criterion: &Criterion, work: &CandidateWork) -> bool {
        match criterion {
            Criterion::MinYear { year } => work.year.is_some_and(|y| y >= *year),
            Criterion::RequireAbstract => work
                .abstract_text
                .as_deref()
                .is_some_and(|a| !a.trim().is_empty()),
            Criterion::RequireKeyword { term } => {
                let needle = term.to_lowercase();
                work.title.to_lowercase().contains(&needle)
                    || work
                        .abstract_text
                        .as_deref()
                        .is_some_and(|a| a.to_lowercase().contains(&needle))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn work(id: &str, year: Option<i32>, abstract_text: Option<&str>) -> CandidateWork {
        CandidateWork {
            id: id.to_string(),
            title: "Gene therapy in hemophilia A".to_string(),
            abstract_text: abstract_text.map(str::to_string),
            year,
            source: json!({}),
        }
    }

    fn config(criteria: Vec<Criterion>) -> PrescreenConfig {
        PrescreenConfig { criteria }
    }

    #[test]
    fn test_all_criteria_satisfied() {
        let stage = PrescreenStage::new(&config(vec![
            Criterion::MinYear { year: 2015 },
            Criterion::RequireAbstract,
        ]));
        let verdicts = stage.run(&[work("10.1/a", Some(2019), Some("text"))]);

        assert_eq!(verdicts.len(), 1);
        assert!(verdicts[0].1.include);
        assert_eq!(verdicts[0].1.rationale, "all criteria satisfied");
    }

    #[test]
    fn test_short_circuits_on_first_failing_criterion() {
        // Fails both min_year and require_abstract; the rationale must name
        // the first configured criterion only.
        let stage = PrescreenStage::new(&config(vec![
            Criterion::MinYear { year: 2015 },
            Criterion::RequireAbstract,
        ]));
        let verdicts = stage.run(&[work("10.1/a", Some(2010), None)]);

        assert!(!verdicts[0].1.include);
        assert_eq!(verdicts[0].1.rationale, "min_year");
    }

    #[test]
    fn test_criterion_order_decides_rationale() {
        let stage = PrescreenStage::new(&config(vec![
            Criterion::RequireAbstract,
            Criterion::MinYear { year: 2015 },
        ]));
        let verdicts = stage.run(&[work("10.1/a", Some(2010), None)]);
        assert_eq!(verdicts[0].1.rationale, "require_abstract");
    }

    #[test]
    fn test_missing_year_fails_min_year() {
        let stage = PrescreenStage::new(&config(vec![Criterion::MinYear { year: 2015 }]));
        let verdicts = stage.run(&[work("10.1/a", None, Some("text"))]);
        assert!(!verdicts[0].1.include);
    }

    #[test]
    fn test_keyword_matches_title_or_abstract() {
        let stage = PrescreenStage::new(&config(vec![Criterion::RequireKeyword {
            term: "Hemophilia".into(),
        }]));
        // Title match, case-insensitive.
        assert!(stage.run(&[work("10.1/a", Some(2020), None)])[0].1.include);

        let stage = PrescreenStage::new(&config(vec![Criterion::RequireKeyword {
            term: "factor viii".into(),
        }]));
        let with_abstract = work("10.1/b", Some(2020), Some("Factor VIII levels rose."));
        assert!(stage.run(&[with_abstract])[0].1.include);

        let without = work("10.1/c", Some(2020), Some("Unrelated."));
        assert!(!stage.run(&[without])[0].1.include);
    }

    #[test]
    fn test_deterministic_across_runs() {
        let stage = PrescreenStage::new(&config(vec![
            Criterion::MinYear { year: 2015 },
            Criterion::RequireAbstract,
        ]));
        let candidates = vec![
            work("10.1/a", Some(2019), Some("text")),
            work("10.1/b", Some(2012), Some("text")),
            work("10.1/c", Some(2018), None),
        ];

        let first = stage.run(&candidates);
        let second = stage.run(&candidates);
        assert_eq!(first, second);
    }

    #[test]
    fn test_empty_criteria_includes_everything() {
        let stage = PrescreenStage::new(&config(vec![]));
        let verdicts = stage.run(&[work("10.1/a", None, None)]);
        assert!(verdicts[0].1.include);
    }
}
