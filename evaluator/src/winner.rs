use crate::pipeline::ModelEvaluation;

/// Highest `overall` among error-free, scored responses. The earliest entry wins ties.
pub fn select_winner(responses: &[ModelEvaluation]) -> Option<String> {
    let mut best: Option<(&str, f64)> = None;

    for evaluation in responses {
        if evaluation.result.error.is_some() {
            continue;
        }
        let Some(overall) = evaluation.scores.overall else {
            continue;
        };
        if best.is_none_or(|(_, top)| overall > top) {
            best = Some((&evaluation.result.model_id, overall));
        }
    }

    best.map(|(model_id, _)| model_id.to_string())
}

/// Ids of scored responses, in result order.
pub fn ranking(responses: &[ModelEvaluation]) -> Vec<String> {
    responses
        .iter()
        .filter(|e| e.scores.overall.is_some())
        .map(|e| e.result.model_id.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::SingleModelResult;
    use crate::judge::ScoreBreakdown;

    fn entry(model_id: &str, overall: Option<f64>, error: Option<&str>) -> ModelEvaluation {
        ModelEvaluation {
            result: SingleModelResult {
                model_id: model_id.to_string(),
                model_name: model_id.to_string(),
                provider: "test".to_string(),
                response_text: error.is_none().then(|| "نص".to_string()),
                latency_ms: 1,
                token_count: 1,
                cost_usd: 0.0,
                error: error.map(str::to_string),
                linguistic_metrics: None,
            },
            scores: ScoreBreakdown {
                overall,
                ..ScoreBreakdown::default()
            },
        }
    }

    #[test]
    fn test_highest_overall_wins() {
        let responses = vec![
            entry("gpt-4o", Some(7.2), None),
            entry("claude-3-5-sonnet", Some(8.9), None),
            entry("jais-30b", Some(6.0), None),
        ];
        assert_eq!(select_winner(&responses).as_deref(), Some("claude-3-5-sonnet"));
    }

    #[test]
    fn test_tie_goes_to_first() {
        let responses = vec![
            entry("a", Some(8.0), None),
            entry("b", Some(8.0), None),
        ];
        assert_eq!(select_winner(&responses).as_deref(), Some("a"));
    }

    #[test]
    fn test_errors_and_unscored_excluded() {
        let responses = vec![
            entry("a", Some(9.5), Some("timed out")),
            entry("b", None, None),
            entry("c", Some(0.0), None),
        ];
        assert_eq!(select_winner(&responses).as_deref(), Some("c"));
    }

    #[test]
    fn test_no_winner() {
        let responses = vec![entry("a", None, Some("x")), entry("b", None, None)];
        assert_eq!(select_winner(&responses), None);
        assert_eq!(select_winner(&[]), None);
    }

    #[test]
    fn test_ranking_keeps_result_order() {
        let responses = vec![
            entry("a", Some(3.0), None),
            entry("b", None, Some("x")),
            entry("c", Some(9.0), None),
        ];
        assert_eq!(ranking(&responses), vec!["a", "c"]);
    }
}
