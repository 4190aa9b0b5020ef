//! Query-mode classification.
//!
//! Every incoming question is routed to exactly one answering pipeline
//! before any retrieval or generation work starts. Classification is
//! keyword-based and deterministic: same input, same mode, no model call.
//!
//! This is a best-effort heuristic, not a learned classifier. Substring
//! membership keeps it trivially fast but can misfire on ambiguous input
//! ("show me the refund policy" routes to chart).

use serde::{Deserialize, Serialize};

/// Keywords that route a question to the chart pipeline.
///
/// Checked before [`AGGREGATION_KEYWORDS`]; a question matching both sets
/// is a chart question.
const CHART_KEYWORDS: &[&str] = &["chart", "graph", "plot", "show", "trend", "visualize"];

/// Keywords that route a question to the structured aggregation pipeline.
const AGGREGATION_KEYWORDS: &[&str] = &[
    "most", "total", "sum", "highest", "maximum", "max", "spent", "which",
];

/// The answering pipeline selected for a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Mode {
    /// Chart-data response built from stored records.
    Chart,
    /// Structured aggregation over stored records.
    Aggregation,
    /// Hybrid retrieval plus streamed generation.
    Rag,
}

impl Mode {
    /// Classify a question into a mode.
    ///
    /// Case-insensitive substring membership, evaluated in fixed priority
    /// order: chart keywords first, then aggregation keywords. Unmatched
    /// questions fall through to [`Mode::Rag`].
    pub fn classify(question: &str) -> Mode {
        let lowered = question.to_lowercase();

        if CHART_KEYWORDS.iter().any(|k| lowered.contains(k)) {
            return Mode::Chart;
        }
        if AGGREGATION_KEYWORDS.iter().any(|k| lowered.contains(k)) {
            return Mode::Aggregation;
        }
        Mode::Rag
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Chart => "chart",
            Mode::Aggregation => "aggregation",
            Mode::Rag => "rag",
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chart_keywords_route_to_chart() {
        assert_eq!(Mode::classify("show me sales by month"), Mode::Chart);
        assert_eq!(Mode::classify("plot revenue over time"), Mode::Chart);
        assert_eq!(Mode::classify("what is the TREND here?"), Mode::Chart);
    }

    #[test]
    fn test_aggregation_keywords_route_to_aggregation() {
        assert_eq!(
            Mode::classify("which customer spent the most?"),
            Mode::Aggregation
        );
        assert_eq!(Mode::classify("total sales in march"), Mode::Aggregation);
        assert_eq!(Mode::classify("highest order value"), Mode::Aggregation);
    }

    #[test]
    fn test_unmatched_falls_through_to_rag() {
        assert_eq!(Mode::classify("what does the refund policy say?"), Mode::Rag);
        assert_eq!(Mode::classify(""), Mode::Rag);
        assert_eq!(Mode::classify("tell me about Alice"), Mode::Rag);
    }

    #[test]
    fn test_chart_wins_over_aggregation() {
        // "show"/"chart" and "total" both present; chart is checked first.
        assert_eq!(Mode::classify("show the total sales"), Mode::Chart);
        assert_eq!(Mode::classify("total sales chart"), Mode::Chart);
    }

    #[test]
    fn test_case_insensitive() {
        assert_eq!(Mode::classify("WHICH month was best"), Mode::Aggregation);
        assert_eq!(Mode::classify("Visualize the data"), Mode::Chart);
    }

    #[test]
    fn test_classification_is_deterministic() {
        let q = "which supplier had the highest volume";
        let first = Mode::classify(q);
        for _ in 0..10 {
            assert_eq!(Mode::classify(q), first);
        }
    }

    #[test]
    fn test_mode_serialization() {
        assert_eq!(serde_json::to_string(&Mode::Rag).unwrap(), "\"rag\"");
        assert_eq!(serde_json::to_string(&Mode::Chart).unwrap(), "\"chart\"");
        assert_eq!(
            serde_json::to_string(&Mode::Aggregation).unwrap(),
            "\"aggregation\""
        );
    }
}
