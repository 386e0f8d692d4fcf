use serde::{Deserialize, Serialize};

/// Processing state of one `graph_id`.
///
/// `Created -> Processing -> {Completed | Failed}`; a later re-ingestion moves
/// a terminal graph back into `Processing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GraphStatus {
    Created,
    Processing,
    Completed,
    Failed,
}

impl GraphStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Whether moving from `self` to `next` is a legal transition.
    pub fn can_transition_to(self, next: GraphStatus) -> bool {
        matches!(
            (self, next),
            (Self::Created, Self::Processing)
                | (Self::Processing, Self::Completed)
                | (Self::Processing, Self::Failed)
                | (Self::Completed, Self::Processing)
                | (Self::Failed, Self::Processing)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "CREATED",
            Self::Processing => "PROCESSING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        }
    }
}

impl std::fmt::Display for GraphStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::GraphStatus::*;

    #[test]
    fn lifecycle_transitions() {
        assert!(Created.can_transition_to(Processing));
        assert!(Processing.can_transition_to(Completed));
        assert!(Processing.can_transition_to(Failed));
        assert!(Completed.can_transition_to(Processing));
        assert!(Failed.can_transition_to(Processing));

        assert!(!Created.can_transition_to(Completed));
        assert!(!Completed.can_transition_to(Failed));
        assert!(!Processing.can_transition_to(Created));
    }

    #[test]
    fn serializes_upper_case() {
        assert_eq!(serde_json::to_string(&Completed).ok().as_deref(), Some("\"COMPLETED\""));
        assert!(Failed.is_terminal());
        assert!(!Processing.is_terminal());
    }
}
