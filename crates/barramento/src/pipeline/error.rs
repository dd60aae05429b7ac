use serde::Serialize;

/// Non-fatal problems met while processing an item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PipelineWarning {
    AttachmentSkipped { source: String, reason: String },
    /// Another caller changed the object's status first.
    StatusConflict { expected: String, current: String },
}

impl std::fmt::Display for PipelineWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineWarning::AttachmentSkipped { source, reason } => {
                write!(f, "attachment '{}' skipped: {}", source, reason)
            }
            PipelineWarning::StatusConflict { expected, current } => {
                write!(f, "expected status {} but found {}", expected, current)
            }
        }
    }
}
