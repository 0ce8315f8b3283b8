use crate::model::ModelId;
use std::fmt;

/// Frame-scoped notifications from the pose pipeline, drained by the caller
/// after `advance`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoseEvent {
    /// A looping clip wrapped, or a one-shot clip hit its end this frame.
    ClipWrapped { model: ModelId, animation: String },
    /// An IK solve reported its target reachable this frame.
    IkReached { model: ModelId, joint: String },
}

impl fmt::Display for PoseEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoseEvent::ClipWrapped { model, animation } => {
                write!(f, "ClipWrapped model={} animation={}", model.index(), animation)
            }
            PoseEvent::IkReached { model, joint } => {
                write!(f, "IkReached model={} joint={}", model.index(), joint)
            }
        }
    }
}
