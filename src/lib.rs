pub mod assets;
pub mod config;
pub mod events;
pub mod ik;
pub mod library;
pub mod model;
pub mod ops;
pub mod pipeline;
pub mod playback;
pub mod pose;
pub mod scratch;
pub mod skinning;

pub use assets::{ClipHandle, MeshHandle, SkeletonHandle};
pub use config::PipelineSettings;
pub use events::PoseEvent;
pub use ik::IkParams;
pub use model::{AnimatedModel, JointAttachment, ModelId};
pub use pipeline::PosePipeline;
pub use pose::{JointTransform, MAX_BLEND_LAYERS};
pub use skinning::RenderMatrix;
