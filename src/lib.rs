#![forbid(unsafe_code)]

pub mod checkpoint;
pub mod compile;
pub mod concat;
pub mod error;
pub mod expr;
pub mod geometry;
pub mod labels;
pub mod model;
pub mod orchestrate;
pub mod pacing;
pub mod srt;
pub mod supervise;
pub mod templates;
pub mod transitions;

pub use checkpoint::{CheckpointStore, RenderStage};
pub use compile::{compile, compile_slideshow, AudioMix, CompiledProgram, FilterProgram, Fragment};
pub use error::{ReelError, ReelResult};
pub use labels::LabelAllocator;
pub use model::{
    AnimationSpec, AssetManifest, Caption, ProgressInfo, RenderJob, RenderMetadata, RenderOptions,
    RenderResult, Segment, Timeline,
};
pub use orchestrate::RenderOrchestrator;
pub use supervise::{ProcessSupervisor, SupervisorState};
pub use templates::TemplateId;
pub use transitions::{plan_transitions, PlannedTransition, TransitionPolicy};
