//! Beatline is a timeline sequencer for music-synchronised demos.
//!
//! A [`Sequence`] owns an ordered list of [`Scene`]s, each holding
//! [`Entity`]s that draw into their own offscreen [`Surface`]. Host frame
//! timestamps are turned into musical time (bars, beats, ticks) by the
//! [`Transport`], and every frame the sequence picks the active scene, updates
//! and composites its live entities, runs transitions and post-processors,
//! and then dispatches transport events.
//!
//! # Frame order
//!
//! 1. **Select**: the scene whose window contains the timestamp (lowest index wins)
//! 2. **Analyse**: refresh [`Sequence::fft_data`] when an analyser is attached
//! 3. **Draw**: per entity, update (gated by its lifetime) then composite
//! 4. **Finish**: scene transitions, then sequence post-processors
//! 5. **Transport**: bar, beat, tick listeners
//!
//! Design constraints:
//!
//! - **No unsafe**: `unsafe` is forbidden in this crate.
//! - **Single driver**: only the sequence's frame loop updates entities.
//! - **Isolated failures**: a failing callback is logged and skipped, never fatal to the frame.
//! - **Deterministic randomness**: effects draw from [`SplitMix64`] seeded by the sequence seed.
//! - **Premultiplied RGBA8** everywhere.
#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod animation;
mod assets;
mod audio;
mod composition;
mod conductor;
mod effects;
mod foundation;
mod render;
mod scene;
mod sequence;
mod transport;

pub use animation::ease::Ease;
pub use assets::decode::{AUDIO_SAMPLE_RATE, decode_audio_f32_stereo, decode_image};
pub use assets::loader::{AssetLoader, DecodedAudio, FsAssetLoader, normalize_rel_path};
pub use audio::analyser::{
    AudioAnalyser, DEFAULT_FFT_SIZE, DEFAULT_SMOOTHING, MAX_DECIBELS, MIN_DECIBELS,
    SpectrumAnalyser,
};
pub use composition::dsl::{EntityBuilder, EntityFactory, EntityRegistry, SceneBuilder};
pub use composition::model::{
    DocSettings, EffectInstance, EntityDoc, EventActionDoc, EventDoc, SceneDoc, Timeline,
    TimelineDoc, TransitionSpec, merge_props,
};
pub use conductor::events::{Conductor, EventAction, EventCriteria, FirePolicy, TimelineEvent};
pub use effects::fx::{MAX_BLUR_RADIUS_PX, PostEffect, parse_post_effect};
pub use effects::transitions::{TransitionKind, TransitionPhase, WipeDir, parse_transition};
pub use foundation::core::{DEFAULT_SIZE, Rgba8Premul, Size, TimeRange, Vec2};
pub use foundation::error::{BeatlineError, BeatlineResult};
pub use foundation::math::SplitMix64;
pub use render::blur::blur_surface_in_place;
pub use render::composite::{
    PremulRgba8, WipeParams, crossfade, fade_toward_in_place, over, wipe_reveal_in_place,
};
pub use render::surface::Surface;
pub use scene::entity::{Entity, FrameCtx, Lifetime, PostProcessor, Renderer, action_renderer};
pub use scene::model::{EnterHook, ExitHook, Scene, SceneInfo, Transition, TransitionFn};
pub use scene::shader::{ShaderProgram, ShaderRenderer, ShaderSource};
pub use sequence::engine::{FrameOutcome, PlayState, Sequence, SequenceSettings};
pub use sequence::scheduler::{FixedStepRunner, FrameHandle, FrameScheduler, ManualScheduler, RunStats};
pub use sequence::view::SequenceView;
pub use transport::clock::{MusicalPosition, Transport, TransportConfig, TransportEvents};
pub use transport::listeners::{Listener, Listeners};
