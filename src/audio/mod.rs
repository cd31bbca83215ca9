//! # Audio Module
//!
//! Per-guild playback sessions for Open Music style bots.
//!
//! This module owns the state of every guild's player: the queue, the track
//! currently handed to the audio engine, loop/24-7 flags, volume and the
//! effect filter chain. Audio decoding, voice transport and effect DSP live in
//! an external [`engine::AudioEngine`]; this module only hands it fully
//! validated state.
//!
//! ## Architecture
//!
//! ### [`registry`] - Session Registry
//! - Atomic get-or-create keyed by guild id
//! - Explicit teardown and idle eviction
//!
//! ### [`session`] - Guild Session
//! - One exclusive mutation lock per guild, held across engine round-trips
//! - Coherent snapshots for status commands that never wait on a slow commit
//!
//! ### Controllers (obtained from a [`session::SessionGuard`])
//! - [`queue::QueueController`]: append, play-top, remove, move, shuffle, skip-to
//! - [`filters::FilterChainController`]: clamped effects, full-state commits
//! - [`player::PlaybackController`]: play, pause, resume, seek, volume, skip, stop
//! - [`loop_mode::LoopModeManager`]: loop mode, 24/7 and the track-end hook
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use musico::audio::{
//!     effects::{BassBoostLevel, Effect},
//!     engine::LoopbackEngine,
//!     registry::SessionRegistry,
//!     session::SessionSettings,
//! };
//! use serenity::model::id::GuildId;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), musico::error::SessionError> {
//! let registry = SessionRegistry::new(Arc::new(LoopbackEngine::new()), SessionSettings::default());
//! let session = registry.get_or_create(GuildId::new(123456789));
//!
//! let guard = session.lock().await;
//! guard.filters().set_effect(Effect::BassBoost(BassBoostLevel::High)).await?;
//! guard.playback().set_volume(80).await?;
//! drop(guard);
//!
//! println!("{:?}", session.snapshot().filters);
//! # Ok(())
//! # }
//! ```

pub mod effects;
pub mod engine;
pub mod filters;
pub mod loop_mode;
pub mod player;
pub mod queue;
pub mod registry;
pub mod session;
pub mod track;
