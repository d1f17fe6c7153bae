//! Workspace facade crate.
//!
//! Host applications depend on `cadence` and enable the `playback` feature to
//! pull in the playback core together with the bridge contracts they have to
//! implement (media engine, audio session, remote commands, now-playing sink).

#[cfg(feature = "playback")]
pub use bridge_traits as bridge;
#[cfg(feature = "playback")]
pub use core_playback as playback;
#[cfg(feature = "playback")]
pub use core_runtime as runtime;
