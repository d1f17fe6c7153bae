//! Platform-specific helper abstractions used to keep trait bounds aligned with
//! the threading guarantees of each target.
//!
//! Engine handles, audio-session managers and the other collaborators are
//! shared behind `Arc` between the playback core and the host glue that
//! forwards platform notifications. On native targets that sharing requires
//! `Send + Sync`. WebAssembly hosts run everything on the browser main thread
//! and wrap non-thread-safe objects, so the bounds collapse to nothing there.

/// `Send + Sync` on native targets, no bound on `wasm32`.
#[cfg(not(target_arch = "wasm32"))]
pub trait PlatformSendSync: Send + Sync {}

#[cfg(not(target_arch = "wasm32"))]
impl<T> PlatformSendSync for T where T: Send + Sync {}

#[cfg(target_arch = "wasm32")]
pub trait PlatformSendSync {}

#[cfg(target_arch = "wasm32")]
impl<T> PlatformSendSync for T {}
