//! Background Execution and App Lifecycle
//!
//! Playback that is still loading or buffering when the app moves to the
//! background would be suspended by the OS before audio starts. The core asks
//! the host for a short background-execution grant while it waits and hands
//! the grant back as soon as playback settles.

use crate::{error::Result, platform::PlatformSendSync};
use serde::{Deserialize, Serialize};

/// Handle for one background-execution grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BackgroundTaskToken(pub u64);

/// Background execution grants.
///
/// # Platform Notes
///
/// - **iOS**: `UIApplication.beginBackgroundTask` / `endBackgroundTask`
/// - **Android**: a foreground-service start or wake lock
/// - **Web**: not available; return [`BridgeError::NotAvailable`](crate::BridgeError::NotAvailable)
pub trait BackgroundTaskProvider: PlatformSendSync {
    /// Request a grant labelled `name`.
    fn begin_task(&self, name: &str) -> Result<BackgroundTaskToken>;

    /// Return a grant. Ending an unknown or already-ended token is a no-op.
    fn end_task(&self, token: BackgroundTaskToken);
}

/// Lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LifecycleState {
    /// Application is in the foreground and active
    #[default]
    Foreground,
    /// Application is in the background
    Background,
    /// Application is being terminated
    Terminating,
}

/// Lifecycle notification forwarded by the host.
///
/// # Platform Support
///
/// - **iOS**: UIApplication lifecycle notifications
/// - **Android**: Activity/Application lifecycle callbacks
/// - **Web**: Page Visibility API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifecycleEvent {
    WillEnterForeground,
    DidBecomeActive,
    WillResignActive,
    DidEnterBackground,
    WillTerminate,
}

impl LifecycleEvent {
    /// The state the application is in once this event has been delivered.
    pub fn resulting_state(&self) -> LifecycleState {
        match self {
            LifecycleEvent::WillEnterForeground
            | LifecycleEvent::DidBecomeActive
            | LifecycleEvent::WillResignActive => LifecycleState::Foreground,
            LifecycleEvent::DidEnterBackground => LifecycleState::Background,
            LifecycleEvent::WillTerminate => LifecycleState::Terminating,
        }
    }
}
