//! Storage key constants.

/// Storage keys used by the session reconciler
pub struct StorageKeys;

impl StorageKeys {
    /// Last-known user identity (JSON)
    pub const USER: &'static str = "user";

    /// Guest-mode record (JSON `{ id, isGuest }`)
    pub const GUEST_USER: &'static str = "guestUser";

    /// Redirect transition start (epoch millis)
    pub const AUTH_TRANSITION_START: &'static str = "authTransitionStart";

    /// Redirect transition completion (epoch millis)
    pub const AUTH_TRANSITION_COMPLETE: &'static str = "authTransitionComplete";
}
