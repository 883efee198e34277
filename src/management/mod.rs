mod identity;
mod session;
mod store;

pub use identity::IdentityStore;
pub use identity::MemoryIdentityStore;
pub use identity::StoreError;
pub use session::SESSION_COOKIE;
pub use session::SESSION_MAX_AGE_SECS;
pub use session::MAX_SESSIONS;
pub use session::STATE_KEY;
pub use session::Session;
pub use session::SessionError;
pub use session::SessionManager;
pub use store::JsonFileIdentityStore;
