use movieflix_core::LookupEngine;

/// Shared application state accessible from all handlers.
pub struct AppState {
    pub engine: LookupEngine,
}
