//! Network URL constants for the comparison service.

/// Default REST API base URL for the comparison service.
pub const DEFAULT_API_URL: &str = "http://localhost:5000/api";

/// Default WebSocket URL for live price updates.
pub const DEFAULT_WS_URL: &str = "ws://localhost:5000/ws";
