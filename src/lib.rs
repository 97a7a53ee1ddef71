// Wire protocol types and codec
pub mod message;

// Channel state, aggregation and derived views
pub mod channel;

// WebSocket connection lifecycle management
pub mod connection;

// Configuration
pub mod config;
