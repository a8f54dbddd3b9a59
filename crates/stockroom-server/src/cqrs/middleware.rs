//! Marker traits splitting requests into writes and reads

/// A request that changes state
pub trait Command {}

/// A request that only reads state
pub trait Query {}
