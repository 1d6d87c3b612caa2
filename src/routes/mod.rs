// Export all route modules
pub mod deals;

// Re-export all route handlers for easy importing
pub use deals::*;
