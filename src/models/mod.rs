// Firestore document shapes and domain types
pub mod guild;
pub mod immersion_log;
pub mod media;
pub mod stats;
pub mod user;
