//! Launch profile: the site constants a batch is rendered and submitted with

/// Compile the embedded profile JSON schema
pub mod schema;

/// Read, validate and deserialise a launch profile
pub mod profile;

/// Combine the profile with command line overrides
pub mod options;
