//! Utility functions and helpers

pub mod uri;

pub use uri::{percent_decode, validate_uri, validate_uri_template, UriTemplate};
