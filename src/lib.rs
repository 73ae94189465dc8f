// Library root - Node-sequenced acquisition and validation engine for battery pack acceptance tests
pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod presentation;
