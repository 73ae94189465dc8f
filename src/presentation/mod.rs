// Presentation layer - What the operator sees
pub mod console;
