pub mod archive;
pub mod content_guard;
pub mod gemini;
