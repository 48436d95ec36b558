//! Quillcast Engine library.
//!
//! Server-side code for live content generation and publication.
//!
//! ## Structure
//!
//! - `use_cases/` - Content lifecycle, generation, publishing, scheduling
//! - `infrastructure/` - External dependency implementations (ports + adapters)
//! - `api/` - HTTP and WebSocket entry points
//! - `app` - Application composition

pub mod api;
pub mod app;
pub mod infrastructure;
pub mod use_cases;

pub use app::App;
