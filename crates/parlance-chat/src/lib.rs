//! Conversational core for Parlance.
//!
//! Owns the session transcript, the persona registry, the dispatcher that
//! forwards turns to the completion service, and the renderer that displays,
//! speaks, and exports replies.

pub mod dispatcher;
pub mod error;
pub mod export;
pub mod persona;
pub mod render;
pub mod session;

pub use dispatcher::ConversationDispatcher;
pub use error::ChatError;
pub use export::ExportFormat;
pub use persona::{Persona, PersonaRegistry, DEFAULT_PERSONA};
pub use render::OutputRenderer;
pub use session::{Session, SessionState};
