//! Auxiliary stateful features.
//!
//! Everything here observes the message stream without owning it: each
//! component keeps its own state, decides side effects, and never blocks
//! or fails command dispatch.

pub mod anti_link;
pub mod anti_spam;
pub mod anti_tag;
pub mod auto_react;
pub mod presence;

pub use anti_spam::AntiSpam;
pub use auto_react::{AutoReact, ReactMode};
pub use presence::PresenceTracker;
