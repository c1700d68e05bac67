//! Data model for the artifact/action protocol.
//!
//! An assistant message may embed one `<boltArtifact>` per turn, holding any
//! number of `<boltAction>` elements. This crate defines what those elements
//! turn into once parsed:
//!
//! - [`ArtifactDescriptor`]: identity and title of an artifact
//! - [`Action`]: the closed set of things an action can do (`shell`, `file`)
//! - [`ActionDescriptor`]: an action plus the ids that locate it
//! - [`ActionStatus`]: the lifecycle an action moves through when executed

mod action;
mod artifact;
mod error;
mod status;

pub use action::{Action, ActionDescriptor, ActionType};
pub use artifact::{artifact_key, ArtifactDescriptor};
pub use error::{DescriptorError, DescriptorResult};
pub use status::ActionStatus;
