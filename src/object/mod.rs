//! Object models and their resolution from resource identifiers

pub mod loader;
pub mod model;
pub mod resource;

pub use loader::{parse_obj, InMemoryModelLoader, ObjMeshLoader, ObjectModelLoader};
pub use model::{MeshPart, ObjectModel};
pub use resource::ObjectResourceIdentifier;
