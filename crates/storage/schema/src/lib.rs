//! Reflective schema registry (component E): defines and reconstructs the
//! set of named types visible within one storage — structures with
//! inheritance, and the persistable descriptors for every container and
//! graph type the schema can name.

pub mod descriptor;
pub mod errors;
pub mod schema;
pub mod structure;
pub mod volatile;

pub use descriptor::{describe_order_key, OrderKeyDescriptor, TypeDescriptor};
pub use errors::SchemaError;
pub use schema::Schema;
pub use structure::{merge_inherited_fields, FieldSpec, StructureType};
pub use volatile::{NoVolatileBases, VolatileResolver};
