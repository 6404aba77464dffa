//! Record mapping.
//!
//! This module maps record types onto tables:
//! - Semantic field types and the runtime value carrier
//! - The `Record` capability trait and field descriptors
//! - Construction strategies and the memoizing type mapper
//! - Registration macros (`impl_record!`, `args!`)

#[macro_use]
pub mod macros;
pub mod mapper;
pub mod record;
pub mod value;

pub use mapper::{ConstructionStrategy, Mapping, TypeMapper, construction_strategy_of};
pub use record::{
    AllFieldsConstructor, Constructors, FieldDef, ID_FIELD, Record, ZeroArgConstructor,
    simple_type_name, take_field,
};
pub use value::{FieldType, SqlValue, Value};
