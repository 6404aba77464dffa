//! The record capability trait.
//!
//! A record type describes itself to the persistence layer through [`Record`]:
//! its ordered field descriptors, table name, current values, id accessors and the
//! constructors it offers for materializing rows. Implementations are usually
//! generated with [`impl_record!`](crate::impl_record) but can be written by hand.

use crate::error::{OrmError, OrmResult};
use crate::mapping::value::{FieldType, SqlValue, Value};
use std::borrow::Cow;

/// Name of the reserved, database-generated primary key field.
pub const ID_FIELD: &str = "id";

/// A mapped field: name plus semantic type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDef {
    pub name: &'static str,
    pub field_type: FieldType,
    pub nullable: bool,
}

impl FieldDef {
    pub const fn new(name: &'static str, field_type: FieldType, nullable: bool) -> Self {
        Self {
            name,
            field_type,
            nullable,
        }
    }

    /// Descriptor for a field whose Rust type is `T`.
    pub const fn of<T: SqlValue>(name: &'static str) -> Self {
        Self::new(name, T::FIELD_TYPE, T::NULLABLE)
    }

    pub fn is_id(&self) -> bool {
        is_id_name(self.name)
    }
}

/// Whether `name` is the reserved id field. Usable in constant evaluation.
pub const fn is_id_name(name: &str) -> bool {
    let (a, b) = (name.as_bytes(), ID_FIELD.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    let mut i = 0;
    while i < a.len() {
        if a[i] != b[i] {
            return false;
        }
        i += 1;
    }
    true
}

/// Constructor taking every mapped column, in column order.
#[derive(Debug)]
pub struct AllFieldsConstructor<T> {
    pub parameter_types: &'static [FieldType],
    pub construct: fn(Vec<Value>) -> OrmResult<T>,
}

/// Default constructor followed by positional field assignment.
#[derive(Debug)]
pub struct ZeroArgConstructor<T> {
    pub create: fn() -> T,
    pub assign: fn(&mut T, &'static str, Value) -> OrmResult<()>,
}

/// The constructors a record type offers. The mapper picks one of them once.
#[derive(Debug)]
pub struct Constructors<T> {
    pub all_fields: Option<AllFieldsConstructor<T>>,
    pub zero_arg: Option<ZeroArgConstructor<T>>,
}

impl<T> Constructors<T> {
    pub fn none() -> Self {
        Self {
            all_fields: None,
            zero_arg: None,
        }
    }

    pub fn all_fields(
        parameter_types: &'static [FieldType],
        construct: fn(Vec<Value>) -> OrmResult<T>,
    ) -> Self {
        Self::none().with_all_fields(parameter_types, construct)
    }

    pub fn zero_arg(
        create: fn() -> T,
        assign: fn(&mut T, &'static str, Value) -> OrmResult<()>,
    ) -> Self {
        Self::none().with_zero_arg(create, assign)
    }

    pub fn with_all_fields(
        mut self,
        parameter_types: &'static [FieldType],
        construct: fn(Vec<Value>) -> OrmResult<T>,
    ) -> Self {
        self.all_fields = Some(AllFieldsConstructor {
            parameter_types,
            construct,
        });
        self
    }

    pub fn with_zero_arg(
        mut self,
        create: fn() -> T,
        assign: fn(&mut T, &'static str, Value) -> OrmResult<()>,
    ) -> Self {
        self.zero_arg = Some(ZeroArgConstructor { create, assign });
        self
    }
}

/// A plain data type persisted as one row of one table.
pub trait Record: Sized + Send + Sync + 'static {
    /// Persisted fields in declaration order, including `id` when present.
    fn fields() -> &'static [FieldDef];

    /// Table the record maps to. Defaults to the lower-cased type name.
    fn table_name() -> Cow<'static, str> {
        Cow::Owned(simple_type_name::<Self>().to_lowercase())
    }

    /// Current values, positionally matching [`Record::fields`].
    fn values(&self) -> Vec<Value>;

    /// Set when [`Record::id`] and [`Record::set_id`] are implemented. A type that
    /// declares an `id` field without them is rejected at registration, since generated
    /// keys could not be written back.
    const HAS_ID_ACCESSORS: bool = false;

    fn id(&self) -> Option<i64> {
        None
    }

    fn set_id(&mut self, id: i64) {
        let _ = id;
    }

    fn constructors() -> Constructors<Self>;
}

/// Type name without its module path or generic arguments.
pub fn simple_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// Pull the next positional value and convert it into the field's Rust type.
///
/// Used by generated all-fields constructors.
pub fn take_field<T: SqlValue>(
    values: &mut impl Iterator<Item = Value>,
    field: &'static str,
) -> OrmResult<T> {
    let value = values
        .next()
        .ok_or_else(|| OrmError::mapping(format!("Missing column value for field '{}'", field)))?;
    T::from_value(value)
        .map_err(|e| OrmError::mapping(format!("Field '{}': {}", field, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Invoice;

    mod nested {
        pub struct LineItem<T>(pub T);
    }

    #[test]
    fn test_simple_type_name() {
        assert_eq!(simple_type_name::<Invoice>(), "Invoice");
        assert_eq!(simple_type_name::<nested::LineItem<String>>(), "LineItem");
    }

    #[test]
    fn test_field_def_of() {
        let def = FieldDef::of::<Option<i32>>("age");
        assert_eq!(def.field_type, FieldType::Int32);
        assert!(def.nullable);
        assert!(!def.is_id());
        assert!(FieldDef::of::<i64>("id").is_id());
    }

    #[test]
    fn test_is_id_name() {
        const ID: bool = is_id_name("id");
        assert!(ID);
        assert!(!is_id_name("ID"));
        assert!(!is_id_name("idx"));
        assert!(!is_id_name(""));
    }

    #[test]
    fn test_take_field() {
        let mut values = vec![Value::from("Ann"), Value::Int32(4)].into_iter();
        let name: String = take_field(&mut values, "name").unwrap();
        let age: i32 = take_field(&mut values, "age").unwrap();
        assert_eq!(name, "Ann");
        assert_eq!(age, 4);

        let missing = take_field::<bool>(&mut values, "active").unwrap_err();
        assert!(missing.to_string().contains("active"));
    }
}
