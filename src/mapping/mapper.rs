//! Type mapper: per-type column bindings and construction strategies.
//!
//! A [`TypeMapper`] is owned by a [`Database`](crate::orm::Database) instance and
//! memoizes one [`Mapping`] per record type. The first lookup for a type validates its
//! field descriptors and decides the construction strategy; every later lookup is a
//! read-locked map hit. Two callers racing on the first lookup compute identical
//! mappings, so whichever insert wins is correct.

use crate::error::{OrmError, OrmResult};
use crate::mapping::record::{FieldDef, ID_FIELD, Record, simple_type_name};
use crate::mapping::value::{FieldType, Value};
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;

/// How rows of a record type are materialized. Chosen once per type.
pub enum ConstructionStrategy<T> {
    /// Constructor whose parameter types match the mapped column order.
    AllFieldsConstructor(fn(Vec<Value>) -> OrmResult<T>),
    /// Default constructor plus positional field assignment.
    ZeroArgPlusAssign {
        create: fn() -> T,
        assign: fn(&mut T, &'static str, Value) -> OrmResult<()>,
    },
}

impl<T> ConstructionStrategy<T> {
    pub fn name(&self) -> &'static str {
        match self {
            Self::AllFieldsConstructor(_) => "AllFieldsConstructor",
            Self::ZeroArgPlusAssign { .. } => "ZeroArgPlusAssign",
        }
    }
}

impl<T> std::fmt::Debug for ConstructionStrategy<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Resolve the construction strategy for `T` given the observed column types.
///
/// The all-fields constructor wins when its parameter types equal the column types;
/// otherwise the zero-arg constructor is used. Neither available is a configuration
/// error.
pub fn construction_strategy_of<T: Record>(
    observed_column_types: &[FieldType],
) -> OrmResult<ConstructionStrategy<T>> {
    let constructors = T::constructors();

    if let Some(ctor) = constructors.all_fields {
        if ctor.parameter_types == observed_column_types {
            return Ok(ConstructionStrategy::AllFieldsConstructor(ctor.construct));
        }
        debug!(
            table = %T::table_name(),
            "All-fields constructor parameter types do not match the mapped columns"
        );
    }

    match constructors.zero_arg {
        Some(ctor) => Ok(ConstructionStrategy::ZeroArgPlusAssign {
            create: ctor.create,
            assign: ctor.assign,
        }),
        None => Err(OrmError::configuration(format!(
            "Could not construct instance of table '{}': need a constructor without arguments, \
             or a constructor with all arguments of same type and order as the fields",
            T::table_name()
        ))),
    }
}

/// Column bindings and construction strategy for one record type.
#[derive(Debug)]
pub struct Mapping<T> {
    table: String,
    fields: &'static [FieldDef],
    has_id: bool,
    strategy: ConstructionStrategy<T>,
}

impl<T: Record> Mapping<T> {
    fn build() -> OrmResult<Self> {
        let fields = T::fields();
        let table = T::table_name().into_owned();

        let id_field = fields.iter().find(|f| f.is_id());
        if let Some(id) = id_field {
            if id.field_type != FieldType::Int64 {
                return Err(OrmError::configuration(format!(
                    "The id field of table '{}' is of type {} but must be int64",
                    table, id.field_type
                )));
            }
            if !T::HAS_ID_ACCESSORS {
                return Err(OrmError::configuration(format!(
                    "Table '{}' declares an id field but {} does not implement Record::id and Record::set_id",
                    table,
                    simple_type_name::<T>()
                )));
            }
        }

        let observed: Vec<FieldType> = fields.iter().map(|f| f.field_type).collect();
        let strategy = construction_strategy_of::<T>(&observed)?;

        debug!(
            table = %table,
            columns = fields.len(),
            strategy = strategy.name(),
            "Registered record mapping"
        );

        Ok(Self {
            table,
            fields,
            has_id: id_field.is_some(),
            strategy,
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn has_id(&self) -> bool {
        self.has_id
    }

    pub fn strategy(&self) -> &ConstructionStrategy<T> {
        &self.strategy
    }

    /// Mapped fields in declaration order, optionally without `id`.
    pub fn fields(&self, include_id: bool) -> Vec<&'static FieldDef> {
        self.fields
            .iter()
            .filter(|f| include_id || !f.is_id())
            .collect()
    }

    pub fn column_names(&self, include_id: bool) -> Vec<&'static str> {
        self.fields(include_id).into_iter().map(|f| f.name).collect()
    }

    pub fn column_types(&self, include_id: bool) -> Vec<FieldType> {
        self.fields(include_id)
            .into_iter()
            .map(|f| f.field_type)
            .collect()
    }

    /// Values of `record` for the selected columns, in column order.
    pub fn values_of(&self, record: &T, include_id: bool) -> OrmResult<Vec<Value>> {
        let values = record.values();
        if values.len() != self.fields.len() {
            return Err(OrmError::mapping(format!(
                "Record for table '{}' produced {} values for {} fields",
                self.table,
                values.len(),
                self.fields.len()
            )));
        }
        Ok(self
            .fields
            .iter()
            .zip(values)
            .filter(|(f, _)| include_id || !f.is_id())
            .map(|(_, v)| v)
            .collect())
    }

    /// Materialize a record from a full row (all columns, including `id`).
    pub fn construct(&self, row: Vec<Value>) -> OrmResult<T> {
        if row.len() != self.fields.len() {
            return Err(OrmError::mapping(format!(
                "Row for table '{}' has {} columns but {} fields are mapped",
                self.table,
                row.len(),
                self.fields.len()
            )));
        }
        match &self.strategy {
            ConstructionStrategy::AllFieldsConstructor(construct) => construct(row),
            ConstructionStrategy::ZeroArgPlusAssign { create, assign } => {
                let mut record = create();
                for (field, value) in self.fields.iter().zip(row) {
                    assign(&mut record, field.name, value)?;
                }
                Ok(record)
            }
        }
    }

    pub(crate) fn require_id(&self) -> OrmResult<()> {
        if self.has_id {
            Ok(())
        } else {
            Err(OrmError::configuration(format!(
                "Could not find {} field for table '{}'",
                ID_FIELD, self.table
            )))
        }
    }
}

/// Process-lifetime registry of record mappings, owned by one database instance.
#[derive(Default)]
pub struct TypeMapper {
    mappings: RwLock<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>,
}

impl TypeMapper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mapping for `T`, computed on first use and memoized afterwards.
    pub fn mapping<T: Record>(&self) -> OrmResult<Arc<Mapping<T>>> {
        let key = TypeId::of::<T>();

        let cached = self
            .mappings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
            .cloned();
        if let Some(entry) = cached {
            return downcast::<T>(entry);
        }

        let computed: Arc<dyn Any + Send + Sync> = Arc::new(Mapping::<T>::build()?);
        let entry = self
            .mappings
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(key)
            .or_insert(computed)
            .clone();
        downcast::<T>(entry)
    }

    /// Mapped fields of `T`, in declaration order.
    pub fn fields_of<T: Record>(&self, include_id: bool) -> OrmResult<Vec<(&'static str, FieldType)>> {
        Ok(self
            .mapping::<T>()?
            .fields(include_id)
            .into_iter()
            .map(|f| (f.name, f.field_type))
            .collect())
    }

    pub fn registered_count(&self) -> usize {
        self.mappings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl std::fmt::Debug for TypeMapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeMapper")
            .field("registered", &self.registered_count())
            .finish()
    }
}

fn downcast<T: Record>(entry: Arc<dyn Any + Send + Sync>) -> OrmResult<Arc<Mapping<T>>> {
    entry.downcast::<Mapping<T>>().map_err(|_| {
        OrmError::configuration(format!(
            "Mapping registry entry for table '{}' has an unexpected type",
            T::table_name()
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::record::{Constructors, take_field};
    use crate::mapping::value::SqlValue;
    use std::borrow::Cow;

    #[derive(Debug, Default, PartialEq)]
    struct Account {
        id: Option<i64>,
        owner: String,
        balance: f64,
    }

    crate::impl_record!(Account {
        id: Option<i64>,
        owner: String,
        balance: f64,
    });

    /// Hand-written record offering only a default constructor.
    #[derive(Debug, Default, PartialEq)]
    struct Setting {
        key: String,
        enabled: bool,
    }

    static SETTING_FIELDS: [FieldDef; 2] = [FieldDef::of::<String>("key"), FieldDef::of::<bool>("enabled")];

    impl Record for Setting {
        fn fields() -> &'static [FieldDef] {
            &SETTING_FIELDS
        }

        fn table_name() -> Cow<'static, str> {
            Cow::Borrowed("app_settings")
        }

        fn values(&self) -> Vec<Value> {
            vec![self.key.to_value(), self.enabled.to_value()]
        }

        fn constructors() -> Constructors<Self> {
            Constructors::zero_arg(Setting::default, |record, field, value| {
                match field {
                    "key" => record.key = SqlValue::from_value(value)?,
                    "enabled" => record.enabled = SqlValue::from_value(value)?,
                    other => return Err(OrmError::mapping(format!("unknown field {other}"))),
                }
                Ok(())
            })
        }
    }

    /// Offers an all-fields constructor with the wrong parameter order and nothing else.
    #[derive(Debug)]
    struct Broken {
        label: String,
        weight: i32,
    }

    static BROKEN_FIELDS: [FieldDef; 2] = [FieldDef::of::<String>("label"), FieldDef::of::<i32>("weight")];

    impl Record for Broken {
        fn fields() -> &'static [FieldDef] {
            &BROKEN_FIELDS
        }

        fn values(&self) -> Vec<Value> {
            vec![self.label.to_value(), self.weight.to_value()]
        }

        fn constructors() -> Constructors<Self> {
            Constructors::all_fields(&[FieldType::Int32, FieldType::String], |values| {
                let mut values = values.into_iter();
                let weight = take_field(&mut values, "weight")?;
                let label = take_field(&mut values, "label")?;
                Ok(Broken { label, weight })
            })
        }
    }

    #[derive(Debug)]
    struct TextId {
        id: String,
    }

    static TEXT_ID_FIELDS: [FieldDef; 1] = [FieldDef::of::<String>("id")];

    impl Record for TextId {
        fn fields() -> &'static [FieldDef] {
            &TEXT_ID_FIELDS
        }

        fn values(&self) -> Vec<Value> {
            vec![self.id.to_value()]
        }

        fn constructors() -> Constructors<Self> {
            Constructors::none()
        }
    }

    #[test]
    fn test_fields_of_respects_declaration_order_and_id_flag() {
        let mapper = TypeMapper::new();
        let with_id = mapper.fields_of::<Account>(true).unwrap();
        assert_eq!(
            with_id,
            vec![
                ("id", FieldType::Int64),
                ("owner", FieldType::String),
                ("balance", FieldType::Float64)
            ]
        );
        let without_id = mapper.fields_of::<Account>(false).unwrap();
        assert_eq!(without_id.len(), 2);
        assert_eq!(without_id[0].0, "owner");
    }

    #[test]
    fn test_default_and_explicit_table_names() {
        let mapper = TypeMapper::new();
        assert_eq!(mapper.mapping::<Account>().unwrap().table(), "account");
        assert_eq!(mapper.mapping::<Setting>().unwrap().table(), "app_settings");
    }

    #[test]
    fn test_strategy_prefers_all_fields_constructor() {
        let mapper = TypeMapper::new();
        let mapping = mapper.mapping::<Account>().unwrap();
        assert!(matches!(
            mapping.strategy(),
            ConstructionStrategy::AllFieldsConstructor(_)
        ));

        let account = mapping
            .construct(vec![Value::Int64(9), Value::from("kim"), Value::Float64(1.5)])
            .unwrap();
        assert_eq!(
            account,
            Account {
                id: Some(9),
                owner: "kim".to_string(),
                balance: 1.5
            }
        );
    }

    #[test]
    fn test_strategy_falls_back_to_zero_arg() {
        let mapper = TypeMapper::new();
        let mapping = mapper.mapping::<Setting>().unwrap();
        assert_eq!(mapping.strategy().name(), "ZeroArgPlusAssign");
        assert!(!mapping.has_id());

        let setting = mapping
            .construct(vec![Value::from("dark_mode"), Value::Bool(true)])
            .unwrap();
        assert_eq!(setting.key, "dark_mode");
        assert!(setting.enabled);
    }

    #[test]
    fn test_no_usable_constructor_is_configuration_error() {
        let mapper = TypeMapper::new();
        let err = mapper.mapping::<Broken>().unwrap_err();
        assert!(matches!(err, OrmError::Configuration { .. }));
        assert_eq!(mapper.registered_count(), 0);
    }

    #[test]
    fn test_non_integer_id_is_rejected() {
        let err = TypeMapper::new().mapping::<TextId>().unwrap_err();
        assert!(err.to_string().contains("must be int64"));
    }

    /// Declares an `id` column but keeps the default accessors.
    #[derive(Debug)]
    struct Orphan {
        id: Option<i64>,
        name: String,
    }

    static ORPHAN_FIELDS: [FieldDef; 2] = [
        FieldDef::of::<Option<i64>>("id"),
        FieldDef::of::<String>("name"),
    ];

    impl Record for Orphan {
        fn fields() -> &'static [FieldDef] {
            &ORPHAN_FIELDS
        }

        fn values(&self) -> Vec<Value> {
            vec![self.id.to_value(), self.name.to_value()]
        }

        fn constructors() -> Constructors<Self> {
            Constructors::all_fields(&[FieldType::Int64, FieldType::String], |values| {
                let mut values = values.into_iter();
                let id = take_field(&mut values, "id")?;
                let name = take_field(&mut values, "name")?;
                Ok(Orphan { id, name })
            })
        }
    }

    #[test]
    fn test_id_field_without_accessors_is_rejected() {
        let mapper = TypeMapper::new();
        let err = mapper.mapping::<Orphan>().unwrap_err();
        assert!(matches!(err, OrmError::Configuration { .. }));
        assert!(err.to_string().contains("Record::set_id"));
        assert_eq!(mapper.registered_count(), 0);
    }

    #[test]
    fn test_mapping_is_memoized() {
        let mapper = TypeMapper::new();
        let first = mapper.mapping::<Account>().unwrap();
        let second = mapper.mapping::<Account>().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(mapper.registered_count(), 1);
    }

    #[test]
    fn test_concurrent_first_lookup_is_idempotent() {
        let mapper = Arc::new(TypeMapper::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let mapper = Arc::clone(&mapper);
                std::thread::spawn(move || mapper.mapping::<Account>().unwrap().table().to_string())
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), "account");
        }
        assert_eq!(mapper.registered_count(), 1);
    }

    #[test]
    fn test_values_of_filters_id() {
        let mapper = TypeMapper::new();
        let mapping = mapper.mapping::<Account>().unwrap();
        let account = Account {
            id: None,
            owner: "lee".to_string(),
            balance: 2.0,
        };
        let values = mapping.values_of(&account, false).unwrap();
        assert_eq!(values, vec![Value::from("lee"), Value::Float64(2.0)]);
        let all = mapping.values_of(&account, true).unwrap();
        assert_eq!(all[0], Value::Null(FieldType::Int64));
    }

    #[test]
    fn test_construct_rejects_short_row() {
        let mapper = TypeMapper::new();
        let mapping = mapper.mapping::<Account>().unwrap();
        let err = mapping.construct(vec![Value::Int64(1)]).unwrap_err();
        assert!(matches!(err, OrmError::Mapping { .. }));
    }
}
