//! Record registration macros.
//!
//! `impl_record!` expands a field list into a [`Record`](crate::mapping::Record)
//! implementation with an all-fields constructor, so no reflection is needed at runtime.
//! The field list must name every field of the struct, in declaration order.

/// Implement [`Record`](crate::mapping::Record) for a struct.
///
/// # Example
///
/// ```ignore
/// struct Person {
///     id: Option<i64>,
///     name: String,
///     age: i32,
/// }
///
/// impl_record!(Person in "people" {
///     id: Option<i64>,
///     name: String,
///     age: i32,
/// });
/// ```
///
/// The table name defaults to the lower-cased type name when `in "table"` is omitted.
/// A leading `id: Option<i64>` field becomes the generated primary key. An `id` field
/// anywhere else, or of another type, fails to compile.
#[macro_export]
macro_rules! impl_record {
    ($ty:ident $(in $table:literal)? { id: Option<i64> $(, $field:ident : $fty:ty)* $(,)? }) => {
        impl $crate::mapping::Record for $ty {
            const HAS_ID_ACCESSORS: bool = true;

            fn fields() -> &'static [$crate::mapping::FieldDef] {
                static FIELDS: &[$crate::mapping::FieldDef] = &[
                    $crate::mapping::FieldDef::of::<Option<i64>>($crate::mapping::ID_FIELD),
                    $($crate::mapping::FieldDef::of::<$fty>(stringify!($field)),)*
                ];
                FIELDS
            }

            $(
                fn table_name() -> ::std::borrow::Cow<'static, str> {
                    ::std::borrow::Cow::Borrowed($table)
                }
            )?

            fn values(&self) -> Vec<$crate::mapping::Value> {
                vec![
                    $crate::mapping::SqlValue::to_value(&self.id),
                    $($crate::mapping::SqlValue::to_value(&self.$field),)*
                ]
            }

            fn id(&self) -> Option<i64> {
                self.id
            }

            fn set_id(&mut self, id: i64) {
                self.id = Some(id);
            }

            fn constructors() -> $crate::mapping::Constructors<Self> {
                const PARAMS: &[$crate::mapping::FieldType] = &[
                    $crate::mapping::FieldType::Int64,
                    $(<$fty as $crate::mapping::SqlValue>::FIELD_TYPE,)*
                ];
                $crate::mapping::Constructors::all_fields(PARAMS, |values| {
                    let mut values = values.into_iter();
                    Ok($ty {
                        id: $crate::mapping::take_field(&mut values, $crate::mapping::ID_FIELD)?,
                        $($field: $crate::mapping::take_field(&mut values, stringify!($field))?,)*
                    })
                })
            }
        }
    };

    ($ty:ident $(in $table:literal)? { $($field:ident : $fty:ty),* $(,)? }) => {
        const _: () = {
            $(
                if $crate::mapping::record::is_id_name(stringify!($field)) {
                    panic!("impl_record!: the id field must come first, declared as `id: Option<i64>`");
                }
            )*
        };

        impl $crate::mapping::Record for $ty {
            fn fields() -> &'static [$crate::mapping::FieldDef] {
                static FIELDS: &[$crate::mapping::FieldDef] = &[
                    $($crate::mapping::FieldDef::of::<$fty>(stringify!($field)),)*
                ];
                FIELDS
            }

            $(
                fn table_name() -> ::std::borrow::Cow<'static, str> {
                    ::std::borrow::Cow::Borrowed($table)
                }
            )?

            fn values(&self) -> Vec<$crate::mapping::Value> {
                vec![$($crate::mapping::SqlValue::to_value(&self.$field),)*]
            }

            fn constructors() -> $crate::mapping::Constructors<Self> {
                const PARAMS: &[$crate::mapping::FieldType] = &[
                    $(<$fty as $crate::mapping::SqlValue>::FIELD_TYPE,)*
                ];
                $crate::mapping::Constructors::all_fields(PARAMS, |values| {
                    let mut values = values.into_iter();
                    Ok($ty {
                        $($field: $crate::mapping::take_field(&mut values, stringify!($field))?,)*
                    })
                })
            }
        }
    };
}

/// Build a positional argument list for a trailing clause.
///
/// ```ignore
/// db.read_all::<Person>("WHERE age > ? AND name <> ?", args![30, "root"]).await?;
/// ```
#[macro_export]
macro_rules! args {
    () => {
        ::std::vec::Vec::<$crate::mapping::Value>::new()
    };
    ($($arg:expr),+ $(,)?) => {
        vec![$($crate::mapping::Value::from($arg)),+]
    };
}
