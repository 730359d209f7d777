//! Mapping between Rust types and table rows.
//!
//! A [`Model`] describes its columns once as a list of [`Property`] records; the description is
//! registered per type and shared as a [`TableInfo`]. Each instance carries a [`Record`] holding
//! its current values and the set of properties changed since it was loaded or last reset.
//!
//! ```
//! use dbrunner::orm::{self, Model, Property, Record, TableInfo};
//!
//! struct Book {
//!     record: Record,
//! }
//!
//! impl Model for Book {
//!     fn describe(table: TableInfo) -> TableInfo {
//!         table
//!             .named("book")
//!             .property(Property::new("id").primary())
//!             .property(Property::new("title").column("name"))
//!     }
//!
//!     fn record(&self) -> &Record {
//!         &self.record
//!     }
//!
//!     fn record_mut(&mut self) -> &mut Record {
//!         &mut self.record
//!     }
//! }
//!
//! let mut book = Book { record: Record::new::<Book>() };
//! book.record_mut().set("title", "Dune")?;
//!
//! let info = orm::table_info::<Book>();
//! assert_eq!(info.table(), Some("book"));
//! assert_eq!(orm::object_info(&book).changed(), vec![info.attribute("title").unwrap()]);
//! # Ok::<(), dbrunner::Error>(())
//! ```

use crate::error::{Error, Result};
use crate::value::Value;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::any::TypeId;
use std::collections::{BTreeSet, HashMap};
use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;

type Conversion = Arc<dyn Fn(Value) -> Value + Send + Sync>;
type DefaultFactory = Arc<dyn Fn() -> Value + Send + Sync>;

/// Metadata for one mapped attribute.
#[derive(Clone)]
pub struct Property {
    attr_name: String,
    column_name: String,
    primary: bool,
    default: Option<DefaultFactory>,
    to_database: Option<Conversion>,
    from_database: Option<Conversion>,
}

impl Property {
    /// A property stored in the column of the same name.
    pub fn new(attr_name: impl Into<String>) -> Self {
        let attr_name = attr_name.into();

        Self {
            column_name: attr_name.clone(),
            attr_name,
            primary: false,
            default: None,
            to_database: None,
            from_database: None,
        }
    }

    /// Store this property in `column_name` instead.
    pub fn column(mut self, column_name: impl Into<String>) -> Self {
        self.column_name = column_name.into();
        self
    }

    /// Mark this property as (part of) the primary key.
    pub fn primary(mut self) -> Self {
        self.primary = true;
        self
    }

    /// Give new records a value produced by `factory`.
    pub fn default_with<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        self.default = Some(Arc::new(factory));
        self
    }

    /// Convert values on their way to the database.
    pub fn to_database<F>(mut self, convert: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        self.to_database = Some(Arc::new(convert));
        self
    }

    /// Convert values on their way from the database.
    pub fn from_database<F>(mut self, convert: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        self.from_database = Some(Arc::new(convert));
        self
    }

    pub fn attr_name(&self) -> &str {
        &self.attr_name
    }

    pub fn column_name(&self) -> &str {
        &self.column_name
    }

    pub fn is_primary(&self) -> bool {
        self.primary
    }

    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }
}

impl PartialEq for Property {
    fn eq(&self, other: &Self) -> bool {
        self.attr_name == other.attr_name
            && self.column_name == other.column_name
            && self.primary == other.primary
    }
}

impl Debug for Property {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Property")
            .field("attr_name", &self.attr_name)
            .field("column_name", &self.column_name)
            .field("primary", &self.primary)
            .finish()
    }
}

/// The mapping of one [`Model`] type: its table and its properties in declaration order.
#[derive(Debug, Clone, Default)]
pub struct TableInfo {
    table: Option<String>,
    properties: Vec<Property>,
}

impl TableInfo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the table name.
    pub fn named(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    /// Declare a property. A later declaration with the same attribute name replaces the earlier.
    pub fn property(mut self, property: Property) -> Self {
        match self.properties.iter_mut().find(|p| p.attr_name == property.attr_name) {
            Some(existing) => *existing = property,
            None => self.properties.push(property),
        }
        self
    }

    pub fn table(&self) -> Option<&str> {
        self.table.as_deref()
    }

    /// All properties, in declaration order.
    pub fn properties(&self) -> &[Property] {
        &self.properties
    }

    pub fn attribute(&self, attr_name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.attr_name == attr_name)
    }

    /// Every property stored in `column_name`.
    pub fn column(&self, column_name: &str) -> Vec<&Property> {
        self.properties.iter().filter(|p| p.column_name == column_name).collect()
    }

    /// The primary key properties, in declaration order.
    pub fn primaries(&self) -> Vec<&Property> {
        self.properties.iter().filter(|p| p.primary).collect()
    }

    fn position(&self, attr_name: &str) -> Result<usize> {
        self.properties
            .iter()
            .position(|p| p.attr_name == attr_name)
            .ok_or_else(|| Error::UnknownProperty(attr_name.to_owned()))
    }
}

/// A type whose instances map to rows of a table.
pub trait Model: 'static {
    /// Declare the table and properties of this type. Called once per type.
    fn describe(table: TableInfo) -> TableInfo;

    fn record(&self) -> &Record;

    fn record_mut(&mut self) -> &mut Record;
}

static REGISTRY: Lazy<RwLock<HashMap<TypeId, Arc<TableInfo>>>> = Lazy::new(Default::default);

/// The registered mapping of `M`.
pub fn table_info<M: Model>() -> Arc<TableInfo> {
    let key = TypeId::of::<M>();

    if let Some(info) = REGISTRY.read().get(&key) {
        return Arc::clone(info);
    }

    // described outside the lock; `describe` may look up other models
    let described = Arc::new(M::describe(TableInfo::new()));

    Arc::clone(REGISTRY.write().entry(key).or_insert(described))
}

/// The per-instance state of `obj`.
pub fn object_info<M: Model>(obj: &M) -> &Record {
    obj.record()
}

/// Current values of one mapped instance and which of them changed.
#[derive(Clone)]
pub struct Record {
    info: Arc<TableInfo>,
    values: Vec<Value>,
    changed: BTreeSet<usize>,
}

impl Record {
    /// A fresh record for `M`. Properties with a default start out with it, marked changed.
    pub fn new<M: Model>() -> Self {
        Self::with_info(table_info::<M>())
    }

    pub fn with_info(info: Arc<TableInfo>) -> Self {
        let mut values = Vec::with_capacity(info.properties.len());
        let mut changed = BTreeSet::new();

        for (idx, property) in info.properties.iter().enumerate() {
            match &property.default {
                Some(factory) => {
                    values.push(factory());
                    changed.insert(idx);
                }
                None => values.push(Value::Null),
            }
        }

        Self { info, values, changed }
    }

    pub fn info(&self) -> &TableInfo {
        &self.info
    }

    /// The current value of `attr_name`; `Null` if never set and without a default.
    pub fn value_for(&self, attr_name: &str) -> Result<&Value> {
        let idx = self.info.position(attr_name)?;
        Ok(&self.values[idx])
    }

    /// Assign a value and mark the property changed.
    pub fn set(&mut self, attr_name: &str, value: impl Into<Value>) -> Result<()> {
        let idx = self.info.position(attr_name)?;
        self.values[idx] = value.into();
        self.changed.insert(idx);
        Ok(())
    }

    /// Assign a value read from the database. The property is not considered changed.
    pub fn load(&mut self, attr_name: &str, value: Value) -> Result<()> {
        let idx = self.info.position(attr_name)?;

        self.values[idx] = match &self.info.properties[idx].from_database {
            Some(convert) => convert(value),
            None => value,
        };
        self.changed.remove(&idx);

        Ok(())
    }

    /// The current value of `attr_name`, converted for the database.
    pub fn to_database(&self, attr_name: &str) -> Result<Value> {
        let idx = self.info.position(attr_name)?;
        let value = self.values[idx].clone();

        Ok(match &self.info.properties[idx].to_database {
            Some(convert) => convert(value),
            None => value,
        })
    }

    /// Properties changed since the record was created, loaded or reset, in declaration order.
    pub fn changed(&self) -> Vec<&Property> {
        self.changed.iter().map(|&idx| &self.info.properties[idx]).collect()
    }

    pub fn reset_changed(&mut self) {
        self.changed.clear();
    }
}

impl Debug for Record {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (property, value) in self.info.properties.iter().zip(&self.values) {
            map.entry(&property.attr_name, value);
        }
        map.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    macro_rules! model {
        ($name:ident, $describe:expr) => {
            struct $name {
                record: Record,
            }

            impl $name {
                fn new() -> Self {
                    Self { record: Record::new::<$name>() }
                }
            }

            impl Model for $name {
                fn describe(table: TableInfo) -> TableInfo {
                    ($describe)(table)
                }

                fn record(&self) -> &Record {
                    &self.record
                }

                fn record_mut(&mut self) -> &mut Record {
                    &mut self.record
                }
            }
        };
    }

    #[test]
    fn column_defaults_to_attribute_name() {
        model!(Foo, |t: TableInfo| t
            .property(Property::new("hey").column("foo"))
            .property(Property::new("how")));

        let info = table_info::<Foo>();
        let hey = info.attribute("hey").unwrap();
        let how = info.attribute("how").unwrap();

        assert_eq!((hey.attr_name(), hey.column_name()), ("hey", "foo"));
        assert_eq!((how.attr_name(), how.column_name()), ("how", "how"));
        assert_eq!(info.column("foo"), vec![hey]);
        assert!(info.column("hey").is_empty());
        assert_eq!(info.table(), None);
    }

    #[test]
    fn values_start_null_and_can_be_assigned() {
        model!(Foo, |t: TableInfo| t.property(Property::new("a").column("joe")).property(Property::new("b")));

        let mut foo = Foo::new();
        assert_eq!(foo.record().value_for("a").unwrap(), &Value::Null);

        foo.record_mut().set("a", 12).unwrap();
        foo.record_mut().set("b", "hello").unwrap();

        assert_eq!(foo.record().value_for("a").unwrap(), &Value::Integer(12));
        assert_eq!(foo.record().value_for("b").unwrap(), &Value::from("hello"));
    }

    #[test]
    fn conversions_apply_in_each_direction() {
        fn suffixed(suffix: &'static str) -> impl Fn(Value) -> Value {
            move |v| Value::Text(format!("{}{}", v.as_str().unwrap_or_default(), suffix))
        }

        model!(Foo, |t: TableInfo| t.property(
            Property::new("a").to_database(suffixed("db")).from_database(suffixed("rust"))
        ));

        let mut foo = Foo::new();
        foo.record_mut().set("a", "a").unwrap();
        assert_eq!(foo.record().to_database("a").unwrap(), Value::from("adb"));
        assert_eq!(foo.record().value_for("a").unwrap(), &Value::from("a"));

        foo.record_mut().load("a", Value::from("something")).unwrap();
        assert_eq!(foo.record().value_for("a").unwrap(), &Value::from("somethingrust"));
    }

    #[test]
    fn loaded_values_are_not_changed() {
        model!(Foo, |t: TableInfo| t.property(Property::new("a")).property(Property::new("b")));

        let mut foo = Foo::new();
        foo.record_mut().set("a", "something").unwrap();
        foo.record_mut().load("b", Value::from("something")).unwrap();

        let info = table_info::<Foo>();
        assert_eq!(object_info(&foo).changed(), vec![info.attribute("a").unwrap()]);
    }

    #[test]
    fn changed_tracks_assignments_until_reset() {
        model!(Foo, |t: TableInfo| t.property(Property::new("a").column("foo")).property(Property::new("b")));

        let info = table_info::<Foo>();
        let (a, b) = (info.attribute("a").unwrap(), info.attribute("b").unwrap());

        let mut foo = Foo::new();
        assert!(object_info(&foo).changed().is_empty());

        foo.record_mut().set("a", "something").unwrap();
        assert_eq!(object_info(&foo).changed(), vec![a]);

        foo.record_mut().set("b", "another").unwrap();
        assert_eq!(object_info(&foo).changed(), vec![a, b]);

        foo.record_mut().reset_changed();
        assert!(object_info(&foo).changed().is_empty());

        foo.record_mut().set("b", "hey").unwrap();
        assert_eq!(object_info(&foo).changed(), vec![b]);
    }

    #[test]
    fn defaults_are_values_and_count_as_changed() {
        model!(Foo, |t: TableInfo| t
            .property(Property::new("a"))
            .property(Property::new("c").default_with(|| Value::Integer(10))));

        let foo = Foo::new();
        let info = table_info::<Foo>();

        assert_eq!(foo.record().value_for("a").unwrap(), &Value::Null);
        assert_eq!(foo.record().value_for("c").unwrap(), &Value::Integer(10));
        assert_eq!(object_info(&foo).changed(), vec![info.attribute("c").unwrap()]);
    }

    #[test]
    fn primaries_in_declaration_order() {
        model!(Foo, |t: TableInfo| t
            .property(Property::new("a").primary())
            .property(Property::new("b").primary())
            .property(Property::new("c"))
            .property(Property::new("d").primary()));

        let info = table_info::<Foo>();
        let names: Vec<_> = info.primaries().iter().map(|p| p.attr_name()).collect();

        assert_eq!(names, ["a", "b", "d"]);
    }

    #[test]
    fn table_name_is_recorded() {
        model!(Foo, |t: TableInfo| t.named("foo"));

        assert_eq!(table_info::<Foo>().table(), Some("foo"));
    }

    #[test]
    fn each_type_gets_its_own_mapping() {
        model!(Foo, |t: TableInfo| t.property(Property::new("a")));
        model!(Bar, |t: TableInfo| t.property(Property::new("c")).property(Property::new("a")));

        assert_eq!(table_info::<Foo>().properties().len(), 1);
        assert_eq!(table_info::<Bar>().properties().len(), 2);
        assert!(Arc::ptr_eq(&table_info::<Bar>(), &table_info::<Bar>()));
    }

    #[test]
    fn unknown_property_is_an_error() {
        model!(Foo, |t: TableInfo| t.property(Property::new("a")));

        let mut foo = Foo::new();
        let err = foo.record_mut().set("nope", 1).unwrap_err();

        assert!(matches!(err, Error::UnknownProperty(name) if name == "nope"));
    }
}
