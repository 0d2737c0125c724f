//! Per-type accessor tables
//!
//! Each mapped type builds one [`AccessorTable`] of typed getter/setter
//! closures, once, when first asked for it. Field access during
//! materialization and serialization is a hash lookup plus a closure call.

use indexmap::IndexMap;

use super::Mapped;
use crate::error::AccessError;
use crate::value::{FromValue, IntoValue, Record, Value};

type Getter<T> = Box<dyn Fn(&T) -> Value + Send + Sync>;
type Setter<T> = Box<dyn Fn(&mut T, Value) -> Result<(), AccessError> + Send + Sync>;

/// Getter/setter pair for one field
pub struct FieldAccessor<T> {
	get: Getter<T>,
	set: Setter<T>,
}

impl<T> FieldAccessor<T> {
	pub fn get(&self, target: &T) -> Value {
		(self.get)(target)
	}

	pub fn set(&self, target: &mut T, value: Value) -> Result<(), AccessError> {
		(self.set)(target, value)
	}
}

/// Field accessors of a mapped type, keyed by field name
pub struct AccessorTable<T> {
	owner: &'static str,
	fields: IndexMap<String, FieldAccessor<T>>,
}

impl<T: 'static> AccessorTable<T> {
	/// Start a table for the type named `owner`
	///
	/// # Example
	///
	/// ```rust
	/// use reinhardt_polyglot::entity::AccessorTable;
	///
	/// #[derive(Default)]
	/// struct User {
	///     key: String,
	///     birth_date: i32,
	/// }
	///
	/// let table = AccessorTable::<User>::builder("User")
	///     .field("key", |u| u.key.clone(), |u, v| u.key = v)
	///     .field("birth_date", |u| u.birth_date, |u, v| u.birth_date = v)
	///     .build();
	/// assert!(table.contains("birth_date"));
	/// ```
	pub fn builder(owner: &'static str) -> AccessorTableBuilder<T> {
		AccessorTableBuilder {
			table: AccessorTable {
				owner,
				fields: IndexMap::new(),
			},
		}
	}

	pub fn owner(&self) -> &'static str {
		self.owner
	}

	pub fn contains(&self, field: &str) -> bool {
		self.fields.contains_key(field)
	}

	/// Field names in registration order
	pub fn field_names(&self) -> impl Iterator<Item = &str> {
		self.fields.keys().map(String::as_str)
	}

	fn accessor(&self, field: &str) -> Result<&FieldAccessor<T>, AccessError> {
		self.fields.get(field).ok_or_else(|| AccessError::NoAccessor {
			owner: self.owner.to_string(),
			field: field.to_string(),
		})
	}

	/// Read `field` from `target`
	pub fn get(&self, target: &T, field: &str) -> Result<Value, AccessError> {
		Ok(self.accessor(field)?.get(target))
	}

	/// Write `value` into `field` of `target`
	pub fn set(&self, target: &mut T, field: &str, value: Value) -> Result<(), AccessError> {
		self.accessor(field)?
			.set(target, value)
			.map_err(|err| err.for_field(field))
	}
}

/// Builder for [`AccessorTable`]
pub struct AccessorTableBuilder<T> {
	table: AccessorTable<T>,
}

impl<T: 'static> AccessorTableBuilder<T> {
	/// Register a scalar, collection or map field
	pub fn field<F>(mut self, name: &str, get: fn(&T) -> F, set: fn(&mut T, F)) -> Self
	where
		F: IntoValue + FromValue + 'static,
	{
		self.table.fields.insert(
			name.to_string(),
			FieldAccessor {
				get: Box::new(move |target| get(target).into_value()),
				set: Box::new(move |target, value| {
					set(target, F::from_value(value)?);
					Ok(())
				}),
			},
		);
		self
	}

	/// Register a single embedded field of embeddable type `M`
	///
	/// The field travels as a [`Value::Record`] keyed by the embeddable's field
	/// names. A null value leaves the field untouched.
	pub fn embedded<M: Mapped>(mut self, name: &str, get: fn(&T) -> M, set: fn(&mut T, M)) -> Self {
		self.table.fields.insert(
			name.to_string(),
			FieldAccessor {
				get: Box::new(move |target| Value::Record(to_record(&get(target)))),
				set: Box::new(move |target, value| match value {
					Value::Null => Ok(()),
					Value::Record(record) => {
						set(target, from_record::<M>(record)?);
						Ok(())
					}
					other => Err(AccessError::TypeMismatch {
						field: String::new(),
						expected: M::NAME.to_string(),
						found: other.type_name().to_string(),
					}),
				}),
			},
		);
		self
	}

	/// Register a collection of embedded values of embeddable type `M`
	///
	/// The field travels as a [`Value::List`] of [`Value::Record`]s.
	pub fn embedded_collection<M: Mapped>(
		mut self,
		name: &str,
		get: fn(&T) -> Vec<M>,
		set: fn(&mut T, Vec<M>),
	) -> Self {
		self.table.fields.insert(
			name.to_string(),
			FieldAccessor {
				get: Box::new(move |target| {
					Value::List(
						get(target)
							.iter()
							.map(|item| Value::Record(to_record(item)))
							.collect(),
					)
				}),
				set: Box::new(move |target, value| match value {
					Value::Null => Ok(()),
					Value::List(items) | Value::Set(items) => {
						let mut collection = Vec::with_capacity(items.len());
						for item in items {
							match item {
								Value::Record(record) => collection.push(from_record::<M>(record)?),
								other => {
									return Err(AccessError::TypeMismatch {
										field: String::new(),
										expected: M::NAME.to_string(),
										found: other.type_name().to_string(),
									});
								}
							}
						}
						set(target, collection);
						Ok(())
					}
					other => Err(AccessError::TypeMismatch {
						field: String::new(),
						expected: format!("list of {}", M::NAME),
						found: other.type_name().to_string(),
					}),
				}),
			},
		);
		self
	}

	pub fn build(self) -> AccessorTable<T> {
		self.table
	}
}

/// Read every registered field of `value` into a record
pub fn to_record<M: Mapped>(value: &M) -> Record {
	let table = M::accessors();
	table
		.fields
		.iter()
		.map(|(name, accessor)| (name.clone(), accessor.get(value)))
		.collect()
}

/// Build an `M` from a record keyed by field name
///
/// Fields missing from the record keep their default value.
pub fn from_record<M: Mapped>(record: Record) -> Result<M, AccessError> {
	let table = M::accessors();
	let mut value = M::instantiate()?;
	for (field, item) in record {
		table.set(&mut value, &field, item)?;
	}
	Ok(value)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::entity::Embeddable;
	use rstest::rstest;
	use std::sync::OnceLock;

	#[derive(Debug, Default, Clone, PartialEq)]
	struct Phone {
		kind: String,
		number: String,
	}

	impl Mapped for Phone {
		const NAME: &'static str = "Phone";

		fn accessors() -> &'static AccessorTable<Self> {
			static TABLE: OnceLock<AccessorTable<Phone>> = OnceLock::new();
			TABLE.get_or_init(|| {
				AccessorTable::<Self>::builder(Self::NAME)
					.field("kind", |p| p.kind.clone(), |p, v| p.kind = v)
					.field("number", |p| p.number.clone(), |p, v| p.number = v)
					.build()
			})
		}
	}

	impl Embeddable for Phone {}

	#[derive(Debug, Default)]
	struct Contact {
		name: String,
		age: Option<i32>,
		phones: Vec<Phone>,
	}

	fn contact_table() -> AccessorTable<Contact> {
		AccessorTable::<Contact>::builder("Contact")
			.field("name", |c| c.name.clone(), |c, v| c.name = v)
			.field("age", |c| c.age, |c, v| c.age = v)
			.embedded_collection("phones", |c| c.phones.clone(), |c, v| c.phones = v)
			.build()
	}

	#[rstest]
	fn test_get_and_set_scalars() {
		let table = contact_table();
		let mut contact = Contact::default();

		table.set(&mut contact, "name", Value::from("Brandon")).unwrap();
		table.set(&mut contact, "age", Value::Int(48)).unwrap();

		assert_eq!(table.get(&contact, "name").unwrap(), Value::from("Brandon"));
		assert_eq!(contact.age, Some(48));
	}

	#[rstest]
	fn test_set_reports_field_on_mismatch() {
		let table = contact_table();
		let mut contact = Contact::default();

		let err = table.set(&mut contact, "age", Value::from("old")).unwrap_err();
		assert!(matches!(err, AccessError::TypeMismatch { field, .. } if field == "age"));
	}

	#[rstest]
	fn test_unknown_field_is_no_accessor() {
		let table = contact_table();
		assert_eq!(
			table.get(&Contact::default(), "email").unwrap_err(),
			AccessError::NoAccessor {
				owner: "Contact".to_string(),
				field: "email".to_string(),
			}
		);
	}

	#[rstest]
	fn test_embedded_collection_travels_as_records() {
		let table = contact_table();
		let mut contact = Contact::default();
		contact.phones.push(Phone {
			kind: "home".to_string(),
			number: "555".to_string(),
		});

		let value = table.get(&contact, "phones").unwrap();
		let mut copy = Contact::default();
		table.set(&mut copy, "phones", value).unwrap();

		assert_eq!(copy.phones, contact.phones);
	}

	#[rstest]
	fn test_from_record_keeps_defaults_for_missing_fields() {
		let mut record = Record::new();
		record.insert("kind".to_string(), Value::from("work"));

		let phone: Phone = from_record(record).unwrap();
		assert_eq!(phone.kind, "work");
		assert_eq!(phone.number, "");
	}
}
