//! The mapping contract between entity types and relations.
//!
//! An entity type declares its relation once (table, schema, ordered column
//! list) and exposes its attribute values dynamically through
//! [`Model::values`]/[`Model::set_value`]. Everything else (row decoding,
//! dict dumping and loading, CRUD statement generation) is derived from that
//! declaration, so implementing a model is explicit manual registration
//! rather than per-operation boilerplate.

use serde_json::{Map, Value as JsonValue};
use sqlx::postgres::PgRow;

use crate::error::{ActiveError, ActiveResult};
use crate::value::{ColumnType, Value};

/// Key of the metadata block emitted by [`Model::to_map`].
pub const METADATA_KEY: &str = "__metadata__";

/// Declaration of one mapped column.
#[derive(Debug, Clone, Copy)]
pub struct Column {
    pub name: &'static str,
    pub ty: ColumnType,
    /// Part of the primary key.
    pub primary_key: bool,
    /// Filled by a database-side default when inserted as NULL.
    pub server_default: bool,
    /// Rewritten to `now()` by every UPDATE statement.
    pub touch_on_update: bool,
}

impl Column {
    pub const fn new(name: &'static str, ty: ColumnType) -> Self {
        Self {
            name,
            ty,
            primary_key: false,
            server_default: false,
            touch_on_update: false,
        }
    }

    pub const fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub const fn server_default(mut self) -> Self {
        self.server_default = true;
        self
    }

    pub const fn touch_on_update(mut self) -> Self {
        self.touch_on_update = true;
        self
    }
}

/// Quote an identifier for inclusion in a statement.
pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// A mapped entity type.
///
/// Implementors declare the relation (`TABLE`, `SCHEMA`, [`Model::columns`])
/// and wire attribute access ([`Model::values`], [`Model::set_value`]); the
/// provided methods derive row decoding and the dict dump/load protocol.
pub trait Model: Default + Send + Sync + Sized + 'static {
    /// Table name within the schema.
    const TABLE: &'static str;
    /// Schema (namespace) the table lives in.
    const SCHEMA: &'static str = "public";

    /// Ordered column declarations for this relation.
    fn columns() -> &'static [Column];

    /// Ordered (column name, current value) pairs for this instance.
    fn values(&self) -> Vec<(&'static str, Value)>;

    /// Set one attribute by column name. Returns false when the column does
    /// not exist on this mapping (callers ignore unknown keys).
    fn set_value(&mut self, column: &str, value: Value) -> bool;

    /// Short type name used in the metadata block.
    fn model_name() -> &'static str {
        let full = std::any::type_name::<Self>();
        full.rsplit("::").next().unwrap_or(full)
    }

    /// `"schema"."table"` for statement generation.
    fn qualified_table() -> String {
        format!("{}.{}", quote_ident(Self::SCHEMA), quote_ident(Self::TABLE))
    }

    /// The primary-key column declaration.
    fn primary_key_column() -> ActiveResult<&'static Column> {
        Self::columns()
            .iter()
            .find(|c| c.primary_key)
            .ok_or_else(|| {
                ActiveError::configuration(format!(
                    "model {} has no primary key column",
                    Self::model_name()
                ))
            })
    }

    /// Current primary-key value of this instance (Null when unset).
    fn pk_value(&self) -> ActiveResult<Value> {
        let pk = Self::primary_key_column()?;
        Ok(self
            .values()
            .into_iter()
            .find(|(name, _)| *name == pk.name)
            .map_or(Value::Null, |(_, v)| v))
    }

    /// Decode one result row into an entity, column by declared column.
    fn from_row(row: &PgRow) -> ActiveResult<Self> {
        let mut entity = Self::default();
        for column in Self::columns() {
            let value = Value::decode(row, column.name, column.ty)?;
            entity.set_value(column.name, value);
        }
        Ok(entity)
    }

    /// Serialize column-backed attributes to a JSON-representable map.
    ///
    /// With `with_meta`, a `__metadata__` block naming the originating
    /// model/table/schema is included. `fields` restricts output to the
    /// given attribute subset.
    fn to_map(&self, with_meta: bool, fields: Option<&[&str]>) -> Map<String, JsonValue> {
        let mut map = Map::new();
        for (name, value) in self.values() {
            if let Some(fields) = fields {
                if !fields.contains(&name) {
                    continue;
                }
            }
            map.insert(name.to_string(), value.to_json());
        }
        if with_meta {
            let mut meta = Map::new();
            meta.insert(
                "model".to_string(),
                JsonValue::String(Self::model_name().to_string()),
            );
            meta.insert(
                "table".to_string(),
                JsonValue::String(Self::TABLE.to_string()),
            );
            meta.insert(
                "schema".to_string(),
                JsonValue::String(Self::SCHEMA.to_string()),
            );
            map.insert(METADATA_KEY.to_string(), JsonValue::Object(meta));
        }
        map
    }

    /// Alias for [`Model::to_map`], matching the dump side of the dict
    /// round-trip protocol.
    fn dump_model(&self, with_meta: bool, fields: Option<&[&str]>) -> Map<String, JsonValue> {
        self.to_map(with_meta, fields)
    }

    /// Construct a new, detached entity from a map, copying only attributes
    /// that exist on the mapping and ignoring unknown keys (including the
    /// metadata block).
    fn load(map: &Map<String, JsonValue>) -> ActiveResult<Self> {
        let columns = Self::columns();
        if columns.is_empty() {
            return Err(ActiveError::configuration(format!(
                "cannot load model {} without mapped columns",
                Self::model_name()
            )));
        }
        let mut entity = Self::default();
        for (key, json) in map {
            let Some(column) = columns.iter().find(|c| c.name == key) else {
                continue;
            };
            let value = Value::from_json(column.ty, json)?;
            entity.set_value(column.name, value);
        }
        Ok(entity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[derive(Debug, Default, Clone, PartialEq)]
    struct Fruit {
        id: Option<Uuid>,
        name: String,
        weight: Option<i64>,
    }

    impl Model for Fruit {
        const TABLE: &'static str = "fruit";

        fn columns() -> &'static [Column] {
            const COLUMNS: &[Column] = &[
                Column::new("id", ColumnType::Uuid)
                    .primary_key()
                    .server_default(),
                Column::new("name", ColumnType::Text),
                Column::new("weight", ColumnType::Int),
            ];
            COLUMNS
        }

        fn values(&self) -> Vec<(&'static str, Value)> {
            vec![
                ("id", Value::from(self.id)),
                ("name", Value::from(self.name.as_str())),
                ("weight", Value::from(self.weight)),
            ]
        }

        fn set_value(&mut self, column: &str, value: Value) -> bool {
            match column {
                "id" => {
                    if let Value::Uuid(v) = value {
                        self.id = Some(v);
                    } else {
                        self.id = None;
                    }
                }
                "name" => {
                    if let Value::Text(v) = value {
                        self.name = v;
                    }
                }
                "weight" => {
                    if let Value::Int(v) = value {
                        self.weight = Some(v);
                    } else {
                        self.weight = None;
                    }
                }
                _ => return false,
            }
            true
        }
    }

    #[test]
    fn dump_then_load_round_trips_mapped_attributes() {
        let fruit = Fruit {
            id: Some(Uuid::new_v4()),
            name: "kiwi".to_string(),
            weight: Some(90),
        };
        let dumped = fruit.dump_model(false, None);
        let restored = Fruit::load(&dumped).unwrap();
        assert_eq!(restored, fruit);
    }

    #[test]
    fn metadata_block_names_the_relation() {
        let dumped = Fruit::default().to_map(true, None);
        let meta = dumped[METADATA_KEY].as_object().unwrap();
        assert_eq!(meta["model"], "Fruit");
        assert_eq!(meta["table"], "fruit");
        assert_eq!(meta["schema"], "public");
    }

    #[test]
    fn fields_filter_restricts_output() {
        let fruit = Fruit {
            id: None,
            name: "fig".to_string(),
            weight: Some(40),
        };
        let dumped = fruit.to_map(false, Some(&["name"]));
        assert_eq!(dumped.len(), 1);
        assert_eq!(dumped["name"], "fig");
    }

    #[test]
    fn load_ignores_unknown_keys_and_metadata() {
        let fruit = Fruit {
            id: None,
            name: "plum".to_string(),
            weight: None,
        };
        let mut dumped = fruit.to_map(true, None);
        dumped.insert("flavor".to_string(), JsonValue::String("sweet".into()));
        let restored = Fruit::load(&dumped).unwrap();
        assert_eq!(restored, fruit);
    }

    #[test]
    fn qualified_table_quotes_identifiers() {
        assert_eq!(Fruit::qualified_table(), "\"public\".\"fruit\"");
    }

    #[test]
    fn primary_key_column_is_found() {
        assert_eq!(Fruit::primary_key_column().unwrap().name, "id");
    }
}
