//! The `backup_dynamodb_tables` data source.

use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::debug;

use super::ResourceContext;
use crate::client::BackupApi;
use crate::error::ProviderError;
use crate::schema::{Attribute, Block, NestedBlock, Schema};
use crate::validation::ensure_valid;

/// Data source type name.
pub const DATA_SOURCE_TYPE: &str = "backup_dynamodb_tables";

/// Query arguments of the data source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TablesQuery {
    /// AWS account id to match exactly.
    #[serde(default)]
    pub account_native_id: Option<String>,
    /// AWS region to match exactly.
    #[serde(default)]
    pub aws_region: Option<String>,
    /// Substring of the table name.
    #[serde(default)]
    pub name: Option<String>,
    /// AWS table id to match exactly.
    #[serde(default)]
    pub table_native_id: Option<String>,
}

impl TablesQuery {
    /// Build the backend filter string from the fields that are set.
    ///
    /// ```
    /// use backup_provider::resources::dynamodb_tables::TablesQuery;
    ///
    /// let query = TablesQuery {
    ///     name: Some("orders".to_string()),
    ///     ..Default::default()
    /// };
    /// assert_eq!(query.filter(), r#"{"name":{"$contains":"orders"}}"#);
    /// ```
    pub fn filter(&self) -> String {
        let mut filter = Map::new();
        let exact = [
            ("account_native_id", &self.account_native_id),
            ("aws_region", &self.aws_region),
            ("table_native_id", &self.table_native_id),
        ];
        for (key, value) in exact {
            if let Some(v) = value {
                filter.insert(key.to_string(), json!({ "$eq": v }));
            }
        }
        if let Some(name) = &self.name {
            filter.insert("name".to_string(), json!({ "$contains": name }));
        }
        Value::Object(filter).to_string()
    }
}

/// Schema of the `backup_dynamodb_tables` data source.
pub fn schema() -> Schema {
    let table = Block::new()
        .with_attribute("id", Attribute::computed_string())
        .with_attribute("name", Attribute::computed_string())
        .with_attribute("table_native_id", Attribute::computed_string())
        .with_attribute("account_native_id", Attribute::computed_string())
        .with_attribute("aws_region", Attribute::computed_string());

    Schema::new()
        .with_attribute("account_native_id", Attribute::optional_string())
        .with_attribute("aws_region", Attribute::optional_string())
        .with_attribute(
            "name",
            Attribute::optional_string()
                .with_description("Matches tables whose name contains this value"),
        )
        .with_attribute("table_native_id", Attribute::optional_string())
        .with_block("tables", NestedBlock::list(table))
}

/// List matching tables.
///
/// Returns the query arguments with a `tables` list attached.
pub async fn read<A: BackupApi>(
    ctx: &ResourceContext<A>,
    config: &Value,
) -> Result<Value, ProviderError> {
    ensure_valid(&schema(), config)?;
    let query: TablesQuery = if config.is_null() {
        TablesQuery::default()
    } else {
        serde_json::from_value(config.clone())?
    };

    let filter = query.filter();
    debug!(%filter, "Listing DynamoDB tables");
    let tables = ctx.api().list_dynamodb_tables(&filter).await?;

    let mut state = match config {
        Value::Object(map) => map.clone(),
        _ => Map::new(),
    };
    state.insert("tables".to_string(), serde_json::to_value(tables)?);
    Ok(Value::Object(state))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_filter() {
        assert_eq!(TablesQuery::default().filter(), "{}");
    }

    #[test]
    fn test_filter_operators() {
        let query = TablesQuery {
            account_native_id: Some("123456789012".to_string()),
            aws_region: Some("us-west-2".to_string()),
            name: Some("orders".to_string()),
            table_native_id: None,
        };
        let filter: Value = serde_json::from_str(&query.filter()).unwrap();
        assert_eq!(
            filter,
            json!({
                "account_native_id": {"$eq": "123456789012"},
                "aws_region": {"$eq": "us-west-2"},
                "name": {"$contains": "orders"}
            })
        );
    }

    #[test]
    fn test_query_ignores_computed_tables() {
        let query: TablesQuery = serde_json::from_value(json!({
            "aws_region": "eu-central-1",
            "tables": []
        }))
        .unwrap();
        assert_eq!(query.aws_region.as_deref(), Some("eu-central-1"));
    }
}
