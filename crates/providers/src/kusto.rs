//! Kusto (Azure Data Explorer) schema source.
//!
//! Reads table schemas for the database named in the KQL expert bot's
//! `config` representation:
//!
//! 1. AAD client-credential token for `<cluster>/.default`
//! 2. `.show tables` over the v1 REST management endpoint
//! 3. `.show table ['<name>'] cslschema` per table
//!
//! The result is rendered one table per line as `Table: col:type, ...`.

use async_trait::async_trait;
use docforge_core::datasource::DataSource;
use docforge_core::error::{Error, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Fetches table schemas from a Kusto cluster.
pub struct KustoSchemaSource {
    login_base: String,
    client: reqwest::Client,
}

/// Connection settings pulled out of the config representation.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Connection {
    cluster: String,
    database: String,
    tenant: String,
    client_id: String,
    client_secret: String,
}

impl Connection {
    fn from_config(config: &serde_json::Map<String, serde_json::Value>) -> Result<Self> {
        let field = |key: &str| -> Result<String> {
            config
                .get(key)
                .and_then(|v| v.as_str())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(String::from)
                .ok_or_else(|| Error::DataSource(format!("config is missing {key}")))
        };

        Ok(Self {
            cluster: field("KUSTO_CLUSTER_URL")?.trim_end_matches('/').to_string(),
            database: field("KUSTO_DATABASE_NAME")?,
            tenant: field("TENANT_ID")?,
            client_id: field("SERVICE_CLIENT_ID")?,
            client_secret: field("SERVICE_CLIENT_SECRET")?,
        })
    }
}

impl KustoSchemaSource {
    pub fn new() -> Self {
        Self::with_login_base("https://login.microsoftonline.com")
    }

    /// Use a different AAD authority host (sovereign clouds, tests).
    pub fn with_login_base(login_base: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            login_base: login_base.into().trim_end_matches('/').to_string(),
            client,
        }
    }

    async fn access_token(&self, conn: &Connection) -> Result<String> {
        let url = format!("{}/{}/oauth2/v2.0/token", self.login_base, conn.tenant);
        let scope = format!("{}/.default", conn.cluster);
        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", conn.client_id.as_str()),
            ("client_secret", conn.client_secret.as_str()),
            ("scope", scope.as_str()),
        ];

        let response = self
            .client
            .post(&url)
            .form(&form)
            .send()
            .await
            .map_err(|e| Error::DataSource(format!("token request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::DataSource(format!(
                "token request rejected ({status}): {body}"
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| Error::DataSource(format!("invalid token response: {e}")))?;
        Ok(token.access_token)
    }

    async fn management(&self, conn: &Connection, token: &str, csl: &str) -> Result<serde_json::Value> {
        let url = format!("{}/v1/rest/mgmt", conn.cluster);
        debug!(cluster = %conn.cluster, database = %conn.database, csl, "Kusto management command");

        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(&serde_json::json!({ "db": conn.database, "csl": csl }))
            .send()
            .await
            .map_err(|e| Error::DataSource(format!("management command failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::DataSource(format!(
                "management command '{csl}' rejected ({status}): {body}"
            )));
        }

        response
            .json()
            .await
            .map_err(|e| Error::DataSource(format!("invalid management response: {e}")))
    }
}

impl Default for KustoSchemaSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DataSource for KustoSchemaSource {
    fn name(&self) -> &str {
        "kusto"
    }

    async fn refresh(&self, config: &serde_json::Map<String, serde_json::Value>) -> Result<String> {
        let conn = Connection::from_config(config)?;
        let token = self.access_token(&conn).await?;

        let tables = column_values(
            &self.management(&conn, &token, ".show tables").await?,
            "TableName",
        )?;
        info!(count = tables.len(), database = %conn.database, "Kusto tables loaded");

        let mut schemas = BTreeMap::new();
        for table in tables {
            let csl = format!(".show table ['{}'] cslschema", table.replace('\'', "\\'"));
            let response = self.management(&conn, &token, &csl).await?;
            if let Some(schema) = column_values(&response, "Schema")?.into_iter().next() {
                schemas.insert(table, schema);
            }
        }

        Ok(render_schema(&schemas))
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Values of `column` in the primary (first) result table of a v1 response.
fn column_values(response: &serde_json::Value, column: &str) -> Result<Vec<String>> {
    let table = response["Tables"]
        .get(0)
        .ok_or_else(|| Error::DataSource("response has no result tables".into()))?;

    let index = table["Columns"]
        .as_array()
        .and_then(|cols| {
            cols.iter()
                .position(|c| c["ColumnName"].as_str() == Some(column))
        })
        .ok_or_else(|| Error::DataSource(format!("result has no '{column}' column")))?;

    Ok(table["Rows"]
        .as_array()
        .map(|rows| {
            rows.iter()
                .filter_map(|row| row.get(index).and_then(|v| v.as_str()).map(String::from))
                .collect()
        })
        .unwrap_or_default())
}

fn render_schema(schemas: &BTreeMap<String, String>) -> String {
    schemas
        .iter()
        .map(|(table, schema)| format!("{table}: {schema}"))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(pairs: &[(&str, &str)]) -> serde_json::Map<String, serde_json::Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), serde_json::json!(v)))
            .collect()
    }

    #[test]
    fn connection_requires_every_key() {
        let partial = config(&[("KUSTO_CLUSTER_URL", "https://c.kusto.windows.net")]);
        assert!(matches!(
            Connection::from_config(&partial),
            Err(Error::DataSource(_))
        ));

        let full = config(&[
            ("KUSTO_CLUSTER_URL", "https://c.kusto.windows.net/"),
            ("KUSTO_DATABASE_NAME", "db"),
            ("TENANT_ID", "t"),
            ("SERVICE_CLIENT_ID", "id"),
            ("SERVICE_CLIENT_SECRET", "secret"),
        ]);
        let conn = Connection::from_config(&full).unwrap();
        assert_eq!(conn.cluster, "https://c.kusto.windows.net");
    }

    #[test]
    fn blank_values_count_as_missing() {
        let cfg = config(&[
            ("KUSTO_CLUSTER_URL", "https://c"),
            ("KUSTO_DATABASE_NAME", "  "),
            ("TENANT_ID", "t"),
            ("SERVICE_CLIENT_ID", "id"),
            ("SERVICE_CLIENT_SECRET", "secret"),
        ]);
        assert!(Connection::from_config(&cfg).is_err());
    }

    #[test]
    fn column_values_reads_primary_table() {
        let response = serde_json::json!({
            "Tables": [{
                "TableName": "Table_0",
                "Columns": [
                    {"ColumnName": "TableName", "DataType": "String"},
                    {"ColumnName": "DatabaseName", "DataType": "String"}
                ],
                "Rows": [["StormEvents", "db"], ["PopulationData", "db"]]
            }]
        });
        assert_eq!(
            column_values(&response, "TableName").unwrap(),
            vec!["StormEvents", "PopulationData"]
        );
        assert!(column_values(&response, "Schema").is_err());
    }

    #[tokio::test]
    async fn refresh_fails_fast_on_incomplete_config() {
        let source = KustoSchemaSource::with_login_base("http://127.0.0.1:1");
        let err = source
            .refresh(&config(&[("KUSTO_CLUSTER_URL", "https://c")]))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("KUSTO_DATABASE_NAME"));
    }

    #[tokio::test]
    async fn unreachable_authority_is_a_data_source_error() {
        let source = KustoSchemaSource::with_login_base("http://127.0.0.1:1/");
        let cfg = config(&[
            ("KUSTO_CLUSTER_URL", "https://c"),
            ("KUSTO_DATABASE_NAME", "db"),
            ("TENANT_ID", "t"),
            ("SERVICE_CLIENT_ID", "id"),
            ("SERVICE_CLIENT_SECRET", "secret"),
        ]);
        let err = source.refresh(&cfg).await.unwrap_err();
        assert!(matches!(err, Error::DataSource(ref m) if m.contains("token request failed")));
    }

    #[test]
    fn render_schema_one_table_per_line() {
        let mut schemas = BTreeMap::new();
        schemas.insert("B".to_string(), "y:int".to_string());
        schemas.insert("A".to_string(), "x:string".to_string());
        assert_eq!(render_schema(&schemas), "A: x:string\nB: y:int");
    }
}
