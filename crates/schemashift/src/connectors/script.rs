//! Target executor that writes a `mongosh` script instead of connecting.
//!
//! Statements are written in plan execution order, so running the script
//! against the vCore cluster replays the plan. Collections are only created
//! when missing, so the script can be run again after a partial failure.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use schemashift_core::{CollectionId, IndexDefinition, ShardKey};

use crate::connectors::TargetExecutor;
use crate::error::{Error, Result};

/// Configuration for the script executor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptConfig {
    /// Output path; overwritten on [`TargetExecutor::finish`].
    pub path: PathBuf,
}

/// Script-writing executor.
pub struct ScriptExecutor {
    config: ScriptConfig,
    lines: Vec<String>,
    current: Option<CollectionId>,
}

impl ScriptExecutor {
    /// Creates an executor writing to `config.path`.
    #[must_use]
    pub fn new(config: ScriptConfig) -> Self {
        Self {
            config,
            lines: vec!["// Generated by schemashift. Run with: mongosh <connection-string> <file>".to_string()],
            current: None,
        }
    }

    /// Script text produced so far.
    #[must_use]
    pub fn script(&self) -> String {
        let mut text = self.lines.join("\n");
        text.push('\n');
        text
    }

    fn push(&mut self, id: &CollectionId, statement: String) {
        if self.current.as_ref() != Some(id) {
            self.lines.push(String::new());
            self.lines.push(format!("// {id}"));
            self.current = Some(id.clone());
        }
        self.lines.push(statement);
    }
}

fn quote(text: &str) -> Result<String> {
    Ok(serde_json::to_string(text)?)
}

fn database(id: &CollectionId) -> Result<String> {
    Ok(format!("db.getSiblingDB({})", quote(&id.database)?))
}

fn collection(id: &CollectionId) -> Result<String> {
    Ok(format!(
        "{}.getCollection({})",
        database(id)?,
        quote(&id.collection)?
    ))
}

/// Index options as a `createIndex` options document (name included).
fn index_options(index: &IndexDefinition) -> Result<String> {
    let mut value = serde_json::to_value(index)?;
    if let Some(object) = value.as_object_mut() {
        object.remove("key");
    }
    Ok(serde_json::to_string(&value)?)
}

#[async_trait]
impl TargetExecutor for ScriptExecutor {
    fn executor_type(&self) -> &'static str {
        "script"
    }

    async fn drop_collection(&mut self, id: &CollectionId) -> Result<()> {
        let statement = format!("{}.drop();", collection(id)?);
        self.push(id, statement);
        Ok(())
    }

    async fn create_collection(
        &mut self,
        id: &CollectionId,
        colocate_with: Option<&CollectionId>,
    ) -> Result<()> {
        let command = match colocate_with {
            Some(anchor) => format!(
                "{{ create: {}, colocation: {{ collection: {} }} }}",
                quote(&id.collection)?,
                quote(&anchor.collection)?
            ),
            None => format!("{{ create: {} }}", quote(&id.collection)?),
        };
        let db = database(id)?;
        let statement = format!(
            "if (!{db}.getCollectionNames().includes({})) {{ {db}.runCommand({command}); }}",
            quote(&id.collection)?
        );
        self.push(id, statement);
        Ok(())
    }

    async fn shard_collection(&mut self, id: &CollectionId, key: &ShardKey) -> Result<()> {
        let statement = format!(
            "sh.shardCollection({}, {});",
            quote(&id.to_string())?,
            serde_json::to_string(key)?
        );
        self.push(id, statement);
        Ok(())
    }

    async fn create_index(&mut self, id: &CollectionId, index: &IndexDefinition) -> Result<()> {
        let statement = format!(
            "{}.createIndex({}, {});",
            collection(id)?,
            serde_json::to_string(&index.key)?,
            index_options(index)?
        );
        self.push(id, statement);
        Ok(())
    }

    async fn finish(&mut self) -> Result<()> {
        tokio::fs::write(&self.config.path, self.script())
            .await
            .map_err(|e| {
                Error::Io(std::io::Error::new(
                    e.kind(),
                    format!("Failed to write script '{}': {e}", self.config.path.display()),
                ))
            })?;
        tracing::info!(path = %self.config.path.display(), "script written");
        Ok(())
    }
}
