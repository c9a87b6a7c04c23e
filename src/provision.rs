//! Table provisioning
//!
//! Issues the DDL rendered by [`DdlExporter`] against a destination. A table
//! whose DDL fails is recorded and the remaining tables are still
//! provisioned.

use serde::Serialize;
use tracing::{debug, error, info};

use crate::database::{DatabaseBackend, DatabaseError};
use crate::export::{DdlExporter, ExportError, ExportResult, TableDdl};
use crate::models::{ProvisionMode, SchemaDefinition, SqlDialect, TableSchema};

/// Error provisioning a single table
#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    #[error("Cannot render DDL for {table}: {source}")]
    Render {
        table: String,
        #[source]
        source: ExportError,
    },

    #[error("DDL for {table} failed: {source}")]
    Execute {
        table: String,
        #[source]
        source: DatabaseError,
    },
}

/// What happened to a table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvisionStatus {
    Created,
    Replaced,
    /// Already present; left untouched
    Exists,
    /// Provisioning is turned off for the run
    Skipped,
    Failed,
}

/// Per-table provisioning outcome
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProvisionOutcome {
    pub table: String,
    pub status: ProvisionStatus,
    pub error: Option<String>,
}

impl ProvisionOutcome {
    pub fn is_failed(&self) -> bool {
        self.status == ProvisionStatus::Failed
    }
}

/// Creates destination tables from a schema
#[derive(Debug, Clone, Copy)]
pub struct TableProvisioner {
    exporter: DdlExporter,
    mode: ProvisionMode,
}

impl TableProvisioner {
    pub fn new(dialect: SqlDialect, mode: ProvisionMode) -> Self {
        Self {
            exporter: DdlExporter::new(dialect),
            mode,
        }
    }

    /// Provisioner speaking the backend's dialect
    pub fn for_backend<B: DatabaseBackend + ?Sized>(backend: &B, mode: ProvisionMode) -> Self {
        Self::new(backend.dialect(), mode)
    }

    pub fn mode(&self) -> ProvisionMode {
        self.mode
    }

    /// Statements for every table, without executing them
    pub fn render(&self, schema: &SchemaDefinition) -> ExportResult<Vec<TableDdl>> {
        self.exporter.export_schema(schema)
    }

    /// Provision one table according to the mode
    pub async fn provision_table<B: DatabaseBackend + ?Sized>(
        &self,
        backend: &B,
        table: &TableSchema,
    ) -> Result<ProvisionStatus, ProvisionError> {
        if self.mode == ProvisionMode::Skip {
            return Ok(ProvisionStatus::Skipped);
        }

        let execute_error = |source| ProvisionError::Execute {
            table: table.name.clone(),
            source,
        };

        let exists = backend
            .table_exists(&table.name)
            .await
            .map_err(execute_error)?;
        if exists && self.mode == ProvisionMode::CreateIfMissing {
            debug!("Table {} already exists", table.name);
            return Ok(ProvisionStatus::Exists);
        }

        let ddl = self
            .exporter
            .export_table(table)
            .map_err(|source| ProvisionError::Render {
                table: table.name.clone(),
                source,
            })?;
        backend
            .execute_ddl(&ddl.to_sql())
            .await
            .map_err(execute_error)?;

        Ok(if exists {
            ProvisionStatus::Replaced
        } else {
            ProvisionStatus::Created
        })
    }

    /// Provision every table of a schema, one at a time
    pub async fn provision<B: DatabaseBackend + ?Sized>(
        &self,
        backend: &B,
        schema: &SchemaDefinition,
    ) -> Vec<ProvisionOutcome> {
        let mut outcomes = Vec::with_capacity(schema.tables.len());
        for table in &schema.tables {
            let outcome = match self.provision_table(backend, table).await {
                Ok(status) => {
                    info!("Table {}: {:?}", table.name, status);
                    ProvisionOutcome {
                        table: table.name.clone(),
                        status,
                        error: None,
                    }
                }
                Err(e) => {
                    error!("{}", e);
                    ProvisionOutcome {
                        table: table.name.clone(),
                        status: ProvisionStatus::Failed,
                        error: Some(e.to_string()),
                    }
                }
            };
            outcomes.push(outcome);
        }
        outcomes
    }
}
