//! Reconciler
//!
//! The Reconciler is responsible for:
//! - Loading the stored record of a resource
//! - Deciding which lifecycle operation a declaration needs
//! - Running it against the resource
//! - Persisting identity and documents after success
//!
//! ## Architecture
//!
//! ```text
//!                 declaration
//!                      │
//!                      ▼
//! ┌─────────────┐  ┌──────────────┐  ┌─────────────┐
//! │ StateStore  │◄─│  Reconciler  │─►│   Events    │
//! │ (load/save) │  └──────────────┘  │  (notify)   │
//! └─────────────┘         │          └─────────────┘
//!                         ▼
//!                  ┌──────────────┐
//!                  │   Resource   │──► remote API
//!                  └──────────────┘
//! ```
//!
//! ## Apply Flow
//!
//! 1. Load the record stored under `<type>.<name>`
//! 2. Fill computed attributes of the declaration from the observed document
//! 3. Plan: no identity → Create; unchanged → Refresh; otherwise Update
//! 4. Run the operation, then Read the result back
//! 5. Persist the record and emit an event
//!
//! Invocations run one after another. The reconciler never retries; retries
//! happen inside each remote call.

use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::data::{ResourceData, overlay_computed};
use crate::error::{Error, Result};
use crate::traits::{DataSource, Resource, StateRecord, StateStore};

/// Lifecycle operation chosen for a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Not managed yet, or never got an identity
    Create,
    /// The declaration differs from the observed document
    Update,
    /// Nothing to change, only re-read
    Refresh,
    /// Removal requested
    Delete,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Action::Create => "create",
            Action::Update => "update",
            Action::Refresh => "refresh",
            Action::Delete => "delete",
        };
        f.write_str(name)
    }
}

/// Events emitted by the Reconciler
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileEvent {
    /// An operation was chosen
    Planned { key: String, action: Action },

    /// The operation and its read-back succeeded
    Succeeded {
        key: String,
        action: Action,
        id: Option<i64>,
    },

    /// The operation failed
    Failed {
        key: String,
        action: Action,
        error: String,
    },
}

/// Drives resources towards their declarations
pub struct Reconciler {
    store: Arc<dyn StateStore>,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<ReconcileEvent>,
}

impl Reconciler {
    /// Create a new reconciler
    ///
    /// # Returns
    ///
    /// A tuple of (reconciler, event_receiver). When the receiver falls
    /// `event_capacity` events behind, further events are dropped.
    pub fn new(
        store: Arc<dyn StateStore>,
        event_capacity: usize,
    ) -> (Self, mpsc::Receiver<ReconcileEvent>) {
        let (tx, rx) = mpsc::channel(event_capacity.max(1));
        (
            Self {
                store,
                event_tx: tx,
            },
            rx,
        )
    }

    /// Key a resource is stored under
    pub fn record_key(resource_type: &str, name: &str) -> String {
        format!("{}.{}", resource_type, name)
    }

    /// Decide the operation for a declaration whose computed attributes
    /// were already filled from `record`
    pub fn plan(record: Option<&StateRecord>, desired: &Value) -> Action {
        match record {
            Some(record) if record.id.is_some() => {
                if record.observed == *desired {
                    Action::Refresh
                } else {
                    Action::Update
                }
            }
            _ => Action::Create,
        }
    }

    /// Bring the resource named `name` in line with `desired`
    ///
    /// # Returns
    ///
    /// - `Ok(StateRecord)`: The persisted record after the read-back
    /// - `Err(Error)`: The first failure. A create that succeeded before
    ///   the failure still has its identity persisted.
    pub async fn apply(
        &self,
        resource: &dyn Resource,
        name: &str,
        desired: Value,
    ) -> Result<StateRecord> {
        let resource_type = resource.resource_type();
        let key = Self::record_key(resource_type, name);
        let record = self.store.get_record(&key).await?;

        let mut prepared = desired.clone();
        if let Some(record) = &record {
            overlay_computed(&record.observed, &mut prepared, resource.computed_fields());
        }

        let action = Self::plan(record.as_ref(), &prepared);
        info!("Planned {} for {}", action, key);
        self.emit_event(ReconcileEvent::Planned {
            key: key.clone(),
            action,
        });

        let (previous, id) = match &record {
            Some(record) => (record.observed.clone(), record.id),
            None => (Value::Null, None),
        };
        let mut data = ResourceData::with_previous(previous, prepared).with_id(id);

        if let Err(e) = Self::run(resource, action, &mut data).await {
            error!("Failed to {} {}: {}", action, key, e);
            if action == Action::Create && data.id().is_some() {
                self.keep_created_identity(&key, resource_type, desired, data)
                    .await;
            }
            self.emit_failed(&key, action, &e);
            return Err(e);
        }

        let (observed, id) = data.into_current();
        let record = StateRecord::new(resource_type, id, desired, observed);
        self.store.set_record(&key, &record).await?;

        debug!("Stored {} with id {:?}", key, record.id);
        self.emit_event(ReconcileEvent::Succeeded {
            key,
            action,
            id: record.id,
        });
        Ok(record)
    }

    /// Re-read a managed resource and store what it reports
    ///
    /// # Returns
    ///
    /// - `Err(Error::NotFound)`: The resource is not managed
    pub async fn refresh(&self, resource: &dyn Resource, name: &str) -> Result<StateRecord> {
        let resource_type = resource.resource_type();
        let key = Self::record_key(resource_type, name);
        let record = self
            .store
            .get_record(&key)
            .await?
            .ok_or_else(|| Error::not_found(format!("{} is not managed", key)))?;

        self.emit_event(ReconcileEvent::Planned {
            key: key.clone(),
            action: Action::Refresh,
        });

        let mut data = ResourceData::with_previous(record.observed.clone(), record.observed)
            .with_id(record.id);
        if let Err(e) = resource.read(&mut data).await {
            self.emit_failed(&key, Action::Refresh, &e);
            return Err(e);
        }

        let (observed, id) = data.into_current();
        let refreshed = StateRecord::new(resource_type, id, record.declared, observed);
        self.store.set_record(&key, &refreshed).await?;

        self.emit_event(ReconcileEvent::Succeeded {
            key,
            action: Action::Refresh,
            id: refreshed.id,
        });
        Ok(refreshed)
    }

    /// Delete a managed resource and forget it
    ///
    /// Destroying a resource that is not managed is a no-op.
    pub async fn destroy(&self, resource: &dyn Resource, name: &str) -> Result<()> {
        let key = Self::record_key(resource.resource_type(), name);
        let Some(record) = self.store.get_record(&key).await? else {
            debug!("{} is not managed, nothing to destroy", key);
            return Ok(());
        };

        self.emit_event(ReconcileEvent::Planned {
            key: key.clone(),
            action: Action::Delete,
        });

        if record.id.is_some() {
            let mut data = ResourceData::new(record.observed).with_id(record.id);
            if let Err(e) = resource.delete(&mut data).await {
                error!("Failed to delete {}: {}", key, e);
                self.emit_failed(&key, Action::Delete, &e);
                return Err(e);
            }
        }

        self.store.delete_record(&key).await?;
        info!("Destroyed {}", key);
        self.emit_event(ReconcileEvent::Succeeded {
            key,
            action: Action::Delete,
            id: None,
        });
        Ok(())
    }

    /// Look up an existing remote object. Nothing is persisted.
    ///
    /// # Returns
    ///
    /// The document with written-back attributes, and the identity found
    pub async fn read_data_source(
        &self,
        source: &dyn DataSource,
        args: Value,
    ) -> Result<(Value, Option<i64>)> {
        let mut data = ResourceData::new(args);
        source.read(&mut data).await?;
        debug!(
            "Data source {} resolved to {:?}",
            source.data_source_type(),
            data.id()
        );
        Ok(data.into_current())
    }

    /// Persist any pending store changes
    pub async fn flush(&self) -> Result<()> {
        self.store.flush().await
    }

    /// The planned operation followed by a read-back
    async fn run(resource: &dyn Resource, action: Action, data: &mut ResourceData) -> Result<()> {
        match action {
            Action::Create => resource.create(data).await?,
            Action::Update => resource.update(data).await?,
            Action::Refresh | Action::Delete => {}
        }
        resource.read(data).await
    }

    /// Persist the identity of a resource whose create succeeded but whose
    /// read-back failed, so the next apply does not create it again
    async fn keep_created_identity(
        &self,
        key: &str,
        resource_type: &str,
        desired: Value,
        data: ResourceData,
    ) {
        let (observed, id) = data.into_current();
        let record = StateRecord::new(resource_type, id, desired, observed);
        if let Err(e) = self.store.set_record(key, &record).await {
            error!("Failed to store identity of {}: {}", key, e);
        }
    }

    fn emit_failed(&self, key: &str, action: Action, error: &Error) {
        self.emit_event(ReconcileEvent::Failed {
            key: key.to_string(),
            action,
            error: error.to_string(),
        });
    }

    fn emit_event(&self, event: ReconcileEvent) {
        if self.event_tx.try_send(event).is_err() {
            warn!("Event channel full, dropping event");
        }
    }
}
