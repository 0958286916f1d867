//! # crudroute
//!
//! Convention-based REST dispatch. A request to `/<controller>/<action>` is
//! routed to a registered controller, checked against the controller's verb
//! map, and answered with whatever the action returns, always as JSON.
//!
//! - **Controllers** are discovered from `controllers/*.toml` manifests and
//!   can carry code-defined actions through a [`ControllerCatalog`].
//! - **Models** are discovered from `models/*.toml` manifests and exposed to
//!   controllers through an immutable [`ModelRegistry`].
//! - **Errors** on the request path are [`HttpError`]s; the pipeline turns
//!   them into `{error, stack, code}` bodies.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use crudroute::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> crudroute::Result<()> {
//!     let models = ModelRegistry::builder()
//!         .register(MemoryModel::new("Widget", ModelDefinition::default()))?
//!         .initialize()
//!         .await?;
//!
//!     let controllers = ControllerRegistry::builder()
//!         .register("widgets", ControllerDefinition::new().model("Widget"))?
//!         .build();
//!
//!     let app = App::builder().models(models).controllers(controllers).build();
//!     let listener = tokio::net::TcpListener::bind("127.0.0.1:3000").await?;
//!     app.serve(listener).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod context;
pub mod controller;
pub mod discovery;
pub mod dispatch;
pub mod error;
pub mod interceptor;
pub mod model;
pub mod server;

pub use config::{ConfigService, DatabaseConfig, ServerConfig};
pub use context::RequestContext;
pub use controller::{
    Controller, ControllerCatalog, ControllerDefinition, ControllerRegistry, VerbMap,
};
pub use dispatch::Dispatcher;
pub use error::{CrudrouteError, HttpError, Result, StatusError};
pub use model::{MemoryModel, Model, ModelDefinition, ModelRegistry};
pub use server::{App, AppBuilder};

pub use async_trait::async_trait;
pub use axum;

/// Prelude module for convenient imports
///
/// ```
/// use crudroute::prelude::*;
/// ```
pub mod prelude {
    pub use crate::config::{ConfigService, DatabaseConfig, ServerConfig};
    pub use crate::context::RequestContext;
    pub use crate::controller::{
        ActionFn, ActionFuture, Controller, ControllerCatalog, ControllerDefinition,
        ControllerRegistry, VerbMap,
    };
    pub use crate::dispatch::Dispatcher;
    pub use crate::error::{CrudrouteError, HttpError, Result, StatusError};
    pub use crate::model::{Filter, MemoryModel, Model, ModelDefinition, ModelRegistry};
    pub use crate::server::{App, AppBuilder};
    pub use async_trait::async_trait;
    pub use axum::http::{Method, StatusCode};
    pub use serde_json::{Value, json};
}
