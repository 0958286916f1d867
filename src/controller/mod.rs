//! Controllers: per-request handlers bound to one model.
//!
//! A controller type is described by a [`ControllerDefinition`] (declared
//! model, verb overrides, custom actions). Registration resolves it once into
//! an immutable [`ControllerDescriptor`]: the effective verb map and the
//! action table the dispatcher looks actions up in.
//!
//! ```rust,ignore
//! use crudroute::controller::ControllerDefinition;
//! use crudroute::axum::http::Method;
//!
//! let widgets = ControllerDefinition::new()
//!     .model("Widget")
//!     .verb("count", Method::GET)
//!     .action("count", |c| {
//!         Box::pin(async move {
//!             let rows = c.read().await?;
//!             Ok::<_, HttpError>(serde_json::json!({ "count": rows.as_array().map_or(0, Vec::len) }))
//!         })
//!     });
//! ```

mod instance;
mod registry;
mod verbs;

pub use instance::Controller;
pub use registry::{
    ControllerCatalog, ControllerDefinition, ControllerDescriptor, ControllerManifest,
    ControllerRegistry, ControllerRegistryBuilder,
};
pub use verbs::{CrudAction, VerbMap};

use crate::error::HttpError;
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Future returned by an action; it borrows the controller for its whole run.
pub type ActionFuture<'a> = Pin<Box<dyn Future<Output = Result<Value, HttpError>> + Send + 'a>>;

/// A controller action. Its `Ok` value becomes the response body verbatim.
pub type ActionFn = Arc<dyn for<'a> Fn(&'a mut Controller) -> ActionFuture<'a> + Send + Sync>;

/// Wrap a closure as an [`ActionFn`].
pub fn action<F>(handler: F) -> ActionFn
where
    F: for<'a> Fn(&'a mut Controller) -> ActionFuture<'a> + Send + Sync + 'static,
{
    Arc::new(handler)
}

pub(crate) fn crud_action(kind: CrudAction) -> ActionFn {
    match kind {
        CrudAction::Create => action(|c| Box::pin(c.create())),
        CrudAction::Read => action(|c| Box::pin(c.read())),
        CrudAction::Update => action(|c| Box::pin(c.update())),
        CrudAction::Delete => action(|c| Box::pin(c.delete())),
    }
}
