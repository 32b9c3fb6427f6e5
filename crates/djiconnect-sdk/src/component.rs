//! Hardware component handle

use std::fmt;
use std::sync::Arc;

use djiconnect_core::ComponentKey;

use crate::listener::ComponentListener;

/// A sub-unit of the connected product
///
/// Components hold at most one listener. Setting a new listener replaces the
/// previous one; `None` removes it.
pub trait Component: Send + Sync + fmt::Debug {
    fn key(&self) -> ComponentKey;

    /// SDK-assigned identity, unique per component object
    fn id(&self) -> &str;

    fn is_connected(&self) -> bool;

    fn set_component_listener(&self, listener: Option<Arc<dyn ComponentListener>>);
}
