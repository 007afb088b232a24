//! # xrsplice-layer
//!
//! An OpenXR API layer that splices itself between an application and the
//! runtime. The loader finds it through its JSON manifest and calls
//! [`negotiate::xrNegotiateLoaderApiLayerInterface`]; from then on every
//! `xrGetInstanceProcAddr` lookup goes through [`dispatch`], which hands out
//! this layer's interceptors for the names in [`dispatch::INTERCEPT_TABLE`]
//! and the next layer's functions for everything else.
//!
//! Lifecycle of one instance:
//!
//! 1. [`negotiate`]: agree on interface and API version with the loader.
//! 2. [`chain`]: validate our link, create the instance further down.
//! 3. [`resolve`]: capture every downstream function we call, all or nothing.
//! 4. [`registry`]: publish the per-instance state.
//! 5. [`intercept`]: forward calls; `xrDestroyInstance` tears the state down
//!    once the runtime confirms.
//!
//! The layer runs inside someone else's process. Nothing here panics across
//! the C ABI; every entry point reports failure through `XrResult`.

#![allow(clippy::missing_safety_doc)]

// Macros must be defined before modules that use them
#[macro_use]
mod macros;

pub mod abi;
pub mod chain;
pub mod dispatch;
pub mod error;
pub mod intercept;
pub mod negotiate;
pub mod registry;
pub mod resolve;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

use std::sync::Once;

pub use error::{LayerError, Result};
pub use registry::{sessions, LayerSession, Lifecycle, SessionRegistry};

/// Name the layer is registered under in its manifest.
pub const LAYER_NAME: &str = "XR_APILAYER_XRSPLICE_passthrough";

static BOOTSTRAP: Once = Once::new();

/// Load configuration and install logging, once per process.
pub(crate) fn bootstrap() {
    BOOTSTRAP.call_once(|| {
        let (level, ansi) = {
            let config = xrsplice_config::config();
            (config.logging.level, config.logging.ansi)
        };
        xrsplice_config::init_logging(level, ansi);
    });
}
