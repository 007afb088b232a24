//! Real function storage.
//!
//! Every downstream entry point the layer forwards to or calls itself is
//! captured here, once per instance, through the next layer's
//! `xrGetInstanceProcAddr`. Resolution is all-or-nothing: `RealFunctions`
//! only exists once every name has resolved.

use std::mem::transmute;

use xrsplice_config::{log_resolve_debug, log_resolve_warn};

use crate::abi::*;
use crate::chain::NextLayer;
use crate::error::Result;

macro_rules! real_functions {
    ($($(#[$meta:meta])* $field:ident: $pfn:ty = $name:literal;)+) => {
        /// Downstream entry points captured for one instance.
        #[derive(Clone, Copy)]
        pub struct RealFunctions {
            $($(#[$meta])* pub $field: $pfn,)+
        }

        /// Every name resolved through the next link, in resolution order.
        pub const REQUIRED_FUNCTIONS: &[&str] = &[$($name),+];

        impl RealFunctions {
            /// Query the next link for each required name. The first failure
            /// aborts the whole resolution.
            ///
            /// # Safety
            /// `next` must hold entry points that are valid to call for
            /// `instance`.
            pub unsafe fn resolve(next: &NextLayer, instance: XrInstance) -> Result<Self> {
                log_resolve_debug!(
                    "Resolving downstream functions",
                    instance = instance.0,
                    count = REQUIRED_FUNCTIONS.len()
                );
                let reals = Self {
                    $($field: {
                        let f = next.resolve(instance, $name).inspect_err(|_| {
                            log_resolve_warn!(
                                "Required function missing downstream",
                                instance = instance.0,
                                name = $name
                            );
                        })?;
                        transmute::<VoidFunction, $pfn>(f)
                    },)+
                };
                Ok(reals)
            }

            /// Raw pointer captured for `name`, if it is one of ours.
            pub fn raw(&self, name: &str) -> PfnVoidFunction {
                match name {
                    $($name => Some(unsafe { transmute::<$pfn, VoidFunction>(self.$field) }),)+
                    _ => None,
                }
            }
        }
    };
}

real_functions! {
    /// Target of the `xrDestroyInstance` override, also used for rollback.
    destroy_instance: PfnDestroyInstance = "xrDestroyInstance";
    get_system: PfnGetSystem = "xrGetSystem";
    create_session: PfnCreateSession = "xrCreateSession";
    /// Called once after instance creation to report the runtime.
    get_instance_properties: PfnGetInstanceProperties = "xrGetInstanceProperties";
    /// Called by the `xrGetSystem` interceptor to report the system.
    get_system_properties: PfnGetSystemProperties = "xrGetSystemProperties";
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LayerError;
    use crate::testing::{self, MockPlan};

    #[test]
    fn test_required_functions_cover_forward_targets() {
        for name in ["xrDestroyInstance", "xrGetSystem", "xrCreateSession"] {
            assert!(REQUIRED_FUNCTIONS.contains(&name), "{name} missing");
        }
        assert_eq!(REQUIRED_FUNCTIONS.len(), 5);
    }

    #[test]
    fn test_resolve_queries_only_required_names() {
        let handle = testing::spawn_instance("resolve-only-required", MockPlan::default());
        let reals = unsafe { RealFunctions::resolve(&testing::mock_next_layer(), handle) }.unwrap();

        let state = testing::instance(handle).unwrap();
        assert_eq!(state.queried, REQUIRED_FUNCTIONS);
        assert!(reals.raw("xrGetSystem").is_some());
        assert!(reals.raw("xrPollEvent").is_none());
    }

    #[test]
    fn test_resolve_fails_when_any_name_missing() {
        let handle = testing::spawn_instance(
            "resolve-missing",
            MockPlan {
                unresolvable: vec!["xrGetSystemProperties"],
                ..MockPlan::default()
            },
        );
        let err = unsafe { RealFunctions::resolve(&testing::mock_next_layer(), handle) }
            .err()
            .unwrap();

        assert_eq!(
            err,
            LayerError::Unresolved {
                name: "xrGetSystemProperties",
                result: XrResult::ERROR_FUNCTION_UNSUPPORTED,
            }
        );
    }

    #[test]
    fn test_resolve_stops_at_first_failure() {
        let handle = testing::spawn_instance(
            "resolve-stops-early",
            MockPlan {
                unresolvable: vec!["xrGetSystem"],
                ..MockPlan::default()
            },
        );
        assert!(unsafe { RealFunctions::resolve(&testing::mock_next_layer(), handle) }.is_err());

        let state = testing::instance(handle).unwrap();
        assert_eq!(state.queried, vec!["xrDestroyInstance", "xrGetSystem"]);
    }
}
