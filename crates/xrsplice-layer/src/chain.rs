//! Instance chain construction (`xrCreateApiLayerInstance`).
//!
//! The loader hands us a linked list of `XrApiLayerNextInfo`, the head of
//! which describes the layer directly below us. We validate that link, pop
//! ourselves off the list, let the rest of the chain create the instance and
//! only then build our own per-instance state.

use std::ffi::{c_char, CString};
use std::mem::transmute;
use std::sync::{PoisonError, RwLock};

use xrsplice_config::{log_chain_debug, log_chain_error, log_chain_info, log_chain_warn};

use crate::abi::*;
use crate::error::{LayerError, Result};
use crate::registry::{sessions, LayerSession};
use crate::resolve::RealFunctions;
use crate::LAYER_NAME;

/// The link below this layer, reduced to the two operations it offers.
#[derive(Clone, Copy)]
pub struct NextLayer {
    get_instance_proc_addr: PfnGetInstanceProcAddr,
    create_api_layer_instance: PfnCreateApiLayerInstance,
}

impl NextLayer {
    pub fn new(
        get_instance_proc_addr: PfnGetInstanceProcAddr,
        create_api_layer_instance: PfnCreateApiLayerInstance,
    ) -> Self {
        Self {
            get_instance_proc_addr,
            create_api_layer_instance,
        }
    }

    /// Validate the link the loader addressed to us.
    pub fn from_link(link: &XrApiLayerNextInfo) -> Result<Self> {
        if link.struct_type != XrLoaderInterfaceStructs::API_LAYER_NEXT_INFO
            || link.struct_version != XR_API_LAYER_NEXT_INFO_STRUCT_VERSION
        {
            log_chain_warn!(
                "Malformed next link",
                struct_type = link.struct_type.0,
                struct_version = link.struct_version
            );
            return Err(LayerError::InitializationFailed("next link header mismatch"));
        }

        let addressed_to_us = fixed_cstr(&link.layer_name)
            .is_some_and(|name| name.to_bytes() == LAYER_NAME.as_bytes());
        if !addressed_to_us {
            let name = fixed_str(&link.layer_name);
            log_chain_warn!(
                "Next link names another layer",
                expected = LAYER_NAME,
                found = name.as_str()
            );
            return Err(LayerError::InitializationFailed("next link layer name mismatch"));
        }

        match (
            link.next_get_instance_proc_addr,
            link.next_create_api_layer_instance,
        ) {
            (Some(gipa), Some(create)) => Ok(Self::new(gipa, create)),
            _ => Err(LayerError::InitializationFailed(
                "next link is missing an entry point",
            )),
        }
    }

    /// Raw `xrGetInstanceProcAddr` on the next link; output and result are
    /// whatever it produces.
    ///
    /// # Safety
    /// `name` and `function` must satisfy the `xrGetInstanceProcAddr` contract.
    pub unsafe fn lookup(
        &self,
        instance: XrInstance,
        name: *const c_char,
        function: *mut PfnVoidFunction,
    ) -> XrResult {
        (self.get_instance_proc_addr)(instance, name, function)
    }

    /// Resolve `name` to a non-null entry point.
    ///
    /// # Safety
    /// The next link's `xrGetInstanceProcAddr` must be callable for `instance`.
    pub unsafe fn resolve(&self, instance: XrInstance, name: &'static str) -> Result<VoidFunction> {
        let c_name = CString::new(name)
            .map_err(|_| LayerError::InitializationFailed("function name contains NUL"))?;
        let mut function: PfnVoidFunction = None;
        let result = self.lookup(instance, c_name.as_ptr(), &mut function);
        match function {
            Some(f) if result.succeeded() => Ok(f),
            _ => Err(LayerError::Unresolved {
                name,
                result: if result.failed() {
                    result
                } else {
                    XrResult::ERROR_FUNCTION_UNSUPPORTED
                },
            }),
        }
    }

    /// Delegate instance creation down the chain.
    ///
    /// # Safety
    /// Arguments must satisfy the `xrCreateApiLayerInstance` contract, with
    /// `api_layer_info` already advanced past this link.
    pub unsafe fn create_instance(
        &self,
        create_info: *const XrInstanceCreateInfo,
        api_layer_info: &XrApiLayerCreateInfo,
        instance: *mut XrInstance,
    ) -> XrResult {
        (self.create_api_layer_instance)(create_info, api_layer_info, instance)
    }
}

/// Most recently validated link, used for lookups made without an instance.
static LAST_LINK: RwLock<Option<NextLayer>> = RwLock::new(None);

fn remember_link(next: NextLayer) {
    *LAST_LINK.write().unwrap_or_else(PoisonError::into_inner) = Some(next);
}

/// The link to consult for `XR_NULL_HANDLE` lookups, if any chain was built.
pub fn last_link() -> Option<NextLayer> {
    *LAST_LINK.read().unwrap_or_else(PoisonError::into_inner)
}

/// Build the chain below us and, once the instance exists, this layer's
/// state for it.
///
/// Returns the downstream result on success so qualified successes pass
/// through unchanged.
///
/// # Safety
/// Pointers must satisfy the `xrCreateApiLayerInstance` contract.
pub unsafe fn create_api_layer_instance(
    create_info: *const XrInstanceCreateInfo,
    api_layer_info: *const XrApiLayerCreateInfo,
    instance: *mut XrInstance,
) -> Result<XrResult> {
    let (Some(info), Some(layer_info)) = (create_info.as_ref(), api_layer_info.as_ref()) else {
        return Err(LayerError::InitializationFailed("missing create info"));
    };
    if instance.is_null() {
        return Err(LayerError::InitializationFailed("missing instance output"));
    }

    let link = layer_info
        .next_info
        .as_ref()
        .ok_or(LayerError::InitializationFailed("chain has no next link"))?;
    let next = NextLayer::from_link(link)?;

    let settings = fixed_str(&layer_info.settings_file_location);
    if !settings.is_empty() {
        log_chain_debug!("Loader supplied settings file", path = settings.as_str());
    }

    // Same descriptor, with this layer popped off the front.
    let mut advanced = *layer_info;
    advanced.next_info = link.next;

    let result = next.create_instance(create_info, &advanced, instance);
    if result.failed() {
        log_chain_warn!(
            "Next layer failed to create instance",
            result = result.name(),
            code = result.0
        );
        return Err(LayerError::Downstream(result));
    }
    remember_link(next);

    let handle = *instance;
    let reals = match RealFunctions::resolve(&next, handle) {
        Ok(reals) => reals,
        Err(err) => {
            let reason = err.to_string();
            log_chain_error!(
                "Cannot operate on new instance, rolling back",
                instance = handle.0,
                reason = reason.as_str()
            );
            destroy_downstream(&next, handle);
            return Err(err);
        }
    };

    let session = sessions().insert(LayerSession::new(handle, next, reals));

    let application = fixed_str(&info.application_info.application_name);
    log_chain_info!(
        "Instance created",
        instance = handle.0,
        application = application.as_str()
    );
    crate::intercept::report_runtime(&session);

    Ok(result)
}

/// Tear down an instance we cannot track, through the chain's own
/// `xrDestroyInstance`.
unsafe fn destroy_downstream(next: &NextLayer, instance: XrInstance) {
    match next.resolve(instance, "xrDestroyInstance") {
        Ok(f) => {
            let destroy = transmute::<VoidFunction, PfnDestroyInstance>(f);
            let result = destroy(instance);
            log_chain_debug!(
                "Rolled back downstream instance",
                instance = instance.0,
                result = result.name()
            );
        }
        Err(_) => {
            log_chain_error!(
                "xrDestroyInstance unavailable, downstream instance leaked",
                instance = instance.0
            );
        }
    }
}

/// `xrCreateApiLayerInstance` as handed to the loader during negotiation.
pub unsafe extern "system" fn xr_create_api_layer_instance(
    create_info: *const XrInstanceCreateInfo,
    api_layer_info: *const XrApiLayerCreateInfo,
    instance: *mut XrInstance,
) -> XrResult {
    match create_api_layer_instance(create_info, api_layer_info, instance) {
        Ok(result) => result,
        Err(err) => err.result(),
    }
}

#[cfg(test)]
mod tests {
    use std::ffi::CStr;

    use super::*;
    use crate::registry::Lifecycle;
    use crate::testing::{self, ChainFixture, MockPlan};

    #[test]
    fn test_create_registers_session_and_advances_chain() {
        let mut fixture = ChainFixture::new("chain-success");
        let (result, handle) = unsafe { fixture.create() };

        assert_eq!(result, XrResult::SUCCESS);
        assert!(!handle.is_null());
        let session = sessions().get(handle).expect("session registered");
        assert_eq!(session.lifecycle(), Lifecycle::Active);

        let downstream = testing::instance(handle).unwrap();
        assert_eq!(downstream.received_next_info, fixture.tail_addr());
        assert_eq!(downstream.get_instance_properties_calls, 1);
    }

    #[test]
    fn test_downstream_failure_propagates_unchanged() {
        testing::register_plan(
            "chain-oom",
            MockPlan {
                create_result: XrResult::ERROR_OUT_OF_MEMORY,
                ..MockPlan::default()
            },
        );
        let mut fixture = ChainFixture::new("chain-oom");
        let (result, handle) = unsafe { fixture.create() };

        assert_eq!(result, XrResult::ERROR_OUT_OF_MEMORY);
        assert!(handle.is_null());
        assert!(testing::instances_for("chain-oom").is_empty());
    }

    #[test]
    fn test_resolution_failure_destroys_downstream_instance() {
        testing::register_plan(
            "chain-unresolvable",
            MockPlan {
                unresolvable: vec!["xrCreateSession"],
                ..MockPlan::default()
            },
        );
        let mut fixture = ChainFixture::new("chain-unresolvable");
        let (result, handle) = unsafe { fixture.create() };

        assert_eq!(result, XrResult::ERROR_INITIALIZATION_FAILED);
        assert!(sessions().get(handle).is_none());

        let downstream = testing::instance(handle).unwrap();
        assert!(!downstream.alive);
        assert_eq!(downstream.destroy_calls, 1);
    }

    #[test]
    fn test_missing_next_link_rejected() {
        let mut fixture = ChainFixture::new("chain-no-link");
        fixture.layer_info.next_info = std::ptr::null_mut();
        let (result, _) = unsafe { fixture.create() };
        assert_eq!(result, XrResult::ERROR_INITIALIZATION_FAILED);
        assert!(testing::instances_for("chain-no-link").is_empty());
    }

    #[test]
    fn test_link_for_other_layer_rejected() {
        let mut fixture = ChainFixture::new("chain-wrong-name");
        write_fixed_str(&mut fixture.link.layer_name, "XR_APILAYER_OTHER_layer");
        let (result, _) = unsafe { fixture.create() };
        assert_eq!(result, XrResult::ERROR_INITIALIZATION_FAILED);
        assert!(testing::instances_for("chain-wrong-name").is_empty());
    }

    #[test]
    fn test_link_header_and_entry_points_validated() {
        let mut link = testing::next_link(LAYER_NAME);
        assert!(NextLayer::from_link(&link).is_ok());

        link.struct_type = XrLoaderInterfaceStructs::API_LAYER_CREATE_INFO;
        assert!(NextLayer::from_link(&link).is_err());

        let mut link = testing::next_link(LAYER_NAME);
        link.struct_version = 2;
        assert!(NextLayer::from_link(&link).is_err());

        let mut link = testing::next_link(LAYER_NAME);
        link.next_create_api_layer_instance = None;
        assert!(NextLayer::from_link(&link).is_err());

        let mut link = testing::next_link(LAYER_NAME);
        link.next_get_instance_proc_addr = None;
        assert!(NextLayer::from_link(&link).is_err());
    }

    #[test]
    fn test_null_arguments_rejected() {
        let fixture = ChainFixture::new("chain-null-args");
        let mut instance = XrInstance::NULL;
        unsafe {
            assert_eq!(
                xr_create_api_layer_instance(std::ptr::null(), &*fixture.layer_info, &mut instance),
                XrResult::ERROR_INITIALIZATION_FAILED
            );
            assert_eq!(
                xr_create_api_layer_instance(&*fixture.create_info, std::ptr::null(), &mut instance),
                XrResult::ERROR_INITIALIZATION_FAILED
            );
            assert_eq!(
                xr_create_api_layer_instance(
                    &*fixture.create_info,
                    &*fixture.layer_info,
                    std::ptr::null_mut()
                ),
                XrResult::ERROR_INITIALIZATION_FAILED
            );
        }
    }

    #[test]
    fn test_successful_create_remembers_link() {
        let mut fixture = ChainFixture::new("chain-remember");
        let (result, _) = unsafe { fixture.create() };
        assert!(result.succeeded());
        assert!(last_link().is_some());
    }

    const FAILED_CHAIN_MARKER: &str = "xrspliceFailedChainMarker";

    unsafe extern "system" fn marked_get_instance_proc_addr(
        instance: XrInstance,
        name: *const c_char,
        function: *mut PfnVoidFunction,
    ) -> XrResult {
        if !name.is_null() && CStr::from_ptr(name).to_bytes() == FAILED_CHAIN_MARKER.as_bytes() {
            *function = Some(testing::poison_function());
            return XrResult::SUCCESS;
        }
        testing::mock_get_instance_proc_addr(instance, name, function)
    }

    #[test]
    fn test_failed_create_does_not_remember_link() {
        testing::register_plan(
            "chain-oom-marked",
            MockPlan {
                create_result: XrResult::ERROR_OUT_OF_MEMORY,
                ..MockPlan::default()
            },
        );
        let mut fixture = ChainFixture::new("chain-oom-marked");
        fixture.link.next_get_instance_proc_addr = Some(marked_get_instance_proc_addr);
        let (result, _) = unsafe { fixture.create() };
        assert_eq!(result, XrResult::ERROR_OUT_OF_MEMORY);

        if let Some(next) = last_link() {
            let marker = CString::new(FAILED_CHAIN_MARKER).unwrap();
            let mut function: PfnVoidFunction = None;
            let result = unsafe { next.lookup(XrInstance::NULL, marker.as_ptr(), &mut function) };
            assert_ne!(result, XrResult::SUCCESS);
        }
    }
}
