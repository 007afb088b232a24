//! The layer's own implementations of intercepted functions.
//!
//! Every interceptor looks its instance up in the registry and calls
//! through that instance's `RealFunctions`, so two instances never share a
//! forward target.

use std::sync::Arc;

use xrsplice_config::{log_intercept_debug, log_intercept_info, log_intercept_trace, log_intercept_warn};

use crate::abi::*;
use crate::registry::{sessions, LayerSession};

fn active_session(instance: XrInstance, function: &'static str) -> Option<Arc<LayerSession>> {
    match sessions().get(instance) {
        Some(session) if session.is_active() => Some(session),
        _ => {
            log_intercept_warn!("Call on unknown instance", function = function, instance = instance.0);
            None
        }
    }
}

/// `xrDestroyInstance` override.
///
/// The real destroy runs first. Local state is released only when it
/// succeeds; a failed destroy leaves the session usable and a retry possible.
pub unsafe extern "system" fn destroy_instance(instance: XrInstance) -> XrResult {
    let registry = sessions();
    let Some(session) = registry.get(instance) else {
        log_intercept_warn!("xrDestroyInstance on unknown instance", instance = instance.0);
        return XrResult::ERROR_HANDLE_INVALID;
    };

    let mut result = XrResult::ERROR_HANDLE_INVALID;
    let outcome = session.teardown(|| {
        result = (session.reals().destroy_instance)(instance);
        result.succeeded()
    });

    match outcome {
        None => {
            log_intercept_debug!("Instance already destroyed", instance = instance.0);
            XrResult::ERROR_HANDLE_INVALID
        }
        Some(false) => {
            log_intercept_warn!(
                "Downstream destroy failed, keeping instance state",
                instance = instance.0,
                result = result.name(),
                code = result.0
            );
            result
        }
        Some(true) => {
            registry.remove_session(&session);
            log_intercept_info!("Instance destroyed", instance = instance.0, live = registry.len());
            result
        }
    }
}

/// `xrGetSystem`, reporting the system it resolves to.
pub unsafe extern "system" fn get_system(
    instance: XrInstance,
    get_info: *const XrSystemGetInfo,
    system_id: *mut XrSystemId,
) -> XrResult {
    let Some(session) = active_session(instance, "xrGetSystem") else {
        return XrResult::ERROR_HANDLE_INVALID;
    };
    let result = (session.reals().get_system)(instance, get_info, system_id);
    log_intercept_trace!("Forwarded", function = "xrGetSystem", instance = instance.0, result = result.name());

    if result.succeeded() && !system_id.is_null() {
        observe_system(&session, instance, *system_id);
    }
    result
}

unsafe fn observe_system(session: &LayerSession, instance: XrInstance, system_id: XrSystemId) {
    let mut properties = XrSystemProperties::zeroed();
    properties.ty = XrStructureType::SYSTEM_PROPERTIES;

    let result = (session.reals().get_system_properties)(instance, system_id, &mut properties);
    if result.succeeded() {
        let system_name = fixed_str(&properties.system_name);
        log_intercept_info!(
            "System acquired",
            instance = instance.0,
            system_id = system_id,
            system_name = system_name.as_str(),
            vendor_id = properties.vendor_id
        );
    } else {
        log_intercept_debug!(
            "xrGetSystemProperties failed",
            system_id = system_id,
            result = result.name()
        );
    }
}

passthrough_interceptor! {
    /// `xrCreateSession`
    fn create_session(instance, create_info: *const XrSessionCreateInfo, session: *mut XrSession)
        => create_session as "xrCreateSession";
}

/// Log which runtime sits at the bottom of the chain. Never affects the
/// creation result.
pub(crate) fn report_runtime(session: &LayerSession) {
    let mut properties = XrInstanceProperties::zeroed();
    properties.ty = XrStructureType::INSTANCE_PROPERTIES;

    let result =
        unsafe { (session.reals().get_instance_properties)(session.instance(), &mut properties) };
    if result.succeeded() {
        let runtime_name = fixed_str(&properties.runtime_name);
        let runtime_version = format_version(properties.runtime_version);
        log_intercept_info!(
            "Runtime identified",
            instance = session.instance().0,
            runtime = runtime_name.as_str(),
            version = runtime_version.as_str()
        );
    } else {
        log_intercept_warn!(
            "xrGetInstanceProperties failed",
            instance = session.instance().0,
            result = result.name()
        );
    }
}
