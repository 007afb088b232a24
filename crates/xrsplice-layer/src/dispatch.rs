//! `xrGetInstanceProcAddr`: decides per name whether a call is ours.
//!
//! Whether a name is intercepted depends only on the static table below and
//! the `[intercept]` config. Which downstream function an interceptor calls
//! is decided later, per instance, from that instance's `RealFunctions`.

use std::ffi::{c_char, CStr};
use std::mem::transmute;

use xrsplice_config::{log_dispatch_debug, log_dispatch_trace, Config};

use crate::abi::*;
use crate::chain::last_link;
use crate::error::LayerError;
use crate::intercept;
use crate::registry::sessions;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterceptKind {
    /// The lookup function itself.
    Lookup,
    /// Always intercepted, can never be disabled.
    Override,
    /// Observes or forwards to the real function; may be disabled by config.
    Passthrough,
}

impl InterceptKind {
    pub fn as_str(self) -> &'static str {
        match self {
            InterceptKind::Lookup => "lookup",
            InterceptKind::Override => "override",
            InterceptKind::Passthrough => "passthrough",
        }
    }
}

#[derive(Clone, Copy)]
pub struct InterceptEntry {
    pub name: &'static str,
    pub kind: InterceptKind,
    pub function: VoidFunction,
}

macro_rules! intercept_entry {
    ($name:literal, $kind:ident, $handler:path as $pfn:ty) => {
        InterceptEntry {
            name: $name,
            kind: InterceptKind::$kind,
            function: unsafe { transmute::<$pfn, VoidFunction>($handler as $pfn) },
        }
    };
}

/// Every name this layer answers for, in resolution order.
pub static INTERCEPT_TABLE: &[InterceptEntry] = &[
    intercept_entry!("xrGetInstanceProcAddr", Lookup, xr_get_instance_proc_addr as PfnGetInstanceProcAddr),
    intercept_entry!("xrDestroyInstance", Override, intercept::destroy_instance as PfnDestroyInstance),
    intercept_entry!("xrGetSystem", Passthrough, intercept::get_system as PfnGetSystem),
    intercept_entry!("xrCreateSession", Passthrough, intercept::create_session as PfnCreateSession),
];

/// The entry answering for `name`, honoring disabled pass-through names.
pub fn find_intercept(name: &str, config: &Config) -> Option<&'static InterceptEntry> {
    INTERCEPT_TABLE
        .iter()
        .find(|entry| entry.name == name)
        .filter(|entry| {
            entry.kind != InterceptKind::Passthrough || !config.is_intercept_disabled(entry.name)
        })
}

/// `xrGetInstanceProcAddr` as handed to the loader and returned for
/// self-lookups.
pub unsafe extern "system" fn xr_get_instance_proc_addr(
    instance: XrInstance,
    name: *const c_char,
    function: *mut PfnVoidFunction,
) -> XrResult {
    if name.is_null() || function.is_null() {
        log_dispatch_debug!("Rejected lookup with null argument", instance = instance.0);
        return LayerError::ValidationFailure("null lookup argument").result();
    }

    let c_name = CStr::from_ptr(name);
    if let Ok(name_str) = c_name.to_str() {
        let entry = find_intercept(name_str, &xrsplice_config::config());
        if let Some(entry) = entry {
            log_dispatch_trace!(
                "Intercepted",
                name = name_str,
                kind = entry.kind.as_str(),
                instance = instance.0
            );
            *function = Some(entry.function);
            return XrResult::SUCCESS;
        }
    }

    forward(instance, c_name, function)
}

/// Ask the next layer, as if this layer were absent.
unsafe fn forward(instance: XrInstance, name: &CStr, function: *mut PfnVoidFunction) -> XrResult {
    let next = if instance.is_null() {
        last_link()
    } else {
        match sessions().get(instance) {
            Some(session) if session.is_active() => Some(*session.next()),
            _ => {
                log_dispatch_debug!(
                    "Lookup on unknown instance",
                    instance = instance.0,
                    name = &*name.to_string_lossy()
                );
                *function = None;
                return XrResult::ERROR_HANDLE_INVALID;
            }
        }
    };

    match next {
        Some(next) => {
            let result = next.lookup(instance, name.as_ptr(), function);
            log_dispatch_trace!(
                "Forwarded lookup",
                name = &*name.to_string_lossy(),
                instance = instance.0,
                result = result.name()
            );
            result
        }
        None => {
            log_dispatch_debug!(
                "Global lookup before any instance was created",
                name = &*name.to_string_lossy()
            );
            *function = None;
            XrResult::ERROR_FUNCTION_UNSUPPORTED
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{self, ChainFixture};
    use std::ffi::CString;

    unsafe fn lookup(instance: XrInstance, name: &str) -> (XrResult, PfnVoidFunction) {
        let name = CString::new(name).unwrap();
        let mut function: PfnVoidFunction = None;
        let result = xr_get_instance_proc_addr(instance, name.as_ptr(), &mut function);
        (result, function)
    }

    fn addr(function: PfnVoidFunction) -> usize {
        function.map_or(0, |f| f as usize)
    }

    #[test]
    fn test_null_arguments_are_validation_failures() {
        let name = CString::new("xrGetSystem").unwrap();
        let mut function: PfnVoidFunction = None;
        unsafe {
            assert_eq!(
                xr_get_instance_proc_addr(XrInstance::NULL, std::ptr::null(), &mut function),
                XrResult::ERROR_VALIDATION_FAILURE
            );
            assert_eq!(
                xr_get_instance_proc_addr(XrInstance::NULL, name.as_ptr(), std::ptr::null_mut()),
                XrResult::ERROR_VALIDATION_FAILURE
            );
        }
    }

    #[test]
    fn test_self_lookup_returns_router() {
        let (result, function) = unsafe { lookup(XrInstance::NULL, "xrGetInstanceProcAddr") };
        assert_eq!(result, XrResult::SUCCESS);
        assert_eq!(addr(function), xr_get_instance_proc_addr as PfnGetInstanceProcAddr as usize);
    }

    #[test]
    fn test_intercepted_names_are_stable() {
        for entry in INTERCEPT_TABLE {
            let (first_result, first) = unsafe { lookup(XrInstance(0xdead), entry.name) };
            let (_, second) = unsafe { lookup(XrInstance::NULL, entry.name) };
            assert_eq!(first_result, XrResult::SUCCESS);
            assert_eq!(addr(first), entry.function as usize);
            assert_eq!(addr(first), addr(second));
        }
    }

    #[test]
    fn test_table_order_and_kinds() {
        let names: Vec<_> = INTERCEPT_TABLE.iter().map(|e| e.name).collect();
        assert_eq!(
            names,
            ["xrGetInstanceProcAddr", "xrDestroyInstance", "xrGetSystem", "xrCreateSession"]
        );
        assert_eq!(INTERCEPT_TABLE[0].kind, InterceptKind::Lookup);
        assert_eq!(INTERCEPT_TABLE[1].kind, InterceptKind::Override);
    }

    #[test]
    fn test_disabled_passthrough_is_not_intercepted() {
        let mut config = Config::default();
        config.intercept.disabled = vec![
            "xrGetSystem".to_string(),
            "xrDestroyInstance".to_string(),
            "xrGetInstanceProcAddr".to_string(),
        ];

        assert!(find_intercept("xrGetSystem", &config).is_none());
        assert!(find_intercept("xrCreateSession", &config).is_some());
        assert!(find_intercept("xrDestroyInstance", &config).is_some());
        assert!(find_intercept("xrGetInstanceProcAddr", &config).is_some());
        assert!(find_intercept("xrPollEvent", &Config::default()).is_none());
    }

    #[test]
    fn test_unintercepted_names_match_next_layer() {
        let mut fixture = ChainFixture::new("dispatch-transparent");
        let (_, handle) = unsafe { fixture.create() };
        let next = testing::mock_next_layer();

        for name in ["xrPollEvent", "xrNotARealFunction"] {
            let c_name = CString::new(name).unwrap();
            let mut direct: PfnVoidFunction = None;
            let direct_result = unsafe { next.lookup(handle, c_name.as_ptr(), &mut direct) };
            let (routed_result, routed) = unsafe { lookup(handle, name) };

            assert_eq!(routed_result, direct_result, "{name}");
            assert_eq!(addr(routed), addr(direct), "{name}");
        }
    }

    #[test]
    fn test_unknown_instance_is_handle_invalid() {
        let name = CString::new("xrPollEvent").unwrap();
        let mut function: PfnVoidFunction = Some(testing::poison_function());
        let result =
            unsafe { xr_get_instance_proc_addr(XrInstance(u64::MAX), name.as_ptr(), &mut function) };
        assert_eq!(result, XrResult::ERROR_HANDLE_INVALID);
        assert!(function.is_none());
    }

    #[test]
    fn test_null_instance_uses_last_link() {
        let mut fixture = ChainFixture::new("dispatch-global");
        let (result, _) = unsafe { fixture.create() };
        assert!(result.succeeded());

        let (result, function) =
            unsafe { lookup(XrInstance::NULL, "xrEnumerateInstanceExtensionProperties") };
        assert_eq!(result, XrResult::SUCCESS);
        assert_eq!(addr(function), testing::global_function_addr());
    }
}
