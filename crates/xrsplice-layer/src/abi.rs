//! OpenXR loader ABI mirrors.
//!
//! `#[repr(C)]` copies of the structures and entry point signatures from
//! `openxr.h` and `openxr_loader_negotiation.h` that the layer touches. The
//! loader validates `struct_size` against its own `sizeof`, so field order
//! and types here must track the headers exactly.

use std::ffi::{c_char, c_void, CStr};
use std::fmt;

pub type XrVersion = u64;
pub type XrFlags64 = u64;
pub type XrSystemId = u64;
pub type XrBool32 = u32;

pub const XR_MAX_APPLICATION_NAME_SIZE: usize = 128;
pub const XR_MAX_ENGINE_NAME_SIZE: usize = 128;
pub const XR_MAX_RUNTIME_NAME_SIZE: usize = 128;
pub const XR_MAX_SYSTEM_NAME_SIZE: usize = 256;
pub const XR_MAX_API_LAYER_NAME_SIZE: usize = 256;
pub const XR_API_LAYER_MAX_SETTINGS_PATH_SIZE: usize = 512;

pub const XR_LOADER_INFO_STRUCT_VERSION: u32 = 1;
pub const XR_API_LAYER_INFO_STRUCT_VERSION: u32 = 1;
pub const XR_API_LAYER_CREATE_INFO_STRUCT_VERSION: u32 = 1;
pub const XR_API_LAYER_NEXT_INFO_STRUCT_VERSION: u32 = 1;
pub const XR_CURRENT_LOADER_API_LAYER_VERSION: u32 = 1;

/// `XR_MAKE_VERSION`
pub const fn xr_make_version(major: u64, minor: u64, patch: u64) -> XrVersion {
    ((major & 0xffff) << 48) | ((minor & 0xffff) << 32) | (patch & 0xffff_ffff)
}

/// API version this layer is built against.
pub const XR_CURRENT_API_VERSION: XrVersion = xr_make_version(1, 0, 34);

/// Render an `XrVersion` as `major.minor.patch`.
pub fn format_version(version: XrVersion) -> String {
    format!(
        "{}.{}.{}",
        version >> 48,
        (version >> 32) & 0xffff,
        version & 0xffff_ffff
    )
}

/// `XrInstance` handle.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct XrInstance(pub u64);

impl XrInstance {
    pub const NULL: Self = Self(0);

    pub fn is_null(self) -> bool {
        self.0 == 0
    }
}

/// `XrSession` handle.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct XrSession(pub u64);

/// `XrResult`. Negative values are errors, everything else succeeded.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct XrResult(pub i32);

impl XrResult {
    pub const SUCCESS: Self = Self(0);
    pub const ERROR_VALIDATION_FAILURE: Self = Self(-1);
    pub const ERROR_RUNTIME_FAILURE: Self = Self(-2);
    pub const ERROR_OUT_OF_MEMORY: Self = Self(-3);
    pub const ERROR_API_VERSION_UNSUPPORTED: Self = Self(-4);
    pub const ERROR_INITIALIZATION_FAILED: Self = Self(-6);
    pub const ERROR_FUNCTION_UNSUPPORTED: Self = Self(-7);
    pub const ERROR_HANDLE_INVALID: Self = Self(-12);

    /// `XR_SUCCEEDED`
    pub fn succeeded(self) -> bool {
        self.0 >= 0
    }

    /// `XR_FAILED`
    pub fn failed(self) -> bool {
        self.0 < 0
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::SUCCESS => "XR_SUCCESS",
            Self::ERROR_VALIDATION_FAILURE => "XR_ERROR_VALIDATION_FAILURE",
            Self::ERROR_RUNTIME_FAILURE => "XR_ERROR_RUNTIME_FAILURE",
            Self::ERROR_OUT_OF_MEMORY => "XR_ERROR_OUT_OF_MEMORY",
            Self::ERROR_API_VERSION_UNSUPPORTED => "XR_ERROR_API_VERSION_UNSUPPORTED",
            Self::ERROR_INITIALIZATION_FAILED => "XR_ERROR_INITIALIZATION_FAILED",
            Self::ERROR_FUNCTION_UNSUPPORTED => "XR_ERROR_FUNCTION_UNSUPPORTED",
            Self::ERROR_HANDLE_INVALID => "XR_ERROR_HANDLE_INVALID",
            _ if self.succeeded() => "XR_SUCCEEDED",
            _ => "XR_FAILED",
        }
    }
}

impl fmt::Debug for XrResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name(), self.0)
    }
}

impl fmt::Display for XrResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// `XrStructureType` (only the values the layer reads or writes).
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XrStructureType(pub i32);

impl XrStructureType {
    pub const INSTANCE_CREATE_INFO: Self = Self(3);
    pub const SYSTEM_GET_INFO: Self = Self(4);
    pub const SYSTEM_PROPERTIES: Self = Self(5);
    pub const SESSION_CREATE_INFO: Self = Self(8);
    pub const INSTANCE_PROPERTIES: Self = Self(32);
}

/// `XrLoaderInterfaceStructs`
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XrLoaderInterfaceStructs(pub i32);

impl XrLoaderInterfaceStructs {
    pub const LOADER_INFO: Self = Self(1);
    pub const API_LAYER_REQUEST: Self = Self(2);
    pub const API_LAYER_CREATE_INFO: Self = Self(4);
    pub const API_LAYER_NEXT_INFO: Self = Self(5);
}

/// Non-null `PFN_xrVoidFunction`.
pub type VoidFunction = unsafe extern "system" fn();
/// `PFN_xrVoidFunction`
pub type PfnVoidFunction = Option<VoidFunction>;

pub type PfnGetInstanceProcAddr =
    unsafe extern "system" fn(XrInstance, *const c_char, *mut PfnVoidFunction) -> XrResult;
pub type PfnCreateApiLayerInstance = unsafe extern "system" fn(
    *const XrInstanceCreateInfo,
    *const XrApiLayerCreateInfo,
    *mut XrInstance,
) -> XrResult;
pub type PfnDestroyInstance = unsafe extern "system" fn(XrInstance) -> XrResult;
pub type PfnGetInstanceProperties =
    unsafe extern "system" fn(XrInstance, *mut XrInstanceProperties) -> XrResult;
pub type PfnGetSystem =
    unsafe extern "system" fn(XrInstance, *const XrSystemGetInfo, *mut XrSystemId) -> XrResult;
pub type PfnGetSystemProperties =
    unsafe extern "system" fn(XrInstance, XrSystemId, *mut XrSystemProperties) -> XrResult;
pub type PfnCreateSession =
    unsafe extern "system" fn(XrInstance, *const XrSessionCreateInfo, *mut XrSession) -> XrResult;

/// `XrNegotiateLoaderInfo`
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct XrNegotiateLoaderInfo {
    pub struct_type: XrLoaderInterfaceStructs,
    pub struct_version: u32,
    pub struct_size: usize,
    pub min_interface_version: u32,
    pub max_interface_version: u32,
    pub min_api_version: XrVersion,
    pub max_api_version: XrVersion,
}

/// `XrNegotiateApiLayerRequest`
#[repr(C)]
#[derive(Clone, Copy)]
pub struct XrNegotiateApiLayerRequest {
    pub struct_type: XrLoaderInterfaceStructs,
    pub struct_version: u32,
    pub struct_size: usize,
    pub layer_interface_version: u32,
    pub layer_api_version: XrVersion,
    pub get_instance_proc_addr: Option<PfnGetInstanceProcAddr>,
    pub create_api_layer_instance: Option<PfnCreateApiLayerInstance>,
}

/// `XrApiLayerNextInfo`: one link of the chain handed to
/// `xrCreateApiLayerInstance`.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct XrApiLayerNextInfo {
    pub struct_type: XrLoaderInterfaceStructs,
    pub struct_version: u32,
    pub struct_size: usize,
    pub layer_name: [c_char; XR_MAX_API_LAYER_NAME_SIZE],
    pub next_get_instance_proc_addr: Option<PfnGetInstanceProcAddr>,
    pub next_create_api_layer_instance: Option<PfnCreateApiLayerInstance>,
    pub next: *mut XrApiLayerNextInfo,
}

/// `XrApiLayerCreateInfo`
#[repr(C)]
#[derive(Clone, Copy)]
pub struct XrApiLayerCreateInfo {
    pub struct_type: XrLoaderInterfaceStructs,
    pub struct_version: u32,
    pub struct_size: usize,
    pub loader_instance: *mut c_void,
    pub settings_file_location: [c_char; XR_API_LAYER_MAX_SETTINGS_PATH_SIZE],
    pub next_info: *mut XrApiLayerNextInfo,
}

/// `XrApplicationInfo`
#[repr(C)]
#[derive(Clone, Copy)]
pub struct XrApplicationInfo {
    pub application_name: [c_char; XR_MAX_APPLICATION_NAME_SIZE],
    pub application_version: u32,
    pub engine_name: [c_char; XR_MAX_ENGINE_NAME_SIZE],
    pub engine_version: u32,
    pub api_version: XrVersion,
}

/// `XrInstanceCreateInfo`
#[repr(C)]
#[derive(Clone, Copy)]
pub struct XrInstanceCreateInfo {
    pub ty: XrStructureType,
    pub next: *const c_void,
    pub create_flags: XrFlags64,
    pub application_info: XrApplicationInfo,
    pub enabled_api_layer_count: u32,
    pub enabled_api_layer_names: *const *const c_char,
    pub enabled_extension_count: u32,
    pub enabled_extension_names: *const *const c_char,
}

/// `XrInstanceProperties`
#[repr(C)]
#[derive(Clone, Copy)]
pub struct XrInstanceProperties {
    pub ty: XrStructureType,
    pub next: *mut c_void,
    pub runtime_version: XrVersion,
    pub runtime_name: [c_char; XR_MAX_RUNTIME_NAME_SIZE],
}

/// `XrSystemGetInfo`
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct XrSystemGetInfo {
    pub ty: XrStructureType,
    pub next: *const c_void,
    pub form_factor: i32,
}

/// `XrSystemGraphicsProperties`
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct XrSystemGraphicsProperties {
    pub max_swapchain_image_height: u32,
    pub max_swapchain_image_width: u32,
    pub max_layer_count: u32,
}

/// `XrSystemTrackingProperties`
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct XrSystemTrackingProperties {
    pub orientation_tracking: XrBool32,
    pub position_tracking: XrBool32,
}

/// `XrSystemProperties`
#[repr(C)]
#[derive(Clone, Copy)]
pub struct XrSystemProperties {
    pub ty: XrStructureType,
    pub next: *mut c_void,
    pub system_id: XrSystemId,
    pub vendor_id: u32,
    pub system_name: [c_char; XR_MAX_SYSTEM_NAME_SIZE],
    pub graphics_properties: XrSystemGraphicsProperties,
    pub tracking_properties: XrSystemTrackingProperties,
}

/// `XrSessionCreateInfo`
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct XrSessionCreateInfo {
    pub ty: XrStructureType,
    pub next: *const c_void,
    pub create_flags: XrFlags64,
    pub system_id: XrSystemId,
}

// Every field of the structs below is an integer, a raw pointer, a
// nullable function pointer or a char array, so all-zero is a valid value.
macro_rules! zeroed_ctor {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl $ty {
                /// All-zero value, as C code gets from `= {0}`.
                pub fn zeroed() -> Self {
                    unsafe { std::mem::zeroed() }
                }
            }
        )+
    };
}

zeroed_ctor!(
    XrNegotiateLoaderInfo,
    XrNegotiateApiLayerRequest,
    XrApiLayerNextInfo,
    XrApiLayerCreateInfo,
    XrApplicationInfo,
    XrInstanceCreateInfo,
    XrInstanceProperties,
    XrSystemProperties,
);

/// View a fixed-size, NUL-terminated C char array as a `CStr`.
///
/// Returns `None` when the array holds no terminator.
pub fn fixed_cstr(buf: &[c_char]) -> Option<&CStr> {
    // c_char is i8 or u8 depending on the target; both are one byte.
    let bytes = unsafe { std::slice::from_raw_parts(buf.as_ptr().cast::<u8>(), buf.len()) };
    CStr::from_bytes_until_nul(bytes).ok()
}

/// Lossy UTF-8 view of a fixed-size C char array, for logging.
pub fn fixed_str(buf: &[c_char]) -> String {
    fixed_cstr(buf)
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Copy `value` into a fixed-size C char array, truncating so that the
/// terminator always fits.
pub fn write_fixed_str(buf: &mut [c_char], value: &str) {
    let Some(capacity) = buf.len().checked_sub(1) else {
        return;
    };
    let bytes = value.as_bytes();
    let len = bytes.len().min(capacity);
    for (dst, src) in buf.iter_mut().zip(&bytes[..len]) {
        *dst = *src as c_char;
    }
    buf[len] = 0;
}
