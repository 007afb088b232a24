//! In-process stand-in for the layers and runtime below us.
//!
//! The mock chain is a set of `extern "system"` functions that behave like a
//! minimal runtime. Behavior is chosen per application name through
//! [`register_plan`], and every created instance records what was asked of
//! it, so tests can run in parallel as long as each uses its own name.
//!
//! ```ignore
//! register_plan("my-test", MockPlan { failing_destroys: 1, ..MockPlan::default() });
//! let mut fixture = ChainFixture::new("my-test");
//! let (result, instance) = unsafe { fixture.create() };
//! ```

use std::collections::HashMap;
use std::ffi::{c_char, c_void, CStr};
use std::mem::{size_of, transmute};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use once_cell::sync::Lazy;

use crate::abi::*;
use crate::chain::{xr_create_api_layer_instance, NextLayer};
use crate::resolve::RealFunctions;
use crate::LAYER_NAME;

pub const MOCK_SYSTEM_ID: XrSystemId = 0x5157_0001;
pub const MOCK_ALT_SYSTEM_ID: XrSystemId = 0x5157_0002;
pub const MOCK_RUNTIME_NAME: &str = "xrsplice mock runtime";
pub const MOCK_SYSTEM_NAME: &str = "xrsplice mock system";
pub const MOCK_TAIL_LAYER_NAME: &str = "XR_APILAYER_XRSPLICE_mock_tail";

/// How the mock runtime behaves for one application.
#[derive(Debug, Clone)]
pub struct MockPlan {
    /// Returned by instance creation. Failures create nothing.
    pub create_result: XrResult,
    /// Names `xrGetInstanceProcAddr` refuses to resolve.
    pub unresolvable: Vec<&'static str>,
    /// Number of `xrDestroyInstance` calls that fail before one succeeds.
    pub failing_destroys: u32,
    /// Resolve `xrGetSystem` to a variant reporting [`MOCK_ALT_SYSTEM_ID`].
    pub alternate_get_system: bool,
}

impl Default for MockPlan {
    fn default() -> Self {
        Self {
            create_result: XrResult::SUCCESS,
            unresolvable: Vec::new(),
            failing_destroys: 0,
            alternate_get_system: false,
        }
    }
}

/// What the mock runtime knows about one instance.
#[derive(Debug, Clone)]
pub struct MockInstance {
    pub application: String,
    pub plan: MockPlan,
    pub alive: bool,
    /// Names looked up through `xrGetInstanceProcAddr`, in order.
    pub queried: Vec<String>,
    /// Address of the `next_info` the instance was created with.
    pub received_next_info: usize,
    pub destroy_calls: u32,
    pub get_system_calls: u32,
    pub system_properties_calls: u32,
    pub get_instance_properties_calls: u32,
    pub create_session_calls: u32,
}

impl MockInstance {
    fn new(application: &str, plan: MockPlan, received_next_info: usize) -> Self {
        Self {
            application: application.to_string(),
            plan,
            alive: true,
            queried: Vec::new(),
            received_next_info,
            destroy_calls: 0,
            get_system_calls: 0,
            system_properties_calls: 0,
            get_instance_properties_calls: 0,
            create_session_calls: 0,
        }
    }
}

static PLANS: Lazy<Mutex<HashMap<String, MockPlan>>> = Lazy::new(|| Mutex::new(HashMap::new()));
static INSTANCES: Lazy<Mutex<HashMap<u64, MockInstance>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));
static NEXT_HANDLE: AtomicU64 = AtomicU64::new(0x1000);

fn plans() -> MutexGuard<'static, HashMap<String, MockPlan>> {
    PLANS.lock().unwrap_or_else(PoisonError::into_inner)
}

fn instances() -> MutexGuard<'static, HashMap<u64, MockInstance>> {
    INSTANCES.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Set the behavior for instances created by `application`.
pub fn register_plan(application: &str, plan: MockPlan) {
    plans().insert(application.to_string(), plan);
}

fn plan_for(application: &str) -> MockPlan {
    plans().get(application).cloned().unwrap_or_default()
}

/// Snapshot of a mock instance, alive or destroyed.
pub fn instance(handle: XrInstance) -> Option<MockInstance> {
    instances().get(&handle.0).cloned()
}

/// Handles of every instance the mock runtime created for `application`.
pub fn instances_for(application: &str) -> Vec<XrInstance> {
    instances()
        .iter()
        .filter(|(_, state)| state.application == application)
        .map(|(handle, _)| XrInstance(*handle))
        .collect()
}

/// Create a mock instance directly, without going through the layer.
pub fn spawn_instance(application: &str, plan: MockPlan) -> XrInstance {
    register_plan(application, plan.clone());
    let handle = NEXT_HANDLE.fetch_add(1, Ordering::Relaxed);
    instances().insert(handle, MockInstance::new(application, plan, 0));
    XrInstance(handle)
}

/// Session handle the mock runtime hands out for `instance`.
pub fn mock_session_for(instance: XrInstance) -> XrSession {
    XrSession((instance.0 << 16) | 1)
}

fn with_instance<F>(instance: XrInstance, f: F) -> XrResult
where
    F: FnOnce(&mut MockInstance) -> XrResult,
{
    match instances().get_mut(&instance.0) {
        Some(state) if state.alive => f(state),
        _ => XrResult::ERROR_HANDLE_INVALID,
    }
}

macro_rules! erase {
    ($f:expr, $pfn:ty) => {
        unsafe { transmute::<$pfn, VoidFunction>($f as $pfn) }
    };
}

type PfnEnumerateInstanceExtensionProperties =
    unsafe extern "system" fn(*const c_char, u32, *mut u32, *mut c_void) -> XrResult;
type PfnPollEvent = unsafe extern "system" fn(XrInstance, *mut c_void) -> XrResult;

/// The mock's `xrGetInstanceProcAddr`.
pub unsafe extern "system" fn mock_get_instance_proc_addr(
    instance: XrInstance,
    name: *const c_char,
    function: *mut PfnVoidFunction,
) -> XrResult {
    if name.is_null() || function.is_null() {
        return XrResult::ERROR_VALIDATION_FAILURE;
    }
    *function = None;
    let name = CStr::from_ptr(name).to_string_lossy().into_owned();

    if instance.is_null() {
        return match name.as_str() {
            "xrEnumerateInstanceExtensionProperties" => {
                *function = Some(global_function());
                XrResult::SUCCESS
            }
            _ => XrResult::ERROR_FUNCTION_UNSUPPORTED,
        };
    }

    let plan = {
        let mut instances = instances();
        let Some(state) = instances.get_mut(&instance.0) else {
            return XrResult::ERROR_HANDLE_INVALID;
        };
        state.queried.push(name.clone());
        state.plan.clone()
    };
    if plan.unresolvable.contains(&name.as_str()) {
        return XrResult::ERROR_FUNCTION_UNSUPPORTED;
    }

    let resolved = match name.as_str() {
        "xrGetInstanceProcAddr" => {
            erase!(mock_get_instance_proc_addr, PfnGetInstanceProcAddr)
        }
        "xrDestroyInstance" => erase!(mock_destroy_instance, PfnDestroyInstance),
        "xrGetSystem" if plan.alternate_get_system => {
            erase!(mock_alt_get_system, PfnGetSystem)
        }
        "xrGetSystem" => erase!(mock_get_system, PfnGetSystem),
        "xrGetSystemProperties" => {
            erase!(mock_get_system_properties, PfnGetSystemProperties)
        }
        "xrGetInstanceProperties" => {
            erase!(mock_get_instance_properties, PfnGetInstanceProperties)
        }
        "xrCreateSession" => erase!(mock_create_session, PfnCreateSession),
        "xrPollEvent" => erase!(mock_poll_event, PfnPollEvent),
        _ => return XrResult::ERROR_FUNCTION_UNSUPPORTED,
    };
    *function = Some(resolved);
    XrResult::SUCCESS
}

/// The mock's `xrCreateApiLayerInstance`; the bottom of every test chain.
pub unsafe extern "system" fn mock_create_api_layer_instance(
    create_info: *const XrInstanceCreateInfo,
    api_layer_info: *const XrApiLayerCreateInfo,
    instance: *mut XrInstance,
) -> XrResult {
    let (Some(create_info), Some(api_layer_info)) = (create_info.as_ref(), api_layer_info.as_ref())
    else {
        return XrResult::ERROR_VALIDATION_FAILURE;
    };
    if instance.is_null() {
        return XrResult::ERROR_VALIDATION_FAILURE;
    }

    let application = fixed_str(&create_info.application_info.application_name);
    let plan = plan_for(&application);
    if plan.create_result.failed() {
        return plan.create_result;
    }

    let result = plan.create_result;
    let handle = NEXT_HANDLE.fetch_add(1, Ordering::Relaxed);
    instances().insert(
        handle,
        MockInstance::new(&application, plan, api_layer_info.next_info as usize),
    );
    *instance = XrInstance(handle);
    result
}

unsafe extern "system" fn mock_destroy_instance(instance: XrInstance) -> XrResult {
    with_instance(instance, |state| {
        state.destroy_calls += 1;
        if state.plan.failing_destroys > 0 {
            state.plan.failing_destroys -= 1;
            return XrResult::ERROR_RUNTIME_FAILURE;
        }
        state.alive = false;
        XrResult::SUCCESS
    })
}

unsafe extern "system" fn mock_get_system(
    instance: XrInstance,
    _get_info: *const XrSystemGetInfo,
    system_id: *mut XrSystemId,
) -> XrResult {
    report_system(instance, system_id, MOCK_SYSTEM_ID)
}

unsafe extern "system" fn mock_alt_get_system(
    instance: XrInstance,
    _get_info: *const XrSystemGetInfo,
    system_id: *mut XrSystemId,
) -> XrResult {
    report_system(instance, system_id, MOCK_ALT_SYSTEM_ID)
}

unsafe fn report_system(instance: XrInstance, out: *mut XrSystemId, id: XrSystemId) -> XrResult {
    if out.is_null() {
        return XrResult::ERROR_VALIDATION_FAILURE;
    }
    let result = with_instance(instance, |state| {
        state.get_system_calls += 1;
        XrResult::SUCCESS
    });
    if result.succeeded() {
        *out = id;
    }
    result
}

unsafe extern "system" fn mock_get_system_properties(
    instance: XrInstance,
    system_id: XrSystemId,
    properties: *mut XrSystemProperties,
) -> XrResult {
    let Some(properties) = properties.as_mut() else {
        return XrResult::ERROR_VALIDATION_FAILURE;
    };
    let result = with_instance(instance, |state| {
        state.system_properties_calls += 1;
        XrResult::SUCCESS
    });
    if result.succeeded() {
        properties.system_id = system_id;
        properties.vendor_id = 0x5157;
        write_fixed_str(&mut properties.system_name, MOCK_SYSTEM_NAME);
    }
    result
}

unsafe extern "system" fn mock_get_instance_properties(
    instance: XrInstance,
    properties: *mut XrInstanceProperties,
) -> XrResult {
    let Some(properties) = properties.as_mut() else {
        return XrResult::ERROR_VALIDATION_FAILURE;
    };
    let result = with_instance(instance, |state| {
        state.get_instance_properties_calls += 1;
        XrResult::SUCCESS
    });
    if result.succeeded() {
        properties.runtime_version = XR_CURRENT_API_VERSION;
        write_fixed_str(&mut properties.runtime_name, MOCK_RUNTIME_NAME);
    }
    result
}

unsafe extern "system" fn mock_create_session(
    instance: XrInstance,
    _create_info: *const XrSessionCreateInfo,
    session: *mut XrSession,
) -> XrResult {
    if session.is_null() {
        return XrResult::ERROR_VALIDATION_FAILURE;
    }
    let result = with_instance(instance, |state| {
        state.create_session_calls += 1;
        XrResult::SUCCESS
    });
    if result.succeeded() {
        *session = mock_session_for(instance);
    }
    result
}

/// Always `XR_EVENT_UNAVAILABLE`.
unsafe extern "system" fn mock_poll_event(_instance: XrInstance, _event: *mut c_void) -> XrResult {
    XrResult(4)
}

unsafe extern "system" fn mock_enumerate_instance_extension_properties(
    _layer_name: *const c_char,
    _capacity: u32,
    count: *mut u32,
    _properties: *mut c_void,
) -> XrResult {
    if let Some(count) = count.as_mut() {
        *count = 0;
    }
    XrResult::SUCCESS
}

fn global_function() -> VoidFunction {
    erase!(
        mock_enumerate_instance_extension_properties,
        PfnEnumerateInstanceExtensionProperties
    )
}

/// Address the mock resolves for instance-less lookups.
pub fn global_function_addr() -> usize {
    global_function() as usize
}

/// A function pointer that must never be called; used to check that
/// outputs are cleared.
pub fn poison_function() -> VoidFunction {
    erase!(mock_poll_event, PfnPollEvent)
}

pub fn mock_next_layer() -> NextLayer {
    NextLayer::new(mock_get_instance_proc_addr, mock_create_api_layer_instance)
}

/// Real functions pointing straight at the mock runtime.
pub fn mock_real_functions() -> RealFunctions {
    RealFunctions {
        destroy_instance: mock_destroy_instance,
        get_system: mock_get_system,
        create_session: mock_create_session,
        get_instance_properties: mock_get_instance_properties,
        get_system_properties: mock_get_system_properties,
    }
}

/// A well-formed link addressed to `layer_name`, pointing at the mock.
pub fn next_link(layer_name: &str) -> XrApiLayerNextInfo {
    let mut link = XrApiLayerNextInfo::zeroed();
    link.struct_type = XrLoaderInterfaceStructs::API_LAYER_NEXT_INFO;
    link.struct_version = XR_API_LAYER_NEXT_INFO_STRUCT_VERSION;
    link.struct_size = size_of::<XrApiLayerNextInfo>();
    write_fixed_str(&mut link.layer_name, layer_name);
    link.next_get_instance_proc_addr = Some(mock_get_instance_proc_addr as PfnGetInstanceProcAddr);
    link.next_create_api_layer_instance =
        Some(mock_create_api_layer_instance as PfnCreateApiLayerInstance);
    link
}

/// What the loader passes to negotiation.
pub fn loader_info() -> XrNegotiateLoaderInfo {
    XrNegotiateLoaderInfo {
        struct_type: XrLoaderInterfaceStructs::LOADER_INFO,
        struct_version: XR_LOADER_INFO_STRUCT_VERSION,
        struct_size: size_of::<XrNegotiateLoaderInfo>(),
        min_interface_version: 1,
        max_interface_version: XR_CURRENT_LOADER_API_LAYER_VERSION,
        min_api_version: xr_make_version(1, 0, 0),
        max_api_version: xr_make_version(1, 0x3ff, 0xfff),
    }
}

/// An empty response, headers filled in by the loader.
pub fn api_layer_request() -> XrNegotiateApiLayerRequest {
    let mut request = XrNegotiateApiLayerRequest::zeroed();
    request.struct_type = XrLoaderInterfaceStructs::API_LAYER_REQUEST;
    request.struct_version = XR_API_LAYER_INFO_STRUCT_VERSION;
    request.struct_size = size_of::<XrNegotiateApiLayerRequest>();
    request
}

/// The structures the loader builds for `xrCreateApiLayerInstance`, with
/// this layer's link followed by a tail link for the mock below.
///
/// Everything is boxed so the internal pointers survive moves.
pub struct ChainFixture {
    pub create_info: Box<XrInstanceCreateInfo>,
    pub layer_info: Box<XrApiLayerCreateInfo>,
    pub link: Box<XrApiLayerNextInfo>,
    pub tail: Box<XrApiLayerNextInfo>,
}

impl ChainFixture {
    pub fn new(application: &str) -> Self {
        let mut create_info = Box::new(XrInstanceCreateInfo::zeroed());
        create_info.ty = XrStructureType::INSTANCE_CREATE_INFO;
        create_info.application_info.api_version = XR_CURRENT_API_VERSION;
        write_fixed_str(&mut create_info.application_info.application_name, application);

        let mut tail = Box::new(next_link(MOCK_TAIL_LAYER_NAME));
        let mut link = Box::new(next_link(LAYER_NAME));
        link.next = &mut *tail;

        let mut layer_info = Box::new(XrApiLayerCreateInfo::zeroed());
        layer_info.struct_type = XrLoaderInterfaceStructs::API_LAYER_CREATE_INFO;
        layer_info.struct_version = XR_API_LAYER_CREATE_INFO_STRUCT_VERSION;
        layer_info.struct_size = size_of::<XrApiLayerCreateInfo>();
        layer_info.next_info = &mut *link;

        Self {
            create_info,
            layer_info,
            link,
            tail,
        }
    }

    /// Address the layer should hand to the mock as `next_info`.
    pub fn tail_addr(&self) -> usize {
        &*self.tail as *const XrApiLayerNextInfo as usize
    }

    /// Run `xrCreateApiLayerInstance` through the layer.
    ///
    /// # Safety
    /// Calls into the layer's C entry point with the fixture's pointers.
    pub unsafe fn create(&mut self) -> (XrResult, XrInstance) {
        let mut instance = XrInstance::NULL;
        let result = xr_create_api_layer_instance(&*self.create_info, &*self.layer_info, &mut instance);
        (result, instance)
    }
}
