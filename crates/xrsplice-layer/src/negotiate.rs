//! Loader handshake (`xrNegotiateLoaderApiLayerInterface`).

use std::ffi::{c_char, CStr};
use std::mem::size_of;

use xrsplice_config::{log_negotiate_debug, log_negotiate_info, log_negotiate_warn};

use crate::abi::*;
use crate::chain::xr_create_api_layer_instance;
use crate::dispatch::xr_get_instance_proc_addr;
use crate::error::{LayerError, Result};
use crate::LAYER_NAME;

/// Validate the loader's offer and fill in our half of the contract.
///
/// The response is written only once every check has passed.
pub fn negotiate(
    loader_info: Option<&XrNegotiateLoaderInfo>,
    layer_name: Option<&CStr>,
    request: Option<&mut XrNegotiateApiLayerRequest>,
) -> Result<()> {
    let (Some(loader_info), Some(request)) = (loader_info, request) else {
        return Err(LayerError::InitializationFailed("missing negotiation structure"));
    };

    if loader_info.struct_type != XrLoaderInterfaceStructs::LOADER_INFO
        || loader_info.struct_version != XR_LOADER_INFO_STRUCT_VERSION
        || loader_info.struct_size != size_of::<XrNegotiateLoaderInfo>()
    {
        log_negotiate_warn!(
            "Loader info header mismatch",
            struct_type = loader_info.struct_type.0,
            struct_version = loader_info.struct_version,
            struct_size = loader_info.struct_size
        );
        return Err(LayerError::InitializationFailed("loader info header mismatch"));
    }

    if request.struct_type != XrLoaderInterfaceStructs::API_LAYER_REQUEST
        || request.struct_version != XR_API_LAYER_INFO_STRUCT_VERSION
        || request.struct_size != size_of::<XrNegotiateApiLayerRequest>()
    {
        log_negotiate_warn!(
            "Layer request header mismatch",
            struct_type = request.struct_type.0,
            struct_version = request.struct_version,
            struct_size = request.struct_size
        );
        return Err(LayerError::InitializationFailed("layer request header mismatch"));
    }

    let interface = XR_CURRENT_LOADER_API_LAYER_VERSION;
    if loader_info.min_interface_version > interface
        || loader_info.max_interface_version < interface
        || loader_info.min_api_version > XR_CURRENT_API_VERSION
        || loader_info.max_api_version < XR_CURRENT_API_VERSION
    {
        let min_api = format_version(loader_info.min_api_version);
        let max_api = format_version(loader_info.max_api_version);
        log_negotiate_warn!(
            "Loader version range excludes this layer",
            min_interface = loader_info.min_interface_version,
            max_interface = loader_info.max_interface_version,
            min_api = min_api.as_str(),
            max_api = max_api.as_str()
        );
        return Err(LayerError::InitializationFailed("unsupported version range"));
    }

    if let Some(name) = layer_name {
        if name.to_bytes() != LAYER_NAME.as_bytes() {
            log_negotiate_warn!(
                "Loader asked for another layer",
                expected = LAYER_NAME,
                found = &*name.to_string_lossy()
            );
            return Err(LayerError::InitializationFailed("layer name mismatch"));
        }
    }

    request.layer_interface_version = interface;
    request.layer_api_version = XR_CURRENT_API_VERSION;
    request.get_instance_proc_addr = Some(xr_get_instance_proc_addr as PfnGetInstanceProcAddr);
    request.create_api_layer_instance =
        Some(xr_create_api_layer_instance as PfnCreateApiLayerInstance);

    log_negotiate_debug!(
        "Negotiated",
        interface_version = interface,
        api_version = &*format_version(XR_CURRENT_API_VERSION)
    );
    Ok(())
}

/// Loader entry point named in the layer manifest.
///
/// # Safety
/// Pointers must be null or point to valid negotiation structures.
#[no_mangle]
#[allow(non_snake_case)]
pub unsafe extern "system" fn xrNegotiateLoaderApiLayerInterface(
    loader_info: *const XrNegotiateLoaderInfo,
    layer_name: *const c_char,
    request: *mut XrNegotiateApiLayerRequest,
) -> XrResult {
    crate::bootstrap();

    let layer_name = (!layer_name.is_null()).then(|| CStr::from_ptr(layer_name));
    match negotiate(loader_info.as_ref(), layer_name, request.as_mut()) {
        Ok(()) => {
            log_negotiate_info!("Layer loaded", layer = LAYER_NAME);
            XrResult::SUCCESS
        }
        Err(err) => err.result(),
    }
}
