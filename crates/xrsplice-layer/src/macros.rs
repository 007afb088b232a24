/// Generate an interceptor that forwards straight to the instance's real
/// function.
///
/// ```ignore
/// passthrough_interceptor! {
///     fn create_session(instance, info: *const XrSessionCreateInfo, session: *mut XrSession)
///         => create_session as "xrCreateSession";
/// }
/// ```
macro_rules! passthrough_interceptor {
    ($(#[$meta:meta])*
     fn $name:ident($instance:ident $(, $arg:ident: $ty:ty)*) => $real:ident as $xr_name:literal;) => {
        $(#[$meta])*
        pub unsafe extern "system" fn $name($instance: XrInstance $(, $arg: $ty)*) -> XrResult {
            let Some(layer_session) = active_session($instance, $xr_name) else {
                return XrResult::ERROR_HANDLE_INVALID;
            };
            let result = (layer_session.reals().$real)($instance $(, $arg)*);
            ::xrsplice_config::log_intercept_trace!(
                "Forwarded",
                function = $xr_name,
                instance = $instance.0,
                result = result.name()
            );
            result
        }
    };
}
