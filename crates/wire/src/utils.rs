//! Internal helper macros.

/// Returns `Err($error)` early when `$predicate` does not hold.
///
/// ```ignore
/// ensure!(offset <= max_net_buffer, ParseError::too_large_body(offset, max_net_buffer));
/// ```
macro_rules! ensure {
    ($predicate:expr, $error:expr) => {
        if !$predicate {
            return Err($error);
        }
    };
}

pub(crate) use ensure;
