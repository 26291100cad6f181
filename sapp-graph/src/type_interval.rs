//! Type-interval compatibility between consecutive frames (§4.4.4, I6, P6).

use sapp_core::types::entities::TypeInterval;

/// Two frames match when either side lacks an interval, either side
/// "ignores" intervals (`preserves_type_context = false`), or the two
/// intervals overlap. Symmetric in its two operands (P6).
pub fn intervals_compatible(a: Option<TypeInterval>, b: Option<TypeInterval>) -> bool {
    match (a, b) {
        (None, _) | (_, None) => true,
        (Some(a), Some(b)) => {
            if !a.preserves_type_context || !b.preserves_type_context {
                return true;
            }
            a.lower <= b.upper && b.lower <= a.upper
        }
    }
}
