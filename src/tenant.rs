//! Tenant identity normalization shared by every governance component.

/// Tenant that all anonymous traffic is accounted against.
pub const UNKNOWN_TENANT: &str = "_unknown";

/// Maps an empty or blank tenant id to [`UNKNOWN_TENANT`].
///
/// Anonymous callers therefore share one bucket, one budget and one cache
/// namespace instead of slipping past per-tenant limits.
pub fn normalize_tenant(tenant_id: &str) -> &str {
    if tenant_id.trim().is_empty() {
        UNKNOWN_TENANT
    } else {
        tenant_id
    }
}
