//! Shared line-scanning helpers and marker lexicons.
//!
//! Detectors work line-by-line: match a signature, then inspect a
//! bounded window of surrounding lines for a mitigating marker. The
//! lexicons here are shared with the graph builder so that detector
//! findings and graph nodes agree on what counts as a route, a query,
//! or an authorization check.

use once_cell::sync::Lazy;
use regex::Regex;

/// Lines to inspect before a signature for a mitigating marker.
pub const WINDOW_BEFORE: usize = 5;
/// Lines to inspect after a signature for a mitigating marker.
pub const WINDOW_AFTER: usize = 5;

/// Route/handler declarations: decorators and router registrations.
pub static ROUTE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?i)(@(Get|Post|Put|Patch|Delete|Query|Mutation|SubscribeMessage)\b|\b(router|app)\.(get|post|put|patch|delete|use)\s*\()"#,
    )
    .unwrap()
});

/// Authorization markers that mitigate an exposed route.
pub static AUTH_MARKER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(@UseGuards|AuthGuard|RolesGuard|requireAuth|isAuthenticated|ensureAuth|authorize|checkPermission|verifyToken|passport\.authenticate|@Roles\b)",
    )
    .unwrap()
});

/// Tenant-scope markers that mitigate cross-tenant data access.
pub static TENANT_MARKER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(tenant_?id|organization_?id|org_?id|workspace_?id|company_?id)").unwrap()
});

/// Data-access operations (ORM calls and raw SQL verbs).
pub static QUERY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?i)(\.\s*(find|findOne|findMany|findById|findFirst|update|updateMany|delete|deleteMany|create|upsert|aggregate|count)\s*\(|\b(SELECT|INSERT|UPDATE|DELETE)\s+.*\b(FROM|INTO|SET|WHERE)\b)"#,
    )
    .unwrap()
});

/// Ownership/role checks that mitigate direct-object-reference lookups.
pub static OWNERSHIP_MARKER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(owner_?id|user_?id\s*[:=]|\.user\.|currentUser|req\.user|hasRole|can\(|ability\.|isOwner)")
        .unwrap()
});

/// Security-relevant function name lexicon for function-node promotion.
pub static SECURITY_FN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(auth|validate|guard|verify|sanitize|encrypt|decrypt|hash|token|session|permission|role|password)")
        .unwrap()
});

/// Returns the slice of lines in `[idx-n, idx)` (0-based `idx`).
pub fn window_before<'a>(lines: &[&'a str], idx: usize, n: usize) -> Vec<&'a str> {
    let start = idx.saturating_sub(n);
    lines[start..idx].to_vec()
}

/// Returns the slice of lines in `(idx, idx+n]` (0-based `idx`).
pub fn window_after<'a>(lines: &[&'a str], idx: usize, n: usize) -> Vec<&'a str> {
    if idx + 1 >= lines.len() {
        return Vec::new();
    }
    let end = (idx + 1 + n).min(lines.len());
    lines[idx + 1..end].to_vec()
}

/// True if any line in the window matches the marker.
pub fn window_has(window: &[&str], marker: &Regex) -> bool {
    window.iter().any(|l| marker.is_match(l))
}

/// Truncated snippet for evidence, single line, trimmed. Truncation
/// counts characters, not bytes, so multibyte text never splits.
pub fn snippet_of(line: &str) -> String {
    let trimmed = line.trim();
    if trimmed.chars().count() <= 160 {
        return trimmed.to_string();
    }
    let head: String = trimmed.chars().take(157).collect();
    format!("{}…", head)
}
