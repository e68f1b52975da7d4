use once_cell::sync::Lazy;
use serde_json::{json, Value};
use std::collections::BTreeMap;

/// Platform-level settings floor. Compiled in, immutable, resolvable with
/// zero I/O; every resolution starts from these sections.
pub static PLATFORM_DEFAULTS: Lazy<BTreeMap<&'static str, Value>> = Lazy::new(|| {
    BTreeMap::from([
        (
            "general",
            json!({
                "timezone": "America/Chicago",
                "date_format": "MM/DD/YYYY",
                "currency": "USD",
                "measurement_units": "imperial",
                "week_starts_on": "monday",
            }),
        ),
        (
            "appearance",
            json!({
                "theme": "light",
                "density": "normal",
                "accent_color": "#1f6feb",
                "sidebar_collapsed": false,
            }),
        ),
        (
            "scheduling",
            json!({
                "work_days": ["mon", "tue", "wed", "thu", "fri"],
                "day_start": "07:00",
                "day_end": "17:00",
                "default_task_duration_days": 1,
                "show_weekends": false,
            }),
        ),
        (
            "estimating",
            json!({
                "default_markup_pct": 15.0,
                "default_tax_rate_pct": 0.0,
                "labor_burden_pct": 20.0,
                "rounding": "nearest_dollar",
            }),
        ),
        (
            "financials",
            json!({
                "default_payment_terms_days": 30,
                "retainage_pct": 10.0,
                "fiscal_year_start_month": 1,
                "invoice_due_reminder_days": 3,
            }),
        ),
        (
            "notifications",
            json!({
                "email_enabled": true,
                "sms_enabled": false,
                "daily_digest": true,
                "digest_hour": 6,
            }),
        ),
        (
            "documents",
            json!({
                "max_upload_mb": 50,
                "allowed_extensions": ["pdf", "png", "jpg", "dwg", "xlsx", "docx"],
                "retention_years": 7,
            }),
        ),
    ])
});

pub fn platform_section(section: &str) -> Option<&'static Value> {
    PLATFORM_DEFAULTS.get(section)
}

pub fn platform_default(section: &str, key: &str) -> Option<&'static Value> {
    PLATFORM_DEFAULTS.get(section)?.get(key)
}

/// Section names, for enumeration and override validation.
pub fn platform_sections() -> impl Iterator<Item = &'static str> {
    PLATFORM_DEFAULTS.keys().copied()
}
