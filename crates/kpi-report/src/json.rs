use kpi_core::ReportData;

/// Format a full KPI report as JSON.
pub fn format_report(data: &ReportData, compact: bool) -> String {
    if compact {
        serde_json::to_string(data).expect("ReportData should be serializable")
    } else {
        serde_json::to_string_pretty(data).expect("ReportData should be serializable")
    }
}
