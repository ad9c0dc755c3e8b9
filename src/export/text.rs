//! Plain-text export format.

use crate::core::{EngineError, EngineResult, ResultRecord};
use crate::export::{ExportDocument, ExportRenderer};

use std::fmt::Write;

/// Renders a commented header followed by one block per subdomain.
///
/// ```text
/// # Subdomain Enumeration Results
/// # Domain: example.com
/// # Generated at: 2024-05-01 12:30:00
/// # Total subdomains: 1
///
/// www.example.com
///   IP: 93.184.216.34
///   HTTPS: 200
///   Server: ECS
///   Cloudflare: Disabled
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct TextRenderer;

fn write_record(out: &mut String, record: &ResultRecord) -> std::fmt::Result {
    writeln!(out, "{}", record.subdomain)?;
    if let Some(ip) = record.ip {
        writeln!(out, "  IP: {ip}")?;
    }
    if let Some(status) = record.http_status {
        writeln!(out, "  HTTP: {status}")?;
    }
    if let Some(status) = record.https_status {
        writeln!(out, "  HTTPS: {status}")?;
    }
    if let Some(server) = &record.server {
        writeln!(out, "  Server: {server}")?;
    }
    writeln!(out, "  Cloudflare: {}", record.cloudflare)?;
    Ok(())
}

fn write_document(out: &mut String, document: &ExportDocument) -> std::fmt::Result {
    writeln!(out, "# Subdomain Enumeration Results")?;
    writeln!(out, "# Domain: {}", document.domain)?;
    writeln!(
        out,
        "# Generated at: {}",
        document.generated_at.format("%Y-%m-%d %H:%M:%S")
    )?;
    writeln!(out, "# Total subdomains: {}", document.count)?;
    for record in &document.subdomains {
        writeln!(out)?;
        write_record(out, record)?;
    }
    Ok(())
}

impl ExportRenderer for TextRenderer {
    fn content_type(&self) -> &'static str {
        "text/plain; charset=utf-8"
    }

    fn render(&self, document: &ExportDocument) -> EngineResult<Vec<u8>> {
        let mut out = String::new();
        write_document(&mut out, document).map_err(|e| EngineError::internal(e.to_string()))?;
        Ok(out.into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{CloudflareState, JobId};
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_text_rendering() {
        let document = ExportDocument {
            domain: "example.com".to_string(),
            scan_id: JobId::new(),
            generated_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap(),
            count: 2,
            subdomains: vec![
                ResultRecord::new("www.example.com")
                    .with_ip("192.0.2.1".parse().unwrap())
                    .with_https_status(200)
                    .with_server("cloudflare")
                    .with_cloudflare(CloudflareState::Enabled),
                ResultRecord::new("old.example.com"),
            ],
        };

        let text = String::from_utf8(TextRenderer.render(&document).unwrap()).unwrap();
        assert_eq!(
            text,
            "# Subdomain Enumeration Results\n\
             # Domain: example.com\n\
             # Generated at: 2024-05-01 12:30:00\n\
             # Total subdomains: 2\n\
             \n\
             www.example.com\n  \
             IP: 192.0.2.1\n  \
             HTTPS: 200\n  \
             Server: cloudflare\n  \
             Cloudflare: Enabled\n\
             \n\
             old.example.com\n  \
             Cloudflare: Unknown\n"
        );
    }
}
