use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;
use triage_core::{PiiCategory, PiiSettings};

lazy_static! {
    static ref EMAIL: Regex = Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").unwrap();
    static ref IPV4: Regex = Regex::new(r"\b(?:\d{1,3}\.){3}\d{1,3}\b").unwrap();
    static ref PHONE: Regex =
        Regex::new(r"(?:\+?1[-.\s]?)?(?:\(\d{3}\)|\b\d{3})[-.\s]?\d{3}[-.\s]?\d{4}\b").unwrap();
    // Any two capitalised words. Coarse on purpose: product names get caught too.
    static ref NAME: Regex = Regex::new(r"\b[A-Z][a-z]+\s+[A-Z][a-z]+\b").unwrap();
    static ref COMPANY: Regex = Regex::new(
        r"\b(?:[A-Z][A-Za-z0-9&]*\s+)+(?:Inc|LLC|Ltd|Corp|Corporation|Co|GmbH|PLC)\b\.?"
    )
    .unwrap();
}

fn pattern(category: PiiCategory) -> &'static Regex {
    match category {
        PiiCategory::Emails => &*EMAIL,
        PiiCategory::Ips => &*IPV4,
        PiiCategory::Phones => &*PHONE,
        PiiCategory::Names => &*NAME,
        PiiCategory::Companies => &*COMPANY,
    }
}

/// Irreversible PII redaction over JSON values
#[derive(Debug, Clone, Copy, Default)]
pub struct Scrubber {
    settings: PiiSettings,
}

impl Scrubber {
    pub fn new(settings: PiiSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> PiiSettings {
        self.settings
    }

    /// Return a copy of `value` with every string leaf scrubbed.
    ///
    /// Object keys are left alone; numbers, booleans and null pass through.
    pub fn scrub(&self, value: &Value) -> Value {
        if self.settings.all_disabled() {
            return value.clone();
        }
        match value {
            Value::String(s) => Value::String(self.scrub_str(s)),
            Value::Array(items) => Value::Array(items.iter().map(|v| self.scrub(v)).collect()),
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), self.scrub(v)))
                    .collect(),
            ),
            other => other.clone(),
        }
    }

    /// Apply each enabled rule in order: emails, IPs, phones, names, companies
    pub fn scrub_str(&self, text: &str) -> String {
        let mut result = text.to_string();
        for category in self.settings.enabled() {
            let re = pattern(category);
            if re.is_match(&result) {
                result = re.replace_all(&result, category.placeholder()).into_owned();
            }
        }
        result
    }
}

/// Scrub `value` with the given settings
pub fn scrub(value: &Value, settings: &PiiSettings) -> Value {
    Scrubber::new(*settings).scrub(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn only(category: PiiCategory) -> Scrubber {
        let mut settings = PiiSettings::all(false);
        match category {
            PiiCategory::Emails => settings.emails = true,
            PiiCategory::Ips => settings.ips = true,
            PiiCategory::Phones => settings.phones = true,
            PiiCategory::Names => settings.names = true,
            PiiCategory::Companies => settings.companies = true,
        }
        Scrubber::new(settings)
    }

    #[test]
    fn test_email_redaction() {
        let out = only(PiiCategory::Emails).scrub_str("Contact jane.doe+vpn@example.co.uk today");

        assert_eq!(out, "Contact [REDACTED_EMAIL] today");
        assert!(!EMAIL.is_match(&out));
    }

    #[test]
    fn test_ip_redaction() {
        let out = only(PiiCategory::Ips).scrub_str("gateway 10.0.12.254 unreachable");
        assert_eq!(out, "gateway [REDACTED_IP] unreachable");
    }

    #[test]
    fn test_phone_formats() {
        let scrubber = only(PiiCategory::Phones);
        for phone in [
            "555-123-4567",
            "(555) 123-4567",
            "555.123.4567",
            "+1 555 123 4567",
            "5551234567",
        ] {
            let out = scrubber.scrub_str(&format!("call {phone} now"));
            assert_eq!(out, "call [REDACTED_PHONE] now", "{phone}");
        }
    }

    #[test]
    fn test_phone_ignores_long_ticket_numbers() {
        let out = only(PiiCategory::Phones).scrub_str("see ticket 123456789012");
        assert_eq!(out, "see ticket 123456789012");
    }

    #[test]
    fn test_name_rule_is_coarse() {
        let scrubber = only(PiiCategory::Names);

        assert_eq!(
            scrubber.scrub_str("Ticket raised by John Smith"),
            "Ticket raised by [REDACTED_NAME]"
        );
        // Accepted over-redaction: any capitalised bigram is treated as a name
        assert_eq!(
            scrubber.scrub_str("Error in Visual Studio"),
            "Error in [REDACTED_NAME]"
        );
    }

    #[test]
    fn test_company_redaction() {
        let out = only(PiiCategory::Companies).scrub_str("Invoice from Acme Widgets LLC.");
        assert_eq!(out, "Invoice from [REDACTED_COMPANY]");
    }

    #[test]
    fn test_names_run_before_companies() {
        let scrubber = Scrubber::new(PiiSettings::default());

        // "Contoso Inc" is also a capitalised bigram, so the name rule wins
        assert_eq!(scrubber.scrub_str("Contoso Inc"), "[REDACTED_NAME]");
        assert_eq!(scrubber.scrub_str("ACME LLC"), "[REDACTED_COMPANY]");
    }

    #[test]
    fn test_emails_run_before_names() {
        let scrubber = Scrubber::new(PiiSettings::default());
        let out = scrubber.scrub_str("Mail Jane.Doe@Example.com");

        assert_eq!(out, "Mail [REDACTED_EMAIL]");
    }

    #[test]
    fn test_scrub_walks_nested_values() {
        let ticket = json!({
            "subject": "From bob@example.com",
            "priority": 3,
            "requester": { "phone": "555-123-4567", "active": true, "manager": null },
            "cc_emails": ["a@b.io", "c@d.io"]
        });

        let out = Scrubber::new(PiiSettings::default()).scrub(&ticket);

        assert_eq!(
            out,
            json!({
                "subject": "From [REDACTED_EMAIL]",
                "priority": 3,
                "requester": { "phone": "[REDACTED_PHONE]", "active": true, "manager": null },
                "cc_emails": ["[REDACTED_EMAIL]", "[REDACTED_EMAIL]"]
            })
        );
    }

    #[test]
    fn test_all_disabled_is_identity() {
        let ticket = json!({
            "subject": "John Smith at Acme LLC, john@acme.com, 10.1.1.1, 555-123-4567",
            "nested": ["Jane Roe"]
        });

        let out = scrub(&ticket, &PiiSettings::all(false));
        assert_eq!(out, ticket);
        assert_eq!(out["subject"].as_str(), ticket["subject"].as_str());
    }

    #[test]
    fn test_scrub_is_idempotent() {
        let scrubber = Scrubber::new(PiiSettings::default());
        let once = scrubber.scrub_str("John Smith <john@acme.com> from 192.168.0.1");
        assert_eq!(scrubber.scrub_str(&once), once);
    }
}
