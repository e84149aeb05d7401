//! Outcome message templates.
//!
//! Both templates are HTML bodies addressed to the submitter. User-supplied
//! values are escaped before interpolation.

/// Everything a template needs besides the failure reason.
#[derive(Debug, Clone)]
pub struct MessageContext<'a> {
    pub recipient_name: &'a str,
    pub file_name: &'a str,
    pub site_location: &'a str,
    pub printer_name: &'a str,
    pub support_address: Option<&'a str>,
}

/// A fully rendered notification, ready for a [`Transport`](super::Transport).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutcomeMessage {
    pub to_name: String,
    pub to_address: String,
    pub subject: String,
    pub html_body: String,
}

/// Replace `{file_name}` in a configured subject template.
pub fn render_subject(template: &str, file_name: &str) -> String {
    template.replace("{file_name}", file_name)
}

pub fn success_body(ctx: &MessageContext<'_>) -> String {
    let detail = format!(
        "Your file <strong>'{}'</strong> has been successfully printed at <strong>{}</strong> on printer <strong>'{}'</strong>.",
        escape_html(ctx.file_name),
        escape_html(ctx.site_location),
        escape_html(ctx.printer_name),
    );
    wrap(ctx, &detail)
}

pub fn failure_body(ctx: &MessageContext<'_>, reason: &str) -> String {
    let detail = format!(
        "There was an error while processing your file <strong>'{}'</strong> for printing at <strong>{}</strong> on printer <strong>'{}'</strong>.\n    </p>\n    <p style=\"text-align: center; font-size: 16px;\">\n        Error Message: <strong>{}</strong>",
        escape_html(ctx.file_name),
        escape_html(ctx.site_location),
        escape_html(ctx.printer_name),
        escape_html(reason),
    );
    wrap(ctx, &detail)
}

fn wrap(ctx: &MessageContext<'_>, detail: &str) -> String {
    let support = match ctx.support_address {
        Some(address) if !address.is_empty() => {
            let address = escape_html(address);
            format!(
                "\n    <p style=\"text-align: center; font-size: 16px;\">If you encounter any issues, please email <a href=\"mailto:{address}\">{address}</a></p>"
            )
        }
        _ => String::new(),
    };
    format!(
        r#"<html>
<head>
</head>
<body style="font-family: Arial, sans-serif;">
    <p style="text-align: center; font-size: 18px;">Hi {name},</p>
    <p style="text-align: center; font-size: 16px;">
        {detail}
    </p>
    <p style="text-align: center; font-size: 16px;">This is an automated message sent from Print As You Go.</p>{support}
</body>
</html>
"#,
        name = escape_html(ctx.recipient_name),
    )
}

pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> MessageContext<'static> {
        MessageContext {
            recipient_name: "Alice",
            file_name: "report.pdf",
            site_location: "Head Office",
            printer_name: "PDF",
            support_address: Some("support@example.com"),
        }
    }

    #[test]
    fn subject_substitutes_file_name() {
        assert_eq!(
            render_subject("Print Job Completed - {file_name}", "report.pdf"),
            "Print Job Completed - report.pdf"
        );
    }

    #[test]
    fn success_body_names_file_location_and_printer() {
        let body = success_body(&ctx());
        assert!(body.contains("Hi Alice,"));
        assert!(body.contains("<strong>'report.pdf'</strong> has been successfully printed"));
        assert!(body.contains("<strong>Head Office</strong>"));
        assert!(body.contains("<strong>'PDF'</strong>"));
        assert!(body.contains("mailto:support@example.com"));
        assert!(!body.contains("Error Message"));
    }

    #[test]
    fn failure_body_carries_reason() {
        let body = failure_body(&ctx(), "checksum mismatch for report.pdf");
        assert!(body.contains("There was an error while processing your file"));
        assert!(body.contains("Error Message: <strong>checksum mismatch for report.pdf</strong>"));
    }

    #[test]
    fn support_line_is_optional() {
        let mut c = ctx();
        c.support_address = None;
        assert!(!success_body(&c).contains("mailto:"));
    }

    #[test]
    fn user_values_are_escaped() {
        let mut c = ctx();
        c.recipient_name = "<script>";
        let body = failure_body(&c, "a & b");
        assert!(body.contains("Hi &lt;script&gt;,"));
        assert!(body.contains("a &amp; b"));
        assert!(!body.contains("<script>"));
    }
}
