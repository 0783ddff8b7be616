// src/services/email.rs

/// Subject line for OTP delivery
pub fn otp_email_subject() -> String {
    "Your verification code for Notes".to_string()
}

/// HTML body carrying a one-time code. The code is the only secret in
/// here; it never appears in logs on this path.
pub fn otp_email_html(name: &str, code: &str, expires_minutes: i64) -> String {
    format!(
        r#"<div style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto;">
    <h2 style="color: #2563eb;">Notes</h2>
    <p>Hello {},</p>
    <p>Your verification code is:</p>
    <div style="background-color: #f3f4f6; padding: 20px; text-align: center; border-radius: 8px; margin: 20px 0;">
        <h1 style="color: #2563eb; font-size: 32px; margin: 0; letter-spacing: 4px;">{}</h1>
    </div>
    <p>This code will expire in {} minutes.</p>
    <p>If you didn't request this code, please ignore this email.</p>
    <hr style="margin: 30px 0; border: none; border-top: 1px solid #e5e7eb;">
    <p style="color: #6b7280; font-size: 14px;">
        This is an automated message. Please do not reply to this email.
    </p>
</div>"#,
        name, code, expires_minutes
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_otp_email_contains_code_and_name() {
        let html = otp_email_html("Ada", "042357", 10);
        assert!(html.contains("Hello Ada,"));
        assert!(html.contains("042357"));
        assert!(html.contains("expire in 10 minutes"));
    }
}
