//! Email template rendering with Handlebars
//!
//! Each template has a subject, a plain-text body and an optional HTML body,
//! registered under `{name}_subject`, `{name}_text` and `{name}_html`.
//! Rendering runs in strict mode, so a missing parameter is a template error.

use crate::error::{NotificationError, NotificationResult};
use crate::models::RenderedEmail;
use handlebars::Handlebars;
use serde_json::Value;
use std::collections::HashMap;

/// Binds a named template and a parameter set into transmittable content
#[cfg_attr(test, mockall::automock)]
pub trait TemplateRenderer: Send + Sync {
    fn render(&self, template_name: &str, params: &Value) -> NotificationResult<RenderedEmail>;
}

/// Email template definition
#[derive(Clone, Debug)]
pub struct EmailTemplate {
    pub name: String,
    pub subject: String,
    pub body_text: String,
    pub body_html: Option<String>,
}

/// Handlebars-based template engine
pub struct TemplateEngine {
    handlebars: Handlebars<'static>,
    templates: HashMap<String, EmailTemplate>,
}

impl TemplateEngine {
    /// Create a new TemplateEngine with the built-in templates
    pub fn new() -> NotificationResult<Self> {
        let mut engine = Self::empty();
        engine.register(user_welcome())?;
        Ok(engine)
    }

    /// Engine without any template registered
    pub fn empty() -> Self {
        let mut handlebars = Handlebars::new();
        handlebars.set_strict_mode(true);
        Self {
            handlebars,
            templates: HashMap::new(),
        }
    }

    /// Register a template
    pub fn register(&mut self, template: EmailTemplate) -> NotificationResult<()> {
        let parts = [
            ("subject", Some(&template.subject)),
            ("text", Some(&template.body_text)),
            ("html", template.body_html.as_ref()),
        ];

        for (part, source) in parts {
            if let Some(source) = source {
                self.handlebars
                    .register_template_string(&format!("{}_{}", template.name, part), source)
                    .map_err(|e| {
                        NotificationError::Template(format!(
                            "failed to register {} of {}: {}",
                            part, template.name, e
                        ))
                    })?;
            }
        }

        self.templates.insert(template.name.clone(), template);
        Ok(())
    }

    /// Check if a template exists
    pub fn has_template(&self, name: &str) -> bool {
        self.templates.contains_key(name)
    }

    fn render_part(&self, name: &str, part: &str, params: &Value) -> NotificationResult<String> {
        self.handlebars
            .render(&format!("{}_{}", name, part), params)
            .map_err(|e| NotificationError::Template(format!("{} {}: {}", name, part, e)))
    }
}

impl TemplateRenderer for TemplateEngine {
    fn render(&self, template_name: &str, params: &Value) -> NotificationResult<RenderedEmail> {
        let template = self
            .templates
            .get(template_name)
            .ok_or_else(|| NotificationError::Template(format!("template not found: {}", template_name)))?;

        let subject = self.render_part(template_name, "subject", params)?;
        let body_text = self.render_part(template_name, "text", params)?;
        let body_html = template
            .body_html
            .as_ref()
            .map(|_| self.render_part(template_name, "html", params))
            .transpose()?;

        Ok(RenderedEmail {
            subject,
            body_text,
            body_html,
        })
    }
}

/// Activation mail sent after sign-up
fn user_welcome() -> EmailTemplate {
    EmailTemplate {
        name: "user_welcome.tmpl".to_string(),
        subject: "Welcome! Please activate your account".to_string(),
        body_text: r#"Hi,

Thanks for signing up. We're excited to have you on board!

For future reference, your user ID number is {{userID}}.

To activate your account, use the following one-time token:

{{activationToken}}

Please note that this token expires in 3 days.

Thanks,
The Notifications Team"#
            .to_string(),
        body_html: Some(
            r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
</head>
<body style="font-family: Arial, sans-serif; line-height: 1.6; color: #333;">
    <p>Hi,</p>
    <p>Thanks for signing up. We're excited to have you on board!</p>
    <p>For future reference, your user ID number is {{userID}}.</p>
    <p>To activate your account, use the following one-time token:</p>
    <pre><code>{{activationToken}}</code></pre>
    <p>Please note that this token expires in 3 days.</p>
    <p>Thanks,<br>The Notifications Team</p>
</body>
</html>"#
                .to_string(),
        ),
    }
}
