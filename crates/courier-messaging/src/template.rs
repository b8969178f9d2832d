// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Stored message templates with `{{variable}}` substitution.

use std::collections::HashMap;

use courier_core::types::StoredMessage;
use courier_core::CourierError;
use courier_storage::queries::templates;

use crate::send::{BulkReport, SendPipeline};

/// Render `{{name}}` placeholders from the variable map.
///
/// Every placeholder must resolve; unresolved names are collected and
/// rejected as one `TemplateVariables` error so the caller can fix the
/// whole set at once. Unmatched braces render literally.
pub fn render(body: &str, variables: &HashMap<String, String>) -> Result<String, CourierError> {
    let mut out = String::with_capacity(body.len());
    let mut missing = Vec::new();
    let mut rest = body;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find("}}") {
            Some(end) => {
                let name = after[..end].trim();
                match variables.get(name) {
                    Some(value) => out.push_str(value),
                    None => {
                        if !missing.contains(&name.to_string()) {
                            missing.push(name.to_string());
                        }
                    }
                }
                rest = &after[end + 2..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    if missing.is_empty() {
        Ok(out)
    } else {
        Err(CourierError::TemplateVariables { missing })
    }
}

/// Outcome of a templated single send.
#[derive(Debug, Clone)]
pub struct TemplateSendResult {
    pub template: String,
    pub message: StoredMessage,
}

/// Outcome of a templated bulk send.
#[derive(Debug, Clone)]
pub struct TemplateBulkResult {
    pub template: String,
    pub report: BulkReport,
}

impl SendPipeline {
    async fn rendered_template(
        &self,
        tenant_id: &str,
        name: &str,
        variables: &HashMap<String, String>,
    ) -> Result<String, CourierError> {
        let record = templates::get(self.store().database(), tenant_id, name)
            .await?
            .ok_or_else(|| CourierError::NotFound {
                what: "template",
                id: name.to_string(),
            })?;
        render(&record.body, variables)
    }

    /// Send a stored template to one recipient. Rendering failures are
    /// rejected before any credit or provider activity.
    pub async fn send_template(
        &self,
        tenant_id: &str,
        name: &str,
        variables: &HashMap<String, String>,
        to: &str,
    ) -> Result<TemplateSendResult, CourierError> {
        let body = self.rendered_template(tenant_id, name, variables).await?;
        let message = self.send_one(tenant_id, to, &body).await?;
        Ok(TemplateSendResult {
            template: name.to_string(),
            message,
        })
    }

    /// Send a stored template to many recipients.
    pub async fn send_template_bulk(
        &self,
        tenant_id: &str,
        name: &str,
        variables: &HashMap<String, String>,
        addresses: &[String],
    ) -> Result<TemplateBulkResult, CourierError> {
        let body = self.rendered_template(tenant_id, name, variables).await?;
        let report = self.send_bulk(tenant_id, addresses, &body).await?;
        Ok(TemplateBulkResult {
            template: name.to_string(),
            report,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn substitutes_all_placeholders() {
        let body = "Hi {{name}}, your order {{order}} shipped.";
        let rendered = render(body, &vars(&[("name", "Asha"), ("order", "42")])).unwrap();
        assert_eq!(rendered, "Hi Asha, your order 42 shipped.");
    }

    #[test]
    fn reports_every_missing_variable_once() {
        let body = "{{a}} {{b}} {{a}}";
        let err = render(body, &vars(&[])).unwrap_err();
        let CourierError::TemplateVariables { missing } = err else {
            panic!("expected TemplateVariables");
        };
        assert_eq!(missing, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn unmatched_braces_render_literally() {
        let rendered = render("brace {{open", &vars(&[])).unwrap();
        assert_eq!(rendered, "brace {{open");
        let rendered = render("no placeholders", &vars(&[])).unwrap();
        assert_eq!(rendered, "no placeholders");
    }

    #[test]
    fn placeholder_names_are_trimmed() {
        let rendered = render("{{ name }}", &vars(&[("name", "x")])).unwrap();
        assert_eq!(rendered, "x");
    }
}
