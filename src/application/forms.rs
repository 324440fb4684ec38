//! Visitor-facing forms: submitted values, validation and per-field errors.

use std::collections::BTreeMap;

use lettre::Address;
use serde::Deserialize;
use validator::{Validate, ValidationErrors};

const REQUIRED_MESSAGE: &str = "This field is required.";
const NULL_CHARACTER_MESSAGE: &str = "Null characters are not allowed.";
const INVALID_EMAIL_MESSAGE: &str = "Enter a valid email address.";

/// Field name → error messages, in field order of the rendered form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormErrors {
    fields: BTreeMap<String, Vec<String>>,
}

impl FormErrors {
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn for_field(&self, field: &str) -> &[String] {
        self.fields.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn has(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    fn push(&mut self, field: &str, message: impl Into<String>) {
        self.fields
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    fn require(&mut self, field: &str, value: &str) {
        if value.is_empty() {
            self.fields
                .insert(field.to_string(), vec![REQUIRED_MESSAGE.to_string()]);
        }
    }

    /// Postgres text columns cannot hold NUL.
    fn reject_null_characters(&mut self, field: &str, value: &str) {
        if !self.has(field) && value.contains('\0') {
            self.push(field, NULL_CHARACTER_MESSAGE);
        }
    }

    /// Recipients must also parse as a mail address for the SMTP builder.
    fn require_deliverable(&mut self, field: &str, value: &str) {
        if !self.has(field) && value.parse::<Address>().is_err() {
            self.push(field, INVALID_EMAIL_MESSAGE);
        }
    }

    fn merge_validation(&mut self, errors: ValidationErrors) {
        for (field, failures) in errors.field_errors() {
            let field = field.to_string();
            if self.has(&field) {
                continue;
            }
            for failure in failures {
                let message = failure
                    .message
                    .as_ref()
                    .map(|message| message.to_string())
                    .unwrap_or_else(|| format!("Invalid value ({}).", failure.code));
                self.push(&field, message);
            }
        }
    }
}

/// Comment left on a post.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct CommentForm {
    #[serde(default)]
    #[validate(length(max = 80, message = "Ensure this value has at most 80 characters."))]
    pub name: String,
    #[serde(default)]
    #[validate(email(message = "Enter a valid email address."))]
    pub email: String,
    #[serde(default)]
    pub body: String,
}

/// Cleaned comment fields ready to persist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentInput {
    pub name: String,
    pub email: String,
    pub body: String,
}

impl CommentForm {
    fn normalized(&self) -> Self {
        Self {
            name: self.name.trim().to_string(),
            email: self.email.trim().to_string(),
            body: self.body.trim().to_string(),
        }
    }

    pub fn clean(&self) -> Result<CommentInput, FormErrors> {
        let form = self.normalized();
        let mut errors = FormErrors::default();
        errors.require("name", &form.name);
        errors.require("email", &form.email);
        errors.require("body", &form.body);
        for (field, value) in [("name", &form.name), ("email", &form.email), ("body", &form.body)] {
            errors.reject_null_characters(field, value);
        }
        if let Err(failures) = form.validate() {
            errors.merge_validation(failures);
        }

        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(CommentInput {
            name: form.name,
            email: form.email,
            body: form.body,
        })
    }
}

/// "Recommend this post" form.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct EmailPostForm {
    #[serde(default)]
    #[validate(length(max = 25, message = "Ensure this value has at most 25 characters."))]
    pub name: String,
    #[serde(default)]
    #[validate(email(message = "Enter a valid email address."))]
    pub email: String,
    #[serde(default)]
    #[validate(email(message = "Enter a valid email address."))]
    pub to: String,
    #[serde(default)]
    pub comments: String,
}

/// Cleaned share request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareInput {
    pub name: String,
    pub email: String,
    pub to: String,
    pub comments: String,
}

impl EmailPostForm {
    fn normalized(&self) -> Self {
        Self {
            name: self.name.trim().to_string(),
            email: self.email.trim().to_string(),
            to: self.to.trim().to_string(),
            comments: self.comments.trim().to_string(),
        }
    }

    pub fn clean(&self) -> Result<ShareInput, FormErrors> {
        let form = self.normalized();
        let mut errors = FormErrors::default();
        errors.require("name", &form.name);
        errors.require("email", &form.email);
        errors.require("to", &form.to);
        for (field, value) in [
            ("name", &form.name),
            ("email", &form.email),
            ("to", &form.to),
            ("comments", &form.comments),
        ] {
            errors.reject_null_characters(field, value);
        }
        if let Err(failures) = form.validate() {
            errors.merge_validation(failures);
        }
        errors.require_deliverable("to", &form.to);

        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(ShareInput {
            name: form.name,
            email: form.email,
            to: form.to,
            comments: form.comments,
        })
    }
}
