use crate::fetcher::Fetcher;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormMethod {
    Get,
    Post,
}

impl FormMethod {
    /// Anything other than `post` submits as a query string.
    pub fn from_attr(value: Option<&str>) -> Self {
        match value {
            Some(m) if m.trim().eq_ignore_ascii_case("post") => FormMethod::Post,
            _ => FormMethod::Get,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FormMethod::Get => "get",
            FormMethod::Post => "post",
        }
    }
}

impl fmt::Display for FormMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormInput {
    pub name: String,
    pub input_type: String,
    pub default_value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormDescriptor {
    /// Absolute submit target
    pub action: String,
    pub method: FormMethod,
    /// Named inputs in document order
    pub inputs: Vec<FormInput>,
}

/// Fetch `page_url` and parse its forms. A failed fetch yields no forms.
pub async fn extract_forms(fetcher: &Fetcher, page_url: &str) -> Vec<FormDescriptor> {
    match fetcher.get(page_url).await {
        Ok(page) => parse_forms(&page.body, page_url),
        Err(e) => {
            debug!("Skipping forms on {}: {}", page_url, e);
            Vec::new()
        }
    }
}

/// Parse every `<form>` in `html`, resolving actions against `page_url`.
///
/// The HTML5 tree builder hoists a `<form>` written directly inside a
/// `<table>` out of it and leaves it empty. A form with no descendant
/// inputs therefore adopts the form-less inputs that follow it, up to the
/// next `<form>`.
pub fn parse_forms(html: &str, page_url: &str) -> Vec<FormDescriptor> {
    let document = Html::parse_document(html);
    let (Ok(element_selector), Ok(input_selector)) =
        (Selector::parse("form, input"), Selector::parse("input"))
    else {
        return Vec::new();
    };

    let mut forms: Vec<FormDescriptor> = Vec::new();
    // Index of the last form seen, if it had no inputs of its own
    let mut adopting: Option<usize> = None;

    for element in document.select(&element_selector) {
        if element.value().name() == "form" {
            let action = resolve_action(page_url, element.value().attr("action"));
            let method = FormMethod::from_attr(element.value().attr("method"));
            let inputs = element
                .select(&input_selector)
                .filter_map(form_input)
                .collect::<Vec<_>>();

            adopting = inputs.is_empty().then_some(forms.len());
            forms.push(FormDescriptor {
                action,
                method,
                inputs,
            });
        } else if let Some(index) = adopting
            && !inside_form(&element)
            && let Some(input) = form_input(element)
        {
            forms[index].inputs.push(input);
        }
    }

    for form in &forms {
        debug!("Found {} form -> {} ({} inputs)", form.method, form.action, form.inputs.len());
    }
    forms
}

fn form_input(input: ElementRef<'_>) -> Option<FormInput> {
    let attrs = input.value();
    let name = attrs.attr("name").filter(|n| !n.is_empty())?;
    Some(FormInput {
        name: name.to_string(),
        input_type: attrs.attr("type").unwrap_or("text").to_lowercase(),
        default_value: attrs.attr("value").unwrap_or("").to_string(),
    })
}

fn inside_form(element: &ElementRef<'_>) -> bool {
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .any(|ancestor| ancestor.value().name() == "form")
}

fn resolve_action(page_url: &str, action: Option<&str>) -> String {
    match action.map(str::trim).filter(|a| !a.is_empty()) {
        None => page_url.to_string(),
        Some(action) => Url::parse(page_url)
            .and_then(|base| base.join(action))
            .map(|u| u.to_string())
            .unwrap_or_else(|_| action.to_string()),
    }
}
