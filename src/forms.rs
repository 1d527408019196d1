//! HTML form state, replayed over plain HTTP.
//!
//! Several portals are ASP.NET WebForms applications that require the full
//! set of fields (ViewState, EventValidation, current selections) to be sent
//! back on every POST. Other portals are ordinary GET/POST search forms. Both
//! are handled by capturing a form as it was served and re-submitting it with
//! a few fields changed, the same thing a browser does when a user picks an
//! option and clicks a button.

use html_scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::html::css;
use crate::transport::{Method, Request};

/// A named control with its current value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormField {
    pub name: String,
    pub value: String,
    pub id: Option<String>,
}

/// A form captured from a served page.
#[derive(Debug, Clone)]
pub struct HtmlForm {
    action: Url,
    method: Method,
    /// Controls a browser would submit as-is.
    fields: Vec<FormField>,
    /// Submit buttons; only the clicked one is sent.
    buttons: Vec<FormField>,
    /// Unchecked checkboxes and radios, kept so they can be ticked later.
    unchecked: Vec<FormField>,
}

impl HtmlForm {
    /// Capture the first form matching `selector`.
    pub fn extract(doc: &Html, page_url: &Url, selector: &Selector) -> Option<Self> {
        doc.select(selector)
            .next()
            .map(|form| Self::from_element(form, page_url))
    }

    /// Capture the first form that contains an element matching `inner`.
    pub fn containing(doc: &Html, page_url: &Url, inner: &Selector) -> Option<Self> {
        let form_sel = css("form");
        doc.select(&form_sel)
            .find(|form| form.select(inner).next().is_some())
            .map(|form| Self::from_element(form, page_url))
    }

    pub fn from_element(form: ElementRef<'_>, page_url: &Url) -> Self {
        let action = form
            .value()
            .attr("action")
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .and_then(|a| page_url.join(a).ok())
            .unwrap_or_else(|| page_url.clone());
        let method = match form.value().attr("method") {
            Some(m) if m.eq_ignore_ascii_case("post") => Method::Post,
            _ => Method::Get,
        };

        let mut captured = Self {
            action,
            method,
            fields: Vec::new(),
            buttons: Vec::new(),
            unchecked: Vec::new(),
        };

        let control_sel = css("input, select, textarea, button");
        for control in form.select(&control_sel) {
            captured.capture_control(control);
        }

        captured
    }

    fn capture_control(&mut self, control: ElementRef<'_>) {
        let el = control.value();
        let name = match el.attr("name") {
            Some(n) if !n.is_empty() => n.to_string(),
            _ => return,
        };
        let id = el.attr("id").map(str::to_string);

        match el.name() {
            "select" => {
                let option_sel = css("option");
                let options: Vec<_> = control.select(&option_sel).collect();
                let chosen = options
                    .iter()
                    .find(|o| o.value().attr("selected").is_some())
                    .or_else(|| options.first());
                let value = chosen.map(|o| option_value(*o)).unwrap_or_default();
                self.fields.push(FormField { name, value, id });
            }
            "textarea" => {
                let value = control.text().collect::<String>();
                self.fields.push(FormField { name, value, id });
            }
            "button" => {
                let kind = el.attr("type").unwrap_or("submit");
                if kind.eq_ignore_ascii_case("submit") {
                    let value = el.attr("value").unwrap_or_default().to_string();
                    self.buttons.push(FormField { name, value, id });
                }
            }
            _ => {
                let kind = el.attr("type").unwrap_or("text").to_lowercase();
                let value = el.attr("value").unwrap_or_default().to_string();
                match kind.as_str() {
                    "submit" | "image" => self.buttons.push(FormField { name, value, id }),
                    "button" | "reset" | "file" => {}
                    "radio" | "checkbox" => {
                        let value = if value.is_empty() { "on".to_string() } else { value };
                        let field = FormField { name, value, id };
                        if el.attr("checked").is_some() {
                            self.fields.push(field);
                        } else {
                            self.unchecked.push(field);
                        }
                    }
                    _ => self.fields.push(FormField { name, value, id }),
                }
            }
        }
    }

    pub fn action(&self) -> &Url {
        &self.action
    }

    pub fn fields(&self) -> &[FormField] {
        &self.fields
    }

    pub fn value(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.value.as_str())
    }

    /// Name of the control carrying `id`, whatever its state.
    pub fn name_for_id(&self, id: &str) -> Option<&str> {
        self.fields
            .iter()
            .chain(&self.buttons)
            .chain(&self.unchecked)
            .find(|f| f.id.as_deref() == Some(id))
            .map(|f| f.name.as_str())
    }

    /// Set `name` to `value`, adding the field when the form lacks it.
    pub fn set(&mut self, name: &str, value: impl Into<String>) -> &mut Self {
        let value = value.into();
        match self.fields.iter_mut().find(|f| f.name == name) {
            Some(field) => field.value = value,
            None => self.fields.push(FormField {
                name: name.to_string(),
                value,
                id: None,
            }),
        }
        self
    }

    /// Set the control with `id`. Returns false when no such control exists.
    pub fn set_by_id(&mut self, id: &str, value: impl Into<String>) -> bool {
        match self.name_for_id(id).map(str::to_string) {
            Some(name) => {
                self.set(&name, value);
                true
            }
            None => false,
        }
    }

    /// Tick an unchecked checkbox or radio. Returns false when none is named `name`.
    pub fn check(&mut self, name: &str) -> bool {
        match self.unchecked.iter().position(|f| f.name == name) {
            Some(pos) => {
                let field = self.unchecked.remove(pos);
                self.fields.push(field);
                true
            }
            None => false,
        }
    }

    pub fn has_button(&self, name: &str) -> bool {
        self.buttons.iter().any(|b| b.name == name)
    }

    /// Button whose visible value, ignoring surrounding whitespace, is `label`.
    pub fn button_named_by_label(&self, label: &str) -> Option<&str> {
        self.buttons
            .iter()
            .find(|b| b.value.trim() == label.trim())
            .map(|b| b.name.as_str())
    }

    /// Button carrying `id`.
    pub fn button_by_id(&self, id: &str) -> Option<&str> {
        self.buttons
            .iter()
            .find(|b| b.id.as_deref() == Some(id))
            .map(|b| b.name.as_str())
    }

    /// Request submitting the form without pressing any button.
    pub fn submit(&self) -> Request {
        self.request(self.pairs())
    }

    /// Request submitting the form by pressing the button named `name`.
    ///
    /// `None` when the form has no such button.
    pub fn click(&self, name: &str) -> Option<Request> {
        let button = self.buttons.iter().find(|b| b.name == name)?;
        let mut pairs = self.pairs();
        pairs.push((button.name.clone(), button.value.clone()));
        Some(self.request(pairs))
    }

    /// WebForms postback: every field round-tripped, with `__EVENTTARGET` and
    /// `__EVENTARGUMENT` set.
    pub fn postback(&self, event_target: &str, event_argument: &str) -> Request {
        let mut pairs = self.pairs();
        for (key, val) in [
            ("__EVENTTARGET", event_target),
            ("__EVENTARGUMENT", event_argument),
        ] {
            if let Some(existing) = pairs.iter_mut().find(|(n, _)| n == key) {
                existing.1 = val.to_string();
            } else {
                pairs.push((key.to_string(), val.to_string()));
            }
        }
        Request::post(self.action.clone()).with_form(pairs)
    }

    fn pairs(&self) -> Vec<(String, String)> {
        self.fields
            .iter()
            .map(|f| (f.name.clone(), f.value.clone()))
            .collect()
    }

    fn request(&self, pairs: Vec<(String, String)>) -> Request {
        match self.method {
            Method::Post => Request::post(self.action.clone()).with_form(pairs),
            Method::Get => {
                let mut request = Request::get(self.action.clone());
                request.query = pairs;
                request
            }
        }
    }
}

fn option_value(option: ElementRef<'_>) -> String {
    match option.value().attr("value") {
        Some(v) => v.to_string(),
        None => option.text().collect::<String>().trim().to_string(),
    }
}

/// Values of every `<option>` in the select named `name`, in page order.
pub fn select_options(doc: &Html, name: &str) -> Vec<String> {
    let select_sel = css("select");
    let option_sel = css("option");
    doc.select(&select_sel)
        .filter(|s| s.value().attr("name") == Some(name))
        .flat_map(|s| s.select(&option_sel).map(option_value).collect::<Vec<_>>())
        .collect()
}
