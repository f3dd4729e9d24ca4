//! Address template parsing.
//!
//! The backend publishes the address layout as an XML document. Only the parts needed to
//! build field rules are read:
//!
//! ```text
//! nameMappings         field name -> label          (mandatory)
//! elementRegex         field name -> regex          (optional, default ".*")
//! elementRegexFormats  field name -> format message (optional, default "")
//! elementDefaults      field name -> default value  (optional, default "")
//! ```
//!
//! Each section appears in one of two historical shapes, depending on the backend version:
//!
//! ```text
//! <entry><string>cityVillage</string><string>City</string></entry>
//! <property name="cityVillage" value="City"/>
//! ```

use crate::address::AddressValues;
use crate::constants::DEFAULT_FIELD_REGEX;
use crate::error::{RegistrationError, RegistrationResult};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use reg_types::AddressField;
use serde::{Deserialize, Serialize};

const NAME_MAPPINGS: &str = "nameMappings";
const ELEMENT_REGEX: &str = "elementRegex";
const ELEMENT_REGEX_FORMATS: &str = "elementRegexFormats";
const ELEMENT_DEFAULTS: &str = "elementDefaults";

/// Validation rule and default value for one address field.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressTemplateRule {
    pub name: String,
    pub label: String,
    pub regex: String,
    pub regex_format: String,
    pub default_value: String,
}

/// Parses the address template XML into one rule per mapped field, in document order.
///
/// # Errors
///
/// - `RegistrationError::TemplateXml` if the document is not well-formed XML.
/// - `RegistrationError::MalformedTemplate` if there is no `nameMappings` element, or a
///   mapping has no field name or a blank one.
///
/// Missing optional sections are not errors; their defaults apply.
pub fn parse_address_template(xml_text: &str) -> RegistrationResult<Vec<AddressTemplateRule>> {
    let document = XmlElement::parse_document(xml_text)?;

    let name_mappings = document.find_first(NAME_MAPPINGS).ok_or_else(|| {
        RegistrationError::MalformedTemplate(format!("missing <{NAME_MAPPINGS}> element"))
    })?;

    let mappings = read_mappings(name_mappings)?;

    let rules = mappings
        .into_iter()
        .map(|(name, label)| {
            let regex = find_section_value(&document, ELEMENT_REGEX, &name)
                .filter(|r| !r.is_empty())
                .unwrap_or_else(|| DEFAULT_FIELD_REGEX.to_string());
            let regex_format =
                find_section_value(&document, ELEMENT_REGEX_FORMATS, &name).unwrap_or_default();
            let default_value =
                find_section_value(&document, ELEMENT_DEFAULTS, &name).unwrap_or_default();

            AddressTemplateRule {
                name,
                label,
                regex,
                regex_format,
                default_value,
            }
        })
        .collect();

    Ok(rules)
}

/// Initial address values for a new form: every mapped field with its default.
///
/// # Errors
///
/// Returns `RegistrationError::Text` when a rule name is not a valid field name.
pub fn default_address_values(rules: &[AddressTemplateRule]) -> RegistrationResult<AddressValues> {
    rules
        .iter()
        .map(|rule| -> RegistrationResult<(AddressField, String)> {
            Ok((AddressField::new(&rule.name)?, rule.default_value.clone()))
        })
        .collect()
}

/// Reads `(name, label)` pairs from a `nameMappings` element.
///
/// A mapping without a field name, or with a blank one, is malformed in either shape.
fn read_mappings(name_mappings: &XmlElement) -> RegistrationResult<Vec<(String, String)>> {
    let entries = name_mappings.find_all("entry");
    if !entries.is_empty() {
        return entries
            .into_iter()
            .map(|entry| -> RegistrationResult<(String, String)> {
                let strings = entry.find_all("string");
                let name = mapping_name(strings.first().map(|s| s.text.as_str()), "entry")?;
                let label = strings.get(1).map(|s| s.text.clone()).unwrap_or_default();
                Ok((name, label))
            })
            .collect();
    }

    name_mappings
        .find_all("property")
        .into_iter()
        .map(|property| -> RegistrationResult<(String, String)> {
            let name = mapping_name(property.attribute("name"), "property")?;
            let label = property.attribute("value").unwrap_or_default().to_string();
            Ok((name, label))
        })
        .collect()
}

fn mapping_name(name: Option<&str>, shape: &str) -> RegistrationResult<String> {
    name.map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .ok_or_else(|| {
            RegistrationError::MalformedTemplate(format!(
                "nameMappings {shape} without a field name"
            ))
        })
}

/// Value keyed by `field_name` in the first `section` element of the document.
fn find_section_value(document: &XmlElement, section: &str, field_name: &str) -> Option<String> {
    let section = document.find_first(section)?;

    let keyed =
        section.find_first_where(&|e: &XmlElement| e.attribute("name") == Some(field_name));
    if let Some(keyed) = keyed {
        return keyed.attribute("value").map(str::to_string);
    }

    section.find_all("entry").into_iter().find_map(|entry| {
        let strings = entry.find_all("string");
        match (strings.first(), strings.get(1)) {
            (Some(key), Some(value)) if key.text == field_name => Some(value.text.clone()),
            _ => None,
        }
    })
}

// ============================================================================
// Minimal element tree
// ============================================================================

/// An element with its attributes, child elements and concatenated text.
#[derive(Clone, Debug, Default)]
struct XmlElement {
    name: String,
    attributes: Vec<(String, String)>,
    children: Vec<XmlElement>,
    text: String,
}

impl XmlElement {
    /// Parses a document into a synthetic root holding the top-level elements.
    fn parse_document(xml_text: &str) -> RegistrationResult<XmlElement> {
        let mut reader = Reader::from_str(xml_text);
        reader.trim_text(true);

        let mut stack: Vec<XmlElement> = vec![XmlElement::default()];

        loop {
            match reader.read_event()? {
                Event::Start(start) => {
                    stack.push(Self::from_start(&start)?);
                }
                Event::Empty(start) => {
                    let element = Self::from_start(&start)?;
                    push_child(&mut stack, element)?;
                }
                Event::End(_) => {
                    let element = stack.pop().ok_or_else(|| unclosed("document"))?;
                    push_child(&mut stack, element)?;
                }
                Event::Text(text) => {
                    if let Some(current) = stack.last_mut() {
                        current.text.push_str(&text.unescape()?);
                    }
                }
                Event::CData(cdata) => {
                    if let Some(current) = stack.last_mut() {
                        current
                            .text
                            .push_str(&String::from_utf8_lossy(&cdata.into_inner()));
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if stack.len() > 1 {
            let open = stack.last().map(|e| e.name.as_str()).unwrap_or_default();
            return Err(unclosed(open));
        }
        stack.pop().ok_or_else(|| unclosed("document"))
    }

    fn from_start(start: &BytesStart<'_>) -> RegistrationResult<XmlElement> {
        let name = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();

        let mut attributes = Vec::new();
        for attribute in start.attributes() {
            let attribute = attribute.map_err(quick_xml::Error::from)?;
            let key = String::from_utf8_lossy(attribute.key.local_name().as_ref()).into_owned();
            let value = attribute.unescape_value()?.into_owned();
            attributes.push((key, value));
        }

        Ok(XmlElement {
            name,
            attributes,
            children: Vec::new(),
            text: String::new(),
        })
    }

    fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// First descendant (document order) matching `predicate`.
    fn find_first_where(&self, predicate: &dyn Fn(&XmlElement) -> bool) -> Option<&XmlElement> {
        for child in &self.children {
            if predicate(child) {
                return Some(child);
            }
            if let Some(found) = child.find_first_where(predicate) {
                return Some(found);
            }
        }
        None
    }

    fn find_first(&self, name: &str) -> Option<&XmlElement> {
        self.find_first_where(&|e: &XmlElement| e.name == name)
    }

    /// All descendants named `name`, in document order.
    fn find_all(&self, name: &str) -> Vec<&XmlElement> {
        let mut found = Vec::new();
        self.collect_named(name, &mut found);
        found
    }

    fn collect_named<'a>(&'a self, name: &str, found: &mut Vec<&'a XmlElement>) {
        for child in &self.children {
            if child.name == name {
                found.push(child);
            }
            child.collect_named(name, found);
        }
    }
}

fn push_child(stack: &mut [XmlElement], element: XmlElement) -> RegistrationResult<()> {
    let parent = stack.last_mut().ok_or_else(|| unclosed("document"))?;
    parent.children.push(element);
    Ok(())
}

/// The document ended while `open` was still open.
fn unclosed(open: &str) -> RegistrationError {
    RegistrationError::TemplateXml(quick_xml::Error::UnexpectedEof(format!("<{open}>")))
}
