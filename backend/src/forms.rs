//! Validation of the property submission form.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::chain::Submission;
use crate::models::PropertyAttributes;
use crate::units::{parse_units, ETHER_DECIMALS};

pub const MAX_IMAGES: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid submission: {}", describe(.0))]
pub struct FormErrors(pub BTreeMap<&'static str, String>);

fn describe(errors: &BTreeMap<&'static str, String>) -> String {
    errors.values().cloned().collect::<Vec<_>>().join("; ")
}

/// Raw form input, as typed by the seller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SubmissionForm {
    pub property_type: String,
    pub apartment_type: String,
    pub title: String,
    pub description: String,
    pub price: String,
    pub bedrooms: String,
    pub bathrooms: String,
    pub area: String,
    pub year_built: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub amenities: Vec<String>,
}

fn number(value: &str) -> Option<f64> {
    value.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}

impl SubmissionForm {
    fn field(&self, name: &str) -> &str {
        match name {
            "apartmentType" => &self.apartment_type,
            "title" => &self.title,
            "description" => &self.description,
            "price" => &self.price,
            "bedrooms" => &self.bedrooms,
            "bathrooms" => &self.bathrooms,
            "area" => &self.area,
            "address" => &self.address,
            "city" => &self.city,
            "state" => &self.state,
            "zipCode" => &self.zip_code,
            _ => "",
        }
    }

    /// Fields checked on each step of the form.
    pub fn step_fields(step: u8) -> &'static [&'static str] {
        match step {
            1 => &["apartmentType", "title", "description", "price"],
            2 => &["bedrooms", "bathrooms", "area"],
            3 => &["address", "city", "state", "zipCode"],
            _ => &[],
        }
    }

    pub fn validate_field(&self, name: &str) -> Option<String> {
        let value = self.field(name).trim();
        let required = |label: &str| (value.is_empty()).then(|| format!("{} is required", label));
        match name {
            "apartmentType" => required("Apartment type"),
            "title" => required("Title").or_else(|| {
                (value.chars().count() < 5).then(|| "Title must be at least 5 characters".to_string())
            }),
            "description" => required("Description").or_else(|| {
                (value.chars().count() < 20).then(|| "Description must be at least 20 characters".to_string())
            }),
            "price" => required("Price").or_else(|| match number(value) {
                Some(n) if n > 0.0 => None,
                _ => Some("Price must be a positive number".to_string()),
            }),
            "bedrooms" | "bathrooms" => {
                let label = if name == "bedrooms" { "Bedrooms" } else { "Bathrooms" };
                if value.is_empty() {
                    return Some(format!("Number of {} is required", name));
                }
                match number(value) {
                    Some(n) if n >= 0.0 => None,
                    _ => Some(format!("{} must be a non-negative number", label)),
                }
            }
            "area" => required("Area").or_else(|| match number(value) {
                Some(n) if n > 0.0 => None,
                _ => Some("Area must be a positive number".to_string()),
            }),
            "address" => required("Address"),
            "city" => required("City"),
            "state" => required("State"),
            "zipCode" => required("ZIP code"),
            _ => None,
        }
    }

    pub fn validate_step(&self, step: u8) -> Result<(), FormErrors> {
        let errors: BTreeMap<_, _> = Self::step_fields(step)
            .iter()
            .filter_map(|name| self.validate_field(name).map(|msg| (*name, msg)))
            .collect();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(FormErrors(errors))
        }
    }

    pub fn validate(&self, image_count: usize) -> Result<(), FormErrors> {
        let mut errors = BTreeMap::new();
        for step in 1..=3 {
            if let Err(FormErrors(step_errors)) = self.validate_step(step) {
                errors.extend(step_errors);
            }
        }
        if image_count == 0 {
            errors.insert("images", "Please upload at least one image".to_string());
        } else if image_count > MAX_IMAGES {
            errors.insert("images", format!("You can only upload up to {} images.", MAX_IMAGES));
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(FormErrors(errors))
        }
    }

    /// The street line stored on chain.
    pub fn full_address(&self) -> String {
        format!(
            "{}, {}, {} {}",
            self.address.trim(),
            self.city.trim(),
            self.state.trim(),
            self.zip_code.trim()
        )
    }

    pub fn into_submission(self, image_hashes: Vec<String>) -> Result<Submission, FormErrors> {
        self.validate(image_hashes.len())?;
        let mut errors = BTreeMap::new();
        let value = match parse_units(&self.price, ETHER_DECIMALS) {
            Ok(value) => value,
            Err(e) => {
                errors.insert("price", e.to_string());
                0
            }
        };
        let bedrooms = whole(&mut errors, "bedrooms", "Bedrooms", &self.bedrooms);
        let bathrooms = whole(&mut errors, "bathrooms", "Bathrooms", &self.bathrooms);
        let area = whole(&mut errors, "area", "Area", &self.area);
        let year_built = whole(&mut errors, "yearBuilt", "Year built", &self.year_built);
        if !errors.is_empty() {
            return Err(FormErrors(errors));
        }
        Ok(Submission {
            property_address: self.full_address(),
            value,
            image_urls: image_hashes,
            document_urls: Vec::new(),
            attributes: PropertyAttributes {
                bedrooms,
                bathrooms,
                area,
                year_built,
                title: self.title,
                description: self.description,
                property_type: self.property_type,
                apartment_type: self.apartment_type,
                city: self.city,
                state: self.state,
                zip_code: self.zip_code,
                amenities: self.amenities,
            },
        })
    }
}

/// Whole part of an optional numeric field. Negative values and values that
/// do not fit `T` are recorded under `name`.
fn whole<T: TryFrom<u64>>(
    errors: &mut BTreeMap<&'static str, String>,
    name: &'static str,
    label: &str,
    raw: &str,
) -> Option<T> {
    let n = number(raw)?.trunc();
    // 2^64 is exactly representable as f64; anything at or above it does not fit.
    let fitted = if n < 0.0 || n >= u64::MAX as f64 {
        None
    } else {
        T::try_from(n as u64).ok()
    };
    if fitted.is_none() {
        errors.insert(name, format!("{} is out of range", label));
    }
    fitted
}
