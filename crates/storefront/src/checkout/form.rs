//! Delivery details form and its validation.

use ququ_core::{DeliveryOption, Email, UkPostcode};
use serde::{Deserialize, Serialize};

use super::CheckoutRegion;
use crate::orders::ShippingAddress;
use crate::payment::ShippingSnapshot;

/// Counties offered by the UK checkout, sorted.
pub const UK_COUNTIES: &[&str] = &[
    "Bedfordshire",
    "Berkshire",
    "Buckinghamshire",
    "Cambridgeshire",
    "Cheshire",
    "Cornwall",
    "Cumbria",
    "Derbyshire",
    "Devon",
    "Dorset",
    "Durham",
    "East Sussex",
    "Essex",
    "Gloucestershire",
    "Greater London",
    "Greater Manchester",
    "Hampshire",
    "Hertfordshire",
    "Kent",
    "Lancashire",
    "Leicestershire",
    "Lincolnshire",
    "Merseyside",
    "Norfolk",
    "North Yorkshire",
    "Northamptonshire",
    "Northumberland",
    "Nottinghamshire",
    "Oxfordshire",
    "Somerset",
    "South Yorkshire",
    "Staffordshire",
    "Suffolk",
    "Surrey",
    "Warwickshire",
    "West Midlands",
    "West Sussex",
    "West Yorkshire",
    "Wiltshire",
    "Worcestershire",
];

/// County preselected on the UK form.
pub const DEFAULT_UK_COUNTY: &str = "Greater London";

const UK_COUNTRY_CODE: &str = "GB";

/// A destination offered by the international checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Country {
    /// ISO 3166-1 alpha-2.
    pub code: &'static str,
    pub name: &'static str,
}

/// Destinations offered by the international checkout.
pub const COUNTRIES: &[Country] = &[
    Country { code: "AU", name: "Australia" },
    Country { code: "AT", name: "Austria" },
    Country { code: "BE", name: "Belgium" },
    Country { code: "CA", name: "Canada" },
    Country { code: "DK", name: "Denmark" },
    Country { code: "FI", name: "Finland" },
    Country { code: "FR", name: "France" },
    Country { code: "DE", name: "Germany" },
    Country { code: "IE", name: "Ireland" },
    Country { code: "IT", name: "Italy" },
    Country { code: "JP", name: "Japan" },
    Country { code: "NL", name: "Netherlands" },
    Country { code: "NZ", name: "New Zealand" },
    Country { code: "NO", name: "Norway" },
    Country { code: "PT", name: "Portugal" },
    Country { code: "ES", name: "Spain" },
    Country { code: "SE", name: "Sweden" },
    Country { code: "CH", name: "Switzerland" },
    Country { code: "AE", name: "United Arab Emirates" },
    Country { code: "GB", name: "United Kingdom" },
    Country { code: "US", name: "United States" },
];

/// Look up a listed country by code or name, case-insensitively.
#[must_use]
pub fn find_country(input: &str) -> Option<&'static Country> {
    let input = input.trim();
    COUNTRIES
        .iter()
        .find(|c| c.code.eq_ignore_ascii_case(input) || c.name.eq_ignore_ascii_case(input))
}

/// A problem with one form field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Delivery details as the shopper typed them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ShippingForm {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub city: String,
    /// County (UK) or state/region (international).
    pub state: String,
    pub country: String,
    pub postcode: String,
    pub delivery_option: DeliveryOption,
}

impl ShippingForm {
    /// A blank form with the region's defaults filled in.
    #[must_use]
    pub fn for_region(region: CheckoutRegion) -> Self {
        match region {
            CheckoutRegion::Uk => Self {
                state: DEFAULT_UK_COUNTY.to_string(),
                country: UK_COUNTRY_CODE.to_string(),
                ..Self::default()
            },
            CheckoutRegion::International => Self::default(),
        }
    }

    /// Check every field and return the cleaned details, or every problem
    /// found.
    ///
    /// # Errors
    ///
    /// Returns one [`FieldError`] per invalid field.
    pub fn validate(&self, region: CheckoutRegion) -> Result<ValidatedShipping, Vec<FieldError>> {
        let mut errors = Vec::new();

        let mut required = |field: &'static str, value: &str| -> String {
            let value = value.trim();
            if value.is_empty() {
                errors.push(FieldError::new(field, "This field is required"));
            }
            value.to_owned()
        };
        let name = required("name", &self.name);
        let phone = required("phone", &self.phone);
        let address = required("address", &self.address);
        let city = required("city", &self.city);
        let state = self.state.trim().to_owned();

        let email = match Email::parse(&self.email) {
            Ok(email) => Some(email),
            Err(ququ_core::EmailError::Empty) => {
                errors.push(FieldError::new("email", "This field is required"));
                None
            }
            Err(_) => {
                errors.push(FieldError::new("email", "Please enter a valid email address"));
                None
            }
        };

        let (country, postcode) = match region {
            CheckoutRegion::Uk => {
                if !state.is_empty()
                    && !UK_COUNTIES.iter().any(|c| c.eq_ignore_ascii_case(&state))
                {
                    errors.push(FieldError::new("state", "Please choose a county from the list"));
                }
                let postcode = match UkPostcode::parse(&self.postcode) {
                    Ok(postcode) => postcode.to_string(),
                    Err(ququ_core::PostcodeError::Empty) => {
                        errors.push(FieldError::new("postcode", "This field is required"));
                        String::new()
                    }
                    Err(ququ_core::PostcodeError::Invalid(_)) => {
                        errors.push(FieldError::new(
                            "postcode",
                            "Please enter a valid UK postcode (e.g., SW1A 1AA)",
                        ));
                        String::new()
                    }
                };
                (UK_COUNTRY_CODE.to_string(), postcode)
            }
            CheckoutRegion::International => {
                let country = if self.country.trim().is_empty() {
                    errors.push(FieldError::new("country", "This field is required"));
                    String::new()
                } else if let Some(country) = find_country(&self.country) {
                    country.code.to_string()
                } else {
                    errors.push(FieldError::new(
                        "country",
                        "Please choose a country from the list",
                    ));
                    String::new()
                };
                let postcode = self.postcode.trim().to_owned();
                if postcode.is_empty() {
                    errors.push(FieldError::new("postcode", "This field is required"));
                }
                (country, postcode)
            }
        };

        match email {
            Some(email) if errors.is_empty() => Ok(ValidatedShipping {
                name,
                email,
                phone,
                address,
                city,
                state,
                country,
                postcode,
                delivery_option: self.delivery_option,
            }),
            _ => Err(errors),
        }
    }
}

/// Delivery details that passed validation. The postcode is canonical for
/// UK checkouts and the country is an ISO code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatedShipping {
    pub name: String,
    pub email: Email,
    pub phone: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub country: String,
    pub postcode: String,
    pub delivery_option: DeliveryOption,
}

impl ValidatedShipping {
    /// Address as recorded on the order.
    #[must_use]
    pub fn to_shipping_address(&self) -> ShippingAddress {
        ShippingAddress {
            name: self.name.clone(),
            email: self.email.to_string(),
            phone: self.phone.clone(),
            street: self.address.clone(),
            city: self.city.clone(),
            state: self.state.clone(),
            postcode: self.postcode.clone(),
            country: self.country.clone(),
        }
    }

    /// Address as handed to the payment provider.
    #[must_use]
    pub fn to_snapshot(&self) -> ShippingSnapshot {
        ShippingSnapshot {
            full_name: self.name.clone(),
            address_line: self.address.clone(),
            city: self.city.clone(),
            region: self.state.clone(),
            postal_code: self.postcode.clone(),
            country_code: self.country.clone(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn uk_form() -> ShippingForm {
        ShippingForm {
            name: "Jo Bloggs".to_string(),
            email: "jo@example.com".to_string(),
            phone: "07700 900123".to_string(),
            address: "1 High Street".to_string(),
            city: "London".to_string(),
            postcode: "sw1a1aa".to_string(),
            ..ShippingForm::for_region(CheckoutRegion::Uk)
        }
    }

    fn fields(errors: &[FieldError]) -> Vec<&'static str> {
        errors.iter().map(|e| e.field).collect()
    }

    #[test]
    fn test_uk_form_normalizes_postcode_and_country() {
        let valid = uk_form().validate(CheckoutRegion::Uk).unwrap();
        assert_eq!(valid.postcode, "SW1A 1AA");
        assert_eq!(valid.country, "GB");
        assert_eq!(valid.state, "Greater London");
    }

    #[test]
    fn test_missing_fields_are_reported_together() {
        let form = ShippingForm {
            name: "  ".to_string(),
            city: String::new(),
            email: String::new(),
            ..uk_form()
        };
        let errors = form.validate(CheckoutRegion::Uk).unwrap_err();
        assert_eq!(fields(&errors), ["name", "city", "email"]);
    }

    #[test]
    fn test_invalid_uk_postcode() {
        for bad in ["12345", "SW1A 1A", "SW1A  1AA"] {
            let form = ShippingForm {
                postcode: bad.to_string(),
                ..uk_form()
            };
            let errors = form.validate(CheckoutRegion::Uk).unwrap_err();
            assert_eq!(fields(&errors), ["postcode"], "{bad}");
        }
    }

    #[test]
    fn test_unknown_county_rejected() {
        let form = ShippingForm {
            state: "Atlantis".to_string(),
            ..uk_form()
        };
        let errors = form.validate(CheckoutRegion::Uk).unwrap_err();
        assert_eq!(fields(&errors), ["state"]);

        let blank = ShippingForm {
            state: String::new(),
            ..uk_form()
        };
        assert!(blank.validate(CheckoutRegion::Uk).is_ok());
    }

    #[test]
    fn test_bad_email() {
        let form = ShippingForm {
            email: "jo@localhost".to_string(),
            ..uk_form()
        };
        let errors = form.validate(CheckoutRegion::Uk).unwrap_err();
        assert_eq!(errors[0].message, "Please enter a valid email address");
    }

    #[test]
    fn test_international_skips_postcode_pattern() {
        let form = ShippingForm {
            country: "germany".to_string(),
            state: "Berlin".to_string(),
            postcode: "10115".to_string(),
            ..uk_form()
        };
        let valid = form.validate(CheckoutRegion::International).unwrap();
        assert_eq!(valid.country, "DE");
        assert_eq!(valid.postcode, "10115");
        assert_eq!(valid.state, "Berlin");

        let unlisted = ShippingForm {
            country: "Narnia".to_string(),
            ..form
        };
        let errors = unlisted.validate(CheckoutRegion::International).unwrap_err();
        assert_eq!(fields(&errors), ["country"]);
    }

    #[test]
    fn test_counties_sorted() {
        let mut sorted = UK_COUNTIES.to_vec();
        sorted.sort_unstable();
        assert_eq!(sorted, UK_COUNTIES);
        assert!(UK_COUNTIES.contains(&DEFAULT_UK_COUNTY));
    }
}
