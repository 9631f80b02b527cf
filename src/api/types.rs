//! Request and response types for the comparison REST endpoints.

use std::collections::HashMap;

use serde::Deserialize;

use crate::shared::Category;
use crate::websocket::subscriptions::Subscription;

/// Query parameters for a `/compare/{category}` lookup.
pub(crate) fn compare_params(subscription: &Subscription) -> Vec<(&'static str, &str)> {
    match subscription {
        Subscription::Taxi {
            from_country,
            from_state,
            to_country,
            to_state,
        } => vec![
            ("fromCountry", from_country.as_str()),
            ("fromState", from_state.as_str()),
            ("toCountry", to_country.as_str()),
            ("toState", to_state.as_str()),
        ],
        Subscription::Restaurant {
            country,
            state,
            city,
            restaurant,
        } => vec![
            ("country", country.as_str()),
            ("state", state.as_str()),
            ("city", city.as_str()),
            ("restaurant", restaurant.as_str()),
        ],
        Subscription::QuickCommerce {
            country,
            state,
            city,
            address,
            grocery_item,
        } => {
            let mut params = vec![
                ("country", country.as_str()),
                ("state", state.as_str()),
                ("city", city.as_str()),
                ("address", address.as_str()),
            ];
            if let Some(item) = grocery_item {
                params.push(("groceryItem", item.as_str()));
            }
            params
        }
    }
}

/// Drill-down query for search form options.
///
/// Each supplied level narrows the next: with nothing set the server lists
/// categories, then countries, states, cities and finally restaurants,
/// addresses or grocery items.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptionsQuery {
    pub category: Option<Category>,
    pub country: Option<String>,
    pub state: Option<String>,
    pub city: Option<String>,
    pub address: Option<String>,
}

impl OptionsQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }

    pub fn with_country(mut self, country: impl Into<String>) -> Self {
        self.country = Some(country.into());
        self
    }

    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }

    pub fn with_city(mut self, city: impl Into<String>) -> Self {
        self.city = Some(city.into());
        self
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    pub(crate) fn to_params(&self) -> Vec<(&'static str, &str)> {
        let mut params = Vec::new();
        if let Some(category) = self.category {
            params.push(("category", category.as_str()));
        }
        for (name, value) in [
            ("country", &self.country),
            ("state", &self.state),
            ("city", &self.city),
            ("address", &self.address),
        ] {
            if let Some(v) = value {
                params.push((name, v.as_str()));
            }
        }
        params
    }
}

/// One level of form options, e.g. `kind = "states"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionList {
    pub kind: String,
    pub values: Vec<String>,
}

impl OptionList {
    pub(crate) fn from_body(body: OptionsBody) -> Option<Self> {
        body.0.into_iter().next().map(|(kind, values)| Self {
            kind,
            values: values.unwrap_or_default(),
        })
    }
}

/// `{"states": ["Delhi", ...]}`; the list is `null` when nothing matches.
#[derive(Debug, Deserialize)]
#[serde(transparent)]
pub(crate) struct OptionsBody(HashMap<String, Option<Vec<String>>>);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_taxi_params() {
        let sub = Subscription::taxi("India", "Delhi", "India", "Punjab");
        assert_eq!(
            compare_params(&sub),
            vec![
                ("fromCountry", "India"),
                ("fromState", "Delhi"),
                ("toCountry", "India"),
                ("toState", "Punjab"),
            ]
        );
    }

    #[test]
    fn test_quick_commerce_params_include_item_only_when_set() {
        let sub =
            Subscription::quick_commerce("India", "Maharashtra", "Mumbai", "Bandra West", None);
        assert!(compare_params(&sub).iter().all(|(k, _)| *k != "groceryItem"));

        let sub = Subscription::quick_commerce(
            "India",
            "Maharashtra",
            "Mumbai",
            "Bandra West",
            Some("Milk".to_string()),
        );
        assert_eq!(compare_params(&sub).last(), Some(&("groceryItem", "Milk")));
    }

    #[test]
    fn test_options_query_params() {
        assert!(OptionsQuery::new().to_params().is_empty());

        let query = OptionsQuery::new()
            .with_category(Category::QuickCommerce)
            .with_country("India")
            .with_state("Maharashtra");
        assert_eq!(
            query.to_params(),
            vec![
                ("category", "quickcommerce"),
                ("country", "India"),
                ("state", "Maharashtra"),
            ]
        );
    }

    #[test]
    fn test_option_list_from_body() {
        let body: OptionsBody = serde_json::from_str(r#"{"cities":["Mumbai","Pune"]}"#).unwrap();
        let list = OptionList::from_body(body).unwrap();
        assert_eq!(list.kind, "cities");
        assert_eq!(list.values, vec!["Mumbai", "Pune"]);

        let body: OptionsBody = serde_json::from_str(r#"{"restaurants":null}"#).unwrap();
        assert!(OptionList::from_body(body).unwrap().values.is_empty());
    }
}
