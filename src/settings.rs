use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Index settings.
///
/// Every field is optional. `None` fields are not sent, so an update only
/// touches the fields that are set.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synonyms: Option<HashMap<String, Vec<String>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_words: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ranking_rules: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filterable_attributes: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distinct_attribute: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub searchable_attributes: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub displayed_attributes: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sortable_attributes: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typo_tolerance: Option<TypoTolerance>,
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_ranking_rules<I, S>(mut self, rules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ranking_rules = Some(rules.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn with_searchable_attributes<I, S>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.searchable_attributes = Some(attributes.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn with_sortable_attributes<I, S>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sortable_attributes = Some(attributes.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn with_distinct_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.distinct_attribute = Some(attribute.into());
        self
    }

    #[must_use]
    pub fn with_typo_tolerance(mut self, typo_tolerance: TypoTolerance) -> Self {
        self.typo_tolerance = Some(typo_tolerance);
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypoTolerance {
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disable_on_attributes: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disable_on_words: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_word_size_for_typos: Option<MinWordSizeForTypos>,
}

impl Default for TypoTolerance {
    fn default() -> Self {
        Self {
            enabled: true,
            disable_on_attributes: None,
            disable_on_words: None,
            min_word_size_for_typos: None,
        }
    }
}

impl TypoTolerance {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }
}

fn enabled_by_default() -> bool {
    true
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MinWordSizeForTypos {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub one_typo: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub two_typos: Option<u32>,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{MinWordSizeForTypos, Settings, TypoTolerance};

    #[test]
    fn partial_update_only_sends_set_fields() {
        let settings = Settings::new()
            .with_ranking_rules(["typo", "words"])
            .with_typo_tolerance(TypoTolerance::disabled());
        let body = serde_json::to_value(&settings).expect("json");
        assert_eq!(
            body,
            json!({
                "rankingRules": ["typo", "words"],
                "typoTolerance": {"enabled": false}
            })
        );
    }

    #[test]
    fn typo_tolerance_uses_wire_names() {
        let typo = TypoTolerance {
            enabled: true,
            disable_on_attributes: Some(vec!["title".to_owned()]),
            disable_on_words: Some(vec!["spiderman".to_owned()]),
            min_word_size_for_typos: Some(MinWordSizeForTypos {
                one_typo: Some(10),
                two_typos: Some(20),
            }),
        };
        let body = serde_json::to_value(&typo).expect("json");
        assert_eq!(body["minWordSizeForTypos"]["twoTypos"], 20);
        assert_eq!(body["disableOnWords"], json!(["spiderman"]));
    }

    #[test]
    fn missing_enabled_defaults_to_true() {
        let typo: TypoTolerance = serde_json::from_value(json!({})).expect("json");
        assert!(typo.enabled);
    }
}
