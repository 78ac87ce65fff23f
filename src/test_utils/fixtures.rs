use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use crate::FieldShape;
use crate::Shape;
use crate::Shaped;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub theme: String,
    pub retries: u32,
}

impl Shaped for Settings {
    fn shape() -> Shape {
        Shape::composite(vec![
            FieldShape::new("theme", String::shape()),
            FieldShape::new("retries", u32::shape()),
        ])
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: u64,
    pub label: String,
}

impl Item {
    pub fn new(
        id: u64,
        label: &str,
    ) -> Self {
        Self {
            id,
            label: label.to_string(),
        }
    }
}

impl Shaped for Item {
    fn shape() -> Shape {
        Shape::composite(vec![
            FieldShape::new("id", u64::shape()),
            FieldShape::new("label", String::shape()),
        ])
    }
}

/// Mix of inline, document and directory fields rooted at `cfg`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    pub name: String,
    pub owner: Option<String>,
    pub settings: Settings,
    pub items: Vec<Item>,
    #[serde(rename = "labelMap")]
    pub labels: BTreeMap<String, String>,
}

impl Shaped for AppConfig {
    fn shape() -> Shape {
        Shape::composite(vec![
            FieldShape::new("name", String::shape()),
            FieldShape::new("owner", Option::<String>::shape()),
            FieldShape::new("settings", Settings::shape()).bind("cfg/settings"),
            FieldShape::new("items", Vec::<Item>::shape()).bind("cfg/items/"),
            FieldShape::new("labels", BTreeMap::<String, String>::shape())
                .rename("labelMap")
                .bind("cfg/labels/"),
        ])
    }
}

pub fn sample_config() -> AppConfig {
    AppConfig {
        name: "demo".to_string(),
        owner: None,
        settings: Settings {
            theme: "dark".to_string(),
            retries: 3,
        },
        items: vec![Item::new(1, "one"), Item::new(2, "two")],
        labels: BTreeMap::from([
            ("env".to_string(), "prod".to_string()),
            ("zone".to_string(), "eu".to_string()),
        ]),
    }
}
