use std::future::Future;
use std::time::Duration;

use kvbind::FieldShape;
use kvbind::Shape;
use kvbind::Shaped;
use serde::Deserialize;
use serde::Serialize;

pub const WAIT_TIMEOUT: Duration = Duration::from_secs(5);

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

/// Root at `cfg`: `name` inline, `settings` as a document, `items` as a
/// directory of documents.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Config {
    pub name: String,
    pub settings: Settings,
    pub items: Vec<Item>,
}

impl Shaped for Config {
    fn shape() -> Shape {
        Shape::composite(vec![
            FieldShape::new("name", String::shape()).rename("Name"),
            FieldShape::new("settings", Settings::shape())
                .rename("Settings")
                .bind("cfg/settings"),
            FieldShape::new("items", Vec::<Item>::shape())
                .rename("Items")
                .bind("cfg/items/"),
        ])
    }
}

pub fn config() -> Config {
    Config {
        name: "demo".to_string(),
        settings: Settings {
            theme: "dark".to_string(),
            retries: 3,
        },
        items: Vec::new(),
    }
}

/// Polls `check` until it holds or [`WAIT_TIMEOUT`] elapses.
pub async fn wait_until<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + WAIT_TIMEOUT;
    while tokio::time::Instant::now() < deadline {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}
