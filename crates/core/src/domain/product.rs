use serde::{Deserialize, Serialize};

/// Catalog entry as stored in `products.json`. The on-disk keys are the
/// Chinese column names; English aliases are accepted on read.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    #[serde(rename = "名字", alias = "name")]
    pub name: String,
    #[serde(rename = "产品类型", alias = "category", default)]
    pub category: String,
    #[serde(rename = "品牌", alias = "brand", default)]
    pub brand: String,
    #[serde(rename = "热度", alias = "popularity", default)]
    pub popularity: i64,
    #[serde(rename = "描述", alias = "description", default)]
    pub description: String,
    #[serde(rename = "功能", alias = "features", default)]
    pub features: String,
}

impl Product {
    /// All free-text columns joined, used for preference matching.
    pub fn searchable_text(&self) -> String {
        [
            self.category.as_str(),
            self.brand.as_str(),
            self.name.as_str(),
            self.description.as_str(),
            self.features.as_str(),
        ]
        .join(" ")
    }
}
