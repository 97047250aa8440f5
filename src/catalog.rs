use serde::Deserialize;

use crate::error::Result;
use crate::types::ImageReference;

const PRESET_PEOPLE: &[(&str, &str)] = &[
    ("p1", "https://i.mji.rip/2025/11/19/51362f10bf363524251691516b323f46.png"),
    ("p2", "https://i.mji.rip/2025/11/19/d42af8d2f41175683d1467bc2c857cbe.png"),
    ("p3", "https://p2.itc.cn/q_70/images03/20230712/dfb1cb57f0d045db86efe369415877cf.jpeg"),
    ("p4", "https://i.mji.rip/2025/11/19/665c90d26a3ec857c5c440f4f7da5ed2.png"),
    ("p5", "https://i.mji.rip/2025/11/19/15f1393ca6e0215caf51cf0ecdfe0d5c.png"),
    ("p6", "https://img-s.msn.cn/tenant/amp/entityid/AA1GC7a3.img?w=520&h=780&m=6&x=222&y=183&s=140&d=140"),
];

const PRESET_GARMENTS: &[(&str, &str)] = &[
    ("g1", "https://i.mji.rip/2025/11/19/17aab709b470423cc3e89772afb7da39.png"),
    ("g2", "https://i.mji.rip/2025/11/19/cd8598d0d987b7b5825257924be13bcb.png"),
    ("g3", "https://i.mji.rip/2025/11/19/32426d416cb5508300c530a071ebe497.png"),
    ("g4", "https://i.mji.rip/2025/11/19/6bd78dd58ee4e038e219145822b356e6.png"),
    ("g5", "https://i.mji.rip/2025/11/19/e6dccb4533c546cb42fa564b322d8e84.png"),
    ("g6", "https://i.mji.rip/2025/11/19/a838237484463bfe6ce45a8245587048.png"),
];

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    people: Vec<PresetEntry>,
    #[serde(default)]
    garments: Vec<PresetEntry>,
}

#[derive(Debug, Deserialize)]
struct PresetEntry {
    id: String,
    url: String,
}

/// Fixed person and garment presets offered by the first two steps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    pub people: Vec<ImageReference>,
    pub garments: Vec<ImageReference>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl Catalog {
    /// The presets shipped with the crate.
    pub fn builtin() -> Self {
        let to_refs = |list: &[(&str, &str)]| -> Vec<ImageReference> {
            list.iter()
                .map(|(id, url)| ImageReference::preset(*id, *url))
                .collect()
        };
        Self {
            people: to_refs(PRESET_PEOPLE),
            garments: to_refs(PRESET_GARMENTS),
        }
    }

    /// Load presets from JSON: `{"people": [{"id", "url"}], "garments": [...]}`.
    pub fn from_json(json: &str) -> Result<Self> {
        let file: CatalogFile = serde_json::from_str(json)?;
        let to_refs = |list: Vec<PresetEntry>| -> Vec<ImageReference> {
            list.into_iter()
                .map(|e| ImageReference::preset(e.id, e.url))
                .collect()
        };
        Ok(Self {
            people: to_refs(file.people),
            garments: to_refs(file.garments),
        })
    }

    pub fn person(&self, id: &str) -> Option<&ImageReference> {
        self.people.iter().find(|p| p.id == id)
    }

    pub fn garment(&self, id: &str) -> Option<&ImageReference> {
        self.garments.iter().find(|g| g.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ImageOrigin;

    #[test]
    fn test_builtin_catalog() {
        let catalog = Catalog::builtin();
        assert_eq!(catalog.people.len(), 6);
        assert_eq!(catalog.garments.len(), 6);
        assert!(catalog.person("p1").is_some());
        assert!(catalog.garment("g6").is_some());
        assert!(catalog.person("g1").is_none());
        assert!(catalog
            .people
            .iter()
            .all(|p| p.origin == ImageOrigin::Preset && !p.is_inline()));
    }

    #[test]
    fn test_from_json() {
        let catalog = Catalog::from_json(
            r#"{
            "people": [{"id": "a", "url": "https://example.com/a.png"}],
            "garments": []
        }"#,
        )
        .unwrap();
        assert_eq!(catalog.people.len(), 1);
        assert_eq!(catalog.person("a").unwrap().source, "https://example.com/a.png");
        assert!(catalog.garments.is_empty());
    }

    #[test]
    fn test_from_json_invalid() {
        assert!(Catalog::from_json("not json").is_err());
    }
}
